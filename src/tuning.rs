use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use tokio::runtime::Builder;

use bevy::prelude::{
    error, info, warn, App, DetectChanges, IntoScheduleConfigs, Plugin, Query, Res, ResMut, Resource, Update,
    Vec3,
};

use crate::{ball::BallController, camera::ChaseCamera};

pub const DEFAULT_TUNING_ADDR: &str = "127.0.0.1:7878";

#[derive(Debug, thiserror::Error)]
pub enum TuningError {
    #[error("failed to read tuning file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid tuning JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("left limit {left} is greater than right limit {right}")]
    InvertedLimits { left: f32, right: f32 },
    #[error("{field} must be {requirement}, got {value}")]
    OutOfRange {
        field: &'static str,
        requirement: &'static str,
        value: f32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

impl IntoResponse for TuningError {
    fn into_response(self) -> Response {
        let status = match self {
            TuningError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        };
        (status, Json(ApiError { error: self.to_string() })).into_response()
    }
}

// Hierarchical API structs for request/response JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiTuning {
    pub aim: ApiAim,
    pub launch: ApiLaunch,
    pub camera: ApiCamera,
    pub debug: ApiDebug,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiAim {
    pub speed: f32,
    pub limits: ApiLimits,
}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiLimits { pub left: f32, pub right: f32 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiLaunch { pub force: f32 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCamera {
    pub offset: ApiOffset,
    pub smoothing: ApiSmoothing,
    pub follow: ApiFollow,
    pub zoom: ApiZoom,
    pub obstacles: ApiObstacles,
}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiOffset { pub x: f32, pub y: f32, pub z: f32 }
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSmoothing { pub position_time: f32, pub rotation_sharpness: f32 }
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiFollow { pub on_move: bool, pub speed_threshold: f32 }
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiZoom { pub launch: f32, pub rate: f32 }
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiObstacles { pub layers: u32, pub clearance: f32 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiDebug { pub show_gizmos: bool }

// Partial update types mirror ApiTuning with Options down to lowest level
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiTuningUpdate {
    pub aim: Option<ApiAimUpdate>,
    pub launch: Option<ApiLaunchUpdate>,
    pub camera: Option<ApiCameraUpdate>,
    pub debug: Option<ApiDebugUpdate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiAimUpdate { pub speed: Option<f32>, pub limits: Option<ApiLimitsUpdate> }
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiLimitsUpdate { pub left: Option<f32>, pub right: Option<f32> }

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiLaunchUpdate { pub force: Option<f32> }

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiCameraUpdate {
    pub offset: Option<ApiOffsetUpdate>,
    pub smoothing: Option<ApiSmoothingUpdate>,
    pub follow: Option<ApiFollowUpdate>,
    pub zoom: Option<ApiZoomUpdate>,
    pub obstacles: Option<ApiObstaclesUpdate>,
}
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiOffsetUpdate { pub x: Option<f32>, pub y: Option<f32>, pub z: Option<f32> }
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiSmoothingUpdate { pub position_time: Option<f32>, pub rotation_sharpness: Option<f32> }
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiFollowUpdate { pub on_move: Option<bool>, pub speed_threshold: Option<f32> }
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiZoomUpdate { pub launch: Option<f32>, pub rate: Option<f32> }
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiObstaclesUpdate { pub layers: Option<u32>, pub clearance: Option<f32> }

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiDebugUpdate { pub show_gizmos: Option<bool> }

impl ApiTuningUpdate {
    pub fn apply_to(self, t: &mut RigTuning) {
        if let Some(a) = self.aim {
            if let Some(v) = a.speed { t.aim_speed = v; }
            if let Some(l) = a.limits {
                if let Some(v) = l.left { t.left_limit = v; }
                if let Some(v) = l.right { t.right_limit = v; }
            }
        }
        if let Some(l) = self.launch {
            if let Some(v) = l.force { t.launch_force = v; }
        }
        if let Some(c) = self.camera {
            if let Some(o) = c.offset {
                if let Some(v) = o.x { t.offset_x = v; }
                if let Some(v) = o.y { t.offset_y = v; }
                if let Some(v) = o.z { t.offset_z = v; }
            }
            if let Some(s) = c.smoothing {
                if let Some(v) = s.position_time { t.position_smooth_time = v; }
                if let Some(v) = s.rotation_sharpness { t.rotation_sharpness = v; }
            }
            if let Some(f) = c.follow {
                if let Some(v) = f.on_move { t.follow_on_move = v; }
                if let Some(v) = f.speed_threshold { t.follow_speed_threshold = v; }
            }
            if let Some(z) = c.zoom {
                if let Some(v) = z.launch { t.launch_zoom = v; }
                if let Some(v) = z.rate { t.zoom_rate = v; }
            }
            if let Some(o) = c.obstacles {
                if let Some(v) = o.layers { t.obstacle_layers = v; }
                if let Some(v) = o.clearance { t.obstacle_clearance = v; }
            }
        }
        if let Some(d) = self.debug {
            if let Some(v) = d.show_gizmos { t.show_gizmos = v; }
        }
    }
}

impl From<&RigTuning> for ApiTuning {
    fn from(t: &RigTuning) -> Self {
        ApiTuning {
            aim: ApiAim { speed: t.aim_speed, limits: ApiLimits { left: t.left_limit, right: t.right_limit } },
            launch: ApiLaunch { force: t.launch_force },
            camera: ApiCamera {
                offset: ApiOffset { x: t.offset_x, y: t.offset_y, z: t.offset_z },
                smoothing: ApiSmoothing { position_time: t.position_smooth_time, rotation_sharpness: t.rotation_sharpness },
                follow: ApiFollow { on_move: t.follow_on_move, speed_threshold: t.follow_speed_threshold },
                zoom: ApiZoom { launch: t.launch_zoom, rate: t.zoom_rate },
                obstacles: ApiObstacles { layers: t.obstacle_layers, clearance: t.obstacle_clearance },
            },
            debug: ApiDebug { show_gizmos: t.show_gizmos },
        }
    }
}

impl From<ApiTuning> for RigTuning {
    fn from(api: ApiTuning) -> Self {
        RigTuning {
            aim_speed: api.aim.speed,
            left_limit: api.aim.limits.left,
            right_limit: api.aim.limits.right,
            launch_force: api.launch.force,
            offset_x: api.camera.offset.x,
            offset_y: api.camera.offset.y,
            offset_z: api.camera.offset.z,
            position_smooth_time: api.camera.smoothing.position_time,
            rotation_sharpness: api.camera.smoothing.rotation_sharpness,
            follow_on_move: api.camera.follow.on_move,
            follow_speed_threshold: api.camera.follow.speed_threshold,
            launch_zoom: api.camera.zoom.launch,
            zoom_rate: api.camera.zoom.rate,
            obstacle_layers: api.camera.obstacles.layers,
            obstacle_clearance: api.camera.obstacles.clearance,
            show_gizmos: api.debug.show_gizmos,
        }
    }
}

/// Designer-facing knobs for the ball and the chase camera, pushed into every rig on change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Resource)]
pub struct RigTuning {
    // Aiming and launch
    pub aim_speed: f32,
    pub left_limit: f32,
    pub right_limit: f32,
    pub launch_force: f32,
    // Camera placement and smoothing
    pub offset_x: f32,
    pub offset_y: f32,
    pub offset_z: f32,
    pub position_smooth_time: f32,
    pub rotation_sharpness: f32,
    pub follow_on_move: bool,
    pub follow_speed_threshold: f32,
    pub launch_zoom: f32,
    pub zoom_rate: f32,
    pub obstacle_layers: u32,
    pub obstacle_clearance: f32,
    pub show_gizmos: bool,
}

impl Default for RigTuning {
    fn default() -> Self {
        let ball = BallController::default();
        let camera = ChaseCamera::default();
        RigTuning {
            aim_speed: ball.aim_speed,
            left_limit: ball.left_limit,
            right_limit: ball.right_limit,
            launch_force: ball.launch_force,
            offset_x: camera.offset.x,
            offset_y: camera.offset.y,
            offset_z: camera.offset.z,
            position_smooth_time: camera.position_smooth_time,
            rotation_sharpness: camera.rotation_sharpness,
            follow_on_move: camera.follow_on_move,
            follow_speed_threshold: camera.follow_speed_threshold,
            launch_zoom: camera.launch_zoom,
            zoom_rate: camera.zoom_rate,
            obstacle_layers: camera.obstacle_layers,
            obstacle_clearance: camera.obstacle_clearance,
            show_gizmos: false,
        }
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), TuningError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(TuningError::OutOfRange { field, requirement: "a finite value >= 0", value })
    }
}

impl RigTuning {
    pub fn validate(&self) -> Result<(), TuningError> {
        if self.left_limit > self.right_limit {
            return Err(TuningError::InvertedLimits { left: self.left_limit, right: self.right_limit });
        }
        non_negative("aim.speed", self.aim_speed)?;
        non_negative("launch.force", self.launch_force)?;
        non_negative("camera.smoothing.position_time", self.position_smooth_time)?;
        non_negative("camera.smoothing.rotation_sharpness", self.rotation_sharpness)?;
        non_negative("camera.follow.speed_threshold", self.follow_speed_threshold)?;
        non_negative("camera.zoom.rate", self.zoom_rate)?;
        non_negative("camera.obstacles.clearance", self.obstacle_clearance)?;
        if !(self.launch_zoom > 0.0 && self.launch_zoom.is_finite()) {
            return Err(TuningError::OutOfRange {
                field: "camera.zoom.launch",
                requirement: "a finite value > 0",
                value: self.launch_zoom,
            });
        }
        Ok(())
    }

    /// Parses a full `ApiTuning` document and validates it.
    pub fn from_json(text: &str) -> Result<RigTuning, TuningError> {
        let api: ApiTuning = serde_json::from_str(text)?;
        let tuning = RigTuning::from(api);
        tuning.validate()?;
        Ok(tuning)
    }

    pub fn load(path: &Path) -> Result<RigTuning, TuningError> {
        let text = std::fs::read_to_string(path).map_err(|source| TuningError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        RigTuning::from_json(&text)
    }

    /// Merges a partial update and validates the result without touching `self`.
    pub fn merged(&self, update: ApiTuningUpdate) -> Result<RigTuning, TuningError> {
        let mut next = self.clone();
        update.apply_to(&mut next);
        next.validate()?;
        Ok(next)
    }

    pub fn apply_to_ball(&self, ball: &mut BallController) {
        ball.aim_speed = self.aim_speed;
        ball.left_limit = self.left_limit;
        ball.right_limit = self.right_limit;
        ball.launch_force = self.launch_force;
    }

    pub fn apply_to_camera(&self, camera: &mut ChaseCamera) {
        camera.offset = Vec3::new(self.offset_x, self.offset_y, self.offset_z);
        camera.position_smooth_time = self.position_smooth_time;
        camera.rotation_sharpness = self.rotation_sharpness;
        camera.follow_on_move = self.follow_on_move;
        camera.follow_speed_threshold = self.follow_speed_threshold;
        camera.launch_zoom = self.launch_zoom;
        camera.zoom_rate = self.zoom_rate;
        camera.obstacle_layers = self.obstacle_layers;
        camera.obstacle_clearance = self.obstacle_clearance;
    }
}

fn lock(mirror: &Mutex<RigTuning>) -> MutexGuard<'_, RigTuning> {
    mirror.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
struct AppState {
    tx: Sender<RigTuning>,
    mirror: Arc<Mutex<RigTuning>>, // for GET /tuning
}

async fn get_tuning(State(state): State<AppState>) -> Json<ApiTuning> {
    let guard = lock(&state.mirror);
    Json(ApiTuning::from(&*guard))
}

async fn patch_tuning(
    State(state): State<AppState>,
    Json(api_update): Json<ApiTuningUpdate>,
) -> Result<Json<ApiTuning>, TuningError> {
    let new_tuning = {
        let mut guard = lock(&state.mirror);
        let merged = guard.merged(api_update)?;
        *guard = merged.clone();
        merged
    };
    // Bevy applies its own copy; a closed channel only means the game is shutting down.
    let _ = state.tx.send(new_tuning.clone());
    Ok(Json(ApiTuning::from(&new_tuning)))
}

pub fn build_router(tx: Sender<RigTuning>, mirror: Arc<Mutex<RigTuning>>) -> Router {
    let state = AppState { tx, mirror };
    Router::new()
        .route("/tuning", get(get_tuning).patch(patch_tuning))
        .with_state(state)
}

pub fn spawn_tuning_server(
    addr: SocketAddr,
    tx: Sender<RigTuning>,
    mirror: Arc<Mutex<RigTuning>>,
) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("tuning-http".into())
        .spawn(move || {
            let rt = match Builder::new_current_thread().enable_all().build() {
                Ok(rt) => rt,
                Err(e) => {
                    error!("tuning server runtime failed to start: {e}");
                    return;
                }
            };

            rt.block_on(async move {
                let app = build_router(tx, mirror);
                let listener = match tokio::net::TcpListener::bind(addr).await {
                    Ok(listener) => listener,
                    Err(e) => {
                        error!("tuning server could not bind {addr}: {e}");
                        return;
                    }
                };
                info!("tuning server on http://{addr}/tuning");
                if let Err(e) = axum::serve(listener, app).await {
                    error!("tuning server stopped: {e}");
                }
            });
        })
}

#[derive(Resource)]
pub struct TuningRx(pub Receiver<RigTuning>);

// The HTTP handler has already stored the accepted tuning in the mirror.
pub fn apply_tuning_updates_system(rx: Option<Res<TuningRx>>, mut tuning: ResMut<RigTuning>) {
    let Some(rx) = rx else {
        return;
    };
    while let Ok(new_tuning) = rx.0.try_recv() {
        *tuning = new_tuning;
    }
}

pub fn sync_rig_tuning(
    tuning: Res<RigTuning>,
    mut balls: Query<&mut BallController>,
    mut cameras: Query<&mut ChaseCamera>,
) {
    if !tuning.is_changed() {
        return;
    }
    for mut ball in balls.iter_mut() {
        tuning.apply_to_ball(&mut ball);
    }
    for mut camera in cameras.iter_mut() {
        tuning.apply_to_camera(&mut camera);
    }
}

/// Where the tuning layer gets its initial values and whether it serves HTTP.
#[derive(Debug, Clone, Default)]
pub struct TuningPlugin {
    pub file: Option<PathBuf>,
    pub server_addr: Option<SocketAddr>,
}

impl TuningPlugin {
    /// `RIG_TUNING_FILE` names a JSON file; `TUNING_ADDR` is a socket address or `off`.
    pub fn from_env() -> Self {
        let file = std::env::var_os("RIG_TUNING_FILE").map(PathBuf::from);
        let addr_text = std::env::var("TUNING_ADDR").unwrap_or_else(|_| DEFAULT_TUNING_ADDR.to_string());
        let server_addr = if addr_text.eq_ignore_ascii_case("off") {
            None
        } else {
            match addr_text.parse() {
                Ok(addr) => Some(addr),
                Err(e) => {
                    warn!("ignoring TUNING_ADDR={addr_text:?}: {e}");
                    None
                }
            }
        };
        Self { file, server_addr }
    }

    fn initial_tuning(&self) -> RigTuning {
        let Some(path) = &self.file else {
            return RigTuning::default();
        };
        match RigTuning::load(path) {
            Ok(tuning) => {
                info!("loaded rig tuning from {}", path.display());
                tuning
            }
            Err(e) => {
                warn!("{e}; using default rig tuning");
                RigTuning::default()
            }
        }
    }
}

impl Plugin for TuningPlugin {
    fn build(&self, app: &mut App) {
        let initial = self.initial_tuning();
        let mirror = Arc::new(Mutex::new(initial.clone()));
        let (tx, rx) = crossbeam_channel::unbounded();

        if let Some(addr) = self.server_addr {
            if let Err(e) = spawn_tuning_server(addr, tx, mirror) {
                error!("could not start tuning server thread: {e}");
            }
        }

        app.insert_resource(initial)
            .insert_resource(TuningRx(rx))
            .add_systems(Update, (apply_tuning_updates_system, sync_rig_tuning).chain());
    }
}

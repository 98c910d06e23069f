//! Hands-free play for headless runs: steer to a random spot, launch, and log the rig.

use rand::{thread_rng, Rng};

use bevy::prelude::{
    info, App, EventReader, EventWriter, GlobalTransform, IntoScheduleConfigs, Local, Plugin, PreUpdate, Query,
    Res, ResMut, Resource, Startup, Time, Timer, TimerMode, Transform, Update, With,
};
use bevy_rapier3d::prelude::Velocity;

use crate::{
    ball::{Ball, BallController, BallLaunched, LaunchRequested},
    camera::ChaseCamera,
    input::{update_horizontal_axis, HorizontalAxis},
    tuning::RigTuning,
};

const AIM_TOLERANCE: f32 = 0.05;
/// Share of each lane limit the random aim may use.
const AIM_RANGE_SCALE: f32 = 0.75;
const STEER_STRENGTH: f32 = 0.5;
const LOG_EVERY_SECS: f32 = 2.0;

#[derive(Debug, Clone, Resource)]
pub struct AutoLaunch {
    pub timer: Timer,
    pub aim_x: f32,
    pub fired: bool,
}

impl AutoLaunch {
    pub fn new(delay_secs: f32, aim_x: f32) -> Self {
        Self { timer: Timer::from_seconds(delay_secs, TimerMode::Once), aim_x, fired: false }
    }

    pub fn random(delay_secs: f32, left: f32, right: f32) -> Self {
        Self::new(delay_secs, random_aim(left, right))
    }
}

fn random_aim(left: f32, right: f32) -> f32 {
    if left < right {
        thread_rng().gen_range(left, right)
    } else {
        left
    }
}

/// Picks the aim inside the limits the rig will actually use.
pub fn pick_auto_aim(mut auto: ResMut<AutoLaunch>, tuning: Option<Res<RigTuning>>) {
    let (left, right) = match tuning {
        Some(tuning) => (tuning.left_limit, tuning.right_limit),
        None => {
            let defaults = BallController::default();
            (defaults.left_limit, defaults.right_limit)
        }
    };
    auto.aim_x = random_aim(left * AIM_RANGE_SCALE, right * AIM_RANGE_SCALE);
}

/// Axis value that walks a ball at `x` toward `aim_x`.
pub fn steer_axis(x: f32, aim_x: f32) -> f32 {
    let diff = aim_x - x;
    if diff.abs() > AIM_TOLERANCE {
        diff.signum() * STEER_STRENGTH
    } else {
        0.0
    }
}

pub fn steer_and_launch(
    time: Res<Time>,
    mut auto: ResMut<AutoLaunch>,
    mut axis: ResMut<HorizontalAxis>,
    balls: Query<(&Transform, &BallController), With<Ball>>,
    mut launches: EventWriter<LaunchRequested>,
) {
    if auto.fired {
        return;
    }
    if let Some((transform, _)) = balls.iter().find(|(_, c)| !c.launched) {
        axis.value = steer_axis(transform.translation.x, auto.aim_x);
    }
    if auto.timer.tick(time.delta()).just_finished() {
        axis.value = 0.0;
        auto.fired = true;
        info!("autoplay launching toward x={:.2}", auto.aim_x);
        launches.write(LaunchRequested);
    }
}

pub fn rig_logger(
    time: Res<Time>,
    mut since: Local<f32>,
    mut launches: Local<u32>,
    mut launched: EventReader<BallLaunched>,
    balls: Query<(&Transform, Option<&Velocity>), With<Ball>>,
    cameras: Query<(&GlobalTransform, &ChaseCamera)>,
) {
    *launches += launched.read().count() as u32;
    *since += time.delta_secs();
    if *since < LOG_EVERY_SECS {
        return;
    }
    *since = 0.0;
    for (transform, velocity) in balls.iter() {
        let speed = velocity.map(|v| v.linvel.length()).unwrap_or(0.0);
        info!(
            "ball at {:.2?} speed {speed:.2} launches={}",
            transform.translation, *launches
        );
    }
    for (global, chase) in cameras.iter() {
        info!(
            "camera at {:.2?} following={} zoom={:.3}",
            global.translation(),
            chase.following,
            chase.zoom
        );
    }
}

pub struct AutoplayPlugin {
    pub delay_secs: f32,
}

impl AutoplayPlugin {
    /// Delay comes from `AUTO_LAUNCH_SECS`, 1.5 s when unset or unparsable.
    pub fn from_env() -> Self {
        let delay_secs = std::env::var("AUTO_LAUNCH_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|d: &f32| *d >= 0.0)
            .unwrap_or(1.5);
        Self { delay_secs }
    }
}

impl Plugin for AutoplayPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(AutoLaunch::new(self.delay_secs, 0.0))
            .add_systems(Startup, pick_auto_aim)
            .add_systems(PreUpdate, steer_and_launch.after(update_horizontal_axis))
            .add_systems(Update, rig_logger);
    }
}

use bevy::{
    color::Color,
    math::Isometry3d,
    prelude::{
        App, ChildOf, Component, Entity, GlobalTransform, Gizmos, Plugin, PostUpdate, Query, Res,
        Time, Transform, TransformSystem, Update, Vec3, With, Without, debug, info, IntoScheduleConfigs,
    },
};
use bevy_rapier3d::prelude::{CollisionGroups, Group, QueryFilter, RapierContext, ReadRapierContext, Velocity};

use crate::{
    ball::Ball,
    smoothing::{inverse_lerp_clamped, lerp_clamped, slerp_clamped, smooth_damp},
    tuning::RigTuning,
};

/// Height above the target the occlusion ray starts from.
pub const FOCUS_HEIGHT: f32 = 0.5;
/// Height above the target the camera aims at.
pub const LOOK_HEIGHT: f32 = 1.0;
/// Below this squared speed the target counts as stationary and its facing is used.
const MOVING_SPEED_SQ: f32 = 0.001;

/// Third-person camera that trails a target along its direction of travel.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct ChaseCamera {
    /// Entity to follow. Resolved to the first `Ball` when left empty.
    pub target: Option<Entity>,
    /// x lateral, y height, z distance (sign ignored, always placed behind).
    pub offset: Vec3,
    pub position_smooth_time: f32,
    pub rotation_sharpness: f32,
    /// Wait until the target moves faster than `follow_speed_threshold` before following.
    pub follow_on_move: bool,
    pub follow_speed_threshold: f32,
    /// Maximum pull-back multiplier reached at high target speed.
    pub launch_zoom: f32,
    pub zoom_rate: f32,
    /// Collision group bits treated as view blockers.
    pub obstacle_layers: u32,
    pub obstacle_clearance: f32,

    pub following: bool,
    pub zoom: f32,
    pub smooth_velocity: Vec3,
}

impl Default for ChaseCamera {
    fn default() -> Self {
        Self {
            target: None,
            offset: Vec3::new(0.0, 3.0, -7.0),
            position_smooth_time: 0.12,
            rotation_sharpness: 8.0,
            follow_on_move: true,
            follow_speed_threshold: 0.5,
            launch_zoom: 1.25,
            zoom_rate: 2.0,
            obstacle_layers: u32::MAX,
            obstacle_clearance: 0.15,
            following: false,
            zoom: 1.0,
            smooth_velocity: Vec3::ZERO,
        }
    }
}

/// Snapshot of the followed entity for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetState {
    pub position: Vec3,
    pub forward: Vec3,
    pub right: Vec3,
    pub velocity: Option<Vec3>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SightHit {
    pub point: Vec3,
    pub normal: Vec3,
}

/// Segment query used to keep the camera from ending up behind geometry.
pub trait LineOfSight {
    /// First surface hit on the segment `from -> to`, if any.
    fn linecast(&self, from: Vec3, to: Vec3) -> Option<SightHit>;
}

pub struct NoObstacles;

impl LineOfSight for NoObstacles {
    fn linecast(&self, _from: Vec3, _to: Vec3) -> Option<SightHit> {
        None
    }
}

pub struct RapierLineOfSight<'c, 'w> {
    context: &'c RapierContext<'w>,
    groups: CollisionGroups,
    exclude: Entity,
}

impl<'c, 'w> RapierLineOfSight<'c, 'w> {
    pub fn new(context: &'c RapierContext<'w>, layers: u32, exclude: Entity) -> Self {
        Self {
            context,
            groups: CollisionGroups::new(Group::ALL, Group::from_bits_truncate(layers)),
            exclude,
        }
    }
}

impl LineOfSight for RapierLineOfSight<'_, '_> {
    fn linecast(&self, from: Vec3, to: Vec3) -> Option<SightHit> {
        let ray = to - from;
        let length = ray.length();
        if length <= f32::EPSILON {
            return None;
        }
        let filter = QueryFilter::default()
            .groups(self.groups)
            .exclude_rigid_body(self.exclude);
        let (_, hit) = self
            .context
            .cast_ray_and_get_normal(from, ray / length, length, true, filter)?;
        Some(SightHit { point: hit.point, normal: hit.normal })
    }
}

impl ChaseCamera {
    pub fn start_following(&mut self) {
        self.following = true;
    }

    pub fn stop_following(&mut self) {
        self.following = false;
        self.zoom = 1.0;
        self.smooth_velocity = Vec3::ZERO;
    }

    fn should_start(&self, speed: Option<f32>) -> bool {
        !self.follow_on_move || speed.is_some_and(|s| s > self.follow_speed_threshold)
    }

    /// Offset from the target before zoom is applied.
    pub fn nominal_offset(&self, travel_dir: Vec3, right: Vec3) -> Vec3 {
        -travel_dir * self.offset.z.abs() + Vec3::Y * self.offset.y + right * self.offset.x
    }

    pub fn travel_direction(target: &TargetState) -> Vec3 {
        match target.velocity {
            Some(v) if v.length_squared() > MOVING_SPEED_SQ => v.normalize(),
            _ => target.forward,
        }
    }

    pub fn desired_position(&self, target: &TargetState) -> Vec3 {
        let dir = Self::travel_direction(target);
        target.position + self.nominal_offset(dir, target.right) * self.zoom
    }

    /// Zoom the camera should settle at for the given target speed.
    pub fn target_zoom(&self, speed: Option<f32>) -> f32 {
        let Some(speed) = speed else {
            return 1.0;
        };
        let threshold = self.follow_speed_threshold;
        let span = threshold * 4.0;
        let t = if span > f32::EPSILON {
            inverse_lerp_clamped(threshold, threshold + span, speed)
        } else if speed > threshold {
            1.0
        } else {
            0.0
        };
        lerp_clamped(1.0, self.launch_zoom, t)
    }

    /// Advances the rig by one frame and returns the new world pose, or `None` while idle.
    pub fn step(
        &mut self,
        current: Transform,
        target: &TargetState,
        sight: &impl LineOfSight,
        dt: f32,
    ) -> Option<Transform> {
        let speed = target.velocity.map(|v| v.length());
        if !self.following && self.should_start(speed) {
            self.following = true;
        }
        if !self.following {
            return None;
        }

        let mut desired = self.desired_position(target);
        let focus = target.position + Vec3::Y * FOCUS_HEIGHT;
        if let Some(hit) = sight.linecast(focus, desired) {
            debug!("chase camera occluded at {:.2?}", hit.point);
            desired = hit.point + hit.normal * self.obstacle_clearance;
        }

        let mut next = current;
        next.translation = smooth_damp(
            current.translation,
            desired,
            &mut self.smooth_velocity,
            self.position_smooth_time,
            dt,
        );

        let look = target.position + Vec3::Y * LOOK_HEIGHT - next.translation;
        if look.length_squared() > f32::EPSILON {
            let wanted = Transform::IDENTITY.looking_to(look, Vec3::Y).rotation;
            next.rotation = slerp_clamped(current.rotation, wanted, dt * self.rotation_sharpness);
        }

        let target_zoom = self.target_zoom(speed);
        self.zoom = lerp_clamped(self.zoom, target_zoom, dt * self.zoom_rate);
        Some(next)
    }
}

pub fn resolve_chase_targets(
    mut cameras: Query<(Entity, &mut ChaseCamera)>,
    balls: Query<Entity, With<Ball>>,
) {
    for (camera, mut chase) in cameras.iter_mut() {
        if chase.target.is_some() {
            continue;
        }
        if let Some(ball) = balls.iter().next() {
            info!("chase camera {camera} now targets ball {ball}");
            chase.target = Some(ball);
        }
    }
}

// Runs after transform propagation, so the target pose is final for this frame.
// The camera's GlobalTransform is written directly and its local Transform is
// rebuilt against the parent, which may be the ball itself after launch.
pub fn follow_target(
    time: Res<Time>,
    rapier: ReadRapierContext,
    mut cameras: Query<(&mut ChaseCamera, &mut Transform, &mut GlobalTransform, Option<&ChildOf>)>,
    targets: Query<(&GlobalTransform, Option<&Velocity>), Without<ChaseCamera>>,
    parents: Query<&GlobalTransform, Without<ChaseCamera>>,
) {
    let dt = time.delta_secs();
    let context = rapier.single().ok();

    for (mut chase, mut transform, mut global, child_of) in cameras.iter_mut() {
        let Some(target_entity) = chase.target else {
            continue;
        };
        let Ok((target_global, velocity)) = targets.get(target_entity) else {
            continue;
        };
        let target = TargetState {
            position: target_global.translation(),
            forward: *target_global.forward(),
            right: *target_global.right(),
            velocity: velocity.map(|v| v.linvel),
        };
        let current = global.compute_transform();
        let layers = chase.obstacle_layers;

        let next = match &context {
            Some(ctx) => chase.step(current, &target, &RapierLineOfSight::new(ctx, layers, target_entity), dt),
            None => chase.step(current, &target, &NoObstacles, dt),
        };
        let Some(world) = next else {
            continue;
        };

        let world_global = GlobalTransform::from(world);
        let local = match child_of {
            Some(child_of) => match parents.get(child_of.parent()) {
                Ok(parent_global) => world_global.reparented_to(parent_global),
                // No parent pose to express the local transform against.
                Err(_) => continue,
            },
            None => world,
        };
        *global = world_global;
        *transform = local;
    }
}

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            PostUpdate,
            (resolve_chase_targets, follow_target)
                .chain()
                .after(TransformSystem::TransformPropagate),
        );
    }
}

const GIZMO_COLOR: Color = Color::srgb(0.0, 1.0, 1.0);

/// Draws each chase camera's un-zoomed resting offset from its target.
pub fn draw_chase_gizmos(
    mut gizmos: Gizmos,
    tuning: Res<RigTuning>,
    cameras: Query<&ChaseCamera>,
    targets: Query<&GlobalTransform>,
) {
    if !tuning.show_gizmos {
        return;
    }
    for chase in cameras.iter() {
        let Some(target_entity) = chase.target else {
            continue;
        };
        let Ok(target) = targets.get(target_entity) else {
            continue;
        };
        let origin = target.translation();
        let tip = origin + chase.nominal_offset(*target.forward(), *target.right());
        gizmos.line(origin, tip, GIZMO_COLOR);
        gizmos.sphere(Isometry3d::from_translation(tip), 0.08, GIZMO_COLOR);
    }
}

pub struct ChaseGizmosPlugin;

impl Plugin for ChaseGizmosPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, draw_chase_gizmos);
    }
}

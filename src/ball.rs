use bevy::{
    input::InputSystem,
    prelude::{
        App, BuildChildrenTransformExt, ButtonInput, Commands, Component, Entity, Event, EventReader,
        EventWriter, IntoScheduleConfigs, KeyCode, Plugin, PreUpdate, Query, Res, Time, Transform, Update,
        Vec3, With, info,
    },
};
use bevy_rapier3d::prelude::{ExternalImpulse, Velocity};

use crate::{
    camera::ChaseCamera,
    input::{update_horizontal_axis, HorizontalAxis},
    shared_consts::FORCE_STEP_SECS,
};

/// Tag for the entity chase cameras look for when they have no explicit target.
#[derive(Debug, Default, Clone, Copy, PartialEq, Component)]
pub struct Ball;

/// Transform an entity is put back to when the lane is reset.
#[derive(Debug, Clone, Copy, PartialEq, Component)]
pub struct RestPose(pub Transform);

#[derive(Debug, Clone, Copy, PartialEq, Component)]
pub struct BallController {
    pub aim_speed: f32,
    pub left_limit: f32,
    pub right_limit: f32,
    pub launch_force: f32,
    /// Camera transform that gets parented to the ball on launch.
    pub camera_rig: Option<Entity>,
    /// Camera told to start following on launch.
    pub chase_camera: Option<Entity>,
    pub launched: bool,
}

impl Default for BallController {
    fn default() -> Self {
        Self {
            aim_speed: 5.0,
            left_limit: -2.0,
            right_limit: 2.0,
            launch_force: 1000.0,
            camera_rig: None,
            chase_camera: None,
            launched: false,
        }
    }
}

impl BallController {
    // Written as max/min so inverted limits pin to `right_limit` instead of panicking.
    pub fn clamp_lateral(&self, x: f32) -> f32 {
        x.max(self.left_limit).min(self.right_limit)
    }

    /// Slides `transform` along its local right by the axis reading, then clamps world x.
    pub fn aim(&self, transform: &mut Transform, axis: f32, dt: f32) {
        let right = transform.right();
        transform.translation += right * (axis * self.aim_speed * dt);
        transform.translation.x = self.clamp_lateral(transform.translation.x);
    }

    pub fn launch_impulse(&self) -> Vec3 {
        Vec3::NEG_Z * self.launch_force * FORCE_STEP_SECS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Event)]
pub struct BallLaunched {
    pub ball: Entity,
    pub impulse: Vec3,
}

/// Launch without a key press. Used by autoplay.
#[derive(Debug, Clone, Copy, Default, Event)]
pub struct LaunchRequested;

pub fn aim_and_launch(
    mut commands: Commands,
    keys: Res<ButtonInput<KeyCode>>,
    axis: Res<HorizontalAxis>,
    time: Res<Time>,
    mut requests: EventReader<LaunchRequested>,
    mut launched: EventWriter<BallLaunched>,
    mut balls: Query<(Entity, &mut BallController, &mut Transform, Option<&mut ExternalImpulse>), With<Ball>>,
    mut cameras: Query<&mut ChaseCamera>,
) {
    let requested = requests.read().count() > 0;
    let trigger = requested || keys.just_pressed(KeyCode::Space);
    let dt = time.delta_secs();

    for (ball, mut controller, mut transform, impulse) in balls.iter_mut() {
        if controller.launched {
            continue;
        }
        let reading = axis.get();
        if reading != 0.0 {
            controller.aim(&mut transform, reading, dt);
        }
        if !trigger {
            continue;
        }

        controller.launched = true;
        let applied = controller.launch_impulse();
        if let Some(mut external) = impulse {
            external.impulse += applied;
        }
        if let Some(rig) = controller.camera_rig {
            if let Ok(mut rig_commands) = commands.get_entity(rig) {
                rig_commands.set_parent_in_place(ball);
            }
        }
        if let Some(camera) = controller.chase_camera {
            if let Ok(mut chase) = cameras.get_mut(camera) {
                chase.start_following();
            }
        }

        info!(
            "ball {ball} launched from x={:.2} with impulse {:.1}",
            transform.translation.x,
            applied.length()
        );
        launched.write(BallLaunched { ball, impulse: applied });
    }
}

pub fn reset_lane(
    mut commands: Commands,
    keys: Res<ButtonInput<KeyCode>>,
    mut balls: Query<
        (
            Entity,
            &mut BallController,
            &mut Transform,
            Option<&RestPose>,
            Option<&mut Velocity>,
            Option<&mut ExternalImpulse>,
        ),
        With<Ball>,
    >,
    rest_poses: Query<&RestPose>,
    mut cameras: Query<&mut ChaseCamera>,
) {
    if !keys.just_pressed(KeyCode::KeyR) {
        return;
    }

    for (ball, mut controller, mut transform, rest, velocity, impulse) in balls.iter_mut() {
        if !controller.launched {
            continue;
        }
        controller.launched = false;
        if let Some(rest) = rest {
            *transform = rest.0;
        }
        if let Some(mut velocity) = velocity {
            *velocity = Velocity::zero();
        }
        if let Some(mut impulse) = impulse {
            *impulse = ExternalImpulse::default();
        }

        if let Some(rig) = controller.camera_rig {
            if let Ok(mut rig_commands) = commands.get_entity(rig) {
                rig_commands.remove_parent_in_place();
                if let Ok(rest) = rest_poses.get(rig) {
                    rig_commands.insert(rest.0);
                }
            }
        }
        if let Some(camera) = controller.chase_camera {
            if let Ok(mut chase) = cameras.get_mut(camera) {
                chase.stop_following();
            }
        }
        info!("ball {ball} reset to the foul line");
    }
}

pub struct BallPlugin;

impl Plugin for BallPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<HorizontalAxis>()
            .add_event::<BallLaunched>()
            .add_event::<LaunchRequested>()
            .add_systems(PreUpdate, update_horizontal_axis.after(InputSystem))
            .add_systems(Update, (aim_and_launch, reset_lane).chain());
    }
}

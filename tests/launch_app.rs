use std::time::Duration;

use bevy::ecs::event::{EventCursor, Events};
use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use bevy_rapier3d::prelude::{ExternalImpulse, Velocity};

use bowling_chase::{
    ball::{Ball, BallController, BallLaunched, BallPlugin, RestPose},
    camera::{CameraPlugin, ChaseCamera},
};

const FRAME: Duration = Duration::from_millis(20);

struct Lane {
    app: App,
    ball: Entity,
    camera: Entity,
}

impl Lane {
    fn new() -> Self {
        let mut app = App::new();
        app.add_plugins((MinimalPlugins, TransformPlugin, BallPlugin, CameraPlugin));
        // Driven by hand; no InputPlugin so presses survive until the next update.
        app.init_resource::<ButtonInput<KeyCode>>();
        app.insert_resource(TimeUpdateStrategy::ManualDuration(FRAME));

        let camera_pose = Transform::from_xyz(0.0, 1.6, 4.0).looking_at(Vec3::ZERO, Vec3::Y);
        let camera = app
            .world_mut()
            .spawn((camera_pose, RestPose(camera_pose), ChaseCamera::default()))
            .id();
        let ball_pose = Transform::from_xyz(0.0, 0.12, 0.0);
        let ball = app
            .world_mut()
            .spawn((
                Ball,
                BallController { camera_rig: Some(camera), chase_camera: Some(camera), ..default() },
                ball_pose,
                RestPose(ball_pose),
                Velocity::zero(),
                ExternalImpulse::default(),
            ))
            .id();

        // First update only primes the clock.
        app.update();
        Self { app, ball, camera }
    }

    fn keys(&mut self) -> Mut<'_, ButtonInput<KeyCode>> {
        self.app.world_mut().resource_mut::<ButtonInput<KeyCode>>()
    }

    fn tap(&mut self, key: KeyCode) {
        self.keys().press(key);
        self.app.update();
        let mut keys = self.keys();
        keys.release(key);
        keys.clear();
    }

    fn run(&mut self, frames: usize) {
        for _ in 0..frames {
            self.app.update();
        }
    }

    fn controller(&self) -> BallController {
        *self.app.world().get::<BallController>(self.ball).unwrap()
    }

    fn chase(&self) -> ChaseCamera {
        self.app.world().get::<ChaseCamera>(self.camera).unwrap().clone()
    }

    fn ball_translation(&self) -> Vec3 {
        self.app.world().get::<Transform>(self.ball).unwrap().translation
    }

    fn launches(&self, cursor: &mut EventCursor<BallLaunched>) -> Vec<BallLaunched> {
        cursor.read(self.app.world().resource::<Events<BallLaunched>>()).copied().collect()
    }

    fn launch_cursor(&self) -> EventCursor<BallLaunched> {
        self.app.world().resource::<Events<BallLaunched>>().get_cursor_current()
    }
}

#[test]
fn aiming_is_clamped_to_the_lane_limits() {
    let mut lane = Lane::new();

    lane.keys().press(KeyCode::KeyD);
    lane.run(100);
    assert_eq!(lane.ball_translation().x, 2.0);

    lane.keys().release(KeyCode::KeyD);
    lane.keys().press(KeyCode::ArrowLeft);
    lane.run(200);
    assert_eq!(lane.ball_translation().x, -2.0);
    assert!(!lane.controller().launched);
}

#[test]
fn launch_applies_impulse_parents_camera_and_starts_following() {
    let mut lane = Lane::new();
    let mut cursor = lane.launch_cursor();
    lane.tap(KeyCode::Space);

    assert!(lane.controller().launched);
    let impulse = lane.app.world().get::<ExternalImpulse>(lane.ball).unwrap().impulse;
    assert!((impulse - Vec3::new(0.0, 0.0, -20.0)).length() < 1e-4);
    assert_eq!(lane.app.world().get::<ChildOf>(lane.camera).map(|c| c.parent()), Some(lane.ball));
    assert!(lane.chase().following);
    let sent = lane.launches(&mut cursor);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].ball, lane.ball);
    assert!((sent[0].impulse - Vec3::new(0.0, 0.0, -20.0)).length() < 1e-4);

    // A second press after launch neither re-aims nor re-fires.
    lane.keys().press(KeyCode::KeyD);
    lane.tap(KeyCode::Space);
    let impulse = lane.app.world().get::<ExternalImpulse>(lane.ball).unwrap().impulse;
    assert!((impulse - Vec3::new(0.0, 0.0, -20.0)).length() < 1e-4);
    assert_eq!(lane.ball_translation().x, 0.0);
    assert!(lane.launches(&mut cursor).is_empty());
}

#[test]
fn launch_skips_missing_impulse_rig_and_camera() {
    let mut lane = Lane::new();
    let gone = lane.app.world_mut().spawn(Transform::default()).id();
    lane.app.world_mut().despawn(gone);
    let bare = lane
        .app
        .world_mut()
        .spawn((
            Ball,
            BallController { camera_rig: Some(gone), chase_camera: Some(gone), ..default() },
            Transform::from_xyz(1.0, 0.12, 0.0),
        ))
        .id();
    let loose = lane
        .app
        .world_mut()
        .spawn((Ball, BallController::default(), Transform::from_xyz(-1.0, 0.12, 0.0)))
        .id();
    lane.app.update();

    let mut cursor = lane.launch_cursor();
    lane.tap(KeyCode::Space);

    let world = lane.app.world();
    assert!(world.get::<BallController>(bare).unwrap().launched);
    assert!(world.get::<BallController>(loose).unwrap().launched);
    assert!(world.get::<ExternalImpulse>(bare).is_none());
    assert!(world.get_entity(gone).is_err());

    let mut launched: Vec<Entity> = lane.launches(&mut cursor).into_iter().map(|e| e.ball).collect();
    launched.sort();
    let mut expected = vec![lane.ball, bare, loose];
    expected.sort();
    assert_eq!(launched, expected);

    // The fully wired ball still gets its camera.
    assert_eq!(lane.app.world().get::<ChildOf>(lane.camera).map(|c| c.parent()), Some(lane.ball));
}

#[test]
fn camera_under_a_parent_without_a_pose_is_left_alone() {
    let mut lane = Lane::new();
    let mount = lane.app.world_mut().spawn_empty().id();
    let pose = Transform::from_xyz(0.5, 2.0, 3.0);
    let camera = lane
        .app
        .world_mut()
        .spawn((
            pose,
            ChaseCamera { target: Some(lane.ball), follow_on_move: false, ..default() },
            ChildOf(mount),
        ))
        .id();

    lane.run(5);

    let world = lane.app.world();
    assert!(world.get::<ChaseCamera>(camera).unwrap().following);
    assert_eq!(*world.get::<Transform>(camera).unwrap(), pose);
}

#[test]
fn camera_trails_a_rolling_ball_and_zooms_out() {
    let mut lane = Lane::new();
    lane.tap(KeyCode::Space);

    let velocity = Vec3::new(0.0, 0.0, -5.0);
    for _ in 0..200 {
        let world = lane.app.world_mut();
        world.get_mut::<Velocity>(lane.ball).unwrap().linvel = velocity;
        world.get_mut::<Transform>(lane.ball).unwrap().translation += velocity * FRAME.as_secs_f32();
        lane.app.update();
    }

    let ball = lane.ball_translation();
    let world = lane.app.world();
    let camera_global = world.get::<GlobalTransform>(lane.camera).unwrap().translation();
    let behind = camera_global - ball;
    assert!(behind.z > 7.0 && behind.z < 10.5, "behind = {behind:?}");
    assert!(behind.y > 2.9 && behind.y < 4.0, "behind = {behind:?}");
    assert!(behind.x.abs() < 1e-3);

    let chase = lane.chase();
    assert!((chase.zoom - 1.25).abs() < 0.01);

    // Local transform is expressed relative to the ball it is parented to.
    let local = world.get::<Transform>(lane.camera).unwrap().translation;
    assert!((local - behind).length() < 1e-3);
}

#[test]
fn reset_restores_rest_poses_and_stops_following() {
    let mut lane = Lane::new();
    lane.keys().press(KeyCode::KeyA);
    lane.run(10);
    lane.keys().release(KeyCode::KeyA);
    lane.tap(KeyCode::Space);

    lane.app.world_mut().get_mut::<Transform>(lane.ball).unwrap().translation.z = -6.0;
    lane.app.world_mut().get_mut::<Velocity>(lane.ball).unwrap().linvel = Vec3::NEG_Z * 4.0;
    lane.run(5);

    lane.tap(KeyCode::KeyR);

    assert!(!lane.controller().launched);
    assert_eq!(lane.ball_translation(), Vec3::new(0.0, 0.12, 0.0));
    assert_eq!(lane.app.world().get::<Velocity>(lane.ball).unwrap().linvel, Vec3::ZERO);
    assert!(lane.app.world().get::<ChildOf>(lane.camera).is_none());
    let rest = lane.app.world().get::<RestPose>(lane.camera).unwrap().0;
    assert_eq!(*lane.app.world().get::<Transform>(lane.camera).unwrap(), rest);
    let chase = lane.chase();
    assert!(!chase.following);
    assert_eq!(chase.zoom, 1.0);

    // The ball is at rest, so the gated camera stays put.
    lane.run(5);
    assert!(!lane.chase().following);
    assert_eq!(*lane.app.world().get::<Transform>(lane.camera).unwrap(), rest);
}

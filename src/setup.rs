use bevy::{
    math::primitives::{Cuboid, Cylinder, Sphere},
    pbr::{AmbientLight, DirectionalLight, MeshMaterial3d, StandardMaterial},
    prelude::{
        default, App, Assets, Camera3d, Color, Commands, Mesh, Mesh3d, Plugin, ResMut, Startup, Transform, Vec3,
    },
};
use bevy_rapier3d::prelude::{
    Ccd, Collider, ColliderMassProperties, ExternalImpulse, Friction, NoUserData, RapierDebugRenderPlugin,
    RapierPhysicsPlugin, Restitution, RigidBody, Velocity,
};

use crate::{
    ball::{Ball, BallController, RestPose},
    camera::ChaseCamera,
    shared_consts::{
        BACK_WALL_HEIGHT, BALL_MASS, BALL_RADIUS, BALL_START, CAMERA_START, GUTTER_WALL_HEIGHT, HEAD_PIN_Z,
        LANE_HALF_WIDTH, LANE_LENGTH, LANE_THICKNESS, PIN_HALF_HEIGHT, PIN_RADIUS, PIN_SPACING,
    },
};

// The lane starts a little behind the foul line so the ball has ground to aim on.
const APPROACH: f32 = 2.0;
const WALL_THICKNESS: f32 = 0.1;

pub fn setup_lights(mut commands: Commands) {
    commands.insert_resource(AmbientLight { brightness: 300.0, ..default() });
    commands.spawn((
        DirectionalLight { illuminance: 8_000.0, shadows_enabled: true, ..default() },
        Transform::from_xyz(4.0, 10.0, 6.0).looking_at(Vec3::new(0.0, 0.0, -8.0), Vec3::Y),
    ));
}

fn spawn_fixed_box(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    material: &bevy::asset::Handle<StandardMaterial>,
    half_extents: Vec3,
    at: Vec3,
) {
    commands.spawn((
        Mesh3d(meshes.add(Cuboid::from_size(half_extents * 2.0))),
        MeshMaterial3d(material.clone()),
        Transform::from_translation(at),
        RigidBody::Fixed,
        Collider::cuboid(half_extents.x, half_extents.y, half_extents.z),
        Friction::coefficient(0.2),
    ));
}

pub fn setup_lane(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let wood = materials.add(StandardMaterial { base_color: Color::srgb(0.78, 0.6, 0.38), ..default() });
    let rail = materials.add(StandardMaterial { base_color: Color::srgb(0.2, 0.2, 0.24), ..default() });

    let half_length = (LANE_LENGTH + APPROACH) / 2.0;
    let center_z = APPROACH - half_length;

    // Floor
    spawn_fixed_box(
        &mut commands,
        &mut meshes,
        &wood,
        Vec3::new(LANE_HALF_WIDTH, LANE_THICKNESS / 2.0, half_length),
        Vec3::new(0.0, -LANE_THICKNESS / 2.0, center_z),
    );
    // Gutter walls
    for side in [-1.0, 1.0] {
        spawn_fixed_box(
            &mut commands,
            &mut meshes,
            &rail,
            Vec3::new(WALL_THICKNESS / 2.0, GUTTER_WALL_HEIGHT / 2.0, half_length),
            Vec3::new(side * (LANE_HALF_WIDTH + WALL_THICKNESS / 2.0), GUTTER_WALL_HEIGHT / 2.0, center_z),
        );
    }
    // Back wall
    spawn_fixed_box(
        &mut commands,
        &mut meshes,
        &rail,
        Vec3::new(LANE_HALF_WIDTH + WALL_THICKNESS, BACK_WALL_HEIGHT / 2.0, WALL_THICKNESS / 2.0),
        Vec3::new(0.0, BACK_WALL_HEIGHT / 2.0, -LANE_LENGTH - WALL_THICKNESS / 2.0),
    );
}

/// Ten pins in the usual four-row triangle, head pin nearest the ball.
pub fn pin_positions() -> Vec<Vec3> {
    let row_depth = PIN_SPACING * 0.866;
    (0..4)
        .flat_map(|row| {
            (0..=row).map(move |i| {
                Vec3::new(
                    (i as f32 - row as f32 / 2.0) * PIN_SPACING,
                    PIN_HALF_HEIGHT,
                    HEAD_PIN_Z - row as f32 * row_depth,
                )
            })
        })
        .collect()
}

pub fn setup_pins(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let mesh = meshes.add(Cylinder::new(PIN_RADIUS, PIN_HALF_HEIGHT * 2.0));
    let material = materials.add(StandardMaterial { base_color: Color::srgb(0.95, 0.95, 0.92), ..default() });
    for position in pin_positions() {
        commands.spawn((
            Mesh3d(mesh.clone()),
            MeshMaterial3d(material.clone()),
            Transform::from_translation(position),
            RigidBody::Dynamic,
            Collider::cylinder(PIN_HALF_HEIGHT, PIN_RADIUS),
            ColliderMassProperties::Mass(0.4),
            Restitution::coefficient(0.4),
        ));
    }
}

pub fn setup_rig(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let (cx, cy, cz) = CAMERA_START;
    let camera_pose = Transform::from_xyz(cx, cy, cz).looking_at(Vec3::new(0.0, 0.3, -6.0), Vec3::Y);
    // Target is left empty and resolved to the tagged ball.
    let camera = commands
        .spawn((Camera3d::default(), camera_pose, RestPose(camera_pose), ChaseCamera::default()))
        .id();

    let (bx, by, bz) = BALL_START;
    let ball_pose = Transform::from_xyz(bx, by, bz);
    commands.spawn((
        Ball,
        BallController { camera_rig: Some(camera), chase_camera: Some(camera), ..default() },
        RestPose(ball_pose),
        ball_pose,
        Mesh3d(meshes.add(Sphere::new(BALL_RADIUS))),
        MeshMaterial3d(materials.add(StandardMaterial { base_color: Color::srgb(0.15, 0.2, 0.7), ..default() })),
        RigidBody::Dynamic,
        Collider::ball(BALL_RADIUS),
        ColliderMassProperties::Mass(BALL_MASS),
        Friction::coefficient(0.2),
        Restitution::coefficient(0.1),
        Velocity::zero(),
        ExternalImpulse::default(),
        Ccd::enabled(),
    ));
}

pub struct SetupPlugin {
    pub physics_debug: bool,
}

impl Plugin for SetupPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(RapierPhysicsPlugin::<NoUserData>::default());
        if self.physics_debug {
            app.add_plugins(RapierDebugRenderPlugin::default());
        }
        app.add_systems(Startup, (setup_lights, setup_lane, setup_pins, setup_rig));
    }
}

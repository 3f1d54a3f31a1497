//! Scene setup: camera, lighting

use bevy::prelude::*;

use crate::camera::MainCamera;

pub struct SceneSetupPlugin;

impl Plugin for SceneSetupPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_scene);
    }
}

fn setup_scene(mut commands: Commands) {
    commands.spawn((
        Camera3d { ..default() },
        Projection::Perspective(PerspectiveProjection {
            near: 0.001,
            far: 1000.0,
            ..default()
        }),
        Transform::from_xyz(1.5, 1.0, 2.0).looking_at(Vec3::ZERO, Vec3::Y),
        MainCamera,
    ));

    // Soft, slightly cool ambient so dimmed tissue stays readable
    commands.insert_resource(AmbientLight {
        color: Color::srgb(0.9, 0.95, 1.0),
        brightness: 300.0,
        ..default()
    });

    // Key light
    commands.spawn((
        DirectionalLight {
            illuminance: 6000.0,
            shadows_enabled: false,
            ..default()
        },
        Transform::from_xyz(2.0, 4.0, 2.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    // Warm fill from the opposite side
    commands.spawn((
        PointLight {
            intensity: 120000.0,
            shadows_enabled: false,
            color: Color::srgb(1.0, 0.95, 0.9),
            ..default()
        },
        Transform::from_xyz(-2.0, 1.0, -2.0),
    ));
}

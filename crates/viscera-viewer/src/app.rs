//! Bevy application setup

use bevy::prelude::*;
use bevy::winit::WinitSettings;
use bevy_egui::EguiPlugin;
use bevy_picking::{prelude::MeshPickingPlugin, DefaultPickingPlugins};

use viscera_core::{InferenceResult, Organ};
use viscera_scene::VisceraScenePlugin;

use crate::file_picker::FilePickerPlugin;
use crate::network::{BackendConfig, NetworkPlugin};
use crate::ui::UiPlugin;

/// The organ and disease chosen in the UI.
#[derive(Debug, Clone, Resource, Default)]
pub struct Selection {
    pub organ: Option<Organ>,
    pub disease: Option<String>,
}

/// Outcome of the most recent analysis request.
#[derive(Resource, Default)]
pub struct AnalysisState {
    pub in_flight: bool,
    pub result: Option<InferenceResult>,
    /// Pretty-printed response for the raw view.
    pub raw: Option<String>,
    pub error: Option<String>,
}

pub fn run() {
    App::new()
        .insert_resource(ClearColor(Color::srgb(0.08, 0.09, 0.12)))
        .insert_resource(WinitSettings::default())
        .insert_resource(BackendConfig::from_browser())
        .add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: "Viscera Viewer".to_string(),
                        canvas: Some("#viewer-canvas".to_string()),
                        fit_canvas_to_parent: true,
                        prevent_default_event_handling: false,
                        ..default()
                    }),
                    ..default()
                })
                .set(AssetPlugin {
                    // Models are served from the site root
                    file_path: "".to_string(),
                    // Don't look for .meta files - server doesn't have them
                    meta_check: bevy::asset::AssetMetaCheck::Never,
                    ..default()
                }),
        )
        // DefaultPickingPlugins and MeshPickingPlugin must be added BEFORE
        // EguiPlugin so it can detect PickingPlugin
        .add_plugins(DefaultPickingPlugins)
        .add_plugins(MeshPickingPlugin)
        .add_plugins(EguiPlugin::default())
        .init_resource::<Selection>()
        .init_resource::<AnalysisState>()
        .add_plugins(VisceraScenePlugin)
        .add_plugins(FilePickerPlugin)
        .add_plugins(NetworkPlugin)
        .add_plugins(UiPlugin)
        .run();
}

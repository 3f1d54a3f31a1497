//! Viscera Scene - 3D organ model rendering and highlighting
//!
//! This crate owns everything that touches the renderer: loading glTF
//! organ models, cataloguing their named nodes and meshes, applying
//! highlight passes to materials, orbit camera controls, and
//! click-to-inspect.

pub mod adapter;
pub mod camera;
pub mod highlight;
pub mod inspect;
pub mod scene;

use bevy::prelude::*;

/// Plugin bundling the full scene stack.
pub struct VisceraScenePlugin;

impl Plugin for VisceraScenePlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(camera::CameraPlugin)
            .add_plugins(scene::SceneSetupPlugin)
            .add_plugins(highlight::HighlightPlugin)
            .add_plugins(adapter::AdapterPlugin)
            .add_plugins(inspect::InspectPlugin);
    }
}

pub use adapter::{LoadOrganModel, MeshNodeName, NodeCatalog, OrganModel};
pub use camera::{CameraSettings, MainCamera};
pub use highlight::{
    CurrentScores, HighlightSettings, MappingState, PendingScores, ResolutionDiagnostics,
    SelectionParams,
};
pub use inspect::{InspectHit, InspectState, ReverseMappingIndex};

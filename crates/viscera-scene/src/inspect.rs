//! Click-to-inspect: attribute a clicked mesh to its region
//!
//! Clicking a part of the model reports which named node it belongs to and
//! the best-scoring region mapped onto that node. Inspection is read-only;
//! it never alters the highlight state.

use std::collections::HashMap;

use bevy::prelude::*;
use bevy_picking::mesh_picking::ray_cast::{MeshRayCast, MeshRayCastSettings};

use viscera_core::{best_region_for_node, reverse_index, RegionId};

use crate::adapter::NodeCatalog;
use crate::camera::MainCamera;
use crate::highlight::{CurrentScores, MappingState};

/// What the last click landed on.
#[derive(Debug, Clone)]
pub struct InspectHit {
    /// Name of the owning node, if the part sits under a named node.
    pub node_name: Option<String>,
    /// Best-scoring region mapped onto that node.
    pub region: Option<(RegionId, f64)>,
}

#[derive(Resource, Default)]
pub struct InspectState {
    pub hit: Option<InspectHit>,
}

impl InspectState {
    pub fn clear(&mut self) {
        self.hit = None;
    }
}

/// Node name to regions, inverted from the active mapping table through
/// the current node catalog.
#[derive(Resource, Default)]
pub struct ReverseMappingIndex {
    pub generation: u64,
    pub map: HashMap<String, Vec<RegionId>>,
}

/// Track touch state for tap detection
#[derive(Resource, Default)]
pub struct TouchState {
    start_position: Option<Vec2>,
    is_dragging: bool,
}

pub struct InspectPlugin;

impl Plugin for InspectPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<InspectState>()
            .init_resource::<ReverseMappingIndex>()
            .init_resource::<TouchState>()
            .add_systems(
                Update,
                (
                    rebuild_reverse_index.after(crate::adapter::build_node_catalog),
                    handle_inspect_click,
                ),
            );
    }
}

fn rebuild_reverse_index(
    catalog: Res<NodeCatalog>,
    mapping: Res<MappingState>,
    mut reverse: ResMut<ReverseMappingIndex>,
) {
    if !mapping.is_changed() && !catalog.is_changed() {
        return;
    }
    match mapping.table() {
        Some(table) => {
            reverse.map = reverse_index(table, &catalog.index);
            reverse.generation = catalog.generation;
        }
        None => {
            reverse.map.clear();
            reverse.generation = catalog.generation;
        }
    }
}

/// Handle inspection via mouse click or touch tap
fn handle_inspect_click(
    mut inspect: ResMut<InspectState>,
    catalog: Res<NodeCatalog>,
    reverse: Res<ReverseMappingIndex>,
    current: Res<CurrentScores>,
    camera_query: Query<(&Camera, &GlobalTransform), With<MainCamera>>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    touch_input: Res<Touches>,
    windows: Query<&Window>,
    mut contexts: bevy_egui::EguiContexts,
    mut touch_state: ResMut<TouchState>,
    mut ray_cast: MeshRayCast,
) {
    let egui_wants_pointer = contexts
        .ctx_mut()
        .map(|ctx| ctx.wants_pointer_input())
        .unwrap_or(false);
    if egui_wants_pointer {
        return;
    }

    let Ok(window) = windows.single() else {
        return;
    };
    let mut selection_pos: Option<Vec2> = None;

    // Track touch state for tap detection
    if let Some(touch) = touch_input.iter().next() {
        if touch_input.just_pressed(touch.id()) {
            touch_state.start_position = Some(touch.position());
            touch_state.is_dragging = false;
        } else if let Some(start) = touch_state.start_position {
            // More than 10 pixels of travel is a drag, not a tap
            if touch.position().distance(start) > 10.0 {
                touch_state.is_dragging = true;
            }
        }
    }

    for touch in touch_input.iter() {
        if touch_input.just_released(touch.id()) {
            if !touch_state.is_dragging {
                if let Some(start_pos) = touch_state.start_position {
                    selection_pos = Some(start_pos);
                }
            }
            touch_state.start_position = None;
            touch_state.is_dragging = false;
        }
    }

    if mouse_button.just_pressed(MouseButton::Left) {
        if let Some(cursor_pos) = window.cursor_position() {
            selection_pos = Some(cursor_pos);
        }
    }

    let Some(pos) = selection_pos else {
        return;
    };
    let Ok((camera, camera_transform)) = camera_query.single() else {
        return;
    };
    let Ok(ray) = camera.viewport_to_world(camera_transform, pos) else {
        return;
    };

    let hits = ray_cast.cast_ray(ray, &MeshRayCastSettings::default());
    let part = hits
        .iter()
        .find_map(|(entity, _)| catalog.part_by_mesh.get(entity))
        .map(|&i| &catalog.parts[i]);

    let Some(part) = part else {
        // Clicked empty space
        inspect.clear();
        return;
    };

    let node_name = part
        .owner
        .and_then(|owner| catalog.node_name(owner))
        .map(str::to_string);
    let region = node_name
        .as_deref()
        .and_then(|name| best_region_for_node(&reverse.map, name, &current.0));

    inspect.hit = Some(InspectHit { node_name, region });
}

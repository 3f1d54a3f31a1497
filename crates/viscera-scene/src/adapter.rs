//! Organ model loading and scene graph cataloguing
//!
//! A glTF organ model is loaded on demand, its named nodes indexed, and
//! every mesh under a named node catalogued with a private material clone
//! so highlight passes can recolor parts without touching shared assets.
//! Loads carry a generation counter; results from a superseded load are
//! never applied.

use std::collections::HashMap;

use bevy::asset::LoadState;
use bevy::gltf::Gltf;
use bevy::prelude::*;
use bevy::render::alpha::AlphaMode;

use viscera_core::{NodeIndex, Organ, OrganProfile, ScoreMap};

use crate::highlight::{CurrentScores, MappingState, PendingScores, SelectionParams};
use crate::inspect::InspectState;

/// Request to switch the viewer to another organ model.
#[derive(Message, Debug, Clone, Copy)]
pub struct LoadOrganModel {
    pub organ: Organ,
}

/// Component tagging glTF entities with their exported node name.
#[derive(Component, Debug, Clone)]
pub struct MeshNodeName(pub String);

/// Marker for the root entity of the spawned organ model.
#[derive(Component)]
pub struct OrganModelRoot;

/// The currently requested organ model and its load state.
#[derive(Resource, Default)]
pub struct OrganModel {
    pub organ: Option<Organ>,
    pub loading: Option<Handle<Gltf>>,
    pub scene: Option<Handle<Scene>>,
    pub root: Option<Entity>,
    /// Bumped on every load request; stale async results are discarded by
    /// comparing against this.
    pub generation: u64,
    pub ready: bool,
}

/// Cached original material properties for one mesh part.
#[derive(Clone)]
pub struct OriginalMaterial {
    pub base_color: Color,
    pub emissive: LinearRgba,
    pub alpha_mode: AlphaMode,
}

/// One renderable mesh of the organ model, with its private material clone
/// and the named node it belongs to.
pub struct MeshPart {
    pub entity: Entity,
    pub material: Handle<StandardMaterial>,
    pub original: OriginalMaterial,
    /// Nearest named ancestor, used to attribute clicks to a node.
    pub owner: Option<Entity>,
}

/// Index of the spawned model's scene graph: named nodes by name, mesh
/// parts, and which parts sit under which named node.
#[derive(Resource, Default)]
pub struct NodeCatalog {
    pub generation: u64,
    pub index: NodeIndex<Entity>,
    pub parts: Vec<MeshPart>,
    /// Part indices under each named node, including nested named nodes'
    /// meshes, so highlighting a group node covers its whole subtree.
    pub node_parts: HashMap<Entity, Vec<usize>>,
    pub part_by_mesh: HashMap<Entity, usize>,
    pub names_by_entity: HashMap<Entity, String>,
}

impl NodeCatalog {
    pub fn node_name(&self, entity: Entity) -> Option<&str> {
        self.names_by_entity.get(&entity).map(String::as_str)
    }

    /// All indexed node names in discovery order, for diagnostics.
    pub fn list_node_names(&self) -> Vec<String> {
        self.index.names().map(str::to_string).collect()
    }
}

pub struct AdapterPlugin;

impl Plugin for AdapterPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<OrganModel>()
            .init_resource::<NodeCatalog>()
            .add_message::<LoadOrganModel>()
            .add_systems(
                Update,
                (
                    start_model_load,
                    poll_model_load,
                    tag_mesh_node_names,
                    ApplyDeferred,
                    build_node_catalog,
                )
                    .chain(),
            );
    }
}

/// Begin loading a requested organ model, tearing down the previous one.
/// Only the newest request per frame is honored.
fn start_model_load(
    mut commands: Commands,
    mut requests: MessageReader<LoadOrganModel>,
    asset_server: Res<AssetServer>,
    mut model: ResMut<OrganModel>,
    mut pending: ResMut<PendingScores>,
    mut current: ResMut<CurrentScores>,
    mut params: ResMut<SelectionParams>,
    mut mapping: ResMut<MappingState>,
    mut inspect: ResMut<InspectState>,
) {
    let Some(request) = requests.read().last() else {
        return;
    };
    let organ = request.organ;

    if let Some(root) = model.root.take() {
        commands.entity(root).despawn();
    }

    let profile = OrganProfile::for_organ(organ);
    model.organ = Some(organ);
    model.generation += 1;
    model.ready = false;
    model.scene = None;
    model.loading = Some(asset_server.load(profile.model_path));

    *params = SelectionParams {
        top_k: profile.default_top_k,
        threshold: profile.default_threshold,
    };
    pending.0.clear();
    current.0 = ScoreMap::new();
    *mapping = MappingState::Loading;
    inspect.clear();

    tracing::info!("Loading {} model from {}", organ, profile.model_path);
}

/// Check loading state and spawn the scene once the glTF is available
fn poll_model_load(
    mut commands: Commands,
    mut model: ResMut<OrganModel>,
    asset_server: Res<AssetServer>,
    gltf_assets: Res<Assets<Gltf>>,
) {
    let Some(handle) = model.loading.clone() else {
        return;
    };

    match asset_server.get_load_state(handle.id()) {
        Some(LoadState::Loaded) => {
            let Some(gltf) = gltf_assets.get(&handle) else {
                return;
            };
            let scene_handle = gltf
                .default_scene
                .clone()
                .or_else(|| gltf.scenes.first().cloned());
            if let Some(scene_handle) = scene_handle {
                let root = commands
                    .spawn((
                        SceneRoot(scene_handle.clone()),
                        Transform::default(),
                        Visibility::default(),
                        OrganModelRoot,
                    ))
                    .id();
                tracing::info!("Organ model loaded, spawning scene");
                model.scene = Some(scene_handle);
                model.root = Some(root);
            } else {
                tracing::error!("Organ model contains no scenes");
            }
            model.loading = None;
        }
        Some(LoadState::Failed(_)) => {
            tracing::error!("Failed to load organ model");
            model.loading = None;
        }
        _ => {
            // Still loading
        }
    }
}

/// Tag glTF entities with their node name for catalog building
fn tag_mesh_node_names(
    mut commands: Commands,
    named_entities: Query<(Entity, &Name), Without<MeshNodeName>>,
) {
    for (entity, name) in named_entities.iter() {
        commands
            .entity(entity)
            .insert(MeshNodeName(name.to_string()));
    }
}

/// Build the node catalog once the spawned scene's nodes are tagged.
/// Retries every frame until the scene hierarchy exists.
pub(crate) fn build_node_catalog(
    mut commands: Commands,
    mut catalog: ResMut<NodeCatalog>,
    mut model: ResMut<OrganModel>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    children_query: Query<&Children>,
    name_query: Query<&MeshNodeName>,
    mesh_query: Query<&MeshMaterial3d<StandardMaterial>, With<Mesh3d>>,
) {
    if catalog.generation == model.generation {
        return;
    }
    let Some(root) = model.root else {
        return;
    };
    // Scene spawning and node tagging lag the load by a frame or two
    if !has_any_tagged_descendant(root, &children_query, &name_query) {
        return;
    }

    let mut next = NodeCatalog {
        generation: model.generation,
        ..Default::default()
    };
    let mut named_stack = Vec::new();
    collect_nodes(
        root,
        &mut named_stack,
        &mut next,
        &mut commands,
        &mut materials,
        &children_query,
        &name_query,
        &mesh_query,
    );

    tracing::info!(
        "Catalogued {} named nodes and {} mesh parts",
        next.index.len(),
        next.parts.len()
    );
    model.ready = true;
    *catalog = next;
}

#[allow(clippy::too_many_arguments)]
fn collect_nodes(
    entity: Entity,
    named_stack: &mut Vec<Entity>,
    catalog: &mut NodeCatalog,
    commands: &mut Commands,
    materials: &mut Assets<StandardMaterial>,
    children_query: &Query<&Children>,
    name_query: &Query<&MeshNodeName>,
    mesh_query: &Query<&MeshMaterial3d<StandardMaterial>, With<Mesh3d>>,
) {
    let named = name_query.get(entity).ok().map(|n| n.0.clone());
    if let Some(ref node_name) = named {
        catalog.index.insert(node_name, entity);
        catalog.names_by_entity.insert(entity, node_name.clone());
        named_stack.push(entity);
    }

    if let Ok(material_handle) = mesh_query.get(entity) {
        if let Some(original) = materials.get(&material_handle.0).cloned() {
            let props = OriginalMaterial {
                base_color: original.base_color,
                emissive: original.emissive,
                alpha_mode: original.alpha_mode,
            };
            // Private clone so recoloring never leaks to other parts
            // sharing the source material
            let own = materials.add(original);
            commands.entity(entity).insert(MeshMaterial3d(own.clone()));

            let part_index = catalog.parts.len();
            catalog.parts.push(MeshPart {
                entity,
                material: own,
                original: props,
                owner: named_stack.last().copied(),
            });
            catalog.part_by_mesh.insert(entity, part_index);
            for &ancestor in named_stack.iter() {
                catalog
                    .node_parts
                    .entry(ancestor)
                    .or_default()
                    .push(part_index);
            }
        }
    }

    if let Ok(children) = children_query.get(entity) {
        for child in children.iter() {
            collect_nodes(
                child,
                named_stack,
                catalog,
                commands,
                materials,
                children_query,
                name_query,
                mesh_query,
            );
        }
    }

    if named.is_some() {
        named_stack.pop();
    }
}

/// Check if any descendant of entity has been tagged with a node name
fn has_any_tagged_descendant(
    entity: Entity,
    children_query: &Query<&Children>,
    name_query: &Query<&MeshNodeName>,
) -> bool {
    if let Ok(children) = children_query.get(entity) {
        for child in children.iter() {
            if name_query.get(child).is_ok() {
                return true;
            }
            if has_any_tagged_descendant(child, children_query, name_query) {
                return true;
            }
        }
    }
    false
}

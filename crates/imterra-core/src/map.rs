//! The map aggregate root.

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::backend::{MapRenderer, RendererDescriptor};
use crate::collection::Collection;
use crate::entity::Entity;
use crate::error::{RegistryError, Result};
use crate::interaction::MapInteraction;
use crate::layer::MapLayer;
use crate::observable::Observable;
use crate::scope::Scope;
use crate::view::{Extent, ViewState};

/// Id of the root layer group
pub const ROOT_LAYER_ID: &str = "root";

/// One layer tree, one interaction list, one renderer descriptor and one
/// view state.
///
/// Cloning a `Map` clones the handles; both clones see the same state.
#[derive(Clone)]
pub struct Map {
    scope: Scope,
    layers: Rc<MapLayer>,
    root_children: Collection<MapLayer>,
    interactions: Collection<MapInteraction>,
    pub renderer: Observable<Option<RendererDescriptor>>,
    pub view: ViewState,
    live: Observable<Option<Rc<dyn MapRenderer>>>,
}

impl Default for Map {
    fn default() -> Self {
        Self::new()
    }
}

impl Map {
    pub fn new() -> Self {
        let (layers, root_children) = MapLayer::group_with_children(ROOT_LAYER_ID);
        Self {
            scope: Scope::new(),
            layers,
            root_children,
            interactions: Collection::new("interactions"),
            renderer: Observable::new(None),
            view: ViewState::default(),
            live: Observable::new(None),
        }
    }

    /// Reference resolution root for this map
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Root group of the layer tree
    pub fn layers(&self) -> &Rc<MapLayer> {
        &self.layers
    }

    /// Top-level layers
    pub fn root_children(&self) -> &Collection<MapLayer> {
        &self.root_children
    }

    pub fn interactions(&self) -> &Collection<MapInteraction> {
        &self.interactions
    }

    /// Create and register an entity collection
    pub fn create_collection(&self, id: &str) -> Result<Collection<Entity>> {
        Ok(self.scope.create_collection(id)?)
    }

    /// Build a layer from a descriptor and append it to the root group
    pub fn create_layer(&self, descriptor: &Value) -> Result<Rc<MapLayer>> {
        let layer = MapLayer::from_descriptor(descriptor)?;
        self.root_children()
            .push(Rc::clone(&layer))
            .ok_or_else(|| duplicate(self.root_children().id(), layer.id()))?;
        Ok(layer)
    }

    /// Build an interaction from a descriptor and append it
    pub fn create_interaction(&self, descriptor: &Value) -> Result<Rc<MapInteraction>> {
        let interaction = MapInteraction::from_descriptor(descriptor)?;
        self.interactions
            .push(Rc::clone(&interaction))
            .ok_or_else(|| duplicate(self.interactions.id(), interaction.id()))?;
        if let Some(selection) = interaction.selection_id() {
            self.scope.selection_or_create(selection);
        }
        Ok(interaction)
    }

    /// Find a layer anywhere in the tree
    pub fn find_layer(&self, id: &str) -> Option<Rc<MapLayer>> {
        self.layers.find(id)
    }

    /// Renderer currently driving this map
    pub fn live_renderer(&self) -> Option<Rc<dyn MapRenderer>> {
        self.live.get()
    }

    /// Observable slot holding the live renderer
    pub fn live(&self) -> &Observable<Option<Rc<dyn MapRenderer>>> {
        &self.live
    }

    /// Visible extent according to the live renderer
    pub fn viewport_extent(&self) -> Option<Extent> {
        self.live.get()?.viewport_extent()
    }
}

fn duplicate(collection: &str, id: &str) -> RegistryError {
    RegistryError::DuplicateId {
        collection: collection.to_string(),
        id: id.to_string(),
    }
}

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Map")
            .field("scope", &self.scope)
            .field("layers", &self.root_children().ids())
            .field("interactions", &self.interactions.ids())
            .field("renderer", &self.renderer.get())
            .finish()
    }
}

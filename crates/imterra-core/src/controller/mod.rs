//! Controllers pair one state node with one renderer object.
//!
//! A controller creates its renderer object when it is built, pushes
//! state changes into it for as long as it lives, and destroys it on
//! [`LayerController::destroy`] / [`InteractionController::destroy`].
//! When the backend cannot build an object for the node's variant the
//! controller binds nothing and the node stays inert.

pub mod feature;
pub mod group;
pub mod interaction;
pub mod layer;
pub mod profile;
pub mod registry;

use std::rc::Rc;

use crate::backend::{InteractionHandle, LayerHandle, MapRenderer};
use crate::interaction::MapInteraction;
use crate::layer::MapLayer;
use crate::scope::Scope;

pub use feature::FeatureLayerController;
pub use group::GroupLayerController;
pub use interaction::{
    DrawInteractionController, HoverInteractionController, InteractionBinding,
    InteractionListController, PlainInteractionController, SelectInteractionController,
};
pub use layer::{LayerBinding, PlainLayerController, SourceLayerController};
pub use profile::ProfileLayerController;
pub use registry::ControllerRegistry;

/// Everything a controller needs to build and drive renderer objects.
#[derive(Clone)]
pub struct ControllerContext {
    pub renderer: Rc<dyn MapRenderer>,
    pub scope: Scope,
    pub registry: Rc<ControllerRegistry>,
}

impl ControllerContext {
    pub fn new(
        renderer: Rc<dyn MapRenderer>,
        scope: Scope,
        registry: Rc<ControllerRegistry>,
    ) -> Self {
        Self {
            renderer,
            scope,
            registry,
        }
    }
}

/// Binds one layer to one renderer-side layer object.
pub trait LayerController {
    fn layer(&self) -> &Rc<MapLayer>;

    /// Renderer object, if the backend could build one
    fn handle(&self) -> Option<Rc<dyn LayerHandle>>;

    /// Tear down the current renderer object and build a new one with
    /// `ctx`'s backend
    fn set_renderer(&mut self, ctx: &ControllerContext);

    /// Unsubscribe and destroy the renderer object. Idempotent.
    fn destroy(&mut self);
}

/// Binds one interaction to one renderer-side input handler.
pub trait InteractionController {
    fn interaction(&self) -> &Rc<MapInteraction>;

    fn handle(&self) -> Option<Rc<dyn InteractionHandle>>;

    fn set_renderer(&mut self, ctx: &ControllerContext);

    /// Unsubscribe and destroy the input handler. Idempotent.
    fn destroy(&mut self);
}

//! Registry of controller constructors.
//!
//! Controllers are chosen per variant name first. Variants without an
//! explicit entry get the controller for their registry role, so any
//! variant registered with a known role works without further setup.

use std::collections::HashMap;
use std::rc::Rc;

use crate::controller::{
    ControllerContext, DrawInteractionController, FeatureLayerController, GroupLayerController,
    HoverInteractionController, InteractionController, LayerController, PlainInteractionController,
    PlainLayerController, ProfileLayerController, SelectInteractionController,
    SourceLayerController,
};
use crate::interaction::MapInteraction;
use crate::layer::MapLayer;
use crate::registry::{InteractionRole, LayerRole};

/// Builds the controller for one layer
pub type LayerControllerFn = fn(&Rc<MapLayer>, &ControllerContext) -> Box<dyn LayerController>;

/// Builds the controller for one interaction
pub type InteractionControllerFn =
    fn(&Rc<MapInteraction>, &ControllerContext) -> Box<dyn InteractionController>;

/// Maps variant names to controller constructors.
pub struct ControllerRegistry {
    layers: HashMap<String, LayerControllerFn>,
    interactions: HashMap<String, InteractionControllerFn>,
}

impl Default for ControllerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerRegistry {
    /// Create a registry with no per-variant overrides.
    pub fn new() -> Self {
        Self {
            layers: HashMap::new(),
            interactions: HashMap::new(),
        }
    }

    /// Use `build` for every layer of `variant`
    pub fn register_layer(&mut self, variant: impl Into<String>, build: LayerControllerFn) {
        self.layers.insert(variant.into(), build);
    }

    /// Use `build` for every interaction of `variant`
    pub fn register_interaction(
        &mut self,
        variant: impl Into<String>,
        build: InteractionControllerFn,
    ) {
        self.interactions.insert(variant.into(), build);
    }

    /// Build the controller for `layer`
    pub fn create_layer(
        &self,
        layer: &Rc<MapLayer>,
        ctx: &ControllerContext,
    ) -> Box<dyn LayerController> {
        if let Some(build) = self.layers.get(layer.variant()) {
            return build(layer, ctx);
        }
        match layer.role() {
            LayerRole::Group => Box::new(GroupLayerController::new(layer, ctx)),
            LayerRole::Source => Box::new(SourceLayerController::new(layer, ctx)),
            LayerRole::Features => Box::new(FeatureLayerController::new(layer, ctx)),
            LayerRole::Profile => Box::new(ProfileLayerController::new(layer, ctx)),
            LayerRole::Plain => Box::new(PlainLayerController::new(layer, ctx)),
        }
    }

    /// Build the controller for `interaction`
    pub fn create_interaction(
        &self,
        interaction: &Rc<MapInteraction>,
        ctx: &ControllerContext,
    ) -> Box<dyn InteractionController> {
        if let Some(build) = self.interactions.get(interaction.variant()) {
            return build(interaction, ctx);
        }
        match interaction.role() {
            InteractionRole::Draw => Box::new(DrawInteractionController::new(interaction, ctx)),
            InteractionRole::Select => Box::new(SelectInteractionController::new(interaction, ctx)),
            InteractionRole::Hover => Box::new(HoverInteractionController::new(interaction, ctx)),
            InteractionRole::Generic => Box::new(PlainInteractionController::new(interaction, ctx)),
        }
    }

    /// Whether `variant` has a per-variant layer controller
    pub fn has_layer_override(&self, variant: &str) -> bool {
        self.layers.contains_key(variant)
    }
}

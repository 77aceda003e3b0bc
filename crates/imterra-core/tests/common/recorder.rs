//! In-memory renderer backend that records every call it receives

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use imterra_core::backend::{
    DrawInteractionHandle, DrawMode, FeatureLayerHandle, GroupLayerHandle, InteractionEvent,
    InteractionHandle, InteractionHandler, LayerHandle, LoadingHandler, MapRenderer,
    ProfileLayerHandle, RendererDescriptor, RendererFactory, SourceLayerHandle, ViewHandler,
};
use imterra_core::geometry::{Geometry, Profile, ProfilePosition, Range, Style};
use imterra_core::view::{Extent, ViewEvent, Viewport};
use serde_json::Value;

/// Ordered log of backend calls, shared by everything one factory builds
pub type CallLog = Rc<RefCell<Vec<String>>>;

const LAYER_KINDS: &[&str] = &["group", "tile", "image", "feature", "vertical-profile", "volume"];
const INTERACTION_KINDS: &[&str] = &["draw", "select", "hover", "pan"];

/// Descriptor id the factory refuses to build
pub const UNSUPPORTED_RENDERER: &str = "unsupported";

pub struct RecordingFactory {
    log: CallLog,
    renderers: RefCell<Vec<Rc<RecordingRenderer>>>,
}

impl RecordingFactory {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            log: Rc::new(RefCell::new(Vec::new())),
            renderers: RefCell::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    /// Calls containing `needle`
    pub fn calls_with(&self, needle: &str) -> Vec<String> {
        self.log
            .borrow()
            .iter()
            .filter(|call| call.contains(needle))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }

    /// Every renderer built so far, oldest first
    pub fn renderers(&self) -> Vec<Rc<RecordingRenderer>> {
        self.renderers.borrow().clone()
    }

    /// Most recently built renderer
    pub fn last(&self) -> Rc<RecordingRenderer> {
        self.renderers
            .borrow()
            .last()
            .cloned()
            .expect("no renderer built")
    }
}

impl RendererFactory for RecordingFactory {
    fn create(
        &self,
        descriptor: &RendererDescriptor,
        projection: &str,
    ) -> Option<Rc<dyn MapRenderer>> {
        self.log
            .borrow_mut()
            .push(format!("create_renderer({}, {})", descriptor.id, projection));
        if descriptor.id == UNSUPPORTED_RENDERER {
            return None;
        }
        let renderer = Rc::new(RecordingRenderer {
            id: descriptor.id.clone(),
            projection: projection.to_string(),
            log: Rc::clone(&self.log),
            view_handler: RefCell::new(None),
            layers: RefCell::new(HashMap::new()),
            interactions: RefCell::new(HashMap::new()),
            layer_group: RefCell::new(None),
            viewport: RefCell::new(None),
        });
        self.renderers.borrow_mut().push(Rc::clone(&renderer));
        Some(renderer)
    }
}

pub struct RecordingRenderer {
    id: String,
    projection: String,
    log: CallLog,
    view_handler: RefCell<Option<ViewHandler>>,
    layers: RefCell<HashMap<String, Rc<RecordingLayer>>>,
    interactions: RefCell<HashMap<String, Rc<RecordingInteraction>>>,
    layer_group: RefCell<Option<String>>,
    viewport: RefCell<Option<Viewport>>,
}

impl RecordingRenderer {
    fn record(&self, call: String) {
        self.log.borrow_mut().push(call);
    }

    pub fn projection(&self) -> &str {
        &self.projection
    }

    /// Layer object most recently built for `layer_id`
    pub fn layer(&self, layer_id: &str) -> Option<Rc<RecordingLayer>> {
        self.layers.borrow().get(layer_id).cloned()
    }

    pub fn interaction(&self, interaction_id: &str) -> Option<Rc<RecordingInteraction>> {
        self.interactions.borrow().get(interaction_id).cloned()
    }

    /// Id of the installed root group
    pub fn layer_group(&self) -> Option<String> {
        self.layer_group.borrow().clone()
    }

    /// Last viewport pushed by the engine
    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport.borrow().clone()
    }

    pub fn has_view_handler(&self) -> bool {
        self.view_handler.borrow().is_some()
    }

    /// Report a view event as if the user caused it
    pub fn emit_view(&self, event: ViewEvent) {
        let handler = self.view_handler.borrow().clone();
        if let Some(handler) = handler {
            handler(&event);
        }
    }
}

impl MapRenderer for RecordingRenderer {
    fn id(&self) -> &str {
        &self.id
    }

    fn create_layer(
        &self,
        variant: &str,
        layer_id: &str,
        _props: &Value,
    ) -> Option<Rc<dyn LayerHandle>> {
        self.record(format!("create_layer({variant}, {layer_id})"));
        if !LAYER_KINDS.contains(&variant) {
            return None;
        }
        let layer = Rc::new(RecordingLayer {
            id: layer_id.to_string(),
            variant: variant.to_string(),
            log: Rc::clone(&self.log),
            members: RefCell::new(Vec::new()),
            features: RefCell::new(Vec::new()),
            loading: RefCell::new(None),
        });
        self.layers
            .borrow_mut()
            .insert(layer_id.to_string(), Rc::clone(&layer));
        Some(layer)
    }

    fn create_interaction(
        &self,
        variant: &str,
        interaction_id: &str,
        _props: &Value,
    ) -> Option<Rc<dyn InteractionHandle>> {
        self.record(format!("create_interaction({variant}, {interaction_id})"));
        if !INTERACTION_KINDS.contains(&variant) {
            return None;
        }
        let interaction = Rc::new(RecordingInteraction {
            id: interaction_id.to_string(),
            variant: variant.to_string(),
            log: Rc::clone(&self.log),
            handler: RefCell::new(None),
            mode: RefCell::new(None),
        });
        self.interactions
            .borrow_mut()
            .insert(interaction_id.to_string(), Rc::clone(&interaction));
        Some(interaction)
    }

    fn set_viewport(&self, viewport: &Viewport) {
        self.record(format!(
            "set_viewport({}, {}, {})",
            viewport.center[0], viewport.center[1], viewport.resolution
        ));
        *self.viewport.borrow_mut() = Some(viewport.clone());
    }

    fn set_layer_group(&self, group: Option<Rc<dyn LayerHandle>>) {
        let id = group.map(|g| g.layer_id().to_string());
        self.record(format!("set_layer_group({})", id.as_deref().unwrap_or("none")));
        *self.layer_group.borrow_mut() = id;
    }

    fn viewport_extent(&self) -> Option<Extent> {
        let viewport = self.viewport.borrow().clone()?;
        let half = viewport.resolution * 256.0;
        Some(Extent {
            min: [viewport.center[0] - half, viewport.center[1] - half],
            max: [viewport.center[0] + half, viewport.center[1] + half],
        })
    }

    fn set_view_handler(&self, handler: Option<ViewHandler>) {
        *self.view_handler.borrow_mut() = handler;
    }

    fn destroy(&self) {
        self.record(format!("destroy_renderer({})", self.id));
    }
}

pub struct RecordingLayer {
    id: String,
    variant: String,
    log: CallLog,
    members: RefCell<Vec<String>>,
    features: RefCell<Vec<String>>,
    loading: RefCell<Option<LoadingHandler>>,
}

impl RecordingLayer {
    fn record(&self, call: String) {
        self.log.borrow_mut().push(format!("{}.{}", self.id, call));
    }

    /// Child layer ids of a group, in draw order
    pub fn members(&self) -> Vec<String> {
        self.members.borrow().clone()
    }

    /// Feature or profile ids currently drawn, in insertion order
    pub fn features(&self) -> Vec<String> {
        self.features.borrow().clone()
    }

    /// Report the source's loading state
    pub fn emit_loading(&self, loading: bool) {
        let handler = self.loading.borrow().clone();
        if let Some(handler) = handler {
            handler(loading);
        }
    }
}

impl LayerHandle for RecordingLayer {
    fn layer_id(&self) -> &str {
        &self.id
    }

    fn set_visible(&self, visible: bool) {
        self.record(format!("set_visible({visible})"));
    }

    fn set_opacity(&self, opacity: f64) {
        self.record(format!("set_opacity({opacity})"));
    }

    fn destroy(&self) {
        self.record("destroy".to_string());
    }

    fn as_group(&self) -> Option<&dyn GroupLayerHandle> {
        if self.variant == "group" {
            Some(self)
        } else {
            None
        }
    }

    fn as_features(&self) -> Option<&dyn FeatureLayerHandle> {
        if self.variant == "feature" {
            Some(self)
        } else {
            None
        }
    }

    fn as_source(&self) -> Option<&dyn SourceLayerHandle> {
        if matches!(self.variant.as_str(), "tile" | "image" | "volume") {
            Some(self)
        } else {
            None
        }
    }

    fn as_profile(&self) -> Option<&dyn ProfileLayerHandle> {
        if self.variant == "vertical-profile" {
            Some(self)
        } else {
            None
        }
    }
}

impl GroupLayerHandle for RecordingLayer {
    fn add_layer(&self, layer: Rc<dyn LayerHandle>, index: usize) {
        let id = layer.layer_id().to_string();
        self.record(format!("add_layer({id}, {index})"));
        let mut members = self.members.borrow_mut();
        let at = index.min(members.len());
        members.insert(at, id);
    }

    fn remove_layer(&self, layer: &Rc<dyn LayerHandle>) {
        let id = layer.layer_id();
        self.record(format!("remove_layer({id})"));
        self.members.borrow_mut().retain(|member| member != id);
    }
}

impl FeatureLayerHandle for RecordingLayer {
    fn add_feature(&self, id: &str, _geometry: &Geometry, _style: &Style) {
        self.record(format!("add_feature({id})"));
        self.features.borrow_mut().push(id.to_string());
    }

    fn update_feature_geometry(&self, id: &str, _geometry: &Geometry) {
        self.record(format!("update_feature_geometry({id})"));
    }

    fn update_feature_style(&self, id: &str, style: &Style) {
        self.record(format!("update_feature_style({id}, {})", style.stroke));
    }

    fn remove_feature(&self, id: &str) {
        self.record(format!("remove_feature({id})"));
        self.features.borrow_mut().retain(|feature| feature != id);
    }
}

impl SourceLayerHandle for RecordingLayer {
    fn update_source(&self, source: &str) {
        self.record(format!("update_source({source})"));
    }

    fn force_refresh(&self) {
        self.record("force_refresh".to_string());
    }

    fn set_loading_handler(&self, handler: Option<LoadingHandler>) {
        *self.loading.borrow_mut() = handler;
    }
}

impl ProfileLayerHandle for RecordingLayer {
    fn add_profile(&self, id: &str, _profile: &Profile, _style: &Style) {
        self.record(format!("add_profile({id})"));
        self.features.borrow_mut().push(id.to_string());
    }

    fn update_profile(&self, id: &str, _profile: &Profile) {
        self.record(format!("update_profile({id})"));
    }

    fn update_profile_style(&self, id: &str, style: &Style) {
        self.record(format!("update_profile_style({id}, {})", style.stroke));
    }

    fn remove_profile(&self, id: &str) {
        self.record(format!("remove_profile({id})"));
        self.features.borrow_mut().retain(|feature| feature != id);
    }

    fn set_highlighted(&self, id: &str, position: Option<&ProfilePosition>) {
        match position {
            Some(position) => self.record(format!("set_highlighted({id}, {})", position.distance)),
            None => self.record(format!("set_highlighted({id}, none)")),
        }
    }

    fn set_selected(&self, id: &str, position: Option<&ProfilePosition>) {
        match position {
            Some(position) => self.record(format!("set_selected({id}, {})", position.distance)),
            None => self.record(format!("set_selected({id}, none)")),
        }
    }

    fn set_region(&self, region: Option<Range>) {
        match region {
            Some(range) => self.record(format!("set_region({}, {})", range.start, range.end)),
            None => self.record("set_region(none)".to_string()),
        }
    }
}

pub struct RecordingInteraction {
    id: String,
    variant: String,
    log: CallLog,
    handler: RefCell<Option<InteractionHandler>>,
    mode: RefCell<Option<(Option<DrawMode>, Value)>>,
}

impl RecordingInteraction {
    fn record(&self, call: String) {
        self.log.borrow_mut().push(format!("{}.{}", self.id, call));
    }

    /// Report an input event as if the user caused it
    pub fn emit(&self, event: InteractionEvent) {
        let handler = self.handler.borrow().clone();
        if let Some(handler) = handler {
            handler(&event);
        }
    }

    /// Last `(mode, options)` pushed to a draw handler
    pub fn mode(&self) -> Option<(Option<DrawMode>, Value)> {
        self.mode.borrow().clone()
    }

    pub fn has_handler(&self) -> bool {
        self.handler.borrow().is_some()
    }
}

impl InteractionHandle for RecordingInteraction {
    fn set_active(&self, active: bool) {
        self.record(format!("set_active({active})"));
    }

    fn destroy(&self) {
        self.record("destroy".to_string());
    }

    fn set_event_handler(&self, handler: Option<InteractionHandler>) {
        *self.handler.borrow_mut() = handler;
    }

    fn as_draw(&self) -> Option<&dyn DrawInteractionHandle> {
        if self.variant == "draw" {
            Some(self)
        } else {
            None
        }
    }
}

impl DrawInteractionHandle for RecordingInteraction {
    fn set_mode(&self, mode: Option<DrawMode>, options: &Value) {
        self.record(format!("set_mode({mode:?})"));
        *self.mode.borrow_mut() = Some((mode, options.clone()));
    }
}

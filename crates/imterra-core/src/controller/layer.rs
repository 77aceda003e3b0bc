//! Base layer binding plus the controllers for plain and source layers.

use std::rc::Rc;

use crate::backend::{LayerHandle, LoadingHandler, MapRenderer};
use crate::controller::{ControllerContext, LayerController};
use crate::layer::MapLayer;
use crate::observable::Subscription;

/// The part every layer controller shares: one renderer object plus the
/// visibility and opacity bindings.
pub struct LayerBinding {
    layer: Rc<MapLayer>,
    handle: Option<Rc<dyn LayerHandle>>,
    subscriptions: Vec<Subscription>,
}

impl LayerBinding {
    pub fn new(layer: &Rc<MapLayer>) -> Self {
        Self {
            layer: Rc::clone(layer),
            handle: None,
            subscriptions: Vec::new(),
        }
    }

    pub fn layer(&self) -> &Rc<MapLayer> {
        &self.layer
    }

    pub fn handle(&self) -> Option<Rc<dyn LayerHandle>> {
        self.handle.clone()
    }

    /// Replace the renderer object with one built by `renderer`.
    ///
    /// Returns the new object; `None` leaves the layer inert.
    pub fn bind(&mut self, renderer: &dyn MapRenderer) -> Option<Rc<dyn LayerHandle>> {
        self.destroy();

        let layer = &self.layer;
        let props = layer.props.get();
        let Some(handle) = renderer.create_layer(layer.variant(), layer.id(), &props) else {
            tracing::warn!(
                layer = layer.id(),
                variant = layer.variant(),
                renderer = renderer.id(),
                "renderer has no layer of this kind; layer left unbound"
            );
            return None;
        };

        let target = Rc::clone(&handle);
        self.subscriptions
            .push(layer.visible.subscribe_now(move |visible| target.set_visible(*visible)));
        let target = Rc::clone(&handle);
        self.subscriptions
            .push(layer.opacity.subscribe_now(move |opacity| target.set_opacity(*opacity)));

        self.handle = Some(Rc::clone(&handle));
        Some(handle)
    }

    /// Keep `subscription` alive until the binding is destroyed
    pub fn keep(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    pub fn destroy(&mut self) {
        self.subscriptions.clear();
        if let Some(handle) = self.handle.take() {
            handle.destroy();
        }
    }
}

impl Drop for LayerBinding {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Controller for layers with no kind-specific state.
pub struct PlainLayerController {
    binding: LayerBinding,
}

impl PlainLayerController {
    pub fn new(layer: &Rc<MapLayer>, ctx: &ControllerContext) -> Self {
        let mut controller = Self {
            binding: LayerBinding::new(layer),
        };
        controller.set_renderer(ctx);
        controller
    }
}

impl LayerController for PlainLayerController {
    fn layer(&self) -> &Rc<MapLayer> {
        self.binding.layer()
    }

    fn handle(&self) -> Option<Rc<dyn LayerHandle>> {
        self.binding.handle()
    }

    fn set_renderer(&mut self, ctx: &ControllerContext) {
        self.binding.bind(ctx.renderer.as_ref());
    }

    fn destroy(&mut self) {
        self.binding.destroy();
    }
}

/// Controller for tiled, image and volume layers.
///
/// Pushes source changes, forwards refresh requests and reports the
/// backend's loading state into the layer's `loading` flag.
pub struct SourceLayerController {
    binding: LayerBinding,
}

impl SourceLayerController {
    pub fn new(layer: &Rc<MapLayer>, ctx: &ControllerContext) -> Self {
        let mut controller = Self {
            binding: LayerBinding::new(layer),
        };
        controller.set_renderer(ctx);
        controller
    }

    fn unhook_loading(&self) {
        if let Some(handle) = self.binding.handle() {
            if let Some(source) = handle.as_source() {
                source.set_loading_handler(None);
            }
        }
    }
}

impl LayerController for SourceLayerController {
    fn layer(&self) -> &Rc<MapLayer> {
        self.binding.layer()
    }

    fn handle(&self) -> Option<Rc<dyn LayerHandle>> {
        self.binding.handle()
    }

    fn set_renderer(&mut self, ctx: &ControllerContext) {
        self.unhook_loading();
        let Some(handle) = self.binding.bind(ctx.renderer.as_ref()) else {
            return;
        };
        if handle.as_source().is_none() {
            tracing::warn!(layer = handle.layer_id(), "source layer object has no source primitives");
            return;
        }
        let layer = Rc::clone(self.binding.layer());

        if let Some(url) = layer.source_url() {
            let target = Rc::clone(&handle);
            self.binding.keep(url.subscribe_now(move |source| {
                if let Some(source_handle) = target.as_source() {
                    source_handle.update_source(source);
                }
            }));
        }

        let target = Rc::clone(&handle);
        self.binding.keep(layer.on_refresh(move || {
            if let Some(source_handle) = target.as_source() {
                source_handle.force_refresh();
            }
        }));

        let weak = Rc::downgrade(&layer);
        let on_loading: LoadingHandler = Rc::new(move |loading| {
            if let Some(layer) = weak.upgrade() {
                layer.loading.set(loading);
            }
        });
        if let Some(source_handle) = handle.as_source() {
            source_handle.set_loading_handler(Some(on_loading));
        }
    }

    fn destroy(&mut self) {
        self.unhook_loading();
        self.binding.destroy();
        self.binding.layer().loading.set(false);
    }
}

//! Top-level renderer orchestration.
//!
//! [`MapController`] owns the live renderer of one [`Map`]. It rebuilds
//! the renderer whenever the projection or the renderer descriptor
//! changes, and keeps the viewport bound in both directions.
//!
//! A viewport change reported by the renderer is written into the view
//! state with `ignore_next_viewport` raised. The state-to-renderer
//! subscription consumes that flag instead of pushing the value straight
//! back.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::backend::{MapRenderer, RendererFactory, ViewHandler};
use crate::controller::{
    ControllerContext, ControllerRegistry, InteractionListController, LayerController,
};
use crate::map::Map;
use crate::observable::{subscribe_pair, Subscription};
use crate::view::{ViewEvent, Viewport};

/// Everything built for one renderer instance.
struct Live {
    renderer: Rc<dyn MapRenderer>,
    root: Box<dyn LayerController>,
    interactions: InteractionListController,
}

struct Inner {
    map: Map,
    factory: Rc<dyn RendererFactory>,
    registry: Rc<ControllerRegistry>,
    live: RefCell<Option<Live>>,
    ignore_next_viewport: Cell<bool>,
}

impl Inner {
    fn renderer(&self) -> Option<Rc<dyn MapRenderer>> {
        self.live
            .borrow()
            .as_ref()
            .map(|live| Rc::clone(&live.renderer))
    }

    fn tear_down(&self) {
        let previous = self.live.borrow_mut().take();
        if let Some(mut live) = previous {
            tracing::debug!(renderer = live.renderer.id(), "destroying renderer");
            live.root.destroy();
            live.interactions.destroy();
            live.renderer.set_layer_group(None);
            live.renderer.set_view_handler(None);
            live.renderer.destroy();
        }
        if self.map.live().with(Option::is_some) {
            self.map.live().replace(None);
        }
        self.ignore_next_viewport.set(false);
    }

    fn rebuild(self: &Rc<Self>) {
        self.tear_down();

        let Some(descriptor) = self.map.renderer.get() else {
            tracing::debug!("no renderer descriptor; map left unrendered");
            return;
        };
        let projection = self.map.view.projection.get();
        let Some(renderer) = self.factory.create(&descriptor, &projection) else {
            tracing::warn!(
                renderer = %descriptor.id,
                projection = %projection,
                "renderer factory produced nothing; map left unrendered"
            );
            return;
        };
        tracing::info!(renderer = %descriptor.id, projection = %projection, "renderer created");

        let weak: Weak<Inner> = Rc::downgrade(self);
        let on_view: ViewHandler = Rc::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.on_view_event(event);
            }
        });
        renderer.set_view_handler(Some(on_view));

        let ctx = ControllerContext::new(
            Rc::clone(&renderer),
            self.map.scope().clone(),
            Rc::clone(&self.registry),
        );
        let root = self.registry.create_layer(self.map.layers(), &ctx);
        renderer.set_layer_group(root.handle());
        let interactions = InteractionListController::new(self.map.interactions(), &ctx);
        renderer.set_viewport(&self.map.view.viewport.get());

        *self.live.borrow_mut() = Some(Live {
            renderer: Rc::clone(&renderer),
            root,
            interactions,
        });
        self.map.live().replace(Some(renderer));
    }

    fn on_view_event(&self, event: &ViewEvent) {
        match event {
            ViewEvent::ViewportChanged(viewport) => {
                let changed = self.map.view.viewport.with(|current| current != viewport);
                if changed {
                    self.ignore_next_viewport.set(true);
                    self.map.view.viewport.set(viewport.clone());
                }
            }
            ViewEvent::UpdatingChanged(updating) => {
                self.map.view.updating.set(*updating);
            }
        }
    }

    fn push_viewport(&self, viewport: &Viewport) {
        if self.ignore_next_viewport.replace(false) {
            tracing::debug!("viewport change came from the renderer; not pushed back");
            return;
        }
        if let Some(renderer) = self.renderer() {
            renderer.set_viewport(viewport);
        }
    }
}

/// Drives a renderer backend from a [`Map`] for as long as it lives.
pub struct MapController {
    inner: Rc<Inner>,
    subscriptions: Vec<Subscription>,
}

impl MapController {
    /// Start rendering `map` with renderers built by `factory`.
    ///
    /// A renderer is built right away if the map has a descriptor.
    pub fn new(
        map: &Map,
        factory: Rc<dyn RendererFactory>,
        registry: Rc<ControllerRegistry>,
    ) -> Self {
        let inner = Rc::new(Inner {
            map: map.clone(),
            factory,
            registry,
            live: RefCell::new(None),
            ignore_next_viewport: Cell::new(false),
        });

        let weak = Rc::downgrade(&inner);
        let on_renderer = subscribe_pair(&map.view.projection, &map.renderer, move |_, _| {
            if let Some(inner) = weak.upgrade() {
                inner.rebuild();
            }
        });

        let weak = Rc::downgrade(&inner);
        let on_viewport = map.view.viewport.subscribe(move |viewport| {
            if let Some(inner) = weak.upgrade() {
                inner.push_viewport(viewport);
            }
        });

        inner.rebuild();
        Self {
            inner,
            subscriptions: vec![on_renderer, on_viewport],
        }
    }

    /// Build with the default controller registry
    pub fn with_factory(map: &Map, factory: Rc<dyn RendererFactory>) -> Self {
        Self::new(map, factory, Rc::new(ControllerRegistry::new()))
    }

    pub fn map(&self) -> &Map {
        &self.inner.map
    }

    /// Renderer currently driven, if any
    pub fn renderer(&self) -> Option<Rc<dyn MapRenderer>> {
        self.inner.renderer()
    }

    pub fn is_live(&self) -> bool {
        self.inner.live.borrow().is_some()
    }

    /// Number of interactions bound to the live renderer
    pub fn interaction_count(&self) -> usize {
        self.inner
            .live
            .borrow()
            .as_ref()
            .map_or(0, |live| live.interactions.len())
    }

    /// Throw the renderer away and build a new one from the current
    /// descriptor
    pub fn rebuild(&self) {
        self.inner.rebuild();
    }

    /// Stop following the map and destroy the renderer. Idempotent.
    pub fn destroy(&mut self) {
        self.subscriptions.clear();
        self.inner.tear_down();
    }
}

impl Drop for MapController {
    fn drop(&mut self) {
        self.destroy();
    }
}

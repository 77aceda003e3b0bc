//! Group layer controller: one child controller per child layer.

use std::rc::Rc;

use crate::backend::LayerHandle;
use crate::controller::{ControllerContext, LayerBinding, LayerController};
use crate::layer::MapLayer;
use crate::reconcile::{ReconcileHandler, Reconciler};

/// Keeps the renderer group's members in the order of the child
/// collection.
///
/// Children whose renderer object could not be built still occupy a slot
/// in `slots`, so insertion positions on the renderer side skip them.
struct GroupHandler {
    ctx: ControllerContext,
    group: Rc<dyn LayerHandle>,
    /// `(child id, has renderer object)` in collection order
    slots: Vec<(String, bool)>,
}

impl GroupHandler {
    fn renderer_index(&self, index: usize) -> usize {
        self.slots[..index.min(self.slots.len())]
            .iter()
            .filter(|(_, bound)| *bound)
            .count()
    }

    fn slot_of(&self, id: &str) -> Option<usize> {
        self.slots.iter().position(|(slot, _)| slot == id)
    }

    fn attach(&self, handle: &Rc<dyn LayerHandle>, index: usize) {
        if let Some(group) = self.group.as_group() {
            group.add_layer(Rc::clone(handle), self.renderer_index(index));
        }
    }

    fn detach(&self, handle: &Rc<dyn LayerHandle>) {
        if let Some(group) = self.group.as_group() {
            group.remove_layer(handle);
        }
    }
}

impl ReconcileHandler<MapLayer> for GroupHandler {
    type State = Box<dyn LayerController>;

    fn on_add(&mut self, child: &Rc<MapLayer>, index: usize) -> Self::State {
        let controller = self.ctx.registry.create_layer(child, &self.ctx);
        let handle = controller.handle();
        if let Some(handle) = &handle {
            self.attach(handle, index);
        }
        let at = index.min(self.slots.len());
        self.slots.insert(at, (child.id().to_string(), handle.is_some()));
        controller
    }

    fn on_remove(&mut self, child: &Rc<MapLayer>, mut controller: Self::State) {
        if let Some(handle) = controller.handle() {
            self.detach(&handle);
        }
        if let Some(slot) = self.slot_of(child.id()) {
            self.slots.remove(slot);
        }
        controller.destroy();
    }

    fn on_move(
        &mut self,
        child: &Rc<MapLayer>,
        controller: &mut Self::State,
        _from: usize,
        to: usize,
    ) {
        let Some(slot) = self.slot_of(child.id()) else {
            return;
        };
        let entry = self.slots.remove(slot);
        let handle = controller.handle();
        if let Some(handle) = &handle {
            // Hand-off inside the group goes through remove then add
            self.detach(handle);
        }
        let at = to.min(self.slots.len());
        self.slots.insert(at, entry);
        if let Some(handle) = &handle {
            self.attach(handle, at);
        }
    }
}

/// Controller for group layers.
pub struct GroupLayerController {
    binding: LayerBinding,
    children: Option<Reconciler<MapLayer, GroupHandler>>,
}

impl GroupLayerController {
    pub fn new(layer: &Rc<MapLayer>, ctx: &ControllerContext) -> Self {
        let mut controller = Self {
            binding: LayerBinding::new(layer),
            children: None,
        };
        controller.set_renderer(ctx);
        controller
    }

    /// Number of children with a live controller
    pub fn child_count(&self) -> usize {
        self.children.as_ref().map_or(0, Reconciler::len)
    }

    fn drop_children(&mut self) {
        if let Some(children) = self.children.take() {
            children.destroy();
        }
    }
}

impl LayerController for GroupLayerController {
    fn layer(&self) -> &Rc<MapLayer> {
        self.binding.layer()
    }

    fn handle(&self) -> Option<Rc<dyn LayerHandle>> {
        self.binding.handle()
    }

    fn set_renderer(&mut self, ctx: &ControllerContext) {
        self.drop_children();
        let Some(group) = self.binding.bind(ctx.renderer.as_ref()) else {
            return;
        };
        if group.as_group().is_none() {
            tracing::warn!(layer = group.layer_id(), "group layer object cannot hold children");
            return;
        }
        let Some(children) = self.binding.layer().children() else {
            return;
        };
        self.children = Some(Reconciler::new(
            children,
            GroupHandler {
                ctx: ctx.clone(),
                group,
                slots: Vec::new(),
            },
        ));
    }

    fn destroy(&mut self) {
        self.drop_children();
        self.binding.destroy();
    }
}

impl Drop for GroupLayerController {
    fn drop(&mut self) {
        self.drop_children();
    }
}

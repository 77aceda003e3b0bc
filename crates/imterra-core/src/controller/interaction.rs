//! Interaction controllers.
//!
//! Backends report feature ids as plain strings. Select and hover
//! controllers turn them back into references and hand those to the
//! scope's selection manager; a draw controller hands finished
//! geometries to the interaction's draw state. No controller mutates
//! application state any other way.

use std::rc::{Rc, Weak};

use serde_json::Value;

use crate::backend::{
    DrawMode, InteractionEvent, InteractionHandle, InteractionHandler, MapRenderer,
};
use crate::collection::Collection;
use crate::controller::{ControllerContext, InteractionController};
use crate::interaction::{InteractionKind, MapInteraction};
use crate::observable::{subscribe_pair, Subscription};
use crate::reconcile::{ReconcileHandler, Reconciler};
use crate::scope::Scope;
use crate::selection::SelectMode;

/// The part every interaction controller shares: one input handler plus
/// the active flag binding.
pub struct InteractionBinding {
    interaction: Rc<MapInteraction>,
    handle: Option<Rc<dyn InteractionHandle>>,
    subscriptions: Vec<Subscription>,
}

impl InteractionBinding {
    pub fn new(interaction: &Rc<MapInteraction>) -> Self {
        Self {
            interaction: Rc::clone(interaction),
            handle: None,
            subscriptions: Vec::new(),
        }
    }

    pub fn interaction(&self) -> &Rc<MapInteraction> {
        &self.interaction
    }

    pub fn handle(&self) -> Option<Rc<dyn InteractionHandle>> {
        self.handle.clone()
    }

    /// Replace the input handler with one built by `renderer`
    pub fn bind(&mut self, renderer: &dyn MapRenderer) -> Option<Rc<dyn InteractionHandle>> {
        self.destroy();

        let interaction = &self.interaction;
        let props = interaction.props.get();
        let Some(handle) =
            renderer.create_interaction(interaction.variant(), interaction.id(), &props)
        else {
            tracing::warn!(
                interaction = interaction.id(),
                variant = interaction.variant(),
                renderer = renderer.id(),
                "renderer has no interaction of this kind; interaction left unbound"
            );
            return None;
        };

        let target = Rc::clone(&handle);
        self.subscriptions
            .push(interaction.active.subscribe_now(move |active| target.set_active(*active)));
        self.handle = Some(Rc::clone(&handle));
        Some(handle)
    }

    pub fn keep(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    pub fn destroy(&mut self) {
        self.subscriptions.clear();
        if let Some(handle) = self.handle.take() {
            handle.set_event_handler(None);
            handle.destroy();
        }
    }
}

impl Drop for InteractionBinding {
    fn drop(&mut self) {
        self.destroy();
    }
}

macro_rules! delegate_binding {
    ($controller:ty) => {
        impl InteractionController for $controller {
            fn interaction(&self) -> &Rc<MapInteraction> {
                self.binding.interaction()
            }

            fn handle(&self) -> Option<Rc<dyn InteractionHandle>> {
                self.binding.handle()
            }

            fn set_renderer(&mut self, ctx: &ControllerContext) {
                self.bind(ctx);
            }

            fn destroy(&mut self) {
                self.binding.destroy();
            }
        }
    };
}

/// Controller for interactions that only carry the active flag.
pub struct PlainInteractionController {
    binding: InteractionBinding,
}

impl PlainInteractionController {
    pub fn new(interaction: &Rc<MapInteraction>, ctx: &ControllerContext) -> Self {
        let mut controller = Self {
            binding: InteractionBinding::new(interaction),
        };
        controller.bind(ctx);
        controller
    }

    fn bind(&mut self, ctx: &ControllerContext) {
        self.binding.bind(ctx.renderer.as_ref());
    }
}

delegate_binding!(PlainInteractionController);

/// Controller for draw interactions.
///
/// Pushes `(mode, options)` to the backend. A finished gesture goes to
/// [`DrawState::finish`](crate::interaction::DrawState::finish), which
/// updates the target entity and leaves draw mode.
pub struct DrawInteractionController {
    binding: InteractionBinding,
}

impl DrawInteractionController {
    pub fn new(interaction: &Rc<MapInteraction>, ctx: &ControllerContext) -> Self {
        let mut controller = Self {
            binding: InteractionBinding::new(interaction),
        };
        controller.bind(ctx);
        controller
    }

    fn bind(&mut self, ctx: &ControllerContext) {
        let Some(handle) = self.binding.bind(ctx.renderer.as_ref()) else {
            return;
        };
        let interaction = Rc::clone(self.binding.interaction());
        let Some(draw) = interaction.as_draw() else {
            return;
        };

        let push = {
            let handle = Rc::clone(&handle);
            move |mode: &Option<DrawMode>, options: &Value| {
                if let Some(draw_handle) = handle.as_draw() {
                    draw_handle.set_mode(*mode, options);
                }
            }
        };
        push(&draw.mode.get(), &draw.options.get());
        self.binding.keep(subscribe_pair(&draw.mode, &draw.options, push));

        let weak = Rc::downgrade(&interaction);
        let scope = ctx.scope.clone();
        let on_event: InteractionHandler = Rc::new(move |event| {
            if let InteractionEvent::DrawEnd { geometry } = event {
                if let Some(draw) = weak.upgrade().as_deref().and_then(MapInteraction::as_draw) {
                    draw.finish(geometry.clone(), &scope);
                }
            }
        });
        handle.set_event_handler(Some(on_event));
    }
}

delegate_binding!(DrawInteractionController);

/// Controller for click selection.
pub struct SelectInteractionController {
    binding: InteractionBinding,
}

impl SelectInteractionController {
    pub fn new(interaction: &Rc<MapInteraction>, ctx: &ControllerContext) -> Self {
        let mut controller = Self {
            binding: InteractionBinding::new(interaction),
        };
        controller.bind(ctx);
        controller
    }

    fn bind(&mut self, ctx: &ControllerContext) {
        let Some(handle) = self.binding.bind(ctx.renderer.as_ref()) else {
            return;
        };
        let weak = Rc::downgrade(self.binding.interaction());
        let scope = ctx.scope.clone();
        let on_event: InteractionHandler = Rc::new(move |event| {
            if let InteractionEvent::FeatureSelect { id, mode } = event {
                dispatch_select(&weak, &scope, id.as_deref(), *mode);
            }
        });
        handle.set_event_handler(Some(on_event));
    }
}

fn dispatch_select(
    interaction: &Weak<MapInteraction>,
    scope: &Scope,
    feature_id: Option<&str>,
    mode: SelectMode,
) {
    let Some(interaction) = interaction.upgrade() else {
        return;
    };
    let InteractionKind::Select {
        selection,
        multiple,
    } = interaction.kind()
    else {
        return;
    };
    let manager = scope.selection_or_create(selection);
    let mode = match mode {
        SelectMode::Add | SelectMode::Toggle if !multiple.get() => SelectMode::Replace,
        other => other,
    };
    match feature_id {
        Some(id) => manager.select(&scope.feature_reference(id), mode),
        None if mode == SelectMode::Replace => manager.deselect_all(),
        None => {}
    }
}

delegate_binding!(SelectInteractionController);

/// Controller for pointer hover.
pub struct HoverInteractionController {
    binding: InteractionBinding,
}

impl HoverInteractionController {
    pub fn new(interaction: &Rc<MapInteraction>, ctx: &ControllerContext) -> Self {
        let mut controller = Self {
            binding: InteractionBinding::new(interaction),
        };
        controller.bind(ctx);
        controller
    }

    fn bind(&mut self, ctx: &ControllerContext) {
        let Some(handle) = self.binding.bind(ctx.renderer.as_ref()) else {
            return;
        };
        let Some(selection) = self.binding.interaction().selection_id() else {
            return;
        };
        let manager = Rc::downgrade(&ctx.scope.selection_or_create(selection));
        let scope = ctx.scope.clone();
        let on_event: InteractionHandler = Rc::new(move |event| {
            if let InteractionEvent::FeatureHover { id, .. } = event {
                if let Some(manager) = manager.upgrade() {
                    manager.hover(id.as_deref().map(|id| scope.feature_reference(id)));
                }
            }
        });
        handle.set_event_handler(Some(on_event));
    }
}

delegate_binding!(HoverInteractionController);

struct InteractionListHandler {
    ctx: ControllerContext,
}

impl ReconcileHandler<MapInteraction> for InteractionListHandler {
    type State = Box<dyn InteractionController>;

    fn on_add(&mut self, interaction: &Rc<MapInteraction>, _index: usize) -> Self::State {
        self.ctx.registry.create_interaction(interaction, &self.ctx)
    }

    fn on_remove(&mut self, _interaction: &Rc<MapInteraction>, mut controller: Self::State) {
        controller.destroy();
    }
}

/// One controller per interaction of a map.
pub struct InteractionListController {
    interactions: Reconciler<MapInteraction, InteractionListHandler>,
}

impl InteractionListController {
    pub fn new(interactions: &Collection<MapInteraction>, ctx: &ControllerContext) -> Self {
        Self {
            interactions: Reconciler::new(interactions, InteractionListHandler { ctx: ctx.clone() }),
        }
    }

    /// Number of interactions with a live controller
    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    pub fn destroy(&self) {
        self.interactions.destroy();
    }
}

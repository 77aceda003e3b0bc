//! Feature layer controller.
//!
//! Draws every entity of the layer's source collection. A simple
//! geometry becomes one renderer feature named by the entity's reference
//! token. A geometry collection becomes one feature per member, named
//! `token[i]`; member identity therefore relies on member order staying
//! stable across updates.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::backend::LayerHandle;
use crate::collection::Collection;
use crate::controller::{ControllerContext, LayerBinding, LayerController};
use crate::entity::Entity;
use crate::geometry::Geometry;
use crate::layer::MapLayer;
use crate::observable::Subscription;
use crate::reconcile::{ReconcileHandler, Reconciler};
use crate::reference::Reference;

/// Renderer features currently standing in for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum FeatureSet {
    #[default]
    Empty,
    Simple(String),
    Members(Vec<String>),
}

/// Pushes one entity's geometry and style into a feature layer.
struct FeatureSync {
    handle: Rc<dyn LayerHandle>,
    entity: Weak<Entity>,
    reference: Reference,
    features: RefCell<FeatureSet>,
}

impl FeatureSync {
    /// Rebuild or patch the entity's features after a geometry or
    /// visibility change
    fn render(&self) {
        let Some(entity) = self.entity.upgrade() else {
            return;
        };
        let Some(layer) = self.handle.as_features() else {
            return;
        };
        let geometry = if entity.visible.get() {
            entity.geometry.get()
        } else {
            None
        };
        let style = entity.style.get();
        let current = self.features.borrow().clone();

        let next = match (geometry, current) {
            (None, _) => {
                self.clear();
                FeatureSet::Empty
            }
            (Some(Geometry::Collection(members)), FeatureSet::Members(ids))
                if ids.len() == members.len() =>
            {
                for (id, member) in ids.iter().zip(&members) {
                    layer.update_feature_geometry(id, member);
                }
                FeatureSet::Members(ids)
            }
            (Some(Geometry::Collection(members)), _) => {
                self.clear();
                let ids: Vec<String> = (0..members.len())
                    .map(|index| self.reference.member_token(index))
                    .collect();
                for (index, (id, member)) in ids.iter().zip(&members).enumerate() {
                    layer.add_feature(id, member, &style.for_member(index));
                }
                FeatureSet::Members(ids)
            }
            (Some(simple), FeatureSet::Simple(id)) => {
                layer.update_feature_geometry(&id, &simple);
                FeatureSet::Simple(id)
            }
            (Some(simple), _) => {
                self.clear();
                let id = self.reference.to_token();
                layer.add_feature(&id, &simple, &style.primary());
                FeatureSet::Simple(id)
            }
        };
        *self.features.borrow_mut() = next;
    }

    /// Push a style change without touching geometry
    fn restyle(&self) {
        let (Some(entity), Some(layer)) = (self.entity.upgrade(), self.handle.as_features()) else {
            return;
        };
        let style = entity.style.get();
        match &*self.features.borrow() {
            FeatureSet::Empty => {}
            FeatureSet::Simple(id) => layer.update_feature_style(id, &style.primary()),
            FeatureSet::Members(ids) => {
                for (index, id) in ids.iter().enumerate() {
                    layer.update_feature_style(id, &style.for_member(index));
                }
            }
        }
    }

    /// Remove every feature this entity owns
    fn clear(&self) {
        let previous = self.features.replace(FeatureSet::Empty);
        let Some(layer) = self.handle.as_features() else {
            return;
        };
        match previous {
            FeatureSet::Empty => {}
            FeatureSet::Simple(id) => layer.remove_feature(&id),
            FeatureSet::Members(ids) => {
                for id in ids {
                    layer.remove_feature(&id);
                }
            }
        }
    }
}

/// Per-entity bindings kept by the reconciler.
struct EntityFeatures {
    sync: Rc<FeatureSync>,
    subscriptions: Vec<Subscription>,
}

struct FeatureHandler {
    handle: Rc<dyn LayerHandle>,
}

impl ReconcileHandler<Entity> for FeatureHandler {
    type State = EntityFeatures;

    fn on_add(&mut self, entity: &Rc<Entity>, _index: usize) -> EntityFeatures {
        let sync = Rc::new(FeatureSync {
            handle: Rc::clone(&self.handle),
            entity: Rc::downgrade(entity),
            reference: entity.reference(),
            features: RefCell::new(FeatureSet::Empty),
        });
        sync.render();

        let on_geometry = Rc::clone(&sync);
        let on_visible = Rc::clone(&sync);
        let on_style = Rc::clone(&sync);
        let subscriptions = vec![
            entity.geometry.subscribe(move |_| on_geometry.render()),
            entity.visible.subscribe(move |_| on_visible.render()),
            entity.style.subscribe(move |_| on_style.restyle()),
        ];
        EntityFeatures {
            sync,
            subscriptions,
        }
    }

    fn on_remove(&mut self, _entity: &Rc<Entity>, state: EntityFeatures) {
        let EntityFeatures {
            sync,
            subscriptions,
        } = state;
        drop(subscriptions);
        sync.clear();
    }
}

type EntityReconciler = Reconciler<Entity, FeatureHandler>;

/// Controller for feature layers.
pub struct FeatureLayerController {
    binding: LayerBinding,
    entities: Rc<RefCell<Option<EntityReconciler>>>,
}

impl FeatureLayerController {
    pub fn new(layer: &Rc<MapLayer>, ctx: &ControllerContext) -> Self {
        let mut controller = Self {
            binding: LayerBinding::new(layer),
            entities: Rc::new(RefCell::new(None)),
        };
        controller.set_renderer(ctx);
        controller
    }

    /// Number of entities currently drawn
    pub fn entity_count(&self) -> usize {
        self.entities.borrow().as_ref().map_or(0, Reconciler::len)
    }

    fn drop_entities(&self) {
        let previous = self.entities.borrow_mut().take();
        if let Some(previous) = previous {
            previous.destroy();
        }
    }
}

/// Swap the tracked collection. The old collection's features are
/// removed before the new collection's features are added.
fn track(
    slot: &RefCell<Option<EntityReconciler>>,
    handle: &Rc<dyn LayerHandle>,
    source: Option<Collection<Entity>>,
) {
    let previous = slot.borrow_mut().take();
    if let Some(previous) = previous {
        previous.destroy();
    }
    if let Some(collection) = source {
        let reconciler = Reconciler::new(
            &collection,
            FeatureHandler {
                handle: Rc::clone(handle),
            },
        );
        *slot.borrow_mut() = Some(reconciler);
    }
}

impl LayerController for FeatureLayerController {
    fn layer(&self) -> &Rc<MapLayer> {
        self.binding.layer()
    }

    fn handle(&self) -> Option<Rc<dyn LayerHandle>> {
        self.binding.handle()
    }

    fn set_renderer(&mut self, ctx: &ControllerContext) {
        self.drop_entities();
        let Some(handle) = self.binding.bind(ctx.renderer.as_ref()) else {
            return;
        };
        if handle.as_features().is_none() {
            tracing::warn!(layer = handle.layer_id(), "feature layer object cannot draw features");
            return;
        }
        let layer = Rc::clone(self.binding.layer());
        let Some(source) = layer.source_collection() else {
            return;
        };

        let slot = Rc::clone(&self.entities);
        let scope = ctx.scope.clone();
        let layer_id = layer.id().to_string();
        self.binding.keep(source.subscribe_now(move |collection_id| {
            let collection = collection_id.as_deref().and_then(|id| {
                let found = scope.collection(id);
                if found.is_none() {
                    tracing::debug!(layer = %layer_id, collection = id, "source collection not found");
                }
                found
            });
            track(&slot, &handle, collection);
        }));
    }

    fn destroy(&mut self) {
        self.drop_entities();
        self.binding.destroy();
    }
}

impl Drop for FeatureLayerController {
    fn drop(&mut self) {
        self.drop_entities();
    }
}

//! Vertical-profile layer controller.
//!
//! Same reconciliation as the feature layer, applied to each entity's
//! profile instead of its geometry. The layer's highlighted and selected
//! map coordinates are projected onto every drawn profile; the region
//! marker is layer-wide.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use crate::backend::LayerHandle;
use crate::collection::Collection;
use crate::controller::{ControllerContext, LayerBinding, LayerController};
use crate::entity::Entity;
use crate::geometry::{Coord, Profile};
use crate::layer::{LayerKind, MapLayer};
use crate::observable::{Observable, Subscription};
use crate::reconcile::{ReconcileHandler, Reconciler};

/// Profiles currently drawn, by renderer id, plus the pointer state
/// projected onto them.
#[derive(Default)]
struct DrawnProfiles {
    profiles: BTreeMap<String, Profile>,
    highlighted: Option<Coord>,
    selected: Option<Coord>,
}

type SharedProfiles = Rc<RefCell<DrawnProfiles>>;

fn push_markers(handle: &Rc<dyn LayerHandle>, id: &str, profile: &Profile, drawn: &DrawnProfiles) {
    let Some(layer) = handle.as_profile() else {
        return;
    };
    let highlighted = drawn.highlighted.and_then(|coord| profile.project(coord));
    let selected = drawn.selected.and_then(|coord| profile.project(coord));
    layer.set_highlighted(id, highlighted.as_ref());
    layer.set_selected(id, selected.as_ref());
}

struct ProfileSync {
    handle: Rc<dyn LayerHandle>,
    entity: Weak<Entity>,
    id: String,
    drawn: SharedProfiles,
}

impl ProfileSync {
    fn render(&self) {
        let (Some(entity), Some(layer)) = (self.entity.upgrade(), self.handle.as_profile()) else {
            return;
        };
        let profile = if entity.visible.get() {
            entity.profile.get()
        } else {
            None
        };
        let was_drawn = self.drawn.borrow().profiles.contains_key(&self.id);

        match profile {
            None => self.clear(),
            Some(profile) => {
                if was_drawn {
                    layer.update_profile(&self.id, &profile);
                } else {
                    layer.add_profile(&self.id, &profile, &entity.style.get().primary());
                }
                let mut drawn = self.drawn.borrow_mut();
                push_markers(&self.handle, &self.id, &profile, &drawn);
                drawn.profiles.insert(self.id.clone(), profile);
            }
        }
    }

    fn restyle(&self) {
        let (Some(entity), Some(layer)) = (self.entity.upgrade(), self.handle.as_profile()) else {
            return;
        };
        if self.drawn.borrow().profiles.contains_key(&self.id) {
            layer.update_profile_style(&self.id, &entity.style.get().primary());
        }
    }

    fn clear(&self) {
        let removed = self.drawn.borrow_mut().profiles.remove(&self.id);
        if removed.is_some() {
            if let Some(layer) = self.handle.as_profile() {
                layer.remove_profile(&self.id);
            }
        }
    }
}

struct ProfileState {
    sync: Rc<ProfileSync>,
    subscriptions: Vec<Subscription>,
}

struct ProfileHandler {
    handle: Rc<dyn LayerHandle>,
    drawn: SharedProfiles,
}

impl ReconcileHandler<Entity> for ProfileHandler {
    type State = ProfileState;

    fn on_add(&mut self, entity: &Rc<Entity>, _index: usize) -> ProfileState {
        let sync = Rc::new(ProfileSync {
            handle: Rc::clone(&self.handle),
            entity: Rc::downgrade(entity),
            id: entity.reference().to_token(),
            drawn: Rc::clone(&self.drawn),
        });
        sync.render();

        let on_profile = Rc::clone(&sync);
        let on_visible = Rc::clone(&sync);
        let on_style = Rc::clone(&sync);
        ProfileState {
            subscriptions: vec![
                entity.profile.subscribe(move |_| on_profile.render()),
                entity.visible.subscribe(move |_| on_visible.render()),
                entity.style.subscribe(move |_| on_style.restyle()),
            ],
            sync,
        }
    }

    fn on_remove(&mut self, _entity: &Rc<Entity>, state: ProfileState) {
        drop(state.subscriptions);
        state.sync.clear();
    }
}

type ProfileReconciler = Reconciler<Entity, ProfileHandler>;

/// Controller for vertical-profile layers.
pub struct ProfileLayerController {
    binding: LayerBinding,
    entities: Rc<RefCell<Option<ProfileReconciler>>>,
    drawn: SharedProfiles,
}

impl ProfileLayerController {
    pub fn new(layer: &Rc<MapLayer>, ctx: &ControllerContext) -> Self {
        let mut controller = Self {
            binding: LayerBinding::new(layer),
            entities: Rc::new(RefCell::new(None)),
            drawn: Rc::new(RefCell::new(DrawnProfiles::default())),
        };
        controller.set_renderer(ctx);
        controller
    }

    /// Number of profiles currently drawn
    pub fn profile_count(&self) -> usize {
        self.drawn.borrow().profiles.len()
    }

    fn drop_entities(&self) {
        let previous = self.entities.borrow_mut().take();
        if let Some(previous) = previous {
            previous.destroy();
        }
    }

    /// Follow one of the layer's pointer coordinates, re-projecting it
    /// onto every drawn profile
    fn bind_marker(
        &mut self,
        handle: &Rc<dyn LayerHandle>,
        coord: &Observable<Option<Coord>>,
        store: fn(&mut DrawnProfiles, Option<Coord>),
    ) {
        let drawn = Rc::clone(&self.drawn);
        let handle = Rc::clone(handle);
        self.binding.keep(coord.subscribe_now(move |value| {
            let mut state = drawn.borrow_mut();
            store(&mut state, *value);
            for (id, profile) in &state.profiles {
                push_markers(&handle, id, profile, &state);
            }
        }));
    }
}

fn track(
    slot: &RefCell<Option<ProfileReconciler>>,
    handler: ProfileHandler,
    source: Option<Collection<Entity>>,
) {
    let previous = slot.borrow_mut().take();
    if let Some(previous) = previous {
        previous.destroy();
    }
    if let Some(collection) = source {
        *slot.borrow_mut() = Some(Reconciler::new(&collection, handler));
    }
}

impl LayerController for ProfileLayerController {
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
        if handle.as_profile().is_none() {
            tracing::warn!(layer = handle.layer_id(), "profile layer object cannot draw profiles");
            return;
        }
        let layer = Rc::clone(self.binding.layer());
        let LayerKind::Profile {
            source,
            highlighted,
            selected,
            region,
        } = layer.kind()
        else {
            return;
        };

        self.bind_marker(&handle, highlighted, |state, coord| state.highlighted = coord);
        self.bind_marker(&handle, selected, |state, coord| state.selected = coord);

        let region_target = Rc::clone(&handle);
        self.binding.keep(region.subscribe_now(move |band| {
            if let Some(profile_layer) = region_target.as_profile() {
                profile_layer.set_region(*band);
            }
        }));

        let slot = Rc::clone(&self.entities);
        let drawn = Rc::clone(&self.drawn);
        let scope = ctx.scope.clone();
        self.binding.keep(source.subscribe_now(move |collection_id| {
            let collection = collection_id.as_deref().and_then(|id| scope.collection(id));
            let handler = ProfileHandler {
                handle: Rc::clone(&handle),
                drawn: Rc::clone(&drawn),
            };
            track(&slot, handler, collection);
        }));
    }

    fn destroy(&mut self) {
        self.drop_entities();
        self.binding.destroy();
    }
}

impl Drop for ProfileLayerController {
    fn drop(&mut self) {
        self.drop_entities();
    }
}

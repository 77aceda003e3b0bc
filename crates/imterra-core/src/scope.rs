//! Root index used to resolve references.
//!
//! A `Scope` belongs to one [`Map`](crate::map::Map). It knows every
//! entity collection by id, indexes free-standing entities, and owns the
//! selection managers. Nothing here is process-global, so independent
//! maps never see each other's entities.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::collection::{Collection, CollectionChange, CollectionItem, WeakCollection};
use crate::entity::Entity;
use crate::error::RegistryError;
use crate::observable::Subscription;
use crate::reference::Reference;
use crate::selection::SelectionManager;

pub(crate) struct ScopeInner {
    collections: RefCell<HashMap<String, WeakCollection<Entity>>>,
    free: RefCell<HashMap<String, Weak<Entity>>>,
    selections: RefCell<Vec<Rc<SelectionManager>>>,
    watchers: RefCell<HashMap<String, Subscription>>,
}

/// Shared handle to a root index.
#[derive(Clone)]
pub struct Scope {
    inner: Rc<ScopeInner>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                collections: RefCell::new(HashMap::new()),
                free: RefCell::new(HashMap::new()),
                selections: RefCell::new(Vec::new()),
                watchers: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakScope {
        WeakScope(Rc::downgrade(&self.inner))
    }

    /// Make `collection` resolvable by its id.
    ///
    /// Fails when a live collection with the same id is already
    /// registered. Registering the same collection twice is a no-op.
    /// Entities leaving a registered collection are dropped from every
    /// selection manager.
    pub fn register_collection(&self, collection: &Collection<Entity>) -> Result<(), RegistryError> {
        {
            let mut collections = self.inner.collections.borrow_mut();
            if let Some(existing) =
                collections.get(collection.id()).and_then(WeakCollection::upgrade)
            {
                if existing.ptr_eq(collection) {
                    return Ok(());
                }
                return Err(RegistryError::DuplicateCollection(collection.id().to_string()));
            }
            collections.insert(collection.id().to_string(), collection.downgrade());
        }
        let watcher = self.watch(collection);
        self.inner
            .watchers
            .borrow_mut()
            .insert(collection.id().to_string(), watcher);
        tracing::debug!(collection = collection.id(), "registered entity collection");
        Ok(())
    }

    fn watch(&self, collection: &Collection<Entity>) -> Subscription {
        let scope = self.downgrade();
        let collection_id = collection.id().to_string();
        collection.subscribe(move |change| {
            let Some(scope) = scope.upgrade() else {
                return;
            };
            match change {
                CollectionChange::Splice { removed, .. } => {
                    for entity in removed {
                        scope.forget_member(entity, &collection_id);
                    }
                }
                CollectionChange::Update { old, .. } => scope.forget_member(old, &collection_id),
                CollectionChange::Move { .. } => {}
            }
        })
    }

    /// Drop a departed member from every selection manager so a later
    /// entity reusing its id starts clean.
    fn forget_member(&self, entity: &Entity, collection_id: &str) {
        let reference = Reference::member(entity.id(), entity.variant(), collection_id);
        let managers = self.inner.selections.borrow().clone();
        for manager in managers {
            manager.forget(&reference);
        }
        entity.selected.set(false);
        entity.hovered.set(false);
    }

    /// Create a collection and register it
    pub fn create_collection(&self, id: &str) -> Result<Collection<Entity>, RegistryError> {
        let collection = Collection::new(id);
        self.register_collection(&collection)?;
        Ok(collection)
    }

    pub fn unregister_collection(&self, id: &str) -> bool {
        self.inner.watchers.borrow_mut().remove(id);
        self.inner.collections.borrow_mut().remove(id).is_some()
    }

    /// Reference behind a renderer feature id.
    ///
    /// A token that resolves as written wins, so collection or entity ids
    /// that themselves end in `[n]` are not mistaken for a sub-geometry
    /// suffix.
    pub fn feature_reference(&self, feature_id: &str) -> Reference {
        let whole = Reference::parse(feature_id);
        if self.resolve(&whole).is_some() {
            return whole;
        }
        Reference::from_feature_id(feature_id)
    }

    /// Live collection registered under `id`
    pub fn collection(&self, id: &str) -> Option<Collection<Entity>> {
        self.inner
            .collections
            .borrow()
            .get(id)
            .and_then(WeakCollection::upgrade)
    }

    /// Index a free-standing entity so bare-id references resolve to it
    pub fn index_entity(&self, entity: &Rc<Entity>) {
        self.inner
            .free
            .borrow_mut()
            .insert(entity.id().to_string(), Rc::downgrade(entity));
    }

    /// Resolve a reference. Returns `None` for anything stale or unknown.
    pub fn resolve(&self, reference: &Reference) -> Option<Rc<Entity>> {
        let entity = match &reference.collection {
            Some(collection_id) => self.collection(collection_id)?.item_with_id(&reference.id)?,
            None => self.inner.free.borrow().get(&reference.id)?.upgrade()?,
        };
        match &reference.variant {
            Some(variant) if variant != entity.variant() => None,
            _ => Some(entity),
        }
    }

    /// Resolve a string token
    pub fn resolve_token(&self, token: &str) -> Option<Rc<Entity>> {
        self.resolve(&Reference::parse(token))
    }

    /// Selection manager registered under `id`
    pub fn selection(&self, id: &str) -> Option<Rc<SelectionManager>> {
        self.inner
            .selections
            .borrow()
            .iter()
            .find(|manager| manager.id() == id)
            .cloned()
    }

    /// Selection manager registered under `id`, created on first use
    pub fn selection_or_create(&self, id: &str) -> Rc<SelectionManager> {
        if let Some(manager) = self.selection(id) {
            return manager;
        }
        let manager = Rc::new(SelectionManager::new(id, self));
        self.inner.selections.borrow_mut().push(Rc::clone(&manager));
        manager
    }

    /// Remove `entity` from the scene: every selection manager lets go of
    /// it first, then it leaves its collection and the free index.
    pub fn destroy_entity(&self, entity: &Rc<Entity>) {
        let reference = entity.reference();
        let managers = self.inner.selections.borrow().clone();
        for manager in managers {
            manager.release(&reference);
        }
        entity.selected.set(false);
        entity.hovered.set(false);

        if let Some(collection) = entity
            .owner()
            .get()
            .and_then(|collection_id| self.collection(&collection_id))
        {
            collection.remove(entity);
        }
        let mut free = self.inner.free.borrow_mut();
        if free
            .get(entity.id())
            .is_some_and(|weak| weak.as_ptr() == Rc::as_ptr(entity))
        {
            free.remove(entity.id());
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<String> = self.inner.collections.borrow().keys().cloned().collect();
        ids.sort();
        f.debug_struct("Scope")
            .field("collections", &ids)
            .field("selections", &self.inner.selections.borrow().len())
            .finish()
    }
}

/// Non-owning handle to a scope.
#[derive(Clone)]
pub(crate) struct WeakScope(Weak<ScopeInner>);

impl WeakScope {
    pub(crate) fn upgrade(&self) -> Option<Scope> {
        self.0.upgrade().map(|inner| Scope { inner })
    }
}

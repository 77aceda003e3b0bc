//! Ordered, id-indexed collections of shared state nodes.
//!
//! Layers, entities and interactions all live in a `Collection`. Every
//! mutation is published as a [`CollectionChange`]; changes raised while
//! another change is being delivered are queued, so each subscriber sees
//! changes in exactly the order they were made.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::observable::{Emitter, Subscription};

/// Records which collection currently owns a node.
#[derive(Debug, Default)]
pub struct OwnerSlot(RefCell<Option<String>>);

impl OwnerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the owning collection, if any
    pub fn get(&self) -> Option<String> {
        self.0.borrow().clone()
    }

    pub fn is_owned_by(&self, collection_id: &str) -> bool {
        self.0.borrow().as_deref() == Some(collection_id)
    }

    fn set(&self, owner: Option<String>) {
        *self.0.borrow_mut() = owner;
    }
}

/// Anything that can live in a [`Collection`].
pub trait CollectionItem: 'static {
    /// Stable identity within a collection
    fn id(&self) -> &str;

    /// Variant discriminator
    fn variant(&self) -> &str;

    /// Owner bookkeeping maintained by the collection
    fn owner(&self) -> &OwnerSlot;
}

/// A mutation of a collection.
pub enum CollectionChange<T> {
    /// `removed` were taken out at `index`, then `added` were inserted there
    Splice {
        index: usize,
        removed: Vec<Rc<T>>,
        added: Vec<Rc<T>>,
    },
    /// The item at `index` was swapped for another without resizing
    Update {
        index: usize,
        old: Rc<T>,
        new: Rc<T>,
    },
    /// `item` was moved from `from` to `to`
    Move { from: usize, to: usize, item: Rc<T> },
}

impl<T> Clone for CollectionChange<T> {
    fn clone(&self) -> Self {
        match self {
            CollectionChange::Splice {
                index,
                removed,
                added,
            } => CollectionChange::Splice {
                index: *index,
                removed: removed.clone(),
                added: added.clone(),
            },
            CollectionChange::Update { index, old, new } => CollectionChange::Update {
                index: *index,
                old: Rc::clone(old),
                new: Rc::clone(new),
            },
            CollectionChange::Move { from, to, item } => CollectionChange::Move {
                from: *from,
                to: *to,
                item: Rc::clone(item),
            },
        }
    }
}

impl<T: CollectionItem> fmt::Debug for CollectionChange<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids = |items: &[Rc<T>]| items.iter().map(|i| i.id().to_string()).collect::<Vec<_>>();
        match self {
            CollectionChange::Splice {
                index,
                removed,
                added,
            } => f
                .debug_struct("Splice")
                .field("index", index)
                .field("removed", &ids(removed))
                .field("added", &ids(added))
                .finish(),
            CollectionChange::Update { index, old, new } => f
                .debug_struct("Update")
                .field("index", index)
                .field("old", &old.id())
                .field("new", &new.id())
                .finish(),
            CollectionChange::Move { from, to, item } => f
                .debug_struct("Move")
                .field("from", from)
                .field("to", to)
                .field("item", &item.id())
                .finish(),
        }
    }
}

struct CollectionInner<T: CollectionItem> {
    id: String,
    items: RefCell<Vec<Rc<T>>>,
    index: RefCell<HashMap<String, Rc<T>>>,
    changes: Emitter<CollectionChange<T>>,
    pending: RefCell<VecDeque<CollectionChange<T>>>,
    dispatching: Cell<bool>,
}

impl<T: CollectionItem> Drop for CollectionInner<T> {
    fn drop(&mut self) {
        for item in self.items.get_mut().iter() {
            if item.owner().is_owned_by(&self.id) {
                item.owner().set(None);
            }
        }
    }
}

/// Ordered sequence of shared nodes with O(1) lookup by id.
///
/// Cloning a `Collection` clones the handle.
pub struct Collection<T: CollectionItem> {
    inner: Rc<CollectionInner<T>>,
}

impl<T: CollectionItem> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Non-owning handle to a [`Collection`].
pub struct WeakCollection<T: CollectionItem> {
    inner: Weak<CollectionInner<T>>,
}

impl<T: CollectionItem> Clone for WeakCollection<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T: CollectionItem> WeakCollection<T> {
    pub fn upgrade(&self) -> Option<Collection<T>> {
        self.inner.upgrade().map(|inner| Collection { inner })
    }
}

impl<T: CollectionItem> fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("id", &self.inner.id)
            .field("len", &self.len())
            .finish()
    }
}

impl<T: CollectionItem> Collection<T> {
    /// Create an empty collection
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(CollectionInner {
                id: id.into(),
                items: RefCell::new(Vec::new()),
                index: RefCell::new(HashMap::new()),
                changes: Emitter::new(),
                pending: RefCell::new(VecDeque::new()),
                dispatching: Cell::new(false),
            }),
        }
    }

    /// Create an empty collection with a random id
    pub fn anonymous() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn downgrade(&self) -> WeakCollection<T> {
        WeakCollection {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether both handles point at the same collection
    pub fn ptr_eq(&self, other: &Collection<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    /// Current items, in order
    pub fn snapshot(&self) -> Vec<Rc<T>> {
        self.inner.items.borrow().clone()
    }

    /// Current ids, in order
    pub fn ids(&self) -> Vec<String> {
        self.inner
            .items
            .borrow()
            .iter()
            .map(|item| item.id().to_string())
            .collect()
    }

    pub fn get(&self, index: usize) -> Option<Rc<T>> {
        self.inner.items.borrow().get(index).cloned()
    }

    /// Position of `item`, compared by identity
    pub fn index_of(&self, item: &Rc<T>) -> Option<usize> {
        self.inner
            .items
            .borrow()
            .iter()
            .position(|candidate| Rc::ptr_eq(candidate, item))
    }

    pub fn contains(&self, item: &Rc<T>) -> bool {
        self.item_with_id(item.id())
            .is_some_and(|found| Rc::ptr_eq(&found, item))
    }

    /// Look up an item by id
    pub fn item_with_id(&self, id: &str) -> Option<Rc<T>> {
        self.inner.index.borrow().get(id).cloned()
    }

    /// Subscribe to the change stream
    pub fn subscribe(&self, callback: impl Fn(&CollectionChange<T>) + 'static) -> Subscription {
        self.inner.changes.subscribe(callback)
    }

    /// Append items. Returns the items actually inserted.
    pub fn add(&self, items: impl IntoIterator<Item = Rc<T>>) -> Vec<Rc<T>> {
        let end = self.len();
        self.add_at(items, end)
    }

    /// Append a single item
    pub fn push(&self, item: Rc<T>) -> Option<Rc<T>> {
        self.add([item]).pop()
    }

    /// Insert items at `index`; an out-of-range index appends.
    ///
    /// Items whose id is already present, or that are still owned by
    /// another collection, are skipped.
    pub fn add_at(&self, items: impl IntoIterator<Item = Rc<T>>, index: usize) -> Vec<Rc<T>> {
        let (_, added) = self.apply_splice(index, 0, items);
        added
    }

    /// Remove `item` (by identity). Returns whether it was present.
    pub fn remove(&self, item: &Rc<T>) -> bool {
        match self.index_of(item) {
            Some(index) => {
                self.splice(index, 1, Vec::new());
                true
            }
            None => false,
        }
    }

    /// Remove the item with `id`, if present
    pub fn remove_item_with_id(&self, id: &str) -> Option<Rc<T>> {
        let item = self.item_with_id(id)?;
        self.remove(&item).then_some(item)
    }

    /// Remove everything
    pub fn clear(&self) -> Vec<Rc<T>> {
        let len = self.len();
        if len == 0 {
            return Vec::new();
        }
        self.splice(0, len, Vec::new())
    }

    /// Remove `delete_count` items at `index`, then insert `items` there.
    /// Returns the removed items.
    pub fn splice(
        &self,
        index: usize,
        delete_count: usize,
        items: impl IntoIterator<Item = Rc<T>>,
    ) -> Vec<Rc<T>> {
        let (removed, _) = self.apply_splice(index, delete_count, items);
        removed
    }

    fn apply_splice(
        &self,
        index: usize,
        delete_count: usize,
        items: impl IntoIterator<Item = Rc<T>>,
    ) -> (Vec<Rc<T>>, Vec<Rc<T>>) {
        let (index, removed, added) = {
            let mut list = self.inner.items.borrow_mut();
            let mut by_id = self.inner.index.borrow_mut();

            let index = index.min(list.len());
            let end = (index + delete_count).min(list.len());
            let removed: Vec<Rc<T>> = list.drain(index..end).collect();
            for item in &removed {
                if by_id.get(item.id()).is_some_and(|found| Rc::ptr_eq(found, item)) {
                    by_id.remove(item.id());
                }
                if item.owner().is_owned_by(&self.inner.id) {
                    item.owner().set(None);
                }
            }

            let mut added = Vec::new();
            for item in items {
                if by_id.contains_key(item.id()) {
                    tracing::warn!(
                        collection = %self.inner.id,
                        id = item.id(),
                        "skipping item with duplicate id"
                    );
                    continue;
                }
                if let Some(owner) = item.owner().get() {
                    tracing::warn!(
                        collection = %self.inner.id,
                        id = item.id(),
                        owner = %owner,
                        "skipping item still owned by another collection"
                    );
                    continue;
                }
                item.owner().set(Some(self.inner.id.clone()));
                by_id.insert(item.id().to_string(), Rc::clone(&item));
                added.push(item);
            }
            for (offset, item) in added.iter().enumerate() {
                list.insert(index + offset, Rc::clone(item));
            }
            (index, removed, added)
        };

        if !removed.is_empty() || !added.is_empty() {
            self.dispatch(CollectionChange::Splice {
                index,
                removed: removed.clone(),
                added: added.clone(),
            });
        }
        (removed, added)
    }

    /// Move `item` to `new_index` without removing it. Subscribers see a
    /// single move, so state attached to the item survives.
    pub fn move_item(&self, item: &Rc<T>, new_index: usize) -> bool {
        let Some(from) = self.index_of(item) else {
            return false;
        };
        let to = new_index.min(self.len() - 1);
        if from == to {
            return true;
        }
        {
            let mut list = self.inner.items.borrow_mut();
            let moved = list.remove(from);
            list.insert(to, moved);
        }
        self.dispatch(CollectionChange::Move {
            from,
            to,
            item: Rc::clone(item),
        });
        true
    }

    /// Swap the item at `index` for `item`. Returns the displaced item.
    pub fn replace(&self, index: usize, item: Rc<T>) -> Option<Rc<T>> {
        let old = self.get(index)?;
        if Rc::ptr_eq(&old, &item) {
            return Some(old);
        }
        if item.id() != old.id() && self.item_with_id(item.id()).is_some() {
            tracing::warn!(
                collection = %self.inner.id,
                id = item.id(),
                "refusing replacement with duplicate id"
            );
            return None;
        }
        if item.owner().get().is_some() {
            tracing::warn!(
                collection = %self.inner.id,
                id = item.id(),
                "refusing replacement with an owned item"
            );
            return None;
        }
        {
            let mut list = self.inner.items.borrow_mut();
            let mut by_id = self.inner.index.borrow_mut();
            by_id.remove(old.id());
            old.owner().set(None);
            item.owner().set(Some(self.inner.id.clone()));
            by_id.insert(item.id().to_string(), Rc::clone(&item));
            list[index] = Rc::clone(&item);
        }
        self.dispatch(CollectionChange::Update {
            index,
            old: Rc::clone(&old),
            new: item,
        });
        Some(old)
    }

    /// Stable sort. Published as a series of moves, never as removals.
    pub fn sort_by(&self, mut compare: impl FnMut(&T, &T) -> Ordering) {
        let mut working = self.snapshot();
        let mut sorted = working.clone();
        sorted.sort_by(|a, b| compare(&**a, &**b));

        let mut moves = Vec::new();
        for (to, item) in sorted.iter().enumerate() {
            let from = working
                .iter()
                .position(|candidate| Rc::ptr_eq(candidate, item))
                .unwrap_or(to);
            if from != to {
                let moved = working.remove(from);
                working.insert(to, moved);
                moves.push(CollectionChange::Move {
                    from,
                    to,
                    item: Rc::clone(item),
                });
            }
        }

        *self.inner.items.borrow_mut() = sorted;
        for change in moves {
            self.dispatch(change);
        }
    }

    /// Insert a large batch in chunks of `batch_size`, yielding to the
    /// event loop between chunks so interaction stays responsive.
    ///
    /// With `index` of `None` each chunk is appended at the then-current
    /// end. Returns every inserted item.
    pub async fn async_add(
        &self,
        items: Vec<Rc<T>>,
        index: Option<usize>,
        batch_size: usize,
    ) -> Vec<Rc<T>> {
        let batch_size = batch_size.max(1);
        let mut cursor = index;
        let mut inserted = Vec::with_capacity(items.len());
        let mut chunks = items.chunks(batch_size).peekable();

        while let Some(chunk) = chunks.next() {
            let at = cursor.unwrap_or_else(|| self.len());
            let added = self.add_at(chunk.iter().cloned(), at);
            cursor = cursor.map(|c| c.min(self.len()) + added.len());
            inserted.extend(added);

            if chunks.peek().is_some() {
                tokio::task::yield_now().await;
            }
        }
        tracing::debug!(
            collection = %self.inner.id,
            count = inserted.len(),
            "bulk insert finished"
        );
        inserted
    }

    fn dispatch(&self, change: CollectionChange<T>) {
        self.inner.pending.borrow_mut().push_back(change);
        if self.inner.dispatching.replace(true) {
            return;
        }
        loop {
            let next = self.inner.pending.borrow_mut().pop_front();
            match next {
                Some(change) => self.inner.changes.emit(&change),
                None => break,
            }
        }
        self.inner.dispatching.set(false);
    }
}

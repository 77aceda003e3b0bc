//! Incremental synchronization of external resources with a collection.
//!
//! A [`Reconciler`] watches one [`Collection`] and keeps a handler's
//! per-item state in step with the collection's membership and order:
//!
//! - every current item is added on construction, in order
//! - within a splice, removals run first (oldest first), then additions
//!   left to right by their resulting index
//! - an update runs as a removal of the old item followed by an addition
//!   of the new one
//! - a move keeps the item's state and only tells the handler about the
//!   new position
//! - `destroy` removes every tracked item and stops listening
//!
//! A key is removed only if it was added before and not removed since,
//! so the set of tracked keys always equals the keys in the collection.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use crate::collection::{Collection, CollectionChange, CollectionItem};
use crate::observable::Subscription;

/// Callbacks driven by a [`Reconciler`].
pub trait ReconcileHandler<T> {
    /// Opaque state kept per tracked item
    type State;

    /// `item` entered the collection at `index`
    fn on_add(&mut self, item: &Rc<T>, index: usize) -> Self::State;

    /// `item` left the collection; `state` is what `on_add` returned
    fn on_remove(&mut self, item: &Rc<T>, state: Self::State);

    /// `item` moved from `from` to `to`
    fn on_move(&mut self, _item: &Rc<T>, _state: &mut Self::State, _from: usize, _to: usize) {}

    /// Tracking key for `item`
    fn key(&self, item: &T) -> String
    where
        T: CollectionItem,
    {
        item.id().to_string()
    }
}

/// Handler built from a pair of closures.
pub struct FnHandler<T, S, A, R> {
    add: A,
    remove: R,
    _marker: PhantomData<fn(&T) -> S>,
}

impl<T, S, A, R> ReconcileHandler<T> for FnHandler<T, S, A, R>
where
    A: FnMut(&Rc<T>, usize) -> S,
    R: FnMut(&Rc<T>, S),
{
    type State = S;

    fn on_add(&mut self, item: &Rc<T>, index: usize) -> S {
        (self.add)(item, index)
    }

    fn on_remove(&mut self, item: &Rc<T>, state: S) {
        (self.remove)(item, state)
    }
}

struct Tracked<T, S> {
    item: Rc<T>,
    state: S,
}

struct Shared<T: CollectionItem, H: ReconcileHandler<T>> {
    collection: Collection<T>,
    handler: RefCell<H>,
    tracked: RefCell<HashMap<String, Tracked<T, H::State>>>,
    queue: RefCell<VecDeque<CollectionChange<T>>>,
    busy: Cell<bool>,
    destroyed: Cell<bool>,
}

impl<T: CollectionItem, H: ReconcileHandler<T>> Shared<T, H> {
    fn enqueue(&self, change: CollectionChange<T>) {
        self.queue.borrow_mut().push_back(change);
        self.drain();
    }

    fn drain(&self) {
        if self.busy.replace(true) {
            return;
        }
        loop {
            if self.destroyed.get() {
                self.queue.borrow_mut().clear();
                break;
            }
            let next = self.queue.borrow_mut().pop_front();
            match next {
                Some(change) => self.apply(change),
                None => break,
            }
        }
        self.busy.set(false);
    }

    fn apply(&self, change: CollectionChange<T>) {
        match change {
            CollectionChange::Splice {
                index,
                removed,
                added,
            } => {
                for item in &removed {
                    self.remove(item);
                }
                for (offset, item) in added.iter().enumerate() {
                    self.add(item, index + offset);
                }
            }
            CollectionChange::Update { index, old, new } => {
                self.remove(&old);
                self.add(&new, index);
            }
            CollectionChange::Move { from, to, item } => {
                let key = self.handler.borrow().key(&item);
                let mut tracked = self.tracked.borrow_mut();
                match tracked.get_mut(&key) {
                    Some(entry) => {
                        self.handler
                            .borrow_mut()
                            .on_move(&entry.item, &mut entry.state, from, to);
                    }
                    None => tracing::debug!(key = %key, "move of untracked item ignored"),
                }
            }
        }
    }

    fn add(&self, item: &Rc<T>, index: usize) {
        let key = self.handler.borrow().key(item);
        if self.tracked.borrow().contains_key(&key) {
            // Same key re-added without a removal in between
            self.remove_key(&key);
        }
        let state = self.handler.borrow_mut().on_add(item, index);
        self.tracked.borrow_mut().insert(
            key,
            Tracked {
                item: Rc::clone(item),
                state,
            },
        );
    }

    fn remove(&self, item: &Rc<T>) {
        let key = self.handler.borrow().key(item);
        self.remove_key(&key);
    }

    fn remove_key(&self, key: &str) {
        let entry = self.tracked.borrow_mut().remove(key);
        match entry {
            Some(Tracked { item, state }) => self.handler.borrow_mut().on_remove(&item, state),
            None => tracing::debug!(key = %key, "removal of untracked item ignored"),
        }
    }
}

/// Keeps a handler in sync with a collection until destroyed or dropped.
pub struct Reconciler<T: CollectionItem, H: ReconcileHandler<T>> {
    shared: Rc<Shared<T, H>>,
    subscription: RefCell<Option<Subscription>>,
}

impl<T, H> Reconciler<T, H>
where
    T: CollectionItem,
    H: ReconcileHandler<T> + 'static,
{
    /// Start tracking `collection`. Every current item is added before
    /// this returns.
    pub fn new(collection: &Collection<T>, handler: H) -> Self {
        let shared = Rc::new(Shared {
            collection: collection.clone(),
            handler: RefCell::new(handler),
            tracked: RefCell::new(HashMap::new()),
            queue: RefCell::new(VecDeque::new()),
            busy: Cell::new(false),
            destroyed: Cell::new(false),
        });

        let weak: Weak<Shared<T, H>> = Rc::downgrade(&shared);
        let subscription = collection.subscribe(move |change| {
            if let Some(shared) = weak.upgrade() {
                shared.enqueue(change.clone());
            }
        });

        shared.busy.set(true);
        for (index, item) in collection.snapshot().iter().enumerate() {
            shared.add(item, index);
        }
        shared.busy.set(false);
        shared.drain();

        Self {
            shared,
            subscription: RefCell::new(Some(subscription)),
        }
    }

    /// Collection being tracked
    pub fn collection(&self) -> &Collection<T> {
        &self.shared.collection
    }

    /// Number of tracked items
    pub fn len(&self) -> usize {
        self.shared.tracked.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` is tracked
    pub fn is_tracked(&self, key: &str) -> bool {
        self.shared.tracked.borrow().contains_key(key)
    }

    /// Inspect the state tracked for `key`
    pub fn with_state<R>(&self, key: &str, f: impl FnOnce(&H::State) -> R) -> Option<R> {
        self.shared.tracked.borrow().get(key).map(|entry| f(&entry.state))
    }

    /// Inspect the handler
    pub fn with_handler<R>(&self, f: impl FnOnce(&H) -> R) -> R {
        f(&self.shared.handler.borrow())
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.destroyed.get()
    }

    /// Remove every tracked item and stop listening. Idempotent.
    pub fn destroy(&self) {
        if self.shared.destroyed.replace(true) {
            return;
        }
        if let Some(subscription) = self.subscription.borrow_mut().take() {
            subscription.unsubscribe();
        }
        self.shared.queue.borrow_mut().clear();

        // Current collection order first, then anything left over
        let mut keys: Vec<String> = {
            let handler = self.shared.handler.borrow();
            self.shared
                .collection
                .snapshot()
                .iter()
                .map(|item| handler.key(item))
                .collect()
        };
        keys.extend(self.shared.tracked.borrow().keys().cloned());
        for key in keys {
            if self.shared.tracked.borrow().contains_key(&key) {
                self.shared.remove_key(&key);
            }
        }
    }
}

impl<T, S, A, R> Reconciler<T, FnHandler<T, S, A, R>>
where
    T: CollectionItem,
    S: 'static,
    A: FnMut(&Rc<T>, usize) -> S + 'static,
    R: FnMut(&Rc<T>, S) + 'static,
{
    /// Track `collection` with a pair of add/remove closures
    pub fn from_fns(collection: &Collection<T>, add: A, remove: R) -> Self {
        Self::new(
            collection,
            FnHandler {
                add,
                remove,
                _marker: PhantomData,
            },
        )
    }
}

impl<T: CollectionItem, H: ReconcileHandler<T>> Drop for Reconciler<T, H> {
    fn drop(&mut self) {
        if self.shared.destroyed.replace(true) {
            return;
        }
        if let Some(subscription) = self.subscription.get_mut().take() {
            subscription.unsubscribe();
        }
        let keys: Vec<String> = self.shared.tracked.borrow().keys().cloned().collect();
        for key in keys {
            self.shared.remove_key(&key);
        }
    }
}

impl<T: CollectionItem, H: ReconcileHandler<T>> fmt::Debug for Reconciler<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("collection", &self.shared.collection.id())
            .field("tracked", &self.shared.tracked.borrow().len())
            .field("destroyed", &self.shared.destroyed.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::tests::Node;

    type Log = Rc<RefCell<Vec<String>>>;

    fn logging(collection: &Collection<Node>) -> (Log, Reconciler<Node, impl ReconcileHandler<Node, State = String>>) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let add_log = Rc::clone(&log);
        let remove_log = Rc::clone(&log);
        let reconciler = Reconciler::from_fns(
            collection,
            move |item: &Rc<Node>, index| {
                add_log.borrow_mut().push(format!("+{}@{}", item.id(), index));
                format!("state-{}", item.id())
            },
            move |_item: &Rc<Node>, state: String| remove_log.borrow_mut().push(format!("-{state}")),
        );
        (log, reconciler)
    }

    #[test]
    fn test_initial_items_added_in_order() {
        let c = Collection::new("c");
        c.add(vec![Node::new("a"), Node::new("b")]);
        let (log, r) = logging(&c);
        assert_eq!(*log.borrow(), vec!["+a@0", "+b@1"]);
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn test_splice_removes_before_adding() {
        let c = Collection::new("c");
        c.add(vec![Node::new("a"), Node::new("b"), Node::new("c")]);
        let (log, _r) = logging(&c);
        log.borrow_mut().clear();

        c.splice(1, 2, vec![Node::new("x"), Node::new("y")]);
        assert_eq!(*log.borrow(), vec!["-state-b", "-state-c", "+x@1", "+y@2"]);
    }

    #[test]
    fn test_replacement_with_same_id_reacquires() {
        let c = Collection::new("c");
        c.add(vec![Node::new("a")]);
        let (log, _r) = logging(&c);
        log.borrow_mut().clear();

        c.replace(0, Node::new("a"));
        assert_eq!(*log.borrow(), vec!["-state-a", "+a@0"]);
    }

    #[test]
    fn test_move_keeps_state() {
        let c = Collection::new("c");
        let items = c.add(vec![Node::new("a"), Node::new("b")]);
        let (log, r) = logging(&c);
        log.borrow_mut().clear();

        c.move_item(&items[0], 1);
        assert!(log.borrow().is_empty());
        assert_eq!(r.with_state("a", Clone::clone).as_deref(), Some("state-a"));
    }

    #[test]
    fn test_destroy_is_idempotent_and_stops_listening() {
        let c = Collection::new("c");
        c.add(vec![Node::new("a"), Node::new("b")]);
        let (log, r) = logging(&c);
        log.borrow_mut().clear();

        r.destroy();
        r.destroy();
        c.push(Node::new("late"));
        drop(r);

        assert_eq!(*log.borrow(), vec!["-state-a", "-state-b"]);
    }

    #[test]
    fn test_mutation_inside_callback_is_queued() {
        let c = Collection::new("c");
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let handle = c.clone();
        let add_log = Rc::clone(&log);
        let remove_log = Rc::clone(&log);
        let _r = Reconciler::from_fns(
            &c,
            move |item: &Rc<Node>, _| {
                add_log.borrow_mut().push(format!("+{}", item.id()));
                if item.id() == "a" {
                    handle.push(Node::new("spawned"));
                }
            },
            move |item: &Rc<Node>, ()| remove_log.borrow_mut().push(format!("-{}", item.id())),
        );

        c.push(Node::new("a"));
        assert_eq!(*log.borrow(), vec!["+a", "+spawned"]);
        assert_eq!(c.len(), 2);
    }
}

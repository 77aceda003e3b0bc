//! Observable values with synchronous change notification
//!
//! `Observable<T>` is the only reactivity primitive the engine depends on.
//! A change notifies every subscriber immediately, on the caller's stack,
//! in registration order. There is no batching and no scheduler.
//!
//! Notification tolerates the usual hazards of a push model:
//! - a subscriber may unsubscribe itself or any other subscriber; a
//!   disposed subscriber is never called again, even mid-notification
//! - a subscriber may write the observable it is listening to; the nested
//!   write delivers the newer value to everyone and the outer round stops

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

struct ListenerEntry<E> {
    id: u64,
    active: Cell<bool>,
    callback: Box<dyn Fn(&E)>,
}

struct EmitterInner<E> {
    listeners: RefCell<Vec<Rc<ListenerEntry<E>>>>,
    next_id: Cell<u64>,
}

/// A synchronous event stream: subscribers are called in registration
/// order on the emitter's stack.
pub struct Emitter<E> {
    inner: Rc<EmitterInner<E>>,
}

impl<E> Clone for Emitter<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E: 'static> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> Emitter<E> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(EmitterInner {
                listeners: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
            }),
        }
    }

    /// Subscribe to events
    pub fn subscribe(&self, callback: impl Fn(&E) + 'static) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);

        let entry = Rc::new(ListenerEntry {
            id,
            active: Cell::new(true),
            callback: Box::new(callback),
        });
        self.inner.listeners.borrow_mut().push(Rc::clone(&entry));

        let weak: Weak<EmitterInner<E>> = Rc::downgrade(&self.inner);
        Subscription::from_fn(move || {
            entry.active.set(false);
            if let Some(inner) = weak.upgrade() {
                inner.listeners.borrow_mut().retain(|e| e.id != entry.id);
            }
        })
    }

    /// Deliver `event` to every live subscriber
    pub fn emit(&self, event: &E) {
        self.emit_while(event, || true);
    }

    /// Deliver `event` while `proceed` keeps returning true
    fn emit_while(&self, event: &E, proceed: impl Fn() -> bool) {
        let snapshot: Vec<Rc<ListenerEntry<E>>> =
            self.inner.listeners.borrow().iter().cloned().collect();
        for entry in snapshot {
            if !proceed() {
                break;
            }
            if entry.active.get() {
                (entry.callback)(event);
            }
        }
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }
}

struct ObservableInner<T> {
    value: RefCell<T>,
    emitter: Emitter<T>,
    version: Cell<u64>,
}

/// A shared, single-threaded value that can be observed for changes.
///
/// Cloning an `Observable` clones the handle, not the value.
pub struct Observable<T> {
    inner: Rc<ObservableInner<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> Observable<T> {
    /// Create a new observable holding `value`
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(ObservableInner {
                value: RefCell::new(value),
                emitter: Emitter::new(),
                version: Cell::new(0),
            }),
        }
    }

    /// Get a clone of the current value
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Number of writes that have notified subscribers
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Replace the value unconditionally and notify. Returns the old value.
    pub fn replace(&self, value: T) -> T {
        let old = self.inner.value.replace(value);
        self.notify();
        old
    }

    /// Mutate the value in place and notify
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        {
            let mut value = self.inner.value.borrow_mut();
            f(&mut value);
        }
        self.notify();
    }

    /// Subscribe to future changes.
    ///
    /// The callback is not invoked for the current value; use
    /// [`Observable::subscribe_now`] for that.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.inner.emitter.subscribe(callback)
    }

    /// Invoke `callback` with the current value, then subscribe it to changes
    pub fn subscribe_now(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let value = self.get();
        callback(&value);
        self.subscribe(callback)
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner.emitter.subscriber_count()
    }

    fn notify(&self) {
        let version = self.inner.version.get() + 1;
        self.inner.version.set(version);

        let value = self.get();
        // A nested write already delivered a newer value to everyone
        let current = || self.inner.version.get() == version;
        self.inner.emitter.emit_while(&value, current);
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Set a new value, notifying only when it differs from the current one.
    ///
    /// Returns whether subscribers were notified.
    pub fn set(&self, value: T) -> bool {
        if *self.inner.value.borrow() == value {
            return false;
        }
        *self.inner.value.borrow_mut() = value;
        self.notify();
        true
    }
}

impl<T: Clone + Default + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("value", &self.inner.value.borrow())
            .finish()
    }
}

/// Subscribe to two observables as a single dependency pair.
///
/// `callback` runs whenever either side changes, receiving both current
/// values.
pub fn subscribe_pair<A, B>(
    a: &Observable<A>,
    b: &Observable<B>,
    callback: impl Fn(&A, &B) + 'static,
) -> Subscription
where
    A: Clone + 'static,
    B: Clone + 'static,
{
    let callback = Rc::new(callback);

    let b_for_a = b.clone();
    let cb = Rc::clone(&callback);
    let sub_a = a.subscribe(move |a_value| cb(a_value, &b_for_a.get()));

    let a_for_b = a.clone();
    let cb = Rc::clone(&callback);
    let sub_b = b.subscribe(move |b_value| cb(&a_for_b.get(), b_value));

    Subscription::from_fn(move || {
        sub_a.unsubscribe();
        sub_b.unsubscribe();
    })
}

/// Disposer returned by every subscribe call.
///
/// Dropping the subscription unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    dispose: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Create a subscription that runs `dispose` when released
    pub fn from_fn(dispose: impl FnOnce() + 'static) -> Self {
        Self {
            dispose: Some(Box::new(dispose)),
        }
    }

    /// A subscription with nothing to release
    pub fn empty() -> Self {
        Self { dispose: None }
    }

    /// Unsubscribe now
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("live", &self.dispose.is_some())
            .finish()
    }
}

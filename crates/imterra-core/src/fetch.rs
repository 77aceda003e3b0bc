//! Cancellable data fetches.
//!
//! A [`FetchSlot`] stands for one logical piece of remote data. Starting
//! a fetch cancels the one still pending for the same slot, so only the
//! latest request can write the slot's value. Cancellation is reported
//! as [`FetchOutcome::Cancelled`], never as an error, and leaves the last
//! applied value in place.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::observable::Observable;

/// What happened to a fetch that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The result was written to the slot
    Applied,
    /// A newer request or an explicit cancel superseded this one
    Cancelled,
}

#[derive(Default)]
struct Pending {
    generation: u64,
    cancel: Option<oneshot::Sender<()>>,
}

/// Latest-wins holder for asynchronously fetched data.
pub struct FetchSlot<T> {
    target: Observable<Option<T>>,
    loading: Observable<bool>,
    pending: Rc<RefCell<Pending>>,
}

impl<T> Clone for FetchSlot<T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            loading: self.loading.clone(),
            pending: Rc::clone(&self.pending),
        }
    }
}

impl<T: Clone + 'static> Default for FetchSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> FetchSlot<T> {
    pub fn new() -> Self {
        Self::with_target(Observable::new(None))
    }

    /// Write fetched values into an existing observable
    pub fn with_target(target: Observable<Option<T>>) -> Self {
        Self {
            target,
            loading: Observable::new(false),
            pending: Rc::new(RefCell::new(Pending::default())),
        }
    }

    /// Last applied value
    pub fn target(&self) -> &Observable<Option<T>> {
        &self.target
    }

    /// Whether a request is in flight
    pub fn loading(&self) -> &Observable<bool> {
        &self.loading
    }

    /// Cancel the pending request, if any
    pub fn cancel(&self) {
        let sender = {
            let mut pending = self.pending.borrow_mut();
            pending.generation += 1;
            pending.cancel.take()
        };
        if let Some(sender) = sender {
            tracing::debug!("fetch cancelled");
            let _ = sender.send(());
        }
        self.loading.set(false);
    }

    fn begin(&self) -> (u64, oneshot::Receiver<()>) {
        let (sender, receiver) = oneshot::channel();
        let (generation, previous) = {
            let mut pending = self.pending.borrow_mut();
            pending.generation += 1;
            (pending.generation, pending.cancel.replace(sender))
        };
        if let Some(previous) = previous {
            tracing::debug!(generation, "superseding pending fetch");
            let _ = previous.send(());
        }
        self.loading.set(true);
        (generation, receiver)
    }

    /// Run `request`, cancelling whatever this slot was waiting on.
    ///
    /// Errors other than cancellation are returned and leave the slot's
    /// value untouched.
    pub async fn fetch<F>(&self, request: F) -> Result<FetchOutcome, FetchError>
    where
        F: Future<Output = Result<T, FetchError>>,
    {
        let (generation, cancelled) = self.begin();
        let result = tokio::select! {
            biased;
            _ = cancelled => Err(FetchError::Cancelled),
            result = request => result,
        };

        {
            let mut pending = self.pending.borrow_mut();
            if pending.generation != generation {
                return Ok(FetchOutcome::Cancelled);
            }
            pending.cancel = None;
        }
        self.loading.set(false);

        match result {
            Ok(value) => {
                self.target.replace(Some(value));
                Ok(FetchOutcome::Applied)
            }
            Err(err) if err.is_cancelled() => Ok(FetchOutcome::Cancelled),
            Err(err) => {
                tracing::warn!(error = %err, "fetch failed");
                Err(err)
            }
        }
    }

    /// Like [`FetchSlot::fetch`], but `request` only starts after
    /// `delay` passes without a newer request for this slot
    pub async fn fetch_debounced<F>(
        &self,
        delay: Duration,
        request: F,
    ) -> Result<FetchOutcome, FetchError>
    where
        F: Future<Output = Result<T, FetchError>>,
    {
        self.fetch(async move {
            tokio::time::sleep(delay).await;
            request.await
        })
        .await
    }

    /// Debounce with the configured delay
    pub async fn fetch_with_config<F>(
        &self,
        config: &FetchConfig,
        request: F,
    ) -> Result<FetchOutcome, FetchError>
    where
        F: Future<Output = Result<T, FetchError>>,
    {
        self.fetch_debounced(config.debounce(), request).await
    }
}

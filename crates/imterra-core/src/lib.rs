//! imterra-core - Reactive map state to renderer synchronization
//!
//! This crate keeps a pluggable map renderer in step with an observable
//! tree of application state without ever redrawing the whole scene.
//!
//! # Key Components
//!
//! - **Registry**: append-only variant registries for layer, entity and
//!   interaction kinds, extensible by independent modules
//! - **Reference**: stable, non-owning tokens for entities, resolved
//!   against a [`Scope`]
//! - **Collection**: ordered, id-indexed collections with a change stream
//! - **Reconciler**: incremental add/remove/move sync of external
//!   resources with a collection
//! - **Controllers**: one controller per layer or interaction, pairing a
//!   state node with one renderer object
//! - **MapController**: renderer (re)instantiation and two-way viewport
//!   binding
//! - **FetchSlot**: latest-wins cancellable fetches
//!
//! # Threading
//!
//! Everything here is single-threaded. Changes propagate synchronously on
//! the caller's stack; the only suspension points are fetches and
//! batched bulk inserts.

pub mod backend;
pub mod collection;
pub mod config;
pub mod controller;
pub mod entity;
pub mod error;
pub mod fetch;
pub mod geometry;
pub mod interaction;
pub mod layer;
pub mod map;
pub mod observable;
pub mod orchestrator;
pub mod reconcile;
pub mod reference;
pub mod registry;
pub mod scope;
pub mod selection;
pub mod view;

pub use backend::{
    DrawMode, InteractionEvent, InteractionHandle, LayerHandle, MapRenderer, RendererDescriptor,
    RendererFactory,
};
pub use collection::{Collection, CollectionChange, CollectionItem};
pub use config::SyncConfig;
pub use controller::{ControllerContext, ControllerRegistry};
pub use entity::Entity;
pub use error::{ImterraError, Result};
pub use fetch::{FetchOutcome, FetchSlot};
pub use geometry::{Coord, Geometry, Profile, Style, StyleValue};
pub use interaction::MapInteraction;
pub use layer::MapLayer;
pub use map::Map;
pub use observable::{subscribe_pair, Emitter, Observable, Subscription};
pub use orchestrator::MapController;
pub use reconcile::{ReconcileHandler, Reconciler};
pub use reference::Reference;
pub use scope::Scope;
pub use selection::{SelectMode, SelectionManager};
pub use view::{Viewport, ViewEvent, ViewState};

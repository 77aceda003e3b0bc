//! Selection and hover holders.
//!
//! A `SelectionManager` stores references, never entities. Each change
//! flips the `selected` / `hovered` flag of whatever the reference
//! resolves to in the owning scope; a reference that no longer resolves
//! is dropped without complaint.

use std::fmt;

use crate::observable::Observable;
use crate::reference::Reference;
use crate::scope::{Scope, WeakScope};

/// How a selection request combines with the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectMode {
    /// Select only this reference
    #[default]
    Replace,
    /// Add to the selection
    Add,
    /// Add if absent, remove if present
    Toggle,
    /// Remove from the selection
    Remove,
}

/// Ordered set of selected references plus the hovered one.
pub struct SelectionManager {
    id: String,
    scope: WeakScope,
    selected: Observable<Vec<Reference>>,
    hovered: Observable<Option<Reference>>,
}

impl SelectionManager {
    pub(crate) fn new(id: impl Into<String>, scope: &Scope) -> Self {
        Self {
            id: id.into(),
            scope: scope.downgrade(),
            selected: Observable::new(Vec::new()),
            hovered: Observable::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Selected references, in selection order
    pub fn selected(&self) -> Vec<Reference> {
        self.selected.get()
    }

    pub fn hovered(&self) -> Option<Reference> {
        self.hovered.get()
    }

    pub fn is_selected(&self, reference: &Reference) -> bool {
        self.selected.with(|selected| selected.contains(reference))
    }

    /// Observable selection list
    pub fn selection(&self) -> &Observable<Vec<Reference>> {
        &self.selected
    }

    /// Observable hover target
    pub fn hover_target(&self) -> &Observable<Option<Reference>> {
        &self.hovered
    }

    /// Apply a selection request.
    ///
    /// A reference that does not resolve is never added; with
    /// [`SelectMode::Replace`] it still clears the current selection.
    pub fn select(&self, reference: &Reference, mode: SelectMode) {
        let resolves = self.flag(reference, |_| ()).is_some();
        let mut next = self.selected();
        let was_selected = next.contains(reference);

        match mode {
            SelectMode::Replace => {
                for previous in next.iter().filter(|r| *r != reference) {
                    self.flag(previous, |entity| entity.selected.set(false));
                }
                next.clear();
                if resolves {
                    next.push(reference.clone());
                }
            }
            SelectMode::Add if resolves && !was_selected => next.push(reference.clone()),
            SelectMode::Toggle if was_selected => next.retain(|r| r != reference),
            SelectMode::Toggle if resolves => next.push(reference.clone()),
            SelectMode::Remove => next.retain(|r| r != reference),
            _ => {}
        }

        let now_selected = next.contains(reference);
        self.flag(reference, |entity| entity.selected.set(now_selected));
        tracing::trace!(selection = %self.id, reference = %reference, ?mode, "selection changed");
        self.selected.set(next);
    }

    /// Select exactly `references`, dropping those that do not resolve
    pub fn select_all(&self, references: &[Reference]) {
        self.clear();
        for reference in references {
            self.select(reference, SelectMode::Add);
        }
    }

    /// Move the hover marker. An unresolvable reference clears it.
    pub fn hover(&self, reference: Option<Reference>) {
        let target = reference.filter(|r| self.flag(r, |_| ()).is_some());
        if target == self.hovered.get() {
            return;
        }
        if let Some(previous) = self.hovered.get() {
            self.flag(&previous, |entity| entity.hovered.set(false));
        }
        if let Some(next) = &target {
            self.flag(next, |entity| entity.hovered.set(true));
        }
        self.hovered.set(target);
    }

    /// Deselect everything. The hover marker stays where it is.
    pub fn deselect_all(&self) {
        for reference in self.selected() {
            self.flag(&reference, |entity| entity.selected.set(false));
        }
        self.selected.set(Vec::new());
    }

    /// Deselect everything and clear the hover marker
    pub fn clear(&self) {
        self.deselect_all();
        self.hover(None);
    }

    /// Forget `reference` entirely. Called before its entity is destroyed.
    pub fn release(&self, reference: &Reference) {
        if self.is_selected(reference) {
            self.flag(reference, |entity| entity.selected.set(false));
        }
        if self.is_hovered(reference) {
            self.flag(reference, |entity| entity.hovered.set(false));
        }
        self.forget(reference);
    }

    /// Drop `reference` without touching any entity flags
    pub(crate) fn forget(&self, reference: &Reference) {
        if self.is_selected(reference) {
            self.selected
                .update(|selected| selected.retain(|r| r != reference));
        }
        if self.is_hovered(reference) {
            self.hovered.set(None);
        }
    }

    fn is_hovered(&self, reference: &Reference) -> bool {
        self.hovered.with(|h| h.as_ref() == Some(reference))
    }

    /// Drop references that no longer resolve
    pub fn prune(&self) {
        let live: Vec<Reference> = self
            .selected()
            .into_iter()
            .filter(|r| self.flag(r, |_| ()).is_some())
            .collect();
        self.selected.set(live);
        if let Some(hovered) = self.hovered.get() {
            if self.flag(&hovered, |_| ()).is_none() {
                self.hovered.set(None);
            }
        }
    }

    fn flag<R>(
        &self,
        reference: &Reference,
        f: impl FnOnce(&crate::entity::Entity) -> R,
    ) -> Option<R> {
        let scope = self.scope.upgrade()?;
        let entity = scope.resolve(reference)?;
        Some(f(&entity))
    }
}

impl fmt::Debug for SelectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionManager")
            .field("id", &self.id)
            .field("selected", &self.selected.get())
            .field("hovered", &self.hovered.get())
            .finish()
    }
}

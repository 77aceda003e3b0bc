//! Map interactions: variant-tagged input modes with an active flag.

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::backend::DrawMode;
use crate::collection::{CollectionItem, OwnerSlot};
use crate::error::DescriptorError;
use crate::geometry::Geometry;
use crate::observable::{Emitter, Observable, Subscription};
use crate::reference::Reference;
use crate::registry::{interaction_registry, InteractionRole};
use crate::scope::Scope;

/// Selection manager used when a descriptor names none
pub const DEFAULT_SELECTION: &str = "default";

/// State of a draw interaction.
pub struct DrawState {
    /// Shape being drawn; `None` when idle
    pub mode: Observable<Option<DrawMode>>,
    /// Backend-specific drawing options
    pub options: Observable<Value>,
    /// Entity that receives the drawn geometry
    pub target: Observable<Option<Reference>>,
    drawn: Emitter<Geometry>,
}

impl DrawState {
    fn new() -> Self {
        Self {
            mode: Observable::new(None),
            options: Observable::new(Value::Null),
            target: Observable::new(None),
            drawn: Emitter::new(),
        }
    }

    /// Start drawing `mode`
    pub fn start(&self, mode: DrawMode, target: Option<Reference>) {
        self.target.set(target);
        self.mode.set(Some(mode));
    }

    /// Stop drawing without producing a geometry
    pub fn cancel(&self) {
        self.mode.set(None);
    }

    /// Finish a gesture: hand the geometry to the target entity, tell
    /// listeners, and leave draw mode.
    pub fn finish(&self, geometry: Geometry, scope: &Scope) {
        if let Some(reference) = self.target.get() {
            match scope.resolve(&reference) {
                Some(entity) => {
                    entity.geometry.replace(Some(geometry.clone()));
                }
                None => tracing::debug!(%reference, "draw target no longer resolves"),
            }
        }
        self.drawn.emit(&geometry);
        self.mode.set(None);
    }

    /// Subscribe to finished geometries
    pub fn on_drawn(&self, callback: impl Fn(&Geometry) + 'static) -> Subscription {
        self.drawn.subscribe(callback)
    }
}

/// Kind-specific interaction state.
pub enum InteractionKind {
    Draw(DrawState),
    Select {
        /// Id of the scope's selection manager to drive
        selection: String,
        /// Whether modifier clicks may extend the selection
        multiple: Observable<bool>,
    },
    Hover {
        selection: String,
    },
    Generic,
}

/// A map input mode.
pub struct MapInteraction {
    id: String,
    variant: String,
    role: InteractionRole,
    pub active: Observable<bool>,
    /// Descriptor fields handed to the renderer on creation
    pub props: Observable<Value>,
    kind: InteractionKind,
    owner: OwnerSlot,
}

impl MapInteraction {
    /// Create an interaction of a registered kind. Unknown kinds only bind
    /// the active flag.
    pub fn new(id: impl Into<String>, variant: impl Into<String>) -> Rc<Self> {
        let variant = variant.into();
        let role = interaction_registry()
            .lookup(&variant)
            .map(|v| *v.payload())
            .unwrap_or(InteractionRole::Generic);
        Rc::new(Self::build(id.into(), variant, role, None))
    }

    pub fn draw(id: impl Into<String>) -> Rc<Self> {
        Rc::new(Self::build(id.into(), "draw".into(), InteractionRole::Draw, None))
    }

    /// Selection driving the scope's selection manager `selection`
    pub fn select(id: impl Into<String>, selection: &str, multiple: bool) -> Rc<Self> {
        let interaction = Self::build(
            id.into(),
            "select".into(),
            InteractionRole::Select,
            Some(selection.to_string()),
        );
        if let InteractionKind::Select { multiple: m, .. } = &interaction.kind {
            m.replace(multiple);
        }
        Rc::new(interaction)
    }

    pub fn hover(id: impl Into<String>, selection: &str) -> Rc<Self> {
        Rc::new(Self::build(
            id.into(),
            "hover".into(),
            InteractionRole::Hover,
            Some(selection.to_string()),
        ))
    }

    /// Build an interaction from a descriptor validated against the
    /// interaction registry
    pub fn from_descriptor(descriptor: &Value) -> Result<Rc<Self>, DescriptorError> {
        let variant = interaction_registry().validate(descriptor)?;
        let object = descriptor.as_object().ok_or(DescriptorError::NotAnObject)?;
        let id = object.get("id").and_then(Value::as_str).unwrap_or_default();
        let selection = object
            .get("selection")
            .and_then(Value::as_str)
            .map(str::to_string);
        let interaction = Self::build(
            id.to_string(),
            variant.name().to_string(),
            *variant.payload(),
            selection,
        );

        if let Some(active) = object.get("active").and_then(Value::as_bool) {
            interaction.active.replace(active);
        }
        match &interaction.kind {
            InteractionKind::Draw(draw) => {
                let mode = object.get("mode").and_then(Value::as_str);
                draw.mode.replace(mode.and_then(DrawMode::parse));
                if let Some(options) = object.get("options") {
                    draw.options.replace(options.clone());
                }
            }
            InteractionKind::Select { multiple, .. } => {
                if let Some(flag) = object.get("multiple").and_then(Value::as_bool) {
                    multiple.replace(flag);
                }
            }
            InteractionKind::Hover { .. } | InteractionKind::Generic => {}
        }
        interaction.props.replace(descriptor.clone());
        Ok(Rc::new(interaction))
    }

    fn build(
        id: String,
        variant: String,
        role: InteractionRole,
        selection: Option<String>,
    ) -> Self {
        let selection = selection.unwrap_or_else(|| DEFAULT_SELECTION.to_string());
        let kind = match role {
            InteractionRole::Draw => InteractionKind::Draw(DrawState::new()),
            InteractionRole::Select => InteractionKind::Select {
                selection,
                multiple: Observable::new(false),
            },
            InteractionRole::Hover => InteractionKind::Hover { selection },
            InteractionRole::Generic => InteractionKind::Generic,
        };
        Self {
            id,
            variant,
            role,
            active: Observable::new(true),
            props: Observable::new(Value::Null),
            kind,
            owner: OwnerSlot::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }

    pub fn role(&self) -> InteractionRole {
        self.role
    }

    pub fn kind(&self) -> &InteractionKind {
        &self.kind
    }

    /// Draw state of a draw interaction
    pub fn as_draw(&self) -> Option<&DrawState> {
        match &self.kind {
            InteractionKind::Draw(draw) => Some(draw),
            _ => None,
        }
    }

    /// Selection manager id of a select or hover interaction
    pub fn selection_id(&self) -> Option<&str> {
        match &self.kind {
            InteractionKind::Select { selection, .. } | InteractionKind::Hover { selection } => {
                Some(selection.as_str())
            }
            _ => None,
        }
    }
}

impl CollectionItem for MapInteraction {
    fn id(&self) -> &str {
        &self.id
    }

    fn variant(&self) -> &str {
        &self.variant
    }

    fn owner(&self) -> &OwnerSlot {
        &self.owner
    }
}

impl fmt::Debug for MapInteraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapInteraction")
            .field("id", &self.id)
            .field("variant", &self.variant)
            .field("active", &self.active.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use serde_json::json;

    #[test]
    fn test_draw_descriptor() {
        let draw = MapInteraction::from_descriptor(&json!({
            "type": "draw",
            "id": "sketch",
            "mode": "polygon",
            "active": false
        }))
        .unwrap();
        assert!(!draw.active.get());
        assert_eq!(draw.as_draw().unwrap().mode.get(), Some(DrawMode::Polygon));
    }

    #[test]
    fn test_select_descriptor_defaults() {
        let select = MapInteraction::from_descriptor(&json!({"type": "select", "id": "s"})).unwrap();
        assert_eq!(select.selection_id(), Some(DEFAULT_SELECTION));
        assert!(matches!(select.kind(), InteractionKind::Select { multiple, .. } if !multiple.get()));
    }

    #[test]
    fn test_finish_sets_target_geometry_and_leaves_draw_mode() {
        let scope = Scope::new();
        let drawings = scope.create_collection("drawings").unwrap();
        let entity = drawings.push(Entity::new("area", "polygon")).unwrap();

        let draw = MapInteraction::draw("sketch");
        let state = draw.as_draw().unwrap();
        state.start(DrawMode::Point, Some(entity.reference()));

        state.finish(Geometry::Point([3.0, 4.0]), &scope);
        assert_eq!(entity.geometry.get(), Some(Geometry::Point([3.0, 4.0])));
        assert_eq!(state.mode.get(), None);
    }
}

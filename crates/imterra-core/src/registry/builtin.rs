//! Process-wide registries for layer, entity and interaction kinds.
//!
//! Each registry starts out with the built-in kinds. Feature modules add
//! their own kinds through `register` at load time.

use std::sync::{PoisonError, RwLock};

use lazy_static::lazy_static;
use serde_json::Value;

use super::{FieldKind, FieldSpec, Shape, Variant, VariantRegistry};
use crate::error::{DescriptorError, RegistryError};

/// How the engine builds and drives a layer kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerRole {
    /// Holds an ordered collection of child layers
    Group,
    /// Tiled or image data fetched from a source url
    Source,
    /// Draws the entities of a collection as features
    Features,
    /// Draws vertical profiles of a collection's entities
    Profile,
    /// Only visibility and opacity are bound
    Plain,
}

/// How the engine builds and drives an interaction kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionRole {
    Draw,
    Select,
    Hover,
    /// Only the active flag is bound
    Generic,
}

/// A variant registry shared by the whole process.
#[derive(Debug)]
pub struct GlobalRegistry<C> {
    inner: RwLock<VariantRegistry<C>>,
}

impl<C: Clone> GlobalRegistry<C> {
    fn new(registry: VariantRegistry<C>) -> Self {
        Self {
            inner: RwLock::new(registry),
        }
    }

    /// Register a new variant kind
    pub fn register(&self, name: &str, shape: Shape, payload: C) -> Result<(), RegistryError> {
        let result = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(name, shape, payload);
        if result.is_ok() {
            tracing::debug!(registry = %self.name(), variant = name, "registered variant");
        }
        result
    }

    /// Register a nested sub-registry
    pub fn register_nested(&self, registry: VariantRegistry<C>) -> Result<(), RegistryError> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register_nested(registry)
    }

    pub fn name(&self) -> String {
        self.read(|registry| registry.name().to_string())
    }

    /// Look up a variant by name
    pub fn lookup(&self, name: &str) -> Option<Variant<C>> {
        self.read(|registry| registry.lookup(name).cloned())
    }

    /// Look up a variant, failing with `RegistryError::NotFound`
    pub fn require(&self, name: &str) -> Result<Variant<C>, RegistryError> {
        self.lookup(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Names of every variant registered so far
    pub fn variant_names(&self) -> Vec<String> {
        self.read(|registry| registry.union().names().map(str::to_string).collect())
    }

    /// Validate a descriptor and return the variant it selects
    pub fn validate(&self, descriptor: &Value) -> Result<Variant<C>, DescriptorError> {
        self.read(|registry| registry.union().validate(descriptor).cloned())
    }

    fn read<R>(&self, f: impl FnOnce(&VariantRegistry<C>) -> R) -> R {
        f(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }
}

fn source_shape(required: bool) -> Shape {
    let source = if required {
        FieldSpec::required("source", FieldKind::String)
    } else {
        FieldSpec::optional("source", FieldKind::String)
    };
    Shape::new().field(source)
}

fn builtin_layers() -> VariantRegistry<LayerRole> {
    let base = Shape::new()
        .field(FieldSpec::required("id", FieldKind::String))
        .field(FieldSpec::optional("name", FieldKind::String))
        .field(FieldSpec::optional("visible", FieldKind::Bool))
        .field(FieldSpec::optional("opacity", FieldKind::Number));
    let mut registry = VariantRegistry::new("layers", base);

    let kinds = [
        (
            "group",
            Shape::new().field(FieldSpec::optional("children", FieldKind::Array)),
            LayerRole::Group,
        ),
        ("tile", source_shape(true), LayerRole::Source),
        (
            "image",
            source_shape(true).field(FieldSpec::optional("extent", FieldKind::Array)),
            LayerRole::Source,
        ),
        ("feature", source_shape(false), LayerRole::Features),
        ("vertical-profile", source_shape(false), LayerRole::Profile),
        (
            "volume",
            source_shape(true).field(FieldSpec::optional("altitude", FieldKind::Object)),
            LayerRole::Source,
        ),
    ];
    for (name, shape, role) in kinds {
        if let Err(err) = registry.register(name, shape, role) {
            tracing::error!(%err, "built-in layer kind rejected");
        }
    }
    registry
}

fn builtin_entities() -> VariantRegistry<()> {
    let base = Shape::new()
        .field(FieldSpec::required("id", FieldKind::String))
        .field(FieldSpec::optional("visible", FieldKind::Bool))
        .field(FieldSpec::optional("geometry", FieldKind::Object))
        .field(FieldSpec::optional("style", FieldKind::Any));
    let mut registry = VariantRegistry::new("entities", base.clone());

    let with_geometry = Shape::new().field(FieldSpec::required("geometry", FieldKind::Object));
    let profile = Shape::new()
        .field(FieldSpec::required("path", FieldKind::Array))
        .field(FieldSpec::optional("altitude", FieldKind::Object));

    let mut annotations = VariantRegistry::new("annotation", base.compose(&with_geometry));
    let results = [
        registry.register("point", with_geometry.clone(), ()),
        registry.register("polygon", with_geometry.clone(), ()),
        registry.register("line", with_geometry, ()),
        registry.register("profile", profile, ()),
        annotations.register(
            "label",
            Shape::new().field(FieldSpec::required("text", FieldKind::String)),
            (),
        ),
        annotations.register(
            "marker",
            Shape::new().field(FieldSpec::optional("symbol", FieldKind::String)),
            (),
        ),
    ];
    for err in results.into_iter().filter_map(Result::err) {
        tracing::error!(%err, "built-in entity kind rejected");
    }
    if let Err(err) = registry.register_nested(annotations) {
        tracing::error!(%err, "built-in annotation registry rejected");
    }
    registry
}

fn builtin_interactions() -> VariantRegistry<InteractionRole> {
    let base = Shape::new()
        .field(FieldSpec::required("id", FieldKind::String))
        .field(FieldSpec::optional("active", FieldKind::Bool));
    let mut registry = VariantRegistry::new("interactions", base);

    let kinds = [
        (
            "draw",
            Shape::new()
                .field(FieldSpec::optional("mode", FieldKind::String))
                .field(FieldSpec::optional("options", FieldKind::Object)),
            InteractionRole::Draw,
        ),
        (
            "select",
            Shape::new()
                .field(FieldSpec::optional("selection", FieldKind::String))
                .field(FieldSpec::optional("multiple", FieldKind::Bool)),
            InteractionRole::Select,
        ),
        (
            "hover",
            Shape::new().field(FieldSpec::optional("selection", FieldKind::String)),
            InteractionRole::Hover,
        ),
        ("pan", Shape::new(), InteractionRole::Generic),
    ];
    for (name, shape, role) in kinds {
        if let Err(err) = registry.register(name, shape, role) {
            tracing::error!(%err, "built-in interaction kind rejected");
        }
    }
    registry
}

lazy_static! {
    static ref LAYERS: GlobalRegistry<LayerRole> = GlobalRegistry::new(builtin_layers());
    static ref ENTITIES: GlobalRegistry<()> = GlobalRegistry::new(builtin_entities());
    static ref INTERACTIONS: GlobalRegistry<InteractionRole> =
        GlobalRegistry::new(builtin_interactions());
}

/// Registry of layer kinds
pub fn layer_registry() -> &'static GlobalRegistry<LayerRole> {
    &LAYERS
}

/// Registry of entity kinds
pub fn entity_registry() -> &'static GlobalRegistry<()> {
    &ENTITIES
}

/// Registry of interaction kinds
pub fn interaction_registry() -> &'static GlobalRegistry<InteractionRole> {
    &INTERACTIONS
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_kinds_present() {
        let layers = layer_registry().variant_names();
        for kind in ["group", "tile", "image", "feature", "vertical-profile", "volume"] {
            assert!(layers.iter().any(|n| n == kind), "missing layer kind {kind}");
        }
        assert_eq!(
            *layer_registry().require("group").unwrap().payload(),
            LayerRole::Group
        );
        assert!(entity_registry().lookup("label").is_some());
        assert_eq!(
            *interaction_registry().require("select").unwrap().payload(),
            InteractionRole::Select
        );
    }

    #[test]
    fn test_module_registration_is_visible_in_union() {
        layer_registry()
            .register(
                "test-heatmap",
                Shape::new().field(FieldSpec::required("radius", FieldKind::Number)),
                LayerRole::Features,
            )
            .unwrap();

        let variant = layer_registry()
            .validate(&json!({"type": "test-heatmap", "id": "h", "radius": 4}))
            .unwrap();
        assert_eq!(*variant.payload(), LayerRole::Features);
        assert!(layer_registry()
            .register("test-heatmap", Shape::new(), LayerRole::Plain)
            .is_err());
    }

    #[test]
    fn test_require_unknown() {
        assert_eq!(
            interaction_registry().require("lasso").unwrap_err(),
            RegistryError::NotFound("lasso".into())
        );
    }

    #[test]
    fn test_entity_descriptor_validation() {
        let ok = json!({
            "type": "point",
            "id": "p1",
            "geometry": {"type": "Point", "coordinates": [0.0, 0.0]}
        });
        assert!(entity_registry().validate(&ok).is_ok());
        assert!(entity_registry()
            .validate(&json!({"type": "label", "id": "l", "geometry": {}}))
            .is_err());
    }
}

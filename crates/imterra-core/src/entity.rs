//! Map entities: identity-bearing, variant-tagged state nodes.

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::collection::{CollectionItem, OwnerSlot};
use crate::error::DescriptorError;
use crate::geometry::{Geometry, Profile, StyleValue};
use crate::observable::Observable;
use crate::reference::Reference;
use crate::registry::entity_registry;

/// A drawable piece of application state.
///
/// Visibility, selection and hover are independent flags. Geometry and
/// style are observed separately so a style change never touches the
/// geometry on the renderer side.
pub struct Entity {
    id: String,
    variant: String,
    pub visible: Observable<bool>,
    pub selected: Observable<bool>,
    pub hovered: Observable<bool>,
    pub geometry: Observable<Option<Geometry>>,
    pub style: Observable<StyleValue>,
    pub profile: Observable<Option<Profile>>,
    /// Kind-specific fields from the descriptor
    pub props: Observable<Value>,
    owner: OwnerSlot,
}

impl Entity {
    pub fn new(id: impl Into<String>, variant: impl Into<String>) -> Rc<Self> {
        Rc::new(Self::build(id.into(), variant.into()))
    }

    /// Entity with a geometry
    pub fn with_geometry(
        id: impl Into<String>,
        variant: impl Into<String>,
        geometry: Geometry,
    ) -> Rc<Self> {
        let entity = Self::build(id.into(), variant.into());
        entity.geometry.replace(Some(geometry));
        Rc::new(entity)
    }

    /// Entity carrying a vertical profile
    pub fn with_profile(id: impl Into<String>, profile: Profile) -> Rc<Self> {
        let entity = Self::build(id.into(), "profile".to_string());
        entity.profile.replace(Some(profile));
        Rc::new(entity)
    }

    /// Build an entity from a descriptor validated against the entity
    /// registry
    pub fn from_descriptor(descriptor: &Value) -> Result<Rc<Self>, DescriptorError> {
        let variant = entity_registry().validate(descriptor)?;
        let object = descriptor.as_object().ok_or(DescriptorError::NotAnObject)?;
        let id = object.get("id").and_then(Value::as_str).unwrap_or_default();
        let entity = Self::build(id.to_string(), variant.name().to_string());

        if let Some(visible) = object.get("visible").and_then(Value::as_bool) {
            entity.visible.replace(visible);
        }
        if let Some(geometry) = object.get("geometry") {
            let geometry = serde_json::from_value::<Geometry>(geometry.clone())
                .map_err(|e| invalid(variant.name(), "geometry", e))?;
            entity.geometry.replace(Some(geometry));
        }
        if let Some(style) = object.get("style").filter(|s| !s.is_null()) {
            let style = serde_json::from_value::<StyleValue>(style.clone())
                .map_err(|e| invalid(variant.name(), "style", e))?;
            entity.style.replace(style);
        }
        if object.contains_key("path") {
            let profile = serde_json::from_value::<Profile>(descriptor.clone())
                .map_err(|e| invalid(variant.name(), "path", e))?;
            entity.profile.replace(Some(profile));
        }
        entity.props.replace(descriptor.clone());
        Ok(Rc::new(entity))
    }

    fn build(id: String, variant: String) -> Self {
        Self {
            id,
            variant,
            visible: Observable::new(true),
            selected: Observable::new(false),
            hovered: Observable::new(false),
            geometry: Observable::new(None),
            style: Observable::default(),
            profile: Observable::new(None),
            props: Observable::new(Value::Null),
            owner: OwnerSlot::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }

    /// Reference to this entity as it is placed right now
    pub fn reference(&self) -> Reference {
        Reference::of(self)
    }

    /// Id of the owning collection, if any
    pub fn collection_id(&self) -> Option<String> {
        self.owner.get()
    }
}

fn invalid(variant: &str, field: &str, err: serde_json::Error) -> DescriptorError {
    DescriptorError::Invalid {
        variant: variant.to_string(),
        errors: vec![crate::error::ValidationError {
            field: field.to_string(),
            message: err.to_string(),
        }],
    }
}

impl CollectionItem for Entity {
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

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("variant", &self.variant)
            .field("collection", &self.owner.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::Collection;
    use serde_json::json;

    #[test]
    fn test_reference_tracks_membership() {
        let entity = Entity::new("e1", "point");
        assert_eq!(entity.reference(), Reference::free("e1"));

        let drawings = Collection::new("drawings");
        drawings.push(Rc::clone(&entity));
        assert_eq!(entity.reference().to_token(), "e1|point|drawings");

        drawings.remove(&entity);
        assert_eq!(entity.reference().to_token(), "e1");
    }

    #[test]
    fn test_from_descriptor() {
        let entity = Entity::from_descriptor(&json!({
            "type": "polygon",
            "id": "area",
            "visible": false,
            "geometry": {"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [0.0, 0.0]]]},
            "style": [{"stroke": "red"}, {"stroke": "blue"}]
        }))
        .unwrap();

        assert_eq!(entity.id(), "area");
        assert_eq!(entity.variant(), "polygon");
        assert!(!entity.visible.get());
        assert!(matches!(entity.geometry.get(), Some(Geometry::Polygon(_))));
        assert!(matches!(entity.style.get(), StyleValue::List(ref l) if l.len() == 2));
    }

    #[test]
    fn test_from_descriptor_rejects_bad_geometry() {
        let err = Entity::from_descriptor(&json!({
            "type": "point",
            "id": "p",
            "geometry": {"type": "Blob", "coordinates": []}
        }))
        .unwrap_err();
        assert!(matches!(err, DescriptorError::Invalid { ref errors, .. } if errors[0].field == "geometry"));
    }

    #[test]
    fn test_profile_descriptor() {
        let entity = Entity::from_descriptor(&json!({
            "type": "profile",
            "id": "transect",
            "path": [[0.0, 0.0], [5.0, 5.0]],
            "altitude": {"start": 0.0, "end": 3000.0}
        }))
        .unwrap();
        let profile = entity.profile.get().unwrap();
        assert_eq!(profile.path.len(), 2);
        assert_eq!(profile.altitude.end, 3000.0);
    }
}

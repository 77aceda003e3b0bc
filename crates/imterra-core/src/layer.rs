//! Map layers.
//!
//! A layer is a variant-tagged node. Every layer has a name, visibility,
//! opacity and a loading flag; what else it carries depends on its
//! [`LayerRole`]. Group layers hold their children in a
//! [`Collection`], so moving a layer between groups is a removal from
//! one collection and an insertion into another.

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::collection::{Collection, CollectionItem, OwnerSlot};
use crate::error::{DescriptorError, RegistryError, ValidationError};
use crate::geometry::{Coord, Range};
use crate::observable::{Emitter, Observable, Subscription};
use crate::registry::{layer_registry, LayerRole};

/// Kind-specific layer state.
pub enum LayerKind {
    Group {
        children: Collection<MapLayer>,
    },
    Source {
        /// Url or other locator of the remote data
        source: Observable<String>,
    },
    Features {
        /// Id of the entity collection to draw
        source: Observable<Option<String>>,
    },
    Profile {
        /// Id of the entity collection whose profiles are drawn
        source: Observable<Option<String>>,
        /// Map coordinate under the pointer
        highlighted: Observable<Option<Coord>>,
        /// Map coordinate picked by the user
        selected: Observable<Option<Coord>>,
        /// Altitude band to mark
        region: Observable<Option<Range>>,
    },
    Plain,
}

impl LayerKind {
    fn for_role(role: LayerRole, id: &str) -> Self {
        match role {
            LayerRole::Group => LayerKind::Group {
                children: Collection::new(format!("{id}/children")),
            },
            LayerRole::Source => LayerKind::Source {
                source: Observable::new(String::new()),
            },
            LayerRole::Features => LayerKind::Features {
                source: Observable::new(None),
            },
            LayerRole::Profile => LayerKind::Profile {
                source: Observable::new(None),
                highlighted: Observable::new(None),
                selected: Observable::new(None),
                region: Observable::new(None),
            },
            LayerRole::Plain => LayerKind::Plain,
        }
    }
}

/// A node of the layer tree.
pub struct MapLayer {
    id: String,
    variant: String,
    role: LayerRole,
    pub name: Observable<String>,
    pub visible: Observable<bool>,
    pub opacity: Observable<f64>,
    pub loading: Observable<bool>,
    /// Descriptor fields handed to the renderer on creation
    pub props: Observable<Value>,
    kind: LayerKind,
    refresh: Emitter<()>,
    owner: OwnerSlot,
}

impl MapLayer {
    /// Create a layer of a registered kind. Unknown kinds become plain
    /// layers.
    pub fn new(id: impl Into<String>, variant: impl Into<String>) -> Rc<Self> {
        let variant = variant.into();
        let role = layer_registry()
            .lookup(&variant)
            .map(|v| *v.payload())
            .unwrap_or(LayerRole::Plain);
        Rc::new(Self::build(id.into(), variant, role))
    }

    /// An empty group
    pub fn group(id: impl Into<String>) -> Rc<Self> {
        Rc::new(Self::build(id.into(), "group".into(), LayerRole::Group))
    }

    /// An empty group together with its child collection
    pub(crate) fn group_with_children(id: impl Into<String>) -> (Rc<Self>, Collection<MapLayer>) {
        let id = id.into();
        let children = Collection::new(format!("{id}/children"));
        let mut layer = Self::build(id, "group".into(), LayerRole::Plain);
        layer.role = LayerRole::Group;
        layer.kind = LayerKind::Group {
            children: children.clone(),
        };
        (Rc::new(layer), children)
    }

    /// A tile layer reading from `url`
    pub fn tile(id: impl Into<String>, url: impl Into<String>) -> Rc<Self> {
        let layer = Self::build(id.into(), "tile".into(), LayerRole::Source);
        layer.set_source_url(url.into());
        Rc::new(layer)
    }

    /// An image layer reading from `url`
    pub fn image(id: impl Into<String>, url: impl Into<String>) -> Rc<Self> {
        let layer = Self::build(id.into(), "image".into(), LayerRole::Source);
        layer.set_source_url(url.into());
        Rc::new(layer)
    }

    /// A feature layer drawing entity collection `source`
    pub fn feature(id: impl Into<String>, source: Option<&str>) -> Rc<Self> {
        let layer = Self::build(id.into(), "feature".into(), LayerRole::Features);
        if let Some(source_id) = layer.source_collection() {
            source_id.replace(source.map(str::to_string));
        }
        Rc::new(layer)
    }

    /// A vertical-profile layer drawing entity collection `source`
    pub fn vertical_profile(id: impl Into<String>, source: Option<&str>) -> Rc<Self> {
        let layer = Self::build(id.into(), "vertical-profile".into(), LayerRole::Profile);
        if let Some(source_id) = layer.source_collection() {
            source_id.replace(source.map(str::to_string));
        }
        Rc::new(layer)
    }

    /// Build a layer tree from a descriptor. Group children are built
    /// recursively from the `children` array.
    pub fn from_descriptor(descriptor: &Value) -> Result<Rc<Self>, DescriptorError> {
        let variant = layer_registry().validate(descriptor)?;
        let object = descriptor.as_object().ok_or(DescriptorError::NotAnObject)?;
        let id = object.get("id").and_then(Value::as_str).unwrap_or_default();
        let layer = Self::build(id.to_string(), variant.name().to_string(), *variant.payload());

        if let Some(name) = object.get("name").and_then(Value::as_str) {
            layer.name.replace(name.to_string());
        }
        if let Some(visible) = object.get("visible").and_then(Value::as_bool) {
            layer.visible.replace(visible);
        }
        if let Some(opacity) = object.get("opacity").and_then(Value::as_f64) {
            layer.opacity.replace(opacity.clamp(0.0, 1.0));
        }
        let source = object.get("source").and_then(Value::as_str);
        match &layer.kind {
            LayerKind::Source { source: url } => {
                url.replace(source.unwrap_or_default().to_string());
            }
            LayerKind::Features { source: collection }
            | LayerKind::Profile {
                source: collection, ..
            } => {
                collection.replace(source.map(str::to_string));
            }
            LayerKind::Group { children } => {
                let nested = object.get("children").and_then(Value::as_array);
                for (index, child) in nested.into_iter().flatten().enumerate() {
                    let invalid = |message: String| DescriptorError::Invalid {
                        variant: variant.name().to_string(),
                        errors: vec![ValidationError {
                            field: format!("children[{index}]"),
                            message,
                        }],
                    };
                    let child =
                        Self::from_descriptor(child).map_err(|err| invalid(err.to_string()))?;
                    let child_id = child.id().to_string();
                    if children.push(child).is_none() {
                        let duplicate = RegistryError::DuplicateId {
                            collection: children.id().to_string(),
                            id: child_id,
                        };
                        return Err(invalid(duplicate.to_string()));
                    }
                }
            }
            LayerKind::Plain => {}
        }
        layer.props.replace(descriptor.clone());
        Ok(Rc::new(layer))
    }

    fn build(id: String, variant: String, role: LayerRole) -> Self {
        Self {
            kind: LayerKind::for_role(role, &id),
            name: Observable::new(id.clone()),
            id,
            variant,
            role,
            visible: Observable::new(true),
            opacity: Observable::new(1.0),
            loading: Observable::new(false),
            props: Observable::new(Value::Null),
            refresh: Emitter::new(),
            owner: OwnerSlot::new(),
        }
    }

    fn set_source_url(&self, url: String) {
        if let LayerKind::Source { source } = &self.kind {
            source.replace(url);
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }

    pub fn role(&self) -> LayerRole {
        self.role
    }

    pub fn kind(&self) -> &LayerKind {
        &self.kind
    }

    /// Children of a group layer
    pub fn children(&self) -> Option<&Collection<MapLayer>> {
        match &self.kind {
            LayerKind::Group { children } => Some(children),
            _ => None,
        }
    }

    /// Source locator of a source layer
    pub fn source_url(&self) -> Option<&Observable<String>> {
        match &self.kind {
            LayerKind::Source { source } => Some(source),
            _ => None,
        }
    }

    /// Entity collection id of a feature or profile layer
    pub fn source_collection(&self) -> Option<&Observable<Option<String>>> {
        match &self.kind {
            LayerKind::Features { source } | LayerKind::Profile { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Ask the renderer to drop cached data and reload
    pub fn request_refresh(&self) {
        self.refresh.emit(&());
    }

    /// Subscribe to refresh requests
    pub fn on_refresh(&self, callback: impl Fn() + 'static) -> Subscription {
        self.refresh.subscribe(move |_| callback())
    }

    /// Depth-first search of this subtree
    pub fn find(self: &Rc<Self>, id: &str) -> Option<Rc<MapLayer>> {
        if self.id == id {
            return Some(Rc::clone(self));
        }
        self.children()?
            .snapshot()
            .iter()
            .find_map(|child| child.find(id))
    }
}

impl CollectionItem for MapLayer {
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

impl fmt::Debug for MapLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapLayer")
            .field("id", &self.id)
            .field("variant", &self.variant)
            .field("role", &self.role)
            .finish()
    }
}

/// Move `layer` into `target` at `index`: removal from its current group
/// first, then insertion.
pub fn move_to_group(
    layer: &Rc<MapLayer>,
    from: &Collection<MapLayer>,
    target: &Collection<MapLayer>,
    index: usize,
) -> bool {
    if !from.remove(layer) {
        return false;
    }
    !target.add_at([Rc::clone(layer)], index).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    #[test]
    fn test_descriptor_tree() {
        let root = MapLayer::from_descriptor(&json!({
            "type": "group",
            "id": "root",
            "children": [
                {"type": "tile", "id": "osm", "source": "https://tile.example/{z}/{x}/{y}.png", "opacity": 0.5},
                {"type": "feature", "id": "drawings", "source": "drawings", "visible": false}
            ]
        }))
        .unwrap();

        let children = root.children().unwrap();
        assert_eq!(children.ids(), vec!["osm", "drawings"]);
        let osm = root.find("osm").unwrap();
        assert_eq!(osm.role(), LayerRole::Source);
        assert_eq!(osm.opacity.get(), 0.5);
        assert!(osm.source_url().unwrap().get().starts_with("https://"));

        let drawings = root.find("drawings").unwrap();
        assert!(!drawings.visible.get());
        assert_eq!(
            drawings.source_collection().unwrap().get().as_deref(),
            Some("drawings")
        );
    }

    #[test]
    fn test_invalid_child_reports_index() {
        let err = MapLayer::from_descriptor(&json!({
            "type": "group",
            "id": "root",
            "children": [{"type": "tile", "id": "no-source"}]
        }))
        .unwrap_err();
        match err {
            DescriptorError::Invalid { errors, .. } => assert_eq!(errors[0].field, "children[0]"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_child_id_is_rejected() {
        let err = MapLayer::from_descriptor(&json!({
            "type": "group",
            "id": "root",
            "children": [
                {"type": "tile", "id": "osm", "source": "a"},
                {"type": "tile", "id": "osm", "source": "b"}
            ]
        }))
        .unwrap_err();
        match err {
            DescriptorError::Invalid { errors, .. } => {
                assert_eq!(errors[0].field, "children[1]");
                assert!(errors[0].message.contains("osm"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_kind_is_plain() {
        let layer = MapLayer::new("x", "not-registered");
        assert_eq!(layer.role(), LayerRole::Plain);
        assert!(layer.children().is_none());
    }

    #[test]
    fn test_refresh_requests() {
        let layer = MapLayer::tile("osm", "u");
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let _sub = layer.on_refresh(move || c.set(c.get() + 1));
        layer.request_refresh();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_move_to_group() {
        let a = MapLayer::group("a");
        let b = MapLayer::group("b");
        let child = MapLayer::tile("t", "u");
        a.children().unwrap().push(Rc::clone(&child));

        assert!(move_to_group(&child, a.children().unwrap(), b.children().unwrap(), 0));
        assert!(a.children().unwrap().is_empty());
        assert_eq!(b.children().unwrap().ids(), vec!["t"]);
    }
}

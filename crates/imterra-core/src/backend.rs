//! Contract between the engine and a rendering backend.
//!
//! The engine never talks to a concrete renderer. It asks a
//! [`RendererFactory`] for a [`MapRenderer`] and drives it through the
//! handle traits below. Backends identify features by plain string ids;
//! mapping those ids back to application state is the engine's job.
//!
//! Every factory method may return `None` (unknown variant, unsupported
//! projection). The engine then leaves the corresponding state inert.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::geometry::{Coord, Geometry, Profile, ProfilePosition, Range, Style};
use crate::selection::SelectMode;
use crate::view::{Extent, ViewEvent, Viewport};

/// Which backend to instantiate, with backend-specific properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendererDescriptor {
    pub id: String,
    #[serde(default)]
    pub props: Value,
}

impl RendererDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            props: Value::Null,
        }
    }

    pub fn with_props(id: impl Into<String>, props: Value) -> Self {
        Self {
            id: id.into(),
            props,
        }
    }
}

/// Callback for view events
pub type ViewHandler = Rc<dyn Fn(&ViewEvent)>;

/// Callback for interaction events
pub type InteractionHandler = Rc<dyn Fn(&InteractionEvent)>;

/// Callback for source loading state
pub type LoadingHandler = Rc<dyn Fn(bool)>;

/// Creates renderer backends.
pub trait RendererFactory {
    /// Build a renderer for `descriptor` in `projection`
    fn create(&self, descriptor: &RendererDescriptor, projection: &str)
        -> Option<Rc<dyn MapRenderer>>;
}

/// A live map renderer.
pub trait MapRenderer {
    /// Descriptor id this renderer was created for
    fn id(&self) -> &str;

    /// Create the renderer object for a layer of kind `variant`
    fn create_layer(&self, variant: &str, layer_id: &str, props: &Value)
        -> Option<Rc<dyn LayerHandle>>;

    /// Create the input handler for an interaction of kind `variant`
    fn create_interaction(
        &self,
        variant: &str,
        interaction_id: &str,
        props: &Value,
    ) -> Option<Rc<dyn InteractionHandle>>;

    fn set_viewport(&self, viewport: &Viewport);

    /// Install the root layer group
    fn set_layer_group(&self, group: Option<Rc<dyn LayerHandle>>);

    fn viewport_extent(&self) -> Option<Extent>;

    /// Install the callback for view events; `None` removes it
    fn set_view_handler(&self, handler: Option<ViewHandler>);

    fn destroy(&self);
}

/// Renderer object for one layer.
pub trait LayerHandle {
    fn layer_id(&self) -> &str;

    fn set_visible(&self, visible: bool);

    fn set_opacity(&self, opacity: f64);

    fn destroy(&self);

    fn as_group(&self) -> Option<&dyn GroupLayerHandle> {
        None
    }

    fn as_features(&self) -> Option<&dyn FeatureLayerHandle> {
        None
    }

    fn as_source(&self) -> Option<&dyn SourceLayerHandle> {
        None
    }

    fn as_profile(&self) -> Option<&dyn ProfileLayerHandle> {
        None
    }
}

impl fmt::Debug for dyn LayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LayerHandle").field(&self.layer_id()).finish()
    }
}

/// Group layers hold other layer objects in draw order.
pub trait GroupLayerHandle {
    fn add_layer(&self, layer: Rc<dyn LayerHandle>, index: usize);

    fn remove_layer(&self, layer: &Rc<dyn LayerHandle>);
}

/// Layers that draw individual features.
pub trait FeatureLayerHandle {
    fn add_feature(&self, id: &str, geometry: &Geometry, style: &Style);

    fn update_feature_geometry(&self, id: &str, geometry: &Geometry);

    fn update_feature_style(&self, id: &str, style: &Style);

    fn remove_feature(&self, id: &str);
}

/// Tiled and image layers backed by a remote source.
pub trait SourceLayerHandle {
    fn update_source(&self, source: &str);

    /// Drop cached data and reload
    fn force_refresh(&self);

    /// Install the callback reporting whether the source is loading
    fn set_loading_handler(&self, handler: Option<LoadingHandler>);
}

/// Layers that draw vertical profiles.
pub trait ProfileLayerHandle {
    fn add_profile(&self, id: &str, profile: &Profile, style: &Style);

    fn update_profile(&self, id: &str, profile: &Profile);

    fn update_profile_style(&self, id: &str, style: &Style);

    fn remove_profile(&self, id: &str);

    /// Position on profile `id` under the pointer
    fn set_highlighted(&self, id: &str, position: Option<&ProfilePosition>);

    /// Position on profile `id` the user picked
    fn set_selected(&self, id: &str, position: Option<&ProfilePosition>);

    /// Altitude band to mark on every profile
    fn set_region(&self, region: Option<Range>);
}

/// Renderer-side input handler for one interaction.
pub trait InteractionHandle {
    fn set_active(&self, active: bool);

    fn destroy(&self);

    /// Install the callback for events this handler emits
    fn set_event_handler(&self, handler: Option<InteractionHandler>);

    fn as_draw(&self) -> Option<&dyn DrawInteractionHandle> {
        None
    }
}

/// Shapes a draw interaction can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawMode {
    Point,
    Line,
    Polygon,
    Box,
    Circle,
}

impl DrawMode {
    pub fn parse(name: &str) -> Option<Self> {
        serde_json::from_value(Value::String(name.to_lowercase())).ok()
    }
}

/// Draw-specific primitives.
pub trait DrawInteractionHandle {
    /// Start drawing `mode` with backend options; `None` stops drawing
    fn set_mode(&self, mode: Option<DrawMode>, options: &Value);
}

/// Events emitted by interaction handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionEvent {
    /// Pointer is over feature `id`, or over nothing
    FeatureHover {
        id: Option<String>,
        coord: Option<Coord>,
    },
    /// Feature `id` was clicked, or empty space when `None`
    FeatureSelect {
        id: Option<String>,
        mode: SelectMode,
    },
    /// A draw gesture finished
    DrawEnd { geometry: Geometry },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_mode_parse() {
        assert_eq!(DrawMode::parse("Polygon"), Some(DrawMode::Polygon));
        assert_eq!(DrawMode::parse("lasso"), None);
    }

    #[test]
    fn test_descriptor_props_default() {
        let descriptor: RendererDescriptor = serde_json::from_str(r#"{"id": "webgl"}"#).unwrap();
        assert_eq!(descriptor, RendererDescriptor::new("webgl"));
    }
}

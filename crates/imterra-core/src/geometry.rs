//! Geometry, style and profile values carried by map entities.

use serde::{Deserialize, Serialize};

/// Map coordinate `[x, y]` in the map projection's units
pub type Coord = [f64; 2];

/// GeoJSON-style geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Coord),
    MultiPoint(Vec<Coord>),
    LineString(Vec<Coord>),
    MultiLineString(Vec<Vec<Coord>>),
    Polygon(Vec<Vec<Coord>>),
    MultiPolygon(Vec<Vec<Vec<Coord>>>),
    #[serde(rename = "GeometryCollection")]
    Collection(Vec<Geometry>),
}

impl Geometry {
    /// Whether the renderer can draw this geometry as one feature
    pub fn is_simple(&self) -> bool {
        !matches!(self, Geometry::Collection(_))
    }

    /// Sub-geometries of a collection, `None` for simple geometries
    pub fn members(&self) -> Option<&[Geometry]> {
        match self {
            Geometry::Collection(members) => Some(members),
            _ => None,
        }
    }

    /// Name used in logs and descriptors
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::MultiPoint(_) => "MultiPoint",
            Geometry::LineString(_) => "LineString",
            Geometry::MultiLineString(_) => "MultiLineString",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
            Geometry::Collection(_) => "GeometryCollection",
        }
    }
}

/// Drawing style for one renderer-side feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Style {
    /// Stroke color (CSS color string)
    pub stroke: String,
    /// Stroke width in pixels
    pub stroke_width: f64,
    /// Fill color, if filled
    pub fill: Option<String>,
    /// Point radius in pixels
    pub point_radius: f64,
    /// Optional text label
    pub label: Option<String>,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            stroke: "#3399cc".to_string(),
            stroke_width: 1.25,
            fill: Some("rgba(255,255,255,0.4)".to_string()),
            point_radius: 5.0,
            label: None,
        }
    }
}

/// Style assigned to an entity: one style for everything, or one per
/// sub-geometry of a geometry collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StyleValue {
    Single(Style),
    List(Vec<Style>),
}

impl Default for StyleValue {
    fn default() -> Self {
        StyleValue::Single(Style::default())
    }
}

impl StyleValue {
    /// Style for the whole entity. A list contributes its first entry.
    pub fn primary(&self) -> Style {
        match self {
            StyleValue::Single(style) => style.clone(),
            StyleValue::List(styles) => styles.first().cloned().unwrap_or_default(),
        }
    }

    /// Style for sub-geometry `index`. Falls back to the primary style when
    /// the list is shorter than the geometry collection.
    pub fn for_member(&self, index: usize) -> Style {
        match self {
            StyleValue::Single(style) => style.clone(),
            StyleValue::List(styles) => styles
                .get(index)
                .cloned()
                .unwrap_or_else(|| self.primary()),
        }
    }
}

/// Inclusive range along an axis
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub start: f64,
    pub end: f64,
}

impl Range {
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }
}

/// A vertical profile: a curtain standing on a path, between a bottom and
/// a top altitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Path the curtain stands on
    pub path: Vec<Coord>,
    /// Altitude span of the curtain
    #[serde(default)]
    pub altitude: Range,
}

/// A map coordinate projected onto a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilePosition {
    /// Distance from the start of the profile path
    pub distance: f64,
    /// Closest point on the path
    pub coord: Coord,
}

impl Profile {
    pub fn new(path: Vec<Coord>, altitude: Range) -> Self {
        Self { path, altitude }
    }

    /// Total length of the profile path
    pub fn length(&self) -> f64 {
        self.path
            .windows(2)
            .map(|w| distance(w[0], w[1]))
            .sum()
    }

    /// Project `coord` onto the profile path.
    ///
    /// Returns the closest point on the path and its distance from the
    /// start; `None` for an empty path.
    pub fn project(&self, coord: Coord) -> Option<ProfilePosition> {
        match self.path.as_slice() {
            [] => None,
            [only] => Some(ProfilePosition {
                distance: 0.0,
                coord: *only,
            }),
            path => {
                let mut best: Option<(f64, ProfilePosition)> = None;
                let mut travelled = 0.0;
                for w in path.windows(2) {
                    let (a, b) = (w[0], w[1]);
                    let segment = distance(a, b);
                    let t = if segment == 0.0 {
                        0.0
                    } else {
                        (((coord[0] - a[0]) * (b[0] - a[0]) + (coord[1] - a[1]) * (b[1] - a[1]))
                            / (segment * segment))
                            .clamp(0.0, 1.0)
                    };
                    let closest = [a[0] + t * (b[0] - a[0]), a[1] + t * (b[1] - a[1])];
                    let offset = distance(coord, closest);
                    if best.as_ref().map_or(true, |(d, _)| offset < *d) {
                        best = Some((
                            offset,
                            ProfilePosition {
                                distance: travelled + t * segment,
                                coord: closest,
                            },
                        ));
                    }
                    travelled += segment;
                }
                best.map(|(_, position)| position)
            }
        }
    }
}

fn distance(a: Coord, b: Coord) -> f64 {
    ((b[0] - a[0]).powi(2) + (b[1] - a[1]).powi(2)).sqrt()
}

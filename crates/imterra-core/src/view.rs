//! View state: projection, viewport and the renderer's busy flag.

use serde::{Deserialize, Serialize};

use crate::geometry::Coord;
use crate::observable::Observable;

/// Projection used when none is given
pub const DEFAULT_PROJECTION: &str = "EPSG:3857";

/// What the map shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Viewport {
    /// Center in projection units
    pub center: Coord,
    /// Projection units per pixel
    pub resolution: f64,
    /// Rotation in radians
    pub rotation: f64,
    /// Camera pitch in degrees, 0 looks straight down
    pub pitch: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            center: [0.0, 0.0],
            resolution: 156_543.033_928_041,
            rotation: 0.0,
            pitch: 0.0,
        }
    }
}

impl Viewport {
    pub fn centered(center: Coord, resolution: f64) -> Self {
        Self {
            center,
            resolution,
            ..Self::default()
        }
    }
}

/// Visible extent reported by a renderer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min: Coord,
    pub max: Coord,
}

impl Extent {
    pub fn contains(&self, coord: Coord) -> bool {
        (self.min[0]..=self.max[0]).contains(&coord[0])
            && (self.min[1]..=self.max[1]).contains(&coord[1])
    }
}

/// Events a renderer reports about its view.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// The user panned, zoomed or rotated
    ViewportChanged(Viewport),
    /// The renderer started or stopped animating or loading
    UpdatingChanged(bool),
}

/// Observable view state of a map.
#[derive(Debug, Clone)]
pub struct ViewState {
    pub projection: Observable<String>,
    pub viewport: Observable<Viewport>,
    pub updating: Observable<bool>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            projection: Observable::new(DEFAULT_PROJECTION.to_string()),
            viewport: Observable::default(),
            updating: Observable::new(false),
        }
    }
}

//! Geometry payloads for spatial predicates and feature envelopes.
//!
//! Geometry algorithms are delegated to the spatial database; this module
//! only carries coordinates to the SQL layer.

use serde::{Deserialize, Serialize};

/// A 2D bounding box with an optional SRID.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srid: Option<i32>,
}

impl Envelope {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
            srid: None,
        }
    }

    pub fn with_srid(mut self, srid: i32) -> Self {
        self.srid = Some(srid);
        self
    }

    /// Corners are ordered and all coordinates finite.
    pub fn is_valid(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|c| c.is_finite())
            && self.min_x <= self.max_x
            && self.min_y <= self.max_y
    }

    /// Lower-left / upper-right ordinates in x1, y1, x2, y2 order.
    pub fn ordinates(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    /// Compact text form used when an envelope is stored as a plain column.
    pub fn to_wkt(&self) -> String {
        format!(
            "POLYGON(({x1} {y1}, {x2} {y1}, {x2} {y2}, {x1} {y2}, {x1} {y1}))",
            x1 = self.min_x,
            y1 = self.min_y,
            x2 = self.max_x,
            y2 = self.max_y
        )
    }
}

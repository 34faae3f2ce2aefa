use crate::geom::{BBox, Point};
use geo::Polygon;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Detector categories that count as parked vehicles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Car,
    Truck,
    Bus,
    Motorbike,
    Bicycle,
    Van,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 6] = [
        VehicleClass::Car,
        VehicleClass::Truck,
        VehicleClass::Bus,
        VehicleClass::Motorbike,
        VehicleClass::Bicycle,
        VehicleClass::Van,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleClass::Car => "car",
            VehicleClass::Truck => "truck",
            VehicleClass::Bus => "bus",
            VehicleClass::Motorbike => "motorbike",
            VehicleClass::Bicycle => "bicycle",
            VehicleClass::Van => "van",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(label))
    }
}

/// One object as reported by the external detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub label: String,
    pub confidence: f64,
    pub bbox: BBox,
    pub contour: Option<Vec<Point>>,
}

/// The detector's result set for a single image.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectorOutput {
    pub detections: Vec<RawDetection>,
}

impl DetectorOutput {
    /// True when the detector produced instance contours for this batch.
    pub fn has_segmentation(&self) -> bool {
        self.detections.iter().any(|d| d.contour.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometrySource {
    Segmentation,
    BoundingBox,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VehicleDetection {
    pub class: VehicleClass,
    pub geometry: Polygon<f64>,
    pub source: GeometrySource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stall {
    pub id: String,
    pub boundary: Polygon<f64>,
}

impl Stall {
    pub fn new(id: impl Into<String>, boundary: Polygon<f64>) -> Self {
        Self {
            id: id.into(),
            boundary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OccupancyStatus {
    Occupied,
    Free,
}

impl OccupancyStatus {
    pub fn is_occupied(&self) -> bool {
        matches!(self, OccupancyStatus::Occupied)
    }
}

/// Why a stall was scored without a real overlap measurement.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StallFault {
    #[error("stall boundary has non-finite coordinates")]
    NonFiniteBoundary,
    #[error("overlap computation produced a non-finite area")]
    NonFiniteArea,
    #[error("geometry backend panicked: {0}")]
    BackendPanic(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyResult {
    pub stall_id: String,
    pub status: OccupancyStatus,
    pub overlap_ratio: f64,
    /// The inset boundary came out empty and the original boundary was used.
    pub inset_fallback: bool,
    /// Set when the stall was defaulted to free after a geometry failure.
    pub fault: Option<StallFault>,
}

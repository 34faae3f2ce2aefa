use crate::model::OccupancyStatus;
use crate::occupancy::Occupancy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StallReport {
    pub stall_id: String,
    pub status: OccupancyStatus,
    /// Overlap ratio rounded to 3 decimals.
    pub overlap: f64,
}

/// Machine-readable result of one image's occupancy pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub image: String,
    pub total: usize,
    pub stalls: Vec<StallReport>,
    pub occupied: usize,
    pub free: usize,
}

impl RunSummary {
    pub fn new(image: impl Into<String>, occupancy: &Occupancy) -> Self {
        let stalls = occupancy
            .results
            .iter()
            .map(|r| StallReport {
                stall_id: r.stall_id.clone(),
                status: r.status,
                overlap: round3(r.overlap_ratio),
            })
            .collect();

        Self {
            image: image.into(),
            total: occupancy.total(),
            stalls,
            occupied: occupancy.occupied(),
            free: occupancy.free(),
        }
    }
}

pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

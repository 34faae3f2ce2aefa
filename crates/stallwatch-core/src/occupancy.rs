use crate::geom::is_finite_polygon;
use crate::model::{OccupancyResult, OccupancyStatus, Stall, StallFault, VehicleDetection};
use geo::{Area, BooleanOps, Buffer, MultiPolygon, Polygon};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Floor for the stall area denominator.
pub const AREA_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct OccupancyConfig {
    /// Minimum `area(stall ∩ vehicles) / area(stall)` to call a stall occupied.
    pub overlap_thresh: f64,
    /// Pixels to shrink each stall by before measuring overlap.
    pub stall_inset: f64,
}

impl Default for OccupancyConfig {
    fn default() -> Self {
        Self {
            overlap_thresh: 0.15,
            stall_inset: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("overlap_thresh must be within [0, 1], got {0}")]
    OverlapThreshold(f64),
    #[error("stall_inset must be finite and >= 0, got {0}")]
    StallInset(f64),
}

impl OccupancyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.overlap_thresh) {
            return Err(ConfigError::OverlapThreshold(self.overlap_thresh));
        }
        if !self.stall_inset.is_finite() || self.stall_inset < 0.0 {
            return Err(ConfigError::StallInset(self.stall_inset));
        }
        Ok(())
    }
}

/// Per-stall results plus the aggregate counts for one image.
#[derive(Debug, Clone, Default)]
pub struct Occupancy {
    pub results: Vec<OccupancyResult>,
}

impl Occupancy {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn occupied(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status.is_occupied())
            .count()
    }

    pub fn free(&self) -> usize {
        self.total() - self.occupied()
    }
}

/// Inclusive threshold test.
pub fn classify_overlap(overlap: f64, overlap_thresh: f64) -> OccupancyStatus {
    if overlap >= overlap_thresh {
        OccupancyStatus::Occupied
    } else {
        OccupancyStatus::Free
    }
}

/// Union of all vehicle footprints, or `None` when there are no vehicles.
pub fn union_vehicles(vehicles: &[VehicleDetection]) -> Option<MultiPolygon<f64>> {
    if vehicles.is_empty() {
        return None;
    }
    let union = vehicles
        .iter()
        .fold(MultiPolygon::<f64>::new(Vec::new()), |acc, v| acc.union(&v.geometry));
    Some(union)
}

pub struct OccupancyClassifier {
    cfg: OccupancyConfig,
}

struct Measured {
    overlap: f64,
    inset_fallback: bool,
}

impl OccupancyClassifier {
    pub fn new(cfg: OccupancyConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    /// Scores every stall against the union of `vehicles`. Always returns one
    /// result per stall, in input order.
    pub fn classify(&self, vehicles: &[VehicleDetection], stalls: &[Stall]) -> Occupancy {
        let cars = match guarded(|| union_vehicles(vehicles)) {
            Ok(cars) => cars,
            Err(fault) => {
                warn!(
                    %fault,
                    vehicles = vehicles.len(),
                    "vehicle union failed; all stalls default to free"
                );
                return Occupancy {
                    results: stalls
                        .iter()
                        .map(|s| self.faulted(s, fault.clone()))
                        .collect(),
                };
            }
        };

        let results: Vec<_> = stalls
            .iter()
            .map(|stall| self.assess(stall, cars.as_ref()))
            .collect();
        let occupancy = Occupancy { results };
        info!(
            total = occupancy.total(),
            occupied = occupancy.occupied(),
            free = occupancy.free(),
            "classified stalls"
        );
        occupancy
    }

    fn assess(&self, stall: &Stall, cars: Option<&MultiPolygon<f64>>) -> OccupancyResult {
        let Some(cars) = cars else {
            return OccupancyResult {
                stall_id: stall.id.clone(),
                status: OccupancyStatus::Free,
                overlap_ratio: 0.0,
                inset_fallback: false,
                fault: None,
            };
        };

        match guarded(|| self.measure(stall, cars)).and_then(|r| r) {
            Ok(m) => OccupancyResult {
                stall_id: stall.id.clone(),
                status: classify_overlap(m.overlap, self.cfg.overlap_thresh),
                overlap_ratio: m.overlap,
                inset_fallback: m.inset_fallback,
                fault: None,
            },
            Err(fault) => {
                warn!(stall_id = %stall.id, %fault, "overlap failed; classifying stall as free");
                self.faulted(stall, fault)
            }
        }
    }

    fn measure(&self, stall: &Stall, cars: &MultiPolygon<f64>) -> Result<Measured, StallFault> {
        if !is_finite_polygon(&stall.boundary) {
            return Err(StallFault::NonFiniteBoundary);
        }

        let (region, inset_fallback) = self.inset_region(stall);
        let stall_area = region.unsigned_area();
        let inter_area = region.intersection(cars).unsigned_area();
        if !stall_area.is_finite() || !inter_area.is_finite() {
            return Err(StallFault::NonFiniteArea);
        }

        let overlap = (inter_area / stall_area.max(AREA_EPSILON)).clamp(0.0, 1.0);
        Ok(Measured {
            overlap,
            inset_fallback,
        })
    }

    fn inset_region(&self, stall: &Stall) -> (MultiPolygon<f64>, bool) {
        let original = || MultiPolygon::new(vec![stall.boundary.clone()]);
        if self.cfg.stall_inset <= 0.0 {
            return (original(), false);
        }

        let shrunk: MultiPolygon<f64> = stall.boundary.buffer(-self.cfg.stall_inset);
        if is_empty_region(&shrunk) {
            debug!(
                stall_id = %stall.id,
                inset = self.cfg.stall_inset,
                "inset emptied stall; using original boundary"
            );
            return (original(), true);
        }
        (shrunk, false)
    }

    /// The region overlap is measured against: the inset boundary, or the
    /// loaded boundary when there is no inset or it came out empty.
    pub fn measured_region(&self, stall: &Stall) -> MultiPolygon<f64> {
        guarded(|| self.inset_region(stall).0)
            .unwrap_or_else(|_| MultiPolygon::new(vec![stall.boundary.clone()]))
    }

    fn faulted(&self, stall: &Stall, fault: StallFault) -> OccupancyResult {
        OccupancyResult {
            stall_id: stall.id.clone(),
            status: OccupancyStatus::Free,
            overlap_ratio: 0.0,
            inset_fallback: false,
            fault: Some(fault),
        }
    }
}

fn is_empty_region(region: &MultiPolygon<f64>) -> bool {
    region.0.iter().all(|p: &Polygon<f64>| p.unsigned_area() <= 0.0)
}

/// Runs a geometry operation, turning a panic inside the backend into a fault.
fn guarded<T>(op: impl FnOnce() -> T) -> Result<T, StallFault> {
    panic::catch_unwind(AssertUnwindSafe(op))
        .map_err(|payload| StallFault::BackendPanic(panic_message(payload)))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

use crate::geom::{is_finite_polygon, polygon_from_points, Point};
use crate::model::{DetectorOutput, GeometrySource, RawDetection, VehicleClass, VehicleDetection};
use geo::{Area, Polygon, Validation};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Detections smaller than this (px^2) are treated as noise.
    pub min_car_area: f64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            min_car_area: 100.0,
        }
    }
}

/// Converts one image's detector output into vehicle polygons.
///
/// Contours are used for the whole batch as soon as any detection carries
/// one; otherwise every detection falls back to its bounding box. Anything
/// that is not a vehicle, is degenerate, or is smaller than
/// `min_car_area` is dropped without error.
pub fn extract_vehicles(output: &DetectorOutput, cfg: &ExtractConfig) -> Vec<VehicleDetection> {
    let source = if output.has_segmentation() {
        GeometrySource::Segmentation
    } else {
        GeometrySource::BoundingBox
    };

    output
        .detections
        .iter()
        .filter_map(|det| vehicle_from_detection(det, source, cfg.min_car_area))
        .collect()
}

fn vehicle_from_detection(
    det: &RawDetection,
    source: GeometrySource,
    min_car_area: f64,
) -> Option<VehicleDetection> {
    let Some(class) = VehicleClass::from_label(&det.label) else {
        debug!(label = %det.label, "dropping non-vehicle detection");
        return None;
    };

    let geometry = match source {
        GeometrySource::Segmentation => contour_polygon(det.contour.as_deref().unwrap_or(&[]))?,
        GeometrySource::BoundingBox => det.bbox.to_polygon(),
    };

    if !is_finite_polygon(&geometry) || !geometry.is_valid() {
        debug!(label = %det.label, ?source, "dropping detection with invalid geometry");
        return None;
    }

    let area = geometry.unsigned_area();
    if area < min_car_area {
        debug!(label = %det.label, area, min_car_area, "dropping undersized detection");
        return None;
    }

    Some(VehicleDetection {
        class,
        geometry,
        source,
    })
}

fn contour_polygon(contour: &[Point]) -> Option<Polygon<f64>> {
    if contour.len() < 3 {
        debug!(points = contour.len(), "dropping detection with short contour");
        return None;
    }
    Some(polygon_from_points(contour))
}

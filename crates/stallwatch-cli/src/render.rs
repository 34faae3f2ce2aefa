use ab_glyph::{FontVec, PxScale};
use geo::{Centroid, MultiPolygon, Polygon};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_polygon_mut, draw_polygon_mut, draw_text_mut,
};
use imageproc::point::Point as PixelPoint;
use stallwatch_core::model::OccupancyResult;

const OCCUPIED: Rgb<u8> = Rgb([255, 0, 0]);
const FREE: Rgb<u8> = Rgb([0, 180, 0]);
const LABEL: Rgb<u8> = Rgb([0, 0, 0]);
const FILL_ALPHA: f32 = 0.25;
const MARKER_RADIUS: i32 = 4;
const LABEL_SIZE: f32 = 16.0;

/// Draws each measured stall region over the lot image, tinted by status.
///
/// With a font each stall gets an `id:O` / `id:F` label at its centroid;
/// without one a status-colored dot marks the centroid instead.
pub fn annotate(
    lot: &RgbImage,
    regions: &[MultiPolygon<f64>],
    results: &[OccupancyResult],
    font: Option<&FontVec>,
) -> RgbImage {
    let mut vis = lot.clone();
    for (region, result) in regions.iter().zip(results) {
        let color = if result.status.is_occupied() {
            OCCUPIED
        } else {
            FREE
        };

        let rings: Vec<_> = region
            .0
            .iter()
            .map(pixel_ring)
            .filter(|r| r.len() >= 3)
            .collect();
        if rings.is_empty() {
            continue;
        }

        let mut overlay = vis.clone();
        for ring in &rings {
            draw_polygon_mut(&mut overlay, ring, color);
        }
        blend(&mut vis, &overlay, FILL_ALPHA);

        for ring in &rings {
            let outline: Vec<PixelPoint<f32>> = ring
                .iter()
                .map(|p| PixelPoint::new(p.x as f32, p.y as f32))
                .collect();
            draw_hollow_polygon_mut(&mut vis, &outline, color);
        }

        let Some(c) = region.centroid() else {
            continue;
        };
        let (cx, cy) = (c.x().round() as i32, c.y().round() as i32);
        match font {
            Some(font) => {
                let y = cy - (LABEL_SIZE / 2.0) as i32;
                let scale = PxScale::from(LABEL_SIZE);
                draw_text_mut(&mut vis, LABEL, cx, y, scale, font, &stall_label(result));
            }
            None => draw_filled_circle_mut(&mut vis, (cx, cy), MARKER_RADIUS, color),
        }
    }
    vis
}

fn stall_label(result: &OccupancyResult) -> String {
    let mark = if result.status.is_occupied() { 'O' } else { 'F' };
    format!("{}:{mark}", result.stall_id)
}

/// Exterior ring snapped to pixels: open, without repeated neighbours.
fn pixel_ring(poly: &Polygon<f64>) -> Vec<PixelPoint<i32>> {
    let mut ring: Vec<PixelPoint<i32>> = Vec::new();
    for c in poly.exterior().coords() {
        let p = PixelPoint::new(c.x.round() as i32, c.y.round() as i32);
        if ring.last() != Some(&p) {
            ring.push(p);
        }
    }
    while ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

fn blend(dst: &mut RgbImage, overlay: &RgbImage, alpha: f32) {
    for (d, o) in dst.pixels_mut().zip(overlay.pixels()) {
        for (dc, oc) in d.0.iter_mut().zip(o.0) {
            *dc = (alpha * oc as f32 + (1.0 - alpha) * *dc as f32).round() as u8;
        }
    }
}

use anyhow::{Context, Result};
use serde::Deserialize;
use stallwatch_core::geom::{BBox, Point};
use stallwatch_core::model::{DetectorOutput, RawDetection};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Filters the detector applies before its output reaches the classifier.
#[derive(Debug, Clone, Copy)]
pub struct DetectorOptions {
    /// Minimum detection confidence.
    pub confidence: f64,
    /// Boxes of the same label overlapping a stronger box by at least this IoU are suppressed.
    pub iou: f64,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            confidence: 0.25,
            iou: 0.5,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DetectionFile {
    #[serde(default)]
    names: ClassNames,
    detections: Vec<DetectionRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassNames {
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

impl Default for ClassNames {
    fn default() -> Self {
        ClassNames::List(Vec::new())
    }
}

impl ClassNames {
    fn get(&self, class_id: u32) -> Option<&str> {
        match self {
            ClassNames::List(names) => names.get(class_id as usize).map(String::as_str),
            ClassNames::Map(names) => names.get(&class_id.to_string()).map(String::as_str),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DetectionRecord {
    #[serde(default)]
    class_id: Option<u32>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default = "full_confidence")]
    confidence: f64,
    bbox: [f64; 4],
    #[serde(default)]
    segment: Option<Vec<[f64; 2]>>,
}

fn full_confidence() -> f64 {
    1.0
}

/// Reads one image's detector output from a JSON file.
pub fn import_detections(path: &Path, opts: &DetectorOptions) -> Result<DetectorOutput> {
    let json =
        std::fs::read_to_string(path).with_context(|| format!("read detections: {path:?}"))?;
    parse_detections(&json, opts).with_context(|| format!("parse detections: {path:?}"))
}

pub fn parse_detections(json: &str, opts: &DetectorOptions) -> Result<DetectorOutput> {
    let file: DetectionFile = serde_json::from_str(json).context("decode detection JSON")?;
    let total = file.detections.len();

    let confident: Vec<RawDetection> = file
        .detections
        .into_iter()
        .map(|rec| resolve(rec, &file.names))
        .filter(|det| det.confidence >= opts.confidence)
        .collect();
    let confident_count = confident.len();

    let detections = suppress_duplicates(confident, opts.iou);
    debug!(
        total,
        confident = confident_count,
        kept = detections.len(),
        "imported detections"
    );

    Ok(DetectorOutput { detections })
}

fn resolve(rec: DetectionRecord, names: &ClassNames) -> RawDetection {
    let label = rec
        .label
        .or_else(|| {
            rec.class_id
                .and_then(|id| names.get(id))
                .map(str::to_string)
        })
        .or_else(|| rec.class_id.map(|id| id.to_string()))
        .unwrap_or_default();

    RawDetection {
        label,
        confidence: rec.confidence,
        bbox: BBox::from_xyxy(rec.bbox),
        contour: rec
            .segment
            .map(|pts| pts.into_iter().map(|[x, y]| Point::new(x, y)).collect()),
    }
}

/// Greedy per-label non-maximum suppression, strongest detection first.
pub fn suppress_duplicates(mut dets: Vec<RawDetection>, iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<RawDetection> = Vec::with_capacity(dets.len());
    'outer: for det in dets {
        for k in &kept {
            if k.label == det.label && k.bbox.iou(&det.bbox) >= iou_thresh {
                continue 'outer;
            }
        }
        kept.push(det);
    }
    kept
}

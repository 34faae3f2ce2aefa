use stallwatch_core::geom::{BBox, Point};
use stallwatch_core::model::RawDetection;
use stallwatch_import_detections::{
    import_detections, parse_detections, suppress_duplicates, DetectorOptions,
};
use std::io::Write;

fn det(label: &str, confidence: f64, bbox: BBox) -> RawDetection {
    RawDetection {
        label: label.to_string(),
        confidence,
        bbox,
        contour: None,
    }
}

#[test]
fn resolves_labels_from_names_map() {
    let json = r#"{
        "names": {"0": "person", "2": "car"},
        "detections": [
            {"class_id": 2, "confidence": 0.9, "bbox": [0, 0, 10, 10]},
            {"class_id": 0, "confidence": 0.8, "bbox": [50, 50, 60, 60]},
            {"class_id": 7, "confidence": 0.7, "bbox": [100, 100, 110, 110]},
            {"label": "van", "confidence": 0.6, "bbox": [200, 200, 210, 210]}
        ]
    }"#;
    let out = parse_detections(json, &DetectorOptions::default()).expect("parse");
    let labels: Vec<_> = out.detections.iter().map(|d| d.label.as_str()).collect();
    assert_eq!(vec!["car", "person", "7", "van"], labels);
    assert!(!out.has_segmentation());
}

#[test]
fn resolves_labels_from_names_list_and_reads_segments() {
    let json = r#"{
        "names": ["person", "bicycle", "car"],
        "detections": [
            {"class_id": 2, "confidence": 0.9, "bbox": [0, 0, 10, 10],
             "segment": [[0, 0], [10, 0], [10, 10]]}
        ]
    }"#;
    let out = parse_detections(json, &DetectorOptions::default()).expect("parse");
    assert_eq!("car", out.detections[0].label);
    assert_eq!(
        Some(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0)
        ]),
        out.detections[0].contour
    );
    assert!(out.has_segmentation());
}

#[test]
fn drops_low_confidence_detections() {
    let json = r#"{"detections": [
        {"label": "car", "confidence": 0.2, "bbox": [0, 0, 10, 10]},
        {"label": "car", "confidence": 0.25, "bbox": [50, 0, 60, 10]}
    ]}"#;
    let out = parse_detections(json, &DetectorOptions::default()).expect("parse");
    assert_eq!(1, out.detections.len());
    assert_eq!(BBox::new(50.0, 0.0, 60.0, 10.0), out.detections[0].bbox);
}

#[test]
fn suppresses_overlapping_boxes_per_label() {
    let dets = vec![
        det("car", 0.6, BBox::new(1.0, 0.0, 11.0, 10.0)),
        det("car", 0.9, BBox::new(0.0, 0.0, 10.0, 10.0)),
        det("truck", 0.8, BBox::new(0.0, 0.0, 10.0, 10.0)),
        det("car", 0.7, BBox::new(30.0, 0.0, 40.0, 10.0)),
    ];
    let kept = suppress_duplicates(dets, 0.5);
    let summary: Vec<_> = kept
        .iter()
        .map(|d| (d.label.as_str(), d.confidence))
        .collect();
    assert_eq!(vec![("car", 0.9), ("truck", 0.8), ("car", 0.7)], summary);
}

#[test]
fn rejects_malformed_json() {
    let opts = DetectorOptions::default();
    assert!(parse_detections(r#"{"detections": [{"bbox": [1, 2]}]}"#, &opts).is_err());
    assert!(parse_detections("not json", &opts).is_err());
}

#[test]
fn reads_from_file_and_reports_missing_path() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    write!(
        file,
        r#"{{"detections": [{{"label": "bus", "confidence": 0.5, "bbox": [0, 0, 30, 30]}}]}}"#
    )
    .unwrap();
    file.flush().unwrap();

    let out = import_detections(file.path(), &DetectorOptions::default()).expect("import");
    assert_eq!(1, out.detections.len());

    let missing = file.path().with_extension("missing.json");
    assert!(import_detections(&missing, &DetectorOptions::default()).is_err());
}

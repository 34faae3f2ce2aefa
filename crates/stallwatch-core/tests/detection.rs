use geo::Area;
use stallwatch_core::detection::{extract_vehicles, ExtractConfig};
use stallwatch_core::geom::{BBox, Point};
use stallwatch_core::model::{DetectorOutput, GeometrySource, RawDetection, VehicleClass};

fn boxed(label: &str, bbox: BBox) -> RawDetection {
    RawDetection {
        label: label.to_string(),
        confidence: 0.9,
        bbox,
        contour: None,
    }
}

fn contoured(label: &str, contour: Vec<Point>) -> RawDetection {
    RawDetection {
        label: label.to_string(),
        confidence: 0.9,
        bbox: BBox::new(0.0, 0.0, 100.0, 100.0),
        contour: Some(contour),
    }
}

fn triangle(size: f64) -> Vec<Point> {
    vec![
        Point::new(0.0, 0.0),
        Point::new(size, 0.0),
        Point::new(0.0, size),
    ]
}

#[test]
fn keeps_only_vehicle_classes() {
    let output = DetectorOutput {
        detections: vec![
            boxed("car", BBox::new(0.0, 0.0, 20.0, 20.0)),
            boxed("person", BBox::new(0.0, 0.0, 20.0, 20.0)),
            boxed(" Truck ", BBox::new(0.0, 0.0, 20.0, 20.0)),
            boxed("dog", BBox::new(0.0, 0.0, 20.0, 20.0)),
        ],
    };
    let vehicles = extract_vehicles(&output, &ExtractConfig::default());
    let classes: Vec<_> = vehicles.iter().map(|v| v.class).collect();
    assert_eq!(vec![VehicleClass::Car, VehicleClass::Truck], classes);
    assert!(vehicles
        .iter()
        .all(|v| v.source == GeometrySource::BoundingBox));
}

#[test]
fn bounding_boxes_become_rectangles() {
    let output = DetectorOutput {
        detections: vec![boxed("bus", BBox::new(10.0, 20.0, 40.0, 60.0))],
    };
    let vehicles = extract_vehicles(&output, &ExtractConfig::default());
    assert_eq!(1, vehicles.len());
    assert!((vehicles[0].geometry.unsigned_area() - 1200.0).abs() < 1e-9);
}

#[test]
fn segmentation_is_used_for_the_whole_batch() {
    let output = DetectorOutput {
        detections: vec![
            contoured("car", triangle(20.0)),
            // No contour in a segmented batch: dropped, not boxed.
            boxed("van", BBox::new(0.0, 0.0, 50.0, 50.0)),
        ],
    };
    let vehicles = extract_vehicles(&output, &ExtractConfig::default());
    assert_eq!(1, vehicles.len());
    assert_eq!(VehicleClass::Car, vehicles[0].class);
    assert_eq!(GeometrySource::Segmentation, vehicles[0].source);
    assert!((vehicles[0].geometry.unsigned_area() - 200.0).abs() < 1e-9);
}

#[test]
fn drops_short_invalid_and_tiny_geometry() {
    let bowtie = vec![
        Point::new(0.0, 0.0),
        Point::new(40.0, 40.0),
        Point::new(40.0, 0.0),
        Point::new(0.0, 40.0),
    ];
    let output = DetectorOutput {
        detections: vec![
            contoured("car", vec![Point::new(0.0, 0.0), Point::new(5.0, 5.0)]),
            contoured("car", bowtie),
            contoured("car", triangle(10.0)),
            contoured("car", triangle(30.0)),
        ],
    };
    let vehicles = extract_vehicles(&output, &ExtractConfig { min_car_area: 100.0 });
    assert_eq!(1, vehicles.len());
    assert!((vehicles[0].geometry.unsigned_area() - 450.0).abs() < 1e-9);
}

#[test]
fn empty_output_yields_no_vehicles() {
    let vehicles = extract_vehicles(&DetectorOutput::default(), &ExtractConfig::default());
    assert!(vehicles.is_empty());
}

#[test]
fn min_area_is_inclusive() {
    let output = DetectorOutput {
        detections: vec![boxed("motorbike", BBox::new(0.0, 0.0, 10.0, 10.0))],
    };
    let vehicles = extract_vehicles(&output, &ExtractConfig { min_car_area: 100.0 });
    assert_eq!(1, vehicles.len());
}

use geo::Area;
use stallwatch_core::geom::{
    polygon_from_points, repair_polygon, BBox, Point, PolygonRepair, RepairFailure,
};

fn square(size: f64) -> Vec<Point> {
    vec![
        Point::new(0.0, 0.0),
        Point::new(size, 0.0),
        Point::new(size, size),
        Point::new(0.0, size),
    ]
}

#[test]
fn valid_ring_is_returned_untouched() {
    let points = square(10.0);
    let repair = repair_polygon(&points);
    assert_eq!(PolygonRepair::Valid(polygon_from_points(&points)), repair);
}

#[test]
fn repairing_a_valid_polygon_twice_is_identical() {
    let first = repair_polygon(&square(10.0)).into_result().expect("valid square");
    let ring: Vec<Point> = first
        .exterior()
        .coords()
        .map(|c| Point::new(c.x, c.y))
        .collect();
    let second = repair_polygon(&ring).into_result().expect("still valid");
    assert_eq!(first, second);
}

#[test]
fn bowtie_keeps_largest_lobe() {
    // Crosses at (2, 4): lobes of area 8 and 2.
    let bowtie = [
        Point::new(0.0, 0.0),
        Point::new(0.0, 8.0),
        Point::new(3.0, 2.0),
        Point::new(3.0, 6.0),
    ];
    match repair_polygon(&bowtie) {
        PolygonRepair::Repaired { polygon, parts } => {
            assert_eq!(2, parts);
            assert!((polygon.unsigned_area() - 8.0).abs() < 1e-6);
        }
        other => panic!("expected a repaired polygon, got {other:?}"),
    }
}

#[test]
fn degenerate_rings_are_rejected() {
    assert_eq!(
        PolygonRepair::Invalid(RepairFailure::TooFewPoints),
        repair_polygon(&[Point::new(0.0, 0.0), Point::new(1.0, 1.0)])
    );
    assert_eq!(
        PolygonRepair::Invalid(RepairFailure::NonFinite),
        repair_polygon(&[
            Point::new(0.0, 0.0),
            Point::new(f64::NAN, 1.0),
            Point::new(1.0, 0.0)
        ])
    );
    let collinear = [
        Point::new(0.0, 0.0),
        Point::new(1.0, 0.0),
        Point::new(2.0, 0.0),
    ];
    assert!(matches!(repair_polygon(&collinear), PolygonRepair::Invalid(_)));
}

#[test]
fn bbox_iou_and_polygon() {
    let a = BBox::new(0.0, 0.0, 10.0, 10.0);
    let b = BBox::new(5.0, 0.0, 15.0, 10.0);
    assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-12);
    assert_eq!(0.0, a.iou(&BBox::new(20.0, 20.0, 30.0, 30.0)));
    assert!((a.to_polygon().unsigned_area() - 100.0).abs() < 1e-12);
}

//! Certificate write/read round trips and placement validation.

use std::sync::Arc;

use shapepack::geometry::point::Point;
use shapepack::geometry::shape::{Shape, ShapeWithHoles};
use shapepack::instance::Objective;
use shapepack::{InstanceBuilder, Solution, SolutionError};

fn build_instance() -> Arc<shapepack::Instance> {
    let mut builder = InstanceBuilder::new();
    builder.set_objective(Objective::BinPacking);
    builder.add_bin_type(Shape::rectangle(10.0, 10.0), None, Some(3), 0);
    builder.add_item_type(
        vec![(
            ShapeWithHoles {
                shape: Shape::rectangle(2.0, 1.0),
                holes: Vec::new(),
            },
            None,
        )],
        None,
        4,
        vec![(0.0, 0.0), (std::f64::consts::FRAC_PI_2, std::f64::consts::FRAC_PI_2)],
    );
    let item_type_id = builder.add_item_type(
        vec![(
            ShapeWithHoles {
                shape: Shape::polygon(&[(0.0, 0.0), (3.0, 0.0), (1.0, 2.0)]),
                holes: Vec::new(),
            },
            None,
        )],
        None,
        2,
        Vec::new(),
    );
    builder.set_item_type_allow_mirroring(item_type_id, true);
    Arc::new(builder.build().unwrap())
}

#[test]
fn write_then_read_gives_the_same_solution() {
    let instance = build_instance();
    let mut solution = Solution::new(Arc::clone(&instance));
    let bin_pos = solution.add_bin(0, 1).unwrap();
    solution
        .add_item(bin_pos, 0, Point::new(0.5, 0.25), 0.0, false)
        .unwrap();
    solution
        .add_item(
            bin_pos,
            0,
            Point::new(4.0, 1.0),
            std::f64::consts::FRAC_PI_2,
            false,
        )
        .unwrap();
    solution
        .add_item(bin_pos, 1, Point::new(5.0, 5.0), 0.0, true)
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("certificate.json");
    solution.write(&path).unwrap();

    let read_back = Solution::from_file(Arc::clone(&instance), &path).unwrap();
    assert_eq!(read_back.number_of_bins(), solution.number_of_bins());
    assert_eq!(read_back.number_of_items(), solution.number_of_items());
    assert_eq!(read_back.number_of_different_bins(), 1);
    for (bin_a, bin_b) in solution.bins().iter().zip(read_back.bins()) {
        assert_eq!(bin_a.bin_type_id, bin_b.bin_type_id);
        assert_eq!(bin_a.copies, bin_b.copies);
        for (item_a, item_b) in bin_a.items.iter().zip(&bin_b.items) {
            assert_eq!(item_a.item_type_id, item_b.item_type_id);
            assert!((item_a.bl_corner.x - item_b.bl_corner.x).abs() < 1e-9);
            assert!((item_a.bl_corner.y - item_b.bl_corner.y).abs() < 1e-9);
            assert!((item_a.angle - item_b.angle).abs() < 1e-9);
            assert_eq!(item_a.mirror, item_b.mirror);
        }
    }
}

#[test]
fn disallowed_angle_is_rejected() {
    let instance = build_instance();
    let mut solution = Solution::new(Arc::clone(&instance));
    let bin_pos = solution.add_bin(0, 1).unwrap();
    let result = solution.add_item(bin_pos, 0, Point::new(0.0, 0.0), 1.0, false);
    assert!(matches!(result, Err(SolutionError::AngleNotAllowed { .. })));
}

#[test]
fn disallowed_mirror_is_rejected() {
    let instance = build_instance();
    let mut solution = Solution::new(Arc::clone(&instance));
    let bin_pos = solution.add_bin(0, 1).unwrap();
    let result = solution.add_item(bin_pos, 0, Point::new(0.0, 0.0), 0.0, true);
    assert!(matches!(result, Err(SolutionError::MirrorNotAllowed { .. })));
}

#[test]
fn invalid_ids_are_rejected() {
    let instance = build_instance();
    let mut solution = Solution::new(Arc::clone(&instance));
    assert!(matches!(
        solution.add_bin(7, 1),
        Err(SolutionError::InvalidBinTypeId(7))
    ));
    let bin_pos = solution.add_bin(0, 1).unwrap();
    assert!(matches!(
        solution.add_item(bin_pos, 9, Point::new(0.0, 0.0), 0.0, false),
        Err(SolutionError::InvalidItemTypeId(9))
    ));
}

#[test]
fn bin_copies_are_counted() {
    let instance = build_instance();
    let mut solution = Solution::new(Arc::clone(&instance));
    solution.add_bin(0, 2).unwrap();
    assert_eq!(solution.number_of_bins(), 2);
    assert_eq!(solution.bin_copies(0), 2);
}

#[test]
fn svg_certificate_is_emitted() {
    let instance = build_instance();
    let mut solution = Solution::new(Arc::clone(&instance));
    let bin_pos = solution.add_bin(0, 1).unwrap();
    solution
        .add_item(bin_pos, 1, Point::new(1.0, 1.0), 0.0, false)
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bin_0.svg");
    solution.write_svg(&path, 0).unwrap();
    let svg = std::fs::read_to_string(&path).unwrap();
    assert!(svg.starts_with("<svg"));
    assert!(svg.contains("fill=\"blue\""));
    assert!(svg.contains("</svg>"));
}

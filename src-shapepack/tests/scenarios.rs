//! End-to-end scenarios through `optimize`.

use std::sync::Arc;

use shapepack::geometry::shape::{Shape, ShapeWithHoles};
use shapepack::instance::{Objective, OptimizationMode};
use shapepack::{optimize, Instance, InstanceBuilder, OptimizeParameters};

fn shape(shape: Shape) -> ShapeWithHoles {
    ShapeWithHoles {
        shape,
        holes: Vec::new(),
    }
}

fn run(instance: Arc<Instance>) -> shapepack::Output {
    let parameters = OptimizeParameters {
        optimization_mode: OptimizationMode::NotAnytimeSequential,
        not_anytime_tree_search_queue_size: 64,
        not_anytime_maximum_approximation_ratio: 0.0,
        ..OptimizeParameters::default()
    };
    optimize(&instance, parameters).unwrap()
}

/// Four unit squares pack into one 2x4 bin.
#[test]
fn squares_fill_one_bin() {
    let mut builder = InstanceBuilder::new();
    builder.set_objective(Objective::BinPacking);
    builder.add_bin_type(Shape::rectangle(2.0, 4.0), None, Some(2), 0);
    builder.add_item_type(vec![(shape(Shape::rectangle(1.0, 1.0)), None)], None, 4, Vec::new());
    let instance = Arc::new(builder.build().unwrap());

    let output = run(instance);
    assert!(output.solution.full());
    assert_eq!(output.solution.number_of_bins(), 1);
    for bin in output.solution.bins() {
        for item in &bin.items {
            assert_eq!(item.angle, 0.0);
            assert!(!item.mirror);
        }
    }
}

/// A 0.5 item-item spacing makes two unit squares too wide for a 2x1 bin.
#[test]
fn minimum_spacing_enforces_separation() {
    let mut builder = InstanceBuilder::new();
    builder.set_objective(Objective::Knapsack);
    builder.set_item_item_minimum_spacing(0.5);
    builder.add_bin_type(Shape::rectangle(2.0, 1.0), None, Some(1), 0);
    builder.add_item_type(
        vec![(shape(Shape::rectangle(1.0, 1.0)), None)],
        Some(1.0),
        2,
        Vec::new(),
    );
    let instance = Arc::new(builder.build().unwrap());

    let output = run(instance);
    assert!(output.solution.number_of_items() <= 1);
}

/// Only one radius-1 circle fits into a 3x2 bin; a second would overlap.
#[test]
fn circle_knapsack() {
    let mut builder = InstanceBuilder::new();
    builder.set_objective(Objective::Knapsack);
    builder.add_bin_type(Shape::rectangle(3.0, 2.0), None, Some(1), 0);
    builder.add_item_type(vec![(shape(Shape::circle(1.0)), None)], Some(1.0), 3, Vec::new());
    let instance = Arc::new(builder.build().unwrap());

    let output = run(instance);
    assert_eq!(output.solution.number_of_items(), 1);
    assert!((output.solution.profit() - 1.0).abs() < 1e-9);
}

/// A 2x1 rectangle only fits a 1x2 bin when rotated by 90 degrees.
#[test]
fn rotation_is_used_when_needed() {
    let mut builder = InstanceBuilder::new();
    builder.set_objective(Objective::BinPacking);
    builder.add_bin_type(Shape::rectangle(1.0, 2.0), None, Some(1), 0);
    builder.add_item_type(
        vec![(shape(Shape::rectangle(2.0, 1.0)), None)],
        None,
        1,
        vec![(0.0, 0.0), (std::f64::consts::FRAC_PI_2, std::f64::consts::FRAC_PI_2)],
    );
    let instance = Arc::new(builder.build().unwrap());

    let output = run(Arc::clone(&instance));
    assert!(output.solution.full());
    let item = &output.solution.bin(0).items[0];
    assert!((item.angle - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
    // The placed bounding box starts at the bin origin.
    let (mn, _) = instance.item_type(0).compute_min_max_orig(item.angle, item.mirror);
    assert!((item.bl_corner.x + mn.x).abs() < 1e-6);
    assert!((item.bl_corner.y + mn.y).abs() < 1e-6);
}

/// A bin-filling item cannot be placed over a forbidden defect.
#[test]
fn defect_blocks_the_placement() {
    let mut builder = InstanceBuilder::new();
    builder.set_objective(Objective::Knapsack);
    builder.add_quality_rule(vec![false]);
    let bin_type_id = builder.add_bin_type(Shape::rectangle(10.0, 10.0), None, Some(1), 0);
    builder.add_defect(
        bin_type_id,
        0,
        shape(Shape::rectangle(1.0, 1.0).translate(4.5, 4.5)),
    );
    builder.add_item_type(
        vec![(shape(Shape::rectangle(10.0, 10.0)), Some(0))],
        Some(1.0),
        1,
        Vec::new(),
    );
    let instance = Arc::new(builder.build().unwrap());

    let output = run(instance);
    assert_eq!(output.solution.number_of_items(), 0);
}

/// The same placement is accepted when the quality rule allows the defect
/// type.
#[test]
fn allowed_defect_does_not_block() {
    let mut builder = InstanceBuilder::new();
    builder.set_objective(Objective::Knapsack);
    builder.add_quality_rule(vec![true]);
    let bin_type_id = builder.add_bin_type(Shape::rectangle(10.0, 10.0), None, Some(1), 0);
    builder.add_defect(
        bin_type_id,
        0,
        shape(Shape::rectangle(1.0, 1.0).translate(4.5, 4.5)),
    );
    builder.add_item_type(
        vec![(shape(Shape::rectangle(10.0, 10.0)), Some(0))],
        Some(1.0),
        1,
        Vec::new(),
    );
    let instance = Arc::new(builder.build().unwrap());

    let output = run(instance);
    assert_eq!(output.solution.number_of_items(), 1);
}

/// Ten unit squares in a strip of height 2: two rows of five.
#[test]
fn open_dimension_x_shrinks_to_two_rows() {
    let mut builder = InstanceBuilder::new();
    builder.set_objective(Objective::OpenDimensionX);
    builder.add_bin_type(Shape::rectangle(100.0, 2.0), None, Some(1), 0);
    builder.add_item_type(vec![(shape(Shape::rectangle(1.0, 1.0)), None)], None, 10, Vec::new());
    let instance = Arc::new(builder.build().unwrap());

    let output = run(instance);
    assert!(output.solution.full());
    assert!(
        output.solution.x_max() <= 5.0 + 1e-6,
        "x_max: {}",
        output.solution.x_max()
    );
}

/// A single item that equals the bin exactly is placed at the origin.
#[test]
fn exact_fit_is_full() {
    let mut builder = InstanceBuilder::new();
    builder.set_objective(Objective::BinPacking);
    builder.add_bin_type(Shape::rectangle(3.0, 2.0), None, Some(1), 0);
    builder.add_item_type(vec![(shape(Shape::rectangle(3.0, 2.0)), None)], None, 1, Vec::new());
    let instance = Arc::new(builder.build().unwrap());

    let output = run(instance);
    assert!(output.solution.full());
    let item = &output.solution.bin(0).items[0];
    assert_eq!(item.angle, 0.0);
    assert!(item.bl_corner.x.abs() < 1e-6);
    assert!(item.bl_corner.y.abs() < 1e-6);
}

/// Without rotations nor mirroring, no placement may carry them.
#[test]
fn fixed_orientation_is_respected() {
    let mut builder = InstanceBuilder::new();
    builder.set_objective(Objective::Knapsack);
    builder.add_bin_type(Shape::rectangle(8.0, 8.0), None, Some(1), 0);
    builder.add_item_type(
        vec![(
            shape(Shape::polygon(&[(0.0, 0.0), (2.0, 0.0), (1.0, 1.5)])),
            None,
        )],
        Some(1.0),
        6,
        vec![(0.0, 0.0)],
    );
    let instance = Arc::new(builder.build().unwrap());

    let output = run(instance);
    assert!(output.solution.number_of_items() > 0);
    for bin in output.solution.bins() {
        for item in &bin.items {
            assert_eq!(item.angle, 0.0);
            assert!(!item.mirror);
        }
    }
}

/// The bin-packing bound is published alongside the solution.
#[test]
fn bound_is_published() {
    let mut builder = InstanceBuilder::new();
    builder.set_objective(Objective::BinPacking);
    builder.add_bin_type(Shape::rectangle(2.0, 2.0), None, Some(4), 0);
    builder.add_item_type(vec![(shape(Shape::rectangle(1.0, 1.0)), None)], None, 9, Vec::new());
    let instance = Arc::new(builder.build().unwrap());

    let output = run(instance);
    assert!(output.bin_packing_bound.unwrap() >= 3);
    if output.solution.full() {
        assert!(output.solution.number_of_bins() >= output.bin_packing_bound.unwrap());
    }
}

/// A triangle packs against the sloped side of another triangle.
#[test]
fn triangles_nest_against_sloped_sides() {
    let mut builder = InstanceBuilder::new();
    builder.set_objective(Objective::Knapsack);
    builder.add_bin_type(Shape::rectangle(4.0, 2.0), None, Some(1), 0);
    // Right triangles; two of them tile a 2x2 square when one is rotated.
    builder.add_item_type(
        vec![(
            shape(Shape::polygon(&[(0.0, 0.0), (2.0, 0.0), (0.0, 2.0)])),
            None,
        )],
        Some(1.0),
        2,
        vec![(0.0, 0.0), (std::f64::consts::PI, std::f64::consts::PI)],
    );
    let instance = Arc::new(builder.build().unwrap());

    let output = run(instance);
    // Both triangles fit into the bin.
    assert_eq!(output.solution.number_of_items(), 2);
}

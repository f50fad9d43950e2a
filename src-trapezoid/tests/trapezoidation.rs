//! Trapezoidation tests, including fuzzing on random simple polygons.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shapepack_geometry::shape::Shape;
use shapepack_trapezoid::{polygon_trapezoidation, GeneralizedTrapezoid};

fn trapezoidate(vertices: &[(f64, f64)]) -> Vec<GeneralizedTrapezoid> {
    polygon_trapezoidation(&Shape::polygon(vertices), &[]).unwrap()
}

fn assert_contains(trapezoids: &[GeneralizedTrapezoid], expected: GeneralizedTrapezoid) {
    assert!(
        trapezoids.iter().any(|trapezoid| *trapezoid == expected),
        "expected {expected} in {:?}",
        trapezoids.iter().map(|t| t.to_string()).collect::<Vec<_>>()
    );
}

#[test]
fn triangle_1() {
    let trapezoids = trapezoidate(&[(0.0, 0.0), (3.0, 0.0), (1.0, 3.0)]);
    assert_eq!(trapezoids.len(), 1);
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(0.0, 3.0, 0.0, 3.0, 1.0, 1.0),
    );
}

#[test]
fn triangle_2() {
    let trapezoids = trapezoidate(&[(2.0, 0.0), (3.0, 3.0), (0.0, 3.0)]);
    assert_eq!(trapezoids.len(), 1);
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(0.0, 3.0, 2.0, 2.0, 0.0, 3.0),
    );
}

#[test]
fn square() {
    let trapezoids = trapezoidate(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
    assert_eq!(trapezoids.len(), 1);
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(0.0, 1.0, 0.0, 1.0, 0.0, 1.0),
    );
}

#[test]
fn trapezoid_1() {
    let trapezoids = trapezoidate(&[(0.0, 0.0), (3.0, 0.0), (2.0, 3.0), (1.0, 3.0)]);
    assert_eq!(trapezoids.len(), 1);
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(0.0, 3.0, 0.0, 3.0, 1.0, 2.0),
    );
}

#[test]
fn trapezoid_2() {
    let trapezoids = trapezoidate(&[(1.0, 0.0), (2.0, 0.0), (3.0, 3.0), (0.0, 3.0)]);
    assert_eq!(trapezoids.len(), 1);
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(0.0, 3.0, 1.0, 2.0, 0.0, 3.0),
    );
}

#[test]
fn triangle_with_inflection() {
    let trapezoids = trapezoidate(&[(4.0, 0.0), (1.0, 3.0), (0.0, 1.0)]);
    assert_eq!(trapezoids.len(), 2);
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(1.0, 3.0, 0.0, 3.0, 1.0, 1.0),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(0.0, 1.0, 4.0, 4.0, 0.0, 3.0),
    );
}

#[test]
fn trapezoid_with_inflection() {
    let trapezoids = trapezoidate(&[(5.0, 0.0), (2.0, 3.0), (1.0, 3.0), (0.0, 1.0)]);
    assert_eq!(trapezoids.len(), 2);
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(1.0, 3.0, 0.0, 4.0, 1.0, 2.0),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(0.0, 1.0, 5.0, 5.0, 0.0, 4.0),
    );
}

#[test]
fn double_trapezoid_1() {
    let trapezoids = trapezoidate(&[
        (0.0, 0.0),
        (4.0, 0.0),
        (2.0, 2.0),
        (4.0, 4.0),
        (0.0, 4.0),
        (1.0, 2.0),
    ]);
    assert_eq!(trapezoids.len(), 2);
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(2.0, 4.0, 1.0, 2.0, 0.0, 4.0),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(0.0, 2.0, 0.0, 4.0, 1.0, 2.0),
    );
}

#[test]
fn double_trapezoid_2() {
    let trapezoids = trapezoidate(&[
        (1.0, 0.0),
        (2.0, 0.0),
        (4.0, 2.0),
        (2.0, 4.0),
        (1.0, 4.0),
        (0.0, 2.0),
    ]);
    assert_eq!(trapezoids.len(), 2);
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(2.0, 4.0, 0.0, 4.0, 1.0, 2.0),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(0.0, 2.0, 1.0, 2.0, 0.0, 4.0),
    );
}

#[test]
fn reversed_h() {
    let trapezoids = trapezoidate(&[
        (0.0, 0.0),
        (3.0, 0.0),
        (3.0, 1.0),
        (2.0, 1.0),
        (2.0, 2.0),
        (3.0, 2.0),
        (3.0, 3.0),
        (0.0, 3.0),
        (0.0, 2.0),
        (1.0, 2.0),
        (1.0, 1.0),
        (0.0, 1.0),
    ]);
    assert_eq!(trapezoids.len(), 3);
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(2.0, 3.0, 0.0, 3.0, 0.0, 3.0),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(1.0, 2.0, 1.0, 2.0, 1.0, 2.0),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(0.0, 1.0, 0.0, 3.0, 0.0, 3.0),
    );
}

#[test]
fn cross() {
    let trapezoids = trapezoidate(&[
        (1.0, 0.0),
        (2.0, 0.0),
        (2.0, 1.0),
        (3.0, 1.0),
        (3.0, 2.0),
        (2.0, 2.0),
        (2.0, 3.0),
        (1.0, 3.0),
        (1.0, 2.0),
        (0.0, 2.0),
        (0.0, 1.0),
        (1.0, 1.0),
    ]);
    assert_eq!(trapezoids.len(), 3);
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(2.0, 3.0, 1.0, 2.0, 1.0, 2.0),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(1.0, 2.0, 0.0, 3.0, 0.0, 3.0),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(0.0, 1.0, 1.0, 2.0, 1.0, 2.0),
    );
}

#[test]
fn u_shape() {
    let trapezoids = trapezoidate(&[
        (0.0, 0.0),
        (3.0, 0.0),
        (3.0, 3.0),
        (2.0, 3.0),
        (2.0, 1.0),
        (1.0, 1.0),
        (1.0, 3.0),
        (0.0, 3.0),
    ]);
    assert_eq!(trapezoids.len(), 3);
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(1.0, 3.0, 0.0, 1.0, 0.0, 1.0),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(1.0, 3.0, 2.0, 3.0, 2.0, 3.0),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(0.0, 1.0, 0.0, 3.0, 0.0, 3.0),
    );
}

#[test]
fn w_shape() {
    let trapezoids = trapezoidate(&[
        (0.0, 0.0),
        (5.0, 0.0),
        (5.0, 3.0),
        (4.0, 3.0),
        (4.0, 1.0),
        (3.0, 1.0),
        (3.0, 2.0),
        (2.0, 2.0),
        (2.0, 1.0),
        (1.0, 1.0),
        (1.0, 3.0),
        (0.0, 3.0),
    ]);
    assert_eq!(trapezoids.len(), 4);
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(1.0, 3.0, 0.0, 1.0, 0.0, 1.0),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(1.0, 3.0, 4.0, 5.0, 4.0, 5.0),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(1.0, 2.0, 2.0, 3.0, 2.0, 3.0),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(0.0, 1.0, 0.0, 5.0, 0.0, 5.0),
    );
}

#[test]
fn seven_vertex_shape() {
    let trapezoids = trapezoidate(&[
        (185.355, 114.645),
        (150.0, 79.289),
        (79.289, 150.0),
        (114.645, 185.355),
        (0.0, 300.0),
        (0.0, 0.0),
        (300.0, 0.0),
    ]);
    assert_eq!(trapezoids.len(), 5);
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(185.355, 300.0, 0.0, 114.645, 0.0, 0.0),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(150.0, 185.355, 0.0, 79.289, 0.0, 114.645),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(79.289, 150.0, 0.0, 150.0, 0.0, 79.289),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(79.289, 114.645, 150.0, 220.711, 185.355, 185.355),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(0.0, 79.289, 0.0, 300.0, 0.0, 220.711),
    );
}

#[test]
fn square_ring() {
    let shape = Shape::polygon(&[(0.0, 0.0), (3.0, 0.0), (3.0, 3.0), (0.0, 3.0)]);
    let holes = vec![Shape::polygon(&[
        (1.0, 1.0),
        (2.0, 1.0),
        (2.0, 2.0),
        (1.0, 2.0),
    ])];
    let trapezoids = polygon_trapezoidation(&shape, &holes).unwrap();
    assert_eq!(trapezoids.len(), 4);
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(2.0, 3.0, 0.0, 3.0, 0.0, 3.0),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(1.0, 2.0, 0.0, 1.0, 0.0, 1.0),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(1.0, 2.0, 2.0, 3.0, 2.0, 3.0),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(0.0, 1.0, 0.0, 3.0, 0.0, 3.0),
    );
}

#[test]
fn diamond_hole() {
    let shape = Shape::polygon(&[
        (1.0, 0.0),
        (3.0, 0.0),
        (4.0, 1.0),
        (4.0, 3.0),
        (3.0, 4.0),
        (1.0, 4.0),
        (0.0, 3.0),
        (0.0, 1.0),
    ]);
    let holes = vec![Shape::polygon(&[
        (2.0, 1.0),
        (3.0, 2.0),
        (2.0, 3.0),
        (1.0, 2.0),
    ])];
    let trapezoids = polygon_trapezoidation(&shape, &holes).unwrap();
    assert_eq!(trapezoids.len(), 6);
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(3.0, 4.0, 0.0, 4.0, 1.0, 3.0),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(2.0, 3.0, 0.0, 1.0, 0.0, 2.0),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(2.0, 3.0, 3.0, 4.0, 2.0, 4.0),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(1.0, 2.0, 0.0, 2.0, 0.0, 1.0),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(1.0, 2.0, 2.0, 4.0, 3.0, 4.0),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(0.0, 1.0, 1.0, 3.0, 0.0, 4.0),
    );
}

#[test]
fn butterfly_hole() {
    let shape = Shape::polygon(&[
        (1.0, 0.0),
        (3.0, 0.0),
        (4.0, 1.0),
        (4.0, 3.0),
        (3.0, 4.0),
        (1.0, 4.0),
        (0.0, 3.0),
        (0.0, 1.0),
    ]);
    let holes = vec![Shape::polygon(&[
        (1.0, 1.0),
        (2.0, 1.5),
        (3.0, 1.0),
        (3.0, 3.0),
        (2.0, 2.5),
        (1.0, 3.0),
    ])];
    let trapezoids = polygon_trapezoidation(&shape, &holes).unwrap();
    assert_eq!(trapezoids.len(), 6);
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(3.0, 4.0, 0.0, 4.0, 1.0, 3.0),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(2.5, 3.0, 2.0, 2.0, 1.0, 3.0),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(1.0, 3.0, 0.0, 1.0, 0.0, 1.0),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(1.0, 1.5, 1.0, 3.0, 2.0, 2.0),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(1.0, 3.0, 3.0, 4.0, 3.0, 4.0),
    );
    assert_contains(
        &trapezoids,
        GeneralizedTrapezoid::new(0.0, 1.0, 1.0, 3.0, 0.0, 4.0),
    );
}

/// Random star-shaped polygons are simple by construction; the sum of the
/// trapezoid areas must equal the polygon area.
#[test]
fn fuzz_area_preservation() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..200 {
        let n = rng.random_range(3..12);
        let mut angles: Vec<f64> = (0..n)
            .map(|_| rng.random_range(0.0..2.0 * std::f64::consts::PI))
            .collect();
        angles.sort_by(|a, b| a.partial_cmp(b).unwrap());
        angles.dedup_by(|a, b| (*a - *b).abs() < 1e-2);
        if angles.len() < 3 {
            continue;
        }
        let vertices: Vec<(f64, f64)> = angles
            .iter()
            .map(|&a| {
                let r = rng.random_range(1.0..10.0);
                (r * a.cos(), r * a.sin())
            })
            .collect();
        let shape = shapepack_geometry::clean::clean_shape(&Shape::polygon(&vertices));
        if shape.elements.len() < 3 || shape.compute_area() < 1e-2 {
            continue;
        }
        let trapezoids = match polygon_trapezoidation(&shape, &[]) {
            Ok(trapezoids) => trapezoids,
            Err(error) => panic!("trapezoidation failed on {shape:?}: {error}"),
        };
        let total: f64 = trapezoids.iter().map(|trapezoid| trapezoid.area()).sum();
        let area = shape.compute_area();
        assert!(
            (total - area).abs() < 1e-6 * area.max(1.0),
            "area mismatch: {total} vs {area} on {shape:?}"
        );
    }
}

/// After shifting by the returned amount, the trapezoids no longer
/// intersect.
#[test]
fn fuzz_right_shift_post_condition() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut random_trapezoid = |rng: &mut StdRng| {
        let yb = rng.random_range(-10.0..10.0);
        let yt = yb + rng.random_range(0.5..10.0);
        let xbl = rng.random_range(-10.0..10.0);
        let xbr = xbl + rng.random_range(0.0..10.0);
        let xtl = rng.random_range(-10.0..10.0);
        let xtr = xtl + rng.random_range(0.0..10.0);
        GeneralizedTrapezoid::new(yb, yt, xbl, xbr, xtl, xtr)
    };
    for _ in 0..1000 {
        let trapezoid_1 = random_trapezoid(&mut rng);
        let trapezoid_2 = random_trapezoid(&mut rng);
        let shift = trapezoid_1.compute_right_shift(&trapezoid_2);
        assert!(shift >= 0.0);
        let shifted = trapezoid_1.translate_x(shift);
        assert!(
            !shifted.intersects(&trapezoid_2),
            "{trapezoid_1} shifted by {shift} still intersects {trapezoid_2}"
        );
    }
}

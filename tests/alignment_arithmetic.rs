// tests/alignment_arithmetic.rs

use dimal::{
    align_arrays, float_values, int_values, BinOp, DataArray, Join, Reduction, Value,
};
use dimal::{Attrs, CoordIndex, Dataset, Variable};

fn series(labels: Vec<i64>, values: Vec<f64>, name: &str) -> DataArray {
    DataArray::new_1d(
        "x",
        float_values(values),
        Some(int_values(labels)),
        Some(name),
    )
    .unwrap()
}

#[test]
fn test_arithmetic_requires_exact_alignment() {
    let a = series(vec![1, 2, 3], vec![10.0, 20.0, 30.0], "v");
    let b = series(vec![2, 3, 4], vec![1.0, 1.0, 1.0], "v");
    let err = a.binop(&b, BinOp::Add).unwrap_err();
    assert!(err.to_string().contains("not aligned"));
    assert!(err.to_string().contains("align()"));
}

#[test]
fn test_inner_alignment_then_arithmetic() {
    let a = series(vec![1, 2, 3], vec![10.0, 20.0, 30.0], "v");
    let b = series(vec![2, 3, 4], vec![1.0, 2.0, 3.0], "v");
    let aligned = align_arrays(&[&a, &b], Join::Inner).unwrap();
    assert_eq!(
        aligned[0].index("x").unwrap().values(),
        &int_values(vec![2, 3])[..]
    );
    let sum = aligned[0].binop(&aligned[1], BinOp::Add).unwrap();
    assert_eq!(sum.values().unwrap(), float_values(vec![21.0, 32.0]));
    assert_eq!(sum.name(), "v");
}

#[test]
fn test_outer_alignment_fills_missing() {
    let a = series(vec![1, 2], vec![10.0, 20.0], "v");
    let b = series(vec![2, 3], vec![1.0, 2.0], "v");
    let aligned = align_arrays(&[&a, &b], Join::Outer).unwrap();
    assert_eq!(
        aligned[0].index("x").unwrap().values(),
        &int_values(vec![1, 2, 3])[..]
    );
    let values = aligned[0].values().unwrap();
    assert_eq!(&values[..2], &float_values(vec![10.0, 20.0])[..]);
    assert!(values[2].is_null());

    // reductions skip missing cells introduced by the join
    let total = aligned[0].reduce(Reduction::Sum, None, false).unwrap();
    assert_eq!(total.scalar_value().unwrap(), Value::Float(30.0));
}

#[test]
fn test_left_and_right_joins() {
    let a = series(vec![1, 2], vec![10.0, 20.0], "v");
    let b = series(vec![2, 3], vec![1.0, 2.0], "v");
    let left = align_arrays(&[&a, &b], Join::Left).unwrap();
    assert_eq!(
        left[1].index("x").unwrap().values(),
        &int_values(vec![1, 2])[..]
    );
    let right = align_arrays(&[&a, &b], Join::Right).unwrap();
    assert_eq!(
        right[0].index("x").unwrap().values(),
        &int_values(vec![2, 3])[..]
    );
}

#[test]
fn test_broadcasting_over_disjoint_dimensions() {
    let a = series(vec![1, 2], vec![10.0, 20.0], "v");
    let b = DataArray::new_1d(
        "y",
        float_values(vec![1.0, 2.0, 3.0]),
        Some(int_values(vec![7, 8, 9])),
        Some("v"),
    )
    .unwrap();
    let out = a.binop(&b, BinOp::Mul).unwrap();
    assert_eq!(out.dims(), &["x".to_string(), "y".to_string()]);
    assert_eq!(
        out.values().unwrap(),
        float_values(vec![10.0, 20.0, 30.0, 20.0, 40.0, 60.0])
    );
    // both coordinate indexes survive on the result
    assert_eq!(
        out.index("x").unwrap().values(),
        &int_values(vec![1, 2])[..]
    );
    assert_eq!(
        out.index("y").unwrap().values(),
        &int_values(vec![7, 8, 9])[..]
    );
}

#[test]
fn test_dataset_level_arithmetic() {
    let make = |values: Vec<f64>| {
        Dataset::from_parts(
            vec![("v".into(), Variable::new_1d("x", float_values(values)))],
            vec![CoordIndex::new("x", int_values(vec![1, 2, 3]))],
            Attrs::new(),
        )
        .unwrap()
    };
    let a = make(vec![10.0, 20.0, 30.0]);
    let b = make(vec![1.0, 2.0, 3.0]);
    let sum = a.binop(&b, BinOp::Add).unwrap();
    assert_eq!(
        sum.get("v").unwrap().values().unwrap(),
        float_values(vec![11.0, 22.0, 33.0])
    );

    // the container side takes precedence over a bare array operand
    let row = b.get("v").unwrap();
    let diff = a.binop_array(&row, BinOp::Sub).unwrap();
    assert_eq!(
        diff.get("v").unwrap().values().unwrap(),
        float_values(vec![9.0, 18.0, 27.0])
    );
    assert_eq!(
        diff.index("x").unwrap().values(),
        &int_values(vec![1, 2, 3])[..]
    );

    // misaligned containers are rejected like misaligned arrays
    let shifted = Dataset::from_parts(
        vec![(
            "v".into(),
            Variable::new_1d("x", float_values(vec![1.0, 2.0, 3.0])),
        )],
        vec![CoordIndex::new("x", int_values(vec![2, 3, 4]))],
        Attrs::new(),
    )
    .unwrap();
    let err = a.binop(&shifted, BinOp::Add).unwrap_err();
    assert!(err.to_string().contains("not aligned"));
}

#[test]
fn test_scalar_and_comparison_ops() {
    let a = series(vec![1, 2, 3], vec![10.0, 20.0, 30.0], "v");
    let doubled = a.binop_scalar(2.0, BinOp::Mul).unwrap();
    assert_eq!(
        doubled.values().unwrap(),
        float_values(vec![20.0, 40.0, 60.0])
    );
    let mask = a.binop_scalar(15.0, BinOp::Gt).unwrap();
    assert_eq!(
        mask.values().unwrap(),
        vec![Value::Bool(false), Value::Bool(true), Value::Bool(true)]
    );
}

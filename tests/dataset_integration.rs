// tests/dataset_integration.rs

use chrono::NaiveDate;
use dimal::{
    float_values, int_values, str_values, Attrs, CoordIndex, Dataset, ErrorKind, Indexer,
    LabelIndexer, Reduction, Value, VarInput, Variable,
};
use std::collections::HashMap;

fn date(y: i32, m: u32, d: u32) -> Value {
    Value::DateTime(
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap(),
    )
}

fn weather() -> Dataset {
    let time = vec![
        date(2000, 1, 1),
        date(2000, 1, 2),
        date(2000, 7, 1),
        date(2000, 7, 2),
    ];
    let temp = Variable::new(
        vec!["time".into(), "loc".into()],
        vec![4, 2],
        float_values((0..8).map(|i| i as f64)),
    )
    .unwrap();
    Dataset::from_parts(
        vec![("temp".into(), temp)],
        vec![
            CoordIndex::new("time", time),
            CoordIndex::new("loc", str_values(vec!["p", "q"])),
        ],
        Attrs::new(),
    )
    .unwrap()
}

#[test]
fn test_construction_roles_and_dims() {
    let ds = weather();
    assert_eq!(ds.dims().get("time"), Some(&4));
    assert_eq!(ds.dims().get("loc"), Some(&2));
    assert!(ds.is_coord("time"));
    assert!(ds.is_coord("loc"));
    assert!(!ds.is_coord("temp"));
    assert_eq!(ds.data_var_names(), vec!["temp".to_string()]);
}

#[test]
fn test_positional_selection_workflow() {
    let ds = weather();

    // slicing keeps both dims
    let head = ds.isel(&[("time", Indexer::range(0, 2))]).unwrap();
    assert_eq!(head.dims().get("time"), Some(&2));
    assert_eq!(
        head.get("temp").unwrap().values().unwrap(),
        float_values(vec![0.0, 1.0, 2.0, 3.0])
    );

    // a scalar indexer consumes the dimension and leaves the coordinate
    // behind as a scalar
    let day = ds.isel(&[("time", Indexer::At(1))]).unwrap();
    assert!(!day.dims().contains_key("time"));
    assert!(day.is_coord("time"));
    assert_eq!(
        day.variable("time").unwrap().scalar_value().unwrap(),
        date(2000, 1, 2)
    );
    assert_eq!(
        day.get("temp").unwrap().values().unwrap(),
        float_values(vec![2.0, 3.0])
    );

    // negative positions count from the end
    let last = ds.isel(&[("time", Indexer::At(-1))]).unwrap();
    assert_eq!(
        last.get("temp").unwrap().values().unwrap(),
        float_values(vec![6.0, 7.0])
    );
}

#[test]
fn test_label_selection() {
    let ds = weather();

    let q = ds.sel(&[("loc", LabelIndexer::scalar("q"))]).unwrap();
    assert_eq!(
        q.get("temp").unwrap().values().unwrap(),
        float_values(vec![1.0, 3.0, 5.0, 7.0])
    );

    // label slices include both endpoints
    let january = ds
        .sel(&[(
            "time",
            LabelIndexer::slice(Some(date(2000, 1, 1)), Some(date(2000, 1, 2))),
        )])
        .unwrap();
    assert_eq!(january.dims().get("time"), Some(&2));

    let err = ds
        .sel(&[("loc", LabelIndexer::scalar("nowhere"))])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Key);
}

#[test]
fn test_virtual_datetime_fields() {
    let ds = weather();
    let season = ds.get("time.season").unwrap();
    assert_eq!(
        season.values().unwrap(),
        str_values(vec!["DJF", "DJF", "JJA", "JJA"])
    );
    let month = ds.get("time.month").unwrap();
    assert_eq!(month.values().unwrap(), int_values(vec![1, 1, 7, 7]));
    // derived fields are unknown to plain name lookup
    assert!(!ds.contains("time.season"));
}

#[test]
fn test_rename_and_merge() {
    let ds = weather();
    let mut map = HashMap::new();
    map.insert("temp".to_string(), "temperature".to_string());
    let renamed = ds.rename(&map).unwrap();
    assert!(renamed.contains("temperature"));
    assert!(!renamed.contains("temp"));

    // merging disjoint variables over the same coordinates
    let mut other = Dataset::new();
    other
        .set(
            "humidity",
            VarInput::Array(
                renamed
                    .get("temperature")
                    .unwrap()
                    .rename("humidity")
                    .unwrap(),
            ),
        )
        .unwrap();
    let merged = ds.merge(&other).unwrap();
    assert!(merged.contains("temp"));
    assert!(merged.contains("humidity"));

    // conflicting values for the same name are rejected
    let mut conflicting = ds.clone();
    conflicting
        .set(
            "temp",
            VarInput::Values(vec![4, 2], float_values((0..8).map(|i| i as f64 + 1.0))),
        )
        .unwrap();
    let err = ds.merge(&conflicting).unwrap_err();
    assert!(err.to_string().contains("already exist"));
}

#[test]
fn test_merge_requires_aligned_indexes() {
    let ds = weather();
    let shifted = ds.isel(&[("time", Indexer::range(0, 2))]).unwrap();
    let err = ds.merge(&shifted).unwrap_err();
    assert!(err.to_string().contains("not aligned"));
}

#[test]
fn test_reindex_and_squeeze() {
    let ds = weather();
    let out = ds
        .reindex(
            &[("time", vec![date(2000, 7, 1), date(2000, 7, 2), date(2000, 7, 3)])],
            true,
        )
        .unwrap();
    let temp = out.get("temp").unwrap().values().unwrap();
    assert_eq!(&temp[..4], &float_values(vec![4.0, 5.0, 6.0, 7.0])[..]);
    assert!(temp[4..].iter().all(|v| v.is_null()));

    let narrow = ds.isel(&[("loc", Indexer::range(0, 1))]).unwrap();
    let squeezed = narrow.squeeze(None).unwrap();
    assert!(!squeezed.dims().contains_key("loc"));
    let err = ds.squeeze(Some("time")).unwrap_err();
    assert!(err.to_string().contains("length greater than one"));
}

#[test]
fn test_reduce_over_dimensions() {
    let ds = weather();
    let by_loc = ds.reduce(Reduction::Mean, Some(&["time"]), false).unwrap();
    assert_eq!(
        by_loc.get("temp").unwrap().values().unwrap(),
        float_values(vec![3.0, 4.0])
    );
    // the time coordinate is gone with its dimension
    assert!(!by_loc.contains("time"));

    let total = ds.reduce(Reduction::Sum, None, false).unwrap();
    assert_eq!(
        total.variable("temp").unwrap().scalar_value().unwrap(),
        Value::Float(28.0)
    );
}

#[test]
fn test_equality_and_copies() {
    let ds = weather();
    let shallow = ds.copy(false).unwrap();
    let deep = ds.copy(true).unwrap();
    assert!(ds.equals(&shallow).unwrap());
    assert!(ds.identical(&deep).unwrap());

    let mut attrs = Attrs::new();
    attrs.insert("title".into(), serde_json::json!("weather"));
    let mut tagged = ds.clone();
    tagged.attrs = attrs;
    assert!(ds.equals(&tagged).unwrap());
    assert!(!ds.identical(&tagged).unwrap());
}

#[test]
fn test_delete_and_reset_coords() {
    let mut ds = weather();
    // a non-index coordinate rides along a dimension it does not own
    ds.set(
        "elevation",
        VarInput::Variable(Variable::new_1d("loc", float_values(vec![12.0, 340.0]))),
    )
    .unwrap();
    // promote it: 1-D over "loc" is not over its own name, so it stays a
    // data variable unless declared through reset/coord machinery
    assert!(!ds.is_coord("elevation"));

    let err = ds.clone().reset_coords(&["loc"], false).unwrap_err();
    assert!(err.to_string().contains("cannot remove index coordinate"));

    // deleting a dimension name cascades to everything on it
    ds.delete("loc").unwrap();
    assert!(!ds.contains("temp"));
    assert!(!ds.contains("elevation"));
    assert!(ds.contains("time"));
}

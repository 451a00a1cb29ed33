// tests/deferred_store.rs

use dimal::{
    float_values, int_values, ArraySource, Dataset, Indexer, Result, Value, Variable,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Source that counts how many times its block is actually read.
#[derive(Debug)]
struct CountingSource {
    shape: Vec<usize>,
    values: Vec<Value>,
    reads: Arc<AtomicUsize>,
}

impl ArraySource for CountingSource {
    fn shape(&self) -> Vec<usize> {
        self.shape.clone()
    }

    fn read(&self) -> Result<Vec<Value>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.values.clone())
    }
}

fn counting_variable() -> (Variable, Arc<AtomicUsize>) {
    let reads = Arc::new(AtomicUsize::new(0));
    let source = CountingSource {
        shape: vec![4, 3],
        values: int_values(0..12),
        reads: reads.clone(),
    };
    let var = Variable::from_source(vec!["x".into(), "y".into()], Arc::new(source)).unwrap();
    (var, reads)
}

#[test]
fn test_selection_defers_reading() {
    let (var, reads) = counting_variable();
    assert!(!var.in_memory());
    assert_eq!(var.shape(), &[4, 3]);
    assert_eq!(reads.load(Ordering::SeqCst), 0);

    // positional selection composes onto the pending selection without
    // touching the source
    let mut ds = Dataset::new();
    ds.set("v", dimal::VarInput::Variable(var)).unwrap();
    let sliced = ds.isel(&[("x", Indexer::range(1, 3))]).unwrap();
    let narrowed = sliced.isel(&[("y", Indexer::At(0))]).unwrap();
    assert_eq!(reads.load(Ordering::SeqCst), 0);

    // accessing values finally reads, once
    let out = narrowed.get("v").unwrap().values().unwrap();
    assert_eq!(out, int_values(vec![3, 6]));
    assert_eq!(reads.load(Ordering::SeqCst), 1);
}

#[test]
fn test_load_materializes() {
    let (var, reads) = counting_variable();
    let mut ds = Dataset::new();
    ds.set("v", dimal::VarInput::Variable(var)).unwrap();
    ds.load().unwrap();
    assert_eq!(reads.load(Ordering::SeqCst), 1);
    assert!(ds.variable("v").unwrap().in_memory());
    // further access reuses the resident block
    let _ = ds.get("v").unwrap().values().unwrap();
    assert_eq!(reads.load(Ordering::SeqCst), 1);
}

#[test]
fn test_open_from_store() {
    let mut store = dimal::InMemoryStore::new();
    store.insert_coord("x", int_values(vec![10, 20]));
    store.insert(
        "v",
        vec!["x".into(), "y".into()],
        vec![2, 2],
        float_values(vec![1.0, 2.0, 3.0, 4.0]),
    );
    let ds = Dataset::from_store(&store).unwrap();
    assert!(ds.is_coord("x"));
    assert!(!ds.is_coord("v"));
    assert_eq!(ds.dims().get("y"), Some(&2));
    assert_eq!(
        ds.get("v").unwrap().values().unwrap(),
        float_values(vec![1.0, 2.0, 3.0, 4.0])
    );
}

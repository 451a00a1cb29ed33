// src/engine/align.rs
//
// Reconciles the coordinate indexes of labeled objects sharing dimension
// names before combination.

use crate::core::dataarray::DataArray;
use crate::core::dataset::Dataset;
use crate::core::index::CoordIndex;
use crate::core::value::Value;
use crate::core::variable::{increment, strides, Variable};
use crate::engine::error::{Error, Result};
use std::collections::{HashMap, HashSet};

/// Policy for reconciling differing indexes on a shared dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Join {
    Inner,
    Outer,
    Left,
    Right,
}

/// Compute the joint index for one dimension across operands.
pub fn joint_index(indexes: &[CoordIndex], join: Join) -> Result<Vec<Value>> {
    for index in indexes {
        if !index.is_unique() {
            return Err(Error::value(format!(
                "cannot align: index '{}' has duplicate labels",
                index.name()
            )));
        }
    }
    match join {
        Join::Left => Ok(indexes[0].values().to_vec()),
        Join::Right => Ok(indexes[indexes.len() - 1].values().to_vec()),
        Join::Inner => {
            let mut keep: HashSet<&Value> = indexes[0].values().iter().collect();
            for index in &indexes[1..] {
                let members: HashSet<&Value> = index.values().iter().collect();
                keep.retain(|v| members.contains(*v));
            }
            // first operand's relative order, restricted to the intersection
            Ok(indexes[0]
                .values()
                .iter()
                .filter(|v| keep.contains(v))
                .cloned()
                .collect())
        }
        Join::Outer => {
            let mut union: Vec<Value> = Vec::new();
            let mut seen: HashSet<Value> = HashSet::new();
            for index in indexes {
                for v in index.values() {
                    if seen.insert(v.clone()) {
                        union.push(v.clone());
                    }
                }
            }
            if indexes.iter().all(|i| i.is_monotonic_increasing()) {
                let mut sorted = union.clone();
                let mut comparable = true;
                sorted.sort_by(|a, b| match a.compare(b) {
                    Some(ord) => ord,
                    None => {
                        comparable = false;
                        std::cmp::Ordering::Equal
                    }
                });
                if !comparable {
                    return Err(Error::value(
                        "cannot align: labels of incompatible types",
                    ));
                }
                Ok(sorted)
            } else {
                Ok(union)
            }
        }
    }
}

/// Dimensions present (with a size) in more than one of the given
/// datasets, in first-appearance order.
fn shared_dims(datasets: &[&Dataset]) -> Vec<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for ds in datasets {
        for dim in ds.dim_names() {
            match counts.iter_mut().find(|(d, _)| *d == dim) {
                Some((_, n)) => *n += 1,
                None => counts.push((dim, 1)),
            }
        }
    }
    counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(d, _)| d)
        .collect()
}

/// Reindex every dataset onto joint indexes for all shared dimensions.
/// Positions with no matching label are filled with the missing-value
/// sentinel.
pub fn align(datasets: &[&Dataset], join: Join) -> Result<Vec<Dataset>> {
    if datasets.is_empty() {
        return Ok(Vec::new());
    }
    let mut joint: Vec<(String, Vec<Value>)> = Vec::new();
    for dim in shared_dims(datasets) {
        let indexes: Vec<CoordIndex> = datasets
            .iter()
            .filter(|ds| ds.dims().contains_key(&dim))
            .map(|ds| ds.index(&dim))
            .collect::<Result<Vec<_>>>()?;
        joint.push((dim, joint_index(&indexes, join)?));
    }

    datasets
        .iter()
        .map(|ds| {
            let targets: Vec<(&str, Vec<Value>)> = joint
                .iter()
                .filter(|(d, _)| ds.dims().contains_key(d))
                .map(|(d, v)| (d.as_str(), v.clone()))
                .collect();
            ds.reindex(&targets, false)
        })
        .collect()
}

/// Array form of `align`: reconcile the backing datasets, then re-select
/// each array by name.
pub fn align_arrays(arrays: &[&DataArray], join: Join) -> Result<Vec<DataArray>> {
    let datasets: Vec<&Dataset> = arrays.iter().map(|a| a.dataset()).collect();
    let aligned = align(&datasets, join)?;
    aligned
        .iter()
        .zip(arrays)
        .map(|(ds, a)| ds.get(a.name()))
        .collect()
}

/// Check that two objects agree exactly on every shared dimension's
/// index. Binary arithmetic requires this; reconciling differing labels
/// is the caller's job via `align`.
pub fn ensure_aligned(a: &Dataset, b: &Dataset) -> Result<()> {
    for dim in shared_dims(&[a, b]) {
        let left = a.index(&dim)?;
        let right = b.index(&dim)?;
        if !left.equals(&right) {
            return Err(Error::value(format!(
                "indexes along dimension '{}' are not aligned; use align() to \
                 reconcile them explicitly",
                dim
            )));
        }
    }
    Ok(())
}

/// Merge precondition: shared dimensions must already hold equal indexes.
pub fn align_pair_for_merge<'a>(
    a: &'a Dataset,
    b: &'a Dataset,
) -> Result<(&'a Dataset, &'a Dataset)> {
    ensure_aligned(a, b)?;
    Ok((a, b))
}

/// Conform a variable onto new per-dimension position mappings. `None`
/// positions produce the missing-value sentinel.
pub fn reindex_variable(
    var: &Variable,
    plans: &HashMap<String, Vec<Option<usize>>>,
) -> Result<Variable> {
    let values = var.values()?;
    let src_strides = strides(var.shape());

    let axis_plans: Vec<Option<&Vec<Option<usize>>>> =
        var.dims().iter().map(|d| plans.get(d)).collect();
    let new_shape: Vec<usize> = var
        .shape()
        .iter()
        .zip(&axis_plans)
        .map(|(&n, plan)| plan.map(|p| p.len()).unwrap_or(n))
        .collect();

    let total: usize = new_shape.iter().product();
    let mut data = Vec::with_capacity(total);
    if total > 0 {
        let mut idx = vec![0usize; new_shape.len()];
        loop {
            let mut src = Some(0usize);
            for (axis, &i) in idx.iter().enumerate() {
                let pos = match axis_plans[axis] {
                    Some(plan) => plan[i],
                    None => Some(i),
                };
                src = match (src, pos) {
                    (Some(acc), Some(p)) => Some(acc + p * src_strides[axis]),
                    _ => None,
                };
            }
            data.push(match src {
                Some(s) => values[s].clone(),
                None => Value::Null,
            });
            if !increment(&mut idx, &new_shape) {
                break;
            }
        }
    }

    let mut out = Variable::new(var.dims().to_vec(), new_shape, data)?;
    out.attrs = var.attrs.clone();
    out.encoding = var.encoding.clone();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::int_values;

    fn idx(name: &str, labels: Vec<i64>) -> CoordIndex {
        CoordIndex::new(name, int_values(labels))
    }

    #[test]
    fn test_inner_join_keeps_first_operand_order() {
        let a = idx("x", vec![3, 1, 2]);
        let b = idx("x", vec![2, 3, 9]);
        let joint = joint_index(&[a, b], Join::Inner).unwrap();
        assert_eq!(joint, int_values(vec![3, 2]));
    }

    #[test]
    fn test_outer_join_sorts_when_monotonic() {
        let a = idx("x", vec![1, 3]);
        let b = idx("x", vec![2, 4]);
        let joint = joint_index(&[a, b], Join::Outer).unwrap();
        assert_eq!(joint, int_values(vec![1, 2, 3, 4]));
    }

    #[test]
    fn test_outer_join_appearance_order_when_unsorted() {
        let a = idx("x", vec![3, 1]);
        let b = idx("x", vec![1, 5]);
        let joint = joint_index(&[a, b], Join::Outer).unwrap();
        assert_eq!(joint, int_values(vec![3, 1, 5]));
    }

    #[test]
    fn test_duplicate_labels_cannot_align() {
        let a = idx("x", vec![1, 1, 2]);
        let b = idx("x", vec![1, 2, 3]);
        let err = joint_index(&[a, b], Join::Inner).unwrap_err();
        assert!(err.to_string().contains("cannot align"));
    }

    #[test]
    fn test_left_right_adopt_operand_indexes() {
        let a = idx("x", vec![1, 2]);
        let b = idx("x", vec![2, 3]);
        assert_eq!(
            joint_index(&[a.clone(), b.clone()], Join::Left).unwrap(),
            int_values(vec![1, 2])
        );
        assert_eq!(
            joint_index(&[a, b], Join::Right).unwrap(),
            int_values(vec![2, 3])
        );
    }
}

// src/engine/groupby.rs
//
// Split an array into groups over one dimension, apply a function to
// each group, and combine the results back into a single labeled array.

use crate::core::dataarray::{DataArray, UNNAMED};
use crate::core::index::CoordIndex;
use crate::core::value::Value;
use crate::engine::concat::{concat_arrays, Compat, ConcatDim, ConcatMode};
use crate::engine::error::{Error, Result};
use crate::engine::indexing::{Indexer, LabelIndexer};
use crate::engine::kernels::{BinOp, Reduction};
use std::collections::HashMap;

/// A factorized grouping of one array over one of its dimensions.
///
/// Groups are ordered by first occurrence of their label. Iteration and
/// application both honor `squeeze`: when every group holds exactly one
/// element (grouping over a unique index), the grouped dimension is
/// dropped from each sub-array.
#[derive(Debug, Clone)]
pub struct GroupBy {
    array: DataArray,
    group_name: String,
    group_dim: String,
    labels: Vec<Value>,
    positions: Vec<Vec<usize>>,
    squeeze: bool,
}

/// Factorize labels into (unique labels, positions per label), first
/// occurrence order. Missing-value cells are left out of every group.
fn unique_value_groups(values: &[Value]) -> (Vec<Value>, Vec<Vec<usize>>) {
    let mut labels: Vec<Value> = Vec::new();
    let mut positions: Vec<Vec<usize>> = Vec::new();
    let mut seen: HashMap<Value, usize> = HashMap::new();
    for (i, v) in values.iter().enumerate() {
        if v.is_null() {
            continue;
        }
        match seen.get(v) {
            Some(&g) => positions[g].push(i),
            None => {
                seen.insert(v.clone(), labels.len());
                labels.push(v.clone());
                positions.push(vec![i]);
            }
        }
    }
    (labels, positions)
}

impl GroupBy {
    fn new(array: &DataArray, group: &DataArray, squeeze: bool) -> Result<Self> {
        if group.name() == UNNAMED {
            return Err(Error::value("the variable to group by must have a name"));
        }
        if group.ndim() != 1 {
            return Err(Error::value(format!(
                "the variable to group by, '{}', must be 1 dimensional",
                group.name()
            )));
        }
        let group_dim = group.dims()[0].clone();
        let dim_size = *array.dataset().dims().get(&group_dim).ok_or_else(|| {
            Error::value(format!(
                "cannot group over '{}': the array has no dimension '{}'",
                group.name(),
                group_dim
            ))
        })?;
        if group.size() != dim_size {
            return Err(Error::value(format!(
                "the group variable's length does not match the length of \
                 this array along its dimension '{}'",
                group_dim
            )));
        }
        let (labels, positions) = unique_value_groups(&group.values()?);
        Ok(Self {
            array: array.clone(),
            group_name: group.name().to_string(),
            group_dim,
            labels,
            positions,
            squeeze,
        })
    }

    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    pub fn group_dim(&self) -> &str {
        &self.group_dim
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[Value] {
        &self.labels
    }

    fn squeezes(&self) -> bool {
        self.squeeze && self.positions.iter().all(|p| p.len() == 1)
    }

    fn group_at(&self, g: usize, squeeze: bool) -> Result<DataArray> {
        let indexer = if squeeze {
            Indexer::At(self.positions[g][0] as i64)
        } else {
            Indexer::Positions(self.positions[g].iter().map(|&p| p as i64).collect())
        };
        self.array.isel(&[(self.group_dim.as_str(), indexer)])
    }

    /// Iterate `(label, sub-array)` pairs; restartable.
    pub fn iter(&self) -> impl Iterator<Item = Result<(Value, DataArray)>> + '_ {
        let squeeze = self.squeezes();
        (0..self.labels.len())
            .map(move |g| Ok((self.labels[g].clone(), self.group_at(g, squeeze)?)))
    }

    /// Apply a function to every group and stitch the results back
    /// together. Results that still span the grouped dimension are
    /// stacked along it and returned to their source positions; results
    /// without it are stacked along a new axis labeled by the group key.
    pub fn apply<F>(&self, mut f: F) -> Result<DataArray>
    where
        F: FnMut(DataArray) -> Result<DataArray>,
    {
        let squeeze = self.squeezes();
        let mut results: Vec<DataArray> = Vec::with_capacity(self.labels.len());
        for g in 0..self.labels.len() {
            results.push(f(self.group_at(g, squeeze)?)?);
        }
        self.combine(results)
    }

    fn combine(&self, results: Vec<DataArray>) -> Result<DataArray> {
        if results.is_empty() {
            return Err(Error::value("cannot combine zero groups"));
        }
        let keeps_dim = results[0].dims().contains(&self.group_dim);
        let dim = if keeps_dim {
            ConcatDim::Name(self.group_dim.clone())
        } else {
            ConcatDim::Index(CoordIndex::new(self.group_name.clone(), self.labels.clone()))
        };
        let refs: Vec<&DataArray> = results.iter().collect();
        let combined = concat_arrays(&refs, dim, ConcatMode::Different, Compat::Equals)?;
        if !keeps_dim {
            return Ok(combined);
        }
        // stitching in group order permutes the grouped dimension; put
        // each cell back at its source position while the sizes line up
        let total: usize = self.positions.iter().map(|p| p.len()).sum();
        if combined.dataset().dims().get(&self.group_dim) != Some(&total) {
            return Ok(combined);
        }
        let mut slots: Vec<(usize, i64)> = Vec::with_capacity(total);
        let mut next = 0i64;
        for group in &self.positions {
            for &p in group {
                slots.push((p, next));
                next += 1;
            }
        }
        slots.sort_by_key(|&(p, _)| p);
        let order: Vec<i64> = slots.into_iter().map(|(_, k)| k).collect();
        combined.isel(&[(self.group_dim.as_str(), Indexer::Positions(order))])
    }

    /// Reduce each group over the grouped dimension, yielding one cell
    /// per group along an axis labeled by the group key.
    pub fn reduce(&self, kernel: Reduction) -> Result<DataArray> {
        let dim = self.group_dim.clone();
        let mut results = Vec::with_capacity(self.labels.len());
        for g in 0..self.labels.len() {
            let group = self.group_at(g, false)?;
            results.push(group.reduce(kernel, Some(&[dim.as_str()]), false)?);
        }
        self.combine(results)
    }

    pub fn sum(&self) -> Result<DataArray> {
        self.reduce(Reduction::Sum)
    }

    pub fn mean(&self) -> Result<DataArray> {
        self.reduce(Reduction::Mean)
    }

    /// Grouped arithmetic. An operand indexed by the group key is sliced
    /// per group label; an operand spanning the grouped dimension itself
    /// is sliced at each group's source positions. Anything else is
    /// rejected.
    pub fn binop(&self, other: &DataArray, op: BinOp) -> Result<DataArray> {
        let by_key = other.dims().contains(&self.group_name);
        let by_dim = other.dims().contains(&self.group_dim);
        if !by_key && !by_dim {
            return Err(Error::type_err(format!(
                "grouped operations only support arithmetic with arrays \
                 indexed by '{}' or spanning '{}'",
                self.group_name, self.group_dim
            )));
        }
        let mut results = Vec::with_capacity(self.labels.len());
        for g in 0..self.labels.len() {
            let group = self.group_at(g, false)?;
            let rhs = if by_key {
                other.sel(&[(
                    self.group_name.as_str(),
                    LabelIndexer::scalar(self.labels[g].clone()),
                )])?
            } else {
                other.isel(&[(
                    self.group_dim.as_str(),
                    Indexer::Positions(self.positions[g].iter().map(|&p| p as i64).collect()),
                )])?
            };
            results.push(group.binop(&rhs, op)?);
        }
        self.combine(results)
    }
}

impl DataArray {
    /// Group over a dimension, a coordinate, or a derived field such as
    /// `time.season`.
    pub fn group_by(&self, key: &str, squeeze: bool) -> Result<GroupBy> {
        let group = match self.dataset().get(key) {
            Ok(g) => g,
            // a bare dimension without a coordinate groups over its
            // default integer labels
            Err(_) => {
                let index = self.index(key)?;
                DataArray::new_1d(key, index.values().to_vec(), None, Some(key))?
            }
        };
        GroupBy::new(self, &group, squeeze)
    }

    /// Group by an arbitrary named 1-D array over one of this array's
    /// dimensions.
    pub fn group_by_array(&self, group: &DataArray, squeeze: bool) -> Result<GroupBy> {
        GroupBy::new(self, group, squeeze)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::{int_values, str_values};

    fn sample() -> DataArray {
        DataArray::new_1d(
            "x",
            int_values(vec![1, 2, 3, 4]),
            Some(int_values(vec![10, 20, 30, 40])),
            Some("v"),
        )
        .unwrap()
    }

    fn letters() -> DataArray {
        DataArray::new_1d(
            "x",
            str_values(vec!["a", "b", "a", "b"]),
            None,
            Some("letter"),
        )
        .unwrap()
    }

    #[test]
    fn test_groups_in_first_occurrence_order() {
        let gb = sample().group_by_array(&letters(), true).unwrap();
        assert_eq!(gb.labels(), &str_values(vec!["a", "b"])[..]);
        let pairs: Vec<(Value, DataArray)> =
            gb.iter().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(pairs[0].1.values().unwrap(), int_values(vec![1, 3]));
        assert_eq!(pairs[1].1.values().unwrap(), int_values(vec![2, 4]));
        // iteration restarts cleanly
        assert_eq!(gb.iter().count(), 2);
    }

    #[test]
    fn test_identity_apply_restores_array() {
        let v = sample();
        let out = v.group_by("x", true).unwrap().apply(Ok).unwrap();
        assert!(out.equals(&v).unwrap());
    }

    #[test]
    fn test_identity_apply_with_interleaved_groups() {
        // group members alternate along the dimension, so stitching in
        // group order alone would scramble the array
        let v = sample();
        let out = v
            .group_by_array(&letters(), true)
            .unwrap()
            .apply(Ok)
            .unwrap();
        assert!(out.equals(&v).unwrap());
        assert_eq!(out.values().unwrap(), int_values(vec![1, 2, 3, 4]));
        assert_eq!(
            out.index("x").unwrap().values(),
            &int_values(vec![10, 20, 30, 40])[..]
        );
    }

    #[test]
    fn test_grouped_sum() {
        let gb = sample().group_by_array(&letters(), true).unwrap();
        let out = gb.sum().unwrap();
        assert_eq!(out.dims(), &["letter".to_string()]);
        assert_eq!(out.values().unwrap(), int_values(vec![4, 6]));
        assert_eq!(
            out.index("letter").unwrap().values(),
            &str_values(vec!["a", "b"])[..]
        );
    }

    #[test]
    fn test_grouped_arithmetic_centers_groups() {
        let v = sample();
        let gb = v.group_by_array(&letters(), true).unwrap();
        let means = gb.mean().unwrap();
        let centered = gb.binop(&means, crate::engine::kernels::BinOp::Sub).unwrap();
        // group a has mean 2, group b has mean 3; cells stay at their
        // source positions
        assert_eq!(
            centered.values().unwrap(),
            crate::core::value::float_values(vec![-1.0, -1.0, 1.0, 1.0])
        );
        assert_eq!(
            centered.index("x").unwrap().values(),
            &int_values(vec![10, 20, 30, 40])[..]
        );
    }

    #[test]
    fn test_grouped_arithmetic_with_full_resolution_operand() {
        let v = sample();
        let gb = v.group_by_array(&letters(), true).unwrap();
        // the operand spans the grouped dimension rather than the key
        let out = gb.binop(&v, BinOp::Sub).unwrap();
        assert_eq!(out.values().unwrap(), int_values(vec![0, 0, 0, 0]));
    }

    #[test]
    fn test_group_key_must_be_1d() {
        let v = DataArray::new(
            vec![2, 2],
            int_values(vec![0, 1, 2, 3]),
            crate::core::dataarray::CoordSpec::None,
            Some(&["x", "y"]),
            Some("v"),
        )
        .unwrap();
        let group = v.get("v").unwrap();
        let err = v.group_by_array(&group, true).unwrap_err();
        assert!(err.to_string().contains("must be 1 dimensional"));
    }

    #[test]
    fn test_group_key_must_have_name() {
        let v = sample();
        let unnamed =
            DataArray::new_1d("x", str_values(vec!["a", "b", "a", "b"]), None, None).unwrap();
        let err = v.group_by_array(&unnamed, true).unwrap_err();
        assert!(err.to_string().contains("must have a name"));
    }

    #[test]
    fn test_group_length_mismatch() {
        let v = sample();
        let short = DataArray::new_1d("x", str_values(vec!["a", "b"]), None, Some("g"));
        // a too-short key cannot even coexist with the array's dimension
        let err = v.group_by_array(&short.unwrap(), true).unwrap_err();
        assert!(err.to_string().contains("does not match the length"));
    }
}

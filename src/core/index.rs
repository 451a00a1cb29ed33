// src/core/index.rs

use crate::core::value::Value;
use crate::core::Attrs;
use crate::engine::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An ordered, named 1-D sequence of labels: the unit of truth for a
/// dimension's tick labels. Length always equals the size of the
/// dimension it labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordIndex {
    name: String,
    values: Vec<Value>,
    pub attrs: Attrs,
}

impl CoordIndex {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
            attrs: Attrs::new(),
        }
    }

    pub fn with_attrs(mut self, attrs: Attrs) -> Self {
        self.attrs = attrs;
        self
    }

    /// Default integer labels 0..len, used for dimensions without an
    /// explicit coordinate.
    pub fn default_range(name: impl Into<String>, len: usize) -> Self {
        Self::new(name, (0..len as i64).map(Value::Int).collect())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&Value> {
        self.values.get(i)
    }

    /// Position of the first exact match for `label`.
    pub fn position(&self, label: &Value) -> Option<usize> {
        self.values.iter().position(|v| v == label)
    }

    /// Value -> first position lookup table (exact-match lookups).
    pub fn position_table(&self) -> HashMap<&Value, usize> {
        let mut table = HashMap::with_capacity(self.values.len());
        for (i, v) in self.values.iter().enumerate() {
            table.entry(v).or_insert(i);
        }
        table
    }

    /// Translate a batch of labels to positions; fails on the first
    /// label with no match.
    pub fn positions_of(&self, labels: &[Value]) -> Result<Vec<usize>> {
        let table = self.position_table();
        labels
            .iter()
            .map(|label| {
                table.get(label).copied().ok_or_else(|| {
                    Error::key(format!(
                        "label {} not found in index '{}'",
                        label, self.name
                    ))
                })
            })
            .collect()
    }

    /// True when labels are non-decreasing under `Value::compare`.
    pub fn is_monotonic_increasing(&self) -> bool {
        self.values.windows(2).all(|w| {
            matches!(
                w[0].compare(&w[1]),
                Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal)
            )
        })
    }

    /// Ordered (bisection) lookup for a label slice. Both endpoints are
    /// inclusive, matching label-slice conventions. Requires a monotonic
    /// index.
    pub fn slice_positions(
        &self,
        start: Option<&Value>,
        stop: Option<&Value>,
    ) -> Result<std::ops::Range<usize>> {
        if !self.is_monotonic_increasing() {
            return Err(Error::value(format!(
                "cannot use label slices on non-monotonic index '{}'",
                self.name
            )));
        }
        let lo = match start {
            Some(s) => self.bisect_left(s),
            None => 0,
        };
        let hi = match stop {
            Some(s) => self.bisect_right(s),
            None => self.values.len(),
        };
        Ok(lo..hi.max(lo))
    }

    fn bisect_left(&self, label: &Value) -> usize {
        self.values
            .partition_point(|v| matches!(v.compare(label), Some(std::cmp::Ordering::Less)))
    }

    fn bisect_right(&self, label: &Value) -> usize {
        self.values.partition_point(|v| {
            matches!(
                v.compare(label),
                Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal)
            )
        })
    }

    /// True when every label occurs exactly once.
    pub fn is_unique(&self) -> bool {
        let mut seen = HashMap::with_capacity(self.values.len());
        self.values.iter().all(|v| seen.insert(v, ()).is_none())
    }

    /// Materialize as a 1-D variable over the dimension this index names.
    pub fn into_variable(self) -> crate::core::variable::Variable {
        let mut var = crate::core::variable::Variable::new_1d(self.name, self.values);
        var.attrs = self.attrs;
        var
    }

    /// Same labels in the same order.
    pub fn equals(&self, other: &CoordIndex) -> bool {
        self.values == other.values
    }

    /// `equals` plus name and attribute equality.
    pub fn identical(&self, other: &CoordIndex) -> bool {
        self.name == other.name && self.attrs == other.attrs && self.equals(other)
    }
}

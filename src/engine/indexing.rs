// src/engine/indexing.rs
//
// Translates integer, label, boolean-mask and array-based keys into
// concrete per-axis position selections.

use crate::core::index::CoordIndex;
use crate::core::value::Value;
use crate::engine::error::{Error, Result};

/// A positional (integer-space) selection along one dimension.
#[derive(Debug, Clone, PartialEq)]
pub enum Indexer {
    /// Scalar integer; consumes the dimension. Negative counts from the end.
    At(i64),
    /// Half-open range with step; `None` endpoints mean "from the edge".
    Slice {
        start: Option<i64>,
        stop: Option<i64>,
        step: i64,
    },
    /// Explicit positions, possibly negative, repeated or out of order.
    Positions(Vec<i64>),
    /// Boolean mask; selects where true. Length must match the dimension.
    Mask(Vec<bool>),
}

impl Indexer {
    /// The identity selection.
    pub fn full() -> Self {
        Indexer::Slice {
            start: None,
            stop: None,
            step: 1,
        }
    }

    pub fn slice(start: Option<i64>, stop: Option<i64>) -> Self {
        Indexer::Slice {
            start,
            stop,
            step: 1,
        }
    }

    pub fn range(start: i64, stop: i64) -> Self {
        Indexer::slice(Some(start), Some(stop))
    }

    /// Resolve against a dimension of the given size into a canonical
    /// per-axis selection.
    pub fn normalize(&self, size: usize, dim: &str) -> Result<AxisSel> {
        match self {
            Indexer::At(i) => Ok(AxisSel::Scalar(wrap_index(*i, size, dim)?)),
            Indexer::Slice { start, stop, step } => {
                if *step == 0 {
                    return Err(Error::value(format!(
                        "slice step cannot be zero for dimension '{}'",
                        dim
                    )));
                }
                if *step == 1 && start.is_none() && stop.is_none() {
                    return Ok(AxisSel::All);
                }
                let lo = clamp_endpoint(*start, size, 0);
                let hi = clamp_endpoint(*stop, size, size as i64);
                let positions: Vec<usize> = if *step > 0 {
                    (lo..hi.max(lo))
                        .step_by(*step as usize)
                        .map(|i| i as usize)
                        .collect()
                } else {
                    // negative step walks the clamped range in reverse
                    (lo..hi.max(lo))
                        .rev()
                        .step_by((-*step) as usize)
                        .map(|i| i as usize)
                        .collect()
                };
                Ok(AxisSel::Positions(positions))
            }
            Indexer::Positions(ps) => {
                let positions = ps
                    .iter()
                    .map(|&i| wrap_index(i, size, dim))
                    .collect::<Result<Vec<_>>>()?;
                Ok(AxisSel::Positions(positions))
            }
            Indexer::Mask(mask) => {
                if mask.len() != size {
                    return Err(Error::value(format!(
                        "boolean mask length {} does not match size {} of dimension '{}'",
                        mask.len(),
                        size,
                        dim
                    )));
                }
                Ok(AxisSel::Positions(
                    mask.iter()
                        .enumerate()
                        .filter_map(|(i, &keep)| keep.then_some(i))
                        .collect(),
                ))
            }
        }
    }
}

/// Canonical, bounds-checked selection along one axis. `Scalar` consumes
/// the axis; the other variants keep it.
#[derive(Debug, Clone, PartialEq)]
pub enum AxisSel {
    All,
    Scalar(usize),
    Positions(Vec<usize>),
}

impl AxisSel {
    /// Number of positions the selection keeps along an axis of `size`,
    /// or `None` when the axis is consumed.
    pub fn result_len(&self, size: usize) -> Option<usize> {
        match self {
            AxisSel::All => Some(size),
            AxisSel::Scalar(_) => None,
            AxisSel::Positions(p) => Some(p.len()),
        }
    }

    /// Materialize the kept positions (scalar counts as one).
    pub fn positions(&self, size: usize) -> Vec<usize> {
        match self {
            AxisSel::All => (0..size).collect(),
            AxisSel::Scalar(i) => vec![*i],
            AxisSel::Positions(p) => p.clone(),
        }
    }

    /// Compose `next` (expressed against the output of `self` over an
    /// axis of `size`) into a single selection against the original axis.
    pub fn compose(&self, next: &AxisSel, size: usize) -> AxisSel {
        match (self, next) {
            (AxisSel::All, _) => next.clone(),
            (_, AxisSel::All) => self.clone(),
            (AxisSel::Scalar(_), _) => self.clone(), // axis already consumed
            (AxisSel::Positions(p), AxisSel::Scalar(j)) => AxisSel::Scalar(p[*j]),
            (AxisSel::Positions(p), AxisSel::Positions(q)) => {
                AxisSel::Positions(q.iter().map(|&j| p[j]).collect())
            }
        }
        .clamp_noop(size)
    }

    fn clamp_noop(self, size: usize) -> AxisSel {
        // collapse a full explicit enumeration back to All
        if let AxisSel::Positions(p) = &self {
            if p.len() == size && p.iter().enumerate().all(|(i, &j)| i == j) {
                return AxisSel::All;
            }
        }
        self
    }
}

fn wrap_index(i: i64, size: usize, dim: &str) -> Result<usize> {
    let n = size as i64;
    let wrapped = if i < 0 { i + n } else { i };
    if wrapped < 0 || wrapped >= n {
        return Err(Error::value(format!(
            "index {} is out of bounds for dimension '{}' with size {}",
            i, dim, size
        )));
    }
    Ok(wrapped as usize)
}

fn clamp_endpoint(e: Option<i64>, size: usize, default: i64) -> i64 {
    let n = size as i64;
    let mut v = e.unwrap_or(default);
    if v < 0 {
        v += n;
    }
    v.clamp(0, n)
}

/// A label-space selection along one dimension, translated through that
/// dimension's coordinate index before use.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelIndexer {
    /// Exact-match single label; consumes the dimension.
    Scalar(Value),
    /// Inclusive label range; requires a monotonic index.
    Slice {
        start: Option<Value>,
        stop: Option<Value>,
    },
    /// Exact-match label list.
    Values(Vec<Value>),
    /// Boolean mask over the dimension, selecting where true.
    Mask(Vec<bool>),
}

impl LabelIndexer {
    pub fn scalar(label: impl Into<Value>) -> Self {
        LabelIndexer::Scalar(label.into())
    }

    pub fn slice(start: Option<Value>, stop: Option<Value>) -> Self {
        LabelIndexer::Slice { start, stop }
    }
}

/// Map a label-based indexer through a coordinate index to integer
/// positions.
pub fn convert_label_indexer(index: &CoordIndex, label: &LabelIndexer) -> Result<Indexer> {
    match label {
        LabelIndexer::Scalar(v) => {
            let pos = index.position(v).ok_or_else(|| {
                Error::key(format!(
                    "label {} not found in index '{}'",
                    v,
                    index.name()
                ))
            })?;
            Ok(Indexer::At(pos as i64))
        }
        LabelIndexer::Slice { start, stop } => {
            let range = index.slice_positions(start.as_ref(), stop.as_ref())?;
            Ok(Indexer::slice(
                Some(range.start as i64),
                Some(range.end as i64),
            ))
        }
        LabelIndexer::Values(labels) => {
            let positions = index.positions_of(labels)?;
            Ok(Indexer::Positions(
                positions.into_iter().map(|p| p as i64).collect(),
            ))
        }
        LabelIndexer::Mask(mask) => Ok(Indexer::Mask(mask.clone())),
    }
}

/// Pad a dimension-ordered key out to the full rank with identity slices.
pub fn expanded_indexer(key: &[Indexer], ndim: usize) -> Result<Vec<Indexer>> {
    if key.len() > ndim {
        return Err(Error::value(format!(
            "too many indices: got {} for {} dimensions",
            key.len(),
            ndim
        )));
    }
    let mut out = key.to_vec();
    out.resize(ndim, Indexer::full());
    Ok(out)
}

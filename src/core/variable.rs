// src/core/variable.rs

use crate::core::index::CoordIndex;
use crate::core::store::ArraySource;
use crate::core::value::{Value, ValueType};
use crate::core::Attrs;
use crate::engine::error::{Error, Result};
use crate::engine::indexing::AxisSel;
use crate::engine::kernels::Reduction;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

/// Dense row-major storage for one variable, either resident or deferred
/// to an ArraySource with pending per-axis selections.
#[derive(Debug, Clone)]
enum Block {
    Memory(Arc<Vec<Value>>),
    Deferred {
        source: Arc<dyn ArraySource>,
        base_shape: Vec<usize>,
        sel: Vec<AxisSel>,
    },
}

/// A typed N-D data block plus an ordered tuple of dimension names.
/// Carries no coordinate values of its own; those live in the owning
/// Dataset.
#[derive(Debug, Clone, Serialize)]
pub struct Variable {
    dims: Vec<String>,
    shape: Vec<usize>,
    #[serde(skip)]
    block: Block,
    pub attrs: Attrs,
    /// Serialization hints, opaque to the core.
    pub encoding: Attrs,
}

impl Variable {
    pub fn new(dims: Vec<String>, shape: Vec<usize>, values: Vec<Value>) -> Result<Self> {
        if dims.len() != shape.len() {
            return Err(Error::value(format!(
                "{} dimension names supplied for a block of rank {}",
                dims.len(),
                shape.len()
            )));
        }
        let expected: usize = shape.iter().product();
        if values.len() != expected {
            return Err(Error::value(format!(
                "data length {} does not match shape {:?} (expected {})",
                values.len(),
                shape,
                expected
            )));
        }
        Ok(Self {
            dims,
            shape,
            block: Block::Memory(Arc::new(values)),
            attrs: Attrs::new(),
            encoding: Attrs::new(),
        })
    }

    /// Rank-1 variable over a single dimension.
    pub fn new_1d(dim: impl Into<String>, values: Vec<Value>) -> Self {
        let len = values.len();
        Self::new(vec![dim.into()], vec![len], values).unwrap()
    }

    /// Rank-0 variable.
    pub fn scalar(value: Value) -> Self {
        Self::new(vec![], vec![], vec![value]).unwrap()
    }

    /// Deferred variable; shape comes from the source, nothing is read.
    pub fn from_source(dims: Vec<String>, source: Arc<dyn ArraySource>) -> Result<Self> {
        let base_shape = source.shape();
        if dims.len() != base_shape.len() {
            return Err(Error::value(format!(
                "{} dimension names supplied for a source of rank {}",
                dims.len(),
                base_shape.len()
            )));
        }
        let sel = vec![AxisSel::All; base_shape.len()];
        Ok(Self {
            dims,
            shape: base_shape.clone(),
            block: Block::Deferred {
                source,
                base_shape,
                sel,
            },
            attrs: Attrs::new(),
            encoding: Attrs::new(),
        })
    }

    pub fn with_attrs(mut self, attrs: Attrs) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }

    /// Dominant cell type: the type of the first non-null cell.
    pub fn dtype(&self) -> Result<ValueType> {
        let values = self.values()?;
        Ok(values
            .iter()
            .find(|v| !v.is_null())
            .map(|v| v.value_type())
            .unwrap_or(ValueType::Null))
    }

    /// Whether the block is resident; false means values are still
    /// deferred to their source.
    pub fn in_memory(&self) -> bool {
        matches!(self.block, Block::Memory(_))
    }

    /// Row-major cell values. Reads and filters the backing source for
    /// deferred blocks; borrows otherwise.
    pub fn values(&self) -> Result<Cow<'_, [Value]>> {
        match &self.block {
            Block::Memory(values) => Ok(Cow::Borrowed(values.as_slice())),
            Block::Deferred {
                source,
                base_shape,
                sel,
            } => {
                let raw = source.read()?;
                let (_, data) = gather(&raw, base_shape, sel);
                Ok(Cow::Owned(data))
            }
        }
    }

    /// The single cell of a rank-0 variable.
    pub fn scalar_value(&self) -> Result<Value> {
        let values = self.values()?;
        if values.len() != 1 {
            return Err(Error::value(format!(
                "expected a scalar block, found shape {:?}",
                self.shape
            )));
        }
        Ok(values[0].clone())
    }

    /// Force the block into memory.
    pub fn load(&mut self) -> Result<()> {
        if !self.in_memory() {
            let values = self.values()?.into_owned();
            self.block = Block::Memory(Arc::new(values));
        }
        Ok(())
    }

    /// Duplicate the underlying cells instead of sharing them.
    pub fn deep_copy(&self) -> Result<Variable> {
        let mut out = self.clone();
        out.block = Block::Memory(Arc::new(self.values()?.into_owned()));
        Ok(out)
    }

    /// Orthogonal selection by dimension name. Dimensions absent from
    /// this variable are ignored; scalar selections consume their
    /// dimension. Deferred blocks compose the selection without reading.
    pub fn isel(&self, selection: &[(&str, AxisSel)]) -> Result<Variable> {
        let by_dim: HashMap<&str, &AxisSel> =
            selection.iter().map(|(d, s)| (*d, s)).collect();
        let axis_sels: Vec<AxisSel> = self
            .dims
            .iter()
            .map(|d| by_dim.get(d.as_str()).cloned().cloned().unwrap_or(AxisSel::All))
            .collect();

        let mut new_dims = Vec::new();
        let mut new_shape = Vec::new();
        for ((dim, &size), sel) in self.dims.iter().zip(&self.shape).zip(&axis_sels) {
            if let Some(len) = sel.result_len(size) {
                new_dims.push(dim.clone());
                new_shape.push(len);
            }
        }

        let block = match &self.block {
            Block::Memory(values) => {
                let (_, data) = gather(values, &self.shape, &axis_sels);
                Block::Memory(Arc::new(data))
            }
            Block::Deferred {
                source,
                base_shape,
                sel,
            } => {
                // fold the new selection into the pending one, axis by axis
                let mut composed = Vec::with_capacity(sel.len());
                let mut incoming = axis_sels.iter();
                for (existing, &base_size) in sel.iter().zip(base_shape.iter()) {
                    if matches!(existing, AxisSel::Scalar(_)) {
                        composed.push(existing.clone());
                    } else {
                        let next = incoming.next().cloned().unwrap_or(AxisSel::All);
                        composed.push(existing.compose(&next, base_size));
                    }
                }
                Block::Deferred {
                    source: source.clone(),
                    base_shape: base_shape.clone(),
                    sel: composed,
                }
            }
        };

        Ok(Variable {
            dims: new_dims,
            shape: new_shape,
            block,
            attrs: self.attrs.clone(),
            encoding: self.encoding.clone(),
        })
    }

    /// Reorder dimensions. `order` defaults to the reverse of the current
    /// order and must otherwise be a permutation of it. Materializes the
    /// block.
    pub fn transpose(&self, order: Option<&[&str]>) -> Result<Variable> {
        let perm: Vec<usize> = match order {
            None => (0..self.ndim()).rev().collect(),
            Some(names) => {
                if names.len() != self.ndim() {
                    return Err(Error::value(format!(
                        "arguments to transpose ({:?}) must be a permutation of dims {:?}",
                        names, self.dims
                    )));
                }
                names
                    .iter()
                    .map(|n| {
                        self.dims.iter().position(|d| d == n).ok_or_else(|| {
                            Error::value(format!(
                                "arguments to transpose ({:?}) must be a permutation of dims {:?}",
                                names, self.dims
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?
            }
        };

        let values = self.values()?;
        let new_dims: Vec<String> = perm.iter().map(|&i| self.dims[i].clone()).collect();
        let new_shape: Vec<usize> = perm.iter().map(|&i| self.shape[i]).collect();
        let src_strides = strides(&self.shape);

        let mut data = Vec::with_capacity(values.len());
        if !values.is_empty() {
            let mut idx = vec![0usize; new_shape.len()];
            loop {
                let mut src = 0;
                for (axis, &i) in idx.iter().enumerate() {
                    src += i * src_strides[perm[axis]];
                }
                data.push(values[src].clone());
                if !increment(&mut idx, &new_shape) {
                    break;
                }
            }
        }

        let mut out = Variable::new(new_dims, new_shape, data)?;
        out.attrs = self.attrs.clone();
        out.encoding = self.encoding.clone();
        Ok(out)
    }

    /// Expand this variable onto a superset of its dimensions, repeating
    /// values along the new axes. Shared dimensions must keep their size.
    pub fn broadcast_to(&self, dims: &[String], sizes: &HashMap<String, usize>) -> Result<Variable> {
        for (d, &n) in self.dims.iter().zip(&self.shape) {
            if !dims.contains(d) {
                return Err(Error::value(format!(
                    "cannot broadcast away dimension '{}'",
                    d
                )));
            }
            if sizes.get(d) != Some(&n) {
                return Err(Error::value(format!(
                    "conflicting sizes for dimension '{}' during broadcast",
                    d
                )));
            }
        }

        let new_shape: Vec<usize> = dims
            .iter()
            .map(|d| {
                sizes.get(d).copied().ok_or_else(|| {
                    Error::value(format!("no size known for dimension '{}'", d))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if dims == self.dims.as_slice() {
            return Ok(self.clone());
        }

        let values = self.values()?;
        let src_strides = strides(&self.shape);
        // map each target axis to the source axis it projects onto
        let axis_map: Vec<Option<usize>> = dims
            .iter()
            .map(|d| self.dims.iter().position(|sd| sd == d))
            .collect();

        let total: usize = new_shape.iter().product();
        let mut data = Vec::with_capacity(total);
        if total > 0 {
            let mut idx = vec![0usize; new_shape.len()];
            loop {
                let mut src = 0;
                for (axis, &i) in idx.iter().enumerate() {
                    if let Some(s) = axis_map[axis] {
                        src += i * src_strides[s];
                    }
                }
                data.push(values[src].clone());
                if !increment(&mut idx, &new_shape) {
                    break;
                }
            }
        }

        let mut out = Variable::new(dims.to_vec(), new_shape, data)?;
        out.attrs = self.attrs.clone();
        out.encoding = self.encoding.clone();
        Ok(out)
    }

    /// Apply a reduction kernel over the named dimensions. Dimensions
    /// this variable does not have are ignored; reducing every dimension
    /// yields a rank-0 result.
    pub fn reduce(
        &self,
        kernel: Reduction,
        reduce_dims: &[String],
        keep_attrs: bool,
    ) -> Result<Variable> {
        let reduced_axes: Vec<usize> = self
            .dims
            .iter()
            .enumerate()
            .filter(|(_, d)| reduce_dims.contains(d))
            .map(|(i, _)| i)
            .collect();

        let values = self.values()?;
        let src_strides = strides(&self.shape);

        let kept_axes: Vec<usize> =
            (0..self.ndim()).filter(|i| !reduced_axes.contains(i)).collect();
        let new_dims: Vec<String> = kept_axes.iter().map(|&i| self.dims[i].clone()).collect();
        let new_shape: Vec<usize> = kept_axes.iter().map(|&i| self.shape[i]).collect();
        let lane_shape: Vec<usize> = reduced_axes.iter().map(|&i| self.shape[i]).collect();

        let total: usize = new_shape.iter().product();
        let lane_total: usize = lane_shape.iter().product();
        let mut data = Vec::with_capacity(total);
        if total > 0 {
            let mut out_idx = vec![0usize; new_shape.len()];
            loop {
                let mut base = 0;
                for (k, &axis) in kept_axes.iter().enumerate() {
                    base += out_idx[k] * src_strides[axis];
                }
                let mut lane = Vec::with_capacity(lane_total);
                if lane_total > 0 {
                    let mut lane_idx = vec![0usize; lane_shape.len()];
                    loop {
                        let mut src = base;
                        for (k, &axis) in reduced_axes.iter().enumerate() {
                            src += lane_idx[k] * src_strides[axis];
                        }
                        lane.push(values[src].clone());
                        if !increment(&mut lane_idx, &lane_shape) {
                            break;
                        }
                    }
                }
                data.push(kernel.apply(&lane)?);
                if !increment(&mut out_idx, &new_shape) {
                    break;
                }
            }
        }

        let mut out = Variable::new(new_dims, new_shape, data)?;
        if keep_attrs {
            out.attrs = self.attrs.clone();
        }
        Ok(out)
    }

    /// Convert a 1-D variable into a coordinate index.
    pub fn to_index(&self, name: &str) -> Result<CoordIndex> {
        if self.ndim() != 1 {
            return Err(Error::value(format!(
                "'{}' must be 1 dimensional to be used as an index, got rank {}",
                name,
                self.ndim()
            )));
        }
        Ok(CoordIndex::new(name, self.values()?.into_owned())
            .with_attrs(self.attrs.clone()))
    }

    /// Same dims, shape and cell values.
    pub fn equals(&self, other: &Variable) -> Result<bool> {
        Ok(self.dims == other.dims
            && self.shape == other.shape
            && self.values()?.as_ref() == other.values()?.as_ref())
    }

    /// `equals` plus attribute equality.
    pub fn identical(&self, other: &Variable) -> Result<bool> {
        Ok(self.attrs == other.attrs && self.equals(other)?)
    }

    /// Rewrite dimension names through a mapping, preserving order.
    pub(crate) fn rename_dims(&self, name_map: &HashMap<String, String>) -> Variable {
        let mut out = self.clone();
        out.dims = self
            .dims
            .iter()
            .map(|d| name_map.get(d).cloned().unwrap_or_else(|| d.clone()))
            .collect();
        out
    }
}

/// Row-major strides for a shape.
pub(crate) fn strides(shape: &[usize]) -> Vec<usize> {
    let mut out = vec![1; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        out[i] = out[i + 1] * shape[i + 1];
    }
    out
}

/// Advance a multi-dimensional counter; false once it wraps around.
pub(crate) fn increment(idx: &mut [usize], shape: &[usize]) -> bool {
    for axis in (0..shape.len()).rev() {
        idx[axis] += 1;
        if idx[axis] < shape[axis] {
            return true;
        }
        idx[axis] = 0;
    }
    false
}

/// Orthogonal gather: select `sels[i]` along axis `i` of a row-major
/// block. Returns the kept shape (scalar axes removed) and the data.
fn gather(values: &[Value], shape: &[usize], sels: &[AxisSel]) -> (Vec<usize>, Vec<Value>) {
    let pos_lists: Vec<Vec<usize>> = sels
        .iter()
        .zip(shape)
        .map(|(sel, &size)| sel.positions(size))
        .collect();
    let full_shape: Vec<usize> = pos_lists.iter().map(|p| p.len()).collect();
    let src_strides = strides(shape);

    let total: usize = full_shape.iter().product();
    let mut data = Vec::with_capacity(total);
    if total > 0 {
        let mut idx = vec![0usize; full_shape.len()];
        loop {
            let mut src = 0;
            for (axis, &i) in idx.iter().enumerate() {
                src += pos_lists[axis][i] * src_strides[axis];
            }
            data.push(values[src].clone());
            if !increment(&mut idx, &full_shape) {
                break;
            }
        }
    }

    let kept_shape: Vec<usize> = sels
        .iter()
        .zip(&full_shape)
        .filter(|(sel, _)| !matches!(sel, AxisSel::Scalar(_)))
        .map(|(_, &n)| n)
        .collect();
    (kept_shape, data)
}

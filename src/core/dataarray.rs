// src/core/dataarray.rs

use crate::core::dataset::{Dataset, VarInput};
use crate::core::index::CoordIndex;
use crate::core::value::{Value, ValueType};
use crate::core::variable::Variable;
use crate::core::Attrs;
use crate::engine::align::ensure_aligned;
use crate::engine::error::{Error, Result};
use crate::engine::indexing::{expanded_indexer, Indexer, LabelIndexer};
use crate::engine::kernels::{
    variable_binop, variable_binop_scalar, variable_unop, BinOp, Reduction, UnOp,
};
use serde::Serialize;
use std::collections::HashMap;

/// Placeholder key for arrays constructed without a name.
pub(crate) const UNNAMED: &str = "<unnamed>";

/// One coordinate specification for an axis: an optionally named label
/// sequence.
#[derive(Debug, Clone)]
pub struct CoordDef {
    pub name: Option<String>,
    pub values: Vec<Value>,
}

impl CoordDef {
    pub fn named(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: Some(name.into()),
            values,
        }
    }

    pub fn unnamed(values: Vec<Value>) -> Self {
        Self { name: None, values }
    }
}

/// Coordinates supplied to the constructor: absent, name-keyed, or one
/// per axis in position order.
#[derive(Debug, Clone, Default)]
pub enum CoordSpec {
    #[default]
    None,
    Keyed(Vec<CoordIndex>),
    Positional(Vec<CoordDef>),
}

/// All the logic for naming the axes of a new array: produce canonical
/// `(coords, dims)` from whatever combination the caller supplied.
fn infer_coords_and_dims(
    shape: &[usize],
    coords: CoordSpec,
    dims: Option<&[&str]>,
) -> Result<(Vec<CoordIndex>, Vec<String>)> {
    if let CoordSpec::Positional(defs) = &coords {
        if defs.len() != shape.len() {
            return Err(Error::value(format!(
                "coords is not name-keyed, but it has {} items, which does not \
                 match the {} dimensions of the data",
                defs.len(),
                shape.len()
            )));
        }
    }

    let dims: Vec<String> = match dims {
        Some(names) => names.iter().map(|s| s.to_string()).collect(),
        None => {
            let mut inferred: Vec<String> =
                (0..shape.len()).map(|n| format!("dim_{}", n)).collect();
            match &coords {
                CoordSpec::Keyed(indexes) if indexes.len() == shape.len() => {
                    inferred = indexes.iter().map(|i| i.name().to_string()).collect();
                }
                CoordSpec::Positional(defs) => {
                    for (n, def) in defs.iter().enumerate() {
                        if let Some(name) = &def.name {
                            inferred[n] = name.clone();
                        }
                    }
                }
                _ => {}
            }
            inferred
        }
    };

    let coords: Vec<CoordIndex> = match coords {
        CoordSpec::None => Vec::new(),
        CoordSpec::Keyed(indexes) => indexes,
        CoordSpec::Positional(defs) => defs
            .into_iter()
            .zip(&dims)
            .map(|(def, dim)| CoordIndex::new(dim.clone(), def.values))
            .collect(),
    };

    for coord in &coords {
        if !dims.contains(&coord.name().to_string()) {
            return Err(Error::value(format!(
                "coordinate '{}' has dimensions that are not a subset of the \
                 array dimensions {:?}",
                coord.name(),
                dims
            )));
        }
    }

    Ok((coords, dims))
}

/// N-dimensional array with labeled coordinates and dimensions: a
/// container restricted to exactly one data variable, exposing that
/// variable's shape and type directly while keeping every coordinate as
/// container state.
#[derive(Debug, Clone, Serialize)]
pub struct DataArray {
    dataset: Dataset,
    name: String,
}

impl DataArray {
    /// Construct from a dense block plus optional coordinates, dimension
    /// names and a name.
    pub fn new(
        shape: Vec<usize>,
        values: Vec<Value>,
        coords: CoordSpec,
        dims: Option<&[&str]>,
        name: Option<&str>,
    ) -> Result<Self> {
        let (coords, dims) = infer_coords_and_dims(&shape, coords, dims)?;
        let name = name.unwrap_or(UNNAMED).to_string();

        let mut ds = Dataset::new();
        for coord in coords {
            ds.insert_coord(coord)?;
        }
        let var = Variable::new(dims, shape, values)?;
        ds.insert_variable(&name, var, false)?;
        Ok(Self { dataset: ds, name })
    }

    /// 1-D convenience constructor.
    pub fn new_1d(
        dim: &str,
        values: Vec<Value>,
        labels: Option<Vec<Value>>,
        name: Option<&str>,
    ) -> Result<Self> {
        let shape = vec![values.len()];
        let coords = match labels {
            Some(labels) => CoordSpec::Keyed(vec![CoordIndex::new(dim, labels)]),
            None => CoordSpec::None,
        };
        Self::new(shape, values, coords, Some(&[dim]), name)
    }

    /// Wrap a dataset that already holds `name`; used by Dataset::get.
    pub(crate) fn from_dataset(dataset: Dataset, name: &str) -> Result<Self> {
        if !dataset.contains(name) {
            return Err(Error::key(format!(
                "no variable named '{}' in this dataset",
                name
            )));
        }
        Ok(Self {
            dataset,
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Convert back into a full container, optionally under a new name.
    pub fn to_dataset(&self, name: Option<&str>) -> Result<Dataset> {
        match name {
            None => Ok(self.dataset.clone()),
            Some(new_name) => Ok(self.rename(new_name)?.dataset),
        }
    }

    pub fn variable(&self) -> &Variable {
        self.dataset
            .variable(&self.name)
            .expect("view name always present in backing dataset")
    }

    pub fn dims(&self) -> &[String] {
        self.variable().dims()
    }

    pub fn shape(&self) -> &[usize] {
        self.variable().shape()
    }

    pub fn ndim(&self) -> usize {
        self.variable().ndim()
    }

    pub fn size(&self) -> usize {
        self.variable().size()
    }

    pub fn dtype(&self) -> Result<ValueType> {
        self.variable().dtype()
    }

    pub fn values(&self) -> Result<Vec<Value>> {
        Ok(self.variable().values()?.into_owned())
    }

    pub fn scalar_value(&self) -> Result<Value> {
        self.variable().scalar_value()
    }

    pub fn attrs(&self) -> &Attrs {
        &self.variable().attrs
    }

    /// The 1-D coordinate indexes held by this array.
    pub fn coords(&self) -> Vec<CoordIndex> {
        self.dataset
            .coord_var_names()
            .into_iter()
            .filter_map(|name| {
                let var = self.dataset.variable(&name)?;
                if var.ndim() == 1 {
                    var.to_index(&name).ok()
                } else {
                    None
                }
            })
            .collect()
    }

    /// Member or virtual-field lookup, e.g. `array.get("time.month")`.
    pub fn get(&self, key: &str) -> Result<DataArray> {
        self.dataset.get(key)
    }

    pub fn index(&self, dim: &str) -> Result<CoordIndex> {
        self.dataset.index(dim)
    }

    /// Convert a 1-D array into a coordinate index.
    pub fn to_index(&self) -> Result<CoordIndex> {
        self.variable().to_index(&self.name)
    }

    fn with_dataset(&self, dataset: Dataset) -> Result<DataArray> {
        dataset.get(&self.name)
    }

    pub fn isel(&self, selection: &[(&str, Indexer)]) -> Result<DataArray> {
        self.with_dataset(self.dataset.isel(selection)?)
    }

    pub fn sel(&self, selection: &[(&str, LabelIndexer)]) -> Result<DataArray> {
        self.with_dataset(self.dataset.sel(selection)?)
    }

    /// Dimension-ordered positional key, like `array[key]`.
    pub fn select(&self, key: &[Indexer]) -> Result<DataArray> {
        let expanded = expanded_indexer(key, self.ndim())?;
        let dims = self.dims().to_vec();
        let selection: Vec<(&str, Indexer)> = dims
            .iter()
            .map(|d| d.as_str())
            .zip(expanded)
            .collect();
        self.isel(&selection)
    }

    /// Dimension-ordered label key, like `array.loc[key]`.
    pub fn loc(&self, key: &[LabelIndexer]) -> Result<DataArray> {
        if key.len() > self.ndim() {
            return Err(Error::value(format!(
                "too many indices: got {} for {} dimensions",
                key.len(),
                self.ndim()
            )));
        }
        let dims = self.dims().to_vec();
        let selection: Vec<(&str, LabelIndexer)> = dims
            .iter()
            .map(|d| d.as_str())
            .zip(key.iter().cloned())
            .collect();
        self.sel(&selection)
    }

    pub fn reindex(&self, targets: &[(&str, Vec<Value>)], copy: bool) -> Result<DataArray> {
        self.with_dataset(self.dataset.reindex(targets, copy)?)
    }

    pub fn reindex_like(&self, other: &DataArray, copy: bool) -> Result<DataArray> {
        self.with_dataset(self.dataset.reindex_like(&other.dataset, copy)?)
    }

    pub fn squeeze(&self, dim: Option<&str>) -> Result<DataArray> {
        self.with_dataset(self.dataset.squeeze(dim)?)
    }

    /// Rename this array, or several names at once through a mapping.
    pub fn rename(&self, new_name: &str) -> Result<DataArray> {
        let mut map = HashMap::new();
        map.insert(self.name.clone(), new_name.to_string());
        self.rename_map(&map)
    }

    pub fn rename_map(&self, name_map: &HashMap<String, String>) -> Result<DataArray> {
        let renamed = self.dataset.rename(name_map)?;
        let new_name = name_map
            .get(&self.name)
            .cloned()
            .unwrap_or_else(|| self.name.clone());
        renamed.get(&new_name)
    }

    pub fn transpose(&self, order: Option<&[&str]>) -> Result<DataArray> {
        let var = self.variable().transpose(order)?;
        let mut ds = self.dataset.clone();
        ds.insert_variable(&self.name, var, false)?;
        ds.get(&self.name)
    }

    /// Demote non-index coordinates to data variables (returning a full
    /// Dataset), or drop them (staying an array).
    pub fn reset_coords(&self, names: &[&str], drop: bool) -> Result<Dataset> {
        let mut ds = self.dataset.clone();
        ds.reset_coords(names, drop)?;
        Ok(ds)
    }

    /// Reduce over named dimensions (all by default). Coordinates that
    /// depended on a reduced dimension are dropped from the result.
    pub fn reduce(
        &self,
        kernel: Reduction,
        dims: Option<&[&str]>,
        keep_attrs: bool,
    ) -> Result<DataArray> {
        let reduce_dims: Vec<String> = match dims {
            Some(ds) => {
                for d in ds {
                    if !self.dims().contains(&d.to_string()) {
                        return Err(Error::value(format!(
                            "array does not contain dimension '{}'",
                            d
                        )));
                    }
                }
                ds.iter().map(|s| s.to_string()).collect()
            }
            None => self.dims().to_vec(),
        };
        let var = self.variable().reduce(kernel, &reduce_dims, keep_attrs)?;
        self.rebuild_around(var)
    }

    pub fn sum(&self, dims: Option<&[&str]>) -> Result<DataArray> {
        self.reduce(Reduction::Sum, dims, false)
    }

    pub fn mean(&self, dims: Option<&[&str]>) -> Result<DataArray> {
        self.reduce(Reduction::Mean, dims, false)
    }

    /// Build a result view around a replacement variable, keeping every
    /// coordinate whose dimensions survive.
    pub(crate) fn rebuild_around(&self, var: Variable) -> Result<DataArray> {
        let name = self.name.clone();
        self.rebuild_named(&name, var)
    }

    fn rebuild_named(&self, name: &str, var: Variable) -> Result<DataArray> {
        let var_dims: Vec<String> = var.dims().to_vec();
        let mut ds = Dataset::new();
        for coord_name in self.dataset.coord_var_names() {
            if coord_name == name {
                continue;
            }
            let coord = self
                .dataset
                .variable(&coord_name)
                .expect("coordinate listed but missing");
            if coord.dims().iter().all(|d| var_dims.contains(d)) {
                ds.insert_variable(&coord_name, coord.clone(), true)?;
            }
        }
        ds.insert_variable(name, var, false)?;
        ds.get(name)
    }

    /// Result name for an arithmetic output: drop the name when it
    /// labels a dimension or when the operands disagree.
    fn result_name(&self, other: Option<&DataArray>) -> String {
        let name_is_dim = self.dims().contains(&self.name);
        let ambiguous = other.map(|o| o.name != self.name).unwrap_or(false);
        if name_is_dim || ambiguous {
            UNNAMED.to_string()
        } else {
            self.name.clone()
        }
    }

    /// Named elementwise binary operation with another labeled array.
    /// Shared dimensions must hold exactly equal indexes; reconciling
    /// differing labels requires an explicit `align`.
    pub fn binop(&self, other: &DataArray, op: BinOp) -> Result<DataArray> {
        ensure_aligned(&self.dataset, &other.dataset)?;
        let var = variable_binop(self.variable(), other.variable(), op)?;

        let mut ds = Dataset::new();
        let var_dims = var.dims().to_vec();
        for source in [&self.dataset, &other.dataset] {
            for name in source.coord_var_names() {
                if ds.contains(&name) {
                    continue;
                }
                let coord = source.variable(&name).expect("listed coordinate");
                if coord.dims().iter().all(|d| var_dims.contains(d)) {
                    ds.insert_variable(&name, coord.clone(), true)?;
                }
            }
        }
        let name = self.result_name(Some(other));
        ds.insert_variable(&name, var, false)?;
        ds.get(&name)
    }

    /// Named elementwise operation against a scalar cell.
    pub fn binop_scalar(&self, scalar: impl Into<Value>, op: BinOp) -> Result<DataArray> {
        let var = variable_binop_scalar(self.variable(), &scalar.into(), op)?;
        let name = self.result_name(None);
        self.rebuild_named(&name, var)
    }

    pub fn unop(&self, op: UnOp) -> Result<DataArray> {
        self.rebuild_around(variable_unop(self.variable(), op)?)
    }

    /// Same dimensions, coordinates and values.
    pub fn equals(&self, other: &DataArray) -> Result<bool> {
        Ok(self.coords_equal(other)? && self.variable().equals(other.variable())?)
    }

    /// Like `equals`, but also checks the name and all attributes.
    pub fn identical(&self, other: &DataArray) -> Result<bool> {
        Ok(self.name == other.name
            && self.coords_equal(other)?
            && self.variable().identical(other.variable())?)
    }

    fn coords_equal(&self, other: &DataArray) -> Result<bool> {
        let mine = self.dataset.coord_var_names();
        let theirs = other.dataset.coord_var_names();
        if mine.len() != theirs.len() {
            return Ok(false);
        }
        for name in mine {
            let a = self.dataset.variable(&name);
            let b = other.dataset.variable(&name);
            match (a, b) {
                (Some(a), Some(b)) => {
                    if !a.equals(b)? {
                        return Ok(false);
                    }
                }
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Assign an entry on the backing container (a coordinate or an
    /// auxiliary variable); the view keeps only entries compatible with
    /// its own dimensions.
    pub fn set(&mut self, key: &str, value: VarInput) -> Result<()> {
        let mut ds = self.dataset.clone();
        ds.set(key, value)?;
        *self = ds.get(&self.name)?;
        Ok(())
    }
}

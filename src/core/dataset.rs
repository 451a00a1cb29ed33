// src/core/dataset.rs

use crate::core::dataarray::DataArray;
use crate::core::index::CoordIndex;
use crate::core::store::DataStore;
use crate::core::value::Value;
use crate::core::variable::Variable;
use crate::core::Attrs;
use crate::engine::align::{ensure_aligned, reindex_variable};
use crate::engine::error::{Error, Result};
use crate::engine::indexing::{convert_label_indexer, AxisSel, Indexer, LabelIndexer};
use crate::engine::kernels::{
    variable_binop, variable_binop_scalar, variable_unop, BinOp, Reduction, UnOp,
};
use crate::engine::virtuals;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// What a container-level assignment accepts: a bare block, a full
/// variable, or another labeled array whose coordinates get merged in.
#[derive(Debug, Clone)]
pub enum VarInput {
    /// Bare data block; dimension names are taken from an existing entry
    /// of the same name and rank.
    Values(Vec<usize>, Vec<Value>),
    /// Explicit `(dims, data, attrs, encoding)` form.
    Variable(Variable),
    /// A labeled array; its coordinates are merged into the container.
    Array(DataArray),
}

/// An ordered mapping from names to variables, partitioned into
/// coordinate and data roles, with dimension sizes enforced consistent
/// across every member.
#[derive(Debug, Clone, Serialize, Default)]
pub struct Dataset {
    order: Vec<String>,
    arrays: HashMap<String, Variable>,
    coord_names: HashSet<String>,
    pub attrs: Attrs,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct from data variables and coordinates, validating name
    /// disjointness and dimension-size consistency.
    pub fn from_parts(
        variables: Vec<(String, Variable)>,
        coords: Vec<CoordIndex>,
        attrs: Attrs,
    ) -> Result<Self> {
        let coord_set: HashSet<&str> = coords.iter().map(|c| c.name()).collect();
        for (name, _) in &variables {
            if coord_set.contains(name.as_str()) {
                return Err(Error::value(format!(
                    "redundant variables and coordinates: '{}' appears in both",
                    name
                )));
            }
        }

        let mut ds = Dataset {
            attrs,
            ..Default::default()
        };
        for coord in coords {
            let name = coord.name().to_string();
            let var = CoordIndex::into_variable(coord);
            ds.insert_checked(&name, var, true)?;
        }
        for (name, var) in variables {
            // a 1-D variable over its own name takes the coordinate role
            let as_coord = var.dims() == [name.clone()];
            ds.insert_checked(&name, var, as_coord)?;
        }
        Ok(ds)
    }

    /// Open every variable of a backing store as a deferred member.
    pub fn from_store(store: &dyn DataStore) -> Result<Self> {
        let mut ds = Dataset {
            attrs: store.attrs(),
            ..Default::default()
        };
        for (name, var, is_coord) in crate::core::store::open_store_variables(store)? {
            ds.insert_checked(&name, var, is_coord)?;
        }
        Ok(ds)
    }

    /// Insert with full validation, preserving insertion order on fresh
    /// names and position on replacement.
    fn insert_checked(&mut self, name: &str, var: Variable, as_coord: bool) -> Result<()> {
        if as_coord {
            // a coordinate is 1-D over its own name, or a scalar left
            // behind by rank reduction
            let well_formed = var.ndim() == 0
                || (var.ndim() == 1 && var.dims() == [name.to_string()]);
            if !well_formed {
                return Err(Error::value(format!(
                    "coordinate '{}' must be defined with 1-d data over its own dimension",
                    name
                )));
            }
            if let Some(existing) = self.arrays.get(name) {
                if existing.ndim() == 0 && var.size() > 1 {
                    return Err(Error::value(format!(
                        "'{}' already exists as a scalar variable",
                        name
                    )));
                }
            }
        }

        // validate sizes against every other member before committing
        let mut sizes = self.dim_sizes_excluding(Some(name));
        for (d, &n) in var.dims().iter().zip(var.shape()) {
            if let Some(&existing) = sizes.get(d) {
                if existing != n {
                    return Err(Error::value(format!(
                        "conflicting sizes for dimension '{}': {} vs {}",
                        d, n, existing
                    )));
                }
            } else {
                sizes.insert(d.clone(), n);
            }
        }

        if !self.arrays.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.arrays.insert(name.to_string(), var);
        if as_coord {
            self.coord_names.insert(name.to_string());
        } else {
            self.coord_names.remove(name);
        }
        Ok(())
    }

    fn dim_sizes_excluding(&self, skip: Option<&str>) -> HashMap<String, usize> {
        let mut sizes = HashMap::new();
        for name in &self.order {
            if skip == Some(name.as_str()) {
                continue;
            }
            let var = &self.arrays[name];
            for (d, &n) in var.dims().iter().zip(var.shape()) {
                sizes.insert(d.clone(), n);
            }
        }
        sizes
    }

    /// Dimension name -> size, derived from the member variables.
    pub fn dims(&self) -> HashMap<String, usize> {
        self.dim_sizes_excluding(None)
    }

    /// Dimension names in first-appearance order.
    pub fn dim_names(&self) -> Vec<String> {
        let mut out = Vec::new();
        for name in &self.order {
            for d in self.arrays[name].dims() {
                if !out.contains(d) {
                    out.push(d.clone());
                }
            }
        }
        out
    }

    pub fn contains(&self, name: &str) -> bool {
        self.arrays.contains_key(name)
    }

    /// All member names in insertion order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Data (non-coordinate) variable names in insertion order.
    pub fn data_var_names(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|n| !self.coord_names.contains(*n))
            .cloned()
            .collect()
    }

    /// Coordinate names in insertion order.
    pub fn coord_var_names(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|n| self.coord_names.contains(*n))
            .cloned()
            .collect()
    }

    pub fn is_coord(&self, name: &str) -> bool {
        self.coord_names.contains(name)
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.arrays.get(name)
    }

    /// Member variable, or a derived datetime component for dotted names
    /// like `time.month`.
    pub fn get_variable(&self, name: &str) -> Result<Variable> {
        if let Some(var) = self.arrays.get(name) {
            return Ok(var.clone());
        }
        if let Some((base, component)) = virtuals::split_key(name) {
            if let Some(var) = self.arrays.get(base) {
                return virtuals::derive_variable(var, component);
            }
        }
        Err(Error::key(format!(
            "no variable named '{}' in this dataset",
            name
        )))
    }

    /// The coordinate index for a dimension: the explicit coordinate when
    /// one exists, otherwise default integer labels.
    pub fn index(&self, dim: &str) -> Result<CoordIndex> {
        if let Some(var) = self.arrays.get(dim) {
            if self.coord_names.contains(dim) {
                return var.to_index(dim);
            }
        }
        let size = *self.dims().get(dim).ok_or_else(|| {
            Error::key(format!("no dimension named '{}' in this dataset", dim))
        })?;
        Ok(CoordIndex::default_range(dim, size))
    }

    /// Coordinate indexes for every dimension, in dimension order.
    pub fn indexes(&self) -> Vec<CoordIndex> {
        self.dim_names()
            .iter()
            .filter_map(|d| self.index(d).ok())
            .collect()
    }

    /// Single-array view of a member or virtual field. The view holds a
    /// private filtered copy: the named variable plus every coordinate
    /// whose dimensions are a subset of its dimensions.
    pub fn get(&self, name: &str) -> Result<DataArray> {
        let var = self.get_variable(name)?;
        let var_dims: HashSet<&str> = var.dims().iter().map(|s| s.as_str()).collect();

        let mut ds = Dataset::new();
        for coord_name in self.coord_var_names() {
            if coord_name == name {
                continue;
            }
            let coord = &self.arrays[&coord_name];
            if coord.dims().iter().all(|d| var_dims.contains(d.as_str())) {
                ds.insert_checked(&coord_name, coord.clone(), true)?;
            }
        }
        // a coordinate viewed as an array keeps its coordinate role;
        // a derived virtual field becomes a coordinate automatically
        let as_coord = (self.coord_names.contains(name) && var_dims.contains(name))
            || (!self.arrays.contains_key(name) && virtuals::split_key(name).is_some());
        ds.insert_checked(name, var, as_coord)?;
        DataArray::from_dataset(ds, name)
    }

    /// Container-level assignment (see `VarInput`). Builds a validated
    /// replacement state and swaps it in, so failures leave the container
    /// unmodified.
    pub fn set(&mut self, name: &str, value: VarInput) -> Result<()> {
        let mut next = self.clone();
        match value {
            VarInput::Variable(var) => {
                let as_coord = var.dims() == [name.to_string()]
                    || (next.coord_names.contains(name) && var.ndim() == 1);
                next.insert_checked(name, var, as_coord)?;
            }
            VarInput::Values(shape, values) => {
                let dims = match next.arrays.get(name) {
                    Some(existing) if existing.ndim() == shape.len() => {
                        existing.dims().to_vec()
                    }
                    _ => {
                        return Err(Error::value(format!(
                            "cannot set variable '{}' from a bare block without \
                             explicit dimensions",
                            name
                        )))
                    }
                };
                let as_coord = next.coord_names.contains(name);
                next.insert_checked(name, Variable::new(dims, shape, values)?, as_coord)?;
            }
            VarInput::Array(array) => {
                // align the incoming array onto this container's indexes
                // for every shared, labeled dimension
                let mut targets = Vec::new();
                for dim in array.dims() {
                    if next.coord_names.contains(dim.as_str())
                        && next.dims().contains_key(dim.as_str())
                    {
                        targets.push((dim.clone(), next.index(dim)?.into_values()));
                    }
                }
                let target_refs: Vec<(&str, Vec<Value>)> = targets
                    .iter()
                    .map(|(d, v)| (d.as_str(), v.clone()))
                    .collect();
                let aligned = array.reindex(&target_refs, true)?;

                for coord in aligned.coords() {
                    if !next.contains(coord.name()) {
                        let coord_name = coord.name().to_string();
                        next.insert_checked(
                            &coord_name,
                            CoordIndex::into_variable(coord),
                            true,
                        )?;
                    }
                }
                next.insert_checked(name, aligned.variable().clone(), false)?;
            }
        }
        *self = next;
        Ok(())
    }

    /// Remove an entry. Deleting a dimension name cascades to every
    /// variable that depends on that dimension.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        if !self.arrays.contains_key(name) {
            return Err(Error::key(format!(
                "no variable named '{}' in this dataset",
                name
            )));
        }
        let is_dim = self.dims().contains_key(name);
        let mut next = self.clone();
        next.remove_entry(name);
        if is_dim {
            let dependent: Vec<String> = next
                .order
                .iter()
                .filter(|n| next.arrays[*n].dims().contains(&name.to_string()))
                .cloned()
                .collect();
            for n in dependent {
                next.remove_entry(&n);
            }
        }
        *self = next;
        Ok(())
    }

    fn remove_entry(&mut self, name: &str) {
        self.arrays.remove(name);
        self.coord_names.remove(name);
        self.order.retain(|n| n != name);
    }

    /// Remove the listed variables, with the same dimension cascade as
    /// `delete`.
    pub fn drop_vars(&mut self, names: &[&str]) -> Result<()> {
        let mut next = self.clone();
        for name in names {
            if next.contains(name) {
                next.delete(name)?;
            }
        }
        *self = next;
        Ok(())
    }

    /// Demote the named coordinates to data variables (all non-index
    /// coordinates when `names` is empty), or drop them entirely.
    pub fn reset_coords(&mut self, names: &[&str], drop: bool) -> Result<()> {
        let targets: Vec<String> = if names.is_empty() {
            self.coord_var_names()
                .into_iter()
                .filter(|n| !self.dims().contains_key(n))
                .collect()
        } else {
            for n in names {
                if !self.coord_names.contains(*n) {
                    return Err(Error::value(format!(
                        "cannot reset '{}': not a coordinate in this dataset",
                        n
                    )));
                }
                if self.dims().contains_key(*n) {
                    return Err(Error::value(format!(
                        "cannot remove index coordinate '{}'",
                        n
                    )));
                }
            }
            names.iter().map(|s| s.to_string()).collect()
        };
        let mut next = self.clone();
        for name in &targets {
            if drop {
                next.remove_entry(name);
            } else {
                next.coord_names.remove(name);
            }
        }
        *self = next;
        Ok(())
    }

    /// Rename variables and dimensions. Every old name referenced by any
    /// member's dims is rewritten.
    pub fn rename(&self, name_map: &HashMap<String, String>) -> Result<Dataset> {
        let dims = self.dims();
        for old in name_map.keys() {
            if !self.arrays.contains_key(old) && !dims.contains_key(old) {
                return Err(Error::value(format!(
                    "cannot rename '{}' because it is not a variable or dimension \
                     in this dataset",
                    old
                )));
            }
        }
        let mut targets = HashSet::new();
        for new in name_map.values() {
            if !targets.insert(new) {
                return Err(Error::value(format!(
                    "the new name '{}' is used for more than one variable",
                    new
                )));
            }
        }

        let mut out = Dataset {
            attrs: self.attrs.clone(),
            ..Default::default()
        };
        for name in &self.order {
            let new_name = name_map.get(name).cloned().unwrap_or_else(|| name.clone());
            let var = self.arrays[name].rename_dims(name_map);
            out.insert_checked(&new_name, var, self.coord_names.contains(name))?;
        }
        Ok(out)
    }

    /// In-place rename via copy-then-swap.
    pub fn rename_in_place(&mut self, name_map: &HashMap<String, String>) -> Result<()> {
        *self = self.rename(name_map)?;
        Ok(())
    }

    /// Select by integer position along named dimensions. Unspecified
    /// dimensions pass through; a scalar indexer consumes its dimension
    /// and rank-reduces the matching coordinate.
    pub fn isel(&self, selection: &[(&str, Indexer)]) -> Result<Dataset> {
        let dims = self.dims();
        let mut sels: Vec<(&str, AxisSel)> = Vec::with_capacity(selection.len());
        for (dim, indexer) in selection {
            let size = *dims.get(*dim).ok_or_else(|| {
                Error::value(format!(
                    "dimension '{}' does not exist in this dataset",
                    dim
                ))
            })?;
            sels.push((*dim, indexer.normalize(size, dim)?));
        }

        let mut out = Dataset {
            attrs: self.attrs.clone(),
            ..Default::default()
        };
        for name in &self.order {
            let var = self.arrays[name].isel(&sels)?;
            // a coordinate consumed to rank 0 stays a (scalar) coordinate
            out.insert_checked(name, var, self.coord_names.contains(name))?;
        }
        Ok(out)
    }

    /// Select by label along named dimensions: labels are translated to
    /// positions through each dimension's coordinate index, then
    /// delegated to `isel`.
    pub fn sel(&self, selection: &[(&str, LabelIndexer)]) -> Result<Dataset> {
        let mut positional = Vec::with_capacity(selection.len());
        for (dim, label) in selection {
            let index = self.index(dim)?;
            positional.push((*dim, convert_label_indexer(&index, label)?));
        }
        self.isel(&positional)
    }

    /// Drop length-1 dimensions (all of them, or just `dim`).
    pub fn squeeze(&self, dim: Option<&str>) -> Result<Dataset> {
        let dims = self.dims();
        let targets: Vec<&str> = match dim {
            Some(d) => {
                let size = *dims.get(d).ok_or_else(|| {
                    Error::key(format!("no dimension named '{}' in this dataset", d))
                })?;
                if size != 1 {
                    return Err(Error::value(format!(
                        "cannot select a dimension to squeeze out which has length \
                         greater than one: '{}'",
                        d
                    )));
                }
                vec![d]
            }
            None => dims
                .iter()
                .filter(|(_, &n)| n == 1)
                .map(|(d, _)| d.as_str())
                .collect(),
        };
        let selection: Vec<(&str, Indexer)> =
            targets.into_iter().map(|d| (d, Indexer::At(0))).collect();
        self.isel(&selection)
    }

    /// Conform onto new per-dimension indexes; unmatched labels are
    /// filled with the missing-value sentinel. With `copy = false`,
    /// dimensions whose target equals the current index reuse the
    /// original variables unchanged.
    pub fn reindex(&self, targets: &[(&str, Vec<Value>)], copy: bool) -> Result<Dataset> {
        let dims = self.dims();
        // map old positions for every dimension that actually changes
        let mut plans: HashMap<String, Vec<Option<usize>>> = HashMap::new();
        let mut new_indexes: Vec<CoordIndex> = Vec::new();
        for (dim, labels) in targets {
            if !dims.contains_key(*dim) {
                continue; // mismatched dimension names are simply ignored
            }
            let current = self.index(dim)?;
            let unchanged = current.values() == labels.as_slice();
            new_indexes.push(CoordIndex::new(*dim, labels.clone()));
            if unchanged && !copy {
                continue;
            }
            let table = current.position_table();
            plans.insert(
                dim.to_string(),
                labels.iter().map(|l| table.get(l).copied()).collect(),
            );
        }

        let mut out = Dataset {
            attrs: self.attrs.clone(),
            ..Default::default()
        };
        for name in &self.order {
            let var = &self.arrays[name];
            let needs = var.dims().iter().any(|d| plans.contains_key(d));
            let new_var = if needs {
                reindex_variable(var, &plans)?
            } else if copy {
                var.deep_copy()?
            } else {
                var.clone()
            };
            out.insert_checked(name, new_var, self.coord_names.contains(name))?;
        }
        // write the requested indexes as coordinates of the result
        for index in new_indexes {
            let name = index.name().to_string();
            out.insert_checked(&name, CoordIndex::into_variable(index), true)?;
        }
        Ok(out)
    }

    /// Conform onto the indexes of another dataset for every shared
    /// dimension.
    pub fn reindex_like(&self, other: &Dataset, copy: bool) -> Result<Dataset> {
        let my_dims = self.dims();
        let mut targets = Vec::new();
        for index in other.indexes() {
            if my_dims.contains_key(index.name()) {
                targets.push((index.name().to_string(), index.into_values()));
            }
        }
        let refs: Vec<(&str, Vec<Value>)> = targets
            .iter()
            .map(|(d, v)| (d.as_str(), v.clone()))
            .collect();
        self.reindex(&refs, copy)
    }

    /// Union with another dataset. Overlapping data variables must be
    /// equal; overlapping coordinates must hold aligned values. Datasets
    /// sharing a dimension with differing indexes are reconciled through
    /// the alignment engine first.
    pub fn merge(&self, other: &Dataset) -> Result<Dataset> {
        let (left, right) = crate::engine::align::align_pair_for_merge(self, other)?;

        let mut out = left.clone();
        for name in &right.order {
            let var = &right.arrays[name];
            let as_coord = right.coord_names.contains(name);
            if let Some(existing) = out.arrays.get(name) {
                if !existing.equals(var)? {
                    if as_coord || out.coord_names.contains(name) {
                        return Err(Error::value(format!(
                            "coordinates with these names already exist and have \
                             conflicting values: '{}'",
                            name
                        )));
                    }
                    return Err(Error::value(format!(
                        "variables with these names already exist and have \
                         conflicting values: '{}'",
                        name
                    )));
                }
            } else {
                out.insert_checked(name, var.clone(), as_coord)?;
            }
        }
        Ok(out)
    }

    /// Apply a reduction kernel over named dimensions (all dimensions by
    /// default). Coordinates depending on a reduced dimension are dropped;
    /// data variables keep their remaining dimensions, down to rank 0.
    pub fn reduce(
        &self,
        kernel: Reduction,
        dims: Option<&[&str]>,
        keep_attrs: bool,
    ) -> Result<Dataset> {
        let all_dims = self.dims();
        let reduce_dims: Vec<String> = match dims {
            Some(ds) => {
                let missing: Vec<&&str> =
                    ds.iter().filter(|d| !all_dims.contains_key(**d)).collect();
                if !missing.is_empty() {
                    return Err(Error::value(format!(
                        "Dataset does not contain the dimensions: {:?}",
                        missing
                    )));
                }
                ds.iter().map(|s| s.to_string()).collect()
            }
            None => all_dims.keys().cloned().collect(),
        };

        let mut out = Dataset {
            attrs: if keep_attrs {
                self.attrs.clone()
            } else {
                Attrs::new()
            },
            ..Default::default()
        };
        for name in &self.order {
            let var = &self.arrays[name];
            let depends = var.dims().iter().any(|d| reduce_dims.contains(d));
            if self.coord_names.contains(name) {
                if !depends {
                    out.insert_checked(name, var.clone(), true)?;
                }
                continue;
            }
            let new_var = if depends {
                var.reduce(kernel, &reduce_dims, keep_attrs)?
            } else {
                var.clone()
            };
            out.insert_checked(name, new_var, false)?;
        }
        Ok(out)
    }

    /// Elementwise arithmetic between two containers. Both sides must
    /// carry the same data variables and equal indexes along shared
    /// dimensions; variables are combined by name, broadcasting over the
    /// union of their dimensions.
    pub fn binop(&self, other: &Dataset, op: BinOp) -> Result<Dataset> {
        ensure_aligned(self, other)?;
        let ours = self.data_var_names();
        let theirs = other.data_var_names();
        if ours.len() != theirs.len() || !ours.iter().all(|n| theirs.contains(n)) {
            return Err(Error::value(
                "datasets must carry the same data variables for arithmetic",
            ));
        }
        let mut vars = Vec::with_capacity(ours.len());
        for name in ours {
            let var = variable_binop(&self.arrays[&name], &other.arrays[&name], op)?;
            vars.push((name, var));
        }
        self.arithmetic_result(vars, Some(other))
    }

    /// Arithmetic between a container and a single labeled array. The
    /// container side takes precedence: the result is a container with
    /// this side's variables and attributes, the array applied to each.
    pub fn binop_array(&self, other: &DataArray, op: BinOp) -> Result<Dataset> {
        ensure_aligned(self, other.dataset())?;
        let mut vars = Vec::new();
        for name in self.data_var_names() {
            let var = variable_binop(&self.arrays[&name], other.variable(), op)?;
            vars.push((name, var));
        }
        self.arithmetic_result(vars, Some(other.dataset()))
    }

    /// Apply a scalar to every data variable.
    pub fn binop_scalar(&self, scalar: impl Into<Value>, op: BinOp) -> Result<Dataset> {
        let scalar = scalar.into();
        let mut out = self.clone();
        for name in self.data_var_names() {
            let var = variable_binop_scalar(&self.arrays[&name], &scalar, op)?;
            out.arrays.insert(name, var);
        }
        Ok(out)
    }

    pub fn unop(&self, op: UnOp) -> Result<Dataset> {
        let mut out = self.clone();
        for name in self.data_var_names() {
            let var = variable_unop(&self.arrays[&name], op)?;
            out.arrays.insert(name, var);
        }
        Ok(out)
    }

    /// Assemble an arithmetic result: the computed data variables plus
    /// every coordinate, from this side first, whose dimensions survive.
    fn arithmetic_result(
        &self,
        vars: Vec<(String, Variable)>,
        other: Option<&Dataset>,
    ) -> Result<Dataset> {
        let mut result_dims: HashSet<String> = HashSet::new();
        for (_, var) in &vars {
            result_dims.extend(var.dims().iter().cloned());
        }
        let mut out = Dataset {
            attrs: self.attrs.clone(),
            ..Default::default()
        };
        for (name, var) in vars {
            out.insert_checked(&name, var, false)?;
        }
        let sources: Vec<&Dataset> = std::iter::once(self).chain(other).collect();
        for source in sources {
            for name in source.coord_var_names() {
                if out.contains(&name) {
                    continue;
                }
                let coord = &source.arrays[&name];
                if coord.dims().iter().all(|d| result_dims.contains(d)) {
                    out.insert_checked(&name, coord.clone(), true)?;
                }
            }
        }
        Ok(out)
    }

    /// Shallow copies share the underlying blocks; deep copies duplicate
    /// them.
    pub fn copy(&self, deep: bool) -> Result<Dataset> {
        if !deep {
            return Ok(self.clone());
        }
        let mut out = self.clone();
        for name in &self.order {
            out.arrays.insert(name.clone(), self.arrays[name].deep_copy()?);
        }
        Ok(out)
    }

    /// Force every deferred member into memory.
    pub fn load(&mut self) -> Result<()> {
        for name in &self.order {
            if let Some(var) = self.arrays.get_mut(name) {
                var.load()?;
            }
        }
        Ok(())
    }

    /// Same members with the same roles and equal values.
    pub fn equals(&self, other: &Dataset) -> Result<bool> {
        if self.order.len() != other.order.len() || self.coord_names != other.coord_names {
            return Ok(false);
        }
        for name in &self.order {
            match other.arrays.get(name) {
                Some(v) => {
                    if !self.arrays[name].equals(v)? {
                        return Ok(false);
                    }
                }
                None => return Ok(false),
            }
        }
        Ok(true)
    }

    /// `equals` plus global and per-variable attribute equality.
    pub fn identical(&self, other: &Dataset) -> Result<bool> {
        if self.attrs != other.attrs {
            return Ok(false);
        }
        if self.order.len() != other.order.len() || self.coord_names != other.coord_names {
            return Ok(false);
        }
        for name in &self.order {
            match other.arrays.get(name) {
                Some(v) => {
                    if !self.arrays[name].identical(v)? {
                        return Ok(false);
                    }
                }
                None => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Register a coordinate index as a member (internal constructor use).
    pub(crate) fn insert_coord(&mut self, index: CoordIndex) -> Result<()> {
        let name = index.name().to_string();
        self.insert_checked(&name, CoordIndex::into_variable(index), true)
    }

    pub(crate) fn insert_variable(
        &mut self,
        name: &str,
        var: Variable,
        as_coord: bool,
    ) -> Result<()> {
        self.insert_checked(name, var, as_coord)
    }
}

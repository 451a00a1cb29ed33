// src/engine/concat.rs
//
// Stack labeled objects along a new or existing dimension.

use crate::core::dataarray::DataArray;
use crate::core::dataset::Dataset;
use crate::core::index::CoordIndex;
use crate::core::value::Value;
use crate::core::variable::Variable;
use crate::engine::error::{Error, Result};
use std::collections::HashSet;

/// The dimension to concatenate along: a bare name, or a named index
/// whose labels become the coordinate of the result.
#[derive(Debug, Clone)]
pub enum ConcatDim {
    Name(String),
    Index(CoordIndex),
}

impl ConcatDim {
    pub fn name(name: impl Into<String>) -> Self {
        ConcatDim::Name(name.into())
    }

    fn into_parts(self) -> (String, Option<Vec<Value>>) {
        match self {
            ConcatDim::Name(name) => (name, None),
            ConcatDim::Index(index) => {
                let name = index.name().to_string();
                (name, Some(index.into_values()))
            }
        }
    }
}

/// Which variables (beyond those spanning the dimension) get stacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConcatMode {
    /// Stack variables whose values differ across the inputs.
    #[default]
    Different,
    /// Stack every data variable.
    All,
    /// Stack only variables that already span the dimension.
    Minimal,
}

/// How strictly non-stacked variables are compared across inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compat {
    #[default]
    Equals,
    Identical,
}

/// Stack variable pieces along `dim`, inserting a length-1 axis into any
/// piece that does not already span it. The stacked dimension keeps the
/// axis position it has in the first piece (leading for a new axis).
fn concat_variables(pieces: &[&Variable], dim: &str) -> Result<Variable> {
    let first = pieces[0];
    let dim_s = dim.to_string();
    let out_dims: Vec<String> = if first.dims().contains(&dim_s) {
        first.dims().to_vec()
    } else {
        let mut d = vec![dim_s.clone()];
        d.extend(first.dims().iter().cloned());
        d
    };
    let tail: Vec<&str> = out_dims
        .iter()
        .filter(|d| **d != dim_s)
        .map(|s| s.as_str())
        .collect();

    let mut total = 0usize;
    let mut tail_shape: Option<Vec<usize>> = None;
    let mut data: Vec<Value> = Vec::new();
    for piece in pieces {
        let leading = if piece.dims().contains(&dim_s) {
            let mut order = vec![dim];
            order.extend(&tail);
            piece.transpose(Some(&order))?
        } else {
            let reordered = piece.transpose(Some(&tail))?;
            let mut dims = vec![dim_s.clone()];
            dims.extend(reordered.dims().iter().cloned());
            let mut shape = vec![1usize];
            shape.extend_from_slice(reordered.shape());
            Variable::new(dims, shape, reordered.values()?.into_owned())?
        };
        match &tail_shape {
            None => tail_shape = Some(leading.shape()[1..].to_vec()),
            Some(expected) => {
                if leading.shape()[1..] != expected[..] {
                    return Err(Error::value(format!(
                        "cannot concatenate along '{}': pieces have conflicting \
                         shapes on the remaining dimensions",
                        dim
                    )));
                }
            }
        }
        total += leading.shape()[0];
        data.extend_from_slice(&leading.values()?);
    }

    let mut shape = vec![total];
    shape.extend(tail_shape.unwrap_or_default());
    let mut dims = vec![dim_s];
    dims.extend(tail.iter().map(|s| s.to_string()));
    let mut stacked = Variable::new(dims, shape, data)?;
    stacked.attrs = first.attrs.clone();
    stacked.encoding = first.encoding.clone();
    let order: Vec<&str> = out_dims.iter().map(|s| s.as_str()).collect();
    stacked.transpose(Some(&order))
}

/// Null-filled stand-in for an input that lacks a stacked variable,
/// shaped like `reference` without the concatenation dimension.
fn null_slot(reference: &Variable, dim: &str) -> Result<Variable> {
    let mut dims = Vec::new();
    let mut shape = Vec::new();
    for (d, &n) in reference.dims().iter().zip(reference.shape()) {
        if d != dim {
            dims.push(d.clone());
            shape.push(n);
        }
    }
    let total: usize = shape.iter().product();
    Variable::new(dims, shape, vec![Value::Null; total])
}

/// Concatenate datasets along a dimension. When the dimension already
/// exists in the inputs they are stacked along it; otherwise a new axis
/// is created with one slot per input. Under `ConcatMode::All` an input
/// missing a variable contributes a Null slot; the other modes require
/// every input to carry exactly the variables of the first.
pub fn concat(
    datasets: &[&Dataset],
    dim: ConcatDim,
    mode: ConcatMode,
    concat_over: Option<&[&str]>,
    compat: Compat,
) -> Result<Dataset> {
    if datasets.is_empty() {
        return Err(Error::value(
            "must supply at least one dataset to concatenate",
        ));
    }
    let first = datasets[0];
    let (dim_name, dim_labels) = dim.into_parts();
    let dim_exists = first.dims().contains_key(&dim_name);
    let broadcast_missing = mode == ConcatMode::All;

    let first_names: HashSet<&String> = first.names().iter().collect();
    let mut names: Vec<String> = first.names().to_vec();
    for ds in &datasets[1..] {
        for name in ds.names() {
            if !first_names.contains(name) {
                if broadcast_missing {
                    if !names.contains(name) {
                        names.push(name.clone());
                    }
                } else {
                    return Err(Error::value(format!(
                        "encountered unexpected variable '{}'",
                        name
                    )));
                }
            }
        }
        if !broadcast_missing {
            for name in first.names() {
                if !ds.contains(name) {
                    return Err(Error::value(format!(
                        "variable '{}' is not present in all datasets",
                        name
                    )));
                }
            }
        }
        if compat == Compat::Identical && ds.attrs != first.attrs {
            return Err(Error::value(
                "dataset global attributes not equal across datasets",
            ));
        }
    }

    let mut stacked: HashSet<String> = HashSet::new();
    let mut dropped: HashSet<String> = HashSet::new();
    if let Some(explicit) = concat_over {
        for name in explicit {
            if !first.contains(name) {
                return Err(Error::value(format!(
                    "not all elements in concat_over are variables in the \
                     first dataset: '{}'",
                    name
                )));
            }
            stacked.insert(name.to_string());
        }
    }
    for name in &names {
        let spans = datasets.iter().any(|ds| {
            ds.variable(name)
                .map(|v| v.dims().contains(&dim_name))
                .unwrap_or(false)
        });
        if spans {
            stacked.insert(name.clone());
        }
    }
    match mode {
        ConcatMode::Minimal => {}
        ConcatMode::All => {
            for name in &names {
                let owner = datasets
                    .iter()
                    .find(|ds| ds.contains(name))
                    .expect("collected from the inputs");
                if !owner.is_coord(name) {
                    stacked.insert(name.clone());
                }
            }
        }
        ConcatMode::Different => {
            for name in first.names() {
                if stacked.contains(name) {
                    continue;
                }
                let reference = first.variable(name).expect("listed member");
                // coordinates must agree across inputs, except rank-0
                // leftovers of a consumed dimension
                let scalar_coord = first.is_coord(name) && reference.ndim() == 0;
                if first.is_coord(name) && !scalar_coord {
                    continue;
                }
                let differs = datasets[1..].iter().try_fold(false, |acc, ds| {
                    let v = ds.variable(name).expect("presence checked above");
                    Ok::<_, Error>(acc || !reference.equals(v)?)
                })?;
                if differs {
                    // a differing scalar coordinate stacks back up along a
                    // fresh axis, but has no slot when the axis already
                    // spans more than one input cell
                    if scalar_coord && dim_exists {
                        dropped.insert(name.clone());
                    } else {
                        stacked.insert(name.clone());
                    }
                }
            }
        }
    }

    let mut out = Dataset::new();
    out.attrs = first.attrs.clone();
    for name in &names {
        if dropped.contains(name) {
            continue;
        }
        let owner = datasets
            .iter()
            .find(|ds| ds.contains(name))
            .expect("collected from the inputs");
        let as_coord = owner.is_coord(name);
        let reference = owner.variable(name).expect("owner carries it");
        if stacked.contains(name) {
            let mut pieces: Vec<Variable> = Vec::with_capacity(datasets.len());
            for ds in datasets {
                match ds.variable(name) {
                    Some(v) => pieces.push(v.clone()),
                    None => pieces.push(null_slot(reference, &dim_name)?),
                }
            }
            let piece_refs: Vec<&Variable> = pieces.iter().collect();
            let var = concat_variables(&piece_refs, &dim_name)?;
            // a stacked coordinate over a foreign dimension loses its
            // 1-D-over-own-name shape, so it demotes to a data variable
            let still_coord = as_coord && var.dims() == [name.clone()];
            out.insert_variable(name, var, still_coord)?;
        } else {
            for ds in &datasets[1..] {
                if let Some(v) = ds.variable(name) {
                    let same = match compat {
                        Compat::Equals => reference.equals(v)?,
                        Compat::Identical => reference.identical(v)?,
                    };
                    if !same {
                        return Err(Error::value(format!(
                            "variable '{}' not equal across datasets",
                            name
                        )));
                    }
                }
            }
            out.insert_variable(name, reference.clone(), as_coord)?;
        }
    }

    let result_len = *out.dims().get(&dim_name).ok_or_else(|| {
        Error::value(format!(
            "concatenation dimension '{}' is not present in the result",
            dim_name
        ))
    })?;
    match dim_labels {
        Some(labels) => {
            if labels.len() != result_len {
                return Err(Error::value(format!(
                    "the concatenation index for '{}' has length {}, which does \
                     not match the stacked length {}",
                    dim_name,
                    labels.len(),
                    result_len
                )));
            }
            out.insert_variable(
                &dim_name,
                CoordIndex::new(dim_name.clone(), labels).into_variable(),
                true,
            )?;
        }
        None => {
            if !dim_exists && !out.is_coord(&dim_name) {
                out.insert_variable(
                    &dim_name,
                    CoordIndex::default_range(dim_name.clone(), result_len).into_variable(),
                    true,
                )?;
            }
        }
    }
    Ok(out)
}

/// Concatenate labeled arrays. Under `Compat::Equals` differently named
/// inputs are renamed to the first array's name; `Compat::Identical`
/// rejects them.
pub fn concat_arrays(
    arrays: &[&DataArray],
    dim: ConcatDim,
    mode: ConcatMode,
    compat: Compat,
) -> Result<DataArray> {
    if arrays.is_empty() {
        return Err(Error::value(
            "must supply at least one array to concatenate",
        ));
    }
    let name = arrays[0].name().to_string();
    let mut renamed: Vec<DataArray> = Vec::with_capacity(arrays.len());
    for array in arrays {
        if array.name() == name {
            renamed.push((*array).clone());
        } else {
            if compat == Compat::Identical {
                return Err(Error::value(
                    "array names not identical across concatenation inputs",
                ));
            }
            renamed.push(array.rename(&name)?);
        }
    }
    let datasets: Vec<&Dataset> = renamed.iter().map(|a| a.dataset()).collect();
    concat(&datasets, dim, mode, None, compat)?.get(&name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::int_values;
    use crate::engine::indexing::Indexer;

    fn labeled(dim: &str, labels: Vec<i64>, values: Vec<i64>) -> DataArray {
        DataArray::new_1d(
            dim,
            int_values(values),
            Some(int_values(labels)),
            Some("v"),
        )
        .unwrap()
    }

    #[test]
    fn test_concat_new_axis_length_is_input_count() {
        let a = labeled("x", vec![1, 2], vec![10, 20]);
        let b = labeled("x", vec![1, 2], vec![30, 40]);
        let out = concat_arrays(
            &[&a, &b],
            ConcatDim::name("run"),
            ConcatMode::Different,
            Compat::Equals,
        )
        .unwrap();
        assert_eq!(out.dims(), &["run".to_string(), "x".to_string()]);
        assert_eq!(out.shape(), &[2, 2]);
        assert_eq!(
            out.values().unwrap(),
            int_values(vec![10, 20, 30, 40])
        );
        // the new axis gets default integer labels
        assert_eq!(
            out.index("run").unwrap().values(),
            &int_values(vec![0, 1])[..]
        );
    }

    #[test]
    fn test_concat_restores_a_split() {
        let whole = labeled("x", vec![1, 2, 3, 4], vec![10, 20, 30, 40]);
        let head = whole.isel(&[("x", Indexer::range(0, 2))]).unwrap();
        let tail = whole.isel(&[("x", Indexer::range(2, 4))]).unwrap();
        let out = concat_arrays(
            &[&head, &tail],
            ConcatDim::name("x"),
            ConcatMode::Different,
            Compat::Equals,
        )
        .unwrap();
        assert!(out.equals(&whole).unwrap());
    }

    #[test]
    fn test_concat_with_explicit_index_labels() {
        let a = labeled("x", vec![1, 2], vec![10, 20]);
        let b = labeled("x", vec![1, 2], vec![30, 40]);
        let out = concat_arrays(
            &[&a, &b],
            ConcatDim::Index(CoordIndex::new("run", int_values(vec![7, 9]))),
            ConcatMode::Different,
            Compat::Equals,
        )
        .unwrap();
        assert_eq!(
            out.index("run").unwrap().values(),
            &int_values(vec![7, 9])[..]
        );
    }

    #[test]
    fn test_concat_index_length_mismatch_rejected() {
        let a = labeled("x", vec![1, 2], vec![10, 20]);
        let err = concat_arrays(
            &[&a],
            ConcatDim::Index(CoordIndex::new("run", int_values(vec![7, 9]))),
            ConcatMode::Different,
            Compat::Equals,
        )
        .unwrap_err();
        assert!(err.to_string().contains("does not match the stacked length"));
    }

    #[test]
    fn test_concat_rejects_unexpected_variables() {
        let a = labeled("x", vec![1, 2], vec![10, 20]);
        let b = labeled("x", vec![1, 2], vec![30, 40]);
        let mut extra = b.dataset().clone();
        extra
            .set(
                "other",
                crate::core::dataset::VarInput::Variable(
                    crate::core::variable::Variable::scalar(Value::Int(1)),
                ),
            )
            .unwrap();
        let err = concat(
            &[a.dataset(), &extra],
            ConcatDim::name("run"),
            ConcatMode::Different,
            None,
            Compat::Equals,
        )
        .unwrap_err();
        assert!(err.to_string().contains("encountered unexpected"));
    }

    #[test]
    fn test_concat_over_must_name_variables() {
        let a = labeled("x", vec![1, 2], vec![10, 20]);
        let err = concat(
            &[a.dataset()],
            ConcatDim::name("run"),
            ConcatMode::Different,
            Some(&["missing"]),
            Compat::Equals,
        )
        .unwrap_err();
        assert!(err.to_string().contains("not all elements in"));
    }

    #[test]
    fn test_identical_rejects_differing_names() {
        let a = labeled("x", vec![1, 2], vec![10, 20]);
        let b = a.rename("w").unwrap();
        let err = concat_arrays(
            &[&a, &b],
            ConcatDim::name("run"),
            ConcatMode::Different,
            Compat::Identical,
        )
        .unwrap_err();
        assert!(err.to_string().contains("names not identical"));
    }

    #[test]
    fn test_all_mode_broadcasts_missing_variables() {
        let a = labeled("x", vec![1, 2], vec![10, 20]);
        let mut left = a.dataset().clone();
        left.set(
            "extra",
            crate::core::dataset::VarInput::Variable(crate::core::variable::Variable::new_1d(
                "x",
                int_values(vec![7, 8]),
            )),
        )
        .unwrap();
        let b = labeled("x", vec![1, 2], vec![30, 40]);
        let out = concat(
            &[&left, b.dataset()],
            ConcatDim::name("run"),
            ConcatMode::All,
            None,
            Compat::Equals,
        )
        .unwrap();
        let extra = out.get("extra").unwrap();
        assert_eq!(extra.dims(), &["run".to_string(), "x".to_string()]);
        // the input without the variable gets a Null slot
        assert_eq!(
            extra.values().unwrap(),
            vec![Value::Int(7), Value::Int(8), Value::Null, Value::Null]
        );
    }

    #[test]
    fn test_missing_variables_rejected_outside_all_mode() {
        let a = labeled("x", vec![1, 2], vec![10, 20]);
        let mut left = a.dataset().clone();
        left.set(
            "extra",
            crate::core::dataset::VarInput::Variable(crate::core::variable::Variable::new_1d(
                "x",
                int_values(vec![7, 8]),
            )),
        )
        .unwrap();
        let b = labeled("x", vec![1, 2], vec![30, 40]);
        let err = concat(
            &[&left, b.dataset()],
            ConcatDim::name("run"),
            ConcatMode::Different,
            None,
            Compat::Equals,
        )
        .unwrap_err();
        assert!(err.to_string().contains("not present in all datasets"));
    }

    #[test]
    fn test_minimal_mode_requires_equal_off_dim_variables() {
        let a = labeled("x", vec![1, 2], vec![10, 20]);
        let b = labeled("x", vec![1, 2], vec![99, 98]);
        let err = concat(
            &[a.dataset(), b.dataset()],
            ConcatDim::name("run"),
            ConcatMode::Minimal,
            None,
            Compat::Equals,
        )
        .unwrap_err();
        assert!(err.to_string().contains("not equal across datasets"));
    }
}

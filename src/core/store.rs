// src/core/store.rs
//
// Backing-store abstractions for deferred loading. A Variable built on
// an ArraySource keeps selection metadata and only calls `read` when its
// values are explicitly accessed.

use crate::core::value::Value;
use crate::core::variable::Variable;
use crate::core::Attrs;
use crate::engine::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A single deferred N-D block. Implementations read the whole block;
/// pending selections are applied by the owning Variable after the read.
pub trait ArraySource: fmt::Debug + Send + Sync {
    fn shape(&self) -> Vec<usize>;
    fn read(&self) -> Result<Vec<Value>>;
}

/// A collection of named deferred blocks with dimension and attribute
/// metadata, e.g. a file-format backend.
pub trait DataStore: fmt::Debug {
    fn dims(&self) -> HashMap<String, usize>;
    fn attrs(&self) -> Attrs;
    fn variable_names(&self) -> Vec<String>;
    /// Dimension names and data source for one variable, without reading it.
    fn open_variable(&self, name: &str) -> Result<(Vec<String>, Arc<dyn ArraySource>)>;
    /// Which variable names play the coordinate role.
    fn coord_names(&self) -> Vec<String>;
}

/// Store over blocks already resident in memory. Mostly useful for tests
/// and as the reference DataStore implementation.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    variables: Vec<(String, Vec<String>, Arc<InMemorySource>)>,
    coords: Vec<String>,
    attrs: Attrs,
}

#[derive(Debug)]
pub struct InMemorySource {
    shape: Vec<usize>,
    values: Vec<Value>,
}

impl InMemorySource {
    pub fn new(shape: Vec<usize>, values: Vec<Value>) -> Self {
        Self { shape, values }
    }
}

impl ArraySource for InMemorySource {
    fn shape(&self) -> Vec<usize> {
        self.shape.clone()
    }

    fn read(&self) -> Result<Vec<Value>> {
        Ok(self.values.clone())
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attrs(mut self, attrs: Attrs) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn insert(
        &mut self,
        name: impl Into<String>,
        dims: Vec<String>,
        shape: Vec<usize>,
        values: Vec<Value>,
    ) {
        self.variables.push((
            name.into(),
            dims,
            Arc::new(InMemorySource::new(shape, values)),
        ));
    }

    pub fn insert_coord(
        &mut self,
        name: impl Into<String>,
        values: Vec<Value>,
    ) {
        let name = name.into();
        let len = values.len();
        self.variables.push((
            name.clone(),
            vec![name.clone()],
            Arc::new(InMemorySource::new(vec![len], values)),
        ));
        self.coords.push(name);
    }
}

impl DataStore for InMemoryStore {
    fn dims(&self) -> HashMap<String, usize> {
        let mut out = HashMap::new();
        for (_, dims, source) in &self.variables {
            for (d, &n) in dims.iter().zip(source.shape.iter()) {
                out.insert(d.clone(), n);
            }
        }
        out
    }

    fn attrs(&self) -> Attrs {
        self.attrs.clone()
    }

    fn variable_names(&self) -> Vec<String> {
        self.variables.iter().map(|(n, _, _)| n.clone()).collect()
    }

    fn open_variable(&self, name: &str) -> Result<(Vec<String>, Arc<dyn ArraySource>)> {
        self.variables
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, dims, source)| {
                (dims.clone(), source.clone() as Arc<dyn ArraySource>)
            })
            .ok_or_else(|| Error::key(format!("no variable named '{}' in store", name)))
    }

    fn coord_names(&self) -> Vec<String> {
        self.coords.clone()
    }
}

/// Open every variable of a store as a deferred Variable.
pub fn open_store_variables(
    store: &dyn DataStore,
) -> Result<Vec<(String, Variable, bool)>> {
    let coord_names = store.coord_names();
    store
        .variable_names()
        .into_iter()
        .map(|name| {
            let (dims, source) = store.open_variable(&name)?;
            let variable = Variable::from_source(dims, source)?;
            let is_coord = coord_names.contains(&name);
            Ok((name, variable, is_coord))
        })
        .collect()
}

// src/lib.rs

pub mod core;

pub mod engine;
pub mod interop;

pub use crate::core::dataarray;
pub use crate::core::dataset;
pub use crate::core::index;
pub use crate::core::store;
pub use crate::core::value;
pub use crate::core::variable;

// Re-exports para tener una API limpia desde fuera del crate
pub use crate::core::Attrs;
pub use crate::engine::align::{align, align_arrays, Join};
pub use crate::engine::concat::{concat, concat_arrays, Compat, ConcatDim, ConcatMode};
pub use crate::engine::error::{Error, ErrorKind, Result};
pub use crate::engine::groupby::GroupBy;
pub use crate::engine::indexing::{Indexer, LabelIndexer};
pub use crate::engine::kernels::{BinOp, Reduction, UnOp};
pub use dataarray::{CoordDef, CoordSpec, DataArray};
pub use dataset::{Dataset, VarInput};
pub use index::CoordIndex;
pub use store::{ArraySource, DataStore, InMemorySource, InMemoryStore};
pub use value::{float_values, int_values, str_values, Value, ValueType};
pub use variable::Variable;

pub mod dataarray;
pub mod dataset;
pub mod index;
pub mod store;
pub mod value;
pub mod variable;

/// Free-form metadata attached to datasets, variables and indexes.
pub type Attrs = std::collections::HashMap<String, serde_json::Value>;

// Re-export commonly used types
pub use dataarray::{CoordDef, CoordSpec, DataArray};
pub use dataset::{Dataset, VarInput};
pub use index::CoordIndex;
pub use value::{Value, ValueType};
pub use variable::Variable;

pub mod align;
pub mod concat;
pub mod error;
pub mod groupby;
pub mod indexing;
pub mod kernels;
pub mod virtuals;

pub use align::Join;
pub use concat::{Compat, ConcatDim, ConcatMode};
pub use error::{Error, ErrorKind, Result};
pub use groupby::GroupBy;
pub use kernels::{BinOp, Reduction, UnOp};

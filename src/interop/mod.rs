pub mod dataframe;

pub use dataframe::{from_record_batch, from_series, to_record_batch, to_series};

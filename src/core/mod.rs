pub mod dataset;
pub mod filesystem;
pub mod pipeline;
pub mod rest_api;
pub mod transformation;

pub use crate::domain::model::{LoadInfo, Record, TableData, WriteDisposition};
pub use crate::domain::ports::{Source, Storage, Transformation};
pub use crate::utils::error::Result;

pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::{cli::LocalStorage, manifest::Manifest, manifest::SourceSpec};
pub use core::dataset::{Dataset, Relation};
pub use core::filesystem::{FileFormat, FilesystemSource};
pub use core::pipeline::{Pipeline, RefreshMode};
pub use core::rest_api::{RestApiConfig, RestApiSource};
pub use core::transformation::TransformationGroup;
pub use domain::model::{LoadInfo, Record, TableData, WriteDisposition};
pub use domain::ports::{Source, Storage, Transformation};
pub use utils::error::{PipelineError, Result};

pub mod cli;
pub mod manifest;

pub use cli::LocalStorage;
pub use manifest::{Manifest, SourceSpec};

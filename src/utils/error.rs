use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("API request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Invalid file glob pattern: {0}")]
    GlobError(#[from] glob::PatternError),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Extract failed for resource '{resource}': {details}")]
    ExtractError { resource: String, details: String },

    #[error("Load failed for table '{table}': {details}")]
    LoadError { table: String, details: String },

    #[error("Transformation '{name}' failed: {details}")]
    TransformationError { name: String, details: String },

    #[error("Dataset error: {message}")]
    DatasetError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Io,
    Config,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl PipelineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::HttpError(_) | Self::ExtractError { .. } => ErrorCategory::Network,
            Self::IoError(_) | Self::LoadError { .. } => ErrorCategory::Io,
            Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. }
            | Self::GlobError(_) => ErrorCategory::Config,
            Self::SerializationError(_)
            | Self::CsvError(_)
            | Self::TransformationError { .. }
            | Self::DatasetError { .. } => ErrorCategory::Data,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::HttpError(_) | Self::ExtractError { .. } => ErrorSeverity::Medium,
            Self::IoError(_) => ErrorSeverity::Critical,
            Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. }
            | Self::GlobError(_) => ErrorSeverity::High,
            Self::SerializationError(_)
            | Self::CsvError(_)
            | Self::LoadError { .. }
            | Self::TransformationError { .. }
            | Self::DatasetError { .. } => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::HttpError(_) | Self::ExtractError { .. } => {
                "Check network connectivity and that the API endpoint is reachable, then retry"
                    .to_string()
            }
            Self::IoError(_) => {
                "Check that the destination path exists and is writable".to_string()
            }
            Self::ConfigValidationError { field, .. }
            | Self::InvalidConfigValueError { field, .. }
            | Self::MissingConfigError { field } => {
                format!("Fix the '{}' entry in the pipeline manifest", field)
            }
            Self::GlobError(_) => "Fix the file_glob pattern in the manifest".to_string(),
            Self::SerializationError(_) | Self::CsvError(_) => {
                "Verify the upstream data format matches the configured reader".to_string()
            }
            Self::LoadError { table, .. } => {
                format!("Inspect the destination state for table '{}'", table)
            }
            Self::TransformationError { name, .. } => format!(
                "Nothing was written; fix transformation '{}' and rerun the group",
                name
            ),
            Self::DatasetError { .. } => {
                "Verify the dataset exists at the destination (run the pipeline first)".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Network problem: {}", self),
            ErrorCategory::Io => format!("Storage problem: {}", self),
            ErrorCategory::Config => format!("Configuration problem: {}", self),
            ErrorCategory::Data => format!("Data problem: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

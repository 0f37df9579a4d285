use crate::core::filesystem::{FileFormat, FilesystemSource};
use crate::core::pipeline::RefreshMode;
use crate::core::rest_api::{ClientConfig, ResourceConfig, ResourceDefaults, RestApiConfig, RestApiSource};
use crate::domain::model::WriteDisposition;
use crate::domain::ports::Source;
use crate::utils::error::{PipelineError, Result};
use crate::utils::validation::{validate_identifier, validate_path, validate_url, Validate};
use serde::Deserialize;

/// TOML pipeline 清單：pipeline 本體、目的地與各 source 的宣告
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub pipeline: PipelineSpec,
    pub destination: DestinationSpec,
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSpec {
    pub name: String,
    pub dataset_name: String,
    pub description: Option<String>,
    pub dev_mode: Option<bool>,
    pub refresh: Option<RefreshMode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DestinationSpec {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceSpec {
    RestApi {
        name: Option<String>,
        client: ClientConfig,
        resources: Vec<ResourceConfig>,
        resource_defaults: Option<ResourceDefaults>,
    },
    Filesystem {
        name: Option<String>,
        bucket_url: String,
        file_glob: String,
        format: FileFormat,
        primary_key: Option<String>,
        write_disposition: Option<WriteDisposition>,
    },
}

impl Manifest {
    /// 從檔案載入清單
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析清單
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| PipelineError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${API_TOKEN})，未設定者保留原樣
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").unwrap();

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
    }

    /// 將宣告的 source 實例化，順序即載入順序
    pub fn build_sources(&self) -> Result<Vec<Box<dyn Source>>> {
        let mut sources: Vec<Box<dyn Source>> = Vec::new();
        for spec in &self.sources {
            match spec {
                SourceSpec::RestApi {
                    name,
                    client,
                    resources,
                    resource_defaults,
                } => {
                    let config = RestApiConfig {
                        client: client.clone(),
                        resources: resources.clone(),
                        resource_defaults: resource_defaults.clone(),
                    };
                    let source_name = name.clone().unwrap_or_else(|| "rest_api".to_string());
                    sources.push(Box::new(RestApiSource::new(source_name, config)));
                }
                SourceSpec::Filesystem {
                    name,
                    bucket_url,
                    file_glob,
                    format,
                    primary_key,
                    write_disposition,
                } => {
                    let mut source = FilesystemSource::new(bucket_url, file_glob, *format);
                    if let Some(name) = name {
                        source = source.with_name(name);
                    }
                    if let Some(key) = primary_key {
                        source = source.with_primary_key(key);
                    }
                    if let Some(disposition) = write_disposition {
                        source = source.with_disposition(*disposition);
                    }
                    sources.push(Box::new(source));
                }
            }
        }
        Ok(sources)
    }
}

impl Validate for Manifest {
    fn validate(&self) -> Result<()> {
        validate_identifier("pipeline.name", &self.pipeline.name)?;
        validate_identifier("pipeline.dataset_name", &self.pipeline.dataset_name)?;
        validate_path("destination.path", &self.destination.path)?;

        if self.sources.is_empty() {
            return Err(PipelineError::MissingConfigError {
                field: "sources".to_string(),
            });
        }

        for (index, spec) in self.sources.iter().enumerate() {
            match spec {
                SourceSpec::RestApi {
                    client, resources, ..
                } => {
                    validate_url(&format!("sources[{}].client.base_url", index), &client.base_url)?;
                    if resources.is_empty() {
                        return Err(PipelineError::MissingConfigError {
                            field: format!("sources[{}].resources", index),
                        });
                    }
                }
                SourceSpec::Filesystem {
                    bucket_url,
                    file_glob,
                    ..
                } => {
                    validate_path(&format!("sources[{}].bucket_url", index), bucket_url)?;
                    validate_path(&format!("sources[{}].file_glob", index), file_glob)?;
                }
            }
        }

        Ok(())
    }
}

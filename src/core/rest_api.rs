use crate::domain::model::{Record, TableData, WriteDisposition};
use crate::domain::ports::Source;
use crate::utils::error::{PipelineError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// 宣告式 REST API source 的完整配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestApiConfig {
    pub client: ClientConfig,
    pub resources: Vec<ResourceConfig>,
    pub resource_defaults: Option<ResourceDefaults>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    pub headers: Option<HashMap<String, String>>,
    pub auth: Option<AuthConfig>,
    pub paginator: Option<PaginatorConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    Bearer { token: String },
    ApiKey { name: String, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginatorConfig {
    SinglePage,
    HeaderLink,
    PageNumber {
        #[serde(default = "default_page_param")]
        page_param: String,
        #[serde(default = "default_start_page")]
        start_page: u64,
    },
    Offset {
        limit: u64,
        #[serde(default = "default_offset_param")]
        offset_param: String,
        #[serde(default = "default_limit_param")]
        limit_param: String,
    },
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_start_page() -> u64 {
    1
}

fn default_offset_param() -> String {
    "offset".to_string()
}

fn default_limit_param() -> String {
    "limit".to_string()
}

/// resource 可以是端點名稱的簡寫，或帶完整 endpoint 的定義
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceConfig {
    Name(String),
    Detailed(DetailedResource),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedResource {
    pub name: String,
    pub endpoint: Option<EndpointConfig>,
    pub primary_key: Option<String>,
    pub write_disposition: Option<WriteDisposition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub path: Option<String>,
    pub method: Option<String>,
    pub params: Option<HashMap<String, serde_json::Value>>,
    pub data_selector: Option<String>,
    pub paginator: Option<PaginatorConfig>,
}

/// 套用到所有 resource 的預設值，個別 resource 優先
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceDefaults {
    pub endpoint: Option<EndpointDefaults>,
    pub primary_key: Option<String>,
    pub write_disposition: Option<WriteDisposition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointDefaults {
    pub params: Option<HashMap<String, serde_json::Value>>,
}

/// 解析完成、可直接抓取的單一 resource
struct ResourcePlan {
    name: String,
    url: String,
    method: reqwest::Method,
    params: Vec<(String, String)>,
    data_selector: Option<String>,
    paginator: PaginatorConfig,
    primary_key: Option<String>,
    write_disposition: WriteDisposition,
}

pub struct RestApiSource {
    name: String,
    config: RestApiConfig,
    client: Client,
}

impl RestApiSource {
    pub fn new(name: impl Into<String>, config: RestApiConfig) -> Self {
        Self {
            name: name.into(),
            config,
            client: Client::new(),
        }
    }

    fn plan_resource(&self, resource: &ResourceConfig) -> Result<ResourcePlan> {
        let (name, endpoint, primary_key, write_disposition) = match resource {
            ResourceConfig::Name(name) => (name.clone(), EndpointConfig::default(), None, None),
            ResourceConfig::Detailed(detailed) => (
                detailed.name.clone(),
                detailed.endpoint.clone().unwrap_or_default(),
                detailed.primary_key.clone(),
                detailed.write_disposition,
            ),
        };

        let defaults = self.config.resource_defaults.clone().unwrap_or_default();

        // 共用參數先放，個別 resource 的同名參數覆蓋
        let mut params: BTreeMap<String, String> = BTreeMap::new();
        if let Some(default_params) = defaults.endpoint.and_then(|e| e.params) {
            for (key, value) in default_params {
                params.insert(key, param_value_to_string(&value));
            }
        }
        if let Some(resource_params) = &endpoint.params {
            for (key, value) in resource_params {
                params.insert(key.clone(), param_value_to_string(value));
            }
        }

        let path = endpoint.path.clone().unwrap_or_else(|| name.clone());
        let url = format!(
            "{}/{}",
            self.config.client.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );

        let method = match &endpoint.method {
            Some(m) => reqwest::Method::from_bytes(m.to_uppercase().as_bytes()).map_err(|_| {
                PipelineError::InvalidConfigValueError {
                    field: format!("resources.{}.endpoint.method", name),
                    value: m.clone(),
                    reason: "Unsupported HTTP method".to_string(),
                }
            })?,
            None => reqwest::Method::GET,
        };

        let paginator = endpoint
            .paginator
            .clone()
            .or_else(|| self.config.client.paginator.clone())
            .unwrap_or(PaginatorConfig::SinglePage);

        Ok(ResourcePlan {
            name,
            url,
            method,
            params: params.into_iter().collect(),
            data_selector: endpoint.data_selector.clone(),
            paginator,
            primary_key: primary_key.or(defaults.primary_key),
            write_disposition: write_disposition
                .or(defaults.write_disposition)
                .unwrap_or_default(),
        })
    }

    fn apply_auth(&self, mut request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(headers) = &self.config.client.headers {
            for (key, value) in headers {
                request = request.header(key, value);
            }
        }

        match &self.config.client.auth {
            Some(AuthConfig::Bearer { token }) => request.bearer_auth(token),
            Some(AuthConfig::ApiKey { name, value }) => request.header(name, value),
            None => request,
        }
    }

    /// 抓取單一頁，回傳記錄與 Link header 指向的下一頁
    async fn request_page(
        &self,
        plan: &ResourcePlan,
        url: &str,
        params: &[(String, String)],
    ) -> Result<(Vec<Record>, Option<String>)> {
        let mut request = self.client.request(plan.method.clone(), url);
        if !params.is_empty() {
            request = request.query(params);
        }
        request = self.apply_auth(request);

        tracing::debug!("📡 {}: {} {}", plan.name, plan.method, url);
        let response = request.send().await?;
        let status = response.status();
        tracing::debug!("📡 {}: response status {}", plan.name, status);

        if !status.is_success() {
            return Err(PipelineError::ExtractError {
                resource: plan.name.clone(),
                details: format!("API request failed with status: {}", status),
            });
        }

        let next_url = response
            .headers()
            .get(reqwest::header::LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_link_next);

        let body: serde_json::Value = response.json().await?;
        let records = select_records(&plan.name, body, plan.data_selector.as_deref())?;

        Ok((records, next_url))
    }

    async fn fetch_resource(&self, plan: &ResourcePlan) -> Result<Vec<Record>> {
        let mut all_records = Vec::new();

        match &plan.paginator {
            PaginatorConfig::SinglePage => {
                let (records, _) = self.request_page(plan, &plan.url, &plan.params).await?;
                all_records.extend(records);
            }
            PaginatorConfig::HeaderLink => {
                // 第一頁帶查詢參數；後續頁面直接使用 Link header 給的完整 URL
                let (records, mut next) =
                    self.request_page(plan, &plan.url, &plan.params).await?;
                all_records.extend(records);

                while let Some(next_url) = next {
                    let (records, following) = self.request_page(plan, &next_url, &[]).await?;
                    all_records.extend(records);
                    next = following;
                }
            }
            PaginatorConfig::PageNumber {
                page_param,
                start_page,
            } => {
                let mut page = *start_page;
                loop {
                    let mut params = plan.params.clone();
                    params.push((page_param.clone(), page.to_string()));
                    let (records, _) = self.request_page(plan, &plan.url, &params).await?;
                    if records.is_empty() {
                        break;
                    }
                    all_records.extend(records);
                    page += 1;
                }
            }
            PaginatorConfig::Offset {
                limit,
                offset_param,
                limit_param,
            } => {
                let mut offset = 0u64;
                loop {
                    let mut params = plan.params.clone();
                    params.push((offset_param.clone(), offset.to_string()));
                    params.push((limit_param.clone(), limit.to_string()));
                    let (records, _) = self.request_page(plan, &plan.url, &params).await?;
                    let page_len = records.len() as u64;
                    all_records.extend(records);
                    if page_len < *limit {
                        break;
                    }
                    offset += limit;
                }
            }
        }

        Ok(all_records)
    }
}

#[async_trait::async_trait]
impl Source for RestApiSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn extract(&self) -> Result<Vec<TableData>> {
        let mut tables = Vec::new();

        for resource in &self.config.resources {
            let plan = self.plan_resource(resource)?;
            let records = self.fetch_resource(&plan).await?;
            tracing::info!(
                "📡 {}: fetched {} record(s) for resource '{}'",
                self.name,
                records.len(),
                plan.name
            );

            let mut table = TableData::new(plan.name.clone(), records)
                .with_disposition(plan.write_disposition);
            if let Some(key) = plan.primary_key {
                table = table.with_primary_key(key);
            }
            tables.push(table);
        }

        Ok(tables)
    }
}

fn param_value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 解析 RFC 5988 Link header 中 rel="next" 的 URL
fn parse_link_next(header: &str) -> Option<String> {
    for part in header.split(',') {
        let mut sections = part.split(';');
        let url_section = sections.next()?.trim();
        let is_next = sections.any(|attr| {
            let attr = attr.trim();
            attr == "rel=\"next\"" || attr == "rel=next"
        });
        if is_next {
            let url = url_section.trim_start_matches('<').trim_end_matches('>');
            return Some(url.to_string());
        }
    }
    None
}

/// 從回應 JSON 取出記錄陣列。selector 是以 `.` 分隔的路徑
fn select_records(
    resource: &str,
    body: serde_json::Value,
    selector: Option<&str>,
) -> Result<Vec<Record>> {
    let selected = match selector {
        Some(path) => {
            let mut current = &body;
            for segment in path.split('.') {
                current =
                    current
                        .get(segment)
                        .ok_or_else(|| PipelineError::ExtractError {
                            resource: resource.to_string(),
                            details: format!("data_selector '{}' not found in response", path),
                        })?;
            }
            current.clone()
        }
        None => body,
    };

    match selected {
        serde_json::Value::Array(items) => {
            let mut records = Vec::new();
            for item in items {
                match item {
                    serde_json::Value::Object(obj) => records.push(Record::from_object(obj)),
                    other => {
                        tracing::warn!(
                            "🔶 {}: skipping non-object item in response: {}",
                            resource,
                            other
                        );
                    }
                }
            }
            Ok(records)
        }
        serde_json::Value::Object(obj) => Ok(vec![Record::from_object(obj)]),
        other => Err(PipelineError::ExtractError {
            resource: resource.to_string(),
            details: format!("expected JSON array or object, got: {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_link_next() {
        let header = "<https://api.example.com/items?page=2>; rel=\"next\", <https://api.example.com/items?page=9>; rel=\"last\"";
        assert_eq!(
            parse_link_next(header).unwrap(),
            "https://api.example.com/items?page=2"
        );

        let header = "<https://api.example.com/items?page=9>; rel=\"last\"";
        assert!(parse_link_next(header).is_none());

        let header = "<https://api.example.com/items?page=2>; rel=next";
        assert_eq!(
            parse_link_next(header).unwrap(),
            "https://api.example.com/items?page=2"
        );
    }

    #[test]
    fn test_select_records_with_selector() {
        let body = serde_json::json!({
            "workflow_runs": [{"id": 1}, {"id": 2}],
            "total_count": 2
        });
        let records = select_records("workflow_runs", body, Some("workflow_runs")).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("id").unwrap().as_i64().unwrap(), 1);
    }

    #[test]
    fn test_select_records_nested_selector() {
        let body = serde_json::json!({"data": {"items": [{"id": 7}]}});
        let records = select_records("items", body, Some("data.items")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("id").unwrap().as_i64().unwrap(), 7);
    }

    #[test]
    fn test_select_records_missing_selector_path() {
        let body = serde_json::json!({"items": []});
        let err = select_records("runs", body, Some("runs")).unwrap_err();
        assert!(err.to_string().contains("data_selector"));
    }

    #[test]
    fn test_select_records_object_becomes_single_record() {
        let body = serde_json::json!({"id": 1, "name": "only"});
        let records = select_records("thing", body, None).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_shorthand_resource_plan_uses_name_as_path() {
        let config = RestApiConfig {
            client: ClientConfig {
                base_url: "https://api.example.com/v1/".to_string(),
                headers: None,
                auth: None,
                paginator: None,
            },
            resources: vec![ResourceConfig::Name("customers".to_string())],
            resource_defaults: Some(ResourceDefaults {
                endpoint: Some(EndpointDefaults {
                    params: Some(
                        [("start_date".to_string(), serde_json::json!("2017-01-01"))]
                            .into_iter()
                            .collect(),
                    ),
                }),
                primary_key: Some("id".to_string()),
                write_disposition: Some(WriteDisposition::Merge),
            }),
        };
        let source = RestApiSource::new("shop", config.clone());
        let plan = source.plan_resource(&config.resources[0]).unwrap();

        assert_eq!(plan.name, "customers");
        assert_eq!(plan.url, "https://api.example.com/v1/customers");
        assert_eq!(plan.method, reqwest::Method::GET);
        assert_eq!(
            plan.params,
            vec![("start_date".to_string(), "2017-01-01".to_string())]
        );
        assert_eq!(plan.primary_key.as_deref(), Some("id"));
        assert_eq!(plan.write_disposition, WriteDisposition::Merge);
        assert!(matches!(plan.paginator, PaginatorConfig::SinglePage));
    }

    #[test]
    fn test_detailed_resource_overrides_defaults() {
        let config = RestApiConfig {
            client: ClientConfig {
                base_url: "https://api.example.com".to_string(),
                headers: None,
                auth: None,
                paginator: Some(PaginatorConfig::HeaderLink),
            },
            resources: vec![ResourceConfig::Detailed(DetailedResource {
                name: "workflow_runs".to_string(),
                endpoint: Some(EndpointConfig {
                    path: Some("repos/acme/widget/actions/runs".to_string()),
                    method: Some("get".to_string()),
                    params: Some(
                        [("per_page".to_string(), serde_json::json!(100))]
                            .into_iter()
                            .collect(),
                    ),
                    data_selector: Some("workflow_runs".to_string()),
                    paginator: None,
                }),
                primary_key: None,
                write_disposition: Some(WriteDisposition::Replace),
            })],
            resource_defaults: Some(ResourceDefaults {
                endpoint: None,
                primary_key: Some("id".to_string()),
                write_disposition: Some(WriteDisposition::Merge),
            }),
        };
        let source = RestApiSource::new("github", config.clone());
        let plan = source.plan_resource(&config.resources[0]).unwrap();

        assert_eq!(
            plan.url,
            "https://api.example.com/repos/acme/widget/actions/runs"
        );
        assert_eq!(plan.params, vec![("per_page".to_string(), "100".to_string())]);
        assert_eq!(plan.data_selector.as_deref(), Some("workflow_runs"));
        // 未覆蓋的欄位從 defaults 繼承，覆蓋的以 resource 為準
        assert_eq!(plan.primary_key.as_deref(), Some("id"));
        assert_eq!(plan.write_disposition, WriteDisposition::Replace);
        assert!(matches!(plan.paginator, PaginatorConfig::HeaderLink));
    }

    #[test]
    fn test_invalid_method_is_config_error() {
        let config = RestApiConfig {
            client: ClientConfig {
                base_url: "https://api.example.com".to_string(),
                headers: None,
                auth: None,
                paginator: None,
            },
            resources: vec![ResourceConfig::Detailed(DetailedResource {
                name: "bad".to_string(),
                endpoint: Some(EndpointConfig {
                    method: Some("FE TCH".to_string()),
                    ..Default::default()
                }),
                primary_key: None,
                write_disposition: None,
            })],
            resource_defaults: None,
        };
        let source = RestApiSource::new("bad", config.clone());
        assert!(source.plan_resource(&config.resources[0]).is_err());
    }
}

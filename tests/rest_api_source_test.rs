use flowline::core::rest_api::{
    AuthConfig, ClientConfig, DetailedResource, EndpointConfig, EndpointDefaults, PaginatorConfig,
    ResourceConfig, ResourceDefaults, RestApiConfig, RestApiSource,
};
use flowline::{Source, WriteDisposition};
use httpmock::prelude::*;
use std::collections::HashMap;

fn client(base_url: String) -> ClientConfig {
    ClientConfig {
        base_url,
        headers: None,
        auth: None,
        paginator: None,
    }
}

#[tokio::test]
async fn test_shorthand_resources_fetch_one_table_each() {
    let server = MockServer::start();

    let customers_mock = server.mock(|when, then| {
        when.method(GET).path("/api/v1/customers");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!([
                {"id": 1, "name": "Alice"},
                {"id": 2, "name": "Bob"}
            ]));
    });
    let orders_mock = server.mock(|when, then| {
        when.method(GET).path("/api/v1/orders");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!([{"id": 10, "customer_id": 1}]));
    });

    let config = RestApiConfig {
        client: client(server.url("/api/v1")),
        resources: vec![
            ResourceConfig::Name("customers".to_string()),
            ResourceConfig::Name("orders".to_string()),
        ],
        resource_defaults: None,
    };
    let source = RestApiSource::new("jaffle_api", config);

    let tables = source.extract().await.unwrap();
    customers_mock.assert();
    orders_mock.assert();

    assert_eq!(tables.len(), 2);
    assert_eq!(tables[0].name, "customers");
    assert_eq!(tables[0].records.len(), 2);
    assert_eq!(tables[0].write_disposition, WriteDisposition::Append);
    assert_eq!(tables[1].name, "orders");
    assert_eq!(tables[1].records.len(), 1);
}

#[tokio::test]
async fn test_resource_defaults_params_merge_with_resource_override() {
    let server = MockServer::start();

    // page_size comes from defaults, status is overridden by the resource
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/orders")
            .query_param("page_size", "100")
            .query_param("status", "shipped");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!([{"id": 10}]));
    });

    let mut default_params = HashMap::new();
    default_params.insert("page_size".to_string(), serde_json::json!(100));
    default_params.insert("status".to_string(), serde_json::json!("open"));

    let mut resource_params = HashMap::new();
    resource_params.insert("status".to_string(), serde_json::json!("shipped"));

    let config = RestApiConfig {
        client: client(server.url("/api/v1")),
        resources: vec![ResourceConfig::Detailed(DetailedResource {
            name: "orders".to_string(),
            endpoint: Some(EndpointConfig {
                params: Some(resource_params),
                ..Default::default()
            }),
            primary_key: None,
            write_disposition: None,
        })],
        resource_defaults: Some(ResourceDefaults {
            endpoint: Some(EndpointDefaults {
                params: Some(default_params),
            }),
            primary_key: None,
            write_disposition: None,
        }),
    };
    let source = RestApiSource::new("jaffle_api", config);

    let tables = source.extract().await.unwrap();
    mock.assert();
    assert_eq!(tables[0].records.len(), 1);
}

#[tokio::test]
async fn test_resource_defaults_set_primary_key_and_disposition() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/customers");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!([{"id": 1}]));
    });

    let config = RestApiConfig {
        client: client(server.url("/api/v1")),
        resources: vec![ResourceConfig::Name("customers".to_string())],
        resource_defaults: Some(ResourceDefaults {
            endpoint: None,
            primary_key: Some("id".to_string()),
            write_disposition: Some(WriteDisposition::Merge),
        }),
    };
    let source = RestApiSource::new("jaffle_api", config);

    let tables = source.extract().await.unwrap();
    assert_eq!(tables[0].primary_key.as_deref(), Some("id"));
    assert_eq!(tables[0].write_disposition, WriteDisposition::Merge);
}

#[tokio::test]
async fn test_bearer_auth_sends_authorization_header() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/customers")
            .header("Authorization", "Bearer secret-token");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!([{"id": 1}]));
    });

    let config = RestApiConfig {
        client: ClientConfig {
            base_url: server.url("/api/v1"),
            headers: None,
            auth: Some(AuthConfig::Bearer {
                token: "secret-token".to_string(),
            }),
            paginator: None,
        },
        resources: vec![ResourceConfig::Name("customers".to_string())],
        resource_defaults: None,
    };
    let source = RestApiSource::new("jaffle_api", config);

    source.extract().await.unwrap();
    mock.assert();
}

#[tokio::test]
async fn test_api_key_auth_sends_custom_header() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/customers")
            .header("X-Api-Key", "abc123");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!([{"id": 1}]));
    });

    let config = RestApiConfig {
        client: ClientConfig {
            base_url: server.url("/api/v1"),
            headers: None,
            auth: Some(AuthConfig::ApiKey {
                name: "X-Api-Key".to_string(),
                value: "abc123".to_string(),
            }),
            paginator: None,
        },
        resources: vec![ResourceConfig::Name("customers".to_string())],
        resource_defaults: None,
    };
    let source = RestApiSource::new("jaffle_api", config);

    source.extract().await.unwrap();
    mock.assert();
}

#[tokio::test]
async fn test_header_link_pagination_follows_next_links() {
    let server = MockServer::start();

    let page2_url = server.url("/api/v1/customers_page2");
    let page1_mock = server.mock(|when, then| {
        when.method(GET).path("/api/v1/customers");
        then.status(200)
            .header("Content-Type", "application/json")
            .header("Link", format!("<{}>; rel=\"next\"", page2_url))
            .json_body(serde_json::json!([{"id": 1}, {"id": 2}]));
    });
    let page2_mock = server.mock(|when, then| {
        when.method(GET).path("/api/v1/customers_page2");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!([{"id": 3}]));
    });

    let config = RestApiConfig {
        client: ClientConfig {
            base_url: server.url("/api/v1"),
            headers: None,
            auth: None,
            paginator: Some(PaginatorConfig::HeaderLink),
        },
        resources: vec![ResourceConfig::Name("customers".to_string())],
        resource_defaults: None,
    };
    let source = RestApiSource::new("jaffle_api", config);

    let tables = source.extract().await.unwrap();
    page1_mock.assert();
    page2_mock.assert();
    assert_eq!(tables[0].records.len(), 3);
}

#[tokio::test]
async fn test_page_number_pagination_stops_on_empty_page() {
    let server = MockServer::start();

    let page1_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/orders")
            .query_param("page", "1");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!([{"id": 1}, {"id": 2}]));
    });
    let page2_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/orders")
            .query_param("page", "2");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!([]));
    });

    let config = RestApiConfig {
        client: ClientConfig {
            base_url: server.url("/api/v1"),
            headers: None,
            auth: None,
            paginator: Some(PaginatorConfig::PageNumber {
                page_param: "page".to_string(),
                start_page: 1,
            }),
        },
        resources: vec![ResourceConfig::Name("orders".to_string())],
        resource_defaults: None,
    };
    let source = RestApiSource::new("jaffle_api", config);

    let tables = source.extract().await.unwrap();
    page1_mock.assert();
    page2_mock.assert();
    assert_eq!(tables[0].records.len(), 2);
}

#[tokio::test]
async fn test_offset_pagination_stops_on_short_page() {
    let server = MockServer::start();

    let page1_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/items")
            .query_param("offset", "0")
            .query_param("limit", "2");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!([{"id": 1}, {"id": 2}]));
    });
    let page2_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/items")
            .query_param("offset", "2")
            .query_param("limit", "2");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!([{"id": 3}]));
    });

    let config = RestApiConfig {
        client: ClientConfig {
            base_url: server.url("/api/v1"),
            headers: None,
            auth: None,
            paginator: Some(PaginatorConfig::Offset {
                limit: 2,
                offset_param: "offset".to_string(),
                limit_param: "limit".to_string(),
            }),
        },
        resources: vec![ResourceConfig::Name("items".to_string())],
        resource_defaults: None,
    };
    let source = RestApiSource::new("jaffle_api", config);

    let tables = source.extract().await.unwrap();
    page1_mock.assert();
    page2_mock.assert();
    assert_eq!(tables[0].records.len(), 3);
}

#[tokio::test]
async fn test_data_selector_descends_into_response() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/products");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!({
                "meta": {"total": 2},
                "data": {"items": [{"sku": "A"}, {"sku": "B"}]}
            }));
    });

    let config = RestApiConfig {
        client: client(server.url("/api/v1")),
        resources: vec![ResourceConfig::Detailed(DetailedResource {
            name: "products".to_string(),
            endpoint: Some(EndpointConfig {
                data_selector: Some("data.items".to_string()),
                ..Default::default()
            }),
            primary_key: None,
            write_disposition: None,
        })],
        resource_defaults: None,
    };
    let source = RestApiSource::new("jaffle_api", config);

    let tables = source.extract().await.unwrap();
    assert_eq!(tables[0].records.len(), 2);
    assert_eq!(
        tables[0].records[0].get("sku"),
        Some(&serde_json::json!("A"))
    );
}

#[tokio::test]
async fn test_error_status_fails_the_extract() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/api/v1/customers");
        then.status(500);
    });

    let config = RestApiConfig {
        client: client(server.url("/api/v1")),
        resources: vec![ResourceConfig::Name("customers".to_string())],
        resource_defaults: None,
    };
    let source = RestApiSource::new("jaffle_api", config);

    let result = source.extract().await;
    mock.assert();
    assert!(result.is_err());
    let message = result.unwrap_err().to_string();
    assert!(message.contains("customers"));
    assert!(message.contains("500"));
}

//! REG.RU zone API client (`/api/regru2/zone/*`)
//!
//! Every call is a form POST with a JSON `input_data` field and a JSON reply
//! carrying `result` and, for lookups, `answer.domains[]`.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use url::Url;

use crate::config::DdnsApiConfig;
use crate::error::{Error, Result};

/// Endpoint URL from a configured base and path. An empty path keeps the base.
pub fn build_api_url(base: &str, path: &str) -> Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| Error::Config(format!("Invalid API url '{}': {}", base, e)))?;

    if !path.is_empty() {
        url.set_path(path);
    }

    Ok(url)
}

/// State of the managed A record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Missing,
    Outdated,
    UpToDate,
}

#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    answer: Option<Answer>,
}

impl ApiResponse {
    fn is_success(&self) -> bool {
        self.result.as_deref() == Some("success")
    }

    fn domains(&self) -> &[DomainAnswer] {
        self.answer
            .as_ref()
            .map(|a| a.domains.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
struct Answer {
    #[serde(default)]
    domains: Vec<DomainAnswer>,
}

#[derive(Debug, Default, Deserialize)]
struct DomainAnswer {
    #[serde(default)]
    dname: String,
    #[serde(default)]
    rrs: Vec<ResourceRecord>,
}

#[derive(Debug, Default, Deserialize)]
struct ResourceRecord {
    #[serde(default)]
    subname: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Clone)]
pub struct RegRuClient {
    http: Client,
    api: DdnsApiConfig,
}

impl RegRuClient {
    pub fn new(api: DdnsApiConfig, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(format!("telegram_tools/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http, api })
    }

    fn endpoint(&self, method: &str) -> Result<Url> {
        let path = format!("{}/{}", self.api.path.trim_end_matches('/'), method);
        build_api_url(&self.api.url, &path)
    }

    async fn post(&self, method: &str, form: &[(&str, String)]) -> Result<ApiResponse> {
        let url = self.endpoint(method)?;
        debug!(%url, method, "REG.RU request");

        let response = self
            .http
            .post(url)
            .form(form)
            .send()
            .await?
            .error_for_status()?;
        let text = response.text().await?;
        debug!(method, body = %text, "REG.RU response");

        Ok(serde_json::from_str(&text)?)
    }

    /// `zone/nop`: whether the account manages `domain`.
    pub async fn domain_exists(&self, domain: &str) -> Result<bool> {
        let input = json!({ "domains": [ { "dname": domain } ] });
        let response = self
            .post(
                "nop",
                &[
                    ("input_data", input.to_string()),
                    ("io_encoding", "utf8".to_string()),
                    ("input_format", "json".to_string()),
                    ("output_format", "json".to_string()),
                    ("username", self.api.username.clone()),
                    ("password", self.api.password.clone()),
                ],
            )
            .await?;

        Ok(response.domains().iter().any(|d| d.dname == domain))
    }

    /// `zone/get_resource_records`: compare the record against `wan_ip`.
    /// The first record named `record` decides.
    pub async fn record_state(&self, domain: &str, record: &str, wan_ip: &str) -> Result<RecordState> {
        let input = json!({
            "domains": [ { "dname": domain } ],
            "output_content_type": "plain",
        });
        let response = self
            .post(
                "get_resource_records",
                &[
                    ("input_data", input.to_string()),
                    ("username", self.api.username.clone()),
                    ("password", self.api.password.clone()),
                    ("input_format", "json".to_string()),
                ],
            )
            .await?;

        for zone in response.domains().iter().filter(|d| d.dname == domain) {
            info!("Domain has been found: {}", domain);
            info!("Looking for the record: {} [{}]", record, wan_ip);

            if let Some(rr) = zone.rrs.iter().find(|rr| rr.subname == record) {
                if rr.content == wan_ip {
                    info!("Record has been found: {} [{}]", rr.subname, rr.content);
                    return Ok(RecordState::UpToDate);
                }
                info!("Found record {}: {}", rr.subname, rr.content);
                return Ok(RecordState::Outdated);
            }
        }

        Ok(RecordState::Missing)
    }

    /// `zone/remove_record` for the A record.
    pub async fn record_delete(&self, domain: &str, record: &str) -> Result<bool> {
        let input = json!({
            "username": self.api.username,
            "password": self.api.password,
            "domains": [ { "dname": domain } ],
            "subdomain": record,
            "record_type": "A",
            "output_content_type": "plain",
        });
        let response = self
            .post(
                "remove_record",
                &[
                    ("input_data", input.to_string()),
                    ("input_format", "json".to_string()),
                ],
            )
            .await?;
        Ok(response.is_success())
    }

    /// `zone/add_alias`: create the A record pointing at `wan_ip`.
    pub async fn record_create(&self, domain: &str, record: &str, wan_ip: &str) -> Result<bool> {
        let input = json!({
            "domains": [ { "dname": domain } ],
            "subdomain": record,
            "ipaddr": wan_ip,
            "output_content_type": "plain",
        });
        let response = self
            .post(
                "add_alias",
                &[
                    ("input_data", input.to_string()),
                    ("username", self.api.username.clone()),
                    ("password", self.api.password.clone()),
                    ("input_format", "json".to_string()),
                ],
            )
            .await?;
        Ok(response.is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::REGRU_API_PATH;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> RegRuClient {
        RegRuClient::new(
            DdnsApiConfig {
                url: server.base_url(),
                path: REGRU_API_PATH.to_string(),
                username: "user@example.org".to_string(),
                password: "secret".to_string(),
            },
            Duration::from_secs(5),
        )
        .expect("client")
    }

    #[test]
    fn build_api_url_sets_path_without_credentials() {
        let url = build_api_url("https://api.reg.ru", "/api/regru2/zone/nop").unwrap();

        assert_eq!(url.as_str(), "https://api.reg.ru/api/regru2/zone/nop");
        assert_eq!(url.username(), "");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn build_api_url_with_empty_path_keeps_base() {
        let url = build_api_url("https://ident.me", "").unwrap();
        assert_eq!(url.as_str(), "https://ident.me/");
    }

    #[test]
    fn build_api_url_rejects_garbage() {
        assert!(matches!(
            build_api_url("not a url", ""),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn domain_exists_matches_dname() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/regru2/zone/nop")
                .is_true(|req| {
                    let body = String::from_utf8_lossy(req.body().as_ref());
                    body.contains("username=user%40example.org")
                });
            then.status(200).json_body(serde_json::json!({
                "result": "success",
                "answer": { "domains": [ { "dname": "example.org", "result": "success" } ] }
            }));
        });

        let client = client(&server);
        assert!(client.domain_exists("example.org").await.unwrap());
        assert!(!client.domain_exists("other.org").await.unwrap());
        mock.assert_calls(2);
    }

    #[tokio::test]
    async fn record_state_distinguishes_missing_outdated_and_current() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/regru2/zone/get_resource_records");
            then.status(200).json_body(serde_json::json!({
                "result": "success",
                "answer": { "domains": [ {
                    "dname": "example.org",
                    "rrs": [
                        { "subname": "@", "rectype": "A", "content": "1.1.1.1" },
                        { "subname": "home", "rectype": "A", "content": "5.6.7.8" }
                    ]
                } ] }
            }));
        });

        let client = client(&server);
        assert_eq!(
            client.record_state("example.org", "home", "5.6.7.8").await.unwrap(),
            RecordState::UpToDate
        );
        assert_eq!(
            client.record_state("example.org", "home", "9.9.9.9").await.unwrap(),
            RecordState::Outdated
        );
        assert_eq!(
            client.record_state("example.org", "vpn", "9.9.9.9").await.unwrap(),
            RecordState::Missing
        );
        mock.assert_calls(3);
    }

    #[tokio::test]
    async fn create_and_delete_report_result_field() {
        let server = MockServer::start_async().await;
        let create = server.mock(|when, then| {
            when.method(POST)
                .path("/api/regru2/zone/add_alias")
                .is_true(|req| {
                    let body = String::from_utf8_lossy(req.body().as_ref());
                    body.contains("ipaddr")
                });
            then.status(200).json_body(serde_json::json!({ "result": "success" }));
        });
        let delete = server.mock(|when, then| {
            when.method(POST).path("/api/regru2/zone/remove_record");
            then.status(200).json_body(serde_json::json!({
                "result": "error",
                "error_code": "NO_SUCH_RECORD"
            }));
        });

        let client = client(&server);
        assert!(client.record_create("example.org", "home", "1.2.3.4").await.unwrap());
        assert!(!client.record_delete("example.org", "home").await.unwrap());
        create.assert_calls(1);
        delete.assert_calls(1);
    }

    #[tokio::test]
    async fn non_json_body_is_serialization_error() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/regru2/zone/nop");
            then.status(200).body("<html>maintenance</html>");
        });

        let err = client(&server).domain_exists("example.org").await.unwrap_err();
        assert!(matches!(err, Error::SerializationError(_)));
        assert_eq!(err.exit_code(), 65);
    }

    #[tokio::test]
    async fn http_error_status_is_http_error() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/regru2/zone/nop");
            then.status(503);
        });

        let err = client(&server).domain_exists("example.org").await.unwrap_err();
        assert!(matches!(err, Error::HttpError(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_failure() {
        let client = RegRuClient::new(
            DdnsApiConfig {
                url: "http://127.0.0.1:1".to_string(),
                path: REGRU_API_PATH.to_string(),
                username: String::new(),
                password: String::new(),
            },
            Duration::from_secs(2),
        )
        .unwrap();

        let err = client.domain_exists("example.org").await.unwrap_err();
        assert!(matches!(err, Error::TransportFailure(_)));
        assert_eq!(err.exit_code(), 69);
    }
}

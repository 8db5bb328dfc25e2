//! HTTP client for the target service
//!
//! One [`WebappClient`] models one simulated user: it carries a user agent and
//! an e-mail address, and every request it sends is raced against the run's
//! cancellation token. Transport failures are classified here so scenarios
//! only ever see [`ScenarioError`]s.

use std::sync::Arc;
use std::time::{Duration, Instant};

use nestbench_core::asset::{ChairAttributes, EstateAttributes};
use nestbench_core::condition::{ChairSearchCondition, EstateSearchCondition};
use nestbench_core::fails::ScenarioError;
use nestbench_core::geometry::Point;
use reqwest::header::{HOST, USER_AGENT};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::config::{ConfigError, TargetConfig};
use crate::metrics::RequestMetrics;

/// Query string as ordered key/value pairs
pub type Query = Vec<(String, String)>;

/// Where requests go and which Host header they carry
#[derive(Debug, Clone)]
pub struct Target {
    pub base_url: Url,
    pub host: Option<String>,
}

impl Target {
    pub fn from_config(config: &TargetConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: config.base_url()?,
            host: config.host_override.clone(),
        })
    }

    fn url(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(path);
        url
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResponse {
    #[serde(default)]
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChairSearchResponse {
    pub count: i64,
    #[serde(default)]
    pub chairs: Vec<ChairAttributes>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstateSearchResponse {
    pub count: i64,
    #[serde(default)]
    pub estates: Vec<EstateAttributes>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChairListResponse {
    #[serde(default)]
    pub chairs: Vec<ChairAttributes>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstateListResponse {
    #[serde(default)]
    pub estates: Vec<EstateAttributes>,
}

#[derive(Serialize)]
struct EmailRequest<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct Coordinates<'a> {
    coordinates: &'a [Point],
}

/// A raw response captured for snapshot comparison
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Connection settings shared by every client of a run
#[derive(Debug, Clone)]
pub struct ClientFactory {
    http: reqwest::Client,
    target: Arc<Target>,
    metrics: Arc<RequestMetrics>,
    timeout: Duration,
}

impl ClientFactory {
    pub fn new(
        target: Target,
        metrics: Arc<RequestMetrics>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            http,
            target: Arc::new(target),
            metrics,
            timeout,
        })
    }

    /// A simulated user with a random identity
    pub fn user(&self, cancel: CancellationToken) -> WebappClient {
        let id = uuid::Uuid::new_v4();
        self.client(format!("nestbench-user-{id}"), cancel)
    }

    /// A crawler, identified as such by its user agent
    pub fn bot(&self, cancel: CancellationToken) -> WebappClient {
        let id = uuid::Uuid::new_v4();
        self.client(format!("nestbench-bot-{id}"), cancel)
    }

    fn client(&self, user_agent: String, cancel: CancellationToken) -> WebappClient {
        WebappClient {
            http: self.http.clone(),
            target: self.target.clone(),
            metrics: self.metrics.clone(),
            timeout: self.timeout,
            email: format!("{user_agent}@example.com"),
            user_agent,
            cancel,
        }
    }

    pub fn metrics(&self) -> &Arc<RequestMetrics> {
        &self.metrics
    }
}

/// HTTP client of one simulated user
#[derive(Debug, Clone)]
pub struct WebappClient {
    http: reqwest::Client,
    target: Arc<Target>,
    metrics: Arc<RequestMetrics>,
    timeout: Duration,
    user_agent: String,
    email: String,
    cancel: CancellationToken,
}

impl WebappClient {
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Same identity, with a different per-request timeout
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout,
            ..self.clone()
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request_url(method, self.target.url(path))
    }

    fn request_url(&self, method: Method, url: Url) -> RequestBuilder {
        let mut builder = self
            .http
            .request(method, url)
            .header(USER_AGENT, &self.user_agent)
            .timeout(self.timeout);
        if let Some(host) = &self.target.host {
            builder = builder.header(HOST, host);
        }
        builder
    }

    /// Send and check the status. Cancellation wins over every other outcome.
    async fn send(
        &self,
        endpoint: &'static str,
        builder: RequestBuilder,
        expected: &[StatusCode],
    ) -> Result<Response, ScenarioError> {
        let started = Instant::now();
        let result = tokio::select! {
            _ = self.cancel.cancelled() => return Err(ScenarioError::Cancelled),
            result = builder.send() => result,
        };

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.metrics.record(endpoint, started.elapsed(), false);
                return Err(classify_transport_error(endpoint, &e));
            }
        };

        let status = response.status();
        let ok = expected.contains(&status);
        self.metrics.record(endpoint, started.elapsed(), ok);
        if !ok {
            debug!(endpoint, %status, user_agent = %self.user_agent, "Unexpected status");
            let expected: Vec<String> = expected.iter().map(|s| s.as_u16().to_string()).collect();
            return Err(ScenarioError::application(format!(
                "{endpoint}: got response status code {}; expected {}",
                status.as_u16(),
                expected.join(" or ")
            )));
        }
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        response: Response,
    ) -> Result<T, ScenarioError> {
        let body = tokio::select! {
            _ = self.cancel.cancelled() => return Err(ScenarioError::Cancelled),
            body = response.bytes() => body,
        };
        let body = body.map_err(|e| classify_transport_error(endpoint, &e))?;
        serde_json::from_slice(&body)
            .map_err(|_| ScenarioError::application(format!("{endpoint}: failed to decode JSON")))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        path: &str,
        query: Option<&Query>,
    ) -> Result<T, ScenarioError> {
        let mut builder = self.request(Method::GET, path);
        if let Some(query) = query {
            builder = builder.query(query);
        }
        let response = self.send(endpoint, builder, &[StatusCode::OK]).await?;
        self.decode(endpoint, response).await
    }

    pub async fn initialize(&self) -> Result<InitializeResponse, ScenarioError> {
        const ENDPOINT: &str = "POST /initialize";
        let response = self
            .send(ENDPOINT, self.request(Method::POST, "/initialize"), &[StatusCode::OK])
            .await?;
        let init: InitializeResponse = self.decode(ENDPOINT, response).await?;
        if init.language.is_empty() {
            return Err(ScenarioError::application(format!(
                "{ENDPOINT}: implementation language is not set"
            )));
        }
        Ok(init)
    }

    pub async fn recommended_chairs(&self) -> Result<ChairListResponse, ScenarioError> {
        self.get_json("GET /api/recommended_chair", "/api/recommended_chair", None)
            .await
    }

    pub async fn recommended_estates(&self) -> Result<EstateListResponse, ScenarioError> {
        self.get_json("GET /api/recommended_estate", "/api/recommended_estate", None)
            .await
    }

    pub async fn recommended_estates_for_chair(
        &self,
        chair_id: i64,
    ) -> Result<EstateListResponse, ScenarioError> {
        self.get_json(
            "GET /api/recommended_estate/:id",
            &format!("/api/recommended_estate/{chair_id}"),
            None,
        )
        .await
    }

    pub async fn chair_search_condition(&self) -> Result<ChairSearchCondition, ScenarioError> {
        self.get_json(
            "GET /api/chair/search/condition",
            "/api/chair/search/condition",
            None,
        )
        .await
    }

    pub async fn estate_search_condition(&self) -> Result<EstateSearchCondition, ScenarioError> {
        self.get_json(
            "GET /api/estate/search/condition",
            "/api/estate/search/condition",
            None,
        )
        .await
    }

    pub async fn search_chairs(&self, query: &Query) -> Result<ChairSearchResponse, ScenarioError> {
        self.get_json("GET /api/chair/search", "/api/chair/search", Some(query))
            .await
    }

    pub async fn search_estates(
        &self,
        query: &Query,
    ) -> Result<EstateSearchResponse, ScenarioError> {
        self.get_json("GET /api/estate/search", "/api/estate/search", Some(query))
            .await
    }

    /// `None` when the chair is sold out (404)
    pub async fn chair_detail(&self, id: i64) -> Result<Option<ChairAttributes>, ScenarioError> {
        const ENDPOINT: &str = "GET /api/chair/:id";
        let builder = self.request(Method::GET, &format!("/api/chair/{id}"));
        let response = self
            .send(ENDPOINT, builder, &[StatusCode::OK, StatusCode::NOT_FOUND])
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        self.decode(ENDPOINT, response).await.map(Some)
    }

    pub async fn estate_detail(&self, id: i64) -> Result<EstateAttributes, ScenarioError> {
        self.get_json("GET /api/estate/:id", &format!("/api/estate/{id}"), None)
            .await
    }

    pub async fn buy_chair(&self, id: i64) -> Result<(), ScenarioError> {
        let builder = self
            .request(Method::POST, &format!("/api/chair/buy/{id}"))
            .json(&EmailRequest { email: &self.email });
        self.send("POST /api/chair/buy/:id", builder, &[StatusCode::OK])
            .await
            .map(drop)
    }

    pub async fn request_estate_document(&self, id: i64) -> Result<(), ScenarioError> {
        let builder = self
            .request(Method::POST, &format!("/api/estate/req_doc/{id}"))
            .json(&EmailRequest { email: &self.email });
        self.send("POST /api/estate/req_doc/:id", builder, &[StatusCode::OK])
            .await
            .map(drop)
    }

    /// Spatial search; `polygon` must be a closed ring
    pub async fn search_estates_nazotte(
        &self,
        polygon: &[Point],
    ) -> Result<EstateSearchResponse, ScenarioError> {
        const ENDPOINT: &str = "POST /api/estate/nazotte";
        let builder = self
            .request(Method::POST, "/api/estate/nazotte")
            .json(&Coordinates {
                coordinates: polygon,
            });
        let response = self.send(ENDPOINT, builder, &[StatusCode::OK]).await?;
        self.decode(ENDPOINT, response).await
    }

    pub async fn post_chairs(&self, file_name: String, csv: Vec<u8>) -> Result<(), ScenarioError> {
        self.post_csv("POST /api/chair", "/api/chair", "chairs", file_name, csv)
            .await
    }

    pub async fn post_estates(&self, file_name: String, csv: Vec<u8>) -> Result<(), ScenarioError> {
        self.post_csv("POST /api/estate", "/api/estate", "estates", file_name, csv)
            .await
    }

    async fn post_csv(
        &self,
        endpoint: &'static str,
        path: &str,
        field: &'static str,
        file_name: String,
        csv: Vec<u8>,
    ) -> Result<(), ScenarioError> {
        let part = reqwest::multipart::Part::bytes(csv).file_name(file_name);
        let form = reqwest::multipart::Form::new().part(field, part);
        let builder = self.request(Method::POST, path).multipart(form);
        self.send(endpoint, builder, &[StatusCode::CREATED])
            .await
            .map(drop)
    }

    /// Reissue a captured request verbatim; any status is accepted
    pub async fn replay(
        &self,
        method: Method,
        resource: &str,
        query: &str,
        body: Option<String>,
    ) -> Result<RawResponse, ScenarioError> {
        const ENDPOINT: &str = "snapshot replay";
        let mut url = self.target.url(resource);
        if !query.is_empty() {
            url.set_query(Some(query));
        }
        let mut builder = self.request_url(method, url);
        if let Some(body) = body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let started = Instant::now();
        let result = tokio::select! {
            _ = self.cancel.cancelled() => return Err(ScenarioError::Cancelled),
            result = builder.send() => result,
        };
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.metrics.record(ENDPOINT, started.elapsed(), false);
                return Err(classify_transport_error(ENDPOINT, &e));
            }
        };

        let status = response.status();
        self.metrics
            .record(ENDPOINT, started.elapsed(), status.is_success());
        let body = tokio::select! {
            _ = self.cancel.cancelled() => return Err(ScenarioError::Cancelled),
            body = response.text() => body,
        };
        let body = body.map_err(|e| classify_transport_error(ENDPOINT, &e))?;
        Ok(RawResponse { status, body })
    }
}

/// Timeouts are `Timeout`, every other transport failure is `Temporary`
fn classify_transport_error(endpoint: &str, err: &reqwest::Error) -> ScenarioError {
    if err.is_timeout() {
        ScenarioError::timeout(format!("{endpoint}: request timed out"))
    } else if err.is_decode() {
        ScenarioError::application(format!("{endpoint}: failed to read response body"))
    } else {
        ScenarioError::temporary(format!("{endpoint}: request failed"))
    }
}

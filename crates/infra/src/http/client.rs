use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client as ReqwestClient, IntoUrl, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use wayfare_common::resilience::{
    CallExecutor, CallOutcome, HttpClassifier, RetryOverrides, RetryPolicy, Sleeper,
};

use super::error::HttpError;

/// HTTP client with built-in retry and per-attempt timeout support.
///
/// Every attempt rebuilds the request from the caller's builder. Responses
/// with a 5xx status are retried under the client's policy; any other
/// response is returned to the caller as-is, 4xx included.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    executor: CallExecutor<HttpClassifier>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient").field("policy", self.executor.policy()).finish()
    }
}

/// Per-call adjustments to the client's retry behaviour.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    policy: Option<RetryPolicy>,
    overrides: RetryOverrides,
}

impl RequestOptions {
    /// Options that keep the client's policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the client's policy for this call.
    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Apply overrides on top of the effective policy for this call.
    pub fn overrides(mut self, overrides: RetryOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    fn resolve(&self, base: &RetryPolicy) -> Result<RetryPolicy, HttpError> {
        let policy = self.policy.unwrap_or(*base);
        if self.overrides.is_empty() {
            return Ok(policy);
        }
        Ok(policy.with_overrides(&self.overrides)?)
    }
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, HttpError> {
        Self::builder().build()
    }

    /// Policy applied when a call sets no options
    pub fn policy(&self) -> &RetryPolicy {
        self.executor.policy()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute the provided request builder with retry semantics.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, HttpError> {
        self.send_with(builder, &RequestOptions::default()).await
    }

    /// Execute a request with per-call options.
    pub async fn send_with(
        &self,
        builder: RequestBuilder,
        options: &RequestOptions,
    ) -> Result<Response, HttpError> {
        self.send_with_outcome(builder, options).await.into_result()
    }

    /// Execute a request and report attempt statistics alongside the result.
    pub async fn send_with_outcome(
        &self,
        builder: RequestBuilder,
        options: &RequestOptions,
    ) -> CallOutcome<Response, HttpError> {
        let executor = match options.resolve(self.executor.policy()) {
            Ok(policy) => self.executor.with_policy(policy),
            Err(err) => {
                return CallOutcome {
                    result: Err(err),
                    attempts: 0,
                    total_delay: Duration::ZERO,
                    delays: Vec::new(),
                };
            }
        };

        executor
            .execute_with_outcome(|attempt| {
                let replay = builder.try_clone();
                let client = &self.client;
                async move {
                    let request = replay
                        .ok_or_else(|| {
                            HttpError::InvalidRequest(
                                "request body cannot be cloned; buffer the body to enable retries"
                                    .into(),
                            )
                        })?
                        .build()?;

                    let method = request.method().clone();
                    let url = request.url().clone();
                    debug!(attempt = attempt.number(), %method, %url, "sending HTTP request");

                    let response = client.execute(request).await?;
                    let status = response.status();
                    debug!(
                        attempt = attempt.number(),
                        %method,
                        %url,
                        %status,
                        "received HTTP response"
                    );

                    if status.is_server_error() {
                        return Err(HttpError::Status { status, url: url.to_string() });
                    }

                    Ok(response)
                }
            })
            .await
    }

    /// Send a request and decode a successful JSON body.
    ///
    /// Non-success statuses become [`HttpError::Status`]; only 5xx is retried.
    /// The body is read inside the attempt, so a connection dropped mid-body
    /// is retried like any other transport failure.
    pub async fn send_json<T>(
        &self,
        builder: RequestBuilder,
        options: &RequestOptions,
    ) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let policy = options.resolve(self.executor.policy())?;

        self.executor
            .with_policy(policy)
            .execute(|attempt| {
                let replay = builder.try_clone();
                let client = &self.client;
                async move {
                    let request = replay
                        .ok_or_else(|| {
                            HttpError::InvalidRequest(
                                "request body cannot be cloned; buffer the body to enable retries"
                                    .into(),
                            )
                        })?
                        .build()?;
                    let url = request.url().clone();
                    debug!(attempt = attempt.number(), %url, "sending HTTP request");

                    let response = client.execute(request).await?;
                    let status = response.status();
                    if !status.is_success() {
                        return Err(HttpError::Status { status, url: url.to_string() });
                    }

                    let bytes = response.bytes().await?;
                    serde_json::from_slice(&bytes).map_err(|err| HttpError::Decode(err.to_string()))
                }
            })
            .await
    }

    /// GET `url` and decode the JSON body.
    pub async fn get_json<T, U>(&self, url: U) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
        U: IntoUrl,
    {
        self.send_json(self.request(Method::GET, url), &RequestOptions::default()).await
    }

    /// POST `body` as JSON to `url` and decode the JSON response.
    pub async fn post_json<B, T, U>(&self, url: U, body: &B) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
        U: IntoUrl,
    {
        self.send_json(self.request(Method::POST, url).json(body), &RequestOptions::default())
            .await
    }
}

/// Builder for [`HttpClient`].
pub struct HttpClientBuilder {
    policy: RetryPolicy,
    overrides: RetryOverrides,
    connect_timeout: Option<Duration>,
    user_agent: Option<String>,
    default_headers: HeaderMap,
    sleeper: Option<Arc<dyn Sleeper>>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::http(),
            overrides: RetryOverrides::default(),
            connect_timeout: None,
            user_agent: None,
            default_headers: HeaderMap::new(),
            sleeper: None,
        }
    }
}

impl HttpClientBuilder {
    /// Replace the whole retry policy (defaults to [`RetryPolicy::http`]).
    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Overrides applied to the policy when the client is built.
    pub fn overrides(mut self, overrides: RetryOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Transport connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// `User-Agent` sent with every request
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Headers sent with every request unless the request sets its own.
    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers.extend(headers);
        self
    }

    /// Add one default header
    pub fn default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    /// Replace the backoff sleeper
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Validate overrides and build the reqwest client
    pub fn build(self) -> Result<HttpClient, HttpError> {
        let policy = if self.overrides.is_empty() {
            self.policy
        } else {
            self.policy.with_overrides(&self.overrides)?
        };

        let mut headers = self.default_headers;
        headers.entry(CONTENT_TYPE).or_insert(HeaderValue::from_static("application/json"));

        let mut builder = ReqwestClient::builder().default_headers(headers).no_proxy();

        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder.build()?;

        let mut executor = CallExecutor::new(policy, HttpClassifier);
        if let Some(sleeper) = self.sleeper {
            executor = executor.with_sleeper(sleeper);
        }

        Ok(HttpClient { client, executor })
    }
}

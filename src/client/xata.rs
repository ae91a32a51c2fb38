//! Xata table client.
//!
//! POSTs paging requests to the table query endpoint and new records to the
//! insert endpoint. Redirects are followed by hand so the request stays a
//! POST with the same body; reqwest would downgrade 301/302/303 to a GET.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, LOCATION};
use reqwest::{redirect, StatusCode, Url};
use serde_json::Value;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::models::{QueryRequest, QueryResponse};

/// Client bound to one table.
#[derive(Clone)]
pub struct XataClient {
    http: reqwest::Client,
    query_url: Url,
    data_url: Url,
    api_key: String,
    max_redirects: usize,
}

impl std::fmt::Debug for XataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XataClient")
            .field("query_url", &self.query_url.as_str())
            .field("max_redirects", &self.max_redirects)
            .finish_non_exhaustive()
    }
}

impl XataClient {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let query_url = Url::parse(&config.query_url())
            .map_err(|e| AppError::Config(format!("invalid query URL: {e}")))?;
        let data_url = Url::parse(&config.data_url())
            .map_err(|e| AppError::Config(format!("invalid data URL: {e}")))?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .redirect(redirect::Policy::none())
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .default_headers(default_headers)
            .build()?;

        Ok(Self {
            http,
            query_url,
            data_url,
            api_key: config.api_key.clone(),
            max_redirects: config.max_redirects,
        })
    }

    pub const fn query_url(&self) -> &Url {
        &self.query_url
    }

    pub const fn data_url(&self) -> &Url {
        &self.data_url
    }

    /// Fetches one page.
    pub async fn query(&self, request: &QueryRequest) -> AppResult<QueryResponse> {
        let body = serde_json::to_vec(request)?;
        let (resp, url) = self.post_following_redirects(&self.query_url, body).await?;
        let status = resp.status();

        if status.is_client_error() || status.is_server_error() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AppError::UpstreamStatus {
                status: status.as_u16(),
                body: text,
            });
        }
        if !status.is_success() {
            return Err(AppError::Protocol(format!("unexpected status {status} from {url}")));
        }

        Ok(resp.json::<QueryResponse>().await?)
    }

    /// Inserts one record and returns Xata's status and response body.
    ///
    /// Any status is returned as-is; only transport failures are errors.
    pub async fn insert_record(&self, record: &Value) -> AppResult<(StatusCode, String)> {
        let body = serde_json::to_vec(record)?;
        let (resp, _) = self.post_following_redirects(&self.data_url, body).await?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        Ok((status, text))
    }

    /// POSTs `body` to `start`, re-POSTing it on redirects.
    ///
    /// Returns the first non-redirect response and the URL that produced
    /// it. The API key is only sent to the configured origin, never to a
    /// redirect target on another host.
    async fn post_following_redirects(
        &self,
        start: &Url,
        body: Vec<u8>,
    ) -> AppResult<(reqwest::Response, Url)> {
        let mut url = start.clone();
        let mut hops = 0usize;

        loop {
            let mut builder = self.http.post(url.clone()).body(body.clone());
            if same_origin(&url, start) {
                builder = builder.bearer_auth(&self.api_key);
            }

            let resp = builder.send().await?;
            let status = resp.status();
            tracing::info!(status = status.as_u16(), url = %url, "Response code");

            if !is_followed_redirect(status) {
                return Ok((resp, url));
            }

            if hops >= self.max_redirects {
                return Err(AppError::Redirect(format!(
                    "gave up after {hops} redirects, last at {url}"
                )));
            }
            let location = resp
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| {
                    AppError::Redirect(format!("{status} from {url} without Location header"))
                })?;
            url = url
                .join(location)
                .map_err(|e| AppError::Redirect(format!("bad Location '{location}': {e}")))?;
            hops += 1;
            tracing::info!(url = %url, hops, "Redirect to URL");
        }
    }
}

fn is_followed_redirect(status: StatusCode) -> bool {
    // 301, 302, 303, 307, 308
    matches!(status.as_u16(), 301..=303 | 307 | 308)
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}

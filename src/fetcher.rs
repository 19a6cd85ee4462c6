use std::thread;
use std::time::Duration;

use reqwest::Proxy;
use reqwest::blocking::Client;
use reqwest::header::HeaderMap;
use tracing::{debug, warn};

use crate::config::RetryPolicy;
use crate::error::{CoverError, FetchError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub status: u16,
    pub body: Vec<u8>,
    pub final_url: String,
}

pub trait CatalogHttp: Send + Sync {
    fn get(
        &self,
        url: &str,
        headers: &HeaderMap,
        timeout: Duration,
    ) -> Result<FetchResult, FetchError>;
}

#[derive(Clone)]
pub struct ReqwestCatalogHttp {
    client: Client,
}

impl ReqwestCatalogHttp {
    pub fn new(proxy: Option<&str>) -> Result<Self, CoverError> {
        let mut builder = Client::builder();
        if let Some(proxy) = proxy {
            let proxy = Proxy::all(proxy)
                .map_err(|err| CoverError::HttpClient(format!("invalid proxy {proxy}: {err}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|err| CoverError::HttpClient(err.to_string()))?;
        Ok(Self { client })
    }
}

impl CatalogHttp for ReqwestCatalogHttp {
    fn get(
        &self,
        url: &str,
        headers: &HeaderMap,
        timeout: Duration,
    ) -> Result<FetchResult, FetchError> {
        let response = self
            .client
            .get(url)
            .headers(headers.clone())
            .timeout(timeout)
            .send()
            .map_err(|err| classify_transport(url, &err))?;

        let status = response.status();
        let final_url = response.url().to_string();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .bytes()
            .map_err(|err| classify_transport(url, &err))?;
        Ok(FetchResult {
            status: status.as_u16(),
            body: body.to_vec(),
            final_url,
        })
    }
}

fn classify_transport(url: &str, err: &reqwest::Error) -> FetchError {
    let url = url.to_string();
    let message = error_chain(err);
    if err.is_timeout() {
        FetchError::Timeout { url, message }
    } else if err.is_connect() {
        FetchError::Connect { url, message }
    } else {
        FetchError::Transport { url, message }
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Wraps a [`CatalogHttp`] with the run's retry policy.
///
/// Every failure class is retried the same way, including 4xx statuses.
pub struct RetryingFetcher<C> {
    http: C,
    policy: RetryPolicy,
}

impl<C: CatalogHttp> RetryingFetcher<C> {
    pub fn new(http: C, policy: RetryPolicy) -> Self {
        Self { http, policy }
    }

    pub fn http(&self) -> &C {
        &self.http
    }

    pub fn fetch(&self, url: &str, headers: &HeaderMap) -> Result<Vec<u8>, FetchError> {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 1;
        loop {
            match self.http.get(url, headers, self.policy.timeout()) {
                Ok(result) => {
                    debug!(url, attempt, bytes = result.body.len(), "fetched");
                    return Ok(result.body);
                }
                Err(err) if attempt < max_attempts => {
                    warn!("request failed ({attempt}/{max_attempts}): {url} - {err}");
                    let delay = self.policy.backoff().sample();
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    attempt += 1;
                }
                Err(err) => {
                    warn!("request failed ({attempt}/{max_attempts}): {url} - {err}");
                    return Err(err);
                }
            }
        }
    }
}

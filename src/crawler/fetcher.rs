//! HTTP fetcher implementation
//!
//! Every request goes through the same sequence:
//! 1. robots.txt check (when enabled)
//! 2. a token from the shared rate limiter
//! 3. the request itself, aborted if the run is cancelled
//!
//! Redirects are followed up to 10 hops. Any final status other than 200 is
//! an error.

use crate::config::HttpConfig;
use crate::crawler::RateLimiter;
use crate::robots::RobotsChecker;
use crate::MirrorError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::{redirect::Policy, Client, Response, StatusCode};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Maximum redirect hops followed per request
pub const MAX_REDIRECTS: usize = 10;

const ACCEPT_VALUE: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE_VALUE: &str = "en-US,en;q=0.5";

/// Body and Content-Type of a successful GET
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub content: Vec<u8>,
    pub content_type: String,
}

/// Builds the shared reqwest client
///
/// # Arguments
///
/// * `config` - User agent and timeout settings
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE));

    Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .timeout(config.timeout())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Rate-limited, robots-aware HTTP client
pub struct HttpClient {
    client: Client,
    limiter: Arc<RateLimiter>,
    robots: Option<RobotsChecker>,
}

impl HttpClient {
    /// Creates a client from config
    ///
    /// A [`RobotsChecker`] sharing the same client and limiter is attached
    /// when `respect_robots` is set.
    pub fn new(config: &HttpConfig, limiter: Arc<RateLimiter>) -> Result<Self, MirrorError> {
        let client = build_http_client(config)?;
        let robots = config.respect_robots.then(|| {
            RobotsChecker::new(client.clone(), Arc::clone(&limiter), &config.user_agent)
        });

        Ok(Self {
            client,
            limiter,
            robots,
        })
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn robots(&self) -> Option<&RobotsChecker> {
        self.robots.as_ref()
    }

    /// Downloads `url`, returning its body and Content-Type
    pub async fn get(
        &self,
        cancel: &CancellationToken,
        url: &str,
    ) -> Result<FetchedBody, MirrorError> {
        self.admit(cancel, url).await?;

        let request = async {
            let response = self.client.get(url).send().await;
            let response = check_response(url, response)?;
            let content_type = content_type(&response);
            let content = response.bytes().await.map_err(|e| http_error(url, e))?;

            Ok(FetchedBody {
                content: content.to_vec(),
                content_type,
            })
        };

        with_cancel(cancel, request).await
    }

    /// Sends a HEAD request for `url`, returning its Content-Type
    pub async fn head(&self, cancel: &CancellationToken, url: &str) -> Result<String, MirrorError> {
        self.admit(cancel, url).await?;

        let request = async {
            let response = self.client.head(url).send().await;
            let response = check_response(url, response)?;
            Ok(content_type(&response))
        };

        with_cancel(cancel, request).await
    }

    /// Checks robots.txt, then takes a rate-limiter token
    async fn admit(&self, cancel: &CancellationToken, url: &str) -> Result<(), MirrorError> {
        if let Some(robots) = &self.robots {
            if !robots.is_allowed(cancel, url).await? {
                return Err(MirrorError::RobotsDenied {
                    url: url.to_string(),
                });
            }
        }

        self.limiter.wait(cancel).await?;
        Ok(())
    }
}

async fn with_cancel<T>(
    cancel: &CancellationToken,
    request: impl Future<Output = Result<T, MirrorError>>,
) -> Result<T, MirrorError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(MirrorError::Cancelled),
        result = request => result,
    }
}

fn check_response(url: &str, response: reqwest::Result<Response>) -> Result<Response, MirrorError> {
    let response = response.map_err(|e| http_error(url, e))?;

    if response.status() != StatusCode::OK {
        return Err(MirrorError::HttpStatus {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    Ok(response)
}

fn http_error(url: &str, error: reqwest::Error) -> MirrorError {
    if error.is_redirect() {
        MirrorError::RedirectLimit {
            url: url.to_string(),
        }
    } else {
        MirrorError::Http {
            url: url.to_string(),
            source: error,
        }
    }
}

fn content_type(response: &Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

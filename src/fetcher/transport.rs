//! HTTP transport seam
//!
//! The fetch engine talks to the network only through [`HttpTransport`], so
//! the attempt loop can be driven by reqwest in production and by scripted
//! transports in tests.

use crate::proxy::ProxyCandidate;
use crate::TransportError;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{redirect::Policy, Client, Proxy};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use url::Url;

/// One outbound GET
#[derive(Debug)]
pub struct TransportRequest<'a> {
    pub url: &'a Url,
    pub headers: HeaderMap,
    /// Egress proxy; `None` goes out directly
    pub proxy: Option<&'a ProxyCandidate>,
    pub timeout: Duration,
}

/// A response whose body has been read in full
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Final URL after redirects
    pub final_url: String,
    /// Page body content
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, final_url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            final_url: final_url.into(),
            body: body.into(),
        }
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Anything that can perform a GET
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, request: TransportRequest<'_>) -> Result<RawResponse, TransportError>;

    /// Releases whatever the transport keeps for `proxy`
    ///
    /// Called once a proxy will not be used again (failed validation, cut
    /// from the pool, or burned during a session).
    fn evict(&self, _proxy: &ProxyCandidate) {}
}

/// Builds an HTTP client, optionally routed through a proxy
///
/// Redirects are followed (up to 10 hops) and cookies persist for the
/// client's lifetime, like a browser session. The per-request timeout is set
/// on each request rather than here.
pub fn build_http_client(proxy: Option<&ProxyCandidate>) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .cookie_store(true)
        .gzip(true)
        .brotli(true);

    builder = match proxy {
        Some(proxy) => builder.proxy(Proxy::all(proxy.address())?),
        // System proxy variables do not apply to direct traffic
        None => builder.no_proxy(),
    };

    builder.build()
}

/// Production transport backed by reqwest
///
/// One client is kept per proxy (plus one for direct traffic) so connection
/// pools and cookies are not shared across egress addresses. Clients for
/// evicted proxies are dropped.
#[derive(Debug)]
pub struct ReqwestTransport {
    direct: Client,
    proxied: Mutex<HashMap<String, Client>>,
}

impl ReqwestTransport {
    pub fn new() -> crate::Result<Self> {
        Ok(Self {
            direct: build_http_client(None)?,
            proxied: Mutex::new(HashMap::new()),
        })
    }

    /// Number of per-proxy clients currently held
    pub fn cached_clients(&self) -> usize {
        self.clients().len()
    }

    fn clients(&self) -> MutexGuard<'_, HashMap<String, Client>> {
        self.proxied.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn client_for(&self, proxy: Option<&ProxyCandidate>) -> Result<Client, TransportError> {
        let Some(proxy) = proxy else {
            return Ok(self.direct.clone());
        };

        let mut clients = self.clients();
        if let Some(client) = clients.get(proxy.address()) {
            return Ok(client.clone());
        }

        let client = build_http_client(Some(proxy)).map_err(|e| TransportError::Proxy {
            proxy: proxy.address().to_string(),
            message: e.to_string(),
        })?;
        clients.insert(proxy.address().to_string(), client.clone());
        Ok(client)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: TransportRequest<'_>) -> Result<RawResponse, TransportError> {
        let client = self.client_for(request.proxy)?;

        let response = client
            .get(request.url.clone())
            .headers(request.headers)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| map_send_error(&e, request.url, request.proxy))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout {
                    url: request.url.to_string(),
                }
            } else {
                TransportError::Body {
                    url: request.url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        Ok(RawResponse {
            status,
            final_url,
            body,
        })
    }

    fn evict(&self, proxy: &ProxyCandidate) {
        if self.clients().remove(proxy.address()).is_some() {
            tracing::trace!("Dropped HTTP client for proxy {}", proxy);
        }
    }
}

/// Classifies a reqwest send failure
fn map_send_error(e: &reqwest::Error, url: &Url, proxy: Option<&ProxyCandidate>) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else if e.is_connect() {
        match proxy {
            Some(proxy) => TransportError::Proxy {
                proxy: proxy.address().to_string(),
                message: e.to_string(),
            },
            None => TransportError::Connect {
                url: url.to_string(),
                message: e.to_string(),
            },
        }
    } else {
        TransportError::Other {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

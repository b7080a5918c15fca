//! Shared helpers for integration tests

use async_trait::async_trait;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tenacious_fetch::fetcher::{DelayRange, HttpTransport, RawResponse, TransportRequest};
use tenacious_fetch::{ProxyCandidate, TransportError};
use tracing_subscriber::fmt::MakeWriter;

type Reply = Result<RawResponse, TransportError>;
type Handler = Box<dyn Fn(usize, &TransportRequest<'_>) -> Reply + Send + Sync>;

/// One request seen by a [`ScriptedTransport`]
#[derive(Debug, Clone)]
pub struct Call {
    pub url: String,
    pub proxy: Option<String>,
    pub user_agent: Option<String>,
}

/// In-memory transport answering from a script and recording every call
pub struct ScriptedTransport {
    handler: Handler,
    calls: Mutex<Vec<Call>>,
    evicted: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    /// Answers each call with `handler(call_index, request)`
    pub fn with_handler<F>(handler: F) -> Arc<Self>
    where
        F: Fn(usize, &TransportRequest<'_>) -> Reply + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
            evicted: Mutex::new(Vec::new()),
        })
    }

    /// Replays `replies` in order, repeating the last one forever
    pub fn replaying(replies: Vec<Reply>) -> Arc<Self> {
        assert!(!replies.is_empty());
        Self::with_handler(move |index, _| replies[index.min(replies.len() - 1)].clone())
    }

    /// Always answers with the same reply
    pub fn always(reply: Reply) -> Arc<Self> {
        Self::replaying(vec![reply])
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Proxy addresses passed to `evict`, sorted
    pub fn evicted(&self) -> Vec<String> {
        let mut evicted = self.evicted.lock().unwrap().clone();
        evicted.sort();
        evicted
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, request: TransportRequest<'_>) -> Reply {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call {
                url: request.url.to_string(),
                proxy: request.proxy.map(|p| p.address().to_string()),
                user_agent: request
                    .headers
                    .get(reqwest::header::USER_AGENT)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
            });
            calls.len() - 1
        };
        (self.handler)(index, &request)
    }

    fn evict(&self, proxy: &ProxyCandidate) {
        self.evicted.lock().unwrap().push(proxy.address().to_string());
    }
}

pub fn page(status: u16, body: &str) -> Reply {
    Ok(RawResponse::new(status, "https://shop.example.com/item", body))
}

pub fn connection_refused() -> Reply {
    Err(TransportError::Connect {
        url: "https://shop.example.com/item".to_string(),
        message: "connection refused".to_string(),
    })
}

/// Millisecond-scale delays so retry tests stay fast
pub fn tiny_delays() -> DelayRange {
    DelayRange::from_durations(Duration::from_millis(2), Duration::from_millis(5)).unwrap()
}

/// Captures formatted log output for assertions
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

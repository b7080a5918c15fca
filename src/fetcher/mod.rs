//! Resilient fetcher module
//!
//! This module turns a URL into a terminal [`FetchOutcome`]:
//! - Robots.txt check once per logical fetch
//! - Attempt loop with jittered, growing delays and session-wide pacing
//! - Proxy and browser identity rotation per attempt
//! - Response classification (blocks, rate limits, CAPTCHAs, incomplete pages)

mod backoff;
mod classify;
mod engine;
mod request;
mod transport;

pub use backoff::{Backoff, Pacing};
pub use classify::{classify, Classification, ClassifyRules, Verdict};
pub use engine::{Fetcher, DEFAULT_TIMEOUT};
pub use request::{AttemptRecord, DelayRange, FetchOutcome, FetchReport, FetchRequest};
pub use transport::{
    build_http_client, HttpTransport, RawResponse, ReqwestTransport, TransportRequest,
};

use crate::config::Config;
use crate::fetcher::{
    classify, AttemptRecord, Backoff, Classification, ClassifyRules, DelayRange, FetchOutcome,
    FetchReport, FetchRequest, HttpTransport, Pacing, RawResponse, TransportRequest, Verdict,
};
use crate::identity::{browser_headers, IdentityRotator};
use crate::output::DebugSink;
use crate::state::{FetchMachine, FetchState, Session};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default per-attempt request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Resilient fetcher
///
/// Runs one logical fetch as a policy check followed by a bounded sequence of
/// attempts. Every attempt sleeps a jittered delay, picks a fresh proxy and
/// browser identity, and is classified; retryable conditions never escape
/// the loop. Only the terminal [`FetchOutcome`] is returned.
pub struct Fetcher {
    transport: Arc<dyn HttpTransport>,
    identities: IdentityRotator,
    rules: ClassifyRules,
    timeout: Duration,
    referer: Option<String>,
    pacing: Pacing,
    sink: DebugSink,
}

impl Fetcher {
    /// A fetcher with built-in identities, permissive classification rules
    /// and no debug sink
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            identities: IdentityRotator::default(),
            rules: ClassifyRules {
                captcha_markers: vec!["captcha".to_string()],
                ..ClassifyRules::default()
            },
            timeout: DEFAULT_TIMEOUT,
            referer: None,
            pacing: Pacing::none(),
            sink: DebugSink::disabled(),
        }
    }

    /// Builds a fetcher from the `fetch`, `identity` and `debug` sections
    pub fn from_config(transport: Arc<dyn HttpTransport>, config: &Config) -> Self {
        let referer = Some(config.fetch.referer.clone()).filter(|r| !r.is_empty());
        Self {
            transport,
            identities: IdentityRotator::from_config(&config.identity),
            rules: ClassifyRules::from_config(&config.fetch),
            timeout: Duration::from_secs(config.fetch.timeout_secs),
            referer,
            pacing: Pacing::from_config(&config.fetch),
            sink: DebugSink::from_config(&config.debug),
        }
    }

    pub fn with_identities(mut self, identities: IdentityRotator) -> Self {
        self.identities = identities;
        self
    }

    pub fn with_rules(mut self, rules: ClassifyRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_debug_sink(mut self, sink: DebugSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn rules(&self) -> &ClassifyRules {
        &self.rules
    }

    /// Fetches one URL and returns only its terminal outcome
    pub async fn fetch(&self, session: &Session, request: &FetchRequest) -> FetchOutcome {
        self.fetch_with_report(session, request).await.outcome
    }

    /// Fetches one URL, keeping a record of every attempt
    ///
    /// # Arguments
    ///
    /// * `session` - Proxy pool, failed-proxy set and robots.txt gate
    /// * `request` - Validated URL, attempt budget and delay range
    ///
    /// # Returns
    ///
    /// A report with the terminal outcome, the attempts made, and the proxies
    /// this fetch excluded from the session
    pub async fn fetch_with_report(&self, session: &Session, request: &FetchRequest) -> FetchReport {
        let url = request.url();
        let mut machine = FetchMachine::new(request.attempt_budget());
        let mut attempts = Vec::new();
        let mut excluded = Vec::new();

        machine.begin_policy_check();
        let decision = session.policy().decide(url).await;
        if machine.policy_decided(decision.allowed) == FetchState::Denied {
            let outcome = FetchOutcome::Blocked {
                reason: "disallowed by robots.txt".to_string(),
            };
            tracing::warn!("Skipping {}: {}", url, outcome);
            return FetchReport {
                url: url.clone(),
                outcome,
                final_state: machine.state(),
                attempts,
                excluded_proxies: excluded,
            };
        }

        let request_number = session.next_request_number();
        let floor = session.policy().crawl_delay(url).await.unwrap_or_default();
        let backoff = Backoff::new(request.delay_range())
            .with_floor(floor)
            .with_lead_in(self.pacing.lead_in(request_number));

        let mut extend = false;
        let mut last_response: Option<RawResponse> = None;
        let mut last: Option<Classification> = None;

        while machine.state() == FetchState::Attempting {
            let number = machine.next_attempt();
            let delay = backoff.delay_for(number, extend);
            let proxy = session.proxy_for_attempt(number, machine.budget());
            let identity = self.identities.next();
            let headers = browser_headers(&identity, self.referer.as_deref());

            tracing::debug!(
                "Waiting {:.2}s before attempt {} for {}",
                delay.as_secs_f64(),
                number,
                url
            );
            tokio::time::sleep(delay).await;

            let result = self
                .transport
                .get(TransportRequest {
                    url,
                    headers,
                    proxy: proxy.as_ref(),
                    timeout: self.timeout,
                })
                .await;
            let classification = classify(&result, &self.rules);

            let via = proxy.as_ref().map(|p| p.address()).unwrap_or("direct");
            tracing::info!(
                "Attempt {}/{} for {} via {}: {} ({})",
                number,
                machine.budget(),
                url,
                via,
                classification.verdict,
                classification.detail
            );

            if classification.burn_proxy {
                if let Some(proxy) = &proxy {
                    if session.mark_proxy_failed(proxy) {
                        excluded.push(proxy.address().to_string());
                        self.transport.evict(proxy);
                    }
                }
            }

            attempts.push(AttemptRecord {
                number,
                proxy: proxy.as_ref().map(|p| p.address().to_string()),
                user_agent: identity.user_agent().to_string(),
                delay,
                status: classification.status,
                verdict: classification.verdict.to_string(),
                detail: classification.detail.clone(),
            });

            extend = classification.extend_backoff;
            last_response = result.ok();
            machine.record_attempt(classification.verdict);
            last = Some(classification);
        }

        let outcome = self.conclude(url, last, last_response);
        if outcome.is_success() {
            tracing::info!("Fetched {} after {} attempt(s): {}", url, attempts.len(), outcome);
        } else {
            tracing::warn!("Gave up on {} after {} attempt(s): {}", url, attempts.len(), outcome);
        }

        FetchReport {
            url: url.clone(),
            outcome,
            final_state: machine.state(),
            attempts,
            excluded_proxies: excluded,
        }
    }

    /// Maps the last attempt to a terminal outcome and saves its body
    fn conclude(
        &self,
        url: &Url,
        last: Option<Classification>,
        response: Option<RawResponse>,
    ) -> FetchOutcome {
        let Some(last) = last else {
            return FetchOutcome::ExhaustedRetries {
                last_cause: "no attempts made".to_string(),
            };
        };

        match (last.verdict, response) {
            (Verdict::Success, Some(response)) => {
                self.save_debug(url, "success", &response);
                FetchOutcome::Success {
                    status_code: response.status,
                    body: response.body,
                }
            }
            (verdict, response) => {
                let outcome = match verdict {
                    Verdict::Blocked => FetchOutcome::Blocked {
                        reason: last.detail,
                    },
                    Verdict::RateLimited => FetchOutcome::RateLimited,
                    Verdict::Transient | Verdict::Success => FetchOutcome::ExhaustedRetries {
                        last_cause: last.detail,
                    },
                };
                if let Some(response) = response {
                    self.save_debug(url, outcome.label(), &response);
                }
                outcome
            }
        }
    }

    fn save_debug(&self, url: &Url, label: &str, response: &RawResponse) {
        let name = format!("{}{}_{}", url.host_str().unwrap_or("unknown"), url.path(), label);
        self.sink.persist(&response.body, &name);
    }

    /// Visits warm-up pages once per session before real work
    ///
    /// Each page gets a single attempt. Returns the number of pages fetched
    /// successfully; `0` without any request if this session already warmed up.
    pub async fn warm_up(&self, session: &Session, urls: &[String], delay_range: DelayRange) -> usize {
        if urls.is_empty() || !session.begin_warm_up() {
            return 0;
        }

        tracing::info!("Warming up session with {} page(s)", urls.len());
        let mut visited = 0;
        for url in urls {
            let request = match FetchRequest::new(url, 1, delay_range) {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!("Skipping warm-up URL {}: {}", url, e);
                    continue;
                }
            };

            if self.fetch(session, &request).await.is_success() {
                tracing::debug!("Warm-up visit to {} successful", url);
                visited += 1;
            }
        }

        tracing::info!("Session warm-up completed ({}/{} pages)", visited, urls.len());
        visited
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("identities", &self.identities)
            .field("rules", &self.rules)
            .field("timeout", &self.timeout)
            .field("referer", &self.referer)
            .field("pacing", &self.pacing)
            .field("sink", &self.sink)
            .finish()
    }
}

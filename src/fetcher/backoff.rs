use crate::config::FetchConfig;
use crate::fetcher::DelayRange;
use rand::Rng;
use std::time::Duration;

/// Jittered pre-attempt delays that grow with the attempt index
///
/// Attempt `n` waits a uniform draw from `[min * n, max * n]`. An extended
/// attempt adds one more `[min, max]` draw, and a lead-in range (from
/// [`Pacing`]) adds one draw to the first attempt. No delay is shorter than
/// the floor (the site's `Crawl-delay`, when it sets one).
///
/// Arithmetic saturates at [`Duration::MAX`].
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    range: DelayRange,
    floor: Duration,
    lead_in: Option<DelayRange>,
}

impl Backoff {
    pub fn new(range: DelayRange) -> Self {
        Self {
            range,
            floor: Duration::ZERO,
            lead_in: None,
        }
    }

    pub fn with_floor(mut self, floor: Duration) -> Self {
        self.floor = floor;
        self
    }

    pub fn with_lead_in(mut self, lead_in: Option<DelayRange>) -> Self {
        self.lead_in = lead_in;
        self
    }

    /// Inclusive bounds of the delay before attempt `attempt` (1-based)
    pub fn bounds(&self, attempt: u32, extended: bool) -> (Duration, Duration) {
        let scale = attempt.max(1);
        let mut low = self.range.min().saturating_mul(scale);
        let mut high = self.range.max().saturating_mul(scale);
        if extended {
            low = low.saturating_add(self.range.min());
            high = high.saturating_add(self.range.max());
        }
        if let (1, Some(lead_in)) = (scale, self.lead_in) {
            low = low.saturating_add(lead_in.min());
            high = high.saturating_add(lead_in.max());
        }
        (low.max(self.floor), high.max(self.floor))
    }

    /// Draws the delay before attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32, extended: bool) -> Duration {
        let mut rng = rand::thread_rng();
        let scale = attempt.max(1);
        let min = self.range.min().as_secs_f64();
        let max = self.range.max().as_secs_f64();

        let factor = f64::from(scale);
        let mut secs = jitter(&mut rng, min * factor, max * factor);
        if extended {
            secs += jitter(&mut rng, min, max);
        }
        if let (1, Some(lead_in)) = (scale, self.lead_in) {
            secs += jitter(
                &mut rng,
                lead_in.min().as_secs_f64(),
                lead_in.max().as_secs_f64(),
            );
        }

        let delay = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);
        delay.max(self.floor)
    }
}

/// Session-wide pacing: extra wait before a fetch that grows with the
/// number of fetches the session has already started
///
/// Each tier applies once more than `after` requests have been made; the
/// highest applicable tier wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pacing {
    tiers: Vec<(u64, DelayRange)>,
}

impl Pacing {
    pub fn new(tiers: impl IntoIterator<Item = (u64, DelayRange)>) -> Self {
        let mut tiers: Vec<(u64, DelayRange)> = tiers.into_iter().collect();
        tiers.sort_by_key(|(after, _)| *after);
        Self { tiers }
    }

    /// No extra wait
    pub fn none() -> Self {
        Self::default()
    }

    /// 3-6s for the first requests, 5-10s after two, 8-15s after five
    pub fn progressive() -> Self {
        let tier = |min: u64, max: u64| {
            DelayRange::from_durations(Duration::from_secs(min), Duration::from_secs(max))
        };
        Self::new(
            [(0, tier(3, 6)), (2, tier(5, 10)), (5, tier(8, 15))]
                .into_iter()
                .filter_map(|(after, range)| range.ok().map(|r| (after, r))),
        )
    }

    /// Tiers from `[[fetch.pacing]]`; invalid tiers are skipped
    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(config.pacing.iter().filter_map(|tier| {
            DelayRange::from_secs(tier.delay_min_secs, tier.delay_max_secs)
                .ok()
                .map(|range| (tier.after_requests, range))
        }))
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Extra range for the session's `request_number`-th fetch (1-based)
    pub fn lead_in(&self, request_number: u64) -> Option<DelayRange> {
        self.tiers
            .iter()
            .rev()
            .find(|(after, _)| request_number > *after)
            .map(|(_, range)| *range)
    }
}

fn jitter(rng: &mut impl Rng, low: f64, high: f64) -> f64 {
    if high > low {
        rng.gen_range(low..=high)
    } else {
        low
    }
}

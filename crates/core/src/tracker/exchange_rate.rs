use parking_lot::RwLock;

use crate::util::Ratio;

/// Interval known to contain the path's exchange rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateBounds {
    pub lower: Ratio,
    pub upper: Ratio,
}

impl RateBounds {
    pub fn contains(&self, rate: Ratio) -> bool {
        self.lower <= rate && rate <= self.upper
    }

    pub fn is_subset_of(&self, other: &RateBounds) -> bool {
        other.lower <= self.lower && self.upper <= other.upper
    }
}

/// Learns the exchange rate from authenticated `(sent, received)` samples.
///
/// The receiver reports a floored amount, so a sample only tells us the rate lies in
/// `[received / sent, (received + 1) / sent)`. Samples are intersected with what is
/// already known: the interval can only narrow.
#[derive(Default)]
pub struct ExchangeRateTracker {
    bounds: RwLock<Option<RateBounds>>,
}

impl ExchangeRateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the sample was consistent with the known bounds.
    pub fn update(&self, sent: u64, received: u64) -> bool {
        let (Some(lower), Some(upper)) = (
            Ratio::new(received, sent),
            Ratio::new(received.saturating_add(1), sent),
        ) else {
            return true;
        };

        let mut bounds = self.bounds.write();
        match *bounds {
            None => {
                *bounds = Some(RateBounds { lower, upper });
                tracing::debug!(%lower, %upper, "initial exchange rate bounds");
                true
            }
            Some(known) => {
                let narrowed = RateBounds {
                    lower: known.lower.max(lower),
                    upper: known.upper.min(upper),
                };
                if narrowed.lower > narrowed.upper {
                    tracing::warn!(
                        sent,
                        received,
                        known_lower = %known.lower,
                        known_upper = %known.upper,
                        "exchange rate sample contradicts known bounds, ignoring"
                    );
                    return false;
                }
                if narrowed != known {
                    tracing::trace!(lower = %narrowed.lower, upper = %narrowed.upper, "narrowed exchange rate bounds");
                }
                *bounds = Some(narrowed);
                true
            }
        }
    }

    pub fn bounds(&self) -> Option<RateBounds> {
        *self.bounds.read()
    }

    pub fn lower_bound(&self) -> Option<Ratio> {
        self.bounds().map(|b| b.lower)
    }

    pub fn upper_bound(&self) -> Option<Ratio> {
        self.bounds().map(|b| b.upper)
    }
}

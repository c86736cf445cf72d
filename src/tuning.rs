//! Adaptive scale tuning for random-walk proposals.
//!
//! The policy is a pure function from an acceptance rate to a multiplicative
//! factor, applied every `interval` sweeps to the acceptance rate observed
//! since the previous adjustment.

/// Threshold tables mapping a recent acceptance rate to a scale factor.
///
/// `shrink` is checked first, in ascending threshold order: the first entry
/// with `rate < threshold` wins. Then `grow`, in descending order: the first
/// entry with `rate > threshold` wins. Rates in between leave the scale alone.
#[derive(Debug, Clone, PartialEq)]
pub struct TuningPolicy {
    /// Sweeps between two adjustments.
    pub interval: usize,
    pub shrink: Vec<(f64, f64)>,
    pub grow: Vec<(f64, f64)>,
}

impl Default for TuningPolicy {
    fn default() -> Self {
        Self {
            interval: 1000,
            shrink: vec![(0.001, 0.1), (0.05, 0.5), (0.2, 0.9)],
            grow: vec![(0.95, 10.0), (0.75, 2.0), (0.5, 1.1)],
        }
    }
}

impl TuningPolicy {
    /// The default tier tables with a different interval.
    pub fn with_interval(interval: usize) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    /// Scale multiplier for an observed acceptance rate.
    pub fn factor(&self, rate: f64) -> f64 {
        for &(threshold, factor) in &self.shrink {
            if rate < threshold {
                return factor;
            }
        }
        for &(threshold, factor) in &self.grow {
            if rate > threshold {
                return factor;
            }
        }
        1.0
    }

    /// Whether sweep `sweep` (1-based) is a tuning point.
    pub fn is_due(&self, sweep: usize) -> bool {
        self.interval > 0 && sweep > 0 && sweep % self.interval == 0
    }
}

/// Acceptance bookkeeping for one adaptively scaled node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdaptiveState {
    pub accepted: usize,
    pub proposed: usize,
    pub last_tuned: usize,
}

impl AdaptiveState {
    pub fn record(&mut self, accepted: bool) {
        self.proposed += 1;
        if accepted {
            self.accepted += 1;
        }
    }

    /// Acceptance rate since the last adjustment.
    pub fn rate(&self) -> Option<f64> {
        if self.proposed == 0 {
            None
        } else {
            Some(self.accepted as f64 / self.proposed as f64)
        }
    }

    /// Applies `policy` to `scale` and starts a new counting window.
    pub fn tune(&mut self, sweep: usize, policy: &TuningPolicy, scale: f64) -> f64 {
        let new_scale = match self.rate() {
            Some(rate) => scale * policy.factor(rate),
            None => scale,
        };
        self.accepted = 0;
        self.proposed = 0;
        self.last_tuned = sweep;
        new_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tiers() {
        let policy = TuningPolicy::default();
        assert_eq!(policy.factor(0.0), 0.1);
        assert_eq!(policy.factor(0.01), 0.5);
        assert_eq!(policy.factor(0.1), 0.9);
        assert_eq!(policy.factor(0.3), 1.0);
        assert_eq!(policy.factor(0.5), 1.0);
        assert_eq!(policy.factor(0.6), 1.1);
        assert_eq!(policy.factor(0.8), 2.0);
        assert_eq!(policy.factor(1.0), 10.0);
    }

    #[test]
    fn test_tune_resets_window() {
        let policy = TuningPolicy::with_interval(4);
        let mut state = AdaptiveState::default();
        for _ in 0..4 {
            state.record(true);
        }
        assert_eq!(state.rate(), Some(1.0));
        let scale = state.tune(4, &policy, 0.5);
        assert_eq!(scale, 5.0);
        assert_eq!(state.rate(), None);
        assert_eq!(state.last_tuned, 4);

        state.record(false);
        state.record(false);
        assert_eq!(state.tune(8, &policy, scale), 0.5);
    }

    #[test]
    fn test_tune_without_proposals_keeps_scale() {
        let mut state = AdaptiveState::default();
        assert_eq!(state.tune(10, &TuningPolicy::default(), 0.3), 0.3);
    }

    #[test]
    fn test_is_due() {
        let policy = TuningPolicy::with_interval(100);
        assert!(!policy.is_due(0));
        assert!(!policy.is_due(99));
        assert!(policy.is_due(100));
        assert!(policy.is_due(300));
        assert!(!TuningPolicy::with_interval(0).is_due(100));
    }
}

//! Risk-constraint filters applied to every generated pair.
//!
//! These thresholds are fixed constants of the engine, not user-configurable.

use common::SpreadMetrics;

/// Absolute risk cap per contract-lot, in dollars.
pub const MAX_LOSS_CAP: f64 = 5_000.0;
/// Minimum return-to-risk ratio.
pub const MIN_CAPITAL_EFFICIENCY: f64 = 0.1;
/// Minimum annualized yield.
pub const MIN_ANNUALIZED_RETURN: f64 = 0.05;
/// Maximum strike width, limiting tail exposure.
pub const MAX_STRIKE_WIDTH: f64 = 10.0;

/// True when a pair survives all risk constraints.
pub fn passes(metrics: &SpreadMetrics, strike_width: f64) -> bool {
    metrics.max_loss <= MAX_LOSS_CAP
        && metrics.capital_efficiency >= MIN_CAPITAL_EFFICIENCY
        && metrics.annualized_return >= MIN_ANNUALIZED_RETURN
        && strike_width <= MAX_STRIKE_WIDTH
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics;

    fn passing_metrics() -> SpreadMetrics {
        // sell 20 / buy 22 / debit 0.30 / future 20 / 100 days
        metrics::compute(20.0, 22.0, 0.30, 20.0, 100, 100)
    }

    #[test]
    fn healthy_pair_passes_all_filters() {
        assert!(passes(&passing_metrics(), 2.0));
    }

    #[test]
    fn max_loss_over_cap_is_rejected() {
        let mut m = passing_metrics();
        m.max_loss = MAX_LOSS_CAP + 1.0;
        assert!(!passes(&m, 2.0));
    }

    #[test]
    fn max_loss_at_cap_is_kept() {
        let mut m = passing_metrics();
        m.max_loss = MAX_LOSS_CAP;
        assert!(passes(&m, 2.0));
    }

    #[test]
    fn low_capital_efficiency_is_rejected() {
        let mut m = passing_metrics();
        m.capital_efficiency = MIN_CAPITAL_EFFICIENCY - 1e-6;
        assert!(!passes(&m, 2.0));
    }

    #[test]
    fn low_annualized_return_is_rejected() {
        let mut m = passing_metrics();
        m.annualized_return = MIN_ANNUALIZED_RETURN - 1e-6;
        assert!(!passes(&m, 2.0));
    }

    #[test]
    fn wide_spread_is_rejected() {
        let m = passing_metrics();
        assert!(!passes(&m, MAX_STRIKE_WIDTH + 0.5));
        assert!(passes(&m, MAX_STRIKE_WIDTH));
    }
}

//! Per-pair metric formulas for debit-spread candidates.
//!
//! Everything here is a pure function of the pair's strikes, prices, future
//! price and days to expiration. Every division is guarded so no NaN or
//! infinity can reach the ranking.

use common::SpreadMetrics;

/// Reference holding period for the quarterly return normalization.
pub const QUARTER_DAYS: f64 = 91.0;
/// Calendar days used for annualization.
pub const YEAR_DAYS: f64 = 365.0;
/// Quarterly return is capped at 100%.
pub const QUARTERLY_RETURN_CAP: f64 = 1.0;
/// Annualized return is capped at 200%.
pub const ANNUALIZED_RETURN_CAP: f64 = 2.0;

/// Win rate assigned when the future already sits at or below break-even.
pub const WIN_RATE_LOSING_SIDE: f64 = 0.15;
/// Base win rate before the price-edge adjustment.
pub const WIN_RATE_BASE: f64 = 0.55;
/// Maximum contribution of the price edge to the win rate.
pub const WIN_RATE_EDGE_CAP: f64 = 0.3;
pub const WIN_RATE_FLOOR: f64 = 0.10;
pub const WIN_RATE_CEILING: f64 = 0.90;
/// Time-scaled volatility factor: `base + days/365 * slope`. Longer-dated
/// trades are treated as more uncertain.
pub const VOL_FACTOR_BASE: f64 = 0.25;
pub const VOL_FACTOR_SLOPE: f64 = 0.15;

/// The strategy's designed holding window, in days to expiration.
pub const TIMING_WINDOW_START: i64 = 90;
pub const TIMING_WINDOW_END: i64 = 120;
/// Midpoint of the window; the timing bonus peaks here.
pub const TIMING_PEAK_DAY: i64 = 105;
/// Below this the trade does not match the intended horizon at all.
pub const TIMING_NEAR_CUTOFF: i64 = 30;
pub const TIMING_NEAR_PENALTY: f64 = 0.01;
/// Bonus at the edges of the 90-120 day window (peak is 1.0).
pub const TIMING_WINDOW_EDGE_BONUS: f64 = 0.8;

/// Composite score weights: timing dominates, then near-term capital return,
/// then risk-adjusted expectation.
pub const SCORE_WEIGHT_RISK_ADJUSTED: f64 = 0.2;
pub const SCORE_WEIGHT_QUARTERLY: f64 = 0.3;
pub const SCORE_WEIGHT_TIMING: f64 = 0.5;

/// Compute all metrics for one (sell, buy) pair.
///
/// `net_debit` must already be positive (the generator rejects non-debit
/// pairs before calling this). `days_to_expiration` may be zero or negative;
/// the timing bonus and return normalizations handle that without rejecting.
pub fn compute(
    sell_strike: f64,
    buy_strike: f64,
    net_debit: f64,
    future_price: f64,
    days_to_expiration: i64,
    quantity: u32,
) -> SpreadMetrics {
    let qty = f64::from(quantity);

    // Best case: underlying settles at or below the sell strike.
    let max_profit = (buy_strike - sell_strike - net_debit) * qty;
    // Worst case is capped at the premium paid.
    let max_loss = net_debit * qty;

    // Same formula under two names, kept for output-shape compatibility.
    let capital_efficiency = safe_div(max_profit, max_loss);
    let profit_loss_ratio = capital_efficiency;

    let break_even_point = buy_strike - net_debit;
    let win_rate = win_rate(future_price, break_even_point, days_to_expiration);

    let held_days = days_to_expiration.max(1) as f64;
    let quarterly_return =
        (capital_efficiency * (QUARTER_DAYS / held_days)).min(QUARTERLY_RETURN_CAP);
    let annualized_return =
        (capital_efficiency * (YEAR_DAYS / held_days)).min(ANNUALIZED_RETURN_CAP);

    let optimal_timing_bonus = optimal_timing_bonus(days_to_expiration);

    let expected_return = max_profit * win_rate - max_loss * (1.0 - win_rate);
    let risk_adjusted_return = safe_div(expected_return, max_loss);

    let time_adjusted_score = risk_adjusted_return * SCORE_WEIGHT_RISK_ADJUSTED
        + quarterly_return * SCORE_WEIGHT_QUARTERLY
        + optimal_timing_bonus * SCORE_WEIGHT_TIMING;

    SpreadMetrics {
        max_profit,
        max_loss,
        profit_loss_ratio,
        break_even_point,
        win_rate,
        capital_efficiency,
        quarterly_return,
        annualized_return,
        time_adjusted_score,
        optimal_timing_bonus,
    }
}

/// Heuristic probability that the spread expires profitable.
///
/// The strategy bets on the underlying declining: when the future already
/// trades at or below break-even the fixed losing-side rate applies;
/// otherwise the distance to break-even, scaled by a time-widened volatility
/// factor, adds up to `WIN_RATE_EDGE_CAP` on top of the base rate.
pub fn win_rate(future_price: f64, break_even_point: f64, days_to_expiration: i64) -> f64 {
    if future_price <= break_even_point {
        return WIN_RATE_LOSING_SIDE;
    }

    let price_diff = future_price - break_even_point;
    let vol_factor = VOL_FACTOR_BASE + days_to_expiration as f64 / YEAR_DAYS * VOL_FACTOR_SLOPE;
    let edge = safe_div(price_diff, future_price * vol_factor);

    (WIN_RATE_BASE + edge.min(WIN_RATE_EDGE_CAP)).clamp(WIN_RATE_FLOOR, WIN_RATE_CEILING)
}

/// Multiplier rewarding candidates inside the 90-120 day holding window.
///
/// Peaks at 1.0 on day 105, linearly decaying to 0.8 at both window edges.
/// Near-dated trades (< 30 days) get a hard penalty; trades between 30 and
/// 90 days scale in [0.1, 0.4]; trades past 120 days decay from 0.8 toward
/// a 0.4 floor.
pub fn optimal_timing_bonus(days_to_expiration: i64) -> f64 {
    let days = days_to_expiration;
    if (TIMING_WINDOW_START..=TIMING_WINDOW_END).contains(&days) {
        let half_width = ((TIMING_WINDOW_END - TIMING_WINDOW_START) / 2) as f64;
        let offset = (days - TIMING_PEAK_DAY).abs() as f64;
        1.0 - offset / half_width * (1.0 - TIMING_WINDOW_EDGE_BONUS)
    } else if days < TIMING_NEAR_CUTOFF {
        TIMING_NEAR_PENALTY
    } else if days < TIMING_WINDOW_START {
        (days as f64 / TIMING_WINDOW_START as f64 * 0.4).max(0.1)
    } else {
        (TIMING_WINDOW_EDGE_BONUS - ((days - TIMING_WINDOW_END) as f64 / 120.0).min(0.4)).max(0.4)
    }
}

fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

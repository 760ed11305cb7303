//! Debit-spread recommendation engine.
//!
//! Pure and synchronous: `(price_grid, future_prices, today) -> ranked
//! candidates`. The engine holds no state across calls; callers fetch the
//! inputs (option chains and future quotes) and pass the clock read in, so
//! identical inputs always produce identical output.
//!
//! For each expiration the engine anchors a sell leg near the future's mid
//! price, pairs it with every higher strike, prices the net debit, computes
//! the metrics, filters by the fixed risk constraints and finally ranks the
//! pooled survivors by `time_adjusted_score`.

pub mod filters;
pub mod metrics;

use std::cmp::Ordering;

use chrono::NaiveDate;
use tracing::debug;

use common::{Error, FutureBoard, OptionQuote, PriceGrid, Result, SpreadCandidate};

/// Fixed contract multiplier applied to all dollar metrics.
pub const CONTRACT_MULTIPLIER: u32 = 100;
/// A sell leg must sit within this many strike-units of the future mid.
pub const SELL_STRIKE_PROXIMITY: f64 = 1.5;
/// Ranked output is truncated to this many candidates.
pub const MAX_RESULTS: usize = 50;

/// Generate, score, filter and rank spread candidates.
///
/// Expirations present in the grid but missing a future quote are skipped
/// (logged, never an error). An empty result is a valid outcome meaning "no
/// viable strategies under current market conditions". Malformed expiration
/// codes fail fast with [`Error::InvalidExpiration`].
pub fn recommend(
    price_grid: &PriceGrid,
    future_prices: &FutureBoard,
    today: NaiveDate,
) -> Result<Vec<SpreadCandidate>> {
    let mut pool: Vec<SpreadCandidate> = Vec::new();

    for (expiration, quotes) in price_grid {
        let Some(future) = future_prices.get(expiration) else {
            debug!(%expiration, "no future quote for expiration, skipping");
            continue;
        };

        let days_to_expiration = days_to_expiration(expiration, today)?;

        // Strike-ascending order makes pair enumeration and tie-break order
        // deterministic.
        let mut sorted: Vec<&OptionQuote> = quotes.iter().collect();
        sorted.sort_by(|a, b| a.strike.partial_cmp(&b.strike).unwrap_or(Ordering::Equal));

        for (i, sell) in sorted.iter().enumerate() {
            if sell.mid_price <= 0.0
                || (sell.strike - future.mid_price).abs() > SELL_STRIKE_PROXIMITY
            {
                continue;
            }

            for buy in &sorted[i + 1..] {
                if buy.strike <= sell.strike || buy.mid_price <= 0.0 {
                    continue;
                }

                // The strategy requires paying a net debit for the spread.
                let net_debit = buy.mid_price - sell.mid_price;
                if net_debit <= 0.0 {
                    continue;
                }

                let m = metrics::compute(
                    sell.strike,
                    buy.strike,
                    net_debit,
                    future.mid_price,
                    days_to_expiration,
                    CONTRACT_MULTIPLIER,
                );

                if !filters::passes(&m, buy.strike - sell.strike) {
                    continue;
                }

                pool.push(SpreadCandidate {
                    id: format!("{expiration}-{}-{}", sell.strike, buy.strike),
                    expiration: expiration.clone(),
                    days_to_expiration,
                    sell_strike: sell.strike,
                    buy_strike: buy.strike,
                    sell_price: sell.mid_price,
                    buy_price: buy.mid_price,
                    net_debit,
                    future_price: future.mid_price,
                    quantity: CONTRACT_MULTIPLIER,
                    metrics: m,
                });
            }
        }
    }

    // Stable sort: equal scores keep generation order.
    pool.sort_by(|a, b| {
        b.metrics
            .time_adjusted_score
            .partial_cmp(&a.metrics.time_adjusted_score)
            .unwrap_or(Ordering::Equal)
    });
    pool.truncate(MAX_RESULTS);

    Ok(pool)
}

/// Calendar days from `today` to the expiration date. Negative or zero is
/// permitted; downstream scoring penalizes rather than rejects it.
pub fn days_to_expiration(code: &str, today: NaiveDate) -> Result<i64> {
    let date = parse_expiration(code)?;
    Ok((date - today).num_days())
}

/// Parse an 8-digit `YYYYMMDD` expiration code as a pure calendar date.
pub fn parse_expiration(code: &str) -> Result<NaiveDate> {
    if code.len() != 8 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidExpiration(format!(
            "expected 8-digit YYYYMMDD, got '{code}'"
        )));
    }
    NaiveDate::parse_from_str(code, "%Y%m%d")
        .map_err(|e| Error::InvalidExpiration(format!("'{code}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::FutureQuote;

    fn quote(expiration: &str, strike: f64, mid: f64) -> OptionQuote {
        OptionQuote {
            expiration: expiration.to_string(),
            strike,
            bid: mid - 0.02,
            ask: mid + 0.02,
            mid_price: mid,
            last_price: mid,
            volume: None,
            greeks: None,
        }
    }

    fn future(expiration: &str, mid: f64) -> FutureQuote {
        FutureQuote {
            expiration: expiration.to_string(),
            symbol: "CL".to_string(),
            bid: mid - 0.01,
            ask: mid + 0.01,
            mid_price: mid,
            last_price: mid,
            volume: None,
        }
    }

    fn expiration_code(today: NaiveDate, days_out: i64) -> String {
        (today + Duration::days(days_out)).format("%Y%m%d").to_string()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()
    }

    /// Single-expiration fixture: future at 20, sell anchor at strike 20,
    /// viable buys at 22 and 25, 100 days out.
    fn fixture() -> (PriceGrid, FutureBoard) {
        let exp = expiration_code(today(), 100);
        let mut grid = PriceGrid::new();
        grid.insert(
            exp.clone(),
            vec![
                quote(&exp, 18.0, 0.20),
                quote(&exp, 20.0, 0.80),
                quote(&exp, 22.0, 1.10),
                quote(&exp, 25.0, 1.60),
            ],
        );
        let mut futures = FutureBoard::new();
        futures.insert(exp.clone(), future(&exp, 20.0));
        (grid, futures)
    }

    #[test]
    fn fixture_reproduces_exact_profit_and_loss() {
        let (grid, futures) = fixture();
        let out = recommend(&grid, &futures, today()).unwrap();

        // Strike 18 is too far from the future (2.0 > 1.5) to sell; 20 is
        // the only anchor, paired with 22 and 25.
        assert_eq!(out.len(), 2);

        let pair = out
            .iter()
            .find(|c| c.sell_strike == 20.0 && c.buy_strike == 22.0)
            .expect("(20,22) candidate missing");
        assert!((pair.net_debit - 0.30).abs() < 1e-9);
        assert!((pair.metrics.max_profit - 170.0).abs() < 1e-9);
        assert!((pair.metrics.max_loss - 30.0).abs() < 1e-9);
        assert_eq!(pair.days_to_expiration, 100);
        assert_eq!(pair.quantity, CONTRACT_MULTIPLIER);
    }

    #[test]
    fn output_invariants_hold() {
        let (grid, futures) = fixture();
        let out = recommend(&grid, &futures, today()).unwrap();
        for c in &out {
            assert!(c.sell_strike < c.buy_strike);
            assert!(c.net_debit > 0.0);
            assert!((c.metrics.max_loss - c.net_debit * c.quantity as f64).abs() < 1e-9);
            assert!(
                (c.metrics.max_profit
                    - (c.buy_strike - c.sell_strike - c.net_debit) * c.quantity as f64)
                    .abs()
                    < 1e-9
            );
        }
    }

    #[test]
    fn negative_debit_pairs_are_skipped() {
        let exp = expiration_code(today(), 100);
        let mut grid = PriceGrid::new();
        // Higher strike is cheaper: netDebit would be negative for (20,22)
        grid.insert(
            exp.clone(),
            vec![quote(&exp, 20.0, 0.80), quote(&exp, 22.0, 0.40)],
        );
        let mut futures = FutureBoard::new();
        futures.insert(exp.clone(), future(&exp, 20.0));

        let out = recommend(&grid, &futures, today()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn zero_mid_quotes_are_ignored_on_both_legs() {
        let exp = expiration_code(today(), 100);
        let mut grid = PriceGrid::new();
        grid.insert(
            exp.clone(),
            vec![
                quote(&exp, 20.0, 0.0),  // dead sell anchor
                quote(&exp, 21.0, 0.80), // live sell anchor (within 1.5)
                quote(&exp, 22.0, 0.0),  // dead buy leg
                quote(&exp, 23.0, 1.10),
            ],
        );
        let mut futures = FutureBoard::new();
        futures.insert(exp.clone(), future(&exp, 20.0));

        let out = recommend(&grid, &futures, today()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].sell_strike, 21.0);
        assert_eq!(out[0].buy_strike, 23.0);
    }

    #[test]
    fn expirations_without_future_quote_are_skipped() {
        let (mut grid, futures) = fixture();
        let orphan = expiration_code(today(), 200);
        grid.insert(orphan.clone(), vec![quote(&orphan, 20.0, 0.80)]);

        let out = recommend(&grid, &futures, today()).unwrap();
        assert!(out.iter().all(|c| c.expiration != orphan));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn malformed_expiration_code_fails_fast() {
        let mut grid = PriceGrid::new();
        grid.insert("2025-04".to_string(), vec![quote("2025-04", 20.0, 0.80)]);
        let mut futures = FutureBoard::new();
        futures.insert("2025-04".to_string(), future("2025-04", 20.0));

        let err = recommend(&grid, &futures, today()).unwrap_err();
        assert!(matches!(err, Error::InvalidExpiration(_)), "got {err:?}");
    }

    #[test]
    fn impossible_calendar_date_fails_fast() {
        assert!(matches!(
            parse_expiration("20251332"),
            Err(Error::InvalidExpiration(_))
        ));
        assert!(parse_expiration("20250412").is_ok());
    }

    #[test]
    fn empty_inputs_yield_empty_output() {
        let out = recommend(&PriceGrid::new(), &FutureBoard::new(), today()).unwrap();
        assert!(out.is_empty());

        // Grid with no matching future expirations
        let exp = expiration_code(today(), 100);
        let mut grid = PriceGrid::new();
        grid.insert(exp.clone(), vec![quote(&exp, 20.0, 0.80)]);
        let out = recommend(&grid, &FutureBoard::new(), today()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn output_is_sorted_and_ranks_tighter_spread_first() {
        let (grid, futures) = fixture();
        let out = recommend(&grid, &futures, today()).unwrap();

        for w in out.windows(2) {
            assert!(
                w[0].metrics.time_adjusted_score >= w[1].metrics.time_adjusted_score,
                "output not sorted by score"
            );
        }
        // Both pairs cap quarterly return and share the timing bonus; the
        // (20,22) pair has the better risk-adjusted expectation.
        assert_eq!(out[0].buy_strike, 22.0);
    }

    #[test]
    fn output_truncates_to_max_results() {
        let exp = expiration_code(today(), 100);
        // Dense grid around the anchor: strikes 0.1 apart, premiums rising
        // with strike so every pair is a debit.
        let mut quotes = Vec::new();
        for i in 0..30 {
            quotes.push(quote(&exp, 19.0 + i as f64 * 0.1, 0.50 + i as f64 * 0.05));
        }
        for i in 0..60 {
            quotes.push(quote(&exp, 22.0 + i as f64 * 0.1, 2.00 + i as f64 * 0.05));
        }
        let mut grid = PriceGrid::new();
        grid.insert(exp.clone(), quotes);
        let mut futures = FutureBoard::new();
        futures.insert(exp.clone(), future(&exp, 20.0));

        let out = recommend(&grid, &futures, today()).unwrap();
        assert!(out.len() <= MAX_RESULTS);
        assert_eq!(out.len(), MAX_RESULTS);
    }

    #[test]
    fn engine_is_deterministic_across_calls() {
        let (grid, futures) = fixture();
        let a = recommend(&grid, &futures, today()).unwrap();
        let b = recommend(&grid, &futures, today()).unwrap();
        let ids_a: Vec<&str> = a.iter().map(|c| c.id.as_str()).collect();
        let ids_b: Vec<&str> = b.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids_a, ids_b);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.metrics, y.metrics);
        }
    }

    #[test]
    fn candidates_pool_across_expirations() {
        let near = expiration_code(today(), 100);
        let far = expiration_code(today(), 110);
        let mut grid = PriceGrid::new();
        grid.insert(
            near.clone(),
            vec![quote(&near, 20.0, 0.80), quote(&near, 22.0, 1.10)],
        );
        grid.insert(
            far.clone(),
            vec![quote(&far, 20.0, 0.90), quote(&far, 22.0, 1.30)],
        );
        let mut futures = FutureBoard::new();
        futures.insert(near.clone(), future(&near, 20.0));
        futures.insert(far.clone(), future(&far, 20.0));

        let out = recommend(&grid, &futures, today()).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().any(|c| c.expiration == near));
        assert!(out.iter().any(|c| c.expiration == far));
    }
}

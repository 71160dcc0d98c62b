//! Synthetic pricing engine.
//!
//! Scales the ETF's anchor close by the relative move of gold and of the
//! FX rate since the anchor instant:
//!
//! ```text
//! synthetic = etf_ref * (gold_now / gold_ref) * (fx_now / fx_ref)
//! ```
//!
//! Pure and allocation-free, so it runs on every tick and can be shared
//! across threads with the same immutable anchor.

use crate::types::{AnchorSet, EngineResult};

/// Price the ETF from the live drivers.
///
/// A zero gold or FX reference only occurs as a degenerate fallback; the
/// synthetic price then collapses to the static anchor instead of `NaN`/`Inf`.
pub fn calculate(anchor: &AnchorSet, gold_now: f64, fx_now: f64) -> EngineResult {
    if anchor.gold_ref() == 0.0 || anchor.fx_ref() == 0.0 {
        return EngineResult {
            synthetic_price: anchor.etf_ref(),
            gold_return: 0.0,
            fx_return: 0.0,
        };
    }

    let gold_ratio = gold_now / anchor.gold_ref();
    let fx_ratio = fx_now / anchor.fx_ref();

    EngineResult {
        synthetic_price: anchor.etf_ref() * gold_ratio * fx_ratio,
        gold_return: gold_ratio - 1.0,
        fx_return: fx_ratio - 1.0,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

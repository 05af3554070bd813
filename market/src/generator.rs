//! Synthetic quote generation.
//!
//! Catalog instruments get a quote perturbed around their base values with the
//! price clamped into the cycle's 52-week band, and `change`/`change_percent`
//! recomputed from the clamped price. Instruments outside the catalog
//! ("generic") get independently drawn fields from fixed ranges.

use crate::random::RandomSource;
use crate::types::{InstrumentDefinition, Quote, round2};

/// Max relative perturbation applied to 52-week bases and to the price.
const PERTURBATION: f64 = 0.01;
const MIN_PRICE: f64 = 0.01;
const VOLUME_LOT: f64 = 100_000.0;
const VOLUME_LOTS_MIN: u64 = 10;
const VOLUME_LOTS_SPAN: u64 = 50;

/// Turns instrument definitions into quotes using an injected random source.
pub struct QuoteGenerator<R: RandomSource> {
    rng: R,
}

impl<R: RandomSource> QuoteGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Quote for a catalog instrument.
    ///
    /// Guarantees `fifty_two_week_low <= price <= fifty_two_week_high` unless the
    /// perturbed bounds cross, in which case the low bound wins.
    pub fn generate(&mut self, def: &InstrumentDefinition) -> Quote {
        let high = round2(def.fifty_two_week_high_base * (1.0 + self.symmetric(PERTURBATION)));
        let low = round2(def.fifty_two_week_low_base * (1.0 + self.symmetric(PERTURBATION)));

        let delta = self.symmetric(1.0) * def.base_price * PERTURBATION;
        let candidate = (def.base_price + delta).max(MIN_PRICE);

        // high clamp first, then low: low takes precedence on inverted bounds
        let price = round2(candidate.min(high).max(low));

        let raw_change = price - def.base_price;
        let change = round2(raw_change);
        let change_percent = round2(raw_change / def.base_price * 100.0);

        let volume = self.volume(def.volume_factor);

        Quote {
            id: def.id.clone(),
            symbol: def.symbol.clone(),
            name: def.name.clone(),
            price,
            change,
            change_percent,
            volume,
            market_cap: def.market_cap.clone(),
            fifty_two_week_high: high,
            fifty_two_week_low: low,
        }
    }

    /// Quote for a symbol outside the catalog.
    ///
    /// Each field is bounded on its own; no cross-field consistency is implied.
    pub fn generate_generic(&mut self, symbol: &str) -> Quote {
        let symbol = symbol.trim().to_uppercase();
        let id = ((self.rng.next_uniform() * 1_000_000.0).floor() as u64).to_string();

        let price = round2(self.between(100.0, 200.0));
        let change = round2(self.between(-2.5, 2.5));
        let change_percent = round2(self.between(-0.5, 0.5));
        let volume = self.volume(1.0);
        let market_cap = format!("{}B", self.between(10.0, 110.0).round() as u64);
        let high = round2(self.between(200.0, 300.0));
        let low = round2(self.between(50.0, 100.0));

        Quote {
            id,
            name: format!("{symbol} ETF (Generic Mock)"),
            symbol,
            price,
            change,
            change_percent,
            volume,
            market_cap,
            fifty_two_week_high: high,
            fifty_two_week_low: low,
        }
    }

    /// Uniform draw in `[-span, span)`.
    fn symmetric(&mut self, span: f64) -> f64 {
        (self.rng.next_uniform() * 2.0 - 1.0) * span
    }

    fn between(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.rng.next_uniform() * (hi - lo)
    }

    fn volume(&mut self, factor: f64) -> u64 {
        let lots = (self.rng.next_uniform() * VOLUME_LOTS_SPAN as f64).floor() as u64;
        let lots = VOLUME_LOTS_MIN + lots.min(VOLUME_LOTS_SPAN - 1);
        (lots as f64 * VOLUME_LOT * factor).floor() as u64
    }
}

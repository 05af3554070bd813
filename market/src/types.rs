use serde::{Deserialize, Serialize};

/// Static seed data for a catalog instrument.
///
/// Loaded once at start and never mutated; every refresh cycle derives a
/// fresh [`Quote`] from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentDefinition {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub base_price: f64,
    pub volume_factor: f64,
    pub fifty_two_week_high_base: f64,
    pub fifty_two_week_low_base: f64,
    /// Display string, e.g. `"100B"`.
    pub market_cap: String,
}

/// One refresh cycle's synthetic snapshot for an instrument.
///
/// The serialized form is the entry encoding shared by both storage tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: u64,
    pub market_cap: String,
    pub fifty_two_week_high: f64,
    pub fifty_two_week_low: f64,
}

/// Rounds to two decimal places (half away from zero).
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round2_is_idempotent() {
        for v in [0.0, 0.01, 12.345, -2.499, 249.995, 1e6 / 3.0] {
            let once = round2(v);
            assert_eq!(round2(once), once);
        }
    }

    #[test]
    fn quote_uses_camel_case_field_names() {
        let q = Quote {
            id: "NSE001".into(),
            symbol: "NIFTYBEES".into(),
            name: "Nippon India ETF Nifty BeES".into(),
            price: 251.2,
            change: 1.2,
            change_percent: 0.48,
            volume: 1_500_000,
            market_cap: "100B".into(),
            fifty_two_week_high: 259.1,
            fifty_two_week_low: 201.3,
        };

        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json["changePercent"], 0.48);
        assert_eq!(json["fiftyTwoWeekHigh"], 259.1);
        assert_eq!(json["marketCap"], "100B");
    }
}

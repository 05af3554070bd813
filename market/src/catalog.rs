//! Seed catalog of instruments users can reference by symbol.

use std::collections::HashSet;
use std::path::Path;

use thiserror::Error;

use crate::types::InstrumentDefinition;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid catalog json: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate symbol in catalog: {0}")]
    DuplicateSymbol(String),

    #[error("invalid instrument {symbol}: {reason}")]
    InvalidInstrument { symbol: String, reason: String },
}

/// Fixed, ordered sequence of instrument definitions.
#[derive(Debug, Clone)]
pub struct Catalog {
    instruments: Vec<InstrumentDefinition>,
}

impl Catalog {
    /// Builds a catalog, normalizing symbols to upper case and rejecting duplicates.
    pub fn new(instruments: Vec<InstrumentDefinition>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        let mut normalized = Vec::with_capacity(instruments.len());

        for mut def in instruments {
            def.symbol = def.symbol.trim().to_uppercase();

            if def.symbol.is_empty() {
                return Err(CatalogError::InvalidInstrument {
                    symbol: def.id.clone(),
                    reason: "empty symbol".into(),
                });
            }
            if def.base_price <= 0.0 || def.volume_factor <= 0.0 {
                return Err(CatalogError::InvalidInstrument {
                    symbol: def.symbol.clone(),
                    reason: "base price and volume factor must be positive".into(),
                });
            }
            if !seen.insert(def.symbol.clone()) {
                return Err(CatalogError::DuplicateSymbol(def.symbol));
            }

            normalized.push(def);
        }

        Ok(Self {
            instruments: normalized,
        })
    }

    /// Loads a catalog from a JSON array of instrument definitions.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let defs: Vec<InstrumentDefinition> = serde_json::from_str(&raw)?;
        let catalog = Self::new(defs)?;

        tracing::info!(
            path = %path.as_ref().display(),
            instruments = catalog.len(),
            "catalog loaded from file"
        );
        Ok(catalog)
    }

    /// The reference deployment's Indian ETF set.
    pub fn reference() -> Self {
        let defs = vec![
            etf("NSE001", "NIFTYBEES", "Nippon India ETF Nifty BeES", 250.00, 1.5, "100B", 260.00, 200.00),
            etf("NSE002", "BANKBEES", "Nippon India ETF Bank BeES", 500.00, 0.8, "80B", 550.00, 420.00),
            etf("NSE003", "MON100", "Motilal Oswal Nasdaq 100 ETF", 150.00, 0.5, "60B", 165.00, 120.00),
            etf("NSE004", "GOLDHALF", "Nippon India ETF Gold BeES", 48.00, 0.2, "20B", 52.00, 40.00),
            etf("NSE005", "NX50ETF", "ICICI Prudential Nifty Next 50 ETF", 70.00, 0.3, "30B", 75.00, 60.00),
        ];

        Self { instruments: defs }
    }

    /// Case-insensitive lookup by symbol.
    pub fn find(&self, symbol: &str) -> Option<&InstrumentDefinition> {
        let wanted = symbol.trim();
        self.instruments
            .iter()
            .find(|d| d.symbol.eq_ignore_ascii_case(wanted))
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstrumentDefinition> {
        self.instruments.iter()
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}

#[allow(clippy::too_many_arguments)]
fn etf(
    id: &str,
    symbol: &str,
    name: &str,
    base_price: f64,
    volume_factor: f64,
    market_cap: &str,
    high_base: f64,
    low_base: f64,
) -> InstrumentDefinition {
    InstrumentDefinition {
        id: id.into(),
        symbol: symbol.into(),
        name: name.into(),
        base_price,
        volume_factor,
        fifty_two_week_high_base: high_base,
        fifty_two_week_low_base: low_base,
        market_cap: market_cap.into(),
    }
}

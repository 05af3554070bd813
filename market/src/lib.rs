pub mod catalog;
pub mod generator;
pub mod random;
pub mod snapshot;
pub mod types;

pub use catalog::{Catalog, CatalogError};
pub use generator::QuoteGenerator;
pub use random::{EntropyRandom, RandomSource, ScriptedRandom};
pub use snapshot::{MarketSnapshot, analyze};
pub use types::{InstrumentDefinition, Quote};

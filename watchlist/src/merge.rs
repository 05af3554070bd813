//! Merge-by-symbol of freshly generated catalog quotes into a watchlist.

use market::Quote;

use crate::model::WatchlistEntry;

/// Whether a refresh may grow the watchlist.
///
/// Only the initial population after an identity transition offers catalog
/// instruments the user is not yet tracking; steady refreshes never add.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    InitialPopulation,
    Steady,
}

/// Overwrites every tracked entry whose symbol has a fresh catalog quote,
/// passes other entries through untouched, and (initial population only)
/// appends catalog quotes for symbols not yet present, in catalog order.
pub fn merge_quotes(
    entries: &[WatchlistEntry],
    fresh: &[Quote],
    mode: RefreshMode,
) -> Vec<WatchlistEntry> {
    let mut merged: Vec<WatchlistEntry> = entries
        .iter()
        .map(|entry| {
            fresh
                .iter()
                .find(|q| q.symbol.eq_ignore_ascii_case(&entry.symbol))
                .cloned()
                .unwrap_or_else(|| entry.clone())
        })
        .collect();

    if mode == RefreshMode::InitialPopulation {
        let additions: Vec<WatchlistEntry> = fresh
            .iter()
            .filter(|q| {
                !merged
                    .iter()
                    .any(|e| e.symbol.eq_ignore_ascii_case(&q.symbol))
            })
            .cloned()
            .collect();
        merged.extend(additions);
    }

    merged
}

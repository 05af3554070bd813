use crate::types::Quote;

/// Top gainer / top loser of the current watchlist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketSnapshot {
    pub gainer: Option<Quote>,
    pub loser: Option<Quote>,
}

/// Single linear scan over `entries` by `change_percent`.
///
/// Strict comparisons: on ties the earliest entry in input order is kept.
pub fn analyze(entries: &[Quote]) -> MarketSnapshot {
    let Some(first) = entries.first() else {
        return MarketSnapshot::default();
    };

    let mut gainer = first;
    let mut loser = first;

    for q in entries {
        if q.change_percent > gainer.change_percent {
            gainer = q;
        }
        if q.change_percent < loser.change_percent {
            loser = q;
        }
    }

    MarketSnapshot {
        gainer: Some(gainer.clone()),
        loser: Some(loser.clone()),
    }
}

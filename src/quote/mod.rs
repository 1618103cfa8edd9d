//! # Quote Sources
//!
//! A quote source answers one question: how many units of `to` does one unit of
//! `from` buy at `timestamp`, looking back over `time_span` seconds.
//! Graph construction calls it O(A²) times per step, so implementations must be
//! cheap and thread safe.

/// Fixed-table and historical-replay quotes
pub mod table;

pub use table::TableQuotes;

use crate::arb::asset::Asset;

/// Capability supplying exchange rates.
///
/// Returning `None` means no quote is known for the pair at that time. Callers
/// treat that, and any non-finite or non-positive rate, as a gap and skip the leg.
pub trait QuoteSource: Send + Sync {
    /// Rate for converting one unit of `from` into `to`
    fn quote(&self, timestamp: i64, from: &Asset, to: &Asset, time_span: i64) -> Option<f64>;
}

impl<Q: QuoteSource + ?Sized> QuoteSource for std::sync::Arc<Q> {
    fn quote(&self, timestamp: i64, from: &Asset, to: &Asset, time_span: i64) -> Option<f64> {
        (**self).quote(timestamp, from, to, time_span)
    }
}

impl<Q: QuoteSource + ?Sized> QuoteSource for &Q {
    fn quote(&self, timestamp: i64, from: &Asset, to: &Asset, time_span: i64) -> Option<f64> {
        (**self).quote(timestamp, from, to, time_span)
    }
}

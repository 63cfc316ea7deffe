//! Comparison dispatch: one external comparator run per married entry.

pub mod comparator;
pub mod dispatcher;

//! Recognition results: interim glosses and final sentences

mod aggregator;

pub use aggregator::{RecognitionEntry, RecognitionKind, ResultAggregator};

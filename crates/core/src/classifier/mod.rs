//! Release title classification and candidate scoring.
//!
//! Quality, season and episode information is always derived from the release
//! title on demand, never stored alongside the candidate.

mod parse;
mod scoring;

pub use parse::{episodes, quality, seasons, Quality};
pub use scoring::{
    compare, rank, score_and_filter, LibraryTarget, ScoringRule, ScoringRuleSet, ALL_MOVIES,
    ALL_TV,
};

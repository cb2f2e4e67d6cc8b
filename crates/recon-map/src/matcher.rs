//! Best-candidate selection and result classification.

use recon_model::{MappingStatus, MatchStrategy};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::score::score;

pub const DEFAULT_MATCH_THRESHOLD: u8 = 80;
const PERFECT_SCORE: f64 = 100.0;
/// Slack for scaled scores such as `0.95 * 80.0` landing a hair under a whole threshold.
const CUTOFF_TOLERANCE: f64 = 1e-9;

/// Matcher settings, validated once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Minimum accepted score in `0..=100`.
    pub match_threshold: u8,
    pub match_strategy: MatchStrategy,
    /// Reject every non-perfect score, even above the threshold.
    pub exact_match_only: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            match_strategy: MatchStrategy::default(),
            exact_match_only: false,
        }
    }
}

impl MatcherConfig {
    /// Build a config, clamping the threshold into `0..=100`.
    pub fn new(threshold: i64, strategy: MatchStrategy, exact_match_only: bool) -> Self {
        Self {
            match_threshold: clamp_threshold(threshold),
            match_strategy: strategy,
            exact_match_only,
        }
    }

    /// Build a config from raw configuration values.
    ///
    /// The strategy name is resolved here so that an unknown scorer fails
    /// the run before any unit is processed.
    pub fn from_raw(
        threshold: i64,
        strategy: &str,
        exact_match_only: bool,
    ) -> Result<Self, ConfigError> {
        let strategy: MatchStrategy = strategy.parse()?;
        Ok(Self::new(threshold, strategy, exact_match_only))
    }

    /// Find and classify the best physical column for a documented name.
    pub fn evaluate<S: AsRef<str>>(&self, documented_name: &str, candidates: &[S]) -> MatchOutcome {
        let best = extract_one(
            documented_name,
            candidates,
            self.match_strategy,
            f64::from(self.match_threshold),
        );
        classify(best, self.exact_match_only)
    }
}

fn clamp_threshold(threshold: i64) -> u8 {
    let clamped = threshold.clamp(0, 100);
    if clamped != threshold {
        tracing::warn!(threshold, clamped, "match threshold out of range, clamped");
    }
    u8::try_from(clamped).unwrap_or(DEFAULT_MATCH_THRESHOLD)
}

/// Best-scoring candidate returned by [`extract_one`].
#[derive(Debug, Clone, PartialEq)]
pub struct BestMatch {
    /// Candidate as given (upper-cased).
    pub candidate: String,
    pub score: f64,
    /// Position in the candidate list.
    pub index: usize,
}

/// Pick the best candidate scoring at least `cutoff`.
///
/// Query and candidates are upper-cased before scoring. A candidate equal to
/// the query is always chosen with a perfect score. Otherwise the highest
/// score wins and ties go to the earliest candidate in list order.
pub fn extract_one<S: AsRef<str>>(
    query: &str,
    candidates: &[S],
    strategy: MatchStrategy,
    cutoff: f64,
) -> Option<BestMatch> {
    let query = query.trim().to_uppercase();
    if query.is_empty() {
        return None;
    }

    let upper: Vec<String> = candidates
        .iter()
        .map(|c| c.as_ref().trim().to_uppercase())
        .collect();

    if let Some(index) = upper.iter().position(|c| *c == query) {
        return Some(BestMatch {
            candidate: upper[index].clone(),
            score: PERFECT_SCORE,
            index,
        });
    }

    let mut best: Option<BestMatch> = None;
    for (index, candidate) in upper.into_iter().enumerate() {
        let current = score(strategy, &query, &candidate);
        if current + CUTOFF_TOLERANCE < cutoff {
            continue;
        }
        if best.as_ref().is_none_or(|b| current > b.score) {
            best = Some(BestMatch {
                candidate,
                score: current,
                index,
            });
        }
    }
    best
}

/// Classified result of matching one documented column.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub status: MappingStatus,
    pub matched_column: Option<String>,
    pub score: Option<f64>,
}

/// Map a best match onto a mapping status.
pub fn classify(best: Option<BestMatch>, exact_match_only: bool) -> MatchOutcome {
    let Some(best) = best else {
        return MatchOutcome {
            status: MappingStatus::UnmappedLowScore,
            matched_column: None,
            score: None,
        };
    };

    let status = if best.score >= PERFECT_SCORE {
        MappingStatus::MappedExact
    } else if exact_match_only {
        MappingStatus::UnmappedNotExact
    } else {
        MappingStatus::MappedFuzzy
    };

    MatchOutcome {
        status,
        matched_column: Some(best.candidate),
        score: Some(best.score),
    }
}

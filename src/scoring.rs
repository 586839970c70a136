//! Scoring normalization: maps raw, scoring-type-specific metrics onto a
//! single "higher is better" axis so the ranking side never has to know what
//! kind of metric a tournament uses.

use crate::utils::format_hms;
use enum_iterator::Sequence;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// fallback elapsed-time ceiling (24h) for tournaments that never declare one
pub const DEFAULT_TIME_CEILING_SECS: u32 = 60 * 60 * 24;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Sequence)]
pub enum ScoringType {
    Score,
    Time,
    Distance,
    Placement,
    Rounds,
}

/// One submitted raw outcome, typed per scoring type.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum RawMetric {
    Score(f64),
    Time { seconds: u32 },
    Distance(f64),
    Placement(u32),
    Rounds { won: u32, deciding_round: Option<u32> },
}

impl RawMetric {
    fn kind(&self) -> &'static str {
        match self {
            RawMetric::Score(_) => "score",
            RawMetric::Time { .. } => "time",
            RawMetric::Distance(_) => "distance",
            RawMetric::Placement(_) => "placement",
            RawMetric::Rounds { .. } => "rounds",
        }
    }

    /// the round in which a Rounds metric was decided, if declared
    pub fn deciding_round(&self) -> Option<u32> {
        match self {
            RawMetric::Rounds { deciding_round, .. } => *deciding_round,
            _ => None,
        }
    }
}

impl Display for RawMetric {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RawMetric::Score(v) => write!(f, "{v}"),
            RawMetric::Time { seconds } => write!(f, "{}", format_hms(*seconds as u64)),
            RawMetric::Distance(v) => write!(f, "{v}m"),
            RawMetric::Placement(p) => write!(f, "#{p}"),
            RawMetric::Rounds { won, .. } => write!(f, "{won} rounds"),
        }
    }
}

/// Per-tournament scoring knobs. `distance_target` being set *is* the
/// declaration of the closest-to-target distance variant.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoringParams {
    pub time_ceiling_secs: Option<u32>,
    pub distance_target: Option<f64>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ScoreValidationError {
    #[error("Expected a {expected:?} metric for this tournament, got a {got} metric")]
    WrongMetricType {
        expected: ScoringType,
        got: &'static str,
    },
    #[error("Score values must be finite")]
    NonFiniteValue,
    #[error("Elapsed time {seconds}s exceeds the tournament ceiling of {ceiling}s")]
    TimeAboveCeiling { seconds: u32, ceiling: u32 },
    #[error("Placement must be 1 or greater")]
    PlacementOutOfRange,
    #[error("Deciding round must be 1 or greater")]
    DecidingRoundOutOfRange,
}

/// Pure function of (scoring type, raw metric, declared params) -> normalized
/// score where higher always means better. It never looks at participant
/// identity or other results, so results normalize independently and in any
/// order.
pub fn normalize(
    scoring_type: ScoringType,
    metric: &RawMetric,
    params: &ScoringParams,
) -> Result<f64, ScoreValidationError> {
    match (scoring_type, metric) {
        (ScoringType::Score, RawMetric::Score(v)) => {
            if !v.is_finite() {
                return Err(ScoreValidationError::NonFiniteValue);
            }
            Ok(*v)
        }
        (ScoringType::Time, RawMetric::Time { seconds }) => {
            let ceiling = params.time_ceiling_secs.unwrap_or(DEFAULT_TIME_CEILING_SECS);
            if *seconds > ceiling {
                return Err(ScoreValidationError::TimeAboveCeiling {
                    seconds: *seconds,
                    ceiling,
                });
            }
            // lower time -> higher normalized score
            Ok(f64::from(ceiling) - f64::from(*seconds))
        }
        (ScoringType::Distance, RawMetric::Distance(v)) => {
            if !v.is_finite() {
                return Err(ScoreValidationError::NonFiniteValue);
            }
            match params.distance_target {
                // closest-to-target variant: smaller deviation is better
                Some(target) => Ok(-(v - target).abs()),
                None => Ok(*v),
            }
        }
        (ScoringType::Placement, RawMetric::Placement(p)) => {
            if *p == 0 {
                return Err(ScoreValidationError::PlacementOutOfRange);
            }
            Ok(-f64::from(*p))
        }
        (
            ScoringType::Rounds,
            RawMetric::Rounds {
                won,
                deciding_round,
            },
        ) => {
            if deciding_round.map_or(false, |r| r == 0) {
                return Err(ScoreValidationError::DecidingRoundOutOfRange);
            }
            Ok(f64::from(*won))
        }
        (expected, metric) => Err(ScoreValidationError::WrongMetricType {
            expected,
            got: metric.kind(),
        }),
    }
}

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::rules::{self, RuleFn};
use crate::error::CombinationError;

/// Closed set of rules available to a [`super::Combiner`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinationRule {
    /// Class with the most (possibly weighted) votes.
    #[default]
    MajorityVote,
    /// Class with the highest single classifier score.
    Max,
    /// Class whose worst classifier score is the best.
    Min,
    /// Class with the highest classifier-averaged score.
    Mean,
    /// Class with the highest classifier-median score.
    Median,
}

impl CombinationRule {
    /// Every rule, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::MajorityVote,
        Self::Max,
        Self::Min,
        Self::Mean,
        Self::Median,
    ];

    /// Canonical rule name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MajorityVote => "majority_vote",
            Self::Max => "max",
            Self::Min => "min",
            Self::Mean => "mean",
            Self::Median => "median",
        }
    }

    /// Whether per-classifier weights are applied for this rule.
    #[must_use]
    pub const fn supports_weights(self) -> bool {
        matches!(self, Self::MajorityVote | Self::Mean)
    }

    pub(crate) fn rule_fn(self) -> RuleFn {
        match self {
            Self::MajorityVote => rules::majority_vote_rule,
            Self::Max => rules::max_rule,
            Self::Min => rules::min_rule,
            Self::Mean => rules::mean_rule,
            Self::Median => rules::median_rule,
        }
    }
}

impl fmt::Display for CombinationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CombinationRule {
    type Err = CombinationError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|rule| rule.as_str() == name)
            .ok_or_else(|| CombinationError::InvalidArgument { rule: name.into() })
    }
}

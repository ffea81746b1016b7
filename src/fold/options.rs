use serde::{Deserialize, Serialize};

/// How two records sharing a slot and an effective timestamp are ordered.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// The record with the higher arrival sequence wins.
    #[default]
    LastArrivalWins,
    /// The record with the lower arrival sequence wins.
    FirstArrivalWins,
}

/// Which callers an active hide applies to.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HideAudience {
    /// Callers that do not satisfy the hide label see the target hidden.
    #[default]
    NonHolders,
    /// Callers that satisfy the hide label see the target hidden.
    Holders,
}

impl HideAudience {
    /// Returns whether a hide applies given the caller's verdict on its label.
    pub fn applies(self, satisfies_label: bool) -> bool {
        match self {
            HideAudience::NonHolders => !satisfies_label,
            HideAudience::Holders => satisfies_label,
        }
    }
}

/// Configuration for a [`super::FoldEngine`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoldOptions {
    /// Same-timestamp ordering policy.
    pub tie_break: TieBreak,
    /// Audience selection for hides.
    pub hide_audience: HideAudience,
    /// Keep hidden properties and edges in the folded state, flagged.
    pub include_hidden: bool,
    /// Memoize label verdicts for the duration of one fold call.
    pub memoize_labels: bool,
}

impl Default for FoldOptions {
    fn default() -> Self {
        Self {
            tie_break: TieBreak::default(),
            hide_audience: HideAudience::default(),
            include_hidden: false,
            memoize_labels: true,
        }
    }
}

impl FoldOptions {
    /// Creates options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the same-timestamp ordering policy.
    pub fn tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Sets which callers hides apply to.
    pub fn hide_audience(mut self, audience: HideAudience) -> Self {
        self.hide_audience = audience;
        self
    }

    /// Keeps hidden properties and edges in the output, flagged as hidden.
    pub fn include_hidden(mut self, enabled: bool) -> Self {
        self.include_hidden = enabled;
        self
    }

    /// Enables or disables per-call label memoization.
    pub fn memoize_labels(mut self, enabled: bool) -> Self {
        self.memoize_labels = enabled;
        self
    }
}

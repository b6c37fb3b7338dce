//! Page observations and the majority-vote verdict derived from them.
//!
//! An [`Observation`] is the raw output of one extraction pass over the
//! monitored page. [`fuse`] turns it into a [`Verdict`] by counting three
//! independent signals. Any single signal can misfire (stale empty-state text,
//! buttons that render late, localized labels), so one vote alone never
//! produces a confirmation.

use serde::{Deserialize, Serialize};

/// Raw signals extracted from the monitored page in a single poll.
///
/// Produced fresh each cycle and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    /// The "no new brief matches" marker was NOT found on the page.
    pub empty_state_absent: bool,
    /// Number of primary call-to-action buttons ("View brief").
    pub primary_affordance_count: usize,
    /// At least one secondary dismissal button ("Not interested") is present.
    pub secondary_affordance_present: bool,
}

impl Observation {
    /// Observation used whenever extraction or page access fails.
    ///
    /// Fuses to [`VerdictKind::None`].
    pub const NEUTRAL: Self = Self {
        empty_state_absent: false,
        primary_affordance_count: 0,
        secondary_affordance_present: false,
    };

    /// Number of the three signals that indicate briefs are present.
    #[must_use]
    pub fn votes(&self) -> u8 {
        u8::from(self.empty_state_absent)
            + u8::from(self.primary_affordance_count > 0)
            + u8::from(self.secondary_affordance_present)
    }
}

/// Confidence level of a fused verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    /// No signal indicates briefs.
    None,
    /// Exactly one signal indicates briefs.
    Potential,
    /// Two or more signals agree that briefs are present.
    Confirmed,
}

impl VerdictKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Potential => "potential",
            Self::Confirmed => "confirmed",
        }
    }
}

/// Fused conclusion about whether new briefs exist.
///
/// Invariant: `brief_count == 0` when `kind` is [`VerdictKind::None`];
/// otherwise it equals the observation's primary affordance count.
/// Construct through [`fuse`] to keep the invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    kind: VerdictKind,
    brief_count: usize,
}

impl Verdict {
    #[must_use]
    pub const fn kind(&self) -> VerdictKind {
        self.kind
    }

    #[must_use]
    pub const fn brief_count(&self) -> usize {
        self.brief_count
    }

    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self.kind, VerdictKind::None)
    }
}

/// Combine the three page signals into a verdict by majority vote.
///
/// | votes | kind        | brief_count               |
/// |-------|-------------|---------------------------|
/// | >= 2  | `Confirmed` | primary affordance count  |
/// | 1     | `Potential` | primary affordance count  |
/// | 0     | `None`      | 0                         |
#[must_use]
pub fn fuse(observation: &Observation) -> Verdict {
    match observation.votes() {
        0 => Verdict {
            kind: VerdictKind::None,
            brief_count: 0,
        },
        1 => Verdict {
            kind: VerdictKind::Potential,
            brief_count: observation.primary_affordance_count,
        },
        _ => Verdict {
            kind: VerdictKind::Confirmed,
            brief_count: observation.primary_affordance_count,
        },
    }
}

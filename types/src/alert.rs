//! User-visible alert content for a verdict.
//!
//! Throttling lives in the engine; this module only decides what an alert
//! says when one is allowed to fire.

use serde::{Deserialize, Serialize};

use crate::observation::{Verdict, VerdictKind};

/// Delivery priority passed to the notification service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertPriority {
    Normal,
    High,
}

impl AlertPriority {
    /// Numeric level understood by desktop notification hosts (1 or 2).
    #[must_use]
    pub const fn level(self) -> u8 {
        match self {
            Self::Normal => 1,
            Self::High => 2,
        }
    }
}

/// A titled, prioritized message for the notification service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub title: String,
    pub message: String,
    pub priority: AlertPriority,
}

impl Alert {
    pub const CONFIRMED_TITLE: &'static str = "New Fiverr Briefs Available!";
    pub const POTENTIAL_TITLE: &'static str = "Possible New Briefs";
    pub const POTENTIAL_MESSAGE: &'static str = "You may have some new briefs!";

    /// Build the alert for a verdict. Returns `None` for [`VerdictKind::None`].
    #[must_use]
    pub fn for_verdict(verdict: &Verdict) -> Option<Self> {
        match verdict.kind() {
            VerdictKind::None => None,
            VerdictKind::Potential => Some(Self {
                title: Self::POTENTIAL_TITLE.to_string(),
                message: Self::POTENTIAL_MESSAGE.to_string(),
                priority: AlertPriority::Normal,
            }),
            VerdictKind::Confirmed => Some(Self {
                title: Self::CONFIRMED_TITLE.to_string(),
                message: confirmed_message(verdict.brief_count()),
                priority: AlertPriority::High,
            }),
        }
    }
}

fn confirmed_message(count: usize) -> String {
    let plural = if count == 1 { "" } else { "s" };
    format!("Hurry! You have {count} new brief{plural}!")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{Observation, fuse};

    fn verdict(empty_state_absent: bool, primary: usize, secondary: bool) -> Verdict {
        fuse(&Observation {
            empty_state_absent,
            primary_affordance_count: primary,
            secondary_affordance_present: secondary,
        })
    }

    #[test]
    fn none_verdict_has_no_alert() {
        assert_eq!(Alert::for_verdict(&verdict(false, 0, false)), None);
    }

    #[test]
    fn confirmed_alert_pluralizes() {
        let alert = Alert::for_verdict(&verdict(true, 3, true)).unwrap();
        assert_eq!(alert.message, "Hurry! You have 3 new briefs!");
        assert_eq!(alert.title, Alert::CONFIRMED_TITLE);
        assert_eq!(alert.priority, AlertPriority::High);

        let single = Alert::for_verdict(&verdict(true, 1, true)).unwrap();
        assert_eq!(single.message, "Hurry! You have 1 new brief!");

        let zero = Alert::for_verdict(&verdict(true, 0, true)).unwrap();
        assert_eq!(zero.message, "Hurry! You have 0 new briefs!");
    }

    #[test]
    fn potential_alert_is_generic() {
        let alert = Alert::for_verdict(&verdict(true, 0, false)).unwrap();
        assert_eq!(alert.message, "You may have some new briefs!");
        assert_eq!(alert.priority, AlertPriority::Normal);
        assert_eq!(alert.priority.level(), 1);
    }
}

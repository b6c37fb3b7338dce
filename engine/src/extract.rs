//! DOM heuristics that turn a page snapshot into an [`Observation`].

use briefwatch_types::{Observation, SignalRules};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::services::PageSnapshot;

struct Selectors {
    empty_state: Selector,
    button: Selector,
}

/// Reads the three brief signals out of an HTML snapshot.
///
/// Never fails: a misconfigured selector yields [`Observation::NEUTRAL`].
pub struct SignalExtractor {
    rules: SignalRules,
    selectors: Result<Selectors, String>,
}

impl SignalExtractor {
    #[must_use]
    pub fn new(rules: SignalRules) -> Self {
        let selectors = compile(&rules);
        if let Err(reason) = &selectors {
            warn!(
                selector = %rules.empty_state_selector,
                "Invalid empty-state selector; observations will be neutral: {reason}"
            );
        }
        Self { rules, selectors }
    }

    #[must_use]
    pub fn extract(&self, snapshot: &PageSnapshot) -> Observation {
        let selectors = match &self.selectors {
            Ok(s) => s,
            Err(reason) => {
                warn!(url = %snapshot.url, "Skipping extraction: {reason}");
                return Observation::NEUTRAL;
            }
        };

        let document = Html::parse_document(&snapshot.html);

        let empty_state_present = document.select(&selectors.empty_state).any(|el| {
            let text = normalized_text(el);
            self.rules
                .empty_state_markers
                .iter()
                .any(|marker| text.contains(marker.as_str()))
        });

        let mut primary = 0;
        let mut secondary = false;
        for button in document.select(&selectors.button) {
            if button_has_label(button, &self.rules.primary_label) {
                primary += 1;
            }
            if button_has_label(button, &self.rules.secondary_label) {
                secondary = true;
            }
        }

        let observation = Observation {
            empty_state_absent: !empty_state_present,
            primary_affordance_count: primary,
            secondary_affordance_present: secondary,
        };
        debug!(url = %snapshot.url, ?observation, "Extracted signals");
        observation
    }
}

fn compile(rules: &SignalRules) -> Result<Selectors, String> {
    let empty_state = Selector::parse(&rules.empty_state_selector).map_err(|e| e.to_string())?;
    let button = Selector::parse("button").map_err(|e| e.to_string())?;
    Ok(Selectors {
        empty_state,
        button,
    })
}

/// Element text with whitespace runs collapsed to single spaces.
fn normalized_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn button_has_label(button: ElementRef<'_>, label: &str) -> bool {
    button
        .value()
        .attr("aria-label")
        .is_some_and(|aria| aria.contains(label))
        || normalized_text(button).contains(label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn snapshot(body: &str) -> PageSnapshot {
        PageSnapshot {
            url: "https://www.fiverr.com/briefs/overview/matches".to_string(),
            html: format!("<html><body>{body}</body></html>"),
        }
    }

    fn extract(body: &str) -> Observation {
        SignalExtractor::new(SignalRules::default()).extract(&snapshot(body))
    }

    #[test]
    fn empty_page_reports_empty_state() {
        let obs = extract("<h3>No new brief matches</h3>");
        assert_eq!(obs, Observation::NEUTRAL);
    }

    #[test]
    fn marker_split_across_nodes_is_found() {
        let obs = extract("<div class=\"briefs-empty\">No <b>briefs</b>\n available</div>");
        assert!(!obs.empty_state_absent);
    }

    #[test]
    fn counts_primary_buttons_once_each() {
        let obs = extract(
            r#"
            <button aria-label="View brief">View brief</button>
            <button><span>View brief</span></button>
            <button aria-label="View brief details">Open</button>
            <button>Not interested</button>
            <a>View brief</a>
            "#,
        );
        assert_eq!(
            obs,
            Observation {
                empty_state_absent: true,
                primary_affordance_count: 3,
                secondary_affordance_present: true,
            }
        );
    }

    #[test]
    fn marker_outside_selector_is_ignored() {
        let obs = extract("<p>No new brief matches</p>");
        assert!(obs.empty_state_absent);
    }

    #[test]
    fn invalid_selector_is_neutral() {
        let rules = SignalRules {
            empty_state_selector: "h4[".to_string(),
            ..SignalRules::default()
        };
        let obs = SignalExtractor::new(rules)
            .extract(&snapshot("<button>View brief</button><button>View brief</button>"));
        assert_eq!(obs, Observation::NEUTRAL);
    }
}

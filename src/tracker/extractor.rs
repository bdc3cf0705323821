//! Outcome extraction from the recent-results feed.
//!
//! The head of the feed is read as the candidate outcome, but it is only
//! released once the phase reads settled. Partial reads (color without a
//! number, or the reverse) never produce an outcome.

use std::fmt;

use crate::tracker::config::CompiledSelectors;
use crate::tracker::phase::PhaseReading;
use crate::{Category, Outcome, PageNode, PageSnapshot};

/// Why no outcome was produced this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingReason {
    /// Phase is waiting or spinning.
    NotSettled,
    /// Feed has no entries yet (markup not loaded).
    NoEntries,
    /// Head entry has no tile or box.
    MissingTile,
    /// Box carries none of the category markers.
    UnknownCategory,
    /// Non-white box without a readable number.
    MissingLabel,
    /// Banner announced a number the feed head does not show yet.
    FeedLagging { announced: String, head: String },
}

impl fmt::Display for PendingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingReason::NotSettled => f.write_str("round not settled"),
            PendingReason::NoEntries => f.write_str("feed has no entries"),
            PendingReason::MissingTile => f.write_str("feed head has no tile"),
            PendingReason::UnknownCategory => f.write_str("tile has no category marker"),
            PendingReason::MissingLabel => f.write_str("tile has no label"),
            PendingReason::FeedLagging { announced, head } => {
                write!(f, "feed head {head} behind announced {announced}")
            }
        }
    }
}

/// Result of one extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Outcome(Outcome),
    Pending(PendingReason),
}

/// Marker precedence when a box carries more than one class.
const MARKER_ORDER: [&str; 3] = ["white", "black", "red"];

#[derive(Debug, Clone)]
pub struct Extractor {
    selectors: CompiledSelectors,
    white_label: String,
}

impl Extractor {
    pub fn new(selectors: CompiledSelectors, white_label: impl Into<String>) -> Self {
        Self {
            selectors,
            white_label: white_label.into(),
        }
    }

    /// Extract the settled outcome, if the snapshot holds one.
    pub fn extract(&self, snapshot: &PageSnapshot, phase: &PhaseReading) -> Extraction {
        if !phase.is_settled() {
            return Extraction::Pending(PendingReason::NotSettled);
        }

        let head = match self.feed_head(snapshot) {
            Ok(outcome) => outcome,
            Err(reason) => return Extraction::Pending(reason),
        };

        if let Some(announced) = &phase.announced {
            if !matches_announced(&head, announced) {
                return Extraction::Pending(PendingReason::FeedLagging {
                    announced: announced.clone(),
                    head: head.label().to_string(),
                });
            }
        }

        Extraction::Outcome(head)
    }

    /// Most recent entry of the results feed, regardless of phase.
    fn feed_head(&self, snapshot: &PageSnapshot) -> Result<Outcome, PendingReason> {
        let entry = snapshot
            .query_first(&self.selectors.entries)
            .ok_or(PendingReason::NoEntries)?;
        self.read_entry(entry)
    }

    fn read_entry(&self, entry: &PageNode) -> Result<Outcome, PendingReason> {
        let tile_box = entry
            .select_first(&self.selectors.tile)
            .and_then(|tile| tile.select_first(&self.selectors.tile_box))
            .ok_or(PendingReason::MissingTile)?;

        let category = MARKER_ORDER
            .iter()
            .find(|marker| tile_box.has_class(marker))
            .and_then(|marker| Category::from_marker(marker))
            .ok_or(PendingReason::UnknownCategory)?;

        let label = match category {
            Category::White => self.white_label.clone(),
            Category::Red | Category::Black => tile_box
                .select_first(&self.selectors.number)
                .map(PageNode::text_content)
                .filter(|text| !text.is_empty())
                .ok_or(PendingReason::MissingLabel)?,
        };

        Ok(Outcome::new(category, label))
    }
}

/// A zero banner announces WHITE; any other number a RED/BLACK tile with that label.
fn matches_announced(head: &Outcome, announced: &str) -> bool {
    let announced_white = announced.trim_start_matches('0').is_empty();
    match head.category() {
        Category::White => announced_white,
        Category::Red | Category::Black => !announced_white && head.label() == announced,
    }
}


#[cfg(test)]
mod tests {
    use super::test_pages::*;
    use super::*;
    use crate::tracker::config::{CountdownFormat, SelectorConfig};
    use crate::tracker::phase::PhaseTracker;

    fn extractor() -> Extractor {
        Extractor::new(SelectorConfig::default().compile().unwrap(), "15x")
    }

    fn phase_of(snapshot: &PageSnapshot) -> PhaseReading {
        let selectors = SelectorConfig::default().compile().unwrap();
        PhaseTracker::new(selectors.status, CountdownFormat::SecondsCentis).read(snapshot)
    }

    #[test]
    fn test_settled_red() {
        let snapshot = settled("red", "3");
        let result = extractor().extract(&snapshot, &phase_of(&snapshot));
        assert_eq!(result, Extraction::Outcome(Outcome::new(Category::Red, "3")));
    }

    #[test]
    fn test_settled_white_uses_sentinel() {
        let snapshot = settled("white", "0");
        let result = extractor().extract(&snapshot, &phase_of(&snapshot));
        assert_eq!(result, Extraction::Outcome(Outcome::new(Category::White, "15x")));
    }

    #[test]
    fn test_not_settled_is_pending() {
        let snapshot = page(Some("Girando em 10:00"), vec![entry("red", Some("3"))]);
        let result = extractor().extract(&snapshot, &phase_of(&snapshot));
        assert_eq!(result, Extraction::Pending(PendingReason::NotSettled));
    }

    #[test]
    fn test_empty_feed_is_pending() {
        let snapshot = page(Some("Blaze Girou 3!"), vec![]);
        let result = extractor().extract(&snapshot, &phase_of(&snapshot));
        assert_eq!(result, Extraction::Pending(PendingReason::NoEntries));
    }

    #[test]
    fn test_missing_number_is_pending() {
        let snapshot = page(Some("Blaze Girou 3!"), vec![entry("red", None)]);
        let result = extractor().extract(&snapshot, &phase_of(&snapshot));
        assert_eq!(result, Extraction::Pending(PendingReason::MissingLabel));
    }

    #[test]
    fn test_unknown_marker_is_pending() {
        let snapshot = page(Some("Blaze Girou 3!"), vec![entry("green", Some("3"))]);
        let result = extractor().extract(&snapshot, &phase_of(&snapshot));
        assert_eq!(result, Extraction::Pending(PendingReason::UnknownCategory));
    }

    #[test]
    fn test_feed_lagging_behind_banner() {
        let snapshot = page(Some("Blaze Girou 5!"), vec![entry("red", Some("3"))]);
        let result = extractor().extract(&snapshot, &phase_of(&snapshot));
        assert_eq!(
            result,
            Extraction::Pending(PendingReason::FeedLagging {
                announced: "5".into(),
                head: "3".into(),
            })
        );
    }

    #[test]
    fn test_white_head_behind_numbered_banner() {
        let snapshot = page(Some("Blaze Girou 7!"), vec![entry("white", None)]);
        let result = extractor().extract(&snapshot, &phase_of(&snapshot));
        assert_eq!(
            result,
            Extraction::Pending(PendingReason::FeedLagging {
                announced: "7".into(),
                head: "15x".into(),
            })
        );
    }

    #[test]
    fn test_colored_head_behind_zero_banner() {
        let snapshot = page(Some("Blaze Girou 0!"), vec![entry("red", Some("3"))]);
        let result = extractor().extract(&snapshot, &phase_of(&snapshot));
        assert_eq!(
            result,
            Extraction::Pending(PendingReason::FeedLagging {
                announced: "0".into(),
                head: "3".into(),
            })
        );
    }

    #[test]
    fn test_white_ignores_number_node() {
        let snapshot = page(Some("Blaze Girou 0!"), vec![entry("white", Some("0"))]);
        let result = extractor().extract(&snapshot, &phase_of(&snapshot));
        assert_eq!(result, Extraction::Outcome(Outcome::new(Category::White, "15x")));
    }
}

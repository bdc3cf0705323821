//! Outcome, category and prediction types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Color classification of a settled spin.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Red,
    Black,
    /// Rare, high-payout slot.
    White,
}

impl Category {
    /// Sampling order used by the frequency predictor.
    pub const ALL: [Category; 3] = [Category::White, Category::Red, Category::Black];

    /// Map a style class marker to a category.
    pub fn from_marker(class: &str) -> Option<Self> {
        match class {
            "red" => Some(Category::Red),
            "black" => Some(Category::Black),
            "white" => Some(Category::White),
            _ => None,
        }
    }

    /// The other of {RED, BLACK}. WHITE has no opposite.
    pub fn opposite(self) -> Option<Self> {
        match self {
            Category::Red => Some(Category::Black),
            Category::Black => Some(Category::Red),
            Category::White => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Red => "red",
            Category::Black => "black",
            Category::White => "white",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One settled spin: category plus the label shown on the tile.
///
/// Fields are private so an outcome cannot be altered after extraction.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Outcome {
    #[serde(rename = "color")]
    category: Category,
    #[serde(rename = "num")]
    label: String,
}

impl Outcome {
    pub fn new(category: Category, label: impl Into<String>) -> Self {
        Self {
            category,
            label: label.into(),
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Tile number for RED/BLACK, the configured sentinel for WHITE.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Same category and same label.
    pub fn same_spin_as(&self, other: &Outcome) -> bool {
        self.category == other.category && self.label == other.label
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.label)
    }
}

/// A forecast for the next outcome and, once known, how it turned out.
///
/// `actual` and `correct` are only ever set together, by [`Prediction::resolve`],
/// and only once.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Prediction {
    #[serde(rename = "prediction")]
    predicted: Category,
    resolved: bool,
    actual: Option<Category>,
    correct: Option<bool>,
    issued_at: DateTime<Utc>,
}

impl Prediction {
    /// Open an unresolved prediction.
    pub fn open(predicted: Category) -> Self {
        Self {
            predicted,
            resolved: false,
            actual: None,
            correct: None,
            issued_at: Utc::now(),
        }
    }

    /// Fill in the actual category.
    ///
    /// Returns whether the forecast was correct, or `None` if this prediction
    /// had already been resolved (in which case nothing changes).
    pub fn resolve(&mut self, actual: Category) -> Option<bool> {
        if self.resolved {
            return None;
        }
        let correct = self.predicted == actual;
        self.actual = Some(actual);
        self.correct = Some(correct);
        self.resolved = true;
        Some(correct)
    }

    pub fn predicted(&self) -> Category {
        self.predicted
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Category that settled the forecast; `None` while open.
    pub fn actual(&self) -> Option<Category> {
        self.actual
    }

    /// `Some(predicted == actual)` once resolved.
    pub fn correct(&self) -> Option<bool> {
        self.correct
    }

    /// Wall-clock time the forecast was opened.
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }
}

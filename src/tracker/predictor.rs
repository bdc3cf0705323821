//! Next-outcome heuristics.
//!
//! Two shapes are supported:
//!
//! - [`StreakPredictor`] (reactive): looks at the last `window` outcomes and
//!   applies, first match wins:
//!   1. **Streak break**: longest run ≥ 3 → predict the other color. A WHITE
//!      longest run falls through.
//!   2. **White saturation**: ≥ 2 WHITE in the window → RED with p = 0.6, else BLACK.
//!   3. **Alternation**: two most recent share a color → predict the other color.
//!   4. **Weighted**: RED with p = (reds + 1) / (n + 2), else BLACK.
//!
//!   None of these rules ever outputs WHITE.
//!
//! - [`FrequencyPredictor`] (batch): empirical distribution over
//!   {WHITE, RED, BLACK} from a batch of outcomes, sampled independently
//!   once per forecast by cumulative probability.
//!
//! Randomness is always injected so tests can pin every branch.

use rand::Rng;
use serde::Serialize;
use tracing::debug;

use crate::tracker::config::{PredictionConfig, PredictionMode};
use crate::tracker::logging::targets;
use crate::{Category, Outcome};

/// Minimum run length that triggers the streak-break rule.
pub const STREAK_THRESHOLD: usize = 3;
/// WHITE count that triggers the saturation rule.
pub const WHITE_SATURATION: usize = 2;
/// Probability of RED under the saturation rule.
pub const WHITE_SATURATION_RED_BIAS: f64 = 0.6;

/// Which rule produced a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionRule {
    StreakBreak,
    WhiteSaturation,
    Alternation,
    Weighted,
    Frequency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Forecast {
    pub category: Category,
    /// Which rule decided it, for logs and tests.
    pub rule: PredictionRule,
}

/// A run of identical categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Streak {
    pub category: Category,
    pub length: usize,
}

/// Longest run of identical categories in `window`, WHITE included.
///
/// On ties the earlier run (the more recent one, for newest-first input) wins.
pub fn longest_streak(window: &[Category]) -> Option<Streak> {
    let mut best: Option<Streak> = None;
    let mut current: Option<Streak> = None;

    for &category in window {
        current = match current {
            Some(run) if run.category == category => Some(Streak {
                category,
                length: run.length + 1,
            }),
            _ => Some(Streak {
                category,
                length: 1,
            }),
        };
        if let Some(run) = current {
            if best.map_or(true, |b| run.length > b.length) {
                best = Some(run);
            }
        }
    }
    best
}

// ============================================================================
// Reactive
// ============================================================================

/// Streak and share heuristics over the newest `window` outcomes.
#[derive(Debug, Clone)]
pub struct StreakPredictor {
    window: usize,
}

impl StreakPredictor {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }

    /// Forecast the next outcome from `history` (newest first).
    pub fn predict<R: Rng + ?Sized>(&self, history: &[Outcome], rng: &mut R) -> Forecast {
        let window: Vec<Category> = history
            .iter()
            .take(self.window)
            .map(Outcome::category)
            .collect();

        if let Some(streak) = longest_streak(&window) {
            if streak.length >= STREAK_THRESHOLD {
                if let Some(other) = streak.category.opposite() {
                    debug!(
                        target: targets::PREDICT,
                        streak_color = %streak.category,
                        streak_len = streak.length,
                        "Streak break"
                    );
                    return Forecast {
                        category: other,
                        rule: PredictionRule::StreakBreak,
                    };
                }
            }
        }

        let whites = count(&window, Category::White);
        if whites >= WHITE_SATURATION {
            let category = if rng.gen_bool(WHITE_SATURATION_RED_BIAS) {
                Category::Red
            } else {
                Category::Black
            };
            return Forecast {
                category,
                rule: PredictionRule::WhiteSaturation,
            };
        }

        if let [latest, previous, ..] = window.as_slice() {
            if latest == previous {
                if let Some(other) = latest.opposite() {
                    return Forecast {
                        category: other,
                        rule: PredictionRule::Alternation,
                    };
                }
            }
        }

        // Laplace-smoothed share of RED
        let red_share = (count(&window, Category::Red) as f64 + 1.0) / (window.len() as f64 + 2.0);
        let draw: f64 = rng.gen();
        let category = if draw < red_share {
            Category::Red
        } else {
            Category::Black
        };
        Forecast {
            category,
            rule: PredictionRule::Weighted,
        }
    }
}

fn count(window: &[Category], category: Category) -> usize {
    window.iter().filter(|&&c| c == category).count()
}

// ============================================================================
// Batch
// ============================================================================

/// Empirical category probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CategoryDistribution {
    pub white: f64,
    pub red: f64,
    pub black: f64,
}

impl CategoryDistribution {
    /// Frequencies in `outcomes`; uniform when empty.
    pub fn from_outcomes(outcomes: &[Outcome]) -> Self {
        if outcomes.is_empty() {
            let third = 1.0 / 3.0;
            return Self {
                white: third,
                red: third,
                black: third,
            };
        }
        let categories: Vec<Category> = outcomes.iter().map(Outcome::category).collect();
        let total = categories.len() as f64;
        Self {
            white: count(&categories, Category::White) as f64 / total,
            red: count(&categories, Category::Red) as f64 / total,
            black: count(&categories, Category::Black) as f64 / total,
        }
    }

    pub fn probability(&self, category: Category) -> f64 {
        match category {
            Category::White => self.white,
            Category::Red => self.red,
            Category::Black => self.black,
        }
    }

    /// Cumulative-probability sample in WHITE, RED, BLACK order.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Category {
        let draw: f64 = rng.gen();
        let mut cumulative = 0.0;
        for category in Category::ALL {
            cumulative += self.probability(category);
            if draw < cumulative {
                return category;
            }
        }
        // Rounding left the draw past the last bucket; take the last non-empty one.
        Category::ALL
            .iter()
            .rev()
            .copied()
            .find(|&c| self.probability(c) > 0.0)
            .unwrap_or(Category::Black)
    }
}

#[derive(Debug, Clone)]
pub struct FrequencyPredictor {
    batch_size: usize,
}

impl FrequencyPredictor {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// `batch_size` independent forecasts from the frequencies of `batch`.
    pub fn predict_batch<R: Rng + ?Sized>(&self, batch: &[Outcome], rng: &mut R) -> Vec<Category> {
        let distribution = CategoryDistribution::from_outcomes(batch);
        debug!(
            target: targets::PREDICT,
            white = distribution.white,
            red = distribution.red,
            black = distribution.black,
            samples = batch.len(),
            "Batch distribution"
        );
        (0..self.batch_size)
            .map(|_| distribution.sample(rng))
            .collect()
    }
}

// ============================================================================
// Mode dispatch
// ============================================================================

/// The configured predictor.
#[derive(Debug, Clone)]
pub enum Forecaster {
    Reactive(StreakPredictor),
    Batch(FrequencyPredictor),
}

impl Forecaster {
    pub fn from_config(config: &PredictionConfig) -> Self {
        match config.mode {
            PredictionMode::Reactive => Forecaster::Reactive(StreakPredictor::new(config.window)),
            PredictionMode::Batch => Forecaster::Batch(FrequencyPredictor::new(config.batch_size)),
        }
    }

    pub fn mode(&self) -> PredictionMode {
        match self {
            Forecaster::Reactive(_) => PredictionMode::Reactive,
            Forecaster::Batch(_) => PredictionMode::Batch,
        }
    }

    /// Single forecast for the next outcome from `history` (newest first).
    ///
    /// Batch mode samples once from the frequencies of the newest batch-sized slice.
    pub fn forecast<R: Rng + ?Sized>(&self, history: &[Outcome], rng: &mut R) -> Forecast {
        match self {
            Forecaster::Reactive(p) => p.predict(history, rng),
            Forecaster::Batch(p) => {
                let n = p.batch_size().min(history.len());
                let category = CategoryDistribution::from_outcomes(&history[..n]).sample(rng);
                Forecast {
                    category,
                    rule: PredictionRule::Frequency,
                }
            }
        }
    }
}

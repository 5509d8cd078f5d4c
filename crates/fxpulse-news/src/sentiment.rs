//! Sentiment scoring hook.
//!
//! Scoring itself is an external collaborator. The pipeline only calls a
//! scorer over `title + summary` and labels the score.

use fxpulse_core::{NewsItem, Sentiment};

/// Scores text in `[-1, 1]`. `None` leaves the item unscored (reads as neutral).
pub trait SentimentScorer: Send + Sync {
    fn score(&self, text: &str) -> Option<f64>;
}

impl<F> SentimentScorer for F
where
    F: Fn(&str) -> Option<f64> + Send + Sync,
{
    fn score(&self, text: &str) -> Option<f64> {
        self(text)
    }
}

/// Scorer that never scores.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralScorer;

impl SentimentScorer for NeutralScorer {
    fn score(&self, _text: &str) -> Option<f64> {
        None
    }
}

/// Run `scorer` over the item and store the labelled result.
pub fn attach_sentiment(item: &mut NewsItem, scorer: &dyn SentimentScorer) {
    item.sentiment = scorer
        .score(&item.scoring_text())
        .filter(|s| s.is_finite())
        .map(|s| Sentiment::from_score(s.clamp(-1.0, 1.0)));
}

//! Per-pair alert subscription.

use crate::currency::Pair;
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// Threshold monitor state for one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    /// No previous rate to compare against.
    NoBaseline,
    /// At least one earlier sample recorded.
    BaselineSet,
}

/// User subscription to a pair with a percentage-change alert threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub pair: Pair,
    /// Alert when |change| exceeds this many percent. Always > 0.
    pub threshold_pct: f64,
    pub last_rate: Option<f64>,
    pub current_rate: Option<f64>,
}

impl Subscription {
    pub fn new(pair: Pair, threshold_pct: f64) -> Result<Self> {
        if !(threshold_pct.is_finite() && threshold_pct > 0.0) {
            return Err(CoreError::InvalidThreshold(threshold_pct));
        }
        Ok(Self {
            pair,
            threshold_pct,
            last_rate: None,
            current_rate: None,
        })
    }

    pub fn state(&self) -> MonitorState {
        if self.last_rate.is_some() {
            MonitorState::BaselineSet
        } else {
            MonitorState::NoBaseline
        }
    }

    /// Shift current -> last and store the new rate.
    pub fn shift(&mut self, rate: f64) {
        self.last_rate = self.current_rate;
        self.current_rate = Some(rate);
    }

    /// `|current - last| / last * 100`, when both rates exist and last is non-zero.
    pub fn pct_change(&self) -> Option<f64> {
        match (self.last_rate, self.current_rate) {
            (Some(last), Some(current)) if last != 0.0 => {
                Some((current - last).abs() / last.abs() * 100.0)
            }
            _ => None,
        }
    }
}

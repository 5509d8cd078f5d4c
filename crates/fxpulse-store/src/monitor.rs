//! Percentage-change threshold alerts.
//!
//! Every recorded rate shifts the subscription's current rate into the last
//! rate. Once a baseline exists, a move strictly larger than the threshold
//! produces a `PriceAlert`. There is no hysteresis: each breaching sample
//! alerts again, even if the previous one already did.

use crate::error::{StoreError, StoreResult};
use dashmap::DashMap;
use fxpulse_core::{Pair, Subscription};
use fxpulse_telemetry::Metrics;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertDirection {
    Increased,
    Decreased,
}

impl AlertDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Increased => "increased",
            Self::Decreased => "decreased",
        }
    }
}

impl fmt::Display for AlertDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Threshold breach for one subscription.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceAlert {
    pub pair: Pair,
    pub direction: AlertDirection,
    pub pct_change: f64,
    pub threshold_pct: f64,
    pub previous: f64,
    pub current: f64,
}

impl PriceAlert {
    /// Notification text, e.g. `EUR/USD increased by 0.65% (1.0800 -> 1.0870)`.
    pub fn message(&self) -> String {
        format!(
            "{} {} by {:.2}% ({:.4} -> {:.4})",
            self.pair, self.direction, self.pct_change, self.previous, self.current
        )
    }
}

type SubscriptionEntry = Arc<Mutex<Subscription>>;

/// Subscriptions keyed by pair.
#[derive(Debug, Default)]
pub struct ThresholdMonitor {
    subscriptions: DashMap<String, SubscriptionEntry>,
}

impl ThresholdMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a pair. Re-subscribing only changes the threshold and
    /// keeps the existing baseline.
    pub fn subscribe(&self, pair: Pair, threshold_pct: f64) -> StoreResult<()> {
        let fresh = Subscription::new(pair.clone(), threshold_pct)?;
        let key = pair.key();

        if let Some(existing) = self.subscriptions.get(&key) {
            existing.lock().threshold_pct = threshold_pct;
            debug!(pair = %key, threshold_pct, "Subscription threshold updated");
            return Ok(());
        }

        self.subscriptions
            .insert(key.clone(), Arc::new(Mutex::new(fresh)));
        info!(pair = %key, threshold_pct, "Subscribed");
        Ok(())
    }

    pub fn unsubscribe(&self, pair_key: &str) -> StoreResult<Subscription> {
        self.subscriptions
            .remove(pair_key)
            .map(|(_, entry)| entry.lock().clone())
            .ok_or_else(|| StoreError::NotSubscribed(pair_key.to_string()))
    }

    pub fn is_subscribed(&self, pair_key: &str) -> bool {
        self.subscriptions.contains_key(pair_key)
    }

    /// Copies of every subscription, sorted by pair.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        let mut subs: Vec<Subscription> = self
            .subscriptions
            .iter()
            .map(|entry| entry.value().lock().clone())
            .collect();
        subs.sort_by(|a, b| a.pair.cmp(&b.pair));
        subs
    }

    pub fn get(&self, pair_key: &str) -> Option<Subscription> {
        self.subscriptions
            .get(pair_key)
            .map(|entry| entry.lock().clone())
    }

    /// Record a fetched rate for a subscribed pair.
    ///
    /// Returns `None` when the pair is not subscribed, when there is no
    /// baseline yet, or when the move stays within the threshold.
    pub fn record(&self, pair_key: &str, rate: f64) -> Option<PriceAlert> {
        let entry = self.subscriptions.get(pair_key)?.clone();
        let mut sub = entry.lock();
        sub.shift(rate);

        let pct_change = sub.pct_change()?;
        if pct_change <= sub.threshold_pct {
            return None;
        }

        // pct_change only exists when both rates are present
        let previous = sub.last_rate?;
        let current = sub.current_rate?;
        let direction = if current >= previous {
            AlertDirection::Increased
        } else {
            AlertDirection::Decreased
        };

        let alert = PriceAlert {
            pair: sub.pair.clone(),
            direction,
            pct_change,
            threshold_pct: sub.threshold_pct,
            previous,
            current,
        };

        info!(
            pair = %alert.pair,
            direction = %direction,
            pct_change,
            threshold_pct = alert.threshold_pct,
            "Price threshold breached"
        );
        Metrics::price_alert(pair_key, direction.as_str());
        Some(alert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxpulse_core::MonitorState;

    fn monitor_with(pair: &str, threshold: f64) -> ThresholdMonitor {
        let monitor = ThresholdMonitor::new();
        monitor.subscribe(pair.parse().unwrap(), threshold).unwrap();
        monitor
    }

    #[test]
    fn test_eur_usd_breach_increased() {
        let monitor = monitor_with("EUR/USD", 0.5);
        assert!(monitor.record("EUR/USD", 1.0800).is_none());

        let alert = monitor.record("EUR/USD", 1.0870).unwrap();
        assert_eq!(alert.direction, AlertDirection::Increased);
        assert!((alert.pct_change - 0.648).abs() < 0.001);
        assert_eq!(alert.message(), "EUR/USD increased by 0.65% (1.0800 -> 1.0870)");
    }

    #[test]
    fn test_alert_counted_by_direction_label() {
        use fxpulse_telemetry::metrics::PRICE_ALERTS_TOTAL;

        let counter = |direction: &str| {
            PRICE_ALERTS_TOTAL
                .with_label_values(&["NZD/CHF", direction])
                .get()
        };
        let before = (counter("increased"), counter("decreased"));

        let monitor = monitor_with("NZD/CHF", 0.5);
        monitor.record("NZD/CHF", 0.5000);
        monitor.record("NZD/CHF", 0.5100);
        monitor.record("NZD/CHF", 0.5000);

        assert_eq!(counter("increased") - before.0, 1.0);
        assert_eq!(counter("decreased") - before.1, 1.0);
    }

    #[test]
    fn test_within_threshold_does_not_alert() {
        let monitor = monitor_with("EUR/USD", 0.5);
        monitor.record("EUR/USD", 1.0800);
        assert!(monitor.record("EUR/USD", 1.0840).is_none());
    }

    #[test]
    fn test_no_hysteresis_every_breach_fires() {
        let monitor = monitor_with("BTC/USD", 1.0);
        monitor.record("BTC/USD", 100.0);

        let first = monitor.record("BTC/USD", 95.0).unwrap();
        assert_eq!(first.direction, AlertDirection::Decreased);
        let second = monitor.record("BTC/USD", 90.0).unwrap();
        assert_eq!(second.direction, AlertDirection::Decreased);
        assert_eq!(second.previous, 95.0);
    }

    #[test]
    fn test_rates_shift_after_each_record() {
        let monitor = monitor_with("USD/JPY", 2.0);
        for rate in [150.0, 150.5, 151.0] {
            monitor.record("USD/JPY", rate);
        }
        let sub = monitor.get("USD/JPY").unwrap();
        assert_eq!(sub.last_rate, Some(150.5));
        assert_eq!(sub.current_rate, Some(151.0));
        assert_eq!(sub.state(), MonitorState::BaselineSet);
    }

    #[test]
    fn test_zero_baseline_never_alerts() {
        let monitor = monitor_with("EUR/USD", 0.5);
        monitor.record("EUR/USD", 0.0);
        assert!(monitor.record("EUR/USD", 1.0).is_none());
    }

    #[test]
    fn test_unsubscribed_pair_ignored() {
        let monitor = monitor_with("EUR/USD", 0.5);
        assert!(monitor.record("GBP/USD", 1.25).is_none());
        assert!(monitor.unsubscribe("GBP/USD").is_err());

        let removed = monitor.unsubscribe("EUR/USD").unwrap();
        assert_eq!(removed.pair.key(), "EUR/USD");
        assert!(monitor.subscriptions().is_empty());
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let monitor = ThresholdMonitor::new();
        let err = monitor.subscribe("EUR/USD".parse().unwrap(), 0.0).unwrap_err();
        assert!(matches!(err, StoreError::Subscription(_)));
        assert!(!monitor.is_subscribed("EUR/USD"));
    }

    #[test]
    fn test_resubscribe_keeps_baseline() {
        let monitor = monitor_with("EUR/USD", 5.0);
        monitor.record("EUR/USD", 1.0800);
        monitor
            .subscribe("EUR/USD".parse().unwrap(), 0.5)
            .unwrap();

        assert!(monitor.record("EUR/USD", 1.0870).is_some());
    }
}

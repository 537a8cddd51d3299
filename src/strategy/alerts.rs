//! Observable alerts and outputs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertLevel {
    /// Informational strategy output
    Output,
    /// A caught failure
    Alert,
}

/// One alert or output line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub timestamp: DateTime<Utc>,
    pub level: AlertLevel,
    /// Operation during which it was raised
    pub operation: String,
    pub message: String,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.operation,
            self.message
        )
    }
}

/// Accumulates alerts until drained; drained entries are never re-delivered
#[derive(Debug, Default)]
pub struct AlertLog {
    entries: Mutex<Vec<Alert>>,
}

impl AlertLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a caught failure
    pub fn alert(&self, operation: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(operation, %message, "Strategy alert");
        self.push(AlertLevel::Alert, operation, message);
    }

    /// Record strategy output
    pub fn output(&self, operation: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(operation, %message, "Strategy output");
        self.push(AlertLevel::Output, operation, message);
    }

    fn push(&self, level: AlertLevel, operation: &str, message: String) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Alert {
                timestamp: Utc::now(),
                level,
                operation: operation.to_string(),
                message,
            });
    }

    /// Take all pending entries
    pub fn drain(&self) -> Vec<Alert> {
        std::mem::take(&mut *self.entries.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_is_not_redelivered() {
        let log = AlertLog::new();
        log.alert("evaluate", "division by zero");
        log.output("evaluate", "placed buy");

        let drained = log.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].level, AlertLevel::Alert);
        assert_eq!(drained[0].operation, "evaluate");
        assert_eq!(drained[1].level, AlertLevel::Output);
        assert!(log.drain().is_empty());
        assert!(log.is_empty());
    }

    #[test]
    fn test_display_carries_context() {
        let log = AlertLog::new();
        log.alert("place_order", "Unknown account: demo");
        let text = log.drain()[0].to_string();
        assert!(text.contains("place_order: Unknown account: demo"));
    }
}

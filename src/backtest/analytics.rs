//! Backtest analytics and reporting

use super::ScanReport;
use crate::signal::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;

/// Summary statistics from a backtest
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BacktestSummary {
    /// Total number of trade signals
    pub total_signals: usize,
    /// Buy signals
    pub buys: usize,
    /// Sell signals
    pub sells: usize,
    /// Sum of signal quantities
    pub total_quantity: Decimal,
    /// Selections that had data
    pub instruments: usize,
    /// Distinct symbols that produced signals
    pub traded_symbols: usize,
    /// Timestamp groups processed
    pub iterations: usize,
    /// Whether the run was stopped early
    pub cancelled: bool,
    /// Time of the first signal
    pub first_signal: Option<DateTime<Utc>>,
    /// Time of the last signal
    pub last_signal: Option<DateTime<Utc>>,
    /// Starting account balance
    pub initial_balance: Decimal,
    /// Account balance after the run
    pub final_balance: Decimal,
}

impl BacktestSummary {
    /// Summarise a scan
    pub fn from_report(report: &ScanReport) -> Self {
        let signals = &report.signals;
        let symbols: BTreeSet<_> = signals.iter().map(|s| &s.instrument.symbol).collect();

        Self {
            total_signals: signals.len(),
            buys: signals.iter().filter(|s| s.side == Side::Buy).count(),
            sells: signals.iter().filter(|s| s.side == Side::Sell).count(),
            total_quantity: signals.iter().map(|s| s.quantity).sum(),
            instruments: report.instruments,
            traded_symbols: symbols.len(),
            iterations: report.iterations,
            cancelled: report.cancelled,
            first_signal: signals.iter().map(|s| s.timestamp).min(),
            last_signal: signals.iter().map(|s| s.timestamp).max(),
            ..Self::default()
        }
    }

    /// Attach start and end balances
    pub fn with_balances(mut self, initial: Decimal, final_balance: Decimal) -> Self {
        self.initial_balance = initial;
        self.final_balance = final_balance;
        self
    }

    /// Net change of the account balance
    pub fn net_pnl(&self) -> Decimal {
        self.final_balance - self.initial_balance
    }

    /// Format as table for CLI output
    pub fn format_table(&self) -> String {
        let time = |t: Option<DateTime<Utc>>| {
            t.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string())
        };

        format!(
            r#"
══════════════════════════════════════════════════════
               BACKTEST RESULTS
══════════════════════════════════════════════════════

ACCOUNT
───────────────────────────────────────────────────────
Initial Balance:  {:.2}
Final Balance:    {:.2}
Net P&L:          {:+.2}

ACTIVITY
───────────────────────────────────────────────────────
Instruments:      {}
Iterations:       {}{}
Trade Signals:    {} ({} buy / {} sell)
Traded Symbols:   {}
Total Quantity:   {}
First Signal:     {}
Last Signal:      {}
══════════════════════════════════════════════════════
"#,
            self.initial_balance,
            self.final_balance,
            self.net_pnl(),
            self.instruments,
            self.iterations,
            if self.cancelled { " (cancelled)" } else { "" },
            self.total_signals,
            self.buys,
            self.sells,
            self.traded_symbols,
            self.total_quantity,
            time(self.first_signal),
            time(self.last_signal),
        )
    }
}

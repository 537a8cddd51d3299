//! Live execution scheduler
//!
//! Drives a [`StrategyHost`] while it is running: a periodic timer, the
//! aggregator's bar-completed notifications or every appended tick, depending
//! on the host's start method. A second timer polls backtest progress.
//!
//! Every invocation goes through one async mutex around the host, so at most
//! one strategy step runs at a time. Failures are converted to alerts and
//! never stop the timers.

mod progress;
mod types;

pub use progress::{ProgressTracker, ProgressUpdate, MIN_PROGRESS_DELTA};
pub use types::{SchedulerError, SchedulerEvent};

use crate::market::{Selection, Tick};
use crate::series::{Aggregator, AppendOutcome, SeriesError, SeriesId};
use crate::signal::TradeSignal;
use crate::strategy::{
    AlertLevel, RunState, StartMethod, StrategyControl, StrategyError, StrategyHost,
};
use crate::telemetry::{self, CounterMetric};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Finest tick of the periodic execution timer
const TIMER_RESOLUTION: Duration = Duration::from_millis(100);

/// Shortest accepted execution period
const MIN_EXECUTION_PERIOD: Duration = Duration::from_millis(1);

/// Backtest progress poll interval
const PROGRESS_POLL_INTERVAL: Duration = Duration::from_millis(200);

const EVENT_CHANNEL_CAPACITY: usize = 1024;

type SharedHost = Arc<tokio::sync::Mutex<Box<dyn StrategyHost>>>;

/// Live execution scheduler around one strategy host
pub struct Scheduler {
    host: SharedHost,
    aggregator: Arc<Aggregator>,
    control: StrategyControl,
    events: broadcast::Sender<SchedulerEvent>,
    /// Cleared on stop; checked before every timer-driven invocation
    enabled: Arc<AtomicBool>,
    tracker: Arc<Mutex<ProgressTracker>>,
    start_method: StartMethod,
    subscribed: Vec<Selection>,
    timer: Option<JoinHandle<()>>,
    listener: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(host: Box<dyn StrategyHost>, aggregator: Arc<Aggregator>) -> Self {
        let control = host.control();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            host: Arc::new(tokio::sync::Mutex::new(host)),
            aggregator,
            control,
            events,
            enabled: Arc::new(AtomicBool::new(false)),
            tracker: Arc::new(Mutex::new(ProgressTracker::new())),
            start_method: StartMethod::default(),
            subscribed: Vec::new(),
            timer: None,
            listener: None,
        }
    }

    /// Receive scheduler events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    pub fn control(&self) -> &StrategyControl {
        &self.control
    }

    pub fn host(&self) -> &SharedHost {
        &self.host
    }

    pub fn state(&self) -> RunState {
        self.control.state()
    }

    /// Enter `Running` and arm the trigger of the host's start method.
    ///
    /// Refused with [`StrategyError::NotInitialized`] unless the host reports
    /// itself ready, which it does after a successful `init`.
    pub async fn start(&mut self) -> Result<(), SchedulerError> {
        let state = self.control.state();
        if state != RunState::Stopped {
            return Err(SchedulerError::Busy(state));
        }
        if !self.control.is_ready() {
            return Err(StrategyError::NotInitialized.into());
        }
        if !self.control.transition(RunState::Stopped, RunState::Running) {
            return Err(SchedulerError::Busy(self.control.state()));
        }

        let (start_method, period, selections) = {
            let host = self.host.lock().await;
            (
                host.start_method(),
                host.execution_period().max(MIN_EXECUTION_PERIOD),
                host.selections(),
            )
        };
        self.start_method = start_method;
        self.subscribed = selections;
        self.enabled.store(true, Ordering::Release);

        match start_method {
            StartMethod::Periodic => self.timer = Some(self.spawn_periodic(period)),
            StartMethod::NewBar => {
                let bars = self.aggregator.subscribe();
                self.listener = Some(self.spawn_bar_listener(bars));
            }
            StartMethod::NewTick => {}
        }

        tracing::info!(
            start_method = ?start_method,
            period_ms = period.as_millis() as u64,
            selections = self.subscribed.len(),
            "Scheduler started"
        );
        Ok(())
    }

    /// Stop live mode.
    ///
    /// Timers are disabled first, then the bar listener is dropped, then the
    /// state returns to `Stopped`. An invocation already in progress is
    /// allowed to finish; none starts afterwards.
    pub async fn stop(&mut self) {
        self.enabled.store(false, Ordering::Release);

        let timer = self.timer.take();
        let listener = self.listener.take();
        {
            let _in_flight = self.host.lock().await;
            if let Some(timer) = &timer {
                timer.abort();
            }
            if let Some(listener) = &listener {
                listener.abort();
            }
        }
        for task in timer.into_iter().chain(listener) {
            let _ = task.await;
        }

        self.control.transition(RunState::Running, RunState::Stopped);
        self.control.set_ready(false);
        let _ = self.events.send(SchedulerEvent::Stopped);
        tracing::info!("Scheduler stopped");
    }

    /// Append a tick through the aggregator.
    ///
    /// With the `NewTick` start method the strategy is invoked before this
    /// returns. Aggregation errors are returned, never swallowed.
    pub async fn on_tick(&self, id: SeriesId, tick: Tick) -> Result<AppendOutcome, SeriesError> {
        let outcome = self.aggregator.append_tick(id, &tick)?;

        if self.start_method == StartMethod::NewTick
            && self.enabled.load(Ordering::Acquire)
            && self.control.state() == RunState::Running
            && self.control.is_ready()
        {
            let key = self.aggregator.store().key(id)?;
            if let Some(selection) = self.subscribed.iter().find(|s| s.reads(&key)) {
                invoke(
                    &self.host,
                    &self.control,
                    &self.events,
                    Some(selection),
                    Some(std::slice::from_ref(&tick)),
                    "scheduler.new_tick",
                )
                .await;
            }
        }
        Ok(outcome)
    }

    /// Run one backtest over the host's selections.
    ///
    /// Progress is polled while the scan runs and published as
    /// [`SchedulerEvent::BacktestProgress`], followed by one
    /// [`SchedulerEvent::BacktestFinished`] when it completes.
    pub async fn backtest(&self) -> Result<Vec<TradeSignal>, SchedulerError> {
        if !self.control.transition(RunState::Stopped, RunState::Backtesting) {
            return Err(SchedulerError::Busy(self.control.state()));
        }
        self.control.set_progress(0);
        lock(&self.tracker).begin();
        let poller = self.spawn_progress_poller();

        let result = {
            let mut host = self.host.lock().await;
            let selections = host.selections();
            host.backtest_slot_item(&selections, &[]).await
        };

        poller.abort();
        let _ = poller.await;
        poll_progress(&self.tracker, &self.control, &self.events);
        lock(&self.tracker).cancel();

        self.control.transition(RunState::Backtesting, RunState::Stopped);
        forward_alerts(&self.control, &self.events);
        Ok(result?)
    }

    /// Request cancellation of a running backtest
    pub fn cancel_backtest(&self) -> bool {
        self.control.transition(RunState::Backtesting, RunState::Stopped)
    }

    fn spawn_periodic(&self, period: Duration) -> JoinHandle<()> {
        let host = Arc::clone(&self.host);
        let control = self.control.clone();
        let events = self.events.clone();
        let enabled = Arc::clone(&self.enabled);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period.min(TIMER_RESOLUTION));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut last_run = Instant::now();

            loop {
                interval.tick().await;
                if !enabled.load(Ordering::Acquire) || control.state() != RunState::Running {
                    break;
                }
                if last_run.elapsed() < period {
                    continue;
                }
                last_run = Instant::now();
                invoke(&host, &control, &events, None, None, "scheduler.periodic").await;
            }
        })
    }

    fn spawn_bar_listener(
        &self,
        mut bars: broadcast::Receiver<crate::series::BarCompleted>,
    ) -> JoinHandle<()> {
        let host = Arc::clone(&self.host);
        let control = self.control.clone();
        let events = self.events.clone();
        let enabled = Arc::clone(&self.enabled);
        let subscribed = self.subscribed.clone();

        tokio::spawn(async move {
            loop {
                let completed = match bars.recv().await {
                    Ok(completed) => completed,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Bar listener lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                if !enabled.load(Ordering::Acquire) || control.state() != RunState::Running {
                    break;
                }
                if !control.is_ready() {
                    continue;
                }
                let Some(selection) = subscribed.iter().find(|s| s.reads(&completed.key)) else {
                    continue;
                };
                invoke(&host, &control, &events, Some(selection), None, "scheduler.new_bar").await;
            }
        })
    }

    fn spawn_progress_poller(&self) -> JoinHandle<()> {
        let tracker = Arc::clone(&self.tracker);
        let control = self.control.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PROGRESS_POLL_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if !lock(&tracker).is_active() {
                    break;
                }
                poll_progress(&tracker, &control, &events);
            }
        })
    }
}

fn lock(tracker: &Mutex<ProgressTracker>) -> std::sync::MutexGuard<'_, ProgressTracker> {
    tracker.lock().unwrap_or_else(PoisonError::into_inner)
}

fn poll_progress(
    tracker: &Mutex<ProgressTracker>,
    control: &StrategyControl,
    events: &broadcast::Sender<SchedulerEvent>,
) {
    let update = lock(tracker).observe(control.progress());
    let event = match update {
        Some(ProgressUpdate::Progress(pct)) => SchedulerEvent::BacktestProgress(pct),
        Some(ProgressUpdate::Finished) => SchedulerEvent::BacktestFinished,
        None => return,
    };
    let _ = events.send(event);
}

/// One strategy step; failures become alerts
async fn invoke(
    host: &SharedHost,
    control: &StrategyControl,
    events: &broadcast::Sender<SchedulerEvent>,
    trigger: Option<&Selection>,
    ticks: Option<&[Tick]>,
    operation: &str,
) {
    let result = {
        let mut host = host.lock().await;
        host.start(trigger, ticks).await
    };

    if let Err(e) = result {
        telemetry::increment(CounterMetric::StrategyFailures, 1);
        control
            .alerts()
            .alert(operation, format!("invocation abandoned: {}", e));
    }
    forward_alerts(control, events);
}

fn forward_alerts(control: &StrategyControl, events: &broadcast::Sender<SchedulerEvent>) {
    for alert in control.alerts().drain() {
        let event = match alert.level {
            AlertLevel::Output => SchedulerEvent::Output(alert),
            AlertLevel::Alert => SchedulerEvent::Alert(alert),
        };
        let _ = events.send(event);
    }
}

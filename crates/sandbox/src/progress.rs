//! Coarse progress reporting for long-running executions.
//!
//! The reporter supervises a lifecycle task through a single-slot channel:
//! while the task runs it emits a notification every tick, and once the
//! result arrives it emits a final `progress == total` and hands the result
//! back. It never blocks the lifecycle task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use sandbox_mcp_core::config::ProgressConfig;
use sandbox_mcp_core::{Error, NotificationSink, ProgressNotification, ProgressToken, Result};

/// Progress counter. Never decreases and stays below `total` until finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressState {
    current: u32,
    total: u32,
}

impl ProgressState {
    pub fn new(total: u32) -> Self {
        let total = total.max(1);
        Self {
            current: (total / 10).min(total - 1),
            total,
        }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// Step forward by 5% of the way, or by 1 once past 90%.
    pub fn advance(&mut self) -> u32 {
        let ceiling = self.total - 1;
        let slow_zone = u64::from(self.current) * 10 >= u64::from(self.total) * 9;
        let step = if slow_zone { 1 } else { (self.total / 20).max(1) };
        self.current = self.current.saturating_add(step).min(ceiling).max(self.current);
        self.current
    }

    pub fn finish(&mut self) -> u32 {
        self.current = self.total;
        self.current
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Reporting,
    Done,
}

/// Emits progress notifications for one request.
pub struct ProgressReporter {
    notifier: Arc<dyn NotificationSink>,
    token: Option<ProgressToken>,
    interval: Duration,
    state: ProgressState,
    phase: Phase,
}

impl ProgressReporter {
    pub fn new(
        notifier: Arc<dyn NotificationSink>,
        token: Option<ProgressToken>,
        config: &ProgressConfig,
    ) -> Self {
        Self {
            notifier,
            token,
            interval: Duration::from_millis(config.interval_ms.max(1)),
            state: ProgressState::new(config.total),
            phase: Phase::Idle,
        }
    }

    /// Report progress until `result` is ready, then return it.
    ///
    /// After `cancel` fires no more ticks are emitted; the lifecycle task is
    /// expected to observe the same token and report `Cancelled`.
    pub async fn supervise<T>(
        mut self,
        mut result: oneshot::Receiver<Result<T>>,
        cancel: &CancellationToken,
    ) -> Result<T> {
        self.phase = Phase::Reporting;
        let initial = self.state.current();
        self.emit(initial).await;

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cancelled = false;

        let outcome = loop {
            tokio::select! {
                biased;
                outcome = &mut result => break outcome,
                _ = cancel.cancelled(), if !cancelled => {
                    tracing::info!("Cancellation requested, waiting for the execution to stop");
                    cancelled = true;
                }
                _ = ticker.tick(), if !cancelled => {
                    let progress = self.state.advance();
                    tracing::debug!(progress, total = self.state.total(), "Execution still running");
                    self.emit(progress).await;
                }
            }
        };

        let total = self.state.finish();
        self.emit(total).await;
        self.phase = Phase::Done;

        outcome.unwrap_or_else(|_| {
            Err(Error::internal(
                "execution task ended without reporting a result",
            ))
        })
    }

    async fn emit(&self, progress: u32) {
        let Some(token) = &self.token else {
            return;
        };
        if self.phase != Phase::Reporting {
            return;
        }

        let notification = ProgressNotification {
            progress,
            total: self.state.total(),
            progress_token: token.clone(),
        };
        if let Err(e) = self.notifier.notify_progress(notification).await {
            tracing::warn!(token = %token, error = %e, "Failed to send progress");
        }
    }
}

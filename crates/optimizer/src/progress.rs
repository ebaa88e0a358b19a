use core_types::StrategyParams;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// One evaluated candidate, as reported to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trial {
    /// Zero-based position in the search.
    pub index: usize,
    pub params: StrategyParams,
    pub total_value: Decimal,
    pub trade_count: u64,
    /// Highest total value seen up to and including this trial.
    pub best_value: Decimal,
}

/// Producer half of the trial stream.
///
/// Sending never blocks: when the channel is full the trial is dropped for the
/// observer (the search itself keeps every trial), and a closed channel is logged
/// once and then ignored.
#[derive(Debug, Clone)]
pub struct TrialSender {
    tx: mpsc::Sender<Trial>,
    dropped: Arc<AtomicU64>,
    closed_reported: Arc<AtomicBool>,
}

/// Creates a bounded trial stream. `capacity` is raised to at least one.
pub fn trial_channel(capacity: usize) -> (TrialSender, mpsc::Receiver<Trial>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        TrialSender {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
            closed_reported: Arc::new(AtomicBool::new(false)),
        },
        rx,
    )
}

impl TrialSender {
    pub fn send(&self, trial: Trial) {
        match self.tx.try_send(trial) {
            Ok(_) => {}
            Err(mpsc::error::TrySendError::Full(trial)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(index = trial.index, "trial channel full, report dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                if !self.closed_reported.swap(true, Ordering::Relaxed) {
                    error!("Trial channel closed! Progress observer is likely gone.");
                }
            }
        }
    }

    /// Trials that could not be delivered because the channel was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

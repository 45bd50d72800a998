//! Submission of serial electron diffraction (SED) runs to an experiment
//! worker.
//!
//! A submission is a tagged work item on an unbounded queue followed by a
//! one-shot trigger. The worker waits on the trigger, then drains the queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub const SED_TASK: &str = "sed";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SedParams {
    /// Seconds.
    pub image_exposure: f64,
    pub image_spotsize: u32,
    /// Seconds.
    pub diff_exposure: f64,
    pub diff_spotsize: u32,
    pub diff_brightness: u32,
    /// Micrometres.
    pub scan_radius: f64,
}

impl Default for SedParams {
    fn default() -> Self {
        Self {
            image_exposure: 0.5,
            image_spotsize: 4,
            diff_exposure: 0.1,
            diff_spotsize: 4,
            diff_brightness: 40000,
            scan_radius: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub task: String,
    pub params: SedParams,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Experiment worker queue is closed")]
    QueueClosed,
}

pub fn work_queue() -> (Sender<WorkItem>, Receiver<WorkItem>) {
    unbounded()
}

/// One-shot event: `set` wakes every waiter until `clear`.
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    flag: Arc<AtomicBool>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl Default for TriggerEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerEvent {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            wake_tx,
            wake_rx,
        }
    }

    pub fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
        // Full means a wake-up is already pending.
        let _ = self.wake_tx.try_send(());
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
        while self.wake_rx.try_recv().is_ok() {}
    }

    /// Returns whether the event was set before the timeout elapsed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_set() {
            return true;
        }
        if self.wake_rx.recv_timeout(timeout).is_ok() {
            // Re-arm for other waiters.
            let _ = self.wake_tx.try_send(());
        }
        self.is_set()
    }
}

pub struct ExperimentSubmitter {
    queue: Sender<WorkItem>,
    trigger: TriggerEvent,
}

impl ExperimentSubmitter {
    pub fn new(queue: Sender<WorkItem>, trigger: TriggerEvent) -> Self {
        Self { queue, trigger }
    }

    pub fn trigger(&self) -> &TriggerEvent {
        &self.trigger
    }

    /// Enqueues the run, then fires the trigger.
    pub fn submit(&self, params: SedParams) -> Result<WorkItem, SubmitError> {
        let item = WorkItem {
            task: SED_TASK.to_string(),
            params,
        };
        self.queue
            .send(item.clone())
            .map_err(|_| SubmitError::QueueClosed)?;
        self.trigger.set();
        info!(task = SED_TASK, scan_radius = params.scan_radius, "Experiment submitted");
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn test_defaults_match_panel() {
        let params = SedParams::default();
        assert_eq!(params.image_exposure, 0.5);
        assert_eq!(params.image_spotsize, 4);
        assert_eq!(params.diff_exposure, 0.1);
        assert_eq!(params.diff_spotsize, 4);
        assert_eq!(params.diff_brightness, 40000);
        assert_eq!(params.scan_radius, 100.0);
    }

    #[test]
    fn test_submit_enqueues_then_triggers() {
        let (tx, rx) = work_queue();
        let submitter = ExperimentSubmitter::new(tx, TriggerEvent::new());
        assert!(!submitter.trigger().is_set());

        let params = SedParams {
            scan_radius: 50.0,
            ..SedParams::default()
        };
        submitter.submit(params).unwrap();

        assert!(submitter.trigger().is_set());
        let item = rx.try_recv().unwrap();
        assert_eq!(item.task, "sed");
        assert_eq!(item.params.scan_radius, 50.0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_submit_to_closed_queue_fails_without_trigger() {
        let (tx, rx) = work_queue();
        drop(rx);
        let submitter = ExperimentSubmitter::new(tx, TriggerEvent::new());
        assert_eq!(
            submitter.submit(SedParams::default()),
            Err(SubmitError::QueueClosed)
        );
        assert!(!submitter.trigger().is_set());
    }

    #[test]
    fn test_wait_timeout_wakes_worker() {
        let trigger = TriggerEvent::new();
        let worker_trigger = trigger.clone();
        let worker = thread::spawn(move || worker_trigger.wait_timeout(Duration::from_secs(5)));
        trigger.set();
        assert!(worker.join().unwrap());
    }

    #[test]
    fn test_wait_timeout_expires_and_clear_resets() {
        let trigger = TriggerEvent::new();
        assert!(!trigger.wait_timeout(Duration::from_millis(10)));
        trigger.set();
        assert!(trigger.wait_timeout(Duration::from_millis(10)));
        trigger.clear();
        assert!(!trigger.is_set());
        assert!(!trigger.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_work_item_json_shape() {
        let item = WorkItem {
            task: SED_TASK.to_string(),
            params: SedParams::default(),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["task"], "sed");
        assert_eq!(json["params"]["diff_brightness"], 40000);
        assert!(json["params"]["diff_brightness"].is_u64());
        let text = serde_json::to_string(&item.params).unwrap();
        assert!(text.contains("\"diff_brightness\":40000,"));
    }
}

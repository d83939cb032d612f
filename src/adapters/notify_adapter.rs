//! Best-effort order notifications.
//!
//! [`QueuedNotifier`] never blocks the caller: notices go onto a bounded
//! channel with `try_send` and a background thread delivers them through a
//! [`NoticeSink`]. A full queue drops the notice. [`HttpNoticeSink`] POSTs
//! each notice as JSON to a webhook URL.

use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{debug, warn};

use crate::domain::error::PipelineError;
use crate::ports::config_port::ConfigPort;
use crate::ports::notify_port::{NotifyPort, OrderNotice};

pub const DEFAULT_TIMEOUT_MS: i64 = 500;
pub const DEFAULT_QUEUE_CAPACITY: i64 = 64;

/// Delivery side of the notifier, run on the worker thread.
pub trait NoticeSink: Send {
    fn deliver(&mut self, notice: &OrderNotice) -> Result<(), PipelineError>;
}

pub struct HttpNoticeSink {
    client: Client,
    url: String,
}

impl HttpNoticeSink {
    /// `timeout` bounds the whole request, connect included.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Notify {
                reason: format!("http client: {e}"),
            })?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl NoticeSink for HttpNoticeSink {
    fn deliver(&mut self, notice: &OrderNotice) -> Result<(), PipelineError> {
        self.client
            .post(&self.url)
            .json(notice)
            .send()
            .and_then(|response| response.error_for_status())
            .map(|_| ())
            .map_err(|e| PipelineError::Notify {
                reason: format!("{}: {}", self.url, e),
            })
    }
}

pub struct QueuedNotifier {
    sender: Option<SyncSender<OrderNotice>>,
    worker: Option<JoinHandle<()>>,
}

impl QueuedNotifier {
    pub fn spawn(sink: Box<dyn NoticeSink>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::sync_channel(capacity.max(1));
        let worker = thread::spawn(move || run_worker(receiver, sink));
        Self {
            sender: Some(sender),
            worker: Some(worker),
        }
    }

    /// `Ok(None)` when `[notify] url` is unset.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Option<Self>, PipelineError> {
        let Some(url) = config.get_string("notify", "url") else {
            return Ok(None);
        };
        let timeout_ms = config
            .get_int("notify", "timeout_ms", DEFAULT_TIMEOUT_MS)
            .max(1) as u64;
        let capacity = config
            .get_int("notify", "queue_capacity", DEFAULT_QUEUE_CAPACITY)
            .max(1) as usize;
        let sink = HttpNoticeSink::new(url.trim(), Duration::from_millis(timeout_ms))?;
        Ok(Some(Self::spawn(Box::new(sink), capacity)))
    }
}

fn run_worker(receiver: Receiver<OrderNotice>, mut sink: Box<dyn NoticeSink>) {
    for notice in receiver {
        match sink.deliver(&notice) {
            Ok(()) => debug!(instrument = %notice.instrument, side = ?notice.side, "notice delivered"),
            Err(e) => warn!(instrument = %notice.instrument, error = %e, "notice delivery failed"),
        }
    }
}

impl NotifyPort for QueuedNotifier {
    fn notify(&self, notice: &OrderNotice) -> Result<(), PipelineError> {
        let sender = self.sender.as_ref().ok_or_else(|| PipelineError::Notify {
            reason: "notifier shut down".into(),
        })?;
        sender.try_send(notice.clone()).map_err(|e| match e {
            TrySendError::Full(_) => PipelineError::Notify {
                reason: "queue full, notice dropped".into(),
            },
            TrySendError::Disconnected(_) => PipelineError::Notify {
                reason: "worker stopped".into(),
            },
        })
    }
}

impl Drop for QueuedNotifier {
    /// Closes the queue and waits for pending notices to drain.
    fn drop(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("notifier worker panicked");
            }
        }
    }
}

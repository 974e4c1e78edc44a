//! Background worker that groups log events into emails
//!
//! The worker owns the [`EmailSink`]. Events arrive over a channel, are
//! buffered, and are handed to the sink one batch at a time in arrival order.

use crate::batching::BatchingOptions;
use crate::error::{EmailSinkError, Result};
use crate::event::LogEvent;
use crate::sink::EmailSink;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

tokio::task_local! {
    static FLUSHING: ();
}

/// True while the current task is delivering a batch
///
/// Anything a transport logs during delivery must not be queued again.
pub(crate) fn is_flushing() -> bool {
    FLUSHING.try_with(|_| ()).is_ok()
}

/// Shared accounting for the event queue
#[derive(Debug)]
struct QueueState {
    limit: Option<usize>,
    pending: AtomicUsize,
    dropped: AtomicU64,
}

/// Handle used to queue events for the worker
///
/// Cheap to clone. Queueing never blocks; events beyond the queue limit are
/// dropped and counted.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<LogEvent>,
    queue: Arc<QueueState>,
}

impl EventSender {
    /// Queue an event, returning false if it was dropped
    pub fn enqueue(&self, event: LogEvent) -> bool {
        let reserved = match self.queue.limit {
            Some(limit) => self
                .queue
                .pending
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < limit).then(|| n + 1))
                .is_ok(),
            None => {
                self.queue.pending.fetch_add(1, Ordering::AcqRel);
                true
            }
        };

        if !reserved {
            self.queue.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        if self.tx.send(event).is_err() {
            self.queue.pending.fetch_sub(1, Ordering::AcqRel);
            self.queue.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    /// Whether the worker has stopped accepting events
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Events dropped because the queue was full or the worker had stopped
    pub fn dropped_events(&self) -> u64 {
        self.queue.dropped.load(Ordering::Relaxed)
    }
}

enum Control {
    Flush(oneshot::Sender<Result<()>>),
    Shutdown(oneshot::Sender<Result<()>>),
}

/// Controls a running batching worker
///
/// Dropping the guard leaves the worker running until every [`EventSender`]
/// is gone; call [`shutdown`](EmailSinkGuard::shutdown) to send what is left
/// and release the transport deterministically.
#[derive(Debug)]
pub struct EmailSinkGuard {
    control: mpsc::Sender<Control>,
    handle: JoinHandle<()>,
    queue: Arc<QueueState>,
}

impl EmailSinkGuard {
    /// Send everything queued so far and wait for the outcome
    ///
    /// Returns the last delivery error, if any batch failed.
    pub async fn flush(&self) -> Result<()> {
        let (reply, outcome) = oneshot::channel();
        self.control
            .send(Control::Flush(reply))
            .await
            .map_err(|_| EmailSinkError::Closed)?;
        outcome.await.map_err(|_| EmailSinkError::Closed)?
    }

    /// Send the remaining events, dispose the sink and stop the worker
    ///
    /// Returns [`EmailSinkError::Closed`] if the worker had already stopped
    /// or stopped abnormally before replying.
    pub async fn shutdown(self) -> Result<()> {
        let (reply, outcome) = oneshot::channel();
        let result = match self.control.send(Control::Shutdown(reply)).await {
            Ok(()) => outcome.await.unwrap_or(Err(EmailSinkError::Closed)),
            Err(_) => Err(EmailSinkError::Closed),
        };

        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "Email batching worker exited abnormally");
        }

        result
    }

    /// Events dropped because the queue was full or the worker had stopped
    pub fn dropped_events(&self) -> u64 {
        self.queue.dropped.load(Ordering::Relaxed)
    }

    /// Whether the worker task has exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Start a batching worker for `sink` on the current tokio runtime
///
/// Fails if called outside a runtime.
pub fn spawn_batching(sink: EmailSink, options: BatchingOptions) -> Result<(EmailSinkGuard, EventSender)> {
    let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
        EmailSinkError::invalid_argument("email batching must be started inside a tokio runtime")
    })?;

    let queue = Arc::new(QueueState {
        limit: options.queue_limit,
        pending: AtomicUsize::new(0),
        dropped: AtomicU64::new(0),
    });
    let (tx, events) = mpsc::unbounded_channel();
    let (control_tx, control) = mpsc::channel(1);

    let worker = BatchWorker {
        sink,
        events,
        control,
        queue: queue.clone(),
        buffer: Vec::new(),
        first_event_pending: options.eagerly_emit_first_event,
        options,
    };
    let handle = runtime.spawn(worker.run());

    Ok((
        EmailSinkGuard {
            control: control_tx,
            handle,
            queue: queue.clone(),
        },
        EventSender { tx, queue },
    ))
}

struct BatchWorker {
    sink: EmailSink,
    options: BatchingOptions,
    events: mpsc::UnboundedReceiver<LogEvent>,
    control: mpsc::Receiver<Control>,
    queue: Arc<QueueState>,
    buffer: Vec<LogEvent>,
    first_event_pending: bool,
}

impl BatchWorker {
    async fn run(mut self) {
        tracing::debug!(
            batch_size_limit = self.options.batch_size_limit,
            period_ms = self.options.period_ms,
            "Email batching worker started"
        );

        let period = self.options.flush_period();
        let mut ticker = (!period.is_zero()).then(|| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        let mut events_open = true;
        let mut control_open = true;

        let shutdown_reply = loop {
            if !events_open && !control_open {
                break None;
            }

            tokio::select! {
                control = self.control.recv(), if control_open => match control {
                    Some(Control::Flush(reply)) => {
                        self.drain();
                        let _ = reply.send(self.emit_ready(true).await);
                    }
                    Some(Control::Shutdown(reply)) => break Some(reply),
                    None => control_open = false,
                },
                event = self.events.recv(), if events_open => match event {
                    Some(event) => {
                        self.accept(event);
                        self.drain();
                        let force = period.is_zero() || std::mem::take(&mut self.first_event_pending);
                        let _ = self.emit_ready(force).await;
                    }
                    None => events_open = false,
                },
                _ = tick(&mut ticker) => {
                    self.drain();
                    let _ = self.emit_ready(true).await;
                }
            }
        };

        let result = self.finish().await;
        match shutdown_reply {
            Some(reply) => {
                let _ = reply.send(result);
            }
            None => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "Email sink did not shut down cleanly");
                }
            }
        }

        tracing::debug!("Email batching worker stopped");
    }

    fn accept(&mut self, event: LogEvent) {
        self.queue.pending.fetch_sub(1, Ordering::AcqRel);
        self.buffer.push(event);
    }

    /// Move everything already queued into the buffer
    fn drain(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.accept(event);
        }
    }

    /// Emit full batches, or everything buffered when `force` is set
    async fn emit_ready(&mut self, force: bool) -> Result<()> {
        let limit = self.options.effective_batch_size();
        let mut outcome = Ok(());

        while self.buffer.len() >= limit || (force && !self.buffer.is_empty()) {
            let take = limit.min(self.buffer.len());
            let batch: Vec<LogEvent> = self.buffer.drain(..take).collect();
            if let Err(e) = self.emit(&batch).await {
                outcome = Err(e);
            }
        }

        outcome
    }

    /// Deliver one batch; a failed batch is logged and dropped
    async fn emit(&self, batch: &[LogEvent]) -> Result<()> {
        let result = FLUSHING.scope((), self.sink.emit_batch(batch)).await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, events = batch.len(), "Failed to send log email");
        }
        result
    }

    async fn finish(mut self) -> Result<()> {
        // Closed first so events arriving during the final send are refused
        // and counted instead of being lost with the receiver
        self.events.close();
        self.drain();
        let emitted = self.emit_ready(true).await;

        let disposed = self.sink.dispose().await;
        if let Err(e) = &disposed {
            tracing::warn!(error = %e, "Failed to release email transport");
        }

        emitted.and(disposed)
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Level;
    use crate::options::EmailSinkOptions;
    use crate::transport::InMemoryTransport;

    fn sink(transport: &InMemoryTransport) -> EmailSink {
        let options = EmailSinkOptions::new("from@test.com", "to@test.com", "localhost").body_template("{Message}");
        EmailSink::new(options, transport.clone()).unwrap()
    }

    #[test]
    fn test_not_flushing_outside_scope() {
        assert!(!is_flushing());
    }

    #[tokio::test]
    async fn test_flushing_inside_scope() {
        assert!(FLUSHING.scope((), async { is_flushing() }).await);
    }

    #[test]
    fn test_spawn_outside_runtime_fails() {
        let transport = InMemoryTransport::new();
        let err = spawn_batching(sink(&transport), BatchingOptions::default()).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[tokio::test]
    async fn test_queue_limit_drops_overflow() {
        let transport = InMemoryTransport::new();
        let options = BatchingOptions::default()
            .batch_size_limit(100)
            .period(std::time::Duration::from_secs(3600))
            .eagerly_emit_first_event(false)
            .queue_limit(Some(2));
        let (guard, sender) = spawn_batching(sink(&transport), options).unwrap();

        // The worker cannot run until this task yields, so nothing is dequeued yet
        assert!(sender.enqueue(LogEvent::new(Level::Error, "1")));
        assert!(sender.enqueue(LogEvent::new(Level::Error, "2")));
        assert!(!sender.enqueue(LogEvent::new(Level::Error, "3")));
        assert_eq!(guard.dropped_events(), 1);
        assert_eq!(sender.dropped_events(), 1);

        guard.shutdown().await.unwrap();
        let sent = transport.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body(), "1\n2\n");
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_is_dropped() {
        let transport = InMemoryTransport::new();
        let (guard, sender) = spawn_batching(sink(&transport), BatchingOptions::default()).unwrap();

        guard.shutdown().await.unwrap();
        assert!(sender.is_closed());
        assert!(!sender.enqueue(LogEvent::new(Level::Error, "late")));
        assert_eq!(transport.release_count(), 1);
    }
}

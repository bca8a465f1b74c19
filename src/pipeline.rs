use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use crate::error::SinkError;
use crate::sink::LogSink;

enum Message {
    Entry(Vec<u8>),
    Flush(oneshot::Sender<()>),
}

/// Hands encoded entries to a [`LogSink`] through a bounded channel and a
/// background task.
///
/// Submitting never blocks: when the channel is full the entry is dropped
/// and counted. Sink I/O is fully decoupled from the threads that log.
#[derive(Clone)]
pub struct Pipeline {
    sender: mpsc::Sender<Message>,
    /// Total entries submitted.
    pub total_events: Arc<AtomicU64>,
    /// Entries handed to the sink by the background task.
    pub delivered_events: Arc<AtomicU64>,
    /// Entries dropped because the channel was full or the sink failed.
    pub dropped_events: Arc<AtomicU64>,
}

impl Pipeline {
    /// Create a pipeline and spawn the task that pulls entries from the
    /// channel and writes them to `sink` in batches.
    ///
    /// Minimal thresholds are enforced for `buffer`, `batch_size` and
    /// `flush_interval` to avoid degenerate configurations. Must be called
    /// from within a tokio runtime.
    pub fn new(
        sink: Arc<dyn LogSink>,
        buffer: usize,
        batch_size: usize,
        flush_interval: Duration,
    ) -> (Self, JoinHandle<()>) {
        let buffer = buffer.max(16);
        let batch_size = batch_size.max(1);
        let flush_interval = flush_interval.max(Duration::from_millis(10));

        let (tx, mut rx) = mpsc::channel::<Message>(buffer);

        let total_events = Arc::new(AtomicU64::new(0));
        let delivered_events = Arc::new(AtomicU64::new(0));
        let dropped_events = Arc::new(AtomicU64::new(0));

        let delivered_bg = Arc::clone(&delivered_events);
        let dropped_bg = Arc::clone(&dropped_events);

        let handle = tokio::spawn(async move {
            let mut batch = Vec::with_capacity(batch_size);

            loop {
                tokio::select! {
                    message = rx.recv() => match message {
                        Some(Message::Entry(entry)) => {
                            batch.push(entry);
                            if batch.len() >= batch_size {
                                send_batch(&*sink, &mut batch, &delivered_bg, &dropped_bg).await;
                            }
                        }
                        Some(Message::Flush(ack)) => {
                            send_batch(&*sink, &mut batch, &delivered_bg, &dropped_bg).await;
                            if let Err(e) = sink.flush().await {
                                eprintln!("error flushing log sink: {}", e);
                            }
                            let _ = ack.send(());
                        }
                        None => {
                            send_batch(&*sink, &mut batch, &delivered_bg, &dropped_bg).await;
                            if let Err(e) = sink.flush().await {
                                eprintln!("error flushing log sink: {}", e);
                            }
                            break;
                        }
                    },
                    _ = sleep(flush_interval) => {
                        if !batch.is_empty() {
                            send_batch(&*sink, &mut batch, &delivered_bg, &dropped_bg).await;
                        }
                    }
                }
            }
        });

        (
            Self {
                sender: tx,
                total_events,
                delivered_events,
                dropped_events,
            },
            handle,
        )
    }

    /// Queue an entry for delivery. Never waits.
    pub fn submit(&self, entry: Vec<u8>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = self.sender.try_send(Message::Entry(entry)) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
            match e {
                mpsc::error::TrySendError::Full(_) => eprintln!("log channel full, dropping log entry"),
                mpsc::error::TrySendError::Closed(_) => eprintln!("log channel closed, dropping log entry"),
            }
        }
    }

    /// Wait until every entry submitted before this call reached the sink.
    pub async fn flush(&self) -> Result<(), SinkError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Message::Flush(tx))
            .await
            .map_err(|_| SinkError::Closed)?;
        rx.await.map_err(|_| SinkError::Closed)
    }
}

async fn send_batch(
    sink: &dyn LogSink,
    batch: &mut Vec<Vec<u8>>,
    delivered: &AtomicU64,
    dropped: &AtomicU64,
) {
    let total = batch.len() as u64;
    let mut sent = 0u64;
    for entry in batch.iter() {
        if let Err(e) = sink.send(entry).await {
            eprintln!("error sending log batch: {}", e);
            break;
        }
        sent += 1;
    }

    delivered.fetch_add(sent, Ordering::Relaxed);
    dropped.fetch_add(total - sent, Ordering::Relaxed);
    batch.clear();
}

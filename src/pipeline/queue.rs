use std::sync::Mutex as StdMutex;

use tokio::sync::{Mutex, mpsc};

/// A unit of work handed to a worker: the job's slot index and its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTicket {
    pub index: usize,
    pub url: String,
}

/// Items carried by the [`JobQueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem {
    Job(JobTicket),
    /// Tells the worker that receives it to stop pulling.
    Stop,
}

/// Bounded multi-consumer FIFO shared by all workers.
///
/// The producer fills it (jobs first, then one `Stop` per worker) and closes
/// it before the workers start. `dequeue` suspends until an item is available;
/// a closed and drained queue yields `Stop`, so no worker waits forever.
pub struct JobQueue {
    sender: StdMutex<Option<mpsc::Sender<QueueItem>>>,
    receiver: Mutex<mpsc::Receiver<QueueItem>>,
}

impl JobQueue {
    pub fn bounded(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            sender: StdMutex::new(Some(tx)),
            receiver: Mutex::new(rx),
        }
    }

    /// Appends an item, waiting for room if the queue is full.
    ///
    /// Returns `false` if the queue has already been closed.
    pub async fn enqueue(&self, item: QueueItem) -> bool {
        let sender = match self.sender.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        match sender {
            Some(tx) => tx.send(item).await.is_ok(),
            None => false,
        }
    }

    /// Stops accepting new items. Items already queued are still delivered.
    pub fn close(&self) {
        let mut guard = match self.sender.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.take();
    }

    /// Takes the next item, suspending the caller while the queue is empty.
    pub async fn dequeue(&self) -> QueueItem {
        let mut rx = self.receiver.lock().await;
        rx.recv().await.unwrap_or(QueueItem::Stop)
    }
}

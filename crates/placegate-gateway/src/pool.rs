use std::sync::Mutex;
use std::thread::JoinHandle;

use crossbeam_channel::{Sender, bounded};
use tracing::warn;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size worker pool fed by a bounded queue.
///
/// Pool size bounds the number of in-flight connections; the queue bounds
/// how many accepted sockets can wait for a worker. When the queue is full
/// the submitting thread blocks, which in practice stalls the accept loop —
/// back-pressure is observable through `queue_depth` and the saturation
/// warning rather than through dropped connections.
pub struct WorkerPool {
    tx: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(workers: usize, queue_cap: usize) -> Self {
        let (tx, rx) = bounded::<Job>(queue_cap);

        let handles = (0..workers)
            .map(|_| {
                let rx = rx.clone();
                std::thread::spawn(move || {
                    // Runs until the sender side is dropped and the queue
                    // has drained
                    for job in rx {
                        job();
                    }
                })
            })
            .collect();

        Self {
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(handles),
        }
    }

    /// Submit a job. Blocks while the queue is full; drops the job only if
    /// the pool has already been shut down.
    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self
            .tx
            .lock()
            .expect("worker pool sender lock poisoned")
            .clone();
        let Some(sender) = sender else {
            warn!("Worker pool is shut down, dropping job");
            return;
        };

        if sender.is_full() {
            warn!(
                "Worker queue saturated ({} queued), submission will block",
                sender.len()
            );
        }
        if sender.send(Box::new(job)).is_err() {
            warn!("Worker pool is shut down, dropping job");
        }
    }

    /// Jobs accepted but not yet picked up by a worker.
    pub fn queue_depth(&self) -> usize {
        self.tx
            .lock()
            .expect("worker pool sender lock poisoned")
            .as_ref()
            .map(Sender::len)
            .unwrap_or(0)
    }

    /// Stop accepting work and wait for every queued and in-flight job to
    /// finish.
    pub fn shutdown(&self) {
        drop(
            self.tx
                .lock()
                .expect("worker pool sender lock poisoned")
                .take(),
        );
        let mut workers = self.workers.lock().expect("worker pool join lock poisoned");
        for worker in workers.drain(..) {
            let _ = worker.join();
        }
    }
}

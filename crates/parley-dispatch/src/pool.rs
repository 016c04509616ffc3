// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded worker pool for conversation handlers.
//!
//! Jobs queue in a bounded channel and at most `workers` of them run at
//! once. Submitting to a full queue fails immediately instead of waiting.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

use parley_core::ParleyError;

pub type Job = BoxFuture<'static, ()>;

pub struct WorkerPool {
    queue: mpsc::Sender<Job>,
    runner: JoinHandle<()>,
}

impl WorkerPool {
    /// Spawns the pool's runner; call from within a tokio runtime.
    pub fn new(workers: usize, queue_depth: usize) -> Self {
        let (queue, rx) = mpsc::channel(queue_depth.max(1));
        let runner = tokio::spawn(run(rx, workers.max(1)));
        Self { queue, runner }
    }

    /// Queue `job`, failing with `Internal` when the queue is full.
    pub fn submit(&self, job: Job) -> Result<(), ParleyError> {
        match self.queue.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(ParleyError::Internal(
                "conversation worker queue full, delivery dropped".into(),
            )),
            Err(TrySendError::Closed(_)) => {
                Err(ParleyError::Internal("conversation worker pool stopped".into()))
            }
        }
    }

    /// Stop accepting jobs and wait for queued and running ones to finish.
    pub async fn shutdown(self) {
        drop(self.queue);
        if let Err(e) = self.runner.await {
            warn!(error = %e, "worker pool runner failed");
        }
    }
}

async fn run(mut rx: mpsc::Receiver<Job>, workers: usize) {
    let permits = Arc::new(Semaphore::new(workers));
    let mut running = JoinSet::new();

    while let Some(job) = rx.recv().await {
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };
        running.spawn(async move {
            let _permit = permit;
            job.await;
        });
        while let Some(done) = running.try_join_next() {
            report(done);
        }
    }

    while let Some(done) = running.join_next().await {
        report(done);
    }
    debug!("worker pool drained");
}

fn report(done: Result<(), tokio::task::JoinError>) {
    if let Err(e) = done {
        warn!(error = %e, "conversation job panicked");
    }
}

//! Continuation scheduling
//!
//! Every delayed or asynchronous step comes back to the orchestrator as a
//! [`Command::Resume`] tagged with the epoch it was scheduled under. Tasks
//! hold only a weak sender so they never keep a shut-down orchestrator alive.

use super::{Command, Continuation, Step};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc::WeakUnboundedSender;
use tokio::task::AbortHandle;
use tokio::time::{sleep, sleep_until, Instant};

#[derive(Clone)]
pub(super) struct Scheduler {
    tx: WeakUnboundedSender<Command>,
}

impl Scheduler {
    pub(super) fn new(tx: WeakUnboundedSender<Command>) -> Self {
        Self { tx }
    }

    /// Deliver `step` after `delay`
    pub(super) fn after(&self, epoch: u64, delay: Duration, step: Step) -> AbortHandle {
        self.spawn(epoch, async move {
            sleep(delay).await;
            step
        })
    }

    /// Run `work` off the actor and deliver the step it produces
    pub(super) fn spawn<F>(&self, epoch: u64, work: F) -> AbortHandle
    where
        F: Future<Output = Step> + Send + 'static,
    {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let step = work.await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Command::Resume(Continuation { epoch, step }));
            }
        })
        .abort_handle()
    }

    /// Deliver `make(n)` at `start + n * period` for n = 1, 2, ...
    ///
    /// Stops after `count` deliveries when given, otherwise runs until aborted.
    /// Ticks are anchored to the start instant so they do not drift.
    pub(super) fn every<F>(&self, epoch: u64, period: Duration, count: Option<u32>, make: F) -> AbortHandle
    where
        F: Fn(u32) -> Step + Send + 'static,
    {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let start = Instant::now();
            let mut n: u32 = 0;
            loop {
                n += 1;
                if count.is_some_and(|c| n > c) {
                    break;
                }
                sleep_until(start + period * n).await;
                let Some(tx) = tx.upgrade() else {
                    break;
                };
                if tx
                    .send(Command::Resume(Continuation { epoch, step: make(n) }))
                    .is_err()
                {
                    break;
                }
            }
        })
        .abort_handle()
    }
}

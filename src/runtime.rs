//! Coordinator runtime: single-task input loop plus reactor timers.
//!
//! ```text
//!  ┌─────────────────────────────────────────────────────────────┐
//!  │  futures_lite::future::block_on                             │
//!  │  ┌───────────────────────────────────────────────────────┐  │
//!  │  │  edge_executor::LocalExecutor                         │  │
//!  │  │                                                       │  │
//!  │  │  ┌───────────────┐      ┌─────────────────────────┐   │  │
//!  │  │  │ drain loop    │─arm─▶│ timer task (per target) │   │  │
//!  │  │  │ INPUTS.recv() │◀─────│ Timer::after → Timeout  │   │  │
//!  │  │  └───────────────┘      └─────────────────────────┘   │  │
//!  │  └───────────────────────────────────────────────────────┘  │
//!  └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The drain loop is the only place the [`Coordinator`] is touched.
//! Timer requests made during a dispatch are queued and applied after
//! it returns; each armed timer is an `async-io-mini` task that sends
//! `Input::Timeout(tag)` into the same channel, waiting for room when it
//! is full.  Dropping a task cancels it.  A fire that was already queued
//! when its owner finished carries a stale tag and is discarded by the
//! coordinator.

use std::collections::HashMap;

use core::time::Duration;

use chrono::Utc;
use edge_executor::{LocalExecutor, Task};
use log::{debug, info};

use crate::app::ports::{CabinetIo, InventoryBackend, TimerPort};
use crate::app::service::Coordinator;
use crate::bus::channels::{Input, InputChannel};
use crate::fsm::{TimeoutTag, TimerTarget};

/// Upper bound on concurrently live tasks (drain loop + timers).
const MAX_TASKS: usize = 64;

// ── Timer requests ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerRequest {
    Arm(TimeoutTag, Duration),
    Cancel(TimeoutTag),
}

/// [`TimerPort`] that only records what was asked.  The runtime applies
/// the requests once the handler has returned.
#[derive(Debug, Default)]
pub struct TimerQueue {
    requests: Vec<TimerRequest>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, TimerRequest> {
        self.requests.drain(..)
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

impl TimerPort for TimerQueue {
    fn arm(&mut self, tag: TimeoutTag, after: Duration) {
        self.requests.push(TimerRequest::Arm(tag, after));
    }

    fn cancel(&mut self, tag: &TimeoutTag) {
        self.requests.push(TimerRequest::Cancel(*tag));
    }
}

// ── Runtime ──────────────────────────────────────────────────

pub struct Runtime<'a, B: InventoryBackend, IO: CabinetIo> {
    coordinator: Coordinator<B>,
    io: IO,
    inputs: &'a InputChannel,
    /// Live timer per owner, with the epoch it was armed for.
    timers: HashMap<TimerTarget, (u32, Task<()>)>,
}

impl<'a, B: InventoryBackend, IO: CabinetIo> Runtime<'a, B, IO> {
    pub fn new(coordinator: Coordinator<B>, io: IO, inputs: &'a InputChannel) -> Self {
        Self {
            coordinator,
            io,
            inputs,
            timers: HashMap::new(),
        }
    }

    pub fn coordinator(&self) -> &Coordinator<B> {
        &self.coordinator
    }

    pub fn io(&self) -> &IO {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut IO {
        &mut self.io
    }

    pub fn into_parts(self) -> (Coordinator<B>, IO) {
        (self.coordinator, self.io)
    }

    /// Number of timers currently armed.
    pub fn live_timers(&self) -> usize {
        self.timers.len()
    }

    /// Drive the input loop on the current thread until `Input::Shutdown`.
    pub fn run_blocking(&mut self) {
        let executor: LocalExecutor<'a, MAX_TASKS> = LocalExecutor::new();
        info!("Runtime: started");
        futures_lite::future::block_on(futures_lite::future::or(
            self.drain_loop(&executor),
            executor.run(core::future::pending::<()>()),
        ));
        // Tasks must not outlive their executor.
        self.timers.clear();
        info!("Runtime: stopped");
    }

    async fn drain_loop(&mut self, executor: &LocalExecutor<'a, MAX_TASKS>) {
        loop {
            let input = self.inputs.receive().await;
            if !self.dispatch(input, executor) {
                break;
            }
        }
    }

    /// Hand one input to the coordinator.  Returns `false` on shutdown.
    fn dispatch(&mut self, input: Input, executor: &LocalExecutor<'a, MAX_TASKS>) -> bool {
        let now = Utc::now();
        let mut queue = TimerQueue::new();
        match input {
            Input::Command(cmd) => {
                self.coordinator
                    .handle_command(cmd, &mut self.io, &mut queue, now);
            }
            Input::Device { drawer, event } => {
                self.coordinator
                    .handle_device_event(&drawer, event, &mut self.io, &mut queue, now);
            }
            Input::Timeout(tag) => {
                if self.timers.get(&tag.target).is_some_and(|(epoch, _)| *epoch == tag.epoch) {
                    self.timers.remove(&tag.target);
                }
                self.coordinator
                    .handle_timeout(tag, &mut self.io, &mut queue, now);
            }
            Input::BarcodeScanned(raw) => {
                self.coordinator.handle_scan(&raw, &mut self.io, now);
            }
            Input::Shutdown => {
                info!("Runtime: shutdown requested");
                return false;
            }
        }
        self.apply(&mut queue, executor);
        true
    }

    fn apply(&mut self, queue: &mut TimerQueue, executor: &LocalExecutor<'a, MAX_TASKS>) {
        for req in queue.drain() {
            match req {
                TimerRequest::Arm(tag, after) => {
                    let inputs = self.inputs;
                    let task = executor.spawn(async move {
                        async_io_mini::Timer::after(after).await;
                        deliver_timeout(inputs, tag).await;
                    });
                    // Replacing an entry drops, and so cancels, the old task.
                    self.timers.insert(tag.target, (tag.epoch, task));
                    debug!("Timer: armed {:?} for {:?}", tag, after);
                }
                TimerRequest::Cancel(tag) => {
                    if self.timers.get(&tag.target).is_some_and(|(epoch, _)| *epoch == tag.epoch) {
                        self.timers.remove(&tag.target);
                        debug!("Timer: cancelled {:?}", tag);
                    }
                }
            }
        }
    }
}

/// Queue a fired timeout.  Unlike [`post`](crate::bus::channels::post)
/// this never drops: a timeout is the only way out of an armed state.
async fn deliver_timeout(inputs: &InputChannel, tag: TimeoutTag) {
    inputs.send(Input::Timeout(tag)).await;
}

//! Millisecond interval scheduler for the event loop.
//!
//! The consumer loop blocks on the edge queue with a timeout equal to
//! [`Scheduler::time_to_next`], then calls [`Scheduler::poll`] which
//! notifies a [`SchedulerDelegate`] for every job that has come due.
//! Timers therefore never run inside the queue wait or an ISR.
//!
//! ```text
//!  ┌────────────┐   timeout    ┌───────────────┐
//!  │ EdgeQueue  │◀─────────────│   Scheduler   │
//!  │ wait_pop() │              │ time_to_next()│
//!  └─────┬──────┘              └───────┬───────┘
//!        │ edge                        │ poll(now)
//!        ▼                             ▼
//!   SwitchMonitor               SchedulerDelegate
//! ```

use log::info;

/// Work the event loop runs on a fixed interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    /// Refresh and log the bound-peer list.
    BoundDump,
}

/// Receives due jobs from [`Scheduler::poll`].
pub trait SchedulerDelegate {
    fn on_job_due(&mut self, job: Job);
}

/// Maximum number of concurrent schedules (stack-allocated).
const MAX_SCHEDULES: usize = 4;

#[derive(Debug, Clone)]
struct Entry {
    label: &'static str,
    job: Job,
    interval_ms: u64,
    next_due_ms: u64,
}

/// Fixed-interval job scheduler.
#[derive(Debug)]
pub struct Scheduler {
    entries: heapless::Vec<Entry, MAX_SCHEDULES>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            entries: heapless::Vec::new(),
        }
    }

    /// Run `job` every `interval_ms`, first at `now_ms + interval_ms`.
    /// Returns the slot index, or `None` if full.
    pub fn add(
        &mut self,
        label: &'static str,
        job: Job,
        interval_ms: u32,
        now_ms: u64,
    ) -> Option<usize> {
        let interval_ms = u64::from(interval_ms.max(1));
        let entry = Entry {
            label,
            job,
            interval_ms,
            next_due_ms: now_ms.saturating_add(interval_ms),
        };
        self.entries.push(entry).ok()?;
        info!("Scheduler: '{label}' every {interval_ms}ms");
        Some(self.entries.len() - 1)
    }

    /// Milliseconds until the next job is due (0 if overdue), or `None`
    /// when nothing is scheduled.
    pub fn time_to_next(&self, now_ms: u64) -> Option<u64> {
        self.entries
            .iter()
            .map(|e| e.next_due_ms.saturating_sub(now_ms))
            .min()
    }

    /// Fire every job due at `now_ms`.  A job that missed several
    /// intervals fires once and is rescheduled from `now_ms`.
    pub fn poll(&mut self, now_ms: u64, delegate: &mut impl SchedulerDelegate) -> usize {
        let mut fired = 0;
        for e in self.entries.iter_mut() {
            if now_ms >= e.next_due_ms {
                log::debug!("Scheduler: '{}' due", e.label);
                e.next_due_ms = now_ms.saturating_add(e.interval_ms);
                delegate.on_job_due(e.job);
                fired += 1;
            }
        }
        fired
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/*!
 * Process Queue
 *
 * Ranked waiting line: higher rank first, FIFO within a rank. A process
 * sits in at most one queue; joining another one takes it out of the
 * previous queue.
 */

use super::traits::ProcessQueue;
use crate::core::types::{Name, Priority, ServicePriority};
use crate::process::Process;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::warn;

/// Ordering key of a queue entry
pub type Rank = (ServicePriority, Priority);

#[derive(Debug)]
struct QueueEntry {
    process: Process,
    rank: Rank,
}

struct QueueState {
    name: Name,
    entries: RefCell<VecDeque<QueueEntry>>,
    me: Weak<QueueState>,
}

/// Shared handle to a waiting line
#[derive(Clone)]
pub struct Queue {
    inner: Rc<QueueState>,
}

impl Queue {
    pub fn new(name: impl AsRef<str>) -> Self {
        let name: Name = name.as_ref().into();
        Self {
            inner: Rc::new_cyclic(|me| QueueState {
                name,
                entries: RefCell::new(VecDeque::new()),
                me: me.clone(),
            }),
        }
    }

    pub fn name(&self) -> Name {
        self.inner.name.clone()
    }

    /// Insert ordered by the process priority
    pub fn insert(&self, process: &Process) {
        self.inner.insert(process);
    }

    /// Insert ordered by `rank`
    pub fn insert_ranked(&self, process: &Process, rank: Rank) {
        self.inner.insert_ranked(process, rank);
    }

    pub fn remove(&self, process: &Process) -> bool {
        self.inner.remove(process)
    }

    /// Take the first process out of the queue
    pub fn pop_front(&self) -> Option<Process> {
        let entry = self.inner.entries.borrow_mut().pop_front()?;
        entry.process.clear_queued();
        Some(entry.process)
    }

    pub fn front(&self) -> Option<Process> {
        self.inner.entries.borrow().front().map(|e| e.process.clone())
    }

    pub fn contains(&self, process: &Process) -> bool {
        self.inner.position(process).is_some()
    }

    /// Waiting processes in service order
    pub fn processes(&self) -> Vec<Process> {
        self.inner
            .entries
            .borrow()
            .iter()
            .map(|e| e.process.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `other` is this same queue
    pub fn ptr_eq(&self, other: &Queue) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl QueueState {
    fn position(&self, process: &Process) -> Option<usize> {
        self.entries
            .borrow()
            .iter()
            .position(|e| e.process.id() == process.id())
    }

    fn insert_ranked(&self, process: &Process, rank: Rank) {
        if let Some(previous) = process.queue() {
            let same = Rc::as_ptr(&previous) as *const () == self as *const QueueState as *const ();
            if !same {
                warn!(
                    pid = process.id(),
                    from = %previous.name(),
                    to = %self.name,
                    "process moved between queues"
                );
            }
            previous.remove(process);
        }
        if let Ok(kernel) = process.kernel() {
            if kernel.unschedule(process) {
                warn!(pid = process.id(), queue = %self.name, "queued process removed from the calendar");
            }
        }

        let mut entries = self.entries.borrow_mut();
        let at = entries
            .iter()
            .position(|e| e.rank < rank)
            .unwrap_or(entries.len());
        entries.insert(
            at,
            QueueEntry {
                process: process.clone(),
                rank,
            },
        );
        drop(entries);
        let me: Weak<dyn ProcessQueue> = self.me.clone();
        process.mark_queued(me);
    }
}

impl ProcessQueue for QueueState {
    fn name(&self) -> Name {
        self.name.clone()
    }

    fn insert(&self, process: &Process) {
        self.insert_ranked(process, (0, process.priority()));
    }

    fn remove(&self, process: &Process) -> bool {
        let Some(at) = self.position(process) else {
            return false;
        };
        let entry = self.entries.borrow_mut().remove(at);
        if let Some(entry) = entry {
            entry.process.clear_queued();
        }
        true
    }

    fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

impl fmt::Debug for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("name", &self.name)
            .field("len", &self.entries.borrow().len())
            .finish()
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

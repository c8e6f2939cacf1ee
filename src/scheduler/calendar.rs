/*!
 * Event Calendar
 *
 * Binary heap of activation entries ordered by time, then priority (higher
 * first), then insertion order. Rescheduling and unscheduling are O(1):
 * superseded heap entries are left in place and skipped when they surface,
 * and the heap is compacted once they dominate.
 */

use super::traits::Calendar;
use crate::core::limits::CALENDAR_COMPACT_SLACK;
use crate::core::types::{Priority, ProcessId, SimTime};
use crate::process::{Process, ProcessRef};
use ahash::AHashMap;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::trace;

/// One scheduled activation
#[derive(Debug, Clone)]
struct Entry {
    time: SimTime,
    priority: Priority,
    seq: u64,
    process: ProcessRef,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap, so "greater" means "runs first"
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| self.priority.cmp(&other.priority))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Default calendar implementation
#[derive(Debug, Default)]
pub struct EventCalendar {
    heap: BinaryHeap<Entry>,
    // process -> (seq, time) of its only valid entry
    live: AHashMap<ProcessId, (u64, SimTime)>,
    next_seq: u64,
}

impl EventCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Heap entries including superseded ones
    pub fn heap_len(&self) -> usize {
        self.heap.len()
    }

    fn is_valid(&self, entry: &Entry) -> bool {
        matches!(self.live.get(&entry.process.id()), Some((seq, _)) if *seq == entry.seq)
    }

    fn maybe_compact(&mut self) {
        if self.heap.len() > 2 * self.live.len() + CALENDAR_COMPACT_SLACK {
            let before = self.heap.len();
            let live = &self.live;
            self.heap
                .retain(|e| matches!(live.get(&e.process.id()), Some((seq, _)) if *seq == e.seq));
            trace!(before, after = self.heap.len(), "calendar compacted");
        }
    }

    /// Discard superseded or orphaned entries sitting at the head
    fn settle_head(&mut self) {
        while let Some(head) = self.heap.peek() {
            if !self.is_valid(head) {
                self.heap.pop();
                continue;
            }
            if !head.process.is_alive() {
                let id = head.process.id();
                self.heap.pop();
                self.live.remove(&id);
                continue;
            }
            break;
        }
    }
}

impl Calendar for EventCalendar {
    fn schedule_at(&mut self, process: &Process, time: SimTime) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.live.insert(process.id(), (seq, time));
        self.heap.push(Entry {
            time,
            priority: process.priority(),
            seq,
            process: process.downgrade(),
        });
        self.maybe_compact();
    }

    fn unschedule(&mut self, process: &Process) -> bool {
        let existed = self.live.remove(&process.id()).is_some();
        if existed {
            self.maybe_compact();
        }
        existed
    }

    fn is_scheduled(&self, process: &Process) -> bool {
        self.live.contains_key(&process.id())
    }

    fn activation_time(&self, process: &Process) -> Option<SimTime> {
        self.live.get(&process.id()).map(|(_, time)| *time)
    }

    fn pop_next(&mut self, until: SimTime) -> Option<(SimTime, Process)> {
        loop {
            self.settle_head();
            let head = self.heap.peek()?;
            if head.time > until {
                return None;
            }
            let entry = self.heap.pop()?;
            self.live.remove(&entry.process.id());
            // settle_head checked liveness; a failed upgrade here means the
            // last strong handle went away in between, so just move on
            if let Some(process) = entry.process.upgrade() {
                return Some((entry.time, process));
            }
        }
    }

    fn peek_time(&mut self) -> Option<SimTime> {
        self.settle_head();
        self.heap.peek().map(|e| e.time)
    }

    fn len(&self) -> usize {
        self.live.len()
    }

    fn clear(&mut self) {
        self.heap.clear();
        self.live.clear();
    }
}

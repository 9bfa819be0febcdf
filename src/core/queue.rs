//! # Priority queue and shared scheduler state.
//!
//! [`TaskQueue`] is the single coarse-locked structure behind the
//! scheduler: the pending-task heap, the currently-running slot, the
//! parallel-task set, and the two counters. Everything that must stay
//! mutually consistent (dedup scan, counts, dequeue-to-running handoff)
//! mutates under one lock; the lock is never held across payload
//! execution.
//!
//! ## Priority keys
//! Effective key = `band base + submission counter`. The counter is shared
//! by all bands and increases monotonically, so:
//! - within a band, earlier submissions have smaller keys (strict FIFO)
//! - across bands, every `Asap` key sorts below every `Fifo` key, which
//!   sorts below every `AddOrMoveToEnd` key
//!
//! ## Counter drift
//! `tracked_total` relies on a counter that deliberately over-reports:
//! entries cancelled while queued keep their count until `accurate_total`
//! observes a true total of zero and resets it. Callers that need the
//! exact figure pay for the recount; status displays take the cheap one.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::tasks::{ExecutionPreference, Payload, TaskHandle};

/// One queued unit of work: priority key, shared handle, payload.
pub(crate) struct Entry {
    pub(crate) key: u64,
    pub(crate) handle: TaskHandle,
    pub(crate) payload: Payload,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // reversed: BinaryHeap is a max-heap, lowest key must dequeue first
    fn cmp(&self, other: &Self) -> Ordering {
        other.key.cmp(&self.key)
    }
}

/// Coarse-locked scheduler state. Owned by the scheduler behind a single
/// `std::sync::Mutex`.
pub(crate) struct TaskQueue {
    heap: BinaryHeap<Entry>,
    /// Monotonic submission counter, shared by all bands.
    offset: u64,
    /// Cheap queued-entry count; includes cancelled entries (drifts).
    queued_count: usize,
    /// The task currently executed by the worker, if any.
    current: Option<TaskHandle>,
    /// Fire-and-forget parallel tasks, tracked for counting only.
    parallel: Vec<TaskHandle>,
}

impl TaskQueue {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            offset: 0,
            queued_count: 0,
            current: None,
            parallel: Vec::new(),
        }
    }

    /// Enqueues with a fresh priority key derived from the handle's band.
    pub(crate) fn push(&mut self, handle: TaskHandle, payload: Payload) {
        let key = handle.preference().band_base() + self.offset;
        self.offset += 1;
        self.heap.push(Entry {
            key,
            handle,
            payload,
        });
        self.queued_count += 1;
    }

    /// Puts a popped entry back at its original position. Used by the
    /// worker while task processing is disabled; the count was never
    /// decremented for a paused pop, so it is not touched here.
    pub(crate) fn requeue(&mut self, entry: Entry) {
        self.heap.push(entry);
    }

    /// Removes and returns the lowest-key entry.
    pub(crate) fn pop(&mut self) -> Option<Entry> {
        self.heap.pop()
    }

    pub(crate) fn is_heap_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Notes that a popped entry is about to run: the cheap counter drops
    /// and the entry's handle becomes the current task.
    pub(crate) fn begin_running(&mut self, handle: TaskHandle) {
        self.queued_count = self.queued_count.saturating_sub(1);
        self.current = Some(handle);
    }

    pub(crate) fn clear_current(&mut self) {
        self.current = None;
    }

    pub(crate) fn current(&self) -> Option<&TaskHandle> {
        self.current.as_ref()
    }

    /// Dedup scan for `AddOrMoveToEnd`: cancels the first live queued
    /// entry with the given label. Returns whether one was found.
    ///
    /// The cancelled entry stays in the heap (the worker skips it); the
    /// cheap counter is decremented on its behalf here.
    pub(crate) fn cancel_duplicate(&mut self, display_info: &str) -> bool {
        for entry in self.heap.iter() {
            if !entry.handle.is_cancelled() && entry.handle.display_info() == display_info {
                entry.handle.cancel();
                self.queued_count = self.queued_count.saturating_sub(1);
                return true;
            }
        }
        false
    }

    /// Whether a live (not cancelled) queued entry carries the label.
    pub(crate) fn has_live(&self, display_info: &str) -> bool {
        self.heap
            .iter()
            .any(|e| !e.handle.is_cancelled() && e.handle.display_info() == display_info)
    }

    pub(crate) fn add_parallel(&mut self, handle: TaskHandle) {
        self.parallel.push(handle);
    }

    pub(crate) fn remove_parallel(&mut self, handle: &TaskHandle) {
        self.parallel.retain(|h| !h.ptr_eq(handle));
    }

    pub(crate) fn parallel(&self) -> &[TaskHandle] {
        &self.parallel
    }

    /// Cheap count: tracked queue counter + parallel set + running slot.
    /// May over-report by the number of externally cancelled entries still
    /// sitting in the heap.
    pub(crate) fn tracked_total(&self) -> usize {
        self.parallel.len() + self.queued_count + usize::from(self.current.is_some())
    }

    /// Exact count: recounts the heap filtering cancelled entries. When
    /// the true total is zero, resets the tracked counter, correcting any
    /// accumulated drift.
    pub(crate) fn accurate_total(&mut self) -> usize {
        let live = self.heap.iter().filter(|e| !e.handle.is_cancelled()).count();
        let total = self.parallel.len() + live + usize::from(self.current.is_some());
        if total == 0 {
            self.queued_count = 0;
        }
        total
    }

    /// Up to `limit` live entries in dequeue order: (label, preference).
    pub(crate) fn next_live(&self, limit: usize) -> Vec<(Arc<str>, ExecutionPreference)> {
        let mut live: Vec<&Entry> = self
            .heap
            .iter()
            .filter(|e| !e.handle.is_cancelled())
            .collect();
        live.sort_by_key(|e| e.key);
        live.into_iter()
            .take(limit)
            .map(|e| (e.handle.display_info_arc(), e.handle.preference()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskSpec;

    fn entry_for(queue: &mut TaskQueue, label: &str, preference: ExecutionPreference) -> TaskHandle {
        let spec = TaskSpec::new(label).with_preference(preference);
        let handle = TaskHandle::new(&spec);
        queue.push(handle.clone(), Payload::from_action(|| {}));
        handle
    }

    fn drain_labels(queue: &mut TaskQueue) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(e) = queue.pop() {
            out.push(e.handle.display_info().to_string());
        }
        out
    }

    #[test]
    fn fifo_within_band() {
        let mut q = TaskQueue::new();
        entry_for(&mut q, "a", ExecutionPreference::Fifo);
        entry_for(&mut q, "b", ExecutionPreference::Fifo);
        entry_for(&mut q, "c", ExecutionPreference::Fifo);

        assert_eq!(drain_labels(&mut q), vec!["a", "b", "c"]);
    }

    #[test]
    fn asap_preempts_earlier_fifo() {
        let mut q = TaskQueue::new();
        entry_for(&mut q, "fifo", ExecutionPreference::Fifo);
        entry_for(&mut q, "asap", ExecutionPreference::Asap);
        entry_for(&mut q, "move", ExecutionPreference::AddOrMoveToEnd);

        assert_eq!(drain_labels(&mut q), vec!["asap", "fifo", "move"]);
    }

    #[test]
    fn dedup_cancels_live_entry_with_same_label() {
        let mut q = TaskQueue::new();
        let first = entry_for(&mut q, "restart", ExecutionPreference::AddOrMoveToEnd);

        assert!(q.cancel_duplicate("restart"));
        assert!(first.is_cancelled());
        // second scan finds nothing live
        assert!(!q.cancel_duplicate("restart"));
        assert!(!q.has_live("restart"));
    }

    #[test]
    fn tracked_count_drifts_and_accurate_corrects() {
        let mut q = TaskQueue::new();
        let handle = entry_for(&mut q, "doomed", ExecutionPreference::Fifo);
        handle.cancel();

        // cheap counter still includes the cancelled entry
        assert_eq!(q.tracked_total(), 1);
        // exact count filters it, observes zero, and resets the counter
        assert_eq!(q.accurate_total(), 0);
        assert_eq!(q.tracked_total(), 0);
    }

    #[test]
    fn next_live_is_sorted_and_filtered() {
        let mut q = TaskQueue::new();
        entry_for(&mut q, "later", ExecutionPreference::Fifo);
        let skipped = entry_for(&mut q, "skipped", ExecutionPreference::Fifo);
        entry_for(&mut q, "first", ExecutionPreference::Asap);
        skipped.cancel();

        let next = q.next_live(10);
        let labels: Vec<&str> = next.iter().map(|(l, _)| l.as_ref()).collect();
        assert_eq!(labels, vec!["first", "later"]);
        assert_eq!(next[0].1, ExecutionPreference::Asap);
    }
}

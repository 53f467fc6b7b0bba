//! Bounded interaction history.

use std::collections::VecDeque;

use super::types::{Feedback, InteractionRecord};

/// Append-only ring of interactions; the oldest record is evicted once full.
#[derive(Debug, Clone)]
pub struct InteractionHistory {
    records: VecDeque<InteractionRecord>,
    capacity: usize,
}

impl InteractionHistory {
    /// `capacity` is clamped to at least one record.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a record, returning the evicted one if the ring was full.
    pub fn push(&mut self, record: InteractionRecord) -> Option<InteractionRecord> {
        let evicted = if self.records.len() >= self.capacity {
            self.records.pop_front()
        } else {
            None
        };
        self.records.push_back(record);
        evicted
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &InteractionRecord> {
        self.records.iter()
    }

    /// Records in insertion order.
    pub fn snapshot(&self) -> Vec<InteractionRecord> {
        self.records.iter().cloned().collect()
    }

    /// Up to `limit` positively rated records for `tool`, newest first.
    pub fn positive_precedents(&self, tool: &str, limit: usize) -> Vec<InteractionRecord> {
        self.records
            .iter()
            .rev()
            .filter(|r| r.feedback == Feedback::Positive && r.tool_call.tool_name == tool)
            .take(limit)
            .cloned()
            .collect()
    }
}

//! Bounded in-memory event log.

use serde::{Deserialize, Serialize};

use crate::events::types::EngineEvent;
use crate::utils::address::Address;
use crate::utils::constants::MAX_EVENTS;

/// Append-only log keeping the most recent events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<EngineEvent>,
    /// Maximum events to keep
    max_events: usize,
    /// Events ever recorded, including pruned ones
    total_recorded: u64,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    /// Create an empty log with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(MAX_EVENTS)
    }

    /// Create an empty log keeping at most `max_events`
    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            events: Vec::new(),
            max_events: max_events.max(1),
            total_recorded: 0,
        }
    }

    /// Add an event (with pruning)
    pub fn push(&mut self, event: EngineEvent) {
        self.events.push(event);
        self.total_recorded += 1;

        if self.events.len() > self.max_events {
            self.events.drain(0..self.events.len() - self.max_events);
        }
    }

    /// Append a batch in order
    pub fn extend(&mut self, events: impl IntoIterator<Item = EngineEvent>) {
        for event in events {
            self.push(event);
        }
    }

    /// Retained events, oldest first
    pub fn events(&self) -> &[EngineEvent] {
        &self.events
    }

    /// Events touching `account`
    pub fn for_account(&self, account: &Address) -> Vec<&EngineEvent> {
        self.events.iter().filter(|e| e.involves(account)).collect()
    }

    /// Liquidation seizures
    pub fn liquidations(&self) -> Vec<&EngineEvent> {
        self.events.iter().filter(|e| e.is_liquidation()).collect()
    }

    /// Events ever recorded
    pub fn total_recorded(&self) -> u64 {
        self.total_recorded
    }

    /// Number of retained events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

//! Per-line tracking of in-flight cart updates.
//!
//! Each quantity update takes a [`Ticket`] for its line. Issuing a newer
//! ticket for the same line wakes the older one's [`Ticket::superseded`], so
//! the older request is dropped instead of racing the newer one to the state.

use std::collections::HashMap;
use tokio::sync::watch;

use crate::LineKey;

#[derive(Debug, Default)]
pub(crate) struct InFlight {
    lines: HashMap<LineKey, watch::Sender<u64>>,
    next: u64,
}

#[derive(Debug)]
pub(crate) struct Ticket {
    key: LineKey,
    generation: u64,
    /// An older request for the line was still in flight when this was issued.
    displaced: bool,
    latest: watch::Receiver<u64>,
}

impl InFlight {
    pub(crate) fn issue(&mut self, key: &LineKey) -> Ticket {
        self.next += 1;
        let generation = self.next;
        let displaced = self.lines.contains_key(key);
        let sender = self.lines.entry(key.clone()).or_insert_with(|| watch::channel(0).0);
        sender.send_replace(generation);
        Ticket { key: key.clone(), generation, displaced, latest: sender.subscribe() }
    }

    pub(crate) fn is_current(&self, ticket: &Ticket) -> bool {
        self.lines.get(&ticket.key).is_some_and(|s| *s.borrow() == ticket.generation)
    }

    /// Retires `ticket`. Returns whether it was still the latest for its line.
    pub(crate) fn finish(&mut self, ticket: &Ticket) -> bool {
        let current = self.is_current(ticket);
        if current {
            self.lines.remove(&ticket.key);
        }
        current
    }

    pub(crate) fn len(&self) -> usize { self.lines.len() }
}

impl Ticket {
    pub(crate) fn generation(&self) -> u64 { self.generation }
    pub(crate) fn displaced(&self) -> bool { self.displaced }

    /// Resolves once a newer ticket exists for the same line.
    pub(crate) async fn superseded(&mut self) {
        let generation = self.generation;
        if self.latest.wait_for(|latest| *latest != generation).await.is_err() {
            // Sender dropped: this ticket was retired as current, nothing can supersede it.
            std::future::pending::<()>().await;
        }
    }
}

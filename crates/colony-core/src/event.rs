//! Request lifecycle events.
//!
//! The request manager records one [`RequestEvent`] per state change into a
//! fixed-capacity ring buffer. Hosts either poll the buffer or register
//! passive listeners that receive every event on [`RequestEventBus::deliver`].
//!
//! Event kinds can be suppressed via [`RequestEventBus::suppress`]; suppressed
//! events are never buffered.

use crate::id::{RequestId, ResolverId};

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A request lifecycle event. Carries the dispatch pass it occurred in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestEvent {
    Created {
        request: RequestId,
        parent: Option<RequestId>,
        pass: u64,
    },
    Assigned {
        request: RequestId,
        resolver: ResolverId,
        pass: u64,
    },
    /// Every resolver declined. The request keeps its unresolved marker
    /// until a later pass succeeds.
    Unresolved { request: RequestId, pass: u64 },
    Overruled { request: RequestId, pass: u64 },
    Started { request: RequestId, pass: u64 },
    Completed { request: RequestId, pass: u64 },
    Cancelled { request: RequestId, pass: u64 },
}

/// Discriminant of a [`RequestEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestEventKind {
    Created,
    Assigned,
    Unresolved,
    Overruled,
    Started,
    Completed,
    Cancelled,
}

const EVENT_KIND_COUNT: usize = 7;

impl RequestEvent {
    pub fn kind(&self) -> RequestEventKind {
        match self {
            RequestEvent::Created { .. } => RequestEventKind::Created,
            RequestEvent::Assigned { .. } => RequestEventKind::Assigned,
            RequestEvent::Unresolved { .. } => RequestEventKind::Unresolved,
            RequestEvent::Overruled { .. } => RequestEventKind::Overruled,
            RequestEvent::Started { .. } => RequestEventKind::Started,
            RequestEvent::Completed { .. } => RequestEventKind::Completed,
            RequestEvent::Cancelled { .. } => RequestEventKind::Cancelled,
        }
    }

    /// The request the event is about.
    pub fn request(&self) -> RequestId {
        match *self {
            RequestEvent::Created { request, .. }
            | RequestEvent::Assigned { request, .. }
            | RequestEvent::Unresolved { request, .. }
            | RequestEvent::Overruled { request, .. }
            | RequestEvent::Started { request, .. }
            | RequestEvent::Completed { request, .. }
            | RequestEvent::Cancelled { request, .. } => request,
        }
    }
}

impl RequestEventKind {
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer: pre-allocated ring buffer
// ---------------------------------------------------------------------------

/// A pre-allocated ring buffer for events. Fixed capacity; when full, the
/// oldest events are dropped.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Option<RequestEvent>>,
    /// Write position (wraps around).
    head: usize,
    len: usize,
    /// Total events ever written (including dropped).
    total_written: u64,
}

impl EventBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    pub fn push(&mut self, event: RequestEvent) {
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Number of events that were dropped because the buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.total_written.saturating_sub(self.capacity() as u64)
    }

    /// Iterate over events from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &RequestEvent> {
        // Once full, `head` is the oldest entry.
        let start = if self.len < self.capacity() { 0 } else { self.head };
        let capacity = self.capacity();
        (0..self.len).filter_map(move |offset| self.events[(start + offset) % capacity].as_ref())
    }

    pub fn clear(&mut self) {
        for slot in &mut self.events {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

// ---------------------------------------------------------------------------
// RequestEventBus
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type RequestListener = Box<dyn FnMut(&RequestEvent)>;

/// Shared event buffer plus listeners for one colony's request manager.
pub struct RequestEventBus {
    buffer: EventBuffer,
    suppressed: [bool; EVENT_KIND_COUNT],
    listeners: Vec<RequestListener>,
}

impl std::fmt::Debug for RequestEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestEventBus")
            .field("buffer", &self.buffer)
            .field("suppressed", &self.suppressed)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for RequestEventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl RequestEventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: EventBuffer::new(capacity),
            suppressed: [false; EVENT_KIND_COUNT],
            listeners: Vec::new(),
        }
    }

    pub fn suppress(&mut self, kind: RequestEventKind) {
        self.suppressed[kind.index()] = true;
    }

    pub fn is_suppressed(&self, kind: RequestEventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Record an event. No-op for suppressed kinds.
    pub fn emit(&mut self, event: RequestEvent) {
        if self.suppressed[event.kind().index()] {
            return;
        }
        self.buffer.push(event);
    }

    pub fn on_event(&mut self, listener: RequestListener) {
        self.listeners.push(listener);
    }

    /// Hand buffered events to every listener, oldest first, then clear.
    pub fn deliver(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        for listener in &mut self.listeners {
            for event in self.buffer.iter() {
                listener(event);
            }
        }
        self.buffer.clear();
    }

    /// Take all buffered events without calling listeners.
    pub fn drain(&mut self) -> Vec<RequestEvent> {
        let events = self.buffer.iter().cloned().collect();
        self.buffer.clear();
        events
    }

    pub fn buffer(&self) -> &EventBuffer {
        &self.buffer
    }

    /// Buffered events of one kind.
    pub fn count(&self, kind: RequestEventKind) -> usize {
        self.buffer.iter().filter(|e| e.kind() == kind).count()
    }
}

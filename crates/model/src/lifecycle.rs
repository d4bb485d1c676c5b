//! Document lifecycle state machine
//!
//! Single authority for which operations are legal from which state, and
//! what state a successful operation leaves behind. Everything here is pure:
//! callers check legality before touching the network and apply the
//! returned state only once the server has confirmed the operation.
//!
//! ## State Transitions
//!
//! ```text
//! FRESH ──create──► VALID ──mutate──► DIRTY ──update──► VALID
//! STALE ──fetch───► VALID
//! VALID | STALE ──delete──► EVICTED
//! FRESH | VALID | STALE ──demote──► EVICTED (cached) ──promote──► STALE
//! ```
//!
//! Every operation from EVICTED is refused.

use settee_core::{DocState, Error, Operation};

/// Where a prior instance for an id currently lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prior {
    /// No instance is tracked
    None,
    /// Tracked in the active pool
    Active,
    /// Parked in the cached pool
    Cached,
}

/// Outcome of constructing a document for an id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instantiation {
    /// Hand back the active instance unchanged
    ReturnExisting,
    /// Move the cached instance back to active as STALE
    Promote,
    /// New instance with no server revision
    RegisterFresh,
    /// New instance whose server revision is implied but not loaded
    RegisterStale,
}

impl Instantiation {
    /// State the instance takes, or `None` when it keeps its own
    pub fn initial_state(&self) -> Option<DocState> {
        match self {
            Instantiation::ReturnExisting => None,
            Instantiation::Promote | Instantiation::RegisterStale => Some(DocState::Stale),
            Instantiation::RegisterFresh => Some(DocState::Fresh),
        }
    }
}

/// Decide how a construction request is satisfied
///
/// `has_revision` is true for id-only construction and for bodies that
/// carry `_rev`.
pub fn instantiate(prior: Prior, has_revision: bool) -> Instantiation {
    match (prior, has_revision) {
        (Prior::Active, _) => Instantiation::ReturnExisting,
        (Prior::Cached, _) => Instantiation::Promote,
        (Prior::None, true) => Instantiation::RegisterStale,
        (Prior::None, false) => Instantiation::RegisterFresh,
    }
}

/// An operation raised against an existing instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Local set/remove/extend
    Mutate,
    /// Send as a new document
    Create,
    /// Reload from the server
    Fetch,
    /// Send local changes
    Update,
    /// Delete on the server
    Delete {
        /// Caller supplied the revision to delete
        explicit_revision: bool,
    },
    /// Read a standalone attachment
    AttachmentGet,
    /// Upload a standalone attachment
    AttachmentPut,
    /// Remove a standalone attachment
    AttachmentDelete,
    /// Stage an inline attachment for creation
    StageAttachment,
    /// Move to the cached pool
    Demote,
    /// Read-only probe
    Inspect,
}

impl Event {
    /// Operation named in errors
    pub fn operation(&self) -> Operation {
        match self {
            Event::Mutate => Operation::Mutate,
            Event::Create => Operation::Create,
            Event::Fetch => Operation::Fetch,
            Event::Update => Operation::Update,
            Event::Delete { .. } => Operation::Delete,
            Event::AttachmentGet => Operation::AttachmentGet,
            Event::AttachmentPut => Operation::AttachmentPut,
            Event::AttachmentDelete => Operation::AttachmentDelete,
            Event::StageAttachment => Operation::StageAttachment,
            Event::Demote => Operation::Demote,
            Event::Inspect => Operation::Inspect,
        }
    }
}

/// Why an event was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Refusal {
    /// Human-readable reason
    pub reason: &'static str,
}

impl Refusal {
    /// Turn into the public error for a given document
    pub fn into_error(self, id: impl Into<String>, state: DocState, event: Event) -> Error {
        Error::illegal(id, state, event.operation(), self.reason)
    }
}

const fn refuse(reason: &'static str) -> Result<DocState, Refusal> {
    Err(Refusal { reason })
}

/// Resulting state of `event` from `state`, or why it is illegal
pub fn transition(state: DocState, event: Event) -> Result<DocState, Refusal> {
    use DocState::*;

    if state == Evicted {
        return refuse("document is no longer tracked; construct it again");
    }

    match event {
        Event::Mutate => Ok(match state {
            Valid => Dirty,
            other => other,
        }),

        Event::Create => match state {
            Fresh => Ok(Valid),
            _ => refuse("document already has a revision; use update"),
        },

        Event::Fetch => match state {
            Valid | Stale => Ok(Valid),
            Fresh => refuse("document has no server revision to fetch; create it first"),
            _ => refuse("local changes would be discarded; update first"),
        },

        Event::Update => match state {
            Dirty => Ok(Valid),
            Fresh => refuse("document was never created; create first"),
            Valid => refuse("no changes to persist"),
            _ => refuse("content may be outdated; fetch first"),
        },

        Event::Delete { explicit_revision } => match state {
            Valid | Stale => Ok(Evicted),
            Fresh | Dirty if explicit_revision => Ok(Evicted),
            Fresh => refuse("document has no server revision; pass one explicitly"),
            _ => refuse("local changes would be discarded; pass the revision explicitly"),
        },

        Event::AttachmentGet => match state {
            Fresh => refuse("cannot fetch attachment of unpersisted document"),
            other => Ok(other),
        },

        Event::AttachmentPut | Event::AttachmentDelete => match state {
            Valid | Stale => Ok(Valid),
            Dirty => Ok(Dirty),
            _ => refuse("document must be created before changing its attachments"),
        },

        Event::StageAttachment => match state {
            Fresh => Ok(Fresh),
            _ => refuse("inline attachments are only sent on creation; use put_attachment"),
        },

        Event::Demote => match state {
            Dirty => refuse("local changes would be discarded"),
            _ => Ok(Evicted),
        },

        Event::Inspect => match state {
            Fresh => refuse("document has no server revision"),
            other => Ok(other),
        },
    }
}

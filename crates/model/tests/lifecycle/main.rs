//! Document lifecycle test suite
//!
//! End-to-end checks of the document model against the in-memory server.
//!
//! ## Test Tier Structure
//!
//! - **Tier 1: State invariants**
//!   Which operations are legal from which state, and where they lead.
//!
//! - **Tier 2: Identity invariants**
//!   One instance per id; eviction, detaching and promotion.
//!
//! - **Tier 3: Conflicts**
//!   Stale writes leave local edits untouched.
//!
//! - **Tier 4: History**
//!   Pinned revisions, revision lists and server-side copies.
//!
//! - **Tier 5: Attachments**
//!   Staged and standalone attachments.
//!
//! - **Tier 6: Fuzzing**
//!   Random construction sequences never yield two instances for one id.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p settee-model --test lifecycle
//! cargo test -p settee-model --test lifecycle fuzz
//! ```

mod test_utils;

// Tier 1
mod state_invariants;



// Tier 4
mod history_tests;

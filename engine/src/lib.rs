//! Document state, file intake, and single-flight orchestration.
//!
//! # Architecture
//!
//! - [`DocumentStore`] - the authoritative document text plus change
//!   notification for the renderer.
//! - [`intake`] - validates and reads an upload selection into
//!   [`mermake_types::FileRecord`]s.
//! - [`Session`] - the orchestrator: wires user actions through
//!   intake -> gateway -> commit while enforcing that at most one
//!   generation round trip is outstanding.
//!
//! Errors from intake and the gateway never propagate past the session; it
//! is the single recovery boundary and always settles back to a resolvable
//! state with the document intact on failure.

mod document;
pub mod intake;
mod session;

pub use document::DocumentStore;
pub use intake::{FileSelection, IntakeOutcome, MAX_FILE_SIZE_BYTES};
pub use session::{RunOutcome, Session, SessionError};

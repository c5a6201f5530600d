//! The orchestrating session: owns the document, its history, and the
//! single-flight operation state machine.
//!
//! Every mutation of the canonical document - hand edits, clears, and
//! successful generation round trips - funnels through one commit path, so
//! all of them are equally undoable. Generation operations run the pipeline
//! intake -> gateway -> commit, with exactly one round trip outstanding at
//! any time.
//!
//! # State machine
//!
//! ```text
//! Idle ----begin----> InFlight ----success----> Succeeded --ack--> Idle
//!   ^                    |
//!   '---ack--- Failed <--' (failure; document untouched)
//! ```
//!
//! `begin` from `InFlight` fails loudly with [`SessionError::Busy`] and
//! issues nothing. Resolved states (`Succeeded`, `Failed`) persist until
//! acknowledged or until the next operation begins, which clears them - the
//! error banner stays up until dismissed or superseded.
//!
//! # Accepted limitations
//!
//! No timeout is enforced here: a hung round trip keeps the session
//! `InFlight` for as long as the caller keeps polling it. Cancellation is
//! dropping the operation future; the in-flight guard settles the state to
//! `Failed` on that path, so the busy flag is released and the session stays
//! usable. A late response can never be applied either way, because
//! operations borrow the session mutably for their whole duration.

use thiserror::Error;

use mermake_gateway::DiagramGateway;
use mermake_types::{DiagramKind, DocumentHistory, OperationState};

use crate::document::DocumentStore;
use crate::intake::{FileSelection, IntakeOutcome, collect};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// An operation is already in flight; nothing was issued.
    #[error("an operation is already in flight")]
    Busy,
}

/// How a generation operation resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The returned text is now the canonical document.
    Committed {
        /// Non-fatal intake notice (e.g. oversized files excluded).
        notice: Option<String>,
    },
    /// Empty instruction; the operation was not issued at all.
    Skipped,
    /// The round trip failed; the document is unchanged.
    Failed {
        message: String,
        notice: Option<String>,
    },
}

/// Interactive editing session over one diagram document.
pub struct Session<G> {
    document: DocumentStore,
    history: DocumentHistory,
    state: OperationState,
    gateway: G,
}

impl<G: DiagramGateway> Session<G> {
    /// Create a session seeded with an initial document; history starts with
    /// that single entry at index 0.
    #[must_use]
    pub fn new(seed: impl Into<String>, gateway: G, record_unchanged: bool) -> Self {
        let seed = seed.into();
        Self {
            document: DocumentStore::new(seed.clone()),
            history: DocumentHistory::new(seed, record_unchanged),
            state: OperationState::Idle,
            gateway,
        }
    }

    #[must_use]
    pub fn content(&self) -> &str {
        self.document.content()
    }

    #[must_use]
    pub fn state(&self) -> &OperationState {
        &self.state
    }

    #[must_use]
    pub fn history_index(&self) -> usize {
        self.history.index()
    }

    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Subscribe to document changes (for the renderer).
    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<String> {
        self.document.subscribe()
    }

    /// Apply a hand edit. Same canonical path as AI results.
    pub fn edit(&mut self, new_text: impl Into<String>) {
        commit_canonical(&mut self.document, &mut self.history, new_text.into());
    }

    /// Clear the document. Recorded and undoable, not a history reset.
    pub fn clear(&mut self) {
        commit_canonical(&mut self.document, &mut self.history, String::new());
    }

    /// Step back one snapshot. Returns false at the earliest state.
    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(text) => {
                let text = text.to_string();
                self.document.commit(text);
                true
            }
            None => false,
        }
    }

    /// Step forward one snapshot. Returns false at the latest state.
    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(text) => {
                let text = text.to_string();
                self.document.commit(text);
                true
            }
            None => false,
        }
    }

    /// Dismiss a resolved (`Succeeded`/`Failed`) state back to `Idle`.
    pub fn acknowledge(&mut self) {
        if !self.state.is_in_flight() {
            self.state = OperationState::Idle;
        }
    }

    /// Ask the service to rewrite the document per a free-text instruction.
    ///
    /// A blank instruction is not issued at all and resolves as
    /// [`RunOutcome::Skipped`] with no state change.
    pub async fn update_free_text(
        &mut self,
        instruction: &str,
    ) -> Result<RunOutcome, SessionError> {
        if instruction.trim().is_empty() {
            return Ok(RunOutcome::Skipped);
        }
        let flight = Flight::begin(&mut self.state)?;

        let result = self
            .gateway
            .update_free_text(self.document.content(), instruction)
            .await;
        Ok(Self::land(
            flight,
            &mut self.document,
            &mut self.history,
            result.map_err(|e| e.to_string()),
            None,
        ))
    }

    /// Generate a brand-new diagram of `kind` from an upload selection.
    pub async fn generate_from_files(
        &mut self,
        selection: &FileSelection,
        kind: DiagramKind,
        focus_hint: Option<&str>,
    ) -> Result<RunOutcome, SessionError> {
        let flight = Flight::begin(&mut self.state)?;

        let IntakeOutcome {
            records, notice, ..
        } = collect(selection).await;
        let result = self
            .gateway
            .generate_from_files(&records, kind, focus_hint)
            .await;
        Ok(Self::land(
            flight,
            &mut self.document,
            &mut self.history,
            result.map_err(|e| e.to_string()),
            notice,
        ))
    }

    /// Merge new information from an upload selection into the current
    /// document without changing its diagram kind.
    pub async fn update_from_files(
        &mut self,
        selection: &FileSelection,
        focus_hint: Option<&str>,
    ) -> Result<RunOutcome, SessionError> {
        let flight = Flight::begin(&mut self.state)?;

        let IntakeOutcome {
            records, notice, ..
        } = collect(selection).await;
        let result = self
            .gateway
            .update_from_files(self.document.content(), &records, focus_hint)
            .await;
        Ok(Self::land(
            flight,
            &mut self.document,
            &mut self.history,
            result.map_err(|e| e.to_string()),
            notice,
        ))
    }

    /// Resolve an in-flight operation. Success commits through the canonical
    /// path; failure leaves the document at its pre-request value.
    fn land(
        flight: Flight<'_>,
        document: &mut DocumentStore,
        history: &mut DocumentHistory,
        result: Result<String, String>,
        notice: Option<String>,
    ) -> RunOutcome {
        match result {
            Ok(new_text) => {
                commit_canonical(document, history, new_text);
                flight.succeed();
                RunOutcome::Committed { notice }
            }
            Err(message) => {
                tracing::warn!("Generation operation failed: {message}");
                flight.fail(message.clone());
                RunOutcome::Failed { message, notice }
            }
        }
    }

    #[cfg(test)]
    fn force_in_flight(&mut self) {
        self.state = OperationState::InFlight;
    }
}

/// The one code path for "this text is now canonical".
fn commit_canonical(document: &mut DocumentStore, history: &mut DocumentHistory, new_text: String) {
    history.record(new_text.clone());
    document.commit(new_text);
    tracing::debug!(
        index = history.index(),
        entries = history.len(),
        "Committed canonical document"
    );
}

/// Raised busy flag for one generation round trip.
///
/// `begin` performs the guarded `Idle -> InFlight` transition: entering from
/// a resolved state is permitted and clears it; entering from `InFlight`
/// fails loudly. The flag cannot leak: if the operation future is dropped
/// mid round trip (a caller-imposed timeout, a torn-down driver), `Drop`
/// settles the state to `Failed` so the session stays operable.
struct Flight<'a> {
    state: &'a mut OperationState,
    settled: bool,
}

impl<'a> Flight<'a> {
    fn begin(state: &'a mut OperationState) -> Result<Self, SessionError> {
        if state.is_in_flight() {
            tracing::warn!("Rejected operation: another one is in flight");
            return Err(SessionError::Busy);
        }
        *state = OperationState::InFlight;
        Ok(Self {
            state,
            settled: false,
        })
    }

    fn succeed(mut self) {
        *self.state = OperationState::Succeeded;
        self.settled = true;
    }

    fn fail(mut self, message: String) {
        *self.state = OperationState::Failed(message);
        self.settled = true;
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!("Operation dropped mid flight; releasing the busy flag");
            *self.state =
                OperationState::Failed("operation was cancelled before it resolved".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RunOutcome, Session, SessionError};
    use crate::intake::FileSelection;
    use mermake_gateway::{DiagramGateway, GatewayError};
    use mermake_types::{DiagramKind, FileRecord, OperationState};
    use std::cell::{Cell, RefCell};

    const SEED: &str = "graph TD\nA-->B";

    /// In-memory gateway double: scripted response plus call capture.
    struct MockGateway {
        response: RefCell<Result<String, String>>,
        calls: Cell<usize>,
        last_current: RefCell<Option<String>>,
        last_files: RefCell<Vec<FileRecord>>,
    }

    impl MockGateway {
        fn returning(text: &str) -> Self {
            Self {
                response: RefCell::new(Ok(text.to_string())),
                calls: Cell::new(0),
                last_current: RefCell::new(None),
                last_files: RefCell::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            let gateway = Self::returning("");
            *gateway.response.borrow_mut() = Err(message.to_string());
            gateway
        }

        fn take(&self) -> Result<String, GatewayError> {
            self.calls.set(self.calls.get() + 1);
            self.response.borrow().clone().map_err(GatewayError::new)
        }
    }

    impl DiagramGateway for MockGateway {
        async fn update_free_text(
            &self,
            current: &str,
            _instruction: &str,
        ) -> Result<String, GatewayError> {
            *self.last_current.borrow_mut() = Some(current.to_string());
            self.take()
        }

        async fn generate_from_files(
            &self,
            files: &[FileRecord],
            _kind: DiagramKind,
            _focus_hint: Option<&str>,
        ) -> Result<String, GatewayError> {
            *self.last_files.borrow_mut() = files.to_vec();
            self.take()
        }

        async fn update_from_files(
            &self,
            current: &str,
            files: &[FileRecord],
            _focus_hint: Option<&str>,
        ) -> Result<String, GatewayError> {
            *self.last_current.borrow_mut() = Some(current.to_string());
            *self.last_files.borrow_mut() = files.to_vec();
            self.take()
        }
    }

    fn session(gateway: MockGateway) -> Session<MockGateway> {
        Session::new(SEED, gateway, true)
    }

    #[tokio::test]
    async fn free_text_success_commits_and_records() {
        let mut session = session(MockGateway::returning("graph TD\nA-->B-->C"));
        let before = session.history_index();

        let outcome = session.update_free_text("add a node C").await.unwrap();
        assert_eq!(outcome, RunOutcome::Committed { notice: None });
        assert_eq!(session.content(), "graph TD\nA-->B-->C");
        assert_eq!(session.history_index(), before + 1);
        assert_eq!(*session.state(), OperationState::Succeeded);

        session.acknowledge();
        assert_eq!(*session.state(), OperationState::Idle);
    }

    #[tokio::test]
    async fn free_text_failure_leaves_document_untouched() {
        let mut session = session(MockGateway::failing("boom"));
        let len_before = session.history_len();

        let outcome = session.update_free_text("add a node C").await.unwrap();
        let RunOutcome::Failed { message, .. } = outcome else {
            panic!("expected Failed, got {outcome:?}");
        };
        assert!(message.contains("boom"));
        assert_eq!(session.content(), SEED);
        assert_eq!(session.history_len(), len_before);
        assert!(matches!(session.state(), OperationState::Failed(_)));

        session.acknowledge();
        assert_eq!(*session.state(), OperationState::Idle);
    }

    #[tokio::test]
    async fn blank_instruction_is_not_issued() {
        let mut session = session(MockGateway::returning("unused"));
        for instruction in ["", "   ", "\n\t"] {
            let outcome = session.update_free_text(instruction).await.unwrap();
            assert_eq!(outcome, RunOutcome::Skipped);
        }
        assert_eq!(session.gateway.calls.get(), 0);
        assert_eq!(*session.state(), OperationState::Idle);
        assert_eq!(session.content(), SEED);
    }

    #[tokio::test]
    async fn busy_session_rejects_a_second_operation() {
        let mut session = session(MockGateway::returning("unused"));
        session.force_in_flight();

        let err = session.update_free_text("anything").await.unwrap_err();
        assert_eq!(err, SessionError::Busy);
        assert_eq!(session.gateway.calls.get(), 0);
        assert_eq!(session.content(), SEED);
        assert!(session.state().is_in_flight());
    }

    #[tokio::test]
    async fn new_operation_clears_previous_failure() {
        let mut session = session(MockGateway::failing("first failure"));
        session.update_free_text("try").await.unwrap();
        assert!(matches!(session.state(), OperationState::Failed(_)));

        *session.gateway.response.borrow_mut() = Ok("graph TD\nA-->B-->C".to_string());
        let outcome = session.update_free_text("try again").await.unwrap();
        assert!(matches!(outcome, RunOutcome::Committed { .. }));
        assert_eq!(*session.state(), OperationState::Succeeded);
    }

    #[tokio::test]
    async fn free_text_sends_current_document() {
        let mut session = session(MockGateway::returning("next"));
        session.edit("graph TD\nX-->Y");
        session.update_free_text("tweak").await.unwrap();
        assert_eq!(
            session.gateway.last_current.borrow().as_deref(),
            Some("graph TD\nX-->Y")
        );
    }

    #[tokio::test]
    async fn generate_from_folder_passes_records_and_notice() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("proj");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("small.rs"), "fn f() {}").unwrap();
        std::fs::write(root.join("big.rs"), vec![b'x'; 25 * 1024]).unwrap();

        let mut session = session(MockGateway::returning("sequenceDiagram\nA->>B: hi"));
        let outcome = session
            .generate_from_files(
                &FileSelection::Folder(root),
                DiagramKind::Sequence,
                Some("call paths"),
            )
            .await
            .unwrap();

        let RunOutcome::Committed { notice } = outcome else {
            panic!("expected Committed");
        };
        assert!(notice.unwrap().contains("20 KiB"));
        assert_eq!(session.content(), "sequenceDiagram\nA->>B: hi");
        let files = session.gateway.last_files.borrow();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "proj/small.rs");
    }

    #[tokio::test]
    async fn update_from_files_sends_current_document() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("lib.rs");
        std::fs::write(&file, "pub fn f() {}").unwrap();

        let mut session = session(MockGateway::returning("graph TD\nA-->B-->F"));
        session
            .update_from_files(&FileSelection::Files(vec![file]), None)
            .await
            .unwrap();

        assert_eq!(session.gateway.last_current.borrow().as_deref(), Some(SEED));
        assert_eq!(session.gateway.last_files.borrow().len(), 1);
        assert_eq!(session.content(), "graph TD\nA-->B-->F");
    }

    #[test]
    fn manual_edits_and_undo_redo_share_the_history() {
        let mut session = session(MockGateway::returning("unused"));
        session.edit("v1");
        session.edit("v2");
        assert_eq!(session.content(), "v2");
        assert_eq!(session.history_len(), 3);

        assert!(session.undo());
        assert_eq!(session.content(), "v1");
        assert!(session.undo());
        assert_eq!(session.content(), SEED);
        assert!(!session.undo());

        assert!(session.redo());
        assert_eq!(session.content(), "v1");
        assert!(session.redo());
        assert_eq!(session.content(), "v2");
        assert!(!session.redo());
    }

    #[test]
    fn clear_is_an_undoable_edit() {
        let mut session = session(MockGateway::returning("unused"));
        session.clear();
        assert_eq!(session.content(), "");
        assert!(session.undo());
        assert_eq!(session.content(), SEED);
    }

    /// Gateway double that never answers; lets a test drop an operation
    /// future mid round trip.
    struct HangingGateway;

    impl DiagramGateway for HangingGateway {
        async fn update_free_text(
            &self,
            _current: &str,
            _instruction: &str,
        ) -> Result<String, GatewayError> {
            std::future::pending().await
        }

        async fn generate_from_files(
            &self,
            _files: &[FileRecord],
            _kind: DiagramKind,
            _focus_hint: Option<&str>,
        ) -> Result<String, GatewayError> {
            std::future::pending().await
        }

        async fn update_from_files(
            &self,
            _current: &str,
            _files: &[FileRecord],
            _focus_hint: Option<&str>,
        ) -> Result<String, GatewayError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn dropped_operation_releases_the_busy_flag() {
        use std::time::Duration;
        use tokio::time::timeout;

        let mut session = Session::new(SEED, HangingGateway, true);

        let hung = timeout(Duration::from_millis(20), session.update_free_text("hang")).await;
        assert!(hung.is_err());

        // The abandoned round trip settles as a failure, not a wedge.
        assert!(matches!(session.state(), OperationState::Failed(_)));
        assert_eq!(session.content(), SEED);

        session.acknowledge();
        assert_eq!(*session.state(), OperationState::Idle);

        // And the session accepts work again instead of reporting Busy.
        let hung = timeout(Duration::from_millis(20), session.update_free_text("hang")).await;
        assert!(hung.is_err());
        assert!(matches!(session.state(), OperationState::Failed(_)));
    }

    #[tokio::test]
    async fn ai_commit_prunes_the_redo_branch() {
        let mut session = session(MockGateway::returning("generated"));
        session.edit("v1");
        session.undo();
        assert_eq!(session.content(), SEED);

        session.update_free_text("regenerate").await.unwrap();
        assert_eq!(session.content(), "generated");
        // "v1" is unreachable now.
        assert!(!session.redo());
        assert_eq!(session.history_len(), 2);
    }
}

//! DocumentActor - owner of the live proposal document
//!
//! The editor view and the tool-call bridge both mutate the document through
//! this actor. Each `Apply` is answered only once the mutation is committed,
//! so callers can chain dependent calls (insert a block, then update it by
//! index) without guessing when the view has settled.
//!
//! # Example
//!
//! ```rust,ignore
//! use ractor::{Actor, call};
//!
//! let (document, _handle) = Actor::spawn(
//!     None,
//!     DocumentActor,
//!     DocumentArguments::mounted(Document::empty()),
//! ).await?;
//!
//! let commit = call!(document, |reply| DocumentMsg::Apply {
//!     mutation: Mutation::SetDocumentContent { content: "<p>Hi</p>".into() },
//!     reply,
//! })??;
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::document::{Document, DocumentError, Mutation, MutationOutcome};

/// Actor that serializes every read and write of the live document
#[derive(Debug, Default)]
pub struct DocumentActor;

#[derive(Debug, Clone, Default)]
pub struct DocumentArguments {
    /// Initial document; `None` starts with no editor view mounted
    pub document: Option<Document>,
    /// Snapshot file restored on start and rewritten after each commit
    pub snapshot_path: Option<PathBuf>,
}

impl DocumentArguments {
    pub fn mounted(document: Document) -> Self {
        Self {
            document: Some(document),
            snapshot_path: None,
        }
    }

    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }
}

pub struct DocumentState {
    document: Option<Document>,
    revision: u64,
    snapshot_path: Option<PathBuf>,
}

/// Acknowledgement that a mutation has been committed (or skipped)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Commit {
    pub revision: u64,
    pub outcome: MutationOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub revision: u64,
    pub document: Document,
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug)]
pub enum DocumentMsg {
    /// Apply a mutation to the current document
    Apply {
        mutation: Mutation,
        reply: RpcReplyPort<Result<Commit, DocumentError>>,
    },
    /// Current document, or `None` while unmounted
    Snapshot {
        reply: RpcReplyPort<Option<DocumentSnapshot>>,
    },
    /// Attach an editor view showing `document`
    Mount {
        document: Document,
        reply: RpcReplyPort<u64>,
    },
    /// Detach the editor view; later mutations are ignored
    Unmount,
}

#[async_trait]
impl Actor for DocumentActor {
    type Msg = DocumentMsg;
    type State = DocumentState;
    type Arguments = DocumentArguments;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let (document, revision) = match &args.snapshot_path {
            Some(path) => match load_snapshot(path).await {
                Some(snapshot) => (Some(snapshot.document), snapshot.revision),
                None => (args.document, 0),
            },
            None => (args.document, 0),
        };

        tracing::info!(
            actor_id = %myself.get_id(),
            mounted = document.is_some(),
            revision,
            "DocumentActor starting"
        );

        Ok(DocumentState {
            document,
            revision,
            snapshot_path: args.snapshot_path,
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            DocumentMsg::Apply { mutation, reply } => {
                let result = self.handle_apply(mutation, state).await;
                let _ = reply.send(result);
            }
            DocumentMsg::Snapshot { reply } => {
                let snapshot = state.document.as_ref().map(|document| DocumentSnapshot {
                    revision: state.revision,
                    document: document.clone(),
                });
                let _ = reply.send(snapshot);
            }
            DocumentMsg::Mount { document, reply } => {
                state.document = Some(document);
                state.revision += 1;
                persist(state).await;
                tracing::info!(revision = state.revision, "Editor view mounted");
                let _ = reply.send(state.revision);
            }
            DocumentMsg::Unmount => {
                state.document = None;
                tracing::info!(revision = state.revision, "Editor view unmounted");
            }
        }
        Ok(())
    }
}

impl DocumentActor {
    async fn handle_apply(
        &self,
        mutation: Mutation,
        state: &mut DocumentState,
    ) -> Result<Commit, DocumentError> {
        let Some(document) = state.document.as_mut() else {
            tracing::debug!(mutation = mutation.name(), "No editor view mounted; ignoring mutation");
            return Ok(Commit {
                revision: state.revision,
                outcome: MutationOutcome::Detached,
            });
        };

        let outcome = document.apply(&mutation)?;
        match outcome {
            MutationOutcome::Applied => {
                state.revision += 1;
                persist(state).await;
                tracing::debug!(
                    mutation = mutation.name(),
                    revision = state.revision,
                    "Mutation committed"
                );
            }
            MutationOutcome::NoOp { reason } => {
                tracing::debug!(mutation = mutation.name(), ?reason, "Mutation was a no-op");
            }
            MutationOutcome::Detached => {}
        }

        Ok(Commit {
            revision: state.revision,
            outcome,
        })
    }
}

async fn load_snapshot(path: &Path) -> Option<DocumentSnapshot> {
    if !path.exists() {
        return None;
    }
    match fs::read_to_string(path).await {
        Ok(raw) => match serde_json::from_str::<DocumentSnapshot>(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse document snapshot, starting fresh"
                );
                None
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to read document snapshot, starting fresh"
            );
            None
        }
    }
}

async fn write_snapshot(path: &Path, snapshot: &DocumentSnapshot) -> Result<(), DocumentError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| DocumentError::Io(format!("Failed to create snapshot directory: {e}")))?;
    }
    let raw = serde_json::to_string_pretty(snapshot)
        .map_err(|e| DocumentError::Io(format!("Failed to encode snapshot: {e}")))?;
    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, raw)
        .await
        .map_err(|e| DocumentError::Io(format!("Failed to write temp file: {e}")))?;
    fs::rename(&temp_path, path)
        .await
        .map_err(|e| DocumentError::Io(format!("Failed to rename temp file: {e}")))?;
    Ok(())
}

/// The in-memory commit stands even when the snapshot write fails.
async fn persist(state: &DocumentState) {
    let (Some(path), Some(document)) = (&state.snapshot_path, &state.document) else {
        return;
    };
    let snapshot = DocumentSnapshot {
        revision: state.revision,
        document: document.clone(),
    };
    if let Err(e) = write_snapshot(path, &snapshot).await {
        tracing::error!(path = %path.display(), error = %e, "Failed to persist document snapshot");
    }
}

// ============================================================================
// Document handle
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DocumentHandleError {
    #[error("Document actor unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Access to the live document as seen by the tool-call bridge and the
/// conversation controller.
#[async_trait]
pub trait DocumentHandle: Send + Sync {
    /// Current document, `None` while no editor view is mounted.
    async fn snapshot(&self) -> Result<Option<DocumentSnapshot>, DocumentHandleError>;

    /// Apply a mutation and wait for it to be committed.
    async fn apply(&self, mutation: Mutation) -> Result<Commit, DocumentHandleError>;

    async fn plain_text(&self) -> Result<Option<String>, DocumentHandleError> {
        Ok(self
            .snapshot()
            .await?
            .map(|snapshot| snapshot.document.plain_text()))
    }
}

#[async_trait]
impl DocumentHandle for ActorRef<DocumentMsg> {
    async fn snapshot(&self) -> Result<Option<DocumentSnapshot>, DocumentHandleError> {
        ractor::call!(self, |reply| DocumentMsg::Snapshot { reply })
            .map_err(|e| DocumentHandleError::Unavailable(e.to_string()))
    }

    async fn apply(&self, mutation: Mutation) -> Result<Commit, DocumentHandleError> {
        let result = ractor::call!(self, |reply| DocumentMsg::Apply { mutation, reply })
            .map_err(|e| DocumentHandleError::Unavailable(e.to_string()))?;
        Ok(result?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{parse_document, NodeType};
    use ractor::call;
    use serde_json::json;

    async fn spawn(args: DocumentArguments) -> ActorRef<DocumentMsg> {
        let (actor, _handle) = Actor::spawn(None, DocumentActor, args).await.unwrap();
        actor
    }

    fn replace(search: &str, with: &str) -> Mutation {
        Mutation::FindAndReplace {
            search_text: search.to_string(),
            replace_with: with.to_string(),
            replace_all: false,
        }
    }

    #[tokio::test]
    async fn test_commit_revision_advances_only_when_applied() {
        let actor = spawn(DocumentArguments::mounted(
            parse_document("<p>Hello world</p>").unwrap(),
        ))
        .await;

        let first = actor.apply(replace("world", "team")).await.unwrap();
        assert_eq!(first.outcome, MutationOutcome::Applied);
        assert_eq!(first.revision, 1);

        let miss = actor.apply(replace("absent", "x")).await.unwrap();
        assert!(!miss.outcome.is_applied());
        assert_eq!(miss.revision, 1);

        assert_eq!(
            actor.plain_text().await.unwrap().as_deref(),
            Some("Hello team")
        );
        actor.stop(None);
    }

    #[tokio::test]
    async fn test_unmounted_mutations_are_ignored() {
        let actor = spawn(DocumentArguments::default()).await;
        let commit = actor
            .apply(Mutation::InsertBlock {
                kind: NodeType::CallToAction,
                attrs: Default::default(),
                position: Default::default(),
                anchor_text: None,
            })
            .await
            .unwrap();
        assert_eq!(commit.outcome, MutationOutcome::Detached);
        assert!(actor.snapshot().await.unwrap().is_none());

        let revision = call!(actor, |reply| DocumentMsg::Mount {
            document: Document::empty(),
            reply,
        })
        .unwrap();
        assert_eq!(revision, 1);
        actor.cast(DocumentMsg::Unmount).unwrap();
        assert!(actor.snapshot().await.unwrap().is_none());
        actor.stop(None);
    }

    #[tokio::test]
    async fn test_document_errors_reach_the_caller() {
        let actor = spawn(DocumentArguments::mounted(Document::empty())).await;
        let err = actor
            .apply(Mutation::UpdateBlock {
                node_index: 0,
                attrs: json!({"level": 9}).as_object().cloned().unwrap(),
                expected_type: Some(NodeType::Heading),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DocumentHandleError::Document(DocumentError::StaleBlockIndex { .. })
        ));
        actor.stop(None);
    }

    #[tokio::test]
    async fn test_snapshot_persists_and_restores() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");

        let actor = spawn(
            DocumentArguments::mounted(parse_document("<p>Draft</p>").unwrap())
                .with_snapshot_path(&path),
        )
        .await;
        actor.apply(replace("Draft", "Final")).await.unwrap();
        actor.stop(None);

        let raw = std::fs::read_to_string(&path).unwrap();
        let stored: DocumentSnapshot = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored.revision, 1);

        let restored = spawn(DocumentArguments::default().with_snapshot_path(&path)).await;
        let snapshot = restored.snapshot().await.unwrap().unwrap();
        assert_eq!(snapshot.revision, 1);
        assert_eq!(snapshot.document.plain_text(), "Final");
        restored.stop(None);
    }
}

//! One open document and everything derived from it
//!
//! [`EditorSession`] is the handle an editor front end talks to. It is
//! cheap to clone; every clone drives the same document:
//!
//! - mutations (edits, recognition requests, language switches, loads) are
//!   sent to a single writer task and answered over oneshot replies
//! - every committed mutation publishes a [`DocumentSnapshot`]
//! - mistake search and suggestions run in the background over snapshots
//!   and return a [`PassHandle`]
//! - changes are broadcast as [`SessionEvent`]s

pub mod events;
pub mod passes;
pub mod snapshot;
mod writer;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::Stream;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, info, trace, warn};

use crate::cancel::{CancelFlag, Cancelled};
use crate::completion::Suggestion;
use crate::config::SessionConfig;
use crate::diagnostics::Mistake;
use crate::document::{TextBuffer, TextEdit};
use crate::language::LanguageDefinition;
use crate::recognition::{RecognitionEngine, RecognitionError, Token};

pub use events::SessionEvent;
pub use passes::{PassHandle, PassKind};
pub use snapshot::DocumentSnapshot;

use passes::{PassRegistry, PassRunner};
use writer::{Command, Reply, Writer};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("editor session is closed")]
    Closed,

    #[error("pass cancelled")]
    Cancelled,

    #[error("{kind} pass failed: {reason}")]
    PassFailed { kind: PassKind, reason: String },

    #[error(transparent)]
    Recognition(#[from] RecognitionError),
}

impl From<Cancelled> for SessionError {
    fn from(_: Cancelled) -> Self {
        SessionError::Cancelled
    }
}

#[derive(Clone)]
pub struct EditorSession {
    commands: mpsc::Sender<Command>,
    passes: PassRunner,
    suppressed: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("EditorSession")
            .field("language", &snapshot.language.name())
            .field("version", &snapshot.version)
            .field("tokens", &snapshot.tokens.len())
            .finish()
    }
}

impl EditorSession {
    /// Opens `text` under `language`. The initial scan happens before this
    /// returns; the writer (and the mistake debouncer, when enabled) are
    /// spawned on the current tokio runtime.
    pub fn open(language: Arc<LanguageDefinition>, text: &str, config: SessionConfig) -> Self {
        let buffer = TextBuffer::new(text);
        let tokens = RecognitionEngine::new(&language)
            .scan_document(&buffer, &CancelFlag::new())
            .unwrap_or_default();
        info!(
            "Opened document under {} ({} chars, {} tokens)",
            language.name(),
            text.chars().count(),
            tokens.len()
        );

        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(DocumentSnapshot {
            version: 0,
            language: Arc::clone(&language),
            text: buffer.rope().clone(),
            tokens: tokens.clone(),
        }));
        let (events_tx, _) = broadcast::channel(config.event_capacity.max(1));
        let (shutdown_tx, _) = broadcast::channel(1);
        let (commands_tx, commands_rx) = mpsc::channel(config.command_capacity.max(1));
        let registry = Arc::new(PassRegistry::default());
        let suppressed = Arc::new(AtomicBool::new(false));

        let passes = PassRunner {
            snapshots: snapshot_rx,
            registry: Arc::clone(&registry),
            events: events_tx.clone(),
            max_suggestions: config.max_suggestions,
        };

        let edits_tx = if config.auto_mistake_search {
            let (edits_tx, edits_rx) = mpsc::channel(config.command_capacity.max(1));
            spawn_mistake_debouncer(
                passes.clone(),
                edits_rx,
                shutdown_tx.subscribe(),
                config.mistake_debounce,
            );
            Some(edits_tx)
        } else {
            None
        };

        let writer = Writer::new(
            language,
            buffer,
            tokens,
            snapshot_tx,
            events_tx,
            registry,
            Arc::clone(&suppressed),
            edits_tx,
        );
        tokio::spawn(writer.run(commands_rx, shutdown_tx.subscribe()));

        Self {
            commands: commands_tx,
            passes,
            suppressed,
            shutdown_tx,
        }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| SessionError::Closed)?;
        reply_rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Applies an edit and returns the tokens whose classification changed.
    pub async fn apply_edit(&self, edit: TextEdit) -> Result<Vec<Arc<Token>>, SessionError> {
        self.request(|reply| Command::Edit { edit, reply }).await
    }

    pub async fn insert(
        &self,
        offset: usize,
        text: impl Into<String>,
    ) -> Result<Vec<Arc<Token>>, SessionError> {
        self.apply_edit(TextEdit::insert(offset, text)).await
    }

    pub async fn delete(&self, offset: usize, len: usize) -> Result<Vec<Arc<Token>>, SessionError> {
        self.apply_edit(TextEdit::delete(offset, len)).await
    }

    /// Re-recognises the word at `offset` without changing the text.
    pub async fn recognize_at(&self, offset: usize) -> Result<Vec<Arc<Token>>, SessionError> {
        self.request(|reply| Command::Recognize { offset, reply }).await
    }

    /// Switches the active language and re-classifies every token. Cancels
    /// outstanding mistake and suggestion passes, and a language switch
    /// still in progress.
    pub async fn set_language(
        &self,
        language: Arc<LanguageDefinition>,
    ) -> Result<Vec<Arc<Token>>, SessionError> {
        self.request(|reply| Command::SetLanguage { language, reply }).await
    }

    /// Replaces the whole text and rebuilds the token list.
    pub async fn load_text(
        &self,
        text: impl Into<String>,
    ) -> Result<Vec<Arc<Token>>, SessionError> {
        let text = text.into();
        self.request(|reply| Command::LoadText { text, reply }).await
    }

    /// Latest committed state of the document.
    pub fn snapshot(&self) -> Arc<DocumentSnapshot> {
        self.passes.snapshot()
    }

    /// Watch channel of committed snapshots.
    pub fn snapshots(&self) -> watch::Receiver<Arc<DocumentSnapshot>> {
        self.passes.snapshots.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.passes.events.subscribe()
    }

    /// Session events as a stream. A subscriber that falls behind skips
    /// the events it missed; the next snapshot still reflects them.
    pub fn events(&self) -> impl Stream<Item = SessionEvent> + Send + 'static {
        BroadcastStream::new(self.subscribe()).filter_map(|event| match event {
            Ok(event) => Some(event),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!("Event subscriber lagged, skipped {} events", skipped);
                None
            }
        })
    }

    /// Searches the latest snapshot for mistakes, replacing any search
    /// still running.
    pub fn find_mistakes(&self) -> PassHandle<Vec<Mistake>> {
        self.passes.find_mistakes()
    }

    /// Suggestions for the word at `offset` in the latest snapshot,
    /// replacing any suggestion pass still running.
    pub fn suggest_at(&self, offset: usize) -> PassHandle<Vec<Suggestion>> {
        self.passes.suggest_at(offset)
    }

    /// True while a language switch or load is being applied; edits sent
    /// meanwhile are queued.
    pub fn is_recognition_suppressed(&self) -> bool {
        self.suppressed.load(Ordering::Acquire)
    }

    /// Stops the writer. Pending and later requests fail with
    /// [`SessionError::Closed`].
    pub fn close(&self) {
        debug!("Closing editor session");
        let _ = self.shutdown_tx.send(());
        self.passes.registry.cancel_all();
    }
}

/// Runs a mistake search once edits have been quiet for `debounce`.
fn spawn_mistake_debouncer(
    passes: PassRunner,
    mut edits: mpsc::Receiver<u64>,
    mut shutdown: broadcast::Receiver<()>,
    debounce: Duration,
) {
    tokio::spawn(async move {
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                edit = edits.recv() => match edit {
                    Some(version) => {
                        trace!("Edit at version {}, restarting mistake debounce", version);
                        deadline = Some(Instant::now() + debounce);
                    }
                    None => break,
                },
                _ = sleep_until(deadline) => {
                    deadline = None;
                    // Results reach subscribers as MistakesUpdated.
                    drop(passes.find_mistakes());
                }
            }
        }

        debug!("Mistake debouncer terminated");
    });
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

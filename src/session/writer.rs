//! The single writer owning the document
//!
//! All token list mutations funnel through one task that receives commands
//! over an mpsc channel. Whole-document work (language switch, text load)
//! runs on the blocking pool over a copy while the writer keeps receiving;
//! edits arriving meanwhile are deferred and replayed once the result is
//! committed.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::cancel::{CancelFlag, Cancelled};
use crate::document::{TextBuffer, TextEdit};
use crate::language::LanguageDefinition;
use crate::metrics::metrics;
use crate::recognition::{RecognitionEngine, Token, TokenList};

use super::SessionError;
use super::events::SessionEvent;
use super::passes::{PassKind, PassRegistry};
use super::snapshot::DocumentSnapshot;

pub(crate) type Reply<T> = oneshot::Sender<Result<T, SessionError>>;
type Changed = Vec<Arc<Token>>;

pub(crate) enum Command {
    Edit {
        edit: TextEdit,
        reply: Reply<Changed>,
    },
    Recognize {
        offset: usize,
        reply: Reply<Changed>,
    },
    SetLanguage {
        language: Arc<LanguageDefinition>,
        reply: Reply<Changed>,
    },
    LoadText {
        text: String,
        reply: Reply<Changed>,
    },
}

impl Command {
    fn reply(self, result: Result<Changed, SessionError>) {
        let reply = match self {
            Command::Edit { reply, .. }
            | Command::Recognize { reply, .. }
            | Command::SetLanguage { reply, .. }
            | Command::LoadText { reply, .. } => reply,
        };
        let _ = reply.send(result);
    }
}

enum Outcome {
    Reclassified {
        language: Arc<LanguageDefinition>,
        tokens: TokenList,
        changed: Changed,
    },
    Loaded {
        buffer: TextBuffer,
        tokens: TokenList,
    },
}

/// A whole-document mutation running off the writer task.
struct ProgrammaticPass {
    kind: PassKind,
    cancel: CancelFlag,
    task: JoinHandle<Result<Outcome, Cancelled>>,
    reply: Reply<Changed>,
}

impl ProgrammaticPass {
    fn cancel(self) {
        self.cancel.cancel();
        metrics().record_cancelled_pass();
        debug!("{} pass cancelled", self.kind);
        let _ = self.reply.send(Err(SessionError::Cancelled));
    }
}

pub(crate) struct Writer {
    version: u64,
    language: Arc<LanguageDefinition>,
    buffer: TextBuffer,
    tokens: TokenList,
    snapshots: watch::Sender<Arc<DocumentSnapshot>>,
    events: broadcast::Sender<SessionEvent>,
    passes: Arc<PassRegistry>,
    suppressed: Arc<AtomicBool>,
    /// Notified after every user edit; feeds the mistake debouncer.
    edits: Option<mpsc::Sender<u64>>,
    running: Option<ProgrammaticPass>,
    deferred: VecDeque<Command>,
}

impl Writer {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        language: Arc<LanguageDefinition>,
        buffer: TextBuffer,
        tokens: TokenList,
        snapshots: watch::Sender<Arc<DocumentSnapshot>>,
        events: broadcast::Sender<SessionEvent>,
        passes: Arc<PassRegistry>,
        suppressed: Arc<AtomicBool>,
        edits: Option<mpsc::Sender<u64>>,
    ) -> Self {
        Self {
            version: 0,
            language,
            buffer,
            tokens,
            snapshots,
            events,
            passes,
            suppressed,
            edits,
            running: None,
            deferred: VecDeque::new(),
        }
    }

    pub(crate) fn snapshot(&self) -> Arc<DocumentSnapshot> {
        Arc::new(DocumentSnapshot {
            version: self.version,
            language: Arc::clone(&self.language),
            text: self.buffer.rope().clone(),
            tokens: self.tokens.clone(),
        })
    }

    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    debug!("Editor session received shutdown signal");
                    break;
                }
                finished = finished(&mut self.running) => {
                    if let Some(pass) = self.running.take() {
                        self.commit(pass, finished);
                    }
                }
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                }
            }
        }

        if let Some(pass) = self.running.take() {
            pass.cancel.cancel();
        }
        self.passes.cancel_all();
        debug!("Editor session writer terminated");
    }

    fn handle(&mut self, command: Command) {
        if self.running.is_none() {
            self.execute(command);
            return;
        }

        match command {
            Command::SetLanguage { language, reply } => {
                if self
                    .running
                    .as_ref()
                    .is_some_and(|pass| pass.kind == PassKind::LanguageSwitch)
                {
                    if let Some(previous) = self.running.take() {
                        previous.cancel();
                    }
                    self.start_language_switch(language, reply);
                } else {
                    self.deferred.push_back(Command::SetLanguage { language, reply });
                }
            }
            Command::LoadText { text, reply } => {
                if self.running.as_ref().is_some_and(|pass| pass.kind == PassKind::Load) {
                    if let Some(previous) = self.running.take() {
                        previous.cancel();
                    }
                    self.start_load(text, reply);
                } else {
                    self.deferred.push_back(Command::LoadText { text, reply });
                }
            }
            command => {
                debug!("Recognition suppressed, deferring edit");
                self.deferred.push_back(command);
            }
        }
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::Edit { edit, reply } => {
                let engine = RecognitionEngine::new(&self.language);
                let result = engine.apply_edit(&mut self.buffer, &mut self.tokens, &edit);
                let result = result.map(|changed| {
                    self.publish_tokens(changed.clone());
                    if let Some(edits) = &self.edits {
                        let _ = edits.try_send(self.version);
                    }
                    changed
                });
                let _ = reply.send(result.map_err(SessionError::from));
            }
            Command::Recognize { offset, reply } => {
                let engine = RecognitionEngine::new(&self.language);
                let result = engine
                    .recognize_at(&self.buffer, &mut self.tokens, offset)
                    .map(|changed| {
                        if !changed.is_empty() {
                            self.publish_tokens(changed.clone());
                        }
                        changed
                    });
                let _ = reply.send(result.map_err(SessionError::from));
            }
            Command::SetLanguage { language, reply } => {
                self.start_language_switch(language, reply)
            }
            Command::LoadText { text, reply } => self.start_load(text, reply),
        }
    }

    /// Read passes started against the pre-commit snapshot must not publish.
    fn cancel_read_passes(&self) {
        self.passes.cancel(PassKind::MistakeSearch);
        self.passes.cancel(PassKind::Suggestions);
    }

    fn start_language_switch(&mut self, language: Arc<LanguageDefinition>, reply: Reply<Changed>) {
        // Results computed against the old definition are stale.
        self.cancel_read_passes();

        info!("Switching language {} -> {}", self.language.name(), language.name());
        metrics().record_language_switch();

        let cancel = CancelFlag::new();
        let worker_cancel = cancel.clone();
        let text = self.buffer.rope().clone();
        let tokens = self.tokens.clone();
        let task = tokio::task::spawn_blocking(move || -> Result<Outcome, Cancelled> {
            let (tokens, changed) =
                RecognitionEngine::new(&language).reclassify_all(&text, &tokens, &worker_cancel)?;
            Ok(Outcome::Reclassified {
                language,
                tokens,
                changed,
            })
        });
        self.begin_programmatic(PassKind::LanguageSwitch, cancel, task, reply);
    }

    fn start_load(&mut self, text: String, reply: Reply<Changed>) {
        self.cancel_read_passes();

        let cancel = CancelFlag::new();
        let worker_cancel = cancel.clone();
        let language = Arc::clone(&self.language);
        let task = tokio::task::spawn_blocking(move || -> Result<Outcome, Cancelled> {
            let buffer = TextBuffer::new(&text);
            let tokens =
                RecognitionEngine::new(&language).scan_document(&buffer, &worker_cancel)?;
            Ok(Outcome::Loaded { buffer, tokens })
        });
        self.begin_programmatic(PassKind::Load, cancel, task, reply);
    }

    fn begin_programmatic(
        &mut self,
        kind: PassKind,
        cancel: CancelFlag,
        task: JoinHandle<Result<Outcome, Cancelled>>,
        reply: Reply<Changed>,
    ) {
        debug!("Starting {} pass", kind);
        self.suppressed.store(true, Ordering::Release);
        self.running = Some(ProgrammaticPass {
            kind,
            cancel,
            task,
            reply,
        });
    }

    fn commit(
        &mut self,
        pass: ProgrammaticPass,
        finished: Result<Result<Outcome, Cancelled>, JoinError>,
    ) {
        let ProgrammaticPass { kind, reply, .. } = pass;
        let result = match finished {
            Ok(Ok(Outcome::Reclassified {
                language,
                tokens,
                changed,
            })) => {
                // Passes started while the switch ran still saw the old language.
                self.cancel_read_passes();
                self.language = language;
                self.tokens = tokens;
                self.version += 1;
                self.publish_snapshot();
                self.emit(SessionEvent::LanguageChanged {
                    version: self.version,
                    language: self.language.name().to_string(),
                });
                self.emit(SessionEvent::TokensChanged {
                    version: self.version,
                    changed: changed.clone(),
                });
                Ok(changed)
            }
            Ok(Ok(Outcome::Loaded { buffer, tokens })) => {
                self.cancel_read_passes();
                self.buffer = buffer;
                self.tokens = tokens;
                let all: Changed = self.tokens.iter().cloned().collect();
                self.publish_tokens(all.clone());
                Ok(all)
            }
            Ok(Err(Cancelled)) => {
                metrics().record_cancelled_pass();
                Err(SessionError::Cancelled)
            }
            Err(join_error) => {
                error!("{} pass failed: {}", kind, join_error);
                metrics().record_failed_pass();
                Err(SessionError::PassFailed {
                    kind,
                    reason: join_error.to_string(),
                })
            }
        };
        debug!("Finished {} pass", kind);
        let _ = reply.send(result);

        self.suppressed.store(false, Ordering::Release);
        self.replay_deferred();
    }

    fn replay_deferred(&mut self) {
        while self.running.is_none() {
            let Some(command) = self.deferred.pop_front() else {
                break;
            };
            self.execute(command);
        }
        if !self.deferred.is_empty() {
            debug!("{} commands still deferred", self.deferred.len());
        }
    }

    /// Bumps the version after a token list mutation and notifies subscribers.
    fn publish_tokens(&mut self, changed: Changed) {
        self.version += 1;
        self.publish_snapshot();
        if self.buffer.is_empty() {
            self.emit(SessionEvent::Cleared {
                version: self.version,
            });
        } else {
            self.emit(SessionEvent::TokensChanged {
                version: self.version,
                changed,
            });
        }
    }

    fn publish_snapshot(&self) {
        self.snapshots.send_replace(self.snapshot());
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

/// Resolves when the running programmatic pass finishes; never resolves
/// when none is running.
async fn finished(
    running: &mut Option<ProgrammaticPass>,
) -> Result<Result<Outcome, Cancelled>, JoinError> {
    match running {
        Some(pass) => (&mut pass.task).await,
        None => std::future::pending().await,
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        if !self.deferred.is_empty() {
            warn!("Dropping {} deferred commands on shutdown", self.deferred.len());
        }
        for command in self.deferred.drain(..) {
            command.reply(Err(SessionError::Closed));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Mistake;
    use crate::session::passes::PassRunner;
    use std::path::Path;
    use std::sync::mpsc as std_mpsc;

    fn shipped(file: &str) -> Arc<LanguageDefinition> {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("languages").join(file);
        Arc::new(LanguageDefinition::from_path(path).unwrap())
    }

    #[tokio::test]
    async fn test_committed_switch_silences_passes_started_during_it() {
        let english = shipped("english.json");
        let german = shipped("german.json");
        let buffer = TextBuffer::new("if x then");
        let tokens = RecognitionEngine::new(&english)
            .scan_document(&buffer, &CancelFlag::new())
            .unwrap();
        let (switched, changed) = RecognitionEngine::new(&german)
            .reclassify_all(&buffer, &tokens, &CancelFlag::new())
            .unwrap();

        let (snapshots_tx, snapshots_rx) = watch::channel(Arc::new(DocumentSnapshot {
            version: 0,
            language: Arc::clone(&english),
            text: buffer.rope().clone(),
            tokens: tokens.clone(),
        }));
        let (events_tx, mut events) = broadcast::channel(16);
        let registry = Arc::new(PassRegistry::default());
        let runner = PassRunner {
            snapshots: snapshots_rx,
            registry: Arc::clone(&registry),
            events: events_tx.clone(),
            max_suggestions: 0,
        };
        let mut writer = Writer::new(
            english,
            buffer,
            tokens,
            snapshots_tx,
            events_tx,
            registry,
            Arc::new(AtomicBool::new(true)),
            None,
        );

        // Started while the switch is still running, so it reads the old language.
        let (release, gate) = std_mpsc::channel::<()>();
        let stale = runner.spawn(
            PassKind::MistakeSearch,
            move |_| {
                let _ = gate.recv();
                Ok(Vec::<Mistake>::new())
            },
            |mistakes| SessionEvent::MistakesUpdated {
                version: 0,
                mistakes: mistakes.clone(),
            },
        );

        let (reply_tx, reply_rx) = oneshot::channel();
        let pass = ProgrammaticPass {
            kind: PassKind::LanguageSwitch,
            cancel: CancelFlag::new(),
            task: tokio::spawn(async { Err(Cancelled) }),
            reply: reply_tx,
        };
        writer.commit(
            pass,
            Ok(Ok(Outcome::Reclassified {
                language: german,
                tokens: switched,
                changed,
            })),
        );
        let _ = release.send(());

        assert_eq!(reply_rx.await.unwrap().unwrap().len(), 2);
        assert_eq!(stale.wait().await, Err(SessionError::Cancelled));
        assert_eq!(runner.snapshot().language.name(), "Deutsch");

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event);
        }
        assert!(matches!(received[0], SessionEvent::LanguageChanged { version: 1, .. }));
        assert!(matches!(received[1], SessionEvent::TokensChanged { version: 1, .. }));
        assert_eq!(received.len(), 2);
    }
}

//! Background read-only passes over document snapshots
//!
//! At most one pass of each kind is outstanding: starting a pass cancels
//! the previous one of the same kind through its oneshot channel and its
//! cooperative flag. Work runs on the blocking pool; a panic inside it is
//! caught at the join boundary and reported as a failed pass.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::{broadcast, oneshot, watch};
use tracing::{debug, error, trace};

use crate::cancel::CancelFlag;
use crate::completion::{Suggestion, SuggestionProvider};
use crate::diagnostics::{self, Mistake};
use crate::document::DocumentError;
use crate::metrics::metrics;
use crate::recognition::RecognitionError;

use super::events::SessionEvent;
use super::snapshot::DocumentSnapshot;
use super::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    MistakeSearch,
    Suggestions,
    LanguageSwitch,
    Load,
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PassKind::MistakeSearch => "mistake search",
            PassKind::Suggestions => "suggestion",
            PassKind::LanguageSwitch => "language switch",
            PassKind::Load => "load",
        };
        f.write_str(name)
    }
}

/// Result handle of a background pass.
#[derive(Debug)]
pub struct PassHandle<T> {
    kind: PassKind,
    cancel: CancelFlag,
    result: oneshot::Receiver<Result<T, SessionError>>,
}

impl<T> PassHandle<T> {
    pub fn kind(&self) -> PassKind {
        self.kind
    }

    /// Asks the pass to stop; `wait` then yields `SessionError::Cancelled`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn wait(self) -> Result<T, SessionError> {
        self.result.await.unwrap_or(Err(SessionError::Cancelled))
    }
}

struct ActivePass {
    id: u64,
    flag: CancelFlag,
    cancel_tx: oneshot::Sender<()>,
}

impl ActivePass {
    fn cancel(self) {
        self.flag.cancel();
        let _ = self.cancel_tx.send(());
    }
}

/// Outstanding pass per kind.
#[derive(Default)]
pub(crate) struct PassRegistry {
    active: Mutex<FxHashMap<PassKind, ActivePass>>,
    next_id: AtomicU64,
}

impl PassRegistry {
    /// Registers a new pass of `kind`, cancelling the previous one.
    fn begin(&self, kind: PassKind, flag: CancelFlag) -> (u64, oneshot::Receiver<()>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let previous = self.active.lock().insert(
            kind,
            ActivePass {
                id,
                flag,
                cancel_tx,
            },
        );
        if let Some(previous) = previous {
            trace!("Cancelling previous {} pass #{}", kind, previous.id);
            previous.cancel();
        }
        (id, cancel_rx)
    }

    fn finish(&self, kind: PassKind, id: u64) {
        let mut active = self.active.lock();
        if active.get(&kind).is_some_and(|pass| pass.id == id) {
            active.remove(&kind);
        }
    }

    /// Retires pass `id` and runs `publish` under the registry lock, unless
    /// the pass was cancelled or superseded first. A cancellation that
    /// returns has therefore either seen the publish or prevented it.
    fn complete(&self, kind: PassKind, id: u64, publish: impl FnOnce()) -> bool {
        let mut active = self.active.lock();
        if !active.get(&kind).is_some_and(|pass| pass.id == id) {
            return false;
        }
        active.remove(&kind);
        publish();
        true
    }

    pub(crate) fn cancel(&self, kind: PassKind) {
        let pass = self.active.lock().remove(&kind);
        if let Some(pass) = pass {
            debug!("Cancelled {} pass #{}", kind, pass.id);
            pass.cancel();
        }
    }

    pub(crate) fn cancel_all(&self) {
        let passes: Vec<_> = self.active.lock().drain().collect();
        for (kind, pass) in passes {
            debug!("Cancelled {} pass #{}", kind, pass.id);
            pass.cancel();
        }
    }

    #[cfg(test)]
    fn is_active(&self, kind: PassKind) -> bool {
        self.active.lock().contains_key(&kind)
    }
}

/// Starts read-only passes against the latest published snapshot.
#[derive(Clone)]
pub(crate) struct PassRunner {
    pub(crate) snapshots: watch::Receiver<Arc<DocumentSnapshot>>,
    pub(crate) registry: Arc<PassRegistry>,
    pub(crate) events: broadcast::Sender<SessionEvent>,
    pub(crate) max_suggestions: usize,
}

impl PassRunner {
    pub(crate) fn snapshot(&self) -> Arc<DocumentSnapshot> {
        Arc::clone(&self.snapshots.borrow())
    }

    pub(crate) fn find_mistakes(&self) -> PassHandle<Vec<Mistake>> {
        let snapshot = self.snapshot();
        let version = snapshot.version;
        metrics().record_mistake_pass();

        self.spawn(
            PassKind::MistakeSearch,
            move |cancel| {
                diagnostics::find_mistakes(
                    &snapshot.language,
                    &snapshot.text,
                    &snapshot.tokens,
                    cancel,
                )
                .map_err(SessionError::from)
            },
            move |mistakes| SessionEvent::MistakesUpdated {
                version,
                mistakes: mistakes.clone(),
            },
        )
    }

    pub(crate) fn suggest_at(&self, offset: usize) -> PassHandle<Vec<Suggestion>> {
        let snapshot = self.snapshot();
        let version = snapshot.version;
        let limit = self.max_suggestions;
        metrics().record_suggestion_pass();

        self.spawn(
            PassKind::Suggestions,
            move |cancel| {
                let len = snapshot.text.len_chars();
                if offset > len {
                    let error = DocumentError::OffsetOutOfBounds { offset, len };
                    return Err(SessionError::Recognition(RecognitionError::from(error)));
                }
                let Some(token) = snapshot.token_at(offset) else {
                    return Ok(Vec::new());
                };
                SuggestionProvider::new(&snapshot.language)
                    .with_limit(limit)
                    .suggest(token, &snapshot.tokens, cancel)
                    .map_err(SessionError::from)
            },
            move |suggestions| SessionEvent::SuggestionsUpdated {
                version,
                offset,
                suggestions: suggestions.clone(),
            },
        )
    }

    pub(super) fn spawn<T, W, E>(&self, kind: PassKind, work: W, to_event: E) -> PassHandle<T>
    where
        T: Send + 'static,
        W: FnOnce(&CancelFlag) -> Result<T, SessionError> + Send + 'static,
        E: FnOnce(&T) -> SessionEvent + Send + 'static,
    {
        let flag = CancelFlag::new();
        let (id, cancel_rx) = self.registry.begin(kind, flag.clone());
        let (result_tx, result_rx) = oneshot::channel();
        let registry = Arc::clone(&self.registry);
        let events = self.events.clone();
        let worker_flag = flag.clone();
        let handle_flag = flag.clone();

        debug!("Starting {} pass #{}", kind, id);
        tokio::spawn(async move {
            let mut worker = tokio::task::spawn_blocking(move || work(&worker_flag));

            let outcome = tokio::select! {
                biased;
                _ = cancel_rx => {
                    flag.cancel();
                    Err(SessionError::Cancelled)
                }
                joined = &mut worker => match joined {
                    Ok(result) => result,
                    Err(join_error) => {
                        error!("{} pass #{} failed: {}", kind, id, join_error);
                        metrics().record_failed_pass();
                        Err(SessionError::PassFailed {
                            kind,
                            reason: join_error.to_string(),
                        })
                    }
                },
            };

            let outcome = match outcome {
                Ok(value) => {
                    let published = registry.complete(kind, id, || {
                        let _ = events.send(to_event(&value));
                    });
                    if published {
                        Ok(value)
                    } else {
                        Err(SessionError::Cancelled)
                    }
                }
                Err(e) => {
                    registry.finish(kind, id);
                    Err(e)
                }
            };

            match &outcome {
                Ok(_) => debug!("Finished {} pass #{}", kind, id),
                Err(SessionError::Cancelled) => {
                    debug!("{} pass #{} cancelled", kind, id);
                    metrics().record_cancelled_pass();
                }
                Err(e) => debug!("{} pass #{} ended with error: {}", kind, id, e),
            }
            let _ = result_tx.send(outcome);
        });

        PassHandle {
            kind,
            cancel: handle_flag,
            result: result_rx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::LanguageDefinition;
    use crate::recognition::RecognitionEngine;
    use ropey::Rope;
    use std::path::Path;
    use std::sync::mpsc;

    fn runner(text: &str) -> (PassRunner, broadcast::Receiver<SessionEvent>) {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("languages/english.json");
        let language = Arc::new(LanguageDefinition::from_path(path).unwrap());
        let text = Rope::from_str(text);
        let tokens = RecognitionEngine::new(&language)
            .scan_document(&text, &CancelFlag::new())
            .unwrap();
        let (_snapshots_tx, snapshots) = watch::channel(Arc::new(DocumentSnapshot {
            version: 0,
            language,
            text,
            tokens,
        }));
        let (events, events_rx) = broadcast::channel(16);
        let runner = PassRunner {
            snapshots,
            registry: Arc::new(PassRegistry::default()),
            events,
            max_suggestions: 0,
        };
        (runner, events_rx)
    }

    /// A mistake pass that blocks until `release` is signalled.
    fn gated_pass(runner: &PassRunner) -> (PassHandle<Vec<Mistake>>, mpsc::Sender<()>) {
        let (release, gate) = mpsc::channel::<()>();
        let handle = runner.spawn(
            PassKind::MistakeSearch,
            move |_| {
                let _ = gate.recv();
                Ok(Vec::new())
            },
            |mistakes| SessionEvent::MistakesUpdated {
                version: 0,
                mistakes: mistakes.clone(),
            },
        );
        (handle, release)
    }

    #[test]
    fn test_begin_cancels_previous_pass_of_same_kind() {
        let registry = PassRegistry::default();
        let first = CancelFlag::new();
        let other_kind = CancelFlag::new();

        let (first_id, mut first_rx) = registry.begin(PassKind::MistakeSearch, first.clone());
        registry.begin(PassKind::Suggestions, other_kind.clone());
        let (second_id, _second_rx) = registry.begin(PassKind::MistakeSearch, CancelFlag::new());

        assert_ne!(first_id, second_id);
        assert!(first.is_cancelled());
        assert_eq!(first_rx.try_recv(), Ok(()));
        assert!(!other_kind.is_cancelled());
    }

    #[test]
    fn test_finish_ignores_superseded_pass() {
        let registry = PassRegistry::default();
        let (first_id, _first_rx) = registry.begin(PassKind::Load, CancelFlag::new());
        let (_second_id, _second_rx) = registry.begin(PassKind::Load, CancelFlag::new());

        registry.finish(PassKind::Load, first_id);
        assert!(registry.is_active(PassKind::Load));

        registry.cancel_all();
        assert!(!registry.is_active(PassKind::Load));
    }

    #[tokio::test]
    async fn test_superseded_pass_never_publishes() {
        let (runner, mut events) = runner("print x");
        let (first, release) = gated_pass(&runner);

        let second = runner.find_mistakes();
        let _ = release.send(());

        assert_eq!(first.wait().await, Err(SessionError::Cancelled));
        assert_eq!(second.wait().await.unwrap().len(), 1);
        match events.try_recv() {
            Ok(SessionEvent::MistakesUpdated { mistakes, .. }) => assert_eq!(mistakes.len(), 1),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_cancelled_pass_stays_silent_after_its_work_finishes() {
        let (runner, mut events) = runner("print x");
        let (pass, release) = gated_pass(&runner);

        runner.registry.cancel(PassKind::MistakeSearch);
        let _ = release.send(());

        assert_eq!(pass.wait().await, Err(SessionError::Cancelled));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_panicking_pass_fails_without_poisoning_the_next() {
        let (runner, mut events) = runner("print x");

        let failed = runner.spawn(
            PassKind::MistakeSearch,
            |_| -> Result<Vec<Mistake>, SessionError> { panic!("mistake table corrupted") },
            |mistakes| SessionEvent::MistakesUpdated {
                version: 0,
                mistakes: mistakes.clone(),
            },
        );
        match failed.wait().await {
            Err(SessionError::PassFailed { kind, reason }) => {
                assert_eq!(kind, PassKind::MistakeSearch);
                assert!(reason.contains("panic"), "{}", reason);
            }
            other => panic!("expected a failed pass, got {:?}", other),
        }
        assert!(!runner.registry.is_active(PassKind::MistakeSearch));

        let mistakes = runner.find_mistakes().wait().await.unwrap();
        assert_eq!(mistakes.len(), 1);
        assert_eq!(mistakes[0].token.content(), "x");
        assert!(matches!(
            events.try_recv(),
            Ok(SessionEvent::MistakesUpdated { .. })
        ));
    }
}

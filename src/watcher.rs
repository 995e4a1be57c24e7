//! File watcher for continuous recompilation
//!
//! Watches the source root recursively, coalesces rapid successive write
//! events with a fixed quiescence interval, filters editor auto-save noise
//! by content fingerprint, and feeds changed files back into the compilation
//! pipeline. A failed recompile leaves the previously cached unit in place;
//! the watcher reports the outcome and keeps watching.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::fingerprint::Fingerprint;
use crate::ident::{ModuleId, SOURCE_EXTENSION};
use crate::pipeline::CompilePipeline;
use crate::store::RESERVED_DIR;

/// Quiescence interval for coalescing bursts of filesystem events.
pub const DEBOUNCE_MS: u64 = 100;

/// Initial period during which spurious notify events are drained.
const STARTUP_COOLDOWN_MS: u64 = 500;

/// Progress events emitted while watching.
#[derive(Debug, Clone)]
pub enum ReloadEvent {
    Started { root: String },
    Changed { path: String },
    Reloaded { module: String },
    StillStale { module: String },
    BatchComplete { reused: usize, compiled: usize, failed: usize },
    Shutdown,
}

/// Pending-change set for debouncing
struct DebounceState {
    pending: HashSet<PathBuf>,
    last_change: Option<Instant>,
}

impl DebounceState {
    fn new() -> Self {
        Self {
            pending: HashSet::new(),
            last_change: None,
        }
    }

    fn add(&mut self, path: PathBuf) {
        self.pending.insert(path);
        self.last_change = Some(Instant::now());
    }

    fn ready(&self) -> bool {
        match self.last_change {
            Some(last) => {
                !self.pending.is_empty() && last.elapsed() >= Duration::from_millis(DEBOUNCE_MS)
            }
            None => false,
        }
    }

    fn take(&mut self) -> Vec<PathBuf> {
        let changes: Vec<_> = self.pending.drain().collect();
        self.last_change = None;
        changes
    }
}

/// Watch `root` and recompile changed modules until `running` is cleared.
pub fn watch(
    root: &Path,
    pipeline: &CompilePipeline,
    debug_events: bool,
    running: Arc<AtomicBool>,
    on_event: impl Fn(ReloadEvent),
) -> EngineResult<()> {
    on_event(ReloadEvent::Started {
        root: root.display().to_string(),
    });

    let (tx, rx) = channel();

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                for path in event.paths {
                    let _ = tx.send(path);
                }
            }
        },
        Config::default(),
    )
    .map_err(|e| EngineError::Watch(e.to_string()))?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|e| EngineError::Watch(e.to_string()))?;

    // Drain events notify sometimes emits for existing files right after the
    // watcher is registered.
    let cooldown_end = Instant::now() + Duration::from_millis(STARTUP_COOLDOWN_MS);
    while Instant::now() < cooldown_end {
        let _ = rx.recv_timeout(Duration::from_millis(50));
    }

    let mut state = DebounceState::new();

    while running.load(Ordering::SeqCst) {
        // Check for file changes (non-blocking with timeout)
        if let Ok(path) = rx.recv_timeout(Duration::from_millis(50)) {
            if !is_module_source(&path) {
                continue;
            }
            let path = path.canonicalize().unwrap_or(path);
            if debug_events {
                debug!(path = %path.display(), "filesystem event");
            }

            // Skip notifications that did not change the content (editor
            // auto-save noise). The pipeline's fingerprint accumulator is the
            // last-known state per module.
            if let Ok(bytes) = std::fs::read(&path) {
                let fresh = Fingerprint::of_bytes(&bytes);
                let unchanged = ModuleId::from_source_path(root, &path)
                    .and_then(|id| pipeline.fingerprint(&id))
                    .is_some_and(|known| known == fresh);
                if unchanged {
                    continue;
                }

                on_event(ReloadEvent::Changed {
                    path: path.display().to_string(),
                });
                state.add(path);
            }
        }

        // Recompile once the burst has settled
        if state.ready() {
            let changed = state.take();
            let report = pipeline.run(root, &changed);

            for id in report.reused.iter().chain(report.compiled.iter()) {
                on_event(ReloadEvent::Reloaded {
                    module: id.to_string(),
                });
            }
            for (id, _) in &report.failed {
                on_event(ReloadEvent::StillStale {
                    module: id.to_string(),
                });
            }
            on_event(ReloadEvent::BatchComplete {
                reused: report.reused.len(),
                compiled: report.compiled.len(),
                failed: report.failed.len(),
            });
        }
    }

    on_event(ReloadEvent::Shutdown);
    Ok(())
}

/// Module sources carry the engine's extension and never live inside the
/// reserved engine directory.
fn is_module_source(path: &Path) -> bool {
    path.extension().map(|e| e == SOURCE_EXTENSION).unwrap_or(false)
        && !path.components().any(|c| c.as_os_str() == RESERVED_DIR)
}

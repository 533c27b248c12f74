//! Headless editing session: effect settings, live preview and history.
//!
//! Parameter edits submit the selected effect against the committed image.
//! Results come back on the worker thread and replace the preview only when
//! they are newer than what is shown, so a slow earlier request can never
//! overwrite a later one. Applying, undoing or loading raises a floor below
//! which late results are discarded.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::debug;

use crate::effects::{Effect, EffectKind, EffectSettings};
use crate::error::{Result, TransformError};
use crate::history::History;
use crate::image::Image;
use crate::worker::{TransformOutput, TransformWorker, WorkerConfig};

#[derive(Debug, Default)]
struct PreviewState {
    shown: Option<TransformOutput>,
    /// Lowest sequence still accepted.
    floor: u64,
}

#[derive(Debug, Default)]
struct PreviewSlot {
    state: Mutex<PreviewState>,
    ready: Condvar,
}

impl PreviewSlot {
    fn lock(&self) -> MutexGuard<'_, PreviewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn offer(&self, output: TransformOutput) {
        let mut state = self.lock();
        let newer = state
            .shown
            .as_ref()
            .map_or(true, |shown| output.sequence > shown.sequence);

        if newer && output.sequence >= state.floor {
            state.shown = Some(output);
            self.ready.notify_all();
        } else {
            debug!("discarding stale preview #{}", output.sequence);
        }
    }

    fn clear(&self, floor: u64) {
        let mut state = self.lock();
        state.shown = None;
        state.floor = floor;
    }
}

pub struct Editor {
    worker: TransformWorker,
    preview: Arc<PreviewSlot>,
    settings: EffectSettings,
    history: History,
}

impl Editor {
    /// Open `image` with a worker started from `config`.
    pub fn new(image: Image, config: WorkerConfig) -> Result<Self> {
        Ok(Editor::with_worker(image, TransformWorker::new(config)?))
    }

    /// Open `image` on an existing worker. Its result callback is replaced.
    pub fn with_worker(image: Image, worker: TransformWorker) -> Self {
        let preview = Arc::new(PreviewSlot::default());
        preview.clear(worker.last_sequence() + 1);

        let slot = Arc::clone(&preview);
        worker.on_result(move |output| slot.offer(output));

        Editor {
            worker,
            preview,
            settings: EffectSettings::default(),
            history: History::new(image),
        }
    }

    pub fn settings(&self) -> &EffectSettings {
        &self.settings
    }

    /// Edit parameters without submitting; follow with [`Editor::refresh`].
    pub fn settings_mut(&mut self) -> &mut EffectSettings {
        &mut self.settings
    }

    /// Store `effect`'s parameters and render it against the committed image.
    pub fn update(&mut self, effect: Effect) -> u64 {
        self.settings.set(effect.clone());
        self.worker.submit(effect, self.image().clone())
    }

    /// Render the stored parameters of `kind`.
    pub fn refresh(&self, kind: EffectKind) -> u64 {
        self.worker.submit(self.settings.effect(kind), self.image().clone())
    }

    /// Latest accepted result, if any.
    pub fn preview(&self) -> Option<TransformOutput> {
        self.preview.lock().shown.clone()
    }

    /// Whether the preview reflects the most recent submit.
    pub fn preview_is_current(&self) -> bool {
        let last = self.worker.last_sequence();
        self.preview
            .lock()
            .shown
            .as_ref()
            .is_some_and(|shown| shown.sequence == last)
    }

    /// Block until a preview with at least `sequence` is shown.
    ///
    /// Returns `None` on timeout or if `sequence` was discarded by a commit.
    pub fn wait_for_preview(&self, sequence: u64, timeout: Duration) -> Option<TransformOutput> {
        let deadline = Instant::now() + timeout;
        let mut state = self.preview.lock();

        loop {
            if sequence < state.floor {
                return None;
            }
            if let Some(shown) = state.shown.as_ref().filter(|s| s.sequence >= sequence) {
                return Some(shown.clone());
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            state = match self.preview.ready.wait_timeout(state, remaining) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Commit the preview to the history under its effect label.
    pub fn apply(&mut self) -> Result<()> {
        let output = {
            let mut state = self.preview.lock();
            state.shown.take().ok_or(TransformError::NoPreview)?
        };

        self.history.push(output.name, output.image);
        self.discard_pending();
        Ok(())
    }

    /// Revert the last commit. Returns `false` if nothing was committed.
    pub fn undo(&mut self) -> bool {
        let undone = self.history.undo();
        if undone {
            self.discard_pending();
        }
        undone
    }

    /// Replace the session image and clear the history.
    pub fn load(&mut self, image: Image) {
        self.history.reset(image);
        self.discard_pending();
    }

    /// The committed image effects are rendered against.
    pub fn image(&self) -> &Image {
        &self.history.current().image
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn worker(&self) -> &TransformWorker {
        &self.worker
    }

    fn discard_pending(&self) {
        self.preview.clear(self.worker.last_sequence() + 1);
    }
}

// ============================================================================
// BACKGROUND RENDERING — cancellable full-resolution renders, coalesced
// ============================================================================
//
// The preview path stays synchronous on the caller's thread; this worker is
// for the expensive full-resolution renders (export, final compositing).
// `submit` replaces any queued request and cancels the in-flight one, so a
// newer request always supersedes older work.  A short debounce window
// coalesces rapid-fire submissions (a dragged slider) down to the most
// recent value.
// ============================================================================

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use image::RgbImage;

use crate::editor::{Recipe, RenderPipeline, RenderTarget};

/// How long a request must sit unreplaced before the worker picks it up.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(50);

/// Cooperative cancellation flag, checked between pipeline stages.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A full-resolution render request: a shared source buffer plus the stored
/// edit to apply to it.
pub struct RenderRequest {
    pub source: Arc<RgbImage>,
    pub recipe: Recipe,
    pub include_crop: bool,
}

/// A finished render, tagged with the generation of the request that
/// produced it so stale results are easy to discard.
pub struct RenderOutput {
    pub image: RgbImage,
    pub generation: u64,
}

struct Pending {
    job: Option<(u64, RenderRequest)>,
    shutdown: bool,
}

struct Shared {
    pending: Mutex<Pending>,
    cond: Condvar,
}

pub struct RenderWorker {
    shared: Arc<Shared>,
    active_token: Arc<Mutex<Option<CancelToken>>>,
    results: mpsc::Receiver<RenderOutput>,
    generation: AtomicU64,
    handle: Option<thread::JoinHandle<()>>,
}

impl Default for RenderWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderWorker {
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            pending: Mutex::new(Pending { job: None, shutdown: false }),
            cond: Condvar::new(),
        });
        let active_token: Arc<Mutex<Option<CancelToken>>> = Arc::new(Mutex::new(None));
        let (sender, results) = mpsc::channel();

        let worker_shared = shared.clone();
        let worker_token = active_token.clone();
        let handle = thread::spawn(move || {
            worker_loop(worker_shared, worker_token, sender);
        });

        Self {
            shared,
            active_token,
            results,
            generation: AtomicU64::new(0),
            handle: Some(handle),
        }
    }

    /// Queue a render.  Any not-yet-started request is replaced and any
    /// in-flight render is cancelled.  Returns the request's generation.
    pub fn submit(&self, request: RenderRequest) -> u64 {
        // Supersede the in-flight render first so the worker frees up.
        if let Ok(mut slot) = self.active_token.lock()
            && let Some(token) = slot.take()
        {
            token.cancel();
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let mut pending = self.shared.pending.lock().unwrap();
        pending.job = Some((generation, request));
        self.shared.cond.notify_all();
        generation
    }

    /// Non-blocking poll for the next finished render.
    pub fn try_recv(&self) -> Option<RenderOutput> {
        self.results.try_recv().ok()
    }

    /// Blocking wait with a timeout (used by exports and tests).
    pub fn recv_timeout(&self, timeout: Duration) -> Option<RenderOutput> {
        self.results.recv_timeout(timeout).ok()
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        {
            let mut pending = self.shared.pending.lock().unwrap();
            pending.shutdown = true;
            pending.job = None;
        }
        if let Ok(mut slot) = self.active_token.lock()
            && let Some(token) = slot.take()
        {
            token.cancel();
        }
        self.shared.cond.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn worker_loop(
    shared: Arc<Shared>,
    active_token: Arc<Mutex<Option<CancelToken>>>,
    sender: mpsc::Sender<RenderOutput>,
) {
    loop {
        // Wait for a request, then wait for it to sit still for one
        // debounce window (a newer submit restarts the wait).
        let (generation, request) = {
            let mut pending = shared.pending.lock().unwrap();
            loop {
                if pending.shutdown {
                    return;
                }
                let Some((gen_seen, _)) = pending.job.as_ref().map(|(g, _)| (*g, ())) else {
                    pending = shared.cond.wait(pending).unwrap();
                    continue;
                };

                let (guard, timeout) = shared
                    .cond
                    .wait_timeout(pending, DEBOUNCE_WINDOW)
                    .unwrap();
                pending = guard;

                if pending.shutdown {
                    return;
                }
                match pending.job.as_ref() {
                    Some((g, _)) if *g == gen_seen && timeout.timed_out() => {
                        break pending.job.take().unwrap();
                    }
                    // Replaced or spurious wakeup: keep debouncing.
                    _ => continue,
                }
            }
        };

        let token = CancelToken::new();
        if let Ok(mut slot) = active_token.lock() {
            *slot = Some(token.clone());
        }

        let mut pipeline = RenderPipeline::with_preview_limit((*request.source).clone(), u32::MAX);
        pipeline.apply_recipe(&request.recipe);
        let result = pipeline.render_with_cancel(RenderTarget::Final, request.include_crop, &token);

        if let Ok(mut slot) = active_token.lock() {
            *slot = None;
        }

        match result {
            Some(image) if !token.is_cancelled() => {
                // Receiver gone means the owner was dropped; just exit.
                if sender.send(RenderOutput { image, generation }).is_err() {
                    return;
                }
            }
            _ => {
                log_info!("render generation {} superseded", generation);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::ParamKey;

    fn source() -> Arc<RgbImage> {
        Arc::new(RgbImage::from_fn(64, 64, |x, y| {
            image::Rgb([(x * 4) as u8, (y * 4) as u8, 128])
        }))
    }

    #[test]
    fn worker_renders_a_submission() {
        let worker = RenderWorker::new();
        let generation = worker.submit(RenderRequest {
            source: source(),
            recipe: Recipe::default(),
            include_crop: true,
        });
        let output = worker
            .recv_timeout(Duration::from_secs(10))
            .expect("worker produced no result");
        assert_eq!(output.generation, generation);
        assert_eq!(output.image.dimensions(), (64, 64));
    }

    #[test]
    fn rapid_submissions_coalesce_to_the_latest() {
        let worker = RenderWorker::new();

        let mut last_generation = 0;
        for b in [10, 20, 30, 40, 50] {
            let mut recipe = Recipe::default();
            recipe.tone.brightness = b;
            last_generation = worker.submit(RenderRequest {
                source: source(),
                recipe,
                include_crop: true,
            });
        }

        // The coalesced render is for the newest submission…
        let output = worker
            .recv_timeout(Duration::from_secs(10))
            .expect("worker produced no result");
        assert_eq!(output.generation, last_generation);

        // …and matches a synchronous render of the same recipe.
        let mut pipeline = RenderPipeline::from_image((*source()).clone());
        pipeline.set_param(ParamKey::Brightness, 50);
        assert_eq!(output.image, pipeline.render(RenderTarget::Final, true));

        // Nothing else arrives for the superseded submissions.
        assert!(worker.recv_timeout(Duration::from_millis(200)).is_none());
    }

    #[test]
    fn cancelled_render_returns_none() {
        let mut pipeline = RenderPipeline::from_image((*source()).clone());
        let token = CancelToken::new();
        token.cancel();
        assert!(pipeline
            .render_with_cancel(RenderTarget::Final, true, &token)
            .is_none());
    }
}

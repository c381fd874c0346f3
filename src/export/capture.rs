use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::JoinHandle;

use crate::export::job::{ExportCoordinator, ExportGuard};
use crate::export::sink::{FrameSink, SinkConfig};
use crate::export::{Artifact, ExportKind};
use crate::foundation::clock::ClockSource;
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{TypeCutError, TypeCutResult};
use crate::playback::{AnimationLoop, RedrawScheduler, Tick};
use crate::render::{FrameRenderer, Surface};

/// A streaming codec as the host names it, plus the encoder that implements it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamCodec {
    pub mime: &'static str,
    pub encoder: &'static str,
}

pub const VP9: StreamCodec = StreamCodec {
    mime: "video/webm;codecs=vp9",
    encoder: "libvpx-vp9",
};

pub const VP8: StreamCodec = StreamCodec {
    mime: "video/webm;codecs=vp8",
    encoder: "libvpx",
};

/// Best first.
pub const CODEC_PREFERENCE: &[StreamCodec] = &[VP9, VP8];

/// Host capability for streamed video encoding.
pub trait CodecBackend: Send + Sync {
    fn name(&self) -> &str;
    fn supports(&self, codec: &StreamCodec) -> bool;
    fn open(&self, codec: &StreamCodec) -> TypeCutResult<Box<dyn FrameSink>>;
}

/// First supported codec in preference order, or `Unsupported` naming everything tried.
pub fn select_codec(
    backend: &dyn CodecBackend,
    preferences: &[StreamCodec],
) -> TypeCutResult<StreamCodec> {
    if let Some(codec) = preferences.iter().find(|c| backend.supports(c)) {
        return Ok(*codec);
    }
    let tried: Vec<&str> = preferences.iter().map(|c| c.mime).collect();
    Err(TypeCutError::unsupported(format!(
        "no supported streaming codec via {} (tried: {})",
        backend.name(),
        tried.join(", ")
    )))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureOptions {
    pub fps: u32,
    /// Extra recording time after the animation so the final frame is flushed.
    pub trailing_ms: u64,
    pub preferences: Vec<StreamCodec>,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            fps: 30,
            trailing_ms: 200,
            preferences: CODEC_PREFERENCE.to_vec(),
        }
    }
}

/// Records the live-rendered surface for one animation duration into a WebM stream.
pub struct RealtimeCapture<'a> {
    backend: &'a dyn CodecBackend,
    opts: CaptureOptions,
}

impl<'a> RealtimeCapture<'a> {
    /// Capture through `backend` with [`CaptureOptions::default`].
    pub fn new(backend: &'a dyn CodecBackend) -> Self {
        Self {
            backend,
            opts: CaptureOptions::default(),
        }
    }

    pub fn with_options(mut self, opts: CaptureOptions) -> Self {
        self.opts = opts;
        self
    }

    /// Capture one full cycle. The loop plays from zero for the window and then returns to the
    /// state it was in before; the job slot reaches `done` or `failed` exactly once.
    #[tracing::instrument(skip_all, fields(duration_ms = anim.config().duration_ms))]
    pub fn capture(
        &self,
        coordinator: &ExportCoordinator,
        anim: &mut AnimationLoop,
        renderer: &mut FrameRenderer,
        surface: &mut Surface,
        sched: &mut dyn RedrawScheduler,
    ) -> TypeCutResult<Artifact> {
        let guard = coordinator.begin(ExportKind::WebM)?;
        let prior = anim.state();

        let bytes = self.record(&guard, anim, renderer, surface, sched);
        anim.restore_state(prior, sched);

        let text = anim.config().text.clone();
        guard.complete(bytes.map(|b| Artifact::new(ExportKind::WebM, &text, b)))
    }

    fn record(
        &self,
        guard: &ExportGuard,
        anim: &mut AnimationLoop,
        renderer: &mut FrameRenderer,
        surface: &mut Surface,
        sched: &mut dyn RedrawScheduler,
    ) -> TypeCutResult<Vec<u8>> {
        if self.opts.fps == 0 {
            return Err(TypeCutError::validation("capture fps must be non-zero"));
        }
        let codec = select_codec(self.backend, &self.opts.preferences)?;
        tracing::debug!(codec = codec.mime, "capture codec selected");

        let cfg = anim.config().clone();
        let mut sink = self.backend.open(&codec)?;
        sink.begin(SinkConfig {
            width: cfg.canvas.width,
            height: cfg.canvas.height,
            fps: self.opts.fps,
            keep_alpha: cfg.transparent_background,
            bg_rgba: cfg.background_color.to_rgba8(),
        })?;

        let mut font = match anim.restart(renderer, surface, sched)? {
            Tick::Drawn { font, .. } => Some(font),
            _ => None,
        };

        let clock = Arc::clone(anim.clock());
        let duration = cfg.duration_ms as f64;
        let start = clock.now_ms();
        let stop_at = start + duration + self.opts.trailing_ms as f64;
        let watchdog = Watchdog::spawn(Arc::clone(&clock), stop_at)?;

        let mut idx = 0u64;
        loop {
            sink.push_frame(FrameIndex(idx), &surface.snapshot(font.clone()))?;
            idx += 1;
            guard.progress_in(0, 99, (clock.now_ms() - start) / duration);

            let next = start + (idx * 1000) as f64 / f64::from(self.opts.fps);
            if watchdog.fired() || next >= stop_at {
                break;
            }
            let wait = next - clock.now_ms();
            if wait > 0.0 {
                clock.sleep_ms(wait);
            }
            if watchdog.fired() {
                break;
            }
            if let Tick::Drawn { font: f, .. } = anim.redraw_now(renderer, surface)? {
                font = Some(f);
            }
        }
        drop(watchdog);

        let bytes = sink.end()?;
        tracing::info!(frames = idx, bytes = bytes.len(), "capture finished");
        Ok(bytes)
    }
}

/// Stop-after-duration timer on its own thread.
struct Watchdog {
    cancelled: Arc<AtomicBool>,
    rx: mpsc::Receiver<()>,
    fired: Cell<bool>,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    fn spawn(clock: Arc<dyn ClockSource>, deadline_ms: f64) -> TypeCutResult<Self> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        let flag = Arc::clone(&cancelled);
        let handle = std::thread::Builder::new()
            .name("typecut-capture-watchdog".to_owned())
            .spawn(move || {
                if clock.wait_until(deadline_ms, &|| flag.load(Ordering::Acquire)) {
                    let _ = tx.send(());
                }
            })
            .map_err(|e| anyhow::anyhow!("failed to spawn capture watchdog: {e}"))?;
        Ok(Self {
            cancelled,
            rx,
            fired: Cell::new(false),
            handle: Some(handle),
        })
    }

    fn fired(&self) -> bool {
        if !self.fired.get() && self.rx.try_recv().is_ok() {
            self.fired.set(true);
        }
        self.fired.get()
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/export/capture.rs"]
mod tests;

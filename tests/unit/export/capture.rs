use super::*;
use crate::config::ConfigInput;
use crate::export::job::ExportStatus;
use crate::export::sink::InMemorySink;
use crate::fonts::loader::FontLoader;
use crate::fonts::pool::FontPool;
use crate::fonts::resolver::FontDbResolver;
use crate::foundation::clock::ManualClock;
use crate::foundation::core::Canvas;
use crate::playback::{PlaybackState, QueuedScheduler};
use crate::render::Frame;
use std::sync::Mutex;
use std::time::Duration;

type Log = Arc<Mutex<Vec<(FrameIndex, Option<String>)>>>;

struct LoggingSink {
    inner: InMemorySink,
    log: Log,
    fail_end: bool,
}

impl FrameSink for LoggingSink {
    fn begin(&mut self, cfg: SinkConfig) -> TypeCutResult<()> {
        self.inner.begin(cfg)
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &Frame) -> TypeCutResult<()> {
        self.inner.push_frame(idx, frame)?;
        self.log
            .lock()
            .unwrap()
            .push((idx, frame.font.clone()));
        Ok(())
    }

    fn end(&mut self) -> TypeCutResult<Vec<u8>> {
        if self.fail_end {
            return Err(TypeCutError::validation("muxer exploded"));
        }
        self.inner.end().map(|_| b"webm".to_vec())
    }
}

struct FakeBackend {
    supported: Vec<StreamCodec>,
    opened: Mutex<Vec<&'static str>>,
    log: Log,
    fail_end: bool,
}

impl FakeBackend {
    fn new(supported: &[StreamCodec]) -> Self {
        Self {
            supported: supported.to_vec(),
            opened: Mutex::new(Vec::new()),
            log: Arc::default(),
            fail_end: false,
        }
    }
}

impl CodecBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    fn supports(&self, codec: &StreamCodec) -> bool {
        self.supported.contains(codec)
    }

    fn open(&self, codec: &StreamCodec) -> TypeCutResult<Box<dyn FrameSink>> {
        self.opened.lock().unwrap().push(codec.encoder);
        Ok(Box::new(LoggingSink {
            inner: InMemorySink::new(),
            log: Arc::clone(&self.log),
            fail_end: self.fail_end,
        }))
    }
}

struct Rig {
    sched: QueuedScheduler,
    renderer: FrameRenderer,
    surface: Surface,
    anim: AnimationLoop,
    coordinator: ExportCoordinator,
}

fn rig() -> Rig {
    let (mut cfg, _) = ConfigInput {
        text: Some("ABC".to_owned()),
        duration_secs: Some(1),
        switch_count: Some(4),
        ..ConfigInput::default()
    }
    .resolve()
    .unwrap();
    cfg.canvas = Canvas::new(16, 16).unwrap();
    let loader = FontLoader::with_timeout(
        Arc::new(FontDbResolver::empty()),
        Duration::from_millis(200),
    );
    Rig {
        sched: QueuedScheduler::new(),
        renderer: FrameRenderer::new(Arc::new(loader)).with_font_wait(Duration::ZERO),
        surface: Surface::new(cfg.canvas).unwrap(),
        anim: AnimationLoop::new(
            cfg.clone(),
            FontPool::new(["Inter", "Roboto"]),
            Arc::new(ManualClock::new()),
        )
        .unwrap(),
        coordinator: ExportCoordinator::new(),
    }
}

fn run(r: &mut Rig, backend: &FakeBackend) -> TypeCutResult<Artifact> {
    RealtimeCapture::new(backend).capture(
        &r.coordinator,
        &mut r.anim,
        &mut r.renderer,
        &mut r.surface,
        &mut r.sched,
    )
}

#[test]
fn codec_preference_order_is_respected() {
    assert_eq!(
        select_codec(&FakeBackend::new(&[VP8, VP9]), CODEC_PREFERENCE).unwrap(),
        VP9
    );
    assert_eq!(
        select_codec(&FakeBackend::new(&[VP8]), CODEC_PREFERENCE).unwrap(),
        VP8
    );
}

#[test]
fn unsupported_host_fails_fast_and_settles_the_job() {
    let mut r = rig();
    let backend = FakeBackend::new(&[]);
    let err = run(&mut r, &backend).unwrap_err();
    assert!(matches!(err, TypeCutError::Unsupported(_)));
    assert!(err.to_string().contains("video/webm;codecs=vp9"));
    assert!(backend.opened.lock().unwrap().is_empty());
    assert_eq!(r.coordinator.status(), ExportStatus::Failed);
    assert_eq!(r.anim.state(), PlaybackState::Stopped);
}

#[test]
fn captures_the_duration_plus_trailing_buffer_in_order() {
    let mut r = rig();
    let backend = FakeBackend::new(&[VP8]);
    let artifact = run(&mut r, &backend).unwrap();

    assert_eq!(artifact.file_name, "type-cut-abc.webm");
    assert_eq!(artifact.mime, "video/webm");
    assert_eq!(artifact.bytes, b"webm");
    assert_eq!(*backend.opened.lock().unwrap(), vec!["libvpx"]);

    let log = backend.log.lock().unwrap();
    // (1000 ms + 200 ms) at 30 fps.
    assert_eq!(log.len(), 36);
    assert!(log.windows(2).all(|w| w[0].0 < w[1].0));
    assert_eq!(log[0].1.as_deref(), Some("Inter"));
    // 250 ms per switch: frame 9 is at 300 ms.
    assert_eq!(log[9].1.as_deref(), Some("Roboto"));
    assert!(log.iter().all(|(_, f)| f.is_some()));

    assert_eq!(r.coordinator.status(), ExportStatus::Done);
    assert_eq!(r.coordinator.current().unwrap().progress, 100);
    assert_eq!(r.anim.state(), PlaybackState::Stopped);
    assert_eq!(r.sched.pending_len(), 0);
    assert!(r.anim.loops_completed() >= 1);
}

#[test]
fn playing_loop_keeps_playing_afterwards() {
    let mut r = rig();
    r.anim.play(&mut r.sched);
    let backend = FakeBackend::new(&[VP9]);
    run(&mut r, &backend).unwrap();
    assert!(r.anim.is_playing());
    assert_eq!(r.sched.pending_len(), 1);
}

#[test]
fn busy_coordinator_rejects_capture_without_recording() {
    let mut r = rig();
    let _gif = r.coordinator.begin(ExportKind::Gif).unwrap();
    let backend = FakeBackend::new(&[VP9]);
    let err = run(&mut r, &backend).unwrap_err();
    assert!(matches!(err, TypeCutError::ExportBusy(ExportKind::Gif)));
    assert!(backend.log.lock().unwrap().is_empty());
}

#[test]
fn muxer_failure_is_reported_once_with_the_export_kind() {
    let mut r = rig();
    let mut backend = FakeBackend::new(&[VP9]);
    backend.fail_end = true;
    let err = run(&mut r, &backend).unwrap_err();
    assert!(matches!(
        err,
        TypeCutError::Encode {
            kind: ExportKind::WebM,
            ..
        }
    ));
    let job = r.coordinator.current().unwrap();
    assert_eq!(job.status, ExportStatus::Failed);
    assert!(job.error.unwrap().contains("muxer exploded"));
}

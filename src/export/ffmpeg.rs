use std::io::{Read, Write as _};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use crate::export::capture::{CodecBackend, StreamCodec};
use crate::export::sink::{FrameOrder, FrameSink, SinkConfig};
use crate::foundation::core::{FrameIndex, mul_div255};
use crate::foundation::error::{TypeCutError, TypeCutResult};
use crate::render::Frame;
use crate::render::surface::unpremultiply_in_place;

pub const WEBM_BITRATE: &str = "2500k";

/// Codec backend over the system `ffmpeg`, probed once for its encoder list.
#[derive(Clone, Debug, Default)]
pub struct FfmpegBackend {
    encoders: Vec<String>,
}

impl FfmpegBackend {
    /// Ask the `ffmpeg` on `PATH` for its encoders. No ffmpeg means no encoders.
    pub fn detect() -> Self {
        let out = Command::new("ffmpeg")
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output();
        let encoders = match out {
            Ok(out) if out.status.success() => {
                parse_encoder_list(&String::from_utf8_lossy(&out.stdout))
            }
            Ok(out) => {
                tracing::warn!(status = %out.status, "ffmpeg -encoders failed");
                Vec::new()
            }
            Err(e) => {
                tracing::debug!(error = %e, "ffmpeg not available");
                Vec::new()
            }
        };
        Self { encoders }
    }

    /// Backend reporting a fixed encoder list.
    pub fn with_encoders<S: AsRef<str>>(encoders: &[S]) -> Self {
        Self {
            encoders: encoders.iter().map(|s| s.as_ref().to_owned()).collect(),
        }
    }

    pub fn encoders(&self) -> &[String] {
        &self.encoders
    }
}

impl CodecBackend for FfmpegBackend {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn supports(&self, codec: &StreamCodec) -> bool {
        self.encoders.iter().any(|e| e == codec.encoder)
    }

    fn open(&self, codec: &StreamCodec) -> TypeCutResult<Box<dyn FrameSink>> {
        Ok(Box::new(FfmpegWebmSink::new(*codec)))
    }
}

/// Encoder names from `ffmpeg -encoders` output (second column after the legend).
pub fn parse_encoder_list(listing: &str) -> Vec<String> {
    listing
        .lines()
        .skip_while(|l| !l.trim_start().starts_with("------"))
        .skip(1)
        .filter_map(|l| {
            let mut cols = l.split_whitespace();
            let flags = cols.next()?;
            let name = cols.next()?;
            (flags.len() == 6).then(|| name.to_owned())
        })
        .collect()
}

/// Spawns `ffmpeg`, streams raw RGBA frames to stdin and collects the WebM stream from stdout.
pub struct FfmpegWebmSink {
    codec: StreamCodec,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    stderr_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    scratch: Vec<u8>,
    cfg: Option<SinkConfig>,
    order: FrameOrder,
}

impl FfmpegWebmSink {
    /// Sink for `codec`. The ffmpeg process starts in `begin`.
    pub fn new(codec: StreamCodec) -> Self {
        Self {
            codec,
            child: None,
            stdin: None,
            stdout_drain: None,
            stderr_drain: None,
            scratch: Vec::new(),
            cfg: None,
            order: FrameOrder::default(),
        }
    }
}

impl FrameSink for FfmpegWebmSink {
    fn begin(&mut self, cfg: SinkConfig) -> TypeCutResult<()> {
        if cfg.fps == 0 {
            return Err(TypeCutError::validation("fps must be non-zero"));
        }
        if cfg.width == 0 || cfg.height == 0 {
            return Err(TypeCutError::validation(
                "webm sink width/height must be non-zero",
            ));
        }
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            return Err(TypeCutError::validation(
                "webm sink width/height must be even (required for 4:2:0 output)",
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd.args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &cfg.fps.to_string(),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            self.codec.encoder,
            "-b:v",
            WEBM_BITRATE,
        ]);
        if cfg.keep_alpha {
            cmd.args(["-pix_fmt", "yuva420p", "-auto-alt-ref", "0"]);
        } else {
            cmd.args(["-pix_fmt", "yuv420p"]);
        }
        cmd.args(["-f", "webm", "pipe:1"]);

        let mut child = cmd.spawn().map_err(|e| {
            TypeCutError::unsupported(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            TypeCutError::encode(crate::export::ExportKind::WebM, "failed to open ffmpeg stdin")
        })?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        self.stdout_drain = stdout.map(drain);
        self.stderr_drain = stderr.map(drain);
        self.scratch = vec![0u8; (cfg.width as usize) * (cfg.height as usize) * 4];
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.cfg = Some(cfg);
        self.order.reset();
        tracing::debug!(encoder = self.codec.encoder, "ffmpeg webm sink started");
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &Frame) -> TypeCutResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| TypeCutError::validation("webm sink not started"))?;
        self.order.check(idx)?;
        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(TypeCutError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }
        if frame.data.len() != self.scratch.len() {
            return Err(TypeCutError::validation(
                "frame.data size mismatch with width*height*4",
            ));
        }

        if cfg.keep_alpha {
            self.scratch.copy_from_slice(&frame.data);
            unpremultiply_in_place(&mut self.scratch);
        } else {
            flatten_premul_over_bg(&mut self.scratch, &frame.data, cfg.bg_rgba);
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| TypeCutError::validation("webm sink is already finalized"))?;
        stdin
            .write_all(&self.scratch)
            .map_err(|e| anyhow::anyhow!("failed to write frame to ffmpeg stdin: {e}"))?;
        Ok(())
    }

    fn end(&mut self) -> TypeCutResult<Vec<u8>> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| TypeCutError::validation("webm sink not started"))?;
        let status = child
            .wait()
            .map_err(|e| anyhow::anyhow!("failed to wait for ffmpeg to finish: {e}"))?;

        let stdout = join_drain(self.stdout_drain.take(), "stdout")?;
        let stderr = join_drain(self.stderr_drain.take(), "stderr")?;
        self.cfg = None;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            return Err(anyhow::anyhow!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )
            .into());
        }
        if stdout.is_empty() {
            return Err(anyhow::anyhow!("ffmpeg produced an empty stream").into());
        }
        Ok(stdout)
    }
}

impl Drop for FfmpegWebmSink {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn drain<R: Read + Send + 'static>(mut src: R) -> JoinHandle<std::io::Result<Vec<u8>>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        src.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn join_drain(
    handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    what: &str,
) -> TypeCutResult<Vec<u8>> {
    match handle {
        Some(h) => Ok(h
            .join()
            .map_err(|_| anyhow::anyhow!("ffmpeg {what} drain thread panicked"))?
            .map_err(|e| anyhow::anyhow!("ffmpeg {what} read failed: {e}"))?),
        None => Ok(Vec::new()),
    }
}

fn flatten_premul_over_bg(dst: &mut [u8], src_premul: &[u8], bg_rgba: [u8; 4]) {
    let bg = [
        u16::from(bg_rgba[0]),
        u16::from(bg_rgba[1]),
        u16::from(bg_rgba[2]),
    ];
    for (d, s) in dst.chunks_exact_mut(4).zip(src_premul.chunks_exact(4)) {
        let inv = 255 - u16::from(s[3]);
        for c in 0..3 {
            d[c] = (u16::from(s[c]) + mul_div255(bg[c], inv)).min(255) as u8;
        }
        d[3] = 255;
    }
}

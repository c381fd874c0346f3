use std::sync::Arc;

use crate::config::AnimationConfig;
use crate::fonts::pool::FontPool;
use crate::foundation::clock::ClockSource;
use crate::foundation::error::TypeCutResult;
use crate::playback::scheduler::{RedrawScheduler, RedrawToken};
use crate::render::{FrameRenderer, Surface};
use crate::timing::Timeline;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
}

/// Result of one redraw callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Tick {
    /// Token was cancelled, superseded, or playback is stopped. Nothing happened.
    Stale,
    /// Surface was redrawn at a new active index.
    Drawn {
        index: usize,
        font: String,
        fell_back: bool,
    },
    /// Active index unchanged; the previous frame stays on the surface.
    Reused { index: usize },
}

/// Live preview driver: maps clock time to the active font and redraws when it changes.
pub struct AnimationLoop {
    cfg: AnimationConfig,
    pool: FontPool,
    timeline: Timeline,
    clock: Arc<dyn ClockSource>,
    state: PlaybackState,
    start_ms: f64,
    last_index: Option<usize>,
    pending: Option<RedrawToken>,
    loops: u64,
}

impl AnimationLoop {
    /// Stopped loop over `pool`. Fails if `cfg` is out of range.
    pub fn new(
        cfg: AnimationConfig,
        pool: FontPool,
        clock: Arc<dyn ClockSource>,
    ) -> TypeCutResult<Self> {
        cfg.validate()?;
        let timeline = Timeline::new(&pool, cfg.duration_ms, cfg.switch_count);
        let start_ms = clock.now_ms();
        Ok(Self {
            cfg,
            pool,
            timeline,
            clock,
            state: PlaybackState::Stopped,
            start_ms,
            last_index: None,
            pending: None,
            loops: 0,
        })
    }

    pub fn config(&self) -> &AnimationConfig {
        &self.cfg
    }

    pub fn pool(&self) -> &FontPool {
        &self.pool
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Number of loop wraps since the loop was created.
    pub fn loops_completed(&self) -> u64 {
        self.loops
    }

    pub fn clock(&self) -> &Arc<dyn ClockSource> {
        &self.clock
    }

    /// Swap in a new snapshot between cycles. The sequence is rebuilt and the next tick redraws.
    pub fn update(&mut self, cfg: AnimationConfig, pool: FontPool) -> TypeCutResult<()> {
        cfg.validate()?;
        self.timeline = Timeline::new(&pool, cfg.duration_ms, cfg.switch_count);
        self.cfg = cfg;
        self.pool = pool;
        self.last_index = None;
        Ok(())
    }

    /// `stopped -> playing`. Elapsed time restarts from now.
    pub fn play(&mut self, sched: &mut dyn RedrawScheduler) {
        if self.is_playing() {
            return;
        }
        self.state = PlaybackState::Playing;
        self.reset_origin();
        self.schedule(sched);
        tracing::debug!("playback started");
    }

    /// `playing -> stopped`. The pending redraw is cancelled so no orphan tick fires.
    pub fn pause(&mut self, sched: &mut dyn RedrawScheduler) {
        if !self.is_playing() {
            return;
        }
        self.state = PlaybackState::Stopped;
        if let Some(token) = self.pending.take() {
            sched.cancel_redraw(token);
        }
        tracing::debug!("playback paused");
    }

    /// Play when stopped, pause when playing.
    pub fn toggle(&mut self, sched: &mut dyn RedrawScheduler) {
        match self.state {
            PlaybackState::Playing => self.pause(sched),
            PlaybackState::Stopped => self.play(sched),
        }
    }

    /// Zero the origin, enter `playing`, and draw the first frame immediately.
    pub fn restart(
        &mut self,
        renderer: &mut FrameRenderer,
        surface: &mut Surface,
        sched: &mut dyn RedrawScheduler,
    ) -> TypeCutResult<Tick> {
        if let Some(token) = self.pending.take() {
            sched.cancel_redraw(token);
        }
        self.state = PlaybackState::Playing;
        self.reset_origin();
        let tick = self.draw_at(0.0, renderer, surface)?;
        self.schedule(sched);
        Ok(tick)
    }

    /// Handle a delivered redraw. Only the most recently requested token is honored.
    pub fn on_redraw(
        &mut self,
        token: RedrawToken,
        renderer: &mut FrameRenderer,
        surface: &mut Surface,
        sched: &mut dyn RedrawScheduler,
    ) -> TypeCutResult<Tick> {
        if !self.is_playing() || self.pending != Some(token) {
            return Ok(Tick::Stale);
        }
        self.pending = None;
        let tick = self.advance(renderer, surface);
        self.schedule(sched);
        tick
    }

    /// Draw for the current clock time without a token, for drivers that own the cadence
    /// (realtime capture). Ignored while stopped.
    pub fn redraw_now(
        &mut self,
        renderer: &mut FrameRenderer,
        surface: &mut Surface,
    ) -> TypeCutResult<Tick> {
        if !self.is_playing() {
            return Ok(Tick::Stale);
        }
        self.advance(renderer, surface)
    }

    /// Still frame for the stopped preview: the first font of the sequence.
    pub fn draw_still(
        &mut self,
        renderer: &mut FrameRenderer,
        surface: &mut Surface,
    ) -> TypeCutResult<Tick> {
        self.last_index = None;
        self.draw_at(0.0, renderer, surface)
    }

    /// Return to a state saved before a capture window.
    pub fn restore_state(&mut self, prior: PlaybackState, sched: &mut dyn RedrawScheduler) {
        match prior {
            PlaybackState::Playing => self.play(sched),
            PlaybackState::Stopped => self.pause(sched),
        }
    }

    fn advance(
        &mut self,
        renderer: &mut FrameRenderer,
        surface: &mut Surface,
    ) -> TypeCutResult<Tick> {
        let mut elapsed = self.clock.now_ms() - self.start_ms;
        if elapsed >= self.cfg.duration_ms as f64 {
            self.start_ms = self.clock.now_ms();
            self.loops += 1;
            elapsed = 0.0;
        }
        self.draw_at(elapsed, renderer, surface)
    }

    fn reset_origin(&mut self) {
        self.start_ms = self.clock.now_ms();
        self.last_index = None;
    }

    fn schedule(&mut self, sched: &mut dyn RedrawScheduler) {
        if self.is_playing() {
            self.pending = Some(sched.request_redraw());
        }
    }

    fn draw_at(
        &mut self,
        elapsed_ms: f64,
        renderer: &mut FrameRenderer,
        surface: &mut Surface,
    ) -> TypeCutResult<Tick> {
        let (index, font) = self.timeline.font_at(elapsed_ms);
        if self.last_index == Some(index) && surface.canvas() == self.cfg.canvas {
            return Ok(Tick::Reused { index });
        }
        let font = font.to_owned();
        let outcome = renderer.render(&self.cfg, &font, surface)?;
        self.last_index = Some(index);
        Ok(Tick::Drawn {
            index,
            font,
            fell_back: outcome.fell_back,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/playback/animation_loop.rs"]
mod tests;

use super::*;
use crate::config::ConfigInput;
use crate::fonts::loader::FontLoader;
use crate::fonts::resolver::FontDbResolver;
use crate::foundation::clock::ManualClock;
use crate::foundation::core::Canvas;
use crate::playback::scheduler::QueuedScheduler;
use std::time::Duration;

struct Rig {
    clock: ManualClock,
    sched: QueuedScheduler,
    renderer: FrameRenderer,
    surface: Surface,
    anim: AnimationLoop,
}

impl Rig {
    fn scenario_a() -> Self {
        let (mut cfg, _) = ConfigInput {
            text: Some("ABC".to_owned()),
            duration_secs: Some(2),
            switch_count: Some(4),
            ..ConfigInput::default()
        }
        .resolve()
        .unwrap();
        cfg.canvas = Canvas::new(32, 32).unwrap();
        let pool = FontPool::new(["Inter", "Roboto"]);

        let clock = ManualClock::new();
        let loader = FontLoader::with_timeout(
            Arc::new(FontDbResolver::empty()),
            Duration::from_millis(200),
        );
        let renderer = FrameRenderer::new(Arc::new(loader)).with_font_wait(Duration::ZERO);
        let surface = Surface::new(cfg.canvas).unwrap();
        let anim = AnimationLoop::new(cfg, pool, Arc::new(clock.clone())).unwrap();
        Self {
            clock,
            sched: QueuedScheduler::new(),
            renderer,
            surface,
            anim,
        }
    }

    fn tick(&mut self) -> Tick {
        let token = self.sched.take_pending().expect("a redraw should be pending");
        self.anim
            .on_redraw(token, &mut self.renderer, &mut self.surface, &mut self.sched)
            .unwrap()
    }
}

fn drawn(index: usize, font: &str) -> Tick {
    Tick::Drawn {
        index,
        font: font.to_owned(),
        fell_back: true,
    }
}

#[test]
fn play_draws_and_reuses_until_the_index_changes() {
    let mut r = Rig::scenario_a();
    assert_eq!(r.anim.state(), PlaybackState::Stopped);
    r.anim.play(&mut r.sched);
    assert!(r.anim.is_playing());

    assert_eq!(r.tick(), drawn(0, "Inter"));
    r.clock.advance(100.0);
    assert_eq!(r.tick(), Tick::Reused { index: 0 });
    r.clock.advance(500.0);
    assert_eq!(r.tick(), drawn(1, "Roboto"));
    assert_eq!(r.sched.pending_len(), 1);
}

#[test]
fn pause_cancels_the_pending_redraw() {
    let mut r = Rig::scenario_a();
    r.anim.play(&mut r.sched);
    r.tick();
    r.anim.pause(&mut r.sched);
    assert_eq!(r.sched.pending_len(), 0);
    assert_eq!(r.anim.state(), PlaybackState::Stopped);

    let stale = RedrawToken(9_999);
    let tick = r
        .anim
        .on_redraw(stale, &mut r.renderer, &mut r.surface, &mut r.sched)
        .unwrap();
    assert_eq!(tick, Tick::Stale);
}

#[test]
fn loop_wraps_and_resets_origin_after_duration() {
    let mut r = Rig::scenario_a();
    r.anim.play(&mut r.sched);
    r.tick();
    r.clock.advance(1_600.0);
    assert_eq!(r.tick(), drawn(3, "Roboto"));

    r.clock.advance(400.0);
    assert_eq!(r.tick(), drawn(0, "Inter"));
    assert_eq!(r.anim.loops_completed(), 1);
    assert!(r.anim.is_playing());

    r.clock.advance(600.0);
    assert_eq!(r.tick(), drawn(1, "Roboto"));
}

#[test]
fn play_after_pause_restarts_elapsed_tracking() {
    let mut r = Rig::scenario_a();
    r.anim.play(&mut r.sched);
    r.tick();
    r.clock.advance(700.0);
    assert_eq!(r.tick(), drawn(1, "Roboto"));
    r.anim.pause(&mut r.sched);

    r.clock.advance(5_000.0);
    r.anim.play(&mut r.sched);
    assert_eq!(r.tick(), drawn(0, "Inter"));
}

#[test]
fn restart_redraws_immediately_and_supersedes_old_tokens() {
    let mut r = Rig::scenario_a();
    r.anim.play(&mut r.sched);
    r.tick();
    r.clock.advance(900.0);

    let tick = r
        .anim
        .restart(&mut r.renderer, &mut r.surface, &mut r.sched)
        .unwrap();
    assert_eq!(tick, drawn(0, "Inter"));
    assert_eq!(r.sched.pending_len(), 1);
    r.clock.advance(10.0);
    assert_eq!(r.tick(), Tick::Reused { index: 0 });
}

#[test]
fn restore_state_returns_to_stopped_after_a_capture_window() {
    let mut r = Rig::scenario_a();
    let prior = r.anim.state();
    r.anim
        .restart(&mut r.renderer, &mut r.surface, &mut r.sched)
        .unwrap();
    assert!(r.anim.is_playing());
    r.clock.advance(600.0);
    let tick = r.anim.redraw_now(&mut r.renderer, &mut r.surface).unwrap();
    assert_eq!(tick, drawn(1, "Roboto"));

    r.anim.restore_state(prior, &mut r.sched);
    assert_eq!(r.anim.state(), PlaybackState::Stopped);
    assert_eq!(r.sched.pending_len(), 0);
    let tick = r.anim.redraw_now(&mut r.renderer, &mut r.surface).unwrap();
    assert_eq!(tick, Tick::Stale);
}

#[test]
fn update_rebuilds_the_sequence_from_the_new_pool() {
    let mut r = Rig::scenario_a();
    let cfg = r.anim.config().clone();
    let mut pool = r.anim.pool().clone();
    pool.reorder(1, 0);
    r.anim.update(cfg, pool).unwrap();
    assert_eq!(r.anim.timeline().sequence().get(0), Some("Roboto"));

    let still = r.anim.draw_still(&mut r.renderer, &mut r.surface).unwrap();
    assert_eq!(still, drawn(0, "Roboto"));
}

#[test]
fn toggle_flips_between_playing_and_stopped() {
    let mut r = Rig::scenario_a();
    r.anim.toggle(&mut r.sched);
    assert!(r.anim.is_playing());
    assert_eq!(r.sched.pending_len(), 1);
    assert_eq!(r.tick(), drawn(0, "Inter"));

    r.anim.toggle(&mut r.sched);
    assert_eq!(r.anim.state(), PlaybackState::Stopped);
    assert_eq!(r.sched.pending_len(), 0);

    r.clock.advance(700.0);
    r.anim.toggle(&mut r.sched);
    assert!(r.anim.is_playing());
    // Elapsed restarts from the second toggle, not from the first play.
    assert_eq!(r.tick(), drawn(0, "Inter"));
}

//! Idle display mode: static screen, sprites and FPS

use std::sync::Arc;

use async_trait::async_trait;
use framepace_core::{FramepaceResult, RuntimeStats};
use tokio::time::Instant;

use super::PeriodicWork;
use crate::collaborators::{FpsCounter, FrameView, InputSource, Renderer, Scene};
use crate::mode::ModeRequester;

/// Frame-paced: draw the idle screen and poll the mode button
pub struct IdleDisplayTask {
    renderer: Arc<dyn Renderer>,
    input: Arc<dyn InputSource>,
    modes: ModeRequester,
    stats: Arc<RuntimeStats>,
    frames: u64,
    fps: FpsCounter,
}

impl IdleDisplayTask {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        input: Arc<dyn InputSource>,
        modes: ModeRequester,
        stats: Arc<RuntimeStats>,
    ) -> Self {
        Self {
            renderer,
            input,
            modes,
            stats,
            frames: 0,
            fps: FpsCounter::default(),
        }
    }
}

#[async_trait]
impl PeriodicWork for IdleDisplayTask {
    async fn on_resume(&mut self) {
        self.fps.restart();
    }

    async fn run_once(&mut self) -> FramepaceResult<()> {
        self.frames += 1;
        self.fps.tick(Instant::now());
        let frame = FrameView {
            number: self.frames,
            fps: self.fps.current(),
        };
        self.renderer.render(&frame, Scene::Idle);
        self.stats.record_frame();

        if self.input.take_mode_request() {
            self.modes.request_next();
        }
        Ok(())
    }
}

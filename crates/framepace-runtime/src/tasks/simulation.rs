//! Simulation mode: the bouncing ball
//!
//! The ball and its guard do not exist until the simulation mode is first
//! entered. `SimulationHooks::init` creates them in the shared `BallSlot`,
//! `enter` resets the ball on every entry. Both simulation tasks skip their
//! work while the slot is still empty.

use std::sync::Arc;

use async_trait::async_trait;
use framepace_core::{
    ArenaConfig, Ball, CollisionHook, EntityGuard, FramepaceError, FramepaceResult, RuntimeStats,
};
use tokio::sync::OnceCell;
use tokio::time::{Duration, Instant};
use tracing::{debug, info};

use super::PeriodicWork;
use crate::collaborators::{FpsCounter, FrameView, InputSource, Renderer, Scene};
use crate::mode::{ModeHooks, ModeRequester};

// ----------------------------------------------------------------------------
// Shared Ball
// ----------------------------------------------------------------------------

/// Lazily created, then permanent, home of the guarded ball
#[derive(Debug, Clone, Default)]
pub struct BallSlot {
    cell: Arc<OnceCell<Arc<EntityGuard<Ball>>>>,
}

impl BallSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&Arc<EntityGuard<Ball>>> {
        self.cell.get()
    }

    /// Create the guarded ball unless it already exists
    pub async fn get_or_create<F>(&self, create: F) -> &Arc<EntityGuard<Ball>>
    where
        F: FnOnce() -> EntityGuard<Ball>,
    {
        self.cell
            .get_or_init(|| async move { Arc::new(create()) })
            .await
    }
}

/// `init` creates the ball, `enter` puts it back in its canonical state
pub struct SimulationHooks {
    slot: BallSlot,
    arena: ArenaConfig,
    lock_timeout: Option<Duration>,
    collision_hook: Option<Arc<dyn CollisionHook>>,
}

impl SimulationHooks {
    pub fn new(
        slot: BallSlot,
        arena: ArenaConfig,
        lock_timeout: Option<Duration>,
        collision_hook: Option<Arc<dyn CollisionHook>>,
    ) -> Self {
        Self {
            slot,
            arena,
            lock_timeout,
            collision_hook,
        }
    }
}

#[async_trait]
impl ModeHooks for SimulationHooks {
    async fn init(&self) -> FramepaceResult<()> {
        let guard = self
            .slot
            .get_or_create(|| {
                let mut ball = Ball::from_config(&self.arena);
                ball.set_collision_hook(self.collision_hook.clone());
                EntityGuard::new("ball", ball, self.lock_timeout)
            })
            .await;
        info!("Ball created in {}", guard.name());
        Ok(())
    }

    async fn enter(&self) -> FramepaceResult<()> {
        let guard = self
            .slot
            .get()
            .ok_or_else(|| FramepaceError::task_failed("simulation", "ball not initialized"))?;
        guard.reset().await?;
        debug!("ball reset");
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Ball Simulation Task
// ----------------------------------------------------------------------------

/// Frame-paced: advance the ball, draw it, poll the mode button
pub struct BallSimulationTask {
    slot: BallSlot,
    renderer: Arc<dyn Renderer>,
    input: Arc<dyn InputSource>,
    modes: ModeRequester,
    stats: Arc<RuntimeStats>,
    frame_period: Duration,
    last_step: Option<Instant>,
    frames: u64,
    fps: FpsCounter,
}

impl BallSimulationTask {
    pub fn new(
        slot: BallSlot,
        renderer: Arc<dyn Renderer>,
        input: Arc<dyn InputSource>,
        modes: ModeRequester,
        stats: Arc<RuntimeStats>,
        frame_period: Duration,
    ) -> Self {
        Self {
            slot,
            renderer,
            input,
            modes,
            stats,
            frame_period,
            last_step: None,
            frames: 0,
            fps: FpsCounter::default(),
        }
    }
}

#[async_trait]
impl PeriodicWork for BallSimulationTask {
    async fn on_resume(&mut self) {
        // Time spent suspended must not move the ball
        self.last_step = None;
        self.fps.restart();
    }

    async fn run_once(&mut self) -> FramepaceResult<()> {
        let Some(guard) = self.slot.get() else {
            return Ok(());
        };

        let now = Instant::now();
        let elapsed = self
            .last_step
            .map_or(self.frame_period, |last| now.saturating_duration_since(last));
        self.last_step = Some(now);

        let (hits, ball) = guard
            .with_entity(|ball| {
                let hits = ball.step(elapsed);
                (hits, ball.clone())
            })
            .await?;
        // Guard released: the hook may take its time
        if !hits.is_empty() {
            debug!(hits = hits.len(), "collision");
            self.stats.record_collisions(hits.len());
            ball.notify_collisions(&hits);
        }
        self.stats.record_simulation_step();

        self.frames += 1;
        self.fps.tick(now);
        let frame = FrameView {
            number: self.frames,
            fps: self.fps.current(),
        };
        self.renderer.render(&frame, Scene::Ball(&ball));
        self.stats.record_frame();

        if self.input.take_mode_request() {
            self.modes.request_next();
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Ball Kick Task
// ----------------------------------------------------------------------------

/// Fixed-rate: apply queued kicks to the ball and keep it under the speed limit
pub struct BallKickTask {
    slot: BallSlot,
    input: Arc<dyn InputSource>,
    stats: Arc<RuntimeStats>,
    max_speed: f32,
}

impl BallKickTask {
    pub fn new(
        slot: BallSlot,
        input: Arc<dyn InputSource>,
        stats: Arc<RuntimeStats>,
        max_speed: f32,
    ) -> Self {
        Self {
            slot,
            input,
            stats,
            max_speed,
        }
    }
}

#[async_trait]
impl PeriodicWork for BallKickTask {
    async fn run_once(&mut self) -> FramepaceResult<()> {
        let Some(guard) = self.slot.get() else {
            return Ok(());
        };
        let kicks = self.input.take_kicks();
        if kicks.is_empty() {
            return Ok(());
        }

        let max_speed = self.max_speed;
        let limited = guard
            .with_entity(|ball| {
                for (dvx, dvy) in &kicks {
                    ball.apply_impulse(*dvx, *dvy);
                }
                ball.clamp_speed(max_speed)
            })
            .await?;

        for _ in &kicks {
            self.stats.record_kick();
        }
        debug!(kicks = kicks.len(), limited, "ball kicked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{ChannelInput, TracingRenderer};
    use framepace_core::Resettable;
    use tokio::sync::mpsc;

    fn hooks(slot: &BallSlot) -> SimulationHooks {
        SimulationHooks::new(slot.clone(), ArenaConfig::default(), None, None)
    }

    /// Records whether the ball's guard was free when each contact arrived
    struct GuardStateHook {
        slot: BallSlot,
        free: std::sync::Mutex<Vec<bool>>,
    }

    impl CollisionHook for GuardStateHook {
        fn on_collision(&self, _event: &framepace_core::CollisionEvent) {
            let free = self.slot.get().is_some_and(|guard| !guard.is_held());
            self.free.lock().unwrap().push(free);
        }
    }

    #[tokio::test]
    async fn test_ball_created_once_and_reset_on_enter() {
        let slot = BallSlot::new();
        let hooks = hooks(&slot);
        assert!(slot.get().is_none());

        hooks.init().await.unwrap();
        hooks.enter().await.unwrap();
        let first = slot.get().unwrap().clone();

        first
            .with_entity(|ball| {
                ball.apply_impulse(500.0, 0.0);
                ball.step(Duration::from_millis(100));
            })
            .await
            .unwrap();
        hooks.init().await.unwrap();
        hooks.enter().await.unwrap();

        assert!(Arc::ptr_eq(&first, slot.get().unwrap()));
        let ball = first.snapshot().await.unwrap();
        assert_eq!(ball.position(), (320.0, 240.0));
        assert_eq!(ball.velocity(), (100.0, 100.0));
    }

    #[tokio::test]
    async fn test_enter_before_init_fails() {
        let slot = BallSlot::new();
        assert!(hooks(&slot).enter().await.is_err());
    }

    #[tokio::test]
    async fn test_simulation_without_ball_is_a_no_op() {
        let (input, _sender) = ChannelInput::new();
        let (modes, _commands) = mpsc::channel(1);
        let stats = Arc::new(RuntimeStats::new());
        let mut task = BallSimulationTask::new(
            BallSlot::new(),
            Arc::new(TracingRenderer),
            Arc::new(input),
            ModeRequester::new(modes),
            stats.clone(),
            Duration::from_millis(16),
        );
        task.run_once().await.unwrap();
        assert_eq!(stats.frames_rendered(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulation_steps_and_requests_mode_change() {
        let slot = BallSlot::new();
        hooks(&slot).init().await.unwrap();
        let (input, sender) = ChannelInput::new();
        let (modes, mut commands) = mpsc::channel(1);
        let stats = Arc::new(RuntimeStats::new());
        let mut task = BallSimulationTask::new(
            slot.clone(),
            Arc::new(TracingRenderer),
            Arc::new(input),
            ModeRequester::new(modes),
            stats.clone(),
            Duration::from_millis(100),
        );

        task.run_once().await.unwrap();
        let ball = slot.get().unwrap().snapshot().await.unwrap();
        assert_eq!(ball.position(), (330.0, 250.0));

        sender.press_mode().unwrap();
        task.run_once().await.unwrap();
        assert!(matches!(
            commands.try_recv(),
            Ok(crate::mode::ModeCommand::Next { reply: None })
        ));
        assert_eq!(stats.snapshot().simulation_steps, 2);
    }

    #[tokio::test]
    async fn test_collision_hook_runs_after_guard_release() {
        let slot = BallSlot::new();
        let hook = Arc::new(GuardStateHook {
            slot: slot.clone(),
            free: std::sync::Mutex::new(Vec::new()),
        });
        SimulationHooks::new(slot.clone(), ArenaConfig::default(), None, Some(hook.clone()))
            .init()
            .await
            .unwrap();
        let (input, _sender) = ChannelInput::new();
        let (modes, _commands) = mpsc::channel(1);
        let stats = Arc::new(RuntimeStats::new());
        // One 3s step carries the centred ball into the bottom-right corner
        let mut task = BallSimulationTask::new(
            slot.clone(),
            Arc::new(TracingRenderer),
            Arc::new(input),
            ModeRequester::new(modes),
            stats.clone(),
            Duration::from_secs(3),
        );

        task.run_once().await.unwrap();

        assert_eq!(*hook.free.lock().unwrap(), vec![true, true]);
        assert_eq!(stats.snapshot().collisions, 2);
    }

    #[tokio::test]
    async fn test_kicks_are_applied_and_clamped() {
        let slot = BallSlot::new();
        hooks(&slot).init().await.unwrap();
        let (input, sender) = ChannelInput::new();
        let stats = Arc::new(RuntimeStats::new());
        let mut task = BallKickTask::new(slot.clone(), Arc::new(input), stats.clone(), 500.0);

        sender.kick(1000.0, 0.0).unwrap();
        sender.kick(0.0, -100.0).unwrap();
        task.run_once().await.unwrap();

        let mut ball = slot.get().unwrap().snapshot().await.unwrap();
        assert!((ball.speed() - 500.0).abs() < 1e-2);
        assert!(ball.vx > 0.0);
        assert_eq!(stats.snapshot().kicks_applied, 2);

        ball.reset();
        assert_eq!(ball.velocity(), (100.0, 100.0));
    }
}

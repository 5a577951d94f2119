use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};

/// Drives the capture loop, one tick per display frame
#[async_trait::async_trait]
pub trait FrameScheduler: Send {
    /// Wait for the next tick. Returns `false` once no more ticks will come.
    async fn next_tick(&mut self) -> bool;
}

/// Creates a fresh scheduler for each capture cycle
pub type SchedulerFactory = Arc<dyn Fn() -> Box<dyn FrameScheduler> + Send + Sync>;

/// Fixed-rate scheduler; late ticks are skipped, never bunched up
pub struct IntervalScheduler {
    interval: Interval,
}

impl IntervalScheduler {
    pub fn new(frames_per_second: u32) -> Self {
        let period = Duration::from_secs_f64(1.0 / frames_per_second.max(1) as f64);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }

    pub fn factory(frames_per_second: u32) -> SchedulerFactory {
        Arc::new(move || Box::new(Self::new(frames_per_second)) as Box<dyn FrameScheduler>)
    }
}

#[async_trait::async_trait]
impl FrameScheduler for IntervalScheduler {
    async fn next_tick(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}

/// Hand-driven scheduler for running the capture loop without a display
///
/// Each call to the factory starts a new tick stream; `tick` feeds the most
/// recent one.
#[derive(Clone, Default)]
pub struct ManualTicker {
    current: Arc<Mutex<Option<mpsc::UnboundedSender<()>>>>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory(&self) -> SchedulerFactory {
        let current = Arc::clone(&self.current);
        Arc::new(move || {
            let (tx, rx) = mpsc::unbounded_channel();
            if let Ok(mut slot) = current.lock() {
                *slot = Some(tx);
            }
            Box::new(ManualScheduler { rx }) as Box<dyn FrameScheduler>
        })
    }

    /// Release one tick. Returns `false` if no capture loop is listening.
    pub fn tick(&self) -> bool {
        match self.current.lock() {
            Ok(slot) => slot.as_ref().is_some_and(|tx| tx.send(()).is_ok()),
            Err(_) => false,
        }
    }

    /// End the current tick stream
    pub fn finish(&self) {
        if let Ok(mut slot) = self.current.lock() {
            slot.take();
        }
    }
}

struct ManualScheduler {
    rx: mpsc::UnboundedReceiver<()>,
}

#[async_trait::async_trait]
impl FrameScheduler for ManualScheduler {
    async fn next_tick(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }
}

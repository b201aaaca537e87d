//! Drives the three contexts until cancelled.
//!
//! ```text
//!            ┌─ spawn_blocking ─ draw loop   (paced by wait_get_poses)
//! spawn() ───┼─ tokio::spawn ─── update loop (interval)
//!            └─ tokio::spawn ─── input loop  (interval)
//!                      │
//!   CancellationToken ─┴─► loops exit ─► join() ─► VrHandle::shutdown()
//! ```
//!
//! Observers should be attached to the contexts before they are handed to
//! [`VrRunner::spawn`]; after that each context lives on its own task.

use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::VrSettings;
use crate::error::VrError;
use crate::input::InputContext;
use crate::poller::{DrawContext, PollOutcome};
use crate::session::{VrContexts, VrHandle};
use crate::update::UpdateContext;

// Per-loop counters, logged periodically
struct LoopStats {
    name: &'static str,
    ticks: u64,
    commands: usize,
    total_ticks: u64,
    last_log_time: DateTime<Local>,
    log_interval: chrono::Duration,
}

impl LoopStats {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            ticks: 0,
            commands: 0,
            total_ticks: 0,
            last_log_time: Local::now(),
            log_interval: chrono::Duration::seconds(30),
        }
    }

    fn record(&mut self, commands: usize) {
        self.ticks += 1;
        self.total_ticks += 1;
        self.commands += commands;

        let now = Local::now();
        if now - self.last_log_time > self.log_interval {
            let elapsed_seconds = (now - self.last_log_time).num_seconds().max(1);
            info!(
                "{} loop stats: {} ticks, {} commands in {} seconds ({:.1} ticks/sec)",
                self.name,
                self.ticks,
                self.commands,
                elapsed_seconds,
                self.ticks as f64 / elapsed_seconds as f64
            );
            self.ticks = 0;
            self.commands = 0;
            self.last_log_time = now;
        }
    }
}

/// Contexts handed back once every loop has stopped.
pub struct RunReport {
    pub draw: DrawContext,
    pub update: UpdateContext,
    pub input: InputContext,
    pub draw_ticks: u64,
    pub update_ticks: u64,
    pub input_ticks: u64,
}

pub struct VrRunner {
    handle: VrHandle,
    token: CancellationToken,
    draw: JoinHandle<(DrawContext, u64)>,
    update: JoinHandle<(UpdateContext, u64)>,
    input: JoinHandle<(InputContext, u64)>,
}

impl VrRunner {
    /// Must be called from within a tokio runtime.
    pub fn spawn(contexts: VrContexts, settings: &VrSettings, token: CancellationToken) -> Self {
        let VrContexts {
            draw,
            update,
            input,
            handle,
        } = contexts;

        info!(
            "Spawning context loops (update {}ms, input {}ms)",
            settings.update_interval_ms, settings.input_interval_ms
        );

        let idle = settings.update_interval();
        let draw_token = token.clone();
        let draw = tokio::task::spawn_blocking(move || run_draw_loop(draw, idle, draw_token));

        let update_token = token.clone();
        let update_period = settings.update_interval();
        let update = tokio::spawn(run_update_loop(update, update_period, update_token));

        let input_token = token.clone();
        let input_period = settings.input_interval();
        let input = tokio::spawn(run_input_loop(input, input_period, input_token));

        info!("Context loops spawned successfully");
        Self {
            handle,
            token,
            draw,
            update,
            input,
        }
    }

    pub fn handle(&self) -> &VrHandle {
        &self.handle
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Waits for all loops to exit, then shuts the runtime down.
    pub async fn join(self) -> Result<RunReport, VrError> {
        let (draw, draw_ticks) = self
            .draw
            .await
            .map_err(|e| VrError::Task(format!("draw loop: {}", e)))?;
        let (update, update_ticks) = self
            .update
            .await
            .map_err(|e| VrError::Task(format!("update loop: {}", e)))?;
        let (input, input_ticks) = self
            .input
            .await
            .map_err(|e| VrError::Task(format!("input loop: {}", e)))?;

        self.handle.shutdown();
        info!(
            "Context loops stopped after {} draw, {} update and {} input ticks",
            draw_ticks, update_ticks, input_ticks
        );
        Ok(RunReport {
            draw,
            update,
            input,
            draw_ticks,
            update_ticks,
            input_ticks,
        })
    }
}

/// Runs until `token` is cancelled; returns the stopped contexts.
pub async fn run(
    contexts: VrContexts,
    settings: &VrSettings,
    token: CancellationToken,
) -> Result<RunReport, VrError> {
    VrRunner::spawn(contexts, settings, token).join().await
}

fn run_draw_loop(mut draw: DrawContext, idle: Duration, token: CancellationToken) -> (DrawContext, u64) {
    info!("Draw loop started");
    let mut stats = LoopStats::new("Draw");
    while !token.is_cancelled() {
        match draw.poll_poses() {
            PollOutcome::Polled => {}
            // Without pose data nothing paces this loop
            PollOutcome::NoFocus | PollOutcome::Failed => std::thread::sleep(idle),
        }
        stats.record(0);
    }
    debug!("Draw loop cancelled");
    (draw, stats.total_ticks)
}

async fn run_update_loop(
    mut update: UpdateContext,
    period: Duration,
    token: CancellationToken,
) -> (UpdateContext, u64) {
    info!("Update loop started");
    let mut interval_timer = tokio::time::interval(period);
    let mut stats = LoopStats::new("Update");
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval_timer.tick() => {
                let drained = update.update();
                stats.record(drained);
            }
        }
    }
    debug!("Update loop cancelled");
    (update, stats.total_ticks)
}

async fn run_input_loop(
    mut input: InputContext,
    period: Duration,
    token: CancellationToken,
) -> (InputContext, u64) {
    info!("Input loop started");
    let mut interval_timer = tokio::time::interval(period);
    let mut stats = LoopStats::new("Input");
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval_timer.tick() => {
                let drained = input.update_input();
                stats.record(drained);
            }
        }
    }
    debug!("Input loop cancelled");
    (input, stats.total_ticks)
}

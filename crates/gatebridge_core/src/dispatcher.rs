//! Initialization lifecycle, command queue and command routing.

use std::collections::VecDeque;
use std::time::Duration;

use serde_json::Value;

use crate::command::Command;
use crate::config::{BridgeConfig, DrainPolicy};
use crate::engine::Engine;
use crate::error::{BridgeError, Result};
use crate::outbox::Outbox;
use crate::registration::{register_gate, register_subcircuit};
use crate::scheduler::{self, Activity, Scheduler};
use gatebridge_data::HostMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Loading,
    Ready,
}

/// Owns the engine handle, the command queue and the scheduler.
///
/// Commands that arrive before the engine is ready are queued and replayed
/// in arrival order. While anything is still queued, new commands join the
/// back of the queue so ordering holds until it is empty.
pub struct Dispatcher {
    state: Lifecycle,
    queue: VecDeque<Command>,
    engine: Option<Box<dyn Engine>>,
    scheduler: Scheduler,
    outbox: Outbox,
    drain: DrainPolicy,
}

impl Dispatcher {
    pub fn new(config: &BridgeConfig, outbox: Outbox) -> Self {
        Self {
            state: Lifecycle::Uninitialized,
            queue: VecDeque::new(),
            engine: None,
            scheduler: Scheduler::new(config.scheduler.flush_period()),
            outbox,
            drain: config.lifecycle.drain,
        }
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Routes a command from the host. Module loads are handled by the
    /// caller through [`begin_loading`](Self::begin_loading).
    pub fn receive(&mut self, command: Command) {
        let ready = self.state == Lifecycle::Ready;
        if ready && (self.queue.is_empty() || command == Command::RunStart) {
            self.dispatch(command);
        } else {
            tracing::debug!(command = command.kind(), state = ?self.state, "queued");
            self.queue.push_back(command);
        }
    }

    /// Enters `Loading`. Returns false when an engine already exists.
    pub fn begin_loading(&mut self) -> bool {
        match self.state {
            Lifecycle::Ready => {
                tracing::warn!("engine already instantiated, ignoring module load");
                false
            }
            Lifecycle::Loading => {
                tracing::warn!("engine load already in progress, ignoring module load");
                false
            }
            Lifecycle::Uninitialized => {
                self.state = Lifecycle::Loading;
                tracing::info!(queued = self.queue.len(), "loading engine");
                true
            }
        }
    }

    pub fn finish_loading(&mut self, result: Result<Box<dyn Engine>>) {
        match result {
            Ok(engine) => {
                self.engine = Some(engine);
                self.state = Lifecycle::Ready;
                tracing::info!(queued = self.queue.len(), "engine ready");
                self.outbox.send(HostMessage::InitFinish);
                let run_requested = self.queue.contains(&Command::RunStart);
                if self.drain == DrainPolicy::OnLoad || run_requested {
                    self.drain_queue();
                }
            }
            Err(e) => {
                self.state = Lifecycle::Uninitialized;
                tracing::error!(error = %e, queued = self.queue.len(), "engine load failed");
            }
        }
    }

    /// Replays queued commands in arrival order.
    pub fn drain_queue(&mut self) {
        while let Some(command) = self.queue.pop_front() {
            self.dispatch(command);
        }
    }

    /// Applies a command and logs a failure; later commands are unaffected.
    fn dispatch(&mut self, command: Command) {
        let kind = command.kind().to_string();
        tracing::debug!(command = %kind, "dispatch");
        if let Err(e) = self.apply(command) {
            tracing::error!(command = %kind, error = %e, "command failed");
        }
    }

    pub fn apply(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Fetch(_) | Command::LoadBuiltin => {
                tracing::warn!("module load reached dispatch, ignoring");
                return Ok(());
            }
            Command::RunStart => {
                self.drain_queue();
                self.scheduler.ensure_flushing();
                return Ok(());
            }
            Command::UpdaterStop => {
                self.scheduler.stop_updater();
                return Ok(());
            }
            Command::Unknown(name) => {
                // Unknown types are skipped on purpose so hosts with a
                // different protocol revision keep working.
                tracing::debug!(command = %name, "ignoring unknown command");
                return Ok(());
            }
            _ => {}
        }

        let kind = command.kind().to_string();
        let engine = self
            .engine
            .as_deref_mut()
            .ok_or(BridgeError::NotReady(kind))?;
        apply_to_engine(engine, &mut self.scheduler, &self.outbox, command)
    }

    pub async fn next_activity(&mut self) -> Activity {
        self.scheduler.next().await
    }

    pub fn on_activity(&mut self, activity: Activity) {
        let Some(engine) = self.engine.as_deref_mut() else {
            return;
        };
        match activity {
            Activity::Tick => {
                if let Err(e) = scheduler::run_tick(engine, &self.outbox) {
                    tracing::error!(error = %e, "tick failed");
                }
            }
            Activity::Flush => scheduler::flush(engine, &self.outbox),
        }
    }

    /// Cancels both activities for teardown.
    pub fn shutdown(&mut self) {
        self.scheduler.stop();
    }
}

fn apply_to_engine(
    engine: &mut dyn Engine,
    scheduler: &mut Scheduler,
    outbox: &Outbox,
    command: Command,
) -> Result<()> {
    match command {
        Command::Start => {
            let period = Duration::from_millis(u64::from(engine.interval()));
            tracing::info!(tick_ms = period.as_millis() as u64, "simulation started");
            scheduler.start(period);
        }
        Command::Stop { request_id, flush } => {
            scheduler.stop();
            tracing::info!(request_id, flush, "simulation stopped");
            scheduler::acknowledge(engine, outbox, request_id, flush, Value::Null);
        }
        Command::Ping { request_id, flush } => {
            scheduler::acknowledge(engine, outbox, request_id, flush, Value::Null);
        }
        Command::UpdateGates { request_id, flush } => {
            let processed = engine.update_gates()?;
            scheduler::post_monitors(engine, outbox);
            scheduler::acknowledge(engine, outbox, request_id, flush, Value::from(processed));
        }
        Command::UpdateGatesNext { request_id, flush } => {
            let processed = engine.update_gates_next()?;
            scheduler::post_monitors(engine, outbox);
            scheduler::acknowledge(engine, outbox, request_id, flush, Value::from(processed));
        }
        Command::Interval(ms) => engine.set_interval(ms),
        Command::AddGraph(graph_id) => engine.add_graph(&graph_id)?,
        Command::AddGate(request) => register_gate(engine, request)?,
        Command::AddSubcircuit(request) => register_subcircuit(engine, request)?,
        Command::AddLink {
            graph_id,
            link_id,
            from,
            to,
        } => engine.add_link(&graph_id, &link_id, from, to)?,
        Command::RemoveLink { graph_id, link_id } => engine.remove_link(&graph_id, &link_id)?,
        Command::RemoveGate { graph_id, gate_id } => engine.remove_gate(&graph_id, &gate_id)?,
        Command::ObserveGraph(graph_id) => engine.observe_graph(&graph_id)?,
        Command::UnobserveGraph(graph_id) => engine.unobserve_graph(&graph_id)?,
        Command::ChangeInput {
            graph_id,
            gate_id,
            signal,
        } => engine.change_input(&graph_id, &gate_id, signal)?,
        Command::ManualMemChange {
            graph_id,
            gate_id,
            address,
            data,
        } => engine.manual_mem_change(&graph_id, &gate_id, address, data)?,
        Command::Monitor(request) => engine.monitor(request)?,
        Command::Unmonitor(monitor_id) => engine.unmonitor(monitor_id)?,
        Command::Alarm {
            tick,
            alarm_id,
            stop_on_alarm,
        } => engine.alarm(tick, alarm_id, stop_on_alarm)?,
        Command::Unalarm(alarm_id) => engine.unalarm(alarm_id)?,
        // Lifecycle commands never need the engine; see `Dispatcher::apply`.
        Command::Fetch(_)
        | Command::LoadBuiltin
        | Command::RunStart
        | Command::UpdaterStop
        | Command::Unknown(_) => {}
    }
    Ok(())
}

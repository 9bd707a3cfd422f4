//! Turns engine-reported changes into host messages.

use gatebridge_data::{encode, HostMessage, MemoryWrite, PortMap, TriggerKind, UpdateEntry};

use crate::engine::{EngineEvent, EngineUpdates, GateChange};

/// Builds the update batch for one flush.
///
/// One entry per reported gate, in the engine's emission order. Gates that
/// report no changed ports still get an entry with an empty port map.
pub fn format_batch(changes: &[GateChange]) -> Vec<UpdateEntry> {
    changes
        .iter()
        .map(|change| {
            let ports: PortMap = change
                .ports
                .iter()
                .map(|p| (p.port.clone(), encode(&p.signal)))
                .collect();
            UpdateEntry(change.graph_id.clone(), change.gate_id.clone(), ports)
        })
        .collect()
}

pub fn update_message(updates: &EngineUpdates) -> HostMessage {
    HostMessage::Update(
        updates.tick,
        updates.pending_events,
        format_batch(&updates.changes),
    )
}

impl From<EngineEvent> for HostMessage {
    fn from(event: EngineEvent) -> Self {
        match event {
            EngineEvent::MonitorTriggered {
                monitor_id,
                tick,
                signal,
                stop_on_trigger,
                one_shot,
            } => HostMessage::MonitorValue(
                monitor_id,
                tick,
                encode(&signal),
                stop_on_trigger,
                one_shot,
            ),
            EngineEvent::AlarmReached {
                alarm_id,
                tick,
                stop_on_alarm,
            } => HostMessage::AlarmReached(alarm_id, tick, stop_on_alarm),
            EngineEvent::MemoryChanged {
                graph_id,
                gate_id,
                address,
                data,
            } => HostMessage::GateTrigger(
                graph_id,
                gate_id,
                TriggerKind::MemChange,
                MemoryWrite(address, encode(&data)),
            ),
        }
    }
}

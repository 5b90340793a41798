//! The heartbeat reply (`spec.md` §4.G "Event handling", §8 "Heartbeat
//! reply"): latency accounting plus a memory-pressure sample, folded into a
//! single completed [`ActionResult`] the transport posts back immediately.
//! There is no teacher counterpart for memory sampling — `kube-rs` has no
//! equivalent of a worker self-reporting its own resource pressure — so
//! this samples with `sysinfo`, the crate the retrieval pack's other
//! long-running worker processes use for the same purpose.

use bridge_worker_core::{ActionResult, ActionResultKind, BridgeAction, Status};
use chrono::{DateTime, Utc};
use sysinfo::System;
use uuid::Uuid;

/// Below this many free bytes, the reply's message flags `MemoryPressure`.
const MEMORY_PRESSURE_THRESHOLD_BYTES: u64 = 200 * 1024 * 1024;

/// Builds the reply to a `WorkerEvent::Heartbeat`. There is no unit, space,
/// or queued operation behind a heartbeat, so those identity fields are
/// nil — the control plane correlates heartbeat replies by the fact that
/// exactly one is emitted per heartbeat it sends, not by id.
#[must_use]
pub fn reply(sent_at: DateTime<Utc>, received_at: DateTime<Utc>) -> ActionResult {
    let latency_ms = (received_at - sent_at).num_milliseconds().max(0);
    let mut message = format!("latency_ms={latency_ms}");
    if under_memory_pressure() {
        message.push_str(" MemoryPressure");
    }

    ActionResult {
        unit_id: Uuid::nil(),
        space_id: Uuid::nil(),
        queued_op_id: Uuid::nil(),
        revision_num: 0,
        action: BridgeAction::Apply,
        status: Status::Completed,
        result: ActionResultKind::None,
        message,
        started_at: Some(received_at),
        terminated_at: None,
        data: Vec::new(),
        live_state: Vec::new(),
        outputs: Vec::new(),
    }
}

fn under_memory_pressure() -> bool {
    let mut system = System::new();
    system.refresh_memory();
    system.available_memory() < MEMORY_PRESSURE_THRESHOLD_BYTES
}

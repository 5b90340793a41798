//! The action result record every handler invocation produces (`spec.md`
//! §3). Stamping of identity fields and `terminated_at` is the
//! responsibility of `bridge-worker-runtime`'s action result context, not
//! of this type, per invariant I2.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::BridgeAction;

/// Lifecycle status of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    None,
    Pending,
    Submitted,
    Progressing,
    Completed,
    Failed,
    Canceled,
}

/// The outcome of an operation, once known. `ApplyWaitFailed` is the one
/// non-`None` variant that is *not* terminal (`spec.md` I3): it reports
/// that the post-apply watch failed, but the apply handler invocation
/// itself already returned, so the watcher may still retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionResultKind {
    None,
    ApplyCompleted,
    ApplyFailed,
    ApplyWaitFailed,
    DestroyCompleted,
    DestroyFailed,
    DestroyWaitFailed,
    RefreshFailed,
    RefreshAndDrifted,
    RefreshAndNoDrift,
    ImportCompleted,
    ImportFailed,
    FunctionInvocationCompleted,
    FunctionInvocationFailed,
}

impl ActionResultKind {
    /// Whether this result represents a terminal outcome (`spec.md` I3).
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, ActionResultKind::None | ActionResultKind::ApplyWaitFailed)
    }
}

/// What a handler emits back to the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub unit_id: Uuid,
    pub space_id: Uuid,
    pub queued_op_id: Uuid,
    pub revision_num: i64,

    pub action: BridgeAction,
    pub status: Status,
    pub result: ActionResultKind,

    pub message: String,

    pub started_at: Option<DateTime<Utc>>,
    pub terminated_at: Option<DateTime<Utc>>,

    #[serde(with = "crate::bytes_as_base64", default)]
    pub data: Vec<u8>,
    #[serde(with = "crate::bytes_as_base64", default)]
    pub live_state: Vec<u8>,
    #[serde(with = "crate::bytes_as_base64", default)]
    pub outputs: Vec<u8>,
}

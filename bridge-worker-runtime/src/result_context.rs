//! The action result context (`spec.md` §4.A): the handle a handler
//! invocation uses to report progress and the final outcome back to the
//! control plane, and the single place that stamps the identity fields and
//! `terminated_at` onto every [`ActionResult`] it sends (invariant I2).

use bridge_worker_core::{ActionResult, ActionResultKind, BridgeAction, BridgePayload, Status};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

/// Constructed once per handler invocation by the command processor and
/// handed to the handler by reference; a handler never sees a raw
/// [`ActionResult`] or the channel it travels over.
#[derive(Clone)]
pub struct ActionResultContext {
    unit_id: Uuid,
    space_id: Uuid,
    queued_op_id: Uuid,
    revision_num: i64,
    action: BridgeAction,
    started_at: DateTime<Utc>,
    sink: mpsc::Sender<ActionResult>,
    cancellation: CancellationToken,
}

impl ActionResultContext {
    #[must_use]
    pub fn new(
        payload: &BridgePayload,
        action: BridgeAction,
        sink: mpsc::Sender<ActionResult>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            unit_id: payload.unit_id,
            space_id: payload.space_id,
            queued_op_id: payload.queued_op_id,
            revision_num: payload.revision_num,
            action,
            started_at: Utc::now(),
            sink,
            cancellation,
        }
    }

    #[must_use]
    pub fn unit_id(&self) -> Uuid {
        self.unit_id
    }

    #[must_use]
    pub fn space_id(&self) -> Uuid {
        self.space_id
    }

    #[must_use]
    pub fn queued_op_id(&self) -> Uuid {
        self.queued_op_id
    }

    #[must_use]
    pub fn revision_num(&self) -> i64 {
        self.revision_num
    }

    #[must_use]
    pub fn action(&self) -> BridgeAction {
        self.action.clone()
    }

    /// The ambient cancellation token for this worker process. Handlers
    /// that do long-running work (e.g. polling) should select on this
    /// rather than spin forever (`spec.md` §5).
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub(crate) fn sink(&self) -> mpsc::Sender<ActionResult> {
        self.sink.clone()
    }

    pub(crate) fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Send one result update. `terminated_at` is stamped here, not by the
    /// caller: a caller cannot mark a result terminal without going
    /// through `result.is_terminal()` (invariant I2, I3).
    pub async fn send_status(
        &self,
        status: Status,
        result: ActionResultKind,
        message: impl Into<String>,
        data: Vec<u8>,
        live_state: Vec<u8>,
        outputs: Vec<u8>,
    ) -> Result<(), crate::Error> {
        let record = ActionResult {
            unit_id: self.unit_id,
            space_id: self.space_id,
            queued_op_id: self.queued_op_id,
            revision_num: self.revision_num,
            action: self.action.clone(),
            status,
            result,
            message: message.into(),
            started_at: Some(self.started_at),
            terminated_at: result.is_terminal().then(Utc::now),
            data,
            live_state,
            outputs,
        };
        self.sink
            .send(record)
            .await
            .map_err(|_| crate::Error::ResultChannelClosed)
    }

    /// Same as [`Self::send_status`], but logs and swallows a channel
    /// failure instead of propagating it. Progress updates are
    /// best-effort; losing one should never abort the handler invocation
    /// that produced it (`spec.md` §9 "streaming I/O to status").
    pub async fn safe_send_status(
        &self,
        status: Status,
        result: ActionResultKind,
        message: impl Into<String>,
        data: Vec<u8>,
        live_state: Vec<u8>,
        outputs: Vec<u8>,
    ) {
        if let Err(err) = self
            .send_status(status, result, message, data, live_state, outputs)
            .await
        {
            warn!(unit_id = %self.unit_id, queued_op_id = %self.queued_op_id, error = %err, "failed to deliver action result update");
        }
    }
}

#[cfg(test)]
mod tests {
    use bridge_worker_core::Toolchain;

    use super::*;

    fn payload() -> BridgePayload {
        BridgePayload {
            queued_op_id: Uuid::new_v4(),
            toolchain: Toolchain::from("Kubernetes/YAML"),
            provider: "Kubernetes".into(),
            unit_id: Uuid::new_v4(),
            unit_slug: "my-unit".into(),
            space_id: Uuid::new_v4(),
            revision_num: 3,
            data: vec![],
            live_state: vec![],
            target_params: vec![],
            extra_params: vec![],
        }
    }

    #[tokio::test]
    async fn terminal_results_are_stamped_with_terminated_at() {
        let (tx, mut rx) = mpsc::channel(4);
        let payload = payload();
        let ctx = ActionResultContext::new(&payload, BridgeAction::Apply, tx, CancellationToken::new());

        ctx.send_status(Status::Completed, ActionResultKind::ApplyCompleted, "ok", vec![], vec![], vec![])
            .await
            .unwrap();

        let record = rx.recv().await.unwrap();
        assert!(record.terminated_at.is_some());
        assert_eq!(record.unit_id, payload.unit_id);
        assert_eq!(record.queued_op_id, payload.queued_op_id);
    }

    #[tokio::test]
    async fn non_terminal_results_leave_terminated_at_empty() {
        let (tx, mut rx) = mpsc::channel(4);
        let payload = payload();
        let ctx = ActionResultContext::new(&payload, BridgeAction::Apply, tx, CancellationToken::new());

        ctx.send_status(Status::Progressing, ActionResultKind::ApplyWaitFailed, "retrying", vec![], vec![], vec![])
            .await
            .unwrap();

        let record = rx.recv().await.unwrap();
        assert!(record.terminated_at.is_none());
    }

    #[tokio::test]
    async fn safe_send_status_swallows_a_closed_channel() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let payload = payload();
        let ctx = ActionResultContext::new(&payload, BridgeAction::Apply, tx, CancellationToken::new());

        ctx.safe_send_status(Status::Completed, ActionResultKind::ApplyCompleted, "ok", vec![], vec![], vec![])
            .await;
    }
}

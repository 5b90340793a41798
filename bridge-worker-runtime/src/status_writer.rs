//! A buffered [`std::io::Write`] sink that turns a handler's incidental
//! textual output (command logs, progress notes) into `Progressing`
//! action-result updates (`spec.md` §4.B). Handlers that shell out to a
//! toolchain binary can hand this writer down as the process's stdout/
//! stderr sink without needing to know anything about action results.

use std::io;

use bridge_worker_core::{ActionResult, ActionResultKind, BridgeAction, Status};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::result_context::ActionResultContext;

/// Buffer watermark: a write that crosses this threshold triggers an
/// immediate flush. Matches the chunk size most toolchain CLIs emit a
/// single progress line in.
const BUFFER_CAPACITY: usize = 4096;

pub struct StatusWriter {
    unit_id: Uuid,
    space_id: Uuid,
    queued_op_id: Uuid,
    revision_num: i64,
    action: BridgeAction,
    started_at: DateTime<Utc>,
    sink: mpsc::Sender<ActionResult>,
    buffer: Vec<u8>,
}

impl StatusWriter {
    #[must_use]
    pub fn new(ctx: &ActionResultContext) -> Self {
        Self {
            unit_id: ctx.unit_id(),
            space_id: ctx.space_id(),
            queued_op_id: ctx.queued_op_id(),
            revision_num: ctx.revision_num(),
            action: ctx.action(),
            started_at: ctx.started_at(),
            sink: ctx.sink(),
            buffer: Vec::with_capacity(BUFFER_CAPACITY),
        }
    }

    fn flush_buffer(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let message = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();

        let record = ActionResult {
            unit_id: self.unit_id,
            space_id: self.space_id,
            queued_op_id: self.queued_op_id,
            revision_num: self.revision_num,
            action: self.action.clone(),
            status: Status::Progressing,
            result: ActionResultKind::None,
            message,
            started_at: Some(self.started_at),
            terminated_at: None,
            data: Vec::new(),
            live_state: Vec::new(),
            outputs: Vec::new(),
        };

        // Progress chatter is best-effort: a full or closed channel just
        // drops this chunk rather than blocking the handler (spec.md §9
        // "backpressure vs blocking").
        if let Err(err) = self.sink.try_send(record) {
            debug!(unit_id = %self.unit_id, %err, "dropping status update");
        }
    }
}

impl io::Write for StatusWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        if self.buffer.len() >= BUFFER_CAPACITY {
            self.flush_buffer();
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer();
        Ok(())
    }
}

impl Drop for StatusWriter {
    fn drop(&mut self) {
        self.flush_buffer();
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use bridge_worker_core::BridgePayload;
    use tokio_util::sync::CancellationToken;

    use super::*;

    fn payload() -> BridgePayload {
        BridgePayload {
            queued_op_id: Uuid::new_v4(),
            toolchain: "Kubernetes/YAML".into(),
            provider: "Kubernetes".into(),
            unit_id: Uuid::new_v4(),
            unit_slug: "my-unit".into(),
            space_id: Uuid::new_v4(),
            revision_num: 1,
            data: vec![],
            live_state: vec![],
            target_params: vec![],
            extra_params: vec![],
        }
    }

    #[tokio::test]
    async fn flush_emits_a_progressing_update_with_accumulated_text() {
        let (tx, mut rx) = mpsc::channel(4);
        let payload = payload();
        let ctx = ActionResultContext::new(&payload, BridgeAction::Apply, tx, CancellationToken::new());
        let mut writer = StatusWriter::new(&ctx);

        write!(writer, "applying manifest\n").unwrap();
        writer.flush().unwrap();

        let record = rx.recv().await.unwrap();
        assert_eq!(record.status, Status::Progressing);
        assert_eq!(record.message, "applying manifest\n");
        assert!(record.terminated_at.is_none());
    }

    #[tokio::test]
    async fn crossing_the_watermark_flushes_without_an_explicit_flush_call() {
        let (tx, mut rx) = mpsc::channel(4);
        let payload = payload();
        let ctx = ActionResultContext::new(&payload, BridgeAction::Apply, tx, CancellationToken::new());
        let mut writer = StatusWriter::new(&ctx);

        let chunk = vec![b'x'; BUFFER_CAPACITY];
        writer.write_all(&chunk).unwrap();

        let record = rx.recv().await.unwrap();
        assert_eq!(record.message.len(), BUFFER_CAPACITY);
    }

    #[tokio::test]
    async fn drop_flushes_any_remaining_buffered_text() {
        let (tx, mut rx) = mpsc::channel(4);
        let payload = payload();
        let ctx = ActionResultContext::new(&payload, BridgeAction::Apply, tx, CancellationToken::new());
        {
            let mut writer = StatusWriter::new(&ctx);
            write!(writer, "partial").unwrap();
        }

        let record = rx.recv().await.unwrap();
        assert_eq!(record.message, "partial");
    }
}

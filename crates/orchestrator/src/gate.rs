//! The blocking human-in-the-loop gate.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use skein_core::{NodeId, RequestId};
use skein_execution::{
    ExecutionContext, ExecutionStatus, HitlAction, HitlGateSpec, HitlOutcome, HitlRequest,
    HitlStatus, HumanGate,
};
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::orchestrator::{Orchestrator, status_for_action};

#[async_trait]
impl HumanGate for Orchestrator {
    /// Persist a request, move the run to `WaitingHuman`, publish the
    /// `hitl_request` event, and block until a response arrives or the
    /// timeout applies the auto action. The run returns to `Running` either
    /// way.
    async fn ask_human(&self, ctx: &ExecutionContext, spec: HitlGateSpec) -> HitlOutcome {
        let execution_id = ctx.execution_id;
        let node_id = ctx
            .current_node()
            .unwrap_or_else(|| NodeId::new("orchestrator"));

        let request = HitlRequest {
            id: RequestId::v4(),
            execution_id,
            user_id: ctx.user_id,
            node_id: node_id.clone(),
            request_type: spec.request_type,
            title: spec.title.clone(),
            message: spec.message.clone(),
            options: spec.options.clone(),
            context_data: spec.context_data.clone(),
            status: HitlStatus::Pending,
            response: None,
            timeout_seconds: spec.timeout.as_secs(),
            auto_action: spec.auto_action,
            created_at: Utc::now(),
            responded_at: None,
        };
        if let Err(err) = self.hitl.create_request(request.clone()).await {
            warn!(execution_id = %execution_id, "hitl persist failed: {err}");
        }

        self.update_handle(execution_id, |handle| {
            handle.state = ExecutionStatus::WaitingHuman;
            handle.pending_hitl = Some(request.clone());
        });
        self.persist_status(execution_id, ExecutionStatus::WaitingHuman)
            .await;
        self.persist_event(self.broadcaster.hitl_requested(
            execution_id,
            json!({
                "request_id": request.id,
                "type": request.request_type,
                "title": request.title,
                "message": request.message,
                "options": request.options,
                "node_id": request.node_id,
                "execution_id": execution_id,
                "timeout_seconds": request.timeout_seconds,
            }),
        ))
        .await;

        let (tx, rx) = oneshot::channel();
        self.responders.lock().insert(request.id, tx);
        info!(execution_id = %execution_id, request_id = %request.id, "waiting for human");

        let outcome = match tokio::time::timeout(spec.timeout, rx).await {
            Ok(Ok(response)) => {
                let status = status_for_action(response.action);
                self.resolve(request.id, status, response.value.clone()).await;
                HitlOutcome {
                    action: response.action,
                    value: response.value,
                    timed_out: false,
                }
            }
            Ok(Err(_sender_dropped)) => {
                // stop() discarded the responder; the run is being torn
                // down and the auto action fills in for the record.
                self.resolve(request.id, HitlStatus::Cancelled, None).await;
                HitlOutcome {
                    action: HitlAction::from(spec.auto_action),
                    value: None,
                    timed_out: false,
                }
            }
            Err(_elapsed) => {
                self.responders.lock().remove(&request.id);
                warn!(request_id = %request.id, "hitl request timed out");
                self.resolve(request.id, HitlStatus::Timeout, None).await;
                HitlOutcome {
                    action: HitlAction::from(spec.auto_action),
                    value: None,
                    timed_out: true,
                }
            }
        };

        self.update_handle(execution_id, |handle| {
            if handle.state == ExecutionStatus::WaitingHuman {
                handle.state = ExecutionStatus::Running;
            }
            handle.pending_hitl = None;
        });
        self.persist_status(execution_id, ExecutionStatus::Running)
            .await;
        outcome
    }
}

impl Orchestrator {
    async fn resolve(
        &self,
        request_id: RequestId,
        status: HitlStatus,
        response: Option<serde_json::Value>,
    ) {
        if let Err(err) = self
            .hitl
            .resolve_request(request_id, status, response, Utc::now())
            .await
        {
            warn!(request_id = %request_id, "hitl resolve failed: {err}");
        }
    }
}

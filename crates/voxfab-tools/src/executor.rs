//! The tool executor — classify, validate, route, normalise.
//!
//! `execute` never returns an error: every failure maps into a
//! `{success: false, error}` result so the conversation continues. The only
//! outputs besides the result are *intents* — a handoff request for the
//! gateway and a verified-user record for the session — both carried on the
//! returned [`ToolOutcome`] for the runtime to act on.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::{info, warn};

use voxfab_core::{
    HandoffContext, HandoffRequest, HandoffTool, ToolKind, ToolResult, VerifiedUser,
};

use crate::catalog::ToolCatalog;
use crate::error::ToolError;
use crate::transport::ToolTransport;

/// Fallback reason when neither the model nor the session supplies one.
pub const DEFAULT_HANDOFF_REASON: &str = "User needs specialist assistance";

/// Handle that `return_to_triage` resolves to.
pub const TRIAGE_HANDLE: &str = "triage";

/// Immutable view of session state the executor needs.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub agent_id: String,
    pub user_intent: Option<String>,
    pub verified_user: Option<VerifiedUser>,
    pub last_user_message: Option<String>,
    /// Workflow engine snapshot, carried into handoff requests.
    pub graph_state: Option<Value>,
}

/// Everything one tool invocation produced.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    /// Result for both the client and the model.
    pub result: ToolResult,

    /// Present when the tool was a handoff: forward to the gateway.
    pub handoff: Option<HandoffRequest>,

    /// Present when the tool established identity: update session state
    /// and emit a memory-update intent.
    pub verified_user: Option<VerifiedUser>,
}

impl ToolOutcome {
    fn plain(result: ToolResult) -> Self {
        Self {
            result,
            handoff: None,
            verified_user: None,
        }
    }
}

/// Routes tool invocations by their load-time classification.
pub struct ToolExecutor {
    catalog: Arc<ToolCatalog>,
    transport: Arc<dyn ToolTransport>,
}

impl ToolExecutor {
    pub fn new(catalog: Arc<ToolCatalog>, transport: Arc<dyn ToolTransport>) -> Self {
        Self { catalog, transport }
    }

    /// Execute `tool_name` with `input` on behalf of a session.
    pub async fn execute(
        &self,
        session: &SessionSnapshot,
        tool_name: &str,
        input: Value,
        tool_use_id: &str,
    ) -> ToolOutcome {
        let input = match normalise_input(input) {
            Ok(input) => input,
            Err(e) => {
                warn!(tool = tool_name, tool_use_id, error = %e, "Rejected tool input");
                return ToolOutcome::plain(ToolResult::err(e.to_string()));
            }
        };

        match self.catalog.kind_of(tool_name) {
            ToolKind::Handoff(handoff) => self.execute_handoff(session, &handoff, &input),
            ToolKind::KnowledgeBase => {
                if !input
                    .get("query")
                    .and_then(Value::as_str)
                    .is_some_and(|q| !q.trim().is_empty())
                {
                    return ToolOutcome::plain(ToolResult::err("field query is required"));
                }
                self.dispatch(session, tool_name, &input, tool_use_id).await
            }
            ToolKind::Runtime | ToolKind::Remote => {
                self.dispatch(session, tool_name, &input, tool_use_id).await
            }
        }
    }

    // ── Handoff composition ────────────────────────────────────────

    fn execute_handoff(
        &self,
        session: &SessionSnapshot,
        handoff: &HandoffTool,
        input: &Map<String, Value>,
    ) -> ToolOutcome {
        let mut context = HandoffContext {
            from_agent: session.agent_id.clone(),
            reason: input
                .get("reason")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| session.user_intent.clone())
                .unwrap_or_else(|| DEFAULT_HANDOFF_REASON.to_string()),
            last_user_message: session.last_user_message.clone(),
            ..HandoffContext::default()
        };
        if let Some(user) = &session.verified_user {
            context.verified = Some(true);
            context.user_name = Some(user.user_name.clone());
            context.account = Some(user.account.clone());
            context.sort_code = Some(user.sort_code.clone());
        }

        let target = match handoff {
            HandoffTool::Transfer { handle } => handle.clone(),
            HandoffTool::ReturnToTriage => {
                let Some(task) = input.get("taskCompleted").and_then(Value::as_str) else {
                    return ToolOutcome::plain(ToolResult::err("field taskCompleted is required"));
                };
                context.task_completed = Some(task.to_string());
                context.summary = input
                    .get("summary")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                context.is_return = true;
                TRIAGE_HANDLE.to_string()
            }
        };

        let request = HandoffRequest {
            target_agent_id: target,
            context,
            graph_state: session.graph_state.clone(),
        };
        info!(
            from = %session.agent_id,
            to = %request.target_agent_id,
            reason = %request.context.reason,
            "Composed handoff request"
        );

        ToolOutcome {
            result: ToolResult::ok(json!({ "handoffRequest": request })),
            handoff: Some(request),
            verified_user: None,
        }
    }

    // ── Remote dispatch ────────────────────────────────────────────

    async fn dispatch(
        &self,
        session: &SessionSnapshot,
        tool_name: &str,
        input: &Map<String, Value>,
        tool_use_id: &str,
    ) -> ToolOutcome {
        let input_value = Value::Object(input.clone());
        let value = match self.transport.execute(tool_name, &input_value).await {
            Ok(value) => value,
            Err(e) => {
                warn!(tool = tool_name, tool_use_id, error = %e, "Tool dispatch failed");
                return ToolOutcome::plain(ToolResult::err(e.to_string()));
            }
        };

        // A downstream `success: false` passes through verbatim.
        if value.get("success").and_then(Value::as_bool) == Some(false) {
            let error = value
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string);
            return ToolOutcome::plain(ToolResult {
                success: false,
                result: Some(value),
                error,
            });
        }

        let verified_user = extract_verified_user(tool_name, input, &value);
        if let Some(user) = &verified_user {
            info!(
                tool = tool_name,
                user = %user.user_name,
                session_agent = %session.agent_id,
                "Identity established by tool result"
            );
        }

        ToolOutcome {
            result: ToolResult::ok(value),
            handoff: None,
            verified_user,
        }
    }
}

/// Reject non-object input; treat `null` as the empty object (models often
/// send it for zero-argument tools).
fn normalise_input(input: Value) -> Result<Map<String, Value>, ToolError> {
    match input {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(ToolError::InvalidInput(format!(
            "tool input must be a JSON object, got {}",
            type_name(&other)
        ))),
    }
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Identity side effect: an IDV check returning `auth_status == "VERIFIED"`
/// yields the verified-user triple (name from the response, credentials
/// from the request input).
fn extract_verified_user(
    tool_name: &str,
    input: &Map<String, Value>,
    result: &Value,
) -> Option<VerifiedUser> {
    if tool_name != "perform_idv_check" {
        return None;
    }
    let status = result
        .get("auth_status")
        .or_else(|| result.get("authStatus"))
        .and_then(Value::as_str)?;
    if status != "VERIFIED" {
        return None;
    }

    let user_name = result
        .get("customer_name")
        .or_else(|| result.get("customerName"))
        .and_then(Value::as_str)?
        .to_string();
    let account = input
        .get("account")
        .or_else(|| input.get("accountNumber"))
        .and_then(Value::as_str)?
        .to_string();
    let sort_code = input
        .get("sortCode")
        .or_else(|| input.get("sort_code"))
        .and_then(Value::as_str)?
        .to_string();

    Some(VerifiedUser {
        user_name,
        account,
        sort_code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockToolTransport;

    fn executor(transport: MockToolTransport) -> ToolExecutor {
        ToolExecutor::new(Arc::new(ToolCatalog::default()), Arc::new(transport))
    }

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot {
            agent_id: "persona-idv".into(),
            ..SessionSnapshot::default()
        }
    }

    #[tokio::test]
    async fn non_object_input_is_rejected() {
        let executor = executor(MockToolTransport::new());
        let outcome = executor
            .execute(&snapshot(), "agentcore_balance", json!([1, 2]), "u-1")
            .await;
        assert!(!outcome.result.success);
        assert!(outcome.result.error.unwrap().contains("must be a JSON object"));
    }

    #[tokio::test]
    async fn null_input_means_empty_object() {
        let mut transport = MockToolTransport::new();
        transport
            .expect_execute()
            .withf(|tool, input| tool == "agentcore_balance" && input == &json!({}))
            .returning(|_, _| Ok(json!({"balance": 10.0})));

        let outcome = executor(transport)
            .execute(&snapshot(), "agentcore_balance", Value::Null, "u-1")
            .await;
        assert!(outcome.result.success);
    }

    #[tokio::test]
    async fn transfer_reason_fallback_chain() {
        let executor = executor(MockToolTransport::new());

        // 1. Explicit reason wins.
        let outcome = executor
            .execute(
                &snapshot(),
                "transfer_to_banking",
                json!({"reason": "balance enquiry"}),
                "u-1",
            )
            .await;
        assert_eq!(outcome.handoff.as_ref().unwrap().context.reason, "balance enquiry");

        // 2. Session intent next.
        let mut with_intent = snapshot();
        with_intent.user_intent = Some("mortgage question".into());
        let outcome = executor
            .execute(&with_intent, "transfer_to_banking", json!({}), "u-2")
            .await;
        assert_eq!(
            outcome.handoff.as_ref().unwrap().context.reason,
            "mortgage question"
        );

        // 3. Fixed default last.
        let outcome = executor
            .execute(&snapshot(), "transfer_to_banking", json!({}), "u-3")
            .await;
        assert_eq!(
            outcome.handoff.as_ref().unwrap().context.reason,
            DEFAULT_HANDOFF_REASON
        );
    }

    #[tokio::test]
    async fn transfer_copies_verified_user_and_last_message() {
        let mut session = snapshot();
        session.verified_user = Some(VerifiedUser {
            user_name: "Sarah Johnson".into(),
            account: "12345678".into(),
            sort_code: "112233".into(),
        });
        session.last_user_message = Some("what's my balance".into());
        session.graph_state = Some(json!({"currentNodeId": "verify"}));

        let executor = executor(MockToolTransport::new());
        let outcome = executor
            .execute(&session, "transfer_to_banking", json!({}), "u-1")
            .await;

        let handoff = outcome.handoff.unwrap();
        assert_eq!(handoff.target_agent_id, "banking");
        assert_eq!(handoff.context.verified, Some(true));
        assert_eq!(handoff.context.user_name.as_deref(), Some("Sarah Johnson"));
        assert_eq!(handoff.context.account.as_deref(), Some("12345678"));
        assert_eq!(handoff.context.sort_code.as_deref(), Some("112233"));
        assert_eq!(
            handoff.context.last_user_message.as_deref(),
            Some("what's my balance")
        );
        assert_eq!(handoff.graph_state, Some(json!({"currentNodeId": "verify"})));

        // The result payload carries the same request for the model/client.
        let payload = outcome.result.result.unwrap();
        assert_eq!(payload["handoffRequest"]["targetAgentId"], "banking");
    }

    #[tokio::test]
    async fn return_to_triage_requires_task_completed() {
        let executor = executor(MockToolTransport::new());

        let outcome = executor
            .execute(&snapshot(), "return_to_triage", json!({}), "u-1")
            .await;
        assert!(!outcome.result.success);
        assert_eq!(
            outcome.result.error.as_deref(),
            Some("field taskCompleted is required")
        );
        assert!(outcome.handoff.is_none());

        let outcome = executor
            .execute(
                &snapshot(),
                "return_to_triage",
                json!({"taskCompleted": "balance_check", "summary": "gave balance"}),
                "u-2",
            )
            .await;
        let handoff = outcome.handoff.unwrap();
        assert_eq!(handoff.target_agent_id, TRIAGE_HANDLE);
        assert!(handoff.context.is_return);
        assert_eq!(handoff.context.task_completed.as_deref(), Some("balance_check"));
        assert_eq!(handoff.context.summary.as_deref(), Some("gave balance"));
    }

    #[tokio::test]
    async fn knowledge_base_requires_nonempty_query() {
        let executor = executor(MockToolTransport::new());
        for input in [json!({}), json!({"query": "  "})] {
            let outcome = executor
                .execute(&snapshot(), "search_knowledge_base", input, "u-1")
                .await;
            assert_eq!(outcome.result.error.as_deref(), Some("field query is required"));
        }
    }

    #[tokio::test]
    async fn transport_errors_map_to_failed_result() {
        let mut transport = MockToolTransport::new();
        transport
            .expect_execute()
            .returning(|_, _| Err(ToolError::Transport("connection refused".into())));

        let outcome = executor(transport)
            .execute(&snapshot(), "agentcore_balance", json!({}), "u-1")
            .await;
        assert!(!outcome.result.success);
        assert_eq!(outcome.result.error.as_deref(), Some("connection refused"));
    }

    #[tokio::test]
    async fn downstream_failure_passes_through_verbatim() {
        let mut transport = MockToolTransport::new();
        transport.expect_execute().returning(|_, _| {
            Ok(json!({"success": false, "error": "account not found", "code": 404}))
        });

        let outcome = executor(transport)
            .execute(&snapshot(), "agentcore_balance", json!({}), "u-1")
            .await;
        assert!(!outcome.result.success);
        assert_eq!(outcome.result.error.as_deref(), Some("account not found"));
        assert_eq!(outcome.result.result.unwrap()["code"], 404);
    }

    #[tokio::test]
    async fn verified_idv_yields_identity_intent() {
        let mut transport = MockToolTransport::new();
        transport.expect_execute().returning(|_, _| {
            Ok(json!({"auth_status": "VERIFIED", "customer_name": "Sarah Johnson"}))
        });

        let outcome = executor(transport)
            .execute(
                &snapshot(),
                "perform_idv_check",
                json!({"account": "12345678", "sortCode": "112233"}),
                "u-1",
            )
            .await;

        let user = outcome.verified_user.unwrap();
        assert_eq!(user.user_name, "Sarah Johnson");
        assert_eq!(user.account, "12345678");
        assert_eq!(user.sort_code, "112233");
    }

    #[tokio::test]
    async fn failed_idv_yields_no_identity() {
        let mut transport = MockToolTransport::new();
        transport
            .expect_execute()
            .returning(|_, _| Ok(json!({"auth_status": "DENIED"})));

        let outcome = executor(transport)
            .execute(
                &snapshot(),
                "perform_idv_check",
                json!({"account": "12345678", "sortCode": "112233"}),
                "u-1",
            )
            .await;
        assert!(outcome.result.success);
        assert!(outcome.verified_user.is_none());
    }
}

//! System prompt composition and the post-start priming message.
//!
//! Section order is load-bearing: the persona body textually references
//! "the section above" (the inherited-context block), so the composed
//! prompt must always read context → persona → handoff instructions →
//! workflow. Swapping the first two suppresses intent-driven behaviour.
//!
//! The model reads the prompt exactly once, at stream open. Inherited
//! session state therefore *also* needs a live priming turn immediately
//! after start — `priming_message` builds it.

use std::fmt::Write as _;

use voxfab_core::SessionMemory;
use voxfab_tools::ToolCatalog;

/// Marker prefix for internal text turns; echoes are filtered from display.
pub const SYSTEM_MARKER: &str = "[SYSTEM";

/// Compose the full system prompt in required section order.
#[must_use]
pub fn compose_system_prompt(
    memory: &SessionMemory,
    persona: &str,
    catalog: &ToolCatalog,
    workflow_text: &str,
) -> String {
    let mut prompt = String::new();

    // (a) Inherited-context block. Always present, even when empty, so the
    // persona's "section above" reference has something to point at.
    prompt.push_str("## Session context\n");
    prompt.push_str(&context_block(memory));
    prompt.push('\n');

    // (b) Persona body.
    prompt.push_str(persona.trim());
    prompt.push_str("\n\n");

    // (c) Handoff tool instructions.
    prompt.push_str("## Handoffs\n");
    let mut any_handoff = false;
    for tool in catalog.handoff_tools() {
        any_handoff = true;
        let _ = write!(prompt, "- {}: {}", tool.definition.name, tool.definition.description);
        if let Some(instruction) = &tool.instruction {
            let _ = write!(prompt, " {instruction}");
        }
        prompt.push('\n');
    }
    if !any_handoff {
        prompt.push_str("- No handoff tools are available in this session.\n");
    }
    prompt.push('\n');

    // (d) Workflow rendering.
    prompt.push_str("## Conversation workflow\n");
    prompt.push_str(workflow_text);

    prompt
}

fn context_block(memory: &SessionMemory) -> String {
    let mut block = String::new();
    if let Some(user) = memory.verified_user() {
        let _ = writeln!(
            block,
            "The caller is already verified: {} (account {}, sort code {}). Do not verify again.",
            user.user_name, user.account, user.sort_code
        );
    } else {
        if let Some(account) = &memory.account {
            let _ = writeln!(block, "The caller has provided account number {account}.");
        }
        if let Some(sort_code) = &memory.sort_code {
            let _ = writeln!(block, "The caller has provided sort code {sort_code}.");
        }
    }
    if let Some(intent) = &memory.user_intent {
        let _ = writeln!(block, "The caller's stated goal: {intent}.");
    }
    if let Some(reason) = memory.extra.get("handoffReason").and_then(|v| v.as_str()) {
        let _ = writeln!(block, "This session was handed to you because: {reason}.");
    }
    if let Some(last) = &memory.last_user_message {
        let _ = writeln!(block, "Their last message was: \"{last}\".");
    }
    if block.is_empty() {
        block.push_str("New session; no prior context.\n");
    }
    block
}

/// The priming text turn sent right after stream start when inherited
/// memory carries anything actionable. Returns `None` for fresh sessions.
#[must_use]
pub fn priming_message(memory: &SessionMemory) -> Option<String> {
    if !memory.has_inherited_context() {
        return None;
    }

    let mut message = String::from("[SYSTEM CONTEXT] ");
    if let Some(user) = memory.verified_user() {
        let _ = write!(
            message,
            "Caller verified as {} (account {}, sort code {}). ",
            user.user_name, user.account, user.sort_code
        );
    }
    if let Some(intent) = &memory.user_intent {
        let _ = write!(message, "They want: {intent}. ");
    }
    message.push_str("\nAct on the user request immediately.");
    Some(message)
}

use crate::agent::client::{AgentClient, AgentKind};
use crate::agent::prompts;
use crate::domain::claim::{ComposeResult, ComposedEmail};
use crate::orchestration::activities::ComposeInput;
use serde_json::json;

/// Tone and framing for the composer, keyed off the adjudication decision.
struct ComposePlan {
    purpose: &'static str,
    empathy: &'static str,
    call_to_action: &'static str,
}

fn plan_for_decision(decision: &str) -> ComposePlan {
    match decision {
        "APPROVED" => ComposePlan {
            purpose: "Claim Approval Notification",
            empathy: "warm",
            call_to_action: "soft",
        },
        "DENIED" => ComposePlan {
            purpose: "Claim Decision Notification",
            empathy: "highly_supportive",
            call_to_action: "soft",
        },
        "MANUAL_REVIEW" => ComposePlan {
            purpose: "Claim Status Update",
            empathy: "warm",
            call_to_action: "none",
        },
        _ => ComposePlan {
            purpose: "Additional Information Required",
            empathy: "neutral",
            call_to_action: "direct",
        },
    }
}

/// Drafts the outbound email. Composition is best-effort by contract: any
/// failure is folded into `ComposeResult::Failed` so the run can still land.
pub fn compose(agent: &AgentClient, input: &ComposeInput) -> ComposeResult {
    match try_compose(agent, input) {
        Ok(email) => ComposeResult::Composed { email },
        Err(error) => ComposeResult::Failed { error },
    }
}

fn try_compose(agent: &AgentClient, input: &ComposeInput) -> Result<ComposedEmail, String> {
    let (recipient_name, recipient_email, plan, context) = match input {
        ComposeInput::ClaimDecision {
            classification,
            adjudication,
        } => {
            let info = &classification.extracted_info;
            let name = info
                .claimant_name
                .clone()
                .unwrap_or_else(|| "Valued Customer".to_string());
            let email = info
                .claimant_email
                .clone()
                .ok_or_else(|| "no recipient email available".to_string())?;
            let plan = plan_for_decision(&adjudication.decision);
            let context = json!({
                "recipientName": name,
                "recipientEmail": email,
                "classification": classification.classification,
                "adjudication": adjudication,
            });
            (name, email, plan, context)
        }
        ComposeInput::InvoiceAck {
            parsed,
            shop_name,
            shop_email,
        } => {
            let plan = ComposePlan {
                purpose: "Invoice Received Confirmation",
                empathy: "neutral",
                call_to_action: "none",
            };
            let context = json!({
                "recipientName": shop_name,
                "recipientEmail": shop_email,
                "invoice": parsed,
            });
            (shop_name.clone(), shop_email.clone(), plan, context)
        }
    };

    let prompt = prompts::composer_prompt(
        &recipient_name,
        &recipient_email,
        plan.purpose,
        plan.empathy,
        plan.call_to_action,
        &context,
    );
    let raw = agent
        .invoke(AgentKind::EmailComposer, &prompt, &context)
        .map_err(|err| err.to_string())?;
    let mut email: ComposedEmail = serde_json::from_value(raw)
        .map_err(|err| format!("composer response did not decode: {err}"))?;
    // The agent sometimes drops or rewrites the recipient; keep ours.
    email.recipient_email = recipient_email;
    if email.recipient_name.is_none() {
        email.recipient_name = Some(recipient_name);
    }
    if email.email_subject.trim().is_empty() || email.email_body.trim().is_empty() {
        return Err("composer returned an empty subject or body".to_string());
    }
    Ok(email)
}

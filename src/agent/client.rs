use crate::agent::coerce::coerce_json;
use crate::config::AgentSettings;
use serde_json::{json, Value};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    Classifier,
    Adjudicator,
    EmailComposer,
    InvoiceParser,
}

impl AgentKind {
    pub fn agent_name(self) -> &'static str {
        match self {
            AgentKind::Classifier => "claim-assistant-agent",
            AgentKind::Adjudicator => "claim-approval-agent",
            AgentKind::EmailComposer => "notification-composer-agent",
            AgentKind::InvoiceParser => "invoice-parser-agent",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.agent_name())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("agent `{agent}` failed after {attempts} attempts: {reason}")]
    Exhausted {
        agent: String,
        attempts: u32,
        reason: String,
    },
    #[error("agent `{agent}` returned an unusable response: {reason}")]
    Malformed { agent: String, reason: String },
}

/// Thin HTTP client for the agent service. One POST per invocation, bounded
/// linear-backoff retries, and a mock mode that answers locally.
pub struct AgentClient {
    settings: AgentSettings,
}

impl AgentClient {
    pub fn new(settings: AgentSettings) -> Self {
        AgentClient { settings }
    }

    /// Sends `prompt` to the named agent and returns its response as JSON.
    /// `context` rides along for the mock responder and request metadata.
    pub fn invoke(
        &self,
        kind: AgentKind,
        prompt: &str,
        context: &Value,
    ) -> Result<Value, AgentError> {
        if self.settings.mock_mode {
            return Ok(mock_response(kind, context));
        }
        let url = format!(
            "{}/agents/{}/invoke",
            self.settings.endpoint.trim_end_matches('/'),
            kind.agent_name()
        );
        let body = json!({ "prompt": prompt, "context": context });
        let attempts = self.settings.max_attempts.max(1);
        let mut last_reason = String::new();
        for attempt in 1..=attempts {
            let mut request = ureq::post(&url).set("content-type", "application/json");
            if let Some(api_key) = &self.settings.api_key {
                request = request.set("authorization", &format!("Bearer {api_key}"));
            }
            match request.send_json(body.clone()) {
                Ok(response) => {
                    let payload: Value =
                        response
                            .into_json()
                            .map_err(|err| AgentError::Malformed {
                                agent: kind.agent_name().to_string(),
                                reason: err.to_string(),
                            })?;
                    // The service either wraps the agent text in `output` or
                    // returns the document directly.
                    return match payload.get("output").and_then(Value::as_str) {
                        Some(text) => coerce_json(text).map_err(|reason| AgentError::Malformed {
                            agent: kind.agent_name().to_string(),
                            reason,
                        }),
                        None => Ok(payload),
                    };
                }
                Err(err) => {
                    last_reason = err.to_string();
                    if attempt < attempts {
                        thread::sleep(Duration::from_millis(
                            self.settings.retry_backoff_ms * attempt as u64,
                        ));
                    }
                }
            }
        }
        Err(AgentError::Exhausted {
            agent: kind.agent_name().to_string(),
            attempts,
            reason: last_reason,
        })
    }
}

/// Percent-encodes the path component of a URL, leaving scheme, host and
/// query untouched. Attachment links frequently arrive with raw spaces.
pub fn encode_url_if_needed(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let authority_start = scheme_end + 3;
    let Some(path_offset) = url[authority_start..].find('/') else {
        return url.to_string();
    };
    let path_start = authority_start + path_offset;
    let rest = &url[path_start..];
    let (path, suffix) = match rest.find(['?', '#']) {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };
    let encoded_path = path
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("{}{}{}", &url[..path_start], encoded_path, suffix)
}

/// Canned agent answers for local runs and tests, shaped exactly like the
/// live responses.
fn mock_response(kind: AgentKind, context: &Value) -> Value {
    match kind {
        AgentKind::Classifier => {
            let claim_id = str_field(context, "claimId", "CLM-UNKNOWN");
            json!({
                "claimId": claim_id,
                "classification": {
                    "claimType": "VSC",
                    "subType": "Mechanical",
                    "componentCategory": "Transmission",
                    "urgency": "Standard"
                },
                "justification": "[MOCK] Transmission-related failure described in the email; the attached claim form confirms the repair estimate and vehicle details.",
                "confidenceScore": 0.92,
                "flags": {
                    "requiresHumanReview": false,
                    "missingInformation": [],
                    "potentialConcerns": []
                },
                "emailBodyExtraction": {
                    "claimantPhone": "555-123-4567",
                    "vehicleYear": 2022,
                    "vehicleMake": "Honda",
                    "vehicleModel": "Accord",
                    "issueSummary": "Transmission issues reported - grinding noise when shifting",
                    "repairFacility": "ABC Auto Service",
                    "totalEstimate": 767.5
                },
                "documentExtraction": {
                    "status": "success",
                    "documentType": "claim_form",
                    "summary": "[MOCK] VSC claim form with claimant, vehicle and estimate details.",
                    "extractedFields": {
                        "claimantName": "John Smith",
                        "claimantPhone": "555-987-6543",
                        "claimantAddress": "123 Main St, Tampa, FL 33601",
                        "contractNumber": "VSC-2024-78542",
                        "vehicleYear": 2022,
                        "vehicleMake": "Honda",
                        "vehicleModel": "Accord",
                        "vehicleVin": "1HGCV1F34NA000123",
                        "issueSummary": "Transmission repair needed",
                        "repairFacility": "ABC Auto Service, 123 Main St, Tampa, FL 33601",
                        "diagnosis": "Transmission solenoid failure",
                        "totalParts": 330.0,
                        "totalLabor": 437.5,
                        "totalEstimate": 767.5
                    }
                }
            })
        }
        AgentKind::Adjudicator => {
            let claim_id = str_field(context, "claimId", "CLM-UNKNOWN");
            let estimate = context
                .pointer("/repair/totalEstimate")
                .and_then(Value::as_f64)
                .unwrap_or(767.5);
            let deductible = context
                .pointer("/contract/deductible")
                .and_then(Value::as_f64)
                .unwrap_or(100.0);
            let approved = (estimate - deductible).max(0.0);
            json!({
                "claimId": claim_id,
                "decision": "APPROVED",
                "decisionType": "AUTO",
                "approvedAmount": approved,
                "deductibleApplied": deductible,
                "missingDocuments": [],
                "rulesEvaluated": ["AA-01", "AA-02", "AA-03", "AA-04"],
                "rulesPassed": ["AA-01", "AA-02", "AA-03", "AA-04"],
                "rulesFailed": [],
                "rulesTriggered": [],
                "reason": format!("[MOCK] Estimate ${estimate} is within the auto-approve threshold; approved ${approved} after ${deductible} deductible."),
                "evaluationSummary": {
                    "contractStatus": "Active",
                    "coverageValid": true,
                    "mileageValid": true,
                    "estimateAmount": estimate,
                    "autoApproveThreshold": 1500.0,
                    "withinThreshold": estimate <= 1500.0,
                    "facilityAuthorized": true,
                    "documentsComplete": true
                }
            })
        }
        AgentKind::EmailComposer => {
            let name = str_field(context, "recipientName", "Valued Customer");
            let email = str_field(context, "recipientEmail", "customer@example.com");
            json!({
                "emailSubject": "[MOCK] Update on your claim",
                "emailBody": format!("Dear {name},\n\nWe have an update on your claim. Please see the details below.\n\nRegards,\nClaims Team"),
                "recipientName": name,
                "recipientEmail": email
            })
        }
        AgentKind::InvoiceParser => {
            let invoice_id = str_field(context, "invoiceId", "INV-UNKNOWN");
            let shop = str_field(context, "shopName", "Repair Shop");
            json!({
                "invoiceId": invoice_id,
                "shopName": shop,
                "lineItems": [
                    { "description": "Transmission solenoid", "amount": 330.0 },
                    { "description": "Labor", "amount": 437.5 }
                ],
                "subtotal": 767.5,
                "tax": 0.0,
                "total": 767.5,
                "notes": "[MOCK]"
            })
        }
    }
}

fn str_field(context: &Value, key: &str, fallback: &str) -> String {
    context
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or(fallback)
        .to_string()
}

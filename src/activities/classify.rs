use crate::agent::client::{encode_url_if_needed, AgentClient, AgentKind};
use crate::agent::prompts;
use crate::domain::claim::{merge_extractions, ClaimRequest, ClassificationResult};
use crate::domain::invoice::{InvoiceRequest, ParsedInvoice};
use crate::orchestration::activities::{ActivityError, ActivityResult};
use serde_json::json;

/// Classifier stage. The agent's own merge is discarded: `extracted_info` is
/// always recomputed here so the precedence rules live in one place.
pub fn classify_claim(
    agent: &AgentClient,
    request: &ClaimRequest,
    contractor: Option<&str>,
) -> ActivityResult<ClassificationResult> {
    let attachment_url = encode_url_if_needed(&request.attachment_url);
    let prompt = prompts::classifier_prompt(request, &attachment_url);
    let context = json!({
        "claimId": request.claim_id,
        "senderEmail": request.sender_email,
        "contractor": contractor,
    });
    let raw = agent
        .invoke(AgentKind::Classifier, &prompt, &context)
        .map_err(|err| ActivityError::new(err.to_string()))?;
    let mut result: ClassificationResult = serde_json::from_value(raw)
        .map_err(|err| ActivityError::new(format!("classifier response did not decode: {err}")))?;
    result.claim_id = request.claim_id.clone();
    let document_fields = result
        .document_extraction
        .as_ref()
        .map(|doc| doc.typed_fields());
    result.extracted_info = merge_extractions(
        result.email_body_extraction.as_ref(),
        document_fields.as_ref(),
        &request.sender_email,
    );
    Ok(result)
}

pub fn parse_invoice(
    agent: &AgentClient,
    request: &InvoiceRequest,
    contractor: Option<&str>,
) -> ActivityResult<ParsedInvoice> {
    let prompt = prompts::invoice_parser_prompt(request);
    let context = json!({
        "invoiceId": request.invoice_id,
        "shopName": request.shop_name,
        "contractor": contractor,
    });
    let raw = agent
        .invoke(AgentKind::InvoiceParser, &prompt, &context)
        .map_err(|err| ActivityError::new(err.to_string()))?;
    let mut parsed: ParsedInvoice = serde_json::from_value(raw).map_err(|err| {
        ActivityError::new(format!("invoice parser response did not decode: {err}"))
    })?;
    parsed.invoice_id = request.invoice_id.clone();
    Ok(parsed)
}

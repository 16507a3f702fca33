use crate::domain::claim::ClaimRequest;
use crate::domain::invoice::InvoiceRequest;
use serde_json::Value;

/// Classifier prompt: email plus attachment, with the output contract spelled
/// out so the response coerces into `ClassificationResult`.
pub fn classifier_prompt(request: &ClaimRequest, attachment_url: &str) -> String {
    format!(
        "You are a claims classification assistant for a vehicle service contract company.\n\
         Analyze the claim email and its attachment, extract the fields from both, and\n\
         classify the claim (VSC, GAP, Tire & Wheel, PPM, Appearance Protection,\n\
         Theft Protection, or Other).\n\n\
         Claim ID: {claim_id}\n\
         Sender: {sender}\n\
         Attachment URL: {attachment}\n\n\
         Email content:\n{email}\n\n\
         Respond with a single JSON object with keys: claimId, classification\n\
         (claimType, subType, componentCategory, urgency), justification,\n\
         confidenceScore, flags (requiresHumanReview, missingInformation,\n\
         potentialConcerns), emailBodyExtraction, documentExtraction. If the\n\
         attachment cannot be read, set documentExtraction.status to \"not_accessible\".",
        claim_id = request.claim_id,
        sender = request.sender_email,
        attachment = attachment_url,
        email = request.email_content,
    )
}

/// Adjudicator prompt over the structured claim data built by
/// `build_adjudication_input`.
pub fn adjudicator_prompt(claim_id: &str, claim_data: &Value) -> String {
    let data = serde_json::to_string_pretty(claim_data).unwrap_or_else(|_| claim_data.to_string());
    format!(
        "You are a claims adjudicator. Evaluate the claim below against the\n\
         coverage rules and respond with a single JSON object with keys: claimId,\n\
         decision (APPROVED, DENIED, MANUAL_REVIEW, or REQUEST_DOCUMENTS),\n\
         decisionType, approvedAmount, deductibleApplied, missingDocuments,\n\
         rulesEvaluated, rulesPassed, rulesFailed, rulesTriggered, priority,\n\
         assignedQueue, reason, evaluationSummary.\n\n\
         Claim ID: {claim_id}\n\nClaim data:\n{data}"
    )
}

/// Composer prompt. `purpose`, `empathy` and `call_to_action` come from the
/// adjudication decision mapping.
pub fn composer_prompt(
    recipient_name: &str,
    recipient_email: &str,
    purpose: &str,
    empathy: &str,
    call_to_action: &str,
    context: &Value,
) -> String {
    let data = serde_json::to_string_pretty(context).unwrap_or_else(|_| context.to_string());
    format!(
        "You are drafting a customer notification email.\n\
         Recipient: {recipient_name} <{recipient_email}>\n\
         Purpose: {purpose}\n\
         Tone: {empathy}\n\
         Call to action: {call_to_action}\n\n\
         Context:\n{data}\n\n\
         Respond with a single JSON object with keys: emailSubject, emailBody,\n\
         recipientName, recipientEmail."
    )
}

pub fn invoice_parser_prompt(request: &InvoiceRequest) -> String {
    format!(
        "You are an invoice parsing assistant for a repair-shop billing desk.\n\
         Parse the invoice text into line items and totals.\n\n\
         Invoice ID: {invoice_id}\n\
         Shop: {shop} <{shop_email}>\n\n\
         Invoice text:\n{text}\n\n\
         Respond with a single JSON object with keys: invoiceId, shopName,\n\
         lineItems (description, amount), subtotal, tax, total, invoiceDate, notes.",
        invoice_id = request.invoice_id,
        shop = request.shop_name,
        shop_email = request.shop_email,
        text = request.invoice_text,
    )
}

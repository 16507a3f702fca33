use claimwork::agent::client::{encode_url_if_needed, AgentClient, AgentKind};
use claimwork::agent::coerce::coerce_json;
use claimwork::config::AgentSettings;
use claimwork::domain::claim::ClassificationResult;
use claimwork::domain::invoice::ParsedInvoice;
use serde_json::json;

fn mock_client() -> AgentClient {
    AgentClient::new(AgentSettings {
        endpoint: "http://127.0.0.1:1".to_string(),
        api_key: None,
        mock_mode: true,
        max_attempts: 1,
        retry_backoff_ms: 0,
    })
}

#[test]
fn agent_module_coerces_fenced_json() {
    let raw = "```json\n{\"claimId\": \"CLM-1\"}\n```";
    let value = coerce_json(raw).expect("fenced json");
    assert_eq!(value["claimId"], "CLM-1");
}

#[test]
fn agent_module_coerces_prose_wrapped_json() {
    let raw = "Here is the result you asked for: {\"decision\": \"APPROVED\"} hope it helps";
    let value = coerce_json(raw).expect("embedded object");
    assert_eq!(value["decision"], "APPROVED");
}

#[test]
fn agent_module_rejects_unusable_text() {
    let err = coerce_json("no json here at all").expect_err("no object");
    assert!(err.contains("no json here"));
}

#[test]
fn agent_module_encodes_url_path_segments() {
    assert_eq!(
        encode_url_if_needed("https://storage.example.com/claims/claim form.pdf"),
        "https://storage.example.com/claims/claim%20form.pdf"
    );
    assert_eq!(
        encode_url_if_needed("https://storage.example.com/a b/c.pdf?sig=x y"),
        "https://storage.example.com/a%20b/c.pdf?sig=x y"
    );
    // No scheme or no path: left alone.
    assert_eq!(encode_url_if_needed("claim form.pdf"), "claim form.pdf");
    assert_eq!(
        encode_url_if_needed("https://storage.example.com"),
        "https://storage.example.com"
    );
}

#[test]
fn agent_module_mock_classifier_decodes_into_domain_type() {
    let client = mock_client();
    let raw = client
        .invoke(
            AgentKind::Classifier,
            "classify",
            &json!({ "claimId": "CLM-77", "senderEmail": "john@example.com" }),
        )
        .expect("mock invoke");

    let result: ClassificationResult = serde_json::from_value(raw).expect("decode");
    assert_eq!(result.claim_id, "CLM-77");
    assert_eq!(result.classification.claim_type, "VSC");
    assert!(result.document_extraction.is_some());
}

#[test]
fn agent_module_mock_adjudicator_applies_deductible_from_context() {
    let client = mock_client();
    let raw = client
        .invoke(
            AgentKind::Adjudicator,
            "adjudicate",
            &json!({
                "claimId": "CLM-88",
                "repair": { "totalEstimate": 1000.0 },
                "contract": { "deductible": 250.0 }
            }),
        )
        .expect("mock invoke");

    assert_eq!(raw["decision"], "APPROVED");
    assert_eq!(raw["approvedAmount"], 750.0);
    assert_eq!(raw["deductibleApplied"], 250.0);
}

#[test]
fn agent_module_mock_invoice_parser_decodes_into_domain_type() {
    let client = mock_client();
    let raw = client
        .invoke(
            AgentKind::InvoiceParser,
            "parse",
            &json!({ "invoiceId": "INV-5", "shopName": "ABC Auto Service" }),
        )
        .expect("mock invoke");

    let parsed: ParsedInvoice = serde_json::from_value(raw).expect("decode");
    assert_eq!(parsed.invoice_id, "INV-5");
    assert_eq!(parsed.shop_name, "ABC Auto Service");
    assert_eq!(parsed.total, 767.5);
    assert_eq!(parsed.line_items.len(), 2);
}

#[test]
fn agent_module_names_are_stable() {
    assert_eq!(AgentKind::Classifier.agent_name(), "claim-assistant-agent");
    assert_eq!(AgentKind::Adjudicator.agent_name(), "claim-approval-agent");
    assert_eq!(
        AgentKind::EmailComposer.agent_name(),
        "notification-composer-agent"
    );
    assert_eq!(AgentKind::InvoiceParser.agent_name(), "invoice-parser-agent");
}

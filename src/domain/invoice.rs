use crate::domain::claim::{ComposeResult, DeliveryResult, FinalStatus, StageStamp};
use serde::{Deserialize, Serialize};

/// Intake payload that starts an invoice run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRequest {
    pub invoice_id: String,
    pub shop_name: String,
    pub shop_email: String,
    pub invoice_text: String,
    #[serde(default)]
    pub attachment_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLineItem {
    pub description: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedInvoice {
    pub invoice_id: String,
    pub shop_name: String,
    #[serde(default)]
    pub line_items: Vec<InvoiceLineItem>,
    #[serde(default)]
    pub subtotal: Option<f64>,
    #[serde(default)]
    pub tax: Option<f64>,
    pub total: f64,
    #[serde(default)]
    pub invoice_date: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResult {
    pub invoice_id: String,
    pub status: FinalStatus,
    #[serde(default)]
    pub parsed: Option<ParsedInvoice>,
    #[serde(default)]
    pub email: Option<ComposeResult>,
    #[serde(default)]
    pub delivery: Option<DeliveryResult>,
    pub stage_timestamps: Vec<StageStamp>,
    pub started_at: i64,
    pub completed_at: i64,
}

use crate::agent::client::{AgentClient, AgentKind};
use crate::agent::prompts;
use crate::domain::claim::{AdjudicationResult, ApprovalDecision, ClassificationResult};
use crate::orchestration::activities::{ActivityError, ActivityResult};
use crate::shared::time::utc_rfc3339;
use serde_json::{json, Value};

/// Builds the structured adjudication input. A complete `claim_data` override
/// from the reviewer wins outright; otherwise the merged classifier
/// extraction is combined with the reviewer's amounts and contract defaults.
pub fn build_adjudication_input(
    claim_id: &str,
    classification: &ClassificationResult,
    approval: &ApprovalDecision,
) -> Value {
    let class = &classification.classification;
    let metadata = |source: &str| {
        json!({
            "submissionDate": utc_rfc3339(),
            "reviewer": approval.reviewer,
            "reviewerComments": approval.comments,
            "classifierConfidence": classification.confidence_score,
            "classifierClassification": class,
            "dataSource": source,
        })
    };

    if let Some(claim_data) = &approval.claim_data {
        let section = |key: &str| claim_data.get(key).cloned().unwrap_or_else(|| json!({}));
        return json!({
            "claimId": claim_id,
            "claimant": section("claimant"),
            "contract": section("contract"),
            "vehicle": section("vehicle"),
            "repair": section("repair"),
            "documents": section("documents"),
            "metadata": metadata("reviewer_claim_data"),
        });
    }

    let info = &classification.extracted_info;
    let amounts = approval.claim_amounts.as_ref();
    let deductible = amounts.map(|a| a.deductible).unwrap_or(100.0);
    let claim_form_ok = classification
        .document_extraction
        .as_ref()
        .is_some_and(|doc| doc.status == crate::domain::claim::ExtractionStatus::Success);
    json!({
        "claimId": claim_id,
        "claimant": {
            "name": info.claimant_name,
            "email": info.claimant_email,
            "phone": info.claimant_phone,
            "address": info.claimant_address,
        },
        "contract": {
            "contractNumber": info.contract_number,
            "productType": class.claim_type,
            "coverageLevel": "Gold",
            "status": "Active",
            "deductible": deductible,
            "maxClaimAmount": 5000,
            "mileageLimit": 100000,
        },
        "vehicle": {
            "year": info.vehicle_year,
            "make": info.vehicle_make,
            "model": info.vehicle_model,
            "vin": info.vehicle_vin,
        },
        "repair": {
            "facilityName": info.repair_facility,
            "facilityType": "Authorized Dealer",
            "diagnosis": info.diagnosis,
            "issueSummary": info.issue_summary,
            "repairType": format!(
                "{} - {}",
                class.sub_type.as_deref().unwrap_or("Mechanical"),
                class.component_category.as_deref().unwrap_or("General"),
            ),
            "totalParts": amounts.map(|a| a.total_parts_cost).unwrap_or(0.0),
            "totalLabor": amounts.map(|a| a.total_labor_cost).unwrap_or(0.0),
            "totalEstimate": amounts.map(|a| a.total_estimate).unwrap_or(0.0),
        },
        "documents": {
            "damagePhotos": false,
            "claimForm": claim_form_ok,
        },
        "metadata": metadata("classifier_extraction"),
    })
}

pub fn run_adjudicator(
    agent: &AgentClient,
    claim_id: &str,
    input: &Value,
) -> ActivityResult<AdjudicationResult> {
    let prompt = prompts::adjudicator_prompt(claim_id, input);
    let raw = agent
        .invoke(AgentKind::Adjudicator, &prompt, input)
        .map_err(|err| ActivityError::new(err.to_string()))?;
    let mut result: AdjudicationResult = serde_json::from_value(raw)
        .map_err(|err| ActivityError::new(format!("adjudicator response did not decode: {err}")))?;
    result.claim_id = claim_id.to_string();
    Ok(result)
}

use claimwork::shared::ids::{validate_identifier_value, BusinessKey, StageId};

#[test]
fn ids_module_accepts_identifier_characters_only() {
    assert!(validate_identifier_value("stage id", "email_composer").is_ok());
    assert!(validate_identifier_value("stage id", "CLM-2024-001").is_ok());
    assert!(validate_identifier_value("stage id", "").is_err());
    assert!(validate_identifier_value("stage id", "has space").is_err());
    assert!(validate_identifier_value("stage id", "slash/name").is_err());
}

#[test]
fn ids_module_parse_and_display_round_trip() {
    let stage = StageId::parse("invoice_parser").expect("parse");
    assert_eq!(stage.as_str(), "invoice_parser");
    assert_eq!(stage.to_string(), "invoice_parser");

    assert!(StageId::parse("not valid!").is_err());
    assert!(BusinessKey::parse("CLM-1001").is_ok());
}

#[test]
fn ids_module_deserialization_rejects_invalid_values() {
    let ok: StageId = serde_json::from_str("\"classifier\"").expect("valid id");
    assert_eq!(ok.as_str(), "classifier");

    let err = serde_json::from_str::<StageId>("\"bad id\"").expect_err("invalid id");
    assert!(err.to_string().contains("stage id"));
}

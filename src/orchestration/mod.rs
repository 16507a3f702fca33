pub mod activities;
pub mod claim_pipeline;
pub mod error;
pub mod invoice_pipeline;
pub mod run_store;

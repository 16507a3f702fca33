pub mod claim;
pub mod invoice;

pub mod activities;
pub mod agent;
pub mod config;
pub mod domain;
pub mod orchestration;
pub mod pool;
pub mod shared;

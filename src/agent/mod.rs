pub mod client;
pub mod coerce;
pub mod prompts;

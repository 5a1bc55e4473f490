pub mod client;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod generator;
pub mod issuer;
pub mod metrics;
pub mod reporter;
pub mod scheduler;
pub mod shutdown;
pub mod utils;

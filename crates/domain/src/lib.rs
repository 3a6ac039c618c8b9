pub mod config;
pub mod context;
pub mod cost;
pub mod error;
pub mod message;
pub mod page;
pub mod stream;
pub mod trace;
pub mod workflow;

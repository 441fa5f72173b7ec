#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use
)]

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod http_client;
pub mod llm;
pub mod scrub;
pub mod types;

pub use config::Config;
pub use coordinator::Coordinator;
pub use error::ReadBotError;

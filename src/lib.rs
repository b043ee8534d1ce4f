pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod imaging;
pub mod llm;
pub mod presentation;
pub mod utils;
pub mod workflow;

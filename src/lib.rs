pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod icav2;
pub mod matching;
pub mod output;

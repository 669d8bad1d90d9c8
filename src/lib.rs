pub mod agent;
pub mod app;
pub mod config;
pub mod email;
pub mod error;
pub mod evaluator;
pub mod extractor;
pub mod notification;
pub mod prompting;
pub mod scoring;
pub mod types;

#[cfg(test)]
mod test_support;

pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod providers;
pub mod rag;
pub mod storage;
pub mod translation;
pub mod vectorstores;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};

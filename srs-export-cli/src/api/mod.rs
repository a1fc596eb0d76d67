//! SharePoint access
//!
//! Typed list rows, the collaborator traits the engine is written against,
//! and the REST client implementing them.

pub mod client;
pub mod lists;
pub mod models;
pub mod resilience;
pub mod storage;

pub use client::SharePointClient;

//! Vitalis — historical death-certificate record pipeline.
//!
//! Turns scanned certificates into one canonical JSON record store via
//! external OCR and LLM services, classifies each record's cause of
//! death by fuzzy keyword matching, and keeps a side directory plus a
//! JSON export in exact sync with the classification-positive subset.

pub mod classify;
pub mod config;
pub mod models;
pub mod pipeline;
pub mod reconcile;
pub mod scrape;
pub mod store;

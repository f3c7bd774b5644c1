//! Normalization and aggregation of public mortality datasets.
//!
//! Provider payloads (CDC mortality and demographic tables, NCHS trend data,
//! Eurostat life tables) are parsed into typed records, then filtered,
//! aggregated, ranked and summarized into chart-ready views. The binary is a
//! thin file-drop loop around [`runner`].

pub mod aggregate;
pub mod config;
pub mod dashboard;
pub mod filter;
pub mod logging;
pub mod mapping;
pub mod model;
pub mod provider_demographic;
pub mod provider_life_table;
pub mod provider_mortality;
pub mod provider_trend;
pub mod ranking;
pub mod runner;
pub mod summary;

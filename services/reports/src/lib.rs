//! Pawtrack Reports Service
//!
//! HTTP service for stray animal reports. A field reporter submits a photo
//! and GPS position; the service runs the triage engine, stores the ranked
//! record in a flat JSON file, and serves the list to the shelter dashboard
//! sorted by priority.
//!
//! ## Architecture
//!
//! ```text
//! Report form                                     Shelter dashboard
//!      │ POST /api/reports                  GET /api/reports │
//!      ▼                                                      ▲
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐    │
//! │ Reports API  │───▶│ Triage       │───▶│ Classifier   │    │
//! │ (axum)       │    │ Engine       │    │ live → sim   │    │
//! └──────────────┘    └──────────────┘    └──────────────┘    │
//!      │                                                      │
//!      ▼                                                      │
//! ┌──────────────┐                                            │
//! │ File Report  │────────────────────────────────────────────┘
//! │ Store (JSON) │
//! └──────────────┘
//! ```

pub mod api;
pub mod config;
pub mod report_store;

pub use api::{create_router, start_api_server, AppState};
pub use config::Config;
pub use report_store::{FileReportStore, NewReport, Report, StoreError};

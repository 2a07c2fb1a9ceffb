//! Alertmanager webhook receiver
//!
//! Accepts batched alert notifications on `POST /`, appends each alert to
//! the alert sink table and, after the first successful batch, sets up the
//! alerts/metrics join and alert plots on the engine.

pub mod handlers;
pub mod model;
pub mod server;
pub mod setup;

pub use handlers::{ApiError, AppState};
pub use model::{alerts_schema, AlertBatch, AlertEvent, AlertStatus, PayloadError, ALERTS_TABLE};
pub use server::{app_state, build_router, run_server};
pub use setup::{OneTimeSetup, SetupScripts};

//! Session and connection lifecycle.
//!
//! One authenticated identity ("session") is keyed by its identifier,
//! conventionally an international phone number. Per identifier there is at
//! most one live connection, held in the [`pool::ConnectionPool`] and handed
//! out exclusively by the [`manager::SessionManager`]:
//!
//! ```text
//! acquire(id) ──▶ pool hit? ──verify──▶ handle
//!                    │ miss
//!                    ▼
//!             record store load
//!                    │
//!                    ▼
//!        authentication state machine
//!        (resume, or interactive code/password dialog)
//!                    │
//!          save token, register in pool
//!                    ▼
//!                  handle
//! ```

mod auth;
mod manager;
mod pool;
pub mod reconcile;
mod types;

pub use auth::AuthFlow;
pub use manager::SessionManager;
pub use pool::ConnectionPool;
pub use reconcile::{reconcile, ProbeOutcome, ReconcileOptions, ReconcileReport};
pub use types::{canonical_session_id, Connection, ConnectionHandle};

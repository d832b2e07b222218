//! HTTP disclosure API for panel passports.
//!
//! Serves tiered projections and integrity reports straight from the
//! document store, concurrently with the background reconciliation engine.
//!
//! | Route | Purpose |
//! |---|---|
//! | `GET /entities/:id?tier=` | projection at `public` (default), `tier1`, or `tier2` |
//! | `GET /entities/:id/integrity` | recomputed hashes vs. recorded commitments |
//! | `GET /api/dpp/:id?access=` | passport-file shaped view |
//! | `GET /v1/health`, `GET /v1/info` | liveness and build info |

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ApiError, ServerError, ServerResult};
pub use router::build_router;
pub use server::DppServer;
pub use state::AppState;

//! HTTP surface of the ingestion service.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  HTTP Layer (axum handlers)                               │
//! │  - multipart upload extraction                            │
//! │  - JSON / SSE responses, `{detail}` error bodies          │
//! │  - CORS, tracing, panic recovery                          │
//! └───────────────────┬──────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────────────────┐
//! │  Ingestion Service (crate::ingestion)                     │
//! │  - format dispatch through the decoder registry           │
//! │  - bounded, timed decodes; normalization to records       │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use error::AppError;
pub use router::create_router;
pub use state::AppState;

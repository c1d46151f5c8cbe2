//! HTTP API handlers
//!
//! REST endpoints for starting, observing and cancelling training jobs, plus an SSE stream of
//! training events.

pub mod health;
pub mod sse;
pub mod training;

pub use health::health_routes;
pub use sse::event_stream;
pub use training::training_routes;

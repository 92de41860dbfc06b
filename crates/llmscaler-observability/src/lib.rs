// Copyright 2026 GPU Autoscaler Working Group

//! Tracing initialization and the `/metrics` + `/healthz` HTTP surface.

pub mod server;
pub mod span;
pub mod tracing_init;

pub use server::{serve, AppState};
pub use span::Traceable;
pub use tracing_init::init_tracing;

// Copyright 2026 GPU Autoscaler Working Group

//! Saturation-driven replica decision engine for GPU-aware LLM inference
//! autoscaling.
//!
//! The crate is organized as a pipeline: a [`metrics_source`] refreshes and
//! caches raw telemetry, a [`mapper`] joins it against known pod identity
//! into [`types::ReplicaMetric`]s, an [`analyzer`] reduces those into a
//! [`types::ModelSaturationAnalysis`], a [`selector`] turns that analysis
//! into per-variant replica targets, and [`reconcile`] drives the whole
//! pipeline on a timer per managed model. [`publisher`] exposes the
//! outcome as Prometheus metrics.

pub mod analyzer;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod managed_resource;
pub mod mapper;
pub mod metrics_source;
pub mod publisher;
pub mod query;
pub mod reconcile;
pub mod selector;
pub mod source_registry;
pub mod types;

pub use error::{Error, Result};

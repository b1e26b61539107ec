// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// src/monitoring/mod.rs - Main monitoring module

pub mod metrics;

// Re-export main types
pub use metrics::{AdmissionMetrics, StoreSizes, OUTCOME_ALLOWED};

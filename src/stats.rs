//! Failure side-channel.
//!
//! Callers of the `Option` API only see "no result". Operators still need to
//! tell "not configured" from "service down", so every detection outcome is
//! counted here and logged with its kind.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::DetectionFeature;

/// Why a detection produced no result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No API key. Never reaches the network.
    ConfigurationMissing,
    /// Network, timeout or malformed response.
    TransportFailure,
    /// The API answered with an `error` object.
    ApiError,
    /// The image could not be read from disk.
    ImageUnreadable,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::ConfigurationMissing => "configuration_missing",
            FailureKind::TransportFailure => "transport_failure",
            FailureKind::ApiError => "api_error",
            FailureKind::ImageUnreadable => "image_unreadable",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free outcome counters shared by every clone of a client.
#[derive(Debug, Default)]
pub struct DetectionStats {
    successes: AtomicU64,
    configuration_missing: AtomicU64,
    transport_failures: AtomicU64,
    api_errors: AtomicU64,
    image_unreadable: AtomicU64,
}

/// Point-in-time copy of [`DetectionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub successes: u64,
    pub configuration_missing: u64,
    pub transport_failures: u64,
    pub api_errors: u64,
    pub image_unreadable: u64,
}

impl StatsSnapshot {
    pub fn failures(&self) -> u64 {
        self.configuration_missing + self.transport_failures + self.api_errors + self.image_unreadable
    }

    pub fn count(&self, kind: FailureKind) -> u64 {
        match kind {
            FailureKind::ConfigurationMissing => self.configuration_missing,
            FailureKind::TransportFailure => self.transport_failures,
            FailureKind::ApiError => self.api_errors,
            FailureKind::ImageUnreadable => self.image_unreadable,
        }
    }
}

impl DetectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_success(&self, feature: DetectionFeature) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(feature = feature.wire_name(), "Vision detection succeeded");
    }

    pub(crate) fn record_failure(&self, feature: DetectionFeature, kind: FailureKind, detail: &str) {
        self.counter(kind).fetch_add(1, Ordering::Relaxed);
        match kind {
            // Expected on unconfigured sites; keep it quiet.
            FailureKind::ConfigurationMissing => tracing::debug!(
                kind = kind.as_str(),
                feature = feature.wire_name(),
                "Vision detection skipped: {detail}"
            ),
            _ => tracing::warn!(
                kind = kind.as_str(),
                feature = feature.wire_name(),
                "Vision detection failed: {detail}"
            ),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            successes: self.successes.load(Ordering::Relaxed),
            configuration_missing: self.configuration_missing.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            api_errors: self.api_errors.load(Ordering::Relaxed),
            image_unreadable: self.image_unreadable.load(Ordering::Relaxed),
        }
    }

    fn counter(&self, kind: FailureKind) -> &AtomicU64 {
        match kind {
            FailureKind::ConfigurationMissing => &self.configuration_missing,
            FailureKind::TransportFailure => &self.transport_failures,
            FailureKind::ApiError => &self.api_errors,
            FailureKind::ImageUnreadable => &self.image_unreadable,
        }
    }
}

//! Thread-safe metrics collection
//!
//! Atomic counters tracking link health, telemetry flow, inbound command
//! dispatch and credential churn. A snapshot is serialized into the log on
//! shutdown; there is no scrape endpoint.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Global metrics collector instance
pub static METRICS: Lazy<MetricsCollector> = Lazy::new(MetricsCollector::new);

/// Get reference to global metrics collector
pub fn metrics() -> &'static MetricsCollector {
    &METRICS
}

/// Thread-safe metrics collector using atomics
pub struct MetricsCollector {
    // Link metrics
    link_connected: AtomicBool,
    connection_attempts: AtomicU64,
    connections_established: AtomicU64,
    connection_failures: AtomicU64,
    backoff_engagements: AtomicU64,
    connection_start_time: AtomicU64,

    // Telemetry metrics
    readings_published: AtomicU64,
    publish_failures: AtomicU64,
    publish_acks: AtomicU64,

    // Inbound metrics
    messages_received: AtomicU64,
    commands_dispatched: AtomicU64,
    dispatch_failures: AtomicU64,

    // Credential metrics
    credentials_minted: AtomicU64,
    token_refreshes: AtomicU64,

    uptime_start: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        let now = current_timestamp();

        Self {
            link_connected: AtomicBool::new(false),
            connection_attempts: AtomicU64::new(0),
            connections_established: AtomicU64::new(0),
            connection_failures: AtomicU64::new(0),
            backoff_engagements: AtomicU64::new(0),
            connection_start_time: AtomicU64::new(0),
            readings_published: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            publish_acks: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            commands_dispatched: AtomicU64::new(0),
            dispatch_failures: AtomicU64::new(0),
            credentials_minted: AtomicU64::new(0),
            token_refreshes: AtomicU64::new(0),
            uptime_start: AtomicU64::new(now),
        }
    }

    // Link metrics
    pub fn connection_attempt(&self) {
        self.connection_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_established(&self) {
        self.connections_established.fetch_add(1, Ordering::Relaxed);
        self.link_connected.store(true, Ordering::Relaxed);
        self.connection_start_time
            .store(current_timestamp(), Ordering::Relaxed);
    }

    pub fn connection_failed(&self) {
        self.connection_failures.fetch_add(1, Ordering::Relaxed);
        self.link_connected.store(false, Ordering::Relaxed);
        self.connection_start_time.store(0, Ordering::Relaxed);
    }

    pub fn connection_lost(&self) {
        self.link_connected.store(false, Ordering::Relaxed);
        self.connection_start_time.store(0, Ordering::Relaxed);
    }

    pub fn backoff_engaged(&self) {
        self.backoff_engagements.fetch_add(1, Ordering::Relaxed);
    }

    // Telemetry metrics
    pub fn reading_published(&self) {
        self.readings_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn publish_failed(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn publish_acked(&self) {
        self.publish_acks.fetch_add(1, Ordering::Relaxed);
    }

    // Inbound metrics
    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_dispatched(&self) {
        self.commands_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dispatch_failed(&self) {
        self.dispatch_failures.fetch_add(1, Ordering::Relaxed);
    }

    // Credential metrics
    pub fn credential_minted(&self) {
        self.credentials_minted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn token_refreshed(&self) {
        self.token_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    fn connection_duration(&self, now: u64) -> u64 {
        if self.link_connected.load(Ordering::Relaxed) {
            let start_time = self.connection_start_time.load(Ordering::Relaxed);
            if start_time > 0 {
                now - start_time
            } else {
                0
            }
        } else {
            0
        }
    }

    // Reset all metrics (useful for testing)
    pub fn reset(&self) {
        let now = current_timestamp();
        self.link_connected.store(false, Ordering::Relaxed);
        self.connection_attempts.store(0, Ordering::Relaxed);
        self.connections_established.store(0, Ordering::Relaxed);
        self.connection_failures.store(0, Ordering::Relaxed);
        self.backoff_engagements.store(0, Ordering::Relaxed);
        self.connection_start_time.store(0, Ordering::Relaxed);
        self.readings_published.store(0, Ordering::Relaxed);
        self.publish_failures.store(0, Ordering::Relaxed);
        self.publish_acks.store(0, Ordering::Relaxed);
        self.messages_received.store(0, Ordering::Relaxed);
        self.commands_dispatched.store(0, Ordering::Relaxed);
        self.dispatch_failures.store(0, Ordering::Relaxed);
        self.credentials_minted.store(0, Ordering::Relaxed);
        self.token_refreshes.store(0, Ordering::Relaxed);
        self.uptime_start.store(now, Ordering::Relaxed);
    }

    /// Get complete metrics snapshot
    pub fn get_metrics(&self) -> MetricsSnapshot {
        let now = current_timestamp();

        MetricsSnapshot {
            link: LinkMetrics {
                connected: self.link_connected.load(Ordering::Relaxed),
                connection_attempts: self.connection_attempts.load(Ordering::Relaxed),
                connections_established: self.connections_established.load(Ordering::Relaxed),
                connection_failures: self.connection_failures.load(Ordering::Relaxed),
                backoff_engagements: self.backoff_engagements.load(Ordering::Relaxed),
                connection_duration_seconds: self.connection_duration(now),
            },
            telemetry: TelemetryMetrics {
                readings_published: self.readings_published.load(Ordering::Relaxed),
                publish_failures: self.publish_failures.load(Ordering::Relaxed),
                publish_acks: self.publish_acks.load(Ordering::Relaxed),
            },
            inbound: InboundMetrics {
                messages_received: self.messages_received.load(Ordering::Relaxed),
                commands_dispatched: self.commands_dispatched.load(Ordering::Relaxed),
                dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
            },
            credentials: CredentialMetrics {
                credentials_minted: self.credentials_minted.load(Ordering::Relaxed),
                token_refreshes: self.token_refreshes.load(Ordering::Relaxed),
            },
            uptime_seconds: now - self.uptime_start.load(Ordering::Relaxed),
            timestamp: now,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

// Public metrics structures
#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub link: LinkMetrics,
    pub telemetry: TelemetryMetrics,
    pub inbound: InboundMetrics,
    pub credentials: CredentialMetrics,
    pub uptime_seconds: u64,
    pub timestamp: u64,
}

#[derive(Debug, Serialize)]
pub struct LinkMetrics {
    pub connected: bool,
    pub connection_attempts: u64,
    pub connections_established: u64,
    pub connection_failures: u64,
    pub backoff_engagements: u64,
    pub connection_duration_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct TelemetryMetrics {
    pub readings_published: u64,
    pub publish_failures: u64,
    pub publish_acks: u64,
}

#[derive(Debug, Serialize)]
pub struct InboundMetrics {
    pub messages_received: u64,
    pub commands_dispatched: u64,
    pub dispatch_failures: u64,
}

#[derive(Debug, Serialize)]
pub struct CredentialMetrics {
    pub credentials_minted: u64,
    pub token_refreshes: u64,
}

// Helper functions
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

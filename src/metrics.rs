//! Engine Metrics
//!
//! Prometheus counters for allocation and template workflows. Each engine
//! owns its registry so that several engines can live in one process.

use crate::error::{Error, Result};
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Allocation outcome label values
pub const RESULT_ALLOCATED: &str = "allocated";
pub const RESULT_REUSED: &str = "reused";
pub const RESULT_EXHAUSTED: &str = "exhausted";
pub const RESULT_RELEASED: &str = "released";

/// Metrics of one engine instance
#[derive(Clone)]
pub struct EngineMetrics {
    registry: Registry,
    allocations: IntCounterVec,
    template_operations: IntCounterVec,
    devices_reserved: IntGauge,
}

impl std::fmt::Debug for EngineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineMetrics")
            .field("devices_reserved", &self.devices_reserved.get())
            .finish()
    }
}

impl EngineMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let allocations = IntCounterVec::new(
            Opts::new(
                "fcp_allocations_total",
                "FCP device allocation requests by result",
            ),
            &["result"],
        )
        .map_err(metrics_error)?;
        let template_operations = IntCounterVec::new(
            Opts::new(
                "fcp_template_operations_total",
                "FCP Multipath Template lifecycle operations",
            ),
            &["operation"],
        )
        .map_err(metrics_error)?;
        let devices_reserved = IntGauge::new(
            "fcp_devices_reserved",
            "FCP devices currently reserved",
        )
        .map_err(metrics_error)?;

        registry
            .register(Box::new(allocations.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(template_operations.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(devices_reserved.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            allocations,
            template_operations,
            devices_reserved,
        })
    }

    #[inline]
    pub fn record_allocation(&self, result: &str) {
        self.allocations.with_label_values(&[result]).inc();
    }

    #[inline]
    pub fn record_template_operation(&self, operation: &str) {
        self.template_operations.with_label_values(&[operation]).inc();
    }

    pub fn set_devices_reserved(&self, count: usize) {
        self.devices_reserved.set(count as i64);
    }

    pub fn allocation_count(&self, result: &str) -> u64 {
        self.allocations.with_label_values(&[result]).get()
    }

    pub fn template_operation_count(&self, operation: &str) -> u64 {
        self.template_operations.with_label_values(&[operation]).get()
    }

    pub fn devices_reserved(&self) -> i64 {
        self.devices_reserved.get()
    }

    /// Text exposition format
    pub fn encode(&self) -> Result<(String, String)> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        let body = String::from_utf8(buffer)
            .map_err(|e| Error::Internal(format!("metrics are not UTF-8: {}", e)))?;
        Ok((encoder.format_type().to_string(), body))
    }
}

fn metrics_error(e: prometheus::Error) -> Error {
    Error::Internal(format!("metrics: {}", e))
}

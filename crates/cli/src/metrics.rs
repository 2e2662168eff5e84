//! Prometheus registry for the command-line front-end.

use once_cell::sync::Lazy;
use prometheus::{Encoder, Registry, TextEncoder};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    for metric in framestrip_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
    registry
});

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

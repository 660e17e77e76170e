// ABOUTME: Delivery counters recorded through the metrics facade.
// ABOUTME: No-ops until the binary installs a recorder (Prometheus exporter).

use metrics::counter;

pub const DELIVERIES_TOTAL: &str = "relay_deliveries_total";
pub const DELIVERY_FAILURES_TOTAL: &str = "relay_delivery_failures_total";
pub const TURNS_TOTAL: &str = "relay_turns_total";
pub const BATCHES_FLUSHED_TOTAL: &str = "relay_batches_flushed_total";

/// Count a successful delivery, labelled post/update/fallback_post
pub fn record_delivery(kind: &'static str) {
    counter!(DELIVERIES_TOTAL, "kind" => kind).increment(1);
}

/// Count a post that failed and surfaced to the caller
pub fn record_delivery_failure() {
    counter!(DELIVERY_FAILURES_TOTAL).increment(1);
}

/// Count a turn started in the given delivery mode
pub fn record_turn(mode: &'static str) {
    counter!(TURNS_TOTAL, "mode" => mode).increment(1);
}

pub fn record_batch_flushed() {
    counter!(BATCHES_FLUSHED_TOTAL).increment(1);
}

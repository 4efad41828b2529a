//metrics.rs
use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_histogram_vec, Counter, Encoder, HistogramOpts, HistogramTimer,
    HistogramVec, Opts, TextEncoder,
};

lazy_static! {
    // Write metrics
    pub static ref NOTIFICATIONS_INGESTED: Counter = register_counter!(Opts::new(
        "notifications_ingested_total",
        "Total number of notifications stored"
    ))
    .unwrap();

    pub static ref NOTIFICATIONS_TOMBSTONED: Counter = register_counter!(Opts::new(
        "notifications_tombstoned_total",
        "Total number of notifications marked deleted"
    ))
    .unwrap();

    pub static ref NOTIFICATIONS_PURGED: Counter = register_counter!(Opts::new(
        "notifications_purged_total",
        "Total number of notification rows physically removed"
    ))
    .unwrap();

    pub static ref DEVICE_NAMES_UPSERTED: Counter = register_counter!(Opts::new(
        "device_names_upserted_total",
        "Total number of device name assignments"
    ))
    .unwrap();

    pub static ref DEVICE_NAMES_DELETED: Counter = register_counter!(Opts::new(
        "device_names_deleted_total",
        "Total number of device name mappings removed"
    ))
    .unwrap();

    // Timing metrics
    pub static ref STORE_OPERATION_TIME: HistogramVec = register_histogram_vec!(
        HistogramOpts::new(
            "store_operation_time_seconds",
            "Time taken by a store operation"
        )
        .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        &["operation"]
    )
    .unwrap();
}

/// Starts a latency timer for `operation`; observed when dropped.
pub fn time_operation(operation: &str) -> HistogramTimer {
    STORE_OPERATION_TIME
        .with_label_values(&[operation])
        .start_timer()
}

/// Text exposition of the default registry.
pub struct Exposition {
    pub content_type: String,
    pub body: String,
}

pub fn encode() -> anyhow::Result<Exposition> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;

    Ok(Exposition {
        content_type: encoder.format_type().to_string(),
        body: String::from_utf8(buffer)?,
    })
}

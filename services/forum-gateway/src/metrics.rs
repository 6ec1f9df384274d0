use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use lazy_static::lazy_static;

lazy_static! {
    // HTTP metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"]
    ).expect("metric can be created");

    pub static ref HTTP_REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("http_request_duration_seconds", "HTTP request duration in seconds")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["method", "path"]
    ).expect("metric can be created");

    // Ledger metrics
    pub static ref TIPS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("economy_tips_total", "Committed tips by entity kind"),
        &["entity"]
    ).expect("metric can be created");

    pub static ref COINS_TIPPED: IntCounter = IntCounter::new(
        "economy_coins_tipped_total",
        "Coins credited to entities by tips"
    ).expect("metric can be created");

    pub static ref CHECK_INS_TOTAL: IntCounter = IntCounter::new(
        "economy_check_ins_total",
        "Daily rewards granted"
    ).expect("metric can be created");

    pub static ref EXP_AWARDED: IntCounter = IntCounter::new(
        "economy_exp_awarded_total",
        "Experience points granted"
    ).expect("metric can be created");

    // Review metrics
    pub static ref SUBMISSIONS_TOTAL: IntCounter = IntCounter::new(
        "market_submissions_total",
        "App uploads queued for review"
    ).expect("metric can be created");

    pub static ref REVIEWS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("market_reviews_total", "Completed reviews by decision"),
        &["decision"]
    ).expect("metric can be created");

    pub static ref ECONOMY_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("economy_errors_total", "Failed economy operations by error code"),
        &["operation", "code"]
    ).expect("metric can be created");

    // NATS metrics
    pub static ref NATS_MESSAGES_PUBLISHED: IntCounterVec = IntCounterVec::new(
        Opts::new("nats_messages_published_total", "Total NATS messages published"),
        &["subject", "status"]
    ).expect("metric can be created");
}

/// Register all metrics with the given registry
pub fn register_metrics(registry: &Registry) -> Result<(), Box<dyn std::error::Error>> {
    // HTTP metrics
    registry.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;
    registry.register(Box::new(HTTP_REQUEST_DURATION.clone()))?;

    // Ledger metrics
    registry.register(Box::new(TIPS_TOTAL.clone()))?;
    registry.register(Box::new(COINS_TIPPED.clone()))?;
    registry.register(Box::new(CHECK_INS_TOTAL.clone()))?;
    registry.register(Box::new(EXP_AWARDED.clone()))?;

    // Review metrics
    registry.register(Box::new(SUBMISSIONS_TOTAL.clone()))?;
    registry.register(Box::new(REVIEWS_TOTAL.clone()))?;
    registry.register(Box::new(ECONOMY_ERRORS.clone()))?;

    // NATS metrics
    registry.register(Box::new(NATS_MESSAGES_PUBLISHED.clone()))?;

    Ok(())
}

/// Generate metrics output in Prometheus text format
pub fn metrics_handler() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

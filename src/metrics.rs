use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, Histogram, register_counter, register_gauge, register_histogram};


lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("notes_requests_total", "Total number of API requests").unwrap();
    pub static ref RATE_LIMITED_TOTAL: Counter =
        register_counter!("notes_rate_limited_total", "Requests rejected by the rate limiter").unwrap();
    pub static ref STORE_ERRORS_TOTAL: Counter =
        register_counter!("notes_budget_store_errors_total", "Budget store failures").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "notes_request_latency_seconds",
        "Request latency in seconds"
    )
    .unwrap();
    pub static ref NOTES_COUNT: Gauge =
        register_gauge!("notes_store_size", "Current number of notes").unwrap();
}

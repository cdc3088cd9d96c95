use metriken::*;

#[metric(
    name = "heroic_batches_sent",
    description = "The number of batch queries sent to the backend"
)]
pub static BATCHES_SENT: LazyCounter = LazyCounter::new(Counter::default);

#[metric(
    name = "heroic_request_errors",
    description = "The number of batch queries that failed before a response was decoded",
    metadata = { reason = "transport, status, cancelled or timeout" }
)]
pub static REQUEST_ERRORS: LazyCounter = LazyCounter::new(Counter::default);

#[metric(
    name = "heroic_series_decoded",
    description = "The number of series decoded from backend responses"
)]
pub static SERIES_DECODED: LazyCounter = LazyCounter::new(Counter::default);

#[metric(
    name = "heroic_points_decoded",
    description = "The number of points decoded from backend responses"
)]
pub static POINTS_DECODED: LazyCounter = LazyCounter::new(Counter::default);

#[metric(
    name = "heroic_points_missing",
    description = "The number of decoded points that carried no value"
)]
pub static POINTS_MISSING: LazyCounter = LazyCounter::new(Counter::default);

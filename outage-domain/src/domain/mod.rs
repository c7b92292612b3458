mod metric_point;
mod outage_record;

pub use metric_point::MetricPoint;
pub use outage_record::OutageRecord;

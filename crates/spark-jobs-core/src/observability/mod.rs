//! 可观测性契约：指标仪表与属性模型。
//!
//! 分布式追踪直接使用 OpenTelemetry 的 `Tracer` 契约，这里只承载指标部分，
//! 以便宿主接入任意指标后端。

pub mod attributes;
pub mod metrics;

pub use attributes::{AttributeKey, AttributeSet, KeyValue, MetricAttributeValue, OwnedAttributeSet};
pub use metrics::{
    Counter, Gauge, GlobalMetricsProviderInstalled, Histogram, InstrumentDescriptor,
    MetricsProvider, NoopMetricsProvider, global_metrics_provider,
    install_global_metrics_provider,
};

//! 仪表与属性命名契约。
//!
//! # 教案式说明
//! - **意图（Why）**：指标与 Span 名称是面向仪表盘与告警规则的公开接口，必须集中声明、保持稳定，
//!   避免散落字符串导致命名漂移。
//! - **逻辑（How）**：计数器以常量描述符声明；耗时类仪表的单位取决于配置，以 `const fn` 按单位生成描述符。
//!   [`Instruments`] 在扩展构造时一次性创建全部仪表并长期持有。
//! - **契约（What）**：主指标集统一使用 [`PREFIX`]；语义约定指标集不带前缀，耗时固定以秒为单位。

use std::sync::Arc;

use spark_jobs_core::observability::{
    Counter, Gauge, Histogram, InstrumentDescriptor, MetricsProvider,
};

use crate::config::DurationUnit;

/// 指标与 Span 名称的公共前缀。
pub const PREFIX: &str = "spark.jobs.";

/// OpenTelemetry Tracer 的名称。
pub const TRACER_NAME: &str = env!("CARGO_PKG_NAME");

/// 批量插入 Span 名称。
pub const SPAN_INSERT_MANY: &str = "spark.jobs.insert_many";
/// 任务执行 Span 名称（可追加 `/<kind>` 后缀）。
pub const SPAN_WORK: &str = "spark.jobs.work";

/// 插入的任务数量，按批次大小累加。
pub const INSERT_COUNT: InstrumentDescriptor<'static> =
    InstrumentDescriptor::new("spark.jobs.insert_count")
        .with_description("Number of jobs inserted")
        .with_unit("{job}");

/// 插入批次数量，每次调用累加 1。
pub const INSERT_MANY_COUNT: InstrumentDescriptor<'static> =
    InstrumentDescriptor::new("spark.jobs.insert_many_count")
        .with_description(
            "Number of job batches inserted (all jobs are inserted in a batch, but batches may be one job)",
        )
        .with_unit("{job_batch}");

/// 执行的任务数量。
pub const WORK_COUNT: InstrumentDescriptor<'static> =
    InstrumentDescriptor::new("spark.jobs.work_count")
        .with_description("Number of jobs worked")
        .with_unit("{job}");

/// 批量插入耗时（Gauge）。
pub const fn insert_many_duration(unit: DurationUnit) -> InstrumentDescriptor<'static> {
    InstrumentDescriptor::new("spark.jobs.insert_many_duration")
        .with_description("Duration of job batch insertion")
        .with_unit(unit.as_str())
}

/// 批量插入耗时（直方图）。
pub const fn insert_many_duration_histogram(unit: DurationUnit) -> InstrumentDescriptor<'static> {
    InstrumentDescriptor::new("spark.jobs.insert_many_duration_histogram")
        .with_description("Duration of job batch insertion (histogram)")
        .with_unit(unit.as_str())
}

/// 任务执行耗时（Gauge）。
pub const fn work_duration(unit: DurationUnit) -> InstrumentDescriptor<'static> {
    InstrumentDescriptor::new("spark.jobs.work_duration")
        .with_description("Duration of job being worked")
        .with_unit(unit.as_str())
}

/// 任务执行耗时（直方图）。
pub const fn work_duration_histogram(unit: DurationUnit) -> InstrumentDescriptor<'static> {
    InstrumentDescriptor::new("spark.jobs.work_duration_histogram")
        .with_description("Duration of job being worked (histogram)")
        .with_unit(unit.as_str())
}

/// 标签：调用结果（ok / error / panic），总是最后一个确定的属性。
pub const ATTR_STATUS: &str = "status";
pub const ATTR_ATTEMPT: &str = "attempt";
pub const ATTR_KIND: &str = "kind";
pub const ATTR_PRIORITY: &str = "priority";
pub const ATTR_QUEUE: &str = "queue";
pub const ATTR_TAG: &str = "tag";
/// 标签：工作者返回了取消错误。
pub const ATTR_CANCEL: &str = "cancel";
/// 标签：工作者返回了推迟错误。
pub const ATTR_SNOOZE: &str = "snooze";

/// 仅出现在 Span 上的高基数属性。
pub const ATTR_ID: &str = "id";
pub const ATTR_CREATED_AT: &str = "created_at";
pub const ATTR_SCHEDULED_AT: &str = "scheduled_at";

/// OpenTelemetry 消息语义约定的指标集。
pub mod semantic {
    use super::InstrumentDescriptor;

    pub const CLIENT_SENT_MESSAGES: InstrumentDescriptor<'static> =
        InstrumentDescriptor::new("messaging.client.sent.messages")
            .with_description("Number of messages producer attempted to send to the broker")
            .with_unit("{message}");

    pub const CLIENT_OPERATION_DURATION: InstrumentDescriptor<'static> =
        InstrumentDescriptor::new("messaging.client.operation.duration")
            .with_description("Duration of messaging operation initiated by a producer or consumer client")
            .with_unit("s");

    pub const CLIENT_CONSUMED_MESSAGES: InstrumentDescriptor<'static> =
        InstrumentDescriptor::new("messaging.client.consumed.messages")
            .with_description("Number of messages that were delivered to the application")
            .with_unit("{message}");

    pub const PROCESS_DURATION: InstrumentDescriptor<'static> =
        InstrumentDescriptor::new("messaging.process.duration")
            .with_description("Duration of processing operation")
            .with_unit("s");

    pub const ATTR_OPERATION_NAME: &str = "messaging.operation.name";
    pub const ATTR_SYSTEM: &str = "messaging.system";

    pub const OPERATION_INSERT_MANY: &str = "insert_many";
    pub const OPERATION_WORK: &str = "work";
    pub const SYSTEM: &str = "spark_jobs";
}

/// 扩展生命周期内复用的全部仪表。
pub(crate) struct Instruments {
    pub(crate) insert_count: Arc<dyn Counter>,
    pub(crate) insert_many_count: Arc<dyn Counter>,
    pub(crate) insert_many_duration: Arc<dyn Gauge>,
    pub(crate) insert_many_duration_histogram: Arc<dyn Histogram>,
    pub(crate) work_count: Arc<dyn Counter>,
    pub(crate) work_duration: Arc<dyn Gauge>,
    pub(crate) work_duration_histogram: Arc<dyn Histogram>,
    pub(crate) semantic: Option<SemanticInstruments>,
}

pub(crate) struct SemanticInstruments {
    pub(crate) sent_messages: Arc<dyn Counter>,
    pub(crate) operation_duration: Arc<dyn Histogram>,
    pub(crate) consumed_messages: Arc<dyn Counter>,
    pub(crate) process_duration: Arc<dyn Histogram>,
}

impl Instruments {
    pub(crate) fn new(
        provider: &dyn MetricsProvider,
        unit: DurationUnit,
        enable_semantic_metrics: bool,
    ) -> Self {
        let semantic = enable_semantic_metrics.then(|| SemanticInstruments {
            sent_messages: provider.counter(&semantic::CLIENT_SENT_MESSAGES),
            operation_duration: provider.histogram(&semantic::CLIENT_OPERATION_DURATION),
            consumed_messages: provider.counter(&semantic::CLIENT_CONSUMED_MESSAGES),
            process_duration: provider.histogram(&semantic::PROCESS_DURATION),
        });

        Self {
            insert_count: provider.counter(&INSERT_COUNT),
            insert_many_count: provider.counter(&INSERT_MANY_COUNT),
            insert_many_duration: provider.gauge(&insert_many_duration(unit)),
            insert_many_duration_histogram: provider
                .histogram(&insert_many_duration_histogram(unit)),
            work_count: provider.counter(&WORK_COUNT),
            work_duration: provider.gauge(&work_duration(unit)),
            work_duration_histogram: provider.histogram(&work_duration_histogram(unit)),
            semantic,
        }
    }
}

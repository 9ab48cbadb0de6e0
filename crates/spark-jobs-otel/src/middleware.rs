//! 遥测中间件：为插入批次与任务执行产出 Span 与指标。
//!
//! # 教案式说明
//! - **意图（Why）**：在调用链中观察一次调用的三种终止方式并如实记录，同时保证观测本身不改变控制流。
//! - **逻辑（How）**：
//!   1. 打开 Span，并把它放入 OpenTelemetry `Context`，随内层 future 一起传递，使内层扩展与工作者
//!      看到的“当前 Span”即为本 Span；
//!   2. 以 [`guarded`] 驱动内层调用，得到带标签的 [`Outcome`]；
//!   3. 收尾阶段（任何路径都会到达）计算耗时、补齐属性、最后确定 `status`，写入 Span 与指标并结束 Span；
//!   4. 通过 [`Outcome::into_result`] 还原结果，panic 以原始载荷重新抛出。
//! - **契约（What）**：
//!   - 每次调用恰好结束一个 Span；
//!   - 错误原样返回，Span 描述等于错误消息；
//!   - `status` 属性总是最后确定，其值取决于只在收尾时才可知的分类结果。
//! - **风险提示（Trade-offs）**：任务标识与时间戳只进入 Span，不进入指标，以避免指标维度基数膨胀。

use std::{fmt, sync::Arc, time::Instant};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use opentelemetry::{
    Array, Context, StringValue, Value, global,
    global::BoxedTracer,
    trace::{
        FutureExt as _, SpanKind, Status, TraceContextExt, Tracer, TracerProvider,
    },
};
use spark_jobs_core::{
    BoxError, InsertNext, InsertResult, JobCancelError, JobInsertMiddleware, JobInsertParams,
    JobRow, JobSnoozeError, Outcome, WorkNext, WorkResult, WorkerMiddleware,
    error::find_in_chain,
    guarded,
    observability::{KeyValue, MetricAttributeValue, MetricsProvider, global_metrics_provider},
};

use crate::{
    Error,
    config::{DurationUnit, TelemetryConfig},
    instruments::{
        ATTR_ATTEMPT, ATTR_CANCEL, ATTR_CREATED_AT, ATTR_ID, ATTR_KIND, ATTR_PRIORITY, ATTR_QUEUE,
        ATTR_SCHEDULED_AT, ATTR_SNOOZE, ATTR_STATUS, ATTR_TAG, Instruments, SPAN_INSERT_MANY,
        SPAN_WORK, TRACER_NAME, semantic,
    },
};

/// OpenTelemetry 遥测中间件，同时实现插入与执行两类拦截契约。
///
/// # 教案式说明
/// - **意图（Why）**：宿主安装一次即可覆盖两个拦截点，仪表在构造时一次性创建并在全部调用间共享。
/// - **结构（How）**：泛型参数 `T` 为 OpenTelemetry `Tracer`，由注入的 TracerProvider 决定；
///   指标仪表保存在内部的 `Instruments` 中。
/// - **契约（What）**：
///   - [`TelemetryMiddleware::new`] 显式接收 TracerProvider 与 MetricsProvider；
///   - [`TelemetryMiddleware::with_global_providers`] 仅供最外层装配入口使用；
///   - 配置非法时构造失败，不会产出半成品。
pub struct TelemetryMiddleware<T> {
    tracer: T,
    instruments: Instruments,
    duration_unit: DurationUnit,
    work_span_job_kind_suffix: bool,
}

impl<T> TelemetryMiddleware<T>
where
    T: Tracer + Send + Sync,
    T::Span: Send + Sync + 'static,
{
    pub fn new<P>(
        config: &TelemetryConfig,
        tracer_provider: &P,
        metrics: Arc<dyn MetricsProvider>,
    ) -> Result<Self, Error>
    where
        P: TracerProvider<Tracer = T>,
    {
        let duration_unit = config.duration_unit()?;
        let instruments = Instruments::new(
            metrics.as_ref(),
            duration_unit,
            config.enable_semantic_metrics,
        );
        tracing::debug!(
            duration_unit = %duration_unit,
            semantic_metrics = config.enable_semantic_metrics,
            work_span_job_kind_suffix = config.enable_work_span_job_kind_suffix,
            "遥测中间件已构造"
        );

        Ok(Self {
            tracer: tracer_provider.tracer(TRACER_NAME),
            instruments,
            duration_unit,
            work_span_job_kind_suffix: config.enable_work_span_job_kind_suffix,
        })
    }

    fn work_span_name(&self, job: &JobRow) -> String {
        if self.work_span_job_kind_suffix {
            format!("{SPAN_WORK}/{}", job.kind)
        } else {
            SPAN_WORK.to_owned()
        }
    }

    fn start(&self, name: String, kind: SpanKind) -> Context {
        let span = self.tracer.span_builder(name).with_kind(kind).start(&self.tracer);
        Context::current_with_span(span)
    }
}

impl TelemetryMiddleware<BoxedTracer> {
    /// 以进程级默认 Provider 构造：OpenTelemetry 全局 TracerProvider 与
    /// [`global_metrics_provider`]（未安装时为空操作实现）。
    pub fn with_global_providers(config: &TelemetryConfig) -> Result<Self, Error> {
        Self::new(config, &global::tracer_provider(), global_metrics_provider())
    }
}

impl<T> fmt::Debug for TelemetryMiddleware<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryMiddleware")
            .field("duration_unit", &self.duration_unit)
            .field("semantic_metrics", &self.instruments.semantic.is_some())
            .field("work_span_job_kind_suffix", &self.work_span_job_kind_suffix)
            .finish_non_exhaustive()
    }
}

/// 一次调用的属性集合；`status` 以具名字段保存，收尾时最后写入。
struct InvocationAttributes<'a> {
    common: Vec<KeyValue<'a>>,
    span_only: Vec<opentelemetry::KeyValue>,
}

impl<'a> InvocationAttributes<'a> {
    fn new() -> Self {
        Self {
            common: Vec::with_capacity(8),
            span_only: Vec::new(),
        }
    }

    fn for_job(job: &'a JobRow) -> Self {
        let mut attributes = Self::new();
        attributes.common.extend([
            KeyValue::new(ATTR_ATTEMPT, job.attempt),
            KeyValue::new(ATTR_KIND, job.kind.as_str()),
            KeyValue::new(ATTR_PRIORITY, job.priority),
            KeyValue::new(ATTR_QUEUE, job.queue.as_str()),
            KeyValue::new(ATTR_TAG, job.tags.as_slice()),
        ]);
        attributes.span_only.extend([
            opentelemetry::KeyValue::new(ATTR_ID, job.id),
            opentelemetry::KeyValue::new(ATTR_CREATED_AT, format_timestamp(&job.created_at)),
            opentelemetry::KeyValue::new(ATTR_SCHEDULED_AT, format_timestamp(&job.scheduled_at)),
        ]);
        attributes
    }

    /// 识别取消/推迟错误并追加布尔属性；不影响 ok/error/panic 分类。
    fn mark_special_errors(&mut self, error: Option<&BoxError>) {
        let Some(error) = error else {
            return;
        };
        let error = error.as_ref() as &(dyn std::error::Error + 'static);
        if find_in_chain::<JobCancelError>(error).is_some() {
            self.common.push(KeyValue::new(ATTR_CANCEL, true));
        }
        if find_in_chain::<JobSnoozeError>(error).is_some() {
            self.common.push(KeyValue::new(ATTR_SNOOZE, true));
        }
    }

    /// 确定 `status` 并写入 Span，返回供指标使用的完整属性。
    fn finalize<O>(mut self, cx: &Context, outcome: &Outcome<O, BoxError>) -> Vec<KeyValue<'a>> {
        let status = outcome.status();
        self.common.push(KeyValue::new(ATTR_STATUS, status.as_str()));

        let span = cx.span();
        span.set_attributes(
            self.span_only
                .into_iter()
                .chain(self.common.iter().map(to_otel_key_value)),
        );
        span.set_status(span_status(outcome));
        span.end();

        self.common
    }
}

fn span_status<O>(outcome: &Outcome<O, BoxError>) -> Status {
    match outcome {
        Outcome::Panic(_) => Status::error("panic"),
        Outcome::Error(err) => Status::error(err.to_string()),
        Outcome::Success(_) => Status::Ok,
    }
}

fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn to_otel_key_value(kv: &KeyValue<'_>) -> opentelemetry::KeyValue {
    let value = match &kv.value {
        MetricAttributeValue::Text(text) => Value::from(text.to_string()),
        MetricAttributeValue::TextArray(items) => Value::Array(Array::String(
            items.iter().cloned().map(StringValue::from).collect(),
        )),
        MetricAttributeValue::Bool(flag) => Value::Bool(*flag),
        MetricAttributeValue::F64(number) => Value::F64(*number),
        MetricAttributeValue::I64(number) => Value::I64(*number),
        other => Value::from(format!("{other:?}")),
    };
    opentelemetry::KeyValue::new(kv.key.to_string(), value)
}

fn semantic_attributes(operation: &'static str) -> [KeyValue<'static>; 2] {
    [
        KeyValue::new(semantic::ATTR_OPERATION_NAME, operation),
        KeyValue::new(semantic::ATTR_SYSTEM, semantic::SYSTEM),
    ]
}

#[async_trait]
impl<T> JobInsertMiddleware for TelemetryMiddleware<T>
where
    T: Tracer + Send + Sync,
    T::Span: Send + Sync + 'static,
{
    async fn insert_many(&self, params: &[JobInsertParams], next: InsertNext<'_>) -> InsertResult {
        let cx = self.start(SPAN_INSERT_MANY.to_owned(), SpanKind::Producer);
        let begin = Instant::now();

        let outcome = guarded(next.run().with_context(cx.clone())).await;

        let elapsed = begin.elapsed();
        let attributes = InvocationAttributes::new().finalize(&cx, &outcome);
        let duration = self.duration_unit.convert(elapsed);
        let batch_size = params.len() as u64;

        let metrics = &self.instruments;
        metrics.insert_count.add(batch_size, &attributes);
        metrics.insert_many_count.add(1, &attributes);
        metrics.insert_many_duration.set(duration, &attributes);
        metrics
            .insert_many_duration_histogram
            .record(duration, &attributes);
        if let Some(semantic_metrics) = &metrics.semantic {
            let fixed = semantic_attributes(semantic::OPERATION_INSERT_MANY);
            semantic_metrics.sent_messages.add(batch_size, &fixed);
            semantic_metrics
                .operation_duration
                .record(elapsed.as_secs_f64(), &fixed);
        }

        outcome.into_result()
    }
}

#[async_trait]
impl<T> WorkerMiddleware for TelemetryMiddleware<T>
where
    T: Tracer + Send + Sync,
    T::Span: Send + Sync + 'static,
{
    async fn work(&self, job: &JobRow, next: WorkNext<'_>) -> WorkResult {
        let cx = self.start(self.work_span_name(job), SpanKind::Consumer);
        let begin = Instant::now();

        let outcome = guarded(next.run().with_context(cx.clone())).await;

        let elapsed = begin.elapsed();
        let mut attributes = InvocationAttributes::for_job(job);
        attributes.mark_special_errors(outcome.error());
        let attributes = attributes.finalize(&cx, &outcome);
        let duration = self.duration_unit.convert(elapsed);

        let metrics = &self.instruments;
        metrics.work_count.add(1, &attributes);
        metrics.work_duration.set(duration, &attributes);
        metrics.work_duration_histogram.record(duration, &attributes);
        if let Some(semantic_metrics) = &metrics.semantic {
            let fixed = semantic_attributes(semantic::OPERATION_WORK);
            semantic_metrics.consumed_messages.add(1, &fixed);
            semantic_metrics
                .process_duration
                .record(elapsed.as_secs_f64(), &fixed);
        }

        outcome.into_result()
    }
}

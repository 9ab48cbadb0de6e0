use std::sync::Arc;

use futures::executor::block_on;
use opentelemetry::trace::Status;
use spark_jobs_core::{
    BoxError, JobRow, MiddlewareStack, NilableError, WorkNext, WorkResult,
    observability::MetricAttributeValue, test_stubs::RecordingMetricsProvider,
};
use spark_jobs_middleware::{
    NilErrorDetected, NilErrorHook, PanicError, PanicToErrorMiddleware,
};
use spark_jobs_otel::{
    TelemetryConfig, TelemetryMiddleware,
    instruments::{ATTR_STATUS, WORK_COUNT},
    testing,
};

fn explode() -> WorkResult {
    panic!("ledger offline")
}

/// 验证遥测位于 panic 归一化外侧时看到的是错误而不是 panic。
///
/// # 教案式说明
/// - **测试目标（Why）**：扩展按安装顺序包裹，归一化在内侧时应把 panic 变成普通错误交给外层。
/// - **测试设计（How）**：以 `MiddlewareStack` 依次安装遥测与归一化，宿主工作者直接 panic。
/// - **验收契约（What）**：调用返回 `PanicError`；Span 状态为错误描述而非 `panic`；计数器状态为 `error`。
#[test]
fn telemetry_outside_normalization_records_error() {
    let exporter = testing::InMemorySpanExporter::default();
    let provider = testing::tracer_provider(&exporter);
    let metrics = RecordingMetricsProvider::new();
    let telemetry =
        TelemetryMiddleware::new(&TelemetryConfig::default(), &provider, Arc::new(metrics.clone()))
            .expect("默认配置应构造成功");

    let stack = MiddlewareStack::new()
        .with_worker_middleware(Arc::new(telemetry))
        .with_worker_middleware(Arc::new(PanicToErrorMiddleware::default()));

    let job = JobRow::new(9, "settle", "default");
    let err = block_on(stack.work(&job, WorkNext::new(|| async { explode() })))
        .expect_err("panic 应被转换为错误返回");
    assert!(PanicError::is(err.as_ref()), "返回值应为 PanicError");

    let spans = testing::finished_spans(&provider, &exporter);
    assert_eq!(spans.len(), 1, "应恰好导出一个执行 Span");
    match &spans[0].status {
        Status::Error { description } => {
            assert!(
                description.starts_with("PanicError: ledger offline"),
                "Span 描述应为转换后的错误文本，实际为 {description}"
            );
        }
        other => panic!("Span 状态应为错误，实际为 {other:?}"),
    }

    let counted = metrics.events_named(WORK_COUNT.name);
    assert_eq!(counted.len(), 1);
    assert_eq!(
        counted[0].attributes.get(ATTR_STATUS),
        Some(&MetricAttributeValue::from("error")),
        "外层遥测应把结果记为 error"
    );
}

/// 验证缺陷检测钩子在宿主返回后、外层中间件之前运行。
#[test]
fn work_end_hook_reports_defect_to_outer_layers() {
    let exporter = testing::InMemorySpanExporter::default();
    let provider = testing::tracer_provider(&exporter);
    let metrics = RecordingMetricsProvider::new();
    let telemetry =
        TelemetryMiddleware::new(&TelemetryConfig::default(), &provider, Arc::new(metrics.clone()))
            .expect("默认配置应构造成功");

    let stack = MiddlewareStack::new()
        .with_worker_middleware(Arc::new(telemetry))
        .with_work_end_hook(Arc::new(NilErrorHook::default()));

    let job = JobRow::new(10, "settle", "default");
    let err = block_on(stack.work(
        &job,
        WorkNext::new(|| async {
            let err: BoxError = Box::new(NilableError::<std::fmt::Error>::nil());
            Err(err)
        }),
    ))
    .expect_err("空值错误应以缺陷错误返回");

    let detected = err
        .downcast_ref::<NilErrorDetected>()
        .expect("应返回 NilErrorDetected");
    assert!(detected.message().ends_with("(*fmt.Error)(<nil>)"));

    let spans = testing::finished_spans(&provider, &exporter);
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].status, Status::error(detected.message().to_owned()));
}

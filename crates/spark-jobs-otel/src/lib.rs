#![deny(unsafe_code)]
#![doc = "spark-jobs-otel: 任务插入与执行的 OpenTelemetry 追踪与指标扩展。"]

//! # 教案式说明
//! - **意图（Why）**：为每个插入批次与每次任务执行产出一个 Span 以及一组计数器/Gauge/直方图，
//!   让宿主在不修改工作者代码的前提下获得吞吐、耗时与失败分布。
//! - **逻辑（How）**：[`TelemetryMiddleware`] 同时实现插入与执行两类拦截契约；追踪走 OpenTelemetry `Tracer`，
//!   指标走 `spark-jobs-core` 的 [`MetricsProvider`](spark_jobs_core::observability::MetricsProvider) 契约。
//! - **契约（What）**：遥测永不改变控制流：错误原样返回，panic 在记录后以原始载荷重新抛出。
//!
//! 其余出口：[`subscriber::install`] 负责把 `tracing` 日志桥接到 OpenTelemetry；
//! `testing` 模块（特性 `test-util`）提供内存 Span 导出器。

pub mod config;
pub mod instruments;
pub mod middleware;
pub mod subscriber;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use config::{DurationUnit, TelemetryConfig};
pub use middleware::TelemetryMiddleware;

/// spark-jobs-otel 构造与安装过程可能出现的错误。
///
/// # 教案式说明
/// - **意图（Why）**：配置错误必须在构造阶段立即暴露，绝不产出半成品扩展；安装错误需要区分“重复安装”
///   与“外部已占用全局 Subscriber”，便于启动流程给出准确提示。
/// - **契约（What）**：所有变体实现 [`std::error::Error`]，可直接交给上层错误框架处理。
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// 时长单位只接受 `s` 与 `ms`。
    #[error("不支持的时长单位 `{0}`，仅支持 `s` 或 `ms`")]
    InvalidDurationUnit(String),
    /// [`subscriber::install`] 被重复调用。
    #[error("spark-jobs-otel 已完成安装，禁止重复调用 install")]
    AlreadyInstalled,
    /// 外部提前设置了全局 `tracing` Subscriber。
    #[error("全局 tracing Subscriber 已存在，spark-jobs-otel 无法覆盖")]
    SubscriberAlreadySet,
    /// 设置全局 Subscriber 失败的底层错误。
    #[error("设置 tracing 全局 Subscriber 失败: {0}")]
    SetGlobalSubscriber(#[from] tracing::dispatcher::SetGlobalDefaultError),
}

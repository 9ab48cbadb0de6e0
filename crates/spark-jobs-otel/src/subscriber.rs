//! 把 `tracing` 日志与 Span 桥接到 OpenTelemetry 的一次性安装入口。
//!
//! # 教案式说明
//! - **意图（Why）**：扩展内部通过 `tracing` 宏输出诊断日志；宿主调用一次 [`install`] 即可让这些日志
//!   带上当前 Span 上下文并输出到终端，同时把 Provider 注册为 OpenTelemetry 全局默认值，
//!   供 [`TelemetryMiddleware::with_global_providers`](crate::TelemetryMiddleware::with_global_providers) 取用。
//! - **逻辑（How）**：
//!   1. 拒绝重复安装或覆盖外部已设置的 Subscriber；
//!   2. 将 Provider 注册到 `opentelemetry::global`；
//!   3. 使用 `tracing-subscriber` 组装 `EnvFilter + fmt + OpenTelemetry` Layer 并设置为全局 Subscriber；
//!   4. 保存 Provider，确保其在进程生命周期内保持有效。
//! - **契约（What）**：多次调用返回 [`Error::AlreadyInstalled`]；外部已配置 Subscriber 时返回
//!   [`Error::SubscriberAlreadySet`]。日志级别读取 `RUST_LOG`，缺省为 `info`。

use std::sync::OnceLock;

use opentelemetry::{global, trace::TracerProvider as _};
use opentelemetry_sdk::trace::TracerProvider;
use tracing::dispatcher;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt};

use crate::{Error, instruments::TRACER_NAME};

/// 安装状态的全局缓存，确保 `install` 仅执行一次。
static INSTALL_STATE: OnceLock<TracerProvider> = OnceLock::new();

/// 安装全局 `tracing` Subscriber 并登记 OpenTelemetry 全局 TracerProvider。
pub fn install(provider: TracerProvider) -> Result<(), Error> {
    if INSTALL_STATE.get().is_some() {
        return Err(Error::AlreadyInstalled);
    }
    if dispatcher::has_been_set() {
        return Err(Error::SubscriberAlreadySet);
    }

    global::set_tracer_provider(provider.clone());
    let tracer = provider.tracer(TRACER_NAME);

    let subscriber = tracing_subscriber::registry()
        .with(build_env_filter())
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_opentelemetry::layer().with_tracer(tracer));
    tracing::subscriber::set_global_default(subscriber)?;

    INSTALL_STATE
        .set(provider)
        .map_err(|_| Error::AlreadyInstalled)
}

/// 刷新已安装 Provider 中尚未导出的 Span；未安装时为空操作。
pub fn force_flush() {
    if let Some(provider) = INSTALL_STATE.get() {
        for result in provider.force_flush() {
            if let Err(err) = result {
                tracing::debug!(error = %err, "刷新 TracerProvider 失败");
            }
        }
    }
}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

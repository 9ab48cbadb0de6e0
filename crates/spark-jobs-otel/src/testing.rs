//! 测试辅助工具：收集已完成 Span 的内存导出器。
//!
//! # 教案式说明
//! - **意图（Why）**：只保留“收集已完成 Span 供断言”这一能力，避免 `opentelemetry-sdk/testing`
//!   间接启用额外的异步运行时依赖。
//! - **逻辑（How）**：[`InMemorySpanExporter`] 以 `Arc<Mutex<Vec<SpanData>>>` 保存导出结果；
//!   [`tracer_provider`] 用同步导出器组装一个全采样的 Provider，每个测试各自持有，互不干扰。
//! - **契约（What）**：仅在 `cfg(test)` 或特性 `test-util` 下编译，不参与生产构建。

use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use opentelemetry::trace::{TraceError, TraceResult};
use opentelemetry_sdk::{
    export::trace::{ExportResult, SpanData, SpanExporter},
    trace::{self, Sampler, TracerProvider},
};

/// 内存 Span 导出器。
///
/// - `get_finished_spans`：返回当前缓冲快照；锁被毒化时返回错误；
/// - `reset`：清空缓存；
/// - `SpanExporter::export`：接收一批已完成 Span，追加成功即返回 `Ok(())`。
#[derive(Clone, Debug, Default)]
pub struct InMemorySpanExporter {
    spans: Arc<Mutex<Vec<SpanData>>>,
}

impl InMemorySpanExporter {
    /// 返回当前已收集的 Span 数据副本，供断言使用。
    pub fn get_finished_spans(&self) -> TraceResult<Vec<SpanData>> {
        self.spans
            .lock()
            .map(|guard| guard.iter().cloned().collect())
            .map_err(TraceError::from)
    }

    /// 清空内部缓冲，确保多轮测试之间互不干扰。
    pub fn reset(&self) {
        if let Ok(mut guard) = self.spans.lock() {
            guard.clear();
        }
    }
}

impl SpanExporter for InMemorySpanExporter {
    fn export(&mut self, mut batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        let result = self
            .spans
            .lock()
            .map(|mut guard| guard.append(&mut batch))
            .map_err(TraceError::from);

        Box::pin(async move { result })
    }

    fn shutdown(&mut self) {
        self.reset();
    }
}

/// 构造把 Span 同步写入 `exporter` 的 Provider。
pub fn tracer_provider(exporter: &InMemorySpanExporter) -> TracerProvider {
    TracerProvider::builder()
        .with_config(trace::config().with_sampler(Sampler::AlwaysOn))
        .with_simple_exporter(exporter.clone())
        .build()
}

/// 强制刷新 Provider 后读取导出器中的 Span。
pub fn finished_spans(provider: &TracerProvider, exporter: &InMemorySpanExporter) -> Vec<SpanData> {
    for result in provider.force_flush() {
        if let Err(err) = result {
            tracing::debug!(error = %err, "刷新测试 TracerProvider 失败");
        }
    }
    exporter.get_finished_spans().unwrap_or_default()
}

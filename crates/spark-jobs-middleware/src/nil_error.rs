//! 空值错误缺陷检测。
//!
//! # 教案式说明
//! - **意图（Why）**：工作者把尚未赋值的 `Option<E>` 包装成 [`NilableError`](spark_jobs_core::NilableError)
//!   直接返回时，宿主只看到“有错误”，任务被无端重试直至耗尽。该钩子在执行结束时识别这一形态，
//!   要么替换为说明问题的 [`NilErrorDetected`]，要么记录一条告警后视为成功。
//! - **逻辑（How）**：只检查工作者返回错误本身的 `source()` 是否为
//!   [`NilPointer`](spark_jobs_core::NilPointer)；更深层链路中的空值不在判断范围内。
//! - **契约（What）**：
//!   - 成功或普通错误原样透传；
//!   - `suppress = false`（默认）：返回 `NilErrorDetected`；
//!   - `suppress = true`：输出一条 `warn` 日志 `nil_error: Got <message>`，返回 `Ok(())`。
//! - **风险提示（Trade-offs）**：抑制模式会把真实失败吞掉，仅适合在排查期间临时开启。

use async_trait::async_trait;
use serde::Deserialize;
use spark_jobs_core::{
    JobRow, WorkEndHook, WorkNext, WorkResult, WorkerMiddleware, error::nil_pointer_of,
};

const HOOK_NAME: &str = "nil_error";

const DEFECT_PREFIX: &str = "non-nil error containing nil internal value; probably a bug: ";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NilErrorConfig {
    /// 为真时记录告警并把结果改写为成功，而不是返回缺陷错误。
    pub suppress: bool,
}

/// 检测到空值错误时返回给宿主的错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct NilErrorDetected {
    message: String,
}

impl NilErrorDetected {
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// 空值错误检测钩子，可作为 [`WorkEndHook`] 或 [`WorkerMiddleware`] 安装。
#[derive(Clone, Debug, Default)]
pub struct NilErrorHook {
    config: NilErrorConfig,
}

impl NilErrorHook {
    pub fn new(config: NilErrorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NilErrorConfig {
        &self.config
    }

    /// 检查一次执行结果。
    pub fn inspect(&self, job: &JobRow, result: WorkResult) -> WorkResult {
        let err = match result {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };
        let Some(nil) = nil_pointer_of(err.as_ref()) else {
            return Err(err);
        };

        let message = format!("{DEFECT_PREFIX}{}", nil.describe());
        if self.config.suppress {
            tracing::warn!(job_id = job.id, kind = %job.kind, "{HOOK_NAME}: Got {message}");
            return Ok(());
        }
        Err(Box::new(NilErrorDetected { message }))
    }
}

impl WorkEndHook for NilErrorHook {
    fn work_end(&self, job: &JobRow, result: WorkResult) -> WorkResult {
        self.inspect(job, result)
    }
}

#[async_trait]
impl WorkerMiddleware for NilErrorHook {
    async fn work(&self, job: &JobRow, next: WorkNext<'_>) -> WorkResult {
        let result = next.run().await;
        self.inspect(job, result)
    }
}

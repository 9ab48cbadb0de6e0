//! panic 归一化中间件。
//!
//! # 教案式说明
//! - **意图（Why）**：宿主对 panic 的默认处理往往只留下一行载荷文本，难以定位。该中间件把工作者中的
//!   panic 转换为普通错误 [`PanicError`]，同时带上 panic 现场的调用栈快照，交给宿主的常规错误路径。
//! - **逻辑（How）**：在“已武装”的采集范围内、`catch_unwind` 之下驱动内层；发生 panic 时取回
//!   [`capture`] 模块在 panic 钩子中为同一载荷记录的帧，与原始载荷一起组装为 `PanicError` 返回；
//!   没有对应快照（如 `resume_unwind` 重新抛出）时在捕获处采集。
//! - **契约（What）**：
//!   - 正常返回（成功或错误）原样透传；
//!   - panic 的载荷保持原值，可通过 [`PanicError::downcast_cause`] 或 [`PanicError::into_cause`] 取回；
//!   - 安装在遥测扩展内侧时，遥测看到的是错误而非 panic。
//! - **风险提示（Trade-offs）**：调用栈依赖调试符号；剥离符号的发布构建中快照可能为空。

mod capture;

use std::{
    any::Any,
    error::Error as StdError,
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use serde::Deserialize;
use spark_jobs_core::{
    JobRow, Outcome, WorkNext, WorkResult, WorkerMiddleware,
    error::find_in_chain,
    guarded,
    outcome::{PanicPayload, panic_message},
};

use capture::{Armed, take_captured};

pub use capture::{BacktraceCapture, FrameCapture, MAX_FRAMES, StackFrame};

/// 归一化中间件的配置；当前没有可调项，保留以便宿主统一从配置文件加载。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PanicToErrorConfig {}

/// 由 panic 转换而来的错误。
///
/// `Display` 输出 `PanicError: <载荷>`，随后每帧一行函数名、一行缩进的 `文件:行号`。
/// 任意两个 `PanicError` 视为相等：比较的是错误种类而非内容。
pub struct PanicError {
    cause: Mutex<PanicPayload>,
    message: String,
    trace: Vec<StackFrame>,
}

impl PanicError {
    pub fn new(cause: PanicPayload, trace: Vec<StackFrame>) -> Self {
        let message = panic_message(cause.as_ref());
        Self {
            cause: Mutex::new(cause),
            message,
            trace,
        }
    }

    /// 载荷的文本形式；非字符串载荷为占位描述。
    pub fn cause_message(&self) -> &str {
        &self.message
    }

    /// 以具体类型读取载荷副本。
    pub fn downcast_cause<T>(&self) -> Option<T>
    where
        T: Any + Clone,
    {
        let cause = self.cause.lock().unwrap_or_else(PoisonError::into_inner);
        cause.downcast_ref::<T>().cloned()
    }

    /// 取回原始载荷。
    pub fn into_cause(self) -> PanicPayload {
        self.cause.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    /// panic 现场的调用栈，第一帧为触发 panic 的函数。
    pub fn trace(&self) -> &[StackFrame] {
        &self.trace
    }

    /// 判断错误链中是否存在 `PanicError`。
    pub fn is(err: &(dyn StdError + 'static)) -> bool {
        find_in_chain::<PanicError>(err).is_some()
    }
}

impl fmt::Display for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PanicError: {}", self.message)?;
        for frame in &self.trace {
            writeln!(f, "{frame}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanicError")
            .field("cause", &self.message)
            .field("frames", &self.trace.len())
            .finish()
    }
}

impl StdError for PanicError {}

impl PartialEq for PanicError {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for PanicError {}

/// 把工作者 panic 转换为 [`PanicError`] 的执行中间件。
pub struct PanicToErrorMiddleware {
    capture: Arc<dyn FrameCapture>,
}

impl PanicToErrorMiddleware {
    pub fn new(config: PanicToErrorConfig) -> Self {
        Self::with_capture(config, Arc::new(BacktraceCapture))
    }

    /// 使用自定义的调用栈采集能力。
    pub fn with_capture(_config: PanicToErrorConfig, capture: Arc<dyn FrameCapture>) -> Self {
        Self { capture }
    }
}

impl Default for PanicToErrorMiddleware {
    fn default() -> Self {
        Self::new(PanicToErrorConfig::default())
    }
}

impl fmt::Debug for PanicToErrorMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanicToErrorMiddleware").finish_non_exhaustive()
    }
}

#[async_trait]
impl WorkerMiddleware for PanicToErrorMiddleware {
    async fn work(&self, job: &JobRow, next: WorkNext<'_>) -> WorkResult {
        let armed = Armed::new(next.run(), Arc::clone(&self.capture));
        match guarded(armed).await {
            Outcome::Panic(payload) => {
                let cause = panic_message(payload.as_ref());
                // 重新抛出的 panic 不经过钩子，退回到在捕获处采集。
                let trace =
                    take_captured(&cause).unwrap_or_else(|| self.capture.capture(MAX_FRAMES));
                let err = PanicError::new(payload, trace);
                tracing::debug!(
                    job_id = job.id,
                    kind = %job.kind,
                    cause = err.cause_message(),
                    frames = err.trace().len(),
                    "panic 已转换为错误"
                );
                Err(Box::new(err))
            }
            outcome => outcome.into_result(),
        }
    }
}

//! 宿主任务队列在拦截点上传入的数据模型。
//!
//! # 教案式说明
//! - **意图（Why）**：扩展只读取任务记录上的少量字段（标识、类型、队列、尝试次数、优先级、标签、时间戳），
//!   但为了让宿主可以直接传入自身的任务行，这里保留与宿主记录一致的完整形态。
//! - **契约（What）**：本模块的类型不会被扩展修改或持久化；调用入口创建、调用出口丢弃。
//! - **取舍（Trade-offs）**：`args` 以 `serde_json::Value` 承载，避免把宿主的参数类型泛型化到整个契约。

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BoxError;

/// 任务在宿主队列中的生命周期状态。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Available,
    Cancelled,
    Completed,
    Discarded,
    Pending,
    Retryable,
    Running,
    Scheduled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Available => "available",
            JobState::Cancelled => "cancelled",
            JobState::Completed => "completed",
            JobState::Discarded => "discarded",
            JobState::Pending => "pending",
            JobState::Retryable => "retryable",
            JobState::Running => "running",
            JobState::Scheduled => "scheduled",
        }
    }
}

/// 一次执行所针对的任务记录。
///
/// # 字段说明（What）
/// - `attempt`：当前为第几次尝试，从 1 开始；
/// - `tags`：宿主附加的低基数标签，指标中以字符串列表形式出现；
/// - `created_at` / `scheduled_at`：仅进入 Span 属性，避免指标维度基数膨胀。
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JobRow {
    pub id: i64,
    pub kind: String,
    pub queue: String,
    pub attempt: i32,
    pub max_attempts: i32,
    pub priority: i16,
    pub tags: Vec<String>,
    pub state: JobState,
    pub args: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
}

impl JobRow {
    /// 以最少字段构造任务记录，其余字段取默认值。
    pub fn new(id: i64, kind: impl Into<String>, queue: impl Into<String>) -> Self {
        Self {
            id,
            kind: kind.into(),
            queue: queue.into(),
            attempt: 1,
            ..Self::default()
        }
    }
}

/// 批量插入中的单条插入请求。
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JobInsertParams {
    pub kind: String,
    pub queue: String,
    pub priority: i16,
    pub max_attempts: i32,
    pub tags: Vec<String>,
    pub args: serde_json::Value,
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl JobInsertParams {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }
}

/// 单条插入请求的结果。
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JobInsertResult {
    pub job: JobRow,
    /// 唯一性约束命中时，宿主跳过插入并返回已有任务。
    pub unique_skipped_as_duplicate: bool,
}

/// 工作者主动取消任务时返回的错误。
///
/// # 教案式说明
/// - **意图（Why）**：宿主据此把任务直接置为 `cancelled`，不再重试；遥测扩展据此追加 `cancel=true` 属性。
/// - **契约（What）**：可被任意层级的错误包装，识别方需沿 [`std::error::Error::source`] 链查找。
#[derive(Debug, thiserror::Error)]
#[error("JobCancelError: {inner}")]
pub struct JobCancelError {
    #[source]
    inner: BoxError,
}

impl JobCancelError {
    pub fn new(inner: impl Into<BoxError>) -> Self {
        Self {
            inner: inner.into(),
        }
    }
}

/// 工作者要求推迟执行时返回的错误，`duration` 为推迟时长。
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("JobSnoozeError: {duration:?}")]
pub struct JobSnoozeError {
    pub duration: Duration,
}

impl JobSnoozeError {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

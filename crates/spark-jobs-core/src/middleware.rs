//! 拦截契约：批量插入与单任务执行两类扩展点。
//!
//! # 教案式说明
//! - **意图（Why）**：扩展以“包裹下一层”的方式组合，宿主只需按安装顺序构造调用链，
//!   扩展之间互不知晓对方存在。
//! - **逻辑（How）**：每个扩展收到操作输入与一次性续体 [`Next`]；调用 [`Next::run`] 即进入下一层，
//!   不调用则后续扩展与宿主实现都不会执行。
//! - **契约（What）**：
//!   - [`Next`] 以值传递并在 `run` 时被消费，“至多调用一次”由类型系统保证；
//!   - 扩展不得引入额外并发，返回的 future 需满足 `Send`，以便宿主在多线程执行器上驱动；
//!   - 宿主上下文（分布式追踪上下文等）随 future 环境传递，不出现在方法签名中。
//! - **风险提示（Trade-offs）**：续体被装箱为 trait 对象，每层多一次堆分配；相对任务本身的 I/O 成本可忽略。

use std::{fmt, future::Future};

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::{
    error::BoxError,
    job::{JobInsertParams, JobInsertResult, JobRow},
};

/// 批量插入的返回值：与输入一一对应的插入结果。
pub type InsertResult = Result<Vec<JobInsertResult>, BoxError>;

/// 单任务执行的返回值。
pub type WorkResult = Result<(), BoxError>;

/// 一次性续体，代表调用链中的下一层。
pub struct Next<'a, T> {
    call: Box<dyn FnOnce() -> BoxFuture<'a, T> + Send + 'a>,
}

impl<'a, T> Next<'a, T> {
    pub fn new<F, Fut>(call: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = T> + Send + 'a,
    {
        Self {
            call: Box::new(move || Box::pin(call())),
        }
    }

    /// 进入下一层；续体随之被消费。
    pub fn run(self) -> BoxFuture<'a, T> {
        (self.call)()
    }
}

impl<T> fmt::Debug for Next<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

/// 批量插入的续体。
pub type InsertNext<'a> = Next<'a, InsertResult>;

/// 单任务执行的续体。
pub type WorkNext<'a> = Next<'a, WorkResult>;

/// 批量插入拦截契约。
#[async_trait]
pub trait JobInsertMiddleware: Send + Sync {
    async fn insert_many(&self, params: &[JobInsertParams], next: InsertNext<'_>) -> InsertResult;
}

/// 单任务执行拦截契约。
///
/// # 契约（What）
/// - `job` 在整个调用期间只读；
/// - 返回值即为宿主看到的执行结果，扩展可以替换它，但除非职责明确要求，否则应原样透传。
#[async_trait]
pub trait WorkerMiddleware: Send + Sync {
    async fn work(&self, job: &JobRow, next: WorkNext<'_>) -> WorkResult;
}

/// 执行结束钩子：在工作者返回后、外层中间件看到结果前运行。
pub trait WorkEndHook: Send + Sync {
    fn work_end(&self, job: &JobRow, result: WorkResult) -> WorkResult;
}

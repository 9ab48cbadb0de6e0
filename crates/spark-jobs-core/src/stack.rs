//! 扩展的组合：按安装顺序把中间件包裹在宿主实现之外。
//!
//! # 教案式说明
//! - **意图（Why）**：宿主只需声明“装哪些扩展、按什么顺序”，调用链的拼接由这里统一完成，
//!   避免每个宿主手写嵌套闭包。
//! - **逻辑（How）**：以切片递归的方式构造续体：第一个安装的扩展最先拦截、最后返回；
//!   执行结束钩子在宿主实现返回之后、最内层中间件看到结果之前依次运行。
//! - **契约（What）**：组合本身不引入并发与状态；每次调用都会重新构造续体链，扩展实例以 `Arc` 共享。

use std::{fmt, sync::Arc};

use futures::future::BoxFuture;

use crate::{
    job::{JobInsertParams, JobRow},
    middleware::{
        InsertNext, InsertResult, JobInsertMiddleware, Next, WorkEndHook, WorkNext, WorkResult,
        WorkerMiddleware,
    },
};

/// 插入/执行两类扩展以及执行结束钩子的有序集合。
#[derive(Clone, Default)]
pub struct MiddlewareStack {
    insert: Vec<Arc<dyn JobInsertMiddleware>>,
    work: Vec<Arc<dyn WorkerMiddleware>>,
    work_end: Vec<Arc<dyn WorkEndHook>>,
}

impl MiddlewareStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加批量插入扩展；先追加者位于外层。
    pub fn with_insert_middleware(mut self, middleware: Arc<dyn JobInsertMiddleware>) -> Self {
        self.insert.push(middleware);
        self
    }

    /// 追加单任务执行扩展；先追加者位于外层。
    pub fn with_worker_middleware(mut self, middleware: Arc<dyn WorkerMiddleware>) -> Self {
        self.work.push(middleware);
        self
    }

    /// 追加执行结束钩子；按追加顺序依次运行。
    pub fn with_work_end_hook(mut self, hook: Arc<dyn WorkEndHook>) -> Self {
        self.work_end.push(hook);
        self
    }

    /// 以 `terminal`（宿主的真实插入实现）为最内层执行批量插入。
    pub fn insert_many<'a>(
        &'a self,
        params: &'a [JobInsertParams],
        terminal: InsertNext<'a>,
    ) -> BoxFuture<'a, InsertResult> {
        insert_layer(&self.insert, params, terminal)
    }

    /// 以 `terminal`（宿主的真实工作者）为最内层执行单个任务。
    pub fn work<'a>(&'a self, job: &'a JobRow, terminal: WorkNext<'a>) -> BoxFuture<'a, WorkResult> {
        let hooks = self.work_end.as_slice();
        let terminal = if hooks.is_empty() {
            terminal
        } else {
            Next::new(move || async move {
                let mut result = terminal.run().await;
                for hook in hooks {
                    result = hook.work_end(job, result);
                }
                result
            })
        };
        work_layer(&self.work, job, terminal)
    }
}

fn insert_layer<'a>(
    layers: &'a [Arc<dyn JobInsertMiddleware>],
    params: &'a [JobInsertParams],
    terminal: InsertNext<'a>,
) -> BoxFuture<'a, InsertResult> {
    match layers.split_first() {
        None => terminal.run(),
        Some((outer, rest)) => {
            let next = Next::new(move || insert_layer(rest, params, terminal));
            outer.insert_many(params, next)
        }
    }
}

fn work_layer<'a>(
    layers: &'a [Arc<dyn WorkerMiddleware>],
    job: &'a JobRow,
    terminal: WorkNext<'a>,
) -> BoxFuture<'a, WorkResult> {
    match layers.split_first() {
        None => terminal.run(),
        Some((outer, rest)) => {
            let next = Next::new(move || work_layer(rest, job, terminal));
            outer.work(job, next)
        }
    }
}

impl fmt::Debug for MiddlewareStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareStack")
            .field("insert", &self.insert.len())
            .field("work", &self.work.len())
            .field("work_end", &self.work_end.len())
            .finish()
    }
}

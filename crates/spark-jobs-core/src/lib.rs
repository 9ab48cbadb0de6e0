#![deny(unsafe_code)]
#![doc = "spark-jobs-core: 任务队列客户端拦截扩展的核心契约。"]
#![doc = ""]
#![doc = "宿主任务队列在两个位置暴露拦截点：批量插入（`insert_many`）与单任务执行（`work`）。"]
#![doc = "本 crate 只定义契约与共享逻辑，具体扩展位于 `spark-jobs-otel` 与 `spark-jobs-middleware`。"]

//! # 模块地图
//! - [`job`]：宿主传入的任务记录、插入参数与插入结果；
//! - [`error`]：契约边界上的错误别名、错误链遍历与“空值包裹”错误形态；
//! - [`middleware`]：插入/执行两类拦截契约以及一次性续体 [`Next`]；
//! - [`outcome`]：受保护调用与三态结果分类（ok / error / panic）；
//! - [`stack`]：按安装顺序组合扩展的 [`MiddlewareStack`]；
//! - [`observability`]：指标仪表契约与属性模型；
//! - [`test_stubs`]：记录型指标提供者，供测试断言使用。

pub mod error;
pub mod job;
pub mod middleware;
pub mod observability;
pub mod outcome;
pub mod stack;
pub mod test_stubs;

pub use error::{BoxError, NilPointer, NilableError};
pub use job::{
    JobCancelError, JobInsertParams, JobInsertResult, JobRow, JobSnoozeError, JobState,
};
pub use middleware::{
    InsertNext, InsertResult, JobInsertMiddleware, Next, WorkEndHook, WorkNext, WorkResult,
    WorkerMiddleware,
};
pub use outcome::{Outcome, OutcomeStatus, guarded};
pub use stack::MiddlewareStack;

pub use async_trait::async_trait;

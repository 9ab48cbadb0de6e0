#![deny(unsafe_code)]
#![doc = "spark-jobs-middleware: 任务执行路径上的两个纠偏扩展。"]
#![doc = ""]
#![doc = "- [`nil_error`]：识别“非空错误句柄包裹空值”的缺陷，转换为明确错误或记录告警；"]
#![doc = "- [`panic_to_error`]：把工作者的 panic 转换为携带调用栈快照的 [`PanicError`]。"]

pub mod nil_error;
pub mod panic_to_error;

pub use nil_error::{NilErrorConfig, NilErrorDetected, NilErrorHook};
pub use panic_to_error::{
    BacktraceCapture, FrameCapture, PanicError, PanicToErrorConfig, PanicToErrorMiddleware,
    StackFrame,
};

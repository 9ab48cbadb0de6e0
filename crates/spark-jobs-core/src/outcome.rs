//! 受保护调用与三态结果分类。
//!
//! # 教案式说明
//! - **意图（Why）**：扩展需要在“正常返回值 / 返回错误 / panic 展开”三种终止方式之间做出区分，
//!   且只有一个指定层可以吞下 panic，其余层必须在记录后原样重新抛出。
//! - **逻辑（How）**：[`guarded`] 在 `catch_unwind` 下驱动内层 future，把三种终止方式折叠为带标签的
//!   [`Outcome`]；调用方完成记录后通过 [`Outcome::into_result`] 恢复原始控制流。
//! - **契约（What）**：分类在每次调用中只发生一次；`Panic` 分支携带原始载荷，
//!   `into_result` 以 [`std::panic::resume_unwind`] 抛出同一载荷，不做任何改写。

use std::{
    any::Any,
    future::Future,
    panic::{AssertUnwindSafe, resume_unwind},
};

use futures::FutureExt;

/// panic 的原始载荷。
pub type PanicPayload = Box<dyn Any + Send + 'static>;

/// 一次受保护调用的终止方式。
pub enum Outcome<T, E> {
    Success(T),
    Error(E),
    Panic(PanicPayload),
}

/// 终止方式对应的状态标签。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutcomeStatus {
    Ok,
    Error,
    Panic,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Ok => "ok",
            OutcomeStatus::Error => "error",
            OutcomeStatus::Panic => "panic",
        }
    }
}

impl<T, E> Outcome<T, E> {
    pub fn from_result(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(err) => Outcome::Error(err),
        }
    }

    /// 状态阶梯：panic 优先于错误，错误优先于成功。
    pub fn status(&self) -> OutcomeStatus {
        match self {
            Outcome::Panic(_) => OutcomeStatus::Panic,
            Outcome::Error(_) => OutcomeStatus::Error,
            Outcome::Success(_) => OutcomeStatus::Ok,
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            Outcome::Error(err) => Some(err),
            _ => None,
        }
    }

    /// 还原为普通返回值；`Panic` 分支以原始载荷继续展开。
    pub fn into_result(self) -> Result<T, E> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Error(err) => Err(err),
            Outcome::Panic(payload) => resume_unwind(payload),
        }
    }
}

impl<T, E: std::fmt::Debug> std::fmt::Debug for Outcome<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Success(_) => f.write_str("Success(..)"),
            Outcome::Error(err) => f.debug_tuple("Error").field(err).finish(),
            Outcome::Panic(payload) => f
                .debug_tuple("Panic")
                .field(&panic_message(payload.as_ref()))
                .finish(),
        }
    }
}

/// 在 `catch_unwind` 下驱动 `future` 并对其终止方式分类。
///
/// # 契约（What）
/// - 内层 future 在 poll 过程中发生的 panic 会被捕获为 [`Outcome::Panic`]；
/// - 调用方负责在完成记录后决定重新抛出（[`Outcome::into_result`]）还是转换。
pub async fn guarded<F, T, E>(future: F) -> Outcome<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => Outcome::from_result(result),
        Err(payload) => Outcome::Panic(payload),
    }
}

/// 以文本形式读取 panic 载荷：支持 `&str` 与 `String`，其余类型返回占位描述。
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Box<dyn Any>".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::panic::catch_unwind;

    #[test]
    fn success_and_error_are_classified_without_unwinding() {
        let ok: Outcome<u8, &str> = block_on(guarded(async { Ok(7) }));
        assert_eq!(ok.status(), OutcomeStatus::Ok);
        assert_eq!(ok.into_result(), Ok(7));

        let err: Outcome<u8, &str> = block_on(guarded(async { Err("boom") }));
        assert_eq!(err.status(), OutcomeStatus::Error);
        assert_eq!(err.error(), Some(&"boom"));
    }

    fn explode() -> Result<(), ()> {
        std::panic::panic_any(42_u32)
    }

    #[test]
    fn panic_is_captured_and_reraised_with_the_same_payload() {
        let outcome: Outcome<(), ()> = block_on(guarded(async { explode() }));
        assert_eq!(outcome.status(), OutcomeStatus::Panic);
        assert_eq!(outcome.status().as_str(), "panic");

        let payload = catch_unwind(AssertUnwindSafe(|| outcome.into_result()))
            .expect_err("into_result 必须重新抛出 panic");
        assert_eq!(payload.downcast_ref::<u32>(), Some(&42));
    }

    #[test]
    fn panic_message_reads_string_payloads() {
        let payload: PanicPayload = Box::new(String::from("worker exploded"));
        assert_eq!(panic_message(payload.as_ref()), "worker exploded");

        let payload: PanicPayload = Box::new(1_i64);
        assert_eq!(panic_message(payload.as_ref()), "Box<dyn Any>");
    }
}

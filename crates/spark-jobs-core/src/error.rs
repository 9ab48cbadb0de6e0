//! 契约边界上的错误模型。
//!
//! # 教案式说明
//! - **意图（Why）**：宿主的工作者可能返回任意错误类型，扩展层只需统一的 trait 对象形态即可观测与透传；
//!   同时，取消/推迟等特殊错误会被层层包装，识别时必须沿 `source()` 链进行结构化匹配。
//! - **逻辑（How）**：以 [`BoxError`] 作为唯一的错误承载形态，[`chain`] 与 [`find_in_chain`] 提供链式遍历。
//! - **契约（What）**：[`NilableError`] 描述“错误句柄非空、内部值却未初始化”的缺陷形态，空值时以
//!   [`NilPointer`] 作为 `source()` 暴露，供缺陷检测扩展在运行时识别。

use std::{any::type_name, error::Error as StdError, fmt};

/// 契约边界上的错误类型。
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// 沿 `source()` 链遍历错误，首个元素为错误本身。
pub fn chain<'a>(err: &'a (dyn StdError + 'static)) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    let mut next = Some(err);
    std::iter::from_fn(move || {
        let current = next?;
        next = current.source();
        Some(current)
    })
}

/// 在错误链中查找指定类型的错误，找到即返回其引用。
pub fn find_in_chain<'a, T>(err: &'a (dyn StdError + 'static)) -> Option<&'a T>
where
    T: StdError + 'static,
{
    chain(err).find_map(|candidate| candidate.downcast_ref::<T>())
}

/// 空值标记：出现在 [`NilableError`] 的 `source()` 上，表示外层句柄内部值缺失。
///
/// 渲染形如 `(*errors.MyError)(<nil>)`，其中包名取类型路径的倒数第二段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NilPointer {
    type_name: &'static str,
}

impl NilPointer {
    pub fn of<E: ?Sized>() -> Self {
        Self {
            type_name: type_name::<E>(),
        }
    }

    /// 完整的 Rust 类型路径。
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// 以 `(*包.类型)(<nil>)` 形式描述空值。
    pub fn describe(&self) -> String {
        let without_generics = self
            .type_name
            .split_once('<')
            .map_or(self.type_name, |(head, _)| head);
        let mut segments = without_generics.rsplit("::");
        let name = segments.next().unwrap_or(without_generics);
        match segments.next() {
            Some(package) => format!("(*{package}.{name})(<nil>)"),
            None => format!("(*{name})(<nil>)"),
        }
    }
}

impl fmt::Display for NilPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl StdError for NilPointer {}

/// 指针形态的错误句柄：内部值可能缺失。
///
/// # 教案式说明
/// - **意图（Why）**：工作者常以 `Option<E>` 暂存“可能发生”的错误，若未经判断就直接装箱返回，
///   宿主会看到一个“非空但没有内容”的错误，任务被误判为失败。该类型把这一形态显式化，
///   使缺陷检测扩展能够在运行时发现它。
/// - **逻辑（How）**：内部值存在时完全委托给内部错误；缺失时 `source()` 返回 [`NilPointer`]，
///   `Display` 输出空值描述。
/// - **契约（What）**：只有最外层句柄为空时才视为缺陷；内部值存在时行为与直接返回 `E` 一致。
pub struct NilableError<E> {
    value: Option<E>,
    nil: NilPointer,
}

impl<E> NilableError<E> {
    pub fn new(value: Option<E>) -> Self {
        Self {
            value,
            nil: NilPointer::of::<E>(),
        }
    }

    /// 构造内部值缺失的句柄。
    pub fn nil() -> Self {
        Self::new(None)
    }
}

impl<E> From<Option<E>> for NilableError<E> {
    fn from(value: Option<E>) -> Self {
        Self::new(value)
    }
}

impl<E: fmt::Debug> fmt::Debug for NilableError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => f.debug_tuple("NilableError").field(value).finish(),
            None => f.debug_tuple("NilableError").field(&self.nil).finish(),
        }
    }
}

impl<E: fmt::Display> fmt::Display for NilableError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => value.fmt(f),
            None => self.nil.fmt(f),
        }
    }
}

impl<E> StdError for NilableError<E>
where
    E: StdError + 'static,
{
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.value {
            Some(value) => value.source(),
            None => Some(&self.nil),
        }
    }
}

/// 判断错误本身（不含更深的链）是否为内部值缺失的句柄。
pub fn nil_pointer_of<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a NilPointer> {
    err.source()
        .and_then(|source| source.downcast_ref::<NilPointer>())
}

#[cfg(test)]
mod tests {
    use super::*;

    mod payments {
        #[derive(Debug)]
        pub struct DeclinedError;

        impl std::fmt::Display for DeclinedError {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("card declined")
            }
        }

        impl std::error::Error for DeclinedError {}
    }

    use payments::DeclinedError;

    #[test]
    fn nil_handle_exposes_marker_naming_the_type() {
        let err: BoxError = Box::new(NilableError::<DeclinedError>::nil());

        let marker = nil_pointer_of(err.as_ref()).expect("空句柄应暴露 NilPointer");
        assert_eq!(marker.describe(), "(*payments.DeclinedError)(<nil>)");
        assert_eq!(err.to_string(), "(*payments.DeclinedError)(<nil>)");
    }

    #[test]
    fn populated_handle_behaves_like_inner_error() {
        let err: BoxError = Box::new(NilableError::new(Some(DeclinedError)));

        assert!(nil_pointer_of(err.as_ref()).is_none());
        assert_eq!(err.to_string(), "card declined");
    }

    #[test]
    fn describe_strips_generic_arguments() {
        let marker = NilPointer::of::<Vec<DeclinedError>>();
        assert_eq!(marker.describe(), "(*vec.Vec)(<nil>)");
    }

    #[test]
    fn chain_visits_every_source() {
        let err = NilableError::<DeclinedError>::nil();
        let rendered: Vec<String> = chain(&err).map(|e| e.to_string()).collect();
        assert_eq!(rendered.len(), 2);
    }
}

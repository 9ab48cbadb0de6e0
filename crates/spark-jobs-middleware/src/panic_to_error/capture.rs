//! panic 现场的调用栈采集。
//!
//! # 教案式说明
//! - **意图（Why）**：`catch_unwind` 返回时栈已经展开完毕，此时再采集只能看到捕获方自身。
//!   要得到“谁触发了 panic”，必须在 panic 钩子里、展开开始之前采集。
//! - **逻辑（How）**：
//!   1. 进程级 panic 钩子只安装一次，并链接到此前的钩子；
//!   2. 中间件在每次 poll 内层 future 时，把自己的 [`FrameCapture`] 压入线程局部的“已武装”栈，
//!      poll 结束（含展开路径）时由守卫弹出；
//!   3. 钩子发现当前线程已武装时调用采集能力，把结果连同载荷文本放入线程局部槽位，并跳过此前钩子的
//!      默认输出；未武装时原样交给此前的钩子；
//!   4. 中间件在 `catch_unwind` 返回后于同一线程取走槽位中的帧，只有载荷文本一致时才采用。
//! - **契约（What）**：武装范围严格限定在单次 poll 内，每次武装都会清空槽位；同一 poll 中 panic 与捕获
//!   发生在同一线程。`resume_unwind` 不经过钩子，此时槽位为空或属于另一次 panic，由调用方在捕获处补采。
//! - **风险提示（Trade-offs）**：替换进程级 panic 钩子会与同样替换钩子的库互相影响；本实现总是保留并调用
//!   此前的钩子，以降低冲突。

use std::{
    cell::RefCell,
    fmt,
    future::Future,
    panic,
    pin::Pin,
    sync::{Arc, Once},
    task::{Context, Poll},
};

use spark_jobs_core::outcome::panic_message;

/// 调用栈快照的帧数上限。
pub const MAX_FRAMES: usize = 100;

/// 调用栈中的一帧。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StackFrame {
    pub function: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n\t{}:{}",
            self.function,
            self.file.as_deref().unwrap_or("<unknown>"),
            self.line.unwrap_or(0)
        )
    }
}

/// 调用栈采集能力。
///
/// 在 panic 钩子内被调用，返回的第一帧应属于触发 panic 的代码，最多 `max_frames` 帧。
pub trait FrameCapture: Send + Sync + 'static {
    fn capture(&self, max_frames: usize) -> Vec<StackFrame>;
}

/// 基于 `backtrace` crate 的默认采集实现。
///
/// 跳过栈顶的采集与 panic 机制帧（`std`/`core`/`alloc`、`backtrace` 以及本模块），
/// 第一帧即为调用 `panic!` 的函数。依赖调试符号；符号缺失时函数名为空字符串并同样被跳过。
#[derive(Clone, Copy, Debug, Default)]
pub struct BacktraceCapture;

impl FrameCapture for BacktraceCapture {
    fn capture(&self, max_frames: usize) -> Vec<StackFrame> {
        let mut frames = Vec::new();
        backtrace::trace(|frame| {
            backtrace::resolve_frame(frame, |symbol| {
                frames.push(StackFrame {
                    function: symbol
                        .name()
                        .map(|name| format!("{name:#}"))
                        .unwrap_or_default(),
                    file: symbol.filename().map(|path| path.display().to_string()),
                    line: symbol.lineno(),
                });
            });
            true
        });
        trim_internal_frames(frames, max_frames)
    }
}

const CAPTURE_MODULE: &str = module_path!();

const RUNTIME_PREFIXES: [&str; 5] = ["std::", "core::", "alloc::", "backtrace::", "__rust"];

/// 无路径前缀的 panic 入口符号。
const RUNTIME_SYMBOLS: [&str; 2] = ["rust_begin_unwind", "rust_panic"];

fn is_internal_frame(function: &str) -> bool {
    if function.is_empty() {
        return true;
    }
    let bare = function.trim_start_matches('<');
    bare.starts_with(CAPTURE_MODULE)
        || RUNTIME_SYMBOLS.contains(&bare)
        || RUNTIME_PREFIXES
            .iter()
            .any(|prefix| bare.starts_with(prefix))
}

/// 去掉栈顶连续的内部帧，并把结果截断到 `max_frames`。
pub(crate) fn trim_internal_frames(frames: Vec<StackFrame>, max_frames: usize) -> Vec<StackFrame> {
    frames
        .into_iter()
        .skip_while(|frame| is_internal_frame(&frame.function))
        .take(max_frames)
        .collect()
}

thread_local! {
    static ARMED: RefCell<Vec<Arc<dyn FrameCapture>>> = const { RefCell::new(Vec::new()) };
    static CAPTURED: RefCell<Option<Captured>> = const { RefCell::new(None) };
}

/// 钩子中记录的一次快照，`message` 用于与随后捕获到的载荷对应。
struct Captured {
    message: String,
    frames: Vec<StackFrame>,
}

static HOOK: Once = Once::new();

fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let armed = ARMED
                .try_with(|armed| armed.borrow().last().cloned())
                .ok()
                .flatten();
            match armed {
                Some(capture) => {
                    let captured = Captured {
                        message: panic_message(info.payload()),
                        frames: capture.capture(MAX_FRAMES),
                    };
                    let _ = CAPTURED.try_with(|slot| *slot.borrow_mut() = Some(captured));
                }
                None => previous(info),
            }
        }));
    });
}

/// 取走当前线程最近一次采集到的帧；载荷文本与 `message` 不一致时丢弃并返回 `None`。
pub(crate) fn take_captured(message: &str) -> Option<Vec<StackFrame>> {
    CAPTURED
        .try_with(|slot| slot.borrow_mut().take())
        .ok()
        .flatten()
        .filter(|captured| captured.message == message)
        .map(|captured| captured.frames)
}

fn clear_captured() {
    let _ = CAPTURED.try_with(|slot| slot.borrow_mut().take());
}

struct ArmGuard;

impl ArmGuard {
    fn arm(capture: Arc<dyn FrameCapture>) -> Self {
        clear_captured();
        ARMED.with(|armed| armed.borrow_mut().push(capture));
        ArmGuard
    }
}

impl Drop for ArmGuard {
    fn drop(&mut self) {
        let _ = ARMED.try_with(|armed| armed.borrow_mut().pop());
    }
}

/// 在每次 poll 期间武装采集能力的 future 包装。
pub(crate) struct Armed<F> {
    inner: Pin<Box<F>>,
    capture: Arc<dyn FrameCapture>,
}

impl<F: Future> Armed<F> {
    pub(crate) fn new(inner: F, capture: Arc<dyn FrameCapture>) -> Self {
        install_hook();
        Self {
            inner: Box::pin(inner),
            capture,
        }
    }
}

impl<F: Future> Future for Armed<F> {
    type Output = F::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let _guard = ArmGuard::arm(Arc::clone(&self.capture));
        self.inner.as_mut().poll(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(function: &str) -> StackFrame {
        StackFrame {
            function: function.to_owned(),
            file: Some("src/lib.rs".to_owned()),
            line: Some(7),
        }
    }

    #[test]
    fn leading_runtime_and_capture_frames_are_trimmed() {
        let frames = vec![
            frame("backtrace::backtrace::trace"),
            frame(&format!("<{CAPTURE_MODULE}::BacktraceCapture as {CAPTURE_MODULE}::FrameCapture>::capture")),
            frame("<alloc::boxed::Box<F,A> as core::ops::function::Fn<Args>>::call"),
            frame("std::panicking::rust_panic_with_hook"),
            frame("rust_begin_unwind"),
            frame(""),
            frame("core::panicking::panic_fmt"),
            frame("billing::charge_card"),
            frame("core::ops::function::FnOnce::call_once"),
            frame("billing::run"),
        ];

        let trimmed = trim_internal_frames(frames, MAX_FRAMES);

        assert_eq!(trimmed[0].function, "billing::charge_card");
        assert_eq!(trimmed.len(), 3, "只裁剪栈顶的内部帧");
    }

    #[test]
    fn crates_named_like_runtime_symbols_are_kept() {
        let frames = vec![
            frame("rust_panic"),
            frame("__rust_start_panic"),
            frame("rust_billing::charge"),
            frame("_rust_ledger::post"),
        ];

        let trimmed = trim_internal_frames(frames, MAX_FRAMES);

        assert_eq!(trimmed[0].function, "rust_billing::charge", "以 rust_ 开头的业务 crate 不应被裁剪");
        assert_eq!(trimmed.len(), 2);
    }

    #[test]
    fn snapshot_is_taken_only_for_the_matching_payload() {
        CAPTURED.with(|slot| {
            *slot.borrow_mut() = Some(Captured {
                message: "earlier".to_owned(),
                frames: vec![frame("app::earlier")],
            })
        });
        assert!(take_captured("later").is_none(), "载荷不一致时不得复用旧快照");
        assert!(take_captured("earlier").is_none(), "不一致的快照应已被丢弃");

        CAPTURED.with(|slot| {
            *slot.borrow_mut() = Some(Captured {
                message: "earlier".to_owned(),
                frames: vec![frame("app::earlier")],
            })
        });
        let _guard = ArmGuard::arm(Arc::new(BacktraceCapture));
        assert!(take_captured("earlier").is_none(), "武装时应清空上一次的快照");
    }

    #[test]
    fn snapshot_is_bounded() {
        let frames = (0..250).map(|i| frame(&format!("app::f{i}"))).collect();
        assert_eq!(trim_internal_frames(frames, MAX_FRAMES).len(), MAX_FRAMES);
    }

    #[test]
    fn frame_renders_function_then_location() {
        assert_eq!(frame("app::run").to_string(), "app::run\n\tsrc/lib.rs:7");
        assert_eq!(
            StackFrame {
                function: "app::run".to_owned(),
                ..StackFrame::default()
            }
            .to_string(),
            "app::run\n\t<unknown>:0"
        );
    }
}

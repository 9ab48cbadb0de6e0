//! 观测性测试桩：记录型指标提供者。
//!
//! # 教案式说明
//! - **意图（Why）**：扩展的测试需要断言“哪个仪表、以什么单位、收到了什么值与标签”，
//!   空操作实现（[`crate::observability::NoopMetricsProvider`]）无法满足这一点。
//! - **逻辑（How）**：[`RecordingMetricsProvider`] 在创建仪表时登记描述符，仪表被调用时把样本写入共享缓冲；
//!   描述符中的名称与单位随样本一起保存，测试可直接按名称过滤。
//! - **契约（What）**：所有方法线程安全；锁被毒化时继续使用内部数据，保证测试断言不被连带失败掩盖。
//! - **风险提示（Trade-offs）**：缓冲无上限，仅适合测试场景。

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::observability::{
    AttributeSet, Counter, Gauge, Histogram, InstrumentDescriptor, MetricsProvider,
    OwnedAttributeSet,
};

/// 仪表类别。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstrumentKind {
    Counter,
    Gauge,
    Histogram,
}

/// 创建仪表时登记的描述信息。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisteredInstrument {
    pub kind: InstrumentKind,
    pub name: String,
    pub unit: Option<String>,
    pub description: Option<String>,
}

/// 一次记录调用产生的样本。计数器的增量同样以 `f64` 保存。
#[derive(Clone, Debug, PartialEq)]
pub struct MetricEvent {
    pub kind: InstrumentKind,
    pub name: String,
    pub unit: Option<String>,
    pub value: f64,
    pub attributes: OwnedAttributeSet,
}

#[derive(Default)]
struct Recorder {
    registered: Mutex<Vec<RegisteredInstrument>>,
    events: Mutex<Vec<MetricEvent>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Recorder {
    fn register(&self, kind: InstrumentKind, descriptor: &InstrumentDescriptor<'_>) -> Arc<str> {
        lock(&self.registered).push(RegisteredInstrument {
            kind,
            name: descriptor.name.to_owned(),
            unit: descriptor.unit.map(str::to_owned),
            description: descriptor.description.map(str::to_owned),
        });
        Arc::from(descriptor.name)
    }

    fn push(&self, instrument: &RecordingInstrument, value: f64, attributes: AttributeSet<'_>) {
        lock(&self.events).push(MetricEvent {
            kind: instrument.kind,
            name: instrument.name.to_string(),
            unit: instrument.unit.clone(),
            value,
            attributes: OwnedAttributeSet::from(attributes),
        });
    }
}

/// 记录型指标提供者，供测试断言使用。
#[derive(Clone, Default)]
pub struct RecordingMetricsProvider {
    recorder: Arc<Recorder>,
}

impl RecordingMetricsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回全部样本的副本。
    pub fn events(&self) -> Vec<MetricEvent> {
        lock(&self.recorder.events).clone()
    }

    /// 返回指定名称仪表的样本。
    pub fn events_named(&self, name: &str) -> Vec<MetricEvent> {
        lock(&self.recorder.events)
            .iter()
            .filter(|event| event.name == name)
            .cloned()
            .collect()
    }

    /// 返回创建过的仪表描述。
    pub fn registered(&self) -> Vec<RegisteredInstrument> {
        lock(&self.recorder.registered).clone()
    }

    /// 清空样本，保留仪表登记信息。
    pub fn reset(&self) {
        lock(&self.recorder.events).clear();
    }

    fn instrument(
        &self,
        kind: InstrumentKind,
        descriptor: &InstrumentDescriptor<'_>,
    ) -> RecordingInstrument {
        RecordingInstrument {
            kind,
            name: self.recorder.register(kind, descriptor),
            unit: descriptor.unit.map(str::to_owned),
            recorder: Arc::clone(&self.recorder),
        }
    }
}

impl MetricsProvider for RecordingMetricsProvider {
    fn counter(&self, descriptor: &InstrumentDescriptor<'_>) -> Arc<dyn Counter> {
        Arc::new(self.instrument(InstrumentKind::Counter, descriptor))
    }

    fn gauge(&self, descriptor: &InstrumentDescriptor<'_>) -> Arc<dyn Gauge> {
        Arc::new(self.instrument(InstrumentKind::Gauge, descriptor))
    }

    fn histogram(&self, descriptor: &InstrumentDescriptor<'_>) -> Arc<dyn Histogram> {
        Arc::new(self.instrument(InstrumentKind::Histogram, descriptor))
    }
}

struct RecordingInstrument {
    kind: InstrumentKind,
    name: Arc<str>,
    unit: Option<String>,
    recorder: Arc<Recorder>,
}

impl Counter for RecordingInstrument {
    fn add(&self, value: u64, attributes: AttributeSet<'_>) {
        self.recorder.push(self, value as f64, attributes);
    }
}

impl Gauge for RecordingInstrument {
    fn set(&self, value: f64, attributes: AttributeSet<'_>) {
        self.recorder.push(self, value, attributes);
    }
}

impl Histogram for RecordingInstrument {
    fn record(&self, value: f64, attributes: AttributeSet<'_>) {
        self.recorder.push(self, value, attributes);
    }
}

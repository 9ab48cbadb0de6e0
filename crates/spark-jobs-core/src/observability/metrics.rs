use std::sync::{Arc, OnceLock};

use super::attributes::AttributeSet;

/// 指标仪表的元数据描述。
///
/// # 设计背景（Why）
/// - 吸收 OpenTelemetry Instrument Descriptor 的设计，统一指标名称、描述与单位的声明方式。
/// - 通过借用方式传递元数据，避免在热路径重复分配字符串。
///
/// # 契约说明（What）
/// - `name` 遵循 `namespace.metric_name` 的蛇形命名，并保持全局唯一。
/// - `unit` 遵循 UCUM 或惯用单位（如 `s`、`ms`、`{job}`）。
/// - **后置条件**：元数据仅在调用期间有效，实现方如需持久化应克隆为拥有所有权的副本。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstrumentDescriptor<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub unit: Option<&'a str>,
}

impl<'a> InstrumentDescriptor<'a> {
    /// 构造元数据描述。
    pub const fn new(name: &'a str) -> Self {
        Self {
            name,
            description: None,
            unit: None,
        }
    }

    /// 附加说明文本。
    pub const fn with_description(mut self, description: &'a str) -> Self {
        self.description = Some(description);
        self
    }

    /// 附加单位信息。
    pub const fn with_unit(mut self, unit: &'a str) -> Self {
        self.unit = Some(unit);
        self
    }
}

/// 单调递增计数器。
///
/// # 契约说明（What）
/// - **前置条件**：调用方需保证单调递增语义。
/// - **后置条件**：实现必须在内部保证线程安全；后端不可用时应丢弃数据而非阻塞或失败。
pub trait Counter: Send + Sync {
    /// 累加指标值。
    fn add(&self, value: u64, attributes: AttributeSet<'_>);
}

/// 记录瞬时值的测量仪表。
///
/// # 设计背景（Why）
/// - 对应 OpenTelemetry Gauge 与 Prometheus Gauge；任务耗时以“最近一次观测值”形式暴露时使用 `set`。
pub trait Gauge: Send + Sync {
    /// 直接设置数值。
    fn set(&self, value: f64, attributes: AttributeSet<'_>);
}

/// 直方图指标。
///
/// # 契约说明（What）
/// - **前置条件**：`value` 应满足业务语义（如耗时 >= 0）。
/// - **后置条件**：实现可选择固定桶或指数桶，只要能保证顺序一致性。
pub trait Histogram: Send + Sync {
    /// 记录样本值。
    fn record(&self, value: f64, attributes: AttributeSet<'_>);
}

/// 指标提供者的抽象。
///
/// # 教案式说明
/// - **意图（Why）**：统一各类后端（Prometheus、StatsD、OpenTelemetry Collector）的仪表创建流程，
///   扩展只依赖该契约，在构造阶段一次性创建全部仪表并长期复用。
/// - **契约（What）**：
///   - 返回的仪表实例应可长期使用，且可被多个并发执行的调用共享；
///   - 记录调用不返回错误，后端失败不得影响任务结果。
/// - **风险提示（Trade-offs）**：后端初始化失败时，建议返回降级实现（如 [`NoopMetricsProvider`]），而非直接 panic。
pub trait MetricsProvider: Send + Sync + 'static {
    /// 获取或创建单调递增计数器。
    fn counter(&self, descriptor: &InstrumentDescriptor<'_>) -> Arc<dyn Counter>;

    /// 获取或创建瞬时值仪表。
    fn gauge(&self, descriptor: &InstrumentDescriptor<'_>) -> Arc<dyn Gauge>;

    /// 获取或创建直方图。
    fn histogram(&self, descriptor: &InstrumentDescriptor<'_>) -> Arc<dyn Histogram>;
}

/// 空操作指标提供者：未安装任何后端时的降级实现。
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMetricsProvider;

#[derive(Clone, Copy, Debug, Default)]
struct NoopInstrument;

impl Counter for NoopInstrument {
    fn add(&self, _value: u64, _attributes: AttributeSet<'_>) {}
}

impl Gauge for NoopInstrument {
    fn set(&self, _value: f64, _attributes: AttributeSet<'_>) {}
}

impl Histogram for NoopInstrument {
    fn record(&self, _value: f64, _attributes: AttributeSet<'_>) {}
}

impl MetricsProvider for NoopMetricsProvider {
    fn counter(&self, _descriptor: &InstrumentDescriptor<'_>) -> Arc<dyn Counter> {
        Arc::new(NoopInstrument)
    }

    fn gauge(&self, _descriptor: &InstrumentDescriptor<'_>) -> Arc<dyn Gauge> {
        Arc::new(NoopInstrument)
    }

    fn histogram(&self, _descriptor: &InstrumentDescriptor<'_>) -> Arc<dyn Histogram> {
        Arc::new(NoopInstrument)
    }
}

/// 进程级默认指标提供者插槽。
static GLOBAL_METRICS_PROVIDER: OnceLock<Arc<dyn MetricsProvider>> = OnceLock::new();

/// 全局指标提供者已被安装。
#[derive(Debug, thiserror::Error)]
#[error("全局 MetricsProvider 已安装，禁止重复设置")]
pub struct GlobalMetricsProviderInstalled;

/// 安装进程级默认指标提供者。
///
/// # 教案式说明
/// - **意图（Why）**：装配入口（如宿主启动流程）可以一次性声明全局后端，扩展在未显式注入时从这里取用。
/// - **契约（What）**：只允许安装一次；重复调用返回 [`GlobalMetricsProviderInstalled`]，已安装的实例保持不变。
/// - **风险提示（Trade-offs）**：在首次读取 [`global_metrics_provider`] 之后再安装同样会失败，
///   因为读取时会以 [`NoopMetricsProvider`] 占位。
pub fn install_global_metrics_provider(
    provider: Arc<dyn MetricsProvider>,
) -> Result<(), GlobalMetricsProviderInstalled> {
    GLOBAL_METRICS_PROVIDER
        .set(provider)
        .map_err(|_| GlobalMetricsProviderInstalled)
}

/// 读取进程级默认指标提供者；未安装时固定为 [`NoopMetricsProvider`]。
pub fn global_metrics_provider() -> Arc<dyn MetricsProvider> {
    Arc::clone(GLOBAL_METRICS_PROVIDER.get_or_init(|| Arc::new(NoopMetricsProvider)))
}

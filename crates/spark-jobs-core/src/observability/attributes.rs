use std::borrow::Cow;

/// 观测性属性键的通用别名。
///
/// # 设计背景（Why）
/// - 参考 OpenTelemetry `Key` 的抽象，将键限定为 UTF-8 字符串。
/// - 采用 `Cow<'a, str>` 以兼顾静态常量（如 `status`、`queue`）与运行时动态生成的键名。
pub type AttributeKey<'a> = Cow<'a, str>;

/// 描述单个属性键值对的结构化条目。
///
/// # 契约说明（What）
/// - **前置条件**：调用方需保证 `key` 低基数；任务标识、时间戳等高基数字段只应进入 Span，不应进入指标。
/// - **后置条件**：`KeyValue` 可安全克隆，但本身不提供同步原语。
#[derive(Clone, Debug, PartialEq)]
pub struct KeyValue<'a> {
    pub key: AttributeKey<'a>,
    pub value: MetricAttributeValue<'a>,
}

impl<'a> KeyValue<'a> {
    /// 构建新的属性键值对。
    pub fn new(
        key: impl Into<AttributeKey<'a>>,
        value: impl Into<MetricAttributeValue<'a>>,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// 属性集合的借用视图。
///
/// # 契约说明（What）
/// - 切片中的条目不可包含重复键；实现方不得缓存该引用超出调用栈范围。
pub type AttributeSet<'a> = &'a [KeyValue<'a>];

/// 指标属性值的统一枚举。
///
/// # 教案式说明
/// - **意图（Why）**：任务的 `attempt`、`priority` 等数值维度若被强制转成字符串会丢失类型信息；
///   任务标签则天然是字符串列表，需要独立变体承载。
/// - **逻辑（How）**：`Text` 与 `TextArray` 使用 `Cow` 在借用与拥有之间切换；数值通过 `From` 零成本转换。
/// - **风险提示（Trade-offs）**：未区分有符号与无符号整型，统一折叠为 `i64`；超出范围的 `u64` 执行饱和转换。
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum MetricAttributeValue<'a> {
    Text(Cow<'a, str>),
    TextArray(Cow<'a, [String]>),
    Bool(bool),
    F64(f64),
    I64(i64),
}

impl<'a> From<&'a str> for MetricAttributeValue<'a> {
    fn from(value: &'a str) -> Self {
        Self::Text(Cow::Borrowed(value))
    }
}

impl From<String> for MetricAttributeValue<'_> {
    fn from(value: String) -> Self {
        Self::Text(Cow::Owned(value))
    }
}

impl<'a> From<Cow<'a, str>> for MetricAttributeValue<'a> {
    fn from(value: Cow<'a, str>) -> Self {
        Self::Text(value)
    }
}

impl<'a> From<&'a [String]> for MetricAttributeValue<'a> {
    fn from(value: &'a [String]) -> Self {
        Self::TextArray(Cow::Borrowed(value))
    }
}

impl From<Vec<String>> for MetricAttributeValue<'_> {
    fn from(value: Vec<String>) -> Self {
        Self::TextArray(Cow::Owned(value))
    }
}

impl From<bool> for MetricAttributeValue<'_> {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for MetricAttributeValue<'_> {
    fn from(value: f64) -> Self {
        Self::F64(value)
    }
}

impl From<i64> for MetricAttributeValue<'_> {
    fn from(value: i64) -> Self {
        Self::I64(value)
    }
}

impl From<i32> for MetricAttributeValue<'_> {
    fn from(value: i32) -> Self {
        Self::I64(value.into())
    }
}

impl From<i16> for MetricAttributeValue<'_> {
    fn from(value: i16) -> Self {
        Self::I64(value.into())
    }
}

impl From<u64> for MetricAttributeValue<'_> {
    fn from(value: u64) -> Self {
        MetricAttributeValue::I64(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl<'a> MetricAttributeValue<'a> {
    /// 将属性值转化为拥有所有权的形式，适合长期缓存或跨线程传递。
    pub fn into_owned(self) -> MetricAttributeValue<'static> {
        match self {
            MetricAttributeValue::Text(text) => {
                MetricAttributeValue::Text(Cow::Owned(text.into_owned()))
            }
            MetricAttributeValue::TextArray(items) => {
                MetricAttributeValue::TextArray(Cow::Owned(items.into_owned()))
            }
            MetricAttributeValue::Bool(value) => MetricAttributeValue::Bool(value),
            MetricAttributeValue::F64(value) => MetricAttributeValue::F64(value),
            MetricAttributeValue::I64(value) => MetricAttributeValue::I64(value),
        }
    }
}

/// 辅助类型：用于构造拥有所有权的属性集合。
///
/// # 教案式说明
/// - **意图（Why）**：记录型指标提供者需要在调用栈之外保留属性，供测试断言读取。
/// - **逻辑（How）**：内部维护 `Vec<KeyValue<'static>>`，通过 [`Self::extend_from`] 深拷贝借用视图。
/// - **契约（What）**：[`Self::as_slice`] 暴露为 [`AttributeSet`]，可直接回传给指标接口。
#[derive(Default, Clone, Debug, PartialEq)]
pub struct OwnedAttributeSet {
    entries: Vec<KeyValue<'static>>,
}

impl OwnedAttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 将借用视图中的键值对扩展为拥有所有权的集合。
    pub fn extend_from(&mut self, borrowed: AttributeSet<'_>) {
        self.entries.reserve(borrowed.len());
        for kv in borrowed {
            self.entries.push(KeyValue {
                key: Cow::Owned(kv.key.clone().into_owned()),
                value: kv.value.clone().into_owned(),
            });
        }
    }

    /// 按键查找属性值。
    pub fn get(&self, key: &str) -> Option<&MetricAttributeValue<'static>> {
        self.entries
            .iter()
            .find(|kv| kv.key == key)
            .map(|kv| &kv.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<AttributeSet<'_>> for OwnedAttributeSet {
    fn from(borrowed: AttributeSet<'_>) -> Self {
        let mut owned = Self::new();
        owned.extend_from(borrowed);
        owned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owned_set_keeps_text_arrays_and_numbers() {
        let tags = vec!["billing".to_owned(), "eu".to_owned()];
        let borrowed = [
            KeyValue::new("tag", tags.as_slice()),
            KeyValue::new("attempt", 2_i32),
        ];

        let owned = OwnedAttributeSet::from(&borrowed[..]);
        assert_eq!(owned.len(), 2);
        assert_eq!(
            owned.get("tag"),
            Some(&MetricAttributeValue::TextArray(Cow::Owned(tags)))
        );
        assert_eq!(owned.get("attempt"), Some(&MetricAttributeValue::I64(2)));
        assert!(owned.get("queue").is_none());
    }

    #[test]
    fn u64_conversion_saturates() {
        assert_eq!(
            MetricAttributeValue::from(u64::MAX),
            MetricAttributeValue::I64(i64::MAX)
        );
    }
}

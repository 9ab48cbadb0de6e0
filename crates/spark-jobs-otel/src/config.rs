//! 遥测扩展的配置。
//!
//! # 教案式说明
//! - **意图（Why）**：宿主通常从 TOML/JSON 加载配置，因此配置结构保持“全部字段可选、字符串化单位”的形态；
//!   合法性校验推迟到构造阶段，一处失败即整体失败。
//! - **契约（What）**：
//!   - `duration_unit`：`s`（默认）或 `ms`，其他取值在 [`TelemetryConfig::duration_unit`] 处返回
//!     [`Error::InvalidDurationUnit`]；
//!   - `enable_semantic_metrics`：额外产出遵循 OpenTelemetry 消息语义约定的指标集；
//!   - `enable_work_span_job_kind_suffix`：执行 Span 名称追加 `/<kind>` 后缀。

use std::{fmt, str::FromStr, time::Duration};

use serde::Deserialize;

use crate::Error;

/// 时长指标的单位。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DurationUnit {
    #[default]
    Seconds,
    Milliseconds,
}

impl DurationUnit {
    /// 写入仪表描述符的单位字符串。
    pub const fn as_str(&self) -> &'static str {
        match self {
            DurationUnit::Seconds => "s",
            DurationUnit::Milliseconds => "ms",
        }
    }

    /// 将单调时钟差值换算为本单位的浮点值；毫秒为秒数乘以 1000，不做截断。
    pub fn convert(&self, elapsed: Duration) -> f64 {
        let seconds = elapsed.as_secs_f64();
        match self {
            DurationUnit::Seconds => seconds,
            DurationUnit::Milliseconds => seconds * 1000.0,
        }
    }
}

impl FromStr for DurationUnit {
    type Err = Error;

    fn from_str(unit: &str) -> Result<Self, Self::Err> {
        match unit {
            "" | "s" => Ok(DurationUnit::Seconds),
            "ms" => Ok(DurationUnit::Milliseconds),
            other => Err(Error::InvalidDurationUnit(other.to_owned())),
        }
    }
}

impl fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 遥测扩展的配置。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub duration_unit: String,
    pub enable_semantic_metrics: bool,
    pub enable_work_span_job_kind_suffix: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            duration_unit: DurationUnit::Seconds.as_str().to_owned(),
            enable_semantic_metrics: false,
            enable_work_span_job_kind_suffix: false,
        }
    }
}

impl TelemetryConfig {
    pub fn with_duration_unit(mut self, unit: DurationUnit) -> Self {
        self.duration_unit = unit.as_str().to_owned();
        self
    }

    pub fn with_semantic_metrics(mut self, enabled: bool) -> Self {
        self.enable_semantic_metrics = enabled;
        self
    }

    pub fn with_work_span_job_kind_suffix(mut self, enabled: bool) -> Self {
        self.enable_work_span_job_kind_suffix = enabled;
        self
    }

    /// 解析并校验时长单位。
    pub fn duration_unit(&self) -> Result<DurationUnit, Error> {
        self.duration_unit.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: TelemetryConfig = toml::from_str("").expect("空配置应可解析");
        assert_eq!(config, TelemetryConfig::default());
        assert_eq!(config.duration_unit().expect("默认单位合法"), DurationUnit::Seconds);
    }

    #[test]
    fn toml_overrides_are_applied() {
        let config: TelemetryConfig = toml::from_str(
            "duration_unit = \"ms\"\nenable_semantic_metrics = true\nenable_work_span_job_kind_suffix = true\n",
        )
        .expect("配置应可解析");

        assert_eq!(config.duration_unit().expect("ms 合法"), DurationUnit::Milliseconds);
        assert!(config.enable_semantic_metrics);
        assert!(config.enable_work_span_job_kind_suffix);
    }

    #[test]
    fn unknown_unit_is_rejected() {
        let config = TelemetryConfig {
            duration_unit: "minutes".to_owned(),
            ..TelemetryConfig::default()
        };
        match config.duration_unit() {
            Err(Error::InvalidDurationUnit(unit)) => assert_eq!(unit, "minutes"),
            other => panic!("期望 InvalidDurationUnit，实际为 {other:?}"),
        }
    }

    #[test]
    fn milliseconds_are_seconds_times_thousand() {
        let elapsed = Duration::from_micros(1_500);
        assert!((DurationUnit::Seconds.convert(elapsed) - 0.0015).abs() < 1e-12);
        assert!((DurationUnit::Milliseconds.convert(elapsed) - 1.5).abs() < 1e-9);
    }
}

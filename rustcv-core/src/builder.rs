/// 打开设备时的配置
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct CameraConfig {
    /// Binning 能力区间的来源
    pub binning: BinningPolicy,

    /// 打开时先停止采集并关闭触发，清理上一次非正常退出留下的状态
    pub reset_on_open: bool,

    /// 按名称选择设备 (不区分大小写的子串匹配)
    pub device_filter: Option<String>,
}

/// Binning 区间是写死还是从设备枚举值推导
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum BinningPolicy {
    /// 固定区间，只对已验证过的机型有效
    HardCoded { low: u8, high: u8 },
    /// 解析 BinningHorizontal 的枚举项 ("X1", "X2", "X4" ...)
    Introspect,
}

impl Default for BinningPolicy {
    fn default() -> Self {
        Self::HardCoded { low: 1, high: 4 }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraConfig {
    pub fn new() -> Self {
        Self {
            binning: BinningPolicy::default(),
            reset_on_open: true,
            device_filter: None,
        }
    }

    /// 设置 Binning 区间来源
    pub fn binning(mut self, policy: BinningPolicy) -> Self {
        self.binning = policy;
        self
    }

    pub fn reset_on_open(mut self, reset: bool) -> Self {
        self.reset_on_open = reset;
        self
    }

    /// 只选择名称中包含 `pattern` 的设备
    pub fn device_filter(mut self, pattern: impl Into<String>) -> Self {
        self.device_filter = Some(pattern.into());
        self
    }

    /// 判断设备名是否满足过滤条件
    pub fn matches(&self, device_name: &str) -> bool {
        match &self.device_filter {
            None => true,
            Some(pattern) => device_name
                .to_lowercase()
                .contains(&pattern.to_lowercase()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = CameraConfig::default();
        assert!(cfg.reset_on_open);
        assert_eq!(cfg.binning, BinningPolicy::HardCoded { low: 1, high: 4 });
        assert!(cfg.matches("anything"));
    }

    #[test]
    fn filter_is_case_insensitive() {
        let cfg = CameraConfig::new().device_filter("vieworks");
        assert!(cfg.matches("VIEWORKS VP-151MX-M6H00 0001"));
        assert!(!cfg.matches("Basler acA1920"));
    }

    #[cfg(feature = "serialize")]
    #[test]
    fn config_serializes() {
        let cfg = CameraConfig::new().binning(BinningPolicy::Introspect);
        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["binning"], "Introspect");
        assert_eq!(json["reset_on_open"], true);
    }
}

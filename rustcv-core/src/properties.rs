use crate::pixel_format::SampleType;

/// 一组相机参数 (设置与回读共用同一结构)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PropertySet {
    /// 曝光时间 (微秒)
    pub exposure_time_us: f32,

    /// 像素合并倍数，水平与垂直相同
    pub binning: u8,

    pub pixel_type: SampleType,

    /// ROI 左上角 (像素)
    pub offset: Point2,

    /// ROI 尺寸 (像素)
    pub shape: Point2,

    pub input_triggers: InputTriggers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Point2 {
    pub x: u32,
    pub y: u32,
}

impl Point2 {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct InputTriggers {
    /// 帧开始触发
    pub frame_start: Trigger,
}

/// 硬件触发配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Trigger {
    pub enable: bool,

    /// 触发源线路
    pub line: TriggerLine,

    /// 信号方向
    pub kind: SignalKind,

    /// 触发极性/边缘
    pub edge: TriggerEdge,
}

impl Default for Trigger {
    fn default() -> Self {
        Self {
            enable: false,
            line: TriggerLine::Line0,
            kind: SignalKind::Input,
            edge: TriggerEdge::Rising,
        }
    }
}

impl Trigger {
    pub fn enabled_on(line: TriggerLine, edge: TriggerEdge) -> Self {
        Self {
            enable: true,
            line,
            kind: SignalKind::Input,
            edge,
        }
    }
}

/// 触发线路：一条硬件输入线，一条软件命令
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum TriggerLine {
    /// 外部硬件线路 0 (Opto-isolated Input)
    Line0 = 0,
    /// 软件触发 (通过 API 调用触发)
    Software = 1,
}

impl TriggerLine {
    pub const ALL: [TriggerLine; 2] = [Self::Line0, Self::Software];

    pub fn index(&self) -> u8 {
        *self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Line0),
            1 => Some(Self::Software),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum SignalKind {
    Input,
    Output,
}

/// 触发极性/边缘枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum TriggerEdge {
    /// 上升沿触发
    Rising,
    /// 下降沿触发
    Falling,
    AnyEdge,
    /// 高电平触发 (Level)
    LevelHigh,
    /// 低电平触发 (Level)
    LevelLow,
    /// 回读时遇到不认识的值
    NotApplicable,
}

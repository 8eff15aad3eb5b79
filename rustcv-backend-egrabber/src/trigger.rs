//! 触发编码：两条线路的启用状态 -> TriggerSource / TriggerMode / TriggerActivation
//!
//! 状态用 2 bit 表示：bit0 = Line0，bit1 = Software。
//! 任意时刻最多只有一条线路处于启用状态。

use std::fmt;

use rustcv_core::error::{CameraError, Result};
use rustcv_core::properties::{SignalKind, Trigger, TriggerEdge, TriggerLine};

use crate::pixel_map::{settable_activation, TRIGGER_MODES, TRIGGER_SOURCES};
use crate::register::{names, RegisterStore};

/// 两条线路的启用位
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct LineMask(u8);

impl LineMask {
    pub const NONE: Self = Self(0b00);
    pub const LINE0: Self = Self(0b01);
    pub const SOFTWARE: Self = Self(0b10);
    pub const BOTH: Self = Self(0b11);

    pub fn from_bits(bits: u8) -> Result<Self> {
        if bits > 0b11 {
            return Err(CameraError::Validation(format!(
                "trigger line mask {bits:#04b} has bits beyond Line0/Software"
            )));
        }
        Ok(Self(bits))
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    /// 单个 Trigger 对应的状态
    pub fn of(trigger: &Trigger) -> Self {
        Self::NONE.with_line(trigger.line, trigger.enable)
    }

    /// 设置/清除某一条线路的启用位，其余位保持不变
    pub fn with_line(self, line: TriggerLine, enabled: bool) -> Self {
        let bit = 1 << line.index();
        if enabled {
            Self(self.0 | bit)
        } else {
            Self(self.0 & !bit)
        }
    }

    pub fn is_enabled(&self, line: TriggerLine) -> bool {
        self.0 & (1 << line.index()) != 0
    }
}

impl fmt::Debug for LineMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LineMask({:#04b})", self.0)
    }
}

/// 一次状态迁移需要写入的三个寄存器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerWrites {
    pub source: TriggerLine,
    pub enable: bool,
    pub activation: TriggerEdge,
}

impl TriggerWrites {
    /// 写入顺序：TriggerSource, TriggerMode, TriggerActivation
    pub fn write(&self, store: &dyn RegisterStore) -> Result<()> {
        let source = TRIGGER_SOURCES
            .name_of(self.source)
            .ok_or_else(|| CameraError::Validation(format!("{:?} has no source name", self.source)))?;
        let mode = TRIGGER_MODES
            .name_of(self.enable)
            .ok_or_else(|| CameraError::Validation("trigger mode has no name".into()))?;
        let activation = activation_name(self.activation)?;

        tracing::debug!(
            target: "rustcv::egrabber",
            "Trigger: source={} mode={} activation={}",
            source,
            mode,
            activation
        );
        store.set_string(names::TRIGGER_SOURCE, source)?;
        store.set_string(names::TRIGGER_MODE, mode)?;
        store.set_string(names::TRIGGER_ACTIVATION, activation)?;
        Ok(())
    }

    /// 写入后设备上的触发状态
    pub fn as_trigger(&self) -> Trigger {
        Trigger {
            enable: self.enable,
            line: self.source,
            kind: SignalKind::Input,
            edge: self.activation,
        }
    }
}

fn activation_name(edge: TriggerEdge) -> Result<&'static str> {
    settable_activation(edge).ok_or_else(|| {
        CameraError::Validation(format!(
            "trigger edge must be Rising or Falling, got {edge:?}"
        ))
    })
}

/// 状态迁移算法
///
/// 返回 `Ok(None)` 表示旧状态本身违反了单线路约束，不做任何写入。
pub fn encode(old: LineMask, requested: LineMask, edge: TriggerEdge) -> Result<Option<TriggerWrites>> {
    activation_name(edge)?;

    if old == LineMask::BOTH {
        tracing::error!(
            target: "rustcv::egrabber",
            "Previous trigger state {:?} has both lines enabled; refusing to change it",
            old
        );
        return Ok(None);
    }

    // 两条都被请求启用：保留调用方刚打开的那一条
    let mut new = requested;
    if new == LineMask::BOTH {
        new = LineMask(old.0 ^ 0b11);
    }
    if new == LineMask::BOTH {
        return Err(CameraError::Validation(format!(
            "cannot resolve trigger request {requested:?} from {old:?}"
        )));
    }

    let selected = match new.0 {
        0 => {
            // 全部关闭：选中刚刚发生变化的那一条
            let changed = old.0 ^ new.0;
            if changed & LineMask::SOFTWARE.0 != 0 && changed & LineMask::LINE0.0 == 0 {
                TriggerLine::Software
            } else {
                TriggerLine::Line0
            }
        }
        bits => TriggerLine::from_index(bits.trailing_zeros() as u8).unwrap_or(TriggerLine::Line0),
    };

    Ok(Some(TriggerWrites {
        source: selected,
        enable: new.is_enabled(selected),
        activation: edge,
    }))
}

/// 按需更新帧开始触发，返回新的已知状态
///
/// 与上次已知状态完全相同时不写任何寄存器。
pub fn apply_trigger(store: &dyn RegisterStore, target: &Trigger, last: &Trigger) -> Result<Trigger> {
    if target == last {
        return Ok(*last);
    }

    if target.kind != SignalKind::Input {
        tracing::debug!(target: "rustcv::egrabber", "Frame start trigger forced to Input");
    }

    let old = LineMask::of(last);
    let requested = old.with_line(target.line, target.enable);

    match encode(old, requested, target.edge)? {
        None => Ok(*last),
        Some(writes) => {
            let resolved = writes.as_trigger();
            if resolved == *last {
                return Ok(*last);
            }
            writes.write(store)?;
            Ok(resolved)
        }
    }
}

/// 校验请求是否可写 (在任何寄存器写入之前调用)
pub fn validate(target: &Trigger) -> Result<()> {
    activation_name(target.edge).map(|_| ())
}

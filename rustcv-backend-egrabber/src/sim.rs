//! 内存中的模拟采集卡
//!
//! 行为尽量贴近 Vieworks VP-151MX + EGrabber：
//! - 寄存器有类型、可写性、单位和取值范围，越界写入会被拒绝
//! - TriggerMode=Off 时自由运行；On 时等待软件触发或 Line0 脉冲
//! - pop_buffer 阻塞，cancel_pop / stop 唤醒等待者
//! - 记录所有寄存器写入，便于测试断言

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use rustcv_core::error::{CameraError, Result};

use crate::discovery::GrabberDiscovery;
use crate::pixel_map;
use crate::register::{names, BufferHandle, BufferInfo, DeliveredBuffer, RegisterStore};

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Str(String),
    Int(i64),
    Float(f64),
}

/// 一次寄存器写入 (或命令执行) 的记录
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRecord {
    pub name: String,
    pub value: String,
}

#[derive(Debug)]
struct PendingFrame {
    sequence: u64,
}

#[derive(Debug)]
struct SimState {
    registers: HashMap<String, Value>,
    read_only: HashSet<String>,
    units: HashMap<String, String>,
    enums: HashMap<String, Vec<String>>,
    /// 寄存器 -> (最小值寄存器, 最大值寄存器)
    ranges: HashMap<String, (&'static str, &'static str)>,
    writes: Vec<WriteRecord>,

    running: bool,
    buffer_count: usize,
    realloc_count: usize,
    outstanding: usize,
    in_flight: HashMap<u64, (BufferInfo, Vec<u8>)>,
    pending: VecDeque<PendingFrame>,
    next_handle: u64,
    next_sequence: u64,
    cancel_generation: u64,
    failing_starts: usize,
    failing_stops: usize,
    delivered_height: Option<u32>,
}

/// 模拟的 EGrabber
#[derive(Debug)]
pub struct SimulatedGrabber {
    state: Mutex<SimState>,
    delivered: Condvar,
}

impl Default for SimulatedGrabber {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedGrabber {
    pub fn new() -> Self {
        Self::with_identity("Vieworks", "VP-151MX-M6H00", "SIM0001")
    }

    pub fn with_identity(vendor: &str, model: &str, serial: &str) -> Self {
        let mut registers = HashMap::new();
        let mut put = |k: &str, v: Value| {
            registers.insert(k.to_string(), v);
        };
        put(names::EXPOSURE_TIME, Value::Float(10_000.0));
        put(names::EXPOSURE_TIME_MIN, Value::Float(10.0));
        put(names::EXPOSURE_TIME_MAX, Value::Float(1e7));
        put(names::BINNING_HORIZONTAL, Value::Int(1));
        put(names::BINNING_VERTICAL, Value::Int(1));
        put(names::OFFSET_X, Value::Int(0));
        put(names::OFFSET_Y, Value::Int(0));
        put(names::OFFSET_X_MIN, Value::Int(0));
        put(names::OFFSET_X_MAX, Value::Int(14176));
        put(names::OFFSET_Y_MIN, Value::Int(0));
        put(names::OFFSET_Y_MAX, Value::Int(10624));
        put(names::WIDTH, Value::Int(64));
        put(names::HEIGHT, Value::Int(48));
        put(names::WIDTH_MIN, Value::Int(16));
        put(names::WIDTH_MAX, Value::Int(14192));
        put(names::HEIGHT_MIN, Value::Int(16));
        put(names::HEIGHT_MAX, Value::Int(10640));
        put(names::PIXEL_FORMAT, Value::Str("Mono8".into()));
        put(names::TRIGGER_SOURCE, Value::Str("Line0".into()));
        put(names::TRIGGER_MODE, Value::Str("Off".into()));
        put(names::TRIGGER_ACTIVATION, Value::Str("RisingEdge".into()));
        put(names::DEVICE_VENDOR_NAME, Value::Str(vendor.into()));
        put(names::DEVICE_MODEL_NAME, Value::Str(model.into()));
        put(names::DEVICE_SERIAL_NUMBER, Value::Str(serial.into()));

        let read_only = [
            names::EXPOSURE_TIME_MIN,
            names::EXPOSURE_TIME_MAX,
            names::OFFSET_X_MIN,
            names::OFFSET_X_MAX,
            names::OFFSET_Y_MIN,
            names::OFFSET_Y_MAX,
            names::WIDTH_MIN,
            names::WIDTH_MAX,
            names::HEIGHT_MIN,
            names::HEIGHT_MAX,
            names::DEVICE_VENDOR_NAME,
            names::DEVICE_MODEL_NAME,
            names::DEVICE_SERIAL_NUMBER,
        ]
        .into_iter()
        .map(String::from)
        .collect();

        let units = HashMap::from([(names::EXPOSURE_TIME.to_string(), "us".to_string())]);

        let to_vec = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let enums = HashMap::from([
            (
                names::PIXEL_FORMAT.to_string(),
                to_vec(&["Mono8", "Mono10", "Mono12", "Mono14", "Mono16", "BayerRG8"]),
            ),
            (names::BINNING_HORIZONTAL.to_string(), to_vec(&["X1", "X2", "X4"])),
            (names::BINNING_VERTICAL.to_string(), to_vec(&["X1", "X2", "X4"])),
            (names::TRIGGER_SOURCE.to_string(), to_vec(&["Line0", "Software"])),
            (names::TRIGGER_MODE.to_string(), to_vec(&["Off", "On"])),
            (
                names::TRIGGER_ACTIVATION.to_string(),
                to_vec(&["RisingEdge", "FallingEdge", "AnyEdge", "LevelHigh", "LevelLow"]),
            ),
        ]);

        let ranges = HashMap::from([
            (
                names::EXPOSURE_TIME.to_string(),
                (names::EXPOSURE_TIME_MIN, names::EXPOSURE_TIME_MAX),
            ),
            (
                names::OFFSET_X.to_string(),
                (names::OFFSET_X_MIN, names::OFFSET_X_MAX),
            ),
            (
                names::OFFSET_Y.to_string(),
                (names::OFFSET_Y_MIN, names::OFFSET_Y_MAX),
            ),
            (names::WIDTH.to_string(), (names::WIDTH_MIN, names::WIDTH_MAX)),
            (names::HEIGHT.to_string(), (names::HEIGHT_MIN, names::HEIGHT_MAX)),
        ]);

        Self {
            state: Mutex::new(SimState {
                registers,
                read_only,
                units,
                enums,
                ranges,
                writes: Vec::new(),
                running: false,
                buffer_count: 0,
                realloc_count: 0,
                outstanding: 0,
                in_flight: HashMap::new(),
                pending: VecDeque::new(),
                next_handle: 0,
                next_sequence: 0,
                cancel_generation: 0,
                failing_starts: 0,
                failing_stops: 0,
                delivered_height: None,
            }),
            delivered: Condvar::new(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, SimState>> {
        self.state.lock().map_err(|_| CameraError::Poisoned)
    }

    // --- 测试辅助 ---

    /// 到目前为止的全部写入记录
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.lock().map(|s| s.writes.clone()).unwrap_or_default()
    }

    pub fn clear_writes(&self) {
        if let Ok(mut s) = self.lock() {
            s.writes.clear();
        }
    }

    /// 某个寄存器被写入的值 (按时间顺序)
    pub fn writes_to(&self, name: &str) -> Vec<String> {
        self.writes()
            .into_iter()
            .filter(|w| w.name == name)
            .map(|w| w.value)
            .collect()
    }

    pub fn realloc_count(&self) -> usize {
        self.lock().map(|s| s.realloc_count).unwrap_or_default()
    }

    pub fn buffer_count(&self) -> usize {
        self.lock().map(|s| s.buffer_count).unwrap_or_default()
    }

    /// 已交付但尚未归还的 Buffer 数
    pub fn outstanding_buffers(&self) -> usize {
        self.lock().map(|s| s.outstanding).unwrap_or_default()
    }

    pub fn is_running(&self) -> bool {
        self.lock().map(|s| s.running).unwrap_or_default()
    }

    /// 让接下来的 `count` 次 start 失败
    pub fn fail_next_starts(&self, count: usize) {
        if let Ok(mut s) = self.lock() {
            s.failing_starts = count;
        }
    }

    /// 让接下来的 `count` 次 stop 失败 (采集保持运行)
    pub fn fail_next_stops(&self, count: usize) {
        if let Ok(mut s) = self.lock() {
            s.failing_stops = count;
        }
    }

    /// 让交付的行数与标称高度不同 (None 恢复正常)
    pub fn set_delivered_height(&self, rows: Option<u32>) {
        if let Ok(mut s) = self.lock() {
            s.delivered_height = rows;
        }
    }

    /// 绕过可写性检查直接改寄存器，模拟硬件侧的变化
    pub fn poke_string(&self, name: &str, value: &str) {
        if let Ok(mut s) = self.lock() {
            s.registers.insert(name.to_string(), Value::Str(value.to_string()));
        }
    }

    pub fn set_writable(&self, name: &str, writable: bool) {
        if let Ok(mut s) = self.lock() {
            if writable {
                s.read_only.remove(name);
            } else {
                s.read_only.insert(name.to_string());
            }
        }
    }

    pub fn set_unit(&self, name: &str, unit: &str) {
        if let Ok(mut s) = self.lock() {
            s.units.insert(name.to_string(), unit.to_string());
        }
    }

    pub fn set_enum_entries(&self, name: &str, entries: &[&str]) {
        if let Ok(mut s) = self.lock() {
            s.enums
                .insert(name.to_string(), entries.iter().map(|e| e.to_string()).collect());
        }
    }

    /// Line0 上的一个外部触发脉冲
    pub fn pulse_line0(&self) -> Result<()> {
        let mut s = self.lock()?;
        if s.triggered_by("Line0") {
            s.queue_frame();
            self.delivered.notify_all();
        }
        Ok(())
    }
}

impl SimState {
    fn string(&self, name: &str) -> Option<&str> {
        match self.registers.get(name) {
            Some(Value::Str(s)) => Some(s),
            _ => None,
        }
    }

    fn int(&self, name: &str) -> Option<i64> {
        match self.registers.get(name) {
            Some(Value::Int(v)) => Some(*v),
            _ => None,
        }
    }

    fn number(&self, name: &str) -> Option<f64> {
        match self.registers.get(name) {
            Some(Value::Int(v)) => Some(*v as f64),
            Some(Value::Float(v)) => Some(*v),
            _ => None,
        }
    }

    fn trigger_on(&self) -> bool {
        self.string(names::TRIGGER_MODE) == Some("On")
    }

    fn triggered_by(&self, source: &str) -> bool {
        self.running && self.trigger_on() && self.string(names::TRIGGER_SOURCE) == Some(source)
    }

    fn queue_frame(&mut self) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.pending.push_back(PendingFrame { sequence });
    }

    fn check_writable(&self, name: &str) -> Result<()> {
        if !self.registers.contains_key(name) {
            return Err(CameraError::register(name, "no such feature"));
        }
        if self.read_only.contains(name) {
            return Err(CameraError::register(name, "feature is not writable"));
        }
        Ok(())
    }

    fn check_range(&self, name: &str, value: f64) -> Result<()> {
        if let Some((lo, hi)) = self.ranges.get(name) {
            let lo = self.number(lo).unwrap_or(f64::MIN);
            let hi = self.number(hi).unwrap_or(f64::MAX);
            if value < lo || value > hi {
                return Err(CameraError::register(
                    name,
                    format!("{value} outside [{lo}, {hi}]"),
                ));
            }
        }
        Ok(())
    }

    fn record(&mut self, name: &str, value: String) {
        self.writes.push(WriteRecord {
            name: name.to_string(),
            value,
        });
    }

    /// 按当前寄存器生成一帧
    fn deliver(&mut self, sequence: u64) -> DeliveredBuffer {
        let width = self.int(names::WIDTH).unwrap_or(0).max(0) as u32;
        let height = self.int(names::HEIGHT).unwrap_or(0).max(0) as u32;
        let delivered_height = self.delivered_height.unwrap_or(height);
        let pixel_format = self.string(names::PIXEL_FORMAT).unwrap_or("Mono8").to_string();
        let bytes_per_sample = pixel_map::from_pixel_format(&pixel_format)
            .bytes_per_sample()
            .max(1);
        let size = width as usize * delivered_height as usize * bytes_per_sample;
        let data = (0..size)
            .map(|i| (sequence as usize).wrapping_add(i) as u8)
            .collect();

        let info = BufferInfo {
            size,
            width,
            height,
            delivered_height,
            pixel_format,
            timestamp_ns: 1_000_000 * (sequence + 1),
        };

        let handle = BufferHandle(self.next_handle);
        self.next_handle += 1;
        self.outstanding += 1;
        self.in_flight.insert(handle.0, (info.clone(), data));
        DeliveredBuffer { handle, info }
    }
}

impl RegisterStore for SimulatedGrabber {
    fn get_string(&self, name: &str) -> Result<String> {
        let s = self.lock()?;
        s.string(name)
            .map(str::to_string)
            .ok_or_else(|| CameraError::register(name, "not a string feature"))
    }

    fn get_integer(&self, name: &str) -> Result<i64> {
        let s = self.lock()?;
        s.int(name)
            .ok_or_else(|| CameraError::register(name, "not an integer feature"))
    }

    fn get_float(&self, name: &str) -> Result<f64> {
        let s = self.lock()?;
        s.number(name)
            .ok_or_else(|| CameraError::register(name, "not a numeric feature"))
    }

    fn set_string(&self, name: &str, value: &str) -> Result<()> {
        let mut s = self.lock()?;
        s.check_writable(name)?;
        if s.string(name).is_none() {
            return Err(CameraError::register(name, "not a string feature"));
        }
        if let Some(entries) = s.enums.get(name) {
            if !entries.iter().any(|e| e == value) {
                return Err(CameraError::register(
                    name,
                    format!("'{value}' is not a valid entry"),
                ));
            }
        }
        s.registers
            .insert(name.to_string(), Value::Str(value.to_string()));
        s.record(name, value.to_string());
        Ok(())
    }

    fn set_integer(&self, name: &str, value: i64) -> Result<()> {
        let mut s = self.lock()?;
        s.check_writable(name)?;
        if s.int(name).is_none() {
            return Err(CameraError::register(name, "not an integer feature"));
        }
        s.check_range(name, value as f64)?;
        s.registers.insert(name.to_string(), Value::Int(value));
        s.record(name, value.to_string());
        Ok(())
    }

    fn set_float(&self, name: &str, value: f64) -> Result<()> {
        let mut s = self.lock()?;
        s.check_writable(name)?;
        if !matches!(s.registers.get(name), Some(Value::Float(_))) {
            return Err(CameraError::register(name, "not a float feature"));
        }
        s.check_range(name, value)?;
        s.registers.insert(name.to_string(), Value::Float(value));
        s.record(name, value.to_string());
        Ok(())
    }

    fn enum_entries(&self, name: &str) -> Result<Vec<String>> {
        let s = self.lock()?;
        s.enums
            .get(name)
            .cloned()
            .ok_or_else(|| CameraError::register(name, "not an enumeration"))
    }

    fn is_writable(&self, name: &str) -> Result<bool> {
        let s = self.lock()?;
        if !s.registers.contains_key(name) {
            return Err(CameraError::register(name, "no such feature"));
        }
        Ok(!s.read_only.contains(name))
    }

    fn unit(&self, name: &str) -> Result<String> {
        let s = self.lock()?;
        Ok(s.units.get(name).cloned().unwrap_or_default())
    }

    fn execute(&self, command: &str) -> Result<()> {
        let mut s = self.lock()?;
        match command {
            names::TRIGGER_SOFTWARE => {
                if s.triggered_by("Software") {
                    s.queue_frame();
                    self.delivered.notify_all();
                }
            }
            names::ACQUISITION_STOP => {}
            other => return Err(CameraError::register(other, "unknown command")),
        }
        s.record(command, String::new());
        Ok(())
    }

    fn width(&self) -> Result<u32> {
        let s = self.lock()?;
        Ok(s.int(names::WIDTH).unwrap_or(0).max(0) as u32)
    }

    fn height(&self) -> Result<u32> {
        let s = self.lock()?;
        Ok(s.int(names::HEIGHT).unwrap_or(0).max(0) as u32)
    }

    fn realloc_buffers(&self, count: usize) -> Result<()> {
        let mut s = self.lock()?;
        s.buffer_count = count;
        s.realloc_count += 1;
        s.pending.clear();
        Ok(())
    }

    fn start(&self) -> Result<()> {
        let mut s = self.lock()?;
        if s.failing_starts > 0 {
            s.failing_starts -= 1;
            return Err(CameraError::SimulationError(
                "start failed after unclean shutdown".into(),
            ));
        }
        if s.buffer_count == 0 {
            return Err(CameraError::Hardware("no buffers allocated".into()));
        }
        s.running = true;
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let mut s = self.lock()?;
        if s.failing_stops > 0 {
            s.failing_stops -= 1;
            return Err(CameraError::SimulationError("stop rejected by the grabber".into()));
        }
        s.running = false;
        s.pending.clear();
        self.delivered.notify_all();
        Ok(())
    }

    fn cancel_pop(&self) -> Result<()> {
        let mut s = self.lock()?;
        s.cancel_generation += 1;
        self.delivered.notify_all();
        Ok(())
    }

    fn pop_buffer(&self) -> Result<DeliveredBuffer> {
        let mut s = self.lock()?;
        if !s.running {
            return Err(CameraError::NotStarted);
        }
        let generation = s.cancel_generation;
        loop {
            if s.cancel_generation != generation || !s.running {
                return Err(CameraError::Cancelled);
            }
            if s.outstanding < s.buffer_count {
                if let Some(frame) = s.pending.pop_front() {
                    return Ok(s.deliver(frame.sequence));
                }
                if !s.trigger_on() {
                    let sequence = s.next_sequence;
                    s.next_sequence += 1;
                    return Ok(s.deliver(sequence));
                }
            }
            s = self
                .delivered
                .wait(s)
                .map_err(|_| CameraError::Poisoned)?;
        }
    }

    fn copy_buffer(&self, buffer: &DeliveredBuffer, dst: &mut [u8]) -> Result<()> {
        let s = self.lock()?;
        let (_, data) = s
            .in_flight
            .get(&buffer.handle.0)
            .ok_or_else(|| CameraError::Hardware(format!("{:?} is not in flight", buffer.handle)))?;
        if dst.len() != data.len() {
            return Err(CameraError::BufferTooSmall {
                required: data.len(),
                capacity: dst.len(),
            });
        }
        dst.copy_from_slice(data);
        Ok(())
    }

    fn requeue_buffer(&self, handle: BufferHandle) -> Result<()> {
        let mut s = self.lock()?;
        if s.in_flight.remove(&handle.0).is_none() {
            return Err(CameraError::Hardware(format!("{handle:?} is not in flight")));
        }
        s.outstanding -= 1;
        self.delivered.notify_all();
        Ok(())
    }
}

/// 模拟的设备发现：固定的一组采集卡
#[derive(Debug, Default)]
pub struct SimulatedDiscovery {
    cameras: Vec<Arc<SimulatedGrabber>>,
}

impl SimulatedDiscovery {
    pub fn new(cameras: Vec<Arc<SimulatedGrabber>>) -> Self {
        Self { cameras }
    }

    pub fn camera(&self, index: usize) -> Option<Arc<SimulatedGrabber>> {
        self.cameras.get(index).cloned()
    }
}

impl GrabberDiscovery for SimulatedDiscovery {
    fn camera_count(&self) -> Result<usize> {
        Ok(self.cameras.len())
    }

    fn connect(&self, index: usize) -> Result<Arc<dyn RegisterStore>> {
        self.cameras
            .get(index)
            .map(|c| c.clone() as Arc<dyn RegisterStore>)
            .ok_or_else(|| CameraError::DeviceNotFound(index.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_and_read_only_writes() {
        let sim = SimulatedGrabber::new();
        assert!(sim.set_float(names::EXPOSURE_TIME, 5.0).is_err());
        assert!(sim.set_integer(names::WIDTH_MAX, 1).is_err());
        assert!(sim.set_string(names::PIXEL_FORMAT, "Mono9").is_err());
        assert!(sim.writes().is_empty());

        sim.set_float(names::EXPOSURE_TIME, 20.0).unwrap();
        assert_eq!(sim.writes_to(names::EXPOSURE_TIME), vec!["20"]);
    }

    #[test]
    fn software_trigger_queues_one_frame() {
        let sim = SimulatedGrabber::new();
        sim.set_string(names::TRIGGER_MODE, "On").unwrap();
        sim.set_string(names::TRIGGER_SOURCE, "Software").unwrap();
        sim.realloc_buffers(2).unwrap();
        sim.start().unwrap();

        sim.execute(names::TRIGGER_SOFTWARE).unwrap();
        let buffer = sim.pop_buffer().unwrap();
        assert_eq!(buffer.info.size, 64 * 48);
        assert_eq!(sim.outstanding_buffers(), 1);
        sim.requeue_buffer(buffer.handle).unwrap();
        assert_eq!(sim.outstanding_buffers(), 0);
    }

    #[test]
    fn pop_requires_running() {
        let sim = SimulatedGrabber::new();
        assert!(matches!(sim.pop_buffer(), Err(CameraError::NotStarted)));
    }
}

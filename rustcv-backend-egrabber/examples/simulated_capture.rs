use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rustcv_backend_egrabber::sim::{SimulatedDiscovery, SimulatedGrabber};
use rustcv_backend_egrabber::{EGrabberDriver, EGrabberStream};
use rustcv_core::prelude::*;
use rustcv_core::properties::{InputTriggers, Point2};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 初始化日志，以便看到驱动里的 tracing::info!
    tracing_subscriber::fmt::init();

    println!("=== RustCV EGrabber Backend Demo (simulated) ===");

    // 2. 实例化驱动 (用模拟采集卡代替真实硬件)
    let discovery = Arc::new(SimulatedDiscovery::new(vec![Arc::new(SimulatedGrabber::new())]));
    let driver = EGrabberDriver::new(discovery);

    // 3. 枚举设备
    let devices = driver.list_devices()?;
    if devices.is_empty() {
        anyhow::bail!("No cameras found!");
    }
    for dev in &devices {
        println!("  [{}] {} ({})", dev.id, dev.name, dev.backend);
    }

    // 4. 打开并配置
    let config = CameraConfig::new().binning(BinningPolicy::Introspect);
    let camera = Arc::new(driver.open_camera(&devices[0].id, config)?);

    let caps = camera.query_capabilities()?;
    println!(
        "Exposure range: {}..{} us, binning {}..{}, pixel types {:?}",
        caps.exposure_time_us.low,
        caps.exposure_time_us.high,
        caps.binning.low,
        caps.binning.high,
        caps.supported_pixel_types.iter_types().collect::<Vec<_>>()
    );

    let target = PropertySet {
        exposure_time_us: 5_000.0,
        shape: Point2::new(128, 64),
        input_triggers: InputTriggers {
            frame_start: Trigger::enabled_on(TriggerLine::Software, TriggerEdge::Rising),
        },
        ..camera.query_properties()?
    };
    camera.apply_properties(&target)?;
    println!("State: {}", serde_json::to_string_pretty(&camera.export_state()?)?);

    // 5. 软件触发取帧
    let mut stream = EGrabberStream::new(camera.clone());
    stream.start().await?;

    let mut buf = Vec::new();
    for _ in 0..5 {
        camera.fire_software_trigger()?;
        let info = stream
            .next_frame_timeout(&mut buf, Duration::from_secs(1))
            .await
            .context("waiting for triggered frame")?;
        println!(
            "Frame #{}: {}x{} {} ({} bytes) ts={}ns",
            info.hardware_frame_id,
            info.shape.dims.width,
            info.shape.dims.height,
            info.shape.sample_type,
            buf.len(),
            info.hardware_timestamp
        );
    }

    stream.stop().await?;
    println!("Done.");
    Ok(())
}

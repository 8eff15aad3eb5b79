use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use rustcv_backend_egrabber::register::names;
use rustcv_backend_egrabber::sim::SimulatedGrabber;
use rustcv_backend_egrabber::{EGrabberCamera, RegisterStore};
use rustcv_core::builder::CameraConfig;
use rustcv_core::error::CameraError;
use rustcv_core::frame::ImageInfo;
use rustcv_core::properties::{InputTriggers, PropertySet, Trigger, TriggerEdge, TriggerLine};

fn open(sim: &Arc<SimulatedGrabber>) -> Result<Arc<EGrabberCamera>> {
    let store: Arc<dyn RegisterStore> = sim.clone();
    Ok(Arc::new(EGrabberCamera::open(store, CameraConfig::default())?))
}

fn with_trigger(camera: &EGrabberCamera, line: TriggerLine) -> Result<()> {
    let target = PropertySet {
        input_triggers: InputTriggers {
            frame_start: Trigger::enabled_on(line, TriggerEdge::Rising),
        },
        ..camera.query_properties()?
    };
    camera.apply_properties(&target)?;
    Ok(())
}

fn grab(camera: &EGrabberCamera) -> rustcv_core::error::Result<ImageInfo> {
    let mut buf = vec![0u8; 64 * 48];
    let mut nbytes = buf.len();
    let mut info = ImageInfo::default();
    camera.acquire_frame(&mut buf, &mut nbytes, &mut info)?;
    Ok(info)
}

#[test]
fn stop_unblocks_waiting_get_frame() -> Result<()> {
    let sim = Arc::new(SimulatedGrabber::new());
    let camera = open(&sim)?;
    with_trigger(&camera, TriggerLine::Software)?;
    camera.start_acquisition()?;

    // 没有触发，取帧会一直阻塞
    let waiter = {
        let camera = camera.clone();
        thread::spawn(move || grab(&camera))
    };
    thread::sleep(Duration::from_millis(50));
    assert!(!waiter.is_finished());

    camera.stop_acquisition()?;
    let result = waiter.join().expect("waiter panicked");
    assert!(matches!(result, Err(CameraError::Cancelled)));
    assert_eq!(sim.outstanding_buffers(), 0);
    Ok(())
}

#[test]
fn software_trigger_delivers_one_frame_per_pulse() -> Result<()> {
    let sim = Arc::new(SimulatedGrabber::new());
    let camera = open(&sim)?;
    with_trigger(&camera, TriggerLine::Software)?;
    camera.start_acquisition()?;

    for expected in 0..3 {
        camera.fire_software_trigger()?;
        let info = grab(&camera)?;
        assert_eq!(info.hardware_frame_id, expected);
    }
    camera.stop_acquisition()?;
    Ok(())
}

#[test]
fn line0_pulses_drive_acquisition() -> Result<()> {
    let sim = Arc::new(SimulatedGrabber::new());
    let camera = open(&sim)?;
    with_trigger(&camera, TriggerLine::Line0)?;
    camera.start_acquisition()?;

    // 软件触发对 Line0 模式无效
    camera.fire_software_trigger()?;
    sim.pulse_line0()?;
    let info = grab(&camera)?;
    assert_eq!(info.hardware_frame_id, 0);
    assert_eq!(info.hardware_timestamp, 1_000_000);
    camera.stop_acquisition()?;
    Ok(())
}

#[test]
fn start_recovers_from_one_failure() -> Result<()> {
    let sim = Arc::new(SimulatedGrabber::new());
    let camera = open(&sim)?;

    sim.fail_next_starts(1);
    camera.start_acquisition()?;
    assert!(sim.is_running());
    assert_eq!(sim.buffer_count(), 16);

    let info = grab(&camera)?;
    assert_eq!(info.hardware_frame_id, 0);
    Ok(())
}

#[test]
fn restart_resets_frame_ids() -> Result<()> {
    let sim = Arc::new(SimulatedGrabber::new());
    let camera = open(&sim)?;

    camera.start_acquisition()?;
    for _ in 0..4 {
        grab(&camera)?;
    }
    camera.stop_acquisition()?;

    camera.start_acquisition()?;
    assert_eq!(grab(&camera)?.hardware_frame_id, 0);
    assert_eq!(grab(&camera)?.hardware_frame_id, 1);
    Ok(())
}

#[test]
fn concurrent_configuration_while_grabbing() -> Result<()> {
    let sim = Arc::new(SimulatedGrabber::new());
    let camera = open(&sim)?;
    camera.start_acquisition()?;

    let grabber = {
        let camera = camera.clone();
        thread::spawn(move || -> rustcv_core::error::Result<u64> {
            let mut last = 0;
            for _ in 0..20 {
                last = grab(&camera)?.hardware_frame_id;
            }
            Ok(last)
        })
    };

    for exposure in [100.0, 200.0, 300.0] {
        let target = PropertySet {
            exposure_time_us: exposure,
            ..camera.query_properties()?
        };
        camera.apply_properties(&target)?;
    }

    assert_eq!(grabber.join().expect("grabber panicked")?, 19);
    assert_eq!(sim.get_float(names::EXPOSURE_TIME)?, 300.0);
    Ok(())
}

use log::{error, info, warn};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::Sender,
    },
    thread,
    time::Duration,
};

use evdev::Device;

use super::{Clock, SessionMsg};
use crate::error::{SwipeError, SwipeResult};
use crate::input::{AxisScale, DeviceInfo, PointerTranslator};
use crate::types::InputSource;

/// Read the given devices until `stop` is raised, forwarding pointer events.
/// Devices are grabbed for the whole session so swipes do not leak to the desktop.
pub fn spawn(
    devices: Vec<DeviceInfo>,
    tx: Sender<SessionMsg>,
    clock: Clock,
    stop: Arc<AtomicBool>,
) -> SwipeResult<thread::JoinHandle<()>> {
    let mut opened: Vec<(Device, PointerTranslator)> = vec![];
    for d in &devices {
        match Device::open(&d.path) {
            Ok(mut dev) => {
                let _ = dev.set_nonblocking(true);
                let scale = match d.source {
                    InputSource::Touch => AxisScale::for_device(&dev),
                    InputSource::Mouse => AxisScale::default(),
                };
                info!(
                    "input: reading {} ({:?}) at {}, scale {:.3}x{:.3}",
                    d.name, d.source, d.path, scale.x, scale.y
                );
                opened.push((dev, PointerTranslator::with_scale(d.source, scale)));
            }
            Err(e) => warn!("failed to open {}: {e}", d.path),
        }
    }
    if opened.is_empty() {
        return Err(SwipeError::Config(
            "no usable touch or pointer device could be opened".into(),
        ));
    }

    let handle = thread::Builder::new()
        .name("swiperace-input".into())
        .spawn(move || run(opened, tx, clock, stop))?;
    Ok(handle)
}

fn run(
    mut devs: Vec<(Device, PointerTranslator)>,
    tx: Sender<SessionMsg>,
    clock: Clock,
    stop: Arc<AtomicBool>,
) {
    for (d, _) in devs.iter_mut() {
        if let Err(e) = d.grab() {
            warn!("input: could not grab device: {e}");
        }
    }

    'outer: while !stop.load(Ordering::SeqCst) {
        let mut any_event = false;

        for (dev, translator) in devs.iter_mut() {
            let Ok(events) = dev.fetch_events() else {
                continue;
            };
            for ev in events {
                any_event = true;
                let now = clock.now_ms();
                if let Some(p) = translator.feed(ev.event_type(), ev.code(), ev.value(), now) {
                    if tx.send(SessionMsg::Pointer(p)).is_err() {
                        error!("input: session channel closed");
                        break 'outer;
                    }
                }
            }
        }

        if !any_event {
            thread::sleep(Duration::from_millis(4));
        }
    }

    for (d, _) in devs.iter_mut() {
        let _ = d.ungrab();
    }
    info!("input: released devices");
}

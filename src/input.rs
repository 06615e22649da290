//! Input device discovery and evdev → pointer event translation (evdev 0.13).

use evdev::{
    AbsoluteAxisCode, Device, EventType, KeyCode, RelativeAxisCode, SynchronizationCode,
};
use log::warn;

use crate::types::{InputSource, PIXELS_PER_INCH, PointerEvent, PointerKind};

const MM_PER_INCH: f64 = 25.4;

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub source: InputSource,
}

/// Touchscreens report absolute contacts; mice report relative motion plus a button.
fn classify(dev: &Device) -> Option<InputSource> {
    let events = dev.supported_events();
    if events.contains(EventType::ABSOLUTE) {
        if let Some(axes) = dev.supported_absolute_axes() {
            let mt = axes.contains(AbsoluteAxisCode::ABS_MT_POSITION_X)
                && axes.contains(AbsoluteAxisCode::ABS_MT_POSITION_Y);
            let single = axes.contains(AbsoluteAxisCode::ABS_X)
                && axes.contains(AbsoluteAxisCode::ABS_Y)
                && dev
                    .supported_keys()
                    .is_some_and(|k| k.contains(KeyCode::BTN_TOUCH));
            if mt || single {
                return Some(InputSource::Touch);
            }
        }
    }
    if events.contains(EventType::RELATIVE) {
        let rel = dev.supported_relative_axes().is_some_and(|a| {
            a.contains(RelativeAxisCode::REL_X) && a.contains(RelativeAxisCode::REL_Y)
        });
        let button = dev
            .supported_keys()
            .is_some_and(|k| k.contains(KeyCode::BTN_LEFT));
        if rel && button {
            return Some(InputSource::Mouse);
        }
    }
    None
}

/// Multiplier from absolute device units to 160-PPI pixels, per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisScale {
    pub x: f64,
    pub y: f64,
}

impl Default for AxisScale {
    fn default() -> Self {
        Self { x: 1.0, y: 1.0 }
    }
}

impl AxisScale {
    /// From kernel resolutions in units per millimetre. A zero resolution
    /// means the driver did not report one; that axis is left unscaled.
    pub fn from_resolution(x_units_per_mm: i32, y_units_per_mm: i32) -> Self {
        let factor = |res: i32| {
            if res > 0 {
                PIXELS_PER_INCH / (res as f64 * MM_PER_INCH)
            } else {
                1.0
            }
        };
        Self {
            x: factor(x_units_per_mm),
            y: factor(y_units_per_mm),
        }
    }

    /// Read the position axes of an absolute device. Multitouch axes win over
    /// the single-touch pair.
    pub fn for_device(dev: &Device) -> Self {
        let Ok(infos) = dev.get_absinfo() else {
            return Self::default();
        };
        let (mut mt, mut single) = ((0, 0), (0, 0));
        for (code, info) in infos {
            let res = info.resolution();
            if code == AbsoluteAxisCode::ABS_MT_POSITION_X {
                mt.0 = res;
            } else if code == AbsoluteAxisCode::ABS_MT_POSITION_Y {
                mt.1 = res;
            } else if code == AbsoluteAxisCode::ABS_X {
                single.0 = res;
            } else if code == AbsoluteAxisCode::ABS_Y {
                single.1 = res;
            }
        }
        let (rx, ry) = if mt != (0, 0) { mt } else { single };
        if rx <= 0 || ry <= 0 {
            warn!(
                "input: {} reports no axis resolution; treating units as pixels",
                dev.name().unwrap_or("device")
            );
        }
        Self::from_resolution(rx, ry)
    }
}

pub fn discover() -> Vec<DeviceInfo> {
    let mut out = vec![];
    if let Ok(rd) = std::fs::read_dir("/dev/input") {
        for e in rd.flatten() {
            let p = e.path();
            if !p
                .file_name()
                .and_then(|s| s.to_str())
                .is_some_and(|s| s.starts_with("event"))
            {
                continue;
            }
            if let Ok(dev) = Device::open(&p) {
                if let Some(source) = classify(&dev) {
                    out.push(DeviceInfo {
                        path: p.display().to_string(),
                        name: dev.name().unwrap_or("unknown").to_string(),
                        source,
                    });
                }
            }
        }
    }
    // touchscreens first, they are the intended controller
    out.sort_by_key(|d| (d.source != InputSource::Touch, d.path.clone()));
    out
}

/// Folds raw evdev events from one device into at most one pointer event per
/// `SYN_REPORT`. Multitouch devices are read as a single finger (slot 0);
/// relative devices integrate their deltas into a virtual cursor.
#[derive(Debug)]
pub struct PointerTranslator {
    source: InputSource,
    scale: AxisScale,
    slot: i32,
    x: f64,
    y: f64,
    seen_x: bool,
    seen_y: bool,
    contact: bool,
    pending_down: bool,
    pending_up: bool,
    moved: bool,
}

impl PointerTranslator {
    pub fn new(source: InputSource) -> Self {
        Self::with_scale(source, AxisScale::default())
    }

    /// Absolute positions are multiplied by `scale` before they are emitted.
    pub fn with_scale(source: InputSource, scale: AxisScale) -> Self {
        Self {
            source,
            scale,
            slot: 0,
            x: 0.0,
            y: 0.0,
            seen_x: false,
            seen_y: false,
            contact: source == InputSource::Mouse,
            pending_down: false,
            pending_up: false,
            moved: false,
        }
    }

    pub fn feed(&mut self, ty: EventType, code: u16, value: i32, t_ms: u64) -> Option<PointerEvent> {
        if ty == EventType::ABSOLUTE {
            self.on_abs(code, value);
        } else if ty == EventType::RELATIVE {
            self.on_rel(code, value);
        } else if ty == EventType::KEY {
            self.on_key(code, value);
        } else if ty == EventType::SYNCHRONIZATION && code == SynchronizationCode::SYN_REPORT.0 {
            return self.on_syn_report(t_ms);
        }
        None
    }

    fn on_abs(&mut self, code: u16, value: i32) {
        match code {
            c if c == AbsoluteAxisCode::ABS_MT_SLOT.0 => self.slot = value,
            // other fingers are ignored
            _ if self.slot != 0 => {}
            c if c == AbsoluteAxisCode::ABS_MT_TRACKING_ID.0 => {
                if value < 0 {
                    self.pending_up = true;
                } else {
                    self.pending_down = true;
                    self.seen_x = false;
                    self.seen_y = false;
                }
            }
            c if c == AbsoluteAxisCode::ABS_MT_POSITION_X.0 || c == AbsoluteAxisCode::ABS_X.0 => {
                self.x = value as f64 * self.scale.x;
                self.seen_x = true;
                self.moved = true;
            }
            c if c == AbsoluteAxisCode::ABS_MT_POSITION_Y.0 || c == AbsoluteAxisCode::ABS_Y.0 => {
                self.y = value as f64 * self.scale.y;
                self.seen_y = true;
                self.moved = true;
            }
            _ => {}
        }
    }

    fn on_rel(&mut self, code: u16, value: i32) {
        if code == RelativeAxisCode::REL_X.0 {
            self.x += value as f64;
            self.moved = true;
        } else if code == RelativeAxisCode::REL_Y.0 {
            self.y += value as f64;
            self.moved = true;
        }
    }

    fn on_key(&mut self, code: u16, value: i32) {
        let relevant = match self.source {
            InputSource::Touch => code == KeyCode::BTN_TOUCH.0,
            InputSource::Mouse => code == KeyCode::BTN_LEFT.0,
        };
        if !relevant {
            return;
        }
        match value {
            1 => self.pending_down = true,
            0 => self.pending_up = true,
            _ => {} // autorepeat
        }
    }

    fn on_syn_report(&mut self, t_ms: u64) -> Option<PointerEvent> {
        let moved = std::mem::take(&mut self.moved);
        let kind = if std::mem::take(&mut self.pending_up) {
            self.pending_down = false;
            self.contact = self.source == InputSource::Mouse;
            PointerKind::Up
        } else if self.pending_down {
            if self.source == InputSource::Touch && !(self.seen_x && self.seen_y) {
                // wait for a full position before starting the contact
                return None;
            }
            self.pending_down = false;
            self.contact = true;
            PointerKind::Down
        } else if moved && self.contact {
            PointerKind::Move
        } else {
            return None;
        };
        Some(PointerEvent::new(kind, self.source, self.x, self.y, t_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abs(t: &mut PointerTranslator, code: AbsoluteAxisCode, v: i32) {
        assert!(t.feed(EventType::ABSOLUTE, code.0, v, 0).is_none());
    }

    fn syn(t: &mut PointerTranslator, t_ms: u64) -> Option<PointerEvent> {
        t.feed(EventType::SYNCHRONIZATION, SynchronizationCode::SYN_REPORT.0, 0, t_ms)
    }

    #[test]
    fn touch_contact_lifecycle() {
        let mut t = PointerTranslator::new(InputSource::Touch);
        abs(&mut t, AbsoluteAxisCode::ABS_MT_TRACKING_ID, 7);
        abs(&mut t, AbsoluteAxisCode::ABS_MT_POSITION_X, 100);
        abs(&mut t, AbsoluteAxisCode::ABS_MT_POSITION_Y, 200);
        let down = syn(&mut t, 10).unwrap();
        assert_eq!(down.kind, PointerKind::Down);
        assert_eq!((down.x, down.y, down.t_ms), (100.0, 200.0, 10));

        abs(&mut t, AbsoluteAxisCode::ABS_MT_POSITION_Y, 260);
        let mv = syn(&mut t, 30).unwrap();
        assert_eq!(mv.kind, PointerKind::Move);
        assert_eq!(mv.y, 260.0);

        // nothing changed
        assert!(syn(&mut t, 40).is_none());

        abs(&mut t, AbsoluteAxisCode::ABS_MT_TRACKING_ID, -1);
        assert_eq!(syn(&mut t, 50).unwrap().kind, PointerKind::Up);
    }

    #[test]
    fn absolute_units_become_screen_pixels() {
        // 10 units/mm is 254 units per inch
        let scale = AxisScale::from_resolution(10, 10);
        assert!((scale.y - 160.0 / 254.0).abs() < 1e-12);

        let mut t = PointerTranslator::with_scale(InputSource::Touch, scale);
        abs(&mut t, AbsoluteAxisCode::ABS_MT_TRACKING_ID, 3);
        abs(&mut t, AbsoluteAxisCode::ABS_MT_POSITION_X, 0);
        abs(&mut t, AbsoluteAxisCode::ABS_MT_POSITION_Y, 0);
        syn(&mut t, 0).unwrap();

        // one inch of travel on the panel
        abs(&mut t, AbsoluteAxisCode::ABS_MT_POSITION_Y, 254);
        let mv = syn(&mut t, 100).unwrap();
        assert!((mv.y - 160.0).abs() < 1e-9);

        let mut sampler = crate::sampler::MotionSampler::new(crate::types::Direction::Vertical);
        sampler.on_event(&PointerEvent::touch_down(0.0, 0.0, 0));
        let sample = sampler.on_event(&mv).unwrap();
        assert!((sample.ips - 10.0).abs() < 1e-9);
        assert!(sample.in_domain());
    }

    #[test]
    fn missing_resolution_leaves_axis_unscaled() {
        assert_eq!(AxisScale::from_resolution(0, 0), AxisScale::default());
        let s = AxisScale::from_resolution(0, 5);
        assert_eq!(s.x, 1.0);
        assert!(s.y < 1.0);
    }

    #[test]
    fn second_finger_is_ignored() {
        let mut t = PointerTranslator::new(InputSource::Touch);
        abs(&mut t, AbsoluteAxisCode::ABS_MT_TRACKING_ID, 1);
        abs(&mut t, AbsoluteAxisCode::ABS_MT_POSITION_X, 0);
        abs(&mut t, AbsoluteAxisCode::ABS_MT_POSITION_Y, 0);
        syn(&mut t, 0).unwrap();

        abs(&mut t, AbsoluteAxisCode::ABS_MT_SLOT, 1);
        abs(&mut t, AbsoluteAxisCode::ABS_MT_TRACKING_ID, 2);
        abs(&mut t, AbsoluteAxisCode::ABS_MT_POSITION_Y, 900);
        assert!(syn(&mut t, 20).is_none());
    }

    #[test]
    fn mouse_integrates_relative_motion() {
        let mut t = PointerTranslator::new(InputSource::Mouse);
        assert!(t.feed(EventType::KEY, KeyCode::BTN_LEFT.0, 1, 0).is_none());
        assert_eq!(syn(&mut t, 0).unwrap().kind, PointerKind::Down);

        t.feed(EventType::RELATIVE, RelativeAxisCode::REL_Y.0, 30, 0);
        t.feed(EventType::RELATIVE, RelativeAxisCode::REL_Y.0, 10, 0);
        let mv = syn(&mut t, 25).unwrap();
        assert_eq!(mv.kind, PointerKind::Move);
        assert_eq!(mv.y, 40.0);
        assert_eq!(mv.source, InputSource::Mouse);

        t.feed(EventType::KEY, KeyCode::BTN_LEFT.0, 0, 0);
        assert_eq!(syn(&mut t, 30).unwrap().kind, PointerKind::Up);
    }
}

//! Local touch gestures to device touch commands.
//!
//! A gesture sample becomes one or more ASCII lines, terminated by a
//! commit line:
//!
//! ```text
//! d <id> <x> <y> <pressure> <major> <minor> \n    contact down
//! m <id> <x> <y> <pressure> <major> <minor> \n    contact moved
//! u <id> \n                                       contact lifted
//! c\n                                             commit
//! ```
//!
//! Coordinates are mapped from the local view into the device's touch
//! space with a [`TouchMapping`], which the session publishes once both the
//! touch capabilities and the video geometry are known.

use std::fmt::Write as _;
use std::sync::Arc;

use tokio::sync::watch;

use crate::protocol::{Rect, TouchSetting};

/// Pressure sent for a sample reporting exactly 1.0.
const DEFAULT_PRESSURE: i32 = 50;
/// Contact size sent when the local sample reports none.
const DEFAULT_AXIS: i32 = 5;

// ── TouchMapping ─────────────────────────────────────────────────

/// Everything needed to map a local point into device touch space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchMapping {
    setting: TouchSetting,
    area: Rect,
    status_bar_height: i32,
    virtual_bar_height: i32,
}

impl TouchMapping {
    /// `area` is where the remote screen is drawn in the local view; bar
    /// heights are in device pixels.
    pub fn new(
        setting: TouchSetting,
        area: Rect,
        status_bar_height: i32,
        virtual_bar_height: i32,
    ) -> Self {
        Self {
            setting,
            area,
            status_bar_height,
            virtual_bar_height,
        }
    }

    pub fn setting(&self) -> &TouchSetting {
        &self.setting
    }

    pub fn area(&self) -> Rect {
        self.area
    }

    /// A mapping with an empty area or zero device extent maps nothing.
    pub fn is_usable(&self) -> bool {
        self.area.width() > 0 && self.area.height() > 0 && self.setting.x > 0 && self.setting.y > 0
    }

    fn scale_x(&self) -> f64 {
        f64::from(self.area.width()) / f64::from(self.setting.x)
    }

    fn scale_y(&self) -> f64 {
        f64::from(self.area.height()) / f64::from(self.setting.y)
    }

    /// Map a local point into device coordinates.
    ///
    /// In landscape the view shows the device rotated, so the axes swap.
    /// The result's y never lands on the status or navigation bar.
    pub fn point(&self, x: f32, y: f32, landscape: bool) -> (i32, i32) {
        let x = f64::from(x) - f64::from(self.area.left);
        let y = f64::from(y) - f64::from(self.area.top);
        let (tx, ty) = if landscape {
            (
                ((f64::from(self.area.height()) - y) / self.scale_y()) as i32,
                (x / self.scale_x()) as i32,
            )
        } else {
            ((x / self.scale_x()) as i32, (y / self.scale_y()) as i32)
        };
        let ty = ty
            .max(self.status_bar_height + 1)
            .min(self.setting.y - self.virtual_bar_height);
        (tx, ty)
    }

    pub fn pressure(&self, local: f32) -> i32 {
        if self.setting.pressure == 0 {
            0
        } else if local == 1.0 {
            DEFAULT_PRESSURE
        } else {
            (local * self.setting.pressure as f32) as i32
        }
    }

    pub fn major(&self, local: f32) -> i32 {
        axis(local, self.setting.major)
    }

    pub fn minor(&self, local: f32) -> i32 {
        axis(local, self.setting.minor)
    }
}

fn axis(local: f32, range: i32) -> i32 {
    if range == 0 {
        0
    } else if local == 0.0 {
        DEFAULT_AXIS
    } else {
        (local as i32).min(range)
    }
}

// ── TouchEvent ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchAction {
    /// First contact down.
    Down,
    /// Additional contact down.
    PointerDown,
    Move,
    /// A contact lifted while others remain.
    PointerUp,
    /// Last contact lifted.
    Up,
    Cancel,
}

/// One contact in a gesture sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pointer {
    /// Platform pointer id, sent to the device unchanged.
    pub id: i32,
    pub x: f32,
    pub y: f32,
    pub pressure: f32,
    pub touch_major: f32,
    pub touch_minor: f32,
}

impl Pointer {
    pub fn new(id: i32, x: f32, y: f32) -> Self {
        Self {
            id,
            x,
            y,
            pressure: 1.0,
            touch_major: 0.0,
            touch_minor: 0.0,
        }
    }
}

/// A local gesture sample.
#[derive(Debug, Clone, PartialEq)]
pub struct TouchEvent {
    pub action: TouchAction,
    /// Index into `pointers` of the contact the action applies to.
    pub action_index: usize,
    pub pointers: Vec<Pointer>,
}

impl TouchEvent {
    pub fn new(action: TouchAction, action_index: usize, pointers: Vec<Pointer>) -> Self {
        Self {
            action,
            action_index,
            pointers,
        }
    }
}

// ── Encoding ─────────────────────────────────────────────────────

/// Encode one gesture sample with a known mapping.
///
/// Returns `None` when no line was produced.
pub fn encode(mapping: &TouchMapping, landscape: bool, event: &TouchEvent) -> Option<String> {
    if !mapping.is_usable() {
        return None;
    }

    let mut out = String::new();
    match event.action {
        TouchAction::Down | TouchAction::PointerDown => {
            if let Some(p) = event.pointers.get(event.action_index) {
                contact_line(&mut out, 'd', p, mapping, landscape);
            }
        }
        TouchAction::Move => {
            for p in &event.pointers {
                contact_line(&mut out, 'm', p, mapping, landscape);
            }
        }
        TouchAction::PointerUp => {
            if let Some(p) = event.pointers.get(event.action_index) {
                let _ = writeln!(out, "u {} ", p.id);
            }
        }
        TouchAction::Up | TouchAction::Cancel => {
            if let Some(p) = event.pointers.first() {
                let _ = writeln!(out, "u {} ", p.id);
            }
        }
    }

    if out.is_empty() {
        return None;
    }
    out.push_str("c\n");
    Some(out)
}

fn contact_line(
    out: &mut String,
    kind: char,
    p: &Pointer,
    mapping: &TouchMapping,
    landscape: bool,
) {
    if p.x < 0.0 || p.y < 0.0 {
        return;
    }
    let (x, y) = mapping.point(p.x, p.y, landscape);
    let _ = writeln!(
        out,
        "{kind} {} {x} {y} {} {} {} ",
        p.id,
        mapping.pressure(p.pressure),
        mapping.major(p.touch_major),
        mapping.minor(p.touch_minor),
    );
}

// ── TouchEncoder ─────────────────────────────────────────────────

/// Encodes gestures against the session's current mapping.
///
/// The mapping is swapped as a whole by the session; the encoder always
/// sees either the old or the new one.
#[derive(Debug, Clone)]
pub struct TouchEncoder {
    mapping: watch::Receiver<Option<Arc<TouchMapping>>>,
    landscape: bool,
}

impl TouchEncoder {
    pub fn new(mapping: watch::Receiver<Option<Arc<TouchMapping>>>) -> Self {
        Self {
            mapping,
            landscape: false,
        }
    }

    pub fn set_landscape(&mut self, landscape: bool) {
        self.landscape = landscape;
    }

    pub fn is_landscape(&self) -> bool {
        self.landscape
    }

    /// Current mapping, if the device has announced one.
    pub fn mapping(&self) -> Option<Arc<TouchMapping>> {
        self.mapping.borrow().clone()
    }

    /// Encode a sample; `None` if no mapping is known or nothing applies.
    pub fn encode(&self, event: &TouchEvent) -> Option<String> {
        let mapping = self.mapping()?;
        encode(&mapping, self.landscape, event)
    }
}

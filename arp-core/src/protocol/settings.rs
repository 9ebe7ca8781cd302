//! Device-reported settings: touch capabilities and media format.
//!
//! Both arrive as the `data` body of a control message. Missing integer
//! fields default to zero, matching what the device omits.

use serde::{Deserialize, Serialize};

// ── Rect ─────────────────────────────────────────────────────────

/// Axis-aligned rectangle in local view pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

// ── TouchSetting ─────────────────────────────────────────────────

/// Remote touch capability descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TouchSetting {
    /// Maximum simultaneous contacts.
    pub contacts: i32,
    /// Touch coordinate extent on the x axis.
    pub x: i32,
    /// Touch coordinate extent on the y axis.
    pub y: i32,
    /// Pressure range (0 = not reported).
    pub pressure: i32,
    /// Touch-major range (0 = not reported).
    pub major: i32,
    /// Touch-minor range (0 = not reported).
    pub minor: i32,
}

// ── VideoInfo ────────────────────────────────────────────────────

/// Media-format settings announced by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoInfo {
    /// Coded video width.
    pub width: i32,
    /// Coded video height.
    pub height: i32,
    pub quality: i32,
    /// Remote screen width.
    pub resolution_width: i32,
    /// Remote screen height.
    pub resolution_height: i32,
    /// Remote status bar height, in remote screen pixels.
    pub status_bar_height: i32,
    /// Remote navigation bar height, in remote screen pixels.
    pub virtual_bar_height: i32,
}

impl VideoInfo {
    /// All dimensions a pipeline and the touch mapping depend on are set.
    pub fn is_complete(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.resolution_width > 0
            && self.resolution_height > 0
    }

    /// Where the remote screen lands inside a local view of the given size.
    ///
    /// The video may carry padding when the device aspect ratio differs
    /// from the coded one; the returned rectangle is centred and excludes
    /// that padding.
    pub fn display_rect(&self, view_width: i32, view_height: i32) -> Rect {
        let video_scale = self.width as f64 / self.height as f64;
        let device_scale = self.resolution_width as f64 / self.resolution_height as f64;
        let scale_y = self.height as f64 / self.resolution_height as f64;
        let scale_x = self.width as f64 / self.resolution_width as f64;

        let mut video_width = view_width;
        let mut video_height = view_height;
        if video_scale > device_scale {
            video_width = (video_width as f64 * scale_y / scale_x) as i32;
        } else {
            video_height = (video_height as f64 * scale_x / scale_y) as i32;
        }

        let left = (view_width - video_width) / 2;
        let top = (view_height - video_height) / 2;
        Rect::new(left, top, left + video_width, top + video_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(width: i32, height: i32, rw: i32, rh: i32) -> VideoInfo {
        VideoInfo {
            width,
            height,
            resolution_width: rw,
            resolution_height: rh,
            ..Default::default()
        }
    }

    #[test]
    fn same_aspect_fills_view() {
        let rect = info(720, 1280, 1080, 1920).display_rect(720, 1280);
        assert_eq!(rect, Rect::new(0, 0, 720, 1280));
    }

    #[test]
    fn narrower_device_is_pillarboxed() {
        // 1:2 device inside a square video.
        let rect = info(1024, 1024, 512, 1024).display_rect(1024, 1024);
        assert_eq!(rect.height(), 1024);
        assert_eq!(rect.width(), 512);
        assert_eq!(rect.left, 256);
    }

    #[test]
    fn completeness() {
        assert!(info(720, 1280, 1080, 1920).is_complete());
        assert!(!info(720, 0, 1080, 1920).is_complete());
        assert!(!info(720, 1280, 0, 1920).is_complete());
    }

    #[test]
    fn deserializes_camel_case_with_defaults() {
        let v: VideoInfo =
            serde_json::from_str(r#"{"width":720,"height":1280,"statusBarHeight":48}"#).unwrap();
        assert_eq!(v.width, 720);
        assert_eq!(v.status_bar_height, 48);
        assert_eq!(v.virtual_bar_height, 0);
    }
}

//! Control-channel payload definitions.
//!
//! Protocol frames carry UTF-8 JSON objects discriminated by an integer
//! `id`. [`control`] defines the messages exchanged during a session and
//! the parser for inbound ones; [`settings`] holds the device-reported
//! touch and media-format descriptors.

pub mod control;
pub mod settings;

pub use control::{
    CONNECT_REQUEST_ID, CONNECT_RESPONSE_ID, ConnectData, ConnectRequest, ControlMessage,
    STOP_REQUEST_ID, StopRequest, TOUCH_SETTING_ID, VIDEO_INFO_ID, parse_control,
};
pub use settings::{Rect, TouchSetting, VideoInfo};

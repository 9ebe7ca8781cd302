//! JSON control messages carried on the Protocol channel.
//!
//! # Wire Protocol
//!
//! ```text
//! Client ──[Protocol {"id":1,"data":{session,packageName,quality}}]──► Device
//! Client ──[Time  i64 BE unix millis]───────────────────────────────► Device
//! Device ──[Protocol {"id":103,"result":0}]─────────────────────────► Client
//! Device ──[Protocol {"id":101,"data":TouchSetting}]────────────────► Client
//! Device ──[Protocol {"id":102,"data":VideoInfo}]───────────────────► Client
//! Client ──[Protocol {"id":2}]──────────────────────────────────────► Device   (stop)
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Quality;
use crate::error::ArpError;
use crate::message::Message;
use crate::protocol::settings::{TouchSetting, VideoInfo};

// ── Message ids ──────────────────────────────────────────────────

pub const CONNECT_REQUEST_ID: i64 = 1;
pub const STOP_REQUEST_ID: i64 = 2;
pub const TOUCH_SETTING_ID: i64 = 101;
pub const VIDEO_INFO_ID: i64 = 102;
pub const CONNECT_RESPONSE_ID: i64 = 103;

// ── Outbound ─────────────────────────────────────────────────────

/// Body of the connect request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectData {
    pub session: String,
    pub package_name: Option<String>,
    pub quality: Quality,
}

/// First message sent after the socket connects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectRequest {
    pub id: i64,
    pub data: ConnectData,
}

impl ConnectRequest {
    pub fn new(session: impl Into<String>, package_name: Option<String>, quality: Quality) -> Self {
        Self {
            id: CONNECT_REQUEST_ID,
            data: ConnectData {
                session: session.into(),
                package_name,
                quality,
            },
        }
    }

    /// Build the Protocol frame.
    pub fn into_message(self) -> Result<Message, ArpError> {
        Ok(Message::protocol(serde_json::to_vec(&self)?))
    }
}

/// Tells the device the session is over; it will not accept a reconnect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopRequest {
    pub id: i64,
}

impl Default for StopRequest {
    fn default() -> Self {
        Self {
            id: STOP_REQUEST_ID,
        }
    }
}

impl StopRequest {
    pub fn into_message(self) -> Result<Message, ArpError> {
        Ok(Message::protocol(serde_json::to_vec(&self)?))
    }
}

// ── Inbound ──────────────────────────────────────────────────────

/// A recognised control message from the device.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// Answer to the connect request; `0` means accepted.
    ConnectResponse { result: i64 },
    TouchSetting(TouchSetting),
    VideoInfo(VideoInfo),
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Deserialize)]
struct ConnectResponse {
    // Absent or null means accepted.
    #[serde(default)]
    result: Option<i64>,
}

/// Parse a Protocol payload.
///
/// Returns `Ok(None)` for anything that is not a recognised control
/// message: empty or non-JSON payloads, a missing id, or an unknown id.
/// A recognised id with a malformed body is an error.
pub fn parse_control(payload: &[u8]) -> Result<Option<ControlMessage>, ArpError> {
    let Ok(text) = std::str::from_utf8(payload) else {
        return Ok(None);
    };
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return Ok(None);
    };
    let Some(id) = value
        .get("id")
        .or_else(|| value.get("messageId"))
        .and_then(Value::as_i64)
    else {
        return Ok(None);
    };

    match id {
        TOUCH_SETTING_ID => {
            let setting = data_body::<TouchSetting>(id, value)?;
            Ok(Some(ControlMessage::TouchSetting(setting)))
        }
        VIDEO_INFO_ID => {
            let info = data_body::<VideoInfo>(id, value)?;
            if !info.is_complete() {
                return Err(malformed(id, "missing video or screen dimension"));
            }
            Ok(Some(ControlMessage::VideoInfo(info)))
        }
        CONNECT_RESPONSE_ID => {
            let response: ConnectResponse =
                serde_json::from_value(value).map_err(|e| malformed(id, e))?;
            Ok(Some(ControlMessage::ConnectResponse {
                result: response.result.unwrap_or(0),
            }))
        }
        _ => Ok(None),
    }
}

fn data_body<T: DeserializeOwned>(id: i64, value: Value) -> Result<T, ArpError> {
    let envelope: Envelope<T> = serde_json::from_value(value).map_err(|e| malformed(id, e))?;
    envelope.data.ok_or_else(|| malformed(id, "missing data"))
}

fn malformed(id: i64, reason: impl ToString) -> ArpError {
    ArpError::MalformedControl {
        id,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn connect_request_json_shape() {
        let msg = ConnectRequest::new("tok", Some("com.example".into()), Quality::High)
            .into_message()
            .unwrap();
        let v: Value = serde_json::from_slice(msg.payload()).unwrap();
        assert_eq!(v["id"], 1);
        assert_eq!(v["data"]["session"], "tok");
        assert_eq!(v["data"]["packageName"], "com.example");
        assert_eq!(v["data"]["quality"], 2);
    }

    #[test]
    fn stop_request_json_shape() {
        let msg = StopRequest::default().into_message().unwrap();
        assert_eq!(msg.payload(), br#"{"id":2}"#);
    }

    #[test]
    fn parses_connect_response() {
        let parsed = parse_control(br#" {"id":103,"result":0} "#).unwrap();
        assert_eq!(parsed, Some(ControlMessage::ConnectResponse { result: 0 }));
        let parsed = parse_control(br#"{"messageId":103,"result":5}"#).unwrap();
        assert_eq!(parsed, Some(ControlMessage::ConnectResponse { result: 5 }));
    }

    #[test]
    fn parses_video_info() {
        let json = br#"{"id":102,"data":{"width":720,"height":1280,"resolutionWidth":1080,"resolutionHeight":1920}}"#;
        match parse_control(json).unwrap() {
            Some(ControlMessage::VideoInfo(info)) => {
                assert_eq!((info.width, info.height), (720, 1280));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_touch_setting() {
        let json = br#"{"id":101,"data":{"contacts":10,"x":1080,"y":1920,"pressure":255}}"#;
        match parse_control(json).unwrap() {
            Some(ControlMessage::TouchSetting(s)) => {
                assert_eq!(s.contacts, 10);
                assert_eq!(s.pressure, 255);
                assert_eq!(s.major, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ignores_unknown_and_garbage() {
        assert_eq!(parse_control(b"").unwrap(), None);
        assert_eq!(parse_control(b"   ").unwrap(), None);
        assert_eq!(parse_control(b"not json").unwrap(), None);
        assert_eq!(parse_control(&[0xFF, 0xFE]).unwrap(), None);
        assert_eq!(parse_control(br#"{"foo":1}"#).unwrap(), None);
        assert_eq!(parse_control(br#"{"id":999,"data":{}}"#).unwrap(), None);
    }

    #[test]
    fn malformed_bodies_map_to_codes() {
        let err = parse_control(br#"{"id":101}"#).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ProtocolTouchSetting);

        let err = parse_control(br#"{"id":101,"data":{"x":"wide"}}"#).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ProtocolTouchSetting);

        let err = parse_control(br#"{"id":102,"data":{"width":720,"height":0}}"#).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ProtocolVideoInfo);

        let err = parse_control(br#"{"id":103,"result":"ok"}"#).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConnectionResult);
    }

    #[test]
    fn connect_response_without_result_is_accepted() {
        let accepted = Some(ControlMessage::ConnectResponse { result: 0 });
        assert_eq!(parse_control(br#"{"id":103}"#).unwrap(), accepted);
        assert_eq!(parse_control(br#"{"id":103,"result":null}"#).unwrap(), accepted);
    }
}

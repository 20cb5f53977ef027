//! mpv JSON IPC: one JSON object per line in both directions.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::events::{InputEvent, Key, MediaEvent, PointerPosition};

/// Overlay slot used for screensaver messages.
const OVERLAY_ID: u64 = 1;
/// Observer id for the pointer position property.
const POINTER_OBSERVER_ID: u64 = 1;
/// First argument of every `script-message` our key bindings send.
const INPUT_MESSAGE: &str = "video-screensaver-input";

/// input.conf for a player with a window of its own: every key, button and wheel
/// notch is reported back over IPC instead of acting inside the player.
pub const INPUT_BINDINGS: &str = "\
UP script-message video-screensaver-input key up
DOWN script-message video-screensaver-input key down
VOLUME_UP script-message video-screensaver-input key volume-up
VOLUME_DOWN script-message video-screensaver-input key volume-down
MUTE script-message video-screensaver-input key mute
0 script-message video-screensaver-input key zero
WHEEL_UP script-message video-screensaver-input wheel 120
WHEEL_DOWN script-message video-screensaver-input wheel -120
MBTN_LEFT script-message video-screensaver-input button
MBTN_MID script-message video-screensaver-input button
MBTN_RIGHT script-message video-screensaver-input button
MBTN_BACK script-message video-screensaver-input button
MBTN_FORWARD script-message video-screensaver-input button
ANY_UNICODE script-message video-screensaver-input key other
ESC script-message video-screensaver-input key other
ENTER script-message video-screensaver-input key other
KP_ENTER script-message video-screensaver-input key other
SPACE script-message video-screensaver-input key other
TAB script-message video-screensaver-input key other
BS script-message video-screensaver-input key other
DEL script-message video-screensaver-input key other
INS script-message video-screensaver-input key other
LEFT script-message video-screensaver-input key other
RIGHT script-message video-screensaver-input key other
HOME script-message video-screensaver-input key other
END script-message video-screensaver-input key other
PGUP script-message video-screensaver-input key other
PGDWN script-message video-screensaver-input key other
PLAY script-message video-screensaver-input key other
PAUSE script-message video-screensaver-input key other
PLAYPAUSE script-message video-screensaver-input key other
STOP script-message video-screensaver-input key other
NEXT script-message video-screensaver-input key other
PREV script-message video-screensaver-input key other
F1 script-message video-screensaver-input key other
F2 script-message video-screensaver-input key other
F3 script-message video-screensaver-input key other
F4 script-message video-screensaver-input key other
F5 script-message video-screensaver-input key other
F6 script-message video-screensaver-input key other
F7 script-message video-screensaver-input key other
F8 script-message video-screensaver-input key other
F9 script-message video-screensaver-input key other
F10 script-message video-screensaver-input key other
F11 script-message video-screensaver-input key other
F12 script-message video-screensaver-input key other
";

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Load(String),
    /// Volume in `[0, 1]`; mpv expects percent.
    SetVolume(f64),
    ShowOverlay {
        text: String,
        font_size: Option<f32>,
    },
    /// Report pointer moves as `property-change` events.
    ObservePointer,
    Quit,
}

impl PlayerCommand {
    pub fn to_request(&self, request_id: u64) -> Value {
        let command = match self {
            Self::Load(uri) => json!(["loadfile", uri, "replace"]),
            Self::SetVolume(volume) => json!(["set_property", "volume", volume * 100.0]),
            Self::ShowOverlay { text, font_size } => json!({
                "name": "osd-overlay",
                "id": OVERLAY_ID,
                "format": "ass-events",
                "data": ass_overlay(text, *font_size),
            }),
            Self::ObservePointer => json!(["observe_property", POINTER_OBSERVER_ID, "mouse-pos"]),
            Self::Quit => json!(["quit"]),
        };
        json!({ "command": command, "request_id": request_id })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Media(MediaEvent),
    Input(InputEvent),
    Reply { request_id: u64, error: String },
    Other,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    event: Option<String>,
    reason: Option<String>,
    file_error: Option<String>,
    request_id: Option<u64>,
    error: Option<String>,
    name: Option<String>,
    data: Option<Value>,
    #[serde(default)]
    args: Vec<String>,
}

pub fn parse_line(line: &str) -> serde_json::Result<Incoming> {
    let raw: RawMessage = serde_json::from_str(line)?;
    if let Some(event) = raw.event.as_deref() {
        let incoming = match (event, raw.reason.as_deref()) {
            ("file-loaded", _) => Incoming::Media(MediaEvent::Started),
            ("end-file", Some("eof")) => Incoming::Media(MediaEvent::Ended),
            ("end-file", Some("error")) => Incoming::Media(MediaEvent::Failed(
                raw.file_error.unwrap_or_else(|| "unknown error".to_string()),
            )),
            ("client-message", _) => {
                input_message(&raw.args).map_or(Incoming::Other, Incoming::Input)
            }
            ("property-change", _) if raw.name.as_deref() == Some("mouse-pos") => raw
                .data
                .as_ref()
                .and_then(pointer_position)
                .map_or(Incoming::Other, |position| {
                    Incoming::Input(InputEvent::MouseMove(position))
                }),
            // stop/quit/redirect: a replaced or aborted file, not a natural end.
            _ => Incoming::Other,
        };
        return Ok(incoming);
    }
    match (raw.request_id, raw.error) {
        (Some(request_id), Some(error)) => Ok(Incoming::Reply { request_id, error }),
        _ => Ok(Incoming::Other),
    }
}

fn input_message(args: &[String]) -> Option<InputEvent> {
    let (tag, rest) = args.split_first()?;
    if tag != INPUT_MESSAGE {
        return None;
    }
    let rest: Vec<&str> = rest.iter().map(String::as_str).collect();
    let input = match rest.as_slice() {
        ["key", name] => InputEvent::KeyDown(match *name {
            "up" => Key::Up,
            "down" => Key::Down,
            "volume-up" => Key::VolumeUp,
            "volume-down" => Key::VolumeDown,
            "mute" => Key::VolumeMute,
            "zero" => Key::Digit0,
            _ => Key::Other,
        }),
        ["wheel", delta] => InputEvent::MouseWheel {
            delta: delta.parse().ok()?,
        },
        ["button"] => InputEvent::MouseDown,
        _ => return None,
    };
    Some(input)
}

/// `mouse-pos` reports `hover: false` until the pointer is over the window.
fn pointer_position(data: &Value) -> Option<PointerPosition> {
    if !data.get("hover").and_then(Value::as_bool).unwrap_or(false) {
        return None;
    }
    Some(PointerPosition {
        x: data.get("x")?.as_f64()?,
        y: data.get("y")?.as_f64()?,
    })
}

fn ass_overlay(text: &str, font_size: Option<f32>) -> String {
    let mut out = String::from("{\\an5");
    if let Some(size) = font_size {
        out.push_str(&format!("\\fs{size}"));
    }
    out.push('}');
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\u{2060}"),
            '{' => out.push_str("\\{"),
            '}' => out.push_str("\\}"),
            '\n' => out.push_str("\\N"),
            _ => out.push(ch),
        }
    }
    out
}

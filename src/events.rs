/// How a session reacts to termination input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Embedded preview: input never ends the process.
    Preview,
    FullScreen,
}

/// Physical bounds of the display a session is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayBounds {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerPosition {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    VolumeUp,
    VolumeDown,
    VolumeMute,
    Digit0,
    Other,
}

/// Host input delivered to a session, already translated from the windowing system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    KeyDown(Key),
    /// Signed wheel delta; one notch is 120 units.
    MouseWheel { delta: f64 },
    MouseMove(PointerPosition),
    MouseDown,
    Resized { width: u32, height: u32 },
}

/// Playback notifications reported by the media engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    Started,
    Ended,
    Failed(String),
}

/// Something a player reported: playback progress, or input it captured while
/// rendering in a window of its own.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerNotice {
    Media(MediaEvent),
    Input(InputEvent),
}

/// A player notice tagged with the screen whose player emitted it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerEvent {
    pub screen: usize,
    pub notice: PlayerNotice,
}

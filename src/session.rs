//! Per-display playback session.
//!
//! A [`Session`] owns the volume, the pointer-tracking state and the current
//! pick for one display. Everything it talks to is handed in at construction:
//! the preference store, the media engine, the host window and a shutdown
//! token shared by every session of the process.

use rand::rngs::StdRng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Configuration;
use crate::error::SessionError;
use crate::events::{DisplayBounds, InputEvent, Key, MediaEvent, Mode, PointerPosition};
use crate::playlist::{VideoPlaylist, selection_rng};
use crate::preferences::{DEFAULT_VOLUME, PreferenceStore};

pub const PREVIEW_HINT: &str = "When fullscreen, control volume with up/down arrows or mouse wheel.";
pub const CONFIGURATION_NEEDED: &str =
    "This screensaver needs to be configured before any video is displayed.";
pub const PLAYBACK_STALLED: &str = "None of the configured videos could be played.";

/// Renders the selected videos.
pub trait MediaEngine {
    fn play(&mut self, uri: &str);
    /// `volume` is always within `[0, 1]`.
    fn set_volume(&mut self, volume: f64);
    fn resize(&mut self, width: u32, height: u32);
}

/// The window a session is shown in.
pub trait HostWindow {
    fn place(&mut self, bounds: DisplayBounds);
    fn maximize(&mut self);
    /// Shows `text` over the video. `font_size` is only a hint.
    fn show_overlay(&mut self, text: &str, font_size: Option<f32>);
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub volume_key_step: f64,
    pub wheel_delta_per_volume: f64,
    pub preview_font_size: f32,
    pub max_consecutive_failures: u32,
    pub seed: Option<u64>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions::from(&Configuration::default())
    }
}

impl From<&Configuration> for SessionOptions {
    fn from(cfg: &Configuration) -> Self {
        Self {
            volume_key_step: cfg.controls.volume_key_step,
            wheel_delta_per_volume: cfg.controls.wheel_delta_per_volume,
            preview_font_size: cfg.preview_font_size,
            max_consecutive_failures: cfg.player.max_consecutive_failures,
            seed: cfg.playlist_seed,
        }
    }
}

/// What a session did with one input event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputOutcome {
    /// Volume changed; carries the applied (clamped) value.
    VolumeChanged(f64),
    /// Surface size forwarded to the engine.
    Resized,
    /// Recorded without effect (first pointer move, unchanged position).
    Absorbed,
    /// Termination was requested and the process shutdown has been signalled.
    Terminated,
    /// Termination input arrived in preview mode and was ignored.
    TerminationSuppressed,
}

/// Clamps a requested volume to `[0, 1]`; NaN maps to silence.
pub fn clamp_volume(volume: f64) -> f64 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

pub struct Session<P, E, W> {
    mode: Mode,
    prefs: P,
    engine: E,
    window: W,
    shutdown: CancellationToken,
    options: SessionOptions,
    rng: StdRng,
    volume: f64,
    last_pointer: Option<PointerPosition>,
    overlay: Option<String>,
    current: Option<String>,
    consecutive_failures: u32,
}

impl<P, E, W> Session<P, E, W>
where
    P: PreferenceStore,
    E: MediaEngine,
    W: HostWindow,
{
    pub fn new(
        mode: Mode,
        bounds: DisplayBounds,
        mut prefs: P,
        mut engine: E,
        mut window: W,
        shutdown: CancellationToken,
        options: SessionOptions,
    ) -> Self {
        window.place(bounds);

        let stored = match prefs.read_volume() {
            Ok(volume) => volume,
            Err(err) => {
                warn!(error = %err, "failed to read volume preference; using default");
                DEFAULT_VOLUME
            }
        };
        let volume = clamp_volume(stored);
        engine.set_volume(volume);

        info!(
            ?mode,
            left = bounds.left,
            top = bounds.top,
            width = bounds.width,
            height = bounds.height,
            volume,
            "session created"
        );

        let rng = selection_rng(options.seed);
        let mut session = Self {
            mode,
            prefs,
            engine,
            window,
            shutdown,
            options,
            rng,
            volume,
            last_pointer: None,
            overlay: None,
            current: None,
            consecutive_failures: 0,
        };
        if mode == Mode::Preview {
            session.show_overlay(PREVIEW_HINT);
        }
        session
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn overlay_message(&self) -> Option<&str> {
        self.overlay.as_deref()
    }

    pub fn current_video(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn last_pointer(&self) -> Option<PointerPosition> {
        self.last_pointer
    }

    /// Window is ready: start playing or report the missing configuration.
    pub fn on_loaded(&mut self) -> Result<(), SessionError> {
        if self.load_playlist().is_empty() {
            self.show_overlay(CONFIGURATION_NEEDED);
            return Err(SessionError::EmptyPlaylist);
        }
        self.window.maximize();
        // The host reports a move when the window is maximized; start tracking afresh.
        self.last_pointer = None;
        self.advance()
    }

    /// Picks the next video at random from a freshly read playlist and plays it.
    pub fn advance(&mut self) -> Result<(), SessionError> {
        let playlist = self.load_playlist();
        let Some((index, uri)) = playlist.choose(&mut self.rng) else {
            self.current = None;
            self.show_overlay(CONFIGURATION_NEEDED);
            return Err(SessionError::EmptyPlaylist);
        };
        info!(index, count = playlist.len(), uri, "advancing to next video");
        self.engine.play(uri);
        self.current = Some(uri.to_string());
        Ok(())
    }

    pub fn on_media_event(&mut self, event: MediaEvent) -> Result<(), SessionError> {
        match event {
            MediaEvent::Started => {
                self.consecutive_failures = 0;
                debug!(uri = ?self.current, "playback started");
                Ok(())
            }
            MediaEvent::Ended => self.advance(),
            MediaEvent::Failed(reason) => self.on_media_failed(&reason),
        }
    }

    fn on_media_failed(&mut self, reason: &str) -> Result<(), SessionError> {
        self.consecutive_failures += 1;
        warn!(
            uri = ?self.current,
            reason,
            failures = self.consecutive_failures,
            "video failed to play"
        );
        if self.consecutive_failures >= self.options.max_consecutive_failures {
            error!(
                failures = self.consecutive_failures,
                "giving up on playback after repeated failures"
            );
            self.current = None;
            self.show_overlay(PLAYBACK_STALLED);
            return Err(SessionError::PlaybackStalled(self.consecutive_failures));
        }
        self.advance()
    }

    pub fn handle_input(&mut self, event: InputEvent) -> InputOutcome {
        match event {
            InputEvent::KeyDown(key) => match key {
                Key::Up | Key::VolumeUp => {
                    let step = self.options.volume_key_step;
                    InputOutcome::VolumeChanged(self.set_volume(self.volume + step))
                }
                Key::Down | Key::VolumeDown => {
                    let step = self.options.volume_key_step;
                    InputOutcome::VolumeChanged(self.set_volume(self.volume - step))
                }
                Key::VolumeMute | Key::Digit0 => InputOutcome::VolumeChanged(self.set_volume(0.0)),
                Key::Other => self.request_termination("key"),
            },
            InputEvent::MouseWheel { delta } => {
                let change = delta / self.options.wheel_delta_per_volume;
                InputOutcome::VolumeChanged(self.set_volume(self.volume + change))
            }
            InputEvent::MouseMove(position) => {
                let moved = matches!(self.last_pointer, Some(previous) if previous != position);
                self.last_pointer = Some(position);
                if moved {
                    self.request_termination("pointer moved")
                } else {
                    InputOutcome::Absorbed
                }
            }
            InputEvent::MouseDown => self.request_termination("mouse button"),
            InputEvent::Resized { width, height } => {
                debug!(width, height, "surface resized");
                self.engine.resize(width, height);
                InputOutcome::Resized
            }
        }
    }

    /// Clamps, applies and persists `requested`. Returns the applied value.
    pub fn set_volume(&mut self, requested: f64) -> f64 {
        let volume = clamp_volume(requested);
        self.volume = volume;
        self.engine.set_volume(volume);
        if let Err(err) = self.prefs.write_volume(volume) {
            warn!(error = %err, volume, "failed to persist volume");
        }
        debug!(volume, "volume changed");
        volume
    }

    fn request_termination(&mut self, cause: &'static str) -> InputOutcome {
        match self.mode {
            Mode::Preview => {
                debug!(cause, "ignoring exit input in preview mode");
                InputOutcome::TerminationSuppressed
            }
            Mode::FullScreen => {
                info!(cause, "input received; ending screensaver");
                self.shutdown.cancel();
                InputOutcome::Terminated
            }
        }
    }

    fn load_playlist(&mut self) -> VideoPlaylist {
        match VideoPlaylist::load(&mut self.prefs) {
            Ok(playlist) => playlist,
            Err(err) => {
                error!(error = %err, "failed to read video list");
                VideoPlaylist::default()
            }
        }
    }

    fn show_overlay(&mut self, text: &str) {
        let font_size = match self.mode {
            Mode::Preview => Some(self.options.preview_font_size),
            Mode::FullScreen => None,
        };
        self.window.show_overlay(text, font_size);
        self.overlay = Some(text.to_string());
    }
}

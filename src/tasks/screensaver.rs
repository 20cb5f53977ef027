use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::{PhysicalPosition, PhysicalSize},
    event::{ElementState, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key as LogicalKey, KeyCode, NamedKey, PhysicalKey},
    monitor::MonitorHandle,
    raw_window_handle::{HasWindowHandle, RawWindowHandle},
    window::{Fullscreen, Window, WindowAttributes, WindowId, WindowLevel},
};

use crate::{
    config::Configuration,
    events::{DisplayBounds, InputEvent, Key, Mode, PlayerEvent, PlayerNotice, PointerPosition},
    preferences::YamlPreferenceStore,
    session::{HostWindow, Session, SessionOptions},
    tasks::player::{self, PlayerHandle, PlayerLaunch},
};

/// Wheel units reported for one line (notch) of scrolling.
const WHEEL_UNITS_PER_LINE: f64 = 120.0;

#[derive(Debug)]
enum HostEvent {
    Player(PlayerEvent),
    Cancelled,
}

/// Window side of a session: placement, presentation and overlays.
///
/// Without an embedded player the winit window stays hidden; the player's own
/// fullscreen window is what the user sees and where input arrives.
struct ScreenWindow {
    window: Arc<Window>,
    monitor: MonitorHandle,
    mode: Mode,
    embedded: bool,
    player: PlayerHandle,
}

impl HostWindow for ScreenWindow {
    fn place(&mut self, bounds: DisplayBounds) {
        if !self.embedded {
            return;
        }
        self.window
            .set_outer_position(PhysicalPosition::new(bounds.left, bounds.top));
        let _ = self
            .window
            .request_inner_size(PhysicalSize::new(bounds.width, bounds.height));
    }

    fn maximize(&mut self) {
        if !self.embedded {
            debug!(screen = self.player.screen(), "player window is fullscreen already");
            return;
        }
        match self.mode {
            Mode::FullScreen => self
                .window
                .set_fullscreen(Some(Fullscreen::Borderless(Some(self.monitor.clone())))),
            Mode::Preview => self.window.set_maximized(true),
        }
    }

    fn show_overlay(&mut self, text: &str, font_size: Option<f32>) {
        info!(screen = self.player.screen(), text, "showing overlay");
        self.player.show_overlay(text, font_size);
    }
}

type ScreenSession = Session<YamlPreferenceStore, PlayerHandle, ScreenWindow>;

struct Screen {
    window: Arc<Window>,
    session: ScreenSession,
}

struct ScreensaverApp<'a> {
    cfg: Configuration,
    mode: Mode,
    cancel: CancellationToken,
    player_events: mpsc::Sender<PlayerEvent>,
    tasks: &'a mut JoinSet<Result<()>>,
    screens: Vec<Screen>,
    started: bool,
}

impl<'a> ScreensaverApp<'a> {
    fn new(
        cfg: Configuration,
        mode: Mode,
        cancel: CancellationToken,
        player_events: mpsc::Sender<PlayerEvent>,
        tasks: &'a mut JoinSet<Result<()>>,
    ) -> Self {
        Self {
            cfg,
            mode,
            cancel,
            player_events,
            tasks,
            screens: Vec::new(),
            started: false,
        }
    }

    fn open_screen(&mut self, event_loop: &ActiveEventLoop, monitor: MonitorHandle) -> Result<()> {
        let screen = self.screens.len();
        let bounds = display_bounds(&monitor);
        let window = event_loop
            .create_window(window_attributes(self.mode, bounds))
            .context("failed to create screensaver window")?;
        let window = Arc::new(window);

        let embed = if self.cfg.player.embed {
            native_window_id(&window)
        } else {
            None
        };
        if self.cfg.player.embed && embed.is_none() {
            warn!(screen, "no native window id; player will open its own window");
        }

        let (player, commands) = PlayerHandle::channel(screen);
        if embed.is_some() {
            window.set_visible(true);
            if self.mode == Mode::FullScreen {
                window.set_cursor_visible(false);
            }
        } else {
            player.observe_pointer();
        }
        self.tasks.spawn({
            let options = self.cfg.player.clone();
            let launch = PlayerLaunch { screen, embed };
            let events = self.player_events.clone();
            let cancel = self.cancel.clone();
            async move {
                player::run(options, launch, commands, events, cancel)
                    .await
                    .with_context(|| format!("player task for screen {screen} failed"))
            }
        });

        let host = ScreenWindow {
            window: window.clone(),
            monitor,
            mode: self.mode,
            embedded: embed.is_some(),
            player: player.clone(),
        };
        let prefs = YamlPreferenceStore::new(self.cfg.preferences_path.clone());
        let mut options = SessionOptions::from(&self.cfg);
        // Distinct sequences per screen even with a fixed seed.
        options.seed = options.seed.map(|seed| seed.wrapping_add(screen as u64));
        let session = Session::new(
            self.mode,
            bounds,
            prefs,
            player,
            host,
            self.cancel.clone(),
            options,
        );
        self.screens.push(Screen { window, session });
        Ok(())
    }
}

impl ApplicationHandler<HostEvent> for ScreensaverApp<'_> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.cancel.is_cancelled() {
            event_loop.exit();
            return;
        }
        if self.started {
            return;
        }
        self.started = true;

        for monitor in target_displays(event_loop, self.mode) {
            if let Err(err) = self.open_screen(event_loop, monitor) {
                error!(error = ?err, "failed to open screen");
            }
        }
        if self.screens.is_empty() {
            error!("no display could be opened; exiting");
            event_loop.exit();
            return;
        }
        info!(screens = self.screens.len(), mode = ?self.mode, "screensaver windows ready");

        for (screen, entry) in self.screens.iter_mut().enumerate() {
            if let Err(err) = entry.session.on_loaded() {
                warn!(screen, error = %err, "session idle");
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(screen) = self.screens.iter_mut().find(|s| s.window.id() == window_id) else {
            return;
        };

        let input = match event {
            WindowEvent::CloseRequested => {
                info!("screensaver window close requested");
                self.cancel.cancel();
                event_loop.exit();
                return;
            }
            WindowEvent::KeyboardInput {
                event,
                is_synthetic,
                ..
            } => {
                let key = classify_key(&event.logical_key, event.physical_key);
                match key_input(event.state, is_synthetic, key) {
                    Some(input) => input,
                    None => return,
                }
            }
            WindowEvent::MouseWheel { delta, .. } => InputEvent::MouseWheel {
                delta: wheel_delta(delta),
            },
            WindowEvent::CursorMoved { position, .. } => InputEvent::MouseMove(PointerPosition {
                x: position.x,
                y: position.y,
            }),
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                ..
            } => InputEvent::MouseDown,
            WindowEvent::Resized(size) => InputEvent::Resized {
                width: size.width,
                height: size.height,
            },
            _ => return,
        };

        let outcome = screen.session.handle_input(input);
        debug!(?input, ?outcome, "input handled");
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: HostEvent) {
        match event {
            HostEvent::Cancelled => {
                info!("screensaver received cancellation event");
                event_loop.exit();
            }
            HostEvent::Player(PlayerEvent { screen, notice }) => {
                let Some(entry) = self.screens.get_mut(screen) else {
                    debug!(screen, "player event for unknown screen");
                    return;
                };
                match notice {
                    PlayerNotice::Media(event) => {
                        if let Err(err) = entry.session.on_media_event(event) {
                            warn!(screen, error = %err, "playback stopped");
                        }
                    }
                    PlayerNotice::Input(input) => {
                        let outcome = entry.session.handle_input(input);
                        debug!(screen, ?input, ?outcome, "player input handled");
                    }
                }
            }
        }
    }
}

fn window_attributes(mode: Mode, bounds: DisplayBounds) -> WindowAttributes {
    // Shown once a player is embedded into it.
    let attrs = WindowAttributes::default()
        .with_title("Video Screensaver")
        .with_visible(false)
        .with_position(PhysicalPosition::new(bounds.left, bounds.top))
        .with_inner_size(PhysicalSize::new(bounds.width, bounds.height));
    match mode {
        Mode::FullScreen => attrs
            .with_decorations(false)
            .with_window_level(WindowLevel::AlwaysOnTop),
        Mode::Preview => attrs,
    }
}

/// Every monitor in full-screen mode; the primary one for a preview.
fn target_displays(event_loop: &ActiveEventLoop, mode: Mode) -> Vec<MonitorHandle> {
    match mode {
        Mode::FullScreen => event_loop.available_monitors().collect(),
        Mode::Preview => event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .into_iter()
            .collect(),
    }
}

fn display_bounds(monitor: &MonitorHandle) -> DisplayBounds {
    let position = monitor.position();
    let size = monitor.size();
    DisplayBounds {
        left: position.x,
        top: position.y,
        width: size.width,
        height: size.height,
    }
}

fn native_window_id(window: &Window) -> Option<u64> {
    let handle = window.window_handle().ok()?;
    match handle.as_raw() {
        RawWindowHandle::Xlib(h) => Some(h.window as u64),
        RawWindowHandle::Xcb(h) => Some(u64::from(h.window.get())),
        RawWindowHandle::Win32(h) => Some(h.hwnd.get() as u64),
        _ => None,
    }
}

pub fn classify_key(logical: &LogicalKey, physical: PhysicalKey) -> Key {
    if physical == PhysicalKey::Code(KeyCode::Digit0) {
        return Key::Digit0;
    }
    match logical {
        LogicalKey::Named(NamedKey::ArrowUp) => Key::Up,
        LogicalKey::Named(NamedKey::ArrowDown) => Key::Down,
        LogicalKey::Named(NamedKey::AudioVolumeUp) => Key::VolumeUp,
        LogicalKey::Named(NamedKey::AudioVolumeDown) => Key::VolumeDown,
        LogicalKey::Named(NamedKey::AudioVolumeMute) => Key::VolumeMute,
        _ => Key::Other,
    }
}

/// A real key press. Releases and the presses winit synthesizes for keys held
/// while a window gains focus are dropped.
pub fn key_input(state: ElementState, is_synthetic: bool, key: Key) -> Option<InputEvent> {
    (state == ElementState::Pressed && !is_synthetic).then_some(InputEvent::KeyDown(key))
}

pub fn wheel_delta(delta: MouseScrollDelta) -> f64 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => f64::from(y) * WHEEL_UNITS_PER_LINE,
        MouseScrollDelta::PixelDelta(position) => position.y,
    }
}

/// Opens one window and session per target display and runs the event loop
/// on the calling thread until the shared token is cancelled or a window closes.
/// Player tasks are spawned into `tasks`.
pub fn run_windowed(
    cfg: Configuration,
    mode: Mode,
    cancel: CancellationToken,
    tasks: &mut JoinSet<Result<()>>,
) -> Result<()> {
    let event_loop = EventLoop::<HostEvent>::with_user_event()
        .build()
        .context("failed to build screensaver event loop")?;
    let proxy = event_loop.create_proxy();

    let cancel_task = {
        let cancel = cancel.clone();
        let proxy = proxy.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            let _ = proxy.send_event(HostEvent::Cancelled);
        })
    };

    let (player_tx, mut player_rx) = mpsc::channel::<PlayerEvent>(64);
    let relay_task = tokio::spawn(async move {
        while let Some(event) = player_rx.recv().await {
            if proxy.send_event(HostEvent::Player(event)).is_err() {
                break;
            }
        }
    });

    let mut app = ScreensaverApp::new(cfg, mode, cancel, player_tx, tasks);
    let run_result = event_loop.run_app(&mut app);
    drop(app);
    cancel_task.abort();
    relay_task.abort();

    run_result.context("screensaver event loop failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrows_and_media_keys_control_volume() {
        let cases = [
            (NamedKey::ArrowUp, KeyCode::ArrowUp, Key::Up),
            (NamedKey::ArrowDown, KeyCode::ArrowDown, Key::Down),
            (NamedKey::AudioVolumeUp, KeyCode::AudioVolumeUp, Key::VolumeUp),
            (NamedKey::AudioVolumeDown, KeyCode::AudioVolumeDown, Key::VolumeDown),
            (NamedKey::AudioVolumeMute, KeyCode::AudioVolumeMute, Key::VolumeMute),
        ];
        for (named, code, expected) in cases {
            assert_eq!(
                classify_key(&LogicalKey::Named(named), PhysicalKey::Code(code)),
                expected
            );
        }
    }

    #[test]
    fn top_row_zero_mutes_regardless_of_layout() {
        let key = classify_key(
            &LogicalKey::Character("à".into()),
            PhysicalKey::Code(KeyCode::Digit0),
        );
        assert_eq!(key, Key::Digit0);
    }

    #[test]
    fn numpad_zero_and_letters_are_other() {
        assert_eq!(
            classify_key(
                &LogicalKey::Character("0".into()),
                PhysicalKey::Code(KeyCode::Numpad0)
            ),
            Key::Other
        );
        assert_eq!(
            classify_key(
                &LogicalKey::Character("q".into()),
                PhysicalKey::Code(KeyCode::KeyQ)
            ),
            Key::Other
        );
        assert_eq!(
            classify_key(
                &LogicalKey::Named(NamedKey::Escape),
                PhysicalKey::Code(KeyCode::Escape)
            ),
            Key::Other
        );
    }

    #[test]
    fn synthetic_presses_on_focus_are_dropped() {
        assert_eq!(key_input(ElementState::Pressed, true, Key::Other), None);
        assert_eq!(key_input(ElementState::Pressed, true, Key::Up), None);
    }

    #[test]
    fn only_real_presses_become_input() {
        assert_eq!(
            key_input(ElementState::Pressed, false, Key::Other),
            Some(InputEvent::KeyDown(Key::Other))
        );
        assert_eq!(key_input(ElementState::Released, false, Key::Other), None);
    }

    #[test]
    fn wheel_lines_scale_to_notches() {
        assert_eq!(wheel_delta(MouseScrollDelta::LineDelta(0.0, 1.0)), 120.0);
        assert_eq!(wheel_delta(MouseScrollDelta::LineDelta(0.0, -2.5)), -300.0);
        assert_eq!(
            wheel_delta(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, -42.0))),
            -42.0
        );
    }
}

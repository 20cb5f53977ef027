//! External mpv process per screen, driven over JSON IPC.
//!
//! The session talks to a [`PlayerHandle`], which only queues commands. The
//! [`run`] task owns the process and the IPC connection, writes queued commands
//! and turns mpv events into [`PlayerEvent`]s.
//!
//! A player embedded in the screensaver window leaves input to that window. A
//! player with a window of its own binds every key and button to a message sent
//! back over IPC and reports pointer moves, so input still reaches the session.

pub mod protocol;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::select;
use tokio::sync::mpsc::{self, Sender, UnboundedReceiver, UnboundedSender};
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PlayerOptions;
use crate::events::{PlayerEvent, PlayerNotice};
use crate::session::MediaEngine;
use protocol::{INPUT_BINDINGS, Incoming, PlayerCommand, parse_line};

const IPC_RETRY: Duration = Duration::from_millis(50);

/// Command side of one screen's player.
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    screen: usize,
    commands: UnboundedSender<PlayerCommand>,
}

impl PlayerHandle {
    pub fn channel(screen: usize) -> (Self, UnboundedReceiver<PlayerCommand>) {
        let (commands, rx) = mpsc::unbounded_channel();
        (Self { screen, commands }, rx)
    }

    pub fn screen(&self) -> usize {
        self.screen
    }

    pub fn show_overlay(&self, text: &str, font_size: Option<f32>) {
        self.send(PlayerCommand::ShowOverlay {
            text: text.to_string(),
            font_size,
        });
    }

    /// Asks the player to report pointer moves over its own window.
    pub fn observe_pointer(&self) {
        self.send(PlayerCommand::ObservePointer);
    }

    fn send(&self, command: PlayerCommand) {
        if self.commands.send(command).is_err() {
            warn!(screen = self.screen, "player task is gone; dropping command");
        }
    }
}

impl MediaEngine for PlayerHandle {
    fn play(&mut self, uri: &str) {
        self.send(PlayerCommand::Load(uri.to_string()));
    }

    fn set_volume(&mut self, volume: f64) {
        self.send(PlayerCommand::SetVolume(volume));
    }

    /// Only logged: embedded mpv follows its parent window and a standalone one
    /// stays fullscreen on its screen.
    fn resize(&mut self, width: u32, height: u32) {
        debug!(screen = self.screen, width, height, "player surface follows window");
    }
}

/// Where and how to start one player.
#[derive(Debug, Clone)]
pub struct PlayerLaunch {
    pub screen: usize,
    /// Native window id to render into.
    pub embed: Option<u64>,
}

/// Files one player uses while it runs. Dropping the value removes them.
#[derive(Debug)]
pub struct PlayerFiles {
    /// IPC endpoint: a Unix socket, or a named pipe on Windows.
    pub ipc: PathBuf,
    /// input.conf for a player with a window of its own.
    pub bindings: PathBuf,
}

impl PlayerFiles {
    pub fn new(screen: usize) -> Self {
        Self::in_dir(&std::env::temp_dir(), screen)
    }

    pub fn in_dir(dir: &Path, screen: usize) -> Self {
        let name = format!("video-screensaver-{}-{}", std::process::id(), screen);
        #[cfg(windows)]
        let ipc = PathBuf::from(format!(r"\\.\pipe\{name}"));
        #[cfg(not(windows))]
        let ipc = dir.join(format!("{name}.sock"));
        Self {
            ipc,
            bindings: dir.join(format!("{name}-input.conf")),
        }
    }

    pub fn write_bindings(&self) -> Result<()> {
        std::fs::write(&self.bindings, INPUT_BINDINGS)
            .with_context(|| format!("failed to write {}", self.bindings.display()))
    }
}

impl Drop for PlayerFiles {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            let _ = std::fs::remove_file(&self.ipc);
        }
        let _ = std::fs::remove_file(&self.bindings);
    }
}

pub fn mpv_args(
    options: &PlayerOptions,
    launch: &PlayerLaunch,
    files: &PlayerFiles,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "--idle=yes",
        "--force-window=yes",
        "--no-terminal",
        "--no-config",
        "--no-osc",
        "--osd-level=0",
        "--no-input-default-bindings",
        "--cursor-autohide=always",
        "--keep-open=no",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();

    let mut ipc_arg = OsString::from("--input-ipc-server=");
    ipc_arg.push(files.ipc.as_os_str());
    args.push(ipc_arg);

    match launch.embed {
        Some(wid) => {
            args.push(format!("--wid={wid}").into());
            args.push("--input-vo-keyboard=no".into());
            args.push("--input-cursor=no".into());
        }
        None => {
            let mut bindings = OsString::from("--input-conf=");
            bindings.push(files.bindings.as_os_str());
            args.push(bindings);
            args.push("--fs".into());
            args.push(format!("--fs-screen={}", launch.screen).into());
            args.push("--ontop".into());
        }
    }
    args.extend(options.extra_args.iter().map(OsString::from));
    args
}

/// Starts mpv, connects to its IPC endpoint and relays commands and events
/// until cancelled or until either side goes away. The process is killed on exit.
pub async fn run(
    options: PlayerOptions,
    launch: PlayerLaunch,
    commands: UnboundedReceiver<PlayerCommand>,
    events: Sender<PlayerEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    let files = PlayerFiles::new(launch.screen);
    if launch.embed.is_none() {
        files.write_bindings()?;
    }
    let args = mpv_args(&options, &launch, &files);
    let mut child = Command::new(&options.binary)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to spawn player {}", options.binary.display()))?;
    info!(
        screen = launch.screen,
        pid = child.id(),
        embedded = launch.embed.is_some(),
        ipc = %files.ipc.display(),
        "player started"
    );

    let stream = select! {
        _ = cancel.cancelled() => None,
        status = child.wait() => {
            let status = status.context("failed to wait for player")?;
            bail!("player exited before its ipc endpoint was ready: {status}");
        }
        stream = connect(&files.ipc, options.ipc_connect_timeout) => Some(stream?),
    };

    let result = match stream {
        Some(stream) => drive(stream, launch.screen, commands, events, cancel).await,
        None => Ok(()),
    };

    if child.try_wait()?.is_none() {
        debug!(screen = launch.screen, "stopping player");
        child.start_kill().ok();
        let _ = child.wait().await;
    }
    result
}

/// Relays commands and events over an established IPC stream.
pub async fn drive<S>(
    stream: S,
    screen: usize,
    mut commands: UnboundedReceiver<PlayerCommand>,
    events: Sender<PlayerEvent>,
    cancel: CancellationToken,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut lines = BufReader::new(reader).lines();
    let mut request_id: u64 = 0;

    loop {
        select! {
            _ = cancel.cancelled() => {
                debug!(screen, "cancel received; asking player to quit");
                request_id += 1;
                let _ = write_command(&mut writer, &PlayerCommand::Quit, request_id).await;
                break;
            }

            maybe_cmd = commands.recv() => match maybe_cmd {
                Some(command) => {
                    request_id += 1;
                    write_command(&mut writer, &command, request_id).await?;
                }
                None => {
                    debug!(screen, "player handle dropped");
                    break;
                }
            },

            line = lines.next_line() => match line.context("failed to read from player ipc")? {
                Some(line) => forward(screen, &line, &events).await,
                None => {
                    warn!(screen, "player closed its ipc connection");
                    break;
                }
            }
        }
    }
    Ok(())
}

async fn write_command<W>(writer: &mut W, command: &PlayerCommand, request_id: u64) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut payload = serde_json::to_vec(&command.to_request(request_id))?;
    payload.push(b'\n');
    writer
        .write_all(&payload)
        .await
        .context("failed to write to player ipc")?;
    writer.flush().await?;
    debug!(request_id, ?command, "player command sent");
    Ok(())
}

async fn forward(screen: usize, line: &str, events: &Sender<PlayerEvent>) {
    match parse_line(line) {
        Ok(Incoming::Media(event)) => {
            debug!(screen, ?event, "player event");
            notify(screen, PlayerNotice::Media(event), events).await;
        }
        Ok(Incoming::Input(input)) => {
            debug!(screen, ?input, "player input");
            notify(screen, PlayerNotice::Input(input), events).await;
        }
        Ok(Incoming::Reply { request_id, error }) if error != "success" => {
            warn!(screen, request_id, error = %error, "player rejected command");
        }
        Ok(_) => {}
        Err(err) => debug!(screen, error = %err, line, "unparseable player message"),
    }
}

async fn notify(screen: usize, notice: PlayerNotice, events: &Sender<PlayerEvent>) {
    if events.send(PlayerEvent { screen, notice }).await.is_err() {
        debug!(screen, "player event receiver closed");
    }
}

async fn connect(path: &Path, timeout: Duration) -> Result<IpcStream> {
    let deadline = Instant::now() + timeout;
    loop {
        match open_ipc(path).await {
            Ok(stream) => {
                debug!(ipc = %path.display(), "player ipc connected");
                return Ok(stream);
            }
            Err(err) if Instant::now() < deadline => {
                debug!(error = %err, "player ipc not ready; retrying");
                sleep(IPC_RETRY).await;
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("timed out connecting to player ipc at {}", path.display())
                });
            }
        }
    }
}

#[cfg(unix)]
type IpcStream = tokio::net::UnixStream;

#[cfg(unix)]
async fn open_ipc(path: &Path) -> std::io::Result<IpcStream> {
    tokio::net::UnixStream::connect(path).await
}

#[cfg(windows)]
type IpcStream = tokio::net::windows::named_pipe::NamedPipeClient;

#[cfg(windows)]
async fn open_ipc(path: &Path) -> std::io::Result<IpcStream> {
    tokio::net::windows::named_pipe::ClientOptions::new().open(path)
}

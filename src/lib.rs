pub mod config;
pub mod error;
pub mod events;
pub mod playlist;
pub mod preferences;
pub mod session;
pub mod tasks {
    pub mod player;
    pub mod screensaver;
}

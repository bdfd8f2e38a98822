use crate::config::Config;
use crate::player::Player;
use crate::recorder::Recorder;
use crate::shell::AppShell;
use crate::store::SessionRepository;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SessionRepository>,
    pub recorder: Recorder,
    pub player: Player,
    pub shell: Arc<AppShell>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn SessionRepository>, shell: AppShell, config: Config) -> Self {
        AppState {
            recorder: Recorder::new(store.clone(), config.recorder_flush_interval),
            player: Player::new(store.clone(), config.playback_start_delay),
            store,
            shell: Arc::new(shell),
            config: Arc::new(config),
        }
    }
}

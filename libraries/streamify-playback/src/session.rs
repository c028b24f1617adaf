//! Session registry
//!
//! One [`Player`] per session id. The manager also turns voice presence
//! updates into auto-pause, auto-resume and auto-leave decisions.

use crate::config::PlayerConfig;
use crate::engine::PlaybackEngine;
use crate::events::{ManagerEvent, PlayerEvent};
use crate::player::{Player, PlayerServices};
use crate::status::{VoiceStatus, VoiceStatusConfig};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use streamify_core::{RelatedTracks, StatusSink};
use streamify_pipeline::PipelineFactory;
use tokio::sync::broadcast;
use tracing::{debug, info};

const EVENT_CAPACITY: usize = 64;

type Registry = Arc<Mutex<HashMap<String, Arc<Player>>>>;

/// A change in the voice channel a session plays into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceUpdate {
    /// `count` is the number of listeners after the change, bots excluded
    MemberJoined { member: String, count: usize },
    MemberLeft { member: String, count: usize },
    /// The bot itself left the channel
    SelfDisconnected,
    /// The bot was moved to another channel
    SelfMoved { channel: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub players: usize,
    pub playing: usize,
}

/// Owns every player
pub struct SessionManager {
    players: Registry,
    factory: Arc<dyn PipelineFactory>,
    related: Option<Arc<dyn RelatedTracks>>,
    status: Option<(Arc<dyn StatusSink>, Arc<VoiceStatusConfig>)>,
    config: PlayerConfig,
    events: broadcast::Sender<ManagerEvent>,
}

impl SessionManager {
    pub fn new(factory: Arc<dyn PipelineFactory>, config: PlayerConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            players: Arc::new(Mutex::new(HashMap::new())),
            factory,
            related: None,
            status: None,
            config,
            events,
        }
    }

    /// Use `related` for autoplay
    pub fn with_related(mut self, related: Arc<dyn RelatedTracks>) -> Self {
        self.related = Some(related);
        self
    }

    /// Publish now-playing text through `sink`
    pub fn with_voice_status(mut self, sink: Arc<dyn StatusSink>, config: VoiceStatusConfig) -> Self {
        self.status = Some((sink, Arc::new(config)));
        self
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<String, Arc<Player>>> {
        self.players.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ManagerEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// The player for `session_id`, created on first use
    ///
    /// `engine` is only used when a new player is created.
    pub fn create(&self, session_id: &str, engine: Arc<dyn PlaybackEngine>) -> Arc<Player> {
        let mut players = self.registry();
        if let Some(existing) = players.get(session_id).filter(|p| !p.is_destroyed()) {
            return existing.clone();
        }

        let services = PlayerServices {
            factory: self.factory.clone(),
            engine,
            related: self.related.clone(),
            status: self
                .status
                .as_ref()
                .map(|(sink, config)| VoiceStatus::new(session_id, config.clone(), sink.clone())),
        };
        let player = Player::new(session_id, &self.config, services);

        let registry = Arc::downgrade(&self.players);
        let events = self.events.clone();
        let id = session_id.to_string();
        let weak_player = Arc::downgrade(&player);
        player.set_on_destroy(move || {
            if let Some(registry) = registry.upgrade() {
                let mut players = registry.lock().unwrap_or_else(PoisonError::into_inner);
                if players
                    .get(&id)
                    .is_some_and(|p| std::ptr::eq(Arc::as_ptr(p), weak_player.as_ptr()))
                {
                    players.remove(&id);
                }
            }
            debug!(session = %id, "Player removed from registry");
            let _ = events.send(ManagerEvent::PlayerDestroyed { session_id: id });
        });

        players.insert(session_id.to_string(), player.clone());
        drop(players);

        info!(session = %session_id, "Session created");
        let _ = self.events.send(ManagerEvent::PlayerCreated {
            session_id: session_id.to_string(),
        });
        player
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<Player>> {
        self.registry().get(session_id).cloned()
    }

    /// Destroy and remove the player for `session_id`
    pub fn destroy(&self, session_id: &str) -> bool {
        let player = self.registry().remove(session_id);
        match player {
            Some(player) => {
                player.destroy();
                true
            }
            None => false,
        }
    }

    pub fn destroy_all(&self) -> usize {
        let players: Vec<_> = self.registry().drain().map(|(_, player)| player).collect();
        let count = players.len();
        for player in players {
            player.destroy();
        }
        if count > 0 {
            info!(count, "Destroyed all sessions");
        }
        count
    }

    pub fn len(&self) -> usize {
        self.registry().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry().is_empty()
    }

    pub fn stats(&self) -> SessionStats {
        let players = self.registry();
        SessionStats {
            players: players.len(),
            playing: players.values().filter(|p| p.is_playing()).count(),
        }
    }

    // ===== Presence =====

    /// Apply a presence change to the session's player
    ///
    /// Returns `false` if there is no player for `session_id`.
    pub async fn handle_presence(&self, session_id: &str, update: PresenceUpdate) -> bool {
        let Some(player) = self.get(session_id) else {
            return false;
        };

        match update {
            PresenceUpdate::SelfDisconnected => {
                info!(session = %session_id, "Disconnected from voice");
                self.destroy(session_id);
            }
            PresenceUpdate::SelfMoved { channel } => {
                player.emit(PlayerEvent::ChannelMove { channel });
            }
            PresenceUpdate::MemberJoined { member, count } => {
                player.emit(PlayerEvent::UserJoin {
                    member,
                    members: count,
                });
                listeners_changed(&player, count).await;
            }
            PresenceUpdate::MemberLeft { member, count } => {
                player.emit(PlayerEvent::UserLeave {
                    member,
                    members: count,
                });
                listeners_changed(&player, count).await;
            }
        }
        true
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.destroy_all();
    }
}

async fn listeners_changed(player: &Player, count: usize) {
    let auto_pause = player.auto_pause_config();

    if count < auto_pause.min_users {
        if count == 0 {
            player.emit(PlayerEvent::ChannelEmpty);
        }
        if auto_pause.enabled && player.auto_pause() {
            info!(session = %player.session_id(), members = count, "Auto-paused");
            player.emit(PlayerEvent::AutoPause { members: count });
        }
        if player.auto_leave_config().enabled {
            player.start_empty_timer();
        }
    } else {
        player.cancel_empty_timer();
        if auto_pause.enabled && player.is_auto_paused() && player.auto_resume().await {
            info!(session = %player.session_id(), members = count, "Auto-resumed");
            player.emit(PlayerEvent::AutoResume { members: count });
        }
    }
}

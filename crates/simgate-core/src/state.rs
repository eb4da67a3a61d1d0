//! Live simulation state owned by the execution context.
//!
//! [`SimulationState`] is the mutable world of a host node: its players,
//! worlds, and message log. It is owned by the single execution-context
//! thread (see [`crate::context`]) and is never shared behind a lock; all
//! reads and writes from HTTP or bridge requests are marshaled onto that
//! thread as closures.
//!
//! How the real statistics are gathered is outside this crate. The state is
//! a plain in-memory model that the host seeds at startup and that modules
//! and endpoints read from.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ServerIdentityConfig;

/// Length of one in-game day in ticks.
pub const DAY_LENGTH_TICKS: u64 = 24_000;

/// Maximum accepted message length in characters.
pub const MAX_MESSAGE_LENGTH: usize = 1000;

/// Default page size for message queries.
pub const DEFAULT_MESSAGE_LIMIT: usize = 50;

/// Upper bound on the page size for message queries.
pub const MAX_MESSAGE_LIMIT: usize = 500;

/// A connected or remembered player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Stable player identifier.
    pub uuid: Uuid,
    /// Display name.
    pub name: String,
    /// Name of the world the player is in.
    pub world: String,
    /// Current health points.
    pub health: f64,
    /// Experience level.
    pub level: u32,
    /// Whether the player is currently connected.
    pub online: bool,
    /// When the player first joined.
    pub first_joined: DateTime<Utc>,
}

/// A world (dimension) hosted by the simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct World {
    /// Unique world name.
    pub name: String,
    /// Environment kind (`normal`, `nether`, `the_end`, ...).
    pub environment: String,
    /// Time of day in ticks, `0..DAY_LENGTH_TICKS`.
    pub time: u64,
    /// Whether it is currently raining.
    pub storm: bool,
    /// Loaded chunk count.
    pub loaded_chunks: u32,
}

/// A chat or API-originated message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Sequential message id.
    pub id: u64,
    /// Sender, when sent by a player.
    pub sender_uuid: Option<Uuid>,
    /// Recipient, when the message is private.
    pub recipient_uuid: Option<Uuid>,
    /// Message body.
    pub content: String,
    /// Message category (`CHAT`, `API`, ...).
    pub message_type: String,
    /// When the message was recorded.
    pub timestamp: DateTime<Utc>,
}

/// Filters for [`SimulationState::query_messages`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageQuery {
    /// Page size, clamped to [`MAX_MESSAGE_LIMIT`].
    pub limit: Option<usize>,
    /// Number of matching messages to skip (newest first).
    pub offset: Option<usize>,
    /// Only messages sent or received by this player (name or UUID).
    pub player: Option<String>,
    /// Only messages of this type (case-insensitive).
    pub message_type: Option<String>,
}

/// Why a message was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    /// The message body was empty after trimming.
    #[error("Message is required")]
    Empty,
    /// The message body exceeded [`MAX_MESSAGE_LENGTH`].
    #[error("Message too long (max {MAX_MESSAGE_LENGTH} characters)")]
    TooLong,
}

/// The mutable world of a host node.
#[derive(Debug, Clone)]
pub struct SimulationState {
    /// Identity reported by the `server` and `status` endpoints.
    pub identity: ServerIdentityConfig,
    /// Players keyed by UUID.
    pub players: BTreeMap<Uuid, Player>,
    /// Worlds keyed by name.
    pub worlds: BTreeMap<String, World>,
    /// Message log, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Ticks executed since startup.
    pub tick: u64,
    /// When the host started.
    pub started_at: DateTime<Utc>,
    next_message_id: u64,
}

impl Default for SimulationState {
    fn default() -> Self {
        Self::new(ServerIdentityConfig::default())
    }
}

impl SimulationState {
    /// Create an empty state with the given identity.
    pub fn new(identity: ServerIdentityConfig) -> Self {
        Self {
            identity,
            players: BTreeMap::new(),
            worlds: BTreeMap::new(),
            messages: Vec::new(),
            tick: 0,
            started_at: Utc::now(),
            next_message_id: 1,
        }
    }

    /// Create a state with the three standard worlds and no players.
    pub fn with_default_worlds(identity: ServerIdentityConfig) -> Self {
        let mut state = Self::new(identity);
        for (name, environment) in [
            ("world", "normal"),
            ("world_nether", "nether"),
            ("world_the_end", "the_end"),
        ] {
            state.add_world(World {
                name: name.to_owned(),
                environment: environment.to_owned(),
                time: 0,
                storm: false,
                loaded_chunks: 0,
            });
        }
        state
    }

    /// Insert or replace a world.
    pub fn add_world(&mut self, world: World) {
        self.worlds.insert(world.name.clone(), world);
    }

    /// Insert or replace a player.
    pub fn add_player(&mut self, player: Player) {
        self.players.insert(player.uuid, player);
    }

    /// Iterate over connected players.
    pub fn online_players(&self) -> impl Iterator<Item = &Player> {
        self.players.values().filter(|p| p.online)
    }

    /// Number of connected players.
    pub fn online_count(&self) -> usize {
        self.online_players().count()
    }

    /// Find a player by UUID or by case-insensitive name.
    pub fn find_player(&self, identifier: &str) -> Option<&Player> {
        if let Ok(uuid) = Uuid::parse_str(identifier)
            && let Some(player) = self.players.get(&uuid)
        {
            return Some(player);
        }
        self.players
            .values()
            .find(|p| p.name.eq_ignore_ascii_case(identifier))
    }

    /// Find a world by exact name.
    pub fn world(&self, name: &str) -> Option<&World> {
        self.worlds.get(name)
    }

    /// Record a message after validating it.
    pub fn push_message(
        &mut self,
        sender_uuid: Option<Uuid>,
        recipient_uuid: Option<Uuid>,
        content: &str,
        message_type: &str,
    ) -> Result<&ChatMessage, MessageError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(MessageError::Empty);
        }
        if content.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(MessageError::TooLong);
        }

        let id = self.next_message_id;
        self.next_message_id = self.next_message_id.saturating_add(1);
        self.messages.push(ChatMessage {
            id,
            sender_uuid,
            recipient_uuid,
            content: content.to_owned(),
            message_type: message_type.to_owned(),
            timestamp: Utc::now(),
        });
        self.messages.last().ok_or(MessageError::Empty)
    }

    /// Return matching messages, newest first.
    pub fn query_messages(&self, query: &MessageQuery) -> Vec<&ChatMessage> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_MESSAGE_LIMIT)
            .min(MAX_MESSAGE_LIMIT);
        let offset = query.offset.unwrap_or(0);
        let player_uuid = query
            .player
            .as_deref()
            .and_then(|p| self.find_player(p).map(|found| found.uuid));

        self.messages
            .iter()
            .rev()
            .filter(|m| match (&query.player, player_uuid) {
                (None, _) => true,
                (Some(_), Some(uuid)) => {
                    m.sender_uuid == Some(uuid) || m.recipient_uuid == Some(uuid)
                }
                (Some(_), None) => false,
            })
            .filter(|m| {
                query
                    .message_type
                    .as_deref()
                    .is_none_or(|t| m.message_type.eq_ignore_ascii_case(t))
            })
            .skip(offset)
            .take(limit)
            .collect()
    }

    /// Advance the simulation by one tick.
    pub fn advance_tick(&mut self) {
        self.tick = self.tick.saturating_add(1);
        for world in self.worlds.values_mut() {
            world.time = world.time.saturating_add(1) % DAY_LENGTH_TICKS;
        }
    }
}

//! Built-in base endpoints.
//!
//! Each function renders one base endpoint from the live state. They run
//! on the execution context thread and are shared by the HTTP handlers and
//! the bridge action table, so both transports return identical documents.

use chrono::Utc;
use serde_json::{json, Value};
use simgate_core::state::{
    ChatMessage, MessageQuery, Player, SimulationState, World, DEFAULT_MESSAGE_LIMIT,
    MAX_MESSAGE_LIMIT,
};
use simgate_modules::{JsonObject, Params};
use uuid::Uuid;

use crate::error::ApiError;

/// Version string reported by the `status` endpoint.
pub const API_VERSION: &str = "1.0.0";

/// Message type recorded for messages sent through the API.
pub const API_MESSAGE_TYPE: &str = "API";

fn object(value: Value) -> JsonObject {
    match value {
        Value::Object(map) => map,
        _ => JsonObject::new(),
    }
}

fn player_json(player: &Player) -> Value {
    json!({
        "uuid": player.uuid,
        "name": player.name,
        "world": player.world,
        "health": player.health,
        "level": player.level,
        "online": player.online,
        "firstJoined": player.first_joined.timestamp_millis(),
    })
}

fn world_json(world: &World, players: usize) -> Value {
    json!({
        "name": world.name,
        "environment": world.environment,
        "time": world.time,
        "hasStorm": world.storm,
        "loadedChunks": world.loaded_chunks,
        "playersCount": players,
    })
}

fn message_json(message: &ChatMessage) -> Value {
    serde_json::to_value(message).unwrap_or(Value::Null)
}

/// `server`: identity and runtime summary.
pub fn server(world: &SimulationState) -> JsonObject {
    let uptime = Utc::now()
        .signed_duration_since(world.started_at)
        .num_seconds()
        .max(0);
    object(json!({
        "name": world.identity.name,
        "version": world.identity.version,
        "motd": world.identity.motd,
        "maxPlayers": world.identity.max_players,
        "onlinePlayers": world.online_count(),
        "worlds": world.worlds.len(),
        "tick": world.tick,
        "uptime": uptime,
        "totalMessages": world.messages.len(),
    }))
}

/// `players`: connected players.
pub fn players(world: &SimulationState) -> JsonObject {
    let players: Vec<Value> = world.online_players().map(player_json).collect();
    let count = players.len();
    object(json!({
        "players": players,
        "count": count,
        "max": world.identity.max_players,
    }))
}

/// `player/{id}`: one player by UUID or name.
pub fn player(world: &SimulationState, identifier: &str) -> Result<JsonObject, ApiError> {
    let player = world
        .find_player(identifier)
        .ok_or_else(|| ApiError::NotFound("Player not found".to_owned()))?;
    let sent = world
        .messages
        .iter()
        .filter(|m| m.sender_uuid == Some(player.uuid))
        .count();
    let mut body = object(player_json(player));
    body.insert("sentMessages".to_owned(), json!(sent));
    Ok(body)
}

fn players_in(world: &SimulationState, name: &str) -> usize {
    world.online_players().filter(|p| p.world == name).count()
}

/// `worlds`: every world.
pub fn worlds(world: &SimulationState) -> JsonObject {
    let worlds: Vec<Value> = world
        .worlds
        .values()
        .map(|w| world_json(w, players_in(world, &w.name)))
        .collect();
    let count = worlds.len();
    object(json!({ "worlds": worlds, "count": count }))
}

/// `world/{name}`: one world with its players.
pub fn world(world: &SimulationState, name: &str) -> Result<JsonObject, ApiError> {
    let found = world
        .world(name)
        .ok_or_else(|| ApiError::NotFound("World not found".to_owned()))?;
    let mut body = object(world_json(found, players_in(world, name)));
    let players: Vec<Value> = world
        .online_players()
        .filter(|p| p.world == name)
        .map(|p| json!({ "name": p.name, "uuid": p.uuid }))
        .collect();
    body.insert("players".to_owned(), Value::Array(players));
    Ok(body)
}

fn numeric(params: &Params, key: &str) -> Result<Option<i64>, ApiError> {
    params
        .get(key)
        .map(|raw| {
            raw.trim()
                .parse::<i64>()
                .map_err(|_parse| ApiError::BadRequest("Invalid numeric parameter".to_owned()))
        })
        .transpose()
}

/// `messages`: the message log, newest first.
///
/// `limit` is clamped to `1..=500`, `offset` to `>= 0`; a non-numeric value
/// for either is a bad request.
pub fn messages(world: &SimulationState, params: &Params) -> Result<JsonObject, ApiError> {
    let max = i64::try_from(MAX_MESSAGE_LIMIT).unwrap_or(i64::MAX);
    let limit = numeric(params, "limit")?
        .map_or(DEFAULT_MESSAGE_LIMIT, |l| {
            usize::try_from(l.clamp(1, max)).unwrap_or(DEFAULT_MESSAGE_LIMIT)
        });
    let offset = numeric(params, "offset")?
        .map_or(0, |o| usize::try_from(o.max(0)).unwrap_or(0));

    let query = MessageQuery {
        limit: Some(limit),
        offset: Some(offset),
        player: params.get("player").cloned(),
        message_type: params.get("type").cloned(),
    };
    let messages: Vec<Value> = world
        .query_messages(&query)
        .into_iter()
        .map(message_json)
        .collect();

    let mut body = JsonObject::new();
    body.insert("count".to_owned(), json!(messages.len()));
    body.insert("messages".to_owned(), Value::Array(messages));
    body.insert("limit".to_owned(), json!(limit));
    body.insert("offset".to_owned(), json!(offset));
    if let Some(player) = query.player {
        body.insert("player".to_owned(), Value::String(player));
    }
    if let Some(kind) = query.message_type {
        body.insert("type".to_owned(), Value::String(kind));
    }
    Ok(body)
}

fn optional_uuid(body: &JsonObject, key: &str) -> Result<Option<Uuid>, ApiError> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => Uuid::parse_str(raw)
            .map(Some)
            .map_err(|_parse| ApiError::BadRequest(format!("Invalid {key}"))),
        Some(_) => Err(ApiError::BadRequest(format!("Invalid {key}"))),
    }
}

/// `send-message`: record a message.
///
/// Body: `{message, senderUuid?, recipientUuid?, messageType?}`.
pub fn send_message(world: &mut SimulationState, body: &JsonObject) -> Result<JsonObject, ApiError> {
    let content = body.get("message").and_then(Value::as_str).unwrap_or_default();
    let sender = optional_uuid(body, "senderUuid")?;
    let recipient = optional_uuid(body, "recipientUuid")?;
    let message_type = body
        .get("messageType")
        .and_then(Value::as_str)
        .unwrap_or(API_MESSAGE_TYPE);

    let recorded = world.push_message(sender, recipient, content, message_type)?;
    Ok(object(json!({
        "success": true,
        "message": "Message sent successfully",
        "messageId": recorded.id,
        "timestamp": recorded.timestamp.timestamp_millis(),
        "messageLength": recorded.content.chars().count(),
    })))
}

/// `status`: liveness summary.
pub fn status(world: &SimulationState, modules_loaded: usize) -> JsonObject {
    object(json!({
        "status": "online",
        "timestamp": Utc::now().timestamp_millis(),
        "api_version": API_VERSION,
        "server_name": world.identity.name,
        "online_players": world.online_count(),
        "max_players": world.identity.max_players,
        "modules_loaded": modules_loaded,
        "tick": world.tick,
    }))
}

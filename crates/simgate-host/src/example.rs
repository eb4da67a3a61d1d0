//! Built-in `example` module.
//!
//! Demonstrates every extension point. Packages select it with
//! `main: simgate::example`.
//!
//! | kind | name | notes |
//! |------|------|-------|
//! | data source | `players` | online players; `?health=true` adds health |
//! | data source | `stats` | player counts and versions |
//! | action | `broadcast` | `POST {message}` records a broadcast |
//! | enhancer | `server` @ 50 | runtime figures |
//! | enhancer | `server` @ 100 | module metadata and welcome message |
//! | enhancer | `player` | detailed stats for online players |
//! | enhancer | `players` | aggregate statistics |

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use simgate_core::state::SimulationState;
use simgate_modules::config::ModuleConfig;
use simgate_modules::{
    Action, ActionRequest, CapabilityError, DataRequest, DataSource, EnhanceRequest, Enhancer,
    JsonObject, Method, Module, ModuleContext, ModuleError,
};

/// Entry point name for module manifests.
pub const ENTRY_POINT: &str = "simgate::example";

/// Version reported by the module's own endpoints.
pub const MODULE_VERSION: &str = "1.0.0";

/// Message type recorded for broadcasts.
pub const BROADCAST_TYPE: &str = "BROADCAST";

const DEFAULT_WELCOME: &str = "Hello from module!";

/// Factory registered in the host's module catalog.
pub fn create() -> Box<dyn Module> {
    Box::new(ExampleModule)
}

/// The `example` module.
#[derive(Debug, Default)]
pub struct ExampleModule;

impl Module for ExampleModule {
    fn on_load(&mut self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        ctx.save_default_config()
    }

    fn on_enable(&mut self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        ctx.register_data_source("players", PlayersSource);
        ctx.register_data_source("stats", StatsSource);
        ctx.register_action("broadcast", Broadcast);

        ctx.register_enhancer("server", RuntimeEnhancer);
        ctx.register_enhancer(
            "server",
            MetadataEnhancer {
                module: ctx.name().to_owned(),
                config: Arc::clone(ctx.config()),
            },
        );
        ctx.register_enhancer("player", PlayerDetailEnhancer);
        ctx.register_enhancer("players", PlayersStatsEnhancer);

        tracing::info!("Example module registered its endpoints");
        Ok(())
    }

    fn on_disable(&mut self, _ctx: &ModuleContext) -> Result<(), ModuleError> {
        tracing::info!("Example module disabled");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Data sources
// ---------------------------------------------------------------------------

struct PlayersSource;

impl DataSource for PlayersSource {
    fn fetch(&self, request: &DataRequest<'_>) -> Result<Value, CapabilityError> {
        let with_health = request
            .params
            .get("health")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        let players: Vec<Value> = request
            .world
            .online_players()
            .map(|p| {
                let mut entry = json!({ "name": p.name, "level": p.level });
                if with_health && let Value::Object(map) = &mut entry {
                    map.insert("health".to_owned(), json!(p.health));
                }
                entry
            })
            .collect();
        Ok(Value::Array(players))
    }

    fn description(&self) -> &str {
        "Get list of online players with optional health info"
    }

    fn supported_parameters(&self) -> &[&'static str] {
        &["health"]
    }
}

struct StatsSource;

impl DataSource for StatsSource {
    fn fetch(&self, request: &DataRequest<'_>) -> Result<Value, CapabilityError> {
        let world = request.world;
        Ok(json!({
            "onlinePlayers": world.online_count(),
            "maxPlayers": world.identity.max_players,
            "serverVersion": world.identity.version,
            "moduleVersion": MODULE_VERSION,
        }))
    }

    fn description(&self) -> &str {
        "Get server statistics"
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

struct Broadcast;

impl Action for Broadcast {
    fn execute(&self, request: ActionRequest<'_>) -> Result<Option<JsonObject>, CapabilityError> {
        let message = request
            .body
            .and_then(|b| b.get("message"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CapabilityError::BadRequest("Message required in request body".to_owned())
            })?;

        request
            .world
            .push_message(None, None, message, BROADCAST_TYPE)
            .map_err(|e| CapabilityError::BadRequest(e.to_string()))?;

        let mut response = JsonObject::new();
        response.insert("success".to_owned(), json!(true));
        response.insert("message".to_owned(), json!("Broadcast sent successfully"));
        response.insert("recipients".to_owned(), json!(request.world.online_count()));
        Ok(Some(response))
    }

    fn supported_methods(&self) -> &[Method] {
        &[Method::Post]
    }

    fn description(&self) -> &str {
        "Broadcast a message to all online players"
    }
}

// ---------------------------------------------------------------------------
// Enhancers
// ---------------------------------------------------------------------------

struct RuntimeEnhancer;

impl Enhancer for RuntimeEnhancer {
    fn enhance(
        &self,
        response: &mut JsonObject,
        _original: &JsonObject,
        request: &EnhanceRequest<'_>,
    ) -> Result<(), CapabilityError> {
        let world = request.world;
        let loaded_chunks: u64 = world
            .worlds
            .values()
            .map(|w| u64::from(w.loaded_chunks))
            .fold(0, u64::saturating_add);
        response.insert(
            "performance".to_owned(),
            json!({
                "tick": world.tick,
                "worldsLoaded": world.worlds.len(),
                "loadedChunks": loaded_chunks,
                "storedMessages": world.messages.len(),
            }),
        );
        Ok(())
    }

    fn description(&self) -> &str {
        "Adds runtime figures to the server endpoint"
    }

    fn priority(&self) -> i32 {
        50
    }
}

struct MetadataEnhancer {
    module: String,
    config: Arc<ModuleConfig>,
}

impl Enhancer for MetadataEnhancer {
    fn enhance(
        &self,
        response: &mut JsonObject,
        _original: &JsonObject,
        _request: &EnhanceRequest<'_>,
    ) -> Result<(), CapabilityError> {
        response.insert(
            "moduleData".to_owned(),
            json!({
                "name": self.module,
                "version": MODULE_VERSION,
                "active": true,
                "enhancementTime": Utc::now().timestamp_millis(),
            }),
        );
        response.insert(
            "welcomeMessage".to_owned(),
            json!(self
                .config
                .get_or("welcome-message", DEFAULT_WELCOME.to_owned())),
        );
        Ok(())
    }

    fn description(&self) -> &str {
        "Adds module metadata and the welcome message to the server endpoint"
    }
}

struct PlayerDetailEnhancer;

impl Enhancer for PlayerDetailEnhancer {
    fn enhance(
        &self,
        response: &mut JsonObject,
        _original: &JsonObject,
        request: &EnhanceRequest<'_>,
    ) -> Result<(), CapabilityError> {
        let Some(player) = request
            .identifier
            .and_then(|id| request.world.find_player(id))
            .filter(|p| p.online)
        else {
            return Ok(());
        };
        response.insert(
            "detailedStats".to_owned(),
            json!({
                "health": player.health,
                "healthPercent": player.health / 20.0 * 100.0,
                "level": player.level,
                "world": player.world,
            }),
        );
        Ok(())
    }

    fn description(&self) -> &str {
        "Adds detailed stats for online players"
    }
}

struct PlayersStatsEnhancer;

fn averages(world: &SimulationState) -> (f64, f64, usize) {
    let (count, level_sum, health_sum) = world.online_players().fold(
        (0_usize, 0_f64, 0_f64),
        |(count, levels, health), p| (count.saturating_add(1), levels + f64::from(p.level), health + p.health),
    );
    if count == 0 {
        return (0.0, 0.0, 0);
    }
    let divisor = f64::from(u32::try_from(count).unwrap_or(u32::MAX));
    (level_sum / divisor, health_sum / divisor, count)
}

impl Enhancer for PlayersStatsEnhancer {
    fn enhance(
        &self,
        response: &mut JsonObject,
        _original: &JsonObject,
        request: &EnhanceRequest<'_>,
    ) -> Result<(), CapabilityError> {
        let (average_level, average_health, total) = averages(request.world);
        response.insert(
            "statistics".to_owned(),
            json!({
                "averageLevel": average_level,
                "averageHealth": average_health,
                "totalPlayers": total,
            }),
        );
        Ok(())
    }

    fn description(&self) -> &str {
        "Adds aggregate statistics to the players endpoint"
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::indexing_slicing)]

    use std::path::Path;

    use chrono::Utc;
    use simgate_core::config::ServerIdentityConfig;
    use simgate_core::state::Player;
    use simgate_modules::{EndpointRegistry, ModuleCatalog, ModuleLoader, Params};
    use uuid::Uuid;

    use super::*;

    fn world() -> SimulationState {
        let mut state = SimulationState::with_default_worlds(ServerIdentityConfig::default());
        for (name, level, health) in [("Alice", 10, 20.0), ("Bob", 20, 10.0)] {
            state.add_player(Player {
                uuid: Uuid::new_v4(),
                name: name.to_owned(),
                world: "world".to_owned(),
                health,
                level,
                online: true,
                first_joined: Utc::now(),
            });
        }
        state
    }

    fn install(root: &Path) -> (ModuleLoader, Arc<EndpointRegistry>) {
        let package = root.join("modules").join("example");
        std::fs::create_dir_all(&package).unwrap();
        std::fs::write(
            package.join("module.yml"),
            format!("name: example\nmain: {ENTRY_POINT}\nauthor: Simgate\n"),
        )
        .unwrap();
        std::fs::write(package.join("config.yml"), "welcome-message: Welcome aboard\n").unwrap();

        let registry = Arc::new(EndpointRegistry::new());
        let catalog = ModuleCatalog::new().with(ENTRY_POINT, create);
        let mut loader = ModuleLoader::new(catalog, Arc::clone(&registry), root.join("data"));
        loader.load_all(&root.join("modules")).unwrap();
        assert_eq!(loader.enable_all().enabled, vec!["example".to_owned()]);
        (loader, registry)
    }

    #[test]
    fn enhances_server_with_runtime_then_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let (_loader, registry) = install(dir.path());
        let state = world();
        let params = Params::new();
        let mut original = JsonObject::new();
        original.insert("name".to_owned(), json!("srv"));

        let request = EnhanceRequest {
            identifier: None,
            params: &params,
            world: &state,
        };
        let enhanced = registry.enhance("server", &original, &request);
        let keys: Vec<&str> = enhanced.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "performance", "moduleData", "welcomeMessage"]);
        assert_eq!(enhanced["welcomeMessage"], json!("Welcome aboard"));
        assert!(dir.path().join("data/example/config.yml").is_file());
    }

    #[test]
    fn players_statistics_average_online_players() {
        let state = world();
        let (level, health, total) = averages(&state);
        assert_eq!(total, 2);
        assert!((level - 15.0).abs() < f64::EPSILON);
        assert!((health - 15.0).abs() < f64::EPSILON);
        let (_, _, none) = averages(&SimulationState::default());
        assert_eq!(none, 0);
    }

    #[test]
    fn broadcast_records_a_message() {
        let dir = tempfile::tempdir().unwrap();
        let (_loader, registry) = install(dir.path());
        let mut state = world();
        let params = Params::new();
        let action = registry.action("example", "broadcast").unwrap();

        let mut body = JsonObject::new();
        body.insert("message".to_owned(), json!("server restarting"));
        let reply = action
            .execute(ActionRequest {
                method: Method::Post,
                params: &params,
                body: Some(&body),
                world: &mut state,
            })
            .unwrap()
            .unwrap();
        assert_eq!(reply["recipients"], json!(2));
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].message_type, BROADCAST_TYPE);

        let missing = action.execute(ActionRequest {
            method: Method::Post,
            params: &params,
            body: None,
            world: &mut state,
        });
        assert!(matches!(missing, Err(CapabilityError::BadRequest(_))));
    }

    #[test]
    fn players_source_honours_health_parameter() {
        let state = world();
        let mut params = Params::new();
        let plain = PlayersSource
            .fetch(&DataRequest { params: &params, world: &state })
            .unwrap();
        assert!(plain[0].get("health").is_none());

        params.insert("health".to_owned(), "true".to_owned());
        let detailed = PlayersSource
            .fetch(&DataRequest { params: &params, world: &state })
            .unwrap();
        assert!(detailed[0].get("health").is_some());
    }
}

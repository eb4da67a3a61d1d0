//! Integration tests for module discovery, lifecycle, and composition.
//!
//! Each test lays out module packages in a temporary directory, loads them
//! through a [`ModuleLoader`] backed by a catalog of test modules, and then
//! inspects the shared registry.

#![allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};
use simgate_core::state::SimulationState;
use simgate_modules::loader::SkipReason;
use simgate_modules::{
    module_listing, Action, ActionRequest, CapabilityError, DataRequest, DataSource,
    EndpointRegistry, EnhanceRequest, Enhancer, JsonObject, LoadError, Method, Module,
    ModuleCatalog, ModuleContext, ModuleError, ModuleLoader, ModuleState, Params,
};

// ---------------------------------------------------------------------------
// Test capabilities
// ---------------------------------------------------------------------------

struct Constant(Value);

impl DataSource for Constant {
    fn fetch(&self, _request: &DataRequest<'_>) -> Result<Value, CapabilityError> {
        Ok(self.0.clone())
    }

    fn description(&self) -> &str {
        "constant value"
    }

    fn supported_parameters(&self) -> &[&'static str] {
        &["verbose"]
    }
}

struct Echo;

impl Action for Echo {
    fn execute(&self, request: ActionRequest<'_>) -> Result<Option<JsonObject>, CapabilityError> {
        Ok(request.body.cloned())
    }

    fn supported_methods(&self) -> &[Method] {
        &[Method::Post]
    }

    fn description(&self) -> &str {
        "echo the body"
    }
}

struct AddField {
    key: &'static str,
    priority: i32,
}

impl Enhancer for AddField {
    fn enhance(
        &self,
        response: &mut JsonObject,
        _original: &JsonObject,
        _request: &EnhanceRequest<'_>,
    ) -> Result<(), CapabilityError> {
        response.insert(self.key.to_owned(), Value::Bool(true));
        Ok(())
    }

    fn description(&self) -> &str {
        self.key
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

// ---------------------------------------------------------------------------
// Test modules
// ---------------------------------------------------------------------------

struct Alpha;

impl Module for Alpha {
    fn on_enable(&mut self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        ctx.register_data_source("info", Constant(json!({"from": "alpha"})));
        ctx.register_action("echo", Echo);
        ctx.register_enhancer("server", AddField { key: "alpha_uptime", priority: 50 });
        ctx.register_enhancer("players", AddField { key: "alpha_count", priority: 100 });
        Ok(())
    }
}

struct Beta;

impl Module for Beta {
    fn on_enable(&mut self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        ctx.register_enhancer("server", AddField { key: "beta_info", priority: 100 });
        Ok(())
    }
}

struct FailsToEnable;

impl Module for FailsToEnable {
    fn on_enable(&mut self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        ctx.register_data_source("early", Constant(Value::Null));
        Err(ModuleError::Failed("database unavailable".to_owned()))
    }
}

struct PanicsOnLoad;

impl Module for PanicsOnLoad {
    fn on_load(&mut self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        ctx.register_data_source("ghost", Constant(Value::Null));
        panic!("load exploded")
    }

    fn on_enable(&mut self, _ctx: &ModuleContext) -> Result<(), ModuleError> {
        Ok(())
    }
}

fn alpha() -> Box<dyn Module> {
    Box::new(Alpha)
}

fn beta() -> Box<dyn Module> {
    Box::new(Beta)
}

fn fails_to_enable() -> Box<dyn Module> {
    Box::new(FailsToEnable)
}

fn panics_on_load() -> Box<dyn Module> {
    Box::new(PanicsOnLoad)
}

fn catalog() -> ModuleCatalog {
    ModuleCatalog::new()
        .with("test::Alpha", alpha)
        .with("test::Beta", beta)
        .with("test::FailsToEnable", fails_to_enable)
        .with("test::PanicsOnLoad", panics_on_load)
}

fn package(root: &Path, dir: &str, descriptor: Option<(&str, &str)>) {
    let path = root.join(dir);
    std::fs::create_dir_all(&path).unwrap();
    if let Some((file, contents)) = descriptor {
        std::fs::write(path.join(file), contents).unwrap();
    }
}

fn loader_for(root: &Path) -> (ModuleLoader, Arc<EndpointRegistry>) {
    let registry = Arc::new(EndpointRegistry::new());
    let loader = ModuleLoader::new(catalog(), Arc::clone(&registry), root.join("data"));
    (loader, registry)
}

fn server_original() -> JsonObject {
    let mut original = JsonObject::new();
    original.insert("name".to_owned(), Value::from("srv"));
    original
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[test]
fn load_all_skips_and_fails_per_candidate() {
    let dir = tempfile::tempdir().unwrap();
    let modules = dir.path().join("modules");
    package(&modules, "a-alpha", Some(("module.yml", "name: alpha\nmain: test::Alpha\n")));
    package(&modules, "b-alpha-copy", Some(("module.yml", "name: Alpha\nmain: test::Beta\n")));
    package(&modules, "c-empty", None);
    package(&modules, "d-unknown", Some(("module.yml", "name: ghost\nmain: test::Missing\n")));
    package(&modules, "e-beta", Some(("plugin.yml", "name: beta\nmain: \"test::Beta\"\n")));
    package(&modules, "f-panics", Some(("module.yml", "name: boom\nmain: test::PanicsOnLoad\n")));

    let (mut loader, registry) = loader_for(dir.path());
    let report = loader.load_all(&modules).unwrap();

    assert_eq!(report.loaded, vec!["alpha".to_owned(), "beta".to_owned()]);
    let reasons: Vec<&SkipReason> = report.skipped.iter().map(|s| &s.reason).collect();
    assert_eq!(
        reasons,
        vec![
            &SkipReason::Duplicate { name: "alpha".to_owned() },
            &SkipReason::NoManifest,
        ]
    );
    assert_eq!(report.failed.len(), 2);
    assert!(matches!(report.failed[0].error, LoadError::UnknownEntryPoint { .. }));
    assert!(matches!(
        report.failed[1].error,
        LoadError::LoadHook { source: ModuleError::Panicked(_), .. }
    ));

    // The panicking module's load-time registration was rolled back.
    assert!(registry.data_source("boom", "ghost").is_none());
    assert_eq!(loader.state("alpha"), Some(ModuleState::Loaded));
    assert!(dir.path().join("data/alpha").is_dir());
}

#[test]
fn load_all_creates_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let modules = dir.path().join("not-yet");
    let (mut loader, _registry) = loader_for(dir.path());

    let report = loader.load_all(&modules).unwrap();
    assert!(report.loaded.is_empty());
    assert!(modules.is_dir());
}

// ---------------------------------------------------------------------------
// Lifecycle and registry visibility
// ---------------------------------------------------------------------------

#[test]
fn registrations_appear_on_enable_and_vanish_on_disable() {
    let dir = tempfile::tempdir().unwrap();
    let modules = dir.path().join("modules");
    package(&modules, "alpha", Some(("module.yml", "name: alpha\nmain: test::Alpha\n")));
    package(&modules, "beta", Some(("module.yml", "name: beta\nmain: test::Beta\n")));

    let (mut loader, registry) = loader_for(dir.path());
    loader.load_all(&modules).unwrap();
    assert!(registry.data_source("alpha", "info").is_none());

    let report = loader.enable_all();
    assert_eq!(report.enabled.len(), 2);
    assert!(registry.data_source("ALPHA", "Info").is_some());
    assert!(registry.action("alpha", "echo").is_some());

    assert!(loader.disable("alpha"));
    assert!(registry.data_source("alpha", "info").is_none());
    assert!(registry.action("alpha", "echo").is_none());
    assert!(registry.enhancers_for("players").is_empty());
    assert_eq!(loader.directory().get("alpha").map(|s| s.state), Some(ModuleState::Disabled));

    let world = SimulationState::default();
    let params = Params::new();
    let request = EnhanceRequest { identifier: None, params: &params, world: &world };
    let original = server_original();
    let enhanced = registry.enhance("server", &original, &request);
    assert!(enhanced.get("alpha_uptime").is_none());
    assert_eq!(enhanced.get("beta_info"), Some(&Value::Bool(true)));

    assert!(!loader.disable("alpha"));
}

#[test]
fn failed_enable_keeps_module_loaded_and_its_registrations() {
    let dir = tempfile::tempdir().unwrap();
    let modules = dir.path().join("modules");
    package(&modules, "flaky", Some(("module.yml", "name: flaky\nmain: test::FailsToEnable\n")));

    let (mut loader, registry) = loader_for(dir.path());
    loader.load_all(&modules).unwrap();
    let report = loader.enable_all();

    assert!(report.enabled.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(loader.state("flaky"), Some(ModuleState::Loaded));
    assert!(registry.data_source("flaky", "early").is_some());
}

#[test]
fn disable_all_clears_everything() {
    let dir = tempfile::tempdir().unwrap();
    let modules = dir.path().join("modules");
    package(&modules, "alpha", Some(("module.yml", "name: alpha\nmain: test::Alpha\n")));

    let (mut loader, registry) = loader_for(dir.path());
    let directory = loader.directory();
    loader.load_all(&modules).unwrap();
    loader.enable_all();
    assert_eq!(directory.len(), 1);

    loader.disable_all();
    assert!(loader.is_empty());
    assert!(directory.is_empty());
    assert!(registry.is_empty());
}

// ---------------------------------------------------------------------------
// End-to-end composition
// ---------------------------------------------------------------------------

#[test]
fn two_modules_enhance_server_in_priority_order() {
    let dir = tempfile::tempdir().unwrap();
    let modules = dir.path().join("modules");
    // "early" enables first but registers the later-priority enhancer.
    package(&modules, "early", Some(("module.yml", "name: early\nmain: test::Beta\n")));
    package(&modules, "late", Some(("module.yml", "name: late\nmain: test::Alpha\n")));

    let (mut loader, registry) = loader_for(dir.path());
    loader.load_all(&modules).unwrap();
    loader.enable_all();

    let world = SimulationState::default();
    let params = Params::new();
    let request = EnhanceRequest { identifier: None, params: &params, world: &world };
    let original = server_original();
    let enhanced = registry.enhance("server", &original, &request);

    let keys: Vec<&str> = enhanced.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["name", "alpha_uptime", "beta_info"]);
    assert_eq!(enhanced.get("name"), Some(&Value::from("srv")));
}

#[test]
fn listing_describes_endpoints_and_enhancements() {
    let dir = tempfile::tempdir().unwrap();
    let modules = dir.path().join("modules");
    package(
        &modules,
        "alpha",
        Some(("module.yml", "name: alpha\nmain: test::Alpha\nversion: 0.3.0\nauthor: QA\n")),
    );

    let (mut loader, registry) = loader_for(dir.path());
    loader.load_all(&modules).unwrap();
    loader.enable_all();

    let listing = Value::Object(module_listing(&loader.directory(), &registry));
    assert_eq!(listing["count"], json!(1));
    let alpha = &listing["modules"][0];
    assert_eq!(alpha["name"], json!("alpha"));
    assert_eq!(alpha["version"], json!("0.3.0"));
    assert_eq!(alpha["state"], json!("enabled"));
    assert_eq!(alpha["package"], json!("alpha"));
    assert_eq!(alpha["dataEndpoints"][0]["path"], json!("/api/alpha/info"));
    assert_eq!(alpha["dataEndpoints"][0]["parameters"], json!(["verbose"]));
    assert_eq!(alpha["actionEndpoints"][0]["methods"], json!(["POST"]));
    assert_eq!(alpha["baseEnhancements"].as_array().map(Vec::len), Some(2));
}

//! Composition of enhancers over a base endpoint response.

use std::borrow::Cow;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{trace, warn};

use crate::capability::{EnhanceRequest, JsonObject};
use crate::error::panic_message;
use crate::registry::EndpointRegistry;

impl EndpointRegistry {
    /// Run every enhancer registered for `base_endpoint` over a copy of
    /// `original`.
    ///
    /// With no enhancers the original is returned borrowed and nothing is
    /// copied. Otherwise enhancers run in ascending priority order (ties in
    /// registration order) against a deep copy. An enhancer that errors or
    /// panics is logged and skipped; fields added by earlier enhancers are
    /// kept. An enhancer unregistered while the pass is running is not
    /// started.
    pub fn enhance<'a>(
        &self,
        base_endpoint: &str,
        original: &'a JsonObject,
        request: &EnhanceRequest<'_>,
    ) -> Cow<'a, JsonObject> {
        let enhancers = self.enhancers_for(base_endpoint);
        if enhancers.is_empty() {
            return Cow::Borrowed(original);
        }

        let mut working = original.clone();
        for entry in enhancers.iter() {
            if !entry.is_live() {
                trace!(base_endpoint, owner = %entry.owner, "Enhancer unregistered mid-pass, not started");
                continue;
            }
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                entry.enhancer.enhance(&mut working, original, request)
            }));
            match outcome {
                Ok(Ok(())) => {
                    trace!(base_endpoint, owner = %entry.owner, priority = entry.priority, "Enhancer applied");
                }
                Ok(Err(e)) => {
                    warn!(base_endpoint, owner = %entry.owner, error = %e, "Enhancer failed, skipping");
                }
                Err(payload) => {
                    warn!(
                        base_endpoint,
                        owner = %entry.owner,
                        panic = %panic_message(payload.as_ref()),
                        "Enhancer panicked, skipping"
                    );
                }
            }
        }
        Cow::Owned(working)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};
    use simgate_core::state::SimulationState;

    use super::*;
    use crate::capability::{Enhancer, Params};
    use crate::error::CapabilityError;

    /// Appends its label to the `trace` array and sets a field of its own.
    struct Mark {
        label: &'static str,
        priority: i32,
    }

    impl Enhancer for Mark {
        fn enhance(
            &self,
            response: &mut JsonObject,
            _original: &JsonObject,
            _request: &EnhanceRequest<'_>,
        ) -> Result<(), CapabilityError> {
            if let Some(Value::Array(trace)) = response.get_mut("trace") {
                trace.push(Value::from(self.label));
            } else {
                response.insert("trace".to_owned(), json!([self.label]));
            }
            response.insert(format!("field_{}", self.label), Value::Bool(true));
            Ok(())
        }

        fn description(&self) -> &str {
            self.label
        }

        fn priority(&self) -> i32 {
            self.priority
        }
    }

    struct Failing;

    impl Enhancer for Failing {
        fn enhance(
            &self,
            response: &mut JsonObject,
            _original: &JsonObject,
            _request: &EnhanceRequest<'_>,
        ) -> Result<(), CapabilityError> {
            response.insert("partial".to_owned(), Value::Null);
            Err(CapabilityError::Failed("nope".to_owned()))
        }

        fn description(&self) -> &str {
            "failing"
        }
    }

    struct Panicking;

    impl Enhancer for Panicking {
        #[allow(clippy::panic)]
        fn enhance(
            &self,
            _response: &mut JsonObject,
            _original: &JsonObject,
            _request: &EnhanceRequest<'_>,
        ) -> Result<(), CapabilityError> {
            panic!("enhancer exploded")
        }

        fn description(&self) -> &str {
            "panicking"
        }
    }

    /// Removes every `server` enhancer owned by `late` when it runs.
    struct Unregisters {
        registry: Arc<EndpointRegistry>,
    }

    impl Enhancer for Unregisters {
        fn enhance(
            &self,
            _response: &mut JsonObject,
            _original: &JsonObject,
            _request: &EnhanceRequest<'_>,
        ) -> Result<(), CapabilityError> {
            self.registry.unregister_enhancers("server", "late");
            Ok(())
        }

        fn description(&self) -> &str {
            "unregisters"
        }

        fn priority(&self) -> i32 {
            10
        }
    }

    fn mark(label: &'static str, priority: i32) -> Arc<dyn Enhancer> {
        Arc::new(Mark { label, priority })
    }

    fn original() -> JsonObject {
        let mut map = JsonObject::new();
        map.insert("name".to_owned(), Value::from("srv"));
        map
    }

    fn trace_of(response: &JsonObject) -> Vec<String> {
        response
            .get("trace")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).map(str::to_owned).collect())
            .unwrap_or_default()
    }

    #[test]
    fn no_enhancers_returns_original_borrowed() {
        let registry = EndpointRegistry::new();
        let world = SimulationState::default();
        let params = Params::new();
        let request = EnhanceRequest { identifier: None, params: &params, world: &world };
        let base = original();

        let result = registry.enhance("server", &base, &request);
        assert!(matches!(result, Cow::Borrowed(_)));
        assert!(std::ptr::eq(result.as_ref(), &base));
    }

    #[test]
    fn runs_in_priority_then_registration_order() {
        let world = SimulationState::default();
        let params = Params::new();
        let request = EnhanceRequest { identifier: None, params: &params, world: &world };
        let base = original();

        let registry = EndpointRegistry::new();
        registry.register_enhancer("m", "server", mark("p200", 200));
        registry.register_enhancer("m", "server", mark("a100", 100));
        registry.register_enhancer("m", "server", mark("b100", 100));
        registry.register_enhancer("m", "server", mark("p50", 50));
        let result = registry.enhance("server", &base, &request);
        assert_eq!(trace_of(&result), vec!["p50", "a100", "b100", "p200"]);

        let swapped = EndpointRegistry::new();
        swapped.register_enhancer("m", "server", mark("p200", 200));
        swapped.register_enhancer("m", "server", mark("b100", 100));
        swapped.register_enhancer("m", "server", mark("a100", 100));
        swapped.register_enhancer("m", "server", mark("p50", 50));
        let result = swapped.enhance("server", &base, &request);
        assert_eq!(trace_of(&result), vec!["p50", "b100", "a100", "p200"]);
    }

    #[test]
    fn failing_and_panicking_enhancers_are_skipped() {
        let world = SimulationState::default();
        let params = Params::new();
        let request = EnhanceRequest { identifier: None, params: &params, world: &world };
        let base = original();

        let registry = EndpointRegistry::new();
        registry.register_enhancer("m", "server", mark("first", 10));
        registry.register_enhancer("bad", "server", Arc::new(Failing));
        registry.register_enhancer("worse", "server", Arc::new(Panicking));
        registry.register_enhancer("m", "server", mark("last", 300));

        let result = registry.enhance("server", &base, &request);
        assert_eq!(trace_of(&result), vec!["first", "last"]);
        assert_eq!(result.get("field_first"), Some(&Value::Bool(true)));
        assert_eq!(result.get("field_last"), Some(&Value::Bool(true)));
        assert_eq!(result.get("name"), Some(&Value::from("srv")));
    }

    #[test]
    fn original_is_never_mutated() {
        let world = SimulationState::default();
        let params = Params::new();
        let request = EnhanceRequest { identifier: Some("alice"), params: &params, world: &world };
        let base = original();

        let registry = EndpointRegistry::new();
        registry.register_enhancer("m", "player", mark("x", 100));
        let result = registry.enhance("player", &base, &request);

        assert!(matches!(result, Cow::Owned(_)));
        assert_eq!(base.len(), 1);
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn enhancer_removed_mid_pass_is_not_started() {
        let world = SimulationState::default();
        let params = Params::new();
        let request = EnhanceRequest { identifier: None, params: &params, world: &world };
        let base = original();

        let registry = Arc::new(EndpointRegistry::new());
        registry.register_enhancer("m", "server", mark("early", 5));
        registry.register_enhancer(
            "remover",
            "server",
            Arc::new(Unregisters { registry: Arc::clone(&registry) }),
        );
        registry.register_enhancer("late", "server", mark("late", 100));

        let result = registry.enhance("server", &base, &request);
        assert_eq!(trace_of(&result), vec!["early"]);
        assert!(registry.enhancers_of("late").is_empty());

        // The enhancer holds the registry; clearing breaks the cycle.
        registry.clear();
    }
}

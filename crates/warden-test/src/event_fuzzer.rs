//! Event Fuzzer - Mutation testing for the guest boundary
//!
//! Starts from well-formed raw events and corrupts them the way a buggy or
//! hostile guest would:
//! - Missing and retyped fields
//! - Out-of-range numbers
//! - Unknown kinds and unknown fields
//! - Oversized strings and deep nesting
//! - Non-object payloads
//!
//! Checks that validation never panics, that production never surfaces an
//! unrecognized kind as an error, that accepted events are stable under
//! re-validation, and that the pipeline accounts for every emitted event.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Map, Value};

use warden_core::{contain, ValidationMode};
use warden_emit::{EnrichedEvent, PipelineConfig};
use warden_runtime::HostConfig;
use warden_validate::{EventValidator, ValidationOutcome, ValidatorConfig};

use crate::{HarnessConfig, ScenarioHarness};

/// Session id used by every template
pub const FUZZ_SESSION: &str = "fuzz-session";

/// Fuzzer configuration
#[derive(Clone, Debug)]
pub struct FuzzerConfig {
    /// Number of raw events to generate
    pub event_count: usize,
    /// Upper bound on mutations applied to one event
    pub max_mutations: usize,
    /// Probability that an event is left untouched
    pub pristine_prob: f64,
    pub mode: ValidationMode,
    /// Random seed
    pub seed: u64,
}

impl Default for FuzzerConfig {
    fn default() -> Self {
        FuzzerConfig {
            event_count: 1000,
            max_mutations: 3,
            pristine_prob: 0.2,
            mode: ValidationMode::Production,
            seed: 42,
        }
    }
}

impl FuzzerConfig {
    /// Light fuzzing for quick tests
    pub fn light() -> Self {
        FuzzerConfig {
            event_count: 200,
            max_mutations: 2,
            ..Default::default()
        }
    }

    /// Heavy fuzzing for thorough testing
    pub fn heavy() -> Self {
        FuzzerConfig {
            event_count: 10_000,
            max_mutations: 6,
            pristine_prob: 0.1,
            ..Default::default()
        }
    }

    /// Every event corrupted, several times over
    pub fn adversarial() -> Self {
        FuzzerConfig {
            event_count: 5_000,
            max_mutations: 8,
            pristine_prob: 0.0,
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Corruption applied to a raw event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutation {
    RemoveField,
    RetypeField,
    OutOfRange,
    UnknownKind,
    UnknownField,
    HugeString,
    DeepNesting,
    NonObject,
}

impl Mutation {
    pub const ALL: &'static [Mutation] = &[
        Mutation::RemoveField,
        Mutation::RetypeField,
        Mutation::OutOfRange,
        Mutation::UnknownKind,
        Mutation::UnknownField,
        Mutation::HugeString,
        Mutation::DeepNesting,
        Mutation::NonObject,
    ];
}

/// One well-formed raw event per kind
pub fn templates() -> Vec<Value> {
    let s = FUZZ_SESSION;
    vec![
        json!({"kind": "SESSION_STARTED", "sessionId": s}),
        json!({"kind": "SESSION_ENDED", "sessionId": s, "reason": "completed"}),
        json!({"kind": "LEVEL_STARTED", "sessionId": s, "levelId": "l-1", "difficulty": 2}),
        json!({"kind": "LEVEL_COMPLETED", "sessionId": s, "levelId": "l-1", "durationMs": 31_000, "accuracy": 0.9, "score": 450}),
        json!({"kind": "LEVEL_FAILED", "sessionId": s, "levelId": "l-1", "reason": "timeout", "attempts": 3}),
        json!({"kind": "PROGRESS_CHECKPOINT", "sessionId": s, "levelId": "l-1", "completedSteps": 2, "totalSteps": 4}),
        json!({"kind": "PERFORMANCE_SAMPLE", "sessionId": s, "accuracy": 0.6, "successRate": 0.5, "reactionTimeMs": 420.0, "errorCount": 1, "streak": 5}),
        json!({"kind": "TIME_ON_TASK", "sessionId": s, "levelId": "l-1", "durationMs": 12_000, "focusRatio": 0.8}),
        json!({"kind": "DIFFICULTY_CHANGED", "sessionId": s, "from": 2, "to": 3, "reason": "adaptive"}),
        json!({"kind": "FRICTION_REPORTED", "sessionId": s, "frictionType": "confused", "intensity": 0.4}),
        json!({"kind": "ERROR_OCCURRED", "errorType": "runtime", "message": "boom", "recoverable": true}),
        json!({"kind": "STATE_SAVE_REQUESTED", "sessionId": s, "payload": {"slot": 1, "grid": [1, 2, 3]}}),
        json!({"kind": "USER_SIGNAL", "sessionId": s, "signalType": "fatigue", "value": 0.3}),
        json!({"kind": "DEV_LOG", "level": "info", "message": "tick"}),
    ]
}

/// Validation fuzzing result
#[derive(Debug, Default)]
pub struct FuzzResult {
    pub generated: usize,
    pub accepted: usize,
    pub rejected: usize,
    /// Unknown kinds reported as errors (development only)
    pub unrecognized: usize,
    pub panics: Vec<String>,
    pub violations: Vec<String>,
}

impl FuzzResult {
    pub fn is_valid(&self) -> bool {
        self.panics.is_empty() && self.violations.is_empty()
    }
}

/// Pipeline fuzzing result
#[derive(Debug, Default)]
pub struct PipelineFuzzResult {
    pub emitted: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub panics: Vec<String>,
    pub violations: Vec<String>,
}

impl PipelineFuzzResult {
    /// Every emitted event ended up delivered or dropped
    pub fn is_accounted(&self) -> bool {
        self.emitted == self.delivered + self.dropped
    }

    pub fn is_valid(&self) -> bool {
        self.is_accounted() && self.panics.is_empty() && self.violations.is_empty()
    }
}

/// Raw event fuzzer
pub struct EventFuzzer {
    config: FuzzerConfig,
    templates: Vec<Value>,
    validator: EventValidator,
    rng: StdRng,
}

impl EventFuzzer {
    pub fn new(config: FuzzerConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        let validator = EventValidator::new(ValidatorConfig::default().with_mode(config.mode));
        EventFuzzer {
            config,
            templates: templates(),
            validator,
            rng,
        }
    }

    pub fn config(&self) -> &FuzzerConfig {
        &self.config
    }

    /// Produce one raw event, possibly corrupted
    pub fn generate(&mut self) -> Value {
        let idx = self.rng.gen_range(0..self.templates.len());
        let mut raw = self.templates[idx].clone();
        if self.rng.gen::<f64>() < self.config.pristine_prob {
            return raw;
        }
        let count = self.rng.gen_range(1..=self.config.max_mutations.max(1));
        for _ in 0..count {
            let mutation = Mutation::ALL[self.rng.gen_range(0..Mutation::ALL.len())];
            raw = self.mutate(raw, mutation);
        }
        raw
    }

    pub fn mutate(&mut self, raw: Value, mutation: Mutation) -> Value {
        let mut map = match raw {
            Value::Object(map) => map,
            // Already mangled past the point of field surgery
            other if mutation == Mutation::DeepNesting => return nest(other, 64),
            other => return other,
        };

        match mutation {
            Mutation::RemoveField => {
                if let Some(key) = self.pick_key(&map) {
                    map.remove(&key);
                }
            }
            Mutation::RetypeField => {
                if let Some(key) = self.pick_key(&map) {
                    let replacement = self.random_scalar();
                    map.insert(key, replacement);
                }
            }
            Mutation::OutOfRange => {
                if let Some(key) = self.pick_key(&map) {
                    let extreme = match self.rng.gen_range(0..5) {
                        0 => json!(-1),
                        1 => json!(f64::MAX),
                        2 => json!(-1.0e300),
                        3 => json!(u64::MAX),
                        _ => json!(1.5),
                    };
                    map.insert(key, extreme);
                }
            }
            Mutation::UnknownKind => {
                let tag = format!("KIND_{}", self.rng.gen_range(0..1000u32));
                map.insert("kind".into(), json!(tag));
            }
            Mutation::UnknownField => {
                let key = format!("extra{}", self.rng.gen_range(0..100u32));
                let value = self.random_scalar();
                map.insert(key, value);
            }
            Mutation::HugeString => {
                if let Some(key) = self.pick_key(&map) {
                    let len = self.rng.gen_range(1_000..100_000);
                    map.insert(key, json!("x".repeat(len)));
                }
            }
            Mutation::DeepNesting => {
                if let Some(key) = self.pick_key(&map) {
                    let inner = map.remove(&key).unwrap_or(Value::Null);
                    map.insert(key, nest(inner, 64));
                }
            }
            Mutation::NonObject => {
                return match self.rng.gen_range(0..4) {
                    0 => Value::Null,
                    1 => json!("SESSION_STARTED"),
                    2 => json!(42),
                    _ => Value::Array(vec![Value::Object(map)]),
                };
            }
        }
        Value::Object(map)
    }

    fn pick_key(&mut self, map: &Map<String, Value>) -> Option<String> {
        if map.is_empty() {
            return None;
        }
        let idx = self.rng.gen_range(0..map.len());
        map.keys().nth(idx).cloned()
    }

    fn random_scalar(&mut self) -> Value {
        match self.rng.gen_range(0..7) {
            0 => Value::Null,
            1 => json!(self.rng.gen::<bool>()),
            2 => json!(self.rng.gen_range(-1_000_000i64..1_000_000)),
            3 => json!(self.rng.gen::<f64>() * 10.0 - 5.0),
            4 => json!(""),
            5 => json!({"nested": true}),
            _ => json!([1, "two", null]),
        }
    }

    /// Fuzz the validator alone
    pub fn run(&mut self) -> FuzzResult {
        let mut result = FuzzResult::default();

        for _ in 0..self.config.event_count {
            let raw = self.generate();
            result.generated += 1;

            let validator = &self.validator;
            match contain(|| validator.validate(&raw)) {
                Err(panic) => result.panics.push(panic),
                Ok(Err(unrecognized)) => {
                    if self.config.mode.is_production() {
                        result
                            .violations
                            .push(format!("production surfaced {}", unrecognized));
                    }
                    result.unrecognized += 1;
                }
                Ok(Ok(outcome)) => {
                    if let Some(violation) = self.check_outcome(&outcome) {
                        result.violations.push(violation);
                    }
                    if outcome.valid {
                        result.accepted += 1;
                    } else {
                        result.rejected += 1;
                    }
                }
            }
        }

        result
    }

    fn check_outcome(&self, outcome: &ValidationOutcome) -> Option<String> {
        if outcome.valid != outcome.errors.is_empty() || outcome.valid != outcome.event.is_some() {
            return Some(format!("inconsistent outcome: {:?}", outcome.errors));
        }
        let event = outcome.event.as_ref()?;
        let wire = match event.to_value() {
            Ok(wire) => wire,
            Err(e) => return Some(format!("{} did not serialize: {}", event.kind(), e)),
        };
        match self.validator.validate(&wire) {
            Ok(again) if again.valid && again.warnings.is_empty() && again.event.as_ref() == Some(event) => {
                None
            }
            Ok(again) => Some(format!(
                "{} not stable under re-validation: errors {:?}, warnings {:?}",
                event.kind(),
                again.errors,
                again.warnings
            )),
            Err(e) => Some(format!("{} not recognized on re-validation: {}", event.kind(), e)),
        }
    }

    /// Fuzz a fully wired host with an active session
    pub fn run_pipeline(&mut self) -> PipelineFuzzResult {
        let mut result = PipelineFuzzResult::default();

        let pipeline = PipelineConfig::default()
            .with_mode(self.config.mode)
            .with_rate_limit(50, Duration::from_secs(1));
        let config = HarnessConfig {
            host: HostConfig {
                pipeline,
                ..Default::default()
            },
            ..Default::default()
        };
        let harness = match ScenarioHarness::new(config) {
            Ok(harness) => harness,
            Err(e) => {
                result.violations.push(format!("harness: {}", e));
                return result;
            }
        };
        if let Err(e) = harness.host().start_session(FUZZ_SESSION) {
            result.violations.push(format!("start_session: {}", e));
            return result;
        }

        for i in 0..self.config.event_count {
            // Let the rate log drain now and then so most events reach validation
            if i % 40 == 0 {
                harness.advance_ms(1_000);
            }
            let raw = self.generate();
            result.emitted += 1;
            if let Err(panic) = contain(|| harness.emit(raw)) {
                result.panics.push(panic);
            }
        }

        let stats = harness.stats();
        result.delivered = stats.delivered;
        result.dropped = stats.dropped;

        for delivered in harness.delivered() {
            if let Some(violation) = self.check_delivered(&delivered) {
                result.violations.push(violation);
            }
        }

        result
    }

    fn check_delivered(&self, delivered: &EnrichedEvent) -> Option<String> {
        let event = delivered.event();
        if self.config.mode.is_production() && event.is_diagnostic() {
            return Some("DEV_LOG delivered in production".into());
        }
        if let Some(claimed) = event.session_id() {
            if claimed.as_str() != FUZZ_SESSION {
                return Some(format!("{} delivered for foreign session {}", event.kind(), claimed));
            }
        }
        let wire = event.to_value().ok()?;
        match self.validator.validate(&wire) {
            Ok(outcome) if outcome.valid => None,
            _ => Some(format!("delivered {} does not re-validate", event.kind())),
        }
    }
}

fn nest(mut value: Value, depth: usize) -> Value {
    for _ in 0..depth {
        value = json!({ "inner": [value] });
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_templates_are_valid() {
        let validator = EventValidator::production();
        for raw in templates() {
            let outcome = validator.validate(&raw).unwrap();
            assert!(outcome.valid, "{}: {:?}", raw["kind"], outcome.errors);
            assert!(outcome.warnings.is_empty(), "{}: {:?}", raw["kind"], outcome.warnings);
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        let mut a = EventFuzzer::new(FuzzerConfig::light());
        let mut b = EventFuzzer::new(FuzzerConfig::light());
        for _ in 0..50 {
            assert_eq!(a.generate(), b.generate());
        }
    }

    #[test]
    fn test_light_fuzz_production() {
        let result = EventFuzzer::new(FuzzerConfig::light()).run();
        assert!(result.is_valid(), "panics {:?} violations {:?}", result.panics, result.violations);
        assert_eq!(result.generated, 200);
        assert_eq!(result.unrecognized, 0);
        assert!(result.accepted > 0);
        assert!(result.rejected > 0);
    }

    #[test]
    fn test_light_fuzz_development() {
        let config = FuzzerConfig::light().with_mode(ValidationMode::Development);
        let result = EventFuzzer::new(config).run();
        assert!(result.is_valid(), "panics {:?} violations {:?}", result.panics, result.violations);
        assert_eq!(
            result.accepted + result.rejected + result.unrecognized,
            result.generated
        );
    }

    #[test]
    fn test_adversarial_fuzz() {
        let config = FuzzerConfig {
            event_count: 500,
            ..FuzzerConfig::adversarial()
        };
        let result = EventFuzzer::new(config).run();
        assert!(result.is_valid(), "panics {:?} violations {:?}", result.panics, result.violations);
    }

    #[test]
    fn test_pipeline_accounts_for_every_event() {
        let result = EventFuzzer::new(FuzzerConfig::light()).run_pipeline();
        assert!(result.is_valid(), "panics {:?} violations {:?}", result.panics, result.violations);
        assert_eq!(result.emitted, 200);
        assert!(result.delivered > 0);
    }

    #[test]
    fn test_pipeline_development() {
        let config = FuzzerConfig::light().with_mode(ValidationMode::Development);
        let result = EventFuzzer::new(config).run_pipeline();
        assert!(result.is_valid(), "panics {:?} violations {:?}", result.panics, result.violations);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_any_seed_holds_up(seed in any::<u64>()) {
            let config = FuzzerConfig {
                event_count: 50,
                seed,
                ..FuzzerConfig::adversarial()
            };
            let result = EventFuzzer::new(config).run();
            prop_assert!(result.is_valid(), "panics {:?} violations {:?}", result.panics, result.violations);
        }
    }

    #[test]
    fn test_non_object_mutation() {
        let mut fuzzer = EventFuzzer::new(FuzzerConfig::default());
        let raw = fuzzer.mutate(templates()[0].clone(), Mutation::NonObject);
        assert!(!raw.is_object());
        let outcome = EventValidator::production().validate(&raw).unwrap();
        assert!(!outcome.valid);
    }
}

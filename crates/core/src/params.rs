//! Request parameters and model selection primitives.
//!
//! `RequestParams` is the per-invocation configuration bag a caller hands to
//! a reasoning loop. Model selection is preference-weighted: when no model is
//! pinned, candidates are scored against the caller's cost/speed/intelligence
//! weights and the best one wins.

use serde::{Deserialize, Serialize};

/// Per-invocation configuration for a reasoning loop call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestParams {
    /// Pinned model. When set, it is used verbatim and selection is skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Maximum tokens to generate per completion
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Bound on provider/tool round-trips for one invocation
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Execute a response's tool calls concurrently
    #[serde(default = "default_true")]
    pub parallel_tool_calls: bool,

    /// Compose requests from the owning loop's prior history
    #[serde(default = "default_true")]
    pub use_history: bool,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,

    /// Weights used to rank candidate models when no model is pinned
    #[serde(default)]
    pub preferences: ModelPreferences,
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_iterations() -> usize {
    8
}

fn default_true() -> bool {
    true
}

impl Default for RequestParams {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_iterations: default_max_iterations(),
            parallel_tool_calls: true,
            use_history: true,
            stop: Vec::new(),
            preferences: ModelPreferences::default(),
        }
    }
}

impl RequestParams {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_parallel_tool_calls(mut self, parallel: bool) -> Self {
        self.parallel_tool_calls = parallel;
        self
    }

    pub fn with_use_history(mut self, use_history: bool) -> Self {
        self.use_history = use_history;
        self
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_preferences(mut self, preferences: ModelPreferences) -> Self {
        self.preferences = preferences;
        self
    }
}

/// Preference weights for model selection, each in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPreferences {
    /// Weight on cheapness (a cheap model scores high under a high weight)
    #[serde(default = "default_weight")]
    pub cost: f32,

    /// Weight on response speed
    #[serde(default = "default_weight")]
    pub speed: f32,

    /// Weight on capability
    #[serde(default = "default_weight")]
    pub intelligence: f32,
}

fn default_weight() -> f32 {
    0.5
}

impl Default for ModelPreferences {
    fn default() -> Self {
        Self {
            cost: default_weight(),
            speed: default_weight(),
            intelligence: default_weight(),
        }
    }
}

impl ModelPreferences {
    /// Score a candidate against these weights. Higher is better.
    ///
    /// Cost is inverted: an expensive model (cost near 1.0) scores low under
    /// a high cost weight.
    pub fn score(&self, profile: &ModelProfile) -> f32 {
        let cost = self.cost.clamp(0.0, 1.0);
        let speed = self.speed.clamp(0.0, 1.0);
        let intelligence = self.intelligence.clamp(0.0, 1.0);
        cost * (1.0 - profile.cost) + speed * profile.speed + intelligence * profile.intelligence
    }

    /// Pick the highest-scoring candidate. Ties keep the earlier candidate.
    pub fn select<'a>(&self, candidates: &'a [ModelProfile]) -> Option<&'a ModelProfile> {
        let mut best: Option<(&ModelProfile, f32)> = None;
        for profile in candidates {
            let score = self.score(profile);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((profile, score)),
            }
        }
        best.map(|(profile, _)| profile)
    }
}

/// A candidate model's declared ratings, each in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelProfile {
    /// Model identifier as the provider expects it
    pub name: String,

    /// Relative expense (1.0 = most expensive)
    pub cost: f32,

    /// Relative speed (1.0 = fastest)
    pub speed: f32,

    /// Relative capability (1.0 = most capable)
    pub intelligence: f32,
}

impl ModelProfile {
    pub fn new(name: impl Into<String>, cost: f32, speed: f32, intelligence: f32) -> Self {
        Self { name: name.into(), cost, speed, intelligence }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_defaults() {
        let params = RequestParams::default();
        assert!(params.model.is_none());
        assert_eq!(params.max_iterations, 8);
        assert!(params.use_history);
        assert!(params.parallel_tool_calls);
        assert!((params.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn params_builder_chain() {
        let params = RequestParams::default()
            .with_model("fast-1")
            .with_max_iterations(3)
            .with_use_history(false);
        assert_eq!(params.model.as_deref(), Some("fast-1"));
        assert_eq!(params.max_iterations, 3);
        assert!(!params.use_history);
    }

    #[test]
    fn selection_prefers_intelligence_when_weighted() {
        let candidates = vec![
            ModelProfile::new("cheap", 0.1, 0.9, 0.3),
            ModelProfile::new("smart", 0.9, 0.4, 1.0),
        ];
        let prefs = ModelPreferences { cost: 0.0, speed: 0.0, intelligence: 1.0 };
        assert_eq!(prefs.select(&candidates).unwrap().name, "smart");
    }

    #[test]
    fn selection_prefers_cheap_when_cost_weighted() {
        let candidates = vec![
            ModelProfile::new("cheap", 0.1, 0.5, 0.3),
            ModelProfile::new("smart", 0.9, 0.5, 1.0),
        ];
        let prefs = ModelPreferences { cost: 1.0, speed: 0.0, intelligence: 0.2 };
        assert_eq!(prefs.select(&candidates).unwrap().name, "cheap");
    }

    #[test]
    fn selection_tie_keeps_first_candidate() {
        let candidates = vec![
            ModelProfile::new("first", 0.5, 0.5, 0.5),
            ModelProfile::new("second", 0.5, 0.5, 0.5),
        ];
        let prefs = ModelPreferences::default();
        assert_eq!(prefs.select(&candidates).unwrap().name, "first");
    }

    #[test]
    fn selection_empty_candidates_is_none() {
        let prefs = ModelPreferences::default();
        assert!(prefs.select(&[]).is_none());
    }
}

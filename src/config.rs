use std::collections::HashMap;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::ConfigError;

/// [LimitConfiguration] is the maximum number of requests admitted
/// within a sliding [window](LimitConfiguration::window).
///
/// A `request_limit` of `0` disables the limit: such requests are always
/// admitted and the store is never consulted.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct LimitConfiguration {
    #[serde(rename = "limit")]
    pub request_limit: u32,
    /// Serialized as milliseconds.
    #[serde(rename = "duration", with = "window_millis")]
    pub window: Duration,
}

impl LimitConfiguration {
    pub fn new(request_limit: u32, window: Duration) -> Self {
        Self { request_limit, window }
    }

    /// A configuration that never limits.
    pub fn unlimited() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn is_unlimited(&self) -> bool {
        self.request_limit == 0
    }
}

/// [CategoryConfiguration] is the base limit of a category,
/// plus optional per-route overrides keyed by the exact request path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfiguration {
    #[serde(flatten)]
    pub base: LimitConfiguration,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub routes: HashMap<String, LimitConfiguration>,
}

impl CategoryConfiguration {
    pub fn new(base: LimitConfiguration) -> Self {
        Self {
            base,
            routes: HashMap::new(),
        }
    }

    pub fn with_route<P: ToString>(mut self, path: P, configuration: LimitConfiguration) -> Self {
        self.routes.insert(path.to_string(), configuration);
        self
    }

    /// The override registered for `route`, or the base configuration.
    pub fn resolve(&self, route: &str) -> &LimitConfiguration {
        self.resolve_scoped(route).0
    }

    /// Like [Self::resolve], also returning the route when an override applied.
    pub fn resolve_scoped<'a, 'r>(&'a self, route: &'r str) -> (&'a LimitConfiguration, Option<&'r str>) {
        match self.routes.get(route) {
            Some(configuration) => (configuration, Some(route)),
            None => (&self.base, None),
        }
    }
}

impl From<LimitConfiguration> for CategoryConfiguration {
    fn from(base: LimitConfiguration) -> Self {
        Self::new(base)
    }
}

/// [ConfigurationSet] maps category identifiers to their configuration.
///
/// It is built once and only read afterwards, so it is shared between
/// concurrent checks without locking.
///
/// In JSON form it is an object keyed by category:
/// ```json
/// { "1": { "limit": 10, "duration": 1000, "routes": { "/upload": { "limit": 2, "duration": 1000 } } } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigurationSet {
    categories: HashMap<u32, CategoryConfiguration>,
}

impl ConfigurationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category<C: Into<CategoryConfiguration>>(mut self, category: u32, configuration: C) -> Self {
        self.categories.insert(category, configuration.into());
        self
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let set: Self = serde_json::from_str(json)?;
        set.validate()?;
        Ok(set)
    }

    /// Resolve the configuration applying to `category` on `route`.
    /// An exact route override wins over the category's base configuration.
    pub fn resolve(&self, category: u32, route: &str) -> Result<&LimitConfiguration, ConfigError> {
        self.resolve_scoped(category, route).map(|(configuration, _)| configuration)
    }

    /// Like [Self::resolve], also returning the route when an override applied.
    /// Overridden routes are counted in their own window.
    pub fn resolve_scoped<'a, 'r>(&'a self, category: u32, route: &'r str) -> Result<(&'a LimitConfiguration, Option<&'r str>), ConfigError> {
        self.categories
            .get(&category)
            .map(|c| c.resolve_scoped(route))
            .ok_or(ConfigError::UnknownCategory(category))
    }

    /// Reject limited configurations whose window is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (&category, c) in &self.categories {
            for limit in std::iter::once(&c.base).chain(c.routes.values()) {
                if !limit.is_unlimited() && limit.window.is_zero() {
                    return Err(ConfigError::ZeroWindow { category, limit: limit.request_limit });
                }
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl FromIterator<(u32, CategoryConfiguration)> for ConfigurationSet {
    fn from_iter<I: IntoIterator<Item = (u32, CategoryConfiguration)>>(iter: I) -> Self {
        Self {
            categories: iter.into_iter().collect(),
        }
    }
}

mod window_millis {
    use std::time::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(window: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(window.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

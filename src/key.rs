pub const DEFAULT_KEY_PREFIX: &str = "hrl";

/// Separates the parts of a key. Not allowed in prefixes and limiter names.
pub const KEY_SEPARATOR: char = ':';

/// [KeyTemplate] derives store keys of the form
/// `{prefix}:{limiter name}:{identity length}:{identity}`,
/// followed by `:c{category}` and, for routes having their own limit, `:{route}`.
///
/// The limiter name keeps two limiters sharing a store apart,
/// the prefix keeps the limiter's keys apart from anything else in the store.
/// The identity is length-prefixed, so whatever it contains it can not
/// run into the parts around it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct KeyTemplate {
    prefix: String,
}

impl KeyTemplate {
    pub fn new<T: ToString>(prefix: T) -> Self {
        Self { prefix: prefix.to_string() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `identity` must not be empty: unidentifiable requests are
    /// rejected before a key is ever built.
    pub fn build_key(&self, identity: &str, limiter_name: &str) -> String {
        debug_assert!(!identity.is_empty(), "rate limit identity must not be empty");
        format!("{}:{}:{}:{}", self.prefix, limiter_name, identity.len(), identity)
    }

    /// Key of the window counting `identity` in `category`,
    /// restricted to `route` when the route has its own limit.
    pub fn build_scoped_key(&self, identity: &str, limiter_name: &str, category: u32, route: Option<&str>) -> String {
        let key = format!("{}:c{}", self.build_key(identity, limiter_name), category);
        match route {
            Some(route) => format!("{}:{}", key, route),
            None => key,
        }
    }
}

impl Default for KeyTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}

//! Token registry for streamable remote files
//!
//! Maps opaque capability tokens to the remote file they unlock. Possession
//! of a token, embedded in the issued URL, is the only authorization needed to
//! stream the file. Lookups and inserts may race freely from any task.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use uuid::Uuid;

use crate::remote::RemoteAccess;

/// Path prefix under which every token is served.
pub const STREAM_PATH_PREFIX: &str = "/stream/";

/// Opaque, URL-safe capability string backed by 122 bits of UUID v4 randomness.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    /// Generates a fresh random token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Extracts the token text following `/stream/` in an issued URL.
    ///
    /// Returns `None` when the prefix is missing or nothing follows it.
    pub fn from_url(url: &str) -> Option<&str> {
        let (_, token) = url.split_once(STREAM_PATH_PREFIX)?;
        (!token.is_empty()).then_some(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for Token {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable record of one registered remote file.
#[derive(Clone)]
pub struct Descriptor {
    /// Shared authenticated handle; never closed by the proxy
    pub remote: Arc<dyn RemoteAccess>,
    /// Path of the file on the share
    pub path: String,
    /// Human-readable name shown by collaborators
    pub display_name: Option<String>,
    /// When the registration was made
    pub registered_at: Instant,
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("path", &self.path)
            .field("display_name", &self.display_name)
            .field("registered_at", &self.registered_at)
            .finish_non_exhaustive()
    }
}

impl Descriptor {
    fn is_expired(&self, ttl: Option<Duration>, now: Instant) -> bool {
        ttl.is_some_and(|ttl| now.duration_since(self.registered_at) >= ttl)
    }
}

/// Concurrent token → descriptor map.
///
/// With a TTL configured, expired descriptors are treated as unknown tokens
/// and dropped on the next registration.
pub struct Registry {
    entries: RwLock<HashMap<Token, Arc<Descriptor>>>,
    ttl: Option<Duration>,
}

impl Registry {
    /// Creates an empty registry with an optional registration lifetime.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Stores a descriptor under a freshly generated token.
    pub fn insert(
        &self,
        remote: Arc<dyn RemoteAccess>,
        path: impl Into<String>,
        display_name: Option<String>,
    ) -> Token {
        let descriptor = Arc::new(Descriptor {
            remote,
            path: path.into(),
            display_name,
            registered_at: Instant::now(),
        });

        self.prune_expired();

        let mut entries = self.entries.write();
        loop {
            let token = Token::generate();
            if !entries.contains_key(&token) {
                entries.insert(token.clone(), descriptor);
                return token;
            }
        }
    }

    /// Resolves a token to its descriptor if it is registered and unexpired.
    pub fn lookup(&self, token: &str) -> Option<Arc<Descriptor>> {
        let descriptor = self.entries.read().get(token).cloned()?;
        if descriptor.is_expired(self.ttl, Instant::now()) {
            return None;
        }
        Some(descriptor)
    }

    /// Display name stored for a token, if any.
    pub fn display_name(&self, token: &str) -> Option<String> {
        self.lookup(token)?.display_name.clone()
    }

    /// Removes a registration, returning whether the token was known.
    pub fn revoke(&self, token: &str) -> bool {
        self.entries.write().remove(token).is_some()
    }

    /// Drops every expired registration and returns how many were removed.
    pub fn prune_expired(&self) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, descriptor| !descriptor.is_expired(Some(ttl), now));
        before - entries.len()
    }

    /// Number of stored registrations, including expired ones not yet pruned.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::remote::MemoryShare;

    fn share() -> Arc<dyn RemoteAccess> {
        Arc::new(MemoryShare::new())
    }

    #[test]
    fn test_token_is_url_safe() {
        let token = Token::generate();
        assert_eq!(token.as_str().len(), 36);
        assert!(
            token
                .as_str()
                .chars()
                .all(|c| c.is_ascii_hexdigit() || c == '-')
        );
    }

    #[test]
    fn test_token_from_url() {
        assert_eq!(
            Token::from_url("http://127.0.0.1:4000/stream/abc-123"),
            Some("abc-123")
        );
        assert_eq!(Token::from_url("http://127.0.0.1:4000/stream/"), None);
        assert_eq!(Token::from_url("http://127.0.0.1:4000/other/abc"), None);
        assert_eq!(Token::from_url(""), None);
    }

    #[test]
    fn test_insert_and_lookup() {
        let registry = Registry::new(None);
        let token = registry.insert(share(), "movies/a.mkv", Some("A".to_string()));

        let descriptor = registry.lookup(token.as_str()).unwrap();
        assert_eq!(descriptor.path, "movies/a.mkv");
        assert_eq!(registry.display_name(token.as_str()), Some("A".to_string()));
        assert!(registry.lookup("unknown").is_none());
        assert_eq!(registry.display_name("unknown"), None);
    }

    #[test]
    fn test_tokens_are_unique() {
        let registry = Registry::new(None);
        let tokens: HashSet<Token> = (0..1000)
            .map(|_| registry.insert(share(), "same/path.mkv", None))
            .collect();

        assert_eq!(tokens.len(), 1000);
        assert_eq!(registry.len(), 1000);
    }

    #[test]
    fn test_revoke() {
        let registry = Registry::new(None);
        let token = registry.insert(share(), "a.mkv", None);

        assert!(registry.revoke(token.as_str()));
        assert!(registry.lookup(token.as_str()).is_none());
        assert!(!registry.revoke(token.as_str()));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_expired_registrations_are_unknown() {
        let registry = Registry::new(Some(Duration::ZERO));
        let token = registry.insert(share(), "a.mkv", Some("A".to_string()));

        assert!(registry.lookup(token.as_str()).is_none());
        assert_eq!(registry.display_name(token.as_str()), None);
        assert_eq!(registry.prune_expired(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_no_ttl_never_prunes() {
        let registry = Registry::new(None);
        registry.insert(share(), "a.mkv", None);

        assert_eq!(registry.prune_expired(), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_concurrent_inserts() {
        let registry = Arc::new(Registry::new(None));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    (0..100)
                        .map(|_| registry.insert(share(), "x.mkv", None))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let tokens: HashSet<Token> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        assert_eq!(tokens.len(), 800);
        assert!(tokens.iter().all(|t| registry.lookup(t.as_str()).is_some()));
    }
}

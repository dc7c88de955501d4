use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a remote resource (typically an image URL).
///
/// Keys compare by value. Cloning is cheap, so keys can be handed to every
/// consumer, timer and listener that needs one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(Arc<str>);

impl ResourceKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(Arc::from(key.into()))
    }

    /// Interprets an optional locator the way consumers receive it.
    ///
    /// Missing and empty locators both mean "no key".
    pub fn from_locator(locator: Option<&str>) -> Option<Self> {
        match locator {
            Some(s) if !s.is_empty() => Some(Self::new(s)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ResourceKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for ResourceKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::ResourceKey;

    #[test]
    fn keys_compare_by_value() {
        let a = ResourceKey::new("https://cdn.example/a.png");
        let b = ResourceKey::from("https://cdn.example/a.png".to_string());
        assert_eq!(a, b);
        assert_ne!(a, ResourceKey::from("https://cdn.example/b.png"));
    }

    #[test]
    fn empty_locator_is_no_key() {
        assert_eq!(ResourceKey::from_locator(None), None);
        assert_eq!(ResourceKey::from_locator(Some("")), None);
        assert_eq!(
            ResourceKey::from_locator(Some("a.png")),
            Some(ResourceKey::new("a.png"))
        );
    }

    #[test]
    fn serializes_as_plain_string() {
        let key = ResourceKey::new("a.png");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"a.png\"");
        let back: ResourceKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}

use std::borrow::Borrow;
use std::sync::Arc;

/// Options represents the options for a singleflight group
#[derive(Clone, Debug)]
pub struct Options {
    /// Name labels every tracing span the group emits. default is "singleflight"
    pub name: String,
    /// Capacity is the number of keys the in-flight registry is pre-sized for. default is 0
    /// set it to the expected number of distinct keys in flight at once to avoid rehashing.
    pub capacity: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            name: String::from("singleflight"),
            capacity: 0,
        }
    }
}

/// Registry key. Borrows as `str` so lookups never allocate.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct Key(Arc<str>);

impl From<&str> for Key {
    fn from(key: &str) -> Self {
        Key(Arc::from(key))
    }
}

impl Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::{Key, Options};
    use std::collections::HashMap;

    #[test]
    fn test_default_options() {
        let options = Options::default();
        assert_eq!(options.name, "singleflight");
        assert_eq!(options.capacity, 0);
    }

    #[test]
    fn test_key_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(Key::from("user:42"), 1);
        assert_eq!(map.get("user:42"), Some(&1));
        assert!(map.get("user:43").is_none());
    }
}

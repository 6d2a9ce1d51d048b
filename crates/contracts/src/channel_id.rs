//! ChannelId - output channel identifier
//!
//! An id is fixed when the output is configured, then cloned into every
//! trigger request, report and metric label. Cloning shares one `Arc<str>`.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Identifier of one output channel.
///
/// Compares, orders and hashes like the string it wraps, so maps keyed by
/// `ChannelId` can be queried with a `&str`.
///
/// # Examples
/// ```
/// use contracts::ChannelId;
///
/// let id = ChannelId::emitter(0);
/// assert_eq!(id, "emitter_0");
/// assert_eq!(id.clone(), id);
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ChannelId(Arc<str>);

impl ChannelId {
    /// Id given to the `index`-th output when outputs come from bare line numbers
    pub fn emitter(index: usize) -> Self {
        Self::from(format!("emitter_{index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for ChannelId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ChannelId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for ChannelId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<ChannelId> for String {
    fn from(id: ChannelId) -> Self {
        id.0.as_ref().to_owned()
    }
}

impl PartialEq<str> for ChannelId {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for ChannelId {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashSet};

    #[test]
    fn test_clone_shares_storage() {
        let a = ChannelId::emitter(3);
        let b = a.clone();
        assert_eq!(a.as_str().as_ptr(), b.as_str().as_ptr());
        assert_eq!(b, "emitter_3");
    }

    #[test]
    fn test_set_queried_by_str() {
        let ids: HashSet<ChannelId> = (0..3).map(ChannelId::emitter).collect();
        assert!(ids.contains("emitter_2"));
        assert!(!ids.contains("emitter_3"));
    }

    #[test]
    fn test_orders_like_str() {
        let mut last: BTreeMap<ChannelId, u64> = BTreeMap::new();
        last.insert("b".into(), 2);
        last.insert("a".into(), 1);
        let keys: Vec<&str> = last.keys().map(ChannelId::as_str).collect();
        assert_eq!(keys, ["a", "b"]);
        assert_eq!(last.get("a"), Some(&1));
    }

    #[test]
    fn test_serde_as_plain_string() {
        let id: ChannelId = "out".into();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"out\"");
        let parsed: ChannelId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, "out");
        assert_eq!(format!("{parsed:?}"), "\"out\"");
    }
}

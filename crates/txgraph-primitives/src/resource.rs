//! Resource identifiers for conflict tracking

use crate::hash::{keccak256, H256};
use std::fmt;

/// Identifier of a contended piece of state (account, storage slot, ...)
///
/// Two transactions conflict when their conflict sets share a
/// `ResourceId`. Only equality and hashing are meaningful; the `Ord`
/// impl exists so that resource lists can be printed deterministically.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ResourceId(H256);

impl ResourceId {
    /// Wrap raw key bytes
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(H256::from_bytes(bytes))
    }

    /// Resource named by a free-form label
    pub fn named(label: &str) -> Self {
        Self(keccak256(label.as_bytes()))
    }

    /// Resource derived from a domain tag and a key inside that domain
    ///
    /// The domain and key are separated by a zero byte, so
    /// `derive("ab", b"c")` and `derive("a", b"bc")` never collide.
    pub fn derive(domain: &str, key: &[u8]) -> Self {
        let mut buf = Vec::with_capacity(domain.len() + 1 + key.len());
        buf.extend_from_slice(domain.as_bytes());
        buf.push(0);
        buf.extend_from_slice(key);
        Self(keccak256(&buf))
    }

    /// Account-level resource (balance and nonce of `address`)
    pub fn account(address: &[u8; 20]) -> Self {
        Self::derive("account", address)
    }

    /// Contract storage slot
    pub fn storage(address: &[u8; 20], slot: &H256) -> Self {
        let mut key = [0u8; 52];
        key[..20].copy_from_slice(address);
        key[20..].copy_from_slice(slot.as_bytes());
        Self::derive("storage", &key)
    }

    /// Underlying key
    pub fn as_hash(&self) -> &H256 {
        &self.0
    }
}

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId({})", self.0.short())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<H256> for ResourceId {
    fn from(hash: H256) -> Self {
        Self(hash)
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use super::*;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    impl Serialize for ResourceId {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            self.0.serialize(serializer)
        }
    }

    impl<'de> Deserialize<'de> for ResourceId {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            H256::deserialize(deserializer).map(Self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    #[test]
    fn test_named_is_stable() {
        assert_eq!(ResourceId::named("alice"), ResourceId::named("alice"));
        assert_ne!(ResourceId::named("alice"), ResourceId::named("bob"));
    }

    #[test]
    fn test_derive_separates_domain_and_key() {
        assert_ne!(
            ResourceId::derive("ab", b"c"),
            ResourceId::derive("a", b"bc")
        );
    }

    #[test]
    fn test_account_and_storage_distinct() {
        let addr = [0x42; 20];
        let account = ResourceId::account(&addr);
        let slot0 = ResourceId::storage(&addr, &H256::ZERO);
        let slot1 = ResourceId::storage(&addr, &H256::from_low_u64(1));

        assert_ne!(account, slot0);
        assert_ne!(slot0, slot1);
        assert_eq!(slot1, ResourceId::storage(&addr, &H256::from_low_u64(1)));
    }

    #[test]
    fn test_resource_as_hashmap_key() {
        let a = ResourceId::named("a");
        let b = ResourceId::named("b");

        let mut map: HashMap<ResourceId, u32> = HashMap::new();
        map.insert(a, 1);
        map.insert(b, 2);
        map.insert(a, 3);

        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&a), Some(&3));

        let set: HashSet<ResourceId> = [a, a, b].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_from_hash_roundtrip() {
        let hash = H256::from_low_u64(9);
        let id = ResourceId::from(hash);
        assert_eq!(id.as_hash(), &hash);
        assert_eq!(id.to_string(), hash.to_hex());
    }
}

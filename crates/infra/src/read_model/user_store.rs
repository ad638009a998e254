use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use snippetquiz_core::UserId;

/// User-scoped key/value store for disposable read models.
///
/// Every record belongs to exactly one user; lookups never cross users.
pub trait UserStore<K, V>: Send + Sync {
    fn get(&self, user_id: UserId, key: &K) -> Option<V>;
    fn upsert(&self, user_id: UserId, key: K, value: V);
    /// Returns the removed value, if any.
    fn remove(&self, user_id: UserId, key: &K) -> Option<V>;
    fn list(&self, user_id: UserId) -> Vec<V>;
}

impl<K, V, S> UserStore<K, V> for Arc<S>
where
    S: UserStore<K, V> + ?Sized,
{
    fn get(&self, user_id: UserId, key: &K) -> Option<V> {
        (**self).get(user_id, key)
    }

    fn upsert(&self, user_id: UserId, key: K, value: V) {
        (**self).upsert(user_id, key, value)
    }

    fn remove(&self, user_id: UserId, key: &K) -> Option<V> {
        (**self).remove(user_id, key)
    }

    fn list(&self, user_id: UserId) -> Vec<V> {
        (**self).list(user_id)
    }
}

/// In-memory user-scoped store for tests/dev.
#[derive(Debug)]
pub struct InMemoryUserStore<K, V> {
    inner: RwLock<HashMap<(UserId, K), V>>,
}

impl<K, V> InMemoryUserStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryUserStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> UserStore<K, V> for InMemoryUserStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, user_id: UserId, key: &K) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(&(user_id, key.clone())).cloned()
    }

    fn upsert(&self, user_id: UserId, key: K, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.insert((user_id, key), value);
        }
    }

    fn remove(&self, user_id: UserId, key: &K) -> Option<V> {
        let mut map = self.inner.write().ok()?;
        map.remove(&(user_id, key.clone()))
    }

    fn list(&self, user_id: UserId) -> Vec<V> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        map.iter()
            .filter_map(|((u, _k), v)| if *u == user_id { Some(v.clone()) } else { None })
            .collect()
    }
}

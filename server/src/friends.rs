use shared::normalize_account;
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

/// Friendship check consulted before a directed challenge.
pub trait FriendGraph: Send + Sync {
    fn are_friends(&self, a: &str, b: &str) -> bool;
}

/// Undirected friendship graph keyed by normalised account name.
#[derive(Debug, Default)]
pub struct MemoryFriends {
    edges: RwLock<HashMap<String, HashSet<String>>>,
}

impl MemoryFriends {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        let graph = Self::new();
        for (a, b) in pairs {
            graph.add(a.as_ref(), b.as_ref());
        }
        graph
    }

    pub fn add(&self, a: &str, b: &str) {
        let (a, b) = (normalize_account(a), normalize_account(b));
        if a.is_empty() || b.is_empty() || a == b {
            return;
        }
        let mut edges = self.edges.write().unwrap_or_else(PoisonError::into_inner);
        edges.entry(a.clone()).or_default().insert(b.clone());
        edges.entry(b).or_default().insert(a);
    }
}

impl FriendGraph for MemoryFriends {
    fn are_friends(&self, a: &str, b: &str) -> bool {
        let edges = self.edges.read().unwrap_or_else(PoisonError::into_inner);
        edges
            .get(&normalize_account(a))
            .map_or(false, |set| set.contains(&normalize_account(b)))
    }
}

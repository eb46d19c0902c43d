//! Hyperlink interning (OSC 8)
//!
//! Cells store only a small integer id; this pool owns the `(id, uri)`
//! pairs. Entries are reference counted: the cursor holds one reference
//! while a link is open, each written cell holds one, and references drop as
//! cells are overwritten, erased or evicted from scrollback. An entry with
//! zero references is freed and its slot recycled.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Entry {
    uri: String,
    /// The `id=` parameter from OSC 8, used for cross-line link identity.
    id_param: String,
    refs: usize,
}

/// Interning pool for hyperlinks.
#[derive(Debug, Clone, Default)]
pub struct HyperlinkPool {
    entries: Vec<Option<Entry>>,
    index: HashMap<(String, String), u32>,
    free: Vec<u32>,
}

impl HyperlinkPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a link and take one reference on it.
    pub fn open(&mut self, id_param: &str, uri: &str) -> u32 {
        let key = (id_param.to_string(), uri.to_string());
        if let Some(&id) = self.index.get(&key) {
            self.retain(id);
            return id;
        }
        let entry = Entry {
            uri: uri.to_string(),
            id_param: id_param.to_string(),
            refs: 1,
        };
        let id = match self.free.pop() {
            Some(slot) => {
                self.entries[slot as usize - 1] = Some(entry);
                slot
            }
            None => {
                self.entries.push(Some(entry));
                self.entries.len() as u32
            }
        };
        self.index.insert(key, id);
        id
    }

    pub fn retain(&mut self, id: u32) {
        if let Some(Some(entry)) = self.entries.get_mut(id as usize - 1) {
            entry.refs += 1;
        }
    }

    pub fn release(&mut self, id: u32) {
        if id == 0 {
            return;
        }
        let Some(slot) = self.entries.get_mut(id as usize - 1) else {
            return;
        };
        let Some(entry) = slot else { return };
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs == 0 {
            let key = (entry.id_param.clone(), entry.uri.clone());
            self.index.remove(&key);
            *slot = None;
            self.free.push(id);
        }
    }

    pub fn uri(&self, id: u32) -> Option<&str> {
        if id == 0 {
            return None;
        }
        self.entries
            .get(id as usize - 1)
            .and_then(|slot| slot.as_ref())
            .map(|entry| entry.uri.as_str())
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_and_lookup() {
        let mut pool = HyperlinkPool::new();
        let id = pool.open("", "https://example.com");
        assert_eq!(pool.uri(id), Some("https://example.com"));
        assert_eq!(pool.uri(0), None);
    }

    #[test]
    fn test_interning_same_link() {
        let mut pool = HyperlinkPool::new();
        let a = pool.open("x", "https://example.com");
        let b = pool.open("x", "https://example.com");
        assert_eq!(a, b);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_distinct_id_params() {
        let mut pool = HyperlinkPool::new();
        let a = pool.open("1", "https://example.com");
        let b = pool.open("2", "https://example.com");
        assert_ne!(a, b);
    }

    #[test]
    fn test_release_frees_at_zero() {
        let mut pool = HyperlinkPool::new();
        let id = pool.open("", "https://a");
        pool.retain(id);
        pool.release(id);
        assert_eq!(pool.uri(id), Some("https://a"));
        pool.release(id);
        assert_eq!(pool.uri(id), None);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_slot_recycling() {
        let mut pool = HyperlinkPool::new();
        let a = pool.open("", "https://a");
        pool.release(a);
        let b = pool.open("", "https://b");
        assert_eq!(a, b);
        assert_eq!(pool.uri(b), Some("https://b"));
    }
}

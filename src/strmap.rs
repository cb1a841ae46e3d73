//! Fixed-bucket name index used for variable and command lookup.
//!
//! 256 buckets keyed by a DJB2 hash; each bucket is a vector of
//! `(owned key, slot)` pairs where the slot indexes the owner's backing
//! vector.  Insertion with an existing key replaces the slot in place (the
//! key storage is retained); there is no key removal — deletion overwrites
//! the slot with `None` and lookups treat such entries as absent.

const CELLS: usize = 256;
const CELL_MASK: u64 = 0xFF;

fn hash(key: &str) -> u64 {
    let mut h: u64 = 5381;
    for &b in key.as_bytes() {
        h = (h << 5).wrapping_add(h).wrapping_add(b as u64);
    }
    h
}

struct Entry {
    key: String,
    slot: Option<usize>,
}

pub(crate) struct StrMap {
    cells: Vec<Vec<Entry>>,
}

impl StrMap {
    pub fn new() -> Self {
        StrMap {
            cells: (0..CELLS).map(|_| Vec::new()).collect(),
        }
    }

    pub fn put(&mut self, key: &str, slot: Option<usize>) {
        let cell = &mut self.cells[(hash(key) & CELL_MASK) as usize];
        for entry in cell.iter_mut() {
            if entry.key == key {
                entry.slot = slot;
                return;
            }
        }
        cell.push(Entry {
            key: key.to_owned(),
            slot,
        });
    }

    pub fn get(&self, key: &str) -> Option<usize> {
        let cell = &self.cells[(hash(key) & CELL_MASK) as usize];
        cell.iter().find(|e| e.key == key).and_then(|e| e.slot)
    }

    /// Raw key presence, including entries whose slot was cleared.
    pub fn has(&self, key: &str) -> bool {
        let cell = &self.cells[(hash(key) & CELL_MASK) as usize];
        cell.iter().any(|e| e.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get() {
        let mut m = StrMap::new();
        m.put("foo", Some(3));
        m.put("bar", Some(7));
        assert_eq!(m.get("foo"), Some(3));
        assert_eq!(m.get("bar"), Some(7));
        assert_eq!(m.get("baz"), None);
    }

    #[test]
    fn overwrite_in_place() {
        let mut m = StrMap::new();
        m.put("foo", Some(1));
        m.put("foo", Some(2));
        assert_eq!(m.get("foo"), Some(2));
    }

    #[test]
    fn cleared_slot_is_absent_but_key_remains() {
        let mut m = StrMap::new();
        m.put("foo", Some(1));
        m.put("foo", None);
        assert_eq!(m.get("foo"), None);
        assert!(m.has("foo"));
        assert!(!m.has("bar"));
    }
}

//! Symbol Table
//!
//! Interns variable and target names into small integers ("symbols") so the
//! rest of the core can compare and hash identifiers without touching their
//! backing bytes. One-byte strings are reserved identifiers 0-255 (id 0 is
//! the empty string) and never touch the hash map.
//!
//! The table is thread-confined: it is built and mutated by a single
//! evaluation thread, and only published to external readers (if any)
//! behind a lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// An opaque handle identifying an interned byte string.
///
/// Symbols compare by identity: `intern(a) == intern(b)` iff `a == b` as
/// byte strings. Reserved ids 0-255 are assigned without a hash-table probe
/// for zero- and one-byte inputs (id 0 is the empty string, id `b` for a
/// single byte `b`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
    pub const EMPTY: Symbol = Symbol(0);

    /// Construct the reserved symbol for a single non-NUL byte: id equals the
    /// byte value, so `intern("x").id == byte_value("x")` holds for every
    /// printable single-byte name (spec.md §8 property 1). Byte 0 collides
    /// with the empty string's reserved id 0 and is therefore not reserved;
    /// the lone single-NUL-byte string falls back to the general hash map,
    /// which make identifiers never hit in practice.
    fn reserved_for_byte(b: u8) -> Symbol {
        Symbol(b as u32)
    }

    pub fn id(self) -> u32 {
        self.0
    }
}

const RESERVED_COUNT: u32 = 256; // empty string (id 0) + single bytes 1-255

struct Interner {
    // Maps hashed strings (length >= 2) to symbols. The key owns the bytes;
    // `name_of` looks them back up by id via `by_id`.
    by_bytes: HashMap<Box<[u8]>, Symbol>,
    by_id: Vec<Box<[u8]>>,
}

impl Interner {
    fn new() -> Self {
        Self {
            by_bytes: HashMap::new(),
            by_id: Vec::new(),
        }
    }
}

/// The process-wide string interner, exposed as a single handle so tests can
/// supply a fresh instance per run instead of reaching through free
/// functions.
#[derive(Clone)]
pub struct SymbolTable {
    inner: Arc<Mutex<Interner>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Interner::new())),
        }
    }

    /// Intern a byte string, returning its Symbol. Repeated calls with equal
    /// bytes return the same Symbol (intern(intern(s)) == intern(s) holds
    /// trivially since interning is idempotent on the input bytes).
    pub fn intern(&self, bytes: &[u8]) -> Symbol {
        match bytes.len() {
            0 => Symbol::EMPTY,
            1 if bytes[0] != 0 => Symbol::reserved_for_byte(bytes[0]),
            _ => {
                let mut inner = self.inner.lock().unwrap();
                if let Some(sym) = inner.by_bytes.get(bytes) {
                    return *sym;
                }
                let id = RESERVED_COUNT + inner.by_id.len() as u32;
                let sym = Symbol(id);
                let boxed: Box<[u8]> = bytes.into();
                inner.by_id.push(boxed.clone());
                inner.by_bytes.insert(boxed, sym);
                sym
            }
        }
    }

    pub fn intern_str(&self, s: &str) -> Symbol {
        self.intern(s.as_bytes())
    }

    /// Return the bytes backing a symbol. Panics if the symbol was not
    /// produced by this table (reserved symbols are always valid).
    pub fn name_of(&self, sym: Symbol) -> Vec<u8> {
        if sym.0 == 0 {
            return Vec::new();
        }
        if sym.0 < RESERVED_COUNT {
            return vec![sym.0 as u8];
        }
        let inner = self.inner.lock().unwrap();
        let idx = (sym.0 - RESERVED_COUNT) as usize;
        inner
            .by_id
            .get(idx)
            .map(|b| b.to_vec())
            .unwrap_or_default()
    }

    pub fn name_str(&self, sym: Symbol) -> String {
        String::from_utf8_lossy(&self.name_of(sym)).into_owned()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_symbol_zero() {
        let t = SymbolTable::new();
        assert_eq!(t.intern(b"").id(), 0);
    }

    #[test]
    fn single_bytes_are_reserved_without_hashing() {
        let t = SymbolTable::new();
        assert_eq!(t.intern(b"x").id(), b'x' as u32);
        assert_eq!(t.intern(b"A").id(), b'A' as u32);
    }

    #[test]
    fn nul_byte_string_does_not_collide_with_empty_string() {
        let t = SymbolTable::new();
        let empty = t.intern(b"");
        let nul = t.intern(b"\0");
        assert_ne!(empty, nul);
    }

    #[test]
    fn intern_identity() {
        let t = SymbolTable::new();
        let a = t.intern(b"FOO");
        let b = t.intern(b"FOO");
        assert_eq!(a, b);
        let c = t.intern(b"BAR");
        assert_ne!(a, c);
    }

    #[test]
    fn intern_is_idempotent_on_reintern() {
        let t = SymbolTable::new();
        let a = t.intern(b"CFLAGS");
        let a2 = t.intern(t.name_of(a).as_slice());
        assert_eq!(a, a2);
    }

    #[test]
    fn name_of_round_trips() {
        let t = SymbolTable::new();
        let sym = t.intern_str("LDFLAGS");
        assert_eq!(t.name_str(sym), "LDFLAGS");
    }

    #[test]
    fn distinct_long_strings_get_distinct_symbols() {
        let t = SymbolTable::new();
        let names: Vec<Symbol> = (0..50)
            .map(|i| t.intern_str(&format!("VAR_{i}")))
            .collect();
        for i in 0..names.len() {
            for j in (i + 1)..names.len() {
                assert_ne!(names[i], names[j]);
            }
        }
    }
}

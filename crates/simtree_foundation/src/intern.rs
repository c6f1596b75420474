//! String interning with address identity.
//!
//! Names, groups, tags and notification categories are interned so that two
//! handles compare equal exactly when they point at the same storage. Interned
//! storage is leaked and lives for the rest of the process.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

/// Interned string handle.
///
/// Equality and hashing use the address of the interned storage, never the
/// bytes. Two handles produced by the same [`StringTable`] are equal iff the
/// strings were byte-equal.
#[derive(Copy, Clone)]
pub struct Istr(&'static str);

impl Istr {
    /// Returns the interned text.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0
    }

    /// Returns the address of the interned storage.
    #[must_use]
    pub fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }

    /// Returns true if this is the interned empty string.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0.is_empty()
    }

    /// Returns the process-wide interned empty string.
    #[must_use]
    pub fn empty() -> Self {
        intern("")
    }
}

impl PartialEq for Istr {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.0.as_ptr(), other.0.as_ptr()) && self.0.len() == other.0.len()
    }
}

impl Eq for Istr {}

impl Hash for Istr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
        self.0.len().hash(state);
    }
}

impl PartialOrd for Istr {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Interned strings order by their text so sorted containers stay readable.
impl Ord for Istr {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(other.0).then_with(|| self.addr().cmp(&other.addr()))
    }
}

impl fmt::Debug for Istr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Istr({:?})", self.0)
    }
}

impl fmt::Display for Istr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl AsRef<str> for Istr {
    fn as_ref(&self) -> &str {
        self.0
    }
}

/// Table mapping strings to stable interned storage.
///
/// It is not thread-safe on its own; the process-wide table behind
/// [`intern`] is wrapped in a mutex.
#[derive(Debug)]
pub struct StringTable {
    strings: HashSet<&'static str>,
}

/// Builtin group name reserved for framework-owned nodes.
pub const BUILTIN_GROUP: &str = "_builtin_";

impl StringTable {
    /// Strings pre-interned from static storage at startup.
    pub const RESERVED: &'static [&'static str] =
        &["", "warning", "debug", "parameters", BUILTIN_GROUP];

    /// Creates a new table with the reserved strings pre-interned.
    #[must_use]
    pub fn new() -> Self {
        let mut strings = HashSet::with_capacity(64);
        for &s in Self::RESERVED {
            strings.insert(s);
        }
        Self { strings }
    }

    /// Interns a string, returning its stable handle.
    ///
    /// Lookup and insertion are linear in the length of `s`.
    pub fn intern(&mut self, s: &str) -> Istr {
        if let Some(&existing) = self.strings.get(s) {
            return Istr(existing);
        }
        let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
        self.strings.insert(leaked);
        Istr(leaked)
    }

    /// Looks up a string without interning it.
    #[must_use]
    pub fn get(&self, s: &str) -> Option<Istr> {
        self.strings.get(s).map(|&existing| Istr(existing))
    }

    /// Returns the number of interned strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Returns true if nothing has been interned (never true after `new`).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new()
    }
}

static TABLE: Lazy<Mutex<StringTable>> = Lazy::new(|| Mutex::new(StringTable::new()));

/// Interns `s` in the process-wide table.
pub fn intern(s: &str) -> Istr {
    TABLE.lock().intern(s)
}

/// Looks up `s` in the process-wide table without interning it.
#[must_use]
pub fn lookup(s: &str) -> Option<Istr> {
    TABLE.lock().get(s)
}

/// Returns the number of strings in the process-wide table.
#[must_use]
pub fn interned_count() -> usize {
    TABLE.lock().len()
}

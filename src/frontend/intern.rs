use std::sync::RwLock;

use hashbrown::HashMap;
use once_cell::sync::Lazy;

/// Append-only table of every identifier seen by the compiler. Strings are
/// leaked so that interned symbols can hand out `&'static str`.
#[derive(Debug, Default)]
pub struct InterningTable {
    inner: RwLock<TableInner>,
}

#[derive(Debug, Default)]
struct TableInner {
    strings: Vec<&'static str>,
    indices: HashMap<&'static str, u32>,
}

pub static INTERNING_TABLE: Lazy<InterningTable> = Lazy::new(Default::default);

impl InterningTable {
    pub fn get(&self, index: u32) -> Option<&'static str> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());

        inner.strings.get(index as usize).copied()
    }

    pub fn insert_if_absent(&self, string: &str) -> u32 {
        if let Some(index) = self.index_of(string) {
            return index;
        }

        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());

        // another caller may have won the race between the read and the write
        if let Some(index) = inner.indices.get(string) {
            return *index;
        }

        let leaked: &'static str = Box::leak(string.to_owned().into_boxed_str());
        let index = inner.strings.len() as u32;

        inner.strings.push(leaked);
        inner.indices.insert(leaked, index);

        index
    }

    pub fn index_of(&self, string: &str) -> Option<u32> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());

        inner.indices.get(string).copied()
    }
}

/// An index into the string interning table
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InternedSymbol(u32);

impl InternedSymbol {
    pub fn new(value: &str) -> Self {
        Self(INTERNING_TABLE.insert_if_absent(value))
    }

    pub fn value(&self) -> &'static str {
        // symbols are only ever created through `new`, and the table never
        // shrinks
        INTERNING_TABLE.get(self.0).unwrap_or("<invalid symbol>")
    }
}

impl core::fmt::Debug for InternedSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("InternedSymbol")
            .field(&self.0)
            .field(&self.value())
            .finish()
    }
}

impl core::fmt::Display for InternedSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.value())
    }
}

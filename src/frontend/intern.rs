use hashbrown::HashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

#[derive(Debug, Default)]
pub struct InterningTable {
    strings: RwLock<Strings>,
}

#[derive(Debug, Default)]
struct Strings {
    values: Vec<&'static str>,
    indices: HashMap<&'static str, u32>,
}

pub static INTERNING_TABLE: Lazy<InterningTable> = Lazy::new(Default::default);

impl InterningTable {
    pub fn get(&self, index: u32) -> Option<&'static str> {
        self.strings.read().values.get(index as usize).copied()
    }

    pub fn insert_if_absent(&self, string: &str) -> u32 {
        if let Some(index) = self.index_of(string) {
            return index;
        }

        let mut strings = self.strings.write();

        // Another thread may have inserted it between dropping the read lock
        // and acquiring the write lock
        if let Some(index) = strings.indices.get(string) {
            return *index;
        }

        let leaked: &'static str = Box::leak(string.to_owned().into_boxed_str());
        let index = strings.values.len() as u32;
        strings.values.push(leaked);
        strings.indices.insert(leaked, index);
        index
    }

    pub fn index_of(&self, string: &str) -> Option<u32> {
        self.strings.read().indices.get(string).copied()
    }
}

/// An index into the string interning table
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InternedSymbol(u32);

impl InternedSymbol {
    pub fn new(value: &str) -> Self {
        let index = INTERNING_TABLE.insert_if_absent(value);

        Self(index)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn value(&self) -> &'static str {
        INTERNING_TABLE.get(self.0).expect("Once an interned symbol is created, the string it references should never be removed from the table")
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

/// Symbols with a fixed meaning during path resolution
pub mod kw {
    use once_cell::sync::Lazy;

    use super::InternedSymbol;

    pub static PACKAGE: Lazy<InternedSymbol> = Lazy::new(|| InternedSymbol::new("pkg"));
    pub static SUPER: Lazy<InternedSymbol> = Lazy::new(|| InternedSymbol::new("super"));
    pub static SELF_VALUE: Lazy<InternedSymbol> = Lazy::new(|| InternedSymbol::new("self"));
    pub static SELF_TYPE: Lazy<InternedSymbol> = Lazy::new(|| InternedSymbol::new("Self"));
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn interning_is_stable_across_threads() {
        let handles = (0..4)
            .map(|_| std::thread::spawn(|| InternedSymbol::new("shared_symbol_name")))
            .collect::<Vec<_>>();

        let symbols = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect::<Vec<_>>();

        assert!(symbols.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(symbols[0].value(), "shared_symbol_name");
    }
}

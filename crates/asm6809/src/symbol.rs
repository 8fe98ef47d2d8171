//! Symbol table and numeric local labels.

use alloc::collections::BTreeMap;
use alloc::string::String;

use crate::value::Value;

#[derive(Debug, Clone)]
struct SymbolEntry {
    value: Value,
    pass: u32,
}

/// Global symbols, upserted and never deleted.
///
/// Tracks whether any symbol changed value since the flag was last taken,
/// which is what the pass scheduler uses to decide whether another pass is
/// needed.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    entries: BTreeMap<String, SymbolEntry>,
    changed: bool,
}

/// Whether `old` and `new` hold the same resolved value.  Two undefined
/// values count as unchanged even though they never compare equal.
fn same_value(old: &Value, new: &Value) -> bool {
    old == new || (old.is_undefined() && new.is_undefined())
}

impl SymbolTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value`, recording the pass.  Overwrites any previous
    /// value unconditionally.
    pub fn set(&mut self, name: &str, value: Value, pass: u32) {
        match self.entries.get_mut(name) {
            Some(entry) => {
                if !same_value(&entry.value, &value) {
                    log::trace!("symbol {} changed: {} -> {}", name, entry.value, value);
                    self.changed = true;
                }
                entry.value = value;
                entry.pass = pass;
            }
            None => {
                self.changed = true;
                self.entries
                    .insert(String::from(name), SymbolEntry { value, pass });
            }
        }
    }

    /// Current value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name).map(|e| &e.value)
    }

    /// Pass in which `name` was last set.
    #[must_use]
    pub fn pass_of(&self, name: &str) -> Option<u32> {
        self.entries.get(name).map(|e| e.pass)
    }

    /// Return and clear the changed flag.
    pub fn take_changed(&mut self) -> bool {
        core::mem::replace(&mut self.changed, false)
    }

    /// Mark the table as changed without touching a symbol.
    pub fn note_change(&mut self) {
        self.changed = true;
    }

    /// All symbols in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), &e.value))
    }

    /// Number of symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Numeric local labels of one section, keyed by label id and the section
/// line number at which each definition appears.
#[derive(Debug, Clone, Default)]
pub struct LocalLabels {
    labels: BTreeMap<i64, BTreeMap<u64, SymbolEntry>>,
}

impl LocalLabels {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Define label `id` at `line`.  Returns `true` if this changed the
    /// stored value.  An entry not refreshed since the pass before counts
    /// as absent.
    pub fn set(&mut self, id: i64, line: u64, value: Value, pass: u32) -> bool {
        let defs = self.labels.entry(id).or_default();
        let changed = defs.get(&line).map_or(true, |old| {
            old.pass.saturating_add(1) < pass || !same_value(&old.value, &value)
        });
        defs.insert(line, SymbolEntry { value, pass });
        changed
    }

    /// Closest definition of `id` at or before `line` made in `pass`.
    #[must_use]
    pub fn backward(&self, id: i64, line: u64, pass: u32) -> Option<&Value> {
        self.labels
            .get(&id)?
            .range(..=line)
            .rev()
            .find(|(_, e)| e.pass == pass)
            .map(|(_, e)| &e.value)
    }

    /// Closest definition of `id` strictly after `line`.  Only entries from
    /// `pass` or the one before are considered; older ones were left behind
    /// when line numbering moved.
    #[must_use]
    pub fn forward(&self, id: i64, line: u64, pass: u32) -> Option<&Value> {
        self.labels
            .get(&id)?
            .range(line + 1..)
            .find(|(_, e)| e.pass.saturating_add(1) >= pass)
            .map(|(_, e)| &e.value)
    }
}

//! Runtime shared string table.
//!
//! The [`SharedStringTable`] provides a thread-safe, interning index for
//! looking up and inserting shared strings. It bridges the gap between the
//! XML-level [`xlforge_xml::shared_strings::Sst`] and the block/columnar
//! cell storage, which carries a bare `u32` id rather than an owned string.

use std::collections::HashMap;
use std::sync::RwLock;

use xlforge_xml::shared_strings::{Si, Sst, T};

struct TableState {
    strings: Vec<String>,
    index_map: HashMap<String, u32>,
}

/// Runtime shared string table.
///
/// `intern` is safe to call concurrently from multiple threads (spec.md
/// §5): a single [`RwLock`] guards both the dense string list and the
/// reverse lookup map, mirroring [`crate::format::FormatRepository`].
pub struct SharedStringTable {
    state: RwLock<TableState>,
}

impl SharedStringTable {
    /// Create a new, empty shared string table.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(TableState {
                strings: Vec::new(),
                index_map: HashMap::new(),
            }),
        }
    }

    /// Build from an XML [`Sst`] struct.
    ///
    /// Plain-text items use the `t` field directly. Rich-text items
    /// concatenate all run texts. Ids are assigned positionally so they
    /// match the source file's `<si>` order exactly, even if that order
    /// contains duplicate text (the source writer chose not to dedupe).
    pub fn from_sst(sst: &Sst) -> Self {
        let table = Self::new();
        {
            let mut state = table.state.write().expect("shared string table poisoned");
            for si in &sst.items {
                let text = si_to_string(si);
                let idx = state.strings.len() as u32;
                state.index_map.entry(text.clone()).or_insert(idx);
                state.strings.push(text);
            }
        }
        table
    }

    /// Convert back to an XML [`Sst`] struct.
    pub fn to_sst(&self) -> Sst {
        let state = self.state.read().expect("shared string table poisoned");
        let items: Vec<Si> = state
            .strings
            .iter()
            .map(|s| Si {
                t: Some(T {
                    xml_space: if s.starts_with(' ')
                        || s.ends_with(' ')
                        || s.contains("  ")
                        || s.contains('\n')
                        || s.contains('\t')
                    {
                        Some("preserve".to_string())
                    } else {
                        None
                    },
                    value: s.clone(),
                }),
                r: vec![],
            })
            .collect();

        let len = items.len() as u32;
        Sst {
            xmlns: xlforge_xml::namespaces::SPREADSHEET_ML.to_string(),
            count: Some(len),
            unique_count: Some(len),
            items,
        }
    }

    /// Get a string by its index.
    pub fn get(&self, index: u32) -> Option<String> {
        let state = self.state.read().expect("shared string table poisoned");
        state.strings.get(index as usize).cloned()
    }

    /// Intern a string, returning its index.
    ///
    /// If the string already exists, the existing index is returned (dedup).
    pub fn intern(&self, s: &str) -> u32 {
        {
            let state = self.state.read().expect("shared string table poisoned");
            if let Some(&idx) = state.index_map.get(s) {
                return idx;
            }
        }
        let mut state = self.state.write().expect("shared string table poisoned");
        if let Some(&idx) = state.index_map.get(s) {
            return idx;
        }
        let idx = state.strings.len() as u32;
        state.strings.push(s.to_string());
        state.index_map.insert(s.to_string(), idx);
        idx
    }

    /// Insert a string at a specific id, used only when reconstructing a
    /// table from an already-loaded `sharedStrings.xml` so ids match the
    /// source file's positional order exactly, including any duplicate
    /// text the source chose not to dedupe.
    pub fn intern_with_id(&self, id: u32, s: &str) {
        let mut state = self.state.write().expect("shared string table poisoned");
        let idx = id as usize;
        if idx >= state.strings.len() {
            state.strings.resize(idx + 1, String::new());
        }
        state.strings[idx] = s.to_string();
        state.index_map.entry(s.to_string()).or_insert(id);
    }

    /// Number of strings held (including un-deduplicated duplicates
    /// preserved from a loaded source file).
    pub fn len(&self) -> usize {
        self.state.read().expect("shared string table poisoned").strings.len()
    }

    /// Returns `true` if the table contains no strings.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SharedStringTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract the plain-text content of a shared string item.
///
/// For plain items, returns `si.t.value`. For rich-text items, concatenates
/// all run texts.
fn si_to_string(si: &Si) -> String {
    if let Some(ref t) = si.t {
        t.value.clone()
    } else {
        si.r.iter().map(|r| r.t.value.as_str()).collect()
    }
}

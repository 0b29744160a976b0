//! Dirty manager.
//!
//! Tracks which logical OPC parts, identified by their archive-internal
//! path (e.g. `xl/worksheets/sheet3.xml`), need regeneration on save. Every
//! mutation route into the model marks the part(s) it affects; the
//! orchestrator consults [`DirtyManager::should_update`] before generating
//! each part.

use std::collections::HashSet;

/// Parts that are always regenerated on save, even when otherwise clean,
/// because their cross-references to other parts would desynchronise
/// otherwise.
const ALWAYS_DIRTY: &[&str] = &[
    "[Content_Types].xml",
    "_rels/.rels",
    "xl/styles.xml",
];

/// Tracks per-part dirty state for a single workbook.
#[derive(Debug, Default)]
pub struct DirtyManager {
    /// `true` once the workbook has no source package (a brand-new
    /// workbook): every part is dirty regardless of the set below.
    all_dirty: bool,
    dirty_parts: HashSet<String>,
}

impl DirtyManager {
    /// A brand-new workbook: every part starts dirty.
    pub fn new_workbook() -> Self {
        Self {
            all_dirty: true,
            dirty_parts: HashSet::new(),
        }
    }

    /// An opened-for-edit workbook: every part starts clean until touched.
    pub fn opened_for_edit() -> Self {
        Self {
            all_dirty: false,
            dirty_parts: HashSet::new(),
        }
    }

    pub fn mark_dirty(&mut self, part: impl Into<String>) {
        self.dirty_parts.insert(part.into());
    }

    pub fn mark_clean(&mut self, part: &str) {
        self.dirty_parts.remove(part);
    }

    /// Whether `part` must be regenerated this save, given whether the
    /// shared-string table currently holds entries (forces
    /// `xl/sharedStrings.xml` dirty even if otherwise clean, per
    /// the dirty policy).
    pub fn should_update(&self, part: &str, shared_strings_non_empty: bool) -> bool {
        if self.all_dirty {
            return true;
        }
        if ALWAYS_DIRTY.contains(&part) {
            return true;
        }
        if part == "xl/sharedStrings.xml" && shared_strings_non_empty {
            return true;
        }
        self.dirty_parts.contains(part)
    }

    pub fn is_new_workbook(&self) -> bool {
        self.all_dirty
    }

    /// Parts explicitly marked dirty so far (excludes the always-dirty set
    /// and the shared-strings special case, which are policy, not state).
    pub fn dirty_parts(&self) -> impl Iterator<Item = &str> {
        self.dirty_parts.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_workbook_reports_every_part_dirty() {
        let dm = DirtyManager::new_workbook();
        assert!(dm.should_update("xl/worksheets/sheet1.xml", false));
        assert!(dm.should_update("xl/theme/theme1.xml", false));
    }

    #[test]
    fn opened_for_edit_defaults_to_clean() {
        let dm = DirtyManager::opened_for_edit();
        assert!(!dm.should_update("xl/worksheets/sheet1.xml", false));
    }

    #[test]
    fn marking_a_part_dirty_makes_it_update() {
        let mut dm = DirtyManager::opened_for_edit();
        dm.mark_dirty("xl/worksheets/sheet2.xml");
        assert!(dm.should_update("xl/worksheets/sheet2.xml", false));
        assert!(!dm.should_update("xl/worksheets/sheet1.xml", false));
    }

    #[test]
    fn always_dirty_parts_update_even_when_clean() {
        let dm = DirtyManager::opened_for_edit();
        assert!(dm.should_update("[Content_Types].xml", false));
        assert!(dm.should_update("_rels/.rels", false));
        assert!(dm.should_update("xl/styles.xml", false));
    }

    #[test]
    fn shared_strings_forced_dirty_only_when_table_non_empty() {
        let dm = DirtyManager::opened_for_edit();
        assert!(!dm.should_update("xl/sharedStrings.xml", false));
        assert!(dm.should_update("xl/sharedStrings.xml", true));
    }

    #[test]
    fn mark_clean_removes_from_dirty_set() {
        let mut dm = DirtyManager::opened_for_edit();
        dm.mark_dirty("xl/worksheets/sheet1.xml");
        dm.mark_clean("xl/worksheets/sheet1.xml");
        assert!(!dm.should_update("xl/worksheets/sheet1.xml", false));
    }
}

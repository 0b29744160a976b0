//! Workbook: the top-level aggregate owning sheets, interned tables, and
//! document metadata.
//!
//! A workbook is a single-owner object (see spec §5): nothing here is safe
//! to mutate from multiple threads at once, though the format repository and
//! shared-string table it owns are individually safe to intern into
//! concurrently.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use xlforge_xml::doc_props::CustomProperties as XmlCustomProperties;

use crate::cell::Cell;
use crate::doc_props::{
    delete_custom_property, find_custom_property, set_custom_property, AppProperties,
    CustomPropertyValue, DocProperties,
};
use crate::dirty::DirtyManager;
use crate::error::{Error, Result};
use crate::format::{FormatRepository, StyleTransferContext};
use crate::options::WriterOptions;
use crate::reader::{self, DefinedNameEntry, LoadMode};
use crate::sheet::{Grid, Sheet};
use crate::sst::SharedStringTable;
use crate::theme::{default_theme_colors, ThemeColors};

/// Lifecycle state of a [`Workbook`], per spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkbookState {
    Creating,
    Reading,
    Editing,
    Closed,
}

/// The top-level in-memory model of an `.xlsx` package.
pub struct Workbook {
    state: WorkbookState,
    sheets: Vec<Sheet>,
    active_sheet: usize,
    next_sheet_id: u32,
    pub doc_properties: DocProperties,
    pub app_properties: AppProperties,
    custom_properties: XmlCustomProperties,
    pub defined_names: Vec<DefinedNameEntry>,
    pub formats: FormatRepository,
    pub shared_strings: SharedStringTable,
    pub theme: ThemeColors,
    pub options: WriterOptions,
    pub(crate) dirty: DirtyManager,
    pub(crate) source_path: Option<PathBuf>,
}

impl Workbook {
    /// A brand-new workbook with a single default sheet, "Sheet1".
    pub fn create() -> Self {
        let mut workbook = Self {
            state: WorkbookState::Creating,
            sheets: Vec::new(),
            active_sheet: 0,
            next_sheet_id: 1,
            doc_properties: DocProperties::default(),
            app_properties: AppProperties::default(),
            custom_properties: XmlCustomProperties::default(),
            defined_names: Vec::new(),
            formats: FormatRepository::new(),
            shared_strings: SharedStringTable::new(),
            theme: default_theme_colors(),
            options: WriterOptions::default(),
            dirty: DirtyManager::new_workbook(),
            source_path: None,
        };
        workbook
            .add_sheet("Sheet1")
            .expect("default sheet name is always valid");
        workbook.sheets[0].active = true;
        workbook.sheets[0].tab_selected = true;
        workbook
    }

    /// Open an existing package for read-only, scan-optimized access. Sheets
    /// load into a columnar store; mutating them fails.
    pub fn open_for_reading<P: AsRef<Path>>(path: P) -> Result<Self> {
        log::debug!("opening {} for reading", path.as_ref().display());
        let file = File::open(path.as_ref())?;
        let loaded = reader::load_package(BufReader::new(file), LoadMode::ScanOnly)?;
        Ok(Self::from_loaded(loaded, None, WorkbookState::Reading))
    }

    /// Open an existing package for editing. Sheets load into the block
    /// matrix so every mutation path is available; saving back to the same
    /// path reuses the passthrough machinery in the resource manager.
    pub fn open_for_editing<P: AsRef<Path>>(path: P) -> Result<Self> {
        log::debug!("opening {} for editing", path.as_ref().display());
        let file = File::open(path.as_ref())?;
        let loaded = reader::load_package(BufReader::new(file), LoadMode::Editable)?;
        Ok(Self::from_loaded(
            loaded,
            Some(path.as_ref().to_path_buf()),
            WorkbookState::Editing,
        ))
    }

    fn from_loaded(loaded: reader::LoadedPackage, source_path: Option<PathBuf>, state: WorkbookState) -> Self {
        let active_sheet = loaded.active_tab.min(loaded.sheets.len().saturating_sub(1));
        let next_sheet_id = loaded.sheets.iter().map(|s| s.sheet_id).max().unwrap_or(0) + 1;
        let dirty = DirtyManager::opened_for_edit();
        Self {
            state,
            sheets: loaded.sheets,
            active_sheet,
            next_sheet_id,
            doc_properties: loaded.doc_properties,
            app_properties: loaded.app_properties,
            custom_properties: XmlCustomProperties::default(),
            defined_names: loaded.defined_names,
            formats: loaded.formats,
            shared_strings: loaded.shared_strings,
            theme: loaded.theme,
            options: WriterOptions::default(),
            dirty,
            source_path,
        }
    }

    /// Release the in-memory model. Once closed, `save` fails with
    /// `InvalidState`.
    pub fn close(&mut self) {
        self.sheets.clear();
        self.state = WorkbookState::Closed;
    }

    pub fn state(&self) -> WorkbookState {
        self.state
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self.state, WorkbookState::Reading)
    }

    /// Serialize the current model to `path` without consuming it, so the
    /// workbook can be saved again (or kept open) afterward.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        match self.state {
            WorkbookState::Closed => {
                return Err(Error::InvalidState("cannot save a closed workbook".into()))
            }
            WorkbookState::Reading => {
                return Err(Error::InvalidState(
                    "workbook was opened read-only; reopen with open_for_editing to save".into(),
                ))
            }
            WorkbookState::Creating | WorkbookState::Editing => {}
        }
        crate::orchestrator::save(self, path.as_ref())?;
        if self.state == WorkbookState::Creating {
            self.source_path = Some(path.as_ref().to_path_buf());
            self.state = WorkbookState::Editing;
        }
        self.dirty = DirtyManager::opened_for_edit();
        Ok(())
    }

    // -- Sheet management --------------------------------------------------

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn sheet(&self, name: &str) -> Result<&Sheet> {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| Error::SheetNotFound { name: name.to_string() })
    }

    pub fn sheet_mut(&mut self, name: &str) -> Result<&mut Sheet> {
        self.dirty.mark_dirty(worksheet_part_path(
            self.sheets
                .iter()
                .position(|s| s.name == name)
                .ok_or_else(|| Error::SheetNotFound { name: name.to_string() })?,
        ));
        self.sheets
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| Error::SheetNotFound { name: name.to_string() })
    }

    pub fn sheet_at(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }

    pub fn active_sheet_name(&self) -> Option<&str> {
        self.sheets.get(self.active_sheet).map(|s| s.name.as_str())
    }

    pub fn set_active_sheet(&mut self, name: &str) -> Result<()> {
        let index = self
            .sheets
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| Error::SheetNotFound { name: name.to_string() })?;
        for (i, sheet) in self.sheets.iter_mut().enumerate() {
            sheet.active = i == index;
            sheet.tab_selected = i == index;
        }
        self.active_sheet = index;
        self.dirty.mark_dirty("xl/workbook.xml");
        Ok(())
    }

    /// Add a new, empty sheet named `name`. Fails if the name is invalid or
    /// already in use.
    pub fn add_sheet(&mut self, name: &str) -> Result<&mut Sheet> {
        if self.sheets.iter().any(|s| s.name == name) {
            return Err(Error::SheetAlreadyExists { name: name.to_string() });
        }
        let sheet_id = self.next_sheet_id;
        self.next_sheet_id += 1;
        let sheet = Sheet::new(name, sheet_id)?;
        self.sheets.push(sheet);
        self.dirty.mark_dirty("xl/workbook.xml");
        self.dirty.mark_dirty(worksheet_part_path(self.sheets.len() - 1));
        Ok(self.sheets.last_mut().expect("just pushed"))
    }

    /// Remove the sheet named `name`. A workbook must always retain at least
    /// one sheet.
    pub fn remove_sheet(&mut self, name: &str) -> Result<()> {
        if self.sheets.len() <= 1 {
            return Err(Error::InvalidState(
                "a workbook must contain at least one sheet".into(),
            ));
        }
        let index = self
            .sheets
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| Error::SheetNotFound { name: name.to_string() })?;
        self.sheets.remove(index);
        if self.active_sheet >= self.sheets.len() {
            self.active_sheet = self.sheets.len() - 1;
        }
        for (i, sheet) in self.sheets.iter_mut().enumerate() {
            sheet.active = i == self.active_sheet;
        }
        self.dirty.mark_dirty("xl/workbook.xml");
        Ok(())
    }

    pub fn rename_sheet(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        if old_name == new_name {
            return Ok(());
        }
        if self.sheets.iter().any(|s| s.name == new_name) {
            return Err(Error::SheetAlreadyExists { name: new_name.to_string() });
        }
        let sheet = self
            .sheets
            .iter_mut()
            .find(|s| s.name == old_name)
            .ok_or_else(|| Error::SheetNotFound { name: old_name.to_string() })?;
        crate::sheet::validate_sheet_name(new_name)?;
        sheet.name = new_name.to_string();
        self.dirty.mark_dirty("xl/workbook.xml");
        Ok(())
    }

    /// Deep-copy an existing sheet under a new name, remapping every format
    /// id through a [`StyleTransferContext`] built against this workbook's
    /// own format repository (a same-workbook copy, so the mapping is the
    /// identity in practice, but it keeps the path general enough to later
    /// support copying a sheet in from a different workbook).
    pub fn copy_sheet(&mut self, source_name: &str, new_name: &str) -> Result<()> {
        if self.sheets.iter().any(|s| s.name == new_name) {
            return Err(Error::SheetAlreadyExists { name: new_name.to_string() });
        }
        let source_index = self
            .sheets
            .iter()
            .position(|s| s.name == source_name)
            .ok_or_else(|| Error::SheetNotFound { name: source_name.to_string() })?;
        if self.sheets[source_index].is_columnar() {
            return Err(Error::InvalidState(
                "cannot copy a sheet loaded in read-only columnar mode".into(),
            ));
        }

        let transfer = StyleTransferContext::build(&self.formats, &self.formats);
        let sheet_id = self.next_sheet_id;
        self.next_sheet_id += 1;
        let mut copy = Sheet::new(new_name, sheet_id)?;

        {
            let source = &self.sheets[source_index];
            let cells: Vec<(u32, u32, Cell)> = match source.grid() {
                Grid::Blocks(matrix) => matrix
                    .iter_non_empty_sorted()
                    .into_iter()
                    .map(|(row, col, cell)| (row, col, cell.clone()))
                    .collect(),
                Grid::Columnar(_) => Vec::new(),
            };
            for (row, col, mut cell) in cells {
                if let Some(format_id) = cell.format_id() {
                    cell.set_format_id(Some(transfer.map(format_id)));
                }
                copy.set_cell(row, col, cell)?;
            }
            for rect in source.merges() {
                copy.add_merge(*rect)?;
            }
            for link in source.hyperlinks() {
                copy.add_hyperlink(link.clone());
            }
            copy.autofilter = source.autofilter;
            copy.pane = source.pane;
            copy.print_settings = source.print_settings.clone();
        }

        self.sheets.push(copy);
        self.dirty.mark_dirty("xl/workbook.xml");
        self.dirty.mark_dirty(worksheet_part_path(self.sheets.len() - 1));
        Ok(())
    }

    // -- Custom properties ---------------------------------------------------

    pub fn custom_property(&self, name: &str) -> Option<CustomPropertyValue> {
        find_custom_property(&self.custom_properties, name)
    }

    pub fn set_custom_property(&mut self, name: &str, value: CustomPropertyValue) {
        set_custom_property(&mut self.custom_properties, name, value);
        self.dirty.mark_dirty("docProps/custom.xml");
    }

    pub fn delete_custom_property(&mut self, name: &str) -> bool {
        let removed = delete_custom_property(&mut self.custom_properties, name);
        if removed {
            self.dirty.mark_dirty("docProps/custom.xml");
        }
        removed
    }

    pub fn has_custom_properties(&self) -> bool {
        !self.custom_properties.properties.is_empty()
    }

    pub(crate) fn custom_properties(&self) -> &XmlCustomProperties {
        &self.custom_properties
    }
}

/// The archive path a sheet at `index` (0-based position in the workbook's
/// sheet list) serializes to.
pub(crate) fn worksheet_part_path(index: usize) -> String {
    format!("xl/worksheets/sheet{}.xml", index + 1)
}

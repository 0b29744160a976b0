//! Package reader: the load path from an OPC archive into the in-memory model.
//!
//! Walks the package the way spec.md §4.8 describes an open: root
//! relationships, `xl/workbook.xml` and its relationships, `xl/styles.xml`,
//! `xl/sharedStrings.xml` and `xl/theme/theme1.xml` if present, then each
//! worksheet part and its own `.rels`. Every optional part falls back to a
//! sane default instead of failing the load, since real-world workbooks
//! regularly omit theme, shared strings (no string cells at all), or
//! `docProps/app.xml`.

use std::collections::HashMap;
use std::io::{Read, Seek};

use xlforge_xml::relationships::{rel_types, Relationships};
use xlforge_xml::shared_strings::Sst;
use xlforge_xml::styles::StyleSheet;
use xlforge_xml::theme::{parse_theme_colors, ThemeColors};
use xlforge_xml::workbook::WorkbookXml;
use xlforge_xml::worksheet::{cell_types, Cell as XmlCell, WorksheetXml};

use crate::archive::ArchiveReader;
use crate::cell::Cell;
use crate::doc_props::{AppProperties, DocProperties};
use crate::error::{Error, Result};
use crate::format::{load_stylesheet, FormatRepository};
use crate::sheet::{ColumnMeta, HyperlinkRecord, PrintSettings, Rect, RowMeta, Sheet};
use crate::sst::SharedStringTable;
use crate::theme::default_theme_colors;
use crate::utils::cell_ref::cell_name_to_coordinates;
use crate::workbook_paths::{default_relationships, relationship_part_path, resolve_relationship_target};

/// Whether worksheets are loaded into an editable block matrix or a
/// read-only columnar snapshot, chosen by the caller before the archive is
/// even opened (spec.md §4.3) -- a scan-only open never pays for the block
/// matrix's sparse index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    Editable,
    ScanOnly,
}

/// A defined name, scoped to the whole workbook (`local_sheet_id: None`) or
/// to a single sheet by its 0-based position in `workbookXml.sheets`.
#[derive(Debug, Clone)]
pub struct DefinedNameEntry {
    pub name: String,
    pub local_sheet_id: Option<u32>,
    pub value: String,
}

/// Everything the package reader recovers from an archive, ready to be
/// assembled into a [`crate::workbook::Workbook`].
pub struct LoadedPackage {
    pub sheets: Vec<Sheet>,
    pub active_tab: usize,
    pub doc_properties: DocProperties,
    pub app_properties: AppProperties,
    pub formats: FormatRepository,
    pub shared_strings: SharedStringTable,
    pub theme: ThemeColors,
    pub defined_names: Vec<DefinedNameEntry>,
}

/// Parse an entire `.xlsx` package out of `source`.
pub fn load_package<R: Read + Seek>(source: R, mode: LoadMode) -> Result<LoadedPackage> {
    let mut archive = ArchiveReader::new(source)?;

    let root_rels = read_relationships(&mut archive, "_rels/.rels")?;

    let workbook_path = root_rels
        .relationships
        .iter()
        .find(|r| r.rel_type == rel_types::OFFICE_DOCUMENT)
        .map(|r| resolve_relationship_target("", &r.target))
        .unwrap_or_else(|| "xl/workbook.xml".to_string());

    if !archive.contains(&workbook_path) {
        return Err(Error::ArchiveCorrupt(format!(
            "package is missing its workbook part at '{workbook_path}'"
        )));
    }
    let workbook_text = archive.extract_string(&workbook_path)?;
    let workbook_xml: WorkbookXml = quick_xml::de::from_str(&workbook_text)
        .map_err(|e| Error::XmlDeserialize(format!("{workbook_path}: {e}")))?;

    let workbook_rels_path = relationship_part_path(&workbook_path);
    let workbook_rels = read_relationships(&mut archive, &workbook_rels_path)?;
    let rel_by_id: HashMap<&str, &xlforge_xml::relationships::Relationship> = workbook_rels
        .relationships
        .iter()
        .map(|r| (r.id.as_str(), r))
        .collect();

    let styles_path = workbook_rels
        .relationships
        .iter()
        .find(|r| r.rel_type == rel_types::STYLES)
        .map(|r| resolve_relationship_target(&workbook_path, &r.target));
    let sst_path = workbook_rels
        .relationships
        .iter()
        .find(|r| r.rel_type == rel_types::SHARED_STRINGS)
        .map(|r| resolve_relationship_target(&workbook_path, &r.target));
    let theme_path = workbook_rels
        .relationships
        .iter()
        .find(|r| r.rel_type == rel_types::THEME)
        .map(|r| resolve_relationship_target(&workbook_path, &r.target));

    let formats = FormatRepository::new();
    if let Some(path) = &styles_path {
        if archive.contains(path) {
            let text = archive.extract_string(path)?;
            let stylesheet: StyleSheet = quick_xml::de::from_str(&text)
                .map_err(|e| Error::XmlDeserialize(format!("{path}: {e}")))?;
            load_stylesheet(&formats, &stylesheet);
        }
    }

    let shared_strings = match &sst_path {
        Some(path) if archive.contains(path) => {
            let text = archive.extract_string(path)?;
            let sst: Sst = quick_xml::de::from_str(&text)
                .map_err(|e| Error::XmlDeserialize(format!("{path}: {e}")))?;
            SharedStringTable::from_sst(&sst)
        }
        _ => SharedStringTable::new(),
    };

    let theme = match &theme_path {
        Some(path) if archive.contains(path) => parse_theme_colors(&archive.extract_bytes(path)?),
        _ => default_theme_colors(),
    };

    let core_path = root_rels
        .relationships
        .iter()
        .find(|r| r.rel_type == rel_types::CORE_PROPERTIES)
        .map(|r| resolve_relationship_target("", &r.target));
    let doc_properties = match &core_path {
        Some(path) if archive.contains(path) => {
            let text = archive.extract_string(path)?;
            let core = xlforge_xml::doc_props::deserialize_core_properties(&text)
                .map_err(Error::XmlDeserialize)?;
            DocProperties::from(&core)
        }
        _ => DocProperties::default(),
    };

    let app_path = root_rels
        .relationships
        .iter()
        .find(|r| r.rel_type == rel_types::EXTENDED_PROPERTIES)
        .map(|r| resolve_relationship_target("", &r.target));
    let app_properties = match &app_path {
        Some(path) if archive.contains(path) => {
            let text = archive.extract_string(path)?;
            let ext: xlforge_xml::doc_props::ExtendedProperties = quick_xml::de::from_str(&text)
                .map_err(|e| Error::XmlDeserialize(format!("{path}: {e}")))?;
            AppProperties::from(&ext)
        }
        _ => AppProperties::default(),
    };

    let active_tab = workbook_xml
        .book_views
        .as_ref()
        .and_then(|bv| bv.workbook_views.first())
        .and_then(|wv| wv.active_tab)
        .unwrap_or(0) as usize;

    let defined_names = workbook_xml
        .defined_names
        .as_ref()
        .map(|dn| {
            dn.defined_names
                .iter()
                .map(|d| DefinedNameEntry {
                    name: d.name.clone(),
                    local_sheet_id: d.local_sheet_id,
                    value: d.value.clone(),
                })
                .collect()
        })
        .unwrap_or_default();

    let mut sheets = Vec::with_capacity(workbook_xml.sheets.sheets.len());
    for (index, entry) in workbook_xml.sheets.sheets.iter().enumerate() {
        let rel = rel_by_id.get(entry.r_id.as_str()).ok_or_else(|| {
            Error::ArchiveCorrupt(format!(
                "sheet '{}' references unknown relationship '{}'",
                entry.name, entry.r_id
            ))
        })?;
        let target = resolve_relationship_target(&workbook_path, &rel.target);

        if !archive.contains(&target) {
            return Err(Error::ArchiveCorrupt(format!(
                "sheet '{}' part '{target}' is missing from the package",
                entry.name
            )));
        }
        let sheet_text = archive.extract_string(&target)?;
        let sheet_rels_path = relationship_part_path(&target);
        let sheet_rels = read_relationships(&mut archive, &sheet_rels_path)?;

        let mut sheet = parse_worksheet(
            &sheet_text,
            &entry.name,
            entry.sheet_id,
            mode,
            &shared_strings,
            &sheet_rels,
        )?;
        sheet.active = index == active_tab;
        sheets.push(sheet);
    }

    log::debug!("loaded {} sheet(s) in {mode:?} mode", sheets.len());

    Ok(LoadedPackage {
        sheets,
        active_tab,
        doc_properties,
        app_properties,
        formats,
        shared_strings,
        theme,
        defined_names,
    })
}

/// Read a `.rels` part, tolerating its absence (an empty package-relative
/// relationship set is a normal state, e.g. a sheet with no hyperlinks).
fn read_relationships<R: Read + Seek>(
    archive: &mut ArchiveReader<R>,
    rels_path: &str,
) -> Result<Relationships> {
    if !archive.contains(rels_path) {
        return Ok(default_relationships());
    }
    let text = archive.extract_string(rels_path)?;
    quick_xml::de::from_str(&text).map_err(|e| Error::XmlDeserialize(format!("{rels_path}: {e}")))
}

fn parse_worksheet(
    text: &str,
    name: &str,
    sheet_id: u32,
    mode: LoadMode,
    shared_strings: &SharedStringTable,
    sheet_rels: &Relationships,
) -> Result<Sheet> {
    let ws: WorksheetXml = quick_xml::de::from_str(text)
        .map_err(|e| Error::XmlDeserialize(format!("sheet '{name}': {e}")))?;

    let mut sheet = match mode {
        LoadMode::Editable => Sheet::new(name, sheet_id)?,
        LoadMode::ScanOnly => Sheet::new_columnar(name, sheet_id)?,
    };

    if let Some(views) = &ws.sheet_views {
        if let Some(view) = views.sheet_views.first() {
            sheet.tab_selected = view.tab_selected.unwrap_or(false);
        }
    }

    if let Some(cols) = &ws.cols {
        for col in &cols.cols {
            let meta = ColumnMeta {
                width: col.width,
                format_id: col.style,
                hidden: col.hidden.unwrap_or(false),
                outline_level: col.outline_level.unwrap_or(0),
            };
            let lo = col.min.saturating_sub(1);
            let hi = col.max.saturating_sub(1);
            for c in lo..=hi {
                sheet.set_column_meta(c, meta.clone())?;
            }
        }
    }

    for row in &ws.sheet_data.rows {
        let row_idx = row.r.saturating_sub(1);
        if row.ht.is_some() || row.hidden.unwrap_or(false) || row.s.is_some() {
            sheet.set_row_meta(
                row_idx,
                RowMeta {
                    height: row.ht,
                    format_id: row.s,
                    hidden: row.hidden.unwrap_or(false),
                    outline_level: row.outline_level.unwrap_or(0),
                },
            )?;
        }

        for cell in &row.cells {
            let (col1, row1) = cell_name_to_coordinates(&cell.r)?;
            apply_cell(&mut sheet, mode, row1 - 1, col1 - 1, cell, shared_strings)?;
        }
    }

    if let Some(merge_cells) = &ws.merge_cells {
        for mc in &merge_cells.merge_cells {
            if let Ok(rect) = rect_from_ref(&mc.reference) {
                // A corrupt or overlapping merge in the source file is not
                // worth failing the whole load over; drop it and move on.
                let _ = sheet.add_merge(rect);
            }
        }
    }

    if let Some(hyperlinks) = &ws.hyperlinks {
        for h in &hyperlinks.hyperlinks {
            let target = h
                .r_id
                .as_ref()
                .and_then(|rid| sheet_rels.relationships.iter().find(|r| &r.id == rid))
                .map(|r| r.target.clone())
                .or_else(|| h.location.clone())
                .unwrap_or_default();
            if let Ok((col1, row1)) = cell_name_to_coordinates(&h.reference) {
                sheet.add_hyperlink(HyperlinkRecord {
                    row: row1 - 1,
                    col: col1 - 1,
                    target,
                    tooltip: h.display.clone(),
                });
            }
        }
    }

    if let Some(page_setup) = &ws.page_setup {
        sheet.print_settings = Some(PrintSettings {
            orientation_landscape: page_setup.orientation.as_deref() == Some("landscape"),
            fit_to_width: None,
            fit_to_height: None,
            print_area: None,
        });
    }

    Ok(sheet)
}

/// Route a parsed `<c>` element into the sheet's grid, dispatching on the
/// load mode before any `Cell` gets built: a scan-mode sheet writes straight
/// into its [`crate::columnar::ColumnarStore`] by type, since going through
/// a shared intermediate `Cell` would force eagerly resolving shared-string
/// ids the columnar store is built to defer.
fn apply_cell(
    sheet: &mut Sheet,
    mode: LoadMode,
    row: u32,
    col: u32,
    cell: &XmlCell,
    shared_strings: &SharedStringTable,
) -> Result<()> {
    let t = cell.t.as_deref().unwrap_or(cell_types::NUMBER);

    match mode {
        LoadMode::Editable => {
            let mut value = build_cell(cell, t, shared_strings)?;
            if let Some(style) = cell.s {
                value.set_format_id(Some(style));
            }
            sheet.set_cell(row, col, value)
        }
        LoadMode::ScanOnly => {
            let store = sheet
                .columnar_store_mut()
                .expect("a scan-mode sheet always holds a columnar store");
            match t {
                cell_types::BOOLEAN => {
                    if let Some(v) = &cell.v {
                        store.put_boolean(row, col, v == "1");
                    }
                }
                cell_types::SHARED_STRING => {
                    if let Some(id) = cell.v.as_ref().and_then(|v| v.parse::<u32>().ok()) {
                        store.put_shared_string(row, col, id);
                    }
                }
                cell_types::INLINE_STRING => {
                    if let Some(text) = cell.is.as_ref().and_then(|is| is.t.clone()) {
                        store.put_owned_string(row, col, text);
                    }
                }
                cell_types::ERROR | cell_types::FORMULA_STRING => {
                    if let Some(v) = &cell.v {
                        store.put_owned_string(row, col, v.clone());
                    }
                }
                _ => {
                    if let Some(n) = cell.v.as_ref().and_then(|v| v.parse::<f64>().ok()) {
                        store.put_number(row, col, n);
                    }
                }
            }
            Ok(())
        }
    }
}

/// Build an editable [`Cell`] from a parsed `<c>` element. A formula
/// element wins over the `t` attribute regardless of its value, since a
/// formula cell's `t` only describes the cached result's shape.
fn build_cell(cell: &XmlCell, t: &str, shared_strings: &SharedStringTable) -> Result<Cell> {
    if let Some(formula) = &cell.f {
        let cached = cell.v.as_ref().and_then(|v| v.parse::<f64>().ok());
        return Ok(match formula.t.as_deref() {
            Some("shared") => Cell::shared_formula_ref(formula.si.unwrap_or(0), cached),
            _ => Cell::formula(formula.value.as_deref().unwrap_or(""), cached),
        });
    }

    match t {
        cell_types::SHARED_STRING => {
            let id = cell.v.as_ref().and_then(|v| v.parse::<u32>().ok()).unwrap_or(0);
            Ok(Cell::shared_string_ref(id))
        }
        cell_types::INLINE_STRING => {
            let text = cell.is.as_ref().and_then(|is| is.t.clone()).unwrap_or_default();
            Ok(Cell::string_with(&text, |s| shared_strings.intern(s)))
        }
        cell_types::BOOLEAN => Ok(Cell::boolean(cell.v.as_deref() == Some("1"))),
        cell_types::ERROR => Ok(Cell::error(cell.v.as_deref().unwrap_or("#N/A"))),
        cell_types::FORMULA_STRING => {
            let text = cell.v.clone().unwrap_or_default();
            Ok(Cell::string_with(&text, |s| shared_strings.intern(s)))
        }
        _ => match &cell.v {
            Some(v) => {
                let n = v.parse::<f64>().map_err(|_| {
                    Error::XmlDeserialize(format!("cell {}: invalid numeric value '{v}'", cell.r))
                })?;
                Ok(Cell::number(n))
            }
            None => Ok(Cell::empty()),
        },
    }
}

/// Parse an `A1` or `A1:B2` merge/print-area reference into a [`Rect`] of
/// 0-based coordinates, normalizing reversed corners.
fn rect_from_ref(reference: &str) -> Result<Rect> {
    let (start, end) = reference.split_once(':').unwrap_or((reference, reference));
    let (c1, r1) = cell_name_to_coordinates(start)?;
    let (c2, r2) = cell_name_to_coordinates(end)?;
    Ok(Rect {
        row_start: r1.min(r2) - 1,
        col_start: c1.min(c2) - 1,
        row_end: r1.max(r2) - 1,
        col_end: c1.max(c2) - 1,
    })
}

//! Sheet model.
//!
//! A [`Sheet`] owns either a [`BlockMatrix`] or a [`ColumnarStore`] (never
//! both) plus the per-column/per-row metadata, merge rectangles, and other
//! layout state SpreadsheetML attaches to a worksheet.

use std::collections::BTreeMap;
use std::io::Write;

use crate::block::BlockMatrix;
use crate::cell::{Cell, CellRef, CellView};
use crate::column_width::{CalibriColumnWidthEstimator, ColumnWidthEstimator};
use crate::columnar::ColumnarStore;
use crate::error::{Error, Result};
use crate::utils::cell_ref::{cell_name_to_coordinates, coordinates_to_cell_name};
use crate::utils::constants::{
    DEFAULT_COL_WIDTH, DEFAULT_ROW_HEIGHT, MAX_COLUMNS, MAX_ROWS, MAX_SHEET_NAME_LENGTH,
    SHEET_NAME_INVALID_CHARS,
};
use crate::xmlwriter::XmlStreamWriter;

/// Validate a sheet name according to Excel rules.
///
/// A valid sheet name must:
/// - Be non-empty
/// - Be at most [`MAX_SHEET_NAME_LENGTH`] (31) characters
/// - Not contain any of the characters `: \ / ? * [ ]`
/// - Not start or end with a single quote (`'`)
pub fn validate_sheet_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidSheetName("sheet name cannot be empty".into()));
    }
    if name.chars().count() > MAX_SHEET_NAME_LENGTH {
        return Err(Error::InvalidSheetName(format!(
            "sheet name '{name}' exceeds {MAX_SHEET_NAME_LENGTH} characters"
        )));
    }
    for ch in SHEET_NAME_INVALID_CHARS {
        if name.contains(*ch) {
            return Err(Error::InvalidSheetName(format!(
                "sheet name '{name}' contains invalid character '{ch}'"
            )));
        }
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(Error::InvalidSheetName(format!(
            "sheet name '{name}' cannot start or end with a single quote"
        )));
    }
    Ok(())
}

/// Per-column metadata: width, default format, visibility, outline level.
#[derive(Debug, Clone, Default)]
pub struct ColumnMeta {
    pub width: Option<f64>,
    pub format_id: Option<u32>,
    pub hidden: bool,
    pub outline_level: u8,
}

/// Per-row metadata: height, default format, visibility.
#[derive(Debug, Clone, Default)]
pub struct RowMeta {
    pub height: Option<f64>,
    pub format_id: Option<u32>,
    pub hidden: bool,
    pub outline_level: u8,
}

/// An inclusive rectangle of 0-based (row, col) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub row_start: u32,
    pub col_start: u32,
    pub row_end: u32,
    pub col_end: u32,
}

impl Rect {
    pub fn contains(&self, row: u32, col: u32) -> bool {
        row >= self.row_start && row <= self.row_end && col >= self.col_start && col <= self.col_end
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.row_start <= other.row_end
            && other.row_start <= self.row_end
            && self.col_start <= other.col_end
            && other.col_start <= self.col_end
    }
}

/// A freeze or split pane specification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaneSpec {
    Freeze { x_split: u32, y_split: u32 },
    Split { x_split: f64, y_split: f64 },
}

/// Page/print settings for a sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrintSettings {
    pub orientation_landscape: bool,
    pub fit_to_width: Option<u32>,
    pub fit_to_height: Option<u32>,
    pub print_area: Option<Rect>,
}

/// A hyperlink attached to a single cell.
#[derive(Debug, Clone)]
pub struct HyperlinkRecord {
    pub row: u32,
    pub col: u32,
    pub target: String,
    pub tooltip: Option<String>,
}

/// The grid storage a sheet owns. Exclusive: a sheet is either editable
/// (block matrix) or a scan-optimized read-only snapshot (columnar).
pub enum Grid {
    Blocks(BlockMatrix),
    Columnar(ColumnarStore),
}

impl Grid {
    pub fn is_columnar(&self) -> bool {
        matches!(self, Grid::Columnar(_))
    }
}

/// A single worksheet: its grid plus all the layout metadata
/// SpreadsheetML attaches to a worksheet part.
pub struct Sheet {
    pub name: String,
    pub sheet_id: u32,
    grid: Grid,
    columns: BTreeMap<u32, ColumnMeta>,
    rows: BTreeMap<u32, RowMeta>,
    merges: Vec<Rect>,
    pub autofilter: Option<Rect>,
    pub pane: Option<PaneSpec>,
    pub print_settings: Option<PrintSettings>,
    pub tab_selected: bool,
    pub active: bool,
    hyperlinks: Vec<HyperlinkRecord>,
}

impl Sheet {
    pub fn new(name: &str, sheet_id: u32) -> Result<Self> {
        validate_sheet_name(name)?;
        Ok(Self {
            name: name.to_string(),
            sheet_id,
            grid: Grid::Blocks(BlockMatrix::new()),
            columns: BTreeMap::new(),
            rows: BTreeMap::new(),
            merges: Vec::new(),
            autofilter: None,
            pane: None,
            print_settings: None,
            tab_selected: false,
            active: false,
            hyperlinks: Vec::new(),
        })
    }

    /// Build a read-only sheet backed by a columnar store, used by the
    /// package reader when opened for scan-heavy read access.
    pub fn new_columnar(name: &str, sheet_id: u32) -> Result<Self> {
        validate_sheet_name(name)?;
        Ok(Self {
            name: name.to_string(),
            sheet_id,
            grid: Grid::Columnar(ColumnarStore::new()),
            columns: BTreeMap::new(),
            rows: BTreeMap::new(),
            merges: Vec::new(),
            autofilter: None,
            pane: None,
            print_settings: None,
            tab_selected: false,
            active: false,
            hyperlinks: Vec::new(),
        })
    }

    fn check_bounds(row: u32, col: u32) -> Result<()> {
        if row >= MAX_ROWS {
            return Err(Error::InvalidRowNumber(row + 1));
        }
        if col >= MAX_COLUMNS {
            return Err(Error::InvalidColumnNumber(col + 1));
        }
        Ok(())
    }

    /// Write a cell at 0-based (row, col). Fails on a columnar-backed sheet.
    pub fn set_cell(&mut self, row: u32, col: u32, cell: Cell) -> Result<()> {
        Self::check_bounds(row, col)?;
        match &mut self.grid {
            Grid::Blocks(matrix) => {
                matrix.set(row, col, cell);
                Ok(())
            }
            Grid::Columnar(_) => ColumnarStore::reject_mutation("set_cell"),
        }
    }

    pub fn set_cell_by_ref(&mut self, a1: &str, cell: Cell) -> Result<()> {
        let (col, row) = cell_name_to_coordinates(a1)?;
        self.set_cell(row - 1, col - 1, cell)
    }

    /// Resolve the cell at 0-based (row, col) to its public view.
    pub fn get_cell<F>(&self, row: u32, col: u32, resolve_string: F) -> CellView
    where
        F: FnOnce(u32) -> Option<String>,
    {
        match &self.grid {
            Grid::Blocks(matrix) => matrix
                .get(row, col)
                .map(|c| c.view(resolve_string))
                .unwrap_or(CellView::Empty),
            Grid::Columnar(store) => store.get(row, col, resolve_string).unwrap_or(CellView::Empty),
        }
    }

    pub fn get_cell_by_ref<F>(&self, a1: &str, resolve_string: F) -> Result<CellView>
    where
        F: FnOnce(u32) -> Option<String>,
    {
        let (col, row) = cell_name_to_coordinates(a1)?;
        Ok(self.get_cell(row - 1, col - 1, resolve_string))
    }

    /// Every occupied 0-based (row, col) position, sorted in row-major
    /// order, regardless of which backing store this sheet uses.
    pub fn occupied_positions(&self) -> Vec<(u32, u32)> {
        match &self.grid {
            Grid::Blocks(matrix) => matrix
                .iter_non_empty_sorted()
                .into_iter()
                .map(|(row, col, _)| (row, col))
                .collect(),
            Grid::Columnar(store) => {
                let mut positions: Vec<(u32, u32)> = store.iter_positions().collect();
                positions.sort_unstable();
                positions
            }
        }
    }

    pub fn clear_cell(&mut self, row: u32, col: u32) -> Result<()> {
        Self::check_bounds(row, col)?;
        match &mut self.grid {
            Grid::Blocks(matrix) => {
                matrix.clear(row, col);
                Ok(())
            }
            Grid::Columnar(_) => ColumnarStore::reject_mutation("clear_cell"),
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn is_columnar(&self) -> bool {
        self.grid.is_columnar()
    }

    /// Mutable access to the columnar store, used only by the package
    /// reader to populate a sheet opened in scan mode -- `set_cell` is the
    /// public mutation path and it rejects columnar sheets outright, so the
    /// reader bypasses it with typed `put_*` calls straight into the store.
    pub(crate) fn columnar_store_mut(&mut self) -> Option<&mut ColumnarStore> {
        match &mut self.grid {
            Grid::Columnar(store) => Some(store),
            Grid::Blocks(_) => None,
        }
    }

    pub fn column_meta(&self, col: u32) -> ColumnMeta {
        self.columns.get(&col).cloned().unwrap_or_default()
    }

    pub fn set_column_meta(&mut self, col: u32, meta: ColumnMeta) -> Result<()> {
        if col >= MAX_COLUMNS {
            return Err(Error::InvalidColumnNumber(col + 1));
        }
        self.columns.insert(col, meta);
        Ok(())
    }

    pub fn row_meta(&self, row: u32) -> RowMeta {
        self.rows.get(&row).cloned().unwrap_or_default()
    }

    pub fn set_row_meta(&mut self, row: u32, meta: RowMeta) -> Result<()> {
        if row >= MAX_ROWS {
            return Err(Error::InvalidRowNumber(row + 1));
        }
        self.rows.insert(row, meta);
        Ok(())
    }

    /// Set a column's display width to the nearest value Excel itself would
    /// store for it, quantized through the default (Calibri 11pt) estimator.
    pub fn set_column_width(&mut self, col: u32, desired_width: f64) -> Result<()> {
        self.set_column_width_with(col, desired_width, &CalibriColumnWidthEstimator)
    }

    /// As [`Sheet::set_column_width`], quantizing with a caller-supplied
    /// [`ColumnWidthEstimator`] instead of the Calibri 11pt default.
    pub fn set_column_width_with<E: ColumnWidthEstimator>(
        &mut self,
        col: u32,
        desired_width: f64,
        estimator: &E,
    ) -> Result<()> {
        let mut meta = self.column_meta(col);
        meta.width = Some(estimator.quantize(desired_width));
        self.set_column_meta(col, meta)
    }

    pub fn column_width(&self, col: u32) -> f64 {
        self.columns
            .get(&col)
            .and_then(|m| m.width)
            .unwrap_or(DEFAULT_COL_WIDTH)
    }

    pub fn row_height(&self, row: u32) -> f64 {
        self.rows
            .get(&row)
            .and_then(|m| m.height)
            .unwrap_or(DEFAULT_ROW_HEIGHT)
    }

    /// Add a merge rectangle. Fails if it overlaps an existing merge.
    pub fn add_merge(&mut self, rect: Rect) -> Result<()> {
        if self.merges.iter().any(|m| m.overlaps(&rect)) {
            return Err(Error::InvalidArgument(
                "merge rectangle overlaps an existing merge".to_string(),
            ));
        }
        self.merges.push(rect);
        Ok(())
    }

    pub fn merges(&self) -> &[Rect] {
        &self.merges
    }

    pub fn add_hyperlink(&mut self, record: HyperlinkRecord) {
        self.hyperlinks.push(record);
    }

    pub fn hyperlinks(&self) -> &[HyperlinkRecord] {
        &self.hyperlinks
    }

    pub fn cell_ref(row: u32, col: u32) -> Result<String> {
        coordinates_to_cell_name(col + 1, row + 1)
    }

    /// Write this sheet's `xl/worksheets/sheetN.xml` body straight to an
    /// [`XmlStreamWriter`], reading cells out of the block matrix in
    /// row-major order rather than building a `WorksheetXml` tree first --
    /// the writer strategies (`crate::writer`) depend on constant memory
    /// regardless of cell count, which an intermediate DOM would defeat.
    ///
    /// Shared-string ids and format ids are written as-is; resolving a
    /// shared-string id to text is the reader's job, not the writer's.
    ///
    /// `hyperlink_rel_ids` supplies one relationship id per entry of
    /// [`Sheet::hyperlinks`], in the same order -- the orchestrator assigns
    /// these when it builds the sheet's `.rels` part, since a worksheet
    /// hyperlink references its target indirectly through a relationship
    /// rather than embedding the URL.
    pub fn write_xml<W: Write>(
        &self,
        xml: &mut XmlStreamWriter<W>,
        hyperlink_rel_ids: &[String],
    ) -> Result<()> {
        let matrix = match &self.grid {
            Grid::Blocks(matrix) => matrix,
            Grid::Columnar(_) => {
                return Err(Error::InvalidState(
                    "a sheet loaded in columnar (read-only) mode cannot be re-serialized; \
                     reopen the workbook in editable mode to save it"
                        .to_string(),
                ));
            }
        };

        xml.write_declaration()?;
        xml.start_element("worksheet")?;
        xml.attribute("xmlns", "http://schemas.openxmlformats.org/spreadsheetml/2006/main")?;
        xml.attribute(
            "xmlns:r",
            "http://schemas.openxmlformats.org/officeDocument/2006/relationships",
        )?;
        xml.close_start_tag()?;

        self.write_dimension(xml, matrix)?;
        self.write_sheet_views(xml)?;
        self.write_sheet_format_pr(xml)?;
        self.write_cols(xml)?;
        self.write_sheet_data(xml, matrix)?;
        self.write_merge_cells(xml)?;
        self.write_hyperlinks(xml, hyperlink_rel_ids)?;
        self.write_page_settings(xml)?;

        xml.end_element("worksheet")?;
        Ok(())
    }

    fn write_dimension<W: Write>(&self, xml: &mut XmlStreamWriter<W>, matrix: &BlockMatrix) -> Result<()> {
        let cells = matrix.iter_non_empty_sorted();
        let reference = match (cells.first(), cells.last()) {
            (Some((first_row, _, _)), Some((last_row, _, _))) => {
                let min_col = cells.iter().map(|(_, c, _)| *c).min().unwrap_or(0);
                let max_col = cells.iter().map(|(_, c, _)| *c).max().unwrap_or(0);
                format!(
                    "{}:{}",
                    Self::cell_ref(*first_row, min_col)?,
                    Self::cell_ref(*last_row, max_col)?
                )
            }
            _ => "A1".to_string(),
        };
        xml.start_element("dimension")?;
        xml.attribute("ref", &reference)?;
        xml.close_empty_element()?;
        Ok(())
    }

    fn write_sheet_views<W: Write>(&self, xml: &mut XmlStreamWriter<W>) -> Result<()> {
        xml.start_element("sheetViews")?;
        xml.close_start_tag()?;
        xml.start_element("sheetView")?;
        if self.tab_selected {
            xml.attribute("tabSelected", "1")?;
        }
        xml.attribute("workbookViewId", "0")?;
        match self.pane {
            Some(_) => {
                xml.close_start_tag()?;
                self.write_pane(xml)?;
                xml.end_element("sheetView")?;
            }
            None => xml.close_empty_element()?,
        }
        xml.end_element("sheetViews")?;
        Ok(())
    }

    fn write_pane<W: Write>(&self, xml: &mut XmlStreamWriter<W>) -> Result<()> {
        match self.pane {
            Some(PaneSpec::Freeze { x_split, y_split }) => {
                xml.start_element("pane")?;
                if x_split > 0 {
                    xml.attribute_u32("xSplit", x_split)?;
                }
                if y_split > 0 {
                    xml.attribute_u32("ySplit", y_split)?;
                }
                let top_left = Self::cell_ref(y_split, x_split)?;
                xml.attribute("topLeftCell", &top_left)?;
                xml.attribute("state", "frozen")?;
                xml.close_empty_element()?;
            }
            Some(PaneSpec::Split { x_split, y_split }) => {
                xml.start_element("pane")?;
                if x_split > 0.0 {
                    xml.attribute_f64("xSplit", x_split)?;
                }
                if y_split > 0.0 {
                    xml.attribute_f64("ySplit", y_split)?;
                }
                xml.close_empty_element()?;
            }
            None => {}
        }
        Ok(())
    }

    fn write_sheet_format_pr<W: Write>(&self, xml: &mut XmlStreamWriter<W>) -> Result<()> {
        xml.start_element("sheetFormatPr")?;
        xml.attribute_f64("defaultRowHeight", DEFAULT_ROW_HEIGHT)?;
        xml.close_empty_element()?;
        Ok(())
    }

    fn write_cols<W: Write>(&self, xml: &mut XmlStreamWriter<W>) -> Result<()> {
        if self.columns.is_empty() {
            return Ok(());
        }
        xml.start_element("cols")?;
        xml.close_start_tag()?;
        for (col, meta) in &self.columns {
            xml.start_element("col")?;
            xml.attribute_u32("min", *col + 1)?;
            xml.attribute_u32("max", *col + 1)?;
            xml.attribute_f64("width", meta.width.unwrap_or(DEFAULT_COL_WIDTH))?;
            if let Some(format_id) = meta.format_id {
                xml.attribute_u32("style", format_id)?;
            }
            if meta.hidden {
                xml.attribute("hidden", "1")?;
            }
            if meta.outline_level > 0 {
                xml.attribute_u32("outlineLevel", meta.outline_level as u32)?;
            }
            xml.attribute("customWidth", "1")?;
            xml.close_empty_element()?;
        }
        xml.end_element("cols")?;
        Ok(())
    }

    fn write_sheet_data<W: Write>(&self, xml: &mut XmlStreamWriter<W>, matrix: &BlockMatrix) -> Result<()> {
        xml.start_element("sheetData")?;
        xml.close_start_tag()?;

        let cells = matrix.iter_non_empty_sorted();
        let mut idx = 0;
        while idx < cells.len() {
            let row = cells[idx].0;
            let row_meta = self.rows.get(&row);

            xml.start_element("row")?;
            xml.attribute_u32("r", row + 1)?;
            if let Some(meta) = row_meta {
                if let Some(height) = meta.height {
                    xml.attribute_f64("ht", height)?;
                    xml.attribute("customHeight", "1")?;
                }
                if let Some(format_id) = meta.format_id {
                    xml.attribute_u32("s", format_id)?;
                    xml.attribute("customFormat", "1")?;
                }
                if meta.hidden {
                    xml.attribute("hidden", "1")?;
                }
                if meta.outline_level > 0 {
                    xml.attribute_u32("outlineLevel", meta.outline_level as u32)?;
                }
            }
            xml.close_start_tag()?;

            while idx < cells.len() && cells[idx].0 == row {
                let (r, col, cell) = cells[idx];
                self.write_cell(xml, r, col, cell)?;
                idx += 1;
            }

            xml.end_element("row")?;
        }

        xml.end_element("sheetData")?;
        Ok(())
    }

    fn write_cell<W: Write>(&self, xml: &mut XmlStreamWriter<W>, row: u32, col: u32, cell: &Cell) -> Result<()> {
        let reference = Self::cell_ref(row, col)?;
        xml.start_element("c")?;
        xml.attribute("r", &reference)?;
        if let Some(format_id) = cell.format_id() {
            xml.attribute_u32("s", format_id)?;
        }

        match cell.as_ref() {
            CellRef::Empty => {
                xml.close_empty_element()?;
                return Ok(());
            }
            CellRef::Number(n) => {
                xml.close_start_tag()?;
                xml.start_element("v")?;
                xml.close_start_tag()?;
                xml.write_text(&n.to_string())?;
                xml.end_element("v")?;
            }
            CellRef::Boolean(b) => {
                xml.attribute("t", "b")?;
                xml.close_start_tag()?;
                xml.start_element("v")?;
                xml.close_start_tag()?;
                xml.write_text(if b { "1" } else { "0" })?;
                xml.end_element("v")?;
            }
            CellRef::InlineString(s) => {
                xml.attribute("t", "inlineStr")?;
                xml.close_start_tag()?;
                xml.start_element("is")?;
                xml.close_start_tag()?;
                xml.start_element("t")?;
                xml.close_start_tag()?;
                xml.write_text(s)?;
                xml.end_element("t")?;
                xml.end_element("is")?;
            }
            CellRef::SharedStringRef(id) => {
                xml.attribute("t", "s")?;
                xml.close_start_tag()?;
                xml.start_element("v")?;
                xml.close_start_tag()?;
                xml.write_text(&id.to_string())?;
                xml.end_element("v")?;
            }
            CellRef::Error(e) => {
                xml.attribute("t", "e")?;
                xml.close_start_tag()?;
                xml.start_element("v")?;
                xml.close_start_tag()?;
                xml.write_text(e)?;
                xml.end_element("v")?;
            }
            CellRef::Formula { expr, result } => {
                xml.close_start_tag()?;
                xml.start_element("f")?;
                xml.close_start_tag()?;
                xml.write_text(expr)?;
                xml.end_element("f")?;
                if let Some(r) = result {
                    xml.start_element("v")?;
                    xml.close_start_tag()?;
                    xml.write_text(&r.to_string())?;
                    xml.end_element("v")?;
                }
            }
            CellRef::SharedFormulaRef { group, result } => {
                xml.close_start_tag()?;
                xml.start_element("f")?;
                xml.attribute("t", "shared")?;
                xml.attribute_u32("si", group)?;
                xml.close_empty_element()?;
                if let Some(r) = result {
                    xml.start_element("v")?;
                    xml.close_start_tag()?;
                    xml.write_text(&r.to_string())?;
                    xml.end_element("v")?;
                }
            }
        }

        xml.end_element("c")?;
        Ok(())
    }

    fn write_merge_cells<W: Write>(&self, xml: &mut XmlStreamWriter<W>) -> Result<()> {
        if self.merges.is_empty() {
            return Ok(());
        }
        xml.start_element("mergeCells")?;
        xml.attribute_u32("count", self.merges.len() as u32)?;
        xml.close_start_tag()?;
        for rect in &self.merges {
            let reference = format!(
                "{}:{}",
                Self::cell_ref(rect.row_start, rect.col_start)?,
                Self::cell_ref(rect.row_end, rect.col_end)?
            );
            xml.start_element("mergeCell")?;
            xml.attribute("ref", &reference)?;
            xml.close_empty_element()?;
        }
        xml.end_element("mergeCells")?;
        Ok(())
    }

    fn write_hyperlinks<W: Write>(
        &self,
        xml: &mut XmlStreamWriter<W>,
        hyperlink_rel_ids: &[String],
    ) -> Result<()> {
        if self.hyperlinks.is_empty() {
            return Ok(());
        }
        if hyperlink_rel_ids.len() != self.hyperlinks.len() {
            return Err(Error::InvalidState(format!(
                "expected {} hyperlink relationship ids, got {}",
                self.hyperlinks.len(),
                hyperlink_rel_ids.len()
            )));
        }
        xml.start_element("hyperlinks")?;
        xml.close_start_tag()?;
        for (link, rel_id) in self.hyperlinks.iter().zip(hyperlink_rel_ids) {
            let reference = Self::cell_ref(link.row, link.col)?;
            xml.start_element("hyperlink")?;
            xml.attribute("ref", &reference)?;
            xml.attribute("r:id", rel_id)?;
            if let Some(tooltip) = &link.tooltip {
                xml.attribute("tooltip", tooltip)?;
            }
            xml.close_empty_element()?;
        }
        xml.end_element("hyperlinks")?;
        Ok(())
    }

    fn write_page_settings<W: Write>(&self, xml: &mut XmlStreamWriter<W>) -> Result<()> {
        let Some(settings) = &self.print_settings else {
            return Ok(());
        };
        xml.start_element("pageSetup")?;
        xml.attribute(
            "orientation",
            if settings.orientation_landscape {
                "landscape"
            } else {
                "portrait"
            },
        )?;
        if let Some(w) = settings.fit_to_width {
            xml.attribute_u32("fitToWidth", w)?;
        }
        if let Some(h) = settings.fit_to_height {
            xml.attribute_u32("fitToHeight", h)?;
        }
        xml.close_empty_element()?;
        Ok(())
    }
}

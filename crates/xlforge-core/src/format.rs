//! Format descriptor and format repository.
//!
//! A [`FormatDescriptor`] is an immutable, hashable value describing the full
//! visual style of a cell (font, fill, border, number format, alignment,
//! protection). A [`FormatRepository`] interns descriptors to dense ids so
//! that cells carry a `u32` instead of a full style value, and reconstructs
//! the `fonts`/`fills`/`borders`/`cellXfs` sub-tables `xl/styles.xml` expects
//! on save, deduplicating each sub-component separately the way a real
//! spreadsheet writer does.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;

use xlforge_xml::styles::{
    Alignment, BoolVal, Border, BorderSide, Borders, CellStyle, CellStyleXfs, CellStyles, CellXfs,
    Color as XmlColor, Fill, Fills, Font as XmlFont, FontFamily, FontName, FontScheme, FontSize,
    Fonts, NumFmt, NumFmts, PatternFill, Protection as XmlProtection, StyleSheet, Underline, Xf,
};

use crate::error::{Error, Result};

/// Maximum number of cross-reference (`cellXf`) entries a stylesheet may
/// hold, matching Excel's own limit.
pub const MAX_CELL_XFS: usize = 65_430;

/// First numFmtId available for a custom (non-built-in) number format.
pub const CUSTOM_NUM_FMT_BASE: u32 = 164;

/// An RGB/theme/indexed color value, independent of the XML attribute shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Color {
    #[default]
    Automatic,
    Rgb(String),
    Indexed(u32),
    Theme { index: u32, tint_millis: i32 },
}

impl Color {
    fn to_xml(&self) -> Option<XmlColor> {
        match self {
            Color::Automatic => None,
            Color::Rgb(rgb) => Some(XmlColor {
                auto: None,
                indexed: None,
                rgb: Some(rgb.clone()),
                theme: None,
                tint: None,
            }),
            Color::Indexed(idx) => Some(XmlColor {
                auto: None,
                indexed: Some(*idx),
                rgb: None,
                theme: None,
                tint: None,
            }),
            Color::Theme { index, tint_millis } => Some(XmlColor {
                auto: None,
                indexed: None,
                rgb: None,
                theme: Some(*index),
                tint: if *tint_millis == 0 {
                    None
                } else {
                    Some(*tint_millis as f64 / 1000.0)
                },
            }),
        }
    }
}

/// Underline style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UnderlineStyle {
    #[default]
    None,
    Single,
    Double,
    SingleAccounting,
    DoubleAccounting,
}

impl UnderlineStyle {
    fn as_xml_val(&self) -> Option<&'static str> {
        match self {
            UnderlineStyle::None => None,
            UnderlineStyle::Single => Some("single"),
            UnderlineStyle::Double => Some("double"),
            UnderlineStyle::SingleAccounting => Some("singleAccounting"),
            UnderlineStyle::DoubleAccounting => Some("doubleAccounting"),
        }
    }
}

/// Font sub-component of a format descriptor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FontSpec {
    pub name: String,
    /// Size in half-points worth of precision, stored as an integer to keep
    /// the descriptor exactly hashable (no `f64` in the hash path).
    pub size_half_points: u32,
    pub bold: bool,
    pub italic: bool,
    pub underline: UnderlineStyle,
    pub strikeout: bool,
    pub color: Color,
    pub family: u32,
    pub charset: Option<u32>,
}

impl Eq for FontSpec {}
impl Hash for FontSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.size_half_points.hash(state);
        self.bold.hash(state);
        self.italic.hash(state);
        self.underline.hash(state);
        self.strikeout.hash(state);
        self.color.hash(state);
        self.family.hash(state);
        self.charset.hash(state);
    }
}

impl FontSpec {
    pub fn size(&self) -> f64 {
        self.size_half_points as f64 / 2.0
    }

    fn default_calibri11() -> Self {
        Self {
            name: "Calibri".to_string(),
            size_half_points: 22,
            family: 2,
            ..Default::default()
        }
    }

    fn to_xml(&self) -> XmlFont {
        XmlFont {
            b: self.bold.then_some(BoolVal { val: None }),
            i: self.italic.then_some(BoolVal { val: None }),
            strike: self.strikeout.then_some(BoolVal { val: None }),
            u: self
                .underline
                .as_xml_val()
                .map(|v| Underline { val: Some(v.to_string()) }),
            sz: Some(FontSize { val: self.size() }),
            color: self.color.to_xml(),
            name: Some(FontName {
                val: self.name.clone(),
            }),
            family: Some(FontFamily { val: self.family }),
            scheme: None,
        }
    }
}

/// Fill pattern sub-component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FillSpec {
    pub pattern: String,
    pub fg_color: Color,
    pub bg_color: Color,
}

impl FillSpec {
    fn none() -> Self {
        Self {
            pattern: "none".to_string(),
            ..Default::default()
        }
    }

    fn to_xml(&self) -> Fill {
        Fill {
            pattern_fill: Some(PatternFill {
                pattern_type: Some(self.pattern.clone()),
                fg_color: self.fg_color.to_xml(),
                bg_color: self.bg_color.to_xml(),
            }),
            gradient_fill: None,
        }
    }
}

/// One edge of a border.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BorderEdge {
    pub style: Option<String>,
    pub color: Color,
}

impl BorderEdge {
    fn to_xml(&self) -> Option<BorderSide> {
        self.style.as_ref().map(|style| BorderSide {
            style: Some(style.clone()),
            color: self.color.to_xml(),
        })
    }
}

/// Border sub-component: four sides plus a diagonal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BorderSpec {
    pub left: BorderEdge,
    pub right: BorderEdge,
    pub top: BorderEdge,
    pub bottom: BorderEdge,
    pub diagonal: BorderEdge,
    pub diagonal_up: bool,
    pub diagonal_down: bool,
}

impl BorderSpec {
    fn to_xml(&self) -> Border {
        Border {
            diagonal_up: self.diagonal_up.then_some(true),
            diagonal_down: self.diagonal_down.then_some(true),
            left: self.left.to_xml(),
            right: self.right.to_xml(),
            top: self.top.to_xml(),
            bottom: self.bottom.to_xml(),
            diagonal: self.diagonal.to_xml(),
        }
    }
}

/// A number format: either a built-in id or a custom format string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NumberFormat {
    Builtin(u32),
    Custom(String),
}

impl Default for NumberFormat {
    fn default() -> Self {
        NumberFormat::Builtin(0)
    }
}

/// Horizontal text alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HorizontalAlign {
    #[default]
    General,
    Left,
    Center,
    Right,
    Fill,
    Justify,
    CenterAcrossSelection,
}

impl HorizontalAlign {
    fn as_xml_val(&self) -> Option<&'static str> {
        match self {
            HorizontalAlign::General => None,
            HorizontalAlign::Left => Some("left"),
            HorizontalAlign::Center => Some("center"),
            HorizontalAlign::Right => Some("right"),
            HorizontalAlign::Fill => Some("fill"),
            HorizontalAlign::Justify => Some("justify"),
            HorizontalAlign::CenterAcrossSelection => Some("centerContinuous"),
        }
    }
}

/// Vertical text alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VerticalAlign {
    #[default]
    Bottom,
    Top,
    Center,
    Justify,
}

impl VerticalAlign {
    fn as_xml_val(&self) -> Option<&'static str> {
        match self {
            VerticalAlign::Bottom => None,
            VerticalAlign::Top => Some("top"),
            VerticalAlign::Center => Some("center"),
            VerticalAlign::Justify => Some("justify"),
        }
    }
}

/// Alignment sub-fields of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct AlignmentSpec {
    pub horizontal: HorizontalAlign,
    pub vertical: VerticalAlign,
    pub wrap_text: bool,
    pub rotation: i32,
    pub indent: u32,
    pub shrink_to_fit: bool,
}

impl AlignmentSpec {
    fn is_default(&self) -> bool {
        *self == Self::default()
    }

    fn to_xml(&self) -> Option<Alignment> {
        if self.is_default() {
            return None;
        }
        Some(Alignment {
            horizontal: self.horizontal.as_xml_val().map(str::to_string),
            vertical: self.vertical.as_xml_val().map(str::to_string),
            wrap_text: self.wrap_text.then_some(true),
            text_rotation: (self.rotation != 0).then_some(self.rotation as u32),
            indent: (self.indent != 0).then_some(self.indent),
            shrink_to_fit: self.shrink_to_fit.then_some(true),
        })
    }
}

/// Protection sub-fields of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtectionSpec {
    pub locked: bool,
    pub hidden: bool,
}

impl Default for ProtectionSpec {
    fn default() -> Self {
        Self {
            locked: true,
            hidden: false,
        }
    }
}

impl ProtectionSpec {
    fn is_default(&self) -> bool {
        *self == Self::default()
    }

    fn to_xml(&self) -> Option<XmlProtection> {
        if self.is_default() {
            return None;
        }
        Some(XmlProtection {
            locked: Some(self.locked),
            hidden: Some(self.hidden),
        })
    }
}

/// An immutable, hashable cell style value.
///
/// Equality and the precomputed hash cover every field; two descriptors with
/// identical fields are always interned to the same id (invariant in
/// `spec.md` §8.2).
#[derive(Debug, Clone)]
pub struct FormatDescriptor {
    pub font: FontSpec,
    pub fill: FillSpec,
    pub border: BorderSpec,
    pub number_format: NumberFormat,
    pub alignment: AlignmentSpec,
    pub protection: ProtectionSpec,
    hash: u64,
}

impl PartialEq for FormatDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.font == other.font
            && self.fill == other.fill
            && self.border == other.border
            && self.number_format == other.number_format
            && self.alignment == other.alignment
            && self.protection == other.protection
    }
}
impl Eq for FormatDescriptor {}

impl Hash for FormatDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // The descriptor's own precomputed hash already summarizes every
        // field; re-hashing the fields here would just duplicate work every
        // time the repository probes its index.
        self.hash.hash(state);
    }
}

impl Default for FormatDescriptor {
    fn default() -> Self {
        Self::new(
            FontSpec::default_calibri11(),
            FillSpec::none(),
            BorderSpec::default(),
            NumberFormat::default(),
            AlignmentSpec::default(),
            ProtectionSpec::default(),
        )
    }
}

impl FormatDescriptor {
    pub fn new(
        font: FontSpec,
        fill: FillSpec,
        border: BorderSpec,
        number_format: NumberFormat,
        alignment: AlignmentSpec,
        protection: ProtectionSpec,
    ) -> Self {
        let mut d = Self {
            font,
            fill,
            border,
            number_format,
            alignment,
            protection,
            hash: 0,
        };
        d.hash = d.compute_hash();
        d
    }

    fn compute_hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        let mut hasher = DefaultHasher::new();
        self.font.hash(&mut hasher);
        self.fill.hash(&mut hasher);
        self.border.hash(&mut hasher);
        self.number_format.hash(&mut hasher);
        self.alignment.hash(&mut hasher);
        self.protection.hash(&mut hasher);
        hasher.finish()
    }

    fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Deduplication statistics for a [`FormatRepository`].
#[derive(Debug, Clone, Copy, Default)]
pub struct InternStats {
    pub requests: u64,
    pub unique: u64,
}

struct RepositoryState {
    descriptors: Vec<FormatDescriptor>,
    index: HashMap<u64, Vec<u32>>,
    stats: InternStats,
}

/// Bidirectional interning structure mapping format descriptors to dense ids.
///
/// `intern` is safe to call from multiple threads concurrently (spec.md §5);
/// a single [`RwLock`] over the dense array and hash index is the mutex-based
/// implementation the spec explicitly allows.
pub struct FormatRepository {
    state: RwLock<RepositoryState>,
}

impl Default for FormatRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatRepository {
    pub fn new() -> Self {
        let default_descriptor = FormatDescriptor::default();
        let mut index = HashMap::new();
        index.insert(default_descriptor.hash, vec![0]);
        Self {
            state: RwLock::new(RepositoryState {
                descriptors: vec![default_descriptor],
                index,
                stats: InternStats {
                    requests: 1,
                    unique: 1,
                },
            }),
        }
    }

    /// Intern a descriptor, returning its stable dense id. Idempotent: the
    /// same descriptor always maps to the same id for the life of the
    /// repository.
    pub fn intern(&self, descriptor: FormatDescriptor) -> u32 {
        let mut state = self.state.write().expect("format repository poisoned");
        state.stats.requests += 1;

        if let Some(candidates) = state.index.get(&descriptor.hash) {
            for &id in candidates {
                if state.descriptors[id as usize] == descriptor {
                    return id;
                }
            }
        }

        let id = state.descriptors.len() as u32;
        state.index.entry(descriptor.hash).or_default().push(id);
        state.descriptors.push(descriptor);
        state.stats.unique += 1;
        id
    }

    /// Insert a descriptor at a specific id, used only when reconstructing a
    /// repository from an already-loaded `xl/styles.xml` so ids match the
    /// source file's cross-reference order exactly.
    pub fn intern_with_id(&self, id: u32, descriptor: FormatDescriptor) {
        let mut state = self.state.write().expect("format repository poisoned");
        let idx = id as usize;
        if idx >= state.descriptors.len() {
            state
                .descriptors
                .resize(idx + 1, FormatDescriptor::default());
        }
        state.index.entry(descriptor.hash).or_default().push(id);
        state.descriptors[idx] = descriptor;
        state.stats.unique = state.descriptors.len() as u64;
    }

    pub fn get(&self, id: u32) -> Option<FormatDescriptor> {
        let state = self.state.read().expect("format repository poisoned");
        state.descriptors.get(id as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().expect("format repository poisoned").descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> InternStats {
        self.state.read().expect("format repository poisoned").stats
    }

    /// Iterate all descriptors in insertion order.
    pub fn iter(&self) -> Vec<FormatDescriptor> {
        self.state.read().expect("format repository poisoned").descriptors.clone()
    }

    /// Reconstruct the four `xl/styles.xml` sub-tables plus the custom
    /// number-format table, deduplicating each sub-component separately.
    pub fn build_stylesheet(&self) -> StyleSheet {
        let descriptors = self.iter();

        let mut fonts: Vec<XmlFont> = Vec::new();
        let mut font_ids: HashMap<FontSpec, u32> = HashMap::new();
        let mut fills: Vec<Fill> = Vec::new();
        let mut fill_ids: HashMap<FillSpec, u32> = HashMap::new();
        let mut borders: Vec<Border> = Vec::new();
        let mut border_ids: HashMap<BorderSpec, u32> = HashMap::new();
        let mut custom_num_fmts: Vec<NumFmt> = Vec::new();
        let mut custom_num_fmt_ids: HashMap<String, u32> = HashMap::new();
        let mut next_custom_id = CUSTOM_NUM_FMT_BASE;

        let mut xfs: Vec<Xf> = Vec::with_capacity(descriptors.len());

        for descriptor in &descriptors {
            let font_id = *font_ids.entry(descriptor.font.clone()).or_insert_with(|| {
                let id = fonts.len() as u32;
                fonts.push(descriptor.font.to_xml());
                id
            });
            let fill_id = *fill_ids.entry(descriptor.fill.clone()).or_insert_with(|| {
                let id = fills.len() as u32;
                fills.push(descriptor.fill.to_xml());
                id
            });
            let border_id = *border_ids.entry(descriptor.border.clone()).or_insert_with(|| {
                let id = borders.len() as u32;
                borders.push(descriptor.border.to_xml());
                id
            });
            let num_fmt_id = match &descriptor.number_format {
                NumberFormat::Builtin(id) => *id,
                NumberFormat::Custom(code) => {
                    *custom_num_fmt_ids.entry(code.clone()).or_insert_with(|| {
                        let id = next_custom_id;
                        next_custom_id += 1;
                        custom_num_fmts.push(NumFmt {
                            num_fmt_id: id,
                            format_code: code.clone(),
                        });
                        id
                    })
                }
            };

            let apply = !descriptor.is_default();
            xfs.push(Xf {
                num_fmt_id: Some(num_fmt_id),
                font_id: Some(font_id),
                fill_id: Some(fill_id),
                border_id: Some(border_id),
                xf_id: Some(0),
                apply_number_format: apply.then_some(true),
                apply_font: apply.then_some(true),
                apply_fill: apply.then_some(true),
                apply_border: apply.then_some(true),
                apply_alignment: (!descriptor.alignment.is_default()).then_some(true),
                alignment: descriptor.alignment.to_xml(),
                protection: descriptor.protection.to_xml(),
            });
        }

        // Fixed fill slots 0/1 (none / gray125) are always present even if
        // unreferenced, matching the minimum Excel requires.
        if fill_ids.is_empty() {
            fills.push(FillSpec::none().to_xml());
            fills.push(Fill {
                pattern_fill: Some(PatternFill {
                    pattern_type: Some("gray125".to_string()),
                    fg_color: None,
                    bg_color: None,
                }),
                gradient_fill: None,
            });
        }
        if border_ids.is_empty() {
            borders.push(BorderSpec::default().to_xml());
        }
        if font_ids.is_empty() {
            fonts.push(FontSpec::default_calibri11().to_xml());
        }

        StyleSheet {
            xmlns: xlforge_xml::namespaces::SPREADSHEET_ML.to_string(),
            num_fmts: (!custom_num_fmts.is_empty()).then(|| NumFmts {
                count: Some(custom_num_fmts.len() as u32),
                num_fmts: custom_num_fmts,
            }),
            fonts: Fonts {
                count: Some(fonts.len() as u32),
                fonts,
            },
            fills: Fills {
                count: Some(fills.len() as u32),
                fills,
            },
            borders: Borders {
                count: Some(borders.len() as u32),
                borders,
            },
            cell_style_xfs: Some(CellStyleXfs {
                count: Some(1),
                xfs: vec![Xf {
                    num_fmt_id: Some(0),
                    font_id: Some(0),
                    fill_id: Some(0),
                    border_id: Some(0),
                    xf_id: None,
                    apply_number_format: None,
                    apply_font: None,
                    apply_fill: None,
                    apply_border: None,
                    apply_alignment: None,
                    alignment: None,
                    protection: None,
                }],
            }),
            cell_xfs: CellXfs {
                count: Some(xfs.len() as u32),
                xfs,
            },
            cell_styles: Some(CellStyles {
                count: Some(1),
                cell_styles: vec![CellStyle {
                    name: "Normal".to_string(),
                    xf_id: 0,
                    builtin_id: Some(0),
                }],
            }),
            dxfs: None,
            table_styles: None,
        }
    }

    /// Check the `cellXfs` growth against Excel's hard limit before a caller
    /// commits to interning a new descriptor.
    pub fn check_capacity(&self) -> Result<()> {
        if self.len() >= MAX_CELL_XFS {
            return Err(Error::Unsupported(format!(
                "cell style table exceeds the maximum of {MAX_CELL_XFS} entries"
            )));
        }
        Ok(())
    }
}

fn color_from_xml(color: &Option<XmlColor>) -> Color {
    let Some(color) = color else {
        return Color::Automatic;
    };
    if let Some(rgb) = &color.rgb {
        Color::Rgb(rgb.clone())
    } else if let Some(indexed) = color.indexed {
        Color::Indexed(indexed)
    } else if let Some(theme) = color.theme {
        Color::Theme {
            index: theme,
            tint_millis: (color.tint.unwrap_or(0.0) * 1000.0).round() as i32,
        }
    } else {
        Color::Automatic
    }
}

fn font_from_xml(font: &XmlFont) -> FontSpec {
    FontSpec {
        name: font
            .name
            .as_ref()
            .map(|n| n.val.clone())
            .unwrap_or_else(|| "Calibri".to_string()),
        size_half_points: font
            .sz
            .as_ref()
            .map(|s| (s.val * 2.0).round() as u32)
            .unwrap_or(22),
        bold: font.b.is_some(),
        italic: font.i.is_some(),
        underline: match font.u.as_ref().and_then(|u| u.val.as_deref()) {
            Some("single") => UnderlineStyle::Single,
            Some("double") => UnderlineStyle::Double,
            Some("singleAccounting") => UnderlineStyle::SingleAccounting,
            Some("doubleAccounting") => UnderlineStyle::DoubleAccounting,
            _ => UnderlineStyle::None,
        },
        strikeout: font.strike.is_some(),
        color: color_from_xml(&font.color),
        family: font.family.as_ref().map(|f| f.val).unwrap_or(2),
        charset: None,
    }
}

fn fill_from_xml(fill: &Fill) -> FillSpec {
    match &fill.pattern_fill {
        Some(pf) => FillSpec {
            pattern: pf.pattern_type.clone().unwrap_or_else(|| "none".to_string()),
            fg_color: color_from_xml(&pf.fg_color),
            bg_color: color_from_xml(&pf.bg_color),
        },
        None => FillSpec::none(),
    }
}

fn border_edge_from_xml(side: &Option<BorderSide>) -> BorderEdge {
    match side {
        Some(side) => BorderEdge {
            style: side.style.clone(),
            color: color_from_xml(&side.color),
        },
        None => BorderEdge::default(),
    }
}

fn border_from_xml(border: &Border) -> BorderSpec {
    BorderSpec {
        left: border_edge_from_xml(&border.left),
        right: border_edge_from_xml(&border.right),
        top: border_edge_from_xml(&border.top),
        bottom: border_edge_from_xml(&border.bottom),
        diagonal: border_edge_from_xml(&border.diagonal),
        diagonal_up: border.diagonal_up.unwrap_or(false),
        diagonal_down: border.diagonal_down.unwrap_or(false),
    }
}

fn alignment_from_xml(alignment: &Option<Alignment>) -> AlignmentSpec {
    let Some(alignment) = alignment else {
        return AlignmentSpec::default();
    };
    AlignmentSpec {
        horizontal: match alignment.horizontal.as_deref() {
            Some("left") => HorizontalAlign::Left,
            Some("center") => HorizontalAlign::Center,
            Some("right") => HorizontalAlign::Right,
            Some("fill") => HorizontalAlign::Fill,
            Some("justify") => HorizontalAlign::Justify,
            Some("centerContinuous") => HorizontalAlign::CenterAcrossSelection,
            _ => HorizontalAlign::General,
        },
        vertical: match alignment.vertical.as_deref() {
            Some("top") => VerticalAlign::Top,
            Some("center") => VerticalAlign::Center,
            Some("justify") => VerticalAlign::Justify,
            _ => VerticalAlign::Bottom,
        },
        wrap_text: alignment.wrap_text.unwrap_or(false),
        rotation: alignment.text_rotation.unwrap_or(0) as i32,
        indent: alignment.indent.unwrap_or(0),
        shrink_to_fit: alignment.shrink_to_fit.unwrap_or(false),
    }
}

fn protection_from_xml(protection: &Option<XmlProtection>) -> ProtectionSpec {
    match protection {
        Some(p) => ProtectionSpec {
            locked: p.locked.unwrap_or(true),
            hidden: p.hidden.unwrap_or(false),
        },
        None => ProtectionSpec::default(),
    }
}

/// Reconstruct a [`FormatRepository`] from a parsed `xl/styles.xml`,
/// assembling one descriptor per `cellXfs` entry from its referenced
/// font/fill/border/numFmt sub-tables and inserting it at the same id the
/// source file gave it, per the package reader's load path.
pub fn load_stylesheet(repo: &FormatRepository, sheet: &StyleSheet) {
    let custom_num_fmts: HashMap<u32, String> = sheet
        .num_fmts
        .iter()
        .flat_map(|n| n.num_fmts.iter())
        .map(|f| (f.num_fmt_id, f.format_code.clone()))
        .collect();

    for (id, xf) in sheet.cell_xfs.xfs.iter().enumerate() {
        let font = xf
            .font_id
            .and_then(|i| sheet.fonts.fonts.get(i as usize))
            .map(font_from_xml)
            .unwrap_or_else(FontSpec::default_calibri11);
        let fill = xf
            .fill_id
            .and_then(|i| sheet.fills.fills.get(i as usize))
            .map(fill_from_xml)
            .unwrap_or_else(FillSpec::none);
        let border = xf
            .border_id
            .and_then(|i| sheet.borders.borders.get(i as usize))
            .map(border_from_xml)
            .unwrap_or_default();
        let number_format = match xf.num_fmt_id {
            Some(num_fmt_id) if num_fmt_id >= CUSTOM_NUM_FMT_BASE => custom_num_fmts
                .get(&num_fmt_id)
                .map(|code| NumberFormat::Custom(code.clone()))
                .unwrap_or(NumberFormat::Builtin(num_fmt_id)),
            Some(num_fmt_id) => NumberFormat::Builtin(num_fmt_id),
            None => NumberFormat::default(),
        };

        let descriptor = FormatDescriptor::new(
            font,
            fill,
            border,
            number_format,
            alignment_from_xml(&xf.alignment),
            protection_from_xml(&xf.protection),
        );
        repo.intern_with_id(id as u32, descriptor);
    }
}

/// Maps format ids from a source repository into a destination repository,
/// eagerly interning every source descriptor so the mapping is available in
/// one lookup. Used when copying a sheet (and its per-cell/per-column/per-row
/// format ids) from one workbook into another.
pub struct StyleTransferContext {
    mapping: HashMap<u32, u32>,
}

impl StyleTransferContext {
    pub fn build(source: &FormatRepository, destination: &FormatRepository) -> Self {
        let mut mapping = HashMap::new();
        for (source_id, descriptor) in source.iter().into_iter().enumerate() {
            let dest_id = destination.intern(descriptor);
            mapping.insert(source_id as u32, dest_id);
        }
        Self { mapping }
    }

    pub fn map(&self, source_id: u32) -> u32 {
        self.mapping.get(&source_id).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_descriptor_is_id_zero() {
        let repo = FormatRepository::new();
        let id = repo.intern(FormatDescriptor::default());
        assert_eq!(id, 0);
    }

    #[test]
    fn intern_deduplicates_identical_descriptors() {
        let repo = FormatRepository::new();
        let mut font = FontSpec::default_calibri11();
        font.bold = true;
        let d1 = FormatDescriptor::new(
            font.clone(),
            FillSpec::none(),
            BorderSpec::default(),
            NumberFormat::default(),
            AlignmentSpec::default(),
            ProtectionSpec::default(),
        );
        let d2 = FormatDescriptor::new(
            font,
            FillSpec::none(),
            BorderSpec::default(),
            NumberFormat::default(),
            AlignmentSpec::default(),
            ProtectionSpec::default(),
        );
        let id1 = repo.intern(d1);
        let id2 = repo.intern(d2);
        assert_eq!(id1, id2);
        assert_ne!(id1, 0);
    }

    #[test]
    fn distinct_descriptors_get_distinct_ids() {
        let repo = FormatRepository::new();
        let mut bold = FontSpec::default_calibri11();
        bold.bold = true;
        let mut italic = FontSpec::default_calibri11();
        italic.italic = true;

        let id_bold = repo.intern(FormatDescriptor::new(
            bold,
            FillSpec::none(),
            BorderSpec::default(),
            NumberFormat::default(),
            AlignmentSpec::default(),
            ProtectionSpec::default(),
        ));
        let id_italic = repo.intern(FormatDescriptor::new(
            italic,
            FillSpec::none(),
            BorderSpec::default(),
            NumberFormat::default(),
            AlignmentSpec::default(),
            ProtectionSpec::default(),
        ));
        assert_ne!(id_bold, id_italic);
    }

    #[test]
    fn build_stylesheet_dedupes_fonts_across_descriptors() {
        let repo = FormatRepository::new();
        let mut bold14 = FontSpec::default_calibri11();
        bold14.bold = true;
        bold14.size_half_points = 28;

        let d1 = FormatDescriptor::new(
            bold14.clone(),
            FillSpec::none(),
            BorderSpec::default(),
            NumberFormat::Builtin(0),
            AlignmentSpec::default(),
            ProtectionSpec::default(),
        );
        let d2 = FormatDescriptor::new(
            bold14,
            FillSpec::none(),
            BorderSpec::default(),
            NumberFormat::Builtin(1),
            AlignmentSpec::default(),
            ProtectionSpec::default(),
        );
        repo.intern(d1);
        repo.intern(d2);

        let sheet = repo.build_stylesheet();
        // default font + one shared bold-14 font == 2, not 3
        assert_eq!(sheet.fonts.fonts.len(), 2);
        assert_eq!(sheet.cell_xfs.xfs.len(), 3); // default + d1 + d2
    }

    #[test]
    fn custom_number_formats_start_at_164() {
        let repo = FormatRepository::new();
        let d = FormatDescriptor::new(
            FontSpec::default_calibri11(),
            FillSpec::none(),
            BorderSpec::default(),
            NumberFormat::Custom("0.0000".to_string()),
            AlignmentSpec::default(),
            ProtectionSpec::default(),
        );
        repo.intern(d);
        let sheet = repo.build_stylesheet();
        let num_fmts = sheet.num_fmts.unwrap();
        assert_eq!(num_fmts.num_fmts[0].num_fmt_id, CUSTOM_NUM_FMT_BASE);
    }

    #[test]
    fn intern_with_id_preserves_source_order() {
        let repo = FormatRepository::new();
        let mut bold = FontSpec::default_calibri11();
        bold.bold = true;
        repo.intern_with_id(
            5,
            FormatDescriptor::new(
                bold,
                FillSpec::none(),
                BorderSpec::default(),
                NumberFormat::default(),
                AlignmentSpec::default(),
                ProtectionSpec::default(),
            ),
        );
        assert!(repo.get(5).is_some());
        assert_eq!(repo.len(), 6);
    }

    #[test]
    fn style_transfer_context_maps_ids_across_repositories() {
        let source = FormatRepository::new();
        let mut bold = FontSpec::default_calibri11();
        bold.bold = true;
        let src_id = source.intern(FormatDescriptor::new(
            bold,
            FillSpec::none(),
            BorderSpec::default(),
            NumberFormat::default(),
            AlignmentSpec::default(),
            ProtectionSpec::default(),
        ));

        let dest = FormatRepository::new();
        let ctx = StyleTransferContext::build(&source, &dest);
        let mapped = ctx.map(src_id);
        assert_eq!(dest.get(mapped).unwrap(), source.get(src_id).unwrap());
    }

    #[test]
    fn stats_track_requests_and_unique_descriptors() {
        let repo = FormatRepository::new();
        let d = FormatDescriptor::default();
        repo.intern(d.clone());
        repo.intern(d);
        let stats = repo.stats();
        assert_eq!(stats.requests, 3); // 1 at construction + 2 calls
        assert_eq!(stats.unique, 1);
    }

    #[test]
    fn load_stylesheet_round_trips_build_stylesheet() {
        let source = FormatRepository::new();
        let mut bold14 = FontSpec::default_calibri11();
        bold14.bold = true;
        bold14.size_half_points = 28;
        let d1 = FormatDescriptor::new(
            bold14,
            FillSpec::none(),
            BorderSpec::default(),
            NumberFormat::Custom("0.0000".to_string()),
            AlignmentSpec::default(),
            ProtectionSpec::default(),
        );
        source.intern(d1.clone());

        let sheet = source.build_stylesheet();
        let dest = FormatRepository::new();
        load_stylesheet(&dest, &sheet);

        assert_eq!(dest.len(), source.len());
        let restored = dest.get(1).unwrap();
        assert_eq!(restored.font.bold, true);
        assert_eq!(restored.font.size_half_points, 28);
        assert_eq!(restored.number_format, NumberFormat::Custom("0.0000".to_string()));
    }

    #[test]
    fn load_stylesheet_recovers_alignment_and_protection() {
        let source = FormatRepository::new();
        let d = FormatDescriptor::new(
            FontSpec::default_calibri11(),
            FillSpec::none(),
            BorderSpec::default(),
            NumberFormat::default(),
            AlignmentSpec {
                horizontal: HorizontalAlign::Center,
                wrap_text: true,
                ..Default::default()
            },
            ProtectionSpec {
                locked: false,
                hidden: true,
            },
        );
        source.intern(d);
        let sheet = source.build_stylesheet();

        let dest = FormatRepository::new();
        load_stylesheet(&dest, &sheet);
        let restored = dest.get(1).unwrap();
        assert_eq!(restored.alignment.horizontal, HorizontalAlign::Center);
        assert!(restored.alignment.wrap_text);
        assert!(!restored.protection.locked);
        assert!(restored.protection.hidden);
    }
}

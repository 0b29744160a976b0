//! Compact cell representation.
//!
//! A [`Cell`] is a tagged value sized to fit in roughly one machine word plus
//! an optional owning pointer to a [`CellExtension`]. The internal tag
//! distinguishes `InlineString` from `SharedStringRef` and `Formula` from
//! `SharedFormulaRef`, but both pairs present as `String`/`Formula` at the
//! public [`CellView`] API (§3 "the external alphabet").

use std::fmt;

/// Maximum length of a string stored inline in a cell without allocating a
/// [`CellExtension`].
pub const INLINE_STRING_CAPACITY: usize = 15;

/// Internal tag distinguishing the cases a [`Cell`] can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Empty,
    Number,
    InlineString,
    SharedStringRef,
    Boolean,
    Formula,
    SharedFormulaRef,
    Error,
}

/// Inline payload, shaped to avoid a heap allocation for the common cases.
#[derive(Debug, Clone, Copy)]
union Payload {
    number: f64,
    string_id: u32,
    boolean: bool,
    inline_string: InlineStr,
    error_code: u32,
}

/// A fixed-capacity, NUL-terminated inline string buffer.
#[derive(Debug, Clone, Copy)]
struct InlineStr {
    len: u8,
    bytes: [u8; INLINE_STRING_CAPACITY],
}

impl InlineStr {
    fn new(s: &str) -> Self {
        debug_assert!(s.len() <= INLINE_STRING_CAPACITY);
        let mut bytes = [0u8; INLINE_STRING_CAPACITY];
        bytes[..s.len()].copy_from_slice(s.as_bytes());
        Self {
            len: s.len() as u8,
            bytes,
        }
    }

    fn as_str(&self) -> &str {
        // Safety: constructed only from a valid `&str` slice of this exact length.
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }
}

/// Heap-allocated data a cell only needs in the uncommon cases: long strings,
/// formula text, hyperlinks, comments, a cached formula result, or a shared
/// formula group.
#[derive(Debug, Clone, Default)]
pub struct CellExtension {
    pub long_string: Option<String>,
    pub formula_text: Option<String>,
    pub hyperlink_target: Option<String>,
    pub comment_text: Option<String>,
    pub cached_result: Option<f64>,
    pub shared_formula_group: Option<u32>,
    pub format_id: Option<u32>,
}

impl CellExtension {
    fn is_empty(&self) -> bool {
        self.long_string.is_none()
            && self.formula_text.is_none()
            && self.hyperlink_target.is_none()
            && self.comment_text.is_none()
            && self.cached_result.is_none()
            && self.shared_formula_group.is_none()
            && self.format_id.is_none()
    }
}

/// The three status flags a cell tracks alongside its tag: has-format,
/// has-hyperlink, has-formula-result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Flags(u8);

impl Flags {
    const HAS_FORMAT: u8 = 0b0000_0001;
    const HAS_HYPERLINK: u8 = 0b0000_0010;
    const HAS_FORMULA_RESULT: u8 = 0b0000_0100;

    fn empty() -> Self {
        Self(0)
    }

    fn contains(self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    fn insert(&mut self, bit: u8) {
        self.0 |= bit;
    }

    fn remove(&mut self, bit: u8) {
        self.0 &= !bit;
    }
}

/// A single cell's tagged value: one machine word of tag + inline payload,
/// plus an optional owned extension record allocated only when needed.
#[derive(Debug, Clone)]
pub struct Cell {
    tag: Tag,
    payload: Payload,
    flags: Flags,
    extension: Option<Box<CellExtension>>,
}

impl Default for Cell {
    fn default() -> Self {
        Self::empty()
    }
}

/// A read-only, owned snapshot of a cell's value, presented at the public
/// `Empty|Number|String|Boolean|Formula|Error` alphabet.
#[derive(Debug, Clone, PartialEq)]
pub enum CellView {
    Empty,
    Number(f64),
    String(String),
    Boolean(bool),
    Formula { expr: String, result: Option<f64> },
    Error(String),
}

impl fmt::Display for CellView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellView::Empty => write!(f, ""),
            CellView::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellView::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            CellView::String(s) => write!(f, "{s}"),
            CellView::Formula { expr, result } => match result {
                Some(r) => write!(f, "{r}"),
                None => write!(f, "={expr}"),
            },
            CellView::Error(e) => write!(f, "{e}"),
        }
    }
}

impl Cell {
    pub fn empty() -> Self {
        Self {
            tag: Tag::Empty,
            payload: Payload { number: 0.0 },
            flags: Flags::empty(),
            extension: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.tag, Tag::Empty)
    }

    pub fn number(value: f64) -> Self {
        Self {
            tag: Tag::Number,
            payload: Payload { number: value },
            flags: Flags::empty(),
            extension: None,
        }
    }

    pub fn boolean(value: bool) -> Self {
        Self {
            tag: Tag::Boolean,
            payload: Payload { boolean: value },
            flags: Flags::empty(),
            extension: None,
        }
    }

    pub fn error(code: &str) -> Self {
        let mut cell = Self {
            tag: Tag::Error,
            payload: Payload { error_code: 0 },
            flags: Flags::empty(),
            extension: None,
        };
        cell.ensure_extension().long_string = Some(code.to_string());
        cell
    }

    /// Build a string cell, storing it inline when it fits in
    /// [`INLINE_STRING_CAPACITY`] bytes and otherwise interning it through
    /// `intern` (typically `SharedStringTable::intern`) and tagging it as a
    /// shared-string reference.
    pub fn string_with<F>(value: &str, intern: F) -> Self
    where
        F: FnOnce(&str) -> u32,
    {
        if value.len() <= INLINE_STRING_CAPACITY {
            Self {
                tag: Tag::InlineString,
                payload: Payload {
                    inline_string: InlineStr::new(value),
                },
                flags: Flags::empty(),
                extension: None,
            }
        } else {
            let id = intern(value);
            Self {
                tag: Tag::SharedStringRef,
                payload: Payload { string_id: id },
                flags: Flags::empty(),
                extension: None,
            }
        }
    }

    /// Build a shared-string reference directly from an already-interned id
    /// (used by the package reader, which already knows the id).
    pub fn shared_string_ref(id: u32) -> Self {
        Self {
            tag: Tag::SharedStringRef,
            payload: Payload { string_id: id },
            flags: Flags::empty(),
            extension: None,
        }
    }

    pub fn formula(expr: &str, cached: Option<f64>) -> Self {
        let mut cell = Self {
            tag: Tag::Formula,
            payload: Payload { number: 0.0 },
            flags: Flags::empty(),
            extension: None,
        };
        let ext = cell.ensure_extension();
        ext.formula_text = Some(expr.to_string());
        ext.cached_result = cached;
        if cached.is_some() {
            cell.flags.insert(Flags::HAS_FORMULA_RESULT);
        }
        cell
    }

    pub fn shared_formula_ref(group: u32, cached: Option<f64>) -> Self {
        let mut cell = Self {
            tag: Tag::SharedFormulaRef,
            payload: Payload { number: 0.0 },
            flags: Flags::empty(),
            extension: None,
        };
        let ext = cell.ensure_extension();
        ext.shared_formula_group = Some(group);
        ext.cached_result = cached;
        if cached.is_some() {
            cell.flags.insert(Flags::HAS_FORMULA_RESULT);
        }
        cell
    }

    fn ensure_extension(&mut self) -> &mut CellExtension {
        if self.extension.is_none() {
            self.extension = Some(Box::default());
        }
        self.extension.as_mut().unwrap()
    }

    /// Release the extension record if every field in it has gone back to
    /// its default, so an otherwise-plain cell does not carry dead weight.
    fn compact_extension(&mut self) {
        if let Some(ext) = &self.extension {
            if ext.is_empty() {
                self.extension = None;
            }
        }
    }

    pub fn format_id(&self) -> Option<u32> {
        self.extension.as_ref().and_then(|e| e.format_id)
    }

    pub fn set_format_id(&mut self, id: Option<u32>) {
        match id {
            Some(id) => {
                self.ensure_extension().format_id = Some(id);
                self.flags.insert(Flags::HAS_FORMAT);
            }
            None => {
                if let Some(ext) = &mut self.extension {
                    ext.format_id = None;
                }
                self.flags.remove(Flags::HAS_FORMAT);
                self.compact_extension();
            }
        }
    }

    pub fn has_format(&self) -> bool {
        self.flags.contains(Flags::HAS_FORMAT)
    }

    pub fn hyperlink_target(&self) -> Option<&str> {
        self.extension.as_ref().and_then(|e| e.hyperlink_target.as_deref())
    }

    pub fn set_hyperlink(&mut self, target: Option<String>) {
        match target {
            Some(t) => {
                debug_assert!(!t.is_empty(), "has-hyperlink requires a non-empty target");
                self.ensure_extension().hyperlink_target = Some(t);
                self.flags.insert(Flags::HAS_HYPERLINK);
            }
            None => {
                if let Some(ext) = &mut self.extension {
                    ext.hyperlink_target = None;
                }
                self.flags.remove(Flags::HAS_HYPERLINK);
                self.compact_extension();
            }
        }
    }

    pub fn comment_text(&self) -> Option<&str> {
        self.extension.as_ref().and_then(|e| e.comment_text.as_deref())
    }

    pub fn set_comment(&mut self, text: Option<String>) {
        match text {
            Some(t) => self.ensure_extension().comment_text = Some(t),
            None => {
                if let Some(ext) = &mut self.extension {
                    ext.comment_text = None;
                }
                self.compact_extension();
            }
        }
    }

    /// Resolve this cell to an owned [`CellView`], looking up shared-string
    /// text through `resolve_string` when the cell tag requires it.
    pub fn view<F>(&self, resolve_string: F) -> CellView
    where
        F: FnOnce(u32) -> Option<String>,
    {
        match self.tag {
            Tag::Empty => CellView::Empty,
            // Safety: `number` is the field written for this tag.
            Tag::Number => CellView::Number(unsafe { self.payload.number }),
            Tag::Boolean => CellView::Boolean(unsafe { self.payload.boolean }),
            Tag::InlineString => {
                CellView::String(unsafe { self.payload.inline_string.as_str() }.to_string())
            }
            Tag::SharedStringRef => {
                let id = unsafe { self.payload.string_id };
                CellView::String(resolve_string(id).unwrap_or_default())
            }
            Tag::Error => CellView::Error(
                self.extension
                    .as_ref()
                    .and_then(|e| e.long_string.clone())
                    .unwrap_or_default(),
            ),
            Tag::Formula => CellView::Formula {
                expr: self
                    .extension
                    .as_ref()
                    .and_then(|e| e.formula_text.clone())
                    .unwrap_or_default(),
                result: self.extension.as_ref().and_then(|e| e.cached_result),
            },
            Tag::SharedFormulaRef => CellView::Formula {
                expr: self
                    .extension
                    .as_ref()
                    .and_then(|e| e.shared_formula_group)
                    .map(|g| format!("#shared:{g}"))
                    .unwrap_or_default(),
                result: self.extension.as_ref().and_then(|e| e.cached_result),
            },
        }
    }

    /// True when this cell holds a string, whether inline or shared.
    pub fn is_string(&self) -> bool {
        matches!(self.tag, Tag::InlineString | Tag::SharedStringRef)
    }

    pub fn is_formula(&self) -> bool {
        matches!(self.tag, Tag::Formula | Tag::SharedFormulaRef)
    }

    /// Resolve to a [`CellRef`], the lossless counterpart to [`Cell::view`]
    /// that the XML writer uses: it keeps `InlineString` and
    /// `SharedStringRef` distinct rather than collapsing both into
    /// `CellView::String`, since they serialize to different `t` attributes.
    pub fn as_ref(&self) -> CellRef<'_> {
        match self.tag {
            Tag::Empty => CellRef::Empty,
            // Safety: `number` is the field written for this tag.
            Tag::Number => CellRef::Number(unsafe { self.payload.number }),
            Tag::Boolean => CellRef::Boolean(unsafe { self.payload.boolean }),
            Tag::InlineString => {
                CellRef::InlineString(unsafe { self.payload.inline_string.as_str() })
            }
            Tag::SharedStringRef => CellRef::SharedStringRef(unsafe { self.payload.string_id }),
            Tag::Error => CellRef::Error(
                self.extension
                    .as_ref()
                    .and_then(|e| e.long_string.as_deref())
                    .unwrap_or(""),
            ),
            Tag::Formula => CellRef::Formula {
                expr: self
                    .extension
                    .as_ref()
                    .and_then(|e| e.formula_text.as_deref())
                    .unwrap_or(""),
                result: self.extension.as_ref().and_then(|e| e.cached_result),
            },
            Tag::SharedFormulaRef => CellRef::SharedFormulaRef {
                group: self
                    .extension
                    .as_ref()
                    .and_then(|e| e.shared_formula_group)
                    .unwrap_or(0),
                result: self.extension.as_ref().and_then(|e| e.cached_result),
            },
        }
    }
}

/// The lossless borrowed counterpart to [`CellView`] (see [`Cell::as_ref`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellRef<'a> {
    Empty,
    Number(f64),
    InlineString(&'a str),
    SharedStringRef(u32),
    Boolean(bool),
    Formula { expr: &'a str, result: Option<f64> },
    SharedFormulaRef { group: u32, result: Option<f64> },
    Error(&'a str),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_strings(_: u32) -> Option<String> {
        None
    }

    #[test]
    fn empty_cell_has_no_extension() {
        let cell = Cell::empty();
        assert!(cell.is_empty());
        assert!(cell.extension.is_none());
    }

    #[test]
    fn short_string_is_stored_inline_without_extension() {
        let cell = Cell::string_with("hi", |_| panic!("should not intern"));
        assert!(cell.extension.is_none());
        assert_eq!(cell.view(no_strings), CellView::String("hi".to_string()));
    }

    #[test]
    fn long_string_is_interned_as_shared_ref() {
        let mut interned = None;
        let cell = Cell::string_with("this string is definitely longer than fifteen bytes", |s| {
            interned = Some(s.to_string());
            7
        });
        assert_eq!(interned.as_deref(), Some("this string is definitely longer than fifteen bytes"));
        let view = cell.view(|id| {
            assert_eq!(id, 7);
            Some("resolved".to_string())
        });
        assert_eq!(view, CellView::String("resolved".to_string()));
    }

    #[test]
    fn exactly_fifteen_bytes_stays_inline() {
        let s = "123456789012345";
        assert_eq!(s.len(), INLINE_STRING_CAPACITY);
        let cell = Cell::string_with(s, |_| panic!("should not intern"));
        assert_eq!(cell.view(no_strings), CellView::String(s.to_string()));
    }

    #[test]
    fn formula_cell_retains_cached_result() {
        let cell = Cell::formula("A1+B1", Some(42.0));
        match cell.view(no_strings) {
            CellView::Formula { expr, result } => {
                assert_eq!(expr, "A1+B1");
                assert_eq!(result, Some(42.0));
            }
            other => panic!("expected formula, got {other:?}"),
        }
    }

    #[test]
    fn format_id_round_trips() {
        let mut cell = Cell::number(1.0);
        assert!(!cell.has_format());
        cell.set_format_id(Some(3));
        assert!(cell.has_format());
        assert_eq!(cell.format_id(), Some(3));
        cell.set_format_id(None);
        assert!(!cell.has_format());
        assert!(cell.extension.is_none());
    }

    #[test]
    fn clearing_cell_releases_extension() {
        let mut cell = Cell::number(1.0);
        cell.set_format_id(Some(1));
        cell.set_hyperlink(Some("https://example.com".to_string()));
        assert!(cell.extension.is_some());
        cell.set_format_id(None);
        cell.set_hyperlink(None);
        assert!(cell.extension.is_none());
    }

    #[test]
    fn boolean_and_number_display() {
        assert_eq!(CellView::Boolean(true).to_string(), "TRUE");
        assert_eq!(CellView::Number(42.0).to_string(), "42");
        assert_eq!(CellView::Number(3.5).to_string(), "3.5");
    }

    #[test]
    fn error_view_roundtrips_code() {
        let cell = Cell::error("#DIV/0!");
        assert_eq!(cell.view(no_strings), CellView::Error("#DIV/0!".to_string()));
    }

    #[test]
    fn as_ref_distinguishes_inline_from_shared_string() {
        let inline = Cell::string_with("hi", |_| panic!("should not intern"));
        assert_eq!(inline.as_ref(), CellRef::InlineString("hi"));

        let shared = Cell::shared_string_ref(4);
        assert_eq!(shared.as_ref(), CellRef::SharedStringRef(4));
    }

    #[test]
    fn as_ref_formula_carries_expr_and_result() {
        let cell = Cell::formula("A1+B1", Some(3.0));
        assert_eq!(
            cell.as_ref(),
            CellRef::Formula {
                expr: "A1+B1",
                result: Some(3.0)
            }
        );
    }

    #[test]
    fn as_ref_shared_formula_carries_group() {
        let cell = Cell::shared_formula_ref(2, Some(9.0));
        assert_eq!(
            cell.as_ref(),
            CellRef::SharedFormulaRef {
                group: 2,
                result: Some(9.0)
            }
        );
    }

    #[test]
    fn cell_size_is_close_to_one_word_plus_pointer() {
        // The tag + inline payload + flags should stay well under a cache
        // line; the extension is a single owning pointer.
        assert!(std::mem::size_of::<Cell>() <= 32);
    }
}

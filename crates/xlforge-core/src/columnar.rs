//! Columnar store: the read-only alternate sheet layout.
//!
//! Maintained instead of a [`crate::block::BlockMatrix`] when a sheet is
//! loaded for scan-heavy read-only use. Each column keeps four maps keyed by
//! row: `f64`, shared-string id, `bool`, and an owned string for
//! errors/inline text. Mutating operations are rejected.

use std::collections::HashMap;

use crate::cell::CellView;
use crate::error::{Error, Result};

#[derive(Default)]
struct ColumnStore {
    numbers: HashMap<u32, f64>,
    shared_strings: HashMap<u32, u32>,
    booleans: HashMap<u32, bool>,
    owned_strings: HashMap<u32, String>,
}

/// A read-only, column-oriented view over a sheet's cells.
#[derive(Default)]
pub struct ColumnarStore {
    columns: HashMap<u32, ColumnStore>,
}

impl ColumnarStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_number(&mut self, row: u32, col: u32, value: f64) {
        self.columns.entry(col).or_default().numbers.insert(row, value);
    }

    pub fn put_shared_string(&mut self, row: u32, col: u32, id: u32) {
        self.columns
            .entry(col)
            .or_default()
            .shared_strings
            .insert(row, id);
    }

    pub fn put_boolean(&mut self, row: u32, col: u32, value: bool) {
        self.columns.entry(col).or_default().booleans.insert(row, value);
    }

    pub fn put_owned_string(&mut self, row: u32, col: u32, value: String) {
        self.columns
            .entry(col)
            .or_default()
            .owned_strings
            .insert(row, value);
    }

    /// Any mutation route into a columnar-backed sheet must fail; this is
    /// the single funnel every write-path check calls.
    pub fn reject_mutation(operation: &str) -> Result<()> {
        Err(Error::InvalidState(format!(
            "{operation} is not permitted on a sheet loaded in columnar (read-only) mode"
        )))
    }

    pub fn get<F>(&self, row: u32, col: u32, resolve_string: F) -> Option<CellView>
    where
        F: FnOnce(u32) -> Option<String>,
    {
        let column = self.columns.get(&col)?;
        if let Some(&n) = column.numbers.get(&row) {
            return Some(CellView::Number(n));
        }
        if let Some(&id) = column.shared_strings.get(&row) {
            return Some(CellView::String(resolve_string(id).unwrap_or_default()));
        }
        if let Some(&b) = column.booleans.get(&row) {
            return Some(CellView::Boolean(b));
        }
        if let Some(s) = column.owned_strings.get(&row) {
            return Some(CellView::String(s.clone()));
        }
        None
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count_in_column(&self, col: u32) -> usize {
        self.columns
            .get(&col)
            .map(|c| {
                c.numbers.len() + c.shared_strings.len() + c.booleans.len() + c.owned_strings.len()
            })
            .unwrap_or(0)
    }

    /// Iterate non-empty (row, col) positions across every column map, for
    /// read-only scans that do not care about the underlying type.
    pub fn iter_positions(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.columns.iter().flat_map(|(&col, store)| {
            store
                .numbers
                .keys()
                .chain(store.shared_strings.keys())
                .chain(store.booleans.keys())
                .chain(store.owned_strings.keys())
                .copied()
                .collect::<Vec<_>>()
                .into_iter()
                .map(move |row| (row, col))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_store_is_empty() {
        let store = ColumnarStore::new();
        assert_eq!(store.column_count(), 0);
    }

    #[test]
    fn numbers_round_trip_by_row() {
        let mut store = ColumnarStore::new();
        store.put_number(0, 0, 1.5);
        store.put_number(1, 0, 2.5);
        assert_eq!(store.get(0, 0, |_| None), Some(CellView::Number(1.5)));
        assert_eq!(store.get(1, 0, |_| None), Some(CellView::Number(2.5)));
        assert_eq!(store.row_count_in_column(0), 2);
    }

    #[test]
    fn shared_string_lookup_resolves_through_callback() {
        let mut store = ColumnarStore::new();
        store.put_shared_string(0, 0, 9);
        let view = store.get(0, 0, |id| {
            assert_eq!(id, 9);
            Some("hello".to_string())
        });
        assert_eq!(view, Some(CellView::String("hello".to_string())));
    }

    #[test]
    fn mutation_is_rejected() {
        let result = ColumnarStore::reject_mutation("set");
        assert!(matches!(result, Err(Error::InvalidState(_))));
    }

    #[test]
    fn missing_cell_returns_none() {
        let store = ColumnarStore::new();
        assert_eq!(store.get(0, 0, |_| None), None);
    }

    #[test]
    fn distinct_columns_are_independent() {
        let mut store = ColumnarStore::new();
        store.put_number(0, 0, 1.0);
        store.put_boolean(0, 1, true);
        assert_eq!(store.column_count(), 2);
        assert_eq!(store.get(0, 1, |_| None), Some(CellView::Boolean(true)));
    }
}

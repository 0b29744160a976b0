use tempfile::TempDir;
use xlforge::Workbook;

#[test]
fn test_create_and_save_empty_workbook() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.xlsx");

    let mut wb = Workbook::create();
    wb.save(&path).unwrap();

    assert!(path.exists());
    let metadata = std::fs::metadata(&path).unwrap();
    assert!(metadata.len() > 0);
}

#[test]
fn test_roundtrip_preserves_sheet_names() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("roundtrip.xlsx");

    let mut wb1 = Workbook::create();
    assert_eq!(wb1.sheet_names(), vec!["Sheet1"]);
    wb1.save(&path).unwrap();

    let wb2 = Workbook::open_for_reading(&path).unwrap();
    assert_eq!(wb2.sheet_names(), vec!["Sheet1"]);
}

#[test]
fn test_open_nonexistent_returns_io_error() {
    let result = Workbook::open_for_reading("/tmp/nonexistent_file_12345.xlsx");
    assert!(result.is_err());
}

#[test]
fn test_public_api_reexports() {
    let _wb = Workbook::create();
    let _col = xlforge::utils::column_name_to_number("A").unwrap();
    let _name = xlforge::utils::column_number_to_name(1).unwrap();
    let _coords = xlforge::utils::cell_name_to_coordinates("A1").unwrap();
    let _cell = xlforge::utils::coordinates_to_cell_name(1, 1).unwrap();
}

#[test]
fn test_error_type_accessible() {
    let err = xlforge::Error::InvalidCellReference("bad".to_string());
    assert!(err.to_string().contains("bad"));
}

#[test]
fn test_save_and_reopen_multiple_times() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("multi.xlsx");

    let mut wb = Workbook::create();
    wb.save(&path).unwrap();

    let mut wb2 = Workbook::open_for_editing(&path).unwrap();
    let path2 = dir.path().join("multi2.xlsx");
    wb2.save(&path2).unwrap();

    let wb3 = Workbook::open_for_reading(&path2).unwrap();
    assert_eq!(wb3.sheet_names(), vec!["Sheet1"]);
}

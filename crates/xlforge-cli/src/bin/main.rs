use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use xlforge_core::cell::{Cell, CellView};
use xlforge_core::workbook::Workbook;

#[derive(Parser)]
#[command(
    name = "xlforge",
    version,
    about = "Excel (.xlsx) file toolkit",
    long_about = "A command-line tool for reading, writing, and converting Excel (.xlsx) files."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show workbook information (sheets, dimensions, properties).
    Info {
        /// Path to the .xlsx file.
        file: PathBuf,
    },
    /// List all sheet names in the workbook.
    Sheets {
        /// Path to the .xlsx file.
        file: PathBuf,
    },
    /// Read and display sheet data.
    Read {
        /// Path to the .xlsx file.
        file: PathBuf,
        /// Sheet name to read. Defaults to the active sheet.
        #[arg(short, long)]
        sheet: Option<String>,
        /// Output format.
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
    /// Get a single cell value.
    Get {
        /// Path to the .xlsx file.
        file: PathBuf,
        /// Sheet name.
        sheet: String,
        /// Cell reference (e.g. A1, B2).
        cell: String,
    },
    /// Set a cell value and write to a new file.
    Set {
        /// Path to the input .xlsx file.
        file: PathBuf,
        /// Sheet name.
        sheet: String,
        /// Cell reference (e.g. A1, B2).
        cell: String,
        /// Value to set.
        value: String,
        /// Output file path.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Convert a sheet to another format.
    Convert {
        /// Path to the .xlsx file.
        file: PathBuf,
        /// Target format.
        #[arg(short, long)]
        format: ConvertFormat,
        /// Output file path.
        #[arg(short, long)]
        output: PathBuf,
        /// Sheet name. Defaults to the active sheet.
        #[arg(short, long)]
        sheet: Option<String>,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Tab-separated table output.
    Table,
    /// Comma-separated values.
    Csv,
}

#[derive(Clone, ValueEnum)]
enum ConvertFormat {
    /// Comma-separated values.
    Csv,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Info { file } => cmd_info(&file),
        Commands::Sheets { file } => cmd_sheets(&file),
        Commands::Read { file, sheet, format } => cmd_read(&file, sheet.as_deref(), &format),
        Commands::Get { file, sheet, cell } => cmd_get(&file, &sheet, &cell),
        Commands::Set { file, sheet, cell, value, output } => {
            cmd_set(&file, &sheet, &cell, &value, &output)
        }
        Commands::Convert { file, format, output, sheet } => {
            cmd_convert(&file, sheet.as_deref(), &format, &output)
        }
    }
}

fn cmd_info(file: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let wb = Workbook::open_for_reading(file)?;
    let sheets = wb.sheet_names();
    let active = wb.active_sheet_name();

    println!("File: {}", file.display());
    println!("Sheets: {}", sheets.len());
    for (i, name) in sheets.iter().enumerate() {
        let marker = if Some(*name) == active { " (active)" } else { "" };
        println!("  {}: {}{}", i + 1, name, marker);
    }

    let props = &wb.doc_properties;
    if let Some(title) = props.title.as_deref().filter(|s| !s.is_empty()) {
        println!("Title: {title}");
    }
    if let Some(creator) = props.creator.as_deref().filter(|s| !s.is_empty()) {
        println!("Creator: {creator}");
    }
    if let Some(modified) = props.modified.as_deref().filter(|s| !s.is_empty()) {
        println!("Modified: {modified}");
    }

    Ok(())
}

fn cmd_sheets(file: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let wb = Workbook::open_for_reading(file)?;
    for name in wb.sheet_names() {
        println!("{name}");
    }
    Ok(())
}

/// Every occupied row, as (row, column, rendered value) triples sorted in
/// row-major order, for the sheet named `sheet` (or the active sheet).
fn read_rows(wb: &Workbook, sheet: Option<&str>) -> Result<Vec<(u32, u32, String)>, Box<dyn std::error::Error>> {
    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => wb
            .active_sheet_name()
            .ok_or("workbook has no active sheet")?
            .to_string(),
    };
    let sheet = wb.sheet(&sheet_name)?;
    let cells = sheet
        .occupied_positions()
        .into_iter()
        .map(|(row, col)| {
            let view = sheet.get_cell(row, col, |id| wb.shared_strings.get(id));
            (row, col, view.to_string())
        })
        .collect();
    Ok(cells)
}

fn render_grid(cells: &[(u32, u32, String)], separator: &str, escape: impl Fn(&str) -> String) -> String {
    if cells.is_empty() {
        return String::new();
    }
    let max_col = cells.iter().map(|(_, c, _)| *c).max().unwrap_or(0);

    let mut lines = Vec::new();
    let mut by_row: Vec<(u32, Vec<(u32, &str)>)> = Vec::new();
    for (row, col, value) in cells {
        match by_row.last_mut() {
            Some((r, entries)) if *r == *row => entries.push((*col, value.as_str())),
            _ => by_row.push((*row, vec![(*col, value.as_str())])),
        }
    }

    for (_, entries) in &by_row {
        let mut line = String::new();
        for col in 0..=max_col {
            if col > 0 {
                line.push_str(separator);
            }
            if let Some((_, value)) = entries.iter().find(|(c, _)| *c == col) {
                line.push_str(&escape(value));
            }
        }
        lines.push(line);
    }
    lines.join("\n")
}

fn cmd_read(
    file: &PathBuf,
    sheet: Option<&str>,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let wb = Workbook::open_for_reading(file)?;
    let cells = read_rows(&wb, sheet)?;

    let separator = match format {
        OutputFormat::Table => "\t",
        OutputFormat::Csv => ",",
    };
    let escape: Box<dyn Fn(&str) -> String> = match format {
        OutputFormat::Table => Box::new(|s: &str| s.to_string()),
        OutputFormat::Csv => Box::new(csv_escape),
    };

    let grid = render_grid(&cells, separator, escape);
    if !grid.is_empty() {
        println!("{grid}");
    }
    Ok(())
}

fn cmd_get(file: &PathBuf, sheet: &str, cell: &str) -> Result<(), Box<dyn std::error::Error>> {
    let wb = Workbook::open_for_reading(file)?;
    let sheet = wb.sheet(sheet)?;
    let view = sheet.get_cell_by_ref(cell, |id| wb.shared_strings.get(id))?;
    let display = view.to_string();
    if !display.is_empty() {
        println!("{display}");
    }
    Ok(())
}

fn cmd_set(
    file: &PathBuf,
    sheet: &str,
    cell: &str,
    value: &str,
    output: &PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut wb = Workbook::open_for_editing(file)?;
    let cell_value = parse_cell_input(value, &wb);
    let target = wb.sheet_mut(sheet)?;
    target.set_cell_by_ref(cell, cell_value)?;
    wb.save(output)?;
    Ok(())
}

fn cmd_convert(
    file: &PathBuf,
    sheet: Option<&str>,
    format: &ConvertFormat,
    output: &PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let wb = Workbook::open_for_reading(file)?;
    let cells = read_rows(&wb, sheet)?;

    match format {
        ConvertFormat::Csv => {
            let csv = render_grid(&cells, ",", csv_escape);
            std::fs::write(output, csv)?;
        }
    }

    Ok(())
}

/// Escape a string for CSV output. Wraps in quotes if it contains commas,
/// quotes, or newlines.
fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Parse a user-provided string into a [`Cell`]. Recognizes booleans and
/// numbers; anything else is interned as a string cell.
fn parse_cell_input(input: &str, wb: &Workbook) -> Cell {
    match input.to_uppercase().as_str() {
        "TRUE" => return Cell::boolean(true),
        "FALSE" => return Cell::boolean(false),
        _ => {}
    }
    if let Ok(n) = input.parse::<f64>() {
        return Cell::number(n);
    }
    Cell::string_with(input, |s| wb.shared_strings.intern(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_grid_pads_missing_cells_with_empty_string() {
        let cells = vec![(0u32, 0u32, "a".to_string()), (0, 2, "c".to_string())];
        assert_eq!(render_grid(&cells, ",", |s: &str| s.to_string()), "a,,c");
    }

    #[test]
    fn render_grid_handles_multiple_rows() {
        let cells = vec![
            (0u32, 0u32, "a".to_string()),
            (1, 0, "b".to_string()),
        ];
        assert_eq!(render_grid(&cells, ",", |s: &str| s.to_string()), "a\nb");
    }

    #[test]
    fn csv_escape_wraps_values_with_commas() {
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("plain"), "plain");
    }

    #[test]
    fn parse_cell_input_recognizes_booleans_and_numbers() {
        let wb = Workbook::create();
        assert_eq!(
            parse_cell_input("true", &wb).view(|_| None),
            CellView::Boolean(true)
        );
        assert_eq!(
            parse_cell_input("42", &wb).view(|_| None),
            CellView::Number(42.0)
        );
        assert_eq!(
            parse_cell_input("hello", &wb).view(|_| None),
            CellView::String("hello".to_string())
        );
    }
}

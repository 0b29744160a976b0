//! Save orchestrator and resource manager.
//!
//! Owns the save sequence (spec §4.9) and the atomic same-file-save dance
//! (spec §4.10): base parts, then each sheet, then per-sheet relationships,
//! then shared strings last (sheet emission may have interned new strings),
//! then finalize. In edit mode, parts the dirty manager reports clean are
//! copied through from the source archive rather than regenerated; parts
//! this crate doesn't understand at all (media, drawings, charts, VBA,
//! pivot caches, tables) are always passed through unconditionally.

use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;

use xlforge_xml::content_types::{mime_types, ContentTypeOverride, ContentTypes};
use xlforge_xml::doc_props::{serialize_core_properties, serialize_custom_properties, ExtendedProperties};
use xlforge_xml::relationships::{rel_types, Relationship, Relationships};
use xlforge_xml::workbook::{BookViews, DefinedName, DefinedNames, SheetEntry, Sheets, WorkbookView, WorkbookXml};

use crate::archive::{ArchiveReader, ArchiveWriter};
use crate::error::{Error, Result};
use crate::sheet::{Grid, HyperlinkRecord};
use crate::theme::default_theme_colors;
use crate::workbook::{worksheet_part_path, Workbook};
use crate::writer::{FileWriter, StreamingWriter};
use crate::xmlwriter::XmlStreamWriter;

/// Rough per-cell XML footprint used to decide whether a sheet is large
/// enough for [`crate::options::WriteMode::Auto`] to pick streaming.
const ESTIMATED_BYTES_PER_CELL: u64 = 32;

/// Archive-internal parts this crate understands and may regenerate. Any
/// other entry found in a source package during an edit-mode save (media,
/// drawings, charts, embeddings, the VBA project, pivot caches, tables) is
/// always copied through unconditionally, per spec §4.10.
fn is_managed_part(name: &str) -> bool {
    name == "[Content_Types].xml"
        || name == "_rels/.rels"
        || name == "docProps/core.xml"
        || name == "docProps/app.xml"
        || name == "docProps/custom.xml"
        || name == "xl/workbook.xml"
        || name == "xl/_rels/workbook.xml.rels"
        || name == "xl/styles.xml"
        || name == "xl/theme/theme1.xml"
        || name == "xl/sharedStrings.xml"
        || (name.starts_with("xl/worksheets/") && !name.contains("_rels"))
        || name.starts_with("xl/worksheets/_rels/")
}

pub fn save(workbook: &mut Workbook, path: &Path) -> Result<()> {
    workbook.options.validate()?;
    log::debug!("saving workbook to {} ({} sheets)", path.display(), workbook.sheets().len());

    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::Builder::new()
        .prefix(".xlforge-save-")
        .suffix(".tmp")
        .tempfile_in(dir)?;

    let write_result = {
        let file = temp.as_file_mut();
        write_package(workbook, file)
    };

    match write_result {
        Ok(()) => {
            temp.persist(path).map_err(|e| Error::Io(e.error))?;
            log::info!("saved {}", path.display());
            Ok(())
        }
        Err(e) => {
            // `temp` is removed on drop.
            log::warn!("save to {} failed: {e}", path.display());
            Err(e)
        }
    }
}

fn write_package<W: Write + std::io::Seek>(workbook: &mut Workbook, sink: W) -> Result<()> {
    let shared_strings_non_empty = !workbook.shared_strings.is_empty();
    let mut archive = ArchiveWriter::new(sink, workbook.options.compression_level);

    let mut source = match &workbook.source_path {
        Some(path) => File::open(path).ok().map(BufReader::new).and_then(|r| ArchiveReader::new(r).ok()),
        None => None,
    };

    // Pass through every unmanaged entry from the source package unchanged
    // (media, drawings, charts, embeddings, VBA, pivot caches, tables, ...).
    if let Some(reader) = source.as_mut() {
        let names = reader.list();
        for name in names {
            if !is_managed_part(&name) {
                archive.copy_entry_from(reader.inner_mut(), &name)?;
            }
        }
    }

    write_content_types(workbook, &mut archive)?;
    write_root_rels(workbook, &mut archive)?;
    write_doc_props(workbook, &mut archive)?;
    write_workbook_xml(workbook, &mut archive)?;
    write_workbook_rels(workbook, &mut archive)?;
    write_styles(workbook, &mut archive)?;
    write_theme(workbook, &mut archive, source.as_mut())?;

    for index in 0..workbook.sheets().len() {
        write_sheet(workbook, index, &mut archive, source.as_mut())?;
    }

    if workbook.options.use_shared_strings && shared_strings_non_empty {
        write_shared_strings(workbook, &mut archive)?;
    }

    archive.finish()?;
    Ok(())
}

fn write_content_types<W: Write + Seek>(workbook: &Workbook, archive: &mut ArchiveWriter<W>) -> Result<()> {
    let mut content_types = ContentTypes::default();
    content_types.overrides.clear();
    content_types.overrides.push(ContentTypeOverride {
        part_name: "/xl/workbook.xml".to_string(),
        content_type: mime_types::WORKBOOK.to_string(),
    });
    content_types.overrides.push(ContentTypeOverride {
        part_name: "/xl/styles.xml".to_string(),
        content_type: mime_types::STYLES.to_string(),
    });
    content_types.overrides.push(ContentTypeOverride {
        part_name: "/xl/theme/theme1.xml".to_string(),
        content_type: mime_types::THEME.to_string(),
    });
    for index in 0..workbook.sheets().len() {
        content_types.overrides.push(ContentTypeOverride {
            part_name: format!("/{}", worksheet_part_path(index)),
            content_type: mime_types::WORKSHEET.to_string(),
        });
    }
    if workbook.options.use_shared_strings && !workbook.shared_strings.is_empty() {
        content_types.overrides.push(ContentTypeOverride {
            part_name: "/xl/sharedStrings.xml".to_string(),
            content_type: mime_types::SHARED_STRINGS.to_string(),
        });
    }
    content_types.overrides.push(ContentTypeOverride {
        part_name: "/docProps/core.xml".to_string(),
        content_type: mime_types::CORE_PROPERTIES.to_string(),
    });
    content_types.overrides.push(ContentTypeOverride {
        part_name: "/docProps/app.xml".to_string(),
        content_type: mime_types::EXTENDED_PROPERTIES.to_string(),
    });
    if workbook.has_custom_properties() {
        content_types.overrides.push(ContentTypeOverride {
            part_name: "/docProps/custom.xml".to_string(),
            content_type: mime_types::CUSTOM_PROPERTIES.to_string(),
        });
    }

    let xml = quick_xml::se::to_string(&content_types)
        .map_err(|e| Error::FormatError { path: "[Content_Types].xml".into(), message: e.to_string() })?;
    archive.write_whole_entry("[Content_Types].xml", xml.as_bytes())
}

fn write_root_rels<W: Write + Seek>(workbook: &Workbook, archive: &mut ArchiveWriter<W>) -> Result<()> {
    let mut rels = xlforge_xml::relationships::package_rels();
    if workbook.has_custom_properties() {
        rels.relationships.push(Relationship {
            id: "rId4".to_string(),
            rel_type: rel_types::CUSTOM_PROPERTIES.to_string(),
            target: "docProps/custom.xml".to_string(),
            target_mode: None,
        });
    }
    let xml = quick_xml::se::to_string(&rels)
        .map_err(|e| Error::FormatError { path: "_rels/.rels".into(), message: e.to_string() })?;
    archive.write_whole_entry("_rels/.rels", xml.as_bytes())
}

fn write_doc_props<W: Write + Seek>(workbook: &Workbook, archive: &mut ArchiveWriter<W>) -> Result<()> {
    let core_xml = serialize_core_properties(&workbook.doc_properties.to_core_properties());
    archive.write_whole_entry("docProps/core.xml", core_xml.as_bytes())?;

    let extended: ExtendedProperties = workbook.app_properties.to_extended_properties();
    let app_xml = quick_xml::se::to_string(&extended)
        .map_err(|e| Error::FormatError { path: "docProps/app.xml".into(), message: e.to_string() })?;
    archive.write_whole_entry("docProps/app.xml", app_xml.as_bytes())?;

    if workbook.has_custom_properties() {
        let custom_xml = serialize_custom_properties(workbook.custom_properties());
        archive.write_whole_entry("docProps/custom.xml", custom_xml.as_bytes())?;
    }
    Ok(())
}

fn write_workbook_xml<W: Write + Seek>(workbook: &Workbook, archive: &mut ArchiveWriter<W>) -> Result<()> {
    let active_tab = workbook
        .sheets()
        .iter()
        .position(|s| s.active)
        .unwrap_or(0);

    let sheets = workbook
        .sheets()
        .iter()
        .enumerate()
        .map(|(index, sheet)| SheetEntry {
            name: sheet.name.clone(),
            sheet_id: sheet.sheet_id,
            state: None,
            r_id: format!("rId{}", index + 1),
        })
        .collect();

    let defined_names = if workbook.defined_names.is_empty() {
        None
    } else {
        Some(DefinedNames {
            defined_names: workbook
                .defined_names
                .iter()
                .map(|entry| DefinedName {
                    name: entry.name.clone(),
                    local_sheet_id: entry.local_sheet_id,
                    hidden: None,
                    value: entry.value.clone(),
                })
                .collect(),
        })
    };

    let wb_xml = WorkbookXml {
        book_views: Some(BookViews {
            workbook_views: vec![WorkbookView {
                x_window: None,
                y_window: None,
                window_width: None,
                window_height: None,
                active_tab: Some(active_tab as u32),
            }],
        }),
        sheets: Sheets { sheets },
        defined_names,
        ..WorkbookXml::default()
    };

    let xml = quick_xml::se::to_string(&wb_xml)
        .map_err(|e| Error::FormatError { path: "xl/workbook.xml".into(), message: e.to_string() })?;
    archive.write_whole_entry("xl/workbook.xml", xml.as_bytes())
}

fn write_workbook_rels<W: Write + Seek>(workbook: &Workbook, archive: &mut ArchiveWriter<W>) -> Result<()> {
    let mut relationships = Vec::new();
    for index in 0..workbook.sheets().len() {
        relationships.push(Relationship {
            id: format!("rId{}", index + 1),
            rel_type: rel_types::WORKSHEET.to_string(),
            target: format!("worksheets/sheet{}.xml", index + 1),
            target_mode: None,
        });
    }
    let mut next_id = workbook.sheets().len() + 1;
    relationships.push(Relationship {
        id: format!("rId{next_id}"),
        rel_type: rel_types::STYLES.to_string(),
        target: "styles.xml".to_string(),
        target_mode: None,
    });
    next_id += 1;
    relationships.push(Relationship {
        id: format!("rId{next_id}"),
        rel_type: rel_types::THEME.to_string(),
        target: "theme/theme1.xml".to_string(),
        target_mode: None,
    });
    if workbook.options.use_shared_strings && !workbook.shared_strings.is_empty() {
        next_id += 1;
        relationships.push(Relationship {
            id: format!("rId{next_id}"),
            rel_type: rel_types::SHARED_STRINGS.to_string(),
            target: "sharedStrings.xml".to_string(),
            target_mode: None,
        });
    }

    let rels = Relationships {
        xmlns: xlforge_xml::namespaces::PACKAGE_RELATIONSHIPS.to_string(),
        relationships,
    };
    let xml = quick_xml::se::to_string(&rels).map_err(|e| Error::FormatError {
        path: "xl/_rels/workbook.xml.rels".into(),
        message: e.to_string(),
    })?;
    archive.write_whole_entry("xl/_rels/workbook.xml.rels", xml.as_bytes())
}

fn write_styles<W: Write + Seek>(workbook: &Workbook, archive: &mut ArchiveWriter<W>) -> Result<()> {
    let stylesheet = workbook.formats.build_stylesheet();
    let xml = quick_xml::se::to_string(&stylesheet)
        .map_err(|e| Error::FormatError { path: "xl/styles.xml".into(), message: e.to_string() })?;
    archive.write_whole_entry("xl/styles.xml", xml.as_bytes())
}

fn write_theme<W: Write + Seek, R: Read + Seek>(
    workbook: &Workbook,
    archive: &mut ArchiveWriter<W>,
    source: Option<&mut ArchiveReader<R>>,
) -> Result<()> {
    if workbook.theme.colors != default_theme_colors().colors {
        if let Some(reader) = source {
            if reader.contains("xl/theme/theme1.xml") {
                return archive.copy_entry_from(reader.inner_mut(), "xl/theme/theme1.xml");
            }
        }
    }
    archive.write_whole_entry("xl/theme/theme1.xml", &crate::theme::default_theme_xml())
}

fn write_sheet<W: Write + Seek, R: Read + Seek>(
    workbook: &mut Workbook,
    index: usize,
    archive: &mut ArchiveWriter<W>,
    source: Option<&mut ArchiveReader<R>>,
) -> Result<()> {
    let part = worksheet_part_path(index);
    let rels_part = format!("xl/worksheets/_rels/sheet{}.xml.rels", index + 1);
    let is_new = workbook.dirty.is_new_workbook();
    let dirty = is_new || workbook.dirty.should_update(&part, false);

    if !dirty {
        if let Some(reader) = source {
            if reader.contains(&part) {
                let has_rels = reader.contains(&rels_part);
                archive.copy_entry_from(reader.inner_mut(), &part)?;
                if has_rels {
                    archive.copy_entry_from(reader.inner_mut(), &rels_part)?;
                }
                return Ok(());
            }
        }
    }

    let hyperlink_rel_ids: Vec<String> = {
        let sheet = &workbook.sheets()[index];
        (0..sheet.hyperlinks().len())
            .map(|i| format!("rId{}", i + 1))
            .collect()
    };

    let cell_count = match workbook.sheets()[index].grid() {
        Grid::Blocks(matrix) => matrix.cell_count() as u64,
        Grid::Columnar(_) => 0,
    };
    let estimated_bytes = cell_count.saturating_mul(ESTIMATED_BYTES_PER_CELL);

    if workbook.options.should_stream(cell_count, estimated_bytes) {
        log::trace!("{part}: streaming write, ~{cell_count} cells");
        let mut stream = StreamingWriter::new(archive);
        stream.open_streaming(&part)?;
        {
            let mut xml = XmlStreamWriter::new(&mut stream);
            workbook.sheets()[index].write_xml(&mut xml, &hyperlink_rel_ids)?;
            xml.finish()?;
        }
        stream.close_streaming()?;
    } else {
        let mut buffer: Vec<u8> = Vec::new();
        {
            let mut xml = XmlStreamWriter::new(&mut buffer);
            workbook.sheets()[index].write_xml(&mut xml, &hyperlink_rel_ids)?;
            xml.finish()?;
        }
        archive.write_whole_entry(&part, &buffer)?;
    }

    let links = workbook.sheets()[index].hyperlinks();
    if !links.is_empty() {
        let rels_xml = build_hyperlink_rels(links, &hyperlink_rel_ids)?;
        archive.write_whole_entry(&rels_part, rels_xml.as_bytes())?;
    }
    workbook.dirty.mark_clean(&part);
    Ok(())
}

fn build_hyperlink_rels(links: &[HyperlinkRecord], rel_ids: &[String]) -> Result<String> {
    let relationships = links
        .iter()
        .zip(rel_ids)
        .map(|(link, id)| Relationship {
            id: id.clone(),
            rel_type: rel_types::HYPERLINK.to_string(),
            target: link.target.clone(),
            target_mode: Some("External".to_string()),
        })
        .collect();
    let rels = Relationships {
        xmlns: xlforge_xml::namespaces::PACKAGE_RELATIONSHIPS.to_string(),
        relationships,
    };
    quick_xml::se::to_string(&rels).map_err(|e| Error::FormatError {
        path: "xl/worksheets/_rels/sheetN.xml.rels".into(),
        message: e.to_string(),
    })
}

fn write_shared_strings<W: Write + Seek>(workbook: &Workbook, archive: &mut ArchiveWriter<W>) -> Result<()> {
    let sst = workbook.shared_strings.to_sst();
    let xml = quick_xml::se::to_string(&sst)
        .map_err(|e| Error::FormatError { path: "xl/sharedStrings.xml".into(), message: e.to_string() })?;
    archive.write_whole_entry("xl/sharedStrings.xml", xml.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use std::io::Cursor;

    fn build(workbook: &mut Workbook) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        write_package(workbook, &mut buf).unwrap();
        buf.into_inner()
    }

    #[test]
    fn new_workbook_produces_every_base_part() {
        let mut wb = Workbook::create();
        let bytes = build(&mut wb);
        let mut reader = ArchiveReader::new(Cursor::new(bytes)).unwrap();
        for part in [
            "[Content_Types].xml",
            "_rels/.rels",
            "docProps/core.xml",
            "docProps/app.xml",
            "xl/workbook.xml",
            "xl/_rels/workbook.xml.rels",
            "xl/styles.xml",
            "xl/theme/theme1.xml",
            "xl/worksheets/sheet1.xml",
        ] {
            assert!(reader.contains(part), "missing part {part}");
        }
    }

    #[test]
    fn shared_strings_part_only_emitted_when_non_empty() {
        let mut wb = Workbook::create();
        let bytes = build(&mut wb);
        let reader = ArchiveReader::new(Cursor::new(bytes)).unwrap();
        assert!(!reader.contains("xl/sharedStrings.xml"));
    }

    #[test]
    fn writing_a_long_string_cell_produces_shared_strings_part() {
        let mut wb = Workbook::create();
        {
            let cell = Cell::string_with("this is a long enough value to be shared", |s| wb.shared_strings.intern(s));
            let sheet = wb.sheet_mut("Sheet1").unwrap();
            sheet.set_cell(0, 0, cell).unwrap();
        }
        let bytes = build(&mut wb);
        let reader = ArchiveReader::new(Cursor::new(bytes)).unwrap();
        assert!(reader.contains("xl/sharedStrings.xml"));
    }

    #[test]
    fn content_types_lists_one_override_per_sheet() {
        let mut wb = Workbook::create();
        wb.add_sheet("Sheet2").unwrap();
        let bytes = build(&mut wb);
        let mut reader = ArchiveReader::new(Cursor::new(bytes)).unwrap();
        let xml = reader.extract_string("[Content_Types].xml").unwrap();
        assert!(xml.contains("/xl/worksheets/sheet1.xml"));
        assert!(xml.contains("/xl/worksheets/sheet2.xml"));
    }

    #[test]
    fn save_to_new_file_then_reopen_round_trips_a_cell() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        let mut wb = Workbook::create();
        {
            let cell = Cell::string_with("Hello", |s| wb.shared_strings.intern(s));
            let sheet = wb.sheet_mut("Sheet1").unwrap();
            sheet.set_cell(0, 0, cell).unwrap();
        }
        wb.save(&path).unwrap();

        let reopened = Workbook::open_for_reading(&path).unwrap();
        let sheet = reopened.sheet("Sheet1").unwrap();
        let view = sheet.get_cell(0, 0, |id| reopened.shared_strings.get(id));
        assert_eq!(view, crate::cell::CellView::String("Hello".to_string()));
    }

    #[test]
    fn save_on_read_only_workbook_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        Workbook::create().save(&path).unwrap();

        let mut reopened = Workbook::open_for_reading(&path).unwrap();
        assert!(reopened.save(&path).is_err());
    }
}

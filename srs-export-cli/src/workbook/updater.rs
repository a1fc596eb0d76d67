//! Stamping the status value into a located row
//!
//! The xlsx package is patched in place rather than regenerated: only the
//! target worksheet part is rewritten, every other entry is copied through
//! unchanged, so formatting and formulas elsewhere in the workbook survive.

use anyhow::{Context, Result, anyhow, bail};
use log::{debug, info, warn};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::escape::unescape;
use quick_xml::{Reader, Writer};
use std::fmt;
use std::io::{Cursor, Read, Write};
use zip::ZipArchive;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::api::storage::{DocumentStore, WriteError};
use crate::config::WorkbookConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    /// Storage refused the write because the file is open elsewhere
    Locked(String),
    /// The package could not be patched
    Workbook(String),
    /// Any other storage failure
    Storage(String),
}

impl UpdateError {
    pub fn is_locked(&self) -> bool {
        matches!(self, UpdateError::Locked(_))
    }
}

impl From<WriteError> for UpdateError {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::Locked { message } => UpdateError::Locked(message),
            WriteError::Failed { message, .. } => UpdateError::Storage(message),
        }
    }
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateError::Locked(msg) => write!(f, "File is locked: {}", msg),
            UpdateError::Workbook(msg) => write!(f, "Cannot update workbook: {}", msg),
            UpdateError::Storage(msg) => write!(f, "Cannot save workbook: {}", msg),
        }
    }
}

impl std::error::Error for UpdateError {}

/// `1` → `A`, `28` → `AB`
pub fn column_letters(mut column: u32) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        letters.push(b'A' + rem as u8);
        column = (column - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Split `AB12` into column 28 and row 12
fn parse_cell_ref(reference: &str) -> Option<(u32, u32)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() {
        return None;
    }
    let column = letters.chars().try_fold(0u32, |acc, c| {
        c.is_ascii_alphabetic()
            .then(|| acc * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1))
    })?;
    Some((column, digits.parse().ok()?))
}

fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == name {
            let raw = std::str::from_utf8(&attr.value)?;
            return Ok(Some(unescape(raw)?.into_owned()));
        }
    }
    Ok(None)
}

/// Worksheet part name of `sheet_name`, e.g. `xl/worksheets/sheet2.xml`
fn sheet_part<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    sheet_name: &str,
) -> Result<String> {
    let workbook_xml = read_entry(archive, "xl/workbook.xml")?;
    let mut relationship = None;
    let mut reader = Reader::from_reader(workbook_xml.as_slice());
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                if attribute(&e, b"name")?.as_deref() == Some(sheet_name) {
                    relationship = attribute(&e, b"id")?;
                    break;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    let relationship =
        relationship.ok_or_else(|| anyhow!("sheet '{}' is not in the workbook", sheet_name))?;

    let rels_xml = read_entry(archive, "xl/_rels/workbook.xml.rels")?;
    let mut reader = Reader::from_reader(rels_xml.as_slice());
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if attribute(&e, b"Id")?.as_deref() == Some(relationship.as_str()) {
                    let target = attribute(&e, b"Target")?
                        .ok_or_else(|| anyhow!("relationship {} has no target", relationship))?;
                    return Ok(match target.strip_prefix('/') {
                        Some(absolute) => absolute.to_string(),
                        None => format!("xl/{}", target),
                    });
                }
            }
            Event::Eof => bail!("relationship {} not found", relationship),
            _ => {}
        }
    }
}

fn read_entry<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut entry = archive
        .by_name(name)
        .with_context(|| format!("missing package part {}", name))?;
    let mut data = Vec::new();
    entry.read_to_end(&mut data)?;
    Ok(data)
}

fn write_inline_cell<W: Write>(
    writer: &mut Writer<W>,
    reference: &str,
    style: Option<&str>,
    value: &str,
) -> Result<()> {
    let mut cell = BytesStart::new("c");
    cell.push_attribute(("r", reference));
    if let Some(style) = style {
        cell.push_attribute(("s", style));
    }
    cell.push_attribute(("t", "inlineStr"));

    writer.write_event(Event::Start(cell))?;
    writer.write_event(Event::Start(BytesStart::new("is")))?;
    writer.write_event(Event::Start(BytesStart::new("t")))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new("t")))?;
    writer.write_event(Event::End(BytesEnd::new("is")))?;
    writer.write_event(Event::End(BytesEnd::new("c")))?;
    Ok(())
}

/// Target of one worksheet patch
struct CellPatch<'a> {
    row: u32,
    column: u32,
    value: &'a str,
}

impl CellPatch<'_> {
    fn reference(&self) -> String {
        format!("{}{}", column_letters(self.column), self.row)
    }
}

/// Rewrite worksheet XML so the target cell holds the value as an inline
/// string. An existing cell keeps its style; otherwise the cell is inserted
/// in column order. A missing row is inserted in row order.
fn patch_sheet_xml(xml: &[u8], patch: &CellPatch<'_>) -> Result<Vec<u8>> {
    let reference = patch.reference();
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 64));
    let mut buf = Vec::new();

    let mut written = false;
    let mut in_target_row = false;
    let mut last_row = 0u32;
    let mut last_column = 0u32;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e)
                if !written && e.local_name().as_ref() == b"row" =>
            {
                let row = match attribute(e, b"r")? {
                    Some(r) => r.parse().with_context(|| format!("bad row number '{}'", r))?,
                    None => last_row + 1,
                };
                last_row = row;
                last_column = 0;
                let self_closing = matches!(event, Event::Empty(_));

                if row > patch.row {
                    write_row(&mut writer, patch, &reference)?;
                    written = true;
                    writer.write_event(event)?;
                } else if row == patch.row && self_closing {
                    writer.write_event(Event::Start(e.to_owned()))?;
                    write_inline_cell(&mut writer, &reference, None, patch.value)?;
                    writer.write_event(Event::End(BytesEnd::new("row")))?;
                    written = true;
                } else {
                    in_target_row = row == patch.row;
                    writer.write_event(event)?;
                }
            }
            Event::Start(ref e) | Event::Empty(ref e)
                if in_target_row && e.local_name().as_ref() == b"c" =>
            {
                let column = match attribute(e, b"r")? {
                    Some(r) => parse_cell_ref(&r)
                        .map(|(c, _)| c)
                        .ok_or_else(|| anyhow!("bad cell reference '{}'", r))?,
                    None => last_column + 1,
                };
                last_column = column;

                if column == patch.column {
                    let style = attribute(e, b"s")?;
                    if matches!(event, Event::Start(_)) {
                        skip_to_cell_end(&mut reader)?;
                    }
                    write_inline_cell(&mut writer, &reference, style.as_deref(), patch.value)?;
                    written = true;
                    in_target_row = false;
                } else if column > patch.column {
                    write_inline_cell(&mut writer, &reference, None, patch.value)?;
                    written = true;
                    in_target_row = false;
                    writer.write_event(event)?;
                } else {
                    writer.write_event(event)?;
                }
            }
            Event::End(ref e) if in_target_row && e.local_name().as_ref() == b"row" => {
                write_inline_cell(&mut writer, &reference, None, patch.value)?;
                written = true;
                in_target_row = false;
                writer.write_event(event)?;
            }
            Event::End(ref e) if !written && e.local_name().as_ref() == b"sheetData" => {
                write_row(&mut writer, patch, &reference)?;
                written = true;
                writer.write_event(event)?;
            }
            Event::Eof => break,
            other => writer.write_event(other)?,
        }
        buf.clear();
    }

    if !written {
        bail!("worksheet has no sheetData section");
    }
    Ok(writer.into_inner())
}

fn write_row<W: Write>(writer: &mut Writer<W>, patch: &CellPatch<'_>, reference: &str) -> Result<()> {
    let mut row = BytesStart::new("row");
    row.push_attribute(("r", patch.row.to_string().as_str()));
    writer.write_event(Event::Start(row))?;
    write_inline_cell(writer, reference, None, patch.value)?;
    writer.write_event(Event::End(BytesEnd::new("row")))?;
    Ok(())
}

fn skip_to_cell_end(reader: &mut Reader<&[u8]>) -> Result<()> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::End(e) if e.local_name().as_ref() == b"c" => return Ok(()),
            Event::Eof => bail!("unterminated cell"),
            _ => {}
        }
        buf.clear();
    }
}

/// Return a copy of the package with `value` written at `row`/`column` of
/// `sheet_name`
pub fn patch_cell(
    bytes: &[u8],
    sheet_name: &str,
    row: u32,
    column: u32,
    value: &str,
) -> Result<Vec<u8>, UpdateError> {
    repackage(bytes, sheet_name, &CellPatch { row, column, value })
        .map_err(|e| UpdateError::Workbook(format!("{:#}", e)))
}

fn repackage(bytes: &[u8], sheet_name: &str, patch: &CellPatch<'_>) -> Result<Vec<u8>> {
    if patch.row == 0 || patch.column == 0 {
        bail!("row and column are 1-based");
    }

    let mut archive = ZipArchive::new(Cursor::new(bytes)).context("not an xlsx package")?;
    let part = sheet_part(&mut archive, sheet_name)?;
    let sheet_xml = read_entry(&mut archive, &part)?;
    let patched = patch_sheet_xml(&sheet_xml, patch)?;
    debug!("Patched {} ({} -> {} bytes)", part, sheet_xml.len(), patched.len());

    let mut out = ZipWriter::new(Cursor::new(Vec::with_capacity(bytes.len() + 256)));
    for i in 0..archive.len() {
        let name = archive.by_index_raw(i)?.name().to_string();
        if name == part {
            let method = archive.by_index_raw(i)?.compression();
            let options = SimpleFileOptions::default().compression_method(method);
            out.start_file(name.as_str(), options)?;
            out.write_all(&patched)?;
        } else {
            out.raw_copy_file(archive.by_index_raw(i)?)?;
        }
    }
    Ok(out.finish()?.into_inner())
}

/// Write the configured status value into `row` and submit the workbook
pub async fn update(
    store: &dyn DocumentStore,
    relative_path: &str,
    bytes: &[u8],
    sheet_name: &str,
    row: u32,
    config: &WorkbookConfig,
) -> Result<(), UpdateError> {
    let patched = patch_cell(
        bytes,
        sheet_name,
        row,
        config.status_column,
        &config.status_value,
    )?;

    match store.file_write(relative_path, patched).await {
        Ok(()) => {
            info!(
                "Wrote '{}' to {}{} of '{}' in {}",
                config.status_value,
                column_letters(config.status_column),
                row,
                sheet_name,
                relative_path
            );
            Ok(())
        }
        Err(err) => {
            warn!("Saving {} failed: {}", relative_path, err);
            Err(err.into())
        }
    }
}

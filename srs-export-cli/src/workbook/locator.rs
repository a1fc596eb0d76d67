//! Finding the row of a lookup label inside an SRS workbook
//!
//! Sheet selection and row matching are both ordered lists of strategies.
//! Each strategy either commits to a match or has no opinion, and the
//! first one with an opinion wins.

use calamine::{Data, Range, Reader, Xlsx};
use log::debug;
use std::fmt;
use std::io::Cursor;

use crate::config::WorkbookConfig;

/// How the target sheet was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetSelection {
    ExactName,
    NamePrefix,
    SecondSheet,
}

impl fmt::Display for SheetSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetSelection::ExactName => write!(f, "exact name"),
            SheetSelection::NamePrefix => write!(f, "name prefix"),
            SheetSelection::SecondSheet => write!(f, "second sheet"),
        }
    }
}

/// How the row label matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindMethod {
    Exact,
    WithoutOf,
}

impl fmt::Display for FindMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindMethod::Exact => write!(f, "exact match"),
            FindMethod::WithoutOf => write!(f, "match without 'of'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub sheet_name: String,
    pub sheet_selection: SheetSelection,
    pub find_method: FindMethod,
    /// Native 1-based worksheet row number
    pub row_number: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocateError {
    /// The bytes are not a readable xlsx package
    Workbook(String),
    NoSuitableSheet { sheets: Vec<String> },
    RowNotFound { sheet: String },
}

impl LocateError {
    /// We looked and the data isn't there, as opposed to not being able to look
    pub fn is_negative_result(&self) -> bool {
        !matches!(self, LocateError::Workbook(_))
    }
}

impl fmt::Display for LocateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocateError::Workbook(msg) => write!(f, "Cannot open workbook: {}", msg),
            LocateError::NoSuitableSheet { sheets } => write!(
                f,
                "No suitable sheet found. Available sheets: {}",
                sheets.join(", ")
            ),
            LocateError::RowNotFound { sheet } => {
                write!(f, "Row not found on sheet '{}'", sheet)
            }
        }
    }
}

impl std::error::Error for LocateError {}

type SheetStrategy = fn(&[String], &WorkbookConfig) -> Option<usize>;

fn exact_name(sheets: &[String], config: &WorkbookConfig) -> Option<usize> {
    sheets.iter().position(|s| *s == config.sheet_name)
}

fn name_prefix(sheets: &[String], config: &WorkbookConfig) -> Option<usize> {
    sheets.iter().position(|s| s.starts_with(&config.sheet_prefix))
}

fn second_sheet(sheets: &[String], _config: &WorkbookConfig) -> Option<usize> {
    (sheets.len() >= 2).then_some(1)
}

const SHEET_STRATEGIES: &[(SheetSelection, SheetStrategy)] = &[
    (SheetSelection::ExactName, exact_name),
    (SheetSelection::NamePrefix, name_prefix),
    (SheetSelection::SecondSheet, second_sheet),
];

/// Pick the entry sheet from the workbook's sheet names
pub fn select_sheet(
    sheets: &[String],
    config: &WorkbookConfig,
) -> Option<(usize, SheetSelection)> {
    SHEET_STRATEGIES
        .iter()
        .find_map(|(selection, strategy)| strategy(sheets, config).map(|i| (i, *selection)))
}

type RowStrategy = fn(&str, &str) -> bool;

fn exact(cell: &str, label: &str) -> bool {
    cell == label
}

fn without_of(cell: &str, label: &str) -> bool {
    cell.replace(" of ", " ") == label.replace(" of ", " ")
}

const ROW_STRATEGIES: &[(FindMethod, RowStrategy)] = &[
    (FindMethod::Exact, exact),
    (FindMethod::WithoutOf, without_of),
];

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Compare one column A text against the label
pub fn match_label(cell: &str, label: &str) -> Option<FindMethod> {
    let cell = normalize(cell);
    let label = normalize(label);
    ROW_STRATEGIES
        .iter()
        .find(|(_, strategy)| strategy(&cell, &label))
        .map(|(method, _)| *method)
}

/// Scan column A top to bottom; the first matching row wins
pub fn find_row(range: &Range<Data>, label: &str) -> Option<(u32, FindMethod)> {
    let (first_row, first_col) = range.start()?;
    if first_col != 0 {
        // used range starts right of column A
        return None;
    }

    range.rows().enumerate().find_map(|(offset, cells)| {
        let text = match cells.first() {
            Some(Data::Empty) | None => return None,
            Some(cell) => cell.to_string(),
        };
        if text.trim().is_empty() {
            return None;
        }
        match_label(&text, label).map(|method| (first_row + offset as u32 + 1, method))
    })
}

pub fn open(bytes: &[u8]) -> Result<Xlsx<Cursor<&[u8]>>, LocateError> {
    Xlsx::new(Cursor::new(bytes)).map_err(|e| LocateError::Workbook(e.to_string()))
}

/// Find the row holding `label` on the entry sheet
pub fn locate(bytes: &[u8], label: &str, config: &WorkbookConfig) -> Result<Located, LocateError> {
    let mut workbook = open(bytes)?;
    let sheets = workbook.sheet_names();

    let (index, sheet_selection) =
        select_sheet(&sheets, config).ok_or_else(|| LocateError::NoSuitableSheet {
            sheets: sheets.clone(),
        })?;
    let sheet_name = sheets[index].clone();
    debug!("Using sheet '{}' ({})", sheet_name, sheet_selection);

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| LocateError::Workbook(e.to_string()))?;

    let (row_number, find_method) =
        find_row(&range, label).ok_or_else(|| LocateError::RowNotFound {
            sheet: sheet_name.clone(),
        })?;
    debug!(
        "Label '{}' found at row {} ({})",
        label, row_number, find_method
    );

    Ok(Located {
        sheet_name,
        sheet_selection,
        find_method,
        row_number,
    })
}

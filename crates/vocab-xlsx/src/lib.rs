//! TSV → XLSX conversion for vocabulary lists.
//!
//! The crate works directly at the Open Packaging Convention layer instead of
//! going through a spreadsheet model:
//!
//! - [`create_workbook`] assembles a fresh single-sheet container from the six
//!   parts every SpreadsheetML consumer expects.
//! - [`append_worksheet`] loads an existing container part-by-part, adds one
//!   worksheet (plus its `<sheet>` entry, relationship and content-type
//!   override) and atomically replaces the file. Existing worksheets are never
//!   rewritten or renumbered.
//!
//! Cells are always written as inline strings; there is no shared-string
//! table, no number typing and no styling beyond the minimal `styles.xml`.

pub mod address;
pub mod cli;
mod minimal;
pub mod openxml;
mod package;
pub mod sheet_name;
pub mod tsv;
mod worksheet;
mod writer;
pub mod xml;

pub use address::{column_letters, CellRef};
pub use package::{XlsxPackage, XlsxPackageLimits};
pub use sheet_name::{sanitize_sheet_name, DEFAULT_SHEET_NAME, MAX_SHEET_NAME_LEN};
pub use tsv::{TsvTable, VocabColumn};
pub use worksheet::{worksheet_document, worksheet_xml};
pub use writer::{
    append_worksheet, append_worksheet_to_package, create_workbook, new_workbook_package,
    AppendOutcome,
};
pub use xml::{NamespaceScope, XmlDocument, XmlElement, XmlNode};

use thiserror::Error;
use vocab_fs::AtomicWriteError;

#[derive(Debug, Error)]
pub enum XlsxError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xml attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("tsv error: {0}")]
    Tsv(#[from] csv::Error),
    #[error("workbook is missing required part: {0}")]
    MissingPart(String),
    #[error("{part} is missing <{element}> element")]
    MissingElement { part: String, element: &'static str },
    #[error("worksheet '{0}' already exists")]
    SheetExists(String),
    #[error("sheet path '{0}' already exists")]
    WorksheetPartExists(String),
    #[error("invalid xlsx: {0}")]
    Invalid(String),
    #[error(
        "xlsx package part is too large to load safely: {part} is {size} bytes (max {max} bytes)"
    )]
    PartTooLarge { part: String, size: u64, max: u64 },
    #[error("xlsx package is too large to load safely: {total} bytes uncompressed (max {max})")]
    PackageTooLarge { total: u64, max: u64 },
}

impl From<AtomicWriteError<XlsxError>> for XlsxError {
    fn from(err: AtomicWriteError<XlsxError>) -> Self {
        match err {
            AtomicWriteError::Io(err) => XlsxError::Io(err),
            AtomicWriteError::Writer(err) => err,
        }
    }
}

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use crate::{
    append_worksheet, create_workbook, sanitize_sheet_name, AppendOutcome, TsvTable,
    DEFAULT_SHEET_NAME,
};

/// Command-line arguments for `tsv_to_xlsx`.
#[derive(Debug, Parser)]
#[command(about = "Write a TSV vocabulary list into an XLSX workbook as a new worksheet.")]
pub struct Args {
    /// Tab-separated input file. Its first row is copied as the header row.
    tsv_path: PathBuf,

    /// Workbook to create or append to (default: the TSV path with an `.xlsx` extension).
    #[arg(long, value_name = "PATH")]
    xlsx: Option<PathBuf>,

    /// Worksheet name (default: the TSV file stem).
    ///
    /// `[ ] : * ? / \` are removed and the name is cut to 31 characters.
    #[arg(long, value_name = "NAME")]
    sheet: Option<String>,

    /// Log filter used when `RUST_LOG` is not set (e.g. `info`, `vocab_xlsx=debug`).
    #[arg(long, default_value = "warn")]
    log_level: String,
}

/// What [`convert`] did to the destination workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion {
    Created { path: PathBuf, sheet_name: String },
    Appended { path: PathBuf, outcome: AppendOutcome },
}

impl fmt::Display for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conversion::Created { path, sheet_name } => {
                write!(f, "Created {} with sheet '{sheet_name}'", path.display())
            }
            Conversion::Appended { path, outcome } => {
                write!(f, "Appended '{}' to {}", outcome.sheet_name, path.display())
            }
        }
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    run_with_args(args)
}

pub fn run_with_args(args: Args) -> Result<()> {
    init_logging(&args.log_level);
    let conversion = convert(&args.tsv_path, args.xlsx.as_deref(), args.sheet.as_deref())?;
    println!("{conversion}");
    Ok(())
}

/// Read `tsv_path` and write it as one worksheet.
///
/// Appends when the destination already exists, creates it otherwise. Default
/// paths and names are derived from `tsv_path` on every call.
pub fn convert(tsv_path: &Path, xlsx_path: Option<&Path>, sheet: Option<&str>) -> Result<Conversion> {
    if !tsv_path.is_file() {
        anyhow::bail!("TSV file not found: {}", tsv_path.display());
    }

    let xlsx_path = xlsx_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_xlsx_path(tsv_path));
    // An empty `--sheet` falls through to the file stem.
    let sheet_name = sheet
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_sheet_name(tsv_path));
    let sheet_name = sanitize_sheet_name(&sheet_name);

    let table = TsvTable::read_path(tsv_path)
        .with_context(|| format!("read {}", tsv_path.display()))?;
    let columns = table.detected_columns();
    if columns.is_empty() {
        log::debug!("no vocabulary columns recognized in header; rows copied as-is");
    } else {
        for (column, idx) in &columns {
            log::debug!("{} column at index {idx}", column.as_str());
        }
    }
    let rows = table.into_rows();

    if xlsx_path.exists() {
        let outcome = append_worksheet(&xlsx_path, &sheet_name, &rows)
            .with_context(|| format!("append sheet '{sheet_name}' to {}", xlsx_path.display()))?;
        Ok(Conversion::Appended {
            path: xlsx_path,
            outcome,
        })
    } else {
        let sheet_name = create_workbook(&xlsx_path, &sheet_name, &rows)
            .with_context(|| format!("create {}", xlsx_path.display()))?;
        Ok(Conversion::Created {
            path: xlsx_path,
            sheet_name,
        })
    }
}

pub fn default_xlsx_path(tsv_path: &Path) -> PathBuf {
    tsv_path.with_extension("xlsx")
}

fn default_sheet_name(tsv_path: &Path) -> String {
    tsv_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| DEFAULT_SHEET_NAME.to_string())
}

/// Install a stderr `tracing` subscriber, which also receives `log` records.
/// `RUST_LOG` wins over `level`.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn args_parse_with_defaults() {
        let args = Args::try_parse_from(["tsv_to_xlsx", "lists/verbs.tsv"]).expect("parse");
        assert_eq!(args.tsv_path, PathBuf::from("lists/verbs.tsv"));
        assert_eq!(args.xlsx, None);
        assert_eq!(args.sheet, None);
        assert_eq!(args.log_level, "warn");
    }

    #[test]
    fn args_parse_overrides() {
        let args = Args::try_parse_from([
            "tsv_to_xlsx",
            "verbs.tsv",
            "--xlsx",
            "out/book.xlsx",
            "--sheet",
            "Irregular",
            "--log-level",
            "debug",
        ])
        .expect("parse");
        assert_eq!(args.xlsx, Some(PathBuf::from("out/book.xlsx")));
        assert_eq!(args.sheet.as_deref(), Some("Irregular"));
        assert_eq!(args.log_level, "debug");
    }

    #[test]
    fn defaults_come_from_the_tsv_path() {
        let tsv = Path::new("lists/Spanish A1.tsv");
        assert_eq!(default_xlsx_path(tsv), PathBuf::from("lists/Spanish A1.xlsx"));
        assert_eq!(default_sheet_name(tsv), "Spanish A1");
        assert_eq!(default_sheet_name(Path::new("")), DEFAULT_SHEET_NAME);
    }

    #[test]
    fn missing_tsv_is_reported_before_any_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tsv = dir.path().join("missing.tsv");

        let err = convert(&tsv, None, None).expect_err("missing tsv");
        assert!(err.to_string().starts_with("TSV file not found"), "{err}");
        assert!(!dir.path().join("missing.xlsx").exists());
    }

    #[test]
    fn empty_sheet_argument_uses_the_file_stem() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tsv = dir.path().join("verbs.tsv");
        std::fs::write(&tsv, "word\tmeaning\nser\tto be\n").expect("write tsv");

        match convert(&tsv, None, Some("")).expect("convert") {
            Conversion::Created { path, sheet_name } => {
                assert_eq!(sheet_name, "verbs");
                assert_eq!(path, dir.path().join("verbs.xlsx"));
            }
            other => panic!("expected a new workbook, got {other:?}"),
        }
    }

    #[test]
    fn conversion_messages() {
        let created = Conversion::Created {
            path: PathBuf::from("book.xlsx"),
            sheet_name: "Verbs".to_string(),
        };
        assert_eq!(created.to_string(), "Created book.xlsx with sheet 'Verbs'");

        let appended = Conversion::Appended {
            path: PathBuf::from("book.xlsx"),
            outcome: AppendOutcome {
                sheet_name: "Nouns".to_string(),
                sheet_id: 2,
                relationship_id: "rId3".to_string(),
                worksheet_part: "xl/worksheets/sheet2.xml".to_string(),
            },
        };
        assert_eq!(appended.to_string(), "Appended 'Nouns' to book.xlsx");
    }
}

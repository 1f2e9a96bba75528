//! Tab-separated vocabulary lists.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::StringRecord;

use crate::XlsxError;

/// The columns a vocabulary list is expected to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VocabColumn {
    Term,
    Definition,
    PartOfSpeech,
    Cefr,
    Tags,
}

impl VocabColumn {
    pub const ALL: [VocabColumn; 5] = [
        VocabColumn::Term,
        VocabColumn::Definition,
        VocabColumn::PartOfSpeech,
        VocabColumn::Cefr,
        VocabColumn::Tags,
    ];

    /// Lower-case header names accepted for this column.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            VocabColumn::Term => &["spanish", "word", "palabra"],
            VocabColumn::Definition => &["english", "definition", "meaning"],
            VocabColumn::PartOfSpeech => &["pos", "part of speech", "speech"],
            VocabColumn::Cefr => &["cefr", "level"],
            VocabColumn::Tags => &["tags", "tag"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VocabColumn::Term => "term",
            VocabColumn::Definition => "definition",
            VocabColumn::PartOfSpeech => "part of speech",
            VocabColumn::Cefr => "cefr",
            VocabColumn::Tags => "tags",
        }
    }

    /// Case-insensitive, whitespace-trimmed header match.
    pub fn matches_header(self, header: &str) -> bool {
        let header = header.trim_start_matches('\u{feff}').trim().to_lowercase();
        self.aliases().iter().any(|alias| *alias == header)
    }
}

/// Rows of a TSV file, header included, exactly as they appeared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TsvTable {
    rows: Vec<Vec<String>>,
}

impl TsvTable {
    pub fn read_path(path: impl AsRef<Path>) -> Result<Self, XlsxError> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse tab-separated UTF-8 text.
    ///
    /// Rows may have any number of fields and are kept that way. Fields may
    /// be `"`-quoted to carry tabs or newlines. A blank line becomes an empty
    /// row, so every later row keeps its line position.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, XlsxError> {
        let mut input = Vec::new();
        reader.read_to_end(&mut input)?;

        let mut tsv = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_reader(input.as_slice());

        // The csv reader drops blank lines silently; they are recovered from
        // the bytes it consumed in front of each record.
        let mut record = StringRecord::new();
        let mut rows: Vec<Vec<String>> = Vec::new();
        let mut consumed = 0usize;
        let mut after_cr = false;
        loop {
            let more = tsv.read_record(&mut record)?;
            let end = usize::try_from(tsv.position().byte())
                .map_or(input.len(), |end| end.min(input.len()));
            let span = &input[consumed.min(end)..end];

            let blank = leading_blank_lines(span, after_cr);
            rows.extend(std::iter::repeat_with(Vec::new).take(blank));
            if !more {
                break;
            }
            rows.push(record.iter().map(str::to_string).collect());

            after_cr = span.last() == Some(&b'\r');
            consumed = end;
        }

        log::debug!("read {} tsv rows", rows.len());
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<String>> {
        self.rows
    }

    pub fn header(&self) -> Option<&[String]> {
        self.rows.first().map(Vec::as_slice)
    }

    /// Index of the first header cell naming `column`.
    pub fn column(&self, column: VocabColumn) -> Option<usize> {
        self.header()?
            .iter()
            .position(|name| column.matches_header(name))
    }

    /// Every vocabulary column found in the header, in [`VocabColumn::ALL`] order.
    pub fn detected_columns(&self) -> Vec<(VocabColumn, usize)> {
        VocabColumn::ALL
            .into_iter()
            .filter_map(|column| self.column(column).map(|idx| (column, idx)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Number of empty lines at the start of `span`. `\r\n`, `\n` and `\r` each
/// end one line. With `after_cr`, a leading `\n` finishes the previous
/// record's `\r\n` and is not counted.
fn leading_blank_lines(span: &[u8], after_cr: bool) -> usize {
    let mut rest = span;
    if after_cr {
        rest = rest.strip_prefix(b"\n").unwrap_or(rest);
    }

    let mut count = 0;
    loop {
        rest = match rest {
            [b'\r', b'\n', tail @ ..] | [b'\r', tail @ ..] | [b'\n', tail @ ..] => tail,
            _ => return count,
        };
        count += 1;
    }
}

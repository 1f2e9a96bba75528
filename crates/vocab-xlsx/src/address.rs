use core::fmt;

/// A single cell position within a worksheet.
///
/// Rows and columns are **0-indexed**:
/// - `row = 0` is row `1`
/// - `col = 0` is column `A`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    #[inline]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// A1 notation (e.g. `A1`, `AZ7`).
    pub fn to_a1(self) -> String {
        let mut out = column_letters(self.col);
        out.push_str(&(u64::from(self.row) + 1).to_string());
        out
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1())
    }
}

/// Column letters for a 0-based column index, using bijective base-26
/// (`0 → A`, `25 → Z`, `26 → AA`).
pub fn column_letters(col: u32) -> String {
    // Widened so `u32::MAX + 1` does not overflow.
    let mut n = u64::from(col) + 1;
    let mut buf = [0u8; 8];
    let mut i = 0usize;
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        buf[i] = b'A' + rem;
        i += 1;
        n = (n - 1) / 26;
    }
    buf[..i].iter().rev().map(|b| *b as char).collect()
}

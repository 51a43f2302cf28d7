use crate::CodeId;

/// A position in a specific input file, tracked as one-based line and column.
///
/// The tokenizer produces line/col positions directly, so unlike byte-offset
/// spans no lookup table is required to report an error. `len` is the number
/// of characters the location covers, used to underline the offending text.
#[derive(Debug, Eq, PartialEq, Hash, Clone, Copy)]
pub struct SourceLocation {
    pub file: CodeId,
    pub line: u32,
    pub col: u32,
    pub len: u32,
}

impl SourceLocation {
    pub fn new(file: CodeId, line: u32, col: u32, len: u32) -> Self {
        SourceLocation {
            file,
            line,
            col,
            len,
        }
    }

    /// Returns the same location covering `len` characters
    pub fn with_len(self, len: u32) -> Self {
        SourceLocation { len, ..self }
    }

    /// Resolves this location to a character range into `source`.
    ///
    /// Positions past the end of the source clamp to the last character,
    /// so a location pointing at EOF still renders.
    pub fn char_range(&self, source: &str) -> (usize, usize) {
        let total = source.chars().count();
        let mut line = 1;
        let mut col = 1;
        let mut start = None;
        for (index, character) in source.chars().enumerate() {
            if line == self.line && col == self.col {
                start = Some(index);
                break;
            }
            if character == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        let start = start.unwrap_or(total.saturating_sub(1));
        let end = (start + self.len.max(1) as usize).min(total);
        (start, end.max(start))
    }
}

// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::IngestError;

pub const DEFAULT_STRUCTURE_COLUMN: &str = "smiles";

/// Streams one column of a delimited file in bounded chunks.
pub struct StructureChunkReader<R> {
    reader: R,
    delimiter: char,
    column: usize,
    line_no: usize,
    buf: String,
    exhausted: bool,
}

#[must_use]
pub fn delimiter_for_path(path: &Path) -> char {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("tsv" | "tab") => '\t',
        _ => ',',
    }
}

pub fn open_structure_source(
    path: &Path,
    column_name: &str,
) -> Result<StructureChunkReader<BufReader<fs::File>>, IngestError> {
    let file = fs::File::open(path)
        .map_err(|e| IngestError(format!("cannot open {}: {e}", path.display())))?;
    StructureChunkReader::new(BufReader::new(file), delimiter_for_path(path), column_name)
        .map_err(|e| IngestError(format!("{}: {}", path.display(), e.0)))
}

impl<R: BufRead> StructureChunkReader<R> {
    /// Reads the header row and locates `column_name` (exact match first,
    /// then ASCII case-insensitive).
    pub fn new(reader: R, delimiter: char, column_name: &str) -> Result<Self, IngestError> {
        let mut this = Self {
            reader,
            delimiter,
            column: 0,
            line_no: 0,
            buf: String::new(),
            exhausted: false,
        };
        let fields = this.next_record()?.ok_or_else(|| {
            IngestError("missing header row; expected a structure column".to_string())
        })?;
        this.column = fields
            .iter()
            .position(|f| f.trim() == column_name)
            .or_else(|| {
                fields
                    .iter()
                    .position(|f| f.trim().eq_ignore_ascii_case(column_name))
            })
            .ok_or_else(|| {
                IngestError(format!(
                    "structure column {column_name:?} not found in header {fields:?}"
                ))
            })?;
        Ok(this)
    }

    /// Next chunk of at most `chunk_size` structure cells, `None` at end of
    /// input. Blank lines are skipped; a row too short to reach the column
    /// yields an empty cell, which the encoder rejects like any invalid
    /// structure.
    pub fn next_chunk(&mut self, chunk_size: usize) -> Result<Option<Vec<String>>, IngestError> {
        if chunk_size == 0 {
            return Err(IngestError("chunk size must be >= 1".to_string()));
        }
        if self.exhausted {
            return Ok(None);
        }
        let mut chunk = Vec::with_capacity(chunk_size.min(65_536));
        while chunk.len() < chunk_size {
            let Some(mut fields) = self.next_record()? else {
                self.exhausted = true;
                break;
            };
            let cell = if self.column < fields.len() {
                fields.swap_remove(self.column)
            } else {
                String::new()
            };
            chunk.push(cell.trim().to_string());
        }
        if chunk.is_empty() {
            Ok(None)
        } else {
            Ok(Some(chunk))
        }
    }

    /// One logical record. A quoted field may span physical lines; its line
    /// breaks are kept in the field value.
    fn next_record(&mut self) -> Result<Option<Vec<String>>, IngestError> {
        loop {
            self.buf.clear();
            if !self.read_physical_line()? {
                return Ok(None);
            }
            if self.line_no == 1 && self.buf.starts_with('\u{feff}') {
                self.buf.replace_range(..'\u{feff}'.len_utf8(), "");
            }
            if !self.buf.trim().is_empty() {
                break;
            }
        }
        let first_line = self.line_no;
        loop {
            let (fields, open_quote) = scan_record(trim_line_end(&self.buf), self.delimiter);
            if !open_quote {
                return Ok(Some(fields));
            }
            if !self.read_physical_line()? {
                return Err(IngestError(format!(
                    "line {first_line}: unterminated quoted field"
                )));
            }
        }
    }

    /// Appends the next physical line to `buf`; `false` at end of input.
    fn read_physical_line(&mut self) -> Result<bool, IngestError> {
        let n = self
            .reader
            .read_line(&mut self.buf)
            .map_err(|e| IngestError(format!("line {}: {e}", self.line_no + 1)))?;
        if n == 0 {
            return Ok(false);
        }
        self.line_no += 1;
        Ok(true)
    }

    #[must_use]
    pub fn lines_read(&self) -> usize {
        self.line_no
    }
}

fn trim_line_end(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

/// Splits one record, honouring double-quoted fields with `""` escapes.
/// The flag is set when the text ends inside an open quote.
fn scan_record(text: &str, delimiter: char) -> (Vec<String>, bool) {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = text.chars().peekable();
    let mut in_quotes = false;
    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else if c == '"' && field.is_empty() {
            in_quotes = true;
        } else if c == delimiter {
            fields.push(std::mem::take(&mut field));
        } else {
            field.push(c);
        }
    }
    fields.push(field);
    (fields, in_quotes)
}

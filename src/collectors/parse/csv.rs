//! Space-delimited table decoding for LSF commands without a JSON mode.
//!
//! The first non-empty line names the columns. Each following line is split
//! on single spaces with leading whitespace of every field skipped, so the
//! column padding LSF prints collapses into one delimiter. Quotes are lazy:
//! a stray `"` is kept as a literal character instead of being an error.
//! Bytes that are not valid UTF-8 are replaced rather than rejected.

use crate::collectors::error::CollectorError;
use crate::collectors::parse::normalize::TrimReader;
use serde::de::DeserializeOwned;
use serde::de::value::{self, MapDeserializer};
use std::io::{BufRead, BufReader, Read, Split};
use std::marker::PhantomData;

const FORMAT: &str = "csv";

#[derive(Clone, Copy, Debug, Default)]
pub struct CsvOptions {
    /// Join surplus fields into the last column instead of rejecting the row.
    /// Needed when the final column is free text (e.g. `lshosts` RESOURCES).
    pub merge_tail: bool,
    /// Fill missing trailing fields with empty values. `lsload` prints an
    /// unavailable host with its status only.
    pub pad_short: bool,
}

/// Split one line into fields.
#[must_use]
pub fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace() && *c != '\n').is_some() {}

        let mut field = String::new();
        let mut ended_by_delimiter = false;

        if chars.next_if_eq(&'"').is_some() {
            loop {
                match chars.next() {
                    Some('"') => match chars.peek() {
                        Some('"') => {
                            chars.next();
                            field.push('"');
                        }
                        Some(' ') => {
                            chars.next();
                            ended_by_delimiter = true;
                            break;
                        }
                        None => break,
                        Some(_) => field.push('"'),
                    },
                    Some(c) => field.push(c),
                    None => break,
                }
            }
        } else {
            for c in chars.by_ref() {
                if c == ' ' {
                    ended_by_delimiter = true;
                    break;
                }
                field.push(c);
            }
        }

        fields.push(field);
        if !ended_by_delimiter {
            break;
        }
    }

    fields
}

/// Lazily decoded records of one command's output.
pub struct Records<R, T> {
    lines: Split<BufReader<TrimReader<R>>>,
    header: Vec<String>,
    options: CsvOptions,
    line_no: usize,
    _record: PhantomData<fn() -> T>,
}

impl<R: Read, T: DeserializeOwned> Records<R, T> {
    /// Read the header line and prepare to decode the rows after it.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::DecodeFailed`] if the output cannot be read.
    pub fn new(reader: R, options: CsvOptions) -> Result<Self, CollectorError> {
        let mut records = Self {
            lines: BufReader::new(TrimReader::new(reader)).split(b'\n'),
            header: Vec::new(),
            options,
            line_no: 0,
            _record: PhantomData,
        };

        if let Some(line) = records.next_line() {
            records.header = split_fields(&line?);
        }

        Ok(records)
    }

    #[must_use]
    pub fn header(&self) -> &[String] {
        &self.header
    }

    fn next_line(&mut self) -> Option<Result<String, CollectorError>> {
        loop {
            let line = self.lines.next()?;
            self.line_no += 1;
            match line {
                Ok(bytes) => {
                    let l = String::from_utf8_lossy(&bytes);
                    if !l.trim().is_empty() {
                        return Some(Ok(l.trim_end_matches('\r').to_string()));
                    }
                }
                Err(e) => return Some(Err(CollectorError::decode(FORMAT, e))),
            }
        }
    }

    fn decode_row(&self, line: &str) -> Result<T, CollectorError> {
        let mut fields = split_fields(line);

        if fields.len() > self.header.len() && self.options.merge_tail && !self.header.is_empty() {
            let tail = fields.split_off(self.header.len() - 1).join(" ");
            fields.push(tail);
        }

        if fields.len() < self.header.len() && self.options.pad_short {
            fields.resize(self.header.len(), String::new());
        }

        if fields.len() != self.header.len() {
            return Err(CollectorError::decode(
                FORMAT,
                format!(
                    "record on line {}: wrong number of fields (expected {}, got {})",
                    self.line_no,
                    self.header.len(),
                    fields.len()
                ),
            ));
        }

        let pairs = self.header.iter().map(String::as_str).zip(fields);
        T::deserialize(MapDeserializer::<_, value::Error>::new(pairs)).map_err(|e| {
            CollectorError::decode(FORMAT, format!("record on line {}: {e}", self.line_no))
        })
    }
}

impl<R: Read, T: DeserializeOwned> Iterator for Records<R, T> {
    type Item = Result<T, CollectorError>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = match self.next_line()? {
            Ok(line) => line,
            Err(e) => return Some(Err(e)),
        };
        Some(self.decode_row(&line))
    }
}

/// Decode a whole output batch; any malformed row fails the batch.
///
/// # Errors
///
/// Returns [`CollectorError::DecodeFailed`] on the first undecodable row.
pub fn decode<T: DeserializeOwned>(output: &[u8]) -> Result<Vec<T>, CollectorError> {
    decode_with(output, CsvOptions::default())
}

/// [`decode`] with explicit options.
///
/// # Errors
///
/// Returns [`CollectorError::DecodeFailed`] on the first undecodable row.
pub fn decode_with<T: DeserializeOwned>(
    output: &[u8],
    options: CsvOptions,
) -> Result<Vec<T>, CollectorError> {
    Records::new(output, options)?.collect()
}

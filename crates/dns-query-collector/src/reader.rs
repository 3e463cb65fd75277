// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::errors::{FileAccessError, ReadError};
use crate::query::{parse_line, QueryRecord};
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::iter::FusedIterator;
use std::path::Path;
use tracing::debug;

/// Streams [`QueryRecord`]s out of a query log, one line at a time.
///
/// Lines that are not query entries are skipped. The reader is single pass, so
/// reprocessing a log means opening it again. The underlying file is closed
/// when the reader is dropped.
pub struct QueryLogReader<R = BufReader<File>> {
    reader: R,
    buffer: Vec<u8>,
    line_number: u64,
    done: bool,
}

impl QueryLogReader {
    /// Opens `path` for streaming. The path must name an existing regular file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FileAccessError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(FileAccessError::NotFound(path.to_path_buf()));
        }

        let file = File::open(path).map_err(|source| FileAccessError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Reading query log {}", path.display());

        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: BufRead> QueryLogReader<R> {
    pub fn from_reader(reader: R) -> Self {
        QueryLogReader {
            reader,
            buffer: Vec::with_capacity(256),
            line_number: 0,
            done: false,
        }
    }

    /// Number of lines consumed so far, matching or not.
    pub fn lines_read(&self) -> u64 {
        self.line_number
    }
}

impl<R: BufRead> Iterator for QueryLogReader<R> {
    type Item = Result<QueryRecord, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.buffer.clear();
            match self.reader.read_until(b'\n', &mut self.buffer) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    self.line_number += 1;
                    let line = trim_line_ending(&self.buffer);
                    match std::str::from_utf8(line) {
                        Ok(line) => {
                            if let Some(record) = parse_line(line) {
                                return Some(Ok(record));
                            }
                        }
                        Err(_) => {
                            return Some(Err(ReadError::Decode {
                                line: self.line_number,
                            }))
                        }
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(source) => {
                    self.done = true;
                    return Some(Err(ReadError::Io {
                        line: self.line_number + 1,
                        source,
                    }));
                }
            }
        }
        None
    }
}

impl<R: BufRead> FusedIterator for QueryLogReader<R> {}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

//! File sources
//!
//! Opens a document for chunked reading. Files ending in `.gz` are decompressed
//! transparently; everything else is read as-is. The returned reader owns the
//! file handle, so it is closed on every exit path when dropped.

use crate::error::{Error, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

/// True when the file name selects gzip transport
pub fn is_gzip(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// Open `path` for reading, wrapping it in a gzip decoder when needed
pub fn open_source(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).map_err(|source| Error::Resource {
        path: path.to_path_buf(),
        source,
    })?;

    let gzip = is_gzip(path);
    tracing::debug!(path = %path.display(), gzip, "Opened XML source");

    if gzip {
        Ok(Box::new(MultiGzDecoder::new(BufReader::new(file))))
    } else {
        Ok(Box::new(file))
    }
}

/// Fill `buf` with the next chunk, retrying interrupted reads; 0 means end of input
pub fn read_chunk(source: &mut dyn Read, buf: &mut [u8], path: &Path) -> Result<usize> {
    loop {
        match source.read(buf) {
            Ok(n) => return Ok(n),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(Error::Resource {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }
}

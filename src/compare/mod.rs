//! File equality strategies.
//!
//! Decides whether a replica file already holds the same content as its
//! source. All functions here are pure with respect to process state: they
//! only read the two files they are given.

pub mod digest;

use serde::Deserialize;
use std::convert::Infallible;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use digest::{digest_file, md5_hasher, sha256_hasher};

/// Read granularity for streaming comparisons (1 MiB).
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Content verification policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum ComparatorKind {
    /// Trust the existence/size/mtime pre-filter only.
    None,
    /// Chunked byte-for-byte comparison (default).
    #[default]
    Binary,
    Md5,
    Sha256,
}

impl ComparatorKind {
    /// Parse a comparator name case-insensitively.
    /// Unrecognized names fall back to `Binary`.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "none" => ComparatorKind::None,
            "md5" => ComparatorKind::Md5,
            "sha256" => ComparatorKind::Sha256,
            _ => ComparatorKind::Binary,
        }
    }
}

impl FromStr for ComparatorKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<String> for ComparatorKind {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl fmt::Display for ComparatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComparatorKind::None => "NONE",
            ComparatorKind::Binary => "Binary",
            ComparatorKind::Md5 => "MD5",
            ComparatorKind::Sha256 => "SHA256",
        };
        f.write_str(name)
    }
}

/// Compare two existing files under the given policy.
pub fn files_equal(kind: ComparatorKind, a: &Path, b: &Path) -> io::Result<bool> {
    match kind {
        ComparatorKind::None => Ok(true),
        ComparatorKind::Binary => binary_equal(a, b),
        ComparatorKind::Md5 => md5_equal(a, b),
        ComparatorKind::Sha256 => sha256_equal(a, b),
    }
}

/// Run [`files_equal`] on the blocking pool.
pub async fn files_equal_async(kind: ComparatorKind, a: PathBuf, b: PathBuf) -> io::Result<bool> {
    if kind == ComparatorKind::None {
        return Ok(true);
    }
    tokio::task::spawn_blocking(move || files_equal(kind, &a, &b))
        .await
        .map_err(io::Error::other)?
}

/// Byte-for-byte comparison in 1 MiB chunks.
///
/// Returns false at the first chunk whose length or content differs, true
/// only when both files hit end-of-file together.
pub fn binary_equal(a: &Path, b: &Path) -> io::Result<bool> {
    let mut file_a = File::open(a)?;
    let mut file_b = File::open(b)?;
    let mut buf_a = vec![0u8; CHUNK_SIZE];
    let mut buf_b = vec![0u8; CHUNK_SIZE];

    loop {
        let read_a = fill_chunk(&mut file_a, &mut buf_a)?;
        let read_b = fill_chunk(&mut file_b, &mut buf_b)?;

        if read_a != read_b || buf_a[..read_a] != buf_b[..read_b] {
            return Ok(false);
        }
        if read_a == 0 {
            return Ok(true);
        }
    }
}

pub fn md5_equal(a: &Path, b: &Path) -> io::Result<bool> {
    Ok(digest_file(a, md5_hasher())? == digest_file(b, md5_hasher())?)
}

pub fn sha256_equal(a: &Path, b: &Path) -> io::Result<bool> {
    Ok(digest_file(a, sha256_hasher())? == digest_file(b, sha256_hasher())?)
}

// Short reads are legal for `Read::read`; keep reading until the chunk is
// full or the file ends so chunk boundaries line up between the two files.
fn fill_chunk(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

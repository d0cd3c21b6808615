//! The error type shared by every operation in this crate.

use std::fmt;
use std::io;

/// The five error kinds of the file system's contract.
#[derive(Debug)]
pub enum Error {
	/// A caller-supplied argument is invalid (out-of-range block, buffer too
	/// small, inode number past the end of the inode table).
	InvalidArgument(&'static str),
	/// The requested inode is not allocated (`valid == 0`).
	NotFound,
	/// The host file returned an I/O error, or a short transfer.
	Io(io::Error),
	/// The on-disk structure is inconsistent (bad magic, disagreeing
	/// superblock, a pointer outside the data region, a zero pointer inside
	/// the declared file size).
	Corruption(&'static str),
	/// No free inode (`create`) or no free data block (`write`).
	NoSpace,
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
			Self::NotFound => write!(f, "no such inode"),
			Self::Io(e) => write!(f, "disk I/O failure: {e}"),
			Self::Corruption(msg) => write!(f, "corrupt file system: {msg}"),
			Self::NoSpace => write!(f, "no space left"),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Self::Io(e) => Some(e),
			_ => None,
		}
	}
}

impl From<io::Error> for Error {
	fn from(e: io::Error) -> Self {
		Self::Io(e)
	}
}

/// Shorthand result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

//! The disk emulator: a fixed-size array of [`BLOCK_SIZE`](crate::layout::BLOCK_SIZE)-byte
//! blocks backed by a single host file, addressed one block at a time.

use crate::error::{Error, Result};
use crate::layout::BLOCK_SIZE;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// A disk image: a host file plus the declared block count and running
/// read/write counters.
pub struct Disk {
	file: File,
	blocks: u32,
	reads: u64,
	writes: u64,
}

impl Disk {
	/// Acquires a read/write handle to the disk image at `path`.
	///
	/// Does not create or truncate the file; it must already be at least
	/// `blocks * BLOCK_SIZE` bytes.
	pub fn open<P: AsRef<Path>>(path: P, blocks: u32) -> Result<Self> {
		let file = OpenOptions::new().read(true).write(true).open(path)?;
		let len = file.metadata()?.len();
		let required = blocks as u64 * BLOCK_SIZE as u64;
		if len < required {
			return Err(Error::InvalidArgument(
				"disk image is smaller than the declared block count",
			));
		}
		Ok(Self {
			file,
			blocks,
			reads: 0,
			writes: 0,
		})
	}

	/// The total number of blocks on this disk.
	pub fn blocks(&self) -> u32 {
		self.blocks
	}

	/// Total blocks read and written so far, for diagnostics.
	pub fn counters(&self) -> (u64, u64) {
		(self.reads, self.writes)
	}

	/// Releases the handle, reporting the final read/write counters.
	pub fn close(self) {
		println!(
			"Closing disk, reads: {}, writes: {}",
			self.reads, self.writes
		);
	}

	/// Reads exactly `BLOCK_SIZE` bytes from `block` into `buf`.
	///
	/// `buf` must be at least `BLOCK_SIZE` bytes long. A short host read is
	/// surfaced as `Error::Io` rather than silently returning fewer bytes.
	pub fn read_block(&mut self, block: u32, buf: &mut [u8]) -> Result<()> {
		self.sanity_check(block, buf.len())?;
		self.file.seek(SeekFrom::Start(offset_of(block)))?;
		let n = self.file.read(&mut buf[..BLOCK_SIZE])?;
		if n != BLOCK_SIZE {
			return Err(Error::Io(io::Error::from(io::ErrorKind::UnexpectedEof)));
		}
		self.reads += 1;
		Ok(())
	}

	/// Writes exactly `BLOCK_SIZE` bytes from `buf` to `block`.
	pub fn write_block(&mut self, block: u32, buf: &[u8]) -> Result<()> {
		self.sanity_check(block, buf.len())?;
		self.file.seek(SeekFrom::Start(offset_of(block)))?;
		let n = self.file.write(&buf[..BLOCK_SIZE])?;
		if n != BLOCK_SIZE {
			return Err(Error::Io(io::Error::from(io::ErrorKind::UnexpectedEof)));
		}
		self.writes += 1;
		Ok(())
	}

	fn sanity_check(&self, block: u32, buf_len: usize) -> Result<()> {
		if block >= self.blocks {
			return Err(Error::InvalidArgument("block number out of range"));
		}
		if buf_len < BLOCK_SIZE {
			return Err(Error::InvalidArgument("buffer smaller than one block"));
		}
		Ok(())
	}
}

fn offset_of(block: u32) -> u64 {
	block as u64 * BLOCK_SIZE as u64
}

//! The mounted file system: translates inode-number-plus-offset into block
//! reads and writes against a mounted [`Disk`], backed by a cached
//! superblock and an in-memory free-block bitmap.

use crate::bitmap::Bitmap;
use crate::disk::Disk;
use crate::error::{Error, Result};
use crate::layout::{
	Block, Inode, SuperBlock, BLOCK_SIZE, INODES_PER_BLOCK, MAGIC_NUMBER, MAX_FILE_SIZE,
	POINTERS_PER_BLOCK, POINTERS_PER_INODE,
};
use crate::util::ceil_division;

/// Writes a fresh superblock and a zeroed inode table onto `disk`.
///
/// `disk` must not be mounted. Because [`FileSystem::mount`] borrows the
/// disk it mounts for the lifetime of the `FileSystem`, a disk that is
/// already mounted cannot be passed here at all — the borrow checker, not a
/// runtime flag, enforces "do not format a mounted disk".
///
/// Data blocks are left untouched; only the superblock and inode table are
/// written.
pub fn format(disk: &mut Disk) -> Result<()> {
	let inode_blocks = ceil_division(disk.blocks(), 10);
	let superblock = SuperBlock {
		magic_number: MAGIC_NUMBER,
		blocks: disk.blocks(),
		inode_blocks,
		inodes: inode_blocks * INODES_PER_BLOCK as u32,
	};

	let mut block = Block::zeroed();
	block.set_superblock(&superblock);
	disk.write_block(0, &block.data)?;

	// An all-zero block is already a block of `INODES_PER_BLOCK` inodes with
	// `valid == 0` and every other field zero.
	let empty_inode_block = Block::zeroed();
	for i in 1..=inode_blocks {
		disk.write_block(i, &empty_inode_block.data)?;
	}
	Ok(())
}

/// Prints the superblock and every valid inode of `disk`, in the exact
/// format consumed by golden tests of the external shell. Read-only.
pub fn debug(disk: &mut Disk) -> Result<()> {
	let mut block = Block::zeroed();
	disk.read_block(0, &mut block.data)?;
	let superblock = block.as_superblock();

	println!("SuperBlock:");
	println!(
		"    magic number is {}",
		if superblock.magic_number == MAGIC_NUMBER {
			"valid"
		} else {
			"invalid"
		}
	);
	println!("    {} blocks", superblock.blocks);
	println!("    {} inode blocks", superblock.inode_blocks);
	println!("    {} inodes", superblock.inodes);

	for i in 1..=superblock.inode_blocks {
		disk.read_block(i, &mut block.data)?;
		for slot in 0..INODES_PER_BLOCK {
			let inode = block.inode(slot);
			if inode.valid == 0 {
				continue;
			}
			let inode_number = (i - 1) * INODES_PER_BLOCK as u32 + slot as u32;
			println!("Inode {inode_number}");
			println!("    size: {} bytes", inode.size);
			println!("    direct blocks: {}", inode.direct_count());

			if inode.indirect != 0 {
				println!("    indirect block: {}", inode.indirect);
				let mut indirect_block = Block::zeroed();
				disk.read_block(inode.indirect, &mut indirect_block.data)?;
				let count = (0..POINTERS_PER_BLOCK)
					.filter(|&idx| indirect_block.pointer(idx) != 0)
					.count();
				println!("    indirect data blocks: {count}");
			}
		}
	}
	Ok(())
}

/// A disk mounted as a SimpleFS file system.
///
/// Borrows its [`Disk`] mutably for its whole lifetime: this is what "the
/// disk handle is exclusively owned by the `FileSystem` for the duration of
/// a mount" means in Rust — the borrow checker rejects a second concurrent
/// mount, or any direct disk access, for as long as this value is alive.
pub struct FileSystem<'d> {
	disk: &'d mut Disk,
	meta: SuperBlock,
	free_blocks: Bitmap,
}

impl<'d> FileSystem<'d> {
	/// Mounts `disk`: validates its superblock and rebuilds the free-block
	/// bitmap by scanning every valid inode.
	pub fn mount(disk: &'d mut Disk) -> Result<Self> {
		let mut block = Block::zeroed();
		disk.read_block(0, &mut block.data)?;
		let superblock = block.as_superblock();

		if superblock.magic_number != MAGIC_NUMBER {
			return Err(Error::Corruption("bad magic number"));
		}
		if superblock.blocks != disk.blocks() {
			return Err(Error::Corruption(
				"superblock block count disagrees with disk",
			));
		}
		if superblock.inode_blocks == 0 || superblock.inode_blocks >= superblock.blocks {
			return Err(Error::Corruption("invalid inode block count"));
		}

		let free_blocks = build_bitmap(disk, &superblock)?;
		Ok(Self {
			disk,
			meta: superblock,
			free_blocks,
		})
	}

	/// Unmounts the file system, releasing the free-block bitmap and
	/// returning exclusive access to the disk to the caller.
	pub fn unmount(self) {}

	/// Allocates the first free inode, returning its number.
	pub fn create(&mut self) -> Result<u32> {
		let mut block = Block::zeroed();
		for i in 1..=self.meta.inode_blocks {
			self.disk.read_block(i, &mut block.data)?;
			for slot in 0..INODES_PER_BLOCK {
				if block.inode(slot).valid != 0 {
					continue;
				}
				let inode = Inode {
					valid: 1,
					..Inode::default()
				};
				block.set_inode(slot, &inode);
				self.disk.write_block(i, &block.data)?;
				return Ok((i - 1) * INODES_PER_BLOCK as u32 + slot as u32);
			}
		}
		Err(Error::NoSpace)
	}

	/// Frees every block referenced by `inode_number` and marks it free.
	pub fn remove(&mut self, inode_number: u32) -> Result<()> {
		let (block_idx, slot) = self.inode_location(inode_number)?;
		let mut block = Block::zeroed();
		self.disk.read_block(block_idx, &mut block.data)?;
		let mut inode = block.inode(slot);
		if inode.valid == 0 {
			return Err(Error::NotFound);
		}

		for ptr in inode.direct.iter_mut() {
			if *ptr != 0 {
				self.free_blocks.mark_free(*ptr);
				*ptr = 0;
			}
		}

		if inode.indirect != 0 {
			let mut indirect_block = Block::zeroed();
			self.disk.read_block(inode.indirect, &mut indirect_block.data)?;
			for idx in 0..POINTERS_PER_BLOCK {
				let ptr = indirect_block.pointer(idx);
				if ptr != 0 {
					self.free_blocks.mark_free(ptr);
				}
			}
			self.free_blocks.mark_free(inode.indirect);
		}

		inode.valid = 0;
		inode.size = 0;
		inode.indirect = 0;
		block.set_inode(slot, &inode);
		self.disk.write_block(block_idx, &block.data)?;
		Ok(())
	}

	/// Returns the size in bytes of `inode_number`.
	pub fn stat(&mut self, inode_number: u32) -> Result<u32> {
		Ok(self.load_inode(inode_number)?.size)
	}

	/// Reads up to `buf.len()` bytes of `inode_number`'s content starting at
	/// `offset`, returning the number of bytes actually read.
	pub fn read(&mut self, inode_number: u32, buf: &mut [u8], offset: u32) -> Result<usize> {
		let inode = self.load_inode(inode_number)?;
		if offset >= inode.size {
			return Ok(0);
		}
		let length = std::cmp::min(buf.len() as u64, (inode.size - offset) as u64) as usize;

		let mut indirect_block: Option<Block> = None;
		let mut pos = offset as usize;
		let mut done = 0usize;

		while done < length {
			let logical_block = pos / BLOCK_SIZE;
			let block_offset = pos % BLOCK_SIZE;
			let chunk = std::cmp::min(length - done, BLOCK_SIZE - block_offset);

			let data_block_num = if logical_block < POINTERS_PER_INODE {
				inode.direct[logical_block]
			} else {
				let idx = logical_block - POINTERS_PER_INODE;
				if indirect_block.is_none() {
					if inode.indirect == 0 {
						return Err(Error::Corruption(
							"missing indirect block within declared file size",
						));
					}
					let mut blk = Block::zeroed();
					self.disk.read_block(inode.indirect, &mut blk.data)?;
					indirect_block = Some(blk);
				}
				indirect_block.as_ref().unwrap().pointer(idx)
			};
			if data_block_num == 0 {
				return Err(Error::Corruption("zero pointer within declared file size"));
			}

			let mut data = Block::zeroed();
			self.disk.read_block(data_block_num, &mut data.data)?;
			buf[done..done + chunk].copy_from_slice(&data.data[block_offset..block_offset + chunk]);

			pos += chunk;
			done += chunk;
		}
		Ok(done)
	}

	/// Writes `buf` into `inode_number`'s content starting at `offset`,
	/// allocating data (and, if needed, indirect) blocks on demand. Returns
	/// the number of bytes actually written, which is less than
	/// `buf.len()` iff the disk ran out of free blocks partway through.
	pub fn write(&mut self, inode_number: u32, buf: &[u8], offset: u32) -> Result<usize> {
		let mut inode = self.load_inode(inode_number)?;

		let capacity = MAX_FILE_SIZE.saturating_sub(offset as u64) as usize;
		let length = std::cmp::min(buf.len(), capacity);

		let mut indirect_block = Block::zeroed();
		let mut indirect_loaded = false;
		let mut indirect_dirty = false;

		let mut pos = offset as usize;
		let mut written = 0usize;

		while written < length {
			let logical_block = pos / BLOCK_SIZE;
			let block_offset = pos % BLOCK_SIZE;
			let chunk = std::cmp::min(length - written, BLOCK_SIZE - block_offset);

			let data_block_num = match self.resolve_or_allocate(
				&mut inode,
				logical_block,
				&mut indirect_block,
				&mut indirect_loaded,
				&mut indirect_dirty,
			)? {
				Some(n) => n,
				None => break,
			};

			let mut data = Block::zeroed();
			let partial = block_offset != 0 || chunk != BLOCK_SIZE;
			if partial {
				self.disk.read_block(data_block_num, &mut data.data)?;
			}
			data.data[block_offset..block_offset + chunk]
				.copy_from_slice(&buf[written..written + chunk]);
			self.disk.write_block(data_block_num, &data.data)?;

			pos += chunk;
			written += chunk;
		}

		if indirect_dirty {
			self.disk.write_block(inode.indirect, &indirect_block.data)?;
		}
		// Guard against `offset` itself being past the file's maximum size:
		// with `written == 0` there is nothing to extend `size` to cover.
		if written > 0 {
			inode.size = inode.size.max(offset + written as u32);
		}
		self.save_inode(inode_number, &inode)?;

		Ok(written)
	}

	/// Resolves the data-block pointer covering `logical_block`, allocating
	/// it (and the indirect block, if this is its first use) if absent.
	/// Returns `Ok(None)` when the bitmap is exhausted.
	fn resolve_or_allocate(
		&mut self,
		inode: &mut Inode,
		logical_block: usize,
		indirect_block: &mut Block,
		indirect_loaded: &mut bool,
		indirect_dirty: &mut bool,
	) -> Result<Option<u32>> {
		if logical_block < POINTERS_PER_INODE {
			let existing = inode.direct[logical_block];
			if existing != 0 {
				return Ok(Some(existing));
			}
			return Ok(self.free_blocks.allocate().map(|block| {
				inode.direct[logical_block] = block;
				block
			}));
		}

		let idx = logical_block - POINTERS_PER_INODE;
		if !*indirect_loaded {
			if inode.indirect != 0 {
				self.disk.read_block(inode.indirect, &mut indirect_block.data)?;
				*indirect_loaded = true;
			} else {
				// Don't commit a freshly allocated indirect block to `inode`
				// until it actually holds a pointer. Otherwise a write that
				// allocates the indirect block but then immediately runs out
				// of space for its first pointer would persist
				// `indirect != 0` with `size` unchanged, violating "indirect
				// is non-zero iff size > POINTERS_PER_INODE * BLOCK_SIZE".
				let Some(candidate) = self.free_blocks.allocate() else {
					return Ok(None);
				};
				let Some(first_pointer) = self.free_blocks.allocate() else {
					self.free_blocks.mark_free(candidate);
					return Ok(None);
				};
				inode.indirect = candidate;
				indirect_block.set_pointer(idx, first_pointer);
				*indirect_loaded = true;
				*indirect_dirty = true;
				return Ok(Some(first_pointer));
			}
		}

		let existing = indirect_block.pointer(idx);
		if existing != 0 {
			return Ok(Some(existing));
		}
		let Some(allocated) = self.free_blocks.allocate() else {
			return Ok(None);
		};
		indirect_block.set_pointer(idx, allocated);
		*indirect_dirty = true;
		Ok(Some(allocated))
	}

	fn inode_location(&self, inode_number: u32) -> Result<(u32, usize)> {
		if inode_number >= self.meta.inodes {
			return Err(Error::InvalidArgument("inode number out of range"));
		}
		let block = 1 + inode_number / INODES_PER_BLOCK as u32;
		let slot = (inode_number % INODES_PER_BLOCK as u32) as usize;
		Ok((block, slot))
	}

	fn load_inode(&mut self, inode_number: u32) -> Result<Inode> {
		let (block_idx, slot) = self.inode_location(inode_number)?;
		let mut block = Block::zeroed();
		self.disk.read_block(block_idx, &mut block.data)?;
		let inode = block.inode(slot);
		if inode.valid == 0 {
			return Err(Error::NotFound);
		}
		Ok(inode)
	}

	fn save_inode(&mut self, inode_number: u32, inode: &Inode) -> Result<()> {
		let (block_idx, slot) = self.inode_location(inode_number)?;
		let mut block = Block::zeroed();
		self.disk.read_block(block_idx, &mut block.data)?;
		block.set_inode(slot, inode);
		self.disk.write_block(block_idx, &block.data)?;
		Ok(())
	}
}

/// Rebuilds the free-block bitmap by scanning every valid inode, per §4.7:
/// blocks `0..=inode_blocks` start reserved; every direct pointer, every
/// indirect pointer, and every non-zero entry inside an indirect block is
/// then marked used. A pointer outside the data region is corruption.
fn build_bitmap(disk: &mut Disk, superblock: &SuperBlock) -> Result<Bitmap> {
	let mut bitmap = Bitmap::new(superblock.blocks);
	for reserved in 0..=superblock.inode_blocks {
		bitmap.mark_used(reserved);
	}

	let mut block = Block::zeroed();
	for i in 1..=superblock.inode_blocks {
		disk.read_block(i, &mut block.data)?;
		for slot in 0..INODES_PER_BLOCK {
			let inode = block.inode(slot);
			if inode.valid == 0 {
				continue;
			}

			for &ptr in &inode.direct {
				if ptr == 0 {
					continue;
				}
				check_data_pointer(ptr, superblock)?;
				bitmap.mark_used(ptr);
			}

			if inode.indirect != 0 {
				check_data_pointer(inode.indirect, superblock)?;
				bitmap.mark_used(inode.indirect);

				let mut indirect_block = Block::zeroed();
				disk.read_block(inode.indirect, &mut indirect_block.data)?;
				for idx in 0..POINTERS_PER_BLOCK {
					let ptr = indirect_block.pointer(idx);
					if ptr == 0 {
						continue;
					}
					check_data_pointer(ptr, superblock)?;
					bitmap.mark_used(ptr);
				}
			}
		}
	}
	Ok(bitmap)
}

fn check_data_pointer(ptr: u32, superblock: &SuperBlock) -> Result<()> {
	let lowest_data_block = 1 + superblock.inode_blocks;
	if ptr < lowest_data_block || ptr >= superblock.blocks {
		return Err(Error::Corruption("pointer outside the data region"));
	}
	Ok(())
}

#[cfg(test)]
mod test {
	use super::*;
	use std::fs::OpenOptions;
	use std::sync::atomic::{AtomicU32, Ordering};

	static COUNTER: AtomicU32 = AtomicU32::new(0);

	struct TempDisk {
		path: std::path::PathBuf,
		disk: Disk,
	}

	impl TempDisk {
		fn new(blocks: u32) -> Self {
			let n = COUNTER.fetch_add(1, Ordering::Relaxed);
			let path = std::env::temp_dir()
				.join(format!("simplefs-fs-test-{}-{n}", std::process::id()));
			let file = OpenOptions::new()
				.create(true)
				.write(true)
				.truncate(true)
				.open(&path)
				.unwrap();
			file.set_len(blocks as u64 * BLOCK_SIZE as u64).unwrap();
			let disk = Disk::open(&path, blocks).unwrap();
			Self { path, disk }
		}
	}

	impl Drop for TempDisk {
		fn drop(&mut self) {
			let _ = std::fs::remove_file(&self.path);
		}
	}

	#[test]
	fn format_then_mount_has_no_valid_inodes_and_reserved_bitmap() {
		let mut temp = TempDisk::new(10);
		format(&mut temp.disk).unwrap();
		let fs = FileSystem::mount(&mut temp.disk).unwrap();

		assert_eq!(fs.meta.blocks, 10);
		assert_eq!(fs.meta.inode_blocks, 1);
		assert_eq!(fs.meta.inodes, INODES_PER_BLOCK as u32);
		for b in 0..=fs.meta.inode_blocks {
			assert!(fs.free_blocks.is_used(b));
		}
		for b in (fs.meta.inode_blocks + 1)..fs.meta.blocks {
			assert!(!fs.free_blocks.is_used(b));
		}
	}

	#[test]
	fn mount_rejects_bad_magic() {
		let mut temp = TempDisk::new(10);
		// Leave the disk entirely zeroed: magic number is 0, not MAGIC_NUMBER.
		let result = FileSystem::mount(&mut temp.disk);
		assert!(matches!(result, Err(Error::Corruption(_))));
	}

	#[test]
	fn create_then_remove_restores_bitmap() {
		let mut temp = TempDisk::new(100);
		format(&mut temp.disk).unwrap();
		let mut fs = FileSystem::mount(&mut temp.disk).unwrap();

		let used_before = fs.free_blocks.used_count();
		let inode = fs.create().unwrap();
		fs.write(inode, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10], 0).unwrap();
		assert!(fs.free_blocks.used_count() > used_before);

		fs.remove(inode).unwrap();
		assert_eq!(fs.free_blocks.used_count(), used_before);
	}

	#[test]
	fn create_write_read_round_trip() {
		let mut temp = TempDisk::new(100);
		format(&mut temp.disk).unwrap();
		let mut fs = FileSystem::mount(&mut temp.disk).unwrap();

		let inode = fs.create().unwrap();
		assert_eq!(inode, 0);

		let written = fs.write(inode, b"hello", 0).unwrap();
		assert_eq!(written, 5);
		assert_eq!(fs.stat(inode).unwrap(), 5);

		let mut buf = [0u8; 5];
		let read = fs.read(inode, &mut buf, 0).unwrap();
		assert_eq!(read, 5);
		assert_eq!(&buf, b"hello");
	}

	#[test]
	fn cross_block_write_uses_two_direct_pointers() {
		let mut temp = TempDisk::new(100);
		format(&mut temp.disk).unwrap();
		let mut fs = FileSystem::mount(&mut temp.disk).unwrap();

		let inode = fs.create().unwrap();
		let payload: Vec<u8> = (0..8192).map(|i| (i % 251) as u8).collect();
		let written = fs.write(inode, &payload, 0).unwrap();
		assert_eq!(written, 8192);

		let stored = fs.load_inode(inode).unwrap();
		assert_eq!(stored.direct_count(), 2);

		let mut buf = vec![0u8; 8192];
		let read = fs.read(inode, &mut buf, 0).unwrap();
		assert_eq!(read, 8192);
		assert_eq!(buf, payload);
	}

	#[test]
	fn write_past_direct_cap_allocates_indirect_block() {
		let mut temp = TempDisk::new(100);
		format(&mut temp.disk).unwrap();
		let mut fs = FileSystem::mount(&mut temp.disk).unwrap();

		let inode = fs.create().unwrap();
		let payload = vec![0x42u8; BLOCK_SIZE];
		let offset = (POINTERS_PER_INODE * BLOCK_SIZE) as u32;
		let written = fs.write(inode, &payload, offset).unwrap();
		assert_eq!(written, BLOCK_SIZE);

		let stored = fs.load_inode(inode).unwrap();
		assert_ne!(stored.indirect, 0);

		let mut buf = vec![0u8; BLOCK_SIZE];
		let read = fs.read(inode, &mut buf, offset).unwrap();
		assert_eq!(read, BLOCK_SIZE);
		assert_eq!(buf, payload);
	}

	#[test]
	fn read_at_or_past_end_of_file_returns_zero() {
		let mut temp = TempDisk::new(100);
		format(&mut temp.disk).unwrap();
		let mut fs = FileSystem::mount(&mut temp.disk).unwrap();

		let inode = fs.create().unwrap();
		fs.write(inode, b"abc", 0).unwrap();

		let mut buf = [0u8; 8];
		assert_eq!(fs.read(inode, &mut buf, 3).unwrap(), 0);
		assert_eq!(fs.read(inode, &mut buf, 100).unwrap(), 0);
	}

	#[test]
	fn remove_unknown_inode_is_not_found() {
		let mut temp = TempDisk::new(10);
		format(&mut temp.disk).unwrap();
		let mut fs = FileSystem::mount(&mut temp.disk).unwrap();
		assert!(matches!(fs.remove(0), Err(Error::NotFound)));
	}

	#[test]
	fn create_fails_once_inode_table_is_full() {
		let mut temp = TempDisk::new(10);
		format(&mut temp.disk).unwrap();
		let mut fs = FileSystem::mount(&mut temp.disk).unwrap();

		for _ in 0..fs.meta.inodes {
			fs.create().unwrap();
		}
		assert!(matches!(fs.create(), Err(Error::NoSpace)));
	}

	#[test]
	fn write_that_runs_out_of_space_for_the_indirect_block_s_first_pointer_leaves_indirect_zero() {
		// 8 blocks: block 0 is the superblock, block 1 the (one) inode
		// table block, leaving exactly 6 free data blocks -- enough for
		// all 5 direct pointers plus the indirect block itself, but not
		// enough for even one pointer inside that indirect block.
		let mut temp = TempDisk::new(8);
		format(&mut temp.disk).unwrap();
		let mut fs = FileSystem::mount(&mut temp.disk).unwrap();

		let inode = fs.create().unwrap();
		let payload = vec![0u8; POINTERS_PER_INODE * BLOCK_SIZE + 1];
		let written = fs.write(inode, &payload, 0).unwrap();
		assert_eq!(written, POINTERS_PER_INODE * BLOCK_SIZE);

		let stored = fs.load_inode(inode).unwrap();
		assert_eq!(stored.size as usize, POINTERS_PER_INODE * BLOCK_SIZE);
		assert_eq!(
			stored.indirect, 0,
			"indirect must stay zero: no pointer inside it was ever written"
		);
	}

	#[test]
	fn write_exhausting_bitmap_returns_partial_count() {
		// A disk just big enough for the superblock, one inode block, and a
		// single data block: only one block is ever allocatable.
		let mut temp = TempDisk::new(3);
		format(&mut temp.disk).unwrap();
		let mut fs = FileSystem::mount(&mut temp.disk).unwrap();

		let inode = fs.create().unwrap();
		let payload = vec![7u8; BLOCK_SIZE * 2];
		let written = fs.write(inode, &payload, 0).unwrap();
		assert_eq!(written, BLOCK_SIZE);
		assert_eq!(fs.stat(inode).unwrap(), BLOCK_SIZE as u32);
	}
}

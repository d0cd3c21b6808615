//! The on-disk layout: block size, the superblock record, the inode record,
//! and the `Block` view used to read/write either of them (or a page of
//! indirect pointers) through a single 4096-byte buffer.

use crate::util::{reinterpret, reinterpret_ref};
use std::mem::size_of;

/// Size in bytes of a single block, and of a single disk transfer.
pub const BLOCK_SIZE: usize = 4096;

/// Identifies a SimpleFS image in a superblock.
pub const MAGIC_NUMBER: u32 = 0xf0f0_3410;

/// Direct data-block pointers carried in each inode.
pub const POINTERS_PER_INODE: usize = 5;

/// Block-number pointers held by a single indirect block.
pub const POINTERS_PER_BLOCK: usize = BLOCK_SIZE / size_of::<u32>();

/// Inode records held by a single inode-table block.
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / size_of::<Inode>();

/// The maximum file size representable by one inode: five direct blocks plus
/// one indirect block of pointers.
pub const MAX_FILE_SIZE: u64 =
	((POINTERS_PER_INODE + POINTERS_PER_BLOCK) * BLOCK_SIZE) as u64;

/// Block 0 of a formatted disk: format identity and sizing.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SuperBlock {
	pub magic_number: u32,
	pub blocks: u32,
	pub inode_blocks: u32,
	pub inodes: u32,
}

/// A single 32-byte inode record: one direct-pointer inode per file.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Inode {
	/// `0` when free, `1` when allocated.
	pub valid: u32,
	/// File length in bytes.
	pub size: u32,
	/// Direct data-block numbers, or `0` when unused.
	pub direct: [u32; POINTERS_PER_INODE],
	/// Block number of the indirect pointer block, or `0`.
	pub indirect: u32,
}

impl Inode {
	/// Number of non-zero direct pointers.
	pub fn direct_count(&self) -> usize {
		self.direct.iter().filter(|&&b| b != 0).count()
	}

	/// Converts every field to its little-endian representation, for writing
	/// the record's raw bytes to disk.
	fn to_le(self) -> Self {
		Self {
			valid: self.valid.to_le(),
			size: self.size.to_le(),
			direct: self.direct.map(u32::to_le),
			indirect: self.indirect.to_le(),
		}
	}

	/// Interprets every field as little-endian, after reading the record's
	/// raw bytes back off disk.
	fn from_le(self) -> Self {
		Self {
			valid: u32::from_le(self.valid),
			size: u32::from_le(self.size),
			direct: self.direct.map(u32::from_le),
			indirect: u32::from_le(self.indirect),
		}
	}
}

impl SuperBlock {
	/// Converts every field to its little-endian representation, for writing
	/// the record's raw bytes to disk.
	fn to_le(self) -> Self {
		Self {
			magic_number: self.magic_number.to_le(),
			blocks: self.blocks.to_le(),
			inode_blocks: self.inode_blocks.to_le(),
			inodes: self.inodes.to_le(),
		}
	}

	/// Interprets every field as little-endian, after reading the record's
	/// raw bytes back off disk.
	fn from_le(self) -> Self {
		Self {
			magic_number: u32::from_le(self.magic_number),
			blocks: u32::from_le(self.blocks),
			inode_blocks: u32::from_le(self.inode_blocks),
			inodes: u32::from_le(self.inodes),
		}
	}
}

const _: () = assert!(size_of::<Inode>() == 32);
const _: () = assert!(size_of::<SuperBlock>() == 16);
const _: () = assert!(INODES_PER_BLOCK == 128);
const _: () = assert!(POINTERS_PER_BLOCK == 1024);

/// One 4096-byte block, viewed through whichever lens the caller knows
/// applies to it: raw bytes, a superblock, an inode table, or a page of
/// block-number pointers. No tag is stored; the block's position on disk
/// determines which view is valid, exactly as in the on-disk format.
pub struct Block {
	pub data: [u8; BLOCK_SIZE],
}

impl Default for Block {
	fn default() -> Self {
		Self {
			data: [0; BLOCK_SIZE],
		}
	}
}

impl Block {
	pub fn zeroed() -> Self {
		Self::default()
	}

	pub fn as_superblock(&self) -> SuperBlock {
		unsafe { reinterpret_ref::<SuperBlock>(&self.data) }.from_le()
	}

	pub fn set_superblock(&mut self, sb: &SuperBlock) {
		let le = sb.to_le();
		let bytes = unsafe { reinterpret(&le) };
		self.data[..bytes.len()].copy_from_slice(bytes);
	}

	/// Returns the inode at `slot` (`0..INODES_PER_BLOCK`) of an inode-table
	/// block.
	pub fn inode(&self, slot: usize) -> Inode {
		let off = slot * size_of::<Inode>();
		unsafe { reinterpret_ref::<Inode>(&self.data[off..off + size_of::<Inode>()]) }.from_le()
	}

	pub fn set_inode(&mut self, slot: usize, inode: &Inode) {
		let off = slot * size_of::<Inode>();
		let le = inode.to_le();
		let bytes = unsafe { reinterpret(&le) };
		self.data[off..off + bytes.len()].copy_from_slice(bytes);
	}

	/// Returns the pointer at `idx` (`0..POINTERS_PER_BLOCK`) of an indirect
	/// block.
	pub fn pointer(&self, idx: usize) -> u32 {
		let off = idx * size_of::<u32>();
		u32::from_le_bytes(self.data[off..off + 4].try_into().unwrap())
	}

	pub fn set_pointer(&mut self, idx: usize, value: u32) {
		let off = idx * size_of::<u32>();
		self.data[off..off + 4].copy_from_slice(&value.to_le_bytes());
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn superblock_round_trip() {
		let sb = SuperBlock {
			magic_number: MAGIC_NUMBER,
			blocks: 100,
			inode_blocks: 10,
			inodes: 1280,
		};
		let mut block = Block::zeroed();
		block.set_superblock(&sb);
		assert_eq!(block.as_superblock(), sb);
	}

	#[test]
	fn inode_round_trip() {
		let inode = Inode {
			valid: 1,
			size: 42,
			direct: [1, 2, 3, 0, 0],
			indirect: 0,
		};
		let mut block = Block::zeroed();
		block.set_inode(5, &inode);
		assert_eq!(block.inode(5), inode);
		// Neighbouring slots stay untouched.
		assert_eq!(block.inode(4), Inode::default());
		assert_eq!(block.inode(6), Inode::default());
	}

	#[test]
	fn inode_direct_count() {
		let inode = Inode {
			valid: 1,
			size: 1,
			direct: [1, 0, 2, 0, 3],
			indirect: 0,
		};
		assert_eq!(inode.direct_count(), 3);
	}

	#[test]
	fn pointer_round_trip() {
		let mut block = Block::zeroed();
		block.set_pointer(0, 7);
		block.set_pointer(1023, 0xdead_beef);
		assert_eq!(block.pointer(0), 7);
		assert_eq!(block.pointer(1023), 0xdead_beef);
		assert_eq!(block.pointer(1), 0);
	}
}

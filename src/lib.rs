//! SimpleFS: a teaching-grade block-structured file system that stores a
//! flat namespace of numbered files (inodes) on a fixed-size disk image.
//!
//! Three layers, leaves first: [`disk`] is the block-addressed emulator
//! sitting on top of a host file; [`layout`] is the on-disk format it reads
//! and writes (superblock, inode, generic block view); [`fs`] is the mounted
//! file system that turns inode-plus-offset addressing into block I/O,
//! backed by the [`bitmap`] of free data blocks.
//!
//! This crate has no notion of filenames, directories, permissions, or
//! concurrent mounts: callers address files purely by inode number, and a
//! [`fs::FileSystem`] exclusively borrows the [`disk::Disk`] it mounts for
//! as long as it stays mounted.

pub mod bitmap;
pub mod disk;
pub mod error;
pub mod fs;
pub mod layout;
mod util;

pub use disk::Disk;
pub use error::{Error, Result};
pub use fs::{debug, format, FileSystem};
pub use layout::{
	Inode, SuperBlock, BLOCK_SIZE, INODES_PER_BLOCK, MAGIC_NUMBER, MAX_FILE_SIZE,
	POINTERS_PER_BLOCK, POINTERS_PER_INODE,
};

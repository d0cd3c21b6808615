//! `simplefs-debug` prints the superblock and inode table of a SimpleFS
//! disk image, without mounting it.

use simplefs::Disk;
use std::env;
use std::process::exit;

fn print_usage(prog: &str) {
	eprintln!("Usage: {prog} <path> <blocks>");
}

fn main() {
	let mut args = env::args();
	let prog = args.next().unwrap_or_else(|| "simplefs-debug".to_owned());

	let (Some(path), Some(blocks)) = (args.next(), args.next().and_then(|s| s.parse().ok())) else {
		print_usage(&prog);
		exit(1);
	};

	let mut disk = Disk::open(&path, blocks).unwrap_or_else(|e| {
		eprintln!("{prog}: {path}: {e}");
		exit(1);
	});

	simplefs::debug(&mut disk).unwrap_or_else(|e| {
		eprintln!("{prog}: {path}: {e}");
		exit(1);
	});

	disk.close();
}

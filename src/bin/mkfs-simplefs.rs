//! `mkfs-simplefs` formats an existing disk image file as a SimpleFS volume.

use simplefs::Disk;
use std::env;
use std::process::exit;

struct Args {
	prog: String,
	path: Option<String>,
	blocks: Option<u32>,
}

fn parse_args() -> Args {
	let mut args = Args {
		prog: "mkfs-simplefs".to_owned(),
		path: None,
		blocks: None,
	};

	let mut iter = env::args();
	args.prog = iter.next().unwrap_or(args.prog);

	for arg in iter {
		match arg.as_str() {
			"-h" | "--help" => {
				print_help(&args.prog);
				exit(0);
			}
			_ if args.path.is_none() => args.path = Some(arg),
			_ if args.blocks.is_none() => args.blocks = arg.parse().ok(),
			_ => {}
		}
	}

	args
}

fn print_usage(prog: &str) {
	eprintln!("Usage: {prog} <path> <blocks>");
	eprintln!("Try '{prog} --help' for more information.");
}

fn print_help(prog: &str) {
	println!("Usage: {prog} <path> <blocks>");
	println!();
	println!("Formats an existing disk image file as a SimpleFS volume.");
	println!("<path> must already exist and be at least <blocks> * 4096 bytes.");
}

fn main() {
	let args = parse_args();

	let (Some(path), Some(blocks)) = (args.path, args.blocks) else {
		print_usage(&args.prog);
		exit(1);
	};

	let mut disk = Disk::open(&path, blocks).unwrap_or_else(|e| {
		eprintln!("{}: {path}: {e}", args.prog);
		exit(1);
	});

	simplefs::format(&mut disk).unwrap_or_else(|e| {
		eprintln!("{}: failed to format {path}: {e}", args.prog);
		exit(1);
	});

	println!("{path}: formatted ({blocks} blocks)");
	disk.close();
}

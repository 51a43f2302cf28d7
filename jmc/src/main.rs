//! The jmc command line driver.
//!
//! Compiles an input script and persists the resulting data pack next to
//! it. All the actual logic lives in the member crates; this binary only
//! wires the file provider, runs the build and renders errors.

use std::{path::Path, process};

use jmc_common::file_provider::FsFileProvider;
use jmc_lang::CompileConfig;

fn main() {
    let mut args = std::env::args().skip(1);
    let Some(input) = args.next() else {
        eprintln!("Usage: jmc-lang <input file> [namespace]");
        process::exit(2);
    };
    let namespace = args.next();

    process::exit(run(&input, namespace.as_deref()));
}

fn run(input: &str, namespace: Option<&str>) -> i32 {
    let mut config = CompileConfig::new(Box::new(FsFileProvider::new(".".into())));
    if let Some(namespace) = namespace {
        config.compile_context.config.namespace = namespace.to_string();
    }
    config.add_file(input);

    match config.compile() {
        Ok(pack) => {
            let pack_name = format!("{}_datapack", pack.namespace);
            let result = pack.into_directory().persist(&pack_name, Path::new("."));
            match result {
                Ok(()) => {
                    println!("Wrote {pack_name}");
                    0
                }
                Err(err) => {
                    eprintln!("Could not write the pack: {err}");
                    1
                }
            }
        }
        Err(err) => {
            eprintln!("{}", err.format(&config.compile_context));
            1
        }
    }
}

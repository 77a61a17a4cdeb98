//! Log-to-CSV converter
//!
//! Reads topic log files (or whole log trees) and writes the selected
//! `key:value` columns as CSV on stdout.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin log_to_csv -- -c timestamp,temperature --write-header logs/2020/06
//! ```
//!
//! With no `-c` columns the output is blank and the available column names
//! are listed on stderr.

use aggrolog::csv_export::{default_min_record_size, LogToCsv};
use std::env;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

struct Args {
    columns: Vec<String>,
    inputs: Vec<PathBuf>,
    write_header: bool,
}

fn parse_args(argv: &[String]) -> Result<Args, String> {
    let mut args = Args {
        columns: Vec::new(),
        inputs: Vec::new(),
        write_header: false,
    };

    let mut iter = argv.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-c" => {
                let list = iter.next().ok_or("-c requires a comma-separated column list")?;
                args.columns
                    .extend(list.split(',').filter(|c| !c.is_empty()).map(str::to_string));
            }
            "--write-header" => args.write_header = true,
            "" => return Err("empty argument".to_string()),
            a if a.starts_with('-') => return Err(format!("unrecognized argument: {}", a)),
            a => args.inputs.push(PathBuf::from(a)),
        }
    }

    Ok(args)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let argv: Vec<String> = env::args().collect();
    let args = parse_args(&argv)?;

    if args.inputs.is_empty() {
        log::warn!("No input files");
    }

    let stdout = std::io::stdout();
    let mut converter = LogToCsv::new(BufWriter::new(stdout.lock()), args.columns.clone());
    converter.min_record_size = default_min_record_size(&args.columns);

    if args.columns.is_empty() {
        log::warn!("No columns specified (-c); output will be blank");
        converter.remember_keys();
    }

    if args.write_header {
        converter.write_headers()?;
    }

    for input in &args.inputs {
        converter.process_path(input)?;
    }
    converter.flush()?;

    if args.columns.is_empty() {
        let keys = converter.seen_keys();
        let mut stderr = std::io::stderr();
        writeln!(stderr, "Available columns: {}", keys.join(", "))?;
    }

    Ok(())
}

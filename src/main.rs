use std::fs;
use std::io::{self, Read};

use anyhow::{Context, Result, bail};
use ordo::{analyze_full, AnalyzeOptions};

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let mut pretty = false;
    let mut verbose = false;
    let mut input_path: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--pretty" | "-p" => {
                pretty = true;
            }
            "--verbose" | "-v" => {
                verbose = true;
            }
            "--help" | "-h" => {
                eprintln!("usage: ordo [--pretty] [--verbose] [FILE]");
                eprintln!("Reads pseudocode from FILE (or stdin) and prints the");
                eprintln!("complexity analysis as JSON.");
                return Ok(());
            }
            _ => {
                input_path = Some(arg);
                if args.next().is_some() {
                    bail!("Only one input file is supported");
                }
                break;
            }
        }
    }

    simplelog::TermLogger::init(
        if verbose {
            simplelog::LevelFilter::Debug
        } else {
            simplelog::LevelFilter::Warn
        },
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )
    .context("Initializing logger")?;

    let source = if let Some(path) = input_path {
        fs::read_to_string(&path).with_context(|| format!("Reading {path}"))?
    } else {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Reading stdin")?;
        buffer
    };

    match analyze_full(&source, &AnalyzeOptions::default()) {
        Ok(result) => {
            let rendered = if pretty {
                serde_json::to_string_pretty(&result)?
            } else {
                serde_json::to_string(&result)?
            };
            println!("{rendered}");
            Ok(())
        }
        Err(failure) => {
            for error in &failure.errors {
                eprintln!("{error}");
            }
            bail!("program does not parse")
        }
    }
}

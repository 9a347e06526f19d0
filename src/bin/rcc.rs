use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use log::error;

use rcc::token::SourceFile;

/// Single-pass C compiler targeting x86-64 GNU assembler.
#[derive(Clone, Debug, Parser)]
struct Args {
    /// input source file, or "-" for standard input
    input: PathBuf,
    /// output assembly file, defaults to standard output
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// print the token stream and exit
    #[arg(long)]
    dump_tokens: bool,
    /// print the elaborated AST and exit
    #[arg(long)]
    dump_ast: bool,
    /// enable verbose (debug-level) logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let src = if args.input == PathBuf::from("-") {
        SourceFile::from_stdin()?
    } else {
        SourceFile::from_path(&args.input)?
    };

    if args.dump_tokens {
        let toks = rcc::token::tokenize(&src)?;
        for t in &toks {
            println!("{:?} {:?}", t.kind, t.text(&src));
        }
        return Ok(());
    }

    if args.dump_ast {
        let toks = rcc::token::tokenize(&src)?;
        let mut p = rcc::parser::Parser::new(&src, toks);
        p.parse_program()?;
        for &gid in &p.globals {
            println!("{}: {:?}", p.objs[gid].name, p.objs[gid].ty);
        }
        return Ok(());
    }

    let asm = rcc::compile(&src)?;

    match &args.output {
        Some(path) => fs::write(path, asm)?,
        None => print!("{asm}"),
    }
    Ok(())
}

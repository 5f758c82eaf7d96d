// This binary is the command line driver for spvlower. It reads a module in the TIR
// text format, runs the structurizer over every function, encodes the result and
// writes the binary module to a file. For inspection it can print the structurized
// IR, dump the encoded words one instruction per line, and report session statistics.
// Logging goes through env_logger, so RUST_LOG=debug shows every inserted merge and
// RUST_LOG=trace every encoded instruction.

//! spvlower command line tool.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use bumpalo::Bump;
use clap::Parser;

use spvlower::core::{CompilationSession, CompileResult};
use spvlower::encode::decode_stream;
use spvlower::ir::{CoreInstrTable, InstrInfo};
use spvlower::module::{ModuleHeader, ModuleOptions, HEADER_WORDS};
use spvlower::pipeline::{compile_module, CompileOptions};
use spvlower::tir;

#[derive(Parser, Debug)]
#[command(author, version, about = "Structurize and encode TIR modules")]
struct Cli {
    /// Input module in TIR text form
    input: PathBuf,

    /// Write the binary module here
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the encoded words, one instruction per line
    #[arg(long)]
    dump: bool,

    /// Print the IR after structurizing
    #[arg(long)]
    print_ir: bool,

    /// Encode functions as given, without inserting merges
    #[arg(long)]
    no_structurize: bool,

    /// Print session statistics
    #[arg(long)]
    stats: bool,

    #[arg(long, default_value_t = 1)]
    version_major: u8,

    #[arg(long, default_value_t = 0)]
    version_minor: u8,

    /// Generator id written to the module header
    #[arg(long, default_value_t = 0)]
    generator: u32,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        log::error!("{e}");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> CompileResult<()> {
    let text = fs::read_to_string(&cli.input)?;
    let table = CoreInstrTable::new();
    let mut module = tir::parse_module(&text, &table)?;
    log::info!("parsed {} functions from {}", module.functions.len(), cli.input.display());

    let options = CompileOptions {
        module: ModuleOptions {
            version_major: cli.version_major,
            version_minor: cli.version_minor,
            generator: cli.generator,
        },
        structurize: !cli.no_structurize,
    };

    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let compiled = compile_module(&mut module, &table, &session, &options)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if cli.print_ir {
        write!(out, "{}", tir::print_module(&module, &table))?;
    }
    if cli.dump {
        dump(&mut out, &compiled.words, &table)?;
    }
    if cli.stats {
        write!(out, "{}", session.stats())?;
    }

    if let Some(path) = &cli.output {
        let mut file = io::BufWriter::new(fs::File::create(path)?);
        compiled.write_to(&mut file)?;
        file.flush()?;
        log::info!("wrote {} words to {}", compiled.words.len(), path.display());
    }
    Ok(())
}

fn dump<W: Write, I: InstrInfo>(out: &mut W, words: &[u32], info: &I) -> CompileResult<()> {
    let header =
        ModuleHeader::parse(words).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(
        out,
        "; magic {:#010x} version {:#010x} generator {} bound {}",
        header.magic, header.version, header.generator, header.bound
    )?;

    let body = &words[HEADER_WORDS..];
    let decoded =
        decode_stream(body, info).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    for inst in decoded {
        let name = info.desc(inst.opcode).map_or("?", |desc| desc.name);
        write!(out, "{:6}: {}", inst.offset + HEADER_WORDS, name)?;
        for word in &inst.operands {
            write!(out, " {word}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

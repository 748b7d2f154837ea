use clap::Parser;
use clap::error::ErrorKind;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use pascal_compiler::{DriverError, USAGE_EXIT_CODE, codegen, lexer, parser};

#[derive(Parser)]
#[command(name = "pascalc")]
#[command(about = "Compiles a Pascal subset to MIPS assembly", long_about = None)]
struct Cli {
    /// Input .pas file
    source: PathBuf,

    /// Print the syntax tree
    #[arg(short = 'p', long)]
    print_tree: bool,

    /// Check syntax and types only (no generation)
    #[arg(long)]
    check: bool,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

macro_rules! log {
    ($cli:expr, $($arg:tt)*) => {
        if $cli.verbose {
            eprintln!($($arg)*);
        }
    };
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return match error.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(USAGE_EXIT_CODE),
            };
        }
    };

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

fn run(cli: &Cli) -> Result<(), DriverError> {
    log!(cli, "Processing: {}", cli.source.display());

    let source = fs::read_to_string(&cli.source).map_err(|source| DriverError::Read {
        path: cli.source.clone(),
        source,
    })?;

    if cli.verbose {
        eprintln!("  Lexing...");
        if let Ok(tokens) = lexer::tokenize(&source) {
            eprintln!("  Tokenized {} tokens", tokens.len());
        }
    }

    log!(cli, "  Parsing...");
    let parse = parser::parse(&source)?;
    log!(cli, "  Parsed program: {}", parse.program.name);
    log!(
        cli,
        "    Declarations: {}",
        parse.program.declarations.variables.len()
    );
    log!(cli, "    Subprograms: {}", parse.program.subprograms.len());
    log!(cli, "  Symbols:\n{}", parse.symbols);

    if cli.check {
        println!("{}: OK", cli.source.display());
        if cli.print_tree {
            print!("{}", parse.program);
        }
        return Ok(());
    }

    log!(cli, "  Generating...");
    let assembly = codegen::generate(&parse.program, &parse.symbols);

    let out_path = cli.out_dir.join(format!("{}.asm", parse.program.name));
    fs::write(&out_path, assembly).map_err(|source| DriverError::Write {
        path: out_path.clone(),
        source,
    })?;

    let shown = fs::canonicalize(&out_path).unwrap_or(out_path);
    println!("Writing to {}", shown.display());

    if cli.print_tree {
        print!("{}", parse.program);
    }

    Ok(())
}

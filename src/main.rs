use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use clap_stdin::FileOrStdin;
use tracing_subscriber::EnvFilter;

use pvmc::options::CompileOptions;
use pvmc::CompileError;

#[derive(Parser)]
#[command(name = "pvmc")]
#[command(about = "Compiles a Pascal program to stack machine assembly")]
#[command(version)]
struct Cli {
    /// Source file, or - for stdin
    #[arg(default_value = "-")]
    input: FileOrStdin,

    /// Write the assembly here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Reject array types
    #[arg(long)]
    no_arrays: bool,

    /// Reject record types
    #[arg(long)]
    no_records: bool,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let source = cli.input.contents().context("failed to read source")?;
    let options = CompileOptions {
        arrays: !cli.no_arrays,
        records: !cli.no_records,
    };

    let compilation = match pvmc::compile_with(&source, &options) {
        Ok(compilation) => compilation,
        Err(CompileError::Diagnostics(diagnostics)) => {
            for diagnostic in &diagnostics {
                eprintln!("{diagnostic}");
            }
            anyhow::bail!("{}", CompileError::Diagnostics(diagnostics));
        }
        Err(err) => return Err(err).context("code generation failed"),
    };
    for warning in &compilation.warnings {
        eprintln!("{warning}");
    }

    let assembly = compilation.executable.to_string();
    match cli.output {
        Some(path) => fs::write(&path, assembly)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => print!("{assembly}"),
    }
    Ok(())
}

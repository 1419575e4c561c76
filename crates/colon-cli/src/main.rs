use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colon_parse::{parse_str, tokenize, TokenType};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod render;

/// Maximum source file size in bytes (1MB)
const MAX_SOURCE_SIZE: usize = 1_000_000;

#[derive(Parser, Debug)]
#[command(name = "colon")]
#[command(about = "Tokenize and parse colon-block source files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the token stream of a source file
    Tokens {
        /// Path to the source file
        file: String,

        /// Include whitespace tokens
        #[arg(long)]
        all: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Pretty)]
        format: Format,
    },

    /// Parse a source file and dump the AST and diagnostics
    Parse {
        /// Path to the source file
        file: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Pretty)]
        format: Format,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Pretty,
    Json,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Tokens { file, all, format } => cmd_tokens(&file, all, format),
        Commands::Parse { file, format } => cmd_parse(&file, format),
    }
}

fn load_source(path: &str) -> Result<String> {
    let src = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read source file '{path}'"))?;

    if src.len() > MAX_SOURCE_SIZE {
        bail!(
            "source file exceeds {}MB limit ({} bytes)",
            MAX_SOURCE_SIZE / 1_000_000,
            src.len()
        );
    }

    debug!(path, bytes = src.len(), "loaded source");
    Ok(src)
}

fn cmd_tokens(file: &str, all: bool, format: Format) -> Result<ExitCode> {
    let src = load_source(file)?;
    let tokens: Vec<_> = tokenize(&src)
        .into_iter()
        .filter(|t| all || t.kind != TokenType::Whitespace)
        .collect();

    match format {
        Format::Pretty => {
            for tok in &tokens {
                println!("{}", render::token_line(&src, tok));
            }
        }
        Format::Json => println!(
            "{}",
            serde_json::to_string_pretty(&tokens).context("failed to encode tokens")?
        ),
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_parse(file: &str, format: Format) -> Result<ExitCode> {
    let src = load_source(file)?;
    let parsed = parse_str(&src);

    match format {
        Format::Pretty => println!("{}", parsed.ast.sexpr(parsed.ast.root())),
        Format::Json => {
            let out = render::ParseOutput {
                ast: &parsed.ast,
                diagnostics: &parsed.diagnostics,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&out).context("failed to encode AST")?
            );
        }
    }

    for diag in &parsed.diagnostics {
        eprintln!("{}", render::diagnostic_line(file, &src, diag));
    }

    if parsed.diagnostics.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        info!(count = parsed.diagnostics.len(), "parse finished with diagnostics");
        Ok(ExitCode::FAILURE)
    }
}

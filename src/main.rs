//! Headless driver for the pseudocode editor core
//!
//! Usage:
//!   pseudocode-editor check <language.json> <source>              - Print mistakes, exit 1 when any
//!   pseudocode-editor tokens <language.json> <source>             - Print the classified tokens
//!   pseudocode-editor suggest <language.json> <source> --offset N - Print suggestions at a char offset
//!   pseudocode-editor languages <dir>                             - List language definitions

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use pseudocode_editor::config::SessionConfig;
use pseudocode_editor::language::{LanguageCatalog, LanguageDefinition};
use pseudocode_editor::logging::init_logger;
use pseudocode_editor::metrics::metrics;
use pseudocode_editor::session::EditorSession;

#[derive(Parser, Debug)]
#[command(name = "pseudocode-editor", version, about = "Recognise, check and complete pseudocode")]
struct Cli {
    /// Log level filter for stderr (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Disable ANSI colors in log output
    #[arg(long, global = true)]
    no_color: bool,

    /// Also write a DEBUG session log to the cache directory
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the mistakes found in a source file
    Check { language: PathBuf, source: PathBuf },

    /// Print every recognised token with its classification
    Tokens { language: PathBuf, source: PathBuf },

    /// Print suggestions for the token at a char offset
    Suggest {
        language: PathBuf,
        source: PathBuf,
        #[arg(long)]
        offset: usize,
    },

    /// List the language definitions found in a directory
    Languages { dir: PathBuf },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let _guard = init_logger(cli.no_color, cli.log_level.as_deref(), cli.log_file)
        .context("failed to initialise logging")?;
    info!("pseudocode-editor {}", env!("CARGO_PKG_VERSION"));

    let code = match cli.command {
        Commands::Check { language, source } => check(&language, &source).await?,
        Commands::Tokens { language, source } => tokens(&language, &source).await?,
        Commands::Suggest {
            language,
            source,
            offset,
        } => suggest(&language, &source, offset).await?,
        Commands::Languages { dir } => languages(&dir)?,
    };

    debug!("Metrics: {:?}", metrics().summary());
    Ok(code)
}

fn open(language: &Path, source: &Path) -> Result<EditorSession> {
    let language = LanguageDefinition::from_path(language)
        .with_context(|| format!("cannot load language {}", language.display()))?;
    let text = std::fs::read_to_string(source)
        .with_context(|| format!("cannot read {}", source.display()))?;
    let config = SessionConfig {
        auto_mistake_search: false,
        ..SessionConfig::from_env_or_default()
    };
    Ok(EditorSession::open(Arc::new(language), &text, config))
}

async fn check(language: &Path, source: &Path) -> Result<ExitCode> {
    let session = open(language, source)?;
    let mistakes = session.find_mistakes().wait().await?;
    session.close();

    for mistake in &mistakes {
        println!("{}", mistake);
    }
    info!("{} mistake(s) in {}", mistakes.len(), source.display());

    Ok(if mistakes.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn tokens(language: &Path, source: &Path) -> Result<ExitCode> {
    let session = open(language, source)?;
    let snapshot = session.snapshot();
    session.close();

    for token in &snapshot.tokens {
        let (line, column) = snapshot.line_column(token.start());
        let token_type = token.token_type();
        let color = snapshot.language.color_for(token_type.as_str()).unwrap_or("-");
        println!(
            "{}:{}\t{}\t{}\t{}\t{:?}",
            line,
            column,
            token_type,
            token.value_kind(),
            color,
            token.content()
        );
    }
    Ok(ExitCode::SUCCESS)
}

async fn suggest(language: &Path, source: &Path, offset: usize) -> Result<ExitCode> {
    let session = open(language, source)?;
    let suggestions = session.suggest_at(offset).wait().await?;
    session.close();

    for suggestion in &suggestions {
        println!("{}\t{}", suggestion.text, suggestion.source);
    }
    Ok(ExitCode::SUCCESS)
}

fn languages(dir: &Path) -> Result<ExitCode> {
    let catalog = LanguageCatalog::load_dir(dir)
        .with_context(|| format!("cannot list languages in {}", dir.display()))?;

    if catalog.is_empty() {
        println!("No language definitions in {}", dir.display());
    }
    for language in catalog.iter() {
        println!(
            "{}\t{} keywords, {} value types, {} commands, {} operators",
            language.name(),
            language.keywords().len(),
            language.value_types().len(),
            language.commands().len(),
            language.operators().len()
        );
    }
    Ok(ExitCode::SUCCESS)
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};
use std::path::Path;
use termdex_core::persist::{copy_texts, load_index, save_index, ArtifactFormat, IndexPaths};
use termdex_core::tokenizer::load_stopwords;
use termdex_core::{build_from_dir, CorpusOptions, Normalizer, SearchIndex};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query boolean/positional term indexes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a directory of text documents
    Build {
        /// Corpus directory (one document per file)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// Whitespace separated stopword list
        #[arg(long)]
        stopwords: Option<String>,
        /// Index surface forms instead of stems
        #[arg(long, default_value_t = false)]
        no_stemming: bool,
        /// Artifact encoding: json or bincode
        #[arg(long, default_value = "json")]
        format: ArtifactFormat,
        /// Only index files with this extension, e.g. txt
        #[arg(long)]
        ext: Option<String>,
    },
    /// Run one query against a built index
    Query {
        /// Index directory
        #[arg(long, default_value = "./index")]
        index: String,
        /// Boolean (`a AND b NOT c`) or proximity (`a b / k`) query
        query: String,
    },
    /// Read queries from stdin until `exit`
    Repl {
        /// Index directory
        #[arg(long, default_value = "./index")]
        index: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, stopwords, no_stemming, format, ext } => {
            build_index(&input, &output, stopwords.as_deref(), !no_stemming, format, ext)
        }
        Commands::Query { index, query } => {
            let index = load_index(&IndexPaths::new(&index))?;
            println!("{}", answer(&index, &query));
            Ok(())
        }
        Commands::Repl { index } => repl(&load_index(&IndexPaths::new(&index))?),
    }
}

fn build_index(input: &str, output: &str, stopwords: Option<&str>, stemming: bool, format: ArtifactFormat, ext: Option<String>) -> Result<()> {
    let stopwords = match stopwords {
        Some(path) => load_stopwords(path)?,
        None => BTreeSet::new(),
    };
    tracing::info!(num_stopwords = stopwords.len(), stemming, "normalizer configured");
    let normalizer = Normalizer::with_stopwords(stopwords, stemming);

    let input_path = Path::new(input);
    let options = CorpusOptions { extension: ext };
    let (index, report) = build_from_dir(input_path, &options, &normalizer)
        .with_context(|| format!("building index from {input}"))?;
    for skipped in &report.skipped {
        tracing::warn!(%skipped, "document not indexed");
    }

    let out_paths = IndexPaths::new(output);
    let created_at = time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "".into());
    save_index(&out_paths, &index, format, &created_at)?;
    let copied = copy_texts(&out_paths, input_path, &index)?;

    tracing::info!(
        output,
        num_docs = index.num_docs(),
        num_terms = index.num_terms(),
        skipped = report.skipped.len(),
        copied,
        "index build complete"
    );
    Ok(())
}

fn answer(index: &SearchIndex, query: &str) -> String {
    match index.search(query) {
        Ok(outcome) => {
            let ids: Vec<String> = outcome.doc_ids.iter().map(|d| d.to_string()).collect();
            format!("Matching documents: [{}]", ids.join(", "))
        }
        Err(e) => format!("{}: {e}", e.condition()),
    }
}

fn repl(index: &SearchIndex) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "\nEnter your query (or type 'exit' to quit): ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let query = line.trim();
        if query.eq_ignore_ascii_case("exit") {
            return Ok(());
        }
        writeln!(stdout, "{}", answer(index, query))?;
    }
}

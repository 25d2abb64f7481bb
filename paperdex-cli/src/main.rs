use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use paperdex_core::{
    Converter, PaperProcessor, PdfPreprocessor, PipelineConfig, PipelineDirs, SearchHit,
};

use paperdex_cli::{default_model_dir, resolve_index_path, resolve_server_url, GrobidProbe};

#[derive(Parser)]
#[command(name = "paperdex")]
#[command(about = "Turn scholarly PDFs into Markdown and a searchable chunk index via GROBID")]
struct Cli {
    /// Path to custom config file (YAML format)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send every PDF in a directory through GROBID and store the TEI
    Extract {
        /// Directory containing PDFs
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for the TEI XML files
        #[arg(short, long)]
        output: PathBuf,

        /// GROBID server URL (default: $GROBID_URL, then config)
        #[arg(long)]
        server: Option<String>,

        /// Number of PDFs sent to GROBID at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Re-extract PDFs whose TEI already exists
        #[arg(long)]
        force: bool,
    },

    /// Convert a TEI file, or a directory of them, to Markdown
    Convert {
        /// TEI XML file or directory
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for the Markdown files
        #[arg(short, long)]
        output: PathBuf,

        /// Convert files in parallel
        #[arg(long)]
        parallel: bool,
    },

    /// Chunk, embed and index a directory of Markdown files
    Index {
        /// Directory containing Markdown artifacts
        #[arg(short, long)]
        input: PathBuf,

        /// Index file (default: config, then the local data directory)
        #[arg(long)]
        index: Option<PathBuf>,
    },

    /// Search the index
    Query {
        /// Free-text query
        text: String,

        /// Number of results (default: index.default_top_k from config)
        #[arg(short)]
        k: Option<usize>,

        #[arg(long)]
        index: Option<PathBuf>,

        /// Print hits as JSON instead of Markdown
        #[arg(long)]
        json: bool,
    },

    /// Extract, convert and index in one run
    Pipeline {
        #[arg(long)]
        pdfs: PathBuf,

        #[arg(long)]
        xml: PathBuf,

        #[arg(long)]
        markdown: PathBuf,

        #[arg(long)]
        index: Option<PathBuf>,

        #[arg(long)]
        server: Option<String>,

        /// Print per-stage timings
        #[arg(long)]
        profile: bool,

        /// Re-extract PDFs whose TEI already exists
        #[arg(long)]
        force: bool,
    },

    /// Check that the GROBID server answers
    Health {
        #[arg(long)]
        server: Option<String>,

        /// Keep polling for this many seconds before giving up
        #[arg(long, default_value_t = 0)]
        wait: u64,
    },

    /// Print the effective configuration as YAML
    ShowConfig,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Banners and progress go to stderr; stdout carries only results, so
/// `query --json` and `show-config` can be piped.
fn run(cli: Cli) -> Result<()> {
    eprintln!("📚 Paperdex");

    let mut config = PipelineConfig::load_with_fallback(cli.config.as_deref());
    if let Some(config_path) = &cli.config {
        eprintln!("📋 Config: {}", config_path.display());
    } else {
        eprintln!("📋 Using default config");
    }
    if config.index.onnx.cache_dir.is_none() {
        config.index.onnx.cache_dir = default_model_dir(&config.index.onnx.model).ok();
    }

    match cli.command {
        Command::Extract {
            input,
            output,
            server,
            concurrency,
            force,
        } => run_extract(config, &input, &output, server.as_deref(), concurrency, force),
        Command::Convert {
            input,
            output,
            parallel,
        } => run_convert(config, &input, &output, parallel),
        Command::Index { input, index } => run_index(config, &input, index.as_deref()),
        Command::Query {
            text,
            k,
            index,
            json,
        } => run_query(config, &text, k, index.as_deref(), json),
        Command::Pipeline {
            pdfs,
            xml,
            markdown,
            index,
            server,
            profile,
            force,
        } => {
            let dirs = PipelineDirs { pdfs, xml, markdown };
            run_pipeline(config, &dirs, index.as_deref(), server.as_deref(), profile, force)
        }
        Command::Health { server, wait } => run_health(config, server.as_deref(), wait),
        Command::ShowConfig => {
            print!("{}", config.to_yaml()?);
            Ok(())
        }
    }
}

/// Apply `--server` / `GROBID_URL` and make sure the server is up.
fn connect_grobid(config: &mut PipelineConfig, server: Option<&str>) -> Result<()> {
    config.grobid.server_url = resolve_server_url(server, &config.grobid);
    let probe = GrobidProbe::new(&config.grobid)?;
    if !probe.is_alive() {
        bail!(
            "GROBID server at {} is not reachable; start it or pass --server",
            probe.server_url()
        );
    }
    eprintln!("🔌 GROBID: {}", probe.server_url());
    Ok(())
}

fn run_extract(
    mut config: PipelineConfig,
    input: &Path,
    output: &Path,
    server: Option<&str>,
    concurrency: Option<usize>,
    force: bool,
) -> Result<()> {
    if let Some(concurrency) = concurrency {
        config.grobid.concurrency = concurrency.max(1);
    }
    connect_grobid(&mut config, server)?;

    eprintln!("📄 Extracting PDFs from: {}", input.display());
    let preprocessor = PdfPreprocessor::new_with_grobid(&config.grobid)?;
    let report = preprocessor.process_directory(input, output, force)?;

    println!(
        "✅ Extracted {} | skipped {} | failed {}",
        report.extracted.len(),
        report.skipped.len(),
        report.failed.len()
    );
    print_failures(&report.failed);
    Ok(())
}

fn run_convert(config: PipelineConfig, input: &Path, output: &Path, parallel: bool) -> Result<()> {
    if !input.exists() {
        bail!("input not found: {}", input.display());
    }
    let converter = Converter::new(config.converter).context("invalid converter configuration")?;

    eprintln!("📄 Converting: {}", input.display());
    let report = if input.is_dir() {
        converter.convert_directory(input, output, parallel)?
    } else {
        converter.convert_batch(&[input.to_path_buf()], output, parallel)
    };

    println!(
        "✅ Converted {}/{} files into {}",
        report.converted.len(),
        report.total(),
        output.display()
    );
    print_failures(&report.failed);
    Ok(())
}

fn run_index(config: PipelineConfig, input: &Path, index: Option<&Path>) -> Result<()> {
    let index_path = resolve_index_path(index, &config.index)?;
    let processor = PaperProcessor::new_local(config, &index_path)?;

    eprintln!("📄 Indexing: {}", input.display());
    let report = processor.build_index(input)?;

    println!(
        "✅ Indexed {} | unchanged {} | failed {} | {} chunks in {}",
        report.indexed.len(),
        report.unchanged.len(),
        report.failed.len(),
        report.total_chunks,
        index_path.display()
    );
    print_failures(&report.failed);
    Ok(())
}

fn run_query(
    config: PipelineConfig,
    text: &str,
    k: Option<usize>,
    index: Option<&Path>,
    json: bool,
) -> Result<()> {
    let k = k.unwrap_or(config.index.default_top_k);
    let index_path = resolve_index_path(index, &config.index)?;
    let processor = PaperProcessor::new_local(config, &index_path)?;
    let hits = processor.search_handle().search(text, k)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("⚠️  No relevant documents found for your query.");
        return Ok(());
    }
    for (i, hit) in hits.iter().enumerate() {
        print_hit(i + 1, hit);
    }
    Ok(())
}

fn run_pipeline(
    mut config: PipelineConfig,
    dirs: &PipelineDirs,
    index: Option<&Path>,
    server: Option<&str>,
    profile: bool,
    force: bool,
) -> Result<()> {
    connect_grobid(&mut config, server)?;
    let index_path = resolve_index_path(index, &config.index)?;
    let processor = PaperProcessor::new_local(config, &index_path)?;

    eprintln!("🚀 Running pipeline on: {}", dirs.pdfs.display());
    let report = processor.run_pipeline(dirs, force, profile)?;

    println!(
        "✅ PDF → TEI: extracted {} | skipped {} | failed {}",
        report.extraction.extracted.len(),
        report.extraction.skipped.len(),
        report.extraction.failed.len()
    );
    print_failures(&report.extraction.failed);
    println!(
        "✅ TEI → Markdown: converted {}/{}",
        report.conversion.converted.len(),
        report.conversion.total()
    );
    print_failures(&report.conversion.failed);
    println!(
        "✅ Index: {} new | {} unchanged | {} chunks in {}",
        report.index.indexed.len(),
        report.index.unchanged.len(),
        report.index.total_chunks,
        index_path.display()
    );
    print_failures(&report.index.failed);

    if profile {
        println!("\n⏱️  Stage timings:");
        for (step, duration) in &report.timings {
            println!("  {:<24} {:>8.2}ms", step, duration.as_secs_f64() * 1000.0);
        }
    }
    Ok(())
}

fn run_health(mut config: PipelineConfig, server: Option<&str>, wait: u64) -> Result<()> {
    config.grobid.server_url = resolve_server_url(server, &config.grobid);
    let probe = GrobidProbe::new(&config.grobid)?;

    probe.wait_until_alive(Duration::from_secs(wait), Duration::from_secs(2))?;
    match probe.version() {
        Ok(version) => println!("✅ GROBID {} is alive at {}", version, probe.server_url()),
        Err(_) => println!("✅ GROBID is alive at {}", probe.server_url()),
    }
    Ok(())
}

fn print_failures(failed: &[(PathBuf, String)]) {
    for (path, error) in failed {
        println!("  ❌ {}: {}", path.display(), error);
    }
}

fn print_hit(rank: usize, hit: &SearchHit) {
    let title = or_placeholder(&hit.metadata.title, "No Title Found");
    let authors = or_placeholder(&hit.metadata.authors, "No Authors Found");
    let source = Path::new(&hit.metadata.source)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Unknown Source".to_string());

    println!("\n### {}. {}", rank, title);
    println!("**Authors:** {}", authors);
    println!();
    for line in hit.text.lines() {
        println!("> {}", line);
    }
    println!();
    println!("Source: {} (score {:.3})", source, hit.score);
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.trim().is_empty() {
        placeholder
    } else {
        value
    }
}

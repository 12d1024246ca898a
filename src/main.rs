//! CLI entry point for `mailgraph`.

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mailgraph::config::Config;
use mailgraph::corpus::{Corpus, CorpusWalker, WalkStats};
use mailgraph::graph::loader::{LoadProgress, LoadStage};
use mailgraph::graph::{BatchLoader, GraphStore, LoadReport, MemoryStore, Neo4jHttpStore};
use mailgraph::interchange::Interchange;

#[derive(Parser)]
#[command(
    name = "mailgraph",
    version,
    about = "Normalize email corpora and load them into a property graph"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk mailbox directories and write users.json / messages.json
    Parse {
        /// Mailbox root directories (default: [corpus] roots from config)
        roots: Vec<PathBuf>,
        /// Stop after this many messages
        #[arg(short = 'n', long)]
        max_messages: Option<usize>,
        /// Output directory for the interchange files
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Upload interchange files into the graph database
    Load {
        /// Directory holding users.json and messages.json
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Rows per upsert round trip
        #[arg(short, long)]
        batch_size: Option<usize>,
        /// Load only the first N messages
        #[arg(long)]
        max_messages: Option<usize>,
        /// Load only the first N people
        #[arg(long)]
        max_people: Option<usize>,
        /// Run against an in-memory graph instead of the database
        #[arg(long)]
        dry_run: bool,
    },
    /// Parse mailbox directories and load the result in one run
    Ingest {
        roots: Vec<PathBuf>,
        #[arg(short = 'n', long)]
        max_messages: Option<usize>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long)]
        batch_size: Option<usize>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = mailgraph::config::load_config();

    let log_level = match cli.verbose {
        0 => loaded.config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &loaded.config);
    loaded.log_outcome();
    let config = loaded.config;

    match cli.command {
        Commands::Parse {
            roots,
            max_messages,
            output,
            json,
        } => cmd_parse(&config, roots, max_messages, output, json),
        Commands::Load {
            input,
            batch_size,
            max_messages,
            max_people,
            dry_run,
        } => cmd_load(&config, input, batch_size, max_messages, max_people, dry_run),
        Commands::Ingest {
            roots,
            max_messages,
            output,
            batch_size,
            dry_run,
        } => cmd_ingest(&config, roots, max_messages, output, batch_size, dry_run),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_file = mailgraph::config::log_file_path(config);
    let log_dir = log_file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailgraph.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailgraph", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Walk mailbox roots and write the interchange files.
fn cmd_parse(
    config: &Config,
    roots: Vec<PathBuf>,
    max_messages: Option<usize>,
    output: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let roots = resolve_roots(config, roots)?;
    let output = output.unwrap_or_else(|| config.corpus.output_dir.clone());
    let max_messages = max_messages.or(config.corpus.max_messages);

    let (corpus, stats) = walk(&roots, max_messages)?;
    Interchange::from_corpus(&corpus).write(&output)?;

    if json {
        print_walk_json(&roots, &output, &corpus, &stats)?;
    } else {
        print_walk_table(&roots, &output, &corpus, &stats);
    }
    Ok(())
}

/// Read the interchange files and upload them.
fn cmd_load(
    config: &Config,
    input: Option<PathBuf>,
    batch_size: Option<usize>,
    max_messages: Option<usize>,
    max_people: Option<usize>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let input = input.unwrap_or_else(|| config.corpus.output_dir.clone());
    let mut data = Interchange::read(&input)?;
    data.truncate(max_people, max_messages);

    let batch_size = batch_size.unwrap_or(config.load.batch_size);
    let mut store = open_store(config, dry_run)?;
    let report = upload(store.as_mut(), batch_size, &data)?;
    print_load_table(&store.target(), &report);
    Ok(())
}

/// Walk, write, and upload in one run.
fn cmd_ingest(
    config: &Config,
    roots: Vec<PathBuf>,
    max_messages: Option<usize>,
    output: Option<PathBuf>,
    batch_size: Option<usize>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let roots = resolve_roots(config, roots)?;
    let output = output.unwrap_or_else(|| config.corpus.output_dir.clone());
    let max_messages = max_messages.or(config.corpus.max_messages);

    let (corpus, stats) = walk(&roots, max_messages)?;
    let data = Interchange::from_corpus(&corpus);
    data.write(&output)?;
    print_walk_table(&roots, &output, &corpus, &stats);

    let batch_size = batch_size.unwrap_or(config.load.batch_size);
    let mut store = open_store(config, dry_run)?;
    let report = upload(store.as_mut(), batch_size, &data)?;
    print_load_table(&store.target(), &report);
    Ok(())
}

fn resolve_roots(config: &Config, roots: Vec<PathBuf>) -> anyhow::Result<Vec<PathBuf>> {
    let roots = if roots.is_empty() {
        config.corpus.roots.clone()
    } else {
        roots
    };
    if roots.is_empty() {
        anyhow::bail!("No mailbox roots given (pass them as arguments or set [corpus] roots)");
    }
    Ok(roots)
}

fn walk(roots: &[PathBuf], max_messages: Option<usize>) -> anyhow::Result<(Corpus, WalkStats)> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} Parsing {pos} file(s) {msg}")
            .expect("valid template"),
    );

    let mut walker = CorpusWalker::new();
    walker.process(
        roots,
        max_messages,
        Some(&|stats: &WalkStats| {
            pb.set_position(stats.files_processed + stats.files_errored);
            if stats.files_errored > 0 {
                pb.set_message(format!("({} unparseable)", stats.files_errored));
            }
        }),
    )?;
    pb.finish_and_clear();

    let stats = walker.stats().clone();
    Ok((walker.into_corpus(), stats))
}

fn open_store(config: &Config, dry_run: bool) -> anyhow::Result<Box<dyn GraphStore>> {
    if dry_run {
        return Ok(Box::new(MemoryStore::new()));
    }
    if config.graph.password.is_none() {
        tracing::warn!("No graph password configured; set NEO4J_PASSWORD or [graph] password");
    }
    Ok(Box::new(Neo4jHttpStore::new(&config.graph)?))
}

fn upload(store: &mut dyn GraphStore, batch_size: usize, data: &Interchange) -> anyhow::Result<LoadReport> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg:<8} [{bar:40.cyan/blue}] {pos}/{len} batches")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let on_batch = |p: LoadProgress| {
        pb.set_message(match p.stage {
            LoadStage::People => "People",
            LoadStage::Emails => "Emails",
        });
        pb.set_length(p.batches as u64);
        pb.set_position(p.batch as u64 + 1);
    };
    let report = BatchLoader::new(store, batch_size)
        .with_progress(&on_batch)
        .load(&data.people, &data.messages)?;
    pb.finish_and_clear();
    Ok(report)
}

/// Print walk statistics in a human-readable table.
fn print_walk_table(roots: &[PathBuf], output: &Path, corpus: &Corpus, stats: &WalkStats) {
    use humansize::{format_size, BINARY};

    println!();
    for root in roots {
        println!("  {:<24} {}", "Mailbox root", root.display());
    }
    println!("  {:<24} {}", "Files found", stats.files_found);
    println!(
        "  {:<24} {} ({:.1}%)",
        "Files parsed",
        stats.files_processed,
        stats.success_rate()
    );
    println!("  {:<24} {}", "Files skipped", stats.files_errored);
    println!("  {:<24} {}", "Messages", stats.total_messages);
    println!("  {:<24} {}", "People", corpus.people.len());

    if let Some((min, max)) = corpus.date_range() {
        println!(
            "  {:<24} {} to {}",
            "Date range",
            min.format("%Y-%m-%d"),
            max.format("%Y-%m-%d")
        );
    }

    println!(
        "  {:<24} {} in {} message(s), {}",
        "Attachments",
        stats.total_attachments,
        stats.messages_with_attachments,
        format_size(stats.attachment_bytes, BINARY)
    );
    println!("  {:<24} {:.2?}", "Elapsed", stats.elapsed);
    println!("  {:<24} {}", "Output", output.display());

    if !stats.parse_errors.is_empty() {
        println!();
        println!("  Skipped files by cause:");
        for (cause, count) in &stats.parse_errors {
            println!("    {count:>6}  {cause}");
        }
    }

    let top = corpus.top_senders(10);
    if !top.is_empty() {
        println!();
        println!("  Top senders:");
        for (sender, count) in &top {
            println!("    {count:>6}  {sender}");
        }
    }
    println!();
}

/// Print walk statistics as JSON.
fn print_walk_json(
    roots: &[PathBuf],
    output: &Path,
    corpus: &Corpus,
    stats: &WalkStats,
) -> anyhow::Result<()> {
    let date_range = corpus.date_range().map(|(min, max)| {
        serde_json::json!({
            "oldest": min.to_rfc3339(),
            "newest": max.to_rfc3339(),
        })
    });

    let top_json: Vec<serde_json::Value> = corpus
        .top_senders(10)
        .iter()
        .map(|(sender, count)| {
            serde_json::json!({
                "sender": sender,
                "count": count,
            })
        })
        .collect();

    let folders: serde_json::Map<String, serde_json::Value> = corpus
        .folder_counts()
        .into_iter()
        .map(|(folder, count)| (folder.to_string_lossy().into_owned(), count.into()))
        .collect();

    let summary = serde_json::json!({
        "roots": roots.iter().map(|r| r.to_string_lossy()).collect::<Vec<_>>(),
        "output": output.to_string_lossy(),
        "people": corpus.people.len(),
        "date_range": date_range,
        "stats": stats,
        "success_rate": stats.success_rate(),
        "folders": folders,
        "attachment_types": corpus.attachment_types(),
        "top_senders": top_json,
    });

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Print a load report in a human-readable table.
fn print_load_table(target: &str, report: &LoadReport) {
    println!();
    println!("  {:<24} {}", "Graph store", target);
    println!(
        "  {:<24} {} ({} batch(es) written, {} skipped)",
        "Person nodes",
        report.persons_written,
        report.person_batches_written,
        report.person_batches_skipped
    );
    println!(
        "  {:<24} {} ({} batch(es) written, {} skipped)",
        "Email nodes",
        report.emails_written,
        report.email_batches_written,
        report.email_batches_skipped
    );
    for (kind, count) in &report.edges_written {
        println!("  {:<24} {}", kind.as_str(), count);
    }
    if report.total_dropped() > 0 {
        println!();
        println!("  Dropped references to unknown people:");
        for (kind, count) in &report.dropped {
            println!("    {count:>6}  {kind}");
        }
    }
    println!("  {:<24} {:.2?}", "Elapsed", report.elapsed);
    println!();
}

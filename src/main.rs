//! CLI entry point for `mimeview`.

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};

use mimeview::config::{self, Config};
use mimeview::message::{Message, RenderMode};
use mimeview::mime::node::{NodeId, NodeSummary};
use mimeview::mime::partial::FragmentPool;
use mimeview::mime::TreeBuilder;
use mimeview::model::attachment::sanitize_filename;

#[derive(Parser)]
#[command(
    name = "mimeview",
    version,
    about = "Decode MIME messages: body text, part tree, attachments"
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
    /// Print the headers and the viewable body of a message
    Show {
        path: PathBuf,
        /// Render as HTML (plain text parts are converted)
        #[arg(long, conflicts_with = "fallback_html")]
        html: bool,
        /// Render the plain alternative through the HTML escaping path
        #[arg(long)]
        fallback_html: bool,
        /// Other message/partial fragments to reassemble with
        #[arg(long = "fragment", value_name = "FILE")]
        fragments: Vec<PathBuf>,
    },
    /// Print the content tree
    Tree {
        path: PathBuf,
        #[arg(long)]
        json: bool,
        #[arg(long = "fragment", value_name = "FILE")]
        fragments: Vec<PathBuf>,
    },
    /// List attachments
    Attachments {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Write attachments to a directory
    Extract {
        path: PathBuf,
        /// Only the part with this id (see `tree`)
        #[arg(long)]
        id: Option<NodeId>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Save the message; the name is suggested when DEST is a directory
    Save { path: PathBuf, dest: PathBuf },
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
    let config = config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Show {
            path,
            html,
            fallback_html,
            fragments,
        } => cmd_show(&path, html, fallback_html, &fragments, &config),
        Commands::Tree {
            path,
            json,
            fragments,
        } => cmd_tree(&path, json, &fragments, &config),
        Commands::Attachments { path, json } => cmd_attachments(&path, json, &config),
        Commands::Extract { path, id, output } => cmd_extract(&path, id, &output, &config),
        Commands::Save { path, dest } => cmd_save(&path, &dest, &config),
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

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mimeview.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Tree builder from config, with any fragment files added to its pool.
fn tree_builder(config: &Config, fragments: &[PathBuf]) -> anyhow::Result<TreeBuilder> {
    let builder = TreeBuilder::new(&config.render);
    if fragments.is_empty() {
        return Ok(builder);
    }

    let mut pool = FragmentPool::new();
    for path in fragments {
        let raw = std::fs::read(path)?;
        if !pool.add_message(&raw)? {
            tracing::warn!(path = %path.display(), "Not a message/partial fragment, ignored");
        }
    }
    Ok(builder.with_fragments(pool))
}

fn load(path: &Path, builder: &TreeBuilder) -> anyhow::Result<Message> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    Ok(Message::from_file_with(path, builder)?)
}

fn cmd_show(
    path: &Path,
    html: bool,
    fallback_html: bool,
    fragments: &[PathBuf],
    config: &Config,
) -> anyhow::Result<()> {
    let builder = tree_builder(config, fragments)?;
    let message = load(path, &builder)?;
    let mode = RenderMode::from_flags(html, fallback_html)?;
    let headers = message.headers();

    println!("{:<9} {}", "From:", headers.sender);
    if !headers.to.is_empty() {
        println!("{:<9} {}", "To:", join_addresses(&headers.to));
    }
    if !headers.cc.is_empty() {
        println!("{:<9} {}", "Cc:", join_addresses(&headers.cc));
    }
    if let Some(date) = headers.date {
        println!("{:<9} {}", "Date:", date.format("%Y-%m-%d %H:%M"));
    }
    println!("{:<9} {}", "Subject:", headers.subject);
    println!();
    println!("{}", message.viewable_text(mode));

    let attachments = message.attachment_descriptors();
    if !attachments.is_empty() {
        use humansize::{format_size, BINARY};
        println!();
        for att in &attachments {
            println!(
                "  [{}] {} ({}, {})",
                att.id,
                att.save_name(),
                att.content_type,
                format_size(att.size, BINARY)
            );
        }
    }
    Ok(())
}

fn join_addresses(list: &[mimeview::model::address::EmailAddress]) -> String {
    list.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn cmd_tree(path: &Path, json: bool, fragments: &[PathBuf], config: &Config) -> anyhow::Result<()> {
    let builder = tree_builder(config, fragments)?;
    let message = load(path, &builder)?;
    let summary = message.root().summary();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_tree(&summary, 0);
    }
    Ok(())
}

fn print_tree(node: &NodeSummary, depth: usize) {
    use humansize::{format_size, BINARY};

    let mut flags = Vec::new();
    if node.viewable {
        flags.push("viewable");
    }
    if node.attachment {
        flags.push("attachment");
    }
    if node.preferred {
        flags.push("preferred");
    }

    let mut line = format!(
        "{}[{}] {:?} {}",
        "  ".repeat(depth),
        node.id,
        node.variant,
        node.content_type
    );
    if let Some(ref name) = node.filename {
        line.push_str(&format!(" \"{name}\""));
    }
    if let Some(size) = node.size {
        line.push_str(&format!(" {}", format_size(size, BINARY)));
    }
    if !flags.is_empty() {
        line.push_str(&format!(" ({})", flags.join(", ")));
    }
    if let Some(ref fault) = node.fault {
        line.push_str(&format!(" !{fault}"));
    }
    println!("{line}");

    for child in &node.children {
        print_tree(child, depth + 1);
    }
}

fn cmd_attachments(path: &Path, json: bool, config: &Config) -> anyhow::Result<()> {
    use humansize::{format_size, BINARY};

    let message = load(path, &TreeBuilder::new(&config.render))?;
    let attachments = message.attachment_descriptors();

    if json {
        println!("{}", serde_json::to_string_pretty(&attachments)?);
        return Ok(());
    }

    println!();
    println!("  {} attachment(s)", attachments.len());
    if attachments.is_empty() {
        return Ok(());
    }
    println!();
    println!(
        "  {:<6} {:<40} {:<28} {:>10}",
        "Id", "Filename", "Type", "Size"
    );
    println!("  {}", "-".repeat(87));
    for att in &attachments {
        let name: String = att.save_name().chars().take(39).collect();
        println!(
            "  {:<6} {:<40} {:<28} {:>10}",
            att.id,
            name,
            att.content_type,
            format_size(att.size, BINARY)
        );
    }
    println!();
    Ok(())
}

fn cmd_extract(path: &Path, id: Option<NodeId>, output: &Path, config: &Config) -> anyhow::Result<()> {
    let message = load(path, &TreeBuilder::new(&config.render))?;
    let selected: Vec<_> = message
        .attachment_descriptors()
        .into_iter()
        .filter(|att| id.is_none_or(|wanted| att.id == wanted))
        .collect();

    if selected.is_empty() {
        match id {
            Some(wanted) => anyhow::bail!("No attachment with id {wanted}"),
            None => {
                println!("  No attachments found.");
                return Ok(());
            }
        }
    }

    std::fs::create_dir_all(output)?;
    for att in &selected {
        let saved = att.save_in(message.root(), output)?;
        println!("  {}", saved.display());
    }
    println!(
        "  Extracted {} attachment(s) to {}",
        selected.len(),
        output.display()
    );
    Ok(())
}

fn cmd_save(path: &Path, dest: &Path, config: &Config) -> anyhow::Result<()> {
    let message = load(path, &TreeBuilder::new(&config.render))?;
    let target = if dest.is_dir() {
        dest.join(sanitize_filename(&message.suggested_filename(), 150))
    } else {
        dest.to_path_buf()
    };
    message.save_to(&target)?;
    println!("  Saved to {}", target.display());
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mimeview", &mut std::io::stdout());
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

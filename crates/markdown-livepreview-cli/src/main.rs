use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use markdown_livepreview_config::Config;
use markdown_livepreview_engine::typeset::{DiagramIds, MermaidCli};
use markdown_livepreview_engine::{
    BufferStore, DocumentStats, Previewer, RenderContext, RenderOptions, SanitizerOptions,
    Surface, document_title, io,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::LocalSet;

#[derive(Parser, Debug)]
#[command(name = "markdown-livepreview", version, about = "Render markdown to sanitized HTML")]
struct Cli {
    /// Config file to use instead of ~/.config/markdown-livepreview/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a markdown file once
    Render {
        /// Markdown file, `-` for stdin, or nothing for the last saved buffer
        input: Option<PathBuf>,

        /// Output file; stdout when omitted
        #[arg(short, long, conflicts_with = "out_dir")]
        output: Option<PathBuf>,

        /// Write to DIR/<first heading>.html
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,

        /// Print word, character and line counts to stderr
        #[arg(long)]
        stats: bool,

        /// Leave diagram placeholders untypeset
        #[arg(long)]
        no_diagrams: bool,
    },
    /// Re-render whenever the input file changes
    Watch {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Polling interval
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,

        #[arg(long)]
        no_diagrams: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    log::debug!("using config {config:?}");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    LocalSet::new().block_on(&runtime, run(cli.command, config))
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_path(path)?
            .with_context(|| format!("config file {} not found", path.display())),
        None => Ok(Config::load()?.unwrap_or_default()),
    }
}

async fn run(command: Command, config: Config) -> Result<()> {
    match command {
        Command::Render {
            input,
            output,
            out_dir,
            stats,
            no_diagrams,
        } => {
            let target = match (output, out_dir) {
                (Some(path), _) => Target::File(path),
                (None, Some(dir)) => Target::Dir(dir),
                (None, None) => Target::Stdout,
            };
            render(input.as_deref(), target, stats, !no_diagrams, &config).await
        }
        Command::Watch {
            input,
            output,
            interval_ms,
            no_diagrams,
        } => {
            watch(
                &input,
                output,
                Duration::from_millis(interval_ms),
                !no_diagrams,
                &config,
            )
            .await
        }
    }
}

fn render_options(config: &Config) -> RenderOptions {
    RenderOptions {
        dark_mode: config.dark_mode,
        diagram_language: config.diagram_language.clone(),
        diagram_ids: if config.sequential_diagram_ids {
            DiagramIds::Sequential
        } else {
            DiagramIds::Random
        },
        sanitizer: SanitizerOptions {
            extra_tags: config.extra_tags.clone(),
            extra_attributes: config.extra_attributes.clone(),
        },
    }
}

fn build_previewer(config: &Config, diagrams: bool) -> Previewer {
    let previewer = Previewer::new(RenderContext::new(render_options(config)));
    if diagrams {
        previewer.with_typesetter(MermaidCli::new(config.mermaid_cli.clone()))
    } else {
        previewer
    }
}

fn remember_buffer(config: &Config, source: &str) {
    if let Some(path) = &config.buffer_path
        && let Err(e) = BufferStore::new(path.clone()).save(source)
    {
        log::warn!("failed to save buffer to {}: {e}", path.display());
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Target {
    Stdout,
    File(PathBuf),
    Dir(PathBuf),
}

impl Target {
    fn path_for(&self, source: &str) -> Option<PathBuf> {
        match self {
            Target::Stdout => None,
            Target::File(path) => Some(path.clone()),
            Target::Dir(dir) => Some(dir.join(format!("{}.html", document_title(source)))),
        }
    }
}

fn read_input(input: Option<&Path>, config: &Config) -> Result<String> {
    match input {
        Some(path) if path == Path::new("-") => {
            io::read_source_from(std::io::stdin().lock()).context("failed to read stdin")
        }
        Some(path) => {
            io::read_source(path).with_context(|| format!("failed to read {}", path.display()))
        }
        None => {
            let Some(buffer_path) = &config.buffer_path else {
                bail!("no input given and no buffer_path configured");
            };
            BufferStore::new(buffer_path.clone())
                .load()?
                .with_context(|| format!("no saved buffer at {}", buffer_path.display()))
        }
    }
}

async fn render(
    input: Option<&Path>,
    target: Target,
    stats: bool,
    diagrams: bool,
    config: &Config,
) -> Result<()> {
    let source = read_input(input, config)?;
    if input.is_some() {
        remember_buffer(config, &source);
    }

    let mut previewer = build_previewer(config, diagrams);
    let outcome = previewer.on_change(&source);
    for task in outcome.tasks {
        task.await?;
    }
    let html = previewer.html();

    match target.path_for(&source) {
        Some(path) => io::write_rendered(&path, &html)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => std::io::stdout().lock().write_all(html.as_bytes())?,
    }
    if stats {
        eprintln!("{}", DocumentStats::from_text(&source));
    }
    Ok(())
}

async fn watch(
    input: &Path,
    output: PathBuf,
    interval: Duration,
    diagrams: bool,
    config: &Config,
) -> Result<()> {
    let mut previewer = build_previewer(config, diagrams).with_listener(move |surface: &Surface| {
        if let Err(e) = io::write_rendered(&output, &surface.html()) {
            log::error!("failed to write {}: {e}", output.display());
        }
    });

    let mut last: Option<String> = None;
    loop {
        match io::read_source(input) {
            Ok(source) if last.as_deref() != Some(source.as_str()) => {
                let outcome = previewer.on_change(&source);
                log::info!(
                    "pass {}: {} ({} diagrams)",
                    outcome.generation,
                    DocumentStats::from_text(&source),
                    outcome.tasks.len()
                );
                remember_buffer(config, &source);
                last = Some(source);
            }
            Ok(_) => {}
            Err(e) => log::warn!("{e}"),
        }
        tokio::time::sleep(interval).await;
    }
}

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use plate_slash::{EditorMount, MountOptions};
use tracing_subscriber::EnvFilter;

mod script;

#[derive(Parser, Debug)]
#[command(name = "plate-story")]
#[command(about = "Replay an editing session against the slash-command editor")]
#[command(version)]
struct Cli {
    /// Content JSON to start from (a single empty paragraph if omitted)
    #[arg(long)]
    content: Option<PathBuf>,

    /// Keystrokes and `{directives}` to replay
    #[arg(long, default_value = "")]
    script: String,

    /// Answer given when the image command asks for a URL
    #[arg(long)]
    image_url: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let steps = script::parse(&cli.script)?;

    let mut options = MountOptions::new()
        .on_change(|value| {
            tracing::debug!(blocks = value.document.children.len(), "content changed");
        })
        .on_error(|err| tracing::error!(%err, "slash command failed"));
    if let Some(path) = &cli.content {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let content = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", path.display()))?;
        options = options.content(content);
    }
    if let Some(url) = cli.image_url {
        options = options.prompt(move |_| Some(url.clone()));
    }

    let mut mount = EditorMount::mount(options)?;
    for step in &steps {
        script::replay(&mut mount, step)?;
    }

    if let Some(session) = mount.menu().session() {
        tracing::info!(
            query = %session.query,
            candidates = ?mount.menu().candidate_titles(),
            "menu left open"
        );
    }
    println!("{}", mount.content().to_json_pretty()?);
    Ok(())
}

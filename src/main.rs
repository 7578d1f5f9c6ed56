use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use kagi_obsidian_bridge::db::{detect_settings_path, SettingsStore};
use kagi_obsidian_bridge::opener::{obsidian_url, NoteOpener, SystemOpener};
use kagi_obsidian_bridge::page::dom::Document;
use kagi_obsidian_bridge::page::render::{result_element_id, RESULT_CLASS};
use kagi_obsidian_bridge::page::template::CONTENT_ID;
use kagi_obsidian_bridge::settings_form::SettingsSurface;
use kagi_obsidian_bridge::Bridge;

#[derive(Debug, Parser)]
#[command(name = "kagi-obsidian-bridge", version, about = "Show Obsidian notes from Omnisearch next to Kagi searches")]
struct Cli {
    /// Settings database (defaults to the per-user config directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a search page session and print the rendered sidebar
    Search {
        /// Kagi results URL, e.g. https://kagi.com/search?q=rust
        url: String,
        /// Print a plain-text listing instead of HTML
        #[arg(long)]
        text: bool,
        /// Open the result at this position (0-based) in Obsidian
        #[arg(long, value_name = "INDEX")]
        open: Option<usize>,
    },
    /// Open a note path in the configured vault
    Open { path: String },
    /// Inspect or change settings
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Debug, Subcommand)]
enum SettingsCommand {
    Show,
    Set(SetArgs),
}

#[derive(Debug, Args)]
struct SetArgs {
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    port: Option<String>,
    #[arg(long)]
    vault: Option<String>,
    #[arg(long)]
    sidebar_width: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    kagi_obsidian_bridge::init_tracing();
    let cli = Cli::parse();
    let store = SettingsStore::new(cli.settings.unwrap_or_else(detect_settings_path));

    match cli.command {
        Command::Search { url, text, open } => search(store, url, text, open).await,
        Command::Open { path } => {
            let settings = store.load().context("could not load Obsidian vault settings")?;
            let url = obsidian_url(&settings.obsidian_vault_name, &path);
            SystemOpener.open(&url)?;
            println!("{url}");
            Ok(())
        }
        Command::Settings(SettingsCommand::Show) => {
            let settings = store.load()?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
        Command::Settings(SettingsCommand::Set(args)) => {
            let mut surface = SettingsSurface::open(store);
            if let Some(base_url) = args.base_url {
                surface.form.base_url = base_url;
            }
            if let Some(port) = args.port {
                surface.form.port = port;
            }
            if let Some(vault) = args.vault {
                surface.form.vault_name = vault;
            }
            if let Some(width) = args.sidebar_width {
                surface.form.sidebar_width = width;
            }
            let outcome = surface.submit();
            if let Some(status) = surface.status() {
                println!("{}", status.text);
            }
            outcome?;
            Ok(())
        }
    }
}

async fn search(store: SettingsStore, url: String, text: bool, open: Option<usize>) -> Result<()> {
    let bridge = Bridge::new(store);
    let mut page = bridge.open_page(url.clone());
    if page.load().is_none() {
        println!("No search query found in {url}");
        return Ok(());
    }
    page.process_next().await.context("relay went away")?;

    if let Some(index) = open {
        if !page.click(&result_element_id(index)).await {
            bail!("result {index} does not exist or has no path");
        }
        if let Some(alert) = page.alerts().last() {
            bail!("{alert}");
        }
    }

    if text {
        print_text(page.document());
    } else {
        println!("{}", page.document().to_html());
    }
    Ok(())
}

fn print_text(document: &Document) {
    let Some(content) = document.get_element_by_id(CONTENT_ID) else {
        println!("(sidebar could not be created)");
        return;
    };
    for block in content.elements() {
        if !block.has_class(RESULT_CLASS) {
            println!("{}", block.text_content());
            continue;
        }
        let mut lines = block.elements().map(|el| el.text_content());
        if let Some(title) = lines.next() {
            println!();
            println!("* {title}");
        }
        for line in lines.filter(|l| !l.is_empty()) {
            println!("  {line}");
        }
    }
}

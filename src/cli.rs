use std::error::Error;
use std::path::PathBuf;

use atty::Stream;
use cefr_drill::{Catalog, RangeSelection, SpeechConfig, TranslateTts, WordEntry, WordlistCache, narrate};
use clap::{Parser, Subcommand};
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cefr-drill", about = "Practice CEFR B2/C1 vocabulary", version)]
pub struct Cli {
    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    /// Log filter, e.g. `debug` or `cefr_drill=trace`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// URL or directory holding the word-list files.
    #[arg(long, global = true, default_value = cefr_drill::catalog::DEFAULT_DATA_BASE)]
    data_base: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the word lists that can be loaded.
    Lists,
    /// Print a range of a word list.
    List {
        /// Word list id, see `lists`.
        list: String,
        /// First SID; defaults to the lowest in the list.
        #[arg(long)]
        start: Option<u32>,
        /// Last SID; defaults to twenty words from the start.
        #[arg(long)]
        end: Option<u32>,
    },
    /// Save a range read aloud ("Number 1, acid. ...") as an MP3 file.
    Audio {
        list: String,
        #[arg(long)]
        start: Option<u32>,
        #[arg(long)]
        end: Option<u32>,
        /// Destination file.
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Run the practice web application.
    #[cfg(feature = "web")]
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: std::net::SocketAddr,
        #[arg(long, value_enum, default_value_t = ThemeArg::Tailwind)]
        theme: ThemeArg,
    },
}

#[cfg(feature = "web")]
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ThemeArg {
    Tailwind,
    Bootstrap,
}

#[cfg(feature = "web")]
impl From<ThemeArg> for cefr_drill::web::WebTheme {
    fn from(value: ThemeArg) -> Self {
        match value {
            ThemeArg::Tailwind => Self::Tailwind,
            ThemeArg::Bootstrap => Self::Bootstrap,
        }
    }
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());
    let catalog = Catalog::with_base(&cli.data_base);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    match cli.command {
        Command::Lists => handle_lists(&catalog, cli.json),
        Command::List { list, start, end } => {
            runtime.block_on(handle_list(&catalog, &list, start, end, cli.json))
        }
        Command::Audio {
            list,
            start,
            end,
            out,
        } => runtime.block_on(handle_audio(&catalog, &list, start, end, out, cli.json)),
        #[cfg(feature = "web")]
        Command::Serve { addr, theme } => {
            let config = cefr_drill::web::WebConfig {
                addr,
                theme: theme.into(),
                data_base: cli.data_base.clone(),
                ..Default::default()
            };
            runtime.block_on(cefr_drill::web::serve(config))?;
            Ok(())
        }
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_lists(catalog: &Catalog, as_json: bool) -> Result<(), Box<dyn Error>> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(catalog.wordlists())?);
        return Ok(());
    }
    let width = catalog
        .wordlists()
        .iter()
        .map(|source| source.id.len())
        .max()
        .unwrap_or(2)
        .max("ID".len());
    println!("{:<width$}  {}", "ID", "LABEL", width = width);
    println!("{:-<width$}  {}", "", "-----", width = width);
    for source in catalog.wordlists() {
        println!("{:<width$}  {}", source.id, source.label, width = width);
    }
    Ok(())
}

async fn handle_list(
    catalog: &Catalog,
    list_id: &str,
    start: Option<u32>,
    end: Option<u32>,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let source = catalog.wordlist(list_id)?;
    let list = WordlistCache::http().load(&source.location).await?;
    let selection = RangeSelection::for_list(&list, start, end);
    let entries = selection
        .map(|selection| selection.apply(&list))
        .unwrap_or_default();

    if as_json {
        let payload = json!({
            "list": source.id,
            "total": list.len(),
            "selection": selection,
            "entries": entries,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_entries(source.label, &entries);
    }
    Ok(())
}

async fn handle_audio(
    catalog: &Catalog,
    list_id: &str,
    start: Option<u32>,
    end: Option<u32>,
    out: PathBuf,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let source = catalog.wordlist(list_id)?;
    let list = WordlistCache::http().load(&source.location).await?;
    let selection = RangeSelection::for_list(&list, start, end)
        .ok_or_else(|| format!("Word list {list_id:?} is empty"))?;
    let entries = selection.apply(&list);
    let voice = TranslateTts::new(SpeechConfig::default());
    let clip = narrate(&voice, &entries).await?;
    tokio::fs::write(&out, clip.bytes()).await?;

    if as_json {
        let payload = json!({
            "list": source.id,
            "selection": selection,
            "words": entries.len(),
            "bytes": clip.len(),
            "out": out.display().to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!(
            "Wrote {} words (SID {}-{}) to {}",
            entries.len(),
            selection.start,
            selection.end,
            out.display()
        );
    }
    Ok(())
}

fn print_entries(label: &str, entries: &[&WordEntry]) {
    if entries.is_empty() {
        println!("No words in this range of {label}.");
        return;
    }
    let mut table = format!("**{label}**\n\n|SID|Word|Part of speech|\n|-:|:-|:-|\n");
    for entry in entries {
        table.push_str(&format!(
            "|{}|{}|{}|\n",
            entry.sid,
            entry.word,
            entry.pos.as_deref().unwrap_or("")
        ));
    }
    if stdout_is_tty() {
        let skin = MadSkin::default();
        let formatted = FmtText::from(&skin, &table, Some(markdown_width()));
        println!("{formatted}");
    } else {
        let width = entries
            .iter()
            .map(|entry| entry.word.len())
            .max()
            .unwrap_or(4)
            .max("WORD".len());
        println!("{:>5}  {:<width$}  {}", "SID", "WORD", "POS", width = width);
        for entry in entries {
            println!(
                "{:>5}  {:<width$}  {}",
                entry.sid,
                entry.word,
                entry.pos.as_deref().unwrap_or(""),
                width = width
            );
        }
    }
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

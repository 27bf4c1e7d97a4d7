//! `notecull` command-line front end.
//!
//! # Responsibility
//! - Turn flags into filter sets, deletion and wipe requests.
//! - Drive `notecull_core` against a local SQLite item store.
//! - Render results as plain lines or JSON.

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::error;
use notecull_core::{
    comma_split, init_from_config, project_references, DeletionRequest, EngineConfig,
    FieldSelector, FilterSet, Item, ItemDraft, ItemType, MatchPolicy, MutationReport,
    MutationService, Predicate, QueryService, SnapshotCache, SqliteItemStore, WipeRequest,
};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "notecull", version, about = "Select, delete and wipe notes in bulk")]
struct Cli {
    /// SQLite item store file.
    #[arg(long, global = true, default_value = "notecull.db")]
    db: PathBuf,

    /// TOML engine config; defaults apply when the file is absent.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create one item, or `--count` generated notes.
    Add(AddArgs),
    /// List items matching the given filters.
    Get(GetArgs),
    /// Delete items by uuid and/or title.
    Delete(DeleteArgs),
    /// Delete every item of one type.
    Wipe {
        #[arg(long = "type")]
        item_type: Option<String>,
    },
    /// Print the core version.
    Version,
}

#[derive(Args, Debug)]
struct AddArgs {
    #[arg(long, required_unless_present = "count")]
    title: Option<String>,
    #[arg(long, default_value = "", conflicts_with = "count")]
    text: String,
    #[arg(long = "type", conflicts_with = "count")]
    item_type: Option<String>,
    /// Generate this many numbered notes instead of one titled item.
    #[arg(long, conflicts_with = "title")]
    count: Option<usize>,
    /// Filler paragraphs per generated note.
    #[arg(long, default_value_t = 3, requires = "count")]
    paragraphs: usize,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args, Debug)]
struct GetArgs {
    /// Exact title to match.
    #[arg(long)]
    title: Option<String>,
    /// Extra predicate as `field:comparator:value`, repeatable.
    #[arg(long = "filter")]
    filters: Vec<String>,
    /// Match any predicate instead of all.
    #[arg(long)]
    any: bool,
    /// Serve from the configured snapshot when possible.
    #[arg(long)]
    cached: bool,
    /// Print `(uuid, content_type)` references instead of items.
    #[arg(long)]
    refs: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
    #[arg(long = "type")]
    item_type: Option<String>,
}

#[derive(Args, Debug)]
struct DeleteArgs {
    /// Comma separated uuids.
    #[arg(long, default_value = "")]
    uuid: String,
    /// Comma separated titles (patterns with `--regex`).
    #[arg(long, default_value = "")]
    title: String,
    #[arg(long)]
    regex: bool,
    #[arg(long = "type")]
    item_type: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_exit module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = match cli.config.as_deref() {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    init_from_config(&config)?;

    if let Command::Version = cli.command {
        println!("notecull_core version={}", notecull_core::core_version());
        return Ok(());
    }

    let store = SqliteItemStore::open(&cli.db)?;
    let resolve_type = |value: Option<String>| {
        value
            .map(ItemType::new)
            .unwrap_or_else(|| config.item_type.clone())
    };

    match cli.command {
        Command::Add(args) => {
            let service = MutationService::with_config(&store, &config);
            let created = match (args.count, args.title) {
                (Some(count), _) => service.create_notes(count, args.paragraphs)?,
                (None, Some(title)) => {
                    let draft = ItemDraft {
                        item_type: resolve_type(args.item_type),
                        label: title,
                        body: args.text,
                        ..ItemDraft::default()
                    };
                    vec![service.add_item(&draft)?]
                }
                (None, None) => return Err("add needs --title or --count".into()),
            };
            for item in &created {
                println!("{}", item.id);
            }
        }
        Command::Get(args) => {
            let item_type = resolve_type(args.item_type);
            let filter_set = build_filter_set(args.title, &args.filters, args.any)?;
            let mut query = QueryService::new(&store);
            if let Some(path) = config.snapshot_path.clone() {
                query = query.with_snapshot(SnapshotCache::new(path));
            }
            let items = match filter_set {
                Some(filter_set) if args.cached => query.select_cached(&item_type, &filter_set)?,
                Some(filter_set) => query.select(&item_type, &filter_set)?,
                None => query.list_live(&item_type)?,
            };
            print!("{}", render_items(&items, args.refs, args.output)?);
        }
        Command::Delete(args) => {
            let request = DeletionRequest {
                item_type: resolve_type(args.item_type),
                identifiers: comma_split(&args.uuid),
                labels: comma_split(&args.title),
                regex: args.regex,
            };
            if request.is_empty() {
                return Err("delete needs --uuid and/or --title".into());
            }
            let report = MutationService::with_config(&store, &config).delete(&request)?;
            print_report(&report);
        }
        Command::Wipe { item_type } => {
            let request = WipeRequest::new(resolve_type(item_type));
            let report = MutationService::with_config(&store, &config).wipe(&request)?;
            print_report(&report);
        }
        Command::Version => {}
    }

    Ok(())
}

fn build_filter_set(
    title: Option<String>,
    filters: &[String],
    any: bool,
) -> Result<Option<FilterSet>, Box<dyn Error>> {
    let mut predicates = Vec::new();
    if let Some(title) = title {
        predicates.push(Predicate::equals(FieldSelector::Label, title));
    }
    for raw in filters {
        let mut parts = raw.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(field), Some(comparator), Some(value)) => {
                predicates.push(Predicate::parse(field, comparator, value)?);
            }
            _ => return Err(format!("filter `{raw}` must be field:comparator:value").into()),
        }
    }
    if predicates.is_empty() {
        return Ok(None);
    }
    let policy = if any {
        MatchPolicy::MatchAny
    } else {
        MatchPolicy::MatchAll
    };
    Ok(Some(FilterSet::new(predicates, policy)?))
}

fn render_items(
    items: &[Item],
    refs: bool,
    format: OutputFormat,
) -> Result<String, serde_json::Error> {
    let mut out = match (format, refs) {
        (OutputFormat::Json, true) => serde_json::to_string_pretty(&project_references(items))?,
        (OutputFormat::Json, false) => serde_json::to_string_pretty(items)?,
        (OutputFormat::Text, true) => project_references(items)
            .iter()
            .map(|reference| format!("{}  {}\n", reference.id, reference.item_type))
            .chain(std::iter::once(format!("{} item(s)", items.len())))
            .collect(),
        (OutputFormat::Text, false) => items
            .iter()
            .map(|item| format!("{}  {}\n", item.id, item.label().unwrap_or("-")))
            .chain(std::iter::once(format!("{} item(s)", items.len())))
            .collect(),
    };
    out.push('\n');
    Ok(out)
}

fn print_report(report: &MutationReport) {
    println!("deleted {} of {} matched", report.deleted, report.matched.len());
    for failure in &report.failures {
        println!("failed {}: {}", failure.id, failure.reason);
    }
}

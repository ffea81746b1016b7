//! Binary entry point for the `strata` inspection CLI.
#![forbid(unsafe_code)]

mod config;
mod ui;

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use strata::codec::{decode_frame, Frame, WireCodec};
use strata::fold::{
    ElementStatus, FoldEngine, FoldOptions, FoldedState, HideAudience, HistoryOrder, HistoryQuery,
    Ingestor, TieBreak,
};
use strata::mutation::{HistoricalEvent, MutationRecord};
use strata::types::Timestamp;
use strata::visibility::{parse, Authorizations, Visibility};
use tracing_subscriber::EnvFilter;

use config::CliConfig;
use ui::{Theme, Ui};

#[derive(Parser, Debug)]
#[command(
    name = "strata",
    version,
    about = "Inspect visibility labels, wire frames and mutation logs",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(
        long,
        global = true,
        value_name = "a,b",
        help = "Comma-separated authorization tokens (defaults to the config file)"
    )]
    auths: Option<String>,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        env = "STRATA_CONFIG",
        help = "CLI config file"
    )]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = Theme::Auto)]
    theme: Theme,

    #[arg(
        short,
        long,
        global = true,
        action = ArgAction::Count,
        help = "Raise log verbosity (-v debug, -vv trace)"
    )]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Parse a visibility expression and print its canonical form")]
    Parse {
        #[arg(value_name = "EXPR")]
        expression: String,
    },

    #[command(about = "Evaluate a visibility expression against --auths")]
    Eval {
        #[arg(value_name = "EXPR")]
        expression: String,
    },

    #[command(about = "Decode a hex-encoded payload, record or event frame")]
    Decode {
        #[arg(value_name = "HEX")]
        hex: String,
    },

    #[command(about = "Encode a JSON-lines record file as hex record frames")]
    Encode {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    #[command(about = "Fold a JSON-lines record file into element state")]
    Fold {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[command(flatten)]
        fold: FoldArgs,

        #[arg(long, value_name = "TS", help = "Ignore records after this timestamp")]
        as_of: Option<Timestamp>,
    },

    #[command(about = "Print the ordered event history of a JSON-lines record file")]
    History {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(long, help = "Narrate every record, annotated with the caller's verdict")]
        all: bool,

        #[arg(long, help = "Newest first")]
        desc: bool,

        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },
}

#[derive(clap::Args, Debug)]
struct FoldArgs {
    #[arg(long, value_enum, help = "Same-timestamp ordering policy")]
    tie_break: Option<TieBreakArg>,

    #[arg(long, value_enum, help = "Which callers a hide applies to")]
    hide_audience: Option<HideAudienceArg>,

    #[arg(long, help = "Report hidden properties and edges, flagged")]
    include_hidden: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum TieBreakArg {
    Last,
    First,
}

impl From<TieBreakArg> for TieBreak {
    fn from(arg: TieBreakArg) -> Self {
        match arg {
            TieBreakArg::Last => TieBreak::LastArrivalWins,
            TieBreakArg::First => TieBreak::FirstArrivalWins,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum HideAudienceArg {
    #[value(name = "non-holders")]
    NonHolders,
    Holders,
}

impl From<HideAudienceArg> for HideAudience {
    fn from(arg: HideAudienceArg) -> Self {
        match arg {
            HideAudienceArg::NonHolders => HideAudience::NonHolders,
            HideAudienceArg::Holders => HideAudience::Holders,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_env("STRATA_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = CliConfig::load(cli.config.clone())?;
    tracing::debug!(path = ?config.path(), "cli.config");
    let ui = Ui::new(cli.theme);
    let auths = cli
        .auths
        .as_deref()
        .map(Authorizations::parse)
        .or_else(|| config.default_auths())
        .unwrap_or_default();

    match cli.command {
        Command::Parse { expression } => {
            let label = parse(&expression)?;
            let report = ParseReport {
                canonical: label.to_expression(),
                tokens: label.tokens().into_iter().map(str::to_owned).collect(),
                expression,
            };
            emit(cli.format, &report, || {
                ui.section(
                    "label",
                    [
                        ("expression", report.expression.clone()),
                        ("canonical", report.canonical.clone()),
                        ("tokens", report.tokens.join(", ")),
                    ],
                )
            })?;
        }
        Command::Eval { expression } => {
            let visibility = Visibility::new(expression)?;
            let report = EvalReport {
                visible: auths.can_see(&visibility)?,
                expression: visibility.to_string(),
                auths: auths.iter().map(str::to_owned).collect(),
            };
            emit(cli.format, &report, || {
                let verdict = if report.visible { "visible" } else { "not visible" };
                println!("{verdict}");
            })?;
        }
        Command::Decode { hex } => {
            let bytes = hex::decode(hex.trim())?;
            let frame = decode_frame(&bytes)?;
            emit(cli.format, &frame, || print_frame(&ui, &frame))?;
        }
        Command::Encode { file } => {
            let records = read_records(&file)?;
            let frames: Vec<String> = records.iter().map(|r| hex::encode(r.encode())).collect();
            emit(cli.format, &frames, || {
                for frame in &frames {
                    println!("{frame}");
                }
            })?;
        }
        Command::Fold { file, fold, as_of } => {
            let options = fold_options(config.fold_options(), &fold);
            let records = read_records(&file)?;
            let states = FoldEngine::new(options).fold_partition(&records, &auths, as_of)?;
            let states: Vec<FoldedState> = states.into_values().collect();
            emit(cli.format, &states, || {
                for state in &states {
                    print_state(&ui, state);
                }
            })?;
        }
        Command::History {
            file,
            all,
            desc,
            limit,
        } => {
            let engine = FoldEngine::new(config.fold_options());
            let records = read_records(&file)?;
            let filter = if all { None } else { Some(&auths) };
            let history = engine.historical_events(&records, filter)?;
            let mut query = HistoryQuery::new();
            if desc {
                query = query.order(HistoryOrder::Descending);
            }
            if let Some(limit) = limit {
                query = query.limit(limit);
            }
            if all {
                let annotated = history.annotate_query(&query, &engine, &auths)?;
                emit(cli.format, &annotated, || {
                    for entry in &annotated {
                        ui.line(&entry.event.to_string(), !entry.visible);
                    }
                })?;
            } else {
                let picked: Vec<&HistoricalEvent> = history.query(&query).collect();
                emit(cli.format, &picked, || {
                    for event in &picked {
                        println!("{event}");
                    }
                })?;
            }
        }
    }

    Ok(())
}

fn fold_options(base: FoldOptions, args: &FoldArgs) -> FoldOptions {
    let mut options = base;
    if let Some(tie_break) = args.tie_break {
        options = options.tie_break(tie_break.into());
    }
    if let Some(audience) = args.hide_audience {
        options = options.hide_audience(audience.into());
    }
    if args.include_hidden {
        options = options.include_hidden(true);
    }
    options
}

/// Reads one JSON record per non-blank line; unsequenced records get their line order.
fn read_records(path: &Path) -> Result<Vec<MutationRecord>, Box<dyn Error>> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    let mut records = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let record: MutationRecord = serde_json::from_str(line)
            .map_err(|err| format!("{}:{}: {err}", path.display(), idx + 1))?;
        records.push(record);
    }
    Ok(assign_sequences(records))
}

/// Numbers unsequenced records in line order, after every explicit sequence
/// in the file, so the two never collide.
fn assign_sequences(records: Vec<MutationRecord>) -> Vec<MutationRecord> {
    let highest = records.iter().map(MutationRecord::sequence).max().unwrap_or(0);
    let ingestor = Ingestor::starting_at(highest.saturating_add(1));
    records
        .into_iter()
        .map(|record| {
            let sequence = ingestor.next_sequence();
            if record.sequence() == 0 {
                record.with_sequence(sequence)
            } else {
                record
            }
        })
        .collect()
}

#[derive(Serialize)]
struct ParseReport {
    expression: String,
    canonical: String,
    tokens: Vec<String>,
}

#[derive(Serialize)]
struct EvalReport {
    expression: String,
    auths: Vec<String>,
    visible: bool,
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize + ?Sized,
    F: FnOnce(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}

fn print_frame(ui: &Ui, frame: &Frame) {
    match frame {
        Frame::Payload(payload) => ui.section(
            "payload",
            [
                ("type", format!("{} ({})", payload.kind(), payload.type_id())),
                ("fields", format!("{payload:?}")),
            ],
        ),
        Frame::Record(record) => ui.section(
            "record",
            [
                ("element", record.element().to_string()),
                ("slot", record.slot().to_string()),
                ("timestamp", record.timestamp().to_string()),
                ("sequence", record.sequence().to_string()),
                ("visibility", format!("[{}]", record.visibility())),
                ("mutation", record.describe().describe()),
            ],
        ),
        Frame::Event(event) => ui.section(
            "event",
            [
                ("id", event.id().to_string()),
                ("type", format!("{} ({})", event.kind(), event.type_id())),
                ("visibility", format!("[{}]", event.visibility())),
                ("mutation", event.describe()),
            ],
        ),
    }
}

fn print_state(ui: &Ui, state: &FoldedState) {
    let title = format!("{} ({})", state.element, state.status);
    let mut rows: Vec<(String, String)> = Vec::new();
    if !state.visibility.is_empty() {
        rows.push(("visibility".into(), format!("[{}]", state.visibility)));
    }
    if let Some(ends) = &state.endpoints {
        rows.push((
            "endpoints".into(),
            format!("{} -[{}]-> {}", ends.out_vertex_id, ends.label, ends.in_vertex_id),
        ));
    }
    if let Some(at) = state.soft_deleted_at {
        rows.push(("deleted at".into(), at.to_string()));
    }
    for prop in &state.properties {
        let mut value = prop.value.to_string();
        if !prop.visibility.is_empty() {
            value.push_str(&format!(" [{}]", prop.visibility));
        }
        if prop.hidden {
            value.push_str(" (hidden)");
        }
        rows.push((format!("{}:{}", prop.key, prop.name), value));
        for meta in &prop.metadata {
            rows.push((format!("{}:{}.{}", prop.key, prop.name, meta.key), meta.value.to_string()));
        }
    }
    ui.section(&title, rows);
    if state.status != ElementStatus::Deleted {
        ui.list(
            "edges",
            state.edges.iter().map(|edge| {
                format!(
                    "{} {} ({}) {}{}",
                    edge.direction,
                    edge.edge_id,
                    edge.label.as_deref().unwrap_or("?"),
                    edge.other_vertex_id,
                    if edge.hidden { " (hidden)" } else { "" }
                )
            }),
        );
    }
    if !state.hidden_by.is_empty() {
        ui.warn(&format!(
            "{} hidden by {}",
            state.element,
            state
                .hidden_by
                .iter()
                .map(|label| format!("[{label}]"))
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
}

use std::io::IsTerminal;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use job_file_search::api::HttpFileApi;
use job_file_search::app::{
    App, ConnectOutcome, DownloadOutcome, DownloadRequest, NotificationSink, SearchKind,
    SearchOutcome,
};
use job_file_search::config::{ConfigLoader, ConfigOverrides, ResolvedConfig};
use job_file_search::domain::{Limit, MaterialUsageFilters, SearchFilters, TypeSelection};
use job_file_search::error::SearchError;
use job_file_search::normalize::{FILE_TYPES, type_label};
use job_file_search::output::{JsonOutput, OutputMode, StderrNotifier};
use job_file_search::query::ZeroPolicy;
use job_file_search::render::{ResultRow, render_loading, render_paths, render_table, rows};

#[derive(Parser)]
#[command(name = "jfs")]
#[command(about = "Search and download job files and material-usage reports")]
#[command(version, author)]
struct Cli {
    /// Base URL of the file search API (overrides FILE_SEARCH_API_URL and the config file)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[arg(long, global = true)]
    config: Option<String>,

    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Search job files")]
    Search(SearchArgs),
    #[command(about = "Search material-usage sheets")]
    Materials(MaterialArgs),
    #[command(about = "Download resources by id")]
    Download(DownloadArgs),
    #[command(about = "Check that the configured API is reachable")]
    Health,
    #[command(about = "Test an API URL and use it for this run")]
    Connect(ConnectArgs),
    #[command(about = "List selectable file types")]
    Types,
}

#[derive(Args)]
struct ResultArgs {
    /// Download every result; without DIR the configured download directory is used
    #[arg(long, value_name = "DIR", num_args = 0..=1, default_missing_value = "")]
    download: Option<Utf8PathBuf>,

    /// Print only the server-side path of each result
    #[arg(long)]
    paths: bool,
}

#[derive(Args)]
struct SearchArgs {
    #[arg(long)]
    id: Option<i64>,
    #[arg(long)]
    job_id: Option<String>,
    /// Substring of the job name
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    year: Option<i32>,
    /// File type tag; repeat to select several
    #[arg(long = "type", value_name = "TYPE")]
    types: Vec<String>,
    /// 1 to 1000
    #[arg(long)]
    limit: Option<Limit>,
    #[command(flatten)]
    results: ResultArgs,
}

#[derive(Args)]
struct MaterialArgs {
    #[arg(long)]
    job_id: Option<String>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    xb_type: Option<String>,
    /// Thickness in mm
    #[arg(long)]
    thickness: Option<String>,
    #[arg(long)]
    size: Option<String>,
    #[arg(long)]
    units_up: Option<f64>,
    #[arg(long)]
    width: Option<i64>,
    #[arg(long)]
    height: Option<i64>,
    #[arg(long)]
    depth: Option<i64>,
    #[arg(long)]
    limit: Option<Limit>,
    /// Send zero-valued numeric filters instead of dropping them
    #[arg(long)]
    keep_zero: bool,
    #[command(flatten)]
    results: ResultArgs,
}

#[derive(Args)]
struct DownloadArgs {
    #[arg(required = true)]
    ids: Vec<i64>,
    #[arg(long, value_name = "DIR")]
    dir: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct ConnectArgs {
    url: String,
}

#[derive(Serialize)]
struct SearchReport {
    kind: SearchKind,
    outcome: SearchOutcome,
    rows: Vec<ResultRow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    downloads: Vec<DownloadOutcome>,
}

#[derive(Serialize)]
struct HealthReport {
    endpoint: String,
    connected: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(3),
        Err(report) => {
            eprintln!("{report:?}");
            match report.downcast_ref::<SearchError>() {
                Some(err) => ExitCode::from(map_exit_code(err)),
                None => ExitCode::from(1),
            }
        }
    }
}

fn map_exit_code(error: &SearchError) -> u8 {
    match error {
        SearchError::InvalidLimit(_)
        | SearchError::InvalidEndpoint(_)
        | SearchError::InvalidFilter(_)
        | SearchError::ConfigRead(_)
        | SearchError::ConfigParse(_) => 2,
        SearchError::Transport(_)
        | SearchError::Status { .. }
        | SearchError::Gone { .. }
        | SearchError::Decode(_) => 3,
        SearchError::Filesystem(_) => 1,
    }
}

/// Returns `Ok(false)` when the command ran but its backend call failed;
/// the notification has already told the user why.
fn run() -> miette::Result<bool> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Table
    };

    if let Commands::Types = cli.command {
        print_types(output_mode)?;
        return Ok(true);
    }

    let resolved = ConfigLoader::resolve(
        cli.config.as_deref(),
        ConfigOverrides::from_env(cli.api_url.clone()),
    )
    .map_err(miette::Report::new)?;
    let api = HttpFileApi::new(resolved.timeout).map_err(miette::Report::new)?;
    let app = App::new(api, resolved.endpoint.clone());

    let stderr_notifier = StderrNotifier::new();
    let sink: &dyn NotificationSink = match output_mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Table => &stderr_notifier,
    };

    match cli.command {
        Commands::Search(args) => run_search(&app, &resolved, args, sink, output_mode),
        Commands::Materials(args) => run_materials(&app, &resolved, args, sink, output_mode),
        Commands::Download(args) => run_download(&app, &resolved, args, sink, output_mode),
        Commands::Health => run_health(&app, output_mode),
        Commands::Connect(args) => run_connect(&app, &args.url, sink, output_mode),
        Commands::Types => Ok(true),
    }
}

fn run_search(
    app: &App<HttpFileApi>,
    resolved: &ResolvedConfig,
    args: SearchArgs,
    sink: &dyn NotificationSink,
    output_mode: OutputMode,
) -> miette::Result<bool> {
    let types = args.types.into_iter().collect::<TypeSelection>();
    if !types.is_empty() && matches!(output_mode, OutputMode::Table) {
        let labels = types.iter().map(type_label).collect::<Vec<_>>();
        eprintln!("Selected file types: {}", labels.join(", "));
    }
    let filters = SearchFilters {
        id: args.id,
        job_id: args.job_id,
        name: args.name,
        year: args.year,
        types,
        limit: args.limit.unwrap_or(resolved.default_limit),
    };
    announce_loading(SearchKind::Files, output_mode);
    let outcome = app.search(&filters, sink);
    finish_search(app, resolved, SearchKind::Files, outcome, args.results, sink, output_mode)
}

fn run_materials(
    app: &App<HttpFileApi>,
    resolved: &ResolvedConfig,
    args: MaterialArgs,
    sink: &dyn NotificationSink,
    output_mode: OutputMode,
) -> miette::Result<bool> {
    let filters = MaterialUsageFilters {
        job_id: args.job_id,
        name: args.name,
        xb_type: args.xb_type,
        thickness: args.thickness,
        size: args.size,
        units_up: args.units_up,
        width: args.width,
        height: args.height,
        depth: args.depth,
        limit: args.limit.unwrap_or(resolved.default_limit),
    };
    let policy = if args.keep_zero {
        ZeroPolicy::Keep
    } else {
        ZeroPolicy::OmitZero
    };
    announce_loading(SearchKind::Materials, output_mode);
    let outcome = app.search_materials(&filters, policy, sink);
    finish_search(app, resolved, SearchKind::Materials, outcome, args.results, sink, output_mode)
}

fn announce_loading(kind: SearchKind, output_mode: OutputMode) {
    if matches!(output_mode, OutputMode::Table) {
        eprint!("{}", render_loading(kind));
    }
}

fn finish_search(
    app: &App<HttpFileApi>,
    resolved: &ResolvedConfig,
    kind: SearchKind,
    outcome: SearchOutcome,
    args: ResultArgs,
    sink: &dyn NotificationSink,
    output_mode: OutputMode,
) -> miette::Result<bool> {
    let results = app.results(kind);
    let succeeded = matches!(outcome, SearchOutcome::Completed { .. });

    let downloads = match (&args.download, succeeded) {
        (Some(dir), true) => {
            let dir = if dir.as_str().is_empty() {
                resolved.download_dir.clone()
            } else {
                dir.clone()
            };
            let requests = results.iter().map(DownloadRequest::from).collect::<Vec<_>>();
            app.download_many(&requests, &dir, sink)
        }
        _ => Vec::new(),
    };
    let downloads_ok = downloads.iter().all(DownloadOutcome::is_saved);
    let result_rows = rows(&results);

    match output_mode {
        OutputMode::Json => {
            let report = SearchReport {
                kind,
                outcome,
                rows: result_rows,
                downloads,
            };
            JsonOutput::print(&report).into_diagnostic()?;
        }
        OutputMode::Table => {
            if !succeeded {
                return Ok(false);
            }
            if args.paths {
                print!("{}", render_paths(&result_rows));
            } else {
                print!("{}", render_table(&result_rows, std::io::stdout().is_terminal()));
            }
        }
    }
    Ok(succeeded && downloads_ok)
}

fn run_download(
    app: &App<HttpFileApi>,
    resolved: &ResolvedConfig,
    args: DownloadArgs,
    sink: &dyn NotificationSink,
    output_mode: OutputMode,
) -> miette::Result<bool> {
    let dir = args.dir.unwrap_or_else(|| resolved.download_dir.clone());
    let requests = args
        .ids
        .into_iter()
        .map(DownloadRequest::by_id)
        .collect::<Vec<_>>();
    let outcomes = app.download_many(&requests, &dir, sink);

    match output_mode {
        OutputMode::Json => JsonOutput::print(&outcomes).into_diagnostic()?,
        OutputMode::Table => {
            for outcome in &outcomes {
                if let DownloadOutcome::AlreadyInFlight { id } = outcome {
                    eprintln!("skipped {id}: download already in progress");
                }
            }
        }
    }
    Ok(outcomes.iter().all(|outcome| {
        !matches!(
            outcome,
            DownloadOutcome::Missing { .. } | DownloadOutcome::Failed { .. }
        )
    }))
}

fn run_health(app: &App<HttpFileApi>, output_mode: OutputMode) -> miette::Result<bool> {
    let report = HealthReport {
        endpoint: app.endpoint().to_string(),
        connected: app.check_connection(),
    };
    match output_mode {
        OutputMode::Json => JsonOutput::print(&report).into_diagnostic()?,
        OutputMode::Table => {
            let status = if report.connected {
                "Connected"
            } else {
                "Disconnected"
            };
            println!("{}: {status}", report.endpoint);
        }
    }
    Ok(report.connected)
}

fn run_connect(
    app: &App<HttpFileApi>,
    url: &str,
    sink: &dyn NotificationSink,
    output_mode: OutputMode,
) -> miette::Result<bool> {
    let outcome = app.connect(url, sink);
    let connected = matches!(outcome, ConnectOutcome::Connected { .. });
    match output_mode {
        OutputMode::Json => JsonOutput::print(&outcome).into_diagnostic()?,
        OutputMode::Table => {
            if connected {
                println!("{}: Connected", app.endpoint());
            }
        }
    }
    Ok(connected)
}

fn print_types(output_mode: OutputMode) -> miette::Result<()> {
    match output_mode {
        OutputMode::Json => JsonOutput::print(&FILE_TYPES).into_diagnostic(),
        OutputMode::Table => {
            let width = FILE_TYPES
                .iter()
                .map(|option| option.value.len())
                .max()
                .unwrap_or(0);
            for option in FILE_TYPES {
                println!("{:<width$}  {}", option.value, option.label);
            }
            Ok(())
        }
    }
}

// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use loctrans::app_config::{self, BackendType, Config};
use loctrans::app_controller::Controller;
use loctrans::json_tools;

/// CLI Wrapper for BackendType to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliBackend {
    FreeWeb,
    CloudApi,
    ChatApi,
    DictionaryApi,
}

impl From<CliBackend> for BackendType {
    fn from(cli_backend: CliBackend) -> Self {
        match cli_backend {
            CliBackend::FreeWeb => BackendType::FreeWeb,
            CliBackend::CloudApi => BackendType::CloudApi,
            CliBackend::ChatApi => BackendType::ChatApi,
            CliBackend::DictionaryApi => BackendType::DictionaryApi,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate shell completions for loctrans
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
    /// JSON export and hygiene tools for CSV tables
    Json {
        #[command(subcommand)]
        action: JsonAction,
    },
}

#[derive(Subcommand, Debug)]
enum JsonAction {
    /// Convert a CSV table into a JSON array of objects (UTF-8, no BOM)
    Export {
        /// Input CSV file
        input: PathBuf,

        /// Output JSON file (default: <input>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Report cells whose characters break JSON built without escaping
    Check {
        /// Input CSV file
        input: PathBuf,

        /// Report CSV file (default: <input stem>_json_unsafe_report.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Columns to scan, comma separated (default: all)
        #[arg(long, value_delimiter = ',')]
        columns: Option<Vec<String>>,
    },
    /// Write a copy of the table with JSON-escaped cells
    Sanitize {
        /// Input CSV file
        input: PathBuf,

        /// Output CSV file (default: <input stem>_jsonsafe.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Columns to escape, comma separated (default: ZH,VN,TH when present)
        #[arg(long, value_delimiter = ',')]
        columns: Option<Vec<String>>,

        /// Only escape the cells listed in a report from `json check`
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

/// loctrans - localization table translator
///
/// Translates the source column of a CSV localization table into one or more
/// target columns, keeping `<color=...>` markup intact.
#[derive(Parser, Debug)]
#[command(name = "loctrans")]
#[command(version)]
#[command(about = "Markup-preserving translation of localization tables")]
#[command(long_about = "loctrans fills the target-language columns of a CSV localization table,
keeping <color=...>...</color> markup exactly as written.

EXAMPLES:
    loctrans strings.csv                           # Translate ZH into TH and VN (conf.json)
    loctrans -f strings.csv                        # Retranslate cells that are already filled
    loctrans -b chat-api -k sk-... strings.csv     # Use a chat completion API
    loctrans -t TH,EN -o out.csv strings.csv       # Choose target columns and output file
    loctrans --fallback dictionary-api strings.csv # Try a second backend when the first gives up
    loctrans json check strings.csv                # Report cells unsafe for JSON
    loctrans json export strings.csv               # Write strings.json
    loctrans completions bash > loctrans.bash      # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. If the file doesn't exist,
    a default one is created. Command line options override file values.

BACKENDS:
    free-web       - Free web translate endpoint, no key (default)
    cloud-api      - DeepL-style API (requires API key)
    chat-api       - OpenAI-compatible chat API, DeepSeek by default (requires API key)
    dictionary-api - MyMemory-style dictionary API")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input CSV file
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Output CSV file (default: <input stem>_translated.csv)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Source column
    #[arg(short, long)]
    source: Option<String>,

    /// Target columns, comma separated
    #[arg(short, long, value_delimiter = ',')]
    targets: Option<Vec<String>>,

    /// Retranslate cells that already hold a translation
    #[arg(short, long)]
    force: bool,

    /// Translation backend to use
    #[arg(short, long, value_enum)]
    backend: Option<CliBackend>,

    /// Backend tried once when the primary gives up
    #[arg(long, value_enum)]
    fallback: Option<CliBackend>,

    /// Model name for chat backends
    #[arg(short, long)]
    model: Option<String>,

    /// API key for the primary backend
    #[arg(short = 'k', long, env = "LOCTRANS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Parallel workers
    #[arg(long)]
    concurrency: Option<usize>,

    /// Write the output every N finished cells
    #[arg(long)]
    checkpoint: Option<usize>,

    /// Pause after every backend call, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Attempts on the primary backend
    #[arg(long)]
    max_retries: Option<u32>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Prefix and ANSI color for level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("ERROR", "1;31"),
            Level::Warn => ("WARN ", "1;33"),
            Level::Info => ("INFO ", "1;32"),
            Level::Debug => ("DEBUG", "1;36"),
            Level::Trace => ("TRACE", "1;35"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (prefix, color) = Self::style_for_level(record.level());

            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "\x1B[{}m{} {} {}\x1B[0m", color, now, prefix, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn level_filter(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // The level is lowered or raised once the config is loaded
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let mut cli = CommandLineOptions::parse();
    if let Some(cmd_log_level) = &cli.log_level {
        log::set_max_level(level_filter(&cmd_log_level.clone().into()));
    }

    let result = match cli.command.take() {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "loctrans", &mut std::io::stdout());
            return Ok(());
        }
        Some(Commands::Json { action }) => run_json(action),
        None => run_translate(cli).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

/// Load the config file, or write a default one when it is missing
fn load_or_create_config(config_path: &str) -> Result<Config> {
    if Path::new(config_path).exists() {
        let file = File::open(config_path).context(format!("Failed to open config file: {}", config_path))?;
        let reader = BufReader::new(file);
        let config: Config =
            serde_json::from_reader(reader).context(format!("Failed to parse config file: {}", config_path))?;
        Ok(config)
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);
        let config = Config::default();
        let config_json =
            serde_json::to_string_pretty(&config).context("Failed to serialize default config to JSON")?;
        std::fs::write(config_path, config_json)
            .context(format!("Failed to write default config to file: {}", config_path))?;
        Ok(config)
    }
}

/// Apply command line overrides on top of the file values
fn apply_overrides(config: &mut Config, options: &CommandLineOptions) {
    if let Some(backend) = options.backend {
        config.translation.backend = backend.into();
    }
    if let Some(fallback) = options.fallback {
        config.translation.fallback = Some(fallback.into());
    }

    let primary = config.translation.backend;
    if let Some(model) = &options.model {
        config.translation.backend_config_mut(&primary).model = model.clone();
    }
    if let Some(api_key) = &options.api_key {
        config.translation.backend_config_mut(&primary).api_key = api_key.clone();
    }

    if let Some(source) = &options.source {
        config.source_column = source.trim().to_string();
    }
    if let Some(targets) = &options.targets {
        config.target_columns = targets
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
    }
    if options.force {
        config.skip_existing = false;
    }

    let common = &mut config.translation.common;
    if options.concurrency.is_some() {
        common.concurrency = options.concurrency;
    }
    if let Some(checkpoint) = options.checkpoint {
        common.batch_checkpoint_size = checkpoint;
    }
    if options.delay_ms.is_some() {
        common.inter_call_delay_ms = options.delay_ms;
    }
    if let Some(max_retries) = options.max_retries {
        common.max_retries = max_retries;
    }

    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }
}

fn run_json(action: JsonAction) -> Result<()> {
    match action {
        JsonAction::Export { input, output } => {
            let output = output.unwrap_or_else(|| json_tools::json_output_path(&input));
            let rows = json_tools::export_json(&input, &output)
                .with_context(|| format!("Failed to export {} as JSON", input.display()))?;
            info!("Exported {} rows: {} -> {}", rows, input.display(), output.display());
        }
        JsonAction::Check { input, output, columns } => {
            let output = output.unwrap_or_else(|| json_tools::report_output_path(&input));
            let summary = json_tools::check_file(&input, &output, columns.as_deref())
                .with_context(|| format!("Failed to check {}", input.display()))?;
            if summary.cells == 0 {
                info!("No JSON-unsafe cells in {} ({} rows)", input.display(), summary.rows);
            } else {
                warn!(
                    "{} JSON-unsafe cells in {} ({} rows), report written to {}",
                    summary.cells,
                    input.display(),
                    summary.rows,
                    output.display()
                );
            }
        }
        JsonAction::Sanitize {
            input,
            output,
            columns,
            report,
        } => {
            let output = output.unwrap_or_else(|| json_tools::sanitized_output_path(&input));
            let summary = json_tools::sanitize_file(&input, &output, columns.as_deref(), report.as_deref())
                .with_context(|| format!("Failed to sanitize {}", input.display()))?;
            info!(
                "Escaped {} cells in {} rows: {} -> {}",
                summary.cells,
                summary.rows,
                input.display(),
                output.display()
            );
        }
    }
    Ok(())
}

async fn run_translate(options: CommandLineOptions) -> Result<()> {
    let input = options
        .input
        .clone()
        .ok_or_else(|| anyhow!("INPUT is required when no subcommand is specified"))?;

    let mut config = load_or_create_config(&options.config)?;
    apply_overrides(&mut config, &options);
    log::set_max_level(level_filter(&config.log_level));

    let controller = Controller::with_config(config)?;

    let cancel = controller.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing cells in flight and writing partial results");
            cancel.cancel();
        }
    });

    let output = options
        .output
        .clone()
        .unwrap_or_else(|| Controller::default_output_path(&input));

    controller.run(input, output).await?;
    Ok(())
}

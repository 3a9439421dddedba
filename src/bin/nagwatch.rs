//! Nagwatch CLI - Command-line interface for the Nagwatch engine
//!
//! Commands:
//! - replay: Run a recorded input stream through a session and print the events
//! - validate: Validate a recorded input stream against nagwatch.input.v1
//! - doctor: Diagnose configuration and persisted progress
//! - schema: Print the input or output schema

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use nagwatch::progress::ProgressSnapshot;
use nagwatch::{
    EventRecord, InputReader, NagConfig, NagError, NagSession, SessionInput,
    INPUT_SCHEMA_VERSION, NAGWATCH_VERSION, PRODUCER_NAME,
};

/// Nagwatch - Webcam-driven productivity nag engine
#[derive(Parser)]
#[command(name = "nagwatch")]
#[command(version = NAGWATCH_VERSION)]
#[command(about = "Replay and inspect nag widget sessions", long_about = None)]
struct Cli {
    /// Enable debug logging on stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded input stream and emit the resulting events
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Session configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Seed for milestone draws (overrides the config file)
        #[arg(long)]
        seed: Option<u64>,

        /// Load progress from file before replaying
        #[arg(long)]
        load_progress: Option<PathBuf>,

        /// Save progress to file after replaying
        #[arg(long)]
        save_progress: Option<PathBuf>,
    },

    /// Validate a recorded input stream
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and persisted progress
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check a progress file
        #[arg(long)]
        progress: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one input per line)
    Ndjson,
    /// JSON array of inputs
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one event per line)
    Ndjson,
    /// JSON array of events
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (nagwatch.input.v1)
    Input,
    /// Output schema (nagwatch event records)
    Output,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), NagCliError> {
    match cli.command {
        Commands::Replay {
            input,
            output,
            input_format,
            output_format,
            config,
            seed,
            load_progress,
            save_progress,
        } => cmd_replay(
            &input,
            &output,
            input_format,
            output_format,
            config.as_deref(),
            seed,
            load_progress.as_deref(),
            save_progress.as_deref(),
        ),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor {
            config,
            progress,
            json,
        } => cmd_doctor(config.as_deref(), progress.as_deref(), json),

        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_replay(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: Option<&Path>,
    seed: Option<u64>,
    load_progress: Option<&Path>,
    save_progress: Option<&Path>,
) -> Result<(), NagCliError> {
    let input_data = read_input(input)?;
    let inputs = parse_inputs(&input_data, &input_format)?;

    let Some(first) = inputs.first() else {
        return Err(NagCliError::NoInputs);
    };
    let started_at = first.timestamp();

    let mut config = match config {
        Some(path) => NagConfig::from_json(&fs::read_to_string(path)?)?,
        None => NagConfig::default(),
    };
    if seed.is_some() {
        config.milestone_seed = seed;
    }

    let mut session = NagSession::new(config, started_at)?;
    let session_id = session.id().to_string();
    info!(%session_id, inputs = inputs.len(), "replaying session");

    if let Some(path) = load_progress {
        let snapshot = ProgressSnapshot::from_json_lenient(&fs::read_to_string(path)?);
        session.restore_progress(snapshot, started_at);
    }

    let mut records: Vec<EventRecord> = Vec::new();
    let mut finished_at = started_at;

    for (index, input) in inputs.into_iter().enumerate() {
        let at = input.timestamp();
        let kind = input.kind();
        let events = session
            .apply(input)
            .map_err(|e| NagCliError::Replay { index, source: e })?;
        debug!(index, kind, events = events.len(), "input applied");

        finished_at = at;
        records.extend(events.into_iter().map(|event| EventRecord {
            session_id: session_id.clone(),
            at,
            event,
        }));
    }

    if let Some(path) = save_progress {
        let snapshot = session.save_progress(finished_at);
        fs::write(path, snapshot.to_json()?)?;
    }

    let output_data = format_output(&records, &output_format)?;
    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), NagCliError> {
    let input_data = read_input(input)?;

    // Rejected NDJSON lines are reported but not part of `inputs`
    let (inputs, mut issues) = match input_format {
        InputFormat::Ndjson => InputReader::scan_ndjson(&input_data),
        InputFormat::Json => (InputReader::parse_array(&input_data)?, Vec::new()),
    };
    let total = inputs.len() + issues.len();
    issues.extend(InputReader::validate_inputs(&inputs));
    let report = ValidationReport {
        schema_version: INPUT_SCHEMA_VERSION.to_string(),
        total_records: total,
        valid_records: total.saturating_sub(issues.len()),
        invalid_records: issues.len(),
        errors: issues
            .iter()
            .map(|issue| ValidationErrorDetail {
                index: issue.index,
                error: issue.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Schema:          {}", report.schema_version);
        println!("Total records:   {}", report.total_records);
        println!("Valid records:   {}", report.valid_records);
        println!("Invalid records: {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Record {}: {}", err.index, err.error);
            }
        }
    }

    if report.invalid_records > 0 {
        Err(NagCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn cmd_doctor(
    config: Option<&Path>,
    progress: Option<&Path>,
    json: bool,
) -> Result<(), NagCliError> {
    let mut checks: Vec<DoctorCheck> = vec![
        DoctorCheck::ok(
            "nagwatch_version",
            format!("Nagwatch version {}", NAGWATCH_VERSION),
        ),
        DoctorCheck::ok(
            "schema_version",
            format!("Input schema: {}", INPUT_SCHEMA_VERSION),
        ),
    ];

    if let Some(path) = config {
        checks.push(check_config(path));
    }

    if let Some(path) = progress {
        checks.push(check_progress(path));
    }

    // Check stdin is available (for `replay -i -`)
    checks.push(if atty::is(atty::Stream::Stdin) {
        DoctorCheck::ok("stdin", "stdin is a TTY (interactive mode)".to_string())
    } else {
        DoctorCheck::ok("stdin", "stdin is a pipe (replay from stdin ready)".to_string())
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: NAGWATCH_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Nagwatch Doctor Report");
        println!("======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(NagCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn check_config(path: &Path) -> DoctorCheck {
    if !path.exists() {
        return DoctorCheck::error("config", "Config file does not exist".to_string());
    }
    match fs::read_to_string(path) {
        Ok(content) => match NagConfig::from_json(&content) {
            Ok(config) => DoctorCheck::ok(
                "config",
                format!(
                    "Config valid (idle limit {}s, KPI {} min)",
                    config.inactivity_limit_secs, config.kpi_minutes
                ),
            ),
            Err(e) => DoctorCheck::error("config", format!("Invalid config: {}", e)),
        },
        Err(e) => DoctorCheck::error("config", format!("Cannot read config file: {}", e)),
    }
}

/// Malformed progress is only a warning: the session falls back to defaults on load
fn check_progress(path: &Path) -> DoctorCheck {
    if !path.exists() {
        return DoctorCheck::warning("progress", "Progress file does not exist".to_string());
    }
    match fs::read_to_string(path) {
        Ok(content) => match ProgressSnapshot::from_json(&content) {
            Ok(snapshot) => DoctorCheck::ok(
                "progress",
                format!(
                    "Progress valid ({} days recorded, {} milestones unlocked)",
                    snapshot.work_records.len(),
                    snapshot.unlocked_milestones.len()
                ),
            ),
            Err(e) => DoctorCheck::warning(
                "progress",
                format!("Malformed progress, defaults will be used: {}", e),
            ),
        },
        Err(e) => DoctorCheck::error("progress", format!("Cannot read progress file: {}", e)),
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), NagCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", get_input_json_schema());
            } else {
                println!("Input Schema: {}", INPUT_SCHEMA_VERSION);
                println!();
                println!("One JSON object per record, tagged by \"kind\". Every record has an");
                println!("RFC 3339 \"timestamp\".");
                println!();
                println!("Landmark frames:");
                println!("  - face_frame: faces [[{{x, y, z?}}]] (468-point face mesh, first face used)");
                println!("  - hand_frame: hands [[{{x, y, z?}}]] (wrist = point 0 of the first hand)");
                println!();
                println!("User activity and clock:");
                println!("  - activity: activity = pointer_move | key_press | pointer_down");
                println!("  - tick: one logical second");
                println!();
                println!("Controls:");
                println!("  - pause, resume, restart");
                println!("  - set_kpi: minutes (positive integer)");
                println!("  - capture_start, capture_stop, capture_unavailable, capture_blocked");
                println!("  - milestone_finished");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", get_output_json_schema());
            } else {
                println!("Output Schema: nagwatch event record");
                println!();
                println!("Each record contains session_id, at (input timestamp) and a \"type\":");
                println!();
                println!("- camera: {{ status, label }}");
                println!("- punishment_started: {{ reason }} (idle, eyes, or host-defined)");
                println!("- punishment_ended");
                println!("- tick: {{ status, total_work_seconds, display }}");
                println!("- milestone_unlocked: {{ milestone, unlocked_count, cycle_reset }}");
                println!("- work_recorded: {{ date, seconds }}");
            }
        }
    }

    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, NagCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn parse_inputs(data: &str, format: &InputFormat) -> Result<Vec<SessionInput>, NagCliError> {
    let inputs = match format {
        InputFormat::Ndjson => InputReader::parse_ndjson(data)?,
        InputFormat::Json => InputReader::parse_array(data)?,
    };
    Ok(inputs)
}

fn format_output(records: &[EventRecord], format: &OutputFormat) -> Result<String, NagCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for record in records {
                lines.push(serde_json::to_string(record)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(records)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(records)?),
    }
}

fn get_input_json_schema() -> String {
    let point = serde_json::json!({
        "type": "object",
        "required": ["x", "y"],
        "properties": {
            "x": { "type": "number" },
            "y": { "type": "number" },
            "z": { "type": "number" }
        }
    });
    let landmarks = serde_json::json!({
        "type": "array",
        "items": { "type": "array", "items": point }
    });

    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": INPUT_SCHEMA_VERSION,
        "description": "Nagwatch recorded session input",
        "type": "object",
        "required": ["kind", "timestamp"],
        "properties": {
            "kind": {
                "type": "string",
                "enum": [
                    "face_frame", "hand_frame", "activity", "tick", "pause", "resume",
                    "restart", "set_kpi", "capture_start", "capture_stop",
                    "capture_unavailable", "capture_blocked", "milestone_finished"
                ]
            },
            "timestamp": { "type": "string", "format": "date-time" },
            "faces": landmarks.clone(),
            "hands": landmarks,
            "activity": {
                "type": "string",
                "enum": ["pointer_move", "key_press", "pointer_down"]
            },
            "minutes": { "type": "integer", "minimum": 1 }
        }
    })
    .to_string()
}

fn get_output_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "nagwatch.event",
        "description": "Nagwatch session event record",
        "type": "object",
        "required": ["session_id", "at", "type"],
        "properties": {
            "session_id": { "type": "string" },
            "at": { "type": "string", "format": "date-time" },
            "type": {
                "type": "string",
                "enum": [
                    "camera", "punishment_started", "punishment_ended", "tick",
                    "milestone_unlocked", "work_recorded"
                ]
            },
            "status": { "type": "string" },
            "label": { "type": "string" },
            "reason": { "type": "string" },
            "total_work_seconds": { "type": "integer" },
            "display": { "type": "string" },
            "milestone": { "type": "string" },
            "unlocked_count": { "type": "integer" },
            "cycle_reset": { "type": "boolean" },
            "date": { "type": "string", "format": "date" },
            "seconds": { "type": "integer" }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum NagCliError {
    Io(io::Error),
    Nag(NagError),
    Json(serde_json::Error),
    Replay { index: usize, source: NagError },
    NoInputs,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for NagCliError {
    fn from(e: io::Error) -> Self {
        NagCliError::Io(e)
    }
}

impl From<NagError> for NagCliError {
    fn from(e: NagError) -> Self {
        NagCliError::Nag(e)
    }
}

impl From<serde_json::Error> for NagCliError {
    fn from(e: serde_json::Error) -> Self {
        NagCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<NagCliError> for CliError {
    fn from(e: NagCliError) -> Self {
        match e {
            NagCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            NagCliError::Nag(e @ NagError::InvalidConfig(_))
            | NagCliError::Nag(e @ NagError::InvalidThreshold(_)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'nagwatch doctor --config <file>' for details".to_string()),
            },
            NagCliError::Nag(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(format!("Ensure input matches {} schema", INPUT_SCHEMA_VERSION)),
            },
            NagCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            NagCliError::Replay { index, source } => CliError {
                code: "REPLAY_ERROR".to_string(),
                message: format!("Record {}: {}", index, source),
                hint: Some("Run 'nagwatch validate' for details".to_string()),
            },
            NagCliError::NoInputs => CliError {
                code: "NO_INPUTS".to_string(),
                message: "No records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            NagCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            NagCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    schema_version: String,
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

impl DoctorCheck {
    fn ok(name: &str, message: String) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message,
        }
    }

    fn warning(name: &str, message: String) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message,
        }
    }

    fn error(name: &str, message: String) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message,
        }
    }
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

mod config;
mod telemetry;
mod terminal;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use survey_spec::{
    AnswerState, FlowController, JsonFileSource, JsonlFileSink, Schema, SchemaSource, Stage,
    Submission, ValidationReport, render_stage, validate_submission,
};
use tracing::info;

use config::RunnerConfig;
use terminal::{Presenter, RenderMode, StageAction, read_action, read_stage};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Two-stage questionnaire runner",
    long_about = "Runs, renders and validates questionnaires described by a JSON schema document"
)]
struct Cli {
    /// Log filter used when RUST_LOG is unset (falls back to SURVEY_LOG, then "warn").
    #[arg(long, global = true, value_name = "FILTER")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum StageArg {
    Profile,
    Questionnaire,
}

impl From<StageArg> for Stage {
    fn from(value: StageArg) -> Self {
        match value {
            StageArg::Profile => Stage::Profile,
            StageArg::Questionnaire => Stage::Questionnaire,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Answer a questionnaire interactively and store the submission.
    Run {
        /// Schema document (defaults to SURVEY_SCHEMA_PATH).
        #[arg(long, value_name = "SCHEMA")]
        schema: Option<PathBuf>,
        /// JSON-lines file receiving submissions (defaults to SURVEY_OUTPUT_PATH or submissions.jsonl).
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
        /// Print error details and the stored record.
        #[arg(long)]
        verbose: bool,
    },
    /// Print the controls of one stage.
    Render {
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
        /// Answer state (`{ "profile": {...}, "responses": {...} }`) used for prefill and visibility.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = StageArg::Profile)]
        stage: StageArg,
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
    },
    /// Check a submission record against a schema.
    Validate {
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
        #[arg(long, value_name = "SUBMISSION")]
        submission: PathBuf,
    },
    /// Print the JSON Schema of the questionnaire document format.
    Schema,
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();
    telemetry::init(&config::log_level(cli.log_level))?;
    match cli.command {
        Command::Run {
            schema,
            output,
            format,
            verbose,
        } => run_session(RunnerConfig::resolve(schema, output)?, format, verbose).await,
        Command::Render {
            schema,
            answers,
            stage,
            format,
        } => run_render(&schema, answers.as_deref(), stage.into(), format).await,
        Command::Validate { schema, submission } => run_validate(&schema, &submission).await,
        Command::Schema => {
            let schema = schemars::schema_for!(Schema);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
    }
}

async fn run_session(config: RunnerConfig, format: RenderMode, verbose: bool) -> CliResult<()> {
    let presenter = Presenter::new(format, verbose);
    let source = JsonFileSource::new(&config.schema);
    let flow = match FlowController::boot(&source, JsonlFileSink::new(&config.output)).await {
        Ok(flow) => flow,
        Err(err) => {
            presenter.show_error(&err);
            return Err(err.into());
        }
    };
    info!(schema = %config.schema.display(), output = %config.output.display(), "session started");

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout();

    loop {
        let stage = flow.stage();
        if stage == Stage::Submitted {
            break;
        }
        let controls = flow.render_current()?;
        presenter.show_stage(stage, &controls)?;
        let entries = read_stage(&controls, &mut input, &mut out)?;

        let outcome = match stage {
            Stage::Profile => flow.advance(&entries).map(|_| ()),
            Stage::Questionnaire => match read_action(&mut input, &mut out)? {
                StageAction::Back => flow.back().map(|_| ()),
                StageAction::Submit => flow
                    .submit(&entries)
                    .await
                    .map(|submission| presenter.show_completion(&submission)),
            },
            Stage::Submitted => Ok(()),
        };

        if let Err(err) = outcome {
            presenter.show_error(&err);
            if !err.is_recoverable() {
                return Err(err.into());
            }
        }
    }

    Ok(())
}

async fn load_schema(path: &Path) -> CliResult<Schema> {
    let schema = JsonFileSource::new(path).load().await?;
    schema.check()?;
    Ok(schema)
}

async fn run_render(
    schema_path: &Path,
    answers_path: Option<&Path>,
    stage: Stage,
    format: RenderMode,
) -> CliResult<()> {
    let schema = load_schema(schema_path).await?;
    let answers: AnswerState = match answers_path {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => AnswerState::new(),
    };
    let controls = render_stage(stage, &schema, &answers)?;
    Presenter::new(format, false).show_stage(stage, &controls)?;
    Ok(())
}

async fn run_validate(schema_path: &Path, submission_path: &Path) -> CliResult<()> {
    let schema = load_schema(schema_path).await?;
    let submission: Submission = serde_json::from_str(&fs::read_to_string(submission_path)?)?;

    let report = validate_submission(&schema, &submission);
    println!(
        "Validation result: {}",
        if report.is_valid() { "valid" } else { "invalid" }
    );
    describe_validation(&report);

    if report.is_valid() {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn describe_validation(report: &ValidationReport) {
    if !report.missing_required.is_empty() {
        println!(
            "Missing required answers: {}",
            report.missing_required.join(", ")
        );
    }
    if report.missing_entity_selection {
        println!("No entity selected in the profile.");
    }
    if !report.unknown_fields.is_empty() {
        println!(
            "Unknown answer fields: {}",
            report.unknown_fields.join(", ")
        );
    }
}

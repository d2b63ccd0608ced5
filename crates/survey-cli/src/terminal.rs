use std::fmt::Write as _;
use std::io::{self, BufRead, Write};

use survey_spec::{
    ControlDescription, ControlGroup, ControlKind, ControlOption, FlowError, FormEntries, Stage,
    Submission, render_json_ui, render_text,
};

/// Output format for rendered stages.
#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum RenderMode {
    Text,
    Json,
}

/// What the respondent wants to do after filling the questionnaire.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StageAction {
    Submit,
    Back,
}

/// Error produced when parsing an answer typed by the respondent.
#[derive(Debug, PartialEq, Eq)]
pub struct AnswerParseError {
    pub user_message: String,
}

impl AnswerParseError {
    fn new(user_message: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
        }
    }
}

/// Prints stages, statuses and the final record.
pub struct Presenter {
    format: RenderMode,
    verbose: bool,
}

impl Presenter {
    pub fn new(format: RenderMode, verbose: bool) -> Self {
        Self { format, verbose }
    }

    pub fn show_stage(&self, stage: Stage, controls: &[ControlDescription]) -> io::Result<()> {
        match self.format {
            RenderMode::Text => println!("{}", render_text(stage, controls)),
            RenderMode::Json => {
                let ui = render_json_ui(stage, controls);
                println!("{}", serde_json::to_string_pretty(&ui).map_err(io::Error::other)?);
            }
        }
        Ok(())
    }

    pub fn show_error(&self, error: &FlowError) {
        eprintln!("{}", error.status_message());
        if self.verbose {
            eprintln!("  Details: {}", error);
        }
    }

    pub fn show_completion(&self, submission: &Submission) {
        println!("Done. Thank you, your answers were saved.");
        if !self.verbose {
            return;
        }
        match submission.to_cbor() {
            Ok(bytes) => println!("Answers (CBOR hex): {}", encode_hex(&bytes)),
            Err(err) => eprintln!("Failed to serialize answers to CBOR: {}", err),
        }
        match submission.to_json_pretty() {
            Ok(pretty) => println!("{}", pretty),
            Err(err) => eprintln!("Failed to serialize answers to JSON: {}", err),
        }
    }
}

/// Reads one stage worth of selections and encodes them as form entries.
///
/// Returns an error when input ends or the respondent types `exit`.
pub fn read_stage<R: BufRead, W: Write>(
    controls: &[ControlDescription],
    input: &mut R,
    out: &mut W,
) -> io::Result<FormEntries> {
    let mut entries = FormEntries::new();
    for control in controls {
        match &control.kind {
            ControlKind::Placeholder { hint } => writeln!(out, "{}: {}", control.title, hint)?,
            ControlKind::Single { group } => {
                let prompt = format!("{} (number)", control.title);
                push_selection(&mut entries, group, &prompt, false, input, out)?;
            }
            ControlKind::Multi { group } => {
                let prompt = format!("{} (numbers separated by commas, blank for none)", control.title);
                push_selection(&mut entries, group, &prompt, true, input, out)?;
            }
            ControlKind::Matrix { entities } => {
                for entity in entities {
                    let prompt = format!("{} / {} (number)", control.title, entity.label);
                    push_selection(&mut entries, &entity.group, &prompt, false, input, out)?;
                }
            }
        }
    }
    Ok(entries)
}

fn push_selection<R: BufRead, W: Write>(
    entries: &mut FormEntries,
    group: &ControlGroup,
    prompt: &str,
    multi: bool,
    input: &mut R,
    out: &mut W,
) -> io::Result<()> {
    loop {
        writeln!(out, "{}", prompt)?;
        write!(out, "> ")?;
        out.flush()?;
        let line = read_line(input)?;
        match parse_selection(group, &line, multi) {
            Ok(selected) => {
                for option in selected {
                    entries.push(group.key.clone(), option.value.clone());
                }
                return Ok(());
            }
            Err(err) => writeln!(out, "Invalid answer: {}", err.user_message)?,
        }
    }
}

/// Asks whether to submit or go back to the profile.
pub fn read_action<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> io::Result<StageAction> {
    loop {
        write!(out, "Type 'submit' to send or 'back' to edit the profile\n> ")?;
        out.flush()?;
        match read_line(input)?.to_lowercase().as_str() {
            "submit" | "s" => return Ok(StageAction::Submit),
            "back" | "b" => return Ok(StageAction::Back),
            _ => writeln!(out, "Invalid answer: expected 'submit' or 'back'")?,
        }
    }
}

fn read_line<R: BufRead>(input: &mut R) -> io::Result<String> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
    }
    let trimmed = line.trim();
    if trimmed.eq_ignore_ascii_case("exit") {
        return Err(io::Error::new(io::ErrorKind::Interrupted, "aborted by user"));
    }
    Ok(trimmed.to_string())
}

/// Maps typed option numbers (1-based) to options. Blank selects nothing.
pub fn parse_selection<'a>(
    group: &'a ControlGroup,
    raw: &str,
    multi: bool,
) -> Result<Vec<&'a ControlOption>, AnswerParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if !multi && parts.len() > 1 {
        return Err(AnswerParseError::new("choose a single option"));
    }
    let mut selected = Vec::new();
    for part in parts {
        let index: usize = part
            .parse()
            .map_err(|_| AnswerParseError::new(format!("'{}' is not an option number", part)))?;
        let option = index
            .checked_sub(1)
            .and_then(|position| group.options.get(position))
            .ok_or_else(|| {
                AnswerParseError::new(format!(
                    "option {} does not exist (1-{})",
                    index,
                    group.options.len()
                ))
            })?;
        if !selected.iter().any(|existing: &&ControlOption| existing.value == option.value) {
            selected.push(option);
        }
    }
    Ok(selected)
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(&mut encoded, "{:02x}", byte);
    }
    encoded
}

//! Process model extraction orchestrator.
//!
//! Drives one run over one document:
//! extract text → identify participants → one process table per participant
//! → message flows across the retained tables.
//!
//! Model client, text source and record sink are injected as trait objects,
//! so every stage is testable with the scripted mock. A failed participant
//! never stops its siblings; only an unreadable document aborts with an error.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::pipeline::diagnostic::RawDump;
use crate::pipeline::extraction::types::TextSource;
use crate::pipeline::extraction::ExtractionError;
use crate::pipeline::storage::{
    message_flow_path, process_table_path, sanitize_label, RecordSink, StorageError,
};
use crate::pipeline::structuring::parser::{parse_markdown_table, parse_numbered_list, RawTable};
use crate::pipeline::structuring::prompt::{
    build_message_flow_prompt, build_participants_prompt, build_process_table_prompt,
    summarize_send_receive_tasks,
};
use crate::pipeline::structuring::sanitize::{excerpt, sanitize_llm_output};
use crate::pipeline::structuring::types::{
    Conversation, LlmClient, Record, MESSAGE_FLOW_COLUMNS, PROCESS_COLUMNS,
};
use crate::pipeline::structuring::StructuringError;

/// Characters of a raw reply kept in a failure entry.
const REPLY_EXCERPT_CHARS: usize = 500;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Run-level failure: the document could not be read at all.
///
/// Everything that goes wrong after text extraction is recorded in the
/// `RunReport` instead.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
}

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Reached the message-flow stage, or skipped it because no table survived.
    Completed,
    /// The document was read but holds no text.
    NoTextExtracted,
    /// The participant stage failed or listed nobody.
    NoParticipants,
}

impl RunStatus {
    pub fn is_aborted(self) -> bool {
        !matches!(self, RunStatus::Completed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::NoTextExtracted => "no_text_extracted",
            RunStatus::NoParticipants => "no_participants",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extraction,
    Participants,
    ProcessTable,
    MessageFlows,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Extraction => "extraction",
            Stage::Participants => "participants",
            Stage::ProcessTable => "process_table",
            Stage::MessageFlows => "message_flows",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    EmptyDocument,
    /// The model call itself failed (after retries).
    RemoteCall,
    /// The call succeeded but no list or table could be read from the reply.
    UnparsableReply,
    /// An artifact could not be written.
    Sink,
}

/// One named failure, with enough context to re-run the stage by hand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub participant: Option<String>,
    pub kind: FailureKind,
    pub message: String,
    pub reply_excerpt: Option<String>,
}

impl StageFailure {
    fn new(stage: Stage, participant: Option<&str>, kind: FailureKind, message: String) -> Self {
        Self {
            stage,
            participant: participant.map(str::to_string),
            kind,
            message,
            reply_excerpt: None,
        }
    }

    fn with_reply(mut self, reply: &str) -> Self {
        self.reply_excerpt = Some(excerpt(reply, REPLY_EXCERPT_CHARS));
        self
    }

    fn from_remote(stage: Stage, participant: Option<&str>, error: &StructuringError) -> Self {
        let kind = match error {
            StructuringError::EmptyCompletion => FailureKind::UnparsableReply,
            _ => FailureKind::RemoteCall,
        };
        Self::new(stage, participant, kind, error.to_string())
    }

    fn from_sink(stage: Stage, participant: Option<&str>, error: &StorageError) -> Self {
        Self::new(stage, participant, FailureKind::Sink, error.to_string())
    }
}

/// Stage-2 result for one participant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantOutcome {
    pub participant: String,
    /// Rows parsed from the reply (0 when the stage failed).
    pub rows: usize,
    /// Body rows left out because their cell count did not match the header.
    pub dropped_rows: usize,
    /// Whether the reply is forwarded to the message-flow stage.
    pub retained: bool,
    pub artifact: Option<PathBuf>,
}

/// Summary of one run: counts, per-participant outcomes, named failures.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub document: PathBuf,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub participants: Vec<String>,
    pub tables_parsed: usize,
    /// Rows in the message-flow artifact (0 if none was written).
    pub message_flows: usize,
    pub outcomes: Vec<ParticipantOutcome>,
    pub failures: Vec<StageFailure>,
    pub artifacts: Vec<PathBuf>,
}

impl RunReport {
    fn start(document: &Path, model: &str) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            document: document.to_path_buf(),
            model: model.to_string(),
            started_at: now,
            finished_at: now,
            status: RunStatus::Completed,
            participants: Vec::new(),
            tables_parsed: 0,
            message_flows: 0,
            outcomes: Vec::new(),
            failures: Vec::new(),
            artifacts: Vec::new(),
        }
    }

    fn finish(mut self, status: RunStatus) -> Self {
        self.status = status;
        self.finished_at = Utc::now();
        self
    }

    pub fn failures_for<'a>(
        &'a self,
        participant: &'a str,
    ) -> impl Iterator<Item = &'a StageFailure> + 'a {
        self.failures
            .iter()
            .filter(move |f| f.participant.as_deref() == Some(participant))
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Everything stage 2 learned about one participant, before anything is
/// written to disk.
struct TableAttempt {
    conversation: Conversation,
    /// Cleaned reply, when the model call succeeded.
    reply: Option<String>,
    table: Option<ParsedTable>,
    failure: Option<StageFailure>,
}

impl TableAttempt {
    fn failed(conversation: Conversation, reply: Option<String>, failure: StageFailure) -> Self {
        tracing::warn!(kind = ?failure.kind, error = %failure.message, "Process table skipped");
        Self {
            conversation,
            reply,
            table: None,
            failure: Some(failure),
        }
    }

    fn dump(&self, participant: &str, dump: &RawDump) {
        let label = sanitize_label(participant);
        dump.json(&format!("02-{label}-prompt.json"), &self.conversation);
        if let Some(reply) = &self.reply {
            dump.text(&format!("02-{label}-reply.txt"), reply);
            dump.text(
                &format!("02-{label}-send-receive.md"),
                &summarize_send_receive_tasks(reply),
            );
        }
    }
}

/// Records read from one reply, and how many body rows were left out.
struct ParsedTable {
    records: Vec<Record>,
    dropped_rows: usize,
}

/// Participant → raw reply, in first-seen order. Re-inserting a participant
/// replaces its reply without moving it.
#[derive(Default)]
struct RetainedTables(Vec<(String, String)>);

impl RetainedTables {
    fn insert(&mut self, participant: &str, reply: String) {
        match self.0.iter_mut().find(|(p, _)| p == participant) {
            Some(entry) => entry.1 = reply,
            None => self.0.push((participant.to_string(), reply)),
        }
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn as_slice(&self) -> &[(String, String)] {
        &self.0
    }
}

/// Turns a standard operating procedure into process tables and message
/// flows. One instance can serve many runs; it holds no per-run state.
pub struct ProcessModelExtractor {
    llm: Box<dyn LlmClient>,
    sink: Box<dyn RecordSink>,
    config: PipelineConfig,
}

impl ProcessModelExtractor {
    pub fn new(
        llm: Box<dyn LlmClient>,
        sink: Box<dyn RecordSink>,
        config: PipelineConfig,
    ) -> Self {
        Self { llm, sink, config }
    }

    /// Run all stages on `document`.
    ///
    /// Returns `Err` only when the document cannot be read. Every other
    /// problem ends up in the report, and the run goes on where it can.
    pub fn run(
        &self,
        source: &dyn TextSource,
        document: &Path,
    ) -> Result<RunReport, ProcessingError> {
        let _span = tracing::info_span!("sop_run", document = %document.display()).entered();
        let mut report = RunReport::start(document, self.llm.model_name());
        let dump = self
            .config
            .raw_dump_dir()
            .and_then(|dir| RawDump::create(&dir));

        // Stage 0: document text
        let text = source.extract(document)?;
        if text.trim().is_empty() {
            tracing::warn!("Document holds no text, nothing to model");
            report.failures.push(StageFailure::new(
                Stage::Extraction,
                None,
                FailureKind::EmptyDocument,
                "document contains no extractable text".into(),
            ));
            return Ok(self.conclude(report, RunStatus::NoTextExtracted, dump.as_ref()));
        }
        tracing::info!(chars = text.chars().count(), "Document text extracted");

        // Stage 1: participants
        let participants = match self.identify_participants(&text, dump.as_ref()) {
            Ok(participants) => participants,
            Err(failure) => {
                tracing::warn!(
                    kind = ?failure.kind,
                    error = %failure.message,
                    "No participants identified"
                );
                report.failures.push(failure);
                return Ok(self.conclude(report, RunStatus::NoParticipants, dump.as_ref()));
            }
        };
        tracing::info!(count = participants.len(), "Participants identified");
        report.participants = participants.clone();

        // Stage 2: one process table per participant. Model calls may run in
        // parallel; artifacts are written here in participant order, so the
        // last participant mapping to a file name always wins.
        let attempts = self.process_all(&participants, &text);
        let mut retained = RetainedTables::default();
        let mut written: HashMap<PathBuf, String> = HashMap::new();

        for (participant, attempt) in participants.iter().zip(attempts) {
            if let Some(dump) = dump.as_ref() {
                attempt.dump(participant, dump);
            }

            let mut outcome = ParticipantOutcome {
                participant: participant.clone(),
                rows: 0,
                dropped_rows: 0,
                retained: false,
                artifact: None,
            };
            if let Some(failure) = attempt.failure {
                report.failures.push(failure);
            }

            if let (Some(table), Some(reply)) = (attempt.table, attempt.reply) {
                report.tables_parsed += 1;
                outcome.rows = table.records.len();
                outcome.dropped_rows = table.dropped_rows;
                outcome.retained = true;

                match self.write_process_table(participant, &table.records, &mut written) {
                    Ok(path) => {
                        if !report.artifacts.contains(&path) {
                            report.artifacts.push(path.clone());
                        }
                        outcome.artifact = Some(path);
                    }
                    Err(failure) => report.failures.push(failure),
                }
                retained.insert(participant, reply);
            }

            report.outcomes.push(outcome);
        }
        tracing::info!(
            parsed = report.tables_parsed,
            total = participants.len(),
            "Process tables extracted"
        );

        // Stage 3: message flows
        if retained.is_empty() {
            tracing::warn!("No process table retained, skipping message flows");
            return Ok(self.conclude(report, RunStatus::Completed, dump.as_ref()));
        }

        match self.extract_message_flows(&retained, dump.as_ref()) {
            Ok((rows, path)) => {
                tracing::info!(rows, path = %path.display(), "Message flows written");
                report.message_flows = rows;
                report.artifacts.push(path);
            }
            Err(failure) => {
                tracing::warn!(
                    kind = ?failure.kind,
                    error = %failure.message,
                    "Message flow stage failed"
                );
                report.failures.push(failure);
            }
        }

        Ok(self.conclude(report, RunStatus::Completed, dump.as_ref()))
    }

    fn conclude(&self, report: RunReport, status: RunStatus, dump: Option<&RawDump>) -> RunReport {
        let report = report.finish(status);
        tracing::info!(
            run_id = %report.run_id,
            status = status.as_str(),
            tables = report.tables_parsed,
            message_flows = report.message_flows,
            failures = report.failures.len(),
            "Run finished"
        );
        if let Some(dump) = dump {
            dump.json("run-report.json", &report);
        }
        report
    }

    fn identify_participants(
        &self,
        text: &str,
        dump: Option<&RawDump>,
    ) -> Result<Vec<String>, StageFailure> {
        let _span = tracing::info_span!("participants").entered();
        let conversation = build_participants_prompt(text);
        if let Some(dump) = dump {
            dump.json("01-participants-prompt.json", &conversation);
        }

        let reply = self
            .call_with_retry(&conversation, Stage::Participants)
            .map_err(|e| StageFailure::from_remote(Stage::Participants, None, &e))?;
        if let Some(dump) = dump {
            dump.text("01-participants-reply.txt", &reply);
        }

        let participants = parse_numbered_list(&reply);
        if participants.is_empty() {
            return Err(StageFailure::new(
                Stage::Participants,
                None,
                FailureKind::UnparsableReply,
                "reply contains no numbered list".into(),
            )
            .with_reply(&reply));
        }
        Ok(participants)
    }

    /// Call and parse stage 2 for every participant, results in participant
    /// order.
    ///
    /// With `max_concurrency > 1` the calls run on a rayon pool owned by this
    /// run, so concurrent runs with different settings do not share workers.
    fn process_all(&self, participants: &[String], text: &str) -> Vec<TableAttempt> {
        let workers = self.config.max_concurrency.max(1);
        let parent = tracing::Span::current();

        if workers > 1 && participants.len() > 1 {
            match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
                Ok(pool) => {
                    return pool.install(|| {
                        participants
                            .par_iter()
                            .map(|p| parent.in_scope(|| self.process_participant(p, text)))
                            .collect()
                    });
                }
                Err(e) => tracing::warn!(
                    workers,
                    error = %e,
                    "Cannot start worker pool, processing participants sequentially"
                ),
            }
        }

        participants
            .iter()
            .map(|p| self.process_participant(p, text))
            .collect()
    }

    /// Model call and table parsing for one participant. Touches no files.
    fn process_participant(&self, participant: &str, text: &str) -> TableAttempt {
        let _span = tracing::info_span!("process_table", participant = %participant).entered();
        let conversation = build_process_table_prompt(participant, text);

        let reply = match self.call_with_retry(&conversation, Stage::ProcessTable) {
            Ok(reply) => reply,
            Err(e) => {
                let failure = StageFailure::from_remote(Stage::ProcessTable, Some(participant), &e);
                return TableAttempt::failed(conversation, None, failure);
            }
        };

        match self.parse_table(&reply, &PROCESS_COLUMNS) {
            Ok(table) => TableAttempt {
                conversation,
                reply: Some(reply),
                table: Some(table),
                failure: None,
            },
            Err(message) => {
                let failure = StageFailure::new(
                    Stage::ProcessTable,
                    Some(participant),
                    FailureKind::UnparsableReply,
                    message,
                )
                .with_reply(&reply);
                TableAttempt::failed(conversation, Some(reply), failure)
            }
        }
    }

    /// Write one participant's table. `written` maps each artifact written so
    /// far in this run to the participant that wrote it.
    fn write_process_table(
        &self,
        participant: &str,
        records: &[Record],
        written: &mut HashMap<PathBuf, String>,
    ) -> Result<PathBuf, StageFailure> {
        let path = process_table_path(&self.config.output_dir, participant);
        if let Some(previous) = written.get(&path) {
            tracing::warn!(
                participant = %participant,
                previous = %previous,
                path = %path.display(),
                "Process table overwrites an artifact written earlier in this run"
            );
        }

        if let Err(e) = self.sink.write(records, &PROCESS_COLUMNS, &path) {
            tracing::warn!(
                participant = %participant,
                path = %path.display(),
                error = %e,
                "Process table not written"
            );
            return Err(StageFailure::from_sink(Stage::ProcessTable, Some(participant), &e));
        }

        tracing::info!(
            participant = %participant,
            rows = records.len(),
            path = %path.display(),
            "Process table written"
        );
        written.insert(path.clone(), participant.to_string());
        Ok(path)
    }

    /// Returns the row count and artifact path on success.
    fn extract_message_flows(
        &self,
        retained: &RetainedTables,
        dump: Option<&RawDump>,
    ) -> Result<(usize, PathBuf), StageFailure> {
        let _span =
            tracing::info_span!("message_flows", tables = retained.as_slice().len()).entered();
        let conversation = build_message_flow_prompt(retained.as_slice());
        if let Some(dump) = dump {
            dump.json("03-message-flows-prompt.json", &conversation);
        }

        let reply = self
            .call_with_retry(&conversation, Stage::MessageFlows)
            .map_err(|e| StageFailure::from_remote(Stage::MessageFlows, None, &e))?;
        if let Some(dump) = dump {
            dump.text("03-message-flows-reply.txt", &reply);
        }

        let table = self
            .parse_table(&reply, &MESSAGE_FLOW_COLUMNS)
            .map_err(|message| {
                StageFailure::new(Stage::MessageFlows, None, FailureKind::UnparsableReply, message)
                    .with_reply(&reply)
            })?;

        let path = message_flow_path(&self.config.output_dir);
        self.sink
            .write(&table.records, &MESSAGE_FLOW_COLUMNS, &path)
            .map_err(|e| StageFailure::from_sink(Stage::MessageFlows, None, &e))?;
        Ok((table.records.len(), path))
    }

    /// Parse a reply under the configured policy. An empty table counts as
    /// unparsable.
    fn parse_table(&self, reply: &str, columns: &[&str]) -> Result<ParsedTable, String> {
        let body_rows = RawTable::parse(reply).map_or(0, |table| table.rows.len());

        let records = match parse_markdown_table(reply, self.config.table_policy, columns) {
            Ok(records) if records.is_empty() => {
                return Err("reply contains no markdown table rows".into())
            }
            Ok(records) => records,
            Err(e) => return Err(format!("table rejected: {e}")),
        };

        let dropped_rows = body_rows.saturating_sub(records.len());
        if dropped_rows > 0 {
            tracing::info!(
                dropped = dropped_rows,
                kept = records.len(),
                "Table rows with a mismatched cell count were left out"
            );
        }
        Ok(ParsedTable {
            records,
            dropped_rows,
        })
    }

    /// Call the model, retrying transient failures with exponential backoff.
    /// The reply comes back with reasoning artifacts stripped.
    fn call_with_retry(
        &self,
        conversation: &Conversation,
        stage: Stage,
    ) -> Result<String, StructuringError> {
        let policy = self.config.retry;
        let mut attempt = 0;
        loop {
            match self.llm.complete(conversation) {
                Ok(reply) => return Ok(sanitize_llm_output(&reply)),
                Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                    let delay = policy.delay_for(attempt);
                    tracing::warn!(
                        stage = stage.as_str(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Model call failed, retrying"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

//! Offline evaluation against a labelled question-answer dataset.
//!
//! Examples are loaded from JSONL, answered with [`RagPipeline::run`] and then
//! graded by a judge [`ChatModel`] that compares each answer with the ground
//! truth.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::generation::{ChatModel, fill_placeholders};
use crate::pipeline::RagPipeline;

/// One labelled question about one article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvalExample {
    /// Where the article was published.
    pub article_url: String,
    /// The article's textual content.
    pub content: String,
    /// The question asked about the article.
    pub question: String,
    /// The expected answer.
    pub ground_truth_answer: String,
}

/// A judge's assessment of one answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Verdict {
    /// `Correct`, `Partially Correct`, `Incorrect`, `Invalid` or `Error`.
    pub evaluation: String,
    /// Score in `[0, 1]`.
    pub grade: f32,
    /// Short justification.
    #[serde(default)]
    pub explanation: String,
}

impl Verdict {
    fn new(evaluation: &str, grade: f32, explanation: impl Into<String>) -> Self {
        Self { evaluation: evaluation.to_string(), grade, explanation: explanation.into() }
    }
}

/// An answered example, optionally graded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalRecord {
    /// Where the article was published.
    pub article_url: String,
    /// The question asked.
    pub question: String,
    /// The expected answer.
    pub ground_truth_answer: String,
    /// The pipeline's answer, or an `Error: ...` marker.
    pub rag_answer: String,
    /// The judge's assessment, once graded.
    #[serde(flatten, default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
}

#[derive(Deserialize)]
struct DatasetLine {
    #[serde(default)]
    inputs: DatasetInputs,
    #[serde(default)]
    outputs: DatasetOutputs,
}

#[derive(Deserialize, Default)]
struct DatasetInputs {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize, Default)]
struct DatasetOutputs {
    #[serde(default)]
    article_textual_content: Option<String>,
    #[serde(default)]
    qna: Vec<DatasetPair>,
}

#[derive(Deserialize)]
struct DatasetPair {
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    answer: Option<String>,
}

/// Parse JSONL dataset text into examples.
///
/// Lines without an article or question list are skipped, as are pairs
/// missing a question or an answer.
///
/// # Errors
///
/// Returns [`RagError::Json`](crate::RagError::Json) for a malformed line.
pub fn parse_examples(jsonl: &str) -> Result<Vec<EvalExample>> {
    let mut examples = Vec::new();

    for line in jsonl.lines().filter(|l| !l.trim().is_empty()) {
        let record: DatasetLine = serde_json::from_str(line)?;
        let Some(article) = record.outputs.article_textual_content.filter(|a| !a.is_empty())
        else {
            continue;
        };
        let url = record.inputs.url.unwrap_or_default();

        for pair in record.outputs.qna {
            let (Some(question), Some(answer)) = (pair.question, pair.answer) else { continue };
            if question.is_empty() || answer.is_empty() {
                continue;
            }
            examples.push(EvalExample {
                article_url: url.clone(),
                content: article.trim().to_string(),
                question: question.trim().to_string(),
                ground_truth_answer: answer.trim().to_string(),
            });
        }
    }

    Ok(examples)
}

/// Load examples from a JSONL dataset file.
///
/// # Errors
///
/// Returns [`RagError::Io`](crate::RagError::Io) if the file cannot be read,
/// otherwise as [`parse_examples`].
pub fn load_examples(path: impl AsRef<Path>) -> Result<Vec<EvalExample>> {
    parse_examples(&std::fs::read_to_string(path)?)
}

/// Answer up to `limit` examples with the pipeline, one document per example.
///
/// Failures are recorded as `Error: <message>` answers.
pub async fn run_examples(
    pipeline: &RagPipeline,
    examples: &[EvalExample],
    limit: Option<usize>,
) -> Vec<EvalRecord> {
    let take = limit.unwrap_or(examples.len());
    let mut records = Vec::with_capacity(take.min(examples.len()));

    for (position, example) in examples.iter().take(take).enumerate() {
        let rag_answer = match pipeline.run(&example.content, &example.question).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(example = position + 1, error = %e, "example failed");
                format!("Error: {e}")
            }
        };
        records.push(EvalRecord {
            article_url: example.article_url.clone(),
            question: example.question.clone(),
            ground_truth_answer: example.ground_truth_answer.clone(),
            rag_answer,
            verdict: None,
        });
    }

    info!(answered = records.len(), "evaluation examples answered");
    records
}

const JUDGE_PROMPT: &str = "\
You are an expert evaluator.
Given a question, a ground truth answer and a generated answer, decide whether \
the generated answer (RAG Answer) correctly and fully answers the question, \
regardless of whether it matches the wording of the Ground Truth Answer.

Question: {question}

Ground Truth Answer: {ground_truth}

RAG Answer: {rag_answer}

Guidelines:
- Judge only whether the RAG Answer is a correct, complete and relevant response.
- Do not penalize wording that differs from the Ground Truth.
- A full and accurate answer scores 1.0; a partial answer gets a partial score.
- A wrong or irrelevant answer scores 0.

Reply in this JSON format:
{
  \"evaluation\": \"Correct\" | \"Partially Correct\" | \"Incorrect\",
  \"grade\": number between 0.0 and 1.0,
  \"explanation\": \"short explanation here\"
}";

const JUDGE_SYSTEM_PROMPT: &str = "You grade answers and reply only with JSON.";

/// Grades answers with a judge model.
pub struct AnswerEvaluator {
    judge: Arc<dyn ChatModel>,
}

impl AnswerEvaluator {
    /// Create an evaluator backed by `judge`.
    pub fn new(judge: Arc<dyn ChatModel>) -> Self {
        Self { judge }
    }

    /// Grade `rag_answer` against `ground_truth`.
    ///
    /// An exact match is graded `Correct` without consulting the judge. A
    /// judge failure yields an `Error` verdict with grade 0.
    pub async fn evaluate(&self, question: &str, ground_truth: &str, rag_answer: &str) -> Verdict {
        if rag_answer == ground_truth {
            return Verdict::new("Correct", 1.0, "perfect match");
        }

        let prompt = fill_placeholders(
            JUDGE_PROMPT,
            &[("question", question), ("ground_truth", ground_truth), ("rag_answer", rag_answer)],
        );

        match self.judge.chat(JUDGE_SYSTEM_PROMPT, &prompt).await {
            Ok(reply) => parse_verdict(&reply),
            Err(e) => {
                warn!(judge = self.judge.name(), error = %e, "judge request failed");
                Verdict::new("Error", 0.0, format!("Exception: {e}"))
            }
        }
    }

    /// Grade every record in place, in order.
    pub async fn grade_records(&self, records: &mut [EvalRecord]) {
        for record in records.iter_mut() {
            let verdict =
                self.evaluate(&record.question, &record.ground_truth_answer, &record.rag_answer).await;
            info!(evaluation = %verdict.evaluation, grade = verdict.grade, "graded answer");
            record.verdict = Some(verdict);
        }
    }
}

/// Extract a verdict from a judge reply.
///
/// Reads the outermost `{...}` block. Replies without a parseable block give
/// an `Invalid` verdict with grade 0. Grades are clamped to `[0, 1]`.
pub fn parse_verdict(reply: &str) -> Verdict {
    let reply = reply.trim();
    let block = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => return Verdict::new("Invalid", 0.0, format!("Could not parse JSON: {reply}")),
    };

    match serde_json::from_str::<Verdict>(block) {
        Ok(mut verdict) => {
            verdict.grade = if verdict.grade.is_finite() { verdict.grade.clamp(0.0, 1.0) } else { 0.0 };
            verdict
        }
        Err(_) => Verdict::new("Invalid", 0.0, format!("Could not parse JSON: {reply}")),
    }
}

/// Mean grade across graded records, or `None` when nothing is graded.
pub fn mean_grade(records: &[EvalRecord]) -> Option<f32> {
    let grades: Vec<f32> = records.iter().filter_map(|r| r.verdict.as_ref()).map(|v| v.grade).collect();
    (!grades.is_empty()).then(|| grades.iter().sum::<f32>() / grades.len() as f32)
}

/// Write records to `path` as pretty-printed JSON.
///
/// # Errors
///
/// Returns an I/O or serialization error.
pub fn save_records(path: impl AsRef<Path>, records: &[EvalRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Read records previously written by [`save_records`], graded or not.
///
/// # Errors
///
/// Returns an I/O error or [`RagError::Json`](crate::RagError::Json).
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<EvalRecord>> {
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}

#[derive(Serialize)]
struct AnswerRow<'a> {
    question: &'a str,
    ground_truth_answer: &'a str,
    rag_answer: &'a str,
}

/// Write the question, ground truth and answer of each record as CSV.
///
/// # Errors
///
/// Returns [`RagError::Csv`](crate::RagError::Csv) if the file cannot be written.
pub fn save_answers_csv(path: impl AsRef<Path>, records: &[EvalRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(AnswerRow {
            question: &record.question,
            ground_truth_answer: &record.ground_truth_answer,
            rag_answer: &record.rag_answer,
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Grade a saved answers file and write the graded records to `output`.
///
/// Records that already carry a verdict are graded again.
///
/// # Errors
///
/// Returns an error if either file cannot be read or written.
pub async fn grade_saved_answers(
    evaluator: &AnswerEvaluator,
    answers: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> Result<Vec<EvalRecord>> {
    let mut records = load_records(answers)?;
    info!(records = records.len(), "grading saved answers");
    evaluator.grade_records(&mut records).await;
    save_records(output, &records)?;
    Ok(records)
}

//! Subcommand implementations.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use cyber_rag::eval::{
    grade_saved_answers, load_examples, mean_grade, run_examples, save_answers_csv, save_records,
};
use cyber_rag::{
    AnswerEvaluator, ChatClient, DocumentSource, GeneratorConfig, HttpDocumentSource,
    QuestionSet, RagPipeline,
};
use tracing::info;

use crate::Settings;
use crate::render::{self, Report};

/// Built-in analyst questions used when `--questions` is not given.
const DEFAULT_QUESTIONS: &str = include_str!("../questions/questions.json");

fn build_pipeline(settings: &Settings, questions: Option<QuestionSet>) -> Result<RagPipeline> {
    let mut builder = RagPipeline::builder()
        .config(settings.rag_config()?)
        .embedder_config(settings.embedder_config())
        .generator_config(settings.generator_config());
    if let Some(questions) = questions {
        builder = builder.questions(questions);
    }
    builder.build().context("failed to set up the pipeline")
}

fn prompt_url() -> Result<String> {
    print!("Enter a blog URL: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let url = line.trim().to_string();
    if url.is_empty() {
        bail!("no URL given");
    }
    Ok(url)
}

pub async fn extract(
    settings: &Settings,
    url: Option<String>,
    questions: Option<PathBuf>,
    output: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let url = match url {
        Some(url) => url,
        None => prompt_url()?,
    };
    let questions = match questions {
        Some(path) => QuestionSet::load(&path)
            .with_context(|| format!("failed to load questions from {}", path.display()))?,
        None => QuestionSet::from_json(DEFAULT_QUESTIONS)?,
    };

    let pipeline = build_pipeline(settings, Some(questions))?;
    let answers = pipeline
        .run_all_from_source(&HttpDocumentSource::default(), &url)
        .await
        .with_context(|| format!("failed to answer questions about {url}"))?;

    let report = Report::new(url, answers);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render::report(&report));
    }

    if let Some(path) = output {
        report.save(&path)?;
        info!(path = %path.display(), "saved answers");
    }
    Ok(())
}

pub async fn ask(
    settings: &Settings,
    url: Option<String>,
    file: Option<PathBuf>,
    question: &str,
) -> Result<()> {
    let (origin, document) = match (url, file) {
        (Some(url), _) => {
            let text = HttpDocumentSource::default()
                .textual_content(&url)
                .await
                .ok_or_else(|| anyhow!("could not extract any text from {url}"))?;
            (url, text)
        }
        (None, Some(path)) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            (path.display().to_string(), text)
        }
        (None, None) => bail!("either --url or --file is required"),
    };

    let pipeline = build_pipeline(settings, None)?;
    let answered = pipeline.answer(&document, question).await?;

    print!("{}", render::report(&Report::new(origin, vec![answered])));
    Ok(())
}

pub async fn evaluate(
    settings: &Settings,
    dataset: &Path,
    output: &Path,
    limit: Option<usize>,
    judge_model: Option<String>,
    no_judge: bool,
) -> Result<()> {
    let examples = load_examples(dataset)
        .with_context(|| format!("failed to load dataset {}", dataset.display()))?;
    info!(examples = examples.len(), "loaded evaluation dataset");

    let pipeline = build_pipeline(settings, None)?;
    let mut records = run_examples(&pipeline, &examples, limit).await;

    let csv_path = output.with_extension("csv");
    save_answers_csv(&csv_path, &records)
        .with_context(|| format!("failed to write {}", csv_path.display()))?;
    info!(path = %csv_path.display(), "saved answers as CSV");

    if !no_judge {
        judge(settings, judge_model)?.grade_records(&mut records).await;
    }

    save_records(output, &records)
        .with_context(|| format!("failed to write {}", output.display()))?;

    print!("{}", render::evaluation_summary(&records, mean_grade(&records)));
    info!(path = %output.display(), records = records.len(), "saved evaluation results");
    Ok(())
}

pub async fn grade(
    settings: &Settings,
    answers: &Path,
    output: &Path,
    judge_model: Option<String>,
) -> Result<()> {
    let evaluator = judge(settings, judge_model)?;
    let records = grade_saved_answers(&evaluator, answers, output).await.with_context(|| {
        format!("failed to grade {} into {}", answers.display(), output.display())
    })?;

    print!("{}", render::evaluation_summary(&records, mean_grade(&records)));
    info!(path = %output.display(), records = records.len(), "saved graded answers");
    Ok(())
}

/// Judge model at temperature 0, defaulting to the chat model.
fn judge(settings: &Settings, judge_model: Option<String>) -> Result<AnswerEvaluator> {
    let judge_config = GeneratorConfig {
        model: judge_model.unwrap_or_else(|| settings.model.clone()),
        temperature: 0.0,
        ..settings.generator_config()
    };
    let judge = ChatClient::new(&judge_config).context("failed to set up the judge model")?;
    Ok(AnswerEvaluator::new(Arc::new(judge)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_questions_are_valid() {
        let questions = QuestionSet::from_json(DEFAULT_QUESTIONS).unwrap();
        assert_eq!(questions.len(), 8);
        assert_eq!(questions.retrieval_queries.len(), questions.len());
    }
}

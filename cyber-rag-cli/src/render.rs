//! Terminal panels and JSON export.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use cyber_rag::{AnsweredQuestion, EvalRecord};
use serde::Serialize;

const PANEL_WIDTH: usize = 88;

/// Answers for one document, as printed and exported.
#[derive(Debug, Serialize)]
pub struct Report {
    pub url: String,
    pub generated_at: DateTime<Local>,
    pub answers: Vec<AnsweredQuestion>,
}

impl Report {
    pub fn new(url: String, answers: Vec<AnsweredQuestion>) -> Self {
        Self { url, generated_at: Local::now(), answers }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }
}

/// Greedy word wrap; words longer than `width` get a line of their own.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            if !line.is_empty() && line.chars().count() + 1 + word.chars().count() > width {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        lines.push(line);
    }
    lines
}

/// A boxed block of text with an optional title on the top border and
/// subtitle on the bottom border.
pub fn panel(title: &str, body: &str, subtitle: Option<&str>) -> String {
    let inner = PANEL_WIDTH - 4;
    let border = |label: &str, left: char, right: char| {
        let label = if label.is_empty() { String::new() } else { format!(" {label} ") };
        let fill = (PANEL_WIDTH - 2).saturating_sub(label.chars().count());
        format!("{left}─{label}{}{right}\n", "─".repeat(fill.saturating_sub(1)))
    };

    let mut out = border(title, '╭', '╮');
    for line in wrap(body, inner) {
        let pad = inner.saturating_sub(line.chars().count());
        out.push_str(&format!("│ {line}{} │\n", " ".repeat(pad)));
    }
    out.push_str(&border(subtitle.unwrap_or(""), '╰', '╯'));
    out
}

/// Header panel plus one panel per answered question.
pub fn report(report: &Report) -> String {
    let timestamp = report.generated_at.format("%Y-%m-%d %H:%M:%S");
    let mut out = panel("Blog URL", &report.url, Some(&format!("Run at {timestamp}")));

    for item in &report.answers {
        let mut body = format!("Q: {}\n\nA: {}", item.question, item.answer);
        if item.low_confidence {
            body.push_str("\n\n(low confidence: no passage cleared the relevance threshold)");
        }
        out.push_str(&panel(&format!("Question {}", item.question_id), &body, None));
    }
    out
}

/// One line per graded record and the mean grade.
pub fn evaluation_summary(records: &[EvalRecord], mean: Option<f32>) -> String {
    let mut out = String::new();
    for (position, record) in records.iter().enumerate() {
        let verdict = record
            .verdict
            .as_ref()
            .map(|v| format!("{} ({:.2})", v.evaluation, v.grade))
            .unwrap_or_else(|| "ungraded".to_string());
        out.push_str(&format!("{:>4}. {verdict:<24} {}\n", position + 1, record.question));
    }
    match mean {
        Some(mean) => out.push_str(&format!("\nMean grade over {} answers: {mean:.3}\n", records.len())),
        None => out.push_str(&format!("\n{} answers recorded, none graded\n", records.len())),
    }
    out
}

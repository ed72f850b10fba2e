// src/models/question.rs

use serde::{Deserialize, Serialize};

/// Sub-section type. Cognitive sub-sections never contribute to total
/// possible marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Mcq,
    Written,
    Cognitive,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Mcq => "mcq",
            SectionKind::Written => "written",
            SectionKind::Cognitive => "cognitive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mcq" => Some(SectionKind::Mcq),
            "written" => Some(SectionKind::Written),
            "cognitive" => Some(SectionKind::Cognitive),
            _ => None,
        }
    }
}

/// A question joined with the kind of the sub-section it belongs to.
/// `correct_option` is present only for MCQ questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub sub_section_id: i64,
    pub kind: SectionKind,
    pub marks: f64,
    pub correct_option: Option<String>,
}

impl Question {
    /// Whether this question counts towards total possible marks.
    pub fn is_scored(&self) -> bool {
        self.kind != SectionKind::Cognitive
    }
}

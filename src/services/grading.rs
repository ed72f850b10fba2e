// src/services/grading.rs

use std::collections::HashMap;

use crate::error::AppError;
use crate::models::question::Question;
use crate::store::ResultsStore;

/// Outcome of grading one attempt's multiple-choice responses.
#[derive(Debug, Clone, serde::Serialize)]
pub struct McqGradeOutcome {
    pub mcq_score: f64,
    pub graded: usize,
    /// Responses whose question could not be resolved (or carries no
    /// answer key). They contribute 0 and never abort the pass.
    pub skipped: usize,
}

/// A selection is correct iff it matches the canonical option exactly
/// (case-sensitive). Awarded marks are all-or-nothing.
fn grade_selection(selected: &str, correct: &str, marks: f64) -> (bool, f64) {
    if selected == correct {
        (true, marks)
    } else {
        (false, 0.0)
    }
}

/// Grades every MCQ response of the attempt against the session's answer
/// keys and persists per-response correctness + awarded marks, keyed by
/// (attempt, question). Re-grading overwrites in place, so repeating the
/// pass never double-counts.
pub async fn grade_attempt(
    store: &dyn ResultsStore,
    attempt_id: i64,
    questions: &HashMap<i64, Question>,
) -> Result<McqGradeOutcome, AppError> {
    let responses = store.mcq_responses_by_attempt(attempt_id).await?;

    let mut mcq_score = 0.0;
    let mut graded = 0;
    let mut skipped = 0;

    for response in &responses {
        let answer_key = questions
            .get(&response.question_id)
            .and_then(|q| q.correct_option.as_deref().map(|c| (c, q.marks)));

        let Some((correct, marks)) = answer_key else {
            tracing::warn!(
                "Skipping MCQ response {} of attempt {}: question {} has no answer key",
                response.id,
                attempt_id,
                response.question_id
            );
            skipped += 1;
            continue;
        };

        let (is_correct, awarded) = grade_selection(&response.selected_option, correct, marks);

        store
            .record_mcq_grade(attempt_id, response.question_id, is_correct, awarded)
            .await?;

        mcq_score += awarded;
        graded += 1;
    }

    Ok(McqGradeOutcome {
        mcq_score,
        graded,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::SectionKind;
    use crate::models::response::McqResponse;
    use crate::store::memory::MemoryStore;

    fn question(id: i64, marks: f64, correct: &str) -> Question {
        Question {
            id,
            sub_section_id: 1,
            kind: SectionKind::Mcq,
            marks,
            correct_option: Some(correct.to_string()),
        }
    }

    #[test]
    fn grade_selection_exact_match() {
        assert_eq!(grade_selection("A", "A", 2.0), (true, 2.0));
        assert_eq!(grade_selection("B", "A", 2.0), (false, 0.0));
    }

    #[test]
    fn grade_selection_is_case_sensitive() {
        assert_eq!(grade_selection("a", "A", 1.0), (false, 0.0));
    }

    #[tokio::test]
    async fn grades_all_responses_and_skips_unresolvable() {
        let store = MemoryStore::new();
        for (id, q_id, selected) in [(1, 10, "A"), (2, 11, "B"), (3, 99, "C")] {
            store.add_mcq_response(McqResponse {
                id,
                attempt_id: 7,
                question_id: q_id,
                selected_option: selected.to_string(),
                is_correct: None,
                awarded_marks: None,
            });
        }

        let mut questions = HashMap::new();
        questions.insert(10, question(10, 1.0, "A"));
        questions.insert(11, question(11, 1.0, "C"));
        // question 99 unknown

        let outcome = grade_attempt(&store, 7, &questions).await.unwrap();
        assert_eq!(outcome.mcq_score, 1.0);
        assert_eq!(outcome.graded, 2);
        assert_eq!(outcome.skipped, 1);
    }

    #[tokio::test]
    async fn regrading_does_not_double_count() {
        let store = MemoryStore::new();
        store.add_mcq_response(McqResponse {
            id: 1,
            attempt_id: 7,
            question_id: 10,
            selected_option: "A".to_string(),
            is_correct: None,
            awarded_marks: None,
        });

        let mut questions = HashMap::new();
        questions.insert(10, question(10, 3.0, "A"));

        let first = grade_attempt(&store, 7, &questions).await.unwrap();
        let second = grade_attempt(&store, 7, &questions).await.unwrap();
        assert_eq!(first.mcq_score, 3.0);
        assert_eq!(second.mcq_score, 3.0);

        let responses = store.mcq_responses_by_attempt(7).await.unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].awarded_marks, Some(3.0));
    }
}

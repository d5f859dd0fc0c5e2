// src/widgets/quiz.rs

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::PASSING_SCORE_PERCENTAGE,
    widgets::persistence::{LocalStore, quiz_key},
};

pub const SUBMIT_LABEL: &str = "Submit";
pub const SUBMITTED_LABEL: &str = "Submitted";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub choices: Vec<String>,
}

/// Question id -> correct choice, embedded in the page.
pub type AnswerKey = HashMap<String, String>;

/// Question id -> selected choice. This is what gets persisted.
pub type QuizRunState = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizPhase {
    InProgress,
    Submitted,
}

/// Per-question correctness marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Correct,
    Incorrect,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizError {
    #[error("unknown question '{0}'")]
    UnknownQuestion(String),
    #[error("'{choice}' is not a choice of question '{question}'")]
    UnknownChoice { question: String, choice: String },
    #[error("quiz already submitted")]
    AlreadySubmitted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradeReport {
    pub correct: usize,
    pub total: usize,
    pub percentage: f64,
    pub passed: bool,
}

impl GradeReport {
    pub fn banner_text(&self) -> String {
        format!(
            "Score: {}/{} ({:.0}%) - {}",
            self.correct,
            self.total,
            self.percentage,
            if self.passed { "PASS" } else { "REVIEW" }
        )
    }

    pub fn css_class(&self) -> &'static str {
        if self.passed { "pass" } else { "fail" }
    }
}

/// Grades selections against the key. Unanswered questions count as wrong.
pub fn grade(selections: &QuizRunState, key: &AnswerKey, total_questions: usize) -> GradeReport {
    let correct = selections
        .iter()
        .filter(|(question, choice)| key.get(*question) == Some(*choice))
        .count();

    let percentage = if total_questions == 0 {
        0.0
    } else {
        (correct as f64 * 100.0) / total_questions as f64
    };

    GradeReport {
        correct,
        total: total_questions,
        percentage,
        passed: total_questions > 0 && percentage >= PASSING_SCORE_PERCENTAGE,
    }
}

/// Unbiased in-place shuffle.
pub fn fisher_yates<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

/// Two-phase quiz grading. While `InProgress`, every selection is persisted under
/// the page's quiz key and marked right or wrong on its own; the aggregate score
/// is only revealed by `submit`. `retake` wipes the saved run and reshuffles.
pub struct QuizWidget {
    storage_key: String,
    questions: Vec<Question>,
    key: AnswerKey,
    selections: QuizRunState,
    marks: HashMap<String, Mark>,
    phase: QuizPhase,
    report: Option<GradeReport>,
    store: LocalStore,
}

impl QuizWidget {
    /// Builds the widget for a page, restoring any saved progress and its marks.
    pub fn new(page_path: &str, questions: Vec<Question>, key: AnswerKey, store: LocalStore) -> Self {
        let storage_key = quiz_key(page_path);
        let mut widget = Self {
            storage_key,
            questions,
            key,
            selections: QuizRunState::new(),
            marks: HashMap::new(),
            phase: QuizPhase::InProgress,
            report: None,
            store,
        };

        let saved: QuizRunState = widget.store.load(&widget.storage_key).unwrap_or_default();
        for (question, choice) in saved {
            // Stale entries (the page changed since they were saved) are dropped.
            if widget.check_selection(&question, &choice).is_ok() {
                let mark = widget.mark_for(&question, &choice);
                widget.marks.insert(question.clone(), mark);
                widget.selections.insert(question, choice);
            }
        }
        widget
    }

    fn check_selection(&self, question_id: &str, choice: &str) -> Result<(), QuizError> {
        let question = self
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .ok_or_else(|| QuizError::UnknownQuestion(question_id.to_string()))?;
        if !question.choices.iter().any(|c| c == choice) {
            return Err(QuizError::UnknownChoice {
                question: question_id.to_string(),
                choice: choice.to_string(),
            });
        }
        Ok(())
    }

    fn mark_for(&self, question_id: &str, choice: &str) -> Mark {
        if self.key.get(question_id).map(String::as_str) == Some(choice) {
            Mark::Correct
        } else {
            Mark::Incorrect
        }
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.storage_key, &self.selections) {
            tracing::warn!(key = %self.storage_key, "Failed to save quiz progress: {}", e);
        }
    }

    /// Records an answer, saves the run and returns that question's mark.
    pub fn select(&mut self, question_id: &str, choice: &str) -> Result<Mark, QuizError> {
        if self.phase == QuizPhase::Submitted {
            return Err(QuizError::AlreadySubmitted);
        }
        self.check_selection(question_id, choice)?;

        let mark = self.mark_for(question_id, choice);
        self.selections
            .insert(question_id.to_string(), choice.to_string());
        self.marks.insert(question_id.to_string(), mark);
        self.persist();
        Ok(mark)
    }

    /// Grades the run and reveals the score. Submitting twice returns the same report.
    pub fn submit(&mut self) -> GradeReport {
        let report = grade(&self.selections, &self.key, self.questions.len());
        self.phase = QuizPhase::Submitted;
        self.report = Some(report.clone());
        report
    }

    /// Clears the saved run and markers, and reshuffles questions and choices.
    pub fn retake<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.store.remove(&self.storage_key);
        self.selections.clear();
        self.marks.clear();
        self.report = None;
        self.phase = QuizPhase::InProgress;

        fisher_yates(&mut self.questions, rng);
        for question in &mut self.questions {
            fisher_yates(&mut question.choices, rng);
        }
    }

    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn selection(&self, question_id: &str) -> Option<&str> {
        self.selections.get(question_id).map(String::as_str)
    }

    pub fn mark(&self, question_id: &str) -> Option<Mark> {
        self.marks.get(question_id).copied()
    }

    /// The score banner; only present after submit.
    pub fn report(&self) -> Option<&GradeReport> {
        self.report.as_ref()
    }

    pub fn submit_label(&self) -> &'static str {
        match self.phase {
            QuizPhase::InProgress => SUBMIT_LABEL,
            QuizPhase::Submitted => SUBMITTED_LABEL,
        }
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn ten_questions() -> (Vec<Question>, AnswerKey) {
        let questions: Vec<Question> = (1..=10)
            .map(|i| Question {
                id: format!("q{i}"),
                choices: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            })
            .collect();
        let key = questions
            .iter()
            .map(|q| (q.id.clone(), "a".to_string()))
            .collect();
        (questions, key)
    }

    fn answer(widget: &mut QuizWidget, correct: usize) {
        for i in 1..=10 {
            let choice = if i <= correct { "a" } else { "b" };
            widget.select(&format!("q{i}"), choice).unwrap();
        }
    }

    #[test]
    fn seven_of_ten_passes() {
        let (questions, key) = ten_questions();
        let mut widget = QuizWidget::new("/exam", questions, key, LocalStore::in_memory());
        answer(&mut widget, 7);

        let report = widget.submit();
        assert_eq!(report.correct, 7);
        assert_eq!(report.percentage, 70.0);
        assert!(report.passed);
        assert_eq!(report.banner_text(), "Score: 7/10 (70%) - PASS");
        assert_eq!(report.css_class(), "pass");
        assert_eq!(widget.submit_label(), SUBMITTED_LABEL);
    }

    #[test]
    fn six_of_ten_needs_review() {
        let (questions, key) = ten_questions();
        let mut widget = QuizWidget::new("/exam", questions, key, LocalStore::in_memory());
        answer(&mut widget, 6);

        let report = widget.submit();
        assert_eq!(report.percentage, 60.0);
        assert!(!report.passed);
        assert_eq!(report.banner_text(), "Score: 6/10 (60%) - REVIEW");
        assert_eq!(report.css_class(), "fail");
    }

    #[test]
    fn unanswered_questions_count_against_the_score() {
        let (_, key) = ten_questions();
        let selections: QuizRunState = [("q1".to_string(), "a".to_string())].into();
        let report = grade(&selections, &key, 10);
        assert_eq!(report.correct, 1);
        assert_eq!(report.percentage, 10.0);
    }

    #[test]
    fn empty_quiz_never_passes() {
        let report = grade(&QuizRunState::new(), &AnswerKey::new(), 0);
        assert!(!report.passed);
        assert_eq!(report.percentage, 0.0);
    }

    #[test]
    fn selection_marks_only_that_question() {
        let (questions, key) = ten_questions();
        let mut widget = QuizWidget::new("/exam", questions, key, LocalStore::in_memory());

        assert_eq!(widget.select("q1", "a"), Ok(Mark::Correct));
        assert_eq!(widget.select("q2", "c"), Ok(Mark::Incorrect));
        assert_eq!(widget.mark("q3"), None);
        assert!(widget.report().is_none());
        assert_eq!(widget.phase(), QuizPhase::InProgress);
    }

    #[test]
    fn invalid_selections_are_rejected() {
        let (questions, key) = ten_questions();
        let mut widget = QuizWidget::new("/exam", questions, key, LocalStore::in_memory());

        assert_eq!(
            widget.select("q99", "a"),
            Err(QuizError::UnknownQuestion("q99".into()))
        );
        assert!(matches!(
            widget.select("q1", "z"),
            Err(QuizError::UnknownChoice { .. })
        ));

        widget.submit();
        assert_eq!(widget.select("q1", "a"), Err(QuizError::AlreadySubmitted));
    }

    #[test]
    fn progress_is_restored_with_marks() {
        let store = LocalStore::in_memory();
        let (questions, key) = ten_questions();
        {
            let mut widget =
                QuizWidget::new("/exam", questions.clone(), key.clone(), store.clone());
            widget.select("q1", "a").unwrap();
            widget.select("q2", "b").unwrap();
        }

        let restored = QuizWidget::new("/exam", questions.clone(), key.clone(), store.clone());
        assert_eq!(restored.selection("q1"), Some("a"));
        assert_eq!(restored.mark("q1"), Some(Mark::Correct));
        assert_eq!(restored.mark("q2"), Some(Mark::Incorrect));
        assert!(restored.report().is_none());

        let other_page = QuizWidget::new("/other", questions, key, store);
        assert_eq!(other_page.selection("q1"), None);
    }

    #[test]
    fn stale_saved_answers_are_dropped() {
        let store = LocalStore::in_memory();
        let saved: QuizRunState = [
            ("q1".to_string(), "a".to_string()),
            ("gone".to_string(), "a".to_string()),
        ]
        .into();
        store.save(&quiz_key("/exam"), &saved).unwrap();

        let (questions, key) = ten_questions();
        let widget = QuizWidget::new("/exam", questions, key, store);
        assert_eq!(widget.selection("q1"), Some("a"));
        assert_eq!(widget.selection("gone"), None);
    }

    #[test]
    fn retake_clears_state_and_reshuffles_a_permutation() {
        let store = LocalStore::in_memory();
        let (questions, key) = ten_questions();
        let mut widget = QuizWidget::new("/exam", questions.clone(), key, store.clone());
        answer(&mut widget, 8);
        widget.submit();

        let mut rng = StdRng::seed_from_u64(7);
        widget.retake(&mut rng);

        assert_eq!(widget.phase(), QuizPhase::InProgress);
        assert_eq!(widget.submit_label(), SUBMIT_LABEL);
        assert!(widget.report().is_none());
        assert_eq!(widget.mark("q1"), None);
        assert_eq!(store.load::<QuizRunState>(widget.storage_key()), None);

        let mut before: Vec<String> = questions.iter().map(|q| q.id.clone()).collect();
        let mut after: Vec<String> = widget.questions().iter().map(|q| q.id.clone()).collect();
        before.sort();
        after.sort();
        assert_eq!(before, after);

        for question in widget.questions() {
            let mut choices = question.choices.clone();
            choices.sort();
            assert_eq!(choices, vec!["a", "b", "c", "d"]);
        }
    }

    #[test]
    fn fisher_yates_is_a_permutation_and_moves_things() {
        let mut rng = StdRng::seed_from_u64(42);
        let original: Vec<u32> = (0..50).collect();
        let mut shuffled = original.clone();
        fisher_yates(&mut shuffled, &mut rng);

        assert_ne!(shuffled, original);
        let mut sorted = shuffled.clone();
        sorted.sort();
        assert_eq!(sorted, original);

        let mut empty: Vec<u32> = Vec::new();
        fisher_yates(&mut empty, &mut rng);
        assert!(empty.is_empty());
    }
}

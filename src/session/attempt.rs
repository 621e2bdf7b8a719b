// src/session/attempt.rs

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::scoring::{self, Score};
use crate::models::{
    result::{AnswerSheet, NewResult},
    test::{PublicQuestion, Test},
};

/// Where an attempt is in its lifecycle. Loading happens before an
/// `Attempt` exists, so it has no variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    InProgress,
    Submitting,
    Terminal,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Question {0} is not part of this test")]
    UnknownQuestion(i64),

    #[error("Option '{option}' is not offered by question {question_id}")]
    UnknownOption { question_id: i64, option: String },

    #[error("The session is not accepting answers right now")]
    NotInProgress,

    #[error("A submission is already in flight")]
    SubmitInFlight,

    #[error("The session has ended")]
    Finished,
}

/// A navigation request from the student.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Navigation {
    Next,
    Previous,
    Jump { index: usize },
}

/// Result of one countdown step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Running(u64),
    Expired,
    /// The attempt is not in progress; the countdown has nothing to do.
    Idle,
}

/// Everything needed to persist a submission, captured at the moment the
/// attempt entered `Submitting`.
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    pub score: Score,
    pub result: NewResult,
}

#[derive(Debug, Serialize)]
pub struct Confirmation {
    pub answered: usize,
    pub total_questions: usize,
    pub unanswered: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub test_id: i64,
    pub title: String,
    pub phase: Phase,
    pub current_index: usize,
    pub question_count: usize,
    pub question: Option<PublicQuestion>,
    pub selected: Option<String>,
    pub answered_questions: Vec<i64>,
    pub remaining_seconds: u64,
    pub remaining_display: String,
}

/// One student's attempt at one test.
#[derive(Debug)]
pub struct Attempt {
    test: Arc<Test>,
    user_id: i64,
    current: usize,
    answers: AnswerSheet,
    remaining: u64,
    phase: Phase,
}

impl Attempt {
    pub fn new(test: Arc<Test>, user_id: i64) -> Self {
        let remaining = u64::try_from(test.duration).unwrap_or(0) * 60;
        Self {
            test,
            user_id,
            current: 0,
            answers: AnswerSheet::new(),
            remaining,
            phase: Phase::InProgress,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn answers(&self) -> &AnswerSheet {
        &self.answers
    }

    fn question_count(&self) -> usize {
        self.test.questions.len()
    }

    fn last_index(&self) -> usize {
        self.question_count().saturating_sub(1)
    }

    /// Moves within `[0, questionCount - 1]`. Out-of-range requests clamp;
    /// outside `InProgress` this does nothing.
    pub fn navigate(&mut self, nav: Navigation) {
        if self.phase != Phase::InProgress {
            return;
        }
        self.current = match nav {
            Navigation::Next => (self.current + 1).min(self.last_index()),
            Navigation::Previous => self.current.saturating_sub(1),
            Navigation::Jump { index } => index.min(self.last_index()),
        };
    }

    /// Records (or overwrites) the answer for a question.
    pub fn select(&mut self, question_id: i64, option: &str) -> Result<(), SessionError> {
        match self.phase {
            Phase::InProgress => {}
            Phase::Submitting => return Err(SessionError::NotInProgress),
            Phase::Terminal => return Err(SessionError::Finished),
        }

        let question = self
            .test
            .question(question_id)
            .ok_or(SessionError::UnknownQuestion(question_id))?;

        if !question.options.contains_key(option) {
            return Err(SessionError::UnknownOption {
                question_id,
                option: option.to_string(),
            });
        }

        self.answers.insert(question_id, option.to_string());
        Ok(())
    }

    pub fn tick(&mut self) -> Tick {
        if self.phase != Phase::InProgress {
            return Tick::Idle;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            Tick::Expired
        } else {
            Tick::Running(self.remaining)
        }
    }

    /// Moves to `Submitting` and scores the current answers.
    /// A second call while a submission is in flight is refused.
    pub fn begin_submit(&mut self) -> Result<PendingSubmission, SessionError> {
        match self.phase {
            Phase::InProgress => {}
            Phase::Submitting => return Err(SessionError::SubmitInFlight),
            Phase::Terminal => return Err(SessionError::Finished),
        }

        self.phase = Phase::Submitting;
        let score = scoring::score(&self.test.questions, &self.answers);

        Ok(PendingSubmission {
            score,
            result: NewResult {
                user_id: self.user_id,
                test_id: self.test.id,
                score: score.score,
                total_marks: score.total_marks,
                answers: self.answers.clone(),
            },
        })
    }

    /// The store rejected the submission; answers are kept for a retry.
    pub fn submission_failed(&mut self) {
        if self.phase == Phase::Submitting {
            self.phase = Phase::InProgress;
        }
    }

    pub fn submission_succeeded(&mut self) {
        self.phase = Phase::Terminal;
    }

    pub fn abandon(&mut self) {
        self.phase = Phase::Terminal;
    }

    pub fn confirmation(&self) -> Confirmation {
        let total_questions = self.question_count();
        let answered = self.answers.len();
        let unanswered = total_questions.saturating_sub(answered);
        Confirmation {
            answered,
            total_questions,
            unanswered,
            warning: (unanswered > 0)
                .then(|| format!("{} questions are unanswered.", unanswered)),
        }
    }

    pub fn view(&self, session_id: Uuid) -> SessionView {
        let question = self.test.questions.get(self.current);
        SessionView {
            session_id,
            test_id: self.test.id,
            title: self.test.title.clone(),
            phase: self.phase,
            current_index: self.current,
            question_count: self.question_count(),
            question: question.map(PublicQuestion::from),
            selected: question.and_then(|q| self.answers.get(&q.id).cloned()),
            answered_questions: self.answers.keys().copied().collect(),
            remaining_seconds: self.remaining,
            remaining_display: format_clock(self.remaining),
        }
    }
}

/// `m:ss`, as shown on the countdown.
pub fn format_clock(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

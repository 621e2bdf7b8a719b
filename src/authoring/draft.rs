// src/authoring/draft.rs

use std::{fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::TestDocument;
use crate::{
    models::test::{NewTest, QuestionOption},
    upload::UploadedImage,
};

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

/// An image attachment point on a question or on one of its options.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum Slot {
    Question { question_id: i64 },
    Option { question_id: i64, key: String },
}

impl Slot {
    pub fn question_id(&self) -> i64 {
        match self {
            Slot::Question { question_id } | Slot::Option { question_id, .. } => *question_id,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Question { question_id } => write!(f, "question:{}", question_id),
            Slot::Option { question_id, key } => write!(f, "option:{}:{}", question_id, key),
        }
    }
}

/// Parses `question:<id>` or `option:<id>:<key>`.
impl FromStr for Slot {
    type Err = DraftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || DraftError::BadSlot(s.to_string());
        let mut parts = s.split(':');
        let kind = parts.next().ok_or_else(bad)?;
        let question_id = parts
            .next()
            .and_then(|id| id.trim().parse::<i64>().ok())
            .ok_or_else(bad)?;

        let slot = match kind {
            "question" => Slot::Question { question_id },
            "option" => {
                let key = parts.next().filter(|k| !k.is_empty()).ok_or_else(bad)?;
                Slot::Option {
                    question_id,
                    key: key.to_string(),
                }
            }
            _ => return Err(bad()),
        };

        if parts.next().is_some() {
            return Err(bad());
        }
        Ok(slot)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    #[error("Draft not found")]
    NotFound,

    #[error("'{0}' is not a valid slot (expected question:<id> or option:<id>:<key>)")]
    BadSlot(String),

    #[error("Question {0} is not part of this draft")]
    UnknownQuestion(i64),

    #[error("Question {question_id} has no option '{key}'")]
    UnknownOption { question_id: i64, key: String },

    #[error("Slot {0} does not take an image")]
    SlotNotFlagged(Slot),

    #[error("Images still missing: {}", .0.iter().map(Slot::to_string).collect::<Vec<_>>().join(", "))]
    Incomplete(Vec<Slot>),
}

/// A parsed document waiting for its images.
#[derive(Debug, Clone)]
pub struct Draft {
    pub id: Uuid,
    pub owner: i64,
    pub document: TestDocument,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct DraftView {
    pub id: Uuid,
    pub title: String,
    pub duration: i32,
    pub question_count: usize,
    pub total_marks: i64,
    pub complete: bool,
    pub missing_slots: Vec<Slot>,
    pub document: TestDocument,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Draft {
    pub fn new(owner: i64, document: TestDocument) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            document,
            created_at: chrono::Utc::now(),
        }
    }

    /// Slots flagged for an image that have none yet, in question order.
    pub fn missing_slots(&self) -> Vec<Slot> {
        let mut missing = Vec::new();
        for q in &self.document.questions {
            if q.is_missing_image() {
                missing.push(Slot::Question { question_id: q.id });
            }
            for (key, option) in &q.options {
                if option.is_missing_image() {
                    missing.push(Slot::Option {
                        question_id: q.id,
                        key: key.clone(),
                    });
                }
            }
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_slots().is_empty()
    }

    /// Confirms the slot exists and takes an image.
    pub fn check_slot(&self, slot: &Slot) -> Result<(), DraftError> {
        let question_id = slot.question_id();
        let question = self
            .document
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .ok_or(DraftError::UnknownQuestion(question_id))?;

        let flagged = match slot {
            Slot::Question { .. } => question.has_question_image,
            Slot::Option { key, .. } => match question.options.get(key) {
                Some(QuestionOption::Rich(rich)) => rich.has_image,
                Some(QuestionOption::Plain(_)) => false,
                None => {
                    return Err(DraftError::UnknownOption {
                        question_id,
                        key: key.clone(),
                    });
                }
            },
        };

        if flagged {
            Ok(())
        } else {
            Err(DraftError::SlotNotFlagged(slot.clone()))
        }
    }

    /// Stores an uploaded image in one slot, replacing any earlier one.
    /// Every other slot is left as it was.
    pub fn attach(&mut self, slot: &Slot, image: &UploadedImage) -> Result<(), DraftError> {
        self.check_slot(slot)?;
        let question_id = slot.question_id();
        let question = self
            .document
            .questions
            .iter_mut()
            .find(|q| q.id == question_id)
            .ok_or(DraftError::UnknownQuestion(question_id))?;

        match slot {
            Slot::Question { .. } => {
                question.question_image_url = Some(image.url.clone());
                question.question_image_id = Some(image.public_id.clone());
            }
            Slot::Option { key, .. } => {
                if let Some(QuestionOption::Rich(rich)) = question.options.get_mut(key) {
                    rich.image_url = Some(image.url.clone());
                    rich.image_id = Some(image.public_id.clone());
                }
            }
        }
        Ok(())
    }

    /// CDN folder for a question's images: `test_<title>/q<id>`.
    pub fn folder_for(&self, question_id: i64) -> String {
        let title = WHITESPACE.replace_all(self.document.test_title.trim(), "_");
        format!("test_{}/q{}", title, question_id)
    }

    pub fn to_new_test(&self, created_by: i64) -> Result<NewTest, DraftError> {
        let missing = self.missing_slots();
        if !missing.is_empty() {
            return Err(DraftError::Incomplete(missing));
        }
        Ok(NewTest {
            title: self.document.test_title.trim().to_string(),
            duration: self.document.duration,
            questions: self.document.questions.clone(),
            created_by: Some(created_by),
        })
    }

    pub fn view(&self) -> DraftView {
        let missing_slots = self.missing_slots();
        DraftView {
            id: self.id,
            title: self.document.test_title.clone(),
            duration: self.document.duration,
            question_count: self.document.questions.len(),
            total_marks: self.document.total_marks(),
            complete: missing_slots.is_empty(),
            missing_slots,
            document: self.document.clone(),
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authoring::document::sample_document;

    fn sample_draft() -> Draft {
        let doc = TestDocument::parse(&sample_document().to_string()).unwrap();
        Draft::new(1, doc)
    }

    fn image(n: u32) -> UploadedImage {
        UploadedImage {
            url: format!("https://cdn.example.com/{}.png", n),
            public_id: format!("img{}", n),
            width: 100,
            height: 100,
        }
    }

    #[test]
    fn slot_strings_parse() {
        assert_eq!(
            "question:3".parse::<Slot>().unwrap(),
            Slot::Question { question_id: 3 }
        );
        assert_eq!(
            "option:2:B".parse::<Slot>().unwrap(),
            Slot::Option {
                question_id: 2,
                key: "B".to_string()
            }
        );
        assert!("option:2".parse::<Slot>().is_err());
        assert!("question:x".parse::<Slot>().is_err());
        assert!("answer:1".parse::<Slot>().is_err());
        assert!("question:1:A".parse::<Slot>().is_err());
    }

    #[test]
    fn sample_is_missing_three_images() {
        let draft = sample_draft();
        assert_eq!(
            draft.missing_slots(),
            vec![
                Slot::Question { question_id: 1 },
                Slot::Option { question_id: 2, key: "A".to_string() },
                Slot::Option { question_id: 2, key: "B".to_string() },
            ]
        );
        assert!(!draft.is_complete());
    }

    #[test]
    fn attaching_flips_only_its_own_slot() {
        let mut draft = sample_draft();
        let before = draft.document.questions[1].clone();

        draft.attach(&Slot::Question { question_id: 1 }, &image(1)).unwrap();

        assert_eq!(
            draft.document.questions[0].question_image_url.as_deref(),
            Some("https://cdn.example.com/1.png")
        );
        assert_eq!(draft.document.questions[1], before);
        assert_eq!(draft.missing_slots().len(), 2);
    }

    #[test]
    fn attaching_every_slot_completes_the_draft() {
        let mut draft = sample_draft();
        for (n, slot) in draft.missing_slots().into_iter().enumerate() {
            draft.attach(&slot, &image(n as u32)).unwrap();
        }
        assert!(draft.is_complete());
        assert!(draft.to_new_test(1).is_ok());
    }

    #[test]
    fn reattaching_replaces_the_image() {
        let mut draft = sample_draft();
        let slot = Slot::Option { question_id: 2, key: "A".to_string() };
        draft.attach(&slot, &image(1)).unwrap();
        draft.attach(&slot, &image(2)).unwrap();

        let option = &draft.document.questions[1].options["A"];
        assert_eq!(option.image_url(), Some("https://cdn.example.com/2.png"));
    }

    #[test]
    fn plain_option_does_not_take_an_image() {
        let mut draft = sample_draft();
        let slot = Slot::Option { question_id: 2, key: "C".to_string() };
        assert_eq!(
            draft.attach(&slot, &image(1)),
            Err(DraftError::SlotNotFlagged(slot))
        );
    }

    #[test]
    fn unknown_targets_are_rejected() {
        let mut draft = sample_draft();
        assert_eq!(
            draft.attach(&Slot::Question { question_id: 9 }, &image(1)),
            Err(DraftError::UnknownQuestion(9))
        );
        assert!(matches!(
            draft.attach(&Slot::Option { question_id: 2, key: "Z".to_string() }, &image(1)),
            Err(DraftError::UnknownOption { .. })
        ));
    }

    #[test]
    fn incomplete_draft_cannot_become_a_test() {
        let draft = sample_draft();
        assert!(matches!(draft.to_new_test(1), Err(DraftError::Incomplete(slots)) if slots.len() == 3));
    }

    #[test]
    fn folder_collapses_whitespace() {
        let draft = sample_draft();
        assert_eq!(draft.folder_for(2), "test_Sample_Physics_Test/q2");
    }
}

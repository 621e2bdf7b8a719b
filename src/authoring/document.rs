// src/authoring/document.rs

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::models::test::Question;

/// A hand-authored test, as pasted by an admin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TestDocument {
    #[validate(length(min = 1, max = 200, message = "testTitle must be 1 to 200 characters"))]
    pub test_title: String,

    /// Minutes.
    #[validate(range(min = 1, max = 1440, message = "duration must be between 1 and 1440 minutes"))]
    pub duration: i32,

    #[validate(length(min = 1, message = "questions must not be empty"))]
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("Invalid JSON: {0}")]
    Malformed(String),

    #[error("{0}")]
    Invalid(String),

    #[error("testTitle must not be blank")]
    BlankTitle,

    #[error("Question id {0} appears more than once")]
    DuplicateQuestionId(i64),

    #[error("Question {0} has no prompt text")]
    BlankPrompt(i64),

    #[error("Question {question_id} must be worth a positive number of marks (got {marks})")]
    NonPositiveMarks { question_id: i64, marks: i64 },

    #[error("Question {0} needs at least two options")]
    TooFewOptions(i64),

    #[error("Question {question_id}: correctAnswer '{answer}' is not one of its options")]
    UnknownCorrectAnswer { question_id: i64, answer: String },
}

impl TestDocument {
    /// Parses and checks a document in one go. Nothing is accepted unless
    /// every question is well-formed.
    pub fn parse(raw: &str) -> Result<Self, DocumentError> {
        let document: TestDocument =
            serde_json::from_str(raw).map_err(|e| DocumentError::Malformed(e.to_string()))?;
        document.check()?;
        Ok(document)
    }

    pub fn check(&self) -> Result<(), DocumentError> {
        self.validate()
            .map_err(|e| DocumentError::Invalid(e.to_string()))?;

        if self.test_title.trim().is_empty() {
            return Err(DocumentError::BlankTitle);
        }

        let mut seen = HashSet::new();
        for q in &self.questions {
            if !seen.insert(q.id) {
                return Err(DocumentError::DuplicateQuestionId(q.id));
            }
            if q.question.trim().is_empty() {
                return Err(DocumentError::BlankPrompt(q.id));
            }
            if q.marks <= 0 {
                return Err(DocumentError::NonPositiveMarks {
                    question_id: q.id,
                    marks: q.marks,
                });
            }
            if q.options.len() < 2 {
                return Err(DocumentError::TooFewOptions(q.id));
            }
            if !q.options.contains_key(&q.correct_answer) {
                return Err(DocumentError::UnknownCorrectAnswer {
                    question_id: q.id,
                    answer: q.correct_answer.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn total_marks(&self) -> i64 {
        self.questions.iter().map(|q| q.marks).sum()
    }
}

/// A small document showing both option shapes and an image slot.
pub fn sample_document() -> serde_json::Value {
    json!({
        "testTitle": "Sample Physics Test",
        "duration": 60,
        "questions": [
            {
                "id": 1,
                "question": "What is shown in the diagram?",
                "hasQuestionImage": true,
                "questionImageDescription": "Circuit diagram with resistors",
                "options": {
                    "A": "Series circuit",
                    "B": "Parallel circuit",
                    "C": "Mixed circuit",
                    "D": "Open circuit"
                },
                "correctAnswer": "B",
                "solution": "The resistors are connected in parallel configuration.",
                "marks": 4
            },
            {
                "id": 2,
                "question": "Identify the lens type:",
                "hasQuestionImage": false,
                "options": {
                    "A": { "text": "Convex lens", "hasImage": true, "imageDesc": "Convex lens diagram" },
                    "B": { "text": "Concave lens", "hasImage": true, "imageDesc": "Concave lens diagram" },
                    "C": "Plano-convex",
                    "D": "Cylindrical"
                },
                "correctAnswer": "A",
                "solution": "Convex lenses converge light rays.",
                "marks": 4
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test::QuestionOption;

    fn sample_with(edit: impl FnOnce(&mut serde_json::Value)) -> String {
        let mut doc = sample_document();
        edit(&mut doc);
        doc.to_string()
    }

    #[test]
    fn sample_parses_into_both_option_shapes() {
        let doc = TestDocument::parse(&sample_document().to_string()).unwrap();
        assert_eq!(doc.questions.len(), 2);
        assert_eq!(doc.total_marks(), 8);
        assert!(matches!(doc.questions[0].options["A"], QuestionOption::Plain(_)));
        match &doc.questions[1].options["A"] {
            QuestionOption::Rich(rich) => {
                assert!(rich.has_image);
                assert_eq!(rich.image_desc.as_deref(), Some("Convex lens diagram"));
            }
            other => panic!("expected rich option, got {:?}", other),
        }
    }

    #[test]
    fn options_keep_display_order() {
        let doc = TestDocument::parse(&sample_document().to_string()).unwrap();
        let keys: Vec<&str> = doc.questions[0].options.keys().map(String::as_str).collect();
        assert_eq!(keys, ["A", "B", "C", "D"]);
    }

    #[test]
    fn options_keep_authored_order_through_public_view() {
        let raw = r#"{
            "testTitle": "Ordering",
            "duration": 5,
            "questions": [{
                "id": 1,
                "question": "Pick one",
                "options": { "D": "d", "C": "c", "10": "ten", "2": "two", "B": "b" },
                "correctAnswer": "10",
                "marks": 1
            }]
        }"#;
        let doc = TestDocument::parse(raw).unwrap();
        let keys: Vec<&str> = doc.questions[0].options.keys().map(String::as_str).collect();
        assert_eq!(keys, ["D", "C", "10", "2", "B"]);

        let public = crate::models::test::PublicQuestion::from(&doc.questions[0]);
        let json = serde_json::to_string(&public).unwrap();
        let positions: Vec<usize> = ["\"D\"", "\"C\"", "\"10\"", "\"2\"", "\"B\""]
            .iter()
            .map(|k| json.find(k).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", json);
    }

    #[test]
    fn not_json_is_malformed() {
        assert!(matches!(
            TestDocument::parse("{ testTitle: nope"),
            Err(DocumentError::Malformed(_))
        ));
    }

    #[test]
    fn missing_questions_field_is_malformed() {
        let raw = r#"{"testTitle": "T", "duration": 10}"#;
        assert!(matches!(TestDocument::parse(raw), Err(DocumentError::Malformed(_))));
    }

    #[test]
    fn zero_duration_is_invalid() {
        let raw = sample_with(|d| d["duration"] = json!(0));
        assert!(matches!(TestDocument::parse(&raw), Err(DocumentError::Invalid(_))));
    }

    #[test]
    fn empty_question_list_is_invalid() {
        let raw = sample_with(|d| d["questions"] = json!([]));
        assert!(matches!(TestDocument::parse(&raw), Err(DocumentError::Invalid(_))));
    }

    #[test]
    fn blank_title_is_rejected() {
        let raw = sample_with(|d| d["testTitle"] = json!("   "));
        assert_eq!(TestDocument::parse(&raw), Err(DocumentError::BlankTitle));
    }

    #[test]
    fn correct_answer_must_be_an_option() {
        let raw = sample_with(|d| d["questions"][0]["correctAnswer"] = json!("E"));
        assert_eq!(
            TestDocument::parse(&raw),
            Err(DocumentError::UnknownCorrectAnswer {
                question_id: 1,
                answer: "E".to_string()
            })
        );
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let raw = sample_with(|d| d["questions"][1]["id"] = json!(1));
        assert_eq!(TestDocument::parse(&raw), Err(DocumentError::DuplicateQuestionId(1)));
    }

    #[test]
    fn marks_must_be_positive() {
        let raw = sample_with(|d| d["questions"][1]["marks"] = json!(0));
        assert!(matches!(
            TestDocument::parse(&raw),
            Err(DocumentError::NonPositiveMarks { question_id: 2, .. })
        ));
    }

    #[test]
    fn single_option_is_rejected() {
        let raw = sample_with(|d| {
            d["questions"][0]["options"] = json!({ "B": "Only one" });
        });
        assert_eq!(TestDocument::parse(&raw), Err(DocumentError::TooFewOptions(1)));
    }
}

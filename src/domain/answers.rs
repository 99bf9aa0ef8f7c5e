//! Typed checklist answers and result derivation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::error::DomainError;
use super::templates::ChecklistItem;
use super::types::{InspectionResult, ItemType};

time::serde::format_description!(calendar_date, Date, "[year]-[month]-[day]");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckResult {
    Pass,
    Fail,
    Na,
}

/// Answer payload, keyed by the checklist item's type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnswerValue {
    Check {
        result: CheckResult,
    },
    Number {
        value: f64,
    },
    Text {
        value: String,
    },
    Date {
        #[serde(with = "calendar_date")]
        value: Date,
    },
    /// Photo items are answered through the answer's photo references.
    Photo,
    Signature {
        signer_name: String,
        #[serde(with = "time::serde::rfc3339")]
        captured_at: OffsetDateTime,
        data_ref: String,
    },
}

impl AnswerValue {
    pub fn accepts(&self, item_type: ItemType) -> bool {
        match self {
            AnswerValue::Check {
                result: CheckResult::Na,
            } => item_type == ItemType::PassFailNa,
            AnswerValue::Check { .. } => {
                matches!(item_type, ItemType::PassFail | ItemType::PassFailNa)
            }
            AnswerValue::Number { .. } => item_type == ItemType::Number,
            AnswerValue::Text { .. } => item_type == ItemType::Text,
            AnswerValue::Date { .. } => item_type == ItemType::Date,
            AnswerValue::Photo => item_type == ItemType::Photo,
            AnswerValue::Signature { .. } => item_type == ItemType::Signature,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub item_id: String,
    #[serde(default)]
    pub value: Option<AnswerValue>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    pub answered_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub answered_at: OffsetDateTime,
}

impl Answer {
    pub fn has_comment(&self) -> bool {
        self.comment
            .as_deref()
            .is_some_and(|comment| !comment.trim().is_empty())
    }
}

/// Answer as entered; authorship is stamped when it is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerInput {
    pub item_id: String,
    pub value: Option<AnswerValue>,
    pub comment: Option<String>,
    pub photos: Vec<String>,
}

impl AnswerInput {
    pub fn new(item_id: impl Into<String>, value: AnswerValue) -> Self {
        Self {
            item_id: item_id.into(),
            value: Some(value),
            comment: None,
            photos: Vec::new(),
        }
    }

    pub fn check(item_id: impl Into<String>, result: CheckResult) -> Self {
        Self::new(item_id, AnswerValue::Check { result })
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_photo(mut self, reference: impl Into<String>) -> Self {
        self.photos.push(reference.into());
        self
    }

    pub fn stamp(self, answered_by: Uuid, answered_at: OffsetDateTime) -> Answer {
        Answer {
            item_id: self.item_id,
            value: self.value,
            comment: self.comment,
            photos: self.photos,
            answered_by,
            answered_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Pass,
    Fail,
    NotApplicable,
}

/// Derive the outcome of one item; `None` means unanswered.
pub fn evaluate(item: &ChecklistItem, answer: Option<&Answer>) -> Option<ItemOutcome> {
    let answer = answer?;
    match (item.item_type, answer.value.as_ref()) {
        (ItemType::Photo, _) if !answer.photos.is_empty() => Some(ItemOutcome::Pass),
        (_, None) => None,
        (_, Some(AnswerValue::Check { result })) => Some(match result {
            CheckResult::Pass => ItemOutcome::Pass,
            CheckResult::Fail => ItemOutcome::Fail,
            CheckResult::Na => ItemOutcome::NotApplicable,
        }),
        (_, Some(AnswerValue::Number { value })) => {
            let within = item.bounds.is_none_or(|bounds| bounds.contains(*value));
            Some(if within {
                ItemOutcome::Pass
            } else {
                ItemOutcome::Fail
            })
        }
        (_, Some(AnswerValue::Text { value })) if value.trim().is_empty() => None,
        (_, Some(AnswerValue::Photo)) => None,
        (_, Some(_)) => Some(ItemOutcome::Pass),
    }
}

/// Check a submitted answer against the item it targets.
pub fn validate_answer(item: &ChecklistItem, answer: &AnswerInput) -> Result<(), DomainError> {
    if let Some(value) = answer.value.as_ref()
        && !value.accepts(item.item_type)
    {
        return Err(DomainError::validation(format!(
            "answer for item `{}` does not match its {:?} type",
            item.id, item.item_type
        )));
    }
    if let Some(AnswerValue::Number { value }) = answer.value.as_ref()
        && !value.is_finite()
    {
        return Err(DomainError::validation(format!(
            "answer for item `{}` must be a finite number",
            item.id
        )));
    }
    Ok(())
}

fn index(answers: &[Answer]) -> HashMap<&str, &Answer> {
    answers
        .iter()
        .map(|answer| (answer.item_id.as_str(), answer))
        .collect()
}

/// Overall result: critical failures dominate, unanswered required items keep it pending.
pub fn compute_result(items: &[ChecklistItem], answers: &[Answer]) -> InspectionResult {
    let by_item = index(answers);
    let outcome = |item: &ChecklistItem| evaluate(item, by_item.get(item.id.as_str()).copied());

    if items
        .iter()
        .any(|item| item.critical && outcome(item) == Some(ItemOutcome::Fail))
    {
        return InspectionResult::Fail;
    }
    if items
        .iter()
        .any(|item| item.required && outcome(item).is_none())
    {
        return InspectionResult::Pending;
    }
    if items
        .iter()
        .any(|item| item.required && outcome(item) == Some(ItemOutcome::Fail))
    {
        return InspectionResult::Fail;
    }
    InspectionResult::Pass
}

/// Problems that block submission, in checklist order.
pub fn submission_problems(items: &[ChecklistItem], answers: &[Answer]) -> Vec<String> {
    let by_item = index(answers);
    let mut problems = Vec::new();

    for item in items {
        let answer = by_item.get(item.id.as_str()).copied();
        match evaluate(item, answer) {
            None if item.required => {
                problems.push(format!("required item `{}` is unanswered", item.id));
            }
            Some(ItemOutcome::Fail) => {
                let answer_has_comment = answer.is_some_and(Answer::has_comment);
                if item.required && !answer_has_comment {
                    problems.push(format!("failed item `{}` needs a comment", item.id));
                }
                let has_photo = answer.is_some_and(|answer| !answer.photos.is_empty());
                if item.photo_required_on_fail && !has_photo {
                    problems.push(format!("failed item `{}` needs a photo", item.id));
                }
            }
            _ => {}
        }
    }

    problems
}

/// Items whose outcome is a failure.
pub fn failed_items<'a>(items: &'a [ChecklistItem], answers: &[Answer]) -> Vec<&'a ChecklistItem> {
    let by_item = index(answers);
    items
        .iter()
        .filter(|item| {
            evaluate(item, by_item.get(item.id.as_str()).copied()) == Some(ItemOutcome::Fail)
        })
        .collect()
}

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

pub const MAX_TEXT_LEN: usize = 1000;

/// Largest magnitude below which every integral `f64` is exact.
const EXACT_INTEGER_LIMIT: f64 = 9_007_199_254_740_992.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,
    pub question: String,
    pub answer: String,
    pub category: String,
    pub context: String,
    #[serde(serialize_with = "whole_as_integer")]
    pub question_number: f64,
}

/// A question that has passed validation but has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestion {
    pub question: String,
    pub answer: String,
    pub category: String,
    pub context: String,
    #[serde(serialize_with = "whole_as_integer")]
    pub question_number: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_number: Option<f64>,
}

/// Raw request body. Everything is optional so that every missing or
/// malformed field can be reported at once.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    pub question: Option<String>,
    pub answer: Option<String>,
    pub category: Option<String>,
    pub context: Option<String>,
    pub question_number: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

impl Question {
    pub fn from_new(id: i64, new: NewQuestion) -> Self {
        Self {
            id,
            question: new.question,
            answer: new.answer,
            category: new.category,
            context: new.context,
            question_number: new.question_number,
        }
    }

    /// `term` must already be lowercase.
    pub fn matches(&self, term: &str) -> bool {
        self.question.to_lowercase().contains(term)
            || self.answer.to_lowercase().contains(term)
            || self.category.to_lowercase().contains(term)
    }

    pub fn apply(&mut self, patch: QuestionPatch) {
        if let Some(question) = patch.question {
            self.question = question;
        }
        if let Some(answer) = patch.answer {
            self.answer = answer;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(context) = patch.context {
            self.context = context;
        }
        if let Some(question_number) = patch.question_number {
            self.question_number = question_number;
        }
    }
}

impl From<Question> for NewQuestion {
    fn from(question: Question) -> Self {
        Self {
            question: question.question,
            answer: question.answer,
            category: question.category,
            context: question.context,
            question_number: question.question_number,
        }
    }
}

/// Writes `3.0` as `3` so whole question numbers keep their integer form on
/// the wire.
fn whole_as_integer<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.fract() == 0.0 && value.abs() < EXACT_INTEGER_LIMIT {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

enum Rule {
    Required,
    IfProvided,
}

fn check_text(
    errors: &mut Vec<FieldError>,
    field: &str,
    label: &str,
    value: Option<String>,
    bounded: bool,
    rule: &Rule,
) -> Option<String> {
    let value = match (value, rule) {
        (Some(value), _) => value.trim().to_string(),
        (None, Rule::Required) => {
            errors.push(FieldError::new(field, &format!("{label} is required")));
            return None;
        }
        (None, Rule::IfProvided) => return None,
    };

    if value.is_empty() {
        let message = match rule {
            Rule::Required => format!("{label} is required"),
            Rule::IfProvided => format!("{label} cannot be empty if provided"),
        };
        errors.push(FieldError::new(field, &message));
        return None;
    }
    if bounded && value.chars().count() > MAX_TEXT_LEN {
        errors.push(FieldError::new(
            field,
            &format!("{label} must be between 1 and {MAX_TEXT_LEN} characters"),
        ));
        return None;
    }

    Some(value)
}

fn numeric_text(text: &str) -> bool {
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    let mut parts = digits.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next().unwrap_or_default();

    !(whole.is_empty() && fraction.is_empty())
        && whole.chars().all(|c| c.is_ascii_digit())
        && fraction.chars().all(|c| c.is_ascii_digit())
}

/// Any finite JSON number, or a string spelling a plain decimal number.
fn parse_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(string) => {
            let text = string.trim();
            if numeric_text(text) {
                text.parse().ok()
            } else {
                None
            }
        }
        _ => None,
    };
    number.filter(|n: &f64| n.is_finite())
}

fn check_number(
    errors: &mut Vec<FieldError>,
    value: Option<Value>,
    rule: &Rule,
) -> Option<f64> {
    match (value, rule) {
        (Some(value), rule) => match parse_number(&value) {
            Some(number) => Some(number),
            None => {
                let message = match rule {
                    Rule::Required => "Question number must be numeric",
                    Rule::IfProvided => "Question number must be numeric if provided",
                };
                errors.push(FieldError::new("questionNumber", message));
                None
            }
        },
        (None, Rule::Required) => {
            errors.push(FieldError::new(
                "questionNumber",
                "Question number must be numeric",
            ));
            None
        }
        (None, Rule::IfProvided) => None,
    }
}

impl QuestionPayload {
    pub fn into_new(self) -> Result<NewQuestion, Vec<FieldError>> {
        let mut errors = Vec::new();
        let rule = Rule::Required;

        let question = check_text(&mut errors, "question", "Question", self.question, true, &rule);
        let answer = check_text(&mut errors, "answer", "Answer", self.answer, true, &rule);
        let category = check_text(&mut errors, "category", "Category", self.category, false, &rule);
        let context = check_text(&mut errors, "context", "Context", self.context, false, &rule);
        let question_number = check_number(&mut errors, self.question_number, &rule);

        match (question, answer, category, context, question_number) {
            (Some(question), Some(answer), Some(category), Some(context), Some(question_number))
                if errors.is_empty() =>
            {
                Ok(NewQuestion {
                    question,
                    answer,
                    category,
                    context,
                    question_number,
                })
            }
            _ => Err(errors),
        }
    }

    pub fn into_patch(self) -> Result<QuestionPatch, Vec<FieldError>> {
        let mut errors = Vec::new();
        let rule = Rule::IfProvided;

        let patch = QuestionPatch {
            question: check_text(&mut errors, "question", "Question", self.question, true, &rule),
            answer: check_text(&mut errors, "answer", "Answer", self.answer, true, &rule),
            category: check_text(&mut errors, "category", "Category", self.category, false, &rule),
            context: check_text(&mut errors, "context", "Context", self.context, false, &rule),
            question_number: check_number(&mut errors, self.question_number, &rule),
        };

        if errors.is_empty() {
            Ok(patch)
        } else {
            Err(errors)
        }
    }
}

impl From<NewQuestion> for QuestionPayload {
    fn from(new: NewQuestion) -> Self {
        Self {
            question: Some(new.question),
            answer: Some(new.answer),
            category: Some(new.category),
            context: Some(new.context),
            question_number: Some(Value::from(new.question_number)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> QuestionPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_valid_payload_is_trimmed() {
        let new = payload(json!({
            "question": "  What is the minimum voltage for batteries 1 & 2? ",
            "answer": "21.0 or 22.5 with the recharge procedure",
            "category": "Pre-Departure Ground Operations",
            "context": "Cold, dark flight deck",
            "questionNumber": 1
        }))
        .into_new()
        .unwrap();

        assert_eq!(new.question, "What is the minimum voltage for batteries 1 & 2?");
        assert_eq!(new.question_number, 1.0);
    }

    #[test]
    fn test_missing_fields_are_all_reported() {
        let errors = payload(json!({ "question": "Only a question" }))
            .into_new()
            .unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();

        assert_eq!(fields, vec!["answer", "category", "context", "questionNumber"]);
    }

    #[test]
    fn test_blank_and_oversized_text() {
        let errors = payload(json!({
            "question": "   ",
            "answer": "a".repeat(MAX_TEXT_LEN + 1),
            "category": "c",
            "context": "x",
            "questionNumber": 2
        }))
        .into_new()
        .unwrap_err();

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0], FieldError::new("question", "Question is required"));
        assert_eq!(errors[1].field, "answer");
    }

    #[test]
    fn test_question_number_forms() {
        assert_eq!(parse_number(&json!(7)), Some(7.0));
        assert_eq!(parse_number(&json!(7.0)), Some(7.0));
        assert_eq!(parse_number(&json!(2.5)), Some(2.5));
        assert_eq!(parse_number(&json!("12")), Some(12.0));
        assert_eq!(parse_number(&json!(" 2.5 ")), Some(2.5));
        assert_eq!(parse_number(&json!("-3")), Some(-3.0));
        assert_eq!(parse_number(&json!(".5")), Some(0.5));
        assert_eq!(parse_number(&json!("seven")), None);
        assert_eq!(parse_number(&json!("")), None);
        assert_eq!(parse_number(&json!(".")), None);
        assert_eq!(parse_number(&json!("1e5")), None);
        assert_eq!(parse_number(&json!("NaN")), None);
        assert_eq!(parse_number(&json!(true)), None);
    }

    #[test]
    fn test_fractional_question_number_is_accepted() {
        let new = payload(json!({
            "question": "Q", "answer": "A", "category": "C", "context": "X",
            "questionNumber": "2.5"
        }))
        .into_new()
        .unwrap();
        assert_eq!(new.question_number, 2.5);

        let question = Question::from_new(1, new);
        let wire = serde_json::to_value(&question).unwrap();
        assert_eq!(wire["questionNumber"], json!(2.5));

        let whole = Question {
            question_number: 4.0,
            ..question
        };
        assert_eq!(serde_json::to_value(&whole).unwrap()["questionNumber"], json!(4));
    }

    #[test]
    fn test_patch_only_checks_present_fields() {
        let patch = payload(json!({ "answer": "Write it up" })).into_patch().unwrap();
        assert_eq!(patch.answer.as_deref(), Some("Write it up"));
        assert!(patch.question.is_none());

        let errors = payload(json!({ "context": "", "questionNumber": "x" }))
            .into_patch()
            .unwrap_err();
        assert_eq!(
            errors,
            vec![
                FieldError::new("context", "Context cannot be empty if provided"),
                FieldError::new("questionNumber", "Question number must be numeric if provided"),
            ]
        );
    }

    #[test]
    fn test_search_match_is_case_insensitive() {
        let question = Question {
            id: 1,
            question: "Battery VOLTAGE?".into(),
            answer: "21.0".into(),
            category: "Ground Ops".into(),
            context: "ignored by search".into(),
            question_number: 1.0,
        };

        assert!(question.matches("voltage"));
        assert!(question.matches("ground"));
        assert!(!question.matches("ignored"));
    }
}

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::field::TmcValues;
use crate::hlc::Hlc;
use crate::ids::*;

/// Value half of an answer. Untagged on the wire: a plain string, a
/// boolean, or the `{p, n, u, v}` stock object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Flag(bool),
    Text(String),
    Stock(TmcValues),
}

/// A single field answer: `{answer: <fieldName>, value?: ..., checked?: bool}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<AnswerValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
}

impl Answer {
    pub fn value(field_name: impl Into<String>, value: AnswerValue) -> Self {
        Self {
            answer: field_name.into(),
            value: Some(value),
            checked: None,
        }
    }

    pub fn checked(field_name: impl Into<String>, checked: bool) -> Self {
        Self {
            answer: field_name.into(),
            value: None,
            checked: Some(checked),
        }
    }

    pub fn field_name(&self) -> &str {
        &self.answer
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, CoreError> {
        rmp_serde::to_vec_named(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, CoreError> {
        rmp_serde::from_slice(bytes).map_err(|e| CoreError::Serialization(e.to_string()))
    }
}

/// Request body of the answer endpoint. The engine always sends exactly one answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerPatch {
    pub answers: Vec<Answer>,
}

impl AnswerPatch {
    pub fn single(answer: Answer) -> Self {
        Self {
            answers: vec![answer],
        }
    }
}

/// A committed field answer, stamped for the durable outbox.
///
/// `(parameter_id, field_name, hlc)` orders competing writes to the same
/// field; the latest stamp wins locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub mutation_id: MutationId,
    pub checklist_id: ChecklistId,
    pub parameter_id: ParameterId,
    pub hlc: Hlc,
    pub answer: Answer,
}

impl Mutation {
    pub fn new(
        checklist_id: ChecklistId,
        parameter_id: ParameterId,
        hlc: Hlc,
        answer: Answer,
    ) -> Self {
        Self {
            mutation_id: MutationId::new(),
            checklist_id,
            parameter_id,
            hlc,
            answer,
        }
    }

    pub fn field_name(&self) -> &str {
        self.answer.field_name()
    }

    pub fn patch(&self) -> AnswerPatch {
        AnswerPatch::single(self.answer.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_shape_omits_absent_keys() {
        let patch = AnswerPatch::single(Answer::checked("bait", true));
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"answers": [{"answer": "bait", "checked": true}]})
        );
    }

    #[test]
    fn stock_answer_serializes_as_object() {
        let answer = Answer::value(
            "stock_4",
            AnswerValue::Stock(TmcValues {
                p: "10".into(),
                n: "10".into(),
                u: "10".into(),
                v: "0".into(),
            }),
        );
        assert_eq!(
            serde_json::to_value(&answer).unwrap(),
            json!({"answer": "stock_4", "value": {"p": "10", "n": "10", "u": "10", "v": "0"}})
        );
    }

    #[test]
    fn msgpack_preserves_value_shape() {
        let answers = [
            Answer::value("note", AnswerValue::Text("крысиный помёт".into())),
            Answer::checked("bait", false),
            Answer::value(
                "stock_1",
                AnswerValue::Stock(TmcValues {
                    p: "3".into(),
                    n: "2".into(),
                    u: "0".into(),
                    v: "1".into(),
                }),
            ),
        ];
        for answer in answers {
            let bytes = answer.to_msgpack().unwrap();
            assert_eq!(Answer::from_msgpack(&bytes).unwrap(), answer);
        }
    }
}

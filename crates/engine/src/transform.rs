use std::collections::BTreeSet;

use serde_json::Value;
use tracing::{debug, warn};

use checklist_core::{FieldViewModel, Parameter};

use crate::normalize::normalize;

const KNOWN_TYPES: [&str; 7] = ["radio", "text", "foto", "checkbox", "select", "tmc", "pest"];

/// Map raw field schemas to view-models.
///
/// Unknown types are skipped. A repeated name keeps its first occurrence,
/// since names are the answer keys.
pub fn transform(raw_fields: &[Value]) -> Vec<FieldViewModel> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(raw_fields.len());
    for (index, raw) in raw_fields.iter().enumerate() {
        let kind = raw.get("type").and_then(Value::as_str).unwrap_or_default();
        if !KNOWN_TYPES.contains(&kind) {
            debug!(index, kind, "skipping unsupported field type");
            continue;
        }
        let field = match serde_json::from_value::<FieldViewModel>(raw.clone()) {
            Ok(field) => field.normalized(),
            Err(err) => {
                warn!(index, kind, %err, "dropping malformed field");
                continue;
            }
        };
        if !seen.insert(field.name().to_string()) {
            warn!(index, name = field.name(), "dropping duplicate field name");
            continue;
        }
        out.push(field);
    }
    out
}

pub fn transform_parameter(parameter: &Parameter) -> Vec<FieldViewModel> {
    transform(&normalize(parameter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Vec<Value> {
        vec![
            json!({"type": "radio", "name": "access", "label": "Доступ", "options": [
                {"text": "Да", "value": 1, "selected": true},
                {"text": "Нет", "value": 0, "selected": true}
            ]}),
            json!({"type": "text", "name": "note", "label": "Комментарий", "value": 123}),
            json!({"type": "foto", "name": "photos", "value": [{"url": "u", "thumbUrl": "t", "name": "a.jpg"}]}),
            json!({"type": "signature", "name": "sig"}),
            json!({"type": "checkbox", "name": "bait", "checked": "1"}),
            json!({"type": "tmc", "name": "stock_1", "value": {"p": 3, "n": 3, "u": 0, "v": 0}}),
            json!({"type": "pest", "name": "rats", "value": "2"}),
        ]
    }

    #[test]
    fn unknown_types_are_skipped() {
        let fields = transform(&sample());
        assert_eq!(fields.len(), 6);
        assert!(fields.iter().all(|f| f.name() != "sig"));
    }

    #[test]
    fn transform_is_idempotent() {
        let once = transform(&sample());
        let reserialized: Vec<Value> = once
            .iter()
            .map(|f| serde_json::to_value(f).unwrap())
            .collect();
        assert_eq!(transform(&reserialized), once);
    }

    #[test]
    fn duplicate_names_keep_first() {
        let fields = transform(&[
            json!({"type": "text", "name": "note", "value": "first"}),
            json!({"type": "text", "name": "note", "value": "second"}),
        ]);
        assert_eq!(fields.len(), 1);
        let FieldViewModel::Text(text) = &fields[0] else {
            panic!("expected text");
        };
        assert_eq!(text.value, "first");
    }
}

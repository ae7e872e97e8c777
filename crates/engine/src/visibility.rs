//! Which fields render and which are complete.
//!
//! The first radio of a parameter is its gate. While the gate is unanswered or
//! answered with the negative value, every later non-radio field is hidden and
//! drops out of the completeness requirement.

use std::collections::BTreeMap;

use checklist_core::FieldViewModel;
use checklist_core::field::{ChoiceOption, TmcPart};

pub type ValidityMap = BTreeMap<String, bool>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidityRules {
    /// Minimum text length, counted in characters.
    pub text_min_len: usize,
    pub gate_negative_value: String,
}

impl Default for ValidityRules {
    fn default() -> Self {
        Self {
            text_min_len: 5,
            gate_negative_value: "0".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// Positions into the evaluated field list, in order.
    pub rendered: Vec<usize>,
    pub content_hidden: bool,
    /// Position of the gate radio, if the parameter has one.
    pub gate: Option<usize>,
    pub validity: ValidityMap,
    pub valid: bool,
}

impl Evaluation {
    pub fn rendered_fields<'a>(&self, fields: &'a [FieldViewModel]) -> Vec<&'a FieldViewModel> {
        self.rendered.iter().filter_map(|&i| fields.get(i)).collect()
    }

    pub fn is_valid(&self, key: &str) -> Option<bool> {
        self.validity.get(key).copied()
    }
}

fn any_selected(options: &[ChoiceOption]) -> bool {
    options.iter().any(|o| o.selected)
}

impl ValidityRules {
    pub fn hides_content(&self, gate: &FieldViewModel) -> bool {
        let FieldViewModel::Radio(radio) = gate else {
            return false;
        };
        match radio.options.iter().find(|o| o.selected) {
            None => true,
            Some(option) => option.value == self.gate_negative_value,
        }
    }

    /// Validity entries contributed by one field. The stock placeholder has none.
    pub fn field_validity(&self, field: &FieldViewModel) -> Vec<(String, bool)> {
        match field {
            FieldViewModel::Text(f) => {
                vec![(f.name.clone(), f.value.chars().count() >= self.text_min_len)]
            }
            FieldViewModel::Select(f) => vec![(f.name.clone(), any_selected(&f.options))],
            FieldViewModel::Radio(f) => vec![(f.name.clone(), any_selected(&f.options))],
            FieldViewModel::Checkbox(f) => vec![(f.name.clone(), true)],
            FieldViewModel::Foto(f) => vec![(f.name.clone(), !f.photos.is_empty())],
            FieldViewModel::Pest(f) => vec![(f.name.clone(), !f.value.trim().is_empty())],
            FieldViewModel::Tmc(f) if f.is_placeholder() => Vec::new(),
            FieldViewModel::Tmc(f) => [TmcPart::Remaining, TmcPart::Disposed, TmcPart::Replenished]
                .into_iter()
                .map(|part| (f.part_key(part), f.validity.get(part)))
                .collect(),
        }
    }

    fn field_valid(&self, field: &FieldViewModel) -> bool {
        self.field_validity(field).iter().all(|(_, ok)| *ok)
    }

    pub fn evaluate(&self, fields: &[FieldViewModel]) -> Evaluation {
        let mut rendered = Vec::with_capacity(fields.len());
        let mut validity = ValidityMap::new();
        let mut gate = None;
        let mut content_hidden = false;

        for (i, field) in fields.iter().enumerate() {
            validity.extend(self.field_validity(field));
            let is_radio = matches!(field, FieldViewModel::Radio(_));
            if is_radio && gate.is_none() {
                gate = Some(i);
                content_hidden = self.hides_content(field);
            }
            if content_hidden && !is_radio {
                continue;
            }
            rendered.push(i);
        }

        let valid = match gate {
            Some(g) if content_hidden => self.field_valid(&fields[g]),
            _ => rendered.iter().all(|&i| self.field_valid(&fields[i])),
        };

        Evaluation {
            rendered,
            content_hidden,
            gate,
            validity,
            valid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checklist_core::field::{PLACEHOLDER_TMC, TmcField};
    use serde_json::json;

    fn fields(raw: serde_json::Value) -> Vec<FieldViewModel> {
        serde_json::from_value(raw).unwrap()
    }

    fn gated(selected: Option<&str>) -> Vec<FieldViewModel> {
        let option = |value: &str| json!({"text": value, "value": value, "selected": selected == Some(value)});
        fields(json!([
            {"type": "radio", "name": "access", "options": [option("1"), option("0")]},
            {"type": "text", "name": "note", "value": ""},
            {"type": "foto", "name": "photos"},
        ]))
    }

    #[test]
    fn text_needs_five_characters() {
        let rules = ValidityRules::default();
        let eval = rules.evaluate(&fields(json!([
            {"type": "text", "name": "a", "value": "abcd"},
            {"type": "text", "name": "b", "value": "abcde"},
            {"type": "text", "name": "c", "value": "мышьи"},
        ])));
        assert_eq!(eval.is_valid("a"), Some(false));
        assert_eq!(eval.is_valid("b"), Some(true));
        assert_eq!(eval.is_valid("c"), Some(true));
        assert!(!eval.valid);
    }

    #[test]
    fn negative_gate_hides_content() {
        let rules = ValidityRules::default();
        let list = gated(Some("0"));
        let eval = rules.evaluate(&list);
        assert!(eval.content_hidden);
        assert_eq!(eval.rendered, vec![0]);
        assert!(eval.valid);
    }

    #[test]
    fn unanswered_gate_hides_content_and_is_invalid() {
        let eval = ValidityRules::default().evaluate(&gated(None));
        assert!(eval.content_hidden);
        assert_eq!(eval.rendered, vec![0]);
        assert!(!eval.valid);
    }

    #[test]
    fn positive_gate_requires_siblings() {
        let eval = ValidityRules::default().evaluate(&gated(Some("1")));
        assert!(!eval.content_hidden);
        assert_eq!(eval.rendered, vec![0, 1, 2]);
        assert_eq!(eval.is_valid("photos"), Some(false));
        assert!(!eval.valid);
    }

    #[test]
    fn later_radios_stay_visible_under_a_closed_gate() {
        let list = fields(json!([
            {"type": "radio", "name": "gate", "options": [{"text": "Нет", "value": "0", "selected": true}]},
            {"type": "radio", "name": "second", "options": [{"text": "x", "value": "x"}]},
            {"type": "checkbox", "name": "bait"},
        ]));
        let eval = ValidityRules::default().evaluate(&list);
        assert_eq!(eval.rendered, vec![0, 1]);
        assert!(eval.valid);
    }

    #[test]
    fn stock_validity_uses_sub_entries_and_skips_placeholder() {
        let mut tmc = TmcField {
            name: "stock_1".into(),
            ..TmcField::default()
        };
        tmc.validity.set(TmcPart::Disposed, false);
        let placeholder = TmcField {
            name: PLACEHOLDER_TMC.into(),
            ..TmcField::default()
        };
        let list = vec![FieldViewModel::Tmc(tmc), FieldViewModel::Tmc(placeholder)];
        let eval = ValidityRules::default().evaluate(&list);
        assert_eq!(eval.is_valid("stock_1_n"), Some(true));
        assert_eq!(eval.is_valid("stock_1_u"), Some(false));
        assert_eq!(eval.is_valid(PLACEHOLDER_TMC), None);
        assert_eq!(eval.rendered, vec![0, 1]);
        assert!(!eval.valid);
    }
}

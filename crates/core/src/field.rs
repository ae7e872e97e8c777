use serde::{Deserialize, Serialize};

use crate::answer::{Answer, AnswerValue};
use crate::lenient::{flag, lenient_vec, optional_string, string_or_number};

/// Name of the synthetic inventory entry shown when tracking is enabled but
/// the parameter carries no stock rows yet.
pub const PLACEHOLDER_TMC: &str = "placeholder_tmc";

/// One renderable, editable field of a parameter.
///
/// Serializes back into the raw schema shape (`{"type": "...", ...}`), so a
/// view-model list can be stored or re-transformed without loss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldViewModel {
    Radio(RadioField),
    Text(TextField),
    Foto(FotoField),
    Checkbox(CheckboxField),
    Select(SelectField),
    Tmc(TmcField),
    Pest(PestField),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Radio,
    Text,
    Foto,
    Checkbox,
    Select,
    Tmc,
    Pest,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Radio => "radio",
            Self::Text => "text",
            Self::Foto => "foto",
            Self::Checkbox => "checkbox",
            Self::Select => "select",
            Self::Tmc => "tmc",
            Self::Pest => "pest",
        }
    }
}

/// Radio and select option. Select options never carry `bgcolor`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChoiceOption {
    #[serde(deserialize_with = "string_or_number")]
    pub text: String,
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
    #[serde(deserialize_with = "optional_string", skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(deserialize_with = "optional_string", skip_serializing_if = "Option::is_none")]
    pub bgcolor: Option<String>,
    #[serde(deserialize_with = "flag")]
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioField {
    #[serde(deserialize_with = "string_or_number")]
    pub label: String,
    #[serde(deserialize_with = "string_or_number")]
    pub name: String,
    #[serde(deserialize_with = "lenient_vec")]
    pub options: Vec<ChoiceOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TextField {
    #[serde(deserialize_with = "string_or_number")]
    pub label: String,
    #[serde(deserialize_with = "string_or_number")]
    pub name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Photo {
    #[serde(deserialize_with = "string_or_number")]
    pub url: String,
    #[serde(rename = "thumbUrl", alias = "thumb_url", deserialize_with = "string_or_number")]
    pub thumb_url: String,
    #[serde(deserialize_with = "string_or_number")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FotoField {
    #[serde(deserialize_with = "string_or_number")]
    pub label: String,
    #[serde(deserialize_with = "string_or_number")]
    pub name: String,
    #[serde(alias = "value", deserialize_with = "lenient_vec")]
    pub photos: Vec<Photo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckboxField {
    #[serde(deserialize_with = "string_or_number")]
    pub label: String,
    #[serde(deserialize_with = "string_or_number")]
    pub name: String,
    #[serde(deserialize_with = "flag")]
    pub checked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectField {
    #[serde(deserialize_with = "string_or_number")]
    pub label: String,
    #[serde(deserialize_with = "string_or_number")]
    pub name: String,
    #[serde(deserialize_with = "lenient_vec")]
    pub options: Vec<ChoiceOption>,
}

/// Mutable stock sub-values. `p` (carried-in) has no variant: it cannot be edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TmcPart {
    Remaining,
    Disposed,
    Replenished,
}

impl TmcPart {
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Remaining => "n",
            Self::Disposed => "u",
            Self::Replenished => "v",
        }
    }
}

/// Stock quantities, string-encoded as entered.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TmcValues {
    #[serde(deserialize_with = "string_or_number")]
    pub p: String,
    #[serde(deserialize_with = "string_or_number")]
    pub n: String,
    #[serde(deserialize_with = "string_or_number")]
    pub u: String,
    #[serde(deserialize_with = "string_or_number")]
    pub v: String,
}

impl TmcValues {
    pub fn get(&self, part: TmcPart) -> &str {
        match part {
            TmcPart::Remaining => &self.n,
            TmcPart::Disposed => &self.u,
            TmcPart::Replenished => &self.v,
        }
    }

    pub fn set(&mut self, part: TmcPart, value: impl Into<String>) {
        let slot = match part {
            TmcPart::Remaining => &mut self.n,
            TmcPart::Disposed => &mut self.u,
            TmcPart::Replenished => &mut self.v,
        };
        *slot = value.into();
    }
}

/// Per-sub-value validity as last decided by the inventory checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TmcValidity {
    pub n: bool,
    pub u: bool,
    pub v: bool,
}

impl Default for TmcValidity {
    fn default() -> Self {
        Self {
            n: true,
            u: true,
            v: true,
        }
    }
}

impl TmcValidity {
    pub fn get(&self, part: TmcPart) -> bool {
        match part {
            TmcPart::Remaining => self.n,
            TmcPart::Disposed => self.u,
            TmcPart::Replenished => self.v,
        }
    }

    pub fn set(&mut self, part: TmcPart, valid: bool) {
        match part {
            TmcPart::Remaining => self.n = valid,
            TmcPart::Disposed => self.u = valid,
            TmcPart::Replenished => self.v = valid,
        }
    }

    pub fn all(&self) -> bool {
        self.n && self.u && self.v
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TmcField {
    #[serde(deserialize_with = "string_or_number")]
    pub label: String,
    #[serde(deserialize_with = "string_or_number")]
    pub name: String,
    #[serde(rename = "value")]
    pub values: TmcValues,
    pub validity: TmcValidity,
}

impl TmcField {
    pub fn is_placeholder(&self) -> bool {
        self.name.is_empty() || self.name == PLACEHOLDER_TMC
    }

    /// Validity map key of one sub-value, e.g. `stock_12_n`.
    pub fn part_key(&self, part: TmcPart) -> String {
        format!("{}_{}", self.name, part.suffix())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PestField {
    #[serde(deserialize_with = "string_or_number")]
    pub label: String,
    #[serde(deserialize_with = "string_or_number")]
    pub name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
}

impl FieldViewModel {
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Radio(_) => FieldKind::Radio,
            Self::Text(_) => FieldKind::Text,
            Self::Foto(_) => FieldKind::Foto,
            Self::Checkbox(_) => FieldKind::Checkbox,
            Self::Select(_) => FieldKind::Select,
            Self::Tmc(_) => FieldKind::Tmc,
            Self::Pest(_) => FieldKind::Pest,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Radio(f) => &f.name,
            Self::Text(f) => &f.name,
            Self::Foto(f) => &f.name,
            Self::Checkbox(f) => &f.name,
            Self::Select(f) => &f.name,
            Self::Tmc(f) => &f.name,
            Self::Pest(f) => &f.name,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Radio(f) => &f.label,
            Self::Text(f) => &f.label,
            Self::Foto(f) => &f.label,
            Self::Checkbox(f) => &f.label,
            Self::Select(f) => &f.label,
            Self::Tmc(f) => &f.label,
            Self::Pest(f) => &f.label,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Tmc(f) if f.is_placeholder())
    }

    /// Collapse multiple selections to the first one. Backends occasionally
    /// send several `selected` options for single-choice fields.
    pub fn normalized(mut self) -> Self {
        if let Self::Radio(RadioField { options, .. }) | Self::Select(SelectField { options, .. }) =
            &mut self
        {
            let mut seen = false;
            for option in options.iter_mut() {
                if option.selected && seen {
                    option.selected = false;
                }
                seen |= option.selected;
            }
        }
        self
    }

    /// The answer this field would send in its current state, if any.
    pub fn to_answer(&self) -> Option<Answer> {
        match self {
            Self::Radio(RadioField { name, options, .. })
            | Self::Select(SelectField { name, options, .. }) => options
                .iter()
                .find(|o| o.selected)
                .map(|o| Answer::value(name.clone(), AnswerValue::Text(o.value.clone()))),
            Self::Text(f) => Some(Answer::value(
                f.name.clone(),
                AnswerValue::Text(f.value.clone()),
            )),
            Self::Foto(_) => None,
            Self::Checkbox(f) => Some(Answer::checked(f.name.clone(), f.checked)),
            Self::Tmc(f) if f.is_placeholder() => None,
            Self::Tmc(f) => Some(Answer::value(
                f.name.clone(),
                AnswerValue::Stock(f.values.clone()),
            )),
            Self::Pest(f) => Some(Answer::value(
                f.name.clone(),
                AnswerValue::Text(f.value.clone()),
            )),
        }
    }

    /// Overlay a previously committed answer. Returns false when the answer
    /// does not fit this field (wrong shape or unknown option).
    pub fn apply_answer(&mut self, answer: &Answer) -> bool {
        match (self, answer.value.as_ref()) {
            (
                Self::Radio(RadioField { options, .. }) | Self::Select(SelectField { options, .. }),
                Some(AnswerValue::Text(value)),
            ) => {
                if !options.iter().any(|o| &o.value == value) {
                    return false;
                }
                for option in options.iter_mut() {
                    option.selected = &option.value == value;
                }
                true
            }
            (Self::Text(f), Some(AnswerValue::Text(value))) => {
                f.value = value.clone();
                true
            }
            (Self::Pest(f), Some(AnswerValue::Text(value))) => {
                f.value = value.clone();
                true
            }
            (Self::Checkbox(f), value) => {
                let checked = answer.checked.or(match value {
                    Some(AnswerValue::Flag(on)) => Some(*on),
                    _ => None,
                });
                match checked {
                    Some(checked) => {
                        f.checked = checked;
                        true
                    }
                    None => false,
                }
            }
            (Self::Tmc(f), Some(AnswerValue::Stock(values))) if !f.is_placeholder() => {
                f.values.n = values.n.clone();
                f.values.u = values.u.clone();
                f.values.v = values.v.clone();
                f.validity = TmcValidity::default();
                true
            }
            _ => false,
        }
    }
}

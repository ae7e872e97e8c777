use checklist_core::field::PestField;

use crate::confirm::{Decision, Prompt, Resolution};

/// Commit check for a pest count.
///
/// A positive count is confirmed first; declining resets the field to zero
/// without sending anything. Zero goes out directly, empty input is left alone,
/// and anything that is not a non-negative integer is reset.
pub fn check_commit(field: &PestField) -> Decision {
    let raw = field.value.trim();
    if raw.is_empty() {
        return Decision::Skip;
    }
    match raw.parse::<u64>() {
        Ok(0) => Decision::Apply(Resolution::Send),
        Ok(_) => Decision::Ask {
            prompt: Prompt::PestCount {
                label: field.label.clone(),
                count: raw.to_string(),
            },
            on_confirm: Resolution::Send,
            on_cancel: Resolution::ResetPest,
        },
        Err(_) => Decision::Apply(Resolution::ResetPest),
    }
}

/// Returns true when the field should be sent.
pub fn apply(field: &mut PestField, resolution: &Resolution) -> bool {
    match resolution {
        Resolution::Send => {
            field.value = field.value.trim().to_string();
            true
        }
        Resolution::ResetPest => {
            field.value = "0".to_string();
            false
        }
        Resolution::Clamp { .. } => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pest(value: &str) -> PestField {
        PestField {
            label: "Крысы".into(),
            name: "rats".into(),
            value: value.into(),
        }
    }

    #[test]
    fn positive_count_asks() {
        let Decision::Ask { on_confirm, on_cancel, .. } = check_commit(&pest("3")) else {
            panic!("expected a prompt");
        };
        assert_eq!(on_confirm, Resolution::Send);
        assert_eq!(on_cancel, Resolution::ResetPest);
    }

    #[test]
    fn zero_and_empty() {
        assert_eq!(check_commit(&pest("0")), Decision::Apply(Resolution::Send));
        assert_eq!(check_commit(&pest("  ")), Decision::Skip);
        assert_eq!(check_commit(&pest("-2")), Decision::Apply(Resolution::ResetPest));
    }

    #[test]
    fn decline_resets_without_send() {
        let mut field = pest("3");
        assert!(!apply(&mut field, &Resolution::ResetPest));
        assert_eq!(field.value, "0");
    }
}

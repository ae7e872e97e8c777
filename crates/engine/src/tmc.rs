//! Stock reconciliation checks, run when a sub-value loses focus.
//!
//! A sent state always satisfies `n <= p`, `u <= n` and `n - u + v >= 0`:
//! sending first resets whichever later sub-value the committed one broke.

use checklist_core::field::{TmcField, TmcPart, TmcValues};

use crate::confirm::{Decision, Prompt, Resolution};

/// Quantities are entered as text. Anything unparsable counts as zero.
pub fn parse_quantity(raw: &str) -> f64 {
    raw.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|q| q.is_finite())
        .unwrap_or(0.0)
}

pub fn format_quantity(quantity: f64) -> String {
    format!("{quantity}")
}

fn clamp(part: TmcPart, value: impl Into<String>) -> Resolution {
    Resolution::Clamp {
        part,
        value: value.into(),
    }
}

pub fn check_commit(label: &str, values: &TmcValues, part: TmcPart) -> Decision {
    let p = parse_quantity(&values.p);
    let n = parse_quantity(&values.n);
    let u = parse_quantity(&values.u);
    let v = parse_quantity(&values.v);

    match part {
        TmcPart::Remaining if n > p => Decision::Ask {
            prompt: Prompt::StockAboveCarried {
                label: label.to_string(),
                carried: values.p.clone(),
            },
            on_confirm: clamp(TmcPart::Remaining, values.p.clone()),
            on_cancel: clamp(TmcPart::Remaining, values.p.clone()),
        },
        TmcPart::Remaining if n < p => Decision::Ask {
            prompt: Prompt::StockConsumed {
                label: label.to_string(),
                consumed: format_quantity(p - n),
            },
            on_confirm: Resolution::Send,
            on_cancel: clamp(TmcPart::Remaining, values.p.clone()),
        },
        TmcPart::Remaining => Decision::Apply(Resolution::Send),
        TmcPart::Disposed if u > n => Decision::Apply(clamp(TmcPart::Disposed, "0")),
        TmcPart::Disposed => Decision::Apply(Resolution::Send),
        TmcPart::Replenished => {
            let total = n - u + v;
            if total < 0.0 {
                Decision::Apply(clamp(TmcPart::Replenished, "0"))
            } else if total == 0.0 {
                Decision::Ask {
                    prompt: Prompt::EmptyInventory {
                        label: label.to_string(),
                    },
                    on_confirm: Resolution::Send,
                    on_cancel: clamp(TmcPart::Replenished, "0"),
                }
            } else {
                Decision::Apply(Resolution::Send)
            }
        }
    }
}

/// Record an edit in progress. The sub-value stays invalid until committed.
pub fn edit(field: &mut TmcField, part: TmcPart, value: impl Into<String>) {
    field.values.set(part, value);
    field.validity.set(part, false);
}

/// Bring `n`, `u` and `v` back within the stock invariants, in that order.
/// Returns the sub-values that were reset.
pub fn reconcile(values: &mut TmcValues) -> Vec<TmcPart> {
    let mut reset = Vec::new();
    let p = parse_quantity(&values.p);
    let mut n = parse_quantity(&values.n);
    let mut u = parse_quantity(&values.u);
    let v = parse_quantity(&values.v);

    if n > p {
        values.n = values.p.clone();
        n = p;
        reset.push(TmcPart::Remaining);
    }
    if u > n {
        values.u = "0".to_string();
        u = 0.0;
        reset.push(TmcPart::Disposed);
    }
    if n - u + v < 0.0 {
        values.v = "0".to_string();
        reset.push(TmcPart::Replenished);
    }
    reset
}

/// Apply a resolution to the field. Returns true when the field should be sent.
pub fn apply(field: &mut TmcField, part: TmcPart, resolution: &Resolution) -> bool {
    match resolution {
        Resolution::Send => {
            field.validity.set(part, true);
            for reset in reconcile(&mut field.values) {
                field.validity.set(reset, true);
            }
            true
        }
        Resolution::Clamp { part, value } => {
            field.values.set(*part, value.clone());
            field.validity.set(*part, true);
            false
        }
        Resolution::ResetPest => false,
    }
}

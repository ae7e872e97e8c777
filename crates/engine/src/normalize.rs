//! Flattens a parameter's `fields`, `pests` and `tmc` arrays into one ordered
//! list of raw field schemas.
//!
//! Stock rows arrive in two shapes: grouped, with one sub-field per quantity
//! (`{"label": .., "fields": [{"name": "tmc_12_p", "value": 10}, ..]}`), or
//! flat (`{"name": .., "p": .., "n": .., ..}`). Both become
//! `{"type": "tmc", "name", "label", "value": {p, n, u, v}}`.

use serde_json::{Map, Value, json};

use checklist_core::Parameter;
use checklist_core::field::PLACEHOLDER_TMC;
use checklist_core::lenient::scalar_to_string;

pub const PLACEHOLDER_LABEL: &str = "Наличие препаратов";

/// Declared fields, then pests, then stock rows.
pub fn normalize(parameter: &Parameter) -> Vec<Value> {
    let mut out = parameter.fields.clone();
    out.extend(parameter.pests.iter().filter_map(pest_entry));
    if parameter.tmc_used {
        let stock: Vec<Value> = parameter.tmc.iter().filter_map(tmc_entry).collect();
        if stock.is_empty() {
            out.push(json!({
                "type": "tmc",
                "name": PLACEHOLDER_TMC,
                "label": PLACEHOLDER_LABEL,
            }));
        } else {
            out.extend(stock);
        }
    }
    out
}

fn text_of(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .map(scalar_to_string)
        .find(|s| !s.is_empty())
}

fn pest_entry(raw: &Value) -> Option<Value> {
    let obj = raw.as_object()?;
    let name = text_of(obj, &["name"])
        .or_else(|| text_of(obj, &["id"]).map(|id| format!("pest_{id}")))?;
    let label = text_of(obj, &["label", "title"]).unwrap_or_default();
    let value = text_of(obj, &["value", "count"]).unwrap_or_default();
    Some(json!({"type": "pest", "name": name, "label": label, "value": value}))
}

/// Strip the trailing `_<suffix>` of a sub-field name: `tmc_12_p` -> `tmc_12`.
fn base_name(sub_field: &str) -> &str {
    match sub_field.rsplit_once('_') {
        Some((base, _)) if !base.is_empty() => base,
        _ => sub_field,
    }
}

fn tmc_entry(raw: &Value) -> Option<Value> {
    let obj = raw.as_object()?;
    let label = text_of(obj, &["label", "title", "name_tmc"]).unwrap_or_default();

    let (name, quantities) = match obj.get("fields").and_then(Value::as_array) {
        Some(subs) => {
            let first = subs.first()?.get("name").map(scalar_to_string)?;
            let mut quantities = Map::new();
            for sub in subs {
                let Some(sub_name) = sub.get("name").map(scalar_to_string) else {
                    continue;
                };
                if let Some((_, suffix)) = sub_name.rsplit_once('_') {
                    let value = sub.get("value").map(scalar_to_string).unwrap_or_default();
                    quantities.insert(suffix.to_string(), Value::String(value));
                }
            }
            (base_name(&first).to_string(), quantities)
        }
        None => {
            let name = text_of(obj, &["name"])?;
            let source = match obj.get("value") {
                Some(Value::Object(nested)) => nested,
                _ => obj,
            };
            let mut quantities = Map::new();
            for key in ["p", "n", "u", "v"] {
                if let Some(v) = source.get(key) {
                    quantities.insert(key.to_string(), Value::String(scalar_to_string(v)));
                }
            }
            (name, quantities)
        }
    };

    let quantity = |key: &str| {
        quantities
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let p = quantity("p").unwrap_or_else(|| "0".to_string());
    // Nothing consumed yet: remaining starts at the carried-in amount.
    let n = quantity("n").unwrap_or_else(|| p.clone());
    let u = quantity("u").unwrap_or_else(|| "0".to_string());
    let v = quantity("v").unwrap_or_else(|| "0".to_string());

    Some(json!({
        "type": "tmc",
        "name": name,
        "label": label,
        "value": {"p": p, "n": n, "u": u, "v": v},
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parameter(raw: Value) -> Parameter {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn order_is_fields_pests_then_stock() {
        let p = parameter(json!({
            "id": 1,
            "name": "Склад",
            "tmc_used": true,
            "fields": [{"type": "text", "name": "note", "label": "Комментарий"}],
            "pests": [{"name": "rats", "title": "Крысы", "count": 2}],
            "tmc": [{"name": "stock_1", "label": "Приманка", "p": 5}]
        }));
        let out = normalize(&p);
        let types: Vec<_> = out.iter().map(|f| f["type"].as_str().unwrap()).collect();
        assert_eq!(types, vec!["text", "pest", "tmc"]);
        assert_eq!(out[1]["label"], "Крысы");
        assert_eq!(out[1]["value"], "2");
        assert_eq!(out[2]["value"], json!({"p": "5", "n": "5", "u": "0", "v": "0"}));
    }

    #[test]
    fn grouped_stock_rows_take_base_name_from_first_sub_field() {
        let p = parameter(json!({
            "id": 1,
            "tmc_used": 1,
            "tmc": [{
                "label": "Родентицид",
                "fields": [
                    {"name": "tmc_12_p", "value": 10},
                    {"name": "tmc_12_n", "value": "8"},
                    {"name": "tmc_12_u", "value": "1"},
                    {"name": "tmc_12_v", "value": ""}
                ]
            }]
        }));
        let out = normalize(&p);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["name"], "tmc_12");
        assert_eq!(out[0]["value"], json!({"p": "10", "n": "8", "u": "1", "v": "0"}));
    }

    #[test]
    fn tracking_without_rows_emits_placeholder() {
        let p = parameter(json!({"id": 1, "tmc_used": true, "tmc": []}));
        let out = normalize(&p);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["name"], PLACEHOLDER_TMC);
        assert_eq!(out[0]["label"], PLACEHOLDER_LABEL);
    }

    #[test]
    fn stock_ignored_when_tracking_disabled() {
        let p = parameter(json!({"id": 1, "tmc": [{"name": "stock_1", "p": 1}]}));
        assert!(normalize(&p).is_empty());
    }
}

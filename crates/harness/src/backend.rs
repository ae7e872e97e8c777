use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use checklist_core::lenient::scalar_to_string;
use checklist_core::{Answer, AnswerPatch, AnswerValue, ChecklistId};
use checklist_engine::{ChecklistRemote, RemoteError};

#[derive(Default)]
struct BackendState {
    checklists: BTreeMap<ChecklistId, Value>,
    posts: Vec<(ChecklistId, AnswerPatch)>,
    fetches: usize,
    offline: bool,
    reject_posts: bool,
}

/// In-memory checklist server. Accepted answers are written back into the
/// stored schema the way the real backend embeds prior answers.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<BackendState>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_checklist(checklist_id: impl Into<ChecklistId>, body: Value) -> Self {
        let backend = Self::new();
        backend.insert_checklist(checklist_id, body);
        backend
    }

    pub fn insert_checklist(&self, checklist_id: impl Into<ChecklistId>, body: Value) {
        self.state.lock().checklists.insert(checklist_id.into(), body);
    }

    pub fn edit_checklist(&self, checklist_id: &ChecklistId, f: impl FnOnce(&mut Value)) {
        if let Some(body) = self.state.lock().checklists.get_mut(checklist_id) {
            f(body);
        }
    }

    pub fn checklist(&self, checklist_id: &ChecklistId) -> Option<Value> {
        self.state.lock().checklists.get(checklist_id).cloned()
    }

    /// Fail every request as unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Answer posts with a server error while fetches keep working.
    pub fn set_reject_posts(&self, reject: bool) {
        self.state.lock().reject_posts = reject;
    }

    pub fn fetch_count(&self) -> usize {
        self.state.lock().fetches
    }

    pub fn posts(&self) -> Vec<AnswerPatch> {
        self.state.lock().posts.iter().map(|(_, p)| p.clone()).collect()
    }

    pub fn posted_answers(&self) -> Vec<Answer> {
        self.posts()
            .into_iter()
            .flat_map(|patch| patch.answers)
            .collect()
    }
}

#[async_trait]
impl ChecklistRemote for FakeBackend {
    async fn fetch_checklist(&self, checklist_id: &ChecklistId) -> Result<Value, RemoteError> {
        let mut state = self.state.lock();
        if state.offline {
            return Err(RemoteError::Unavailable("backend offline".into()));
        }
        state.fetches += 1;
        state
            .checklists
            .get(checklist_id)
            .cloned()
            .ok_or(RemoteError::Status(404))
    }

    async fn post_answers(
        &self,
        checklist_id: &ChecklistId,
        patch: &AnswerPatch,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        if state.offline {
            return Err(RemoteError::Unavailable("backend offline".into()));
        }
        if state.reject_posts {
            return Err(RemoteError::Status(503));
        }
        let body = state
            .checklists
            .get_mut(checklist_id)
            .ok_or(RemoteError::Status(404))?;
        for answer in &patch.answers {
            embed_answer(body, answer);
        }
        state.posts.push((checklist_id.clone(), patch.clone()));
        Ok(())
    }
}

fn parameters_mut(body: &mut Value) -> Vec<&mut Value> {
    let mut out = Vec::new();
    let Some(zones) = body.get_mut("zones").and_then(Value::as_array_mut) else {
        return out;
    };
    for zone in zones.iter_mut().filter_map(Value::as_object_mut) {
        for (key, list) in zone.iter_mut() {
            if key != "param" && key != "control_points" {
                continue;
            }
            if let Some(list) = list.as_array_mut() {
                out.extend(list.iter_mut());
            }
        }
    }
    out
}

fn entries_mut<'a>(parameter: &'a mut Value, key: &str) -> impl Iterator<Item = &'a mut Value> {
    parameter
        .get_mut(key)
        .and_then(Value::as_array_mut)
        .into_iter()
        .flatten()
}

fn text_of(answer: &Answer) -> Option<String> {
    match answer.value.as_ref()? {
        AnswerValue::Text(text) => Some(text.clone()),
        AnswerValue::Flag(flag) => Some(flag.to_string()),
        AnswerValue::Stock(_) => None,
    }
}

fn embed_answer(body: &mut Value, answer: &Answer) {
    let name = answer.field_name();
    for parameter in parameters_mut(body) {
        for field in entries_mut(parameter, "fields") {
            if field.get("name").map(scalar_to_string).as_deref() != Some(name) {
                continue;
            }
            if let Some(options) = field.get_mut("options").and_then(Value::as_array_mut) {
                let picked = text_of(answer);
                for option in options {
                    let value = option.get("value").map(scalar_to_string);
                    option["selected"] = Value::Bool(value.is_some() && value == picked);
                }
            } else if let Some(checked) = answer.checked {
                field["checked"] = Value::Bool(checked);
            } else if let Some(text) = text_of(answer) {
                field["value"] = Value::String(text);
            }
        }
        for pest in entries_mut(parameter, "pests") {
            if pest.get("name").map(scalar_to_string).as_deref() == Some(name) {
                if let Some(text) = text_of(answer) {
                    pest["value"] = Value::String(text);
                }
            }
        }
        let Some(AnswerValue::Stock(stock)) = answer.value.as_ref() else {
            continue;
        };
        for item in entries_mut(parameter, "tmc") {
            if let Some(subs) = item.get_mut("fields").and_then(Value::as_array_mut) {
                for sub in subs {
                    let sub_name = sub.get("name").map(scalar_to_string).unwrap_or_default();
                    let Some(suffix) = sub_name.strip_prefix(name).and_then(|s| s.strip_prefix('_')) else {
                        continue;
                    };
                    let value = match suffix {
                        "n" => &stock.n,
                        "u" => &stock.u,
                        "v" => &stock.v,
                        _ => continue,
                    };
                    sub["value"] = Value::String(value.clone());
                }
            } else if item.get("name").map(scalar_to_string).as_deref() == Some(name) {
                item["n"] = Value::String(stock.n.clone());
                item["u"] = Value::String(stock.u.clone());
                item["v"] = Value::String(stock.v.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn embedded_answers_show_up_in_the_next_fetch() {
        let mut body = json!({
            "zones": [{"param": [{
                "fields": [
                    {"type": "radio", "name": "access", "options": [
                        {"text": "Да", "value": 1}, {"text": "Нет", "value": 0}
                    ]},
                    {"type": "text", "name": "note", "value": ""}
                ],
                "tmc": [{"label": "Приманка", "fields": [
                    {"name": "tmc_5_p", "value": 4}, {"name": "tmc_5_n", "value": 4}
                ]}]
            }]}]
        });
        embed_answer(&mut body, &Answer::value("access", AnswerValue::Text("0".into())));
        embed_answer(&mut body, &Answer::value("note", AnswerValue::Text("чисто".into())));
        embed_answer(
            &mut body,
            &Answer::value(
                "tmc_5",
                AnswerValue::Stock(checklist_core::field::TmcValues {
                    p: "4".into(),
                    n: "3".into(),
                    u: "0".into(),
                    v: "0".into(),
                }),
            ),
        );
        let parameter = &body["zones"][0]["param"][0];
        assert_eq!(parameter["fields"][0]["options"][1]["selected"], json!(true));
        assert_eq!(parameter["fields"][0]["options"][0]["selected"], json!(false));
        assert_eq!(parameter["fields"][1]["value"], json!("чисто"));
        assert_eq!(parameter["tmc"][0]["fields"][1]["value"], json!("3"));
        assert_eq!(parameter["tmc"][0]["fields"][0]["value"], json!(4));
    }
}

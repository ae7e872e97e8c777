//! A small pest-control visit: one general zone and one site zone.

use serde_json::{Value, json};

pub const CHECKLIST_ID: &str = "77";

/// Zone 0 "Кухня" (parameters):
/// - 0 `101` entrance: gate radio, text, photos, select, checkbox
/// - 1 `102` storage: one stock row, `p = 10`
/// - 2 `103` basement: stock tracking with no rows yet
///
/// Zone 1 "Периметр" (control points):
/// - 0 `201`: a pest count and a checkbox
/// - 1 `202`: a text note
pub fn visit_checklist() -> Value {
    json!({
        "id": 77,
        "type": "general",
        "name": "Плановая обработка",
        "zones": [
            {
                "id": 1,
                "name": "Кухня",
                "param": [
                    {
                        "id": 101,
                        "name": "Вход",
                        "badge": "#ffcc00",
                        "fields": [
                            {"type": "radio", "name": "access", "label": "Доступ есть?", "options": [
                                {"text": "Да", "value": 1, "color": "#fff", "bgcolor": "#2e7d32"},
                                {"text": "Нет", "value": 0, "color": "#fff", "bgcolor": "#c62828"}
                            ]},
                            {"type": "text", "name": "note", "label": "Комментарий", "value": ""},
                            {"type": "foto", "name": "photos", "label": "Фото", "value": []},
                            {"type": "select", "name": "infestation", "label": "Степень заселённости", "options": [
                                {"text": "Нет", "value": "none"},
                                {"text": "Слабая", "value": "low"},
                                {"text": "Сильная", "value": "high"}
                            ]},
                            {"type": "checkbox", "name": "bait_replaced", "label": "Приманка заменена", "checked": 0},
                            {"type": "signature", "name": "client_sign", "label": "Подпись"}
                        ]
                    },
                    {
                        "id": 102,
                        "name": "Склад",
                        "tmc_used": true,
                        "fields": [],
                        "tmc": [{
                            "label": "Родентицид Шторм",
                            "fields": [
                                {"name": "tmc_12_p", "value": 10},
                                {"name": "tmc_12_n", "value": 10},
                                {"name": "tmc_12_u", "value": 0},
                                {"name": "tmc_12_v", "value": 0}
                            ]
                        }]
                    },
                    {
                        "id": 103,
                        "name": "Подвал",
                        "tmc_used": 1,
                        "tmc": null,
                        "fields": [
                            {"type": "text", "name": "remark", "label": "Замечания", "value": "всё в порядке"}
                        ]
                    }
                ]
            },
            {
                "id": 2,
                "name": "Периметр",
                "control_points": [
                    {
                        "id": 201,
                        "name": "КТ-1",
                        "pests": [{"name": "rats", "title": "Крысы", "value": ""}],
                        "fields": [
                            {"type": "checkbox", "name": "trap_ok", "label": "Ловушка исправна", "checked": true}
                        ]
                    },
                    {
                        "id": 202,
                        "name": "КТ-2",
                        "fields": [
                            {"type": "text", "name": "cp_note", "label": "Комментарий", "value": ""}
                        ]
                    }
                ]
            }
        ]
    })
}

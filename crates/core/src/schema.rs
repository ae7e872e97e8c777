//! Raw checklist schema as served by `GET checklist/{id}`.
//!
//! Field schemas stay as raw JSON here; turning them into view-models is the
//! engine's job. Every array is decoded leniently: a missing, `null` or
//! malformed array is an empty one.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::*;
use crate::lenient::{flag, lenient_vec, optional_string, raw_array, string_or_number};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Checklist {
    pub id: ChecklistId,
    #[serde(rename = "type", deserialize_with = "string_or_number")]
    pub kind: String,
    #[serde(deserialize_with = "string_or_number")]
    pub name: String,
    #[serde(deserialize_with = "lenient_vec")]
    pub zones: Vec<Zone>,
}

impl Checklist {
    pub fn zone(&self, index: usize) -> Option<&Zone> {
        self.zones.get(index)
    }
}

/// Whether a zone lists general parameters or site-inspection control points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    Param,
    ControlPoint,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Zone {
    pub id: ZoneId,
    #[serde(deserialize_with = "string_or_number")]
    pub name: String,
    #[serde(deserialize_with = "lenient_vec", skip_serializing_if = "Vec::is_empty")]
    pub param: Vec<Parameter>,
    #[serde(deserialize_with = "lenient_vec", skip_serializing_if = "Vec::is_empty")]
    pub control_points: Vec<Parameter>,
}

impl Zone {
    pub fn kind(&self) -> ParameterKind {
        if self.param.is_empty() && !self.control_points.is_empty() {
            ParameterKind::ControlPoint
        } else {
            ParameterKind::Param
        }
    }

    pub fn parameters(&self) -> &[Parameter] {
        match self.kind() {
            ParameterKind::Param => &self.param,
            ParameterKind::ControlPoint => &self.control_points,
        }
    }

    pub fn parameter(&self, index: usize) -> Option<&Parameter> {
        self.parameters().get(index)
    }

    pub fn position_of(&self, parameter_id: &ParameterId) -> Option<usize> {
        self.parameters().iter().position(|p| &p.id == parameter_id)
    }
}

/// A parameter or control point: one page of fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameter {
    pub id: ParameterId,
    #[serde(deserialize_with = "string_or_number")]
    pub name: String,
    #[serde(alias = "badge", deserialize_with = "optional_string")]
    pub color: Option<String>,
    #[serde(deserialize_with = "raw_array")]
    pub fields: Vec<Value>,
    #[serde(deserialize_with = "raw_array")]
    pub tmc: Vec<Value>,
    #[serde(deserialize_with = "raw_array")]
    pub pests: Vec<Value>,
    #[serde(deserialize_with = "flag")]
    pub tmc_used: bool,
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Energy,
    Gradient,
    Coupling,
}

/// A single calculation at one geometry.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct JobRequest {
    pub job: JobKind,
    // flattened cartesian coordinates
    pub geometry: Vec<f64>,
    pub units: String,
    pub atoms: Vec<String>,
    pub options: BTreeMap<String, serde_json::Value>,
}

/// Messages of the client, one JSON object per line.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Status,
    Job(JobRequest),
}

/// The energy of the target state or the energies of all computed states.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum Energy {
    Single(f64),
    States(Vec<f64>),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct JobResult {
    pub energy: Energy,
    // one row per atom, in atomic units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradient: Option<Vec<Vec<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nacme: Option<Vec<Vec<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orbfile: Option<String>,
}

/// Replies of the server, one JSON object per line.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Status { available: bool },
    Result(JobResult),
    Error { message: String },
}

// Nano PoW Server - Free and Open Source Software Statement
//
// This project, nano-pow-server, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/server/protocol.rs
// Version: 1.2.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file defines the JSON protocol of the work server, located in the
// server module. It holds the client-facing error messages, the response
// bodies for each action and the HTTP framing every response is sent with.
//
// Tree Location:
// - src/server/protocol.rs (wire types)
// - Depends on: serde, serde_json, thiserror

use crate::core::FRONTIER_SENTINEL;
use crate::miner::{StatsSnapshot, WorkError};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub const ACTION_WORK_GENERATE: &str = "work_generate";
pub const ACTION_WORK_VALIDATE: &str = "work_validate";
pub const ACTION_WORK_CANCEL: &str = "work_cancel";
pub const ACTION_STATUS: &str = "status";

/// Request failures reported to the client; Display is the exact error text
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Malformed HTTP request")]
    Malformed,

    #[error("Invalid JSON body")]
    InvalidJson,

    #[error("Missing hash")]
    MissingHash,

    #[error("Invalid frontier hash. Provide a 64-hex block hash.")]
    FrontierHash,

    #[error("Invalid hash format. Expected 64-hex string.")]
    InvalidHash,

    #[error("Missing work")]
    MissingWork,

    #[error("Invalid work format. Expected 16-hex string.")]
    InvalidWork,

    #[error("Invalid difficulty format. Expected 16-hex string.")]
    InvalidDifficulty,

    #[error("Unsupported action")]
    UnsupportedAction,

    #[error("Failed to generate work")]
    GenerationFailed,

    #[error("Work request limit exceeded")]
    LimitExceeded,

    #[error("Request too large")]
    TooLarge,

    #[error("Hash not found in work queue")]
    HashNotFound,

    #[error("Work request cancelled")]
    Cancelled,
}

impl ProtocolError {
    /// Classify a rejected hash string
    pub fn for_hash(hash: &str) -> Self {
        if hash == FRONTIER_SENTINEL {
            ProtocolError::FrontierHash
        } else {
            ProtocolError::InvalidHash
        }
    }
}

impl From<WorkError> for ProtocolError {
    fn from(e: WorkError) -> Self {
        match e {
            WorkError::LimitExceeded => ProtocolError::LimitExceeded,
            WorkError::Cancelled => ProtocolError::Cancelled,
            WorkError::NotFound | WorkError::Verification(_) | WorkError::Task(_) => ProtocolError::GenerationFailed,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WorkResponse {
    pub work: String,
    pub difficulty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ValidateResponse {
    /// "1" or "0"
    pub valid: &'static str,
    pub difficulty: String,
    pub multiplier: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CancelResponse {
    /// Always "cancelled"
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusResponse {
    pub backend: String,
    pub threshold: String,
    #[serde(flatten)]
    pub counters: StatsSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl ErrorResponse {
    pub fn new(error: ProtocolError, id: Option<Value>) -> Self {
        Self {
            error: error.to_string(),
            id,
        }
    }
}

/// Serialize a response body, never failing
pub fn to_json<T: Serialize>(response: &T) -> String {
    serde_json::to_string(response).unwrap_or_else(|_| r#"{"error":"serialization"}"#.to_string())
}

pub fn error_body(error: ProtocolError, id: Option<Value>) -> String {
    to_json(&ErrorResponse::new(error, id))
}

/// Frame a JSON body as a complete HTTP response; the connection closes afterwards
pub fn http_response(body: &str) -> Vec<u8> {
    let mut response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    response.extend_from_slice(body.as_bytes());
    response
}


// Changelog:
// - v1.2.0 (2025-07-15): Added work_cancel and its errors.
// - v1.1.0 (2025-07-08): Added work_validate and status responses, id echo.
// - v1.0.0 (2025-07-02): Initial work_generate protocol.

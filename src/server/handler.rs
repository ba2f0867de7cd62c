// Nano PoW Server - Free and Open Source Software Statement
//
// This project, nano-pow-server, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/server/handler.rs
// Version: 1.2.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file contains the action dispatcher, located in the server module. It
// decodes the JSON body of a reconstructed request, validates its fields, runs
// the requested action and renders the JSON reply.
//
// Tree Location:
// - src/server/handler.rs (action dispatch)
// - Depends on: miner::engine, server::jobs, server::protocol, serde_json, tokio (Semaphore)

use crate::core::difficulty::{from_multiplier, to_multiplier};
use crate::core::{BlockHash, format_difficulty, parse_difficulty, work_value};
use crate::miner::{ComputeDevice, WorkError, WorkSearchEngine};
use crate::server::jobs::JobRegistry;
use crate::server::protocol::{
    ACTION_STATUS, ACTION_WORK_CANCEL, ACTION_WORK_GENERATE, ACTION_WORK_VALIDATE, CancelResponse, ErrorResponse,
    ProtocolError, StatusResponse, ValidateResponse, WorkResponse, to_json,
};
use crate::server::request::RawRequest;
use log::{debug, error, info, warn};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

const LOG_TARGET: &str = "nano_pow::handler";

type Fields = Map<String, Value>;

pub struct RequestHandler<D: ComputeDevice> {
    engine: Arc<WorkSearchEngine<D>>,
    limiter: Arc<Semaphore>,
    jobs: JobRegistry,
}

impl<D: ComputeDevice + 'static> RequestHandler<D> {
    /// `request_limit` bounds concurrent work_generate jobs
    pub fn new(engine: Arc<WorkSearchEngine<D>>, request_limit: usize) -> Self {
        Self {
            engine,
            limiter: Arc::new(Semaphore::new(request_limit.max(1))),
            jobs: JobRegistry::new(),
        }
    }

    pub fn engine(&self) -> &Arc<WorkSearchEngine<D>> {
        &self.engine
    }

    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }

    /// Produce the JSON reply for a reconstructed request
    pub async fn handle(&self, request: &RawRequest) -> String {
        self.engine.stats().record_request();
        match request.body() {
            Ok(body) => self.handle_body(body).await,
            Err(e) => {
                debug!(target: LOG_TARGET, "Rejecting {} byte request: {}", request.len(), e);
                to_json(&ErrorResponse::new(e, None))
            }
        }
    }

    /// Produce the JSON reply for a request body
    pub async fn handle_body(&self, body: &[u8]) -> String {
        let fields = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(fields)) => fields,
            _ => return to_json(&ErrorResponse::new(ProtocolError::InvalidJson, None)),
        };
        let id = fields.get("id").cloned();

        let reply = match fields.get("action").and_then(Value::as_str) {
            Some(ACTION_WORK_GENERATE) => self.work_generate(&fields, id.clone()).await,
            Some(ACTION_WORK_VALIDATE) => self.work_validate(&fields, id.clone()),
            Some(ACTION_WORK_CANCEL) => self.work_cancel(&fields, id.clone()),
            Some(ACTION_STATUS) => Ok(self.status(id.clone())),
            Some(other) => {
                debug!(target: LOG_TARGET, "Unsupported action '{}'", other);
                Err(ProtocolError::UnsupportedAction)
            }
            None => Err(ProtocolError::InvalidJson),
        };

        match reply {
            Ok(json) => json,
            Err(e) => {
                info!(target: LOG_TARGET, "Request rejected: {}", e);
                to_json(&ErrorResponse::new(e, id))
            }
        }
    }

    async fn work_generate(&self, fields: &Fields, id: Option<Value>) -> Result<String, ProtocolError> {
        let block_hash = required_hash(fields)?;
        let threshold = request_threshold(fields, self.engine.threshold())?;

        let _permit = Arc::clone(&self.limiter).try_acquire_owned().map_err(|_| {
            warn!(target: LOG_TARGET, "Work request limit reached, rejecting {}", block_hash);
            ProtocolError::from(WorkError::LimitExceeded)
        })?;

        let stats = self.engine.stats();
        let _job = stats.begin_job();
        let job = self.jobs.register(block_hash);
        let started = Instant::now();

        match self.engine.generate_work_with(block_hash, threshold, job.cancel_flag()).await {
            Ok(nonce) => {
                stats.record_work(started.elapsed());
                Ok(to_json(&WorkResponse {
                    work: format_difficulty(nonce),
                    difficulty: format_difficulty(threshold),
                    id,
                }))
            }
            Err(WorkError::Cancelled) => {
                info!(target: LOG_TARGET, "Work generation for {} cancelled", block_hash);
                Err(ProtocolError::Cancelled)
            }
            Err(e) => {
                stats.record_failure();
                error!(target: LOG_TARGET, "Work generation for {} failed: {}", block_hash, e);
                Err(e.into())
            }
        }
    }

    fn work_validate(&self, fields: &Fields, id: Option<Value>) -> Result<String, ProtocolError> {
        let block_hash = required_hash(fields)?;
        let work = match fields.get("work").and_then(Value::as_str) {
            Some(work) => parse_work(work)?,
            None => return Err(ProtocolError::MissingWork),
        };

        let base = self.engine.threshold();
        let threshold = request_threshold(fields, base)?;

        let value = work_value(work, &block_hash);
        let valid = value >= threshold;
        debug!(target: LOG_TARGET,
            "Validated work {} for {}: value {} vs {} -> {}",
            format_difficulty(work),
            block_hash,
            format_difficulty(value),
            format_difficulty(threshold),
            valid
        );

        Ok(to_json(&ValidateResponse {
            valid: if valid { "1" } else { "0" },
            difficulty: format_difficulty(value),
            multiplier: to_multiplier(value, base),
            id,
        }))
    }

    fn work_cancel(&self, fields: &Fields, id: Option<Value>) -> Result<String, ProtocolError> {
        let block_hash = required_hash(fields)?;
        if !self.jobs.cancel(&block_hash) {
            return Err(ProtocolError::HashNotFound);
        }
        info!(target: LOG_TARGET, "Cancelling work for {}", block_hash);
        Ok(to_json(&CancelResponse { status: "cancelled", id }))
    }

    fn status(&self, id: Option<Value>) -> String {
        to_json(&StatusResponse {
            backend: self.engine.backend_label(),
            threshold: format_difficulty(self.engine.threshold()),
            counters: self.engine.stats().snapshot(),
            id,
        })
    }
}

/// The `hash` field as a block hash, rejecting the frontier placeholder
fn required_hash(fields: &Fields) -> Result<BlockHash, ProtocolError> {
    let hash = fields
        .get("hash")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingHash)?;
    hash.parse().map_err(|_| ProtocolError::for_hash(hash))
}

/// Threshold for this request: `difficulty` replaces the base, and a positive
/// `multiplier` scales the base and wins over both
fn request_threshold(fields: &Fields, base: u64) -> Result<u64, ProtocolError> {
    let mut threshold = match fields.get("difficulty").and_then(Value::as_str) {
        Some(hex) => parse_difficulty(hex).map_err(|_| ProtocolError::InvalidDifficulty)?,
        None => base,
    };
    if let Some(multiplier) = fields.get("multiplier").and_then(Value::as_f64) {
        if multiplier > 0.0 {
            threshold = from_multiplier(multiplier, base);
        }
    }
    Ok(threshold)
}

/// Exactly 16 hex digits
fn parse_work(work: &str) -> Result<u64, ProtocolError> {
    if work.len() != 16 || !work.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ProtocolError::InvalidWork);
    }
    u64::from_str_radix(work, 16).map_err(|_| ProtocolError::InvalidWork)
}


// Changelog:
// - v1.2.0 (2025-07-15): Per-request difficulty and multiplier on work_generate.
//   - Added work_cancel backed by the in-flight job registry.
// - v1.1.0 (2025-07-08): Added work_validate, status, id echo and the request limit.
// - v1.0.0 (2025-07-02): Initial work_generate handling.

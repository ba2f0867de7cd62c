// Nano PoW Server - Free and Open Source Software Statement
//
// This project, nano-pow-server, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/server/mod.rs
// Version: 1.1.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file is the module declaration for the request server, located in the
// server subdirectory.
//
// Tree Location:
// - src/server/mod.rs (server module entry point)
// - Submodules: handler, jobs, listener, protocol, request

pub mod handler;
pub mod jobs;
pub mod listener;
pub mod protocol;
pub mod request;

pub use handler::RequestHandler;
pub use jobs::{JobHandle, JobRegistry};
pub use listener::{WorkServer, read_request, serve_connection};
pub use protocol::ProtocolError;
pub use request::{ParseState, RawRequest, RequestParser};

// Changelog:
// - v1.1.0 (2025-07-15): Added the in-flight job registry.
// - v1.0.0 (2025-07-02): Initial request server module.

// Nano PoW Server - Free and Open Source Software Statement
//
// This project, nano-pow-server, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/server/request.rs
// Version: 1.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file contains the incremental request parser, located in the server
// module. Bytes are pushed in as they arrive from the socket; the parser finds
// the header/body separator, reads Content-Length, and reports completion once
// the declared body is buffered. It has no transport dependency so truncated
// and slow clients can be tested directly.
//
// Tree Location:
// - src/server/request.rs (request reconstruction)
// - Depends on: server::protocol (ProtocolError)

use crate::server::protocol::ProtocolError;

/// Upper bound on buffered request bytes, headers included
pub const MAX_REQUEST_SIZE: usize = 64 * 1024;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// Separator not seen yet
    AwaitingHeaders,
    /// Headers parsed; body incomplete, or unbounded without Content-Length
    AwaitingBody,
    /// Declared body fully buffered
    Complete,
}

#[derive(Debug)]
pub struct RequestParser {
    buffer: Vec<u8>,
    state: ParseState,
    body_start: Option<usize>,
    content_length: Option<usize>,
}

/// Bytes of one request as handed to the protocol layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRequest {
    bytes: Vec<u8>,
    body_start: Option<usize>,
    content_length: Option<usize>,
}

impl RequestParser {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(1024),
            state: ParseState::AwaitingHeaders,
            body_start: None,
            content_length: None,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == ParseState::Complete
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn content_length(&self) -> Option<usize> {
        self.content_length
    }

    /// Append a chunk read from the transport and advance the state machine.
    /// Bytes arriving after completion are ignored.
    pub fn push(&mut self, chunk: &[u8]) -> Result<ParseState, ProtocolError> {
        if self.state == ParseState::Complete {
            return Ok(self.state);
        }
        self.buffer.extend_from_slice(chunk);
        if self.buffer.len() > MAX_REQUEST_SIZE {
            return Err(ProtocolError::TooLarge);
        }
        self.advance()
    }

    fn advance(&mut self) -> Result<ParseState, ProtocolError> {
        if self.state == ParseState::AwaitingHeaders {
            if let Some(pos) = find(&self.buffer, HEADER_TERMINATOR) {
                let body_start = pos + HEADER_TERMINATOR.len();
                let content_length = parse_content_length(&self.buffer[..pos]);
                if let Some(len) = content_length {
                    if body_start.saturating_add(len) > MAX_REQUEST_SIZE {
                        return Err(ProtocolError::TooLarge);
                    }
                }
                self.body_start = Some(body_start);
                self.content_length = content_length;
                self.state = ParseState::AwaitingBody;
            }
        }

        if self.state == ParseState::AwaitingBody {
            if let (Some(start), Some(len)) = (self.body_start, self.content_length) {
                if self.buffer.len() >= start + len {
                    self.state = ParseState::Complete;
                }
            }
        }

        Ok(self.state)
    }

    /// Hand over what was received. Called on completion, end of stream or an
    /// idle timeout; an empty buffer yields None and no response is sent.
    pub fn finish(self) -> Option<RawRequest> {
        if self.buffer.is_empty() {
            return None;
        }
        Some(RawRequest {
            bytes: self.buffer,
            body_start: self.body_start,
            content_length: self.content_length,
        })
    }
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RawRequest {
    /// Body bytes, bounded by Content-Length when it was declared
    pub fn body(&self) -> Result<&[u8], ProtocolError> {
        let start = self.body_start.ok_or(ProtocolError::Malformed)?;
        let end = match self.content_length {
            Some(len) => (start + len).min(self.bytes.len()),
            None => self.bytes.len(),
        };
        Ok(&self.bytes[start..end])
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Content-Length from the header block; a value that does not parse is ignored
fn parse_content_length(headers: &[u8]) -> Option<usize> {
    let text = String::from_utf8_lossy(headers);
    text.split("\r\n").find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}


// Changelog:
// - v1.0.0 (2025-07-02): Initial request reconstruction state machine.

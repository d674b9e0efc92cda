//! HID report encoding for messages to the token, and classification of
//! what comes back.
//!
//! Every outgoing report is exactly [`REPORT_SIZE`] bytes:
//!
//! ```text
//! FF FF FF FF | opcode | slot id | size | chunk (up to 57 bytes, zero padded)
//! ```
//!
//! A payload longer than one chunk is spread over several reports. Every
//! report but the last carries [`CONTINUATION_MARKER`] as its size byte; the
//! last carries the real length of its chunk. A message without payload is a
//! single report with no size byte.

use super::Opcode;

/// Size of one HID report.
pub const REPORT_SIZE: usize = 64;

/// Leading bytes of every outgoing report.
pub const REPORT_HEADER: [u8; 4] = [0xFF; 4];

/// Payload bytes carried per report.
pub const CHUNK_SIZE: usize = REPORT_SIZE - REPORT_HEADER.len() - 3;

/// Size byte for a chunk that is followed by more.
pub const CONTINUATION_MARKER: u8 = 0xFF;

/// Length of a signature returned by the token.
pub const SIGNATURE_LENGTH: usize = 64;

/// One raw HID report.
pub type Report = [u8; REPORT_SIZE];

/// Split a message into reports.
pub fn encode_message(opcode: Opcode, slot_id: u8, payload: &[u8]) -> Vec<Report> {
    let prefix = |report: &mut Report| {
        report[..4].copy_from_slice(&REPORT_HEADER);
        report[4] = opcode.as_byte();
        report[5] = slot_id;
    };

    if payload.is_empty() {
        let mut report = [0u8; REPORT_SIZE];
        prefix(&mut report);
        return vec![report];
    }

    let count = payload.len().div_ceil(CHUNK_SIZE);
    payload
        .chunks(CHUNK_SIZE)
        .enumerate()
        .map(|(i, chunk)| {
            let mut report = [0u8; REPORT_SIZE];
            prefix(&mut report);
            report[6] = if i + 1 < count {
                CONTINUATION_MARKER
            } else {
                // chunk.len() <= CHUNK_SIZE < 255
                chunk.len() as u8
            };
            report[7..7 + chunk.len()].copy_from_slice(chunk);
            report
        })
        .collect()
}

/// A message rebuilt from its reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    /// Message type.
    pub opcode: Opcode,
    /// Target slot id.
    pub slot_id: u8,
    /// Reassembled payload.
    pub payload: Vec<u8>,
}

/// Reassemble reports produced by [`encode_message`].
///
/// Returns `None` for anything [`encode_message`] could not have produced:
/// a bad header, an unknown opcode, opcode or slot changing mid-message, a
/// continuation marker on the last report or a final size byte on an
/// earlier one.
pub fn decode_message(reports: &[Report]) -> Option<DecodedMessage> {
    let first = reports.first()?;
    let opcode = Opcode::from_byte(first[4])?;
    let slot_id = first[5];

    let mut payload = Vec::new();
    for (i, report) in reports.iter().enumerate() {
        if report[..4] != REPORT_HEADER || report[4] != first[4] || report[5] != slot_id {
            return None;
        }
        let last = i + 1 == reports.len();
        let size = report[6];

        match (size, last) {
            (CONTINUATION_MARKER, false) => payload.extend_from_slice(&report[7..]),
            (CONTINUATION_MARKER, true) => return None,
            // A lone report with size 0 is a message without payload.
            (0, true) if reports.len() == 1 => {}
            (n, true) if usize::from(n) <= CHUNK_SIZE => {
                payload.extend_from_slice(&report[7..7 + usize::from(n)])
            }
            _ => return None,
        }
    }

    Some(DecodedMessage {
        opcode,
        slot_id,
        payload,
    })
}

/// How the token answered a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// A complete signature.
    Signature([u8; SIGNATURE_LENGTH]),
    /// The token reported a failure.
    DeviceError(String),
    /// Nothing useful yet: empty, short, or an informational message.
    Pending,
}

/// Interpret `bytes` as device text: printable ASCII followed only by NUL
/// padding. Returns the text without padding.
pub fn device_text(bytes: &[u8]) -> Option<&str> {
    let end = bytes
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |last| last + 1);
    let text = &bytes[..end];

    if text.is_empty() || !text.iter().all(|&b| (0x20..=0x7E).contains(&b)) {
        return None;
    }
    std::str::from_utf8(text).ok()
}

/// Classify one poll response.
pub fn classify(bytes: &[u8]) -> Response {
    if let Some(text) = device_text(bytes) {
        if text.starts_with("Error") {
            return Response::DeviceError(text.to_string());
        }
        return Response::Pending;
    }

    match <[u8; SIGNATURE_LENGTH]>::try_from(bytes) {
        Ok(signature) if bytes.iter().any(|&b| b != 0) => Response::Signature(signature),
        _ => Response::Pending,
    }
}

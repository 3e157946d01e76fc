// SPDX-License-Identifier: Apache-2.0

//! Shared utilities for decoding escape sequences into UTF-8.
//!
//! All three grammars and the UTF-16 transcoder funnel code units through
//! the same surrogate handling: a high half followed by a low half becomes
//! one 4-byte sequence, and any half without its partner becomes `?`.

/// Replacement emitted for an unmatched surrogate half.
pub const REPLACEMENT: u8 = b'?';

pub struct EscapeProcessor;

impl EscapeProcessor {
    /// Byte produced by a single-letter escape code, for codes every
    /// grammar shares (`b f t r n`).
    pub fn process_simple_escape(code: u8) -> Option<u8> {
        match code {
            b'b' => Some(0x08),
            b'f' => Some(0x0C),
            b't' => Some(b'\t'),
            b'r' => Some(b'\r'),
            b'n' => Some(b'\n'),
            _ => None,
        }
    }

    /// The numeric value (0-15) of a hex digit.
    pub fn validate_hex_digit(byte: u8) -> Option<u32> {
        match byte {
            b'0'..=b'9' => Some((byte - b'0') as u32),
            b'a'..=b'f' => Some((byte - b'a') as u32 + 10),
            b'A'..=b'F' => Some((byte - b'A') as u32 + 10),
            _ => None,
        }
    }

    /// Parses exactly four hex digits.
    pub fn parse_hex4(digits: &[u8; 4]) -> Option<u16> {
        let mut unit = 0u32;
        for &byte in digits {
            unit = (unit << 4) | Self::validate_hex_digit(byte)?;
        }
        Some(unit as u16)
    }

    /// Check if a code unit is a high surrogate (0xD800-0xDBFF)
    pub fn is_high_surrogate(unit: u32) -> bool {
        (0xD800..=0xDBFF).contains(&unit)
    }

    /// Check if a code unit is a low surrogate (0xDC00-0xDFFF)
    pub fn is_low_surrogate(unit: u32) -> bool {
        (0xDC00..=0xDFFF).contains(&unit)
    }

    /// Combine a high and low surrogate pair into a single code point.
    /// Callers must have checked both halves.
    pub fn combine_surrogate_pair(high: u32, low: u32) -> u32 {
        0x10000 + ((high & 0x3FF) << 10) + (low & 0x3FF)
    }

    /// UTF-8 encoding of `code_point`; surrogate code points become `?`.
    /// Returns `None` beyond U+10FFFF.
    pub fn encode_code_point(code_point: u32, buffer: &mut [u8; 4]) -> Option<&[u8]> {
        if code_point > 0x10FFFF {
            return None;
        }
        match char::from_u32(code_point) {
            Some(ch) => Some(ch.encode_utf8(buffer).as_bytes()),
            None => {
                buffer[0] = REPLACEMENT;
                Some(&buffer[..1])
            }
        }
    }
}

/// Joins UTF-16 code units into UTF-8, carrying a high surrogate across
/// calls until its low half (or something else) arrives.
#[derive(Debug, Default)]
pub struct UnicodeEscapeCollector {
    pending_high_surrogate: Option<u16>,
}

impl UnicodeEscapeCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one code unit, passing any completed UTF-8 to `emit`.
    pub fn push_unit(&mut self, unit: u16, mut emit: impl FnMut(&[u8])) {
        let mut buffer = [0u8; 4];
        let value = unit as u32;
        if let Some(high) = self.pending_high_surrogate.take() {
            if EscapeProcessor::is_low_surrogate(value) {
                let combined = EscapeProcessor::combine_surrogate_pair(high as u32, value);
                if let Some(bytes) = EscapeProcessor::encode_code_point(combined, &mut buffer) {
                    emit(bytes);
                }
                return;
            }
            emit(&[REPLACEMENT]);
        }
        if EscapeProcessor::is_high_surrogate(value) {
            self.pending_high_surrogate = Some(unit);
        } else if let Some(bytes) = EscapeProcessor::encode_code_point(value, &mut buffer) {
            // A lone low half encodes as `?` here
            emit(bytes);
        }
    }

    /// Emits `?` for a dangling high surrogate.
    pub fn flush(&mut self, mut emit: impl FnMut(&[u8])) {
        if self.pending_high_surrogate.take().is_some() {
            emit(&[REPLACEMENT]);
        }
    }

    /// Check if there's a pending high surrogate waiting for a low surrogate
    pub fn has_pending_high_surrogate(&self) -> bool {
        self.pending_high_surrogate.is_some()
    }

    pub fn reset(&mut self) {
        self.pending_high_surrogate = None;
    }
}

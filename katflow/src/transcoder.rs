// SPDX-License-Identifier: Apache-2.0

//! On-the-fly UTF-8 transcoding of character inputs.
//!
//! Character data is staged as UTF-16 code units in a small fixed buffer
//! that is reused across refills, then encoded into the source window.
//! Surrogate pairs are joined even when they straddle two refills; a half
//! without its partner becomes `?`.

use std::io;

use crate::escape_processor::UnicodeEscapeCollector;
use crate::reader::Reader;

/// Code units staged per refill.
const STAGING: usize = 256;

/// Longest output of one code unit: `?` for a dropped high half plus a
/// three-byte BMP character, or one four-byte pair.
const MAX_UNIT_OUTPUT: usize = 4;

/// Encodings accepted by [`Source::from_read_with_charset`](crate::Source::from_read_with_charset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    Ascii,
    Latin1,
    Utf16Le,
    Utf16Be,
}

impl Charset {
    /// Looks a charset up by one of its common labels, ignoring case.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Some(Charset::Utf8),
            "us-ascii" | "ascii" => Some(Charset::Ascii),
            "iso-8859-1" | "latin1" | "latin-1" => Some(Charset::Latin1),
            "utf-16le" | "utf16le" => Some(Charset::Utf16Le),
            "utf-16be" | "utf16be" | "utf-16" => Some(Charset::Utf16Be),
            _ => None,
        }
    }

    /// Whether bytes in this charset are already valid decoder input.
    pub fn is_raw(self) -> bool {
        matches!(self, Charset::Utf8 | Charset::Ascii)
    }
}

/// A supplier of UTF-16 code units.
pub trait Units {
    /// Fills `staging` with code units, returning how many were written.
    /// 0 means no more units.
    fn fill(&mut self, staging: &mut [u16]) -> io::Result<usize>;
}

/// A [`Reader`] producing UTF-8 from a [`Units`] supplier.
#[derive(Debug)]
pub struct Transcoder<U> {
    units: U,
    staging: [u16; STAGING],
    start: usize,
    end: usize,
    collector: UnicodeEscapeCollector,
    exhausted: bool,
}

impl<U: Units> Transcoder<U> {
    pub fn new(units: U) -> Self {
        Self {
            units,
            staging: [0; STAGING],
            start: 0,
            end: 0,
            collector: UnicodeEscapeCollector::new(),
            exhausted: false,
        }
    }
}

impl<U: Units> Reader for Transcoder<U> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut written = 0;
        while buf.len() - written >= MAX_UNIT_OUTPUT {
            if self.start == self.end {
                if self.exhausted {
                    break;
                }
                let filled = self.units.fill(&mut self.staging)?;
                if filled == 0 {
                    self.exhausted = true;
                    self.collector.flush(|bytes| {
                        buf[written..written + bytes.len()].copy_from_slice(bytes);
                        written += bytes.len();
                    });
                    break;
                }
                self.start = 0;
                self.end = filled.min(STAGING);
            }
            let unit = self.staging[self.start];
            self.start += 1;
            self.collector.push_unit(unit, |bytes| {
                buf[written..written + bytes.len()].copy_from_slice(bytes);
                written += bytes.len();
            });
        }
        Ok(written)
    }
}

/// UTF-16 code units from a slice.
#[derive(Debug)]
pub struct Utf16Units<'a> {
    units: &'a [u16],
}

impl<'a> Utf16Units<'a> {
    pub fn new(units: &'a [u16]) -> Self {
        Self { units }
    }
}

impl Units for Utf16Units<'_> {
    fn fill(&mut self, staging: &mut [u16]) -> io::Result<usize> {
        let count = self.units.len().min(staging.len());
        let (head, tail) = self.units.split_at(count);
        staging[..count].copy_from_slice(head);
        self.units = tail;
        Ok(count)
    }
}

/// Code units of a `char` slice. A character needing a surrogate pair
/// may be split across two fills.
#[derive(Debug)]
pub struct CharUnits<'a> {
    chars: core::slice::Iter<'a, char>,
    carry: Option<u16>,
}

impl<'a> CharUnits<'a> {
    pub fn new(chars: &'a [char]) -> Self {
        Self {
            chars: chars.iter(),
            carry: None,
        }
    }
}

impl Units for CharUnits<'_> {
    fn fill(&mut self, staging: &mut [u16]) -> io::Result<usize> {
        let mut count = 0;
        if let Some(low) = self.carry.take() {
            staging[0] = low;
            count = 1;
        }
        while count < staging.len() {
            let Some(ch) = self.chars.next() else { break };
            let mut pair = [0u16; 2];
            match ch.encode_utf16(&mut pair) {
                [unit] => {
                    staging[count] = *unit;
                    count += 1;
                }
                [high, low] => {
                    staging[count] = *high;
                    count += 1;
                    if count < staging.len() {
                        staging[count] = *low;
                        count += 1;
                    } else {
                        self.carry = Some(*low);
                    }
                }
                _ => {}
            }
        }
        Ok(count)
    }
}

/// ISO-8859-1 byte stream; every byte is its own code point.
#[derive(Debug)]
pub struct Latin1Units<R> {
    inner: R,
    bytes: [u8; STAGING],
}

impl<R: io::Read> Latin1Units<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            bytes: [0; STAGING],
        }
    }
}

impl<R: io::Read> Units for Latin1Units<R> {
    fn fill(&mut self, staging: &mut [u16]) -> io::Result<usize> {
        let want = staging.len().min(self.bytes.len());
        let count = self.inner.read(&mut self.bytes[..want])?;
        for (unit, &byte) in staging.iter_mut().zip(&self.bytes[..count]) {
            *unit = byte as u16;
        }
        Ok(count)
    }
}

/// UTF-16 byte stream in either byte order. A trailing odd byte becomes `?`.
#[derive(Debug)]
pub struct Utf16StreamUnits<R> {
    inner: R,
    big_endian: bool,
    bytes: [u8; STAGING * 2],
    odd: Option<u8>,
}

impl<R: io::Read> Utf16StreamUnits<R> {
    pub fn new(inner: R, big_endian: bool) -> Self {
        Self {
            inner,
            big_endian,
            bytes: [0; STAGING * 2],
            odd: None,
        }
    }

    fn unit(&self, pair: [u8; 2]) -> u16 {
        if self.big_endian {
            u16::from_be_bytes(pair)
        } else {
            u16::from_le_bytes(pair)
        }
    }
}

impl<R: io::Read> Units for Utf16StreamUnits<R> {
    fn fill(&mut self, staging: &mut [u16]) -> io::Result<usize> {
        let want = (staging.len() * 2).min(self.bytes.len());
        loop {
            let mut have = 0;
            if let Some(byte) = self.odd.take() {
                self.bytes[0] = byte;
                have = 1;
            }
            let read = self.inner.read(&mut self.bytes[have..want])?;
            if read == 0 {
                // Odd byte at end of stream
                if have == 1 {
                    staging[0] = b'?' as u16;
                    return Ok(1);
                }
                return Ok(0);
            }
            have += read;
            let pairs = have / 2;
            if have % 2 == 1 {
                self.odd = Some(self.bytes[have - 1]);
            }
            if pairs == 0 {
                continue;
            }
            for index in 0..pairs {
                let pair = [self.bytes[index * 2], self.bytes[index * 2 + 1]];
                staging[index] = self.unit(pair);
            }
            return Ok(pairs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain<R: Reader>(mut reader: R, window: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; window];
        loop {
            let n = reader.read(&mut buf).unwrap();
            if n == 0 {
                return out;
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    #[test]
    fn test_chars_to_utf8() {
        let chars: Vec<char> = "name:kraity é € 😀".chars().collect();
        let out = drain(Transcoder::new(CharUnits::new(&chars)), 64);
        assert_eq!(out, "name:kraity é € 😀".as_bytes());
    }

    #[test]
    fn test_pair_split_across_staging_refills() {
        // 255 plain units put the high half last in the first staging fill
        let mut units = vec![b'a' as u16; STAGING - 1];
        units.extend_from_slice(&[0xD83D, 0xDE00]);
        let out = drain(Transcoder::new(Utf16Units::new(&units)), 1024);
        assert_eq!(out.len(), STAGING - 1 + 4);
        assert_eq!(&out[STAGING - 1..], "😀".as_bytes());
    }

    #[test]
    fn test_char_pair_split_across_fills() {
        let mut chars = vec!['a'; STAGING - 1];
        chars.push('😀');
        chars.push('b');
        let out = drain(Transcoder::new(CharUnits::new(&chars)), 16);
        let expected: String = chars.iter().collect();
        assert_eq!(out, expected.as_bytes());
    }

    #[test]
    fn test_unmatched_surrogates_become_question_marks() {
        let units = [0x41, 0xD83D, 0x42, 0xDE00, 0xD83D];
        let out = drain(Transcoder::new(Utf16Units::new(&units)), 8);
        assert_eq!(out, b"A?B??");
    }

    #[test]
    fn test_small_window_never_splits_code_points() {
        let text = "€€€€€€";
        let units: Vec<u16> = text.encode_utf16().collect();
        let mut reader = Transcoder::new(Utf16Units::new(&units));
        let mut buf = [0u8; 5];
        let mut out = Vec::new();
        loop {
            let n = reader.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            assert!(std::str::from_utf8(&buf[..n]).is_ok());
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, text.as_bytes());
    }

    #[test]
    fn test_latin1_stream() {
        let bytes = [b'c', b'a', b'f', 0xE9];
        let out = drain(Transcoder::new(Latin1Units::new(&bytes[..])), 16);
        assert_eq!(out, "café".as_bytes());
    }

    #[test]
    fn test_utf16_streams_both_orders() {
        let text = "k€😀";
        let le: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
        let be: Vec<u8> = text.encode_utf16().flat_map(u16::to_be_bytes).collect();
        assert_eq!(
            drain(Transcoder::new(Utf16StreamUnits::new(&le[..], false)), 16),
            text.as_bytes()
        );
        assert_eq!(
            drain(Transcoder::new(Utf16StreamUnits::new(&be[..], true)), 16),
            text.as_bytes()
        );
    }

    #[test]
    fn test_utf16_stream_odd_tail() {
        let bytes = [0x41, 0x00, 0x42];
        let out = drain(Transcoder::new(Utf16StreamUnits::new(&bytes[..], false)), 16);
        assert_eq!(out, b"A?");
    }

    #[test]
    fn test_charset_labels() {
        assert_eq!(Charset::from_label("UTF-8"), Some(Charset::Utf8));
        assert_eq!(Charset::from_label("ISO-8859-1"), Some(Charset::Latin1));
        assert_eq!(Charset::from_label("utf-16le"), Some(Charset::Utf16Le));
        assert_eq!(Charset::from_label("shift_jis"), None);
        assert!(Charset::Ascii.is_raw());
        assert!(!Charset::Utf16Be.is_raw());
    }
}

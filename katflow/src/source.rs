// SPDX-License-Identifier: Apache-2.0

//! The byte source every decoder reads from.
//!
//! A [`Source`] is a cursor `(index, limit)` over a byte window. In-memory
//! byte and string inputs are read in place; every other input is a
//! [`Reader`] transport that refills a pooled window on demand. Decoders
//! only ever see UTF-8 bytes: character inputs are transcoded while the
//! window is refilled.

use std::io;

use crate::parse_error::ParseError;
use crate::pool::BufferPool;
use crate::reader::{BytesReader, IoReader, Reader};
use crate::transcoder::{
    CharUnits, Charset, Latin1Units, Transcoder, Utf16StreamUnits, Utf16Units,
};

enum Window<'a> {
    Borrowed(&'a [u8]),
    Pooled(Vec<u8>),
}

/// A refillable byte window over one input.
///
/// A source is drained once by one decode and then closed; it is not
/// reusable. Closing (explicitly or on drop) returns a pooled window.
pub struct Source<'a> {
    window: Window<'a>,
    index: usize,
    limit: usize,
    /// Start of the readable range within the current window.
    origin: usize,
    /// Bytes handed out from windows that have been refilled since.
    consumed: u64,
    reader: Option<Box<dyn Reader + 'a>>,
    closed: bool,
}

impl<'a> Source<'a> {
    /// Reads a byte slice in place.
    pub fn from_slice(bytes: &'a [u8]) -> Self {
        Self::borrowed(bytes, 0, bytes.len())
    }

    /// Reads `length` bytes of `bytes` starting at `offset`.
    pub fn from_range(bytes: &'a [u8], offset: usize, length: usize) -> Result<Self, ParseError> {
        match offset.checked_add(length) {
            Some(end) if end <= bytes.len() => Ok(Self::borrowed(bytes, offset, end)),
            _ => Err(ParseError::OutOfBounds {
                offset,
                length,
                size: bytes.len(),
            }),
        }
    }

    /// Reads UTF-8 text in place.
    pub fn from_text(text: &'a str) -> Self {
        Self::from_slice(text.as_bytes())
    }

    /// Reads a byte range of `text`; the range must fall on character
    /// boundaries.
    pub fn from_text_range(text: &'a str, offset: usize, length: usize) -> Result<Self, ParseError> {
        let slice = offset
            .checked_add(length)
            .and_then(|end| text.get(offset..end))
            .ok_or(ParseError::OutOfBounds {
                offset,
                length,
                size: text.len(),
            })?;
        Ok(Self::from_slice(slice.as_bytes()))
    }

    /// Transcodes a character array.
    pub fn from_chars(chars: &'a [char]) -> Self {
        Self::from_reader(Transcoder::new(CharUnits::new(chars)))
    }

    pub fn from_chars_range(chars: &'a [char], offset: usize, length: usize) -> Result<Self, ParseError> {
        let slice = offset
            .checked_add(length)
            .and_then(|end| chars.get(offset..end))
            .ok_or(ParseError::OutOfBounds {
                offset,
                length,
                size: chars.len(),
            })?;
        Ok(Self::from_chars(slice))
    }

    /// Transcodes UTF-16 code units; unmatched surrogate halves become `?`.
    pub fn from_utf16(units: &'a [u16]) -> Self {
        Self::from_reader(Transcoder::new(Utf16Units::new(units)))
    }

    pub fn from_utf16_range(units: &'a [u16], offset: usize, length: usize) -> Result<Self, ParseError> {
        let slice = offset
            .checked_add(length)
            .and_then(|end| units.get(offset..end))
            .ok_or(ParseError::OutOfBounds {
                offset,
                length,
                size: units.len(),
            })?;
        Ok(Self::from_utf16(slice))
    }

    /// Reads a blocking byte stream of UTF-8.
    pub fn from_read<R: io::Read + 'a>(inner: R) -> Self {
        Self::from_reader(IoReader::new(inner))
    }

    /// Reads a blocking byte stream in `charset`. Charsets other than
    /// UTF-8 and ASCII are transcoded.
    pub fn from_read_with_charset<R: io::Read + 'a>(inner: R, charset: Charset) -> Self {
        match charset {
            Charset::Utf8 | Charset::Ascii => Self::from_read(inner),
            Charset::Latin1 => Self::from_reader(Transcoder::new(Latin1Units::new(inner))),
            Charset::Utf16Le => {
                Self::from_reader(Transcoder::new(Utf16StreamUnits::new(inner, false)))
            }
            Charset::Utf16Be => {
                Self::from_reader(Transcoder::new(Utf16StreamUnits::new(inner, true)))
            }
        }
    }

    /// Drains a [`bytes::Buf`].
    pub fn from_buf<B: bytes::Buf + 'a>(buf: B) -> Self {
        Self::from_reader(BytesReader::new(buf))
    }

    /// Reads any transport, through a window from the global pool.
    pub fn from_reader<T: Reader + 'a>(reader: T) -> Self {
        let pool = BufferPool::global();
        Self {
            window: Window::Pooled(pool.acquire(pool.chunk())),
            index: 0,
            limit: 0,
            origin: 0,
            consumed: 0,
            reader: Some(Box::new(reader)),
            closed: false,
        }
    }

    /// Resizes the refill window of a transport-backed source. Has no
    /// effect on in-memory sources or once reading has started.
    pub fn with_window(mut self, size: usize) -> Self {
        if let Window::Pooled(array) = &mut self.window {
            if self.limit == 0 && self.consumed == 0 {
                let pool = BufferPool::global();
                let old = std::mem::replace(array, pool.acquire(size.max(16)));
                pool.release(old);
            }
        }
        self
    }

    fn borrowed(bytes: &'a [u8], start: usize, end: usize) -> Self {
        Self {
            window: Window::Borrowed(bytes),
            index: start,
            limit: end,
            origin: start,
            consumed: 0,
            reader: None,
            closed: false,
        }
    }

    fn buffer(&self) -> &[u8] {
        match &self.window {
            Window::Borrowed(bytes) => bytes,
            Window::Pooled(array) => array,
        }
    }

    /// Makes bytes available, refilling the window only once it has been
    /// drained. Returns the number of readable bytes; 0 means the input is
    /// exhausted, and stays 0 on every later call.
    pub fn load(&mut self) -> Result<usize, ParseError> {
        if self.index < self.limit {
            return Ok(self.limit - self.index);
        }
        if self.closed {
            return Ok(0);
        }
        let (Some(reader), Window::Pooled(array)) = (self.reader.as_mut(), &mut self.window)
        else {
            return Ok(0);
        };
        self.consumed += (self.limit - self.origin) as u64;
        self.origin = 0;
        self.index = 0;
        self.limit = 0;
        loop {
            match reader.read(array) {
                Ok(0) => {
                    log::trace!("source exhausted after {} bytes", self.consumed);
                    self.reader = None;
                    return Ok(0);
                }
                Ok(read) => {
                    self.limit = read.min(array.len());
                    log::trace!("window refilled with {} bytes", self.limit);
                    return Ok(self.limit);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Whether another byte can be read, refilling if necessary.
    pub fn also(&mut self) -> Result<bool, ParseError> {
        Ok(self.index < self.limit || self.load()? > 0)
    }

    /// Alias of [`Source::also`].
    pub fn has_more(&mut self) -> Result<bool, ParseError> {
        self.also()
    }

    /// Unchecked fast path: the caller has already established with
    /// [`Source::also`] that a byte is available. Returns 0 otherwise.
    pub fn read(&mut self) -> u8 {
        if self.index < self.limit {
            let byte = self.buffer()[self.index];
            self.index += 1;
            byte
        } else {
            0
        }
    }

    /// The next byte, refilling transparently.
    pub fn next(&mut self) -> Result<u8, ParseError> {
        if self.also()? {
            Ok(self.read())
        } else {
            Err(ParseError::EndOfData)
        }
    }

    /// The next byte without consuming it.
    pub fn peek(&mut self) -> Result<Option<u8>, ParseError> {
        if self.also()? {
            Ok(Some(self.buffer()[self.index]))
        } else {
            Ok(None)
        }
    }

    /// Discards exactly `n` bytes.
    pub fn skip(&mut self, mut n: usize) -> Result<(), ParseError> {
        while n > 0 {
            if !self.also()? {
                return Err(ParseError::EndOfData);
            }
            let step = n.min(self.limit - self.index);
            self.index += step;
            n -= step;
        }
        Ok(())
    }

    /// The unread part of the current window, without refilling.
    pub fn chunk(&self) -> &[u8] {
        &self.buffer()[self.index..self.limit]
    }

    /// Marks `n` bytes of [`Source::chunk`] as read.
    pub fn consume(&mut self, n: usize) {
        self.index = (self.index + n).min(self.limit);
    }

    /// Absolute offset of the next byte from the start of the input.
    pub fn position(&self) -> u64 {
        self.consumed + (self.index - self.origin) as u64
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Ends the input early: the transport is dropped, the window goes
    /// back to the pool, and every later `load` reports exhaustion.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.reader = None;
        self.consumed += (self.index - self.origin) as u64;
        self.index = 0;
        self.limit = 0;
        self.origin = 0;
        if let Window::Pooled(array) = &mut self.window {
            BufferPool::global().release(std::mem::take(array));
        }
    }
}

impl Drop for Source<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

impl core::fmt::Debug for Source<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Source")
            .field("index", &self.index)
            .field("limit", &self.limit)
            .field("position", &self.position())
            .field("streaming", &self.reader.is_some())
            .field("closed", &self.closed)
            .finish()
    }
}

impl<'a> From<&'a [u8]> for Source<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self::from_slice(bytes)
    }
}

impl<'a> From<&'a str> for Source<'a> {
    fn from(text: &'a str) -> Self {
        Self::from_text(text)
    }
}

// SPDX-License-Identifier: Apache-2.0

//! Byte transports that feed a [`Source`](crate::Source).
//!
//! A transport only has to fill a caller-provided buffer; the source owns
//! the window and the cursor. This module provides the stock transports:
//!
//! - [`ChunkReader`]: an in-memory slice, optionally handed out in bounded
//!   chunks to simulate a slow stream
//! - [`IoReader`]: any blocking [`std::io::Read`]
//! - [`BytesReader`]: a [`bytes::Buf`], such as a `Bytes` or `BytesMut`
//!
//! Character-based inputs go through the [`Transcoder`](crate::Transcoder)
//! instead, which produces UTF-8 on the fly.
//!
//! # Examples
//!
//! ```rust
//! use katflow::{ChunkReader, Source};
//!
//! // Deliver the document three bytes at a time
//! let mut source = Source::from_reader(ChunkReader::new(b"{id:1}", 3));
//! assert_eq!(source.next().unwrap(), b'{');
//! ```

use std::io;

/// Pull interface over an input transport.
pub trait Reader {
    /// Read data into the provided buffer.
    /// Returns the number of bytes read, or an error.
    ///
    /// # Contract
    /// - A return value of 0 **MUST** indicate true end of stream
    /// - Implementations **MUST NOT** return 0 unless no more data will ever be available
    /// - `buf` is never shorter than 4 bytes
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<R: Reader + ?Sized> Reader for &mut R {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }
}

impl<R: Reader + ?Sized> Reader for Box<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }
}

/// A [`Reader`] that reads from a byte slice, optionally in fixed-size chunks.
///
/// [`ChunkReader::full_slice()`] hands out as much as the window can hold;
/// [`ChunkReader::new()`] caps every `read()` at `chunk_size` bytes, which
/// exercises every refill path of the decoders.
#[derive(Debug)]
pub struct ChunkReader<'a> {
    data: &'a [u8],
    pos: usize,
    chunk_size: usize,
}

impl<'a> ChunkReader<'a> {
    /// Each call to `read()` will return at most `chunk_size` bytes
    /// (minimum 1).
    pub fn new(data: &'a [u8], chunk_size: usize) -> Self {
        Self {
            data,
            pos: 0,
            chunk_size: chunk_size.max(1),
        }
    }

    /// A reader that consumes the entire slice as fast as the buffer allows.
    pub fn full_slice(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            chunk_size: usize::MAX,
        }
    }
}

impl Reader for ChunkReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let rest = self.data.get(self.pos..).unwrap_or_default();
        let to_copy = rest.len().min(buf.len()).min(self.chunk_size);
        buf[..to_copy].copy_from_slice(&rest[..to_copy]);
        self.pos += to_copy;
        Ok(to_copy)
    }
}

/// Adapter for blocking byte streams.
#[derive(Debug)]
pub struct IoReader<R> {
    inner: R,
}

impl<R: io::Read> IoReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: io::Read> Reader for IoReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Adapter for [`bytes::Buf`] implementors.
#[derive(Debug)]
pub struct BytesReader<B> {
    buf: B,
}

impl<B: bytes::Buf> BytesReader<B> {
    pub fn new(buf: B) -> Self {
        Self { buf }
    }
}

impl<B: bytes::Buf> Reader for BytesReader<B> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let to_copy = self.buf.remaining().min(out.len());
        self.buf.copy_to_slice(&mut out[..to_copy]);
        Ok(to_copy)
    }
}

// SPDX-License-Identifier: Apache-2.0

//! Streaming decoders that turn text in three serialization formats into
//! a walk of open / next / close events.
//!
//! A [`Source`] wraps the input (a byte slice, text, UTF-16 or `char`
//! data, an [`std::io::Read`] stream or a [`bytes::Buf`]) behind a refillable
//! window. A [`Decoder`] reads it in one forward pass and drives a
//! [`Sink`], which builds whatever the caller wants from the events.
//!
//! ```rust
//! use katflow::{decode, Format, Sink, SinkError, Slip, Source};
//!
//! #[derive(Default)]
//! struct Pairs(Vec<(String, String)>);
//!
//! impl Sink for Pairs {
//!     type Node = ();
//!
//!     fn on_open(&mut self, _: Option<&mut ()>, _: Slip<'_>, _: Slip<'_>) -> Result<Option<()>, SinkError> {
//!         Ok(Some(()))
//!     }
//!
//!     fn on_next(&mut self, _: Option<&mut ()>, key: Slip<'_>, _: Slip<'_>, value: Slip<'_>) -> Result<(), SinkError> {
//!         self.0.push((key.to_string(), value.to_string()));
//!         Ok(())
//!     }
//!
//!     fn on_close(&mut self, _: (), _: Option<&mut ()>, _: bool, _: bool) -> Result<(), SinkError> {
//!         Ok(())
//!     }
//! }
//!
//! let mut pairs = Pairs::default();
//! decode(Format::Kat, &mut Source::from_text("@User{id:1,name:kraity}"), &mut pairs).unwrap();
//! assert_eq!(pairs.0[1], ("name".to_string(), "kraity".to_string()));
//! ```

// Compile-time configuration validation
mod config_check;

mod parse_error;
pub use parse_error::{ErrKind, ParseError, SyntaxError};

mod state;
pub use state::{NestingStack, ScopeKind, SubState};

mod pool;
pub use pool::{BufferPool, PoolConfig, PoolStats, CHUNK_ENV, GROUPS_ENV};

mod scratch;
pub use scratch::{Scratch, Slip};

mod escape_processor;

mod reader;
pub use reader::{BytesReader, ChunkReader, IoReader, Reader};

mod transcoder;
pub use transcoder::{CharUnits, Charset, Latin1Units, Transcoder, Units, Utf16StreamUnits, Utf16Units};

mod source;
pub use source::Source;

mod sink;
pub use sink::{Sink, SinkError};

mod decoder;
pub use decoder::{Decoder, Format, Options, UnknownFormat};

mod decoder_pool;
pub use decoder_pool::DecoderPool;

mod parser_core;

#[cfg(feature = "kat")]
mod kat;
#[cfg(feature = "kat")]
pub use kat::KatDecoder;

#[cfg(feature = "json")]
mod json;
#[cfg(feature = "json")]
pub use json::JsonDecoder;

#[cfg(feature = "doc")]
mod doc;
#[cfg(feature = "doc")]
pub use doc::DocDecoder;

/// Idle decoders kept per format by [`decode`].
const POOLED_DECODERS: usize = 8;

/// Decodes `source` as `format` into `sink` with a decoder borrowed from a
/// process-wide pool.
pub fn decode<S: Sink>(format: Format, source: &mut Source<'_>, sink: &mut S) -> Result<(), ParseError> {
    use std::sync::OnceLock;

    match format {
        #[cfg(feature = "kat")]
        Format::Kat => {
            static POOL: OnceLock<DecoderPool<KatDecoder>> = OnceLock::new();
            POOL.get_or_init(|| DecoderPool::new(POOLED_DECODERS))
                .with(|decoder| decoder.decode(source, sink))
        }
        #[cfg(feature = "json")]
        Format::Json => {
            static POOL: OnceLock<DecoderPool<JsonDecoder>> = OnceLock::new();
            POOL.get_or_init(|| DecoderPool::new(POOLED_DECODERS))
                .with(|decoder| decoder.decode(source, sink))
        }
        #[cfg(feature = "doc")]
        Format::Doc => {
            static POOL: OnceLock<DecoderPool<DocDecoder>> = OnceLock::new();
            POOL.get_or_init(|| DecoderPool::new(POOLED_DECODERS))
                .with(|decoder| decoder.decode(source, sink))
        }
    }
}

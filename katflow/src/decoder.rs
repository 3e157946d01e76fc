// SPDX-License-Identifier: Apache-2.0

//! The decoder interface shared by the three grammars.

use crate::parse_error::ParseError;
use crate::sink::Sink;
use crate::source::Source;

/// The text formats a decoder can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Compact structural format: `@User{id:1,name:kraity}`
    #[cfg(feature = "kat")]
    Kat,
    /// JSON-like format
    #[cfg(feature = "json")]
    Json,
    /// XML-like markup
    #[cfg(feature = "doc")]
    Doc,
}

impl Format {
    pub fn name(self) -> &'static str {
        match self {
            #[cfg(feature = "kat")]
            Format::Kat => "kat",
            #[cfg(feature = "json")]
            Format::Json => "json",
            #[cfg(feature = "doc")]
            Format::Doc => "xml",
        }
    }
}

impl core::fmt::Display for Format {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a format name is not recognized (or its feature is off).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown format {0:?}")]
pub struct UnknownFormat(pub String);

impl core::str::FromStr for Format {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            #[cfg(feature = "kat")]
            "kat" => Ok(Format::Kat),
            #[cfg(feature = "json")]
            "json" => Ok(Format::Json),
            #[cfg(feature = "doc")]
            "xml" | "doc" => Ok(Format::Doc),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

/// Tuning for one decoder instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Deepest nesting accepted before failing with `MaxDepthReached`.
    pub max_depth: usize,
    /// Initial size of the key buffer.
    pub alias_capacity: usize,
    /// Initial size of the type tag buffer.
    pub space_capacity: usize,
    /// Initial size of the value buffer.
    pub value_capacity: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_depth: 128,
            alias_capacity: 512,
            space_capacity: 256,
            value_capacity: 8192,
        }
    }
}

/// A single-pass, push-style decoder for one format.
///
/// An instance owns its scratch buffers and may be reused for any number
/// of inputs, one at a time. On failure every scope that was opened on the
/// sink is closed as aborted before the error is returned.
pub trait Decoder {
    fn format(&self) -> Format;

    /// Drains `source`, driving `sink` with the events it encodes.
    fn decode<S: Sink>(&mut self, source: &mut Source<'_>, sink: &mut S) -> Result<(), ParseError>;

    /// Resets scratch cursors and nesting state for the next input.
    fn clear(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names_round_trip() {
        #[cfg(feature = "kat")]
        assert_eq!("KAT".parse::<Format>().unwrap(), Format::Kat);
        #[cfg(feature = "json")]
        assert_eq!(Format::Json.to_string(), "json");
        #[cfg(feature = "doc")]
        {
            assert_eq!("xml".parse::<Format>().unwrap(), Format::Doc);
            assert_eq!("doc".parse::<Format>().unwrap(), Format::Doc);
        }
        assert_eq!(
            "yaml".parse::<Format>().unwrap_err(),
            UnknownFormat("yaml".to_string())
        );
    }

    #[test]
    fn test_default_options() {
        let options = Options::default();
        assert_eq!(options.alias_capacity, 512);
        assert_eq!(options.space_capacity, 256);
        assert_eq!(options.value_capacity, 8192);
    }
}

// SPDX-License-Identifier: Apache-2.0

//! Compile-time configuration validation
//!
//! Each grammar lives behind its own feature; a build must keep at least
//! one of them.

#[cfg(not(any(feature = "kat", feature = "json", feature = "doc")))]
compile_error!("No format features selected: enable at least one of 'kat', 'json' or 'doc'");

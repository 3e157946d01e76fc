// SPDX-License-Identifier: Apache-2.0

//! A bounded pool of idle decoders.
//!
//! Decoders own sizeable scratch buffers, so a process that decodes many
//! small documents parks them here between uses instead of rebuilding
//! them. A parked decoder is always cleared first.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::decoder::Decoder;

pub struct DecoderPool<D> {
    idle: Mutex<Vec<D>>,
    capacity: usize,
    factory: fn() -> D,
}

impl<D: Decoder + Default> DecoderPool<D> {
    /// A pool keeping at most `capacity` idle decoders, creating new ones
    /// with `D::default()`.
    pub fn new(capacity: usize) -> Self {
        Self::with_factory(capacity, D::default)
    }
}

impl<D: Decoder> DecoderPool<D> {
    pub fn with_factory(capacity: usize, factory: fn() -> D) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
            factory,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<D>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes an idle decoder, or creates one when none is parked.
    pub fn acquire(&self) -> D {
        let parked = self.lock().pop();
        match parked {
            Some(decoder) => decoder,
            None => {
                log::trace!("decoder pool empty, creating a decoder");
                (self.factory)()
            }
        }
    }

    /// Clears `decoder` and parks it. Returns false when the pool was full
    /// and the decoder was dropped.
    pub fn release(&self, mut decoder: D) -> bool {
        decoder.clear();
        let mut idle = self.lock();
        if idle.len() < self.capacity {
            idle.push(decoder);
            true
        } else {
            false
        }
    }

    /// Runs `f` with a pooled decoder, releasing it afterwards whatever
    /// `f` returns.
    pub fn with<T>(&self, f: impl FnOnce(&mut D) -> T) -> T {
        let mut decoder = self.acquire();
        let result = f(&mut decoder);
        self.release(decoder);
        result
    }

    /// Number of parked decoders.
    pub fn idle(&self) -> usize {
        self.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<D> core::fmt::Debug for DecoderPool<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DecoderPool")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::json::JsonDecoder;
    use crate::parse_error::ParseError;
    use crate::scratch::Slip;
    use crate::sink::{Sink, SinkError};
    use crate::source::Source;

    struct Values(Vec<String>);

    impl Sink for Values {
        type Node = ();

        fn on_open(&mut self, _: Option<&mut ()>, _: Slip<'_>, _: Slip<'_>) -> Result<Option<()>, SinkError> {
            Ok(Some(()))
        }

        fn on_next(
            &mut self,
            _: Option<&mut ()>,
            _: Slip<'_>,
            _: Slip<'_>,
            value: Slip<'_>,
        ) -> Result<(), SinkError> {
            self.0.push(value.to_string());
            Ok(())
        }

        fn on_close(&mut self, _: (), _: Option<&mut ()>, _: bool, _: bool) -> Result<(), SinkError> {
            Ok(())
        }
    }

    fn decode(pool: &DecoderPool<JsonDecoder>, text: &str) -> Result<Vec<String>, ParseError> {
        let mut sink = Values(Vec::new());
        pool.with(|decoder| decoder.decode(&mut Source::from_text(text), &mut sink))?;
        Ok(sink.0)
    }

    #[test]
    fn test_reuse_after_failure() {
        let pool = DecoderPool::<JsonDecoder>::new(2);
        assert!(decode(&pool, "[1,[2").is_err());
        assert_eq!(pool.idle(), 1);
        assert_eq!(decode(&pool, "[3]").unwrap(), ["3"]);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_capacity_bound() {
        let pool = DecoderPool::<JsonDecoder>::new(1);
        let first = pool.acquire();
        let second = pool.acquire();
        assert!(pool.release(first));
        assert!(!pool.release(second));
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_shared_across_threads() {
        let pool = DecoderPool::<JsonDecoder>::new(4);
        std::thread::scope(|scope| {
            for i in 0..4 {
                let pool = &pool;
                scope.spawn(move || {
                    for _ in 0..25 {
                        let text = format!("{{\"n\":{i}}}");
                        assert_eq!(decode(pool, &text).unwrap(), [i.to_string()]);
                    }
                });
            }
        });
        assert!(pool.idle() <= 4);
    }
}

// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! One-tick delay element for feedback links
//!
//! A buffer holds two slots. The consumer reads `current` while the producer writes
//! `pending`; the scheduler swaps them once every region of the tick has stepped.
//! Before the first tick `current` is the all-zero vector of the link width.

use crate::link::Link;
use crate::region::Signal;

#[derive(Debug, Clone)]
pub struct FeedbackBuffer {
    link: Link,
    current: Signal,
    pending: Signal,
}

impl FeedbackBuffer {
    pub fn new(link: Link, width: usize) -> Self {
        Self {
            link,
            current: Signal::zeros(width),
            pending: Signal::zeros(width),
        }
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    pub fn width(&self) -> usize {
        self.current.len()
    }

    /// Value visible to the consumer during this tick
    pub fn current(&self) -> &Signal {
        &self.current
    }

    /// Value that becomes visible at the next tick boundary
    pub fn pending(&self) -> &Signal {
        &self.pending
    }

    /// Store the producer's value for the next tick (width checked by the scheduler)
    pub(crate) fn write(&mut self, value: &Signal) {
        self.pending.assign(value);
    }

    /// Tick boundary: pending becomes current
    pub(crate) fn swap(&mut self) {
        std::mem::swap(&mut self.current, &mut self.pending);
        self.pending.assign(&self.current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{Endpoint, LinkClass};
    use ndarray::array;

    fn buffer(width: usize) -> FeedbackBuffer {
        let link = Link {
            source: Endpoint::new("b", "out"),
            destination: Endpoint::new("a", "in"),
            class: LinkClass::Feedback,
            source_index: 1,
            destination_index: 0,
        };
        FeedbackBuffer::new(link, width)
    }

    #[test]
    fn test_starts_neutral() {
        let buf = buffer(3);
        assert_eq!(buf.current(), &array![0.0, 0.0, 0.0]);
        assert_eq!(buf.width(), 3);
    }

    #[test]
    fn test_write_is_invisible_until_swap() {
        let mut buf = buffer(2);
        buf.write(&array![1.0, 2.0]);
        assert_eq!(buf.current(), &array![0.0, 0.0]);

        buf.swap();
        assert_eq!(buf.current(), &array![1.0, 2.0]);

        // No write during a tick keeps the last value visible
        buf.swap();
        assert_eq!(buf.current(), &array![1.0, 2.0]);
    }
}

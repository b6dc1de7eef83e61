// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! Directed port-to-port connections between regions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a link's value reaches its consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkClass {
    /// Consumed in the same tick; orders source before destination
    FeedForward,
    /// Consumed one tick later through a [`crate::feedback::FeedbackBuffer`]
    Feedback,
}

impl fmt::Display for LinkClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkClass::FeedForward => f.write_str("feed-forward"),
            LinkClass::Feedback => f.write_str("feedback"),
        }
    }
}

/// One end of a link: region name + port name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub region: String,
    pub port: String,
}

impl Endpoint {
    pub fn new(region: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.region, self.port)
    }
}

/// Directed edge from an output port to an input port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub source: Endpoint,
    pub destination: Endpoint,
    pub class: LinkClass,
    /// Region indices inside the owning graph
    pub(crate) source_index: usize,
    pub(crate) destination_index: usize,
}

impl Link {
    pub fn is_feedback(&self) -> bool {
        self.class == LinkClass::Feedback
    }

    pub fn source_index(&self) -> usize {
        self.source_index
    }

    pub fn destination_index(&self) -> usize {
        self.destination_index
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.source, self.destination, self.class)
    }
}

// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! Factory for the builtin region kinds.

use regionflow_engine::{ConfigError, RecordSource, Region, RegionConfig, RegionFactory, RegionKind};
use tracing::debug;

use crate::classifier::SdrClassifierRegion;
use crate::sensor::RecordSensor;
use crate::spatial_pooler::SpatialPoolerRegion;
use crate::temporal_memory::TemporalMemoryRegion;

/// The closed set of kinds this factory builds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKind {
    Sensor,
    SpatialPooler,
    TemporalMemory,
    Classifier,
}

impl BuiltinKind {
    pub const ALL: [BuiltinKind; 4] = [
        BuiltinKind::Sensor,
        BuiltinKind::SpatialPooler,
        BuiltinKind::TemporalMemory,
        BuiltinKind::Classifier,
    ];

    pub fn tag(self) -> RegionKind {
        match self {
            BuiltinKind::Sensor => RegionKind::SENSOR,
            BuiltinKind::SpatialPooler => RegionKind::SPATIAL_POOLER,
            BuiltinKind::TemporalMemory => RegionKind::TEMPORAL_MEMORY,
            BuiltinKind::Classifier => RegionKind::CLASSIFIER,
        }
    }

    pub fn from_tag(kind: &RegionKind) -> Option<Self> {
        Self::ALL.into_iter().find(|builtin| builtin.tag() == *kind)
    }
}

/// Builds sensor, spatial pooler, temporal memory and classifier regions
///
/// A sensor needs a record source; the factory hands its source to the first sensor it
/// creates.
#[derive(Default)]
pub struct BuiltinRegionFactory {
    source: Option<Box<dyn RecordSource>>,
}

impl BuiltinRegionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(source: impl RecordSource + 'static) -> Self {
        Self {
            source: Some(Box::new(source)),
        }
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }
}

impl RegionFactory for BuiltinRegionFactory {
    fn supports(&self, kind: &RegionKind) -> bool {
        BuiltinKind::from_tag(kind).is_some()
    }

    fn create(
        &mut self,
        kind: &RegionKind,
        config: &RegionConfig,
    ) -> Result<Box<dyn Region>, ConfigError> {
        let builtin = BuiltinKind::from_tag(kind)
            .ok_or_else(|| ConfigError::Unavailable(format!("no builtin region of kind {}", kind)))?;
        debug!("[REGIONS] Creating {} with {} parameters", kind, config.len());

        let region: Box<dyn Region> = match builtin {
            BuiltinKind::Sensor => {
                let source = self.source.take().ok_or_else(|| {
                    ConfigError::Unavailable("no record source left for a sensor region".into())
                })?;
                Box::new(RecordSensor::new(source, config)?)
            }
            BuiltinKind::SpatialPooler => Box::new(SpatialPoolerRegion::new(config)?),
            BuiltinKind::TemporalMemory => Box::new(TemporalMemoryRegion::new(config)?),
            BuiltinKind::Classifier => Box::new(SdrClassifierRegion::new(config)?),
        };
        Ok(region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::VecRecordSource;

    #[test]
    fn test_supports_builtin_tags_only() {
        let factory = BuiltinRegionFactory::new();
        for builtin in BuiltinKind::ALL {
            assert!(factory.supports(&builtin.tag()));
        }
        assert!(!factory.supports(&RegionKind::custom("Anomaly")));
    }

    #[test]
    fn test_sensor_consumes_the_source() {
        let mut factory = BuiltinRegionFactory::with_source(VecRecordSource::default());
        assert!(factory.has_source());
        factory
            .create(&RegionKind::SENSOR, &RegionConfig::new())
            .unwrap();
        assert!(!factory.has_source());
        assert!(matches!(
            factory.create(&RegionKind::SENSOR, &RegionConfig::new()),
            Err(ConfigError::Unavailable(_))
        ));
    }

    #[test]
    fn test_config_errors_propagate() {
        let mut factory = BuiltinRegionFactory::new();
        let bad = RegionConfig::new().with("alpha", 3.0);
        assert!(matches!(
            factory.create(&RegionKind::CLASSIFIER, &bad),
            Err(ConfigError::InvalidValue { .. })
        ));
        let sp = factory
            .create(&RegionKind::SPATIAL_POOLER, &RegionConfig::new())
            .unwrap();
        assert_eq!(sp.kind(), RegionKind::SPATIAL_POOLER);
    }
}

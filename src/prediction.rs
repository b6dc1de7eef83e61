// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! The hot-gym prediction topology
//!
//! sensor feeds the spatial pooler, the pooler feeds the temporal memory, and the
//! classifier reads the temporal memory plus the sensor's raw value. Both poolers send
//! top-down signals back upstream over feedback links, read one tick late.

use regionflow_config::RegionflowConfig;
use regionflow_engine::{
    ConfigError, EngineError, EngineResult, LinkClass, Network, PredictionProbe, RecordSource,
    RegionConfig, RegionKind,
};
use regionflow_regions::BuiltinRegionFactory;
use serde_json::Value;
use tracing::info;

pub const SENSOR: &str = "sensor";
pub const SPATIAL_POOLER: &str = "spatialPoolerRegion";
pub const TEMPORAL_MEMORY: &str = "temporalPoolerRegion";
pub const CLASSIFIER: &str = "SDRClassifierRegion";

/// Every link of the topology: (source, output, destination, input, class)
pub const LINKS: [(&str, &str, &str, &str, LinkClass); 10] = [
    (SENSOR, "dataOut", SPATIAL_POOLER, "bottomUpIn", LinkClass::FeedForward),
    (SENSOR, "resetOut", SPATIAL_POOLER, "resetIn", LinkClass::FeedForward),
    (SPATIAL_POOLER, "spatialTopDownOut", SENSOR, "spatialTopDownIn", LinkClass::Feedback),
    (SPATIAL_POOLER, "temporalTopDownOut", SENSOR, "temporalTopDownIn", LinkClass::Feedback),
    (SPATIAL_POOLER, "bottomUpOut", TEMPORAL_MEMORY, "bottomUpIn", LinkClass::FeedForward),
    (TEMPORAL_MEMORY, "topDownOut", SPATIAL_POOLER, "topDownIn", LinkClass::Feedback),
    (TEMPORAL_MEMORY, "bottomUpOut", CLASSIFIER, "bottomUpIn", LinkClass::FeedForward),
    (TEMPORAL_MEMORY, "predictedActiveCells", CLASSIFIER, "predictedActiveCells", LinkClass::FeedForward),
    (SENSOR, "sourceOut", CLASSIFIER, "categoryIn", LinkClass::FeedForward),
    (SENSOR, "sequenceIdOut", CLASSIFIER, "sequenceIdIn", LinkClass::FeedForward),
];

/// Build the four-region prediction network over `source`
///
/// Regions are added, linked and put into the configured modes; the network is
/// returned uninitialized so callers can still adjust parameters.
///
/// # Errors
///
/// Any construction error from the engine, or `EngineError::Config` when a config
/// section cannot be turned into a region record.
pub fn build_network(
    config: &RegionflowConfig,
    source: impl RecordSource + 'static,
) -> EngineResult<Network> {
    let mut network = Network::with_factory(BuiltinRegionFactory::with_source(source));

    let regions = [
        (SENSOR, RegionKind::SENSOR, config.sensor.to_region_config()),
        (SPATIAL_POOLER, RegionKind::SPATIAL_POOLER, config.spatial_pooler.to_region_config()),
        (TEMPORAL_MEMORY, RegionKind::TEMPORAL_MEMORY, config.temporal_memory.to_region_config()),
        (CLASSIFIER, RegionKind::CLASSIFIER, config.classifier.to_region_config()),
    ];
    for (name, kind, converted) in regions {
        network.add_region(name, kind, &region_record(name, converted)?)?;
    }

    for (src, output, dst, input, class) in LINKS {
        network.link(src, output, dst, input, class)?;
    }

    // The spatial pooler has no anomaly mode; temporal anomalies come from the TM
    network.set_learning(SPATIAL_POOLER, config.spatial_pooler.learning)?;

    network.set_parameter(TEMPORAL_MEMORY, "topDownMode", &Value::Bool(true))?;
    network.set_parameter(TEMPORAL_MEMORY, "anomalyMode", &Value::Bool(true))?;
    network.set_learning(TEMPORAL_MEMORY, config.temporal_memory.learning)?;
    network.set_inference(TEMPORAL_MEMORY, config.temporal_memory.inference)?;

    network.set_learning(CLASSIFIER, config.classifier.learning)?;
    network.set_inference(CLASSIFIER, config.classifier.inference)?;

    Ok(network)
}

/// Probe reading the sensor's raw value and the classifier's distribution
pub fn probe() -> PredictionProbe {
    PredictionProbe::new(SENSOR, CLASSIFIER)
}

/// Log the pooler ports and column counts of an initialized network
pub fn log_summary(network: &Network) -> EngineResult<()> {
    for region in [SPATIAL_POOLER, TEMPORAL_MEMORY] {
        info!(
            "[DEMO] {} inputs: {:?}",
            region,
            network.input_names(region)?
        );
        info!(
            "[DEMO] {} outputs: {:?}",
            region,
            network.output_names(region)?
        );
        info!(
            "[DEMO] {} columns: {}",
            region,
            network
                .output_width(region, "bottomUpOut")?
                .unwrap_or_default()
        );
    }
    Ok(())
}

fn region_record(
    region: &str,
    converted: regionflow_config::ConfigResult<RegionConfig>,
) -> EngineResult<RegionConfig> {
    converted.map_err(|e| EngineError::Config {
        region: region.to_string(),
        source: ConfigError::InvalidValue {
            key: region.to_string(),
            reason: e.to_string(),
        },
    })
}

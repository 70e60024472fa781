//! Spectrum tap: a pass-through analyser for visualisation.
//!
//! Audio flows through unchanged; the analyser keeps the most recent
//! `fft_size` samples so the UI can ask for waveform or spectrum data.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    effects::unit::{
        already_initialized, bounded, remove_nodes, EffectConfig, EffectPorts, EffectUnit,
    },
    graph::{Graph, NodeId, DEFAULT_FFT_SIZE},
    synth::config::ParamValue,
    Error, Result,
};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrumConfig {
    pub fft_size: usize,
    pub smoothing: f32,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            smoothing: 0.8,
        }
    }
}

pub struct SpectrumTap {
    config: SpectrumConfig,
    node: Option<NodeId>,
}

impl SpectrumTap {
    pub fn new(config: SpectrumConfig) -> Self {
        let config = SpectrumConfig {
            smoothing: bounded(config.smoothing, 0.0, 1.0),
            ..config
        };
        Self { config, node: None }
    }

    pub fn settings(&self) -> &SpectrumConfig {
        &self.config
    }

    fn node(&self) -> Result<NodeId> {
        self.node
            .ok_or_else(|| Error::Configuration("spectrum tap is not initialized".into()))
    }

    /// Latest samples, oldest first.
    pub fn time_domain_data(&self, graph: &Graph) -> Result<Vec<f32>> {
        Ok(graph.analyser(self.node()?)?.time_domain_data())
    }

    /// Smoothed magnitude spectrum in dB, one value per bin.
    pub fn frequency_data(&self, graph: &mut Graph) -> Result<Vec<f32>> {
        Ok(graph.analyser_mut(self.node()?)?.frequency_data())
    }

    pub fn frequency_bin_count(&self, graph: &Graph) -> Result<usize> {
        Ok(graph.analyser(self.node()?)?.frequency_bin_count())
    }
}

impl Default for SpectrumTap {
    fn default() -> Self {
        Self::new(SpectrumConfig::default())
    }
}

impl EffectUnit for SpectrumTap {
    fn initialize(&mut self, graph: &mut Graph, _destination: NodeId) -> Result<EffectPorts> {
        if self.node.is_some() {
            return Err(already_initialized("spectrum"));
        }
        let node = graph.add_analyser(self.config.fft_size, self.config.smoothing);
        // The analyser may round the size; keep the config honest.
        self.config.fft_size = graph.analyser(node)?.fft_size();
        self.node = Some(node);
        Ok(EffectPorts {
            input: node,
            output: node,
        })
    }

    fn input(&self) -> Option<NodeId> {
        self.node
    }

    fn output(&self) -> Option<NodeId> {
        self.node
    }

    fn config(&self) -> EffectConfig {
        EffectConfig::Spectrum(self.config)
    }

    fn set_param(&mut self, graph: &mut Graph, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "smoothing" => {
                let smoothing = bounded(value.as_number(name)?, 0.0, 1.0);
                self.config.smoothing = smoothing;
                if let Some(node) = self.node {
                    graph.analyser_mut(node)?.set_smoothing(smoothing);
                }
                Ok(())
            }
            "fft_size" => {
                if self.node.is_some() {
                    return Err(Error::Configuration(
                        "spectrum fft_size can only change before initialize".into(),
                    ));
                }
                let size = value.as_number(name)?;
                if size < 1.0 {
                    return Err(Error::invalid_value(name, "must be positive"));
                }
                self.config.fft_size = size as usize;
                Ok(())
            }
            _ => Err(Error::unknown_param("spectrum", name)),
        }
    }

    fn teardown(&mut self, graph: &mut Graph) {
        remove_nodes(graph, self.node.take());
    }
}

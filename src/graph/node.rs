use std::fmt;

use crate::{
    dsp::{
        convolution::Convolver,
        delay::DelayLine,
        distortion::apply_curve,
        dynamics::{Compressor, CompressorSettings},
        filter::{FilterType, SVFilter},
        oscillator::{OscillatorBlock, Waveform},
        spectrum::Analyser,
    },
    graph::timeline::Timeline,
    RENDER_QUANTUM,
};

/// Handle to a node in a [`Graph`](super::Graph).
///
/// Handles are generational: once a node is removed, its old handle stops
/// resolving even if the slot is reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    pub fn param(self, kind: ParamKind) -> ParamRef {
        ParamRef { node: self, kind }
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Frequency,
    Detune,
    Gain,
    Q,
    DelayTime,
    Feedback,
    Threshold,
    Knee,
    Ratio,
    Attack,
    Release,
}

impl ParamKind {
    pub fn name(self) -> &'static str {
        match self {
            ParamKind::Frequency => "frequency",
            ParamKind::Detune => "detune",
            ParamKind::Gain => "gain",
            ParamKind::Q => "q",
            ParamKind::DelayTime => "delay_time",
            ParamKind::Feedback => "feedback",
            ParamKind::Threshold => "threshold",
            ParamKind::Knee => "knee",
            ParamKind::Ratio => "ratio",
            ParamKind::Attack => "attack",
            ParamKind::Release => "release",
        }
    }
}

/// One automatable input of one node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ParamRef {
    pub node: NodeId,
    pub kind: ParamKind,
}

pub(crate) struct Param {
    pub(crate) kind: ParamKind,
    pub(crate) timeline: Timeline,
    /// Per-frame values for the quantum being rendered.
    pub(crate) values: Vec<f32>,
}

impl Param {
    fn new(kind: ParamKind, value: f32) -> Self {
        Self {
            kind,
            timeline: Timeline::new(value),
            values: vec![value; RENDER_QUANTUM],
        }
    }

    /// Sample the timeline for every frame of the quantum starting at `t0`.
    pub(crate) fn fill(&mut self, t0: f64, sample_rate: f32) {
        if self.timeline.is_empty() {
            self.values.fill(self.timeline.default_value());
            return;
        }
        let dt = 1.0 / sample_rate as f64;
        for (i, value) in self.values.iter_mut().enumerate() {
            *value = self.timeline.value_at(t0 + i as f64 * dt);
        }
    }
}

pub(crate) struct OscillatorNode {
    pub(crate) block: OscillatorBlock,
    pub(crate) start: Option<f64>,
    pub(crate) stop: Option<f64>,
}

impl OscillatorNode {
    fn is_playing(&self, time: f64) -> bool {
        self.start.is_some_and(|start| time >= start) && self.stop.map_or(true, |stop| time < stop)
    }
}

pub(crate) enum NodeKind {
    Destination,
    Gain,
    Oscillator(OscillatorNode),
    Filter(SVFilter),
    Delay(DelayLine),
    Convolver(Box<Convolver>),
    Shaper(Vec<f32>),
    Compressor(Compressor),
    Analyser(Box<Analyser>),
}

impl NodeKind {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            NodeKind::Destination => "destination",
            NodeKind::Gain => "gain",
            NodeKind::Oscillator(_) => "oscillator",
            NodeKind::Filter(_) => "filter",
            NodeKind::Delay(_) => "delay",
            NodeKind::Convolver(_) => "convolver",
            NodeKind::Shaper(_) => "shaper",
            NodeKind::Compressor(_) => "compressor",
            NodeKind::Analyser(_) => "analyser",
        }
    }
}

pub(crate) struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) params: Vec<Param>,
    pub(crate) inputs: Vec<NodeId>,
    pub(crate) param_inputs: Vec<(NodeId, ParamKind)>,
    pub(crate) output: Vec<f32>,
}

impl Node {
    fn with_params(kind: NodeKind, params: &[(ParamKind, f32)]) -> Self {
        Self {
            kind,
            params: params.iter().map(|&(k, v)| Param::new(k, v)).collect(),
            inputs: Vec::new(),
            param_inputs: Vec::new(),
            output: vec![0.0; RENDER_QUANTUM],
        }
    }

    pub(crate) fn destination() -> Self {
        Self::with_params(NodeKind::Destination, &[])
    }

    pub(crate) fn gain(value: f32) -> Self {
        Self::with_params(NodeKind::Gain, &[(ParamKind::Gain, value)])
    }

    pub(crate) fn oscillator(waveform: Waveform, frequency: f32) -> Self {
        let osc = OscillatorNode {
            block: OscillatorBlock::new(waveform),
            start: None,
            stop: None,
        };
        Self::with_params(
            NodeKind::Oscillator(osc),
            &[(ParamKind::Frequency, frequency), (ParamKind::Detune, 0.0)],
        )
    }

    pub(crate) fn filter(filter_type: FilterType, cutoff: f32, q: f32) -> Self {
        Self::with_params(
            NodeKind::Filter(SVFilter::new(filter_type)),
            &[(ParamKind::Frequency, cutoff), (ParamKind::Q, q)],
        )
    }

    pub(crate) fn delay(max_samples: usize, delay_time: f32, feedback: f32) -> Self {
        Self::with_params(
            NodeKind::Delay(DelayLine::new(max_samples)),
            &[
                (ParamKind::DelayTime, delay_time),
                (ParamKind::Feedback, feedback),
            ],
        )
    }

    pub(crate) fn convolver(impulse: &[f32]) -> Self {
        Self::with_params(
            NodeKind::Convolver(Box::new(Convolver::new(impulse, RENDER_QUANTUM))),
            &[],
        )
    }

    pub(crate) fn shaper(curve: Vec<f32>) -> Self {
        Self::with_params(NodeKind::Shaper(curve), &[])
    }

    pub(crate) fn compressor(settings: CompressorSettings) -> Self {
        Self::with_params(
            NodeKind::Compressor(Compressor::new()),
            &[
                (ParamKind::Threshold, settings.threshold_db),
                (ParamKind::Knee, settings.knee_db),
                (ParamKind::Ratio, settings.ratio),
                (ParamKind::Attack, settings.attack),
                (ParamKind::Release, settings.release),
            ],
        )
    }

    pub(crate) fn analyser(fft_size: usize, smoothing: f32) -> Self {
        Self::with_params(
            NodeKind::Analyser(Box::new(Analyser::new(fft_size, smoothing))),
            &[],
        )
    }

    pub(crate) fn param(&self, kind: ParamKind) -> Option<&Param> {
        self.params.iter().find(|p| p.kind == kind)
    }

    pub(crate) fn param_mut(&mut self, kind: ParamKind) -> Option<&mut Param> {
        self.params.iter_mut().find(|p| p.kind == kind)
    }

    /// Every node this one reads from, audio or modulation.
    pub(crate) fn dependencies(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.inputs
            .iter()
            .copied()
            .chain(self.param_inputs.iter().map(|&(src, _)| src))
    }

    /// Render one quantum from the summed `input`. Parameter buffers must
    /// already be filled.
    pub(crate) fn process(&mut self, input: &[f32], t0: f64, sample_rate: f32) {
        let mut output = std::mem::take(&mut self.output);

        match &mut self.kind {
            NodeKind::Destination => output.copy_from_slice(input),
            NodeKind::Gain => {
                let gain = self.params[0].values.as_slice();
                for ((out, &x), &g) in output.iter_mut().zip(input).zip(gain) {
                    *out = x * g;
                }
            }
            NodeKind::Oscillator(osc) => {
                let dt = 1.0 / sample_rate as f64;
                let frequency = self.params[0].values.as_slice();
                let detune = self.params[1].values.as_slice();
                for (i, out) in output.iter_mut().enumerate() {
                    if !osc.is_playing(t0 + i as f64 * dt) {
                        *out = 0.0;
                        continue;
                    }
                    let cents = detune[i];
                    let hz = if cents == 0.0 {
                        frequency[i]
                    } else {
                        frequency[i] * 2.0_f32.powf(cents / 1200.0)
                    };
                    *out = osc.block.next_sample(hz, sample_rate);
                }
            }
            NodeKind::Filter(filter) => {
                let cutoff = self.params[0].values.as_slice();
                let q = self.params[1].values.as_slice();
                for (i, out) in output.iter_mut().enumerate() {
                    *out = filter.process(input[i], cutoff[i], q[i], sample_rate);
                }
            }
            NodeKind::Delay(line) => {
                let time = self.params[0].values.as_slice();
                let feedback = self.params[1].values.as_slice();
                for (i, out) in output.iter_mut().enumerate() {
                    *out = line.next_sample(input[i], time[i] * sample_rate, feedback[i]);
                }
            }
            NodeKind::Convolver(convolver) => convolver.process_block(input, &mut output),
            NodeKind::Shaper(curve) => {
                for (out, &x) in output.iter_mut().zip(input) {
                    *out = apply_curve(curve, x);
                }
            }
            NodeKind::Compressor(compressor) => {
                // k-rate: settings are read once per quantum
                let settings = CompressorSettings {
                    threshold_db: self.params[0].values[0],
                    knee_db: self.params[1].values[0],
                    ratio: self.params[2].values[0],
                    attack: self.params[3].values[0],
                    release: self.params[4].values[0],
                };
                output.copy_from_slice(input);
                compressor.process_block(&mut output, &settings, sample_rate);
            }
            NodeKind::Analyser(analyser) => {
                analyser.push(input);
                output.copy_from_slice(input);
            }
        }

        self.output = output;
    }
}

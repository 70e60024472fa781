/*
Audio Graph
===========

The graph owns every node in the session: voice oscillators, filters and
gains, LFOs, effect subgraphs and the single destination. Control code builds
and rewires it through `NodeId` handles; `render` pulls audio out of it.

Edges
-----

Two kinds of connection exist:

  connect(a, b)               a's output is summed into b's audio input.
  connect_param(a, b.param)   a's output is added, sample by sample, to the
                              automated value of one of b's parameters.

The second kind is how an LFO wobbles a filter cutoff or an oscillator
frequency: the parameter keeps its own timeline (envelopes, ramps) and the
modulation rides on top of it.

    [LFO] ──► [gain: depth] ──┐ (param)
                              ▼
    [osc] ──► [osc level] ──► [filter] ──► [voice gain] ──► [chain] ──► [dest]

Connections that would close a loop are refused. Feedback is only available
inside nodes that model it (the delay node's Feedback parameter).

Rendering
---------

Audio is produced in fixed quanta of `RENDER_QUANTUM` frames. For each
quantum, nodes run in topological order (recomputed lazily after any
topology change); each node sees the sum of its inputs and a per-frame
buffer for every parameter. Callers may ask for any number of frames: the
tail of a partially consumed quantum is kept for the next call.

The clock `current_time()` counts rendered quanta. Anything scheduled at
`current_time()` lands at the start of the next quantum rendered.
*/

pub mod node;
pub mod timeline;

use crate::{
    dsp::{
        dynamics::CompressorSettings,
        filter::FilterType,
        oscillator::Waveform,
        spectrum::Analyser,
    },
    Error, Result, RENDER_QUANTUM,
};

pub use node::{NodeId, ParamKind, ParamRef};
pub use timeline::{AutomationEvent, Timeline};

use node::{Node, NodeKind};

/// Default analysis window for analyser nodes.
pub const DEFAULT_FFT_SIZE: usize = 2048;

struct Slot {
    generation: u32,
    node: Option<Node>,
}

pub struct Graph {
    sample_rate: f32,
    frames: u64,
    slots: Vec<Slot>,
    free: Vec<u32>,
    destination: NodeId,
    order: Vec<NodeId>,
    order_dirty: bool,
    scratch: Vec<f32>,
    pending: Vec<f32>,
    pending_pos: usize,
}

impl Graph {
    pub fn new(sample_rate: f32) -> Self {
        let mut graph = Self {
            sample_rate,
            frames: 0,
            slots: Vec::new(),
            free: Vec::new(),
            destination: NodeId {
                index: 0,
                generation: 0,
            },
            order: Vec::new(),
            order_dirty: true,
            scratch: vec![0.0; RENDER_QUANTUM],
            pending: vec![0.0; RENDER_QUANTUM],
            pending_pos: RENDER_QUANTUM,
        };
        graph.destination = graph.insert(Node::destination());
        graph
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Seconds of audio rendered so far.
    pub fn current_time(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }

    /// The node whose input is the graph's output.
    pub fn destination(&self) -> NodeId {
        self.destination
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.slots
            .get(id.index as usize)
            .is_some_and(|slot| slot.generation == id.generation && slot.node.is_some())
    }

    /// Live nodes, destination included.
    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.node.is_some()).count()
    }

    // ---- construction -------------------------------------------------

    pub fn add_gain(&mut self, gain: f32) -> NodeId {
        self.insert(Node::gain(gain))
    }

    /// New oscillator, silent until [`Graph::start`].
    pub fn add_oscillator(&mut self, waveform: Waveform, frequency: f32) -> NodeId {
        self.insert(Node::oscillator(waveform, frequency))
    }

    pub fn add_filter(&mut self, filter_type: FilterType, cutoff: f32, q: f32) -> NodeId {
        self.insert(Node::filter(filter_type, cutoff, q))
    }

    /// Delay with room for `max_delay` seconds. `delay_time` is in seconds.
    pub fn add_delay(&mut self, max_delay: f32, delay_time: f32, feedback: f32) -> NodeId {
        let max_samples = (max_delay.max(0.0) * self.sample_rate).ceil() as usize + 1;
        self.insert(Node::delay(max_samples, delay_time, feedback))
    }

    pub fn add_convolver(&mut self, impulse: &[f32]) -> NodeId {
        self.insert(Node::convolver(impulse))
    }

    /// Waveshaper reading `curve` over inputs -1.0..1.0. An empty curve
    /// passes audio through untouched.
    pub fn add_shaper(&mut self, curve: Vec<f32>) -> NodeId {
        self.insert(Node::shaper(curve))
    }

    pub fn add_compressor(&mut self, settings: CompressorSettings) -> NodeId {
        self.insert(Node::compressor(settings))
    }

    pub fn add_analyser(&mut self, fft_size: usize, smoothing: f32) -> NodeId {
        self.insert(Node::analyser(fft_size, smoothing))
    }

    // ---- topology -----------------------------------------------------

    /// Sum `from`'s output into `to`'s input. Connecting twice is a no-op.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<()> {
        self.check_edge(from, to)?;
        let node = self.node_mut(to)?;
        if !node.inputs.contains(&from) {
            node.inputs.push(from);
            self.order_dirty = true;
        }
        Ok(())
    }

    /// Add `from`'s output onto the automated value of `param`.
    pub fn connect_param(&mut self, from: NodeId, param: ParamRef) -> Result<()> {
        self.check_edge(from, param.node)?;
        let node = self.node_mut(param.node)?;
        if node.param(param.kind).is_none() {
            return Err(missing_param(node.kind.label(), param));
        }
        let edge = (from, param.kind);
        if !node.param_inputs.contains(&edge) {
            node.param_inputs.push(edge);
            self.order_dirty = true;
        }
        Ok(())
    }

    /// Drop every connection leaving `id`, audio and modulation.
    pub fn disconnect(&mut self, id: NodeId) -> Result<()> {
        self.node(id)?;
        self.strip_edges_from(id);
        Ok(())
    }

    /// Free `id`. Its handle stops resolving and every edge touching it is
    /// dropped.
    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        if id == self.destination {
            return Err(Error::Configuration(
                "the destination node cannot be removed".into(),
            ));
        }
        self.node(id)?;
        self.strip_edges_from(id);

        let slot = &mut self.slots[id.index as usize];
        slot.node = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.order_dirty = true;
        Ok(())
    }

    pub fn inputs(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(&self.node(id)?.inputs)
    }

    pub fn is_connected(&self, from: NodeId, to: NodeId) -> bool {
        self.node(to).is_ok_and(|node| node.inputs.contains(&from))
    }

    pub fn is_param_connected(&self, from: NodeId, param: ParamRef) -> bool {
        self.node(param.node)
            .is_ok_and(|node| node.param_inputs.contains(&(from, param.kind)))
    }

    // ---- parameters ---------------------------------------------------

    /// Immediate write. Clears any automation scheduled on the parameter.
    pub fn set_param(&mut self, param: ParamRef, value: f32) -> Result<()> {
        self.timeline_mut(param)?.set(value);
        Ok(())
    }

    /// Automated value at the current time, without modulation inputs.
    pub fn param_value(&self, param: ParamRef) -> Result<f32> {
        self.value_at(param, self.current_time())
    }

    pub fn value_at(&self, param: ParamRef, time: f64) -> Result<f32> {
        Ok(self.timeline(param)?.value_at(time))
    }

    pub fn set_value_at(&mut self, param: ParamRef, value: f32, time: f64) -> Result<()> {
        self.timeline_mut(param)?.set_value_at(value, time);
        Ok(())
    }

    pub fn linear_ramp_to(&mut self, param: ParamRef, value: f32, end_time: f64) -> Result<()> {
        let now = self.current_time();
        self.timeline_mut(param)?
            .linear_ramp_to(value, end_time, now);
        Ok(())
    }

    pub fn cancel_scheduled(&mut self, param: ParamRef, time: f64) -> Result<()> {
        self.timeline_mut(param)?.cancel_scheduled(time);
        Ok(())
    }

    pub fn cancel_and_hold(&mut self, param: ParamRef, time: f64) -> Result<()> {
        self.timeline_mut(param)?.cancel_and_hold(time);
        Ok(())
    }

    pub fn timeline(&self, param: ParamRef) -> Result<&Timeline> {
        let node = self.node(param.node)?;
        node.param(param.kind)
            .map(|p| &p.timeline)
            .ok_or_else(|| missing_param(node.kind.label(), param))
    }

    fn timeline_mut(&mut self, param: ParamRef) -> Result<&mut Timeline> {
        let node = self.node_mut(param.node)?;
        let label = node.kind.label();
        node.param_mut(param.kind)
            .map(|p| &mut p.timeline)
            .ok_or_else(|| missing_param(label, param))
    }

    // ---- node-specific controls ---------------------------------------

    pub fn start(&mut self, id: NodeId, time: f64) -> Result<()> {
        let osc = self.oscillator_mut(id)?;
        osc.start = Some(time);
        Ok(())
    }

    /// Schedule the oscillator to fall silent at `time`. A later call moves
    /// the stop time.
    pub fn stop(&mut self, id: NodeId, time: f64) -> Result<()> {
        let osc = self.oscillator_mut(id)?;
        osc.stop = Some(time);
        Ok(())
    }

    pub fn stop_time(&self, id: NodeId) -> Result<Option<f64>> {
        match &self.node(id)?.kind {
            NodeKind::Oscillator(osc) => Ok(osc.stop),
            _ => Err(Error::Configuration(format!("{id:?} is not an oscillator"))),
        }
    }

    /// True once a stopped oscillator has passed its stop time.
    pub fn is_finished(&self, id: NodeId) -> Result<bool> {
        let now = self.current_time();
        match &self.node(id)?.kind {
            NodeKind::Oscillator(osc) => Ok(osc.stop.is_some_and(|stop| now >= stop)),
            _ => Err(Error::Configuration(format!("{id:?} is not an oscillator"))),
        }
    }

    pub fn set_waveform(&mut self, id: NodeId, waveform: Waveform) -> Result<()> {
        self.oscillator_mut(id)?.block.set_waveform(waveform);
        Ok(())
    }

    pub fn waveform(&self, id: NodeId) -> Result<Waveform> {
        match &self.node(id)?.kind {
            NodeKind::Oscillator(osc) => Ok(osc.block.waveform()),
            _ => Err(Error::Configuration(format!("{id:?} is not an oscillator"))),
        }
    }

    /// Jump an oscillator to a phase offset in cycles (0.25 = quarter cycle).
    pub fn set_phase(&mut self, id: NodeId, phase: f32) -> Result<()> {
        self.oscillator_mut(id)?.block.set_phase(phase);
        Ok(())
    }

    pub fn set_filter_type(&mut self, id: NodeId, filter_type: FilterType) -> Result<()> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Filter(filter) => {
                filter.set_filter_type(filter_type);
                Ok(())
            }
            _ => Err(Error::Configuration(format!("{id:?} is not a filter"))),
        }
    }

    pub fn filter_type(&self, id: NodeId) -> Result<FilterType> {
        match &self.node(id)?.kind {
            NodeKind::Filter(filter) => Ok(filter.filter_type()),
            _ => Err(Error::Configuration(format!("{id:?} is not a filter"))),
        }
    }

    pub fn set_curve(&mut self, id: NodeId, new_curve: Vec<f32>) -> Result<()> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Shaper(curve) => {
                *curve = new_curve;
                Ok(())
            }
            _ => Err(Error::Configuration(format!("{id:?} is not a shaper"))),
        }
    }

    pub fn curve(&self, id: NodeId) -> Result<&[f32]> {
        match &self.node(id)?.kind {
            NodeKind::Shaper(curve) => Ok(curve),
            _ => Err(Error::Configuration(format!("{id:?} is not a shaper"))),
        }
    }

    /// Swap the impulse response. The convolver's history is discarded.
    pub fn set_impulse(&mut self, id: NodeId, impulse: &[f32]) -> Result<()> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Convolver(convolver) => {
                **convolver = crate::dsp::convolution::Convolver::new(impulse, RENDER_QUANTUM);
                Ok(())
            }
            _ => Err(Error::Configuration(format!("{id:?} is not a convolver"))),
        }
    }

    /// Current gain reduction of a compressor node, in dB (zero or negative).
    pub fn reduction(&self, id: NodeId) -> Result<f32> {
        match &self.node(id)?.kind {
            NodeKind::Compressor(compressor) => Ok(compressor.reduction_db()),
            _ => Err(Error::Configuration(format!("{id:?} is not a compressor"))),
        }
    }

    pub fn analyser(&self, id: NodeId) -> Result<&Analyser> {
        match &self.node(id)?.kind {
            NodeKind::Analyser(analyser) => Ok(analyser),
            _ => Err(Error::Configuration(format!("{id:?} is not an analyser"))),
        }
    }

    pub fn analyser_mut(&mut self, id: NodeId) -> Result<&mut Analyser> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Analyser(analyser) => Ok(analyser),
            _ => Err(Error::Configuration(format!("{id:?} is not an analyser"))),
        }
    }

    /// Last rendered quantum of `id`'s output.
    pub fn output(&self, id: NodeId) -> Result<&[f32]> {
        Ok(&self.node(id)?.output)
    }

    // ---- rendering ----------------------------------------------------

    /// Fill `out` with mono audio from the destination.
    pub fn render(&mut self, out: &mut [f32]) {
        let mut written = 0;
        while written < out.len() {
            if self.pending_pos >= RENDER_QUANTUM {
                self.render_quantum();
                self.pending_pos = 0;
            }
            let n = (out.len() - written).min(RENDER_QUANTUM - self.pending_pos);
            out[written..written + n]
                .copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + n]);
            self.pending_pos += n;
            written += n;
        }
    }

    /// Render and discard whole quanta covering at least `seconds`.
    pub fn advance(&mut self, seconds: f64) {
        let frames = (seconds * self.sample_rate as f64).max(0.0).ceil() as u64;
        let quanta = frames.div_ceil(RENDER_QUANTUM as u64);
        for _ in 0..quanta {
            self.render_quantum();
        }
        self.pending_pos = RENDER_QUANTUM;
    }

    fn render_quantum(&mut self) {
        if self.order_dirty {
            self.rebuild_order();
        }

        let t0 = self.current_time();
        let sample_rate = self.sample_rate;
        let mut input = std::mem::take(&mut self.scratch);

        for i in 0..self.order.len() {
            let id = self.order[i];
            let Some(mut node) = self.slots[id.index as usize].node.take() else {
                continue;
            };

            input.fill(0.0);
            for src in &node.inputs {
                if let Some(upstream) = self.slots[src.index as usize].node.as_ref() {
                    for (acc, &x) in input.iter_mut().zip(&upstream.output) {
                        *acc += x;
                    }
                }
            }

            for param in &mut node.params {
                param.fill(t0, sample_rate);
            }
            for &(src, kind) in &node.param_inputs {
                let Some(upstream) = self.slots[src.index as usize].node.as_ref() else {
                    continue;
                };
                if let Some(param) = node.params.iter_mut().find(|p| p.kind == kind) {
                    for (value, &x) in param.values.iter_mut().zip(&upstream.output) {
                        *value += x;
                    }
                }
            }

            node.process(&input, t0, sample_rate);
            self.slots[id.index as usize].node = Some(node);
        }

        self.scratch = input;
        self.frames += RENDER_QUANTUM as u64;

        let now = self.current_time();
        for slot in &mut self.slots {
            if let Some(node) = slot.node.as_mut() {
                for param in &mut node.params {
                    param.timeline.prune(now);
                }
            }
        }

        if let Some(dest) = self.slots[self.destination.index as usize].node.as_ref() {
            self.pending.copy_from_slice(&dest.output);
        }
    }

    /// Kahn's algorithm over audio and modulation edges.
    fn rebuild_order(&mut self) {
        let n = self.slots.len();
        let mut indegree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (index, slot) in self.slots.iter().enumerate() {
            if let Some(node) = &slot.node {
                for dep in node.dependencies() {
                    indegree[index] += 1;
                    dependents[dep.index as usize].push(index);
                }
            }
        }

        let mut ready: Vec<usize> = (0..n)
            .filter(|&i| self.slots[i].node.is_some() && indegree[i] == 0)
            .rev()
            .collect();

        self.order.clear();
        while let Some(index) = ready.pop() {
            self.order.push(NodeId {
                index: index as u32,
                generation: self.slots[index].generation,
            });
            for &next in &dependents[index] {
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    ready.push(next);
                }
            }
        }

        self.order_dirty = false;
    }

    // ---- internals ----------------------------------------------------

    fn insert(&mut self, node: Node) -> NodeId {
        self.order_dirty = true;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index: (self.slots.len() - 1) as u32,
                generation: 0,
            }
        }
    }

    fn node(&self, id: NodeId) -> Result<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(Error::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(Error::UnknownNode(id))
    }

    fn oscillator_mut(&mut self, id: NodeId) -> Result<&mut node::OscillatorNode> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Oscillator(osc) => Ok(osc),
            _ => Err(Error::Configuration(format!("{id:?} is not an oscillator"))),
        }
    }

    fn check_edge(&self, from: NodeId, to: NodeId) -> Result<()> {
        self.node(from)?;
        self.node(to)?;
        if from == self.destination {
            return Err(Error::Configuration(
                "the destination has no output to connect".into(),
            ));
        }
        if self.depends_on(from, to) {
            return Err(Error::Cycle { from, to });
        }
        Ok(())
    }

    /// Whether `node` (transitively) reads from `target`, or is `target`.
    fn depends_on(&self, node: NodeId, target: NodeId) -> bool {
        let mut stack = vec![node];
        let mut seen = vec![false; self.slots.len()];
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            let index = id.index as usize;
            if seen[index] {
                continue;
            }
            seen[index] = true;
            if let Ok(n) = self.node(id) {
                stack.extend(n.dependencies());
            }
        }
        false
    }

    fn strip_edges_from(&mut self, id: NodeId) {
        let mut changed = false;
        for slot in &mut self.slots {
            if let Some(node) = slot.node.as_mut() {
                let before = node.inputs.len() + node.param_inputs.len();
                node.inputs.retain(|&src| src != id);
                node.param_inputs.retain(|&(src, _)| src != id);
                changed |= before != node.inputs.len() + node.param_inputs.len();
            }
        }
        if changed {
            self.order_dirty = true;
        }
    }
}

fn missing_param(label: &str, param: ParamRef) -> Error {
    Error::unknown_param(
        format!("{label} node {:?}", param.node),
        param.kind.name(),
    )
}

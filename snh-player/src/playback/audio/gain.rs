//! Gain automation and the mix graph
//!
//! # Gain automation
//!
//! [`GainParam`] keeps a time-ordered list of automation points, evaluated
//! on the session clock (seconds):
//!
//! - **SetValue(v, t)**: value jumps to `v` at `t`
//! - **LinearRamp(v, t)**: value moves linearly from the previous point to
//!   `v`, arriving at `t`
//!
//! Before the first point the param holds its base value. After the last
//! point it holds the last point's value.
//!
//! # Mix graph
//!
//! [`MixGraph`] is a tree of gain nodes. A node's effective gain is its own
//! automated value times every ancestor's, so lowering a parent (the duck
//! gain, the master volume) scales every handle below it. Only the
//! orchestrators and the audio layers mutate the graph.

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
enum PointKind {
    SetValue,
    LinearRamp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct AutomationPoint {
    time: f64,
    value: f32,
    kind: PointKind,
}

/// Automated gain value
#[derive(Debug, Clone, PartialEq)]
pub struct GainParam {
    base: f32,
    points: Vec<AutomationPoint>,
}

impl GainParam {
    pub fn new(value: f32) -> Self {
        Self {
            base: value,
            points: Vec::new(),
        }
    }

    /// Set the value immediately, dropping all automation
    pub fn set_value(&mut self, value: f32) {
        self.base = value;
        self.points.clear();
    }

    pub fn set_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(AutomationPoint {
            time,
            value,
            kind: PointKind::SetValue,
        });
    }

    pub fn linear_ramp_to_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(AutomationPoint {
            time,
            value,
            kind: PointKind::LinearRamp,
        });
    }

    /// Drop every point at or after `time`
    pub fn cancel_scheduled_values(&mut self, time: f64) {
        self.points.retain(|p| p.time < time);
    }

    /// Number of scheduled points
    pub fn scheduled(&self) -> usize {
        self.points.len()
    }

    /// Value at `time`
    pub fn value_at(&self, time: f64) -> f32 {
        // Last point at or before `time`
        let prev = self.points.iter().rposition(|p| p.time <= time);
        let next = match prev {
            Some(i) => self.points.get(i + 1),
            None => self.points.first(),
        };

        let (prev_time, prev_value) = match prev {
            Some(i) => (self.points[i].time, self.points[i].value),
            None => (f64::NEG_INFINITY, self.base),
        };

        match next {
            Some(p) if p.kind == PointKind::LinearRamp => {
                if !prev_time.is_finite() || p.time <= prev_time {
                    return prev_value;
                }
                let progress = ((time - prev_time) / (p.time - prev_time)).clamp(0.0, 1.0);
                prev_value + (p.value - prev_value) * progress as f32
            }
            _ => prev_value,
        }
    }

    fn insert(&mut self, point: AutomationPoint) {
        // Equal times keep insertion order
        let at = self.points.partition_point(|p| p.time <= point.time);
        self.points.insert(at, point);
    }
}

/// Index of a node in a [`MixGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct GainNode {
    label: String,
    param: GainParam,
    parent: Option<NodeId>,
}

/// Tree of gain nodes
#[derive(Debug, Clone, Default)]
pub struct MixGraph {
    nodes: Vec<GainNode>,
}

impl MixGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with an initial value, under `parent` (None = root)
    pub fn add(&mut self, label: impl Into<String>, value: f32, parent: Option<NodeId>) -> NodeId {
        self.nodes.push(GainNode {
            label: label.into(),
            param: GainParam::new(value),
            parent,
        });
        NodeId(self.nodes.len() - 1)
    }

    pub fn param(&self, node: NodeId) -> Option<&GainParam> {
        self.nodes.get(node.0).map(|n| &n.param)
    }

    pub fn param_mut(&mut self, node: NodeId) -> Option<&mut GainParam> {
        self.nodes.get_mut(node.0).map(|n| &mut n.param)
    }

    pub fn label(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node.0).map(|n| n.label.as_str())
    }

    /// Node's own value at `time`
    pub fn value_at(&self, node: NodeId, time: f64) -> f32 {
        self.param(node).map_or(0.0, |p| p.value_at(time))
    }

    /// Product of the node's value and all its ancestors' at `time`
    pub fn effective(&self, node: NodeId, time: f64) -> f32 {
        let mut gain = 1.0;
        let mut current = Some(node);
        // Depth bound guards against a malformed parent chain
        let mut depth = 0;
        while let Some(id) = current {
            let Some(n) = self.nodes.get(id.0) else {
                return 0.0;
            };
            gain *= n.param.value_at(time);
            current = n.parent;
            depth += 1;
            if depth > self.nodes.len() {
                break;
            }
        }
        gain
    }

    /// Cancel automation and hold 0 from `time` on, for each node in `nodes`
    pub fn silence(&mut self, nodes: &[NodeId], time: f64) {
        for node in nodes {
            if let Some(param) = self.param_mut(*node) {
                param.cancel_scheduled_values(time);
                param.set_value_at_time(0.0, time);
            }
        }
        debug!("Silenced {} gain nodes at t={:.3}", nodes.len(), time);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_base_value_without_automation() {
        let p = GainParam::new(0.7);
        assert!(approx(p.value_at(-5.0), 0.7));
        assert!(approx(p.value_at(100.0), 0.7));
    }

    #[test]
    fn test_linear_ramp_interpolates() {
        let mut p = GainParam::new(1.0);
        p.set_value_at_time(0.0, 10.0);
        p.linear_ramp_to_value_at_time(1.5, 13.0);

        assert!(approx(p.value_at(9.0), 1.0));
        assert!(approx(p.value_at(10.0), 0.0));
        assert!(approx(p.value_at(11.5), 0.75));
        assert!(approx(p.value_at(13.0), 1.5));
        assert!(approx(p.value_at(20.0), 1.5));
    }

    #[test]
    fn test_fade_in_hold_fade_out_envelope() {
        let mut p = GainParam::new(1.0);
        p.set_value_at_time(0.0, 0.0);
        p.linear_ramp_to_value_at_time(1.0, 2.0);
        p.set_value_at_time(1.0, 17.0);
        p.linear_ramp_to_value_at_time(0.0, 19.0);

        assert!(approx(p.value_at(1.0), 0.5));
        assert!(approx(p.value_at(10.0), 1.0));
        assert!(approx(p.value_at(18.0), 0.5));
        assert!(approx(p.value_at(19.5), 0.0));
    }

    #[test]
    fn test_cancel_and_set_zeroes() {
        let mut p = GainParam::new(1.0);
        p.set_value_at_time(0.0, 0.0);
        p.linear_ramp_to_value_at_time(1.0, 2.0);
        p.set_value_at_time(1.0, 17.0);
        p.linear_ramp_to_value_at_time(0.0, 19.0);

        p.cancel_scheduled_values(5.0);
        p.set_value_at_time(0.0, 5.0);
        assert_eq!(p.scheduled(), 3);
        assert!(approx(p.value_at(5.0), 0.0));
        assert!(approx(p.value_at(18.0), 0.0));
        // Points before the cancel time are untouched
        assert!(approx(p.value_at(1.0), 0.5));
    }

    #[test]
    fn test_set_value_drops_automation() {
        let mut p = GainParam::new(1.0);
        p.linear_ramp_to_value_at_time(0.0, 5.0);
        p.set_value(0.3);
        assert_eq!(p.scheduled(), 0);
        assert!(approx(p.value_at(10.0), 0.3));
    }

    #[test]
    fn test_effective_gain_is_product_of_chain() {
        let mut graph = MixGraph::new();
        let master = graph.add("master", 0.5, None);
        let duck = graph.add("duck", 1.0, Some(master));
        let handle = graph.add("ambient-0", 0.8, Some(duck));

        assert!(approx(graph.effective(handle, 0.0), 0.4));

        graph
            .param_mut(duck)
            .unwrap()
            .set_value_at_time(0.1, 1.0);
        assert!(approx(graph.effective(handle, 2.0), 0.04));
        assert!(approx(graph.value_at(handle, 2.0), 0.8));
        assert_eq!(graph.label(duck), Some("duck"));
    }

    #[test]
    fn test_silence_zeroes_nodes() {
        let mut graph = MixGraph::new();
        let a = graph.add("a", 1.0, None);
        let b = graph.add("b", 1.5, None);
        graph.param_mut(a).unwrap().linear_ramp_to_value_at_time(2.0, 10.0);

        graph.silence(&[a, b], 3.0);
        assert!(approx(graph.value_at(a, 3.0), 0.0));
        assert!(approx(graph.value_at(b, 8.0), 0.0));
        assert!(approx(graph.value_at(a, 20.0), 0.0));
    }
}

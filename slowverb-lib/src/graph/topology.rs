//! Shape of the effect graph as a small DAG of typed stages.
//!
//! The shape is a pure function of the playback rate. Live and offline
//! instantiations share it; only the sink behind the `Destination` stage
//! differs.

use crate::settings::{EQ_BAND_COUNT, EQ_FREQUENCIES_HZ, EQ_Q};

pub type StageId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainRole {
    Dry,
    Wet,
    Volume,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stage {
    /// Plays the asset at `rate` times its native speed.
    Source { rate: f32 },
    /// One peaking band of the equalizer chain.
    Peaking { band: usize, freq_hz: f32, q: f32 },
    /// Convolution with a freshly generated impulse response.
    Convolver,
    Gain(GainRole),
    Destination,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphTopology {
    stages: Vec<Stage>,
    edges: Vec<(StageId, StageId)>,
}

impl GraphTopology {
    /// source -> eq[0..9] -> dry -> volume -> destination
    /// source -> convolver -> wet -> volume
    pub fn new(rate: f32) -> Self {
        let mut topology = Self {
            stages: Vec::with_capacity(EQ_BAND_COUNT + 6),
            edges: Vec::with_capacity(EQ_BAND_COUNT + 6),
        };

        let source = topology.add(Stage::Source { rate });

        let mut previous = source;
        for (band, freq_hz) in EQ_FREQUENCIES_HZ.iter().enumerate() {
            let peaking = topology.add(Stage::Peaking {
                band,
                freq_hz: *freq_hz,
                q: EQ_Q,
            });
            topology.connect(previous, peaking);
            previous = peaking;
        }
        let dry = topology.add(Stage::Gain(GainRole::Dry));
        topology.connect(previous, dry);

        let convolver = topology.add(Stage::Convolver);
        topology.connect(source, convolver);
        let wet = topology.add(Stage::Gain(GainRole::Wet));
        topology.connect(convolver, wet);

        let volume = topology.add(Stage::Gain(GainRole::Volume));
        topology.connect(dry, volume);
        topology.connect(wet, volume);

        let destination = topology.add(Stage::Destination);
        topology.connect(volume, destination);

        topology
    }

    fn add(&mut self, stage: Stage) -> StageId {
        self.stages.push(stage);
        self.stages.len() - 1
    }

    fn connect(&mut self, from: StageId, to: StageId) {
        self.edges.push((from, to));
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn edges(&self) -> &[(StageId, StageId)] {
        &self.edges
    }

    pub fn stage(&self, id: StageId) -> Option<&Stage> {
        self.stages.get(id)
    }

    /// Stages fed by `id`.
    pub fn outputs(&self, id: StageId) -> impl Iterator<Item = StageId> + '_ {
        self.edges
            .iter()
            .filter(move |(from, _)| *from == id)
            .map(|(_, to)| *to)
    }

    /// Stages feeding `id`.
    pub fn inputs(&self, id: StageId) -> impl Iterator<Item = StageId> + '_ {
        self.edges
            .iter()
            .filter(move |(_, to)| *to == id)
            .map(|(from, _)| *from)
    }

    pub fn find(&self, stage: &Stage) -> Option<StageId> {
        self.stages.iter().position(|candidate| candidate == stage)
    }

    pub fn rate(&self) -> f32 {
        self.stages
            .iter()
            .find_map(|stage| match stage {
                Stage::Source { rate } => Some(*rate),
                _ => None,
            })
            .unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eq_bands_run_in_series() {
        let topology = GraphTopology::new(1.0);
        let source = topology.find(&Stage::Source { rate: 1.0 }).expect("source");

        let mut current = source;
        for band in 0..EQ_BAND_COUNT {
            let next: Vec<StageId> = topology
                .outputs(current)
                .filter(|id| matches!(topology.stage(*id), Some(Stage::Peaking { .. })))
                .collect();
            assert_eq!(next.len(), 1);
            match topology.stage(next[0]) {
                Some(Stage::Peaking { band: b, freq_hz, q }) => {
                    assert_eq!(*b, band);
                    assert_eq!(*freq_hz, EQ_FREQUENCIES_HZ[band]);
                    assert_eq!(*q, 1.0);
                }
                other => panic!("unexpected stage {:?}", other),
            }
            current = next[0];
        }

        let dry = topology.find(&Stage::Gain(GainRole::Dry)).expect("dry");
        assert_eq!(topology.outputs(current).collect::<Vec<_>>(), vec![dry]);
    }

    #[test]
    fn dry_and_wet_sum_into_volume() {
        let topology = GraphTopology::new(0.85);
        let volume = topology.find(&Stage::Gain(GainRole::Volume)).expect("volume");
        let dry = topology.find(&Stage::Gain(GainRole::Dry)).expect("dry");
        let wet = topology.find(&Stage::Gain(GainRole::Wet)).expect("wet");
        let convolver = topology.find(&Stage::Convolver).expect("convolver");
        let source = topology.find(&Stage::Source { rate: 0.85 }).expect("source");
        let destination = topology.find(&Stage::Destination).expect("destination");

        let mut inputs: Vec<StageId> = topology.inputs(volume).collect();
        inputs.sort_unstable();
        assert_eq!(inputs, vec![dry, wet]);
        assert_eq!(topology.inputs(convolver).collect::<Vec<_>>(), vec![source]);
        assert_eq!(topology.outputs(volume).collect::<Vec<_>>(), vec![destination]);
        assert_eq!(topology.rate(), 0.85);
    }
}

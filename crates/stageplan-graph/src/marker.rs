//! Plan markers: zero-width operators that tag where a stage boundary must
//! occur, plus utilities that splice them into an existing graph.

use serde::{Deserialize, Serialize};
use std::fmt;

use stageplan_core::error::{Error, Result};
use stageplan_core::id::OperatorId;
use stageplan_core::schema::Schema;
use tracing::debug;

use crate::graph::OperatorGraph;
use crate::operator::{InputRef, Operator, OperatorKind, OutputRef, PortRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PlanMarker {
    /// Entry of the plan; the upstream side is an external input.
    Begin,
    /// Exit of the plan; the downstream side is an external output.
    End,
    /// Materialize the data between two stages.
    Checkpoint,
    /// Shuffle: group the data by key across stages.
    Gather,
    /// Replicate the data to every task of the downstream stage.
    Broadcast,
}

impl PlanMarker {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanMarker::Begin => "begin",
            PlanMarker::End => "end",
            PlanMarker::Checkpoint => "checkpoint",
            PlanMarker::Gather => "gather",
            PlanMarker::Broadcast => "broadcast",
        }
    }

    /// Whether the marker separates two stages of the plan, as opposed to
    /// sitting on the plan's outer edge.
    pub fn is_inter_stage(self) -> bool {
        !matches!(self, PlanMarker::Begin | PlanMarker::End)
    }
}

impl fmt::Display for PlanMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marker utilities.
pub struct PlanMarkers;

impl PlanMarkers {
    /// A detached marker operator with one `in` and one `out` port of `schema`.
    pub fn create(marker: PlanMarker, schema: Schema) -> Operator {
        Operator::builder(OperatorKind::Marker, marker.as_str())
            .input("in", schema.clone())
            .output("out", schema)
            .marker(marker)
            .build()
    }

    /// The marker tag of `operator`, or `None` for non-marker operators.
    pub fn get(operator: &Operator) -> Option<PlanMarker> {
        if operator.kind() == OperatorKind::Marker {
            operator.attributes().marker
        } else {
            None
        }
    }

    /// Splice a new marker into `port`.
    ///
    /// For an input port, everything that fed the port now feeds the marker
    /// and the marker feeds the port. For an output port, the marker takes
    /// over all of the port's downstream connections.
    pub fn insert(graph: &mut OperatorGraph, marker: PlanMarker, port: PortRef) -> Result<OperatorId> {
        match port {
            PortRef::Input(input) => {
                let schema = graph.input_schema(input)?.clone();
                let upstreams: Vec<OutputRef> = graph.upstream_of(input)?.iter().copied().collect();
                let id = graph.add(Self::create(marker, schema));
                for up in &upstreams {
                    graph.disconnect(*up, input);
                    graph.connect(*up, InputRef::new(id, 0))?;
                }
                graph.connect(OutputRef::new(id, 0), input)?;
                debug!(%marker, port = %input, marker_id = %id, "inserted marker before input");
                Ok(id)
            }
            PortRef::Output(output) => {
                let schema = graph.output_schema(output)?.clone();
                let downstreams: Vec<InputRef> =
                    graph.downstream_of(output)?.iter().copied().collect();
                let id = graph.add(Self::create(marker, schema));
                for down in &downstreams {
                    graph.disconnect(output, *down);
                    graph.connect(OutputRef::new(id, 0), *down)?;
                }
                graph.connect(output, InputRef::new(id, 0))?;
                debug!(%marker, port = %output, marker_id = %id, "inserted marker after output");
                Ok(id)
            }
        }
    }

    /// Insert a marker in the middle of the existing edge `upstream -> downstream`.
    pub fn insert_between(
        graph: &mut OperatorGraph,
        marker: PlanMarker,
        upstream: OutputRef,
        downstream: InputRef,
    ) -> Result<OperatorId> {
        if !graph.is_connected(upstream, downstream) {
            return Err(Error::NotConnected {
                upstream: upstream.to_string(),
                downstream: downstream.to_string(),
            });
        }
        let schema = graph.output_schema(upstream)?.clone();
        graph.disconnect(upstream, downstream);
        let id = graph.add(Self::create(marker, schema));
        graph.connect(upstream, InputRef::new(id, 0))?;
        graph.connect(OutputRef::new(id, 0), downstream)?;
        debug!(%marker, %upstream, %downstream, marker_id = %id, "inserted marker on edge");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fan_out() -> (OperatorGraph, OperatorId, OperatorId, OperatorId) {
        let schema = Schema::opaque("Record");
        let mut g = OperatorGraph::new();
        let src = g.add(
            Operator::builder(OperatorKind::Input, "src")
                .output("out", schema.clone())
                .build(),
        );
        let a = g.add(
            Operator::builder(OperatorKind::Output, "a")
                .input("in", schema.clone())
                .build(),
        );
        let b = g.add(
            Operator::builder(OperatorKind::Output, "b")
                .input("in", schema)
                .build(),
        );
        g.connect(OutputRef::new(src, 0), InputRef::new(a, 0)).unwrap();
        g.connect(OutputRef::new(src, 0), InputRef::new(b, 0)).unwrap();
        (g, src, a, b)
    }

    #[test]
    fn get_ignores_non_markers() {
        let op = Operator::builder(OperatorKind::Core, "x")
            .marker(PlanMarker::Gather)
            .build();
        assert_eq!(PlanMarkers::get(&op), None);
        let m = PlanMarkers::create(PlanMarker::Gather, Schema::opaque("R"));
        assert_eq!(PlanMarkers::get(&m), Some(PlanMarker::Gather));
    }

    #[test]
    fn insert_on_output_takes_all_downstreams() {
        let (mut g, src, a, b) = fan_out();
        let m = PlanMarkers::insert(&mut g, PlanMarker::Checkpoint, OutputRef::new(src, 0).into())
            .unwrap();
        assert_eq!(g.downstream(src).unwrap(), vec![m]);
        assert_eq!(g.downstream(m).unwrap(), vec![a, b]);
        g.validate().unwrap();
    }

    #[test]
    fn insert_on_input_only_touches_that_input() {
        let (mut g, src, a, b) = fan_out();
        let m = PlanMarkers::insert(&mut g, PlanMarker::Broadcast, InputRef::new(a, 0).into())
            .unwrap();
        assert_eq!(g.upstream(a).unwrap(), vec![m]);
        assert_eq!(g.upstream(b).unwrap(), vec![src]);
        assert_eq!(g.upstream(m).unwrap(), vec![src]);
        assert_eq!(g.output_schema(OutputRef::new(m, 0)).unwrap().name, "Record");
        g.validate().unwrap();
    }

    #[test]
    fn insert_between_requires_direct_edge() {
        let (mut g, src, a, _) = fan_out();
        let m = PlanMarkers::insert_between(
            &mut g,
            PlanMarker::Gather,
            OutputRef::new(src, 0),
            InputRef::new(a, 0),
        )
        .unwrap();
        let err = PlanMarkers::insert_between(
            &mut g,
            PlanMarker::Gather,
            OutputRef::new(src, 0),
            InputRef::new(a, 0),
        )
        .unwrap_err();
        assert!(matches!(err, Error::NotConnected { .. }));
        assert_eq!(g.upstream(a).unwrap(), vec![m]);
    }
}

//! Plain-text node and connection dumps.

use esk_types::{Delay, Extent, NodeId, Position};

/// One outgoing connection as recorded for dumping: the geometry needed to
/// compute the periodic displacement is supplied by the caller rather than
/// stored on the connection itself.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionRecord<const D: usize> {
    /// Presynaptic node.
    pub source: NodeId,
    /// Postsynaptic node.
    pub target: NodeId,
    /// Connection weight.
    pub weight: f64,
    /// Connection delay.
    pub delay: Delay,
}

fn format_position<const D: usize>(p: &Position<D>) -> String {
    (0..D)
        .map(|i| format!("{}", p.coord(i)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Format one node line: `node_id x y` or `node_id x y z`, no trailing
/// space.
pub fn format_node_line<const D: usize>(id: NodeId, pos: &Position<D>) -> String {
    format!("{} {}", id.raw(), format_position(pos))
}

/// Dump every local node as one line each, newline-separated.
pub fn dump_nodes<const D: usize>(nodes: &[(NodeId, Position<D>)]) -> String {
    nodes
        .iter()
        .map(|(id, pos)| format_node_line(*id, pos))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format one connection line: `source target weight delay dx dy[ dz]`,
/// where `dx…` is the displacement from source to target under `extent`'s
/// periodicity.
pub fn format_connection_line<const D: usize>(
    record: &ConnectionRecord<D>,
    source_pos: &Position<D>,
    target_pos: &Position<D>,
    extent: &Extent<D>,
) -> String {
    let d = extent.displacement(source_pos, target_pos);
    format!(
        "{} {} {} {} {}",
        record.source.raw(),
        record.target.raw(),
        record.weight,
        record.delay.steps(),
        format_position(&d)
    )
}

/// Dump every local outgoing connection as one line each.
pub fn dump_connections<const D: usize>(
    records: &[(ConnectionRecord<D>, Position<D>, Position<D>)],
    extent: &Extent<D>,
) -> String {
    records
        .iter()
        .map(|(record, source_pos, target_pos)| {
            format_connection_line(record, source_pos, target_pos, extent)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use esk_types::Position2;

    #[test]
    fn node_line_has_no_trailing_space() {
        let line = format_node_line(NodeId::new(5), &Position2::new([1.5, -2.0]));
        assert_eq!(line, "5 1.5 -2");
        assert!(!line.ends_with(' '));
    }

    #[test]
    fn connection_line_reports_periodic_displacement() {
        let extent = Extent::new([1.0, 1.0]).all_periodic();
        let record = ConnectionRecord {
            source: NodeId::new(1),
            target: NodeId::new(2),
            weight: 2.5,
            delay: Delay::new(3),
        };
        let a = Position2::new([0.1, 0.1]);
        let b = Position2::new([0.9, 0.9]);
        let line = format_connection_line(&record, &a, &b, &extent);
        assert_eq!(line, "1 2 2.5 3 -0.2 -0.2");
    }

    #[test]
    fn dump_nodes_joins_with_newlines() {
        let nodes = vec![
            (NodeId::new(1), Position2::new([0.0, 0.0])),
            (NodeId::new(2), Position2::new([1.0, 1.0])),
        ];
        let text = dump_nodes(&nodes);
        assert_eq!(text, "1 0 0\n2 1 1");
    }
}

//! Kernel facade: node collections, plain-text dumps, and the round-based
//! simulation driver that ties every lower-level component together.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod dump;
pub mod node_collection;
pub mod simulation;

pub use config::SimulationConfig;
pub use dump::{dump_connections, dump_nodes, format_connection_line, format_node_line, ConnectionRecord};
pub use node_collection::{MetadataValue, NodeCollection};
pub use simulation::{Population, Simulation};

//! Connection-time source bookkeeping and run-time event delivery (spec
//! §4.6, §4.7, components C6 and C7).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod event_delivery;
pub mod resize_log;
pub mod source_table;

pub use event_delivery::{dispatch, dispatch_with_growth, exchange, Deliverable, DispatchOutcome, Outbox, WaveformRelaxation};
pub use resize_log::{ResizeEntry, ResizeLog};
pub use source_table::{EntryPoint, Source, SourceTable, TargetData};

mod job;
mod queue;
mod renderer;
mod verify;
mod worker;

pub use job::{AggregateReport, ArchiveJob, PipelineSettings};
pub use queue::{JobTicket, QueueItem};
pub use renderer::{CommandRenderer, Renderer};
pub use worker::{WorkerContext, run_workers};

#[cfg(test)]
pub(crate) use renderer::testing;
#[cfg(test)]
pub(crate) use verify::contains_html_marker;
#[cfg(test)]
pub(crate) use worker::output_path_for;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use super::job::{ArchiveJob, PipelineSettings};
use super::queue::{JobQueue, JobTicket, QueueItem};
use super::renderer::Renderer;
use super::verify::{Verdict, verify};
use crate::error::FailureReason;
use crate::ui::ProgressObserver;

/// State shared by every worker of one run.
///
/// Each job sits in its own slot; only the worker that dequeued a ticket
/// writes to that slot.
pub struct WorkerContext<R: Renderer> {
    pub queue: JobQueue,
    pub jobs: Vec<Mutex<ArchiveJob>>,
    pub renderer: Arc<R>,
    pub observer: Arc<dyn ProgressObserver>,
    pub settings: PipelineSettings,
}

impl<R: Renderer> WorkerContext<R> {
    pub fn new(
        jobs: Vec<ArchiveJob>,
        renderer: Arc<R>,
        observer: Arc<dyn ProgressObserver>,
        settings: PipelineSettings,
    ) -> Self {
        let queue = JobQueue::bounded(jobs.len() + settings.pool_size.max(1));
        Self {
            queue,
            jobs: jobs.into_iter().map(Mutex::new).collect(),
            renderer,
            observer,
            settings,
        }
    }

    /// Copies the current job states out of their slots.
    pub fn jobs(&self) -> Vec<ArchiveJob> {
        self.jobs
            .iter()
            .map(|slot| match slot.lock() {
                Ok(job) => job.clone(),
                Err(poisoned) => poisoned.into_inner().clone(),
            })
            .collect()
    }

    fn record(&self, index: usize, output_path: Option<PathBuf>, verdict: Verdict) -> ArchiveJob {
        let mut job = match self.jobs[index].lock() {
            Ok(job) => job,
            Err(poisoned) => poisoned.into_inner(),
        };
        job.output_path = output_path;
        match verdict {
            Verdict::Success { .. } => job.mark_succeeded(),
            Verdict::Failure(reason) => job.mark_failed(reason),
        }
        job.clone()
    }
}

/// Derives `<output_dir>/<normalized_host>.html` from a URL.
///
/// Every character of `host[:port]` other than ASCII alphanumerics, `-` and
/// `_` becomes `_`, so `https://a.test/x` maps to `a_test.html`. The path
/// ignores everything but the host: two URLs on one host share a file.
pub fn output_path_for(url: &str, output_dir: &Path) -> Option<PathBuf> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str().filter(|h| !h.is_empty())?;
    let netloc = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    let name: String = netloc
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    Some(output_dir.join(format!("{name}.html")))
}

/// Spawns `pool_size` workers over the context's queue and waits for every
/// one of them to exit.
pub async fn run_workers<R: Renderer>(ctx: Arc<WorkerContext<R>>, pool_size: usize) {
    let handles: Vec<_> = (1..=pool_size)
        .map(|worker| tokio::spawn(worker_loop(ctx.clone(), worker)))
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        if let Err(e) = handle.await {
            warn!(worker = i + 1, error = %e, "worker task aborted");
        }
    }
}

async fn worker_loop<R: Renderer>(ctx: Arc<WorkerContext<R>>, worker: usize) {
    debug!(worker, "worker started");

    loop {
        let ticket = match ctx.queue.dequeue().await {
            QueueItem::Stop => break,
            QueueItem::Job(ticket) => ticket,
        };

        ctx.observer.job_started(worker, &ticket.url);

        let result = tokio::spawn(process_job(ctx.clone(), ticket.clone())).await;
        let fault = match result {
            Ok((path, verdict)) => {
                let job = ctx.record(ticket.index, path, verdict);
                ctx.observer.job_finished(worker, &job);
                None
            }
            Err(e) => Some(e.to_string()),
        };

        // Only a panicking job ends the worker; ordinary failures are per job.
        if let Some(reason) = fault {
            warn!(worker, url = %ticket.url, %reason, "worker fault, stopping this worker");
            let path = output_path_for(&ticket.url, &ctx.settings.output_dir);
            if let Some(path) = &path {
                let _ = tokio::fs::remove_file(path).await;
            }
            let job = ctx.record(
                ticket.index,
                path,
                Verdict::Failure(FailureReason::WorkerFault(reason)),
            );
            ctx.observer.job_finished(worker, &job);
            break;
        }

        sleep(ctx.settings.inter_request_delay).await;
    }

    ctx.observer.worker_stopped(worker);
    debug!(worker, "worker stopped");
}

async fn process_job<R: Renderer>(
    ctx: Arc<WorkerContext<R>>,
    ticket: JobTicket,
) -> (Option<PathBuf>, Verdict) {
    let Some(output_path) = output_path_for(&ticket.url, &ctx.settings.output_dir) else {
        warn!(url = %ticket.url, "cannot derive a file name, skipping");
        return (
            None,
            Verdict::Failure(FailureReason::InvalidUrl(ticket.url.clone())),
        );
    };

    let outcome = ctx
        .renderer
        .render(&ticket.url, &output_path, ctx.settings.timeout)
        .await;
    let verdict = verify(&outcome, &output_path).await;

    match &verdict {
        Verdict::Success { bytes } => {
            info!(url = %ticket.url, bytes, path = %output_path.display(), "archived")
        }
        Verdict::Failure(reason) => info!(url = %ticket.url, %reason, "archive failed"),
    }

    (Some(output_path), verdict)
}

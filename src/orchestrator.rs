use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use crate::error::ArchiveError;
use crate::pipeline::{
    AggregateReport, ArchiveJob, JobTicket, PipelineSettings, QueueItem, Renderer, WorkerContext,
    run_workers,
};
use crate::ui::{NoopProgress, ProgressObserver};

/// Drives a batch of URLs through the archive pipeline.
pub struct Archiver<R: Renderer> {
    renderer: Arc<R>,
    observer: Arc<dyn ProgressObserver>,
}

impl<R: Renderer> Archiver<R> {
    /// Create an archiver that reports progress nowhere.
    pub fn new(renderer: R) -> Self {
        Self::with_observer(renderer, Arc::new(NoopProgress))
    }

    pub fn with_observer(renderer: R, observer: Arc<dyn ProgressObserver>) -> Self {
        Self {
            renderer: Arc::new(renderer),
            observer,
        }
    }

    /// Archive every URL and aggregate the results.
    ///
    /// The renderer is health-checked first; if that fails nothing is touched and
    /// the report carries `tool_available = false` with zero jobs. Duplicate
    /// URLs are not collapsed: each gets its own job, and URLs sharing a host
    /// overwrite each other's file. A later failure on that host deletes the
    /// file an earlier job archived; the earlier job still counts as a success
    /// but adds no bytes.
    ///
    /// Returns `Err` only when the output directory cannot be created.
    pub async fn archive_all(
        &self,
        urls: &[String],
        settings: &PipelineSettings,
    ) -> Result<AggregateReport, ArchiveError> {
        let started_at = Utc::now();

        match self.renderer.check().await {
            Ok(version) => info!(%version, "renderer available"),
            Err(e) => {
                error!(error = %e, "renderer health check failed, aborting run");
                let report = AggregateReport::tool_unavailable(started_at, e.to_string());
                self.observer.run_finished(&report);
                return Ok(report);
            }
        }

        tokio::fs::create_dir_all(&settings.output_dir).await?;

        let jobs: Vec<ArchiveJob> = urls.iter().map(ArchiveJob::new).collect();
        let pool_size = settings.pool_size.max(1);
        info!(
            jobs = jobs.len(),
            workers = pool_size,
            output_dir = %settings.output_dir.display(),
            "starting archive run"
        );

        let ctx = Arc::new(WorkerContext::new(
            jobs,
            self.renderer.clone(),
            self.observer.clone(),
            settings.clone(),
        ));

        for (index, url) in urls.iter().enumerate() {
            let ticket = JobTicket {
                index,
                url: url.clone(),
            };
            ctx.queue.enqueue(QueueItem::Job(ticket)).await;
        }
        for _ in 0..pool_size {
            ctx.queue.enqueue(QueueItem::Stop).await;
        }
        ctx.queue.close();

        self.observer.run_started(urls.len(), pool_size);
        run_workers(ctx.clone(), pool_size).await;

        let report = AggregateReport::from_jobs(&ctx.jobs(), started_at);
        info!(
            succeeded = report.success_count,
            failed = report.failure_count,
            bytes = report.total_bytes_downloaded,
            "archive run finished"
        );
        self.observer.run_finished(&report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureReason;
    use crate::pipeline::testing::{FakeBehavior, FakeRenderer, html_page};
    use crate::pipeline::{contains_html_marker, output_path_for};
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;

    fn settings(dir: &Path, pool_size: usize) -> PipelineSettings {
        PipelineSettings {
            output_dir: dir.to_path_buf(),
            pool_size,
            timeout: Duration::from_secs(5),
            inter_request_delay: Duration::ZERO,
        }
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|u| u.to_string()).collect()
    }

    #[tokio::test]
    async fn success_and_timeout_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = FakeRenderer::new(FakeBehavior::Html(500))
            .on("https://b.test/", FakeBehavior::Timeout);
        let archiver = Archiver::new(renderer);

        let report = archiver
            .archive_all(&urls(&["https://a.test/", "https://b.test/"]), &settings(dir.path(), 2))
            .await
            .unwrap();

        assert_eq!(report.total_jobs, 2);
        assert_eq!(report.success_count, 1);
        assert_eq!(report.failure_count, 1);
        assert_eq!(report.failed_urls, vec!["https://b.test/".to_string()]);
        assert_eq!(report.total_bytes_downloaded, 500);
        assert!(dir.path().join("a_test.html").exists());
        assert!(!dir.path().join("b_test.html").exists());
    }

    #[tokio::test]
    async fn unavailable_tool_aborts_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("archive");
        let renderer = FakeRenderer::unavailable();
        let archiver = Archiver::new(renderer);

        let report = archiver
            .archive_all(&urls(&["https://a.test/"]), &settings(&out, 2))
            .await
            .unwrap();

        assert_eq!(report.total_jobs, 0);
        assert!(!report.tool_available);
        assert!(report.tool_error.is_some());
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn every_job_has_exactly_one_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = FakeRenderer::new(FakeBehavior::Html(300))
            .on("https://fail.test/", FakeBehavior::Fail("net::ERR_NAME_NOT_RESOLVED".into()))
            .on("https://empty.test/", FakeBehavior::Raw(Vec::new()))
            .on("https://json.test/", FakeBehavior::Raw(b"{\"ok\":false}".to_vec()))
            .on("https://none.test/", FakeBehavior::Nothing)
            .on("https://slow.test/", FakeBehavior::Timeout);
        let archiver = Archiver::new(renderer);
        let input = urls(&[
            "https://ok1.test/",
            "https://fail.test/",
            "https://empty.test/",
            "https://ok2.test/a",
            "https://json.test/",
            "https://none.test/",
            "https://slow.test/",
        ]);

        let report = archiver
            .archive_all(&input, &settings(dir.path(), 3))
            .await
            .unwrap();

        assert_eq!(report.success_count + report.failure_count, input.len());
        assert_eq!(report.success_count, 2);

        for url in &input {
            let path = output_path_for(url, dir.path()).unwrap();
            if report.failed_urls.contains(url) {
                assert!(!path.exists(), "failed job left {}", path.display());
            } else {
                let content = std::fs::read(&path).unwrap();
                assert!(!content.is_empty());
                assert!(contains_html_marker(&content));
            }
        }

        let reasons: Vec<_> = report.failures.iter().map(|f| f.reason.clone()).collect();
        assert!(reasons.contains(&FailureReason::EmptyOutput));
        assert!(reasons.contains(&FailureReason::InvalidContent));
        assert!(reasons.contains(&FailureReason::MissingOutput));
        assert!(reasons.contains(&FailureReason::Timeout { millis: 5000 }));
        assert!(reasons.contains(&FailureReason::Subprocess("net::ERR_NAME_NOT_RESOLVED".into())));
    }

    #[tokio::test]
    async fn same_host_urls_share_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = FakeRenderer::new(FakeBehavior::Html(100))
            .on("https://x.test/p2", FakeBehavior::Html(400));
        let archiver = Archiver::new(renderer);

        // One worker keeps the write order deterministic.
        let report = archiver
            .archive_all(&urls(&["http://x.test/p1", "https://x.test/p2"]), &settings(dir.path(), 1))
            .await
            .unwrap();

        assert_eq!(report.success_count, 2);
        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        let content = std::fs::read(dir.path().join("x_test.html")).unwrap();
        assert_eq!(content, html_page(400));
        // Both successes are sized from the surviving file.
        assert_eq!(report.total_bytes_downloaded, 800);
    }

    #[tokio::test]
    async fn same_host_failure_removes_earlier_success() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = FakeRenderer::new(FakeBehavior::Html(100))
            .on("https://x.test/p2", FakeBehavior::Fail("blocked".into()));
        let archiver = Archiver::new(renderer);

        let report = archiver
            .archive_all(&urls(&["http://x.test/p1", "https://x.test/p2"]), &settings(dir.path(), 1))
            .await
            .unwrap();

        // p1 stays a success even though p2's cleanup removed the shared file.
        assert_eq!(report.success_count, 1);
        assert_eq!(report.failed_urls, vec!["https://x.test/p2".to_string()]);
        assert!(!dir.path().join("x_test.html").exists());
        assert_eq!(report.total_bytes_downloaded, 0);
    }

    #[tokio::test]
    async fn rerun_gives_same_classification() {
        let input = urls(&["https://a.test/", "https://b.test/", "https://c.test/"]);
        let mut runs = Vec::new();
        for _ in 0..2 {
            let dir = tempfile::tempdir().unwrap();
            let renderer = FakeRenderer::new(FakeBehavior::Html(64))
                .on("https://b.test/", FakeBehavior::Fail("boom".into()));
            let report = Archiver::new(renderer)
                .archive_all(&input, &settings(dir.path(), 2))
                .await
                .unwrap();
            runs.push((report.success_count, report.failed_urls));
        }
        assert_eq!(runs[0], runs[1]);
        assert_eq!(runs[0].1, vec!["https://b.test/".to_string()]);
    }

    #[tokio::test]
    async fn empty_input_still_checks_tool() {
        let dir = tempfile::tempdir().unwrap();
        let report = Archiver::new(FakeRenderer::new(FakeBehavior::Html(10)))
            .archive_all(&[], &settings(dir.path(), 4))
            .await
            .unwrap();
        assert_eq!(report.total_jobs, 0);
        assert!(report.tool_available);
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ProgressObserver for Recorder {
        fn run_started(&self, total_jobs: usize, pool_size: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("run {total_jobs}/{pool_size}"));
        }
        fn job_finished(&self, _worker: usize, job: &ArchiveJob) {
            self.events
                .lock()
                .unwrap()
                .push(format!("{} {}", job.url, job.succeeded));
        }
        fn worker_stopped(&self, worker: usize) {
            self.events.lock().unwrap().push(format!("stop {worker}"));
        }
        fn run_finished(&self, report: &AggregateReport) {
            self.events
                .lock()
                .unwrap()
                .push(format!("done {}", report.total_jobs));
        }
    }

    #[tokio::test]
    async fn observer_sees_lifecycle_events() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(Recorder::default());
        let archiver = Archiver::with_observer(
            FakeRenderer::new(FakeBehavior::Html(50)),
            recorder.clone(),
        );

        archiver
            .archive_all(&urls(&["https://a.test/"]), &settings(dir.path(), 2))
            .await
            .unwrap();

        let events = recorder.events.lock().unwrap().clone();
        assert_eq!(events.first().unwrap(), "run 1/2");
        assert!(events.contains(&"https://a.test/ true".to_string()));
        assert!(events.contains(&"stop 1".to_string()));
        assert!(events.contains(&"stop 2".to_string()));
        assert_eq!(events.last().unwrap(), "done 1");
    }
}

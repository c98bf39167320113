use std::io::ErrorKind;
use std::path::Path;

use tracing::warn;

use super::renderer::RenderOutcome;
use crate::error::FailureReason;

const HTML_MARKER: &[u8] = b"<html";

/// Judgement on a finished render attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Success { bytes: u64 },
    Failure(FailureReason),
}

impl Verdict {
    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::Success { .. })
    }
}

/// Decides whether a render attempt produced a usable archive.
///
/// Checks, in order: process exit, file presence, non-zero size and an
/// `<html` marker (case-insensitive). On any failure the output file is
/// removed so no partial artifact survives. Must only be called once the
/// renderer process is gone.
pub async fn verify(outcome: &RenderOutcome, output_path: &Path) -> Verdict {
    let verdict = judge(outcome, output_path).await;
    if !verdict.is_success() {
        discard(output_path).await;
    }
    verdict
}

async fn judge(outcome: &RenderOutcome, output_path: &Path) -> Verdict {
    if let Some(deadline) = outcome.timed_out_after {
        return Verdict::Failure(FailureReason::Timeout {
            millis: deadline.as_millis() as u64,
        });
    }
    if !outcome.is_clean_exit() {
        return Verdict::Failure(FailureReason::Subprocess(outcome.error_message()));
    }

    let meta = match tokio::fs::metadata(output_path).await {
        Ok(meta) if meta.is_file() => meta,
        Ok(_) => return Verdict::Failure(FailureReason::MissingOutput),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Verdict::Failure(FailureReason::MissingOutput);
        }
        Err(e) => return Verdict::Failure(FailureReason::Unreadable(e.to_string())),
    };
    if meta.len() == 0 {
        return Verdict::Failure(FailureReason::EmptyOutput);
    }

    let content = match tokio::fs::read(output_path).await {
        Ok(content) => content,
        Err(e) => return Verdict::Failure(FailureReason::Unreadable(e.to_string())),
    };
    if !contains_html_marker(&content) {
        return Verdict::Failure(FailureReason::InvalidContent);
    }

    Verdict::Success { bytes: meta.len() }
}

/// Case-insensitive search for `<html`.
pub fn contains_html_marker(content: &[u8]) -> bool {
    content
        .windows(HTML_MARKER.len())
        .any(|w| w.eq_ignore_ascii_case(HTML_MARKER))
}

async fn discard(output_path: &Path) {
    match tokio::fs::remove_file(output_path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %output_path.display(), error = %e, "failed to remove rejected output"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn clean() -> RenderOutcome {
        RenderOutcome::exited(0, String::new(), String::new())
    }

    #[test]
    fn marker_is_case_insensitive() {
        assert!(contains_html_marker(b"<!doctype html><HTML lang=en>"));
        assert!(contains_html_marker(b"<html>"));
        assert!(!contains_html_marker(b"<htm"));
        assert!(!contains_html_marker(b"{\"html\": true}"));
        assert!(!contains_html_marker(b""));
    }

    #[tokio::test]
    async fn valid_file_passes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a_test.html");
        std::fs::write(&path, "<html><body>hi</body></html>").unwrap();

        let verdict = verify(&clean(), &path).await;
        assert_eq!(verdict, Verdict::Success { bytes: 28 });
        assert!(path.exists());
    }

    #[tokio::test]
    async fn nonzero_exit_fails_and_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a_test.html");
        std::fs::write(&path, "<html>partial").unwrap();

        let outcome = RenderOutcome::exited(1, "progress".into(), "browser crashed".into());
        let verdict = verify(&outcome, &path).await;

        assert_eq!(
            verdict,
            Verdict::Failure(FailureReason::Subprocess("browser crashed".into()))
        );
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn timeout_fails_and_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b_test.html");
        std::fs::write(&path, "<html>").unwrap();

        let verdict = verify(&RenderOutcome::timed_out(Duration::from_secs(180)), &path).await;
        assert_eq!(verdict, Verdict::Failure(FailureReason::Timeout { millis: 180_000 }));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let verdict = verify(&clean(), &dir.path().join("none.html")).await;
        assert_eq!(verdict, Verdict::Failure(FailureReason::MissingOutput));
    }

    #[tokio::test]
    async fn empty_file_fails_and_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.html");
        std::fs::write(&path, "").unwrap();

        assert_eq!(
            verify(&clean(), &path).await,
            Verdict::Failure(FailureReason::EmptyOutput)
        );
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn content_without_marker_fails_and_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("json.html");
        std::fs::write(&path, "{\"error\": \"blocked\"}").unwrap();

        assert_eq!(
            verify(&clean(), &path).await,
            Verdict::Failure(FailureReason::InvalidContent)
        );
        assert!(!path.exists());
    }
}

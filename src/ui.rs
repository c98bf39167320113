//! Interface de terminal do pagevault — barras de progresso e saída colorida.
//!
//! Usa `indicatif` para a barra geral e os spinners por worker, e `console`
//! para estilização com cores. O pipeline apenas notifica o
//! [`ProgressObserver`]; nada é lido de volta dele.

use std::sync::Mutex;
use std::time::Duration;

use console::Style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::pipeline::{AggregateReport, ArchiveJob};
use crate::snapshot::SnapshotReport;

/// Recebe os eventos do pipeline para exibição ao usuário.
///
/// Todos os métodos são no-op por padrão.
pub trait ProgressObserver: Send + Sync {
    fn run_started(&self, _total_jobs: usize, _pool_size: usize) {}
    fn job_started(&self, _worker: usize, _url: &str) {}
    fn job_finished(&self, _worker: usize, _job: &ArchiveJob) {}
    fn worker_stopped(&self, _worker: usize) {}
    fn run_finished(&self, _report: &AggregateReport) {}
}

/// Observador que ignora todos os eventos.
pub struct NoopProgress;

impl ProgressObserver for NoopProgress {}

struct Bars {
    // Barra geral de jobs concluídos.
    total: ProgressBar,
    // Um spinner por worker, indexado pelo ordinal - 1.
    workers: Vec<ProgressBar>,
}

/// Indicador visual de progresso de uma execução no terminal.
///
/// Exibe uma barra geral e um spinner por worker, com mensagens coloridas
/// para sucesso (verde) e falha (vermelho).
pub struct TerminalProgress {
    // Agrupa as barras do indicatif.
    multi: MultiProgress,
    // Criadas em `run_started`, quando o tamanho do pool é conhecido.
    bars: Mutex<Option<Bars>>,
    // Estilo verde para mensagens de sucesso.
    green: Style,
    // Estilo vermelho para mensagens de falha.
    red: Style,
    // Estilo amarelo para o início de um job.
    yellow: Style,
    // Estilo azul para workers encerrados.
    blue: Style,
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(None),
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            blue: Style::new().blue(),
        }
    }

    fn with_bars(&self, f: impl FnOnce(&Bars)) {
        let guard = match self.bars.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(bars) = guard.as_ref() {
            f(bars);
        }
    }

    fn worker_bar<'a>(bars: &'a Bars, worker: usize) -> Option<&'a ProgressBar> {
        bars.workers.get(worker.checked_sub(1)?)
    }
}

impl ProgressObserver for TerminalProgress {
    fn run_started(&self, total_jobs: usize, pool_size: usize) {
        let total = self.multi.add(ProgressBar::new(total_jobs as u64));
        total.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.magenta} {msg} [{bar:40.cyan/blue}] {pos}/{len} {percent:>3}% ({elapsed_precise}, eta {eta})")
                .expect("invalid template")
                .progress_chars("=> "),
        );
        total.set_message("Overall");
        total.enable_steady_tick(Duration::from_millis(100));

        let spinner_style = ProgressStyle::default_spinner()
            .template("  {spinner:.blue} {prefix:.blue} {msg}")
            .expect("invalid template");
        let workers = (1..=pool_size)
            .map(|worker| {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(spinner_style.clone());
                pb.set_prefix(format!("Worker {worker}"));
                pb.set_message("idle");
                pb.enable_steady_tick(Duration::from_millis(100));
                pb
            })
            .collect();

        let mut guard = match self.bars.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(Bars { total, workers });
    }

    fn job_started(&self, worker: usize, url: &str) {
        self.with_bars(|bars| {
            if let Some(pb) = Self::worker_bar(bars, worker) {
                pb.set_message(url.to_string());
            }
            bars.total.println(format!(
                "[Worker {worker}] {} {url}",
                self.yellow.apply_to("⏳ start")
            ));
        });
    }

    fn job_finished(&self, worker: usize, job: &ArchiveJob) {
        self.with_bars(|bars| {
            let line = if job.succeeded {
                format!("[Worker {worker}] {} {}", self.green.apply_to("✓"), job.url)
            } else {
                let reason = job
                    .failure
                    .as_ref()
                    .map(|r| r.to_string())
                    .unwrap_or_default();
                format!(
                    "[Worker {worker}] {} {} ({reason})",
                    self.red.apply_to("✗"),
                    job.url
                )
            };
            bars.total.println(line);
            bars.total.inc(1);
            if let Some(pb) = Self::worker_bar(bars, worker) {
                pb.set_message("idle");
            }
        });
    }

    fn worker_stopped(&self, worker: usize) {
        self.with_bars(|bars| {
            if let Some(pb) = Self::worker_bar(bars, worker) {
                pb.finish_with_message(format!("{}", self.blue.apply_to("done")));
            }
        });
    }

    fn run_finished(&self, _report: &AggregateReport) {
        let mut guard = match self.bars.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(bars) = guard.take() {
            for pb in &bars.workers {
                pb.finish_and_clear();
            }
            bars.total.finish();
        }
    }
}

/// Formata bytes como megabytes com duas casas decimais.
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

/// Imprime o resumo final da execução.
pub fn print_summary(report: &AggregateReport) {
    let green = Style::new().green().bold();
    let red = Style::new().red().bold();
    let yellow = Style::new().yellow();

    println!();
    println!("{}", Style::new().bold().apply_to("─── Archive Report ───"));
    if !report.tool_available {
        println!(
            "  {} Renderer unavailable: {}",
            red.apply_to("✗"),
            report.tool_error.as_deref().unwrap_or("unknown error")
        );
        return;
    }

    println!("  {} Archived: {}", green.apply_to("✓"), report.success_count);
    println!("  {} Failed:   {}", red.apply_to("✗"), report.failure_count);
    if report.success_count > 0 {
        println!(
            "  Total size: {}",
            format_megabytes(report.total_bytes_downloaded)
        );
    }
    println!("  Duration: {:.1}s", report.duration_ms as f64 / 1000.0);

    if !report.failures.is_empty() {
        println!();
        println!("{}", yellow.apply_to("Failed URLs:"));
        for failure in &report.failures {
            println!("  • {} ({})", failure.url, failure.reason);
        }
    }
}

/// Imprime o relatório como JSON formatado.
pub fn print_json(report: &AggregateReport) {
    println!(
        "{}",
        serde_json::to_string_pretty(report).unwrap_or_default()
    );
}

/// Imprime o resultado da cópia HTTP bruta.
pub fn print_snapshot_summary(report: &SnapshotReport) {
    let green = Style::new().green();
    let red = Style::new().red();

    println!();
    println!("{}", Style::new().bold().apply_to("─── Snapshot Pass ───"));
    for path in &report.saved {
        println!("  {} {}", green.apply_to("✓"), path.display());
    }
    for (url, error) in &report.failed {
        println!("  {} {url}: {error}", red.apply_to("✗"));
    }
}

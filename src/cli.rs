//! Interface de linha de comando do pagevault baseada em clap.
//!
//! Define a struct [`Cli`] com flags globais (--config, --verbose) e os
//! subcomandos [`Command`] (archive, check, snapshot).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::ArchiverConfig;

/// pagevault — arquiva páginas web em arquivos HTML autocontidos.
#[derive(Debug, Parser)]
#[command(name = "pagevault", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho para um arquivo de configuração TOML (padrão: ./pagevault.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita logs de depuração (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Origem das URLs a processar.
#[derive(Debug, Args)]
pub struct UrlSource {
    /// URLs a processar.
    pub urls: Vec<String>,

    /// Arquivo com URLs: array JSON, `{"urls": [...]}` ou uma URL por linha.
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Pasta de destino.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Renderiza cada URL em `<output-dir>/<host>.html` com o renderizador externo.
    Archive {
        #[command(flatten)]
        source: UrlSource,

        /// Número de workers concorrentes.
        #[arg(long)]
        workers: Option<usize>,

        /// Prazo do renderizador por página, em segundos.
        #[arg(long)]
        timeout: Option<u64>,

        /// Pausa após cada página, em segundos.
        #[arg(long)]
        delay: Option<f64>,

        /// Executável do renderizador.
        #[arg(long)]
        renderer: Option<String>,

        /// Também salva uma cópia HTTP bruta de cada página.
        #[arg(long, default_value_t = false)]
        snapshot: bool,

        /// Imprime o relatório final em JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Verifica se o renderizador pode ser executado.
    Check {
        /// Executável do renderizador.
        #[arg(long)]
        renderer: Option<String>,
    },

    /// Salva cópias HTTP brutas das páginas sem o renderizador.
    Snapshot {
        #[command(flatten)]
        source: UrlSource,
    },
}

impl Command {
    /// Aplica as flags da linha de comando sobre a configuração carregada.
    pub fn apply_overrides(&self, config: &mut ArchiverConfig) {
        match self {
            Command::Archive {
                source,
                workers,
                timeout,
                delay,
                renderer,
                snapshot,
                ..
            } => {
                source.apply_overrides(config);
                if let Some(workers) = workers {
                    config.workers = *workers;
                }
                if let Some(timeout) = timeout {
                    config.timeout_secs = *timeout;
                }
                if let Some(delay) = delay {
                    config.delay_secs = *delay;
                }
                if let Some(renderer) = renderer {
                    config.renderer = renderer.clone();
                }
                if *snapshot {
                    config.snapshot = true;
                }
            }
            Command::Check { renderer } => {
                if let Some(renderer) = renderer {
                    config.renderer = renderer.clone();
                }
            }
            Command::Snapshot { source } => source.apply_overrides(config),
        }
    }
}

impl UrlSource {
    fn apply_overrides(&self, config: &mut ArchiverConfig) {
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_archive_subcommand() {
        let cli = Cli::parse_from([
            "pagevault",
            "archive",
            "https://a.test/",
            "https://b.test/",
            "--workers",
            "2",
            "--delay",
            "0.5",
        ]);
        match cli.command {
            Command::Archive {
                source,
                workers,
                delay,
                snapshot,
                ..
            } => {
                assert_eq!(source.urls, vec!["https://a.test/", "https://b.test/"]);
                assert!(source.file.is_none());
                assert_eq!(workers, Some(2));
                assert_eq!(delay, Some(0.5));
                assert!(!snapshot);
            }
            _ => panic!("expected Archive command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from(["pagevault", "--config", "alt.toml", "-v", "check"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
        assert!(matches!(cli.command, Command::Check { renderer: None }));
    }

    #[test]
    fn cli_parses_snapshot_subcommand() {
        let cli = Cli::parse_from(["pagevault", "snapshot", "--file", "urls.txt"]);
        match cli.command {
            Command::Snapshot { source } => {
                assert_eq!(source.file, Some(PathBuf::from("urls.txt")));
                assert!(source.urls.is_empty());
            }
            _ => panic!("expected Snapshot command"),
        }
    }

    #[test]
    fn overrides_replace_config_values() {
        let cli = Cli::parse_from([
            "pagevault",
            "archive",
            "--file",
            "urls.json",
            "--output-dir",
            "pages",
            "--timeout",
            "60",
            "--renderer",
            "/usr/local/bin/single-file",
            "--snapshot",
        ]);
        let mut config = ArchiverConfig::default();
        cli.command.apply_overrides(&mut config);

        assert_eq!(config.output_dir, PathBuf::from("pages"));
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.renderer, "/usr/local/bin/single-file");
        assert!(config.snapshot);
        assert_eq!(config.workers, 10);
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}

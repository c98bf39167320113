//! Configuração do pagevault carregada a partir de `pagevault.toml`.
//!
//! A struct [`ArchiverConfig`] contém todos os parâmetros de uma execução.
//! Chaves ausentes no arquivo usam defaults. A variável de ambiente
//! `PAGEVAULT_RENDERER` tem precedência sobre o arquivo para o renderizador;
//! as flags da CLI têm precedência sobre ambos.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ArchiveError;
use crate::pipeline::{CommandRenderer, PipelineSettings};

/// Nome do arquivo procurado no diretório de trabalho.
pub const CONFIG_FILE: &str = "pagevault.toml";

/// Variável de ambiente que sobrescreve [`ArchiverConfig::renderer`].
pub const RENDERER_ENV: &str = "PAGEVAULT_RENDERER";

/// Configuração de nível superior carregada de `pagevault.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiverConfig {
    /// Caminho ou nome do executável do renderizador.
    #[serde(default = "default_renderer")]
    pub renderer: String,

    /// Argumentos colocados antes da URL, ex.: `["single-file"]` com
    /// `renderer = "npx"`.
    #[serde(default)]
    pub renderer_prefix_args: Vec<String>,

    /// Flags passadas após `<url> <output>` em toda renderização.
    #[serde(default = "default_renderer_args")]
    pub renderer_args: Vec<String>,

    /// Número de workers concorrentes.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Prazo por job para o processo do renderizador, em segundos.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Pausa de cada worker após terminar um job, em segundos.
    #[serde(default = "default_delay_secs")]
    pub delay_secs: f64,

    /// Pasta de destino das páginas arquivadas.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Também salva uma cópia HTTP bruta de cada página após a renderização.
    #[serde(default)]
    pub snapshot: bool,

    /// Timeout das requisições da cópia HTTP bruta.
    #[serde(default = "default_snapshot_timeout_secs")]
    pub snapshot_timeout_secs: u64,
}

// Renderizador padrão: "single-file".
fn default_renderer() -> String {
    "single-file".to_string()
}

fn default_renderer_args() -> Vec<String> {
    vec![
        "--browser-headless".to_string(),
        "--browser-wait-until".to_string(),
        "load".to_string(),
    ]
}

// Valor padrão de workers: 10.
fn default_workers() -> usize {
    10
}

// Valor padrão do prazo: 180s.
fn default_timeout_secs() -> u64 {
    180
}

// Valor padrão da pausa: 1s.
fn default_delay_secs() -> f64 {
    1.0
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("OUTPUT")
}

fn default_snapshot_timeout_secs() -> u64 {
    30
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self {
            renderer: default_renderer(),
            renderer_prefix_args: Vec::new(),
            renderer_args: default_renderer_args(),
            workers: default_workers(),
            timeout_secs: default_timeout_secs(),
            delay_secs: default_delay_secs(),
            output_dir: default_output_dir(),
            snapshot: false,
            snapshot_timeout_secs: default_snapshot_timeout_secs(),
        }
    }
}

impl ArchiverConfig {
    /// Carrega a configuração de `path`, ou de `pagevault.toml` no diretório
    /// atual quando nenhum caminho é informado.
    ///
    /// Um caminho explícito precisa existir; o implícito usa os defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Path::new(CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_renderer_override(std::env::var(RENDERER_ENV).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = toml::from_str::<ArchiverConfig>(&contents)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Substitui o renderizador por um valor não vazio.
    pub fn apply_renderer_override(&mut self, value: Option<String>) {
        if let Some(renderer) = value
            && !renderer.trim().is_empty()
        {
            self.renderer = renderer;
        }
    }

    /// Monta a invocação do renderizador descrita por esta configuração.
    pub fn command_renderer(&self) -> CommandRenderer {
        CommandRenderer::new(self.renderer.clone(), self.renderer_args.clone())
            .with_prefix_args(self.renderer_prefix_args.clone())
    }

    /// Valida os parâmetros do pool e os converte em [`PipelineSettings`].
    pub fn pipeline_settings(&self) -> Result<PipelineSettings, ArchiveError> {
        if self.workers == 0 {
            return Err(ArchiveError::Config("workers must be at least 1".into()));
        }
        if self.timeout_secs == 0 {
            return Err(ArchiveError::Config(
                "timeout_secs must be at least 1".into(),
            ));
        }
        if !self.delay_secs.is_finite() || self.delay_secs < 0.0 {
            return Err(ArchiveError::Config(format!(
                "delay_secs must be a non-negative number, got {}",
                self.delay_secs
            )));
        }

        Ok(PipelineSettings {
            output_dir: self.output_dir.clone(),
            pool_size: self.workers,
            timeout: Duration::from_secs(self.timeout_secs),
            inter_request_delay: Duration::from_secs_f64(self.delay_secs),
        })
    }
}

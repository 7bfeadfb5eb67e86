//! Configuração do tailpool carregada a partir de `tailpool.toml`.
//!
//! A struct [`TailpoolConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis de ambiente `TAILPOOL_POOL_SIZE` e `TAILPOOL_COMMAND` têm
//! precedência sobre o arquivo; flags da CLI têm precedência sobre ambas.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::dispatcher::DispatchOptions;
use crate::error::TailpoolError;

const DEFAULT_CONFIG_FILE: &str = "tailpool.toml";

/// Configuração de nível superior carregada de `tailpool.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct TailpoolConfig {
    /// Número de workers concorrentes por lote.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Jobs por ciclo no modo contínuo.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pausa entre lotes do modo contínuo, em segundos.
    #[serde(default = "default_batch_delay_secs")]
    pub batch_delay_secs: u64,

    /// Máximo de ciclos no modo contínuo (0 = ilimitado).
    #[serde(default)]
    pub max_cycles: u64,

    /// Tempo máximo de um handler antes de contar como falha.
    #[serde(default = "default_handler_timeout_secs")]
    pub handler_timeout_secs: u64,

    /// Intervalo de verificação enquanto a sessão está pausada.
    #[serde(default = "default_pause_poll_ms")]
    pub pause_poll_ms: u64,

    /// Intervalo entre leituras do arquivo monitorado.
    #[serde(default = "default_import_poll_ms")]
    pub import_poll_ms: u64,

    /// Lista estática de itens, um por linha.
    #[serde(default = "default_targets_file")]
    pub targets_file: PathBuf,

    /// Arquivo seguido em tempo real pelo modo `watch`.
    #[serde(default = "default_watch_file")]
    pub watch_file: PathBuf,

    /// Se verdadeiro, linhas já existentes no arquivo monitorado também são importadas.
    #[serde(default)]
    pub import_existing: bool,

    /// Regexes que classificam um item como tipo A.
    #[serde(default)]
    pub kind_a_patterns: Vec<String>,

    /// Regexes que classificam um item como tipo B.
    #[serde(default)]
    pub kind_b_patterns: Vec<String>,

    /// Programa (e argumentos) executado por job; ausente = dry run.
    #[serde(default)]
    pub command: Option<Vec<String>>,
}

// Valor padrão para o tamanho do pool: 5.
fn default_pool_size() -> usize {
    5
}

// Valor padrão para o tamanho do lote: 10.
fn default_batch_size() -> usize {
    10
}

// Valor padrão para a pausa entre lotes: 30s.
fn default_batch_delay_secs() -> u64 {
    30
}

// Valor padrão para o timeout do handler: 30s.
fn default_handler_timeout_secs() -> u64 {
    30
}

fn default_pause_poll_ms() -> u64 {
    1000
}

fn default_import_poll_ms() -> u64 {
    2000
}

fn default_targets_file() -> PathBuf {
    PathBuf::from("targets.txt")
}

fn default_watch_file() -> PathBuf {
    PathBuf::from("watch.txt")
}

impl Default for TailpoolConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            batch_size: default_batch_size(),
            batch_delay_secs: default_batch_delay_secs(),
            max_cycles: 0,
            handler_timeout_secs: default_handler_timeout_secs(),
            pause_poll_ms: default_pause_poll_ms(),
            import_poll_ms: default_import_poll_ms(),
            targets_file: default_targets_file(),
            watch_file: default_watch_file(),
            import_existing: false,
            kind_a_patterns: Vec::new(),
            kind_b_patterns: Vec::new(),
            command: None,
        }
    }
}

impl TailpoolConfig {
    /// Carrega a configuração de `path`, ou de `tailpool.toml` no diretório atual.
    /// Usa valores padrão se o arquivo padrão não existir; um caminho explícito
    /// inexistente é erro. Não valida: a validação acontece em
    /// [`TailpoolConfig::override_with`], depois das flags da CLI.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = toml::from_str::<TailpoolConfig>(&contents).map_err(TailpoolError::from)?;
        Ok(config)
    }

    // Variáveis de ambiente têm precedência sobre o arquivo de configuração.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), TailpoolError> {
        if let Some(raw) = var("TAILPOOL_POOL_SIZE")
            && !raw.trim().is_empty()
        {
            self.pool_size = raw.trim().parse().map_err(|_| {
                TailpoolError::Config(format!("TAILPOOL_POOL_SIZE must be an integer, got `{raw}`"))
            })?;
        }
        if let Some(raw) = var("TAILPOOL_COMMAND") {
            let argv = split_command(&raw);
            if !argv.is_empty() {
                self.command = Some(argv);
            }
        }
        Ok(())
    }

    /// Aplica as flags da CLI (precedência máxima) e valida o resultado.
    pub fn override_with(
        &mut self,
        pool_size: Option<usize>,
        timeout_secs: Option<u64>,
        command: Option<Vec<String>>,
    ) -> Result<(), TailpoolError> {
        if let Some(pool_size) = pool_size {
            self.pool_size = pool_size;
        }
        if let Some(timeout_secs) = timeout_secs {
            self.handler_timeout_secs = timeout_secs;
        }
        if let Some(command) = command.filter(|argv| !argv.is_empty()) {
            self.command = Some(command);
        }
        self.validate()
    }

    fn validate(&self) -> Result<(), TailpoolError> {
        if self.pool_size == 0 {
            return Err(TailpoolError::Config("pool_size must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(TailpoolError::Config("batch_size must be at least 1".into()));
        }
        if self.handler_timeout_secs == 0 {
            return Err(TailpoolError::Config(
                "handler_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            pool_size: self.pool_size,
            handler_timeout: Duration::from_secs(self.handler_timeout_secs),
            pause_poll: Duration::from_millis(self.pause_poll_ms.max(1)),
        }
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_secs(self.batch_delay_secs)
    }

    pub fn import_poll(&self) -> Duration {
        Duration::from_millis(self.import_poll_ms.max(1))
    }
}

/// Divide um comando em argv por espaços em branco. Não há tratamento de
/// aspas nem de escapes: `sh -c 'a b'` vira `["sh", "-c", "'a", "b'"]`.
/// Para argumentos com espaços use `command = [...]` no arquivo.
pub fn split_command(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_values() {
        let config = TailpoolConfig::default();
        assert_eq!(config.pool_size, 5);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.batch_delay_secs, 30);
        assert_eq!(config.max_cycles, 0);
        assert_eq!(config.handler_timeout_secs, 30);
        assert_eq!(config.import_poll(), Duration::from_secs(2));
        assert_eq!(config.targets_file, PathBuf::from("targets.txt"));
        assert!(config.command.is_none());
        assert!(!config.import_existing);
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            pool_size = 8
            command = ["echo", "job"]
            kind_b_patterns = ["^user:"]
        "#;
        let config: TailpoolConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.pool_size, 8);
        assert_eq!(config.command.unwrap(), vec!["echo", "job"]);
        assert_eq!(config.kind_b_patterns, vec!["^user:"]);
        assert_eq!(config.batch_size, 10);
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> =
            HashMap::from([("TAILPOOL_POOL_SIZE", " 12 "), ("TAILPOOL_COMMAND", "sh -c true")]);
        let mut config = TailpoolConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.pool_size, 12);
        assert_eq!(config.command.unwrap(), vec!["sh", "-c", "true"]);
    }

    #[test]
    fn bad_env_pool_size_is_config_error() {
        let mut config = TailpoolConfig::default();
        let err = config
            .apply_env(|key| (key == "TAILPOOL_POOL_SIZE").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, TailpoolError::Config(_)));
    }

    #[test]
    fn zero_pool_size_is_rejected() {
        let config = TailpoolConfig {
            pool_size: 0,
            ..TailpoolConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TailpoolConfig::load(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tailpool.toml");
        std::fs::write(&path, "batch_size = 3\nmax_cycles = 2\n").unwrap();
        let config = TailpoolConfig::from_file(&path).unwrap();
        assert_eq!(config.batch_size, 3);
        assert_eq!(config.max_cycles, 2);
    }

    #[test]
    fn cli_override_rescues_invalid_file_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tailpool.toml");
        std::fs::write(&path, "pool_size = 0\n").unwrap();

        let mut config = TailpoolConfig::load(Some(&path)).unwrap();
        assert_eq!(config.pool_size, 0);
        config.override_with(Some(4), None, None).unwrap();
        assert_eq!(config.pool_size, 4);

        let mut config = TailpoolConfig::load(Some(&path)).unwrap();
        assert!(matches!(
            config.override_with(None, None, None),
            Err(TailpoolError::Config(_))
        ));
    }

    #[test]
    fn cli_overrides_beat_env_and_file() {
        let mut config = TailpoolConfig {
            handler_timeout_secs: 10,
            command: Some(vec!["from-file".into()]),
            ..TailpoolConfig::default()
        };
        config
            .override_with(None, Some(3), Some(split_command("run-job --fast")))
            .unwrap();
        assert_eq!(config.handler_timeout_secs, 3);
        assert_eq!(config.command.unwrap(), vec!["run-job", "--fast"]);
    }

    #[test]
    fn split_command_ignores_quotes() {
        assert_eq!(split_command("  a\tb  c "), vec!["a", "b", "c"]);
        assert_eq!(split_command("sh -c 'a b'"), vec!["sh", "-c", "'a", "b'"]);
        assert!(split_command("   ").is_empty());
    }
}

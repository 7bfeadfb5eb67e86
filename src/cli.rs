//! Interface de linha de comando do tailpool baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (once, mass,
//! continuous, watch, init) e flags globais que sobrepõem a configuração.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// tailpool — executor de jobs por linha com concorrência limitada.
#[derive(Debug, Parser)]
#[command(name = "tailpool", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: ./tailpool.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Número de workers concorrentes.
    #[arg(long, short = 'p', global = true)]
    pub pool_size: Option<usize>,

    /// Timeout de cada handler, em segundos.
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Comando executado por job; o item é passado como último argumento.
    /// Dividido por espaços, sem suporte a aspas; para argumentos com espaços
    /// use `command = [...]` no `tailpool.toml`.
    #[arg(long, global = true)]
    pub exec: Option<String>,

    /// Emite o relatório final da sessão em JSON.
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Processa um único item.
    Once {
        /// Item a processar.
        item: String,
    },

    /// Processa uma vez todos os itens do arquivo de alvos.
    Mass {
        /// Arquivo de alvos (sobrepõe `targets_file`).
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Processa os alvos em lotes, ciclicamente, até `stop` ou o limite de ciclos.
    Continuous {
        /// Arquivo de alvos (sobrepõe `targets_file`).
        #[arg(long)]
        file: Option<PathBuf>,

        /// Jobs por lote.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Pausa entre lotes, em segundos.
        #[arg(long)]
        delay: Option<u64>,

        /// Máximo de ciclos (0 = ilimitado).
        #[arg(long)]
        max_cycles: Option<u64>,
    },

    /// Segue um arquivo e processa cada linha nova assim que aparece.
    Watch {
        /// Arquivo monitorado (sobrepõe `watch_file`).
        #[arg(long)]
        file: Option<PathBuf>,

        /// Importa também as linhas já existentes no arquivo.
        #[arg(long, default_value_t = false)]
        import_existing: bool,
    },

    /// Cria os arquivos de alvos e de monitoramento com cabeçalhos de exemplo.
    Init,
}

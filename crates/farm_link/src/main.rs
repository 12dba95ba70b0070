//! # farmctl
//!
//! Controle remoto do controlador da fazenda pela linha de comando.
//!
//! ## Uso
//! ```bash
//! farmctl commands                       # Lista os comandos
//! farmctl command pump_on                # Liga a bomba
//! farmctl apply farm001.json             # Aplica configuração
//! farmctl fetch --channel humidity       # Últimas 24 h de umidade
//! farmctl watch --interval 5             # Polling ao vivo das últimas 24 h
//! farmctl watch --latest --ticks 3       # Só a amostra mais recente, 3 vezes
//! ```

use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use crossbeam_channel::bounded;
use farm_core::config::AppConfig;
use farm_core::request::Document;
use farm_core::types::{CHANNEL_NAMES, FarmCommand, TelemetrySeries, TimeRange, channel_index};
use farm_link::operation::{Endpoint, Operation, OperationResult};
use farm_link::pool::{PoolHandle, WorkerPool};
use farm_link::scheduler;
use farm_link::transport::TransportError;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "farmctl")]
#[command(about = "Controle remoto do controlador da fazenda")]
struct Args {
    /// Caminho do config.toml (padrão: ao lado do executável)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host do controlador (sobrescreve o config)
    #[arg(long)]
    host: Option<String>,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Lista os comandos disponíveis
    Commands,

    /// Envia um comando (nome ou índice)
    Command {
        command: FarmCommand,
    },

    /// Aplica uma configuração lida de um arquivo JSON
    Apply {
        file: PathBuf,
    },

    /// Busca telemetria uma vez e imprime a tabela
    Fetch {
        /// Início do período (epoch, s)
        #[arg(long)]
        from: Option<i64>,
        /// Fim do período (epoch, s)
        #[arg(long)]
        to: Option<i64>,
        /// Só a amostra mais recente
        #[arg(long, conflicts_with_all = ["from", "to"])]
        latest: bool,
        /// Mostra só este canal
        #[arg(long)]
        channel: Option<String>,
    },

    /// Polling ao vivo da telemetria (reimprime a série a cada tick)
    Watch {
        /// Início do período (epoch, s)
        #[arg(long)]
        from: Option<i64>,
        /// Fim do período (epoch, s)
        #[arg(long)]
        to: Option<i64>,
        /// Só a amostra mais recente
        #[arg(long, conflicts_with_all = ["from", "to"])]
        latest: bool,
        /// Intervalo entre buscas em segundos (padrão: config)
        #[arg(long)]
        interval: Option<f64>,
        /// Para após N ticks
        #[arg(long)]
        ticks: Option<u64>,
        /// Mostra só este canal
        #[arg(long)]
        channel: Option<String>,
    },
}

fn main() {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Erro: {e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    // ── Config ──
    let config_path = args.config.unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load(&config_path);

    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }
    if let Some(host) = args.host {
        config.device.host = host;
    }

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(format!("Configuração inválida: {}", errors.join("; ")).into());
    }

    let endpoint = Endpoint::from(&config.device);
    let pool = WorkerPool::new(
        config.client.workers,
        config.client.queue_capacity,
        config.client.max_records,
    )?;

    match args.action {
        Action::Commands => {
            for cmd in FarmCommand::all() {
                println!("  {:>2}  {:<14} {}", cmd.index(), cmd.name(), cmd.description());
            }
            Ok(())
        }
        Action::Command { command } => {
            info!("Enviando {command} para {}", endpoint.host);
            run_once(&pool.handle(), Operation::send_command(endpoint, command))?;
            println!("Comando {command} enviado");
            Ok(())
        }
        Action::Apply { file } => {
            let content = std::fs::read_to_string(&file)?;
            let document: Document = serde_json::from_str(&content)?;
            let operation = Operation::apply_config(endpoint, document)?;
            run_once(&pool.handle(), operation)?;
            println!("Configuração de {} enviada", file.display());
            Ok(())
        }
        Action::Fetch {
            from,
            to,
            latest,
            channel,
        } => {
            let columns = select_columns(channel.as_deref())?;
            let operation =
                telemetry_operation(endpoint, from, to, latest, Local::now().timestamp());

            match run_once(&pool.handle(), operation)? {
                OperationResult::Telemetry(series) => print_table(&series, &columns),
                OperationResult::Sent => {}
            }
            Ok(())
        }
        Action::Watch {
            from,
            to,
            latest,
            interval,
            ticks,
            channel,
        } => {
            let columns = select_columns(channel.as_deref())?;
            let period = Duration::from_secs_f64(interval.unwrap_or(config.client.poll_interval_secs).max(0.1));
            let operation =
                telemetry_operation(endpoint, from, to, latest, Local::now().timestamp());
            watch(&pool.handle(), operation, period, ticks, &columns)
        }
    }
}

/// Busca de telemetria com a janela padrão preenchendo o que faltar.
/// O mesmo período é reenviado a cada tick do `watch`.
fn telemetry_operation(
    endpoint: Endpoint,
    from: Option<i64>,
    to: Option<i64>,
    latest: bool,
    now: i64,
) -> Operation {
    if latest {
        return Operation::fetch_latest(endpoint);
    }
    let window = TimeRange::ending_at(now);
    let range = TimeRange::new(from.unwrap_or(window.from), to.unwrap_or(window.to));
    Operation::fetch_telemetry(endpoint, range)
}

/// Roda uma operação no pool e espera o resultado.
fn run_once(pool: &PoolHandle, operation: Operation) -> Result<OperationResult, Box<dyn Error>> {
    let (tx, rx) = bounded::<Result<OperationResult, TransportError>>(1);
    pool.submit(operation, move |res| {
        tx.send(res).ok();
    })?;
    Ok(rx.recv()??)
}

fn watch(
    pool: &PoolHandle,
    operation: Operation,
    period: Duration,
    max_ticks: Option<u64>,
    columns: &[usize],
) -> Result<(), Box<dyn Error>> {
    let (tx, rx) = bounded(4);
    let session = scheduler::start(pool, operation, period, move |tick| {
        tx.send(tick).ok();
    })?;

    let mut seen = 0u64;
    for tick in rx.iter() {
        seen += 1;
        println!();
        println!("── Tick {seen} ──");
        match tick {
            Ok(series) => print_table(&series, columns),
            Err(e) => println!("(falha: {e})"),
        }
        if max_ticks.is_some_and(|max| seen >= max) {
            break;
        }
    }

    // Solta o receptor antes do join: um `send` do tick pendente falha em
    // vez de bloquear o thread de polling
    session.cancel();
    drop(rx);
    session.join();
    Ok(())
}

fn select_columns(channel: Option<&str>) -> Result<Vec<usize>, Box<dyn Error>> {
    match channel {
        None => Ok((0..CHANNEL_NAMES.len()).collect()),
        Some(name) => channel_index(name)
            .map(|i| vec![i])
            .ok_or_else(|| format!("Canal desconhecido: '{name}' (opções: {})", CHANNEL_NAMES.join(", ")).into()),
    }
}

fn print_table(series: &TelemetrySeries, columns: &[usize]) {
    println!("{} amostras", series.len());
    print_header(columns);
    for rec in series.records() {
        print_row(rec.timestamp, &rec.values, columns);
    }
}

fn print_header(columns: &[usize]) {
    print!("{:<19}", "Horário");
    for &c in columns {
        print!("  {:>19}", CHANNEL_NAMES[c]);
    }
    println!();
}

fn print_row(timestamp: i64, values: &[f64], columns: &[usize]) {
    let time = DateTime::from_timestamp(timestamp, 0)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp.to_string());
    print!("{time:<19}");
    for &c in columns {
        print!("  {:>19.2}", values[c]);
    }
    println!();
}

//! # Farm Sim
//!
//! Simula o controlador da fazenda para testes locais do `farmctl`.
//! Escuta as três portas (telemetria, configuração e comandos), responde
//! como o controlador real e gera uma amostra nova a cada intervalo.
//!
//! ## Uso
//! ```bash
//! farm_sim                              # Usa o config.toml padrão
//! farm_sim --config ./config.toml
//! ```

mod device;

use chrono::Utc;
use clap::Parser;
use device::FarmDevice;
use farm_core::config::AppConfig;
use farm_core::request::OperationKind;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Parser)]
#[command(name = "farm_sim")]
#[command(about = "Simulador do controlador da fazenda")]
struct Args {
    /// Caminho do config.toml (padrão: ao lado do executável)
    #[arg(long)]
    config: Option<PathBuf>,
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

    // ── Carregar config ──
    let config_path = args.config.unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    let sim = &config.simulator;
    let ports = config.device.ports();
    let interval = Duration::from_secs(sim.sample_interval_secs.max(1));

    // ── Estado simulado ──
    let device = Arc::new(FarmDevice::new());
    let now = Utc::now().timestamp();
    device.backfill(
        now - (sim.history_hours * 3600) as i64,
        now,
        sim.sample_interval_secs,
    );

    // ── Portas ──
    let kinds = [
        OperationKind::FetchTelemetry,
        OperationKind::ApplyConfig,
        OperationKind::SendCommand,
    ];
    for kind in kinds {
        let addr = format!("{}:{}", sim.bind_ip, ports.port_for(kind));
        match TcpListener::bind(&addr) {
            Ok(listener) => spawn_listener(listener, kind, device.clone()),
            Err(e) => {
                error!("Falha ao bind {addr}: {e}");
                std::process::exit(1);
            }
        }
    }

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   🌱 FARM SIM – ATIVO");
    println!("══════════════════════════════════════════════");
    println!("  Bind:        {}", sim.bind_ip);
    println!("  Telemetria:  {}", ports.telemetry);
    println!("  Config:      {}", ports.config);
    println!("  Comandos:    {}", ports.command);
    println!("  Amostragem:  {}s", interval.as_secs());
    println!("  Histórico:   {} amostras", device.history_len());
    println!("══════════════════════════════════════════════");
    println!();

    // ── Loop principal ──
    loop {
        let cycle_start = Instant::now();

        let rec = device.sample(Utc::now().timestamp());
        info!(
            "Amostra | T {:.1}°C | Umid {:.0}% | Água {:.0} | Solo {:.0} | Luz {:.0}",
            rec.values[0], rec.values[2], rec.values[3], rec.values[4], rec.values[5]
        );

        // Dormir pelo tempo restante do intervalo
        let elapsed = cycle_start.elapsed();
        if elapsed < interval {
            std::thread::sleep(interval - elapsed);
        }
    }
}

fn spawn_listener(listener: TcpListener, kind: OperationKind, device: Arc<FarmDevice>) {
    let name = format!("sim-{kind}");
    let spawned = std::thread::Builder::new().name(name).spawn(move || {
        info!("Porta {kind} escutando em {:?}", listener.local_addr().ok());
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let device = device.clone();
                    std::thread::spawn(move || handle_client(stream, kind, &device));
                }
                Err(e) => warn!("Erro ao aceitar conexão em {kind}: {e}"),
            }
        }
    });
    if let Err(e) = spawned {
        error!("Falha ao criar thread da porta {kind}: {e}");
    }
}

fn handle_client(stream: TcpStream, kind: OperationKind, device: &FarmDevice) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "desconhecido".into());

    let mut line = String::new();
    if let Err(e) = BufReader::new(&stream).read_line(&mut line) {
        warn!("Erro ao ler requisição de {peer}: {e}");
        return;
    }
    let line = line.trim_end();
    debug!("{kind} de {peer}: {line}");

    match kind {
        OperationKind::FetchTelemetry => {
            let frame = device.handle_telemetry(line, Utc::now().timestamp());
            if let Err(e) = (&stream).write_all(&frame) {
                warn!("Erro ao enviar telemetria para {peer}: {e}");
            } else {
                info!("→ {} bytes de telemetria para {peer}", frame.len());
            }
        }
        OperationKind::ApplyConfig => {
            if let Err(e) = device.handle_config(line) {
                warn!("Configuração inválida de {peer}: {e}");
            }
        }
        OperationKind::SendCommand => {
            if let Err(e) = device.handle_command(line) {
                warn!("Comando inválido de {peer}: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_flag_is_parsed() {
        let args = Args::try_parse_from(["farm_sim", "--config", "/tmp/sim.toml"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/tmp/sim.toml")));
        assert!(Args::try_parse_from(["farm_sim"]).unwrap().config.is_none());
    }

    #[test]
    fn bad_arguments_are_rejected() {
        assert!(Args::try_parse_from(["farm_sim", "--config"]).is_err());
        assert!(Args::try_parse_from(["farm_sim", "--porta", "1488"]).is_err());
    }
}

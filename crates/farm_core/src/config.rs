//! Configuração unificada via TOML.
//!
//! Um único `config.toml` ao lado do executável, com seções para o
//! controlador, o cliente e o simulador.

use crate::request::PortTable;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Endereço do controlador da fazenda.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// IP ou hostname do controlador
    pub host: String,
    /// Porta da busca de telemetria
    pub telemetry_port: u16,
    /// Porta de aplicação de configuração
    pub config_port: u16,
    /// Porta de comandos
    pub command_port: u16,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let ports = PortTable::default();
        Self {
            host: "103.137.250.154".into(),
            telemetry_port: ports.telemetry,
            config_port: ports.config,
            command_port: ports.command,
        }
    }
}

impl DeviceConfig {
    pub fn ports(&self) -> PortTable {
        PortTable {
            telemetry: self.telemetry_port,
            config: self.config_port,
            command: self.command_port,
        }
    }
}

/// Configuração do cliente (CLI / views de telemetria).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Threads do pool de transporte
    pub workers: usize,
    /// Tarefas aguardando na fila antes de recusar
    pub queue_capacity: usize,
    /// Intervalo entre buscas de telemetria (segundos)
    pub poll_interval_secs: f64,
    /// Máximo de amostras aceitas numa resposta
    pub max_records: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 32,
            poll_interval_secs: 10.0,
            max_records: 1_000_000,
        }
    }
}

/// Configuração do simulador de controlador.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// IP local para bind
    pub bind_ip: String,
    /// Intervalo entre amostras geradas (segundos)
    pub sample_interval_secs: u64,
    /// Histórico pré-gerado ao iniciar (horas)
    pub history_hours: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            bind_ip: "127.0.0.1".into(),
            sample_interval_secs: 60,
            history_hours: 48,
        }
    }
}

/// Configuração raiz do aplicativo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub client: ClientConfig,
    pub simulator: SimulatorConfig,
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => {
                        info!("Configuração carregada de {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        std::fs::write(path, content).map_err(|e| e.to_string())?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.device.host.trim().is_empty() {
            errors.push("Host do controlador não pode ser vazio".into());
        }
        let ports = [
            ("telemetria", self.device.telemetry_port),
            ("configuração", self.device.config_port),
            ("comandos", self.device.command_port),
        ];
        for (name, port) in ports {
            if port == 0 {
                errors.push(format!("Porta de {name} não pode ser 0"));
            }
        }
        if self.client.workers == 0 {
            errors.push("O pool precisa de ao menos 1 worker".into());
        }
        if self.client.queue_capacity == 0 {
            errors.push("Capacidade da fila não pode ser 0".into());
        }
        if !(0.1..=3600.0).contains(&self.client.poll_interval_secs) {
            errors.push(format!(
                "Intervalo de polling inválido: {} (0.1–3600.0)",
                self.client.poll_interval_secs
            ));
        }
        if self.simulator.sample_interval_secs == 0 {
            errors.push("Intervalo de amostragem do simulador não pode ser 0".into());
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        let errors = config.validate();
        assert!(errors.is_empty(), "Erros: {:?}", errors);
    }

    #[test]
    fn roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.device.host, parsed.device.host);
        assert_eq!(config.client.workers, parsed.client.workers);
        assert_eq!(config.device.ports(), parsed.device.ports());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let partial = r#"
[device]
host = "192.168.0.42"
"#;
        let config: AppConfig = toml::from_str(partial).unwrap();
        assert_eq!(config.device.host, "192.168.0.42");
        // Outros campos devem ter valor padrão
        assert_eq!(config.device.telemetry_port, 1488);
        assert_eq!(config.client.poll_interval_secs, 10.0);
        assert_eq!(config.simulator.bind_ip, "127.0.0.1");
    }

    #[test]
    fn flags_invalid_values() {
        let mut config = AppConfig::default();
        config.device.command_port = 0;
        config.client.workers = 0;
        config.client.poll_interval_secs = 0.0;
        assert_eq!(config.validate().len(), 3);
    }

    #[test]
    fn load_missing_file_falls_back_to_default() {
        let path = std::env::temp_dir().join("farm_link_config_inexistente.toml");
        let config = AppConfig::load(&path);
        assert_eq!(config.device.command_port, 1490);
    }
}

//! Estado simulado do controlador: histórico de amostras, atuadores e a
//! última configuração recebida.
//!
//! As respostas seguem o comportamento dos serviços do controlador real:
//! período válido → todas as amostras no período; qualquer outra coisa →
//! só a amostra mais recente.

use farm_core::protocol::encode_series;
use farm_core::request::Document;
use farm_core::types::{FarmCommand, TelemetryRecord, TimeRange};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Limite do histórico em memória.
const MAX_HISTORY: usize = 100_000;

/// Estado dos atuadores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actuators {
    pub pump: bool,
    pub growlight: bool,
    pub heatlamp: bool,
    pub farm_enabled: bool,
}

impl Default for Actuators {
    fn default() -> Self {
        Self {
            pump: false,
            growlight: false,
            heatlamp: false,
            farm_enabled: true,
        }
    }
}

impl Actuators {
    fn apply(&mut self, command: FarmCommand) {
        match command {
            FarmCommand::EspReset => *self = Actuators::default(),
            FarmCommand::PumpOn => self.pump = true,
            FarmCommand::PumpOff => self.pump = false,
            FarmCommand::GrowlightOn => self.growlight = true,
            FarmCommand::GrowlightOff => self.growlight = false,
            FarmCommand::HeatlampOn => self.heatlamp = true,
            FarmCommand::HeatlampOff => self.heatlamp = false,
            FarmCommand::FarmOn => self.farm_enabled = true,
            FarmCommand::FarmOff => {
                *self = Actuators {
                    farm_enabled: false,
                    ..Actuators::default()
                }
            }
        }
    }
}

#[derive(Default)]
struct State {
    history: Vec<TelemetryRecord>,
    actuators: Actuators,
    config: Option<Document>,
}

/// Controlador simulado, compartilhado entre os threads das portas.
#[derive(Default)]
pub struct FarmDevice {
    state: Mutex<State>,
}

impl FarmDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Um pânico num handler não deve derrubar as outras portas
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Gera amostras de `from` até `to` a cada `step` segundos.
    pub fn backfill(&self, from: i64, to: i64, step: u64) {
        let step = step.max(1) as usize;
        let actuators = self.actuators();
        let mut state = self.lock();
        for ts in (from..=to).step_by(step) {
            state.history.push(synthesize(ts, actuators));
        }
        trim(&mut state.history);
        info!("Histórico simulado: {} amostras", state.history.len());
    }

    /// Registra uma nova leitura no instante `now`.
    pub fn sample(&self, now: i64) -> TelemetryRecord {
        let mut state = self.lock();
        let rec = synthesize(now, state.actuators);
        state.history.push(rec);
        trim(&mut state.history);
        rec
    }

    pub fn actuators(&self) -> Actuators {
        self.lock().actuators
    }

    pub fn history_len(&self) -> usize {
        self.lock().history.len()
    }

    /// Porta de telemetria: devolve o frame binário de resposta.
    pub fn handle_telemetry(&self, line: &str, now: i64) -> Vec<u8> {
        let range = serde_json::from_str::<Document>(line)
            .ok()
            .and_then(|doc| TimeRange::from_document(&doc));

        let state = self.lock();
        let records: Vec<TelemetryRecord> = match range {
            Some(range) => state
                .history
                .iter()
                .filter(|r| range.contains(r.timestamp))
                .copied()
                .collect(),
            None => {
                let latest = state
                    .history
                    .last()
                    .copied()
                    .unwrap_or_else(|| synthesize(now, state.actuators));
                vec![latest]
            }
        };
        debug!("Telemetria: período {range:?}, {} amostras", records.len());
        encode_series(&records)
    }

    /// Porta de configuração: guarda o documento recebido.
    pub fn handle_config(&self, line: &str) -> Result<(), serde_json::Error> {
        let doc: Document = serde_json::from_str(line)?;
        info!("Configuração recebida: {doc}");
        self.lock().config = Some(doc);
        Ok(())
    }

    /// Porta de comandos: aplica o comando aos atuadores.
    pub fn handle_command(&self, line: &str) -> Result<FarmCommand, String> {
        let doc: Document = serde_json::from_str(line).map_err(|e| e.to_string())?;
        let index = doc
            .get("command")
            .and_then(Document::as_i64)
            .ok_or_else(|| format!("Campo 'command' ausente em {doc}"))?;
        let command = FarmCommand::new(index);

        let mut state = self.lock();
        state.actuators.apply(command);
        info!("Comando {command} → {:?}", state.actuators);
        Ok(command)
    }
}

fn trim(history: &mut Vec<TelemetryRecord>) {
    if history.len() > MAX_HISTORY {
        let excess = history.len() - MAX_HISTORY;
        history.drain(..excess);
    }
}

/// Leitura sintética: ciclo diário + efeito dos atuadores.
fn synthesize(timestamp: i64, act: Actuators) -> TelemetryRecord {
    let day = (timestamp.rem_euclid(86_400) as f64) / 86_400.0;
    let wave = (day * std::f64::consts::TAU).sin();

    let heat = if act.heatlamp && act.farm_enabled { 4.0 } else { 0.0 };
    let light = if act.growlight && act.farm_enabled { 600.0 } else { 0.0 };
    let water = if act.pump && act.farm_enabled { 5.0 } else { 0.0 };

    let temp_air = 22.0 + 3.0 * wave + heat;
    TelemetryRecord {
        timestamp,
        values: [
            temp_air,
            temp_air - 0.4,
            60.0 - 8.0 * wave,
            40.0 + water,
            45.0 - 5.0 * wave + water,
            (300.0 + 400.0 * wave).max(0.0) + light,
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use farm_core::protocol::decode_series;
    use serde_json::json;

    #[test]
    fn range_request_returns_records_in_range() {
        let device = FarmDevice::new();
        device.backfill(1000, 1600, 60);
        assert_eq!(device.history_len(), 11);

        let line = json!({ "unix_time_from": 1100, "unix_time_to": 1300 }).to_string();
        let series = decode_series(&device.handle_telemetry(&line, 2000)).unwrap();
        assert_eq!(series.timestamps(), &[1120, 1180, 1240, 1300]);
    }

    #[test]
    fn invalid_request_falls_back_to_latest() {
        let device = FarmDevice::new();
        device.backfill(0, 300, 100);

        for line in ["{}", "lixo", r#"{"unix_time_from": 500, "unix_time_to": 100}"#] {
            let series = decode_series(&device.handle_telemetry(line, 9999)).unwrap();
            assert_eq!(series.timestamps(), &[300], "linha {line}");
        }
    }

    #[test]
    fn empty_history_synthesizes_current_sample() {
        let device = FarmDevice::new();
        let series = decode_series(&device.handle_telemetry("{}", 42)).unwrap();
        assert_eq!(series.timestamps(), &[42]);
    }

    #[test]
    fn commands_drive_actuators() {
        let device = FarmDevice::new();
        assert_eq!(device.handle_command(r#"{"command": 1}"#).unwrap().name(), "PUMP_ON");
        assert_eq!(device.handle_command(r#"{"command": 3}"#).unwrap().name(), "GROWLIGHT_ON");
        assert!(device.actuators().pump);
        assert!(device.actuators().growlight);

        // Índice fora da faixa é limitado ao último comando
        assert_eq!(device.handle_command(r#"{"command": 99}"#).unwrap().name(), "FARM_OFF");
        let act = device.actuators();
        assert!(!act.farm_enabled && !act.pump && !act.growlight);

        assert!(device.handle_command(r#"{"cmd": 1}"#).is_err());
    }

    #[test]
    fn actuators_follow_each_command() {
        let mut act = Actuators::default();
        for cmd in FarmCommand::all() {
            act.apply(cmd);
        }
        // FARM_OFF é o último: tudo desligado
        assert_eq!(
            act,
            Actuators {
                farm_enabled: false,
                ..Actuators::default()
            }
        );

        let mut act = Actuators::default();
        act.apply(FarmCommand::HeatlampOn);
        assert!(act.heatlamp);
        act.apply(FarmCommand::HeatlampOff);
        assert!(!act.heatlamp);
        act.apply(FarmCommand::FarmOff);
        act.apply(FarmCommand::FarmOn);
        assert!(act.farm_enabled);
        act.apply(FarmCommand::PumpOn);
        act.apply(FarmCommand::EspReset);
        assert_eq!(act, Actuators::default());
    }

    #[test]
    fn growlight_raises_light_intensity() {
        let device = FarmDevice::new();
        let dark = device.sample(43_200);
        device.handle_command(r#"{"command": 3}"#).unwrap();
        let lit = device.sample(43_200);
        assert!(lit.values[5] > dark.values[5]);
    }

    #[test]
    fn config_is_stored() {
        let device = FarmDevice::new();
        device.handle_config(r#"{"pump_volume_ml": 250}"#).unwrap();
        assert_eq!(device.lock().config, Some(json!({ "pump_volume_ml": 250 })));
        assert!(device.handle_config("{incompleto").is_err());
    }
}

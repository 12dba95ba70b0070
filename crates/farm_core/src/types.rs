//! Tipos de dados da fazenda: amostras de telemetria, séries, comandos e
//! janelas de tempo.
//!
//! A ordem dos canais é fixa e definida por [`CHANNEL_NAMES`]; o protocolo
//! binário em [`crate::protocol`] depende dela.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;

use crate::request::Document;

// ──────────────────────────────────────────────
// Canais
// ──────────────────────────────────────────────

/// Nomes dos canais, na ordem em que chegam no fio.
pub const CHANNEL_NAMES: [&str; CHANNEL_COUNT] = [
    "temperature_DHT22",
    "temperature_DS18B20",
    "humidity",
    "water_level",
    "soil_moisture",
    "light_intensity",
];

/// Número de canais por amostra.
pub const CHANNEL_COUNT: usize = 6;

/// Índice do canal pelo nome (case-insensitive).
pub fn channel_index(name: &str) -> Option<usize> {
    CHANNEL_NAMES
        .iter()
        .position(|c| c.eq_ignore_ascii_case(name))
}

// ──────────────────────────────────────────────
// Amostras
// ──────────────────────────────────────────────

/// Uma amostra do controlador.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Instante da leitura (epoch, segundos)
    pub timestamp: i64,
    /// Leituras na ordem de [`CHANNEL_NAMES`]
    pub values: [f64; CHANNEL_COUNT],
}

/// Série temporal colunar decodificada de uma busca de telemetria.
///
/// Todas as colunas têm exatamente `len()` elementos e são alinhadas pelo
/// índice com `timestamps`. Só é construída por [`TelemetrySeries::from_records`],
/// então nunca existe parcialmente preenchida.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySeries {
    timestamps: Vec<i64>,
    channels: [Vec<f64>; CHANNEL_COUNT],
}

impl TelemetrySeries {
    /// Monta a série a partir de amostras em ordem.
    pub fn from_records(records: &[TelemetryRecord]) -> Self {
        let mut series = Self {
            timestamps: Vec::with_capacity(records.len()),
            channels: std::array::from_fn(|_| Vec::with_capacity(records.len())),
        };
        for rec in records {
            series.timestamps.push(rec.timestamp);
            for (column, value) in series.channels.iter_mut().zip(rec.values) {
                column.push(value);
            }
        }
        series
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    /// Coluna de um canal. `None` se o índice estiver fora da tabela.
    pub fn channel(&self, index: usize) -> Option<&[f64]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channel_by_name(&self, name: &str) -> Option<&[f64]> {
        channel_index(name).and_then(|i| self.channel(i))
    }

    /// Reconstrói a amostra `i`.
    pub fn record(&self, i: usize) -> Option<TelemetryRecord> {
        let timestamp = *self.timestamps.get(i)?;
        Some(TelemetryRecord {
            timestamp,
            values: std::array::from_fn(|c| self.channels[c][i]),
        })
    }

    pub fn records(&self) -> impl Iterator<Item = TelemetryRecord> + '_ {
        (0..self.len()).filter_map(|i| self.record(i))
    }

    /// Amostra mais recente (última do fio).
    pub fn latest(&self) -> Option<TelemetryRecord> {
        self.len().checked_sub(1).and_then(|i| self.record(i))
    }
}

// ──────────────────────────────────────────────
// Comandos
// ──────────────────────────────────────────────

/// Nomes dos comandos, na ordem do índice enviado ao controlador.
pub const COMMAND_NAMES: [&str; COMMAND_COUNT] = [
    "ESP_RESET",
    "PUMP_ON",
    "PUMP_OFF",
    "GROWLIGHT_ON",
    "GROWLIGHT_OFF",
    "HEATLAMP_ON",
    "HEATLAMP_OFF",
    "FARM_ON",
    "FARM_OFF",
];

/// Descrições para listagem na CLI.
pub const COMMAND_DESCRIPTIONS: [&str; COMMAND_COUNT] = [
    "Reiniciar o ESP32",
    "Ligar a bomba",
    "Desligar a bomba",
    "Ligar a fita de LED",
    "Desligar a fita de LED",
    "Ligar o aquecimento",
    "Desligar o aquecimento",
    "Ligar a fazenda",
    "Desligar a fazenda",
];

pub const COMMAND_COUNT: usize = 9;

/// Comando discreto de atuador, na ordem do índice enviado ao controlador.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FarmCommand {
    EspReset = 0,
    PumpOn,
    PumpOff,
    GrowlightOn,
    GrowlightOff,
    HeatlampOn,
    HeatlampOff,
    FarmOn,
    FarmOff,
}

/// Todos os comandos, indexados pelo valor de fio.
pub const ALL_COMMANDS: [FarmCommand; COMMAND_COUNT] = [
    FarmCommand::EspReset,
    FarmCommand::PumpOn,
    FarmCommand::PumpOff,
    FarmCommand::GrowlightOn,
    FarmCommand::GrowlightOff,
    FarmCommand::HeatlampOn,
    FarmCommand::HeatlampOff,
    FarmCommand::FarmOn,
    FarmCommand::FarmOff,
];

impl FarmCommand {
    /// Cria o comando, limitando o índice a `0..COMMAND_COUNT`.
    pub fn new(index: i64) -> Self {
        ALL_COMMANDS[index.clamp(0, COMMAND_COUNT as i64 - 1) as usize]
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        COMMAND_NAMES[self as usize]
    }

    pub fn description(self) -> &'static str {
        COMMAND_DESCRIPTIONS[self as usize]
    }

    /// Documento de um campo: `{"command": index}`.
    pub fn to_document(self) -> Document {
        json!({ "command": self.index() })
    }

    pub fn all() -> impl Iterator<Item = FarmCommand> {
        ALL_COMMANDS.into_iter()
    }
}

impl fmt::Display for FarmCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Erro ao interpretar um comando digitado.
#[derive(Debug, thiserror::Error)]
#[error("Comando desconhecido: '{0}'")]
pub struct UnknownCommand(pub String);

impl FromStr for FarmCommand {
    type Err = UnknownCommand;

    /// Aceita o nome (`pump_on`, `PUMP_ON`) ou o índice decimal (limitado,
    /// inclusive além da faixa de `i64`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            // Só estoura por overflow: satura pelo sinal
            let index = s.parse::<i64>().unwrap_or(if s.starts_with('-') {
                i64::MIN
            } else {
                i64::MAX
            });
            return Ok(FarmCommand::new(index));
        }
        COMMAND_NAMES
            .iter()
            .position(|name| name.eq_ignore_ascii_case(s))
            .map(|i| ALL_COMMANDS[i])
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

// ──────────────────────────────────────────────
// Janela de tempo
// ──────────────────────────────────────────────

/// Filtro de período enviado na busca de telemetria.
///
/// Os nomes no fio são os que o controlador lê.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(rename = "unix_time_from")]
    pub from: i64,
    #[serde(rename = "unix_time_to")]
    pub to: i64,
}

impl TimeRange {
    pub fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }

    /// Janela padrão: das últimas 24 h até 1 h à frente de `now`.
    pub fn ending_at(now: i64) -> Self {
        Self {
            from: now - 24 * 3600,
            to: now + 3600,
        }
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        (self.from..=self.to).contains(&timestamp)
    }

    pub fn to_document(self) -> Document {
        json!({ "unix_time_from": self.from, "unix_time_to": self.to })
    }

    /// Lê a janela de um documento; `None` se faltar campo ou `from > to`.
    pub fn from_document(doc: &Document) -> Option<Self> {
        let range: TimeRange = serde_json::from_value(doc.clone()).ok()?;
        (range.from <= range.to).then_some(range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_index_is_clamped() {
        let low = FarmCommand::new(-1);
        let high = FarmCommand::new(9);
        assert_eq!(low.index(), 0);
        assert_eq!(low.name(), "ESP_RESET");
        assert_eq!(high.index(), 8);
        assert_eq!(high.name(), "FARM_OFF");
        assert_eq!(low.to_document(), json!({ "command": 0 }));
        assert_eq!(high.to_document(), json!({ "command": 8 }));
    }

    #[test]
    fn command_parses_name_and_index() {
        assert_eq!("pump_on".parse::<FarmCommand>().unwrap().index(), 1);
        assert_eq!("HEATLAMP_OFF".parse::<FarmCommand>().unwrap().index(), 6);
        assert_eq!("42".parse::<FarmCommand>().unwrap().index(), 8);
        assert!("sprinkler".parse::<FarmCommand>().is_err());
    }

    #[test]
    fn huge_index_saturates() {
        let big = "99999999999999999999".parse::<FarmCommand>().unwrap();
        assert_eq!(big, FarmCommand::FarmOff);
        let small = "-99999999999999999999".parse::<FarmCommand>().unwrap();
        assert_eq!(small, FarmCommand::EspReset);
        assert_eq!("+3".parse::<FarmCommand>().unwrap(), FarmCommand::GrowlightOn);
        assert!("-".parse::<FarmCommand>().is_err());
        assert!("12abc".parse::<FarmCommand>().is_err());
    }

    #[test]
    fn all_commands_listed_in_order() {
        let names: Vec<_> = FarmCommand::all().map(|c| c.name()).collect();
        assert_eq!(names, COMMAND_NAMES);
        for (i, cmd) in FarmCommand::all().enumerate() {
            assert_eq!(cmd.index() as usize, i);
            assert_eq!(FarmCommand::new(i as i64), cmd);
        }
    }

    #[test]
    fn series_columns_are_aligned() {
        let records = [
            TelemetryRecord { timestamp: 10, values: [1.0, 2.0, 3.0, 4.0, 5.0, 6.0] },
            TelemetryRecord { timestamp: 20, values: [7.0, 8.0, 9.0, 10.0, 11.0, 12.0] },
        ];
        let series = TelemetrySeries::from_records(&records);
        assert_eq!(series.len(), 2);
        assert_eq!(series.timestamps(), &[10, 20]);
        assert_eq!(series.channel(2), Some(&[3.0, 9.0][..]));
        assert_eq!(series.channel_by_name("LIGHT_INTENSITY"), Some(&[6.0, 12.0][..]));
        assert_eq!(series.channel(CHANNEL_COUNT), None);
        assert_eq!(series.latest(), Some(records[1]));
        assert_eq!(series.records().collect::<Vec<_>>(), records);
    }

    #[test]
    fn empty_series_has_no_latest() {
        let series = TelemetrySeries::default();
        assert!(series.is_empty());
        assert_eq!(series.latest(), None);
    }

    #[test]
    fn time_range_uses_device_field_names() {
        let range = TimeRange::new(100, 200);
        assert_eq!(
            range.to_document(),
            json!({ "unix_time_from": 100, "unix_time_to": 200 })
        );
        assert_eq!(TimeRange::from_document(&range.to_document()), Some(range));
        assert_eq!(TimeRange::from_document(&json!({ "unix_time_from": 5 })), None);
        assert_eq!(TimeRange::from_document(&TimeRange::new(9, 1).to_document()), None);
    }

    #[test]
    fn default_window_spans_a_day_back() {
        let range = TimeRange::ending_at(1_000_000);
        assert_eq!(range.from, 1_000_000 - 86_400);
        assert_eq!(range.to, 1_003_600);
        assert!(range.contains(1_000_000));
    }
}

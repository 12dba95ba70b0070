//! # Farm Core
//!
//! Crate compartilhada que define o protocolo com o controlador da fazenda:
//! formato binário da telemetria, montagem das requisições JSON, tipos de
//! dados e configuração TOML.
//!
//! ## Módulos
//! - [`types`] – Amostras, séries, comandos e janelas de tempo
//! - [`protocol`] – Encode/decode binário da resposta de telemetria
//! - [`request`] – Tipo de operação → porta + bytes no fio
//! - [`config`] – Configuração unificada via TOML

pub mod types;
pub mod protocol;
pub mod request;
pub mod config;

// Re-exports convenientes
pub use types::{ALL_COMMANDS, FarmCommand, TelemetryRecord, TelemetrySeries, TimeRange};
pub use protocol::{decode_series, encode_series, read_series, CodecError};
pub use request::{build, Document, OperationKind, PortTable, WireRequest};
pub use config::{AppConfig, ClientConfig, DeviceConfig, SimulatorConfig};

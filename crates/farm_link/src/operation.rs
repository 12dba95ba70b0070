//! Operações enviadas ao controlador.
//!
//! Uma [`Operation`] junta o tipo, o documento e o [`Endpoint`] de destino.
//! O endpoint é sempre passado explicitamente: não existe "fazenda atual"
//! global.

use crate::transport::{self, TransportError};
use farm_core::config::DeviceConfig;
use farm_core::request::{self, Document, OperationKind, PortTable};
use farm_core::types::{FarmCommand, TelemetrySeries, TimeRange};
use serde_json::json;
use tracing::{debug, info};

/// Endereço de um controlador.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub ports: PortTable,
}

impl Endpoint {
    /// Endpoint com as portas padrão (1488/1489/1490).
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ports: PortTable::default(),
        }
    }

    pub fn with_ports(host: impl Into<String>, ports: PortTable) -> Self {
        Self {
            host: host.into(),
            ports,
        }
    }
}

impl From<&DeviceConfig> for Endpoint {
    fn from(cfg: &DeviceConfig) -> Self {
        Self::with_ports(cfg.host.clone(), cfg.ports())
    }
}

/// Erro ao construir uma operação.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("Documento nulo não pode ser enviado")]
    NullPayload,
}

/// Resultado de uma operação bem-sucedida.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult {
    /// Fire-and-forget: os bytes saíram, sem confirmação do controlador
    Sent,
    /// Série decodificada da busca de telemetria
    Telemetry(TelemetrySeries),
}

impl OperationResult {
    pub fn into_series(self) -> Option<TelemetrySeries> {
        match self {
            OperationResult::Telemetry(series) => Some(series),
            OperationResult::Sent => None,
        }
    }
}

/// Uma requisição ao controlador. O tipo não muda após a construção.
#[derive(Debug, Clone)]
pub struct Operation {
    kind: OperationKind,
    payload: Document,
    endpoint: Endpoint,
}

impl Operation {
    fn new(kind: OperationKind, endpoint: Endpoint, payload: Document) -> Result<Self, OperationError> {
        if payload.is_null() {
            return Err(OperationError::NullPayload);
        }
        Ok(Self {
            kind,
            payload,
            endpoint,
        })
    }

    /// Busca de telemetria num período.
    pub fn fetch_telemetry(endpoint: Endpoint, range: TimeRange) -> Self {
        Self {
            kind: OperationKind::FetchTelemetry,
            payload: range.to_document(),
            endpoint,
        }
    }

    /// Busca sem período: o controlador responde só a amostra mais recente.
    pub fn fetch_latest(endpoint: Endpoint) -> Self {
        Self {
            kind: OperationKind::FetchTelemetry,
            payload: json!({}),
            endpoint,
        }
    }

    /// Aplica uma configuração vinda do motor de formulários.
    pub fn apply_config(endpoint: Endpoint, config: Document) -> Result<Self, OperationError> {
        Self::new(OperationKind::ApplyConfig, endpoint, config)
    }

    pub fn send_command(endpoint: Endpoint, command: FarmCommand) -> Self {
        Self {
            kind: OperationKind::SendCommand,
            payload: command.to_document(),
            endpoint,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn payload(&self) -> &Document {
        &self.payload
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Executa a operação no thread atual (bloqueante).
    ///
    /// Normalmente chamado de dentro de um worker do [`crate::pool`].
    pub fn execute(&self, max_records: usize) -> Result<OperationResult, TransportError> {
        let wire = request::build_with(&self.endpoint.ports, self.kind, &self.payload);
        debug!(
            "{} → {}:{} ({} bytes)",
            self.kind,
            self.endpoint.host,
            wire.port,
            wire.bytes.len()
        );

        let response = transport::execute(
            &self.endpoint.host,
            wire.port,
            &wire.bytes,
            self.kind.wants_response(),
            max_records,
        )?;

        match response {
            Some(series) => {
                info!("{}: {} amostras recebidas", self.kind, series.len());
                Ok(OperationResult::Telemetry(series))
            }
            None => {
                info!("{}: enviado para {}", self.kind, self.endpoint.host);
                Ok(OperationResult::Sent)
            }
        }
    }
}

//! Montagem das requisições: tipo de operação → porta + bytes no fio.
//!
//! O corpo é o documento serializado em JSON seguido de um único `\n`.
//! Nenhuma validação de formato é feita aqui; documentos malformados só
//! falham no controlador.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Documento genérico trocado com o motor de formulários.
pub type Document = serde_json::Value;

/// Porta padrão da busca de telemetria.
pub const TELEMETRY_PORT: u16 = 1488;
/// Porta padrão da aplicação de configuração.
pub const CONFIG_PORT: u16 = 1489;
/// Porta padrão dos comandos.
pub const COMMAND_PORT: u16 = 1490;

/// Tipo de operação enviada ao controlador.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    ApplyConfig,
    FetchTelemetry,
    SendCommand,
}

impl OperationKind {
    /// Porta padrão do tipo.
    pub fn port(self) -> u16 {
        PortTable::default().port_for(self)
    }

    /// Só a telemetria espera resposta; o resto é fire-and-forget.
    pub fn wants_response(self) -> bool {
        matches!(self, OperationKind::FetchTelemetry)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationKind::ApplyConfig => "apply-config",
            OperationKind::FetchTelemetry => "fetch-telemetry",
            OperationKind::SendCommand => "send-command",
        })
    }
}

/// Tabela de portas do controlador.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortTable {
    pub telemetry: u16,
    pub config: u16,
    pub command: u16,
}

impl Default for PortTable {
    fn default() -> Self {
        Self {
            telemetry: TELEMETRY_PORT,
            config: CONFIG_PORT,
            command: COMMAND_PORT,
        }
    }
}

impl PortTable {
    pub fn port_for(&self, kind: OperationKind) -> u16 {
        match kind {
            OperationKind::FetchTelemetry => self.telemetry,
            OperationKind::ApplyConfig => self.config,
            OperationKind::SendCommand => self.command,
        }
    }
}

/// Requisição pronta para o socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRequest {
    pub port: u16,
    pub bytes: Vec<u8>,
}

/// Monta a requisição com as portas padrão.
pub fn build(kind: OperationKind, document: &Document) -> WireRequest {
    build_with(&PortTable::default(), kind, document)
}

/// Monta a requisição resolvendo a porta numa tabela configurada.
pub fn build_with(ports: &PortTable, kind: OperationKind, document: &Document) -> WireRequest {
    let mut bytes = document.to_string().into_bytes();
    bytes.push(b'\n');
    WireRequest {
        port: ports.port_for(kind),
        bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const KINDS: [OperationKind; 3] = [
        OperationKind::ApplyConfig,
        OperationKind::FetchTelemetry,
        OperationKind::SendCommand,
    ];

    #[test]
    fn port_depends_only_on_kind() {
        let docs = [
            json!({}),
            json!({ "command": 3 }),
            json!({ "unix_time_from": 1, "unix_time_to": 2 }),
            json!("não é objeto"),
            json!([1, 2, 3]),
        ];
        for kind in KINDS {
            for doc in &docs {
                assert_eq!(build(kind, doc).port, kind.port());
            }
        }
        assert_eq!(OperationKind::FetchTelemetry.port(), 1488);
        assert_eq!(OperationKind::ApplyConfig.port(), 1489);
        assert_eq!(OperationKind::SendCommand.port(), 1490);
    }

    #[test]
    fn body_is_json_with_single_newline() {
        let doc = json!({ "pump_volume_ml": 250, "growlight_on": "07:30" });
        let req = build(OperationKind::ApplyConfig, &doc);
        assert_eq!(req.bytes.last(), Some(&b'\n'));
        assert_eq!(req.bytes.iter().filter(|&&b| b == b'\n').count(), 1);

        let body = &req.bytes[..req.bytes.len() - 1];
        let parsed: Document = serde_json::from_slice(body).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn utf8_survives_serialization() {
        let doc = json!({ "nome": "Estufa nº 1 — ферма" });
        let req = build(OperationKind::ApplyConfig, &doc);
        let text = std::str::from_utf8(&req.bytes).unwrap();
        assert!(text.contains("Estufa nº 1 — ферма"));
    }

    #[test]
    fn custom_port_table_is_respected() {
        let ports = PortTable {
            telemetry: 9001,
            config: 9002,
            command: 9003,
        };
        let doc = json!({ "command": 1 });
        assert_eq!(build_with(&ports, OperationKind::SendCommand, &doc).port, 9003);
        assert_eq!(build_with(&ports, OperationKind::FetchTelemetry, &doc).port, 9001);
    }

    #[test]
    fn only_telemetry_waits_for_response() {
        assert!(OperationKind::FetchTelemetry.wants_response());
        assert!(!OperationKind::ApplyConfig.wants_response());
        assert!(!OperationKind::SendCommand.wants_response());
    }
}

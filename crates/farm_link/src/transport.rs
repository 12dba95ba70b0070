//! Troca única requisição/resposta com o controlador via TCP.
//!
//! Cada chamada abre uma conexão nova, escreve a requisição e, só para
//! telemetria, lê a resposta binária até o fim. Nada é reaproveitado entre
//! chamadas e não há retry: falhas são logadas e devolvidas como `Err`.

use farm_core::protocol::{read_series, CodecError};
use farm_core::types::TelemetrySeries;
use std::io::{self, BufReader, Write};
use std::net::{Shutdown, TcpStream};
use tracing::{debug, warn};

/// Erros de transporte.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Falha ao conectar em {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Erro de E/S com {addr}: {source}")]
    Io {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Resposta inválida de {addr}: {source}")]
    Decode {
        addr: String,
        #[source]
        source: CodecError,
    },
}

/// Executa uma troca bloqueante com `host:port`.
///
/// Com `wants_response == false` a conexão é fechada logo após a escrita
/// (fire-and-forget) e o retorno é `Ok(None)`.
pub fn execute(
    host: &str,
    port: u16,
    bytes: &[u8],
    wants_response: bool,
    max_records: usize,
) -> Result<Option<TelemetrySeries>, TransportError> {
    let addr = format!("{host}:{port}");
    let result = exchange(&addr, host, port, bytes, wants_response, max_records);
    if let Err(e) = &result {
        warn!("{e}");
    }
    result
}

fn exchange(
    addr: &str,
    host: &str,
    port: u16,
    bytes: &[u8],
    wants_response: bool,
    max_records: usize,
) -> Result<Option<TelemetrySeries>, TransportError> {
    let mut stream = TcpStream::connect((host, port)).map_err(|source| TransportError::Connect {
        addr: addr.to_string(),
        source,
    })?;
    debug!("Conectado a {addr}");

    let io_err = |source: io::Error| TransportError::Io {
        addr: addr.to_string(),
        source,
    };

    stream.write_all(bytes).map_err(io_err)?;
    stream.flush().map_err(io_err)?;
    debug!("→ {} bytes para {addr}", bytes.len());

    if !wants_response {
        stream.shutdown(Shutdown::Both).ok();
        return Ok(None);
    }

    let mut reader = BufReader::new(&stream);
    let series = read_series(&mut reader, max_records).map_err(|e| match e {
        CodecError::Io(source) => TransportError::Io {
            addr: addr.to_string(),
            source,
        },
        other => TransportError::Decode {
            addr: addr.to_string(),
            source: other,
        },
    })?;
    debug!("← {} amostras de {addr}", series.len());

    stream.shutdown(Shutdown::Both).ok();
    Ok(Some(series))
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use farm_core::protocol::encode_series;
    use farm_core::types::TelemetryRecord;
    use std::io::{BufRead, Read};
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    /// Servidor de uma conexão: lê uma linha e responde `reply`.
    pub(crate) fn one_shot_server(reply: Vec<u8>) -> (u16, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(&stream);
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            (&stream).write_all(&reply).unwrap();
            line
        });
        (port, handle)
    }

    fn records() -> Vec<TelemetryRecord> {
        (0..3)
            .map(|i| TelemetryRecord {
                timestamp: 100 + i * 60,
                values: [i as f64; 6],
            })
            .collect()
    }

    #[test]
    fn fire_and_forget_writes_line_and_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut received = Vec::new();
            // read_to_end só termina porque o cliente fecha a conexão
            stream.read_to_end(&mut received).unwrap();
            received
        });

        let out = execute("127.0.0.1", port, b"{\"command\":1}\n", false, 10).unwrap();
        assert!(out.is_none());
        assert_eq!(handle.join().unwrap(), b"{\"command\":1}\n");
    }

    #[test]
    fn telemetry_response_is_decoded() {
        let (port, handle) = one_shot_server(encode_series(&records()));
        let body = b"{\"unix_time_from\":0,\"unix_time_to\":500}\n";

        let series = execute("127.0.0.1", port, body, true, 10).unwrap().unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.timestamps(), &[100, 160, 220]);
        assert_eq!(
            handle.join().unwrap(),
            "{\"unix_time_from\":0,\"unix_time_to\":500}\n"
        );
    }

    #[test]
    fn short_response_is_decode_error() {
        let mut frame = encode_series(&records());
        frame.truncate(frame.len() - 10);
        let (port, handle) = one_shot_server(frame);

        let err = execute("127.0.0.1", port, b"{}\n", true, 10).unwrap_err();
        assert!(matches!(
            err,
            TransportError::Decode {
                source: CodecError::Truncated { .. },
                ..
            }
        ));
        handle.join().unwrap();
    }

    #[test]
    fn refused_connection_is_connect_error() {
        // Porta liberada logo após o bind: ninguém escutando
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = execute("127.0.0.1", port, b"{}\n", false, 10).unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }

    #[test]
    fn unresolvable_host_is_connect_error() {
        let err = execute("fazenda.invalid", 1490, b"{}\n", false, 10).unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }
}

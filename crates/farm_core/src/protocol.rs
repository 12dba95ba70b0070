//! Protocolo binário da resposta de telemetria.
//!
//! Formato do frame (big-endian, largura fixa, sem padding):
//!
//! ```text
//! ┌──────────┬───────────────────────────────────────────┐
//! │ Count(4) │ n × [ Timestamp(8) │ Canal[0..6] (6×8) ]  │
//! └──────────┴───────────────────────────────────────────┘
//! ```
//!
//! - `Count`: `i32` com o número de amostras
//! - `Timestamp`: `i64`, epoch em segundos
//! - Canais: `f64` na ordem de [`CHANNEL_NAMES`](crate::types::CHANNEL_NAMES)
//!
//! Não há terminador: o leitor consome exatamente `4 + n × 56` bytes.
//! A decodificação é estrita: ou a série inteira chega, ou nada é entregue.

use crate::types::{CHANNEL_COUNT, TelemetryRecord, TelemetrySeries};
use std::io::{self, Read};

/// Tamanho do header (contador de amostras).
pub const HEADER_SIZE: usize = 4;

/// Tamanho de uma amostra no fio.
pub const RECORD_SIZE: usize = 8 + CHANNEL_COUNT * 8;

/// Teto de pré-alocação ao ler de um stream; o resto cresce sob demanda.
const PREALLOC_LIMIT: usize = 4096;

/// Erros do protocolo.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Resposta truncada: esperados {expected} bytes, recebidos {got}")]
    Truncated { expected: usize, got: usize },

    #[error("Contador de amostras negativo: {0}")]
    NegativeCount(i32),

    #[error("Contador de amostras excessivo: {count} (limite {limit})")]
    TooManyRecords { count: usize, limit: usize },

    #[error("{0} bytes sobrando após a última amostra")]
    TrailingBytes(usize),

    #[error("Erro de leitura: {0}")]
    Io(#[from] io::Error),
}

/// Tamanho total do frame para `n` amostras.
pub fn frame_len(n: usize) -> usize {
    HEADER_SIZE + n * RECORD_SIZE
}

/// Codifica amostras no formato de resposta do controlador.
pub fn encode_series(records: &[TelemetryRecord]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(frame_len(records.len()));
    frame.extend_from_slice(&(records.len() as i32).to_be_bytes());
    for rec in records {
        frame.extend_from_slice(&rec.timestamp.to_be_bytes());
        for value in rec.values {
            frame.extend_from_slice(&value.to_be_bytes());
        }
    }
    frame
}

/// Decodifica um frame completo já em memória.
///
/// O contador é conferido contra o tamanho real antes de qualquer alocação.
pub fn decode_series(data: &[u8]) -> Result<TelemetrySeries, CodecError> {
    let count = parse_count(data)?;

    let expected = HEADER_SIZE
        .checked_add(count.saturating_mul(RECORD_SIZE))
        .unwrap_or(usize::MAX);
    if data.len() < expected {
        return Err(CodecError::Truncated {
            expected,
            got: data.len(),
        });
    }
    if data.len() > expected {
        return Err(CodecError::TrailingBytes(data.len() - expected));
    }

    let records: Vec<TelemetryRecord> = data[HEADER_SIZE..]
        .chunks_exact(RECORD_SIZE)
        .map(parse_record)
        .collect();
    Ok(TelemetrySeries::from_records(&records))
}

/// Lê um frame de um stream bloqueante (socket).
///
/// Lê amostra por amostra; EOF antes de `n` amostras vira
/// [`CodecError::Truncated`]. Contadores acima de `max_records` são
/// rejeitados sem ler o corpo.
pub fn read_series<R: Read>(reader: &mut R, max_records: usize) -> Result<TelemetrySeries, CodecError> {
    let mut header = [0u8; HEADER_SIZE];
    read_exact_or_truncated(reader, &mut header, HEADER_SIZE, 0)?;
    let count = parse_count(&header)?;

    if count > max_records {
        return Err(CodecError::TooManyRecords {
            count,
            limit: max_records,
        });
    }

    let mut records = Vec::with_capacity(count.min(PREALLOC_LIMIT));
    let mut buf = [0u8; RECORD_SIZE];
    for i in 0..count {
        read_exact_or_truncated(reader, &mut buf, frame_len(count), frame_len(i))?;
        records.push(parse_record(&buf));
    }

    Ok(TelemetrySeries::from_records(&records))
}

fn parse_count(data: &[u8]) -> Result<usize, CodecError> {
    let Some(bytes) = data.get(..HEADER_SIZE) else {
        return Err(CodecError::Truncated {
            expected: HEADER_SIZE,
            got: data.len(),
        });
    };
    let count = i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    usize::try_from(count).map_err(|_| CodecError::NegativeCount(count))
}

fn parse_record(chunk: &[u8]) -> TelemetryRecord {
    let word = |at: usize| -> [u8; 8] {
        let mut w = [0u8; 8];
        w.copy_from_slice(&chunk[at..at + 8]);
        w
    };
    TelemetryRecord {
        timestamp: i64::from_be_bytes(word(0)),
        values: std::array::from_fn(|c| f64::from_be_bytes(word(8 + c * 8))),
    }
}

/// `read_exact` que traduz EOF em [`CodecError::Truncated`].
///
/// `consumed` é quanto do frame já foi lido antes deste bloco.
fn read_exact_or_truncated<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    expected: usize,
    consumed: usize,
) -> Result<(), CodecError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(CodecError::Truncated {
                    expected,
                    got: consumed + filled,
                });
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(CodecError::Io(e)),
        }
    }
    Ok(())
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

//! Polling periódico de telemetria para views ao vivo.
//!
//! Cada sessão tem um thread próprio que dispara a busca imediatamente e
//! depois a cada `period`, medido a partir do fim da busca anterior
//! (fixed-delay). A busca roda no [`crate::pool`], e o thread da sessão só
//! espera o resultado, então nunca há duas buscas da mesma sessão em voo.
//!
//! `cancel()` interrompe os próximos ticks na hora. Uma busca já em voo não
//! é abortada (o read do socket é bloqueante); o resultado dela é descartado.
//! A checagem do cancelamento e a chamada de `on_tick` não são atômicas: um
//! `cancel()` vindo de outro thread pode ainda ver no máximo uma entrega que
//! já tinha passado da checagem. Depois de `join()` não há mais entregas.

use crate::operation::Operation;
use crate::pool::{PoolError, PoolHandle};
use crate::transport::TransportError;
use crossbeam_channel::{Receiver, Sender, bounded, select};
use farm_core::request::OperationKind;
use farm_core::types::TelemetrySeries;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Erro ao iniciar uma sessão.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Só buscas de telemetria podem ser agendadas (recebido {0})")]
    NotTelemetry(OperationKind),

    #[error("Falha ao criar thread de polling: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Falha de um tick. A sessão continua no ritmo normal.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Pool recusou a busca: {0}")]
    Rejected(#[from] PoolError),

    #[error("Busca terminou sem resultado")]
    Lost,
}

pub type TickResult = Result<TelemetrySeries, TickError>;

#[derive(Debug, Default)]
struct SessionState {
    cancelled: AtomicBool,
    ticks: AtomicU64,
}

/// Handle de uma sessão de polling. Dropar o handle cancela a sessão.
#[derive(Debug)]
pub struct SessionHandle {
    state: Arc<SessionState>,
    cancel_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Para os próximos ticks. Idempotente. Um tick já entregue ao
    /// assinante termina normalmente; use `join()` para esperar por ele.
    pub fn cancel(&self) {
        if !self.state.cancelled.swap(true, Ordering::SeqCst) {
            self.cancel_tx.try_send(()).ok();
            debug!("Sessão de polling cancelada");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Quantos resultados já foram entregues ao assinante.
    pub fn ticks(&self) -> u64 {
        self.state.ticks.load(Ordering::SeqCst)
    }

    /// Espera o thread da sessão terminar (após `cancel()` ou pânico do
    /// assinante).
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Thread de polling terminou com pânico");
            }
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Inicia uma sessão de polling.
///
/// `on_tick` recebe uma série nova (ou a falha) a cada disparo, sempre no
/// thread da sessão e em ordem.
pub fn start<F>(
    pool: &PoolHandle,
    operation: Operation,
    period: Duration,
    on_tick: F,
) -> Result<SessionHandle, ScheduleError>
where
    F: FnMut(TickResult) + Send + 'static,
{
    if operation.kind() != OperationKind::FetchTelemetry {
        return Err(ScheduleError::NotTelemetry(operation.kind()));
    }

    let state = Arc::new(SessionState::default());
    let (cancel_tx, cancel_rx) = bounded::<()>(1);

    let session = Session {
        pool: pool.clone(),
        operation,
        period,
        state: state.clone(),
        cancel_rx,
    };
    let thread = std::thread::Builder::new()
        .name("farm-poll".into())
        .spawn(move || session.run(on_tick))?;

    info!("Polling iniciado a cada {:.1}s", period.as_secs_f64());
    Ok(SessionHandle {
        state,
        cancel_tx,
        thread: Some(thread),
    })
}

struct Session {
    pool: PoolHandle,
    operation: Operation,
    period: Duration,
    state: Arc<SessionState>,
    cancel_rx: Receiver<()>,
}

impl Session {
    fn run<F>(self, mut on_tick: F)
    where
        F: FnMut(TickResult),
    {
        loop {
            if self.cancelled() {
                break;
            }

            let Some(outcome) = self.fire() else {
                break;
            };

            if let Err(e) = &outcome {
                debug!("Tick falhou: {e}");
            }
            // Cancelado durante a busca: descarta o resultado
            if self.cancelled() {
                break;
            }
            on_tick(outcome);
            self.state.ticks.fetch_add(1, Ordering::SeqCst);

            select! {
                recv(self.cancel_rx) -> _ => break,
                default(self.period) => {}
            }
        }
        debug!("Thread de polling encerrado");
    }

    /// Dispara uma busca e espera o fim dela. `None` se cancelado no meio.
    fn fire(&self) -> Option<TickResult> {
        let (done_tx, done_rx) = bounded(1);
        let operation = self.operation.clone();
        let max_records = self.pool.max_records();

        if let Err(e) = self.pool.spawn(move || {
            // O receptor some se a sessão for cancelada antes do fim
            done_tx.send(operation.execute(max_records)).ok();
        }) {
            warn!("Tick de polling recusado: {e}");
            return Some(Err(TickError::Rejected(e)));
        }

        select! {
            recv(done_rx) -> done => Some(match done {
                Ok(Ok(result)) => result.into_series().ok_or(TickError::Lost),
                Ok(Err(e)) => Err(TickError::Transport(e)),
                Err(_) => Err(TickError::Lost),
            }),
            recv(self.cancel_rx) -> _ => None,
        }
    }

    fn cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }
}

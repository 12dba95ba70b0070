//! Pool fixo de workers para as tarefas de transporte.
//!
//! Toda troca com o controlador roda aqui, nunca no thread de quem pediu
//! (UI, CLI ou tick do scheduler). O número de conexões simultâneas fica
//! limitado a `workers` e a fila a `queue_capacity`.

use crate::operation::{Operation, OperationResult};
use crate::transport::TransportError;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, select};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use tracing::{debug, error, info};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Erros ao enfileirar trabalho.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Fila do pool cheia")]
    QueueFull,

    #[error("Pool encerrado")]
    Closed,
}

/// Pool de threads com fila limitada.
///
/// Ao ser dropado, recusa jobs novos, deixa os workers esvaziarem o que já
/// foi enfileirado e faz join, mesmo com [`PoolHandle`]s ainda vivos.
pub struct WorkerPool {
    handle: PoolHandle,
    shutdown: Option<Sender<()>>,
    workers: Vec<JoinHandle<()>>,
}

/// Lado clonável do pool, usado para enfileirar trabalho.
#[derive(Clone)]
pub struct PoolHandle {
    tx: Sender<Job>,
    closed: Arc<AtomicBool>,
    max_records: usize,
}

impl WorkerPool {
    /// Cria `workers` threads (mínimo 1) e uma fila de `queue_capacity` jobs.
    pub fn new(workers: usize, queue_capacity: usize, max_records: usize) -> std::io::Result<Self> {
        let capacity = queue_capacity.max(1);
        let (tx, rx) = bounded::<Job>(capacity);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let mut threads = Vec::with_capacity(workers.max(1));
        for i in 0..workers.max(1) {
            let rx = rx.clone();
            let shutdown_rx = shutdown_rx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("farm-worker-{i}"))
                .spawn(move || worker_loop(&rx, &shutdown_rx))?;
            threads.push(handle);
        }
        info!("Pool iniciado: {} workers, fila {capacity}", threads.len());

        Ok(Self {
            handle: PoolHandle {
                tx,
                closed: Arc::new(AtomicBool::new(false)),
                max_records,
            },
            shutdown: Some(shutdown_tx),
            workers: threads,
        })
    }

    pub fn handle(&self) -> PoolHandle {
        self.handle.clone()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.handle.closed.store(true, Ordering::SeqCst);
        // Desconectar o canal de shutdown acorda todos os workers
        drop(self.shutdown.take());

        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("Worker terminou com pânico");
            }
        }
        debug!("Pool encerrado");
    }
}

impl PoolHandle {
    /// Enfileira um job sem bloquear.
    pub fn spawn<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PoolError::Closed);
        }
        self.tx.try_send(Box::new(job)).map_err(|e| match e {
            TrySendError::Full(_) => PoolError::QueueFull,
            TrySendError::Disconnected(_) => PoolError::Closed,
        })
    }

    /// Executa `operation` num worker e entrega o resultado a `on_result`.
    ///
    /// O callback roda no thread do worker.
    pub fn submit<F>(&self, operation: Operation, on_result: F) -> Result<(), PoolError>
    where
        F: FnOnce(Result<OperationResult, TransportError>) + Send + 'static,
    {
        let max_records = self.max_records;
        self.spawn(move || on_result(operation.execute(max_records)))
    }

    pub fn max_records(&self) -> usize {
        self.max_records
    }
}

fn worker_loop(rx: &Receiver<Job>, shutdown: &Receiver<()>) {
    loop {
        select! {
            recv(rx) -> job => match job {
                Ok(job) => run_job(job),
                Err(_) => break,
            },
            recv(shutdown) -> _ => {
                // Esvazia o que já estava na fila antes de sair
                while let Ok(job) = rx.try_recv() {
                    run_job(job);
                }
                break;
            }
        }
    }
}

fn run_job(job: Job) {
    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
        error!("Job do pool entrou em pânico; worker continua");
    }
}

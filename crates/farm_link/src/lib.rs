//! # Farm Link
//!
//! Camada de comunicação com o controlador da fazenda: uma conexão TCP por
//! operação, pool limitado de workers e polling periódico de telemetria.
//!
//! ## Módulos
//! - [`transport`] – Troca bloqueante requisição/resposta
//! - [`operation`] – Operação (tipo + documento + endpoint)
//! - [`pool`] – Pool fixo de workers
//! - [`scheduler`] – Sessões de polling sem sobreposição

pub mod transport;
pub mod operation;
pub mod pool;
pub mod scheduler;

pub use operation::{Endpoint, Operation, OperationError, OperationResult};
pub use pool::{PoolError, PoolHandle, WorkerPool};
pub use scheduler::{SessionHandle, TickError, TickResult};
pub use transport::TransportError;

//! Cola de runs y pool de workers con concurrencia acotada.

use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, watch, Semaphore};

use super::ExecutionEngine;
use crate::errors::EngineError;
use crate::store::Store;

/// Extremo emisor de la cola de runs listos para ejecutar.
#[derive(Debug, Clone)]
pub struct RunQueue {
    tx: mpsc::UnboundedSender<String>,
}

impl RunQueue {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn enqueue(&self, run_id: &str) -> Result<(), EngineError> {
        self.tx.send(run_id.to_string()).map_err(|_| EngineError::QueueClosed)
    }
}

/// Ejecuta cada run en su propia tarea tokio, como máximo `concurrency` a la
/// vez. Los tasks de un mismo run siguen siendo secuenciales.
pub struct WorkerPool<S: Store + 'static> {
    engine: ExecutionEngine<S>,
    concurrency: usize,
}

impl<S: Store + 'static> WorkerPool<S> {
    pub fn new(engine: ExecutionEngine<S>, concurrency: usize) -> Self {
        Self { engine,
               concurrency: concurrency.max(1) }
    }

    /// Consume la cola hasta que se cierre o `shutdown` pase a `true`, y
    /// espera a que terminen los runs en vuelo.
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<String>, mut shutdown: watch::Receiver<bool>) {
        let sem = Arc::new(Semaphore::new(self.concurrency));
        info!("worker pool iniciado (concurrency={})", self.concurrency);

        loop {
            let run_id = tokio::select! {
                next = rx.recv() => match next {
                    Some(id) => id,
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            };

            let permit = match Arc::clone(&sem).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let engine = self.engine.clone();
            tokio::spawn(async move {
                match engine.execute(&run_id).await {
                    Ok(run) => info!("run {} terminó en {}", run.id, run.status),
                    Err(EngineError::NotClaimable { id, status }) => {
                        debug!("run {} no reclamable ({}), ignorado", id, status)
                    }
                    Err(EngineError::LeaseLost(id)) => warn!("run {} quedó en manos de otro engine", id),
                    Err(e) => error!("run {} falló en el engine: {}", run_id, e),
                }
                drop(permit);
            });
        }

        let _ = sem.acquire_many(self.concurrency as u32).await;
        info!("worker pool detenido");
    }
}

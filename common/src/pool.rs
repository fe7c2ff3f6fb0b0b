//! Pool acotado de executors.
//!
//! Cada handle tiene un flag `in_use`; tomarlo es un compare-exchange, así que
//! `acquire` se puede llamar desde varios hilos. Si no hay ninguno libre se
//! duerme y se reintenta hasta `acquire_retries` veces.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::PoolConfig;
use crate::error::{ClusterResult, PoolError};
use crate::executor::RemoteExecutor;

struct Slot {
    executor: Box<dyn RemoteExecutor>,
    in_use: AtomicBool,
}

pub struct ConnectionPool {
    role: String,
    slots: Vec<Slot>,
    retries: u32,
    interval: Duration,
}

impl ConnectionPool {
    pub fn new(role: &str, executors: Vec<Box<dyn RemoteExecutor>>, config: &PoolConfig) -> Self {
        Self::with_retries(
            role,
            executors,
            config.acquire_retries,
            Duration::from_millis(config.retry_interval_ms),
        )
    }

    pub fn with_retries(
        role: &str,
        executors: Vec<Box<dyn RemoteExecutor>>,
        retries: u32,
        interval: Duration,
    ) -> Self {
        Self {
            role: role.to_string(),
            slots: executors
                .into_iter()
                .map(|executor| Slot {
                    executor,
                    in_use: AtomicBool::new(false),
                })
                .collect(),
            retries,
            interval,
        }
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    pub fn in_use(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.in_use.load(Ordering::Acquire))
            .count()
    }

    /// Un solo intento, sin esperar.
    pub fn try_acquire(&self) -> Option<PooledConnection<'_>> {
        self.slots.iter().enumerate().find_map(|(index, slot)| {
            slot.in_use
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .ok()
                .map(|_| PooledConnection { pool: self, index })
        })
    }

    pub fn acquire(&self) -> Result<PooledConnection<'_>, PoolError> {
        if self.slots.is_empty() {
            return Err(PoolError::Empty {
                role: self.role.clone(),
            });
        }

        for attempt in 0..=self.retries {
            if let Some(conn) = self.try_acquire() {
                if attempt > 0 {
                    debug!("pool {}: conexión {} tras {} reintentos", self.role, conn.index, attempt);
                }
                return Ok(conn);
            }
            if attempt < self.retries {
                thread::sleep(self.interval);
            }
        }

        warn!("pool {} agotado ({} conexiones ocupadas)", self.role, self.slots.len());
        Err(PoolError::Exhausted {
            role: self.role.clone(),
            attempts: self.retries + 1,
        })
    }

    /// Toma una conexión, ejecuta y la libera.
    pub fn run(&self, command: &str) -> ClusterResult<String> {
        let conn = self.acquire()?;
        Ok(conn.run(command)?)
    }

    fn release(&self, index: usize) {
        if let Some(slot) = self.slots.get(index) {
            slot.in_use.store(false, Ordering::Release);
        }
    }
}

/// Conexión tomada del pool; se devuelve al soltarla.
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    index: usize,
}

impl PooledConnection<'_> {
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Deref for PooledConnection<'_> {
    type Target = dyn RemoteExecutor;

    fn deref(&self) -> &Self::Target {
        self.pool.slots[self.index].executor.as_ref()
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        self.pool.release(self.index);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Instant;

    use super::*;
    use crate::error::TransportError;

    fn echo() -> Box<dyn RemoteExecutor> {
        Box::new(|cmd: &str| Ok::<_, TransportError>(cmd.to_string()))
    }

    fn pool(size: usize, retries: u32) -> ConnectionPool {
        ConnectionPool::with_retries(
            "test",
            (0..size).map(|_| echo()).collect(),
            retries,
            Duration::from_millis(2),
        )
    }

    #[test]
    fn pool_agotado_da_error() {
        let p = pool(1, 3);
        let _held = p.acquire().unwrap();
        let err = p.acquire().err().unwrap();
        assert_eq!(
            err,
            PoolError::Exhausted {
                role: "test".into(),
                attempts: 4
            }
        );
    }

    #[test]
    fn pool_vacio() {
        let p = pool(0, 3);
        assert!(matches!(p.acquire(), Err(PoolError::Empty { .. })));
    }

    #[test]
    fn se_libera_al_soltar() {
        let p = pool(1, 0);
        {
            let conn = p.acquire().unwrap();
            assert_eq!(conn.run("ls").unwrap(), "ls");
            assert_eq!(p.in_use(), 1);
        }
        assert_eq!(p.in_use(), 0);
        assert!(p.try_acquire().is_some());
    }

    #[test]
    fn acquire_espera_a_que_se_libere() {
        let p = Arc::new(pool(1, 200));
        let p2 = Arc::clone(&p);
        let holder = thread::spawn(move || {
            let _c = p2.acquire().unwrap();
            thread::sleep(Duration::from_millis(30));
        });
        thread::sleep(Duration::from_millis(5));

        let start = Instant::now();
        let conn = p.acquire();
        assert!(conn.is_ok());
        drop(conn);
        holder.join().unwrap();
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn nunca_mas_conexiones_que_el_tamano() {
        let p = Arc::new(pool(2, 1_000));
        let busy = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let (p, busy, peak) = (Arc::clone(&p), Arc::clone(&busy), Arc::clone(&peak));
                thread::spawn(move || {
                    for _ in 0..5 {
                        let _c = p.acquire().unwrap();
                        let now = busy.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(1));
                        busy.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(p.in_use(), 0);
    }
}

// controller/src/state.rs

use std::sync::{Arc, Mutex, MutexGuard};

use common::commands::{FaultCommands, Submitter};
use common::{ClusterConfig, Controller, StateTree, TickReport};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ClusterConfig>,
    // espejo compartido con el controlador; los handlers sólo leen
    pub tree: Arc<Mutex<StateTree>>,
    pub controller: Arc<Mutex<Controller>>,
    // comandos manuales (pool de faulting y de submission)
    pub faults: Arc<FaultCommands>,
    pub submitter: Arc<Submitter>,
    pub last_report: Arc<Mutex<Option<TickReport>>>,
}

impl AppState {
    pub fn new(
        config: Arc<ClusterConfig>,
        controller: Controller,
        faults: FaultCommands,
        submitter: Submitter,
    ) -> Self {
        Self {
            config,
            tree: controller.tree(),
            controller: Arc::new(Mutex::new(controller)),
            faults: Arc::new(faults),
            submitter: Arc::new(submitter),
            last_report: Arc::new(Mutex::new(None)),
        }
    }

    pub fn tree(&self) -> MutexGuard<'_, StateTree> {
        self.tree.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

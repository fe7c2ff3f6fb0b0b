//! Ciclo del controlador.
//!
//! Un tick:
//! 1. refresca cada nodo;
//! 2. lista las aplicaciones (todos los estados) y baja a attempts y containers;
//! 3. chequea restricciones;
//! 4. falla si no queda ningún nodo RUNNING;
//! 5. decide fallos por nodo y ejecuta los comandos.
//!
//! El árbol se bloquea sólo para leer / aplicar; las consultas remotas se hacen
//! con el lock suelto para no frenar a los lectores HTTP.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::app::{AppState, FinalStatus};
use crate::commands::FaultCommands;
use crate::config::ClusterConfig;
use crate::constraints::{ConstraintReport, ConstraintSet};
use crate::error::{ClusterError, ClusterResult};
use crate::fault::{ActiveFault, FaultDecider, FaultDecision, FaultKind};
use crate::node::NodeRef;
use crate::parser::ClusterMonitor;
use crate::tree::StateTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultAction {
    Inject,
    Repair,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultEffect {
    pub node: String,
    pub kind: FaultKind,
    pub action: FaultAction,
    /// El comando remoto confirmó el cambio
    pub applied: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickReport {
    pub started_at: DateTime<Utc>,
    pub nodes_refreshed: usize,
    pub apps_seen: usize,
    pub attempts_seen: usize,
    pub containers_seen: usize,
    pub constraints: ConstraintReport,
    pub faults: Vec<FaultEffect>,
}

pub struct Controller {
    config: Arc<ClusterConfig>,
    tree: Arc<Mutex<StateTree>>,
    monitor: Box<dyn ClusterMonitor>,
    faults: FaultCommands,
    decider: FaultDecider,
    constraints: ConstraintSet,
}

impl Controller {
    pub fn new(
        config: Arc<ClusterConfig>,
        tree: Arc<Mutex<StateTree>>,
        monitor: Box<dyn ClusterMonitor>,
        faults: FaultCommands,
        constraints: ConstraintSet,
    ) -> Self {
        Self {
            decider: FaultDecider::new(&config.faults),
            config,
            tree,
            monitor,
            faults,
            constraints,
        }
    }

    pub fn tree(&self) -> Arc<Mutex<StateTree>> {
        Arc::clone(&self.tree)
    }

    fn lock(&self) -> MutexGuard<'_, StateTree> {
        self.tree.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn tick(&mut self) -> ClusterResult<TickReport> {
        let started_at = Utc::now();

        let nodes_refreshed = self.refresh_nodes()?;
        let (apps_seen, attempts_seen, containers_seen) = self.refresh_applications()?;

        let constraints = self.constraints.check(&self.lock());
        if !constraints.valid {
            warn!("{} restricciones violadas", constraints.violations.len());
        }

        self.ensure_reconfigurable()?;

        let faults = if self.config.faults.enabled {
            self.evaluate_faults()?
        } else {
            Vec::new()
        };

        Ok(TickReport {
            started_at,
            nodes_refreshed,
            apps_seen,
            attempts_seen,
            containers_seen,
            constraints,
            faults,
        })
    }

    /* ---------------- paso 1: nodos ---------------- */

    fn refresh_nodes(&self) -> ClusterResult<usize> {
        let targets: Vec<(NodeRef, String)> = self
            .lock()
            .nodes()
            .map(|(r, n)| (r, n.node_id.clone()))
            .collect();

        let mut refreshed = 0;
        for (r, node_id) in targets {
            match self.monitor.node_details(&node_id)? {
                Some(result) => {
                    self.lock().apply_node(r, &result)?;
                    refreshed += 1;
                }
                None => debug!("sin datos para el nodo {}", node_id),
            }
        }

        let tree = self.lock();
        for (r, node) in tree.nodes() {
            tree.directory().set_reachable(r, node.is_reachable());
        }
        Ok(refreshed)
    }

    /* ---------------- paso 2: aplicaciones ---------------- */

    fn refresh_applications(&self) -> ClusterResult<(usize, usize, usize)> {
        let apps = self.monitor.list_applications(AppState::all_yarn())?;
        let (mut attempts_seen, mut containers_seen) = (0, 0);

        for result in &apps {
            // se mira el estado previo: el tick en que la app termina todavía baja
            // a attempts y containers para dejarlos en su estado final
            let settled = {
                let mut tree = self.lock();
                let r = tree.claim_app(&result.app_id)?;
                let settled = tree
                    .app(r)
                    .map(|a| {
                        a.state.is_terminal()
                            && a.final_status != FinalStatus::Undefined
                            && !a.attempts.is_empty()
                    })
                    .unwrap_or(false);
                tree.apply_app(r, result)?;
                settled
            };
            if settled {
                continue;
            }

            for attempt in self.monitor.list_attempts(&result.app_id)? {
                let att = {
                    let mut tree = self.lock();
                    let Some(app) = tree.find_app(&result.app_id) else {
                        continue;
                    };
                    let att = tree.claim_attempt(app, &attempt.attempt_id)?;
                    tree.apply_attempt(att, &attempt)?;
                    att
                };
                attempts_seen += 1;

                for container in self.monitor.list_containers(&attempt.attempt_id)? {
                    let mut tree = self.lock();
                    let c = tree.claim_container(att, &container.container_id)?;
                    tree.apply_container(c, &container)?;
                    containers_seen += 1;
                }
            }
        }

        Ok((apps.len(), attempts_seen, containers_seen))
    }

    /* ---------------- paso 4 ---------------- */

    pub fn ensure_reconfigurable(&self) -> ClusterResult<()> {
        if self.lock().nodes().any(|(_, n)| n.is_running()) {
            Ok(())
        } else {
            Err(ClusterError::NoReconfiguration)
        }
    }

    /* ---------------- paso 5: fallos ---------------- */

    fn evaluate_faults(&mut self) -> ClusterResult<Vec<FaultEffect>> {
        let decisions: Vec<(NodeRef, String, FaultDecision)> = {
            let tree = self.tree.lock().unwrap_or_else(|e| e.into_inner());
            let decider = &mut self.decider;
            tree.nodes()
                .map(|(r, n)| (r, n.name.clone(), decider.decide(n)))
                .collect()
        };

        let mut effects = Vec::new();
        for (r, name, decision) in decisions {
            match decision {
                FaultDecision::Keep => {}
                FaultDecision::Inject { kind, usage } => {
                    let applied = match kind {
                        FaultKind::NodeDead => self.faults.stop_node(&name)?,
                        FaultKind::NodeConnectionError => self.faults.stop_node_network(&name)?,
                    };
                    if applied {
                        info!("fallo {:?} inyectado en {} (carga {:.2})", kind, name, usage);
                        self.mark_fault(r, Some(ActiveFault { kind, activation_usage: usage }));
                    } else {
                        warn!("no se pudo inyectar {:?} en {}", kind, name);
                    }
                    effects.push(FaultEffect {
                        node: name,
                        kind,
                        action: FaultAction::Inject,
                        applied,
                    });
                }
                FaultDecision::Repair { kind } => {
                    let applied = match kind {
                        FaultKind::NodeDead => self.faults.start_node(&name)?,
                        FaultKind::NodeConnectionError => self.faults.start_node_network(&name)?,
                    };
                    if applied {
                        info!("fallo {:?} reparado en {}", kind, name);
                        self.mark_fault(r, None);
                    } else {
                        warn!("no se pudo reparar {:?} en {}", kind, name);
                    }
                    effects.push(FaultEffect {
                        node: name,
                        kind,
                        action: FaultAction::Repair,
                        applied,
                    });
                }
            }
        }
        Ok(effects)
    }

    /// Aplica (o limpia) el fallo en el nodo y actualiza su alcanzabilidad.
    fn mark_fault(&self, r: NodeRef, fault: Option<ActiveFault>) {
        let mut tree = self.lock();
        let Some(node) = tree.node_mut(r) else {
            return;
        };
        match fault {
            Some(f) => match f.kind {
                FaultKind::NodeDead => node.active = false,
                FaultKind::NodeConnectionError => node.connected = false,
            },
            None => {
                if let Some(previous) = node.fault {
                    match previous.kind {
                        FaultKind::NodeDead => node.active = true,
                        FaultKind::NodeConnectionError => node.connected = true,
                    }
                }
            }
        }
        node.fault = fault;
        let reachable = node.is_reachable();
        tree.directory().set_reachable(r, reachable);
    }

    /// Gancho de reconfiguración: libera todos los slots del árbol.
    pub fn reset(&self) {
        info!("reset del árbol de estado");
        self.lock().reset();
    }
}

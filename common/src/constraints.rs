//! Restricciones sobre el espejo del cluster.
//!
//! Cada entidad corre toda su lista y loguea cada violación. Dentro de un nivel
//! (y entre hermanos) se corta en la primera entidad inválida; una app es
//! válida sólo si sus attempts lo son, y un attempt sólo si sus containers lo son.
//! Los nodos y las apps se chequean siempre.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::app::{AppState, Application};
use crate::attempt::Attempt;
use crate::container::{Container, ContainerState};
use crate::node::Node;
use crate::tree::StateTree;

type Check<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

struct Constraint<T> {
    name: String,
    check: Check<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub entity: String,
    pub constraint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintReport {
    pub valid: bool,
    pub violations: Vec<Violation>,
}

#[derive(Default)]
pub struct ConstraintSet {
    nodes: Vec<Constraint<Node>>,
    apps: Vec<Constraint<Application>>,
    attempts: Vec<Constraint<Attempt>>,
    containers: Vec<Constraint<Container>>,
}

impl ConstraintSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Restricciones de coherencia básicas del modelo.
    pub fn defaults() -> Self {
        Self::empty()
            .node("memoria usada <= capacidad", |n| {
                match (n.memory.used(), n.memory.capacity()) {
                    (Some(used), Some(cap)) => used <= cap,
                    _ => true,
                }
            })
            .node("cpu usada <= capacidad", |n| match (n.cpu.used(), n.cpu.capacity()) {
                (Some(used), Some(cap)) => used <= cap,
                _ => true,
            })
            .app("progreso en 0..=100", |a| (0.0..=100.0).contains(&a.progress))
            .app("app RUNNING con al menos un attempt", |a| {
                !a.state.contains(AppState::RUNNING) || !a.attempts.is_empty()
            })
            .attempt("attempt RUNNING con AM container", |a| {
                !a.state.contains(AppState::RUNNING) || !a.am_container_id.is_empty()
            })
            .container("container RUNNING con host", |c| {
                c.state != ContainerState::Running || c.host.is_some()
            })
    }

    pub fn node(mut self, name: &str, check: impl Fn(&Node) -> bool + Send + Sync + 'static) -> Self {
        self.nodes.push(Constraint {
            name: name.to_string(),
            check: Box::new(check),
        });
        self
    }

    pub fn app(
        mut self,
        name: &str,
        check: impl Fn(&Application) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.apps.push(Constraint {
            name: name.to_string(),
            check: Box::new(check),
        });
        self
    }

    pub fn attempt(
        mut self,
        name: &str,
        check: impl Fn(&Attempt) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.attempts.push(Constraint {
            name: name.to_string(),
            check: Box::new(check),
        });
        self
    }

    pub fn container(
        mut self,
        name: &str,
        check: impl Fn(&Container) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.containers.push(Constraint {
            name: name.to_string(),
            check: Box::new(check),
        });
        self
    }

    pub fn check(&self, tree: &StateTree) -> ConstraintReport {
        let mut violations = Vec::new();

        let nodes_ok = tree
            .nodes()
            .all(|(_, n)| run_all(&self.nodes, n, &n.name, &mut violations));

        let apps_ok = tree.apps().all(|(_, app)| {
            run_all(&self.apps, app, &app.app_id, &mut violations)
                && app.attempts.iter().all(|r| match tree.attempt(*r) {
                    Some(att) => self.check_attempt(tree, att, &mut violations),
                    None => true,
                })
        });

        ConstraintReport {
            valid: nodes_ok && apps_ok,
            violations,
        }
    }

    fn check_attempt(&self, tree: &StateTree, att: &Attempt, out: &mut Vec<Violation>) -> bool {
        run_all(&self.attempts, att, &att.attempt_id, out)
            && att.containers.iter().all(|r| match tree.container(*r) {
                Some(c) => run_all(&self.containers, c, &c.container_id, out),
                None => true,
            })
    }
}

/// Corre todas las restricciones de la entidad, sin cortar en la primera.
fn run_all<T>(constraints: &[Constraint<T>], entity: &T, label: &str, out: &mut Vec<Violation>) -> bool {
    let mut ok = true;
    for c in constraints {
        if !(c.check)(entity) {
            warn!("restricción violada en {}: {}", label, c.name);
            out.push(Violation {
                entity: label.to_string(),
                constraint: c.name.clone(),
            });
            ok = false;
        }
    }
    ok
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::ClusterConfig;
    use crate::directory::NodeDirectory;
    use crate::node::NodeRef;
    use crate::results::{ApplicationResult, NodeResult};

    fn tree() -> StateTree {
        let mut config = ClusterConfig::default();
        config.nodes = vec!["compute-1".into(), "compute-2".into()];
        let dir = Arc::new(NodeDirectory::new(&config.nodes));
        StateTree::new(&config, dir)
    }

    fn running_app(tree: &mut StateTree, id: &str) {
        let r = tree.claim_app(id).unwrap();
        tree.apply_app(
            r,
            &ApplicationResult {
                state: Some(AppState::RUNNING),
                ..Default::default()
            },
        )
        .unwrap();
    }

    #[test]
    fn arbol_vacio_es_valido() {
        let report = ConstraintSet::defaults().check(&tree());
        assert!(report.valid);
        assert!(report.violations.is_empty());
    }

    #[test]
    fn entidad_corre_todas_sus_restricciones() {
        let set = ConstraintSet::empty()
            .node("a", |_| false)
            .node("b", |_| false);
        let report = set.check(&tree());
        assert!(!report.valid);
        // las dos del primer nodo, y se corta antes del segundo
        assert_eq!(report.violations.len(), 2);
        assert!(report.violations.iter().all(|v| v.entity == "compute-1"));
    }

    #[test]
    fn todos_los_niveles_se_chequean() {
        let mut t = tree();
        running_app(&mut t, "application_1_0001");
        let set = ConstraintSet::defaults().node("siempre falla", |_| false);
        let report = set.check(&t);
        let constraints: Vec<_> = report.violations.iter().map(|v| v.constraint.as_str()).collect();
        assert_eq!(
            constraints,
            vec!["siempre falla", "app RUNNING con al menos un attempt"]
        );
    }

    #[test]
    fn corta_en_la_primera_app_invalida() {
        let mut t = tree();
        running_app(&mut t, "application_1_0001");
        running_app(&mut t, "application_1_0002");
        let report = ConstraintSet::defaults().check(&t);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].entity, "application_1_0001");
    }

    #[test]
    fn attempt_invalido_invalida_la_app() {
        let mut t = tree();
        running_app(&mut t, "application_1_0001");
        let app = t.find_app("application_1_0001").unwrap();
        let att = t.claim_attempt(app, "appattempt_1_0001_000001").unwrap();
        t.apply_attempt(
            att,
            &crate::results::AttemptResult {
                state: Some(AppState::RUNNING),
                ..Default::default()
            },
        )
        .unwrap();

        let report = ConstraintSet::defaults().check(&t);
        assert!(!report.valid);
        assert_eq!(report.violations[0].entity, "appattempt_1_0001_000001");
    }

    #[test]
    fn memoria_por_encima_de_la_capacidad() {
        let mut t = tree();
        t.apply_node(
            NodeRef(0),
            &NodeResult {
                mem_capacity: Some(1024),
                ..Default::default()
            },
        )
        .unwrap();
        t.apply_node(
            NodeRef(0),
            &NodeResult {
                mem_used: Some(4096),
                ..Default::default()
            },
        )
        .unwrap();
        let report = ConstraintSet::defaults().check(&t);
        assert!(!report.valid);
        assert_eq!(report.violations[0].constraint, "memoria usada <= capacidad");
    }
}

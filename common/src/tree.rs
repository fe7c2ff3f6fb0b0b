//! Espejo en memoria del cluster.
//!
//! Cuatro niveles fijos: nodos -> aplicaciones -> attempts -> containers.
//! Los nodos se crean al configurar y no cambian. Aplicaciones, attempts y
//! containers viven en pools de slots pre-asignados: un id vacío es un slot
//! libre, que reclama el próximo registro parseado que no coincida con ningún id
//! conocido. Acá no hay borrado, sólo reclamar / sobrescribir.

use std::sync::Arc;

use tracing::debug;

use crate::app::{AppRef, Application};
use crate::attempt::{Attempt, AttemptRef};
use crate::config::ClusterConfig;
use crate::container::{Container, ContainerRef};
use crate::directory::NodeDirectory;
use crate::error::StateError;
use crate::node::{Node, NodeRef};
use crate::results::{ApplicationResult, AttemptResult, ContainerResult, NodeResult};

pub struct StateTree {
    directory: Arc<NodeDirectory>,
    max_field_len: usize,

    nodes: Vec<Node>,
    apps: Vec<Application>,
    attempts: Vec<Attempt>,
    containers: Vec<Container>,
}

impl StateTree {
    pub fn new(config: &ClusterConfig, directory: Arc<NodeDirectory>) -> Self {
        let nodes = directory
            .refs()
            .filter_map(|r| directory.name(r).map(|n| Node::new(n, config.node_id(n))))
            .collect();

        Self {
            nodes,
            apps: vec![Application::default(); config.slots.applications],
            attempts: vec![Attempt::default(); config.slots.attempts],
            containers: vec![Container::default(); config.slots.containers],
            max_field_len: config.max_field_len,
            directory,
        }
    }

    pub fn directory(&self) -> &Arc<NodeDirectory> {
        &self.directory
    }

    /* ---------------- lectura ---------------- */

    pub fn nodes(&self) -> impl Iterator<Item = (NodeRef, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeRef(i), n))
    }

    pub fn node(&self, r: NodeRef) -> Option<&Node> {
        self.nodes.get(r.0)
    }

    pub fn node_mut(&mut self, r: NodeRef) -> Option<&mut Node> {
        self.nodes.get_mut(r.0)
    }

    pub fn node_by_name(&self, name: &str) -> Option<NodeRef> {
        self.nodes.iter().position(|n| n.name == name).map(NodeRef)
    }

    /// Sólo los slots ocupados.
    pub fn apps(&self) -> impl Iterator<Item = (AppRef, &Application)> {
        self.apps
            .iter()
            .enumerate()
            .filter(|(_, a)| !a.is_free())
            .map(|(i, a)| (AppRef(i), a))
    }

    pub fn app(&self, r: AppRef) -> Option<&Application> {
        self.apps.get(r.0)
    }

    pub fn attempt(&self, r: AttemptRef) -> Option<&Attempt> {
        self.attempts.get(r.0)
    }

    pub fn container(&self, r: ContainerRef) -> Option<&Container> {
        self.containers.get(r.0)
    }

    pub fn find_app(&self, app_id: &str) -> Option<AppRef> {
        if app_id.is_empty() {
            return None;
        }
        self.apps.iter().position(|a| a.app_id == app_id).map(AppRef)
    }

    pub fn find_attempt(&self, attempt_id: &str) -> Option<AttemptRef> {
        if attempt_id.is_empty() {
            return None;
        }
        self.attempts
            .iter()
            .position(|a| a.attempt_id == attempt_id)
            .map(AttemptRef)
    }

    pub fn find_container(&self, container_id: &str) -> Option<ContainerRef> {
        if container_id.is_empty() {
            return None;
        }
        self.containers
            .iter()
            .position(|c| c.container_id == container_id)
            .map(ContainerRef)
    }

    /// Nodo donde corre el AM de la aplicación, resuelto en el momento.
    pub fn am_host_of(&self, app: &Application) -> Option<&Node> {
        self.directory
            .resolve(&app.am_host_id)
            .and_then(|r| self.node(r))
    }

    /// (aplicaciones, attempts, containers) ocupados.
    pub fn usage(&self) -> (usize, usize, usize) {
        (
            self.apps.iter().filter(|a| !a.is_free()).count(),
            self.attempts.iter().filter(|a| !a.is_free()).count(),
            self.containers.iter().filter(|c| !c.is_free()).count(),
        )
    }

    pub fn capacity(&self) -> (usize, usize, usize) {
        (self.apps.len(), self.attempts.len(), self.containers.len())
    }

    /* ---------------- reclamo de slots ---------------- */

    /// Devuelve el slot que ya tiene ese id o reclama uno libre.
    pub fn claim_app(&mut self, app_id: &str) -> Result<AppRef, StateError> {
        self.check_id("app_id", app_id)?;
        if let Some(r) = self.find_app(app_id) {
            return Ok(r);
        }
        let idx = self
            .apps
            .iter()
            .position(Application::is_free)
            .ok_or(StateError::NoMoreSlots {
                level: "aplicaciones",
                capacity: self.apps.len(),
            })?;

        debug!("app {} reclama el slot {}", app_id, idx);
        self.apps[idx] = Application {
            app_id: app_id.to_string(),
            ..Application::default()
        };
        Ok(AppRef(idx))
    }

    pub fn claim_attempt(&mut self, app: AppRef, attempt_id: &str) -> Result<AttemptRef, StateError> {
        self.check_id("attempt_id", attempt_id)?;

        let owned = self.apps.get(app.0).map(|a| a.attempts.clone()).unwrap_or_default();
        if let Some(r) = owned
            .into_iter()
            .find(|r| self.attempts[r.0].attempt_id == attempt_id)
        {
            return Ok(r);
        }

        let idx = self
            .attempts
            .iter()
            .position(Attempt::is_free)
            .ok_or(StateError::NoMoreSlots {
                level: "attempts",
                capacity: self.attempts.len(),
            })?;

        debug!("attempt {} reclama el slot {}", attempt_id, idx);
        self.attempts[idx] = Attempt {
            attempt_id: attempt_id.to_string(),
            app: Some(app),
            ..Attempt::default()
        };
        if let Some(owner) = self.apps.get_mut(app.0) {
            owner.attempts.push(AttemptRef(idx));
        }
        Ok(AttemptRef(idx))
    }

    pub fn claim_container(
        &mut self,
        attempt: AttemptRef,
        container_id: &str,
    ) -> Result<ContainerRef, StateError> {
        self.check_id("container_id", container_id)?;

        let owned = self
            .attempts
            .get(attempt.0)
            .map(|a| a.containers.clone())
            .unwrap_or_default();
        if let Some(r) = owned
            .into_iter()
            .find(|r| self.containers[r.0].container_id == container_id)
        {
            return Ok(r);
        }

        let idx = self
            .containers
            .iter()
            .position(Container::is_free)
            .ok_or(StateError::NoMoreSlots {
                level: "containers",
                capacity: self.containers.len(),
            })?;

        debug!("container {} reclama el slot {}", container_id, idx);
        self.containers[idx] = Container {
            container_id: container_id.to_string(),
            attempt: Some(attempt),
            ..Container::default()
        };
        if let Some(owner) = self.attempts.get_mut(attempt.0) {
            owner.containers.push(ContainerRef(idx));
        }
        Ok(ContainerRef(idx))
    }

    /// Libera todos los slots de aplicaciones / attempts / containers.
    /// Es el gancho de reconfiguración externa; los nodos quedan.
    pub fn reset(&mut self) {
        self.apps.iter_mut().for_each(|a| *a = Application::default());
        self.attempts.iter_mut().for_each(|a| *a = Attempt::default());
        self.containers.iter_mut().for_each(|c| *c = Container::default());
        for node in &mut self.nodes {
            node.containers.clear();
        }
    }

    /* ---------------- aplicar resultados ---------------- */

    pub fn apply_node(&mut self, r: NodeRef, res: &NodeResult) -> Result<(), StateError> {
        let max = self.max_field_len;
        let node = self
            .nodes
            .get_mut(r.0)
            .ok_or_else(|| StateError::UnknownNode(res.node_id.clone()))?;

        if let Some(state) = res.state {
            node.state = state;
        }
        if let Some(t) = res.last_health_update {
            node.last_health_update = Some(t);
        }
        if let Some(report) = &res.health_report {
            node.health_report = bounded(report, max);
        }
        if let Some(n) = res.running_containers {
            node.reported_containers = n;
        }

        if let Some(v) = res.mem_used {
            node.memory.set_used(v);
        }
        if let Some(v) = res.mem_available {
            node.memory.set_available(v);
        }
        if let Some(v) = res.mem_capacity {
            node.memory.set_capacity(v);
        }
        if let Some(v) = res.cpu_used {
            node.cpu.set_used(v);
        }
        if let Some(v) = res.cpu_available {
            node.cpu.set_available(v);
        }
        if let Some(v) = res.cpu_capacity {
            node.cpu.set_capacity(v);
        }
        Ok(())
    }

    pub fn apply_app(&mut self, r: AppRef, res: &ApplicationResult) -> Result<(), StateError> {
        let max = self.max_field_len;
        if let Some(host) = &res.am_host_id {
            self.check_id("am_host_id", host)?;
        }
        let Some(app) = self.apps.get_mut(r.0) else {
            return Ok(());
        };

        macro_rules! text {
            ($field:ident) => {
                if let Some(v) = &res.$field {
                    app.$field = bounded(v, max);
                }
            };
        }
        macro_rules! copy {
            ($field:ident) => {
                if let Some(v) = res.$field {
                    app.$field = v;
                }
            };
        }

        text!(name);
        text!(app_type);
        text!(user);
        text!(queue);
        text!(tracking_url);
        text!(diagnostics);
        text!(am_host_id);

        copy!(state);
        copy!(final_status);
        copy!(allocated_mb);
        copy!(allocated_vcores);
        copy!(preempted_mb);
        copy!(preempted_vcores);
        copy!(mb_seconds);
        copy!(vcore_seconds);

        if let Some(p) = res.progress {
            app.progress = p.clamp(0.0, 100.0);
        }
        if res.start_time.is_some() {
            app.start_time = res.start_time;
        }
        if res.finish_time.is_some() {
            app.finish_time = res.finish_time;
        }
        Ok(())
    }

    pub fn apply_attempt(&mut self, r: AttemptRef, res: &AttemptResult) -> Result<(), StateError> {
        let max = self.max_field_len;
        if let Some(id) = &res.am_container_id {
            self.check_id("am_container_id", id)?;
        }
        let Some(attempt) = self.attempts.get_mut(r.0) else {
            return Ok(());
        };

        if let Some(state) = res.state {
            attempt.state = state;
        }
        if let Some(id) = &res.am_container_id {
            attempt.am_container_id = id.clone();
        }
        if res.am_host.is_some() {
            attempt.am_host = res.am_host;
        }
        if let Some(url) = &res.tracking_url {
            attempt.tracking_url = bounded(url, max);
        }
        if let Some(d) = &res.diagnostics {
            attempt.diagnostics = bounded(d, max);
        }
        if res.start_time.is_some() {
            attempt.start_time = res.start_time;
        }
        Ok(())
    }

    /// Además de copiar campos, mantiene la lista de containers de cada nodo:
    /// un container terminado deja de estar programado en su host.
    pub fn apply_container(
        &mut self,
        r: ContainerRef,
        res: &ContainerResult,
    ) -> Result<(), StateError> {
        let max = self.max_field_len;
        let Some(container) = self.containers.get_mut(r.0) else {
            return Ok(());
        };
        let previous_host = container.host;

        if let Some(state) = res.state {
            container.state = state;
        }
        if res.start_time.is_some() {
            container.start_time = res.start_time;
        }
        if res.finish_time.is_some() {
            container.finish_time = res.finish_time;
        }
        if res.host.is_some() {
            container.host = res.host;
        }
        if let Some(url) = &res.log_url {
            container.log_url = bounded(url, max);
        }
        if res.exit_code.is_some() {
            container.exit_code = res.exit_code;
        }
        if let Some(d) = &res.diagnostics {
            container.diagnostics = bounded(d, max);
        }
        if let Some(mb) = res.memory_mb {
            container.memory_mb = mb;
        }
        if let Some(v) = res.vcores {
            container.vcores = v;
        }
        if let Some(p) = res.priority {
            container.priority = p;
        }

        let scheduled_on = if container.state.is_finished() {
            None
        } else {
            container.host
        };

        if let Some(old) = previous_host {
            if Some(old) != scheduled_on {
                if let Some(node) = self.nodes.get_mut(old.0) {
                    node.containers.retain(|c| *c != r);
                }
            }
        }
        if let Some(host) = scheduled_on {
            if let Some(node) = self.nodes.get_mut(host.0) {
                if !node.containers.contains(&r) {
                    node.containers.push(r);
                }
            }
        }
        Ok(())
    }

    fn check_id(&self, field: &'static str, value: &str) -> Result<(), StateError> {
        let len = value.chars().count();
        if len > self.max_field_len {
            return Err(StateError::FieldTooLong {
                field,
                len,
                max: self.max_field_len,
            });
        }
        Ok(())
    }
}

/// Recorta texto libre al máximo permitido, respetando caracteres.
fn bounded(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((cut, _)) => value[..cut].to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{AppState, FinalStatus};
    use crate::container::ContainerState;
    use crate::node::NodeState;

    const APP: &str = "application_1515488762656_0001";
    const ATTEMPT: &str = "appattempt_1515488762656_0001_000001";
    const CONTAINER: &str = "container_1515488762656_0001_01_000001";

    fn tree_with_slots(apps: usize, attempts: usize, containers: usize) -> StateTree {
        let mut config = ClusterConfig::default();
        config.nodes = vec!["compute-1".into(), "compute-2".into()];
        config.slots.applications = apps;
        config.slots.attempts = attempts;
        config.slots.containers = containers;
        config.max_field_len = 64;
        let dir = Arc::new(NodeDirectory::new(&config.nodes));
        StateTree::new(&config, dir)
    }

    #[test]
    fn nodos_se_crean_desde_la_config() {
        let tree = tree_with_slots(1, 1, 1);
        let names: Vec<_> = tree.nodes().map(|(_, n)| n.node_id.clone()).collect();
        assert_eq!(names, vec!["compute-1:45454", "compute-2:45454"]);
        assert_eq!(tree.node_by_name("compute-2"), Some(NodeRef(1)));
    }

    #[test]
    fn reclamar_dos_veces_el_mismo_id_usa_el_mismo_slot() {
        let mut tree = tree_with_slots(3, 1, 1);
        let a = tree.claim_app(APP).unwrap();
        let b = tree.claim_app(APP).unwrap();
        assert_eq!(a, b);
        assert_eq!(tree.usage().0, 1);
    }

    #[test]
    fn sin_slots_libres_es_error() {
        let mut tree = tree_with_slots(1, 1, 1);
        tree.claim_app(APP).unwrap();
        let err = tree.claim_app("application_1515488762656_0002").unwrap_err();
        assert_eq!(
            err,
            StateError::NoMoreSlots {
                level: "aplicaciones",
                capacity: 1
            }
        );
    }

    #[test]
    fn jerarquia_app_attempt_container() {
        let mut tree = tree_with_slots(2, 2, 2);
        let app = tree.claim_app(APP).unwrap();
        let att = tree.claim_attempt(app, ATTEMPT).unwrap();
        let c = tree.claim_container(att, CONTAINER).unwrap();

        assert_eq!(tree.app(app).unwrap().attempts, vec![att]);
        assert_eq!(tree.attempt(att).unwrap().app, Some(app));
        assert_eq!(tree.attempt(att).unwrap().containers, vec![c]);
        assert_eq!(tree.container(c).unwrap().attempt, Some(att));

        // reclamar de nuevo no duplica hijos
        tree.claim_attempt(app, ATTEMPT).unwrap();
        tree.claim_container(att, CONTAINER).unwrap();
        assert_eq!(tree.app(app).unwrap().attempts.len(), 1);
        assert_eq!(tree.attempt(att).unwrap().containers.len(), 1);
    }

    #[test]
    fn apply_app_solo_pisa_campos_presentes() {
        let mut tree = tree_with_slots(1, 1, 1);
        let app = tree.claim_app(APP).unwrap();
        tree.apply_app(
            app,
            &ApplicationResult {
                app_id: APP.into(),
                name: Some("random-text-writer".into()),
                state: Some(AppState::RUNNING),
                progress: Some(40.0),
                ..Default::default()
            },
        )
        .unwrap();
        tree.apply_app(
            app,
            &ApplicationResult {
                app_id: APP.into(),
                state: Some(AppState::FINISHED),
                final_status: Some(FinalStatus::Succeeded),
                ..Default::default()
            },
        )
        .unwrap();

        let a = tree.app(app).unwrap();
        assert_eq!(a.name, "random-text-writer");
        assert_eq!(a.state, AppState::FINISHED);
        assert_eq!(a.final_status, FinalStatus::Succeeded);
        assert_eq!(a.progress, 40.0);
    }

    #[test]
    fn id_demasiado_largo_se_rechaza_y_texto_se_recorta() {
        let mut tree = tree_with_slots(1, 1, 1);
        let long_id = format!("application_{}_0001", "1".repeat(80));
        assert!(matches!(
            tree.claim_app(&long_id),
            Err(StateError::FieldTooLong { field: "app_id", .. })
        ));

        let app = tree.claim_app(APP).unwrap();
        tree.apply_app(
            app,
            &ApplicationResult {
                diagnostics: Some("é".repeat(100)),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(tree.app(app).unwrap().diagnostics.chars().count(), 64);
    }

    #[test]
    fn apply_node_cachea_capacidad() {
        let mut tree = tree_with_slots(1, 1, 1);
        tree.apply_node(
            NodeRef(0),
            &NodeResult {
                node_id: "compute-1:45454".into(),
                name: "compute-1".into(),
                state: Some(NodeState::Running),
                mem_used: Some(2048),
                mem_available: Some(6144),
                cpu_used: Some(1),
                cpu_available: Some(7),
                ..Default::default()
            },
        )
        .unwrap();

        let node = tree.node(NodeRef(0)).unwrap();
        assert_eq!(node.state, NodeState::Running);
        assert_eq!(node.memory.capacity(), Some(8192));
        assert_eq!(node.cpu.capacity(), Some(8));
    }

    #[test]
    fn container_se_mueve_entre_nodos_y_sale_al_terminar() {
        let mut tree = tree_with_slots(1, 1, 1);
        let app = tree.claim_app(APP).unwrap();
        let att = tree.claim_attempt(app, ATTEMPT).unwrap();
        let c = tree.claim_container(att, CONTAINER).unwrap();

        let running_on = |host| ContainerResult {
            container_id: CONTAINER.into(),
            state: Some(ContainerState::Running),
            host: Some(host),
            ..Default::default()
        };

        tree.apply_container(c, &running_on(NodeRef(0))).unwrap();
        assert_eq!(tree.node(NodeRef(0)).unwrap().containers, vec![c]);

        tree.apply_container(c, &running_on(NodeRef(1))).unwrap();
        assert!(tree.node(NodeRef(0)).unwrap().containers.is_empty());
        assert_eq!(tree.node(NodeRef(1)).unwrap().containers, vec![c]);

        tree.apply_container(
            c,
            &ContainerResult {
                container_id: CONTAINER.into(),
                state: Some(ContainerState::Complete),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(tree.node(NodeRef(1)).unwrap().containers.is_empty());
    }

    #[test]
    fn am_host_se_resuelve_a_pedido() {
        let mut tree = tree_with_slots(1, 1, 1);
        let app = tree.claim_app(APP).unwrap();
        tree.apply_app(
            app,
            &ApplicationResult {
                am_host_id: Some("compute-2".into()),
                ..Default::default()
            },
        )
        .unwrap();
        let a = tree.app(app).unwrap();
        assert_eq!(tree.am_host_of(a).map(|n| n.name.as_str()), Some("compute-2"));
    }

    #[test]
    fn reset_libera_slots_pero_no_nodos() {
        let mut tree = tree_with_slots(1, 1, 1);
        let app = tree.claim_app(APP).unwrap();
        tree.claim_attempt(app, ATTEMPT).unwrap();
        tree.reset();
        assert_eq!(tree.usage(), (0, 0, 0));
        assert_eq!(tree.nodes().count(), 2);
        assert!(tree.claim_app("application_1515488762656_0002").is_ok());
    }
}

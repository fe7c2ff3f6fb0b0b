//! Vistas serializables del árbol, para la API HTTP y el cliente.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::{Application, FinalStatus};
use crate::attempt::Attempt;
use crate::container::{Container, ContainerState};
use crate::fault::{node_usage, FaultKind};
use crate::node::{Node, NodeRef, NodeState};
use crate::tree::StateTree;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeView {
    pub name: String,
    pub node_id: String,
    pub state: NodeState,
    pub active: bool,
    pub connected: bool,
    pub mem_used: Option<i64>,
    pub mem_capacity: Option<i64>,
    pub cpu_used: Option<i64>,
    pub cpu_capacity: Option<i64>,
    pub usage: Option<f64>,
    pub containers: usize,
    pub fault: Option<FaultKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerView {
    pub container_id: String,
    pub state: ContainerState,
    pub host: Option<String>,
    pub memory_mb: i64,
    pub vcores: i64,
    pub priority: i32,
    pub exit_code: Option<i32>,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptView {
    pub attempt_id: String,
    pub state: String,
    pub am_container_id: String,
    pub am_host: Option<String>,
    pub tracking_url: String,
    pub containers: Vec<ContainerView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppView {
    pub app_id: String,
    pub name: String,
    pub app_type: String,
    pub user: String,
    pub queue: String,
    pub state: String,
    pub final_status: FinalStatus,
    pub progress: f64,
    pub am_host: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    pub mb_seconds: i64,
    pub vcore_seconds: i64,
    pub killable: bool,
    pub attempts: Vec<AttemptView>,
}

fn node_name(tree: &StateTree, r: Option<NodeRef>) -> Option<String> {
    r.and_then(|r| tree.node(r)).map(|n| n.name.clone())
}

pub fn node_view(node: &Node) -> NodeView {
    NodeView {
        name: node.name.clone(),
        node_id: node.node_id.clone(),
        state: node.state,
        active: node.active,
        connected: node.connected,
        mem_used: node.memory.used(),
        mem_capacity: node.memory.capacity(),
        cpu_used: node.cpu.used(),
        cpu_capacity: node.cpu.capacity(),
        usage: node_usage(node),
        containers: node.containers.len(),
        fault: node.fault.map(|f| f.kind),
    }
}

fn container_view(tree: &StateTree, c: &Container) -> ContainerView {
    ContainerView {
        container_id: c.container_id.clone(),
        state: c.state,
        host: node_name(tree, c.host),
        memory_mb: c.memory_mb,
        vcores: c.vcores,
        priority: c.priority,
        exit_code: c.exit_code,
        start_time: c.start_time,
        finish_time: c.finish_time,
    }
}

fn attempt_view(tree: &StateTree, a: &Attempt) -> AttemptView {
    AttemptView {
        attempt_id: a.attempt_id.clone(),
        state: a.state.to_string(),
        am_container_id: a.am_container_id.clone(),
        am_host: node_name(tree, a.am_host),
        tracking_url: a.tracking_url.clone(),
        containers: a
            .containers
            .iter()
            .filter_map(|r| tree.container(*r))
            .map(|c| container_view(tree, c))
            .collect(),
    }
}

pub fn app_view(tree: &StateTree, app: &Application) -> AppView {
    AppView {
        app_id: app.app_id.clone(),
        name: app.name.clone(),
        app_type: app.app_type.clone(),
        user: app.user.clone(),
        queue: app.queue.clone(),
        state: app.state.to_string(),
        final_status: app.final_status,
        progress: app.progress,
        am_host: tree.am_host_of(app).map(|n| n.name.clone()),
        start_time: app.start_time,
        finish_time: app.finish_time,
        mb_seconds: app.mb_seconds,
        vcore_seconds: app.vcore_seconds,
        killable: app.is_killable(),
        attempts: app
            .attempts
            .iter()
            .filter_map(|r| tree.attempt(*r))
            .map(|a| attempt_view(tree, a))
            .collect(),
    }
}

pub fn nodes(tree: &StateTree) -> Vec<NodeView> {
    tree.nodes().map(|(_, n)| node_view(n)).collect()
}

pub fn apps(tree: &StateTree) -> Vec<AppView> {
    tree.apps().map(|(_, a)| app_view(tree, a)).collect()
}

pub fn app(tree: &StateTree, app_id: &str) -> Option<AppView> {
    tree.find_app(app_id)
        .and_then(|r| tree.app(r))
        .map(|a| app_view(tree, a))
}

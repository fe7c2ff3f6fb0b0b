use std::sync::atomic::{AtomicBool, Ordering};

use crate::node::NodeRef;

/// Lista fija de nodos del cluster, compartida entre el árbol y los parsers.
///
/// Sirve para resolver cualquier host / URL a un [`NodeRef`] y para saber qué
/// node managers se pueden consultar directamente.
#[derive(Debug)]
pub struct NodeDirectory {
    entries: Vec<Entry>,
}

#[derive(Debug)]
struct Entry {
    name: String,
    reachable: AtomicBool,
}

impl NodeDirectory {
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            entries: names
                .iter()
                .map(|n| Entry {
                    name: n.as_ref().to_string(),
                    reachable: AtomicBool::new(true),
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn refs(&self) -> impl Iterator<Item = NodeRef> + '_ {
        (0..self.entries.len()).map(NodeRef)
    }

    pub fn name(&self, node: NodeRef) -> Option<&str> {
        self.entries.get(node.0).map(|e| e.name.as_str())
    }

    /// Resuelve `http://compute-1:8042/...`, `compute-1:45454` o `compute-1`.
    /// Un host desconocido da `None`; nunca se inventa un nodo.
    pub fn resolve(&self, host_or_url: &str) -> Option<NodeRef> {
        let host = strip_host(host_or_url);
        if host.is_empty() {
            return None;
        }
        let exact = self.entries.iter().position(|e| e.name == host);
        exact
            .or_else(|| {
                // FQDN: compute-1.cluster.local
                let short = host.split('.').next().unwrap_or(host);
                self.entries.iter().position(|e| e.name == short)
            })
            .map(NodeRef)
    }

    pub fn set_reachable(&self, node: NodeRef, reachable: bool) {
        if let Some(e) = self.entries.get(node.0) {
            e.reachable.store(reachable, Ordering::Release);
        }
    }

    pub fn is_reachable(&self, node: NodeRef) -> bool {
        self.entries
            .get(node.0)
            .map(|e| e.reachable.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    pub fn reachable_names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.reachable.load(Ordering::Acquire))
            .map(|e| e.name.as_str())
            .collect()
    }
}

/// Saca esquema, puerto y ruta: `http://compute-1:8042/node` -> `compute-1`.
pub fn strip_host(raw: &str) -> &str {
    let s = raw.trim();
    let s = s
        .strip_prefix("http://")
        .or_else(|| s.strip_prefix("https://"))
        .unwrap_or(s);
    let end = s.find([':', '/']).unwrap_or(s.len());
    let host = &s[..end];
    if host.eq_ignore_ascii_case("N/A") || host.eq_ignore_ascii_case("null") {
        ""
    } else {
        host
    }
}

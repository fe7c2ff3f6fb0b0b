//! Motor de decisión de fallos.
//!
//! Cada ciclo, por nodo:
//! - sin fallo activo: se prueba activar cada tipo de fallo en orden de prioridad,
//!   con más chance cuanto más cargado esté el nodo;
//! - con fallo activo: se prueba repararlo usando la carga que tenía el nodo
//!   cuando se activó (no la actual).
//!
//! Como máximo se aplica un efecto por nodo y por ciclo.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::FaultConfig;
use crate::node::Node;

pub const MIN_USAGE: f64 = 0.1;
pub const MAX_USAGE: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultKind {
    /// Se apaga el node manager
    NodeDead,
    /// Se corta la red del nodo
    NodeConnectionError,
}

impl FaultKind {
    /// Orden de evaluación, el primero gana.
    pub const BY_PRIORITY: [FaultKind; 2] = [FaultKind::NodeDead, FaultKind::NodeConnectionError];
}

/// Fallo activo en un nodo, con la carga capturada al activarse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveFault {
    pub kind: FaultKind,
    pub activation_usage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FaultDecision {
    Keep,
    Inject { kind: FaultKind, usage: f64 },
    Repair { kind: FaultKind },
}

/// Promedio de las fracciones de memoria y cpu, acotado a [0.1, 0.9].
/// `None` mientras alguno de los recursos no tenga capacidad conocida.
pub fn node_usage(node: &Node) -> Option<f64> {
    let mem = node.memory.fraction()?;
    let cpu = node.cpu.fraction()?;
    Some(clamp_usage((mem + cpu) / 2.0))
}

pub fn clamp_usage(usage: f64) -> f64 {
    usage.clamp(MIN_USAGE, MAX_USAGE)
}

pub fn activation_threshold(usage: f64, activation_probability: f64) -> f64 {
    1.0 - usage * activation_probability * 2.0
}

pub fn repair_threshold(activation_usage: f64, repair_probability: f64) -> f64 {
    1.0 - activation_usage * repair_probability * 2.0
}

pub struct FaultDecider {
    rng: ChaCha8Rng,
    activation_probability: f64,
    repair_probability: f64,
}

impl FaultDecider {
    pub fn new(config: &FaultConfig) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            activation_probability: config.activation_probability,
            repair_probability: config.repair_probability,
        }
    }

    /// Valor uniforme en [0, 1).
    fn draw(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    pub fn should_activate(&mut self, usage: f64) -> bool {
        let threshold = activation_threshold(clamp_usage(usage), self.activation_probability);
        self.draw() > threshold
    }

    pub fn should_repair(&mut self, fault: &ActiveFault) -> bool {
        let threshold = repair_threshold(fault.activation_usage, self.repair_probability);
        self.draw() < threshold
    }

    pub fn decide(&mut self, node: &Node) -> FaultDecision {
        if let Some(fault) = node.fault {
            return if self.should_repair(&fault) {
                FaultDecision::Repair { kind: fault.kind }
            } else {
                FaultDecision::Keep
            };
        }

        let Some(usage) = node_usage(node) else {
            return FaultDecision::Keep;
        };

        for kind in FaultKind::BY_PRIORITY {
            if self.should_activate(usage) {
                return FaultDecision::Inject { kind, usage };
            }
        }
        FaultDecision::Keep
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(p_act: f64, p_rep: f64) -> FaultConfig {
        FaultConfig {
            enabled: true,
            activation_probability: p_act,
            repair_probability: p_rep,
            seed: 42,
        }
    }

    fn loaded_node(mem_used: i64, cpu_used: i64) -> Node {
        let mut node = Node::new("compute-1", "compute-1:45454".to_string());
        node.memory.set_used(mem_used);
        node.memory.set_available(100 - mem_used);
        node.cpu.set_used(cpu_used);
        node.cpu.set_available(100 - cpu_used);
        node
    }

    #[test]
    fn usage_se_acota() {
        assert_eq!(node_usage(&loaded_node(0, 0)), Some(MIN_USAGE));
        assert_eq!(node_usage(&loaded_node(100, 100)), Some(MAX_USAGE));
        let mid = node_usage(&loaded_node(40, 60)).unwrap();
        assert!((mid - 0.5).abs() < 1e-9);
    }

    #[test]
    fn usage_desconocido_no_activa() {
        let mut decider = FaultDecider::new(&config(1.0, 1.0));
        let node = Node::new("compute-1", "compute-1:45454".to_string());
        assert_eq!(decider.decide(&node), FaultDecision::Keep);
    }

    #[test]
    fn umbrales() {
        assert!((activation_threshold(0.5, 0.25) - 0.75).abs() < 1e-9);
        assert!((repair_threshold(0.9, 0.5) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn activacion_monotona_con_la_carga() {
        let draws = 20_000;
        let mut previous = 0usize;

        for step in 1..=9 {
            let usage = step as f64 / 10.0;
            let mut decider = FaultDecider::new(&config(0.25, 0.5));
            let hits = (0..draws).filter(|_| decider.should_activate(usage)).count();
            assert!(
                hits >= previous,
                "usage {usage}: {hits} activaciones < {previous}"
            );
            previous = hits;
        }
        assert!(previous > 0);
    }

    #[test]
    fn reparacion_usa_la_carga_de_activacion() {
        // carga máxima + prob 1 => umbral de reparación negativo, nunca repara
        let mut decider = FaultDecider::new(&config(0.5, 1.0));
        let mut node = loaded_node(10, 10);
        node.fault = Some(ActiveFault {
            kind: FaultKind::NodeDead,
            activation_usage: MAX_USAGE,
        });
        for _ in 0..100 {
            assert_eq!(decider.decide(&node), FaultDecision::Keep);
        }

        // con carga baja al activarse, repara casi siempre
        node.fault = Some(ActiveFault {
            kind: FaultKind::NodeConnectionError,
            activation_usage: MIN_USAGE,
        });
        let repairs = (0..1000)
            .filter(|_| {
                decider.decide(&node)
                    == FaultDecision::Repair {
                        kind: FaultKind::NodeConnectionError,
                    }
            })
            .count();
        assert!(repairs > 700);
    }

    #[test]
    fn prioridad_node_dead_primero() {
        // prob 1 con carga máxima => umbral 1 - 0.9*2 < 0, siempre activa el primero
        let mut decider = FaultDecider::new(&config(1.0, 0.5));
        let node = loaded_node(100, 100);
        match decider.decide(&node) {
            FaultDecision::Inject { kind, usage } => {
                assert_eq!(kind, FaultKind::NodeDead);
                assert_eq!(usage, MAX_USAGE);
            }
            other => panic!("se esperaba Inject, hubo {other:?}"),
        }
    }

    #[test]
    fn misma_semilla_mismas_decisiones() {
        let node = loaded_node(50, 50);
        let mut a = FaultDecider::new(&config(0.3, 0.5));
        let mut b = FaultDecider::new(&config(0.3, 0.5));
        let da: Vec<_> = (0..50).map(|_| a.decide(&node)).collect();
        let db: Vec<_> = (0..50).map(|_| b.decide(&node)).collect();
        assert_eq!(da, db);
    }
}

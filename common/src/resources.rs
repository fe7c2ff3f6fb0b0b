use serde::{Deserialize, Serialize};

/// Contador usado / disponible / capacidad de un recurso (MB o vcores).
///
/// La capacidad es siempre `usado + disponible`: se calcula la primera vez que
/// se conocen ambos operandos y queda cacheada. Una escritura directa de la
/// capacidad sólo se acepta mientras falte alguno de los dos operandos.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCounter {
    used: Option<i64>,
    available: Option<i64>,
    capacity: Option<i64>,
    /// la capacidad ya salió de una suma completa
    locked: bool,
}

impl ResourceCounter {
    pub fn used(&self) -> Option<i64> {
        self.used
    }

    pub fn available(&self) -> Option<i64> {
        self.available
    }

    pub fn capacity(&self) -> Option<i64> {
        self.capacity
    }

    pub fn set_used(&mut self, value: i64) {
        self.used = Some(value);
        self.cache_capacity();
    }

    pub fn set_available(&mut self, value: i64) {
        self.available = Some(value);
        self.cache_capacity();
    }

    /// Se ignora si la capacidad ya se derivó de usado + disponible.
    pub fn set_capacity(&mut self, value: i64) {
        if self.locked {
            return;
        }
        self.capacity = Some(value);
    }

    /// Fracción usada, `None` mientras no haya capacidad conocida.
    pub fn fraction(&self) -> Option<f64> {
        match (self.used, self.capacity) {
            (Some(used), Some(cap)) if cap > 0 => Some(used as f64 / cap as f64),
            (Some(_), Some(_)) => Some(0.0),
            _ => None,
        }
    }

    fn cache_capacity(&mut self) {
        if self.locked {
            return;
        }
        if let (Some(used), Some(available)) = (self.used, self.available) {
            self.capacity = Some(used + available);
            self.locked = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacidad_se_calcula_con_usado_y_disponible() {
        let mut mem = ResourceCounter::default();
        mem.set_used(2048);
        assert_eq!(mem.capacity(), None);
        mem.set_available(6144);
        assert_eq!(mem.capacity(), Some(8192));
        assert_eq!(mem.fraction(), Some(0.25));
    }

    #[test]
    fn capacidad_queda_cacheada() {
        let mut mem = ResourceCounter::default();
        mem.set_used(1000);
        mem.set_available(1000);
        mem.set_used(1500);
        mem.set_available(500);
        mem.set_used(1800);
        assert_eq!(mem.capacity(), Some(2000));
    }

    #[test]
    fn escritura_de_capacidad_ignorada_con_operandos_conocidos() {
        let mut cpu = ResourceCounter::default();
        cpu.set_used(2);
        cpu.set_available(6);
        cpu.set_capacity(100);
        assert_eq!(cpu.capacity(), Some(8));
    }

    #[test]
    fn capacidad_explicita_mientras_falta_un_operando() {
        let mut cpu = ResourceCounter::default();
        cpu.set_capacity(8);
        assert_eq!(cpu.capacity(), Some(8));
        cpu.set_used(4);
        assert_eq!(cpu.fraction(), Some(0.5));
    }
}

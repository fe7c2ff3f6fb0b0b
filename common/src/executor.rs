use crate::error::TransportError;

/// Capacidad externa: ejecutar un comando remoto y devolver su salida cruda.
///
/// Según el modo el "comando" es una línea de shell (ssh) o una URL (HTTP GET).
/// Las llamadas bloquean; no hay reintentos acá.
pub trait RemoteExecutor: Send + Sync {
    fn run(&self, command: &str) -> Result<String, TransportError>;
}

impl<F> RemoteExecutor for F
where
    F: Fn(&str) -> Result<String, TransportError> + Send + Sync,
{
    fn run(&self, command: &str) -> Result<String, TransportError> {
        self(command)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedExecutor;
    use super::*;

    #[test]
    fn closures_sirven_como_executor() {
        let exec = |cmd: &str| Ok::<_, TransportError>(format!("eco {cmd}"));
        assert_eq!(exec.run("hola").unwrap(), "eco hola");
    }

    #[test]
    fn scripted_usa_el_prefijo_mas_largo() {
        let exec = ScriptedExecutor::new()
            .on("GET /apps/1", "app")
            .on("GET /apps/1/appattempts", "attempts")
            .fail_on("GET /boom");

        assert_eq!(exec.run("GET /apps/1").unwrap(), "app");
        assert_eq!(exec.run("GET /apps/1/appattempts").unwrap(), "attempts");
        assert_eq!(exec.run("GET /nada").unwrap(), "");
        assert!(exec.run("GET /boom").is_err());
        assert_eq!(exec.calls().len(), 4);
        assert_eq!(exec.count("GET /apps/1"), 1);
    }
}

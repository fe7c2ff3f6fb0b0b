//! Ejecutores remotos reales: ssh para comandos de shell y HTTP GET para la REST.

use std::process::{Command, Stdio};
use std::sync::OnceLock;
use std::time::Duration;

use common::config::SshConfig;
use common::{RemoteExecutor, TransportError};
use tracing::debug;

/// ssh devuelve 255 cuando la falla es de la conexión y no del comando remoto.
const SSH_CONNECTION_FAILURE: i32 = 255;

pub struct SshExecutor {
    config: SshConfig,
}

impl SshExecutor {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    fn args(&self, command: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-p".to_string(),
            self.config.port.to_string(),
        ];
        if let Some(identity) = &self.config.identity_file {
            args.push("-i".to_string());
            args.push(identity.clone());
        }
        args.push(format!("{}@{}", self.config.user, self.config.host));
        args.push(command.to_string());
        args
    }
}

impl RemoteExecutor for SshExecutor {
    fn run(&self, command: &str) -> Result<String, TransportError> {
        debug!("ssh {}@{}: {}", self.config.user, self.config.host, command);
        let output = Command::new("ssh")
            .args(self.args(command))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| TransportError::Failed {
                command: command.to_string(),
                message: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        match output.status.code() {
            Some(SSH_CONNECTION_FAILURE) | None => Err(TransportError::ExitStatus {
                command: command.to_string(),
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            }),
            // el comando remoto corrió: su salida (aunque falle) decide el resultado
            Some(_) => Ok(stdout + &stderr),
        }
    }
}

/// GET de una URL; el "comando" es la URL completa.
pub struct HttpExecutor {
    timeout: Duration,
    client: OnceLock<reqwest::blocking::Client>,
}

impl HttpExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            client: OnceLock::new(),
        }
    }

    // el cliente bloqueante no puede crearse dentro del runtime async
    fn client(&self, url: &str) -> Result<&reqwest::blocking::Client, TransportError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| TransportError::Failed {
                command: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(self.client.get_or_init(|| client))
    }
}

impl RemoteExecutor for HttpExecutor {
    fn run(&self, url: &str) -> Result<String, TransportError> {
        debug!("GET {}", url);
        let failed = |e: reqwest::Error| TransportError::Failed {
            command: url.to_string(),
            message: e.to_string(),
        };

        let resp = self.client(url)?.get(url).send().map_err(failed)?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            // entidad desconocida: cuerpo vacío, el parser lo trata como "sin datos"
            return Ok(String::new());
        }
        if !status.is_success() {
            return Err(TransportError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        resp.text().map_err(failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argumentos_de_ssh() {
        let exec = SshExecutor::new(SshConfig {
            user: "hadoop".into(),
            host: "controller".into(),
            port: 2222,
            identity_file: Some("/keys/id_rsa".into()),
        });
        let args = exec.args("yarn node -list -all");
        assert_eq!(
            args,
            vec![
                "-o",
                "BatchMode=yes",
                "-p",
                "2222",
                "-i",
                "/keys/id_rsa",
                "hadoop@controller",
                "yarn node -list -all",
            ]
        );
    }

    #[test]
    fn ssh_sin_identidad() {
        let exec = SshExecutor::new(SshConfig::default());
        let args = exec.args("uptime");
        assert!(!args.contains(&"-i".to_string()));
        assert_eq!(args[args.len() - 2], "root@localhost");
    }
}

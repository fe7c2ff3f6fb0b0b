use std::{fmt, str::FromStr};

use thiserror::Error;

/// Nivel jerárquico de un id de YARN.
///
/// ```text
/// application_1516703400520_0003
/// appattempt_1516703400520_0003_000001
/// container_1516703400520_0003_01_000001
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdLevel {
    Application,
    Attempt,
    Container,
}

impl IdLevel {
    pub fn prefix(self) -> &'static str {
        match self {
            IdLevel::Application => "application",
            IdLevel::Attempt => "appattempt",
            IdLevel::Container => "container",
        }
    }

    /// Cantidad de componentes numéricos que lleva un id de este nivel.
    fn components(self) -> usize {
        match self {
            IdLevel::Application => 2,
            IdLevel::Attempt => 3,
            IdLevel::Container => 4,
        }
    }

    /// Detecta el nivel a partir del prefijo del id.
    pub fn of(id: &str) -> Result<Self, IdError> {
        let prefix = id.split(['_', '-']).next().unwrap_or_default();
        match prefix {
            "application" => Ok(IdLevel::Application),
            "appattempt" => Ok(IdLevel::Attempt),
            "container" => Ok(IdLevel::Container),
            _ => Err(IdError::UnsupportedFormat(id.to_string())),
        }
    }
}

impl fmt::Display for IdLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

impl FromStr for IdLevel {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "app" | "application" => Ok(IdLevel::Application),
            "attempt" | "appattempt" => Ok(IdLevel::Attempt),
            "container" => Ok(IdLevel::Container),
            _ => Err(IdError::UnsupportedFormat(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("formato de id no soportado: '{0}'")]
    UnsupportedFormat(String),

    #[error("id malformado '{id}': se esperaban {expected} componentes numéricos y hay {found}")]
    Malformed {
        id: String,
        expected: usize,
        found: usize,
    },

    #[error("id corto inválido: '{0}'")]
    InvalidShortId(String),
}

/// Componentes de un id ya validado.
struct Parts<'a> {
    cluster_ts: &'a str,
    sequence: &'a str,
    attempt: Option<u64>,
    container: Option<u64>,
}

fn split(id: &str) -> Result<(IdLevel, Parts<'_>), IdError> {
    let level = IdLevel::of(id)?;
    let numeric = numeric_part(id);

    let comps: Vec<&str> = if numeric.is_empty() {
        Vec::new()
    } else {
        numeric.split(['_', '-']).collect()
    };

    let malformed = || IdError::Malformed {
        id: id.to_string(),
        expected: level.components(),
        found: comps.len(),
    };

    if comps.len() != level.components() {
        return Err(malformed());
    }
    if comps
        .iter()
        .any(|c| c.is_empty() || !c.bytes().all(|b| b.is_ascii_digit()))
    {
        return Err(malformed());
    }

    let parse = |s: &str| s.parse::<u64>().map_err(|_| malformed());

    let parts = Parts {
        cluster_ts: comps[0],
        sequence: comps[1],
        attempt: if level == IdLevel::Application {
            None
        } else {
            Some(parse(comps[2])?)
        },
        container: if level == IdLevel::Container {
            Some(parse(comps[3])?)
        } else {
            None
        },
    };

    Ok((level, parts))
}

/// Devuelve todo lo que sigue al primer separador (`_` o `-`).
///
/// `application_1516703400520_0003` -> `1516703400520_0003`
pub fn numeric_part(id: &str) -> &str {
    match id.find(['_', '-']) {
        Some(pos) => &id[pos + 1..],
        None => "",
    }
}

/// Convierte un id a otro nivel de la jerarquía.
///
/// Si el nivel destino necesita información que el id no trae
/// (p. ej. application -> container) se usa el sub-id más bajo (`01`, `000001`).
pub fn convert(id: &str, target: IdLevel) -> Result<String, IdError> {
    assemble(id, None, target)
}

/// Igual que [`convert`] pero completando con un id corto.
///
/// El id corto es el número de attempt cuando el origen no lo trae (o cuando el
/// destino es un attempt); en otro caso es el número de container.
pub fn convert_with(id: &str, short_id: &str, target: IdLevel) -> Result<String, IdError> {
    let short = short_id
        .trim()
        .parse::<u64>()
        .map_err(|_| IdError::InvalidShortId(short_id.to_string()))?;
    assemble(id, Some(short), target)
}

fn assemble(id: &str, short: Option<u64>, target: IdLevel) -> Result<String, IdError> {
    let (source, mut parts) = split(id)?;

    if let Some(short) = short {
        match target {
            IdLevel::Application => {}
            IdLevel::Attempt => parts.attempt = Some(short),
            IdLevel::Container if source == IdLevel::Application => parts.attempt = Some(short),
            IdLevel::Container => parts.container = Some(short),
        }
    }

    let ts = parts.cluster_ts;
    let seq = parts.sequence;
    let attempt = parts.attempt.unwrap_or(1);
    let container = parts.container.unwrap_or(1);

    Ok(match target {
        IdLevel::Application => format!("application_{ts}_{seq}"),
        IdLevel::Attempt => format!("appattempt_{ts}_{seq}_{attempt:06}"),
        IdLevel::Container => format!("container_{ts}_{seq}_{attempt:02}_{container:06}"),
    })
}

/// Número de attempt de un id de attempt o de container.
pub fn attempt_number(id: &str) -> Result<u64, IdError> {
    let (level, parts) = split(id)?;
    parts
        .attempt
        .ok_or_else(|| IdError::Malformed {
            id: id.to_string(),
            expected: IdLevel::Attempt.components(),
            found: level.components(),
        })
}

/// Último componente numérico del id (secuencia, attempt o container).
pub fn short_id(id: &str) -> Result<u64, IdError> {
    let (level, parts) = split(id)?;
    let value = match level {
        IdLevel::Application => parts.sequence.parse::<u64>().ok(),
        IdLevel::Attempt => parts.attempt,
        IdLevel::Container => parts.container,
    };
    value.ok_or_else(|| IdError::Malformed {
        id: id.to_string(),
        expected: level.components(),
        found: 0,
    })
}

/// Chequeo rápido sin conversión.
pub fn is_valid(id: &str) -> bool {
    split(id).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP: &str = "application_1516703400520_0003";

    #[test]
    fn numeric_part_saca_el_prefijo() {
        assert_eq!(numeric_part(APP), "1516703400520_0003");
        assert_eq!(
            numeric_part("container_1517215519416_0006_02_000017"),
            "1517215519416_0006_02_000017"
        );
        assert_eq!(numeric_part("sinseparador"), "");
    }

    #[test]
    fn container_a_attempt_usa_el_epoch() {
        let out = convert("container_1517215519416_0006_02_000017", IdLevel::Attempt).unwrap();
        assert_eq!(out, "appattempt_1517215519416_0006_000002");
    }

    #[test]
    fn application_a_container_usa_sub_ids_por_defecto() {
        let out = convert(APP, IdLevel::Container).unwrap();
        assert_eq!(out, "container_1516703400520_0003_01_000001");
    }

    #[test]
    fn roundtrip_application_attempt_application() {
        let attempt = convert(APP, IdLevel::Attempt).unwrap();
        assert_eq!(attempt, "appattempt_1516703400520_0003_000001");
        assert_eq!(convert(&attempt, IdLevel::Application).unwrap(), APP);
    }

    #[test]
    fn roundtrip_attempt_container_attempt_con_id_corto() {
        let attempt = "appattempt_1516703400520_0003_000002";
        let container = convert_with(attempt, "17", IdLevel::Container).unwrap();
        assert_eq!(container, "container_1516703400520_0003_02_000017");
        assert_eq!(convert(&container, IdLevel::Attempt).unwrap(), attempt);
    }

    #[test]
    fn convert_with_desde_application_rellena_attempt() {
        assert_eq!(
            convert_with(APP, "3", IdLevel::Attempt).unwrap(),
            "appattempt_1516703400520_0003_000003"
        );
        assert_eq!(
            convert_with(APP, "2", IdLevel::Container).unwrap(),
            "container_1516703400520_0003_02_000001"
        );
    }

    #[test]
    fn prefijo_desconocido_es_error() {
        let err = convert("job_1516703400520_0003", IdLevel::Attempt).unwrap_err();
        assert!(matches!(err, IdError::UnsupportedFormat(_)));
    }

    #[test]
    fn cantidad_de_componentes_incorrecta_es_malformado() {
        let err = convert("appattempt_1516703400520_0003", IdLevel::Application).unwrap_err();
        assert_eq!(
            err,
            IdError::Malformed {
                id: "appattempt_1516703400520_0003".to_string(),
                expected: 3,
                found: 2,
            }
        );
        assert!(matches!(
            convert("application_15167_abc", IdLevel::Attempt),
            Err(IdError::Malformed { .. })
        ));
    }

    #[test]
    fn id_corto_no_numerico_es_error() {
        assert!(matches!(
            convert_with(APP, "x1", IdLevel::Attempt),
            Err(IdError::InvalidShortId(_))
        ));
    }

    #[test]
    fn helpers_de_numeros() {
        assert_eq!(attempt_number("appattempt_1516703400520_0003_000004").unwrap(), 4);
        assert_eq!(attempt_number("container_1516703400520_0003_02_000009").unwrap(), 2);
        assert!(attempt_number(APP).is_err());
        assert_eq!(short_id("container_1516703400520_0003_02_000009").unwrap(), 9);
        assert_eq!(short_id(APP).unwrap(), 3);
        assert!(is_valid(APP));
        assert!(!is_valid("application_1"));
    }

    #[test]
    fn nivel_desde_texto() {
        assert_eq!("app".parse::<IdLevel>().unwrap(), IdLevel::Application);
        assert_eq!("appattempt".parse::<IdLevel>().unwrap(), IdLevel::Attempt);
        assert!("nodo".parse::<IdLevel>().is_err());
    }
}

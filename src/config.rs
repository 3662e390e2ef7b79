use std::str::FromStr;

pub const MODE_VAR: &str = "ARENA_JUDGE_MODE";
pub const TIME_LIMIT_VAR: &str = "ARENA_TIME_LIMIT_MS";
pub const MEMORY_PLACEHOLDER_VAR: &str = "ARENA_MEMORY_PLACEHOLDER_KB";
pub const NODE_PATH_VAR: &str = "ARENA_NODE_PATH";
pub const PYTHON_PATH_VAR: &str = "ARENA_PYTHON_PATH";
pub const JUDGE0_URL_VAR: &str = "ARENA_JUDGE0_URL";
pub const CALLBACK_URL_VAR: &str = "ARENA_CALLBACK_URL";
pub const HISTORY_LIMIT_VAR: &str = "ARENA_HISTORY_LIMIT";
pub const DISPATCH_TIMEOUT_VAR: &str = "ARENA_DISPATCH_TIMEOUT_MS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
    #[error("{0} must be set in remote mode")]
    Missing(&'static str),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JudgeMode {
    Local,
    Remote {
        judge0_url: String,
        callback_url: String,
    },
}

/// Engine configuration loaded from `ARENA_*` environment variables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JudgeConfig {
    pub mode: JudgeMode,
    pub default_time_limit_ms: u64,
    pub memory_placeholder_kb: u64,
    pub node_path: String,
    pub python_path: String,
    pub history_limit: usize,
    /// Upper bound for one request to the remote judge.
    pub dispatch_timeout_ms: u64,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            mode: JudgeMode::Local,
            default_time_limit_ms: 5000,
            memory_placeholder_kb: 1024,
            node_path: "node".to_string(),
            python_path: "python3".to_string(),
            history_limit: 50,
            dispatch_timeout_ms: 10_000,
        }
    }
}

impl JudgeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let mode = match lookup(MODE_VAR).as_deref().map(str::trim) {
            None | Some("") | Some("local") => JudgeMode::Local,
            Some("remote") => JudgeMode::Remote {
                judge0_url: lookup(JUDGE0_URL_VAR).ok_or(ConfigError::Missing(JUDGE0_URL_VAR))?,
                callback_url: lookup(CALLBACK_URL_VAR)
                    .ok_or(ConfigError::Missing(CALLBACK_URL_VAR))?,
            },
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    var: MODE_VAR,
                    value: other.to_string(),
                });
            }
        };

        Ok(Self {
            mode,
            default_time_limit_ms: parse_or(&lookup, TIME_LIMIT_VAR, defaults.default_time_limit_ms)?,
            memory_placeholder_kb: parse_or(
                &lookup,
                MEMORY_PLACEHOLDER_VAR,
                defaults.memory_placeholder_kb,
            )?,
            node_path: lookup(NODE_PATH_VAR).unwrap_or(defaults.node_path),
            python_path: lookup(PYTHON_PATH_VAR).unwrap_or(defaults.python_path),
            history_limit: parse_or(&lookup, HISTORY_LIMIT_VAR, defaults.history_limit)?,
            dispatch_timeout_ms: parse_or(
                &lookup,
                DISPATCH_TIMEOUT_VAR,
                defaults.dispatch_timeout_ms,
            )?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<JudgeConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        JudgeConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(config_from(&[]).unwrap(), JudgeConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            (TIME_LIMIT_VAR, "2000"),
            (MEMORY_PLACEHOLDER_VAR, "0"),
            (PYTHON_PATH_VAR, "/usr/bin/python3.12"),
            (HISTORY_LIMIT_VAR, "10"),
            (DISPATCH_TIMEOUT_VAR, "1500"),
        ])
        .unwrap();

        assert_eq!(config.default_time_limit_ms, 2000);
        assert_eq!(config.memory_placeholder_kb, 0);
        assert_eq!(config.python_path, "/usr/bin/python3.12");
        assert_eq!(config.history_limit, 10);
        assert_eq!(config.dispatch_timeout_ms, 1500);
        assert_eq!(config.mode, JudgeMode::Local);
    }

    #[test]
    fn test_remote_mode_requires_urls() {
        assert!(matches!(
            config_from(&[(MODE_VAR, "remote")]),
            Err(ConfigError::Missing(JUDGE0_URL_VAR))
        ));

        let config = config_from(&[
            (MODE_VAR, "remote"),
            (JUDGE0_URL_VAR, "http://judge0:2358"),
            (CALLBACK_URL_VAR, "http://arena:4000/webhook"),
        ])
        .unwrap();
        assert_eq!(
            config.mode,
            JudgeMode::Remote {
                judge0_url: "http://judge0:2358".to_string(),
                callback_url: "http://arena:4000/webhook".to_string(),
            }
        );
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config_from(&[(TIME_LIMIT_VAR, "soon")]),
            Err(ConfigError::InvalidValue { var: TIME_LIMIT_VAR, .. })
        ));
        assert!(matches!(
            config_from(&[(MODE_VAR, "cluster")]),
            Err(ConfigError::InvalidValue { var: MODE_VAR, .. })
        ));
    }
}

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::{Credentials, Endpoints};
use crate::error::{Error, Result};

/// Section holding CLI settings rather than an environment.
const SETTINGS_SECTION: &str = "zacc";
const DEFAULT_CONFIG_FILE: &str = ".zacc.ini";

/// One named environment resolved from the configuration file.
#[derive(Debug, Clone)]
pub struct Environment {
    pub name: String,
    pub credentials: Credentials,
    pub production: bool,
    pub partner: Option<String>,
    pub project: Option<String>,
    pub project_prefix: Option<String>,
    /// `Some(0)` in the file means unbounded polling.
    pub max_retries: Option<u32>,
    pub poll_interval: Option<Duration>,
    pub api_url: Option<String>,
    pub file_url: Option<String>,
}

impl Environment {
    /// Hosts for this environment, honouring explicit URL overrides.
    pub fn endpoints(&self) -> Endpoints {
        let mut endpoints = Endpoints::for_production(self.production);
        if let Some(api) = &self.api_url {
            endpoints.api = api.trim_end_matches('/').to_string();
        }
        if let Some(file) = &self.file_url {
            endpoints.file = file.trim_end_matches('/').to_string();
        }
        endpoints
    }
}

/// `$HOME/.zacc.ini`, or `.zacc.ini` in the working directory when no home is known.
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Reads `path` and resolves `environment`, or the configured default.
pub fn load_environment(path: &Path, environment: Option<&str>) -> Result<Environment> {
    // Unreadable files (missing, directories, no permission) count as absent.
    let text = std::fs::read_to_string(path).map_err(|e| {
        tracing::debug!(path = %path.display(), error = %e, "config file not readable");
        Error::ConfigNotFound {
            path: path.to_path_buf(),
        }
    })?;

    let ini = parse_ini(&text);
    if ini.is_empty() {
        return Err(Error::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    resolve_environment(&ini, environment)
}

type Sections = BTreeMap<String, BTreeMap<String, String>>;

fn resolve_environment(ini: &Sections, environment: Option<&str>) -> Result<Environment> {
    let available: Vec<String> = ini
        .keys()
        .filter(|name| name.as_str() != SETTINGS_SECTION)
        .cloned()
        .collect();

    let name = match environment {
        Some(name) => name.to_string(),
        None => ini
            .get(SETTINGS_SECTION)
            .and_then(|settings| settings.get("default_environment"))
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| Error::EnvironmentNotFound {
                name: None,
                available: available.clone(),
            })?,
    };

    let not_found = || Error::EnvironmentNotFound {
        name: Some(name.clone()),
        available: available.clone(),
    };

    if name == SETTINGS_SECTION {
        return Err(not_found());
    }
    let section = ini.get(&name).ok_or_else(not_found)?;
    let optional = |key: &str| section.get(key).filter(|v| !v.is_empty()).cloned();
    let client_id = optional("client_id").ok_or_else(not_found)?;
    let client_secret = optional("client_secret").ok_or_else(not_found)?;

    let max_retries = optional("max_retries")
        .map(|v| {
            v.parse::<u32>().map_err(|_| invalid_value(&name, "max_retries", &v))
        })
        .transpose()?;
    let poll_interval = optional("poll_interval")
        .map(|v| {
            v.parse::<f64>()
                .ok()
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                .ok_or_else(|| invalid_value(&name, "poll_interval", &v))
        })
        .transpose()?;

    Ok(Environment {
        credentials: Credentials::new(client_id, client_secret),
        production: section.get("production").map(String::as_str) == Some("true"),
        partner: optional("partner"),
        project: optional("project"),
        project_prefix: optional("project_prefix"),
        max_retries,
        poll_interval,
        api_url: optional("api_url"),
        file_url: optional("file_url"),
        name,
    })
}

fn invalid_value(environment: &str, key: &str, value: &str) -> Error {
    Error::InvalidConfig {
        environment: environment.to_string(),
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_ini(text: &str) -> Sections {
    let mut sections = Sections::new();
    let mut current: Option<String> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim().to_string();
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }

        // Keys before the first section header are ignored.
        let Some(section) = current.as_ref() else {
            continue;
        };

        let split = match (line.find('='), line.find(':')) {
            (Some(e), Some(c)) => Some(e.min(c)),
            (e, c) => e.or(c),
        };
        if let Some(idx) = split {
            let key = line[..idx].trim().to_lowercase();
            let value = strip_quotes(line[idx + 1..].trim());
            if let Some(entries) = sections.get_mut(section) {
                entries.insert(key, value.to_string());
            }
        }
    }

    sections
}

/// Drops one pair of matching surrounding quotes.
fn strip_quotes(value: &str) -> &str {
    ['"', '\'']
        .iter()
        .find_map(|&q| value.strip_prefix(q)?.strip_suffix(q))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# Cli settings
[zacc]
default_environment = env1

[env1]
client_id = client1
client_secret = secret1
partner: "partner1"
; project = ignored

[env2]
production = true
client_id = client2
client_secret = secret2
project_prefix = myproject
max_retries = 0
poll_interval = 0.5
"#;

    #[test]
    fn resolves_default_environment() {
        let env = resolve_environment(&parse_ini(SAMPLE), None).unwrap();
        assert_eq!(env.name, "env1");
        assert_eq!(env.credentials.client_id(), "client1");
        assert_eq!(env.credentials.client_secret(), "secret1");
        assert!(!env.production);
        assert_eq!(env.partner.as_deref(), Some("partner1"));
        assert_eq!(env.project, None);
        assert_eq!(env.max_retries, None);
        assert_eq!(env.endpoints(), Endpoints::sandbox());
    }

    #[test]
    fn resolves_named_environment() {
        let env = resolve_environment(&parse_ini(SAMPLE), Some("env2")).unwrap();
        assert!(env.production);
        assert_eq!(env.project_prefix.as_deref(), Some("myproject"));
        assert_eq!(env.max_retries, Some(0));
        assert_eq!(env.poll_interval, Some(Duration::from_millis(500)));
        assert_eq!(env.endpoints(), Endpoints::production());
    }

    #[test]
    fn missing_environment_lists_configured_names() {
        let err = resolve_environment(&parse_ini(SAMPLE), Some("env3")).unwrap_err();
        match err {
            Error::EnvironmentNotFound { name, available } => {
                assert_eq!(name.as_deref(), Some("env3"));
                assert_eq!(available, vec!["env1".to_string(), "env2".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn settings_section_is_not_an_environment() {
        let err = resolve_environment(&parse_ini(SAMPLE), Some("zacc")).unwrap_err();
        assert!(matches!(err, Error::EnvironmentNotFound { .. }));
    }

    #[test]
    fn no_default_environment() {
        let ini = parse_ini("[env1]\nclient_id = a\nclient_secret = b\n");
        let err = resolve_environment(&ini, None).unwrap_err();
        assert!(matches!(err, Error::EnvironmentNotFound { name: None, .. }));
    }

    #[test]
    fn section_without_credentials_is_not_found() {
        let ini = parse_ini("[zacc]\ndefault_environment = env1\n[env1]\nclient_id = a\n");
        let err = resolve_environment(&ini, None).unwrap_err();
        assert!(matches!(err, Error::EnvironmentNotFound { name: Some(_), .. }));
    }

    #[test]
    fn url_overrides_replace_hosts() {
        let ini = parse_ini(
            "[local]\nclient_id = a\nclient_secret = b\napi_url = http://127.0.0.1:9000/\nfile_url = http://127.0.0.1:9001\n",
        );
        let env = resolve_environment(&ini, Some("local")).unwrap();
        let endpoints = env.endpoints();
        assert_eq!(endpoints.api, "http://127.0.0.1:9000");
        assert_eq!(endpoints.file, "http://127.0.0.1:9001");
    }

    #[test]
    fn rejects_invalid_max_retries() {
        let ini = parse_ini("[e]\nclient_id = a\nclient_secret = b\nmax_retries = lots\n");
        assert!(resolve_environment(&ini, Some("e")).is_err());
    }

    #[test]
    fn missing_or_empty_file_is_config_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.ini");
        assert!(matches!(
            load_environment(&missing, None),
            Err(Error::ConfigNotFound { .. })
        ));

        let empty = dir.path().join("empty.ini");
        std::fs::write(&empty, "# nothing here\n").unwrap();
        assert!(matches!(
            load_environment(&empty, None),
            Err(Error::ConfigNotFound { .. })
        ));
    }

    #[test]
    fn unreadable_config_is_config_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_environment(dir.path(), None),
            Err(Error::ConfigNotFound { .. })
        ));
    }

    #[test]
    fn empty_credentials_are_not_an_environment() {
        let ini = parse_ini("[e]\nclient_id =\nclient_secret = b\n[f]\nclient_id = a\nclient_secret = ''\n");
        for name in ["e", "f"] {
            let err = resolve_environment(&ini, Some(name)).unwrap_err();
            assert!(matches!(err, Error::EnvironmentNotFound { name: Some(_), .. }), "{err:?}");
        }
    }

    #[test]
    fn rejects_out_of_range_poll_interval() {
        for value in ["1e30", "-1", "inf", "soon"] {
            let ini = parse_ini(&format!(
                "[e]\nclient_id = a\nclient_secret = b\npoll_interval = {value}\n"
            ));
            let err = resolve_environment(&ini, Some("e")).unwrap_err();
            assert!(
                matches!(err, Error::InvalidConfig { ref key, .. } if key == "poll_interval"),
                "{err:?}"
            );
        }
    }

    #[test]
    fn strips_one_pair_of_matching_quotes() {
        assert_eq!(strip_quotes("\"a\""), "a");
        assert_eq!(strip_quotes("'a'"), "a");
        assert_eq!(strip_quotes("\"a'"), "\"a'");
        assert_eq!(strip_quotes("\""), "\"");
    }

    #[test]
    fn values_keep_colons_after_equals() {
        let ini = parse_ini("[e]\napi_url = http://localhost:8080\n");
        assert_eq!(ini["e"]["api_url"], "http://localhost:8080");
    }
}

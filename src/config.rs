use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::error::{HubError, HubResult};

/// Environment variable naming the configuration document.
pub const CONFIG_PATH_ENV: &str = "MCP_CONFIG_PATH";

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "mcp-config.json";

#[derive(Debug, Default, Deserialize)]
pub struct McpJsonConfig {
    #[serde(rename = "mcpServers", default)]
    pub mcp_servers: BTreeMap<String, McpServerConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Stdio,
    Http,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct McpServerConfig {
    // stdio server
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    // http server
    #[serde(default, rename = "type")]
    pub transport: Option<TransportKind>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub disabled: bool,
}

/// How to reach one backend.
///
/// Immutable once used to establish a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendDescriptor {
    /// Spawn `command args...` and speak MCP over its stdin/stdout.
    Stdio {
        command: String,
        args: Vec<String>,
        /// Overlaid on the hub's own environment.
        env: BTreeMap<String, String>,
    },
    /// Connect to a streamable HTTP endpoint.
    Http {
        url: Url,
        headers: BTreeMap<String, String>,
    },
}

impl BackendDescriptor {
    pub fn stdio<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        BackendDescriptor::Stdio {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: BTreeMap::new(),
        }
    }

    pub fn http(name: &str, url: &str) -> HubResult<Self> {
        Ok(BackendDescriptor::Http {
            url: parse_url(name, url)?,
            headers: BTreeMap::new(),
        })
    }

    pub fn from_json(name: &str, cfg: McpServerConfig) -> HubResult<Self> {
        let invalid = |reason: &str| HubError::InvalidDescriptor {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        let kind = match cfg.transport {
            Some(kind) => kind,
            None if cfg.command.is_some() => TransportKind::Stdio,
            None if cfg.url.is_some() => TransportKind::Http,
            None => return Err(invalid("must have either `command` or `url`")),
        };

        match kind {
            TransportKind::Stdio => {
                let command = cfg
                    .command
                    .filter(|c| !c.trim().is_empty())
                    .ok_or_else(|| invalid("stdio servers require a `command`"))?;
                Ok(BackendDescriptor::Stdio {
                    command,
                    args: cfg.args,
                    env: cfg.env,
                })
            }
            TransportKind::Http => {
                let url = cfg
                    .url
                    .ok_or_else(|| invalid("http servers require a `url`"))?;
                header_map(&cfg.headers).map_err(|reason| invalid(&reason))?;
                Ok(BackendDescriptor::Http {
                    url: parse_url(name, &url)?,
                    headers: cfg.headers,
                })
            }
        }
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            BackendDescriptor::Stdio { .. } => TransportKind::Stdio,
            BackendDescriptor::Http { .. } => TransportKind::Http,
        }
    }

    /// Short human-readable target, for logs.
    pub fn target(&self) -> String {
        match self {
            BackendDescriptor::Stdio { command, args, .. } if args.is_empty() => command.clone(),
            BackendDescriptor::Stdio { command, args, .. } => {
                format!("{} {}", command, args.join(" "))
            }
            BackendDescriptor::Http { url, .. } => url.to_string(),
        }
    }
}

fn parse_url(name: &str, raw: &str) -> HubResult<Url> {
    let url = Url::parse(raw).map_err(|e| HubError::InvalidDescriptor {
        name: name.to_string(),
        reason: format!("invalid url `{}`: {}", raw, e),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(HubError::InvalidDescriptor {
            name: name.to_string(),
            reason: format!("unsupported url scheme `{}`", other),
        }),
    }
}

/// Build the HTTP header overlay of a remote backend.
pub(crate) fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, String> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.trim().as_bytes())
            .map_err(|_| format!("invalid header name `{}`", key))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| format!("invalid value for header `{}`", key))?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Locate the configuration document.
///
/// Checked in order: explicit path, `MCP_CONFIG_PATH`, `./mcp-config.json`.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.to_path_buf());
    }

    if let Ok(p) = env::var(CONFIG_PATH_ENV) {
        if !p.is_empty() {
            return Some(PathBuf::from(p));
        }
    }

    let candidate = PathBuf::from(DEFAULT_CONFIG_FILE);
    if candidate.exists() {
        return Some(candidate);
    }

    None
}

fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                name.push(c);
            }
            match env::var(&name) {
                Ok(val) if closed => out.push_str(&val),
                _ => {
                    out.push_str("${");
                    out.push_str(&name);
                    if closed {
                        out.push('}');
                    }
                }
            }
        } else {
            out.push(ch);
        }
    }

    out
}

fn expand_server(mut cfg: McpServerConfig) -> McpServerConfig {
    for val in cfg.env.values_mut() {
        *val = expand_env_vars(val);
    }
    for val in cfg.headers.values_mut() {
        *val = expand_env_vars(val);
    }
    if let Some(cmd) = cfg.command.as_mut() {
        *cmd = expand_env_vars(cmd);
    }
    cfg.args = cfg.args.iter().map(|a| expand_env_vars(a)).collect();
    if let Some(url) = cfg.url.as_mut() {
        *url = expand_env_vars(url);
    }

    cfg
}

impl McpJsonConfig {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let mut cfg: McpJsonConfig = serde_json::from_str(raw)?;
        cfg.mcp_servers = cfg
            .mcp_servers
            .into_iter()
            .map(|(name, server)| (name, expand_server(server)))
            .collect();
        Ok(cfg)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to load configuration file '{}': {}", path.display(), e)
        })?;
        Self::parse(&raw).map_err(|e| {
            anyhow::anyhow!("Failed to load configuration file '{}': {}", path.display(), e)
        })
    }

    /// Enabled servers with their descriptors; invalid entries are returned as errors.
    pub fn descriptors(&self) -> Vec<(String, HubResult<BackendDescriptor>)> {
        self.mcp_servers
            .iter()
            .filter(|(_, cfg)| !cfg.disabled)
            .map(|(name, cfg)| (name.clone(), BackendDescriptor::from_json(name, cfg.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_stdio_and_http() {
        let cfg = McpJsonConfig::parse(
            r#"{
                "mcpServers": {
                    "fs": {"command": "npx", "args": ["-y", "server-fs"], "env": {"ROOT": "/tmp"}},
                    "remote": {"type": "http", "url": "https://example.com/mcp",
                               "headers": {"Authorization": "Bearer abc"}},
                    "off": {"command": "nope", "disabled": true}
                }
            }"#,
        )
        .unwrap();

        let descriptors = cfg.descriptors();
        assert_eq!(descriptors.len(), 2);

        let (name, fs) = &descriptors[0];
        assert_eq!(name, "fs");
        match fs.as_ref().unwrap() {
            BackendDescriptor::Stdio { command, args, env } => {
                assert_eq!(command, "npx");
                assert_eq!(args, &vec!["-y".to_string(), "server-fs".to_string()]);
                assert_eq!(env.get("ROOT").map(String::as_str), Some("/tmp"));
            }
            other => panic!("expected stdio, got {:?}", other),
        }

        let (name, remote) = &descriptors[1];
        assert_eq!(name, "remote");
        let remote = remote.as_ref().unwrap();
        assert_eq!(remote.kind(), TransportKind::Http);
        assert_eq!(remote.target(), "https://example.com/mcp");
    }

    #[test]
    fn test_missing_command_and_url_is_invalid() {
        let err = BackendDescriptor::from_json("empty", McpServerConfig::default()).unwrap_err();
        assert!(matches!(err, HubError::InvalidDescriptor { ref name, .. } if name == "empty"));
    }

    #[test]
    fn test_explicit_type_requires_matching_field() {
        let cfg = McpServerConfig {
            transport: Some(TransportKind::Http),
            command: Some("node".into()),
            ..Default::default()
        };
        assert!(BackendDescriptor::from_json("x", cfg).is_err());

        let cfg = McpServerConfig {
            transport: Some(TransportKind::Stdio),
            command: Some("  ".into()),
            ..Default::default()
        };
        assert!(BackendDescriptor::from_json("x", cfg).is_err());
    }

    #[test]
    fn test_rejects_bad_headers() {
        let remote = |headers: &[(&str, &str)]| McpServerConfig {
            url: Some("https://example.com/mcp".into()),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        };

        let err = BackendDescriptor::from_json("x", remote(&[("Bad Header", "v")])).unwrap_err();
        assert!(matches!(err, HubError::InvalidDescriptor { ref reason, .. } if reason.contains("Bad Header")));
        assert!(BackendDescriptor::from_json("x", remote(&[("X-Tenant", "a\nb")])).is_err());

        let ok = BackendDescriptor::from_json("x", remote(&[("X-API-Key", "k")])).unwrap();
        match ok {
            BackendDescriptor::Http { headers, .. } => assert_eq!(headers["X-API-Key"], "k"),
            other => panic!("unexpected descriptor: {:?}", other),
        }
    }

    #[test]
    fn test_header_map() {
        let headers = BTreeMap::from([
            ("X-API-Key".to_string(), "k".to_string()),
            ("Authorization".to_string(), "Bearer t".to_string()),
        ]);
        let map = header_map(&headers).unwrap();
        assert_eq!(map["x-api-key"], "k");
        assert_eq!(map["authorization"], "Bearer t");
    }

    #[test]
    fn test_rejects_bad_urls() {
        assert!(BackendDescriptor::http("x", "not a url").is_err());
        assert!(BackendDescriptor::http("x", "ftp://example.com").is_err());
        assert!(BackendDescriptor::http("x", "http://localhost:3000/mcp").is_ok());
    }

    #[test]
    fn test_expand_env_vars() {
        // SAFETY: the variable name is unique to this test.
        unsafe { env::set_var("MCP_HUB_TEST_TOKEN", "s3cret") };
        assert_eq!(expand_env_vars("Bearer ${MCP_HUB_TEST_TOKEN}"), "Bearer s3cret");
        assert_eq!(
            expand_env_vars("${MCP_HUB_TEST_UNSET_VAR}/x"),
            "${MCP_HUB_TEST_UNSET_VAR}/x"
        );
        assert_eq!(expand_env_vars("cost $5"), "cost $5");
        assert_eq!(expand_env_vars("${UNTERMINATED"), "${UNTERMINATED");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"mcpServers": {{"echo": {{"command": "echo"}}}}}}"#).unwrap();

        let cfg = McpJsonConfig::load(file.path()).unwrap();
        assert_eq!(cfg.mcp_servers.len(), 1);
        assert!(cfg.mcp_servers.contains_key("echo"));
    }

    #[test]
    fn test_load_reports_path_on_failure() {
        let err = McpJsonConfig::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }

    #[test]
    fn test_explicit_path_wins() {
        let p = Path::new("/etc/hub.json");
        assert_eq!(resolve_config_path(Some(p)), Some(p.to_path_buf()));
    }
}

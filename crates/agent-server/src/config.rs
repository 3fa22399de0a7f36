//! Server Configuration
//!
//! Everything is driven by environment variables (plus `.env` via dotenvy).
//! The MCP side accepts either a network endpoint (`MCP_SERVER_URL`) or a
//! local process to spawn (`MCP_COMMAND`); the URL wins when both are set.

use std::collections::HashMap;

use anyhow::{Context, bail};
use serde_json::{Map, Value};

use agent_mcp::TransportConfig;
use agent_runtime::openai::OpenAiConfig;

use crate::prompt::ANALYST_SYSTEM_PROMPT;

/// Full startup configuration for the server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to listen on
    pub bind_addr: String,

    /// Directory served for the web UI
    pub static_dir: String,

    /// How to reach the MCP tool server
    pub transport: TransportConfig,

    /// Tool names to expose to the agent (empty = all discovered tools)
    pub include_tools: Vec<String>,

    /// Arguments injected into every tool call, overriding model-supplied
    /// values (e.g. a fixed datasource id)
    pub bound_args: Map<String, Value>,

    /// LLM endpoint and credentials
    pub llm: OpenAiConfig,

    /// Model identifier
    pub model_id: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Generation cap (provider default when unset)
    pub max_tokens: Option<u32>,

    /// Reasoning loop budget per turn
    pub max_iterations: usize,

    /// System prompt (defaults to the analyst prompt)
    pub system_prompt: String,

    /// Wall-clock budget for one whole turn
    pub turn_timeout_secs: u64,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let get = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        let transport = select_transport(
            get("MCP_SERVER_URL"),
            get("MCP_HEADERS"),
            get("MCP_COMMAND"),
            get("MCP_ARGS"),
            get("MCP_ENV"),
        )?;

        let bound_args = match get("TOOL_BOUND_ARGS") {
            Some(raw) => parse_bound_args(&raw)?,
            None => Map::new(),
        };

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8009".into()),
            static_dir: get("STATIC_DIR").unwrap_or_else(|| "static".into()),
            transport,
            include_tools: get("INCLUDE_TOOLS")
                .map(|raw| parse_name_list(&raw))
                .unwrap_or_default(),
            bound_args,
            llm: OpenAiConfig::from_env()?,
            model_id: get("MODEL_ID").unwrap_or_else(|| "gpt-4.1".into()),
            temperature: get("MODEL_TEMPERATURE")
                .map(|raw| raw.parse().context("MODEL_TEMPERATURE must be a number"))
                .transpose()?
                .unwrap_or(0.2),
            max_tokens: get("MODEL_MAX_TOKENS")
                .map(|raw| raw.parse().context("MODEL_MAX_TOKENS must be an integer"))
                .transpose()?,
            max_iterations: get("MAX_ITERATIONS")
                .map(|raw| raw.parse().context("MAX_ITERATIONS must be an integer"))
                .transpose()?
                .unwrap_or(10),
            system_prompt: get("SYSTEM_PROMPT")
                .unwrap_or_else(|| ANALYST_SYSTEM_PROMPT.to_string()),
            turn_timeout_secs: get("TURN_TIMEOUT_SECS")
                .map(|raw| raw.parse().context("TURN_TIMEOUT_SECS must be an integer"))
                .transpose()?
                .unwrap_or(120),
        })
    }
}

fn select_transport(
    url: Option<String>,
    headers: Option<String>,
    command: Option<String>,
    args: Option<String>,
    env: Option<String>,
) -> anyhow::Result<TransportConfig> {
    if let Some(url) = url {
        let headers = match headers {
            Some(raw) => parse_headers(&raw)?,
            None => Vec::new(),
        };
        return Ok(TransportConfig::Http { url, headers });
    }
    if let Some(command) = command {
        let args = args
            .map(|raw| raw.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        let env = match env {
            Some(raw) => parse_env_pairs(&raw)?,
            None => HashMap::new(),
        };
        return Ok(TransportConfig::Stdio { command, args, env });
    }
    bail!("either MCP_SERVER_URL or MCP_COMMAND must be set");
}

/// `MCP_HEADERS` accepts a JSON object or `Name: value, Name2: value2`.
fn parse_headers(raw: &str) -> anyhow::Result<Vec<(String, String)>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    if raw.starts_with('{') {
        let map: HashMap<String, String> =
            serde_json::from_str(raw).context("MCP_HEADERS is not a JSON string map")?;
        return Ok(map.into_iter().collect());
    }
    raw.split(',')
        .map(|entry| {
            let (name, value) = entry
                .split_once(':')
                .with_context(|| format!("header entry '{entry}' is missing ':'"))?;
            Ok((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// `MCP_ENV` accepts a JSON object or `KEY=value,KEY2=value2`.
fn parse_env_pairs(raw: &str) -> anyhow::Result<HashMap<String, String>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(HashMap::new());
    }
    if raw.starts_with('{') {
        return serde_json::from_str(raw).context("MCP_ENV is not a JSON string map");
    }
    raw.split(',')
        .map(|entry| {
            let (key, value) = entry
                .split_once('=')
                .with_context(|| format!("env entry '{entry}' is missing '='"))?;
            Ok((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

fn parse_name_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bound_args(raw: &str) -> anyhow::Result<Map<String, Value>> {
    let value: Value = serde_json::from_str(raw).context("TOOL_BOUND_ARGS is not valid JSON")?;
    match value {
        Value::Object(map) => Ok(map),
        _ => bail!("TOOL_BOUND_ARGS must be a JSON object"),
    }
}

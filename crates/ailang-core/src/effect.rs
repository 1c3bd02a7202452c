//! Effect runtime: `invokeEffect(effectName, opName, args, ctx) -> Value | RuntimeError`.
//!
//! A registry of `(effectName, opName) -> Handler` built-ins, each checked
//! against the run's [`CapabilitySet`] before it touches the host (spec
//! §4.9). Handlers that perform real I/O route print output through a
//! [`PrintWriter`], matching the teacher's separation of "what gets printed"
//! from "where it goes" (`io.rs`).

use std::fmt;
use std::io::{self, BufRead, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;

use crate::capability::CapabilitySet;
use crate::error::RuntimeError;
use crate::span::Span;
use crate::value::Value;

/// Output sink for the `IO.print`/`IO.println` builtins.
pub trait PrintWriter {
    fn write_str(&mut self, s: &str) -> io::Result<()>;
}

#[derive(Debug, Default)]
pub struct StdPrint;

impl PrintWriter for StdPrint {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        lock.write_all(s.as_bytes())?;
        lock.flush()
    }
}

#[derive(Debug, Default)]
pub struct CollectPrint(pub String);

impl PrintWriter for CollectPrint {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.0.push_str(s);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn write_str(&mut self, _s: &str) -> io::Result<()> {
        Ok(())
    }
}

/// Security policy for the `FS` and `Net` handlers. Sandbox root/symlink
/// policy is left to the caller to configure.
#[derive(Debug, Clone)]
pub struct EffectConfig {
    /// Root directory `FS` operations are confined to; `None` means no
    /// sandboxing beyond capability gating.
    pub fs_root: Option<PathBuf>,
    /// Hosts the `Net` handler may contact; empty means "deny all" even with
    /// the `Net` capability granted, matching "deny localhost and private
    /// IPs by default" unless explicitly allow-listed.
    pub net_allow_hosts: Vec<String>,
    pub net_timeout_ms: u64,
    /// Deterministic seed; when set, `Clock.now` returns a value derived
    /// from the seed instead of the wall clock.
    pub deterministic_seed: Option<u64>,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            fs_root: None,
            net_allow_hosts: Vec::new(),
            net_timeout_ms: 10_000,
            deterministic_seed: None,
        }
    }
}

/// An opaque host-provided primitive: a builtin name plus an optional effect
/// label (pure builtins like arithmetic have no label and bypass capability
/// checking entirely).
pub struct Builtin {
    pub name: Arc<str>,
    pub effect: Option<(&'static str, &'static str)>,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Builtin({})", self.name)
    }
}

/// Dispatches one effect operation. Capability check happens first and
/// unconditionally — spec property 7: "an effect op whose label is not in
/// the capability context always fails with `EFFECT_CAP_MISSING` before any
/// side effect is performed."
pub fn invoke_effect(
    effect_name: &str,
    op_name: &str,
    args: &[Value],
    caps: &CapabilitySet,
    config: &EffectConfig,
    print: &mut dyn PrintWriter,
    span: &Span,
) -> Result<Value, RuntimeError> {
    caps.check(effect_name).map_err(|_| RuntimeError::CapabilityMissing {
        span: span.clone(),
        label: effect_name.to_owned(),
    })?;

    match (effect_name, op_name) {
        ("IO", "print") => {
            let text = args.first().map(Value::to_string).unwrap_or_default();
            write_or_fail(print, &text, span)?;
            Ok(Value::Unit)
        }
        ("IO", "println") => {
            let text = args.first().map(Value::to_string).unwrap_or_default();
            write_or_fail(print, &format!("{text}\n"), span)?;
            Ok(Value::Unit)
        }
        ("IO", "readLine") => {
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line).map_err(|e| RuntimeError::EffectFailure {
                span: span.clone(),
                effect: "IO".into(),
                op: "readLine".into(),
                message: e.to_string(),
            })?;
            if line.ends_with('\n') {
                line.pop();
                if line.ends_with('\r') {
                    line.pop();
                }
            }
            Ok(Value::Str(Arc::from(line)))
        }
        ("FS", "readFile") => fs_read_file(args, config, span),
        ("FS", "writeFile") => fs_write_file(args, config, span),
        ("FS", "exists") => fs_exists(args, config, span),
        ("Clock", "now") => Ok(Value::Int(clock_now(config))),
        ("Clock", "sleep") => {
            if config.deterministic_seed.is_none()
                && let Some(Value::Int(ms)) = args.first()
            {
                std::thread::sleep(std::time::Duration::from_millis((*ms).max(0) as u64));
            }
            Ok(Value::Unit)
        }
        ("Net", "httpGet") => net_request("GET", args, config, span, 0),
        ("Net", "httpPost") => net_request("POST", args, config, span, 1),
        ("Net", "httpRequest") => net_request_full(args, config, span),
        _ => Err(RuntimeError::EffectFailure {
            span: span.clone(),
            effect: effect_name.to_owned(),
            op: op_name.to_owned(),
            message: "no handler registered for this operation".to_owned(),
        }),
    }
}

fn write_or_fail(print: &mut dyn PrintWriter, text: &str, span: &Span) -> Result<(), RuntimeError> {
    print.write_str(text).map_err(|e| RuntimeError::EffectFailure {
        span: span.clone(),
        effect: "IO".into(),
        op: "print".into(),
        message: e.to_string(),
    })
}

fn sandboxed_path(raw: &str, config: &EffectConfig) -> PathBuf {
    match &config.fs_root {
        Some(root) => root.join(raw.trim_start_matches('/')),
        None => PathBuf::from(raw),
    }
}

fn fs_read_file(args: &[Value], config: &EffectConfig, span: &Span) -> Result<Value, RuntimeError> {
    let Some(Value::Str(path)) = args.first() else {
        return Err(malformed_fs_arg(span));
    };
    let resolved = sandboxed_path(path, config);
    std::fs::read_to_string(&resolved)
        .map(|s| Value::Str(Arc::from(s)))
        .map_err(|e| RuntimeError::EffectFailure {
            span: span.clone(),
            effect: "FS".into(),
            op: "readFile".into(),
            message: e.to_string(),
        })
}

fn fs_write_file(args: &[Value], config: &EffectConfig, span: &Span) -> Result<Value, RuntimeError> {
    let (Some(Value::Str(path)), Some(Value::Str(content))) = (args.first(), args.get(1)) else {
        return Err(malformed_fs_arg(span));
    };
    let resolved = sandboxed_path(path, config);
    std::fs::write(&resolved, content.as_bytes()).map(|()| Value::Unit).map_err(|e| RuntimeError::EffectFailure {
        span: span.clone(),
        effect: "FS".into(),
        op: "writeFile".into(),
        message: e.to_string(),
    })
}

fn fs_exists(args: &[Value], config: &EffectConfig, span: &Span) -> Result<Value, RuntimeError> {
    let Some(Value::Str(path)) = args.first() else {
        return Err(malformed_fs_arg(span));
    };
    Ok(Value::Bool(Path::new(&sandboxed_path(path, config)).exists()))
}

fn malformed_fs_arg(span: &Span) -> RuntimeError {
    RuntimeError::MalformedValue {
        span: span.clone(),
        message: "FS operation requires a String path argument".to_owned(),
    }
}

fn clock_now(config: &EffectConfig) -> i64 {
    if let Some(seed) = config.deterministic_seed {
        return seed as i64;
    }
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Deny-by-default host policy: non-`http(s)` schemes, localhost, and
/// private IP ranges are rejected unless the host appears in the allow-list
/// Matching is performed on the request's declared host before
/// any connection is attempted, and again would be required on redirect to
/// prevent DNS rebinding — `ureq`'s blocking client does not expose
/// per-redirect host callbacks, so redirects are disabled entirely
/// (`ureq::AgentBuilder::redirects(0)`), which is a stricter, simpler
/// substitute for re-checking each hop.
fn host_allowed(url: &str, config: &EffectConfig) -> bool {
    let Some(rest) = url.strip_prefix("https://").or_else(|| url.strip_prefix("http://")) else {
        return false;
    };
    let host = rest.split(['/', ':']).next().unwrap_or("");
    if host.is_empty() || host == "localhost" || host == "127.0.0.1" || host == "::1" {
        return false;
    }
    if host.starts_with("10.") || host.starts_with("192.168.") || host.starts_with("169.254.") {
        return false;
    }
    config.net_allow_hosts.iter().any(|h| h == host)
}

/// `httpGet`/`httpPost`: spec says these return the response body as a plain
/// `String`, with no `Result` wrapper to carry a failure in — so a policy
/// violation or transport error aborts evaluation as an `EffectFailure`,
/// the same way a missing capability would.
fn net_request(method: &str, args: &[Value], config: &EffectConfig, span: &Span, body_index: usize) -> Result<Value, RuntimeError> {
    let Some(Value::Str(url)) = args.first() else {
        return Err(net_malformed(span));
    };
    let body = args.get(body_index + 1).and_then(|v| match v {
        Value::Str(s) => Some(s.to_string()),
        _ => None,
    });
    let (_status, _headers, text) = perform_request(method, url, &[], body.as_deref(), config, span)
        .map_err(|msg| net_failure(method, span, msg))?;
    Ok(Value::Str(Arc::from(text)))
}

/// `httpRequest`: spec's `Result<{status, headers, body, ok}, NetError>`.
/// Unlike `httpGet`/`httpPost`, a policy violation or transport failure here
/// is a *value* (`Tagged("Err", [NetError])`) the caller pattern-matches on,
/// not an evaluator abort — the whole point of the dedicated return type.
fn net_request_full(args: &[Value], config: &EffectConfig, span: &Span) -> Result<Value, RuntimeError> {
    let (Some(Value::Str(method)), Some(Value::Str(url))) = (args.first(), args.get(1)) else {
        return Err(net_malformed(span));
    };
    let headers = match args.get(2) {
        Some(Value::Tagged { .. } | Value::Tuple(_)) => decode_header_list(&args[2]),
        _ => Vec::new(),
    };
    let body = match args.get(3) {
        Some(Value::Str(s)) => Some(s.to_string()),
        _ => None,
    };
    match perform_request(method, url, &headers, body.as_deref(), config, span) {
        Ok((status, resp_headers, text)) => {
            let mut record: IndexMap<Arc<str>, Value, ahash::RandomState> = IndexMap::default();
            record.insert(Arc::from("status"), Value::Int(i64::from(status)));
            record.insert(
                Arc::from("headers"),
                Value::list(
                    resp_headers
                        .into_iter()
                        .map(|(k, v)| Value::Tuple(Arc::from([Value::Str(Arc::from(k)), Value::Str(Arc::from(v))]))),
                ),
            );
            record.insert(Arc::from("body"), Value::Str(Arc::from(text)));
            record.insert(Arc::from("ok"), Value::Bool((200..300).contains(&status)));
            Ok(Value::Tagged {
                tag: Arc::from("Ok"),
                fields: Arc::from([Value::Record(Arc::new(record))]),
            })
        }
        Err(message) => {
            let mut record: IndexMap<Arc<str>, Value, ahash::RandomState> = IndexMap::default();
            record.insert(Arc::from("message"), Value::Str(Arc::from(message)));
            Ok(Value::Tagged {
                tag: Arc::from("Err"),
                fields: Arc::from([Value::Record(Arc::new(record))]),
            })
        }
    }
}

/// Best-effort decoding of a user-supplied header list (`[(String, String)]`)
/// passed as a list-of-tuples value; malformed entries are dropped rather
/// than failing the whole request, since headers are advisory metadata.
fn decode_header_list(value: &Value) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut cur = value;
    loop {
        match cur {
            Value::Tagged { tag, fields } if tag.as_ref() == "Cons" => {
                if let Value::Tuple(pair) = &fields[0]
                    && let [Value::Str(k), Value::Str(v)] = pair.as_ref()
                {
                    out.push((k.to_string(), v.to_string()));
                }
                cur = &fields[1];
            }
            _ => break,
        }
    }
    out
}

fn net_malformed(span: &Span) -> RuntimeError {
    RuntimeError::MalformedValue {
        span: span.clone(),
        message: "Net operation requires a String url argument".to_owned(),
    }
}

fn net_failure(method: &str, span: &Span, message: String) -> RuntimeError {
    RuntimeError::EffectFailure {
        span: span.clone(),
        effect: "Net".into(),
        op: method.to_lowercase(),
        message,
    }
}

/// Performs one request under the deny-by-default host policy, returning
/// `(status, response headers, body)` on success or a human-readable failure
/// message on any policy violation or transport error. Errors are plain
/// `String`s rather than `RuntimeError` so `net_request_full` can turn them
/// into a `NetError` value instead of aborting evaluation.
fn perform_request(
    method: &str,
    url: &str,
    headers: &[(String, String)],
    body: Option<&str>,
    config: &EffectConfig,
    _span: &Span,
) -> Result<(u16, Vec<(String, String)>, String), String> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err("only http(s) URLs are permitted".to_owned());
    }
    if !host_allowed(url, config) {
        return Err("host is not on the allow-list (localhost and private IPs are denied by default)".to_owned());
    }
    let agent = ureq::AgentBuilder::new()
        .timeout(std::time::Duration::from_millis(config.net_timeout_ms))
        .redirects(0)
        .build();
    let mut request = agent.request(method, url);
    for (k, v) in headers {
        request = request.set(k, v);
    }
    let response = match body {
        Some(b) => request.send_string(b),
        None => request.call(),
    };
    match response {
        Ok(resp) => {
            let status = resp.status();
            let resp_headers: Vec<(String, String)> = resp
                .headers_names()
                .into_iter()
                .filter_map(|name| {
                    let value = resp.header(&name)?.to_owned();
                    Some((name, value))
                })
                .collect();
            let text = resp.into_string().unwrap_or_default();
            Ok((status, resp_headers, text))
        }
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_capability_fails_before_any_side_effect() {
        let caps = CapabilitySet::none();
        let config = EffectConfig::default();
        let mut print = CollectPrint::default();
        let result = invoke_effect(
            "IO",
            "println",
            &[Value::Str(Arc::from("hi"))],
            &caps,
            &config,
            &mut print,
            &Span::unknown(),
        );
        assert!(matches!(result, Err(RuntimeError::CapabilityMissing { .. })));
        assert!(print.0.is_empty());
    }

    #[test]
    fn println_with_io_capability_writes_and_appends_newline() {
        let caps = CapabilitySet::new(vec![crate::capability::Capability::Io]);
        let config = EffectConfig::default();
        let mut print = CollectPrint::default();
        invoke_effect(
            "IO",
            "println",
            &[Value::Str(Arc::from("hi"))],
            &caps,
            &config,
            &mut print,
            &Span::unknown(),
        )
        .unwrap();
        assert_eq!(print.0, "hi\n");
    }

    #[test]
    fn localhost_is_denied_even_with_net_capability() {
        let caps = CapabilitySet::new(vec![crate::capability::Capability::Net]);
        let config = EffectConfig::default();
        assert!(!host_allowed("http://localhost:8080/x", &config));
    }

    #[test]
    fn http_request_to_denied_host_is_an_err_value_not_a_runtime_error() {
        let caps = CapabilitySet::new(vec![crate::capability::Capability::Net]);
        let config = EffectConfig::default();
        let mut print = CollectPrint::default();
        let result = invoke_effect(
            "Net",
            "httpRequest",
            &[
                Value::Str(Arc::from("GET")),
                Value::Str(Arc::from("http://localhost:8080/x")),
                Value::nil(),
                Value::Unit,
            ],
            &caps,
            &config,
            &mut print,
            &Span::unknown(),
        )
        .unwrap();
        match result {
            Value::Tagged { tag, fields } => {
                assert_eq!(tag.as_ref(), "Err");
                assert!(matches!(&fields[0], Value::Record(_)));
            }
            other => panic!("expected Err(..) value, got {other:?}"),
        }
    }

    #[test]
    fn http_get_to_denied_host_aborts_with_effect_failure() {
        let caps = CapabilitySet::new(vec![crate::capability::Capability::Net]);
        let config = EffectConfig::default();
        let mut print = CollectPrint::default();
        let result = invoke_effect(
            "Net",
            "httpGet",
            &[Value::Str(Arc::from("http://localhost:8080/x"))],
            &caps,
            &config,
            &mut print,
            &Span::unknown(),
        );
        assert!(matches!(result, Err(RuntimeError::EffectFailure { .. })));
    }
}

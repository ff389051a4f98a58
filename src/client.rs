//! Session adapter for the gateway's XMO JSON API.
//!
//! [`XmoClient`] wraps `reqwest::Client` and exposes the handful of calls the
//! commands need: [`XmoClient::login`], [`Gateway::get_value`],
//! [`Gateway::set_value`] and [`XmoClient::logout`]. Paths are opaque XPath
//! strings; the gateway evaluates them.
//!
//! ## Wire format
//!
//! Every call is a single `POST /cgi/json-req` whose body is `req=` followed
//! by a compact JSON envelope:
//!
//! ```text
//! {"request":{"id":3,"session-id":"1234","priority":false,
//!             "actions":[{"id":0,"method":"getValue","xpath":"Device%2F..."}],
//!             "cnonce":48121,"auth-key":"<hex>"}}
//! ```
//!
//! `id` counts requests within the session, starting at 0 for `logIn`.
//! `auth-key` is derived from the password hash, the server nonce returned by
//! `logIn`, the request id and the client nonce (see [`crate::hash`]).
//!
//! ## Error handling
//!
//! Transport failures and non-2xx statuses become [`ClientError::Request`] /
//! [`ClientError::Http`]. A 200 reply still carries an envelope-level
//! `error.description`; `XMO_REQUEST_ACTION_ERR` means one of the actions
//! failed and its own description is mapped to a typed variant.

use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::hash::AuthMethod;
use crate::keys;

const API_ENDPOINT: &str = "/cgi/json-req";
const USER_AGENT: &str = "XMO_REMOTE_CLIENT/1.0.0";
/// Client nonces are drawn from `0..CNONCE_LIMIT`.
const CNONCE_LIMIT: u32 = 500_000;

const XMO_REQUEST_NO_ERR: &str = "XMO_REQUEST_NO_ERR";
const XMO_REQUEST_ACTION_ERR: &str = "XMO_REQUEST_ACTION_ERR";
const XMO_NO_ERR: &str = "XMO_NO_ERR";
const XMO_INVALID_SESSION_ERR: &str = "XMO_INVALID_SESSION_ERR";
const XMO_AUTHENTICATION_ERR: &str = "XMO_AUTHENTICATION_ERR";
const XMO_ACCESS_RESTRICTION_ERR: &str = "XMO_ACCESS_RESTRICTION_ERR";
const XMO_NON_WRITABLE_PARAMETER_ERR: &str = "XMO_NON_WRITABLE_PARAMETER_ERR";
const XMO_UNKNOWN_PATH_ERR: &str = "XMO_UNKNOWN_PATH_ERR";
const XMO_MAX_SESSION_COUNT_ERR: &str = "XMO_MAX_SESSION_COUNT_ERR";
const XMO_LOGIN_RETRY_ERR: &str = "XMO_LOGIN_RETRY_ERR";

/// Read/write access to the gateway's configuration tree.
///
/// Implemented by [`XmoClient`] and by the in-memory fake used in command tests.
#[allow(async_fn_in_trait)]
pub trait Gateway {
    /// Fetch the value at `xpath`.
    async fn get_value(&mut self, xpath: &str) -> Result<Value, ClientError>;

    /// Write `value` at `xpath`.
    async fn set_value(&mut self, xpath: &str, value: SetValue) -> Result<(), ClientError>;
}

/// A value written with `setValue`.
///
/// The gateway takes every value as a string; booleans are spelled `True` /
/// `False`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SetValue {
    Bool(bool),
    Text(String),
}

impl fmt::Display for SetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetValue::Bool(true) => f.write_str("True"),
            SetValue::Bool(false) => f.write_str("False"),
            SetValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for SetValue {
    fn from(b: bool) -> Self {
        SetValue::Bool(b)
    }
}

impl From<&str> for SetValue {
    fn from(s: &str) -> Self {
        SetValue::Text(s.to_string())
    }
}

impl From<String> for SetValue {
    fn from(s: String) -> Self {
        SetValue::Text(s)
    }
}

impl From<Ipv4Addr> for SetValue {
    fn from(addr: Ipv4Addr) -> Self {
        SetValue::Text(addr.to_string())
    }
}

/// Errors returned by [`XmoClient`] methods.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP transport error (connection refused, TLS failure, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The gateway answered with a non-2xx HTTP status.
    #[error("gateway returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The reply could not be decoded or lacked an expected field.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Wrong username or password, or a stale auth key.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The session id is unknown to the gateway (expired or logged out).
    #[error("invalid session")]
    InvalidSession,

    /// The user is not allowed to access the path.
    #[error("access restricted: {0}")]
    AccessRestricted(String),

    /// The path exists but cannot be written.
    #[error("parameter is not writable: {0}")]
    NonWritableParameter(String),

    /// The path does not exist in the configuration tree.
    #[error("unknown path: {0}")]
    UnknownPath(String),

    /// The gateway refuses to open another session.
    #[error("maximum session count reached")]
    MaxSessionCount,

    /// Too many failed logins; the gateway is holding off.
    #[error("login retry limit reached, try again later")]
    LoginRetry,

    /// Any other error description reported by the gateway.
    #[error("gateway error: {0}")]
    Gateway(String),
}

/// Connection settings for [`XmoClient::new`].
#[derive(Clone)]
pub struct ClientOptions {
    pub host: Ipv4Addr,
    pub username: String,
    pub password: String,
    pub auth_method: AuthMethod,
    /// Return keys exactly as the gateway sends them.
    pub keep_keys: bool,
    /// Accept self-signed or otherwise invalid TLS certificates.
    pub insecure: bool,
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("auth_method", &self.auth_method)
            .field("keep_keys", &self.keep_keys)
            .field("insecure", &self.insecure)
            .finish()
    }
}

/// Per-session counters and nonces. Reset by `logOut`.
struct SessionState {
    id: String,
    server_nonce: String,
    request_id: i64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            id: "0".to_string(),
            server_nonce: String::new(),
            request_id: -1,
        }
    }
}

/// HTTP client for a single gateway session.
pub struct XmoClient {
    http: reqwest::Client,
    url: String,
    username: String,
    password_hash: String,
    auth_method: AuthMethod,
    keep_keys: bool,
    session: SessionState,
}

#[derive(Serialize)]
struct Envelope {
    request: RequestBody,
}

#[derive(Serialize)]
struct RequestBody {
    id: i64,
    #[serde(rename = "session-id")]
    session_id: String,
    priority: bool,
    actions: Vec<Value>,
    cnonce: u32,
    #[serde(rename = "auth-key")]
    auth_key: String,
}

#[derive(Deserialize)]
struct ResponseBody {
    reply: Reply,
}

#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    error: ReplyError,
    #[serde(default)]
    actions: Vec<ActionReply>,
}

#[derive(Debug, Deserialize, Default)]
struct ReplyError {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ActionReply {
    #[serde(default)]
    error: Option<ReplyError>,
    #[serde(default)]
    callbacks: Vec<Callback>,
}

#[derive(Debug, Deserialize)]
struct Callback {
    #[serde(default)]
    parameters: Value,
}

impl Reply {
    /// Parameters of the first callback of the first action.
    fn into_parameters(self) -> Result<Value, ClientError> {
        self.actions
            .into_iter()
            .next()
            .and_then(|a| a.callbacks.into_iter().next())
            .map(|c| c.parameters)
            .ok_or_else(|| ClientError::Protocol("reply carries no callback parameters".into()))
    }
}

impl XmoClient {
    /// Build a client for the gateway at `opts.host`. No request is sent
    /// until [`login`](Self::login).
    pub fn new(opts: ClientOptions) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(opts.insecure)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        let password_hash = opts.auth_method.digest(&opts.password);
        Ok(Self {
            http,
            url: format!("https://{}{}", opts.host, API_ENDPOINT),
            username: opts.username,
            password_hash,
            auth_method: opts.auth_method,
            keep_keys: opts.keep_keys,
            session: SessionState::default(),
        })
    }

    /// `logIn`: open a session. Must succeed before any get/set.
    pub async fn login(&mut self) -> Result<(), ClientError> {
        let action = json!({
            "method": "logIn",
            "parameters": {
                "user": self.username,
                "persistent": true,
                "session-options": {
                    "nss": [{"name": "gtw", "uri": "http://sagemcom.com/gateway-data"}],
                    "language": "ident",
                    "context-flags": {"get-content-name": true, "local-time": true},
                    "capability-depth": 2,
                    "capability-flags": {
                        "name": true,
                        "default-value": false,
                        "restriction": true,
                        "description": false
                    },
                    "time-format": "ISO_8601",
                    "write-only-string": "_XMO_WRITE_ONLY_",
                    "undefined-write-only-string": "_XMO_UNDEFINED_WRITE_ONLY_"
                }
            }
        });
        let reply = self.request(vec![action], true, "logIn").await?;
        self.apply_login(&reply.into_parameters()?)?;
        info!(url = %self.url, user = %self.username, "logged in");
        Ok(())
    }

    /// `logOut`: close the session and reset the request counter.
    pub async fn logout(&mut self) -> Result<(), ClientError> {
        let result = self
            .request(vec![json!({"method": "logOut"})], false, "logOut")
            .await;
        self.session = SessionState::default();
        result.map(|_| {
            info!(url = %self.url, "logged out");
        })
    }

    /// Take the session id and server nonce out of a `logIn` reply.
    fn apply_login(&mut self, parameters: &Value) -> Result<(), ClientError> {
        let id = parameters.get("id").and_then(scalar_to_string);
        let nonce = parameters.get("nonce").and_then(scalar_to_string);
        match (id, nonce) {
            (Some(id), Some(nonce)) => {
                self.session.id = id;
                self.session.server_nonce = nonce;
                Ok(())
            }
            _ => Err(ClientError::Authentication(format!(
                "login reply has no session: {parameters}"
            ))),
        }
    }

    /// Advance the request counter and build the signed envelope.
    fn next_envelope(&mut self, actions: Vec<Value>, priority: bool, cnonce: u32) -> Envelope {
        self.session.request_id += 1;
        Envelope {
            request: RequestBody {
                id: self.session.request_id,
                session_id: self.session.id.clone(),
                priority,
                actions,
                cnonce,
                auth_key: self.auth_key(cnonce),
            },
        }
    }

    /// `H(H(user:server_nonce:H(password)):request_id:cnonce:JSON:/cgi/json-req)`.
    fn auth_key(&self, cnonce: u32) -> String {
        let credential_hash = self.auth_method.digest(&format!(
            "{}:{}:{}",
            self.username, self.session.server_nonce, self.password_hash
        ));
        self.auth_method.digest(&format!(
            "{}:{}:{}:JSON:{}",
            credential_hash, self.session.request_id, cnonce, API_ENDPOINT
        ))
    }

    async fn request(
        &mut self,
        actions: Vec<Value>,
        priority: bool,
        context: &str,
    ) -> Result<Reply, ClientError> {
        let cnonce = rand::thread_rng().gen_range(0..CNONCE_LIMIT);
        let envelope = self.next_envelope(actions, priority, cnonce);
        debug!(
            request_id = envelope.request.id,
            session_id = %envelope.request.session_id,
            context,
            "sending XMO request"
        );
        let payload = serde_json::to_string(&envelope)
            .map_err(|e| ClientError::Protocol(format!("cannot encode request: {e}")))?;

        let resp = self
            .http
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(format!("req={payload}"))
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                message: body,
            });
        }
        decode_reply(&body, context)
    }
}

impl Gateway for XmoClient {
    async fn get_value(&mut self, xpath: &str) -> Result<Value, ClientError> {
        let action = json!({
            "id": 0,
            "method": "getValue",
            "xpath": encode_xpath(xpath),
            "options": {}
        });
        let reply = self.request(vec![action], false, xpath).await?;
        let value = reply
            .into_parameters()?
            .get("value")
            .cloned()
            .ok_or_else(|| ClientError::Protocol(format!("reply for {xpath} has no value")))?;
        Ok(if self.keep_keys {
            value
        } else {
            keys::decamelize_keys(value)
        })
    }

    async fn set_value(&mut self, xpath: &str, value: SetValue) -> Result<(), ClientError> {
        let action = json!({
            "id": 0,
            "method": "setValue",
            "xpath": encode_xpath(xpath),
            "parameters": {"value": value.to_string()},
            "options": {}
        });
        self.request(vec![action], false, xpath).await?;
        debug!(xpath, %value, "value set");
        Ok(())
    }
}

/// Percent-encode an XPath, leaving the `/` separators intact.
pub fn encode_xpath(xpath: &str) -> String {
    xpath
        .split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/")
}

fn scalar_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a reply body and turn gateway-reported errors into [`ClientError`].
fn decode_reply(body: &str, context: &str) -> Result<Reply, ClientError> {
    let parsed: ResponseBody = serde_json::from_str(body)
        .map_err(|e| ClientError::Protocol(format!("invalid JSON from gateway: {e}")))?;
    let reply = parsed.reply;

    match reply.error.description.as_str() {
        XMO_REQUEST_NO_ERR | "Ok" => Ok(reply),
        XMO_REQUEST_ACTION_ERR => {
            let failed = reply
                .actions
                .iter()
                .filter_map(|a| a.error.as_ref())
                .map(|e| e.description.as_str())
                .find(|d| *d != XMO_NO_ERR && !d.is_empty());
            match failed {
                Some(description) => Err(map_error(description, context)),
                None => Ok(reply),
            }
        }
        other => Err(map_error(other, context)),
    }
}

fn map_error(description: &str, context: &str) -> ClientError {
    match description {
        XMO_AUTHENTICATION_ERR => ClientError::Authentication(context.to_string()),
        XMO_INVALID_SESSION_ERR => ClientError::InvalidSession,
        XMO_ACCESS_RESTRICTION_ERR => ClientError::AccessRestricted(context.to_string()),
        XMO_NON_WRITABLE_PARAMETER_ERR => ClientError::NonWritableParameter(context.to_string()),
        XMO_UNKNOWN_PATH_ERR => ClientError::UnknownPath(context.to_string()),
        XMO_MAX_SESSION_COUNT_ERR => ClientError::MaxSessionCount,
        XMO_LOGIN_RETRY_ERR => ClientError::LoginRetry,
        other => ClientError::Gateway(format!("{other} ({context})")),
    }
}

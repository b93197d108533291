//! webOS TV client (SSAP over WebSocket)
//!
//! Newer models only accept `wss://<ip>:3001` with a self-signed
//! certificate; older ones speak plain `ws://<ip>:3000`.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_tungstenite::{
    connect_async_tls_with_config, tungstenite::Message, Connector, MaybeTlsStream,
    WebSocketStream,
};

use super::client::{
    DeviceClient, DeviceError, InputSource, PairingPrompt, PairingResult,
};
use super::pairing::PairingRecord;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const URI_LIST_INPUTS: &str = "ssap://tv/getExternalInputList";
const URI_FOREGROUND_APP: &str = "ssap://com.webos.applicationManager/getForegroundAppInfo";
const URI_SWITCH_INPUT: &str = "ssap://tv/switchInput";

const REGISTER_ID: &str = "register_0";

#[derive(Debug, Clone)]
pub struct WebOsOptions {
    pub address: String,
    pub secure: bool,
    pub request_timeout: Duration,
    pub pairing_timeout: Duration,
}

pub struct WebOsClient {
    options: WebOsOptions,
    socket: Option<Socket>,
    next_id: u64,
}

/// Outcome of one message received during registration
#[derive(Debug, PartialEq)]
enum RegisterEvent {
    Prompted,
    Registered(String),
    Rejected(String),
    Other,
}

impl WebOsClient {
    pub fn new(options: WebOsOptions) -> Self {
        Self {
            options,
            socket: None,
            next_id: 0,
        }
    }

    fn url(&self) -> String {
        if self.options.secure {
            format!("wss://{}:3001/", self.options.address)
        } else {
            format!("ws://{}:3000/", self.options.address)
        }
    }

    fn connector(&self) -> Result<Option<Connector>, DeviceError> {
        if !self.options.secure {
            return Ok(None);
        }

        // The TV ships a self-signed certificate
        let tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .map_err(|e| DeviceError::Connection(format!("TLS setup failed: {}", e)))?;

        Ok(Some(Connector::NativeTls(tls)))
    }

    fn socket(&mut self) -> Result<&mut Socket, DeviceError> {
        self.socket
            .as_mut()
            .ok_or_else(|| DeviceError::Connection("not connected".to_string()))
    }

    fn next_request_id(&mut self) -> String {
        self.next_id += 1;
        format!("req_{}", self.next_id)
    }

    async fn send(&mut self, message: Value) -> Result<(), DeviceError> {
        self.socket()?
            .send(Message::Text(message.to_string()))
            .await
            .map_err(|e| DeviceError::Connection(format!("send failed: {}", e)))
    }

    /// Next JSON message, or `None` once `deadline` passes
    async fn recv(&mut self, deadline: Instant) -> Result<Option<Value>, DeviceError> {
        let socket = self.socket()?;
        loop {
            let next = match tokio::time::timeout_at(deadline, socket.next()).await {
                Ok(next) => next,
                Err(_) => return Ok(None),
            };

            match next {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(&text)
                        .map(Some)
                        .map_err(|e| DeviceError::Protocol(format!("invalid JSON from TV: {}", e)));
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(DeviceError::Connection("TV closed the connection".to_string()));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(DeviceError::Connection(e.to_string())),
            }
        }
    }

    async fn request(&mut self, uri: &str, payload: Option<Value>) -> Result<Value, DeviceError> {
        let id = self.next_request_id();
        let mut message = json!({ "id": id, "type": "request", "uri": uri });
        if let Some(payload) = payload {
            message["payload"] = payload;
        }
        self.send(message).await?;

        let deadline = Instant::now() + self.options.request_timeout;
        loop {
            let reply = match self.recv(deadline).await? {
                Some(reply) => reply,
                None => return Err(DeviceError::Timeout(uri.to_string())),
            };
            if message_id(&reply) != Some(id.as_str()) {
                continue;
            }
            return response_payload(uri, reply);
        }
    }
}

#[async_trait]
impl DeviceClient for WebOsClient {
    async fn connect(&mut self) -> Result<(), DeviceError> {
        let url = self.url();
        let connector = self.connector()?;

        let connecting = connect_async_tls_with_config(url.clone(), None, false, connector);
        let socket = match tokio::time::timeout(self.options.request_timeout, connecting).await {
            Ok(Ok((socket, _response))) => socket,
            Ok(Err(e)) => {
                return Err(DeviceError::Connection(format!("{}: {}", url, e)));
            }
            Err(_) => {
                return Err(DeviceError::Connection(format!("{}: connect timed out", url)));
            }
        };

        tracing::info!("[Device] Connected to {}", url);
        self.socket = Some(socket);
        Ok(())
    }

    async fn pair(
        &mut self,
        mut record: PairingRecord,
        on_prompt: PairingPrompt<'_>,
    ) -> Result<(PairingResult, PairingRecord), DeviceError> {
        self.send(register_message(record.client_key())).await?;

        let deadline = Instant::now() + self.options.pairing_timeout;
        let mut prompted = false;
        loop {
            let message = match self.recv(deadline).await? {
                Some(message) => message,
                None => return Err(DeviceError::PairingTimeout(self.options.pairing_timeout)),
            };
            if message_id(&message) != Some(REGISTER_ID) {
                continue;
            }

            match classify_register(&message) {
                RegisterEvent::Prompted => {
                    prompted = true;
                    on_prompt();
                }
                RegisterEvent::Registered(key) => {
                    record.set_client_key(key);
                    let result = if prompted {
                        PairingResult::Confirmed
                    } else {
                        PairingResult::Registered
                    };
                    return Ok((result, record));
                }
                RegisterEvent::Rejected(reason) => {
                    return Err(DeviceError::PairingRejected(reason));
                }
                RegisterEvent::Other => {}
            }
        }
    }

    async fn list_sources(&mut self) -> Result<Vec<InputSource>, DeviceError> {
        let payload = self.request(URI_LIST_INPUTS, None).await?;
        parse_sources(&payload)
    }

    async fn current_application(&mut self) -> Result<String, DeviceError> {
        let payload = self.request(URI_FOREGROUND_APP, None).await?;
        payload
            .get("appId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DeviceError::Protocol("foreground app reply has no appId".to_string()))
    }

    async fn set_source(&mut self, source: &InputSource) -> Result<(), DeviceError> {
        self.request(URI_SWITCH_INPUT, Some(json!({ "inputId": source.id })))
            .await?;
        Ok(())
    }
}

// ============================================================================
// Message helpers
// ============================================================================

fn message_id(message: &Value) -> Option<&str> {
    message.get("id").and_then(Value::as_str)
}

fn message_type(message: &Value) -> Option<&str> {
    message.get("type").and_then(Value::as_str)
}

fn response_payload(uri: &str, reply: Value) -> Result<Value, DeviceError> {
    if message_type(&reply) == Some("error") {
        let reason = reply
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(DeviceError::Protocol(format!("{}: {}", uri, reason)));
    }

    let payload = reply.get("payload").cloned().unwrap_or(Value::Null);
    if payload.get("returnValue").and_then(Value::as_bool) == Some(false) {
        let reason = payload
            .get("errorText")
            .and_then(Value::as_str)
            .unwrap_or("request failed");
        return Err(DeviceError::Protocol(format!("{}: {}", uri, reason)));
    }

    Ok(payload)
}

fn parse_sources(payload: &Value) -> Result<Vec<InputSource>, DeviceError> {
    let devices = payload
        .get("devices")
        .cloned()
        .ok_or_else(|| DeviceError::Protocol("input list reply has no devices".to_string()))?;

    serde_json::from_value(devices)
        .map_err(|e| DeviceError::Protocol(format!("malformed input list: {}", e)))
}

fn classify_register(message: &Value) -> RegisterEvent {
    match message_type(message) {
        Some("response") => {
            let pairing_type = message
                .pointer("/payload/pairingType")
                .and_then(Value::as_str);
            if pairing_type == Some("PROMPT") {
                RegisterEvent::Prompted
            } else {
                RegisterEvent::Other
            }
        }
        Some("registered") => match message
            .pointer("/payload/client-key")
            .and_then(Value::as_str)
        {
            Some(key) => RegisterEvent::Registered(key.to_string()),
            None => RegisterEvent::Rejected("registered without a client key".to_string()),
        },
        Some("error") => RegisterEvent::Rejected(
            message
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("pairing refused")
                .to_string(),
        ),
        _ => RegisterEvent::Other,
    }
}

fn register_message(client_key: Option<&str>) -> Value {
    let mut payload = json!({
        "forcePairing": false,
        "pairingType": "PROMPT",
        "manifest": manifest(),
    });
    if let Some(key) = client_key {
        payload["client-key"] = Value::String(key.to_string());
    }

    json!({
        "id": REGISTER_ID,
        "type": "register",
        "payload": payload,
    })
}

fn manifest() -> Value {
    let permissions = json!([
        "LAUNCH",
        "LAUNCH_WEBAPP",
        "APP_TO_APP",
        "CONTROL_AUDIO",
        "CONTROL_INPUT_MEDIA_PLAYBACK",
        "CONTROL_POWER",
        "READ_INSTALLED_APPS",
        "READ_RUNNING_APPS",
        "READ_CURRENT_CHANNEL",
        "READ_INPUT_DEVICE_LIST",
        "READ_TV_CURRENT_TIME",
        "CONTROL_INPUT_TV",
        "READ_APP_STATUS",
        "READ_POWER_STATE",
    ]);

    json!({
        "manifestVersion": 1,
        "appVersion": "1.1",
        "permissions": permissions.clone(),
        "signed": {
            "appId": "com.lge.test",
            "vendorId": "com.lge",
            "created": "20140509",
            "localizedAppNames": { "": "PC Remote" },
            "localizedVendorNames": { "": "LG Electronics" },
            "permissions": permissions,
            "serial": "2f930e2d2cfe083771f68e4fe7bb07",
        },
    })
}

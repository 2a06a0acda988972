//! # ELM327 Adapter Session
//!
//! This module handles the serial side of a diagnostics session: opening the
//! port, the AT handshake that brings the adapter up, reading the negotiated
//! bus protocol, and the request/reply round trip that the session core
//! drives through [`AdapterTransport`].
//!
//! The session is generic over a [`SerialLink`] so tests can swap the real
//! port for scripted bytes; production code uses
//! [`Elm327::connect`] which opens a `tokio_serial::SerialStream`.

use crate::constants::{DEFAULT_BAUDRATE, ELM_CR, ELM_PROMPT};
use crate::error::Obd2Error;
use crate::obd2::protocol::{BusProtocol, Frame, Message};
use crate::obd2::status::ConnectionStatus;
use crate::obd2::transport::AdapterTransport;
use async_trait::async_trait;
use bytes::BytesMut;
use log::{debug, info, warn};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tokio_serial::SerialPortBuilderExt;

/// Marker trait for anything that can stand in for the serial port.
pub trait SerialLink: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> SerialLink for T {}

/// Configuration for the serial connection.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub baudrate: u32,
    /// Deadline for one reply (first byte to prompt).
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            baudrate: DEFAULT_BAUDRATE,
            timeout: Duration::from_secs(5),
        }
    }
}

/// An initialized ELM327 adapter session.
pub struct Elm327<L: SerialLink> {
    link: L,
    port_name: String,
    status: ConnectionStatus,
    protocol_id: String,
    protocol_name: String,
    config: SerialConfig,
}

impl Elm327<tokio_serial::SerialStream> {
    /// Open `port_name` and run the adapter handshake.
    ///
    /// `baudrate` defaults to 38400; `protocol_hint` pins the ELM to one bus
    /// protocol instead of auto-negotiation ("0").
    pub async fn connect(
        port_name: &str,
        baudrate: Option<u32>,
        protocol_hint: Option<&str>,
    ) -> Result<Self, Obd2Error> {
        let config = SerialConfig {
            baudrate: baudrate.unwrap_or(DEFAULT_BAUDRATE),
            ..SerialConfig::default()
        };

        let link = tokio_serial::new(port_name, config.baudrate)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .parity(tokio_serial::Parity::None)
            .timeout(config.timeout)
            .open_native_async()
            .map_err(|e| Obd2Error::SerialPort(e.to_string()))?;

        Self::initialize(link, port_name, protocol_hint, config).await
    }
}

impl<L: SerialLink> Elm327<L> {
    /// Run the adapter handshake over an already-open link.
    pub async fn initialize(
        link: L,
        port_name: &str,
        protocol_hint: Option<&str>,
        config: SerialConfig,
    ) -> Result<Self, Obd2Error> {
        let mut session = Elm327 {
            link,
            port_name: port_name.to_string(),
            status: ConnectionStatus::NotConnected,
            protocol_id: String::new(),
            protocol_name: String::new(),
            config,
        };
        session.handshake(protocol_hint).await?;
        Ok(session)
    }

    async fn handshake(&mut self, protocol_hint: Option<&str>) -> Result<(), Obd2Error> {
        // ATZ answers with a version banner, not OK
        let banner = self.at_command("ATZ").await?;
        debug!("Adapter reset: {}", banner.trim());

        self.at_ok("ATE0").await?; // echo off
        self.at_ok("ATL0").await?; // linefeeds off
        self.at_ok("ATH0").await?; // headers off
        self.at_ok("ATS0").await?; // spaces off

        let select = match protocol_hint {
            Some(p) => format!("ATSP{p}"),
            None => "ATSP0".to_string(),
        };
        self.at_ok(&select).await?;

        self.status = ConnectionStatus::ElmConnected;
        info!("Adapter handshake complete on {}", self.port_name);

        // Probe the vehicle bus. A missing car keeps the session at
        // ElmConnected; only hard link failures abort the handshake above.
        match self.transact(b"0100").await {
            Ok(messages) if messages.iter().any(|m| m.data.first() == Some(&0x41)) => {
                self.status = ConnectionStatus::CarConnected;
                info!("Vehicle bus responding");
            }
            Ok(_) => warn!("Vehicle did not answer the 0100 probe"),
            Err(e) => warn!("0100 probe failed: {e}"),
        }

        match self.read_protocol_number().await {
            Ok(id) => {
                self.protocol_name = BusProtocol::from_id(&id)
                    .map(|p| p.name().to_string())
                    .unwrap_or_default();
                info!("Bus protocol: {} ({})", self.protocol_name, id);
                self.protocol_id = id;
            }
            Err(e) => warn!("Could not read protocol number: {e}"),
        }

        Ok(())
    }

    /// `ATDPN` reports the negotiated protocol number, prefixed with `A`
    /// when it was auto-detected.
    async fn read_protocol_number(&mut self) -> Result<String, Obd2Error> {
        let reply = self.at_command("ATDPN").await?;
        let line = reply
            .split(['\r', '\n'])
            .map(str::trim)
            .find(|line| !line.is_empty() && *line != ">")
            .ok_or_else(|| Obd2Error::ResponseParse("empty ATDPN reply".to_string()))?;
        Ok(line.trim_start_matches('>').trim_start_matches('A').to_string())
    }

    async fn at_command(&mut self, command: &str) -> Result<String, Obd2Error> {
        self.write_request(command.as_bytes()).await?;
        self.read_until_prompt().await
    }

    async fn at_ok(&mut self, command: &str) -> Result<(), Obd2Error> {
        let reply = self.at_command(command).await?;
        if reply.contains("OK") {
            Ok(())
        } else {
            Err(Obd2Error::AtCommandFailed {
                command: command.to_string(),
                reply: reply.trim().to_string(),
            })
        }
    }

    /// One request/reply round trip: write the command plus CR, read to the
    /// prompt, parse the payload lines.
    async fn transact(&mut self, request: &[u8]) -> Result<Vec<Message>, Obd2Error> {
        if request.is_empty() {
            debug!("TX: <repeat last command>");
        } else {
            debug!("TX: {}", String::from_utf8_lossy(request));
        }
        self.write_request(request).await?;
        let text = self.read_until_prompt().await?;
        Ok(parse_reply(request, &text))
    }

    async fn write_request(&mut self, request: &[u8]) -> Result<(), Obd2Error> {
        let mut wire = Vec::with_capacity(request.len() + 1);
        wire.extend_from_slice(request);
        wire.push(ELM_CR);
        self.link
            .write_all(&wire)
            .await
            .map_err(|e| Obd2Error::SerialPort(e.to_string()))?;
        self.link
            .flush()
            .await
            .map_err(|e| Obd2Error::SerialPort(e.to_string()))
    }

    /// Accumulate reply bytes until the adapter's `>` prompt shows up.
    ///
    /// Reads are byte-wise on purpose: the prompt is the only framing the
    /// ELM327 provides, and reading past it would swallow the start of the
    /// next reply.
    async fn read_until_prompt(&mut self) -> Result<String, Obd2Error> {
        let mut buf = BytesMut::with_capacity(256);
        let mut byte = [0u8; 1];
        loop {
            let n = timeout(self.config.timeout, self.link.read(&mut byte))
                .await
                .map_err(|_| Obd2Error::Timeout)?
                .map_err(|e| Obd2Error::SerialPort(e.to_string()))?;
            if n == 0 {
                return Err(Obd2Error::SerialPort("link closed".to_string()));
            }
            if byte[0] == ELM_PROMPT {
                break;
            }
            buf.extend_from_slice(&byte);
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Split a raw reply into payload frames, dropping echoes and status words.
fn parse_reply(request: &[u8], text: &str) -> Vec<Message> {
    let mut frames = Vec::new();
    for line in text.split(['\r', '\n']) {
        let line = line.trim();
        if line.is_empty() || line.as_bytes() == request {
            continue;
        }
        if is_status_word(line) {
            debug!("adapter: {line}");
            continue;
        }
        match Frame::parse(line) {
            Some(frame) => frames.push(frame),
            None => debug!("dropping unparsable reply line {line:?}"),
        }
    }
    if frames.is_empty() {
        Vec::new()
    } else {
        vec![Message::new(frames)]
    }
}

fn is_status_word(line: &str) -> bool {
    matches!(
        line,
        "OK" | "NO DATA"
            | "SEARCHING..."
            | "UNABLE TO CONNECT"
            | "CAN ERROR"
            | "BUS INIT... ERROR"
            | "STOPPED"
            | "?"
    )
}

#[async_trait]
impl<L: SerialLink> AdapterTransport for Elm327<L> {
    fn status(&self) -> ConnectionStatus {
        self.status
    }

    fn protocol_id(&self) -> String {
        self.protocol_id.clone()
    }

    fn protocol_name(&self) -> String {
        self.protocol_name.clone()
    }

    fn port_name(&self) -> String {
        self.port_name.clone()
    }

    async fn send_and_parse(&mut self, request: &[u8]) -> Result<Vec<Message>, Obd2Error> {
        if self.status == ConnectionStatus::NotConnected {
            return Err(Obd2Error::NotConnected);
        }
        self.transact(request).await
    }

    async fn close(&mut self) {
        if self.status != ConnectionStatus::NotConnected {
            // best effort: put the adapter back into a known state before
            // dropping the port
            let _ = self.write_request(b"ATZ").await;
        }
        self.status = ConnectionStatus::NotConnected;
        self.protocol_id.clear();
        self.protocol_name.clear();
    }
}

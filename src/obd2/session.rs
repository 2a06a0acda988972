//! # The Diagnostics Session
//!
//! [`Obd2`] is the command-dispatch and response-reconstruction layer: it
//! owns the adapter transport and the session-scoped memo state, discovers
//! which commands the vehicle supports by decoding PID bitmap replies, turns
//! typed commands into request strings (with the fast-mode optimizations),
//! and runs single and batched queries.
//!
//! All state lives on the session object and is threaded through by
//! exclusive reference; two sessions never interfere. Failures on the public
//! query surface come back as null responses plus a logged warning, never as
//! errors.

use crate::constants::{
    is_can_protocol, MAX_BATCH_COMMANDS, MODE_CURRENT_DATA, MODE_FREEZE_FRAME, MODE_TEST_RESULTS,
};
use crate::obd2::command::{Command, CommandKey};
use crate::obd2::commands::registry;
use crate::obd2::elm327::Elm327;
use crate::obd2::protocol::Message;
use crate::obd2::response::{Response, Value};
use crate::obd2::status::ConnectionStatus;
use crate::obd2::transport::{scan_ports, AdapterTransport};
use log::{info, warn};
use std::collections::{HashMap, HashSet};

/// Options for establishing a session.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Explicit port; `None` scans for candidates.
    pub port: Option<String>,
    /// Serial baud rate; `None` uses the adapter default.
    pub baudrate: Option<u32>,
    /// ELM327 protocol number to pin instead of auto-negotiation.
    pub protocol: Option<String>,
    /// Global switch for the request-string optimizations.
    pub fast: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        ConnectOptions {
            port: None,
            baudrate: None,
            protocol: None,
            fast: true,
        }
    }
}

/// An OBD-II connection with its session-scoped state.
pub struct Obd2 {
    transport: Option<Box<dyn AdapterTransport>>,
    supported_commands: HashSet<Command>,
    fast: bool,
    /// The exact request bytes most recently transmitted.
    last_command: Vec<u8>,
    /// Observed reply-frame counts per command identity, populated on the
    /// first round trip and never before.
    frame_counts: HashMap<CommandKey, usize>,
}

impl Obd2 {
    /// Establish a session: select a port (explicit or scanned), bring the
    /// adapter up, and discover the vehicle's supported commands.
    ///
    /// Failure is signalled through [`Obd2::status`], not an error: a session
    /// that could not connect reports `NotConnected` and answers every query
    /// with a null response.
    pub async fn connect(options: ConnectOptions) -> Obd2 {
        let mut session = Obd2::empty(options.fast);
        session.attach_port(&options).await;

        // never hand back a half-open session
        if session.status() == ConnectionStatus::NotConnected {
            session.close().await;
            return session;
        }

        session.load_supported_commands().await;
        session
    }

    /// Build a session over an already-open transport.
    ///
    /// Used by tests and by callers with custom transports; discovery is not
    /// run automatically, call [`Obd2::load_supported_commands`].
    pub fn with_transport(transport: Box<dyn AdapterTransport>, fast: bool) -> Obd2 {
        let mut session = Obd2::empty(fast);
        session.transport = Some(transport);
        session
    }

    fn empty(fast: bool) -> Obd2 {
        Obd2 {
            transport: None,
            supported_commands: registry().base_commands().into_iter().cloned().collect(),
            fast,
            last_command: Vec::new(),
            frame_counts: HashMap::new(),
        }
    }

    async fn attach_port(&mut self, options: &ConnectOptions) {
        let baudrate = options.baudrate;
        let protocol = options.protocol.as_deref();

        if let Some(port) = &options.port {
            info!("Explicit port defined: {port}");
            self.try_port(port, baudrate, protocol).await;
            return;
        }

        let candidates = scan_ports();
        info!("Available ports: {candidates:?}");
        if candidates.is_empty() {
            warn!("No OBD-II adapters found");
            return;
        }

        for port in &candidates {
            info!("Attempting to use port: {port}");
            if self.try_port(port, baudrate, protocol).await
                && self.status() >= ConnectionStatus::ElmConnected
            {
                break;
            }
        }
    }

    async fn try_port(&mut self, port: &str, baudrate: Option<u32>, protocol: Option<&str>) -> bool {
        match Elm327::connect(port, baudrate, protocol).await {
            Ok(transport) => {
                self.transport = Some(Box::new(transport));
                true
            }
            Err(e) => {
                warn!("Failed to open {port}: {e}");
                false
            }
        }
    }

    /// Close the connection and clear all session state.
    ///
    /// Idempotent; safe to call on a session that never connected.
    pub async fn close(&mut self) {
        self.supported_commands.clear();
        self.frame_counts.clear();
        self.last_command.clear();

        if let Some(mut transport) = self.transport.take() {
            info!("Closing connection");
            transport.close().await;
        }
    }

    /// The current connection tier; `NotConnected` when no transport is held.
    pub fn status(&self) -> ConnectionStatus {
        self.transport
            .as_ref()
            .map(|t| t.status())
            .unwrap_or(ConnectionStatus::NotConnected)
    }

    /// Identifier of the bus protocol in use, empty when disconnected.
    pub fn protocol_id(&self) -> String {
        self.transport
            .as_ref()
            .map(|t| t.protocol_id())
            .unwrap_or_default()
    }

    /// Name of the bus protocol in use, empty when disconnected.
    pub fn protocol_name(&self) -> String {
        self.transport
            .as_ref()
            .map(|t| t.protocol_name())
            .unwrap_or_default()
    }

    /// Name of the connected port, empty when disconnected.
    pub fn port_name(&self) -> String {
        self.transport
            .as_ref()
            .map(|t| t.port_name())
            .unwrap_or_default()
    }

    /// Whether a connection with the vehicle (not just the adapter) is up.
    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::CarConnected
    }

    /// The commands the vehicle is known to support.
    pub fn supported_commands(&self) -> &HashSet<Command> {
        &self.supported_commands
    }

    /// Whether `cmd` is in the supported set.
    pub fn supports(&self, cmd: &Command) -> bool {
        self.supported_commands.contains(cmd)
    }

    /// Whether an unforced query would transmit `cmd`.
    ///
    /// False for commands outside the supported set, and for mode 06
    /// commands when the active bus protocol is not in the CAN family.
    pub fn test_cmd(&self, cmd: &Command, warn_user: bool) -> bool {
        if !self.supports(cmd) {
            if warn_user {
                warn!("'{cmd}' is not supported");
            }
            return false;
        }

        if cmd.mode == MODE_TEST_RESULTS && !is_can_protocol(&self.protocol_id()) {
            if warn_user {
                warn!("Mode 06 commands are only supported over CAN protocols");
            }
            return false;
        }

        true
    }

    /// Query the vehicle for the PIDs it supports and grow the supported set.
    ///
    /// Walks the registry's PID-listing commands in order; each decoded
    /// bitmap marks subsequent parameters as supported, and mode 01 hits are
    /// mirrored onto their mode 02 freeze-frame counterparts. The set only
    /// ever grows. Requires `CarConnected`; a warning and no-op otherwise.
    pub async fn load_supported_commands(&mut self) {
        if self.status() != ConnectionStatus::CarConnected {
            warn!("Cannot load commands: no connection to car");
            return;
        }

        info!("querying for supported commands");
        for getter in registry().pid_getters() {
            // the base listing command (mode 01 PID 00) is in the seed set;
            // later getters only pass this test once a bitmap marked them
            if !self.test_cmd(getter, false) {
                continue;
            }

            let response = self.query(getter, false).await;
            let Some(Value::Bits(bits)) = response.value else {
                info!("No valid data for PID listing command: {getter}");
                continue;
            };

            let base_pid = getter.pid.unwrap_or(0);
            for (i, bit) in bits.iter().enumerate() {
                if !bit {
                    continue;
                }
                let Some(pid) = base_pid.checked_add(i as u8 + 1) else {
                    continue;
                };

                if let Some(cmd) = registry().get(getter.mode, pid) {
                    self.supported_commands.insert(cmd.clone());
                }

                // freeze-frame availability mirrors live-data availability
                if getter.mode == MODE_CURRENT_DATA {
                    if let Some(cmd) = registry().get(MODE_FREEZE_FRAME, pid) {
                        self.supported_commands.insert(cmd.clone());
                    }
                }
            }
        }
        info!(
            "finished querying with {} commands supported",
            self.supported_commands.len()
        );
    }

    /// Assemble the request string for `cmd`.
    ///
    /// Fast mode appends the memoized reply-frame count (telling the adapter
    /// exactly how many frames to wait for) and then collapses an immediate
    /// repeat of the previous request into an empty string, which the
    /// transport turns into a bare CR. The collapse runs after the append so
    /// two requests differing only in a stale count still match. Memo state
    /// is read here and mutated only by [`Obd2::query`].
    fn build_command_string(&self, cmd: &Command) -> Vec<u8> {
        let mut request = cmd.request().to_vec();

        if self.fast && cmd.fast {
            if let Some(count) = self.frame_counts.get(&cmd.key()) {
                request.extend_from_slice(count.to_string().as_bytes());
            }
        }

        if self.fast && request == self.last_command {
            request.clear();
        }

        request
    }

    /// Send `cmd` to the vehicle and decode the reply.
    ///
    /// Unforced queries are gated on [`Obd2::test_cmd`]; `force` transmits
    /// regardless. Every failure path returns a null response.
    pub async fn query(&mut self, cmd: &Command, force: bool) -> Response {
        if self.status() == ConnectionStatus::NotConnected {
            warn!("Query failed, no connection available");
            return Response::null();
        }

        if !force && !self.test_cmd(cmd, true) {
            return Response::null();
        }

        info!("Sending command: {cmd}");
        let request = self.build_command_string(cmd);

        let Some(transport) = self.transport.as_mut() else {
            return Response::null();
        };
        let messages = match transport.send_and_parse(&request).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Query transmission failed: {e}");
                Vec::new()
            }
        };

        // an elided (empty) request means "same as before" and must not
        // overwrite the memo
        if !request.is_empty() {
            self.last_command = request;
        }

        // seed the frame-count memo on the first round trip for this
        // identity, even when the reply turns out to be null
        if !self.frame_counts.contains_key(&cmd.key()) {
            let frames = messages.iter().map(|m| m.frames.len()).sum();
            self.frame_counts.insert(cmd.key(), frames);
        }

        if messages.is_empty() {
            info!("No valid OBD messages returned");
            return Response::null();
        }

        cmd.decode(&messages)
    }

    /// Send up to six same-mode commands as one batched request (CAN only)
    /// and reassemble the concatenated reply into per-command responses.
    ///
    /// The combined reply carries no delimiters: each answer is attributed by
    /// peeking its leading PID byte and sliced by that command's expected
    /// reply length. An unattributable or truncated tail stops the walk;
    /// whatever was decoded is kept and every unreached command stays null.
    /// Precondition violations return an empty map without transmitting.
    pub async fn query_multi(&mut self, cmds: &[&Command], force: bool) -> HashMap<Command, Response> {
        if self.status() == ConnectionStatus::NotConnected {
            warn!("Query failed, no connection available");
            return HashMap::new();
        }
        if !is_can_protocol(&self.protocol_id()) {
            warn!("Multiple PID requests are only supported over CAN protocols");
            return HashMap::new();
        }
        if cmds.len() > MAX_BATCH_COMMANDS {
            warn!("Query failed, too many PIDs requested");
            return HashMap::new();
        }
        if cmds.is_empty() {
            warn!("Query failed, zero PIDs requested");
            return HashMap::new();
        }
        if !force && !cmds.iter().all(|cmd| self.test_cmd(cmd, true)) {
            return HashMap::new();
        }

        // one mode token on the wire; mixing modes is undefined behavior
        let mode = cmds[0].mode;
        if !cmds.iter().all(|cmd| cmd.mode == mode) {
            warn!("Commands for a batched query must share one mode");
            return HashMap::new();
        }

        let mut request = cmds[0].mode_token().to_vec();
        for cmd in cmds {
            request.extend_from_slice(cmd.pid_token());
        }

        info!("Sending batched command: {}", String::from_utf8_lossy(&request));
        let Some(transport) = self.transport.as_mut() else {
            return HashMap::new();
        };
        let messages = match transport.send_and_parse(&request).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Query transmission failed: {e}");
                Vec::new()
            }
        };

        if messages.is_empty() {
            info!("No valid OBD messages returned");
            return HashMap::new();
        }

        self.reassemble(cmds, &messages[0])
    }

    /// Split one combined reply message into per-command responses.
    fn reassemble(&self, cmds: &[&Command], carrier: &Message) -> HashMap<Command, Response> {
        // exactly one entry per requested command, null until decoded
        let mut responses: HashMap<Command, Response> = cmds
            .iter()
            .map(|cmd| ((*cmd).clone(), Response::null()))
            .collect();

        let cmds_by_pid: HashMap<u8, &Command> = cmds
            .iter()
            .filter_map(|cmd| cmd.pid.map(|pid| (pid, *cmd)))
            .collect();

        // the leading byte is the echoed mode token shared by every answer
        let Some((&reply_mode, answers)) = carrier.data.split_first() else {
            return responses;
        };

        let mut cursor = 0;
        while cursor < answers.len() {
            let pid = answers[cursor];
            let Some(cmd) = cmds_by_pid.get(&pid) else {
                info!("Unrequested PID answered: {pid:02X}; discarding remainder");
                break;
            };

            // expected length counts the PID byte we just peeked
            let n = cmd.bytes.saturating_sub(1);
            if cursor + 1 + n > answers.len() {
                info!("Combined reply truncated; stopping reassembly");
                break;
            }

            // reconstruct a self-contained single-command reply
            let mut data = Vec::with_capacity(n + 2);
            data.push(reply_mode);
            data.extend_from_slice(&answers[cursor..cursor + 1 + n]);
            let sub = Message::with_data(carrier.frames.clone(), data);

            responses.insert((*cmd).clone(), cmd.decode(&[sub]));
            cursor += 1 + n;
        }

        responses
    }
}

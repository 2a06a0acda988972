//! Mock transports for testing
//!
//! Two seams are mockable without hardware: [`MockTransport`] stands in for
//! the whole adapter at the [`AdapterTransport`] boundary (what the session
//! tests use), and [`ScriptedLink`] stands in for the raw serial port so the
//! ELM327 session itself can be exercised against scripted wire bytes.
//!
//! Both are cheaply cloneable handles over shared state, so a test can keep
//! one clone for inspection after moving the other into the code under test.

use crate::error::Obd2Error;
use crate::obd2::protocol::{Frame, Message};
use crate::obd2::status::ConnectionStatus;
use crate::obd2::transport::AdapterTransport;
use crate::util::hex::format_hex_compact;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

struct MockState {
    status: ConnectionStatus,
    protocol_id: String,
    port_name: String,
    sent: Vec<Vec<u8>>,
    replies: VecDeque<Vec<Message>>,
}

/// Scripted [`AdapterTransport`]: replies are consumed from a queue in FIFO
/// order, one per `send_and_parse` call; an empty queue answers with no
/// messages. Every transmitted request is logged for inspection.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// A transport that reports `CarConnected` on a CAN bus (protocol "6").
    pub fn car_connected() -> Self {
        Self::with_protocol(ConnectionStatus::CarConnected, "6")
    }

    pub fn with_protocol(status: ConnectionStatus, protocol_id: &str) -> Self {
        MockTransport {
            inner: Arc::new(Mutex::new(MockState {
                status,
                protocol_id: protocol_id.to_string(),
                port_name: "mock".to_string(),
                sent: Vec::new(),
                replies: VecDeque::new(),
            })),
        }
    }

    /// Queue one reply message built from frame payloads; `data` is their
    /// concatenation, exactly as the real transport derives it.
    pub fn queue_message(&self, frame_payloads: &[&[u8]]) {
        let frames = frame_payloads
            .iter()
            .map(|payload| Frame {
                raw: format_hex_compact(payload),
                data: payload.to_vec(),
            })
            .collect();
        self.queue_reply(vec![Message::new(frames)]);
    }

    /// Queue a reply with no messages (a `NO DATA` round trip).
    pub fn queue_empty(&self) {
        self.queue_reply(Vec::new());
    }

    /// Queue an arbitrary set of reply messages for one round trip.
    pub fn queue_reply(&self, messages: Vec<Message>) {
        self.inner.lock().unwrap().replies.push_back(messages);
    }

    /// Every request transmitted so far, in order.
    pub fn sent_requests(&self) -> Vec<Vec<u8>> {
        self.inner.lock().unwrap().sent.clone()
    }

    /// Change the reported status mid-test.
    pub fn set_status(&self, status: ConnectionStatus) {
        self.inner.lock().unwrap().status = status;
    }
}

#[async_trait]
impl AdapterTransport for MockTransport {
    fn status(&self) -> ConnectionStatus {
        self.inner.lock().unwrap().status
    }

    fn protocol_id(&self) -> String {
        self.inner.lock().unwrap().protocol_id.clone()
    }

    fn protocol_name(&self) -> String {
        "Mock".to_string()
    }

    fn port_name(&self) -> String {
        self.inner.lock().unwrap().port_name.clone()
    }

    async fn send_and_parse(&mut self, request: &[u8]) -> Result<Vec<Message>, Obd2Error> {
        let mut state = self.inner.lock().unwrap();
        state.sent.push(request.to_vec());
        Ok(state.replies.pop_front().unwrap_or_default())
    }

    async fn close(&mut self) {
        self.inner.lock().unwrap().status = ConnectionStatus::NotConnected;
    }
}

/// Scripted serial link: a byte-level mock implementing the async I/O traits,
/// for driving [`crate::obd2::elm327::Elm327`] without a port.
#[derive(Clone, Default)]
pub struct ScriptedLink {
    /// Bytes written by the code under test.
    tx: Arc<Mutex<Vec<u8>>>,
    /// Bytes queued for it to read.
    rx: Arc<Mutex<VecDeque<u8>>>,
}

impl ScriptedLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue adapter output, e.g. `"OK\r>"`.
    pub fn queue_reply(&self, text: &str) {
        self.rx.lock().unwrap().extend(text.bytes());
    }

    /// Everything written so far.
    pub fn sent(&self) -> Vec<u8> {
        self.tx.lock().unwrap().clone()
    }

    /// Everything written so far, as text.
    pub fn sent_text(&self) -> String {
        String::from_utf8_lossy(&self.sent()).into_owned()
    }
}

impl AsyncRead for ScriptedLink {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut rx = self.rx.lock().unwrap();
        let available = rx.len().min(buf.remaining());
        if available > 0 {
            let data: Vec<u8> = rx.drain(..available).collect();
            buf.put_slice(&data);
        }
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for ScriptedLink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.tx.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

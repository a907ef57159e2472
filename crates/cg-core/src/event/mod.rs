//! Typed pub/sub between vendor callbacks and terminal consumers.
//!
//! - [`Event`]: immutable `(event_type, payload)` envelope
//! - [`EventEngine`]: queue + dispatch thread + timer thread + handler registry
//! - [`GatewayEmitter`]: adapter-side helper that turns snapshots into events
//!
//! Event types are plain strings. Each snapshot event is published twice: once
//! under its generic type (`eTick.`) and once under the per-key type
//! (`eTick.600000.SSE`), so consumers can listen to everything or to one
//! instrument/order.

mod emitter;
mod engine;
mod registry;

use std::sync::Arc;

pub use emitter::GatewayEmitter;
pub use engine::{EventEngine, EventPublisher};
pub use registry::HandlerRegistry;

use crate::types::{
    AccountData, ContractData, LogData, OrderData, PositionData, TickData, TradeData,
};

pub const EVENT_TIMER: &str = "eTimer";
pub const EVENT_TICK: &str = "eTick.";
pub const EVENT_TRADE: &str = "eTrade.";
pub const EVENT_ORDER: &str = "eOrder.";
pub const EVENT_POSITION: &str = "ePosition.";
pub const EVENT_ACCOUNT: &str = "eAccount.";
pub const EVENT_CONTRACT: &str = "eContract.";
pub const EVENT_LOG: &str = "eLog";

/// Payload carried by an [`Event`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    None,
    Tick(TickData),
    Order(OrderData),
    Trade(TradeData),
    Account(AccountData),
    Position(PositionData),
    Contract(ContractData),
    Log(LogData),
}

/// An immutable event envelope.
///
/// The payload sits behind an `Arc` so one snapshot can be fanned out to the
/// generic and per-key event types, and to every handler, without copying.
#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: String,
    pub payload: Arc<EventPayload>,
}

impl Event {
    pub fn new(event_type: impl Into<String>, payload: EventPayload) -> Self {
        Self { event_type: event_type.into(), payload: Arc::new(payload) }
    }

    /// Event with no payload (e.g. the timer).
    pub fn signal(event_type: impl Into<String>) -> Self {
        Self::new(event_type, EventPayload::None)
    }

    pub fn tick(&self) -> Option<&TickData> {
        match &*self.payload {
            EventPayload::Tick(t) => Some(t),
            _ => None,
        }
    }

    pub fn order(&self) -> Option<&OrderData> {
        match &*self.payload {
            EventPayload::Order(o) => Some(o),
            _ => None,
        }
    }

    pub fn trade(&self) -> Option<&TradeData> {
        match &*self.payload {
            EventPayload::Trade(t) => Some(t),
            _ => None,
        }
    }

    pub fn account(&self) -> Option<&AccountData> {
        match &*self.payload {
            EventPayload::Account(a) => Some(a),
            _ => None,
        }
    }

    pub fn position(&self) -> Option<&PositionData> {
        match &*self.payload {
            EventPayload::Position(p) => Some(p),
            _ => None,
        }
    }

    pub fn contract(&self) -> Option<&ContractData> {
        match &*self.payload {
            EventPayload::Contract(c) => Some(c),
            _ => None,
        }
    }

    pub fn log(&self) -> Option<&LogData> {
        match &*self.payload {
            EventPayload::Log(l) => Some(l),
            _ => None,
        }
    }
}

/// A registered event consumer.
///
/// Identity (for de-duplication and unregistration) is the `Arc` pointer, so
/// keep the `Handler` returned by [`handler`] around if you intend to
/// unregister it later.
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Wrap a closure into a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    Arc::new(f)
}

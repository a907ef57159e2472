//! Adapter-side event helper.
//!
//! [`GatewayEmitter`] stamps the gateway name on log lines, publishes each
//! snapshot under its generic and per-key event types, and mirrors gateway
//! log events into `tracing`.

use chrono::Utc;
use tracing::{error, info, warn};

use super::{
    EVENT_ACCOUNT, EVENT_CONTRACT, EVENT_LOG, EVENT_ORDER, EVENT_POSITION, EVENT_TICK,
    EVENT_TRADE, Event, EventPayload, EventPublisher,
};
use crate::types::{
    AccountData, ContractData, LogData, LogLevel, OrderData, PositionData, TickData, TradeData,
};

/// Publishes gateway snapshots onto an [`EventEngine`](super::EventEngine).
#[derive(Clone)]
pub struct GatewayEmitter {
    gateway_name: String,
    publisher: EventPublisher,
}

impl GatewayEmitter {
    pub fn new(gateway_name: impl Into<String>, publisher: EventPublisher) -> Self {
        Self { gateway_name: gateway_name.into(), publisher }
    }

    pub fn gateway_name(&self) -> &str {
        &self.gateway_name
    }

    /// Publish one payload under `event_type` and, if given, under
    /// `event_type + key` too. Both events share the payload allocation.
    fn publish_keyed(&self, event_type: &str, key: Option<String>, payload: EventPayload) {
        let event = Event::new(event_type, payload);
        if let Some(key) = key {
            self.publisher.publish(Event {
                event_type: format!("{event_type}{key}"),
                payload: event.payload.clone(),
            });
        }
        self.publisher.publish(event);
    }

    pub fn on_tick(&self, tick: TickData) {
        let key = tick.vt_symbol();
        self.publish_keyed(EVENT_TICK, Some(key), EventPayload::Tick(tick));
    }

    pub fn on_trade(&self, trade: TradeData) {
        let key = trade.vt_symbol();
        self.publish_keyed(EVENT_TRADE, Some(key), EventPayload::Trade(trade));
    }

    pub fn on_order(&self, order: OrderData) {
        let key = order.vt_orderid();
        self.publish_keyed(EVENT_ORDER, Some(key), EventPayload::Order(order));
    }

    pub fn on_position(&self, position: PositionData) {
        let key = position.vt_symbol();
        self.publish_keyed(EVENT_POSITION, Some(key), EventPayload::Position(position));
    }

    pub fn on_account(&self, account: AccountData) {
        let key = account.vt_accountid();
        self.publish_keyed(EVENT_ACCOUNT, Some(key), EventPayload::Account(account));
    }

    pub fn on_contract(&self, contract: ContractData) {
        self.publish_keyed(EVENT_CONTRACT, None, EventPayload::Contract(contract));
    }

    pub fn write_log(&self, msg: impl Into<String>) {
        self.log(LogLevel::Info, msg.into());
    }

    pub fn warn_log(&self, msg: impl Into<String>) {
        self.log(LogLevel::Warn, msg.into());
    }

    pub fn error_log(&self, msg: impl Into<String>) {
        self.log(LogLevel::Error, msg.into());
    }

    fn log(&self, level: LogLevel, msg: String) {
        match level {
            LogLevel::Info => info!("[{}] {msg}", self.gateway_name),
            LogLevel::Warn => warn!("[{}] {msg}", self.gateway_name),
            LogLevel::Error => error!("[{}] {msg}", self.gateway_name),
        }
        let log = LogData { level, msg, time: Utc::now(), gateway_name: self.gateway_name.clone() };
        self.publisher.publish(Event::new(EVENT_LOG, EventPayload::Log(log)));
    }
}

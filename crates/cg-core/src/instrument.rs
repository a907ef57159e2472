//! Bidirectional instrument mapping between vendor handles and terminal
//! `(symbol, exchange)` pairs.
//!
//! The vendor identifies instruments by an opaque integer handle, while the
//! terminal speaks in symbols. [`InstrumentRegistry`] holds three lookups
//! (handle -> pair, pair -> handle, handle -> display name) that are filled
//! once during discovery and read from every callback thread afterwards.
//!
//! All three maps live behind one `RwLock` and are written together, so a
//! reader observes an instrument either fully registered or not at all.
//! [`mark_ready`](InstrumentRegistry::mark_ready) is the completion barrier
//! published after the last discovery segment has been processed.

use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{GatewayError, Result};
use crate::types::{Exchange, vt_symbol};

/// Vendor-assigned opaque instrument key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentHandle(pub u64);

impl std::fmt::Display for InstrumentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Maps {
    by_handle: AHashMap<InstrumentHandle, (String, Exchange)>,
    by_symbol: AHashMap<(String, Exchange), InstrumentHandle>,
    names: AHashMap<InstrumentHandle, String>,
}

/// Explicitly owned registry shared by the trade and quote adapters.
///
/// Construct one per gateway and inject it (`Arc<InstrumentRegistry>`) into
/// both adapters.
#[derive(Debug, Default)]
pub struct InstrumentRegistry {
    maps: RwLock<Maps>,
    ready: AtomicBool,
}

impl InstrumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one instrument.
    ///
    /// Returns `false` (and logs a warning) if the handle or the symbol pair
    /// is already registered; the existing entry is kept untouched.
    pub fn insert(
        &self,
        handle: InstrumentHandle,
        symbol: &str,
        exchange: Exchange,
        name: &str,
    ) -> bool {
        let mut maps = self.maps.write().unwrap_or_else(|e| e.into_inner());
        let key = (symbol.to_string(), exchange);

        if maps.by_handle.contains_key(&handle) || maps.by_symbol.contains_key(&key) {
            warn!(
                "[instrument] duplicate discovery for handle={handle} {} ignored",
                vt_symbol(symbol, exchange)
            );
            return false;
        }

        maps.by_handle.insert(handle, key.clone());
        maps.by_symbol.insert(key, handle);
        maps.names.insert(handle, name.to_string());
        true
    }

    /// Handle -> `(symbol, exchange)`.
    pub fn resolve_by_handle(&self, handle: InstrumentHandle) -> Result<(String, Exchange)> {
        let maps = self.maps.read().unwrap_or_else(|e| e.into_inner());
        maps.by_handle
            .get(&handle)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("instrument handle {handle}")))
    }

    /// `(symbol, exchange)` -> handle.
    pub fn resolve_by_symbol(&self, symbol: &str, exchange: Exchange) -> Result<InstrumentHandle> {
        let maps = self.maps.read().unwrap_or_else(|e| e.into_inner());
        maps.by_symbol
            .get(&(symbol.to_string(), exchange))
            .copied()
            .ok_or_else(|| GatewayError::NotFound(format!("instrument {}", vt_symbol(symbol, exchange))))
    }

    /// Display name for a handle, if discovered.
    pub fn name(&self, handle: InstrumentHandle) -> Option<String> {
        let maps = self.maps.read().unwrap_or_else(|e| e.into_inner());
        maps.names.get(&handle).cloned()
    }

    /// Publish the discovery-complete barrier.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Whether every discovery segment has been processed.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Returns the number of instruments currently registered.
    pub fn len(&self) -> usize {
        self.maps.read().unwrap_or_else(|e| e.into_inner()).by_handle.len()
    }

    /// Returns `true` if nothing has been discovered yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn basic_round_trip() {
        let reg = InstrumentRegistry::new();
        assert!(reg.insert(InstrumentHandle(7), "600000", Exchange::Sse, "PF Bank"));
        assert_eq!(
            reg.resolve_by_handle(InstrumentHandle(7)).unwrap(),
            ("600000".to_string(), Exchange::Sse)
        );
        assert_eq!(reg.resolve_by_symbol("600000", Exchange::Sse).unwrap(), InstrumentHandle(7));
        assert_eq!(reg.name(InstrumentHandle(7)).as_deref(), Some("PF Bank"));
    }

    #[test]
    fn lookup_before_discovery_is_not_found() {
        let reg = InstrumentRegistry::new();
        assert!(matches!(
            reg.resolve_by_symbol("IF2412", Exchange::Cffex),
            Err(GatewayError::NotFound(_))
        ));
        assert!(matches!(reg.resolve_by_handle(InstrumentHandle(1)), Err(GatewayError::NotFound(_))));
        assert!(!reg.is_ready());
    }

    #[test]
    fn same_symbol_on_other_exchange_is_distinct() {
        let reg = InstrumentRegistry::new();
        assert!(reg.insert(InstrumentHandle(1), "000001", Exchange::Szse, "Ping An Bank"));
        assert!(reg.insert(InstrumentHandle(2), "000001", Exchange::Sse, "SSE Composite"));
        assert_eq!(reg.resolve_by_symbol("000001", Exchange::Sse).unwrap(), InstrumentHandle(2));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn duplicate_discovery_keeps_first_entry() {
        let reg = InstrumentRegistry::new();
        assert!(reg.insert(InstrumentHandle(5), "rb2501", Exchange::Shfe, "rebar"));
        assert!(!reg.insert(InstrumentHandle(5), "rb2505", Exchange::Shfe, "rebar 2505"));
        assert!(!reg.insert(InstrumentHandle(6), "rb2501", Exchange::Shfe, "rebar again"));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.name(InstrumentHandle(5)).as_deref(), Some("rebar"));
    }

    #[test]
    fn concurrent_readers_see_whole_entries() {
        let reg = Arc::new(InstrumentRegistry::new());
        let writer = {
            let reg = Arc::clone(&reg);
            std::thread::spawn(move || {
                for i in 0..500u64 {
                    reg.insert(InstrumentHandle(i), &format!("S{i}"), Exchange::Szse, "n");
                }
                reg.mark_ready();
            })
        };
        let reader = {
            let reg = Arc::clone(&reg);
            std::thread::spawn(move || {
                for i in 0..500u64 {
                    // Either both directions resolve or neither does.
                    if let Ok((sym, ex)) = reg.resolve_by_handle(InstrumentHandle(i)) {
                        assert_eq!(reg.resolve_by_symbol(&sym, ex).unwrap(), InstrumentHandle(i));
                        assert!(reg.name(InstrumentHandle(i)).is_some());
                    }
                }
            })
        };
        writer.join().unwrap();
        reader.join().unwrap();
        assert!(reg.is_ready());
        assert_eq!(reg.len(), 500);
    }
}

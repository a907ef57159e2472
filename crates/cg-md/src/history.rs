//! Blocking historical bar queries over the vendor's paged callbacks.
//!
//! [`HistoryBridge::query`] parks the caller until every page of a k-line
//! request has arrived on the vendor callback thread, the vendor reports an
//! error, or the configured deadline passes. Only one query may be in
//! flight; a second caller gets [`GatewayError::Busy`].

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use cg_core::error::Result;
use cg_core::types::vendor::RspCode;
use cg_core::units::{datetime_from_us, price_from_vendor};
use cg_core::{BarData, GatewayError, HistoryRequest};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use tracing::{debug, warn};

use crate::vendor::MdKLine;

/// The one in-flight query.
struct PendingQuery {
    request: HistoryRequest,
    request_id: u64,
    buffer: Vec<BarData>,
    done_tx: Sender<Result<Vec<BarData>>>,
}

impl PendingQuery {
    fn decode(&self, bar: &MdKLine, gateway_name: &str) -> BarData {
        BarData {
            symbol: self.request.symbol.clone(),
            exchange: self.request.exchange,
            datetime: datetime_from_us(bar.timeus),
            interval: self.request.interval,
            volume: bar.volume as f64,
            open_price: price_from_vendor(bar.open),
            high_price: price_from_vendor(bar.high),
            low_price: price_from_vendor(bar.low),
            close_price: price_from_vendor(bar.close),
            gateway_name: gateway_name.to_string(),
        }
    }
}

/// Single-slot rendezvous between a blocking caller and paged callbacks.
pub struct HistoryBridge {
    gateway_name: String,
    /// `None` waits forever.
    timeout: Option<Duration>,
    slot: Mutex<Option<PendingQuery>>,
}

impl HistoryBridge {
    pub fn new(gateway_name: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self { gateway_name: gateway_name.into(), timeout, slot: Mutex::new(None) }
    }

    /// Register `request` under `request_id`, run `issue` to send the vendor
    /// request, then block for the assembled bars.
    ///
    /// The slot is always empty again when this returns.
    pub fn query<F>(&self, request: HistoryRequest, request_id: u64, issue: F) -> Result<Vec<BarData>>
    where
        F: FnOnce() -> Result<()>,
    {
        let (done_tx, done_rx) = bounded(1);
        {
            let mut slot = self.lock();
            if let Some(pending) = slot.as_ref() {
                return Err(GatewayError::Busy(format!(
                    "history query {} still in flight",
                    pending.request_id
                )));
            }
            *slot = Some(PendingQuery { request, request_id, buffer: Vec::new(), done_tx });
        }

        if let Err(err) = issue() {
            self.take_if(request_id);
            return Err(err);
        }
        self.wait(request_id, &done_rx)
    }

    fn wait(&self, request_id: u64, done_rx: &Receiver<Result<Vec<BarData>>>) -> Result<Vec<BarData>> {
        let Some(timeout) = self.timeout else {
            return done_rx.recv().unwrap_or_else(|_| {
                self.take_if(request_id);
                Err(GatewayError::Connection("history query abandoned".into()))
            });
        };

        match done_rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                if self.take_if(request_id) {
                    warn!("[cg-md] history query {request_id} timed out after {timeout:?}");
                    return Err(GatewayError::Timeout(timeout));
                }
                // Completed between the deadline and taking the slot.
                done_rx.try_recv().unwrap_or(Err(GatewayError::Timeout(timeout)))
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.take_if(request_id);
                Err(GatewayError::Connection("history query abandoned".into()))
            }
        }
    }

    /// Feed one page of k-line results.
    ///
    /// Pages for any request id other than the pending one are dropped. A
    /// non-zero result code fails the pending query immediately, discarding
    /// bars already buffered; the error is also returned to the caller.
    pub fn on_page(
        &self,
        rsp: RspCode,
        bars: &[MdKLine],
        request_id: u64,
        page_num: u32,
        page_cur: u32,
    ) -> Result<()> {
        let mut slot = self.lock();
        let Some(pending) = slot.as_mut().filter(|p| p.request_id == request_id) else {
            warn!("[cg-md] stale history page {page_cur}/{page_num} for request {request_id} dropped");
            return Ok(());
        };

        if let Err(err) = rsp.into_result() {
            if let Some(pending) = slot.take() {
                let _ = pending.done_tx.try_send(Err(err.clone()));
            }
            return Err(err);
        }

        let decoded: Vec<BarData> = bars.iter().map(|b| pending.decode(b, &self.gateway_name)).collect();
        pending.buffer.extend(decoded);
        debug!(
            "[cg-md] history {request_id} page {page_cur}/{page_num}: {} bars buffered",
            pending.buffer.len()
        );

        if page_cur >= page_num
            && let Some(pending) = slot.take()
        {
            let _ = pending.done_tx.try_send(Ok(pending.buffer));
        }
        Ok(())
    }

    /// Fail the pending query, if any.
    pub fn cancel(&self, err: GatewayError) {
        if let Some(pending) = self.lock().take() {
            debug!("[cg-md] history query {} cancelled: {err}", pending.request_id);
            let _ = pending.done_tx.try_send(Err(err));
        }
    }

    pub fn is_pending(&self) -> bool {
        self.lock().is_some()
    }

    /// Clear the slot if it still holds `request_id`.
    fn take_if(&self, request_id: u64) -> bool {
        let mut slot = self.lock();
        if slot.as_ref().is_some_and(|p| p.request_id == request_id) {
            *slot = None;
            true
        } else {
            false
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<PendingQuery>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Instant;

    use chrono::{TimeZone, Utc};
    use cg_core::{Exchange, InstrumentHandle, Interval};

    use super::*;

    fn request() -> HistoryRequest {
        HistoryRequest {
            symbol: "600000".into(),
            exchange: Exchange::Sse,
            start: Utc.with_ymd_and_hms(2024, 3, 1, 1, 30, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap(),
            interval: Interval::Minute,
        }
    }

    fn page(n: usize, first_minute: i64) -> Vec<MdKLine> {
        (0..n as i64)
            .map(|i| MdKLine {
                ukey: InstrumentHandle(1001),
                timeus: (1_709_256_600 + (first_minute + i) * 60) * 1_000_000,
                open: 101_000,
                high: 101_500,
                low: 100_500,
                close: 101_200,
                volume: 1_000,
            })
            .collect()
    }

    fn wait_pending(bridge: &HistoryBridge) {
        let start = Instant::now();
        while !bridge.is_pending() {
            assert!(start.elapsed() < Duration::from_secs(5), "query never registered");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn two_pages_assembled_in_order() {
        let bridge = HistoryBridge::new("CHRONOS", Some(Duration::from_secs(5)));
        let bars = thread::scope(|s| {
            let caller = s.spawn(|| bridge.query(request(), 11, || Ok(())));
            wait_pending(&bridge);
            bridge.on_page(RspCode::ok(), &page(100, 0), 11, 2, 1).unwrap();
            bridge.on_page(RspCode::ok(), &page(50, 100), 11, 2, 2).unwrap();
            caller.join().unwrap()
        })
        .unwrap();

        assert_eq!(bars.len(), 150);
        assert!(bars.windows(2).all(|w| w[0].datetime < w[1].datetime));
        assert_eq!(bars[0].close_price, 10.12);
        assert_eq!(bars[0].interval, Interval::Minute);
        assert!(!bridge.is_pending());
    }

    #[test]
    fn pages_delivered_during_issue_are_kept() {
        let bridge = HistoryBridge::new("CHRONOS", Some(Duration::from_secs(5)));
        let bars = bridge
            .query(request(), 3, || bridge.on_page(RspCode::ok(), &page(10, 0), 3, 1, 1))
            .unwrap();
        assert_eq!(bars.len(), 10);
    }

    #[test]
    fn vendor_error_fails_without_hanging() {
        let bridge = HistoryBridge::new("CHRONOS", None);
        let err = thread::scope(|s| {
            let caller = s.spawn(|| bridge.query(request(), 12, || Ok(())));
            wait_pending(&bridge);
            assert!(bridge.on_page(RspCode::error(-1017, ""), &[], 12, 0, 0).is_err());
            caller.join().unwrap()
        })
        .unwrap_err();

        assert_eq!(err, GatewayError::vendor(-1017));
        assert!(!bridge.is_pending());
    }

    #[test]
    fn error_after_partial_pages_discards_them() {
        let bridge = HistoryBridge::new("CHRONOS", Some(Duration::from_secs(5)));
        let result = bridge.query(request(), 4, || {
            bridge.on_page(RspCode::ok(), &page(100, 0), 4, 3, 1)?;
            let _ = bridge.on_page(RspCode::error(-1005, "send failed"), &[], 4, 3, 2);
            Ok(())
        });
        assert!(matches!(result, Err(GatewayError::Vendor { code: -1005, .. })));
    }

    #[test]
    fn deadline_clears_slot() {
        let bridge = HistoryBridge::new("CHRONOS", Some(Duration::from_millis(50)));
        let err = bridge.query(request(), 5, || Ok(())).unwrap_err();
        assert_eq!(err, GatewayError::Timeout(Duration::from_millis(50)));
        assert!(!bridge.is_pending());
        // A late page for the expired request is ignored.
        bridge.on_page(RspCode::ok(), &page(5, 0), 5, 1, 1).unwrap();
        assert!(!bridge.is_pending());
    }

    #[test]
    fn concurrent_query_rejected_busy() {
        let bridge = HistoryBridge::new("CHRONOS", None);
        thread::scope(|s| {
            let first = s.spawn(|| bridge.query(request(), 21, || Ok(())));
            wait_pending(&bridge);

            let second = bridge.query(request(), 22, || panic!("second query must not be issued"));
            assert!(matches!(second, Err(GatewayError::Busy(_))));

            bridge.on_page(RspCode::ok(), &page(1, 0), 21, 1, 1).unwrap();
            assert_eq!(first.join().unwrap().unwrap().len(), 1);
        });
    }

    #[test]
    fn stale_request_id_ignored() {
        let bridge = HistoryBridge::new("CHRONOS", Some(Duration::from_secs(5)));
        let bars = bridge
            .query(request(), 9, || {
                bridge.on_page(RspCode::ok(), &page(7, 0), 8, 1, 1)?;
                assert!(bridge.is_pending());
                bridge.on_page(RspCode::ok(), &page(2, 0), 9, 1, 1)
            })
            .unwrap();
        assert_eq!(bars.len(), 2);
    }

    #[test]
    fn failed_issue_frees_slot() {
        let bridge = HistoryBridge::new("CHRONOS", None);
        let err = bridge.query(request(), 1, || Err(GatewayError::vendor(-1004))).unwrap_err();
        assert_eq!(err, GatewayError::vendor(-1004));
        assert!(!bridge.is_pending());
    }

    #[test]
    fn cancel_releases_waiter() {
        let bridge = HistoryBridge::new("CHRONOS", None);
        let err = thread::scope(|s| {
            let caller = s.spawn(|| bridge.query(request(), 31, || Ok(())));
            wait_pending(&bridge);
            bridge.cancel(GatewayError::Connection("quote server disconnected".into()));
            caller.join().unwrap()
        })
        .unwrap_err();
        assert!(matches!(err, GatewayError::Connection(_)));
    }
}

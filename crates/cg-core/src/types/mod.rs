//! Core data types: domain enums, market data and trading snapshots, and
//! the handful of vendor structs shared by both adapters.

pub mod enums;
pub mod market_data;
pub mod trading;
pub mod vendor;

pub use enums::*;
pub use market_data::*;
pub use trading::*;

/// Compose the `"<symbol>.<exchange>"` key used across the event stream.
#[inline]
pub fn vt_symbol(symbol: &str, exchange: Exchange) -> String {
    format!("{symbol}.{exchange}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vt_symbol_format() {
        assert_eq!(vt_symbol("600000", Exchange::Sse), "600000.SSE");
        assert_eq!(vt_symbol("IF2412", Exchange::Cffex), "IF2412.CFFEX");
    }

    #[test]
    fn status_activity() {
        assert!(Status::Submitting.is_active());
        assert!(Status::PartTraded.is_active());
        assert!(!Status::AllTraded.is_active());
        assert!(!Status::Rejected.is_active());
    }

    #[test]
    fn optimistic_order_is_submitting() {
        let req = OrderRequest {
            symbol: "600000".into(),
            exchange: Exchange::Sse,
            direction: Direction::Long,
            order_type: OrderType::Limit,
            volume: 100.0,
            price: 10.5,
            offset: Offset::None,
            reference: "grid".into(),
        };
        let order = req.create_order_data("7.1".into(), "CHRONOS");
        assert_eq!(order.status, Status::Submitting);
        assert_eq!(order.traded, 0.0);
        assert_eq!(order.vt_orderid(), "CHRONOS.7.1");
        assert_eq!(order.vt_symbol(), "600000.SSE");
    }
}

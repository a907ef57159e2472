//! Market segment and instrument category tables.

use cg_core::{Exchange, Product};

use crate::vendor::{MarketType, Variety};

pub fn exchange_from_market(market: MarketType) -> Exchange {
    match market {
        MarketType::Cfe => Exchange::Cffex,
        MarketType::Shf => Exchange::Shfe,
        MarketType::Czc => Exchange::Czce,
        MarketType::Dce => Exchange::Dce,
        MarketType::Sha => Exchange::Sse,
        MarketType::Sza => Exchange::Szse,
    }
}

pub fn market_from_exchange(exchange: Exchange) -> MarketType {
    match exchange {
        Exchange::Cffex => MarketType::Cfe,
        Exchange::Shfe => MarketType::Shf,
        Exchange::Czce => MarketType::Czc,
        Exchange::Dce => MarketType::Dce,
        Exchange::Sse => MarketType::Sha,
        Exchange::Szse => MarketType::Sza,
    }
}

/// Money-market instruments are reported as bonds, stock options as
/// options. The query wildcard falls back to equity.
pub fn product_from_variety(variety: Variety) -> Product {
    match variety {
        Variety::All | Variety::Stock => Product::Equity,
        Variety::Bond | Variety::MoneyMarket => Product::Bond,
        Variety::Fund => Product::Fund,
        Variety::Spot => Product::Spot,
        Variety::Index => Product::Index,
        Variety::Future => Product::Futures,
        Variety::Option | Variety::StockOption => Product::Option,
        Variety::Warrant => Product::Warrant,
    }
}

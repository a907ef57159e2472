//! Translation tables between vendor codes and domain enums.

use cg_core::{Direction, Offset, OrderType, Status};

use crate::vendor::{DirectiveType, ExecutionType, OffsetFlagType, OrderStatusCode, PositionDirection};

/// Vendor lifecycle code -> domain status.
///
/// Every pre-acknowledgement and in-flight cancel code is reported as
/// `Submitting`; only the exchange acknowledgement moves an order to
/// `NotTraded`.
pub fn status_from_vendor(code: OrderStatusCode) -> Status {
    use OrderStatusCode::*;
    match code {
        NotApproved | NotReported | WaitReporting | Canceling | MatchedCanceling => {
            Status::Submitting
        }
        Reported => Status::NotTraded,
        PartMatched => Status::PartTraded,
        MatchedAll => Status::AllTraded,
        Canceled | MatchedCanceled => Status::Cancelled,
        Bad | RiskBlocked => Status::Rejected,
    }
}

pub fn direction_from_directive(directive: DirectiveType) -> Direction {
    match directive {
        DirectiveType::Buy => Direction::Long,
        DirectiveType::Sell => Direction::Short,
    }
}

pub fn directive_from_direction(direction: Direction) -> DirectiveType {
    match direction {
        Direction::Long => DirectiveType::Buy,
        Direction::Short => DirectiveType::Sell,
    }
}

pub fn direction_from_position(direction: PositionDirection) -> Direction {
    match direction {
        PositionDirection::Long => Direction::Long,
        PositionDirection::Short => Direction::Short,
    }
}

pub fn offset_from_vendor(flag: OffsetFlagType) -> Offset {
    match flag {
        OffsetFlagType::None => Offset::None,
        OffsetFlagType::Open => Offset::Open,
        OffsetFlagType::Close => Offset::Close,
        OffsetFlagType::CloseToday => Offset::CloseToday,
        OffsetFlagType::CloseYesterday => Offset::CloseYesterday,
    }
}

pub fn offset_to_vendor(offset: Offset) -> OffsetFlagType {
    match offset {
        Offset::None => OffsetFlagType::None,
        Offset::Open => OffsetFlagType::Open,
        Offset::Close => OffsetFlagType::Close,
        Offset::CloseToday => OffsetFlagType::CloseToday,
        Offset::CloseYesterday => OffsetFlagType::CloseYesterday,
    }
}

pub fn order_type_from_vendor(execution: ExecutionType) -> OrderType {
    match execution {
        ExecutionType::Limit => OrderType::Limit,
        ExecutionType::AnyPrice => OrderType::Market,
    }
}

pub fn order_type_to_vendor(order_type: OrderType) -> ExecutionType {
    match order_type {
        OrderType::Limit => ExecutionType::Limit,
        OrderType::Market => ExecutionType::AnyPrice,
    }
}

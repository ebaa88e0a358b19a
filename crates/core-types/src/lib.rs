pub mod enums;
pub mod error;
pub mod params;
pub mod structs;

pub use enums::{OrderSide, OrderType, TradeSignal};
pub use error::CoreError;
pub use params::{ParamEntry, ParamSpec, ParamValue, StrategyParams, TargetParams};
pub use structs::{Lot, OrderId, PendingOrder, PricePoint, PriceSeries};

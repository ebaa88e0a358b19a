use crate::error::{ExchangeError, MarketError};
use crate::ledger::{self, Fill};
use crate::Market;
use chrono::{DateTime, Utc};
use core_types::{OrderId, OrderSide, PendingOrder};
use rust_decimal::Decimal;
use tracing::{info, warn};

/// A signed connection to a real venue.
///
/// Implementations own transport and credentials. Every method reports venue or
/// transport problems as an [`ExchangeError`]; a plain refusal of an order is `Ok(false)`.
pub trait ExchangeClient: Send {
    /// Last traded price.
    fn ticker(&self) -> Result<Decimal, ExchangeError>;

    fn send_market_order(&mut self, side: OrderSide, size: Decimal) -> Result<bool, ExchangeError>;

    fn send_limit_order(
        &mut self,
        side: OrderSide,
        size: Decimal,
        price: Decimal,
    ) -> Result<bool, ExchangeError>;

    fn active_orders(&self) -> Result<Vec<PendingOrder>, ExchangeError>;

    fn cancel_order(&mut self, id: OrderId) -> Result<bool, ExchangeError>;

    /// Completed fills of this account, in any order.
    fn fills(&self) -> Result<Vec<Fill>, ExchangeError>;
}

/// The live venue adapter. It implements the same `Market` contract as the simulator,
/// so trade executors can drive it unchanged.
pub struct LiveMarket<C> {
    client: C,
}

impl<C: ExchangeClient> LiveMarket<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Realized profit of every fill on the account, replayed through a FIFO ledger.
    pub fn realized_profits(&self) -> Result<Vec<(DateTime<Utc>, Decimal)>, MarketError> {
        let fills = self.client.fills()?;
        Ok(ledger::replay_profits(&fills))
    }
}

impl<C: ExchangeClient> Market for LiveMarket<C> {
    fn current_price(&self) -> Result<Decimal, MarketError> {
        Ok(self.client.ticker()?)
    }

    fn place_market_order(&mut self, side: OrderSide, quantity: Decimal) -> Result<bool, MarketError> {
        let accepted = self.client.send_market_order(side, quantity)?;
        if accepted {
            info!(%side, %quantity, "market order accepted by venue");
        } else {
            warn!(%side, %quantity, "market order refused by venue");
        }
        Ok(accepted)
    }

    fn place_limit_order(
        &mut self,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<bool, MarketError> {
        let accepted = self.client.send_limit_order(side, quantity, price)?;
        if accepted {
            info!(%side, %quantity, %price, "limit order accepted by venue");
        } else {
            warn!(%side, %quantity, %price, "limit order refused by venue");
        }
        Ok(accepted)
    }

    fn open_orders(&self) -> Result<Vec<PendingOrder>, MarketError> {
        Ok(self.client.active_orders()?)
    }

    fn cancel_order(&mut self, id: OrderId) -> Result<bool, MarketError> {
        Ok(self.client.cancel_order(id)?)
    }
}

//! Gateway test double that records every request.

use rust_decimal::Decimal;

use crate::error::GatewayError;
use crate::models::PositionId;

use super::gateway::{AccountState, ExecutionGateway, OrderRequest};

/// Records requests; each call fails with the configured error, if any.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    pub balance: Decimal,
    pub opens: Vec<OrderRequest>,
    pub modifies: Vec<(PositionId, Option<Decimal>, Option<Decimal>)>,
    pub closes: Vec<PositionId>,
    pub open_error: Option<GatewayError>,
    pub modify_error: Option<GatewayError>,
    pub close_error: Option<GatewayError>,
    next_id: u64,
}

impl RecordingGateway {
    pub fn with_balance(balance: Decimal) -> Self {
        Self {
            balance,
            ..Self::default()
        }
    }
}

impl ExecutionGateway for RecordingGateway {
    fn open_market_order(&mut self, request: &OrderRequest) -> Result<PositionId, GatewayError> {
        self.opens.push(request.clone());
        if let Some(e) = &self.open_error {
            return Err(e.clone());
        }
        self.next_id += 1;
        Ok(PositionId(self.next_id))
    }

    fn modify_position(
        &mut self,
        id: PositionId,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
    ) -> Result<(), GatewayError> {
        self.modifies.push((id, stop_loss, take_profit));
        match &self.modify_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn close_position(&mut self, id: PositionId) -> Result<(), GatewayError> {
        self.closes.push(id);
        match &self.close_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

impl AccountState for RecordingGateway {
    fn balance(&self) -> Decimal {
        self.balance
    }
}

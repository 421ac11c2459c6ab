mod store;
mod types;

pub use store::TradingState;
pub use types::{
    OpenOrder,
    OrderSide,
    OrderState,
    PortfolioSnapshot,
    StateError,
    TradeRecord,
};

pub mod provider;
pub mod throttle;
pub mod tradier;
pub mod types;

pub use provider::{MarketDataProvider, ProviderError};
pub use throttle::Throttle;
pub use tradier::{TradierClient, TradierConfig};
pub use types::{ExpirationChain, OptionQuote, OptionType, OptionsSnapshot};

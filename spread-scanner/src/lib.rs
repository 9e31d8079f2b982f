pub mod analytics;
pub mod data;
pub mod pricing;
pub mod scan;

// Re-export commonly used types
pub use analytics::{
    ExpirationWindow, Rejection, SpreadCandidate, SpreadScreener, SpreadScreenerConfig,
};
pub use data::{
    ExpirationChain, MarketDataProvider, OptionQuote, OptionType, OptionsSnapshot, ProviderError,
    TradierClient,
};
pub use pricing::BlackScholes;
pub use scan::{ScanConfig, ScanReport, Scanner};

pub mod cache;
pub mod gateway;
pub mod limiter;
pub mod narrative;
pub mod providers;
pub mod retry;
pub mod scanner;
pub mod store;
pub mod table;

pub use cache::{CacheEntry, CacheKey, Clock, SeriesCache, SystemClock};
pub use gateway::{MarketDataGateway, SeriesFetch, SeriesSource};
pub use limiter::RateLimiter;
pub use narrative::{FactSheet, OpenAiClient};
pub use providers::{BinanceKlines, TwelveData};
pub use retry::RetryPolicy;
pub use scanner::{ScanOptions, Scanner};
pub use store::CacheStore;
pub use table::ScanTable;

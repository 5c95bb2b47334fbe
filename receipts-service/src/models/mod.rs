//! Data models for receipts-service.

pub mod analytics;
pub mod commodity;
pub mod receipt;
pub mod trader;

pub use analytics::{
    CommitteeMonthlyAnalytics, CommodityMonthlyAnalytics, CommodityOverallAnalytics,
    DailyAnalytics, MonthlyAchievement, Target, TraderMonthlyAnalytics, TraderOverallAnalytics,
};
pub use commodity::{Commodity, NEW_COMMODITY_SENTINEL};
pub use receipt::{
    CollectionLocation, CreateReceipt, ListReceiptsFilter, NatureOfReceipt, QuantityUnit, Receipt,
    ReceiptSnapshot,
};
pub use trader::{Trader, NEW_TRADER_SENTINEL};

//! Receipt model and the enums that classify a fee collection.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Nature of the fee a receipt records. Only market fees (`mf`) are tracked
/// against monthly targets and routed into location fee buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NatureOfReceipt {
    #[serde(rename = "mf")]
    MarketFee,
    #[serde(rename = "lc")]
    LicenseCharge,
    #[serde(rename = "uc")]
    UserCharge,
    #[serde(rename = "others")]
    Others,
}

impl NatureOfReceipt {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MarketFee => "mf",
            Self::LicenseCharge => "lc",
            Self::UserCharge => "uc",
            Self::Others => "others",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "mf" => Some(Self::MarketFee),
            "lc" => Some(Self::LicenseCharge),
            "uc" => Some(Self::UserCharge),
            "others" => Some(Self::Others),
            _ => None,
        }
    }
}

impl std::fmt::Display for NatureOfReceipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a fee was physically collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionLocation {
    Office,
    Checkpost,
    Other,
}

impl CollectionLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Office => "office",
            Self::Checkpost => "checkpost",
            Self::Other => "other",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "office" => Some(Self::Office),
            "checkpost" => Some(Self::Checkpost),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for CollectionLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unit the commodity quantity was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantityUnit {
    Bags,
    Quintals,
    Kilograms,
    Numbers,
}

impl QuantityUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bags => "bags",
            Self::Quintals => "quintals",
            Self::Kilograms => "kilograms",
            Self::Numbers => "numbers",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "bags" => Some(Self::Bags),
            "quintals" => Some(Self::Quintals),
            "kilograms" => Some(Self::Kilograms),
            "numbers" => Some(Self::Numbers),
            _ => None,
        }
    }

    /// Derive the weight in kilograms for a declared quantity.
    /// Counted items (`numbers`) carry no weight contribution.
    pub fn total_weight_kg(
        &self,
        quantity: Decimal,
        weight_per_bag: Option<Decimal>,
    ) -> Result<Decimal, AppError> {
        match self {
            Self::Bags => {
                let per_bag = weight_per_bag.ok_or_else(|| {
                    AppError::BadRequest(anyhow::anyhow!(
                        "weight_per_bag is required when unit is 'bags'"
                    ))
                })?;
                Ok(quantity * per_bag)
            }
            Self::Quintals => Ok(quantity * Decimal::ONE_HUNDRED),
            Self::Kilograms => Ok(quantity),
            Self::Numbers => Ok(Decimal::ZERO),
        }
    }
}

impl std::fmt::Display for QuantityUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fee receipt row. Classifier columns are stored as varchar; use
/// [`Receipt::snapshot`] for the typed view the analytics engine consumes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Receipt {
    pub receipt_id: Uuid,
    pub committee_id: Uuid,
    pub checkpost_id: Option<Uuid>,
    pub trader_id: Uuid,
    pub commodity_id: Option<Uuid>,
    pub receipt_date: NaiveDate,
    pub value: Decimal,
    pub fees_paid: Decimal,
    pub quantity: Decimal,
    pub unit: String,
    pub weight_per_bag: Option<Decimal>,
    pub total_weight_kg: Decimal,
    pub nature_of_receipt: String,
    pub collection_location: String,
    pub cancelled: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
    pub cancelled_utc: Option<DateTime<Utc>>,
}

impl Receipt {
    /// Typed field snapshot used for delta computation. Rows are only ever
    /// written through the service layer, so a parse failure here means the
    /// row was corrupted out of band.
    pub fn snapshot(&self) -> Result<ReceiptSnapshot, AppError> {
        let nature = NatureOfReceipt::from_str(&self.nature_of_receipt).ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Receipt {} has unknown nature_of_receipt '{}'",
                self.receipt_id,
                self.nature_of_receipt
            ))
        })?;
        let location = CollectionLocation::from_str(&self.collection_location).ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Receipt {} has unknown collection_location '{}'",
                self.receipt_id,
                self.collection_location
            ))
        })?;

        Ok(ReceiptSnapshot {
            committee_id: self.committee_id,
            checkpost_id: self.checkpost_id,
            trader_id: self.trader_id,
            commodity_id: self.commodity_id,
            receipt_date: self.receipt_date,
            value: self.value,
            fees_paid: self.fees_paid,
            total_weight_kg: self.total_weight_kg,
            nature,
            location,
        })
    }
}

/// The fields of a receipt that determine its aggregate contribution. Taken
/// before a mutation (reversal) and after it (application); the two may point
/// at entirely different aggregate rows when grouping keys change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptSnapshot {
    pub committee_id: Uuid,
    pub checkpost_id: Option<Uuid>,
    pub trader_id: Uuid,
    pub commodity_id: Option<Uuid>,
    pub receipt_date: NaiveDate,
    pub value: Decimal,
    pub fees_paid: Decimal,
    pub total_weight_kg: Decimal,
    pub nature: NatureOfReceipt,
    pub location: CollectionLocation,
}

/// Input for recording (or replacing) a receipt. Trader and commodity are
/// referenced by exact name; the "New"/"Other" sentinel names request
/// creation of the entity named in the companion field.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateReceipt {
    pub committee_id: Uuid,
    pub checkpost_id: Option<Uuid>,
    pub receipt_date: NaiveDate,
    #[validate(length(min = 1, max = 120))]
    pub trader_name: String,
    #[validate(length(min = 1, max = 120))]
    pub new_trader_name: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub commodity_name: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub new_commodity_name: Option<String>,
    pub quantity: Decimal,
    pub unit: QuantityUnit,
    pub weight_per_bag: Option<Decimal>,
    pub nature_of_receipt: NatureOfReceipt,
    pub collection_location: CollectionLocation,
    pub value: Decimal,
    pub fees_paid: Decimal,
}

/// Filter parameters for listing receipts.
#[derive(Debug, Clone, Default)]
pub struct ListReceiptsFilter {
    pub committee_id: Option<Uuid>,
    pub trader_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub include_cancelled: bool,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nature_round_trips_through_str() {
        for nature in [
            NatureOfReceipt::MarketFee,
            NatureOfReceipt::LicenseCharge,
            NatureOfReceipt::UserCharge,
            NatureOfReceipt::Others,
        ] {
            assert_eq!(NatureOfReceipt::from_str(nature.as_str()), Some(nature));
        }
        assert_eq!(NatureOfReceipt::from_str("marketfee"), None);
    }

    #[test]
    fn location_round_trips_through_str() {
        for location in [
            CollectionLocation::Office,
            CollectionLocation::Checkpost,
            CollectionLocation::Other,
        ] {
            assert_eq!(
                CollectionLocation::from_str(location.as_str()),
                Some(location)
            );
        }
    }

    #[test]
    fn weight_derivation_per_unit() {
        let qty = Decimal::from(40);

        assert_eq!(
            QuantityUnit::Bags
                .total_weight_kg(qty, Some(Decimal::from(50)))
                .unwrap(),
            Decimal::from(2000)
        );
        assert_eq!(
            QuantityUnit::Quintals.total_weight_kg(qty, None).unwrap(),
            Decimal::from(4000)
        );
        assert_eq!(
            QuantityUnit::Kilograms.total_weight_kg(qty, None).unwrap(),
            Decimal::from(40)
        );
        assert_eq!(
            QuantityUnit::Numbers.total_weight_kg(qty, None).unwrap(),
            Decimal::ZERO
        );
    }

    #[test]
    fn bags_without_weight_per_bag_is_rejected() {
        let err = QuantityUnit::Bags
            .total_weight_kg(Decimal::from(10), None)
            .unwrap_err();
        assert_eq!(err.kind(), "bad_request");
    }
}

//! Delta calculator: the pure heart of the analytics consistency engine.
//!
//! A receipt snapshot is turned into one signed contribution per aggregate
//! level, zeros included. Applying the deltas adds the receipt's
//! contribution; applying [`ReceiptDeltas::reversed`] removes it. Nothing in
//! this module touches storage.
//!
//! Two filtering rules, both load-bearing:
//! - committee and daily fee buckets only count market-fee (`mf`) receipts,
//!   with the fee routed to exactly one collection-location bucket;
//! - trader and commodity levels sum `fees_paid` across *all* natures. That
//!   asymmetry is a fixed contract inherited from the business rules, not an
//!   oversight to correct here.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{CollectionLocation, NatureOfReceipt, ReceiptSnapshot};

/// Contribution to a committee-scoped row (daily or monthly).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitteeDelta {
    pub receipts: i64,
    pub value: Decimal,
    pub weight: Decimal,
    pub market_fees: Decimal,
    pub office_fees: Decimal,
    pub checkpost_fees: Decimal,
    pub other_fees: Decimal,
}

impl CommitteeDelta {
    fn negated(&self) -> Self {
        Self {
            receipts: -self.receipts,
            value: -self.value,
            weight: -self.weight,
            market_fees: -self.market_fees,
            office_fees: -self.office_fees,
            checkpost_fees: -self.checkpost_fees,
            other_fees: -self.other_fees,
        }
    }
}

/// Contribution to a trader- or commodity-scoped row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyDelta {
    pub receipts: i64,
    pub value: Decimal,
    pub fees_paid: Decimal,
    pub weight: Decimal,
}

impl PartyDelta {
    fn negated(&self) -> Self {
        Self {
            receipts: -self.receipts,
            value: -self.value,
            fees_paid: -self.fees_paid,
            weight: -self.weight,
        }
    }
}

/// One aggregate level's key and contribution. The closed variant set is the
/// single interface the aggregate store applies; no level gets its own
/// bespoke upsert signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelDelta {
    Daily {
        committee_id: Uuid,
        checkpost_id: Option<Uuid>,
        date: NaiveDate,
        delta: CommitteeDelta,
    },
    CommitteeMonthly {
        committee_id: Uuid,
        year: i32,
        month: i32,
        delta: CommitteeDelta,
    },
    TraderMonthly {
        trader_id: Uuid,
        committee_id: Uuid,
        year: i32,
        month: i32,
        delta: PartyDelta,
    },
    TraderOverall {
        trader_id: Uuid,
        committee_id: Uuid,
        receipt_date: NaiveDate,
        delta: PartyDelta,
    },
    CommodityMonthly {
        commodity_id: Uuid,
        committee_id: Uuid,
        year: i32,
        month: i32,
        delta: PartyDelta,
    },
    CommodityOverall {
        commodity_id: Uuid,
        committee_id: Uuid,
        receipt_date: NaiveDate,
        delta: PartyDelta,
    },
}

impl LevelDelta {
    fn negated(&self) -> Self {
        match self {
            Self::Daily {
                committee_id,
                checkpost_id,
                date,
                delta,
            } => Self::Daily {
                committee_id: *committee_id,
                checkpost_id: *checkpost_id,
                date: *date,
                delta: delta.negated(),
            },
            Self::CommitteeMonthly {
                committee_id,
                year,
                month,
                delta,
            } => Self::CommitteeMonthly {
                committee_id: *committee_id,
                year: *year,
                month: *month,
                delta: delta.negated(),
            },
            Self::TraderMonthly {
                trader_id,
                committee_id,
                year,
                month,
                delta,
            } => Self::TraderMonthly {
                trader_id: *trader_id,
                committee_id: *committee_id,
                year: *year,
                month: *month,
                delta: delta.negated(),
            },
            Self::TraderOverall {
                trader_id,
                committee_id,
                receipt_date,
                delta,
            } => Self::TraderOverall {
                trader_id: *trader_id,
                committee_id: *committee_id,
                receipt_date: *receipt_date,
                delta: delta.negated(),
            },
            Self::CommodityMonthly {
                commodity_id,
                committee_id,
                year,
                month,
                delta,
            } => Self::CommodityMonthly {
                commodity_id: *commodity_id,
                committee_id: *committee_id,
                year: *year,
                month: *month,
                delta: delta.negated(),
            },
            Self::CommodityOverall {
                commodity_id,
                committee_id,
                receipt_date,
                delta,
            } => Self::CommodityOverall {
                commodity_id: *commodity_id,
                committee_id: *committee_id,
                receipt_date: *receipt_date,
                delta: delta.negated(),
            },
        }
    }
}

/// A receipt's full contribution: one entry per affected aggregate level.
/// Commodity levels are absent when the receipt has no commodity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptDeltas {
    levels: Vec<LevelDelta>,
}

impl ReceiptDeltas {
    pub fn levels(&self) -> &[LevelDelta] {
        &self.levels
    }

    /// Sign-flipped copy: applying it undoes the original contribution.
    /// Keys and dates are untouched; only the numeric fields change sign.
    pub fn reversed(&self) -> Self {
        Self {
            levels: self.levels.iter().map(LevelDelta::negated).collect(),
        }
    }
}

/// Route the fee into the market-fee buckets: `(market, office, checkpost,
/// other)`. Non-market natures contribute zero to all four; a market fee
/// lands in `market_fees` plus exactly one location bucket.
fn route_fees(snapshot: &ReceiptSnapshot) -> (Decimal, Decimal, Decimal, Decimal) {
    if snapshot.nature != NatureOfReceipt::MarketFee {
        return (
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO,
        );
    }

    let fees = snapshot.fees_paid;
    match snapshot.location {
        CollectionLocation::Office => (fees, fees, Decimal::ZERO, Decimal::ZERO),
        CollectionLocation::Checkpost => (fees, Decimal::ZERO, fees, Decimal::ZERO),
        CollectionLocation::Other => (fees, Decimal::ZERO, Decimal::ZERO, fees),
    }
}

/// Compute a receipt's positive contribution to every aggregate level.
pub fn compute_deltas(snapshot: &ReceiptSnapshot) -> ReceiptDeltas {
    let (market_fees, office_fees, checkpost_fees, other_fees) = route_fees(snapshot);

    let committee_delta = CommitteeDelta {
        receipts: 1,
        value: snapshot.value,
        weight: snapshot.total_weight_kg,
        market_fees,
        office_fees,
        checkpost_fees,
        other_fees,
    };
    let party_delta = PartyDelta {
        receipts: 1,
        value: snapshot.value,
        fees_paid: snapshot.fees_paid,
        weight: snapshot.total_weight_kg,
    };

    let year = snapshot.receipt_date.year();
    let month = snapshot.receipt_date.month() as i32;

    let mut levels = vec![
        LevelDelta::Daily {
            committee_id: snapshot.committee_id,
            checkpost_id: snapshot.checkpost_id,
            date: snapshot.receipt_date,
            delta: committee_delta.clone(),
        },
        LevelDelta::CommitteeMonthly {
            committee_id: snapshot.committee_id,
            year,
            month,
            delta: committee_delta,
        },
        LevelDelta::TraderMonthly {
            trader_id: snapshot.trader_id,
            committee_id: snapshot.committee_id,
            year,
            month,
            delta: party_delta.clone(),
        },
        LevelDelta::TraderOverall {
            trader_id: snapshot.trader_id,
            committee_id: snapshot.committee_id,
            receipt_date: snapshot.receipt_date,
            delta: party_delta.clone(),
        },
    ];

    if let Some(commodity_id) = snapshot.commodity_id {
        levels.push(LevelDelta::CommodityMonthly {
            commodity_id,
            committee_id: snapshot.committee_id,
            year,
            month,
            delta: party_delta.clone(),
        });
        levels.push(LevelDelta::CommodityOverall {
            commodity_id,
            committee_id: snapshot.committee_id,
            receipt_date: snapshot.receipt_date,
            delta: party_delta,
        });
    }

    ReceiptDeltas { levels }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(nature: NatureOfReceipt, location: CollectionLocation) -> ReceiptSnapshot {
        ReceiptSnapshot {
            committee_id: Uuid::new_v4(),
            checkpost_id: None,
            trader_id: Uuid::new_v4(),
            commodity_id: Some(Uuid::new_v4()),
            receipt_date: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
            value: Decimal::from(100_000),
            fees_paid: Decimal::from(1_000),
            total_weight_kg: Decimal::from(2_000),
            nature,
            location,
        }
    }

    fn committee_monthly(deltas: &ReceiptDeltas) -> &CommitteeDelta {
        deltas
            .levels()
            .iter()
            .find_map(|l| match l {
                LevelDelta::CommitteeMonthly { delta, .. } => Some(delta),
                _ => None,
            })
            .expect("committee monthly level missing")
    }

    fn trader_monthly(deltas: &ReceiptDeltas) -> &PartyDelta {
        deltas
            .levels()
            .iter()
            .find_map(|l| match l {
                LevelDelta::TraderMonthly { delta, .. } => Some(delta),
                _ => None,
            })
            .expect("trader monthly level missing")
    }

    #[test]
    fn market_fee_at_office_routes_to_office_bucket_only() {
        let deltas = compute_deltas(&snapshot(
            NatureOfReceipt::MarketFee,
            CollectionLocation::Office,
        ));
        let delta = committee_monthly(&deltas);

        assert_eq!(delta.receipts, 1);
        assert_eq!(delta.value, Decimal::from(100_000));
        assert_eq!(delta.market_fees, Decimal::from(1_000));
        assert_eq!(delta.office_fees, Decimal::from(1_000));
        assert_eq!(delta.checkpost_fees, Decimal::ZERO);
        assert_eq!(delta.other_fees, Decimal::ZERO);
    }

    #[test]
    fn market_fee_at_checkpost_routes_to_checkpost_bucket_only() {
        let deltas = compute_deltas(&snapshot(
            NatureOfReceipt::MarketFee,
            CollectionLocation::Checkpost,
        ));
        let delta = committee_monthly(&deltas);

        assert_eq!(delta.office_fees, Decimal::ZERO);
        assert_eq!(delta.checkpost_fees, Decimal::from(1_000));
        assert_eq!(delta.other_fees, Decimal::ZERO);
    }

    #[test]
    fn market_fee_at_other_location_routes_to_other_bucket_only() {
        let deltas = compute_deltas(&snapshot(
            NatureOfReceipt::MarketFee,
            CollectionLocation::Other,
        ));
        let delta = committee_monthly(&deltas);

        assert_eq!(delta.office_fees, Decimal::ZERO);
        assert_eq!(delta.checkpost_fees, Decimal::ZERO);
        assert_eq!(delta.other_fees, Decimal::from(1_000));
        assert_eq!(delta.market_fees, Decimal::from(1_000));
    }

    #[test]
    fn non_market_nature_zeroes_every_fee_bucket_but_still_counts() {
        for nature in [
            NatureOfReceipt::LicenseCharge,
            NatureOfReceipt::UserCharge,
            NatureOfReceipt::Others,
        ] {
            let deltas = compute_deltas(&snapshot(nature, CollectionLocation::Office));
            let delta = committee_monthly(&deltas);

            assert_eq!(delta.receipts, 1);
            assert_eq!(delta.value, Decimal::from(100_000));
            assert_eq!(delta.market_fees, Decimal::ZERO);
            assert_eq!(delta.office_fees, Decimal::ZERO);
            assert_eq!(delta.checkpost_fees, Decimal::ZERO);
            assert_eq!(delta.other_fees, Decimal::ZERO);
        }
    }

    #[test]
    fn trader_levels_sum_fees_regardless_of_nature() {
        // The asymmetry contract: a license charge is invisible to the
        // committee fee buckets but still counts toward the trader's fees.
        let deltas = compute_deltas(&snapshot(
            NatureOfReceipt::LicenseCharge,
            CollectionLocation::Office,
        ));
        let delta = trader_monthly(&deltas);

        assert_eq!(delta.receipts, 1);
        assert_eq!(delta.fees_paid, Decimal::from(1_000));
        assert_eq!(delta.value, Decimal::from(100_000));
    }

    #[test]
    fn market_fees_equal_sum_of_location_buckets() {
        for location in [
            CollectionLocation::Office,
            CollectionLocation::Checkpost,
            CollectionLocation::Other,
        ] {
            let deltas = compute_deltas(&snapshot(NatureOfReceipt::MarketFee, location));
            let delta = committee_monthly(&deltas);
            assert_eq!(
                delta.market_fees,
                delta.office_fees + delta.checkpost_fees + delta.other_fees
            );
        }
    }

    #[test]
    fn commodity_levels_absent_without_commodity() {
        let mut s = snapshot(NatureOfReceipt::MarketFee, CollectionLocation::Office);
        s.commodity_id = None;
        let deltas = compute_deltas(&s);

        assert_eq!(deltas.levels().len(), 4);
        assert!(!deltas.levels().iter().any(|l| matches!(
            l,
            LevelDelta::CommodityMonthly { .. } | LevelDelta::CommodityOverall { .. }
        )));
    }

    #[test]
    fn all_six_levels_present_with_commodity() {
        let deltas = compute_deltas(&snapshot(
            NatureOfReceipt::MarketFee,
            CollectionLocation::Office,
        ));
        assert_eq!(deltas.levels().len(), 6);
    }

    #[test]
    fn month_key_derived_from_receipt_date() {
        let mut s = snapshot(NatureOfReceipt::MarketFee, CollectionLocation::Office);
        s.receipt_date = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        let deltas = compute_deltas(&s);

        match deltas.levels().iter().find(|l| matches!(l, LevelDelta::CommitteeMonthly { .. })) {
            Some(LevelDelta::CommitteeMonthly { year, month, .. }) => {
                assert_eq!(*year, 2023);
                assert_eq!(*month, 12);
            }
            _ => panic!("committee monthly level missing"),
        }
    }

    #[test]
    fn reversal_negates_numerics_and_preserves_keys() {
        let s = snapshot(NatureOfReceipt::MarketFee, CollectionLocation::Checkpost);
        let forward = compute_deltas(&s);
        let reversed = forward.reversed();

        assert_eq!(forward.levels().len(), reversed.levels().len());

        let fwd = committee_monthly(&forward);
        let rev = committee_monthly(&reversed);
        assert_eq!(rev.receipts, -fwd.receipts);
        assert_eq!(rev.value, -fwd.value);
        assert_eq!(rev.checkpost_fees, -fwd.checkpost_fees);
        assert_eq!(rev.market_fees, -fwd.market_fees);

        // Reversal targets the same rows as the forward application.
        match (&forward.levels()[0], &reversed.levels()[0]) {
            (
                LevelDelta::Daily {
                    committee_id: a,
                    date: d1,
                    ..
                },
                LevelDelta::Daily {
                    committee_id: b,
                    date: d2,
                    ..
                },
            ) => {
                assert_eq!(a, b);
                assert_eq!(d1, d2);
            }
            _ => panic!("daily level missing"),
        }
    }

    #[test]
    fn double_reversal_is_identity() {
        let forward = compute_deltas(&snapshot(
            NatureOfReceipt::MarketFee,
            CollectionLocation::Office,
        ));
        assert_eq!(forward.reversed().reversed(), forward);
    }
}

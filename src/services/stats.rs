//! Booking statistics

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use chrono::{DateTime, Datelike, Months, Utc};
use rust_decimal::Decimal;

use crate::{
    api::stats::{BookingStatistics, MonthCount, PopularEquipment, StatusCount},
    config::BookingsConfig,
    error::AppResult,
    models::booking::{BookingStatRow, BookingStatus},
    repository::{BookingStore, EquipmentStore},
};

/// Figures derived from the booking rows alone, before equipment lookup
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub total_bookings: i64,
    pub bookings_by_status: Vec<StatusCount>,
    pub revenue: Decimal,
    pub bookings_by_month: Vec<MonthCount>,
    /// `(equipment_id, count)`, most bookings first, ties by ascending id
    pub popular: Vec<(i32, i64)>,
}

/// Aggregate booking rows.
///
/// Rows without equipment are ignored everywhere. The month histogram covers
/// bookings created on or after `now - months`.
pub fn aggregate(
    rows: &[BookingStatRow],
    now: DateTime<Utc>,
    months: u32,
    popular_limit: usize,
) -> Aggregate {
    let window_start = now
        .checked_sub_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let mut total_bookings = 0;
    let mut revenue = Decimal::ZERO;
    let mut by_status: BTreeMap<BookingStatus, i64> = BTreeMap::new();
    let mut by_month: BTreeMap<(i32, u32), i64> = BTreeMap::new();
    let mut by_equipment: HashMap<i32, i64> = HashMap::new();

    for row in rows {
        let Some(equipment_id) = row.equipment_id else {
            continue;
        };

        total_bookings += 1;
        *by_status.entry(row.status).or_default() += 1;
        *by_equipment.entry(equipment_id).or_default() += 1;

        if row.status.counts_as_revenue() {
            revenue += row.total_amount;
        }
        if row.created_at >= window_start {
            *by_month
                .entry((row.created_at.year(), row.created_at.month()))
                .or_default() += 1;
        }
    }

    let mut popular: Vec<(i32, i64)> = by_equipment.into_iter().collect();
    popular.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    popular.truncate(popular_limit);

    Aggregate {
        total_bookings,
        bookings_by_status: by_status
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect(),
        revenue,
        bookings_by_month: by_month
            .into_iter()
            .map(|((year, month), count)| MonthCount { year, month, count })
            .collect(),
        popular,
    }
}

#[derive(Clone)]
pub struct StatsService {
    equipment: Arc<dyn EquipmentStore>,
    bookings: Arc<dyn BookingStore>,
    months: u32,
    popular_limit: usize,
}

impl StatsService {
    pub fn new(
        equipment: Arc<dyn EquipmentStore>,
        bookings: Arc<dyn BookingStore>,
        config: &BookingsConfig,
    ) -> Self {
        Self {
            equipment,
            bookings,
            months: config.statistics_months,
            popular_limit: config.popular_equipment_limit,
        }
    }

    pub async fn booking_statistics(&self) -> AppResult<BookingStatistics> {
        let rows = self.bookings.stat_rows().await?;
        let agg = aggregate(&rows, Utc::now(), self.months, self.popular_limit);

        let ids = agg.popular.iter().map(|(id, _)| *id).collect();
        let mut equipment: HashMap<i32, _> = self
            .equipment
            .get_many(ids)
            .await?
            .into_iter()
            .map(|e| (e.id, e))
            .collect();

        let popular_equipment = agg
            .popular
            .iter()
            .map(|&(equipment_id, count)| PopularEquipment {
                equipment_id,
                count,
                equipment: equipment.remove(&equipment_id),
            })
            .collect();

        Ok(BookingStatistics {
            total_bookings: agg.total_bookings,
            bookings_by_status: agg.bookings_by_status,
            revenue: agg.revenue,
            bookings_by_month: agg.bookings_by_month,
            popular_equipment,
        })
    }
}

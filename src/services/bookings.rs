//! Booking availability and lifecycle engine

use std::{collections::HashSet, sync::Arc};

use chrono::{NaiveDate, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{
        booking::{
            AvailabilityReport, Booking, BookingChanges, BookingDetails, BookingEvent,
            BookingStatus, CreateBooking, DateRange, NewBooking, PaymentStatus, ProcessPayment,
            SweepOutcome, UpdateBooking,
        },
        equipment::Equipment,
        user::UserClaims,
        validate_money,
    },
    repository::{BookingFilter, BookingStore, EquipmentStore},
    services::payments::{CaptureRequest, PaymentGateway},
};

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[derive(Clone)]
pub struct BookingsService {
    equipment: Arc<dyn EquipmentStore>,
    bookings: Arc<dyn BookingStore>,
    gateway: Arc<dyn PaymentGateway>,
    currency: String,
}

impl BookingsService {
    pub fn new(
        equipment: Arc<dyn EquipmentStore>,
        bookings: Arc<dyn BookingStore>,
        gateway: Arc<dyn PaymentGateway>,
        currency: String,
    ) -> Self {
        Self {
            equipment,
            bookings,
            gateway,
            currency,
        }
    }

    // -----------------------------------------------------------------------
    // Availability
    // -----------------------------------------------------------------------

    /// Bookable equipment plus the non-cancelled bookings overlapping `range`
    async fn resolve(
        &self,
        equipment_id: i32,
        range: DateRange,
        exclude_id: Option<i32>,
    ) -> AppResult<(Equipment, Vec<Booking>)> {
        let equipment = self.equipment.get_by_id(equipment_id).await?;
        if equipment.is_in_maintenance {
            return Err(AppError::EquipmentUnderMaintenance(equipment_id));
        }

        let conflicts = self
            .bookings
            .find_overlapping(equipment_id, range, exclude_id)
            .await?
            .into_iter()
            // cancelled and disjoint rows never conflict, whatever the store returns
            .filter(|b| b.status != BookingStatus::Cancelled && b.range().overlaps(&range))
            .collect();

        Ok((equipment, conflicts))
    }

    pub async fn check_availability(
        &self,
        equipment_id: i32,
        range: DateRange,
    ) -> AppResult<AvailabilityReport> {
        let (_, conflicting_bookings) = self.resolve(equipment_id, range, None).await?;
        Ok(AvailabilityReport {
            available: conflicting_bookings.is_empty(),
            conflicting_bookings,
        })
    }

    /// Equipment not in maintenance with no overlapping booking in `range`
    pub async fn list_available_equipment(&self, range: DateRange) -> AppResult<Vec<Equipment>> {
        let booked: HashSet<i32> = self
            .bookings
            .booked_equipment_ids(range)
            .await?
            .into_iter()
            .collect();

        let available = self
            .equipment
            .list_not_in_maintenance()
            .await?
            .into_iter()
            .filter(|e| !booked.contains(&e.id))
            .collect();

        Ok(available)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Time-driven promotion of every booking as of `today`
    pub async fn sweep_at(&self, today: NaiveDate) -> AppResult<SweepOutcome> {
        let outcome = self.bookings.promote_by_date(today).await?;
        if outcome != SweepOutcome::default() {
            tracing::info!(
                activated = outcome.activated,
                completed = outcome.completed,
                %today,
                "Booking statuses promoted"
            );
        }
        Ok(outcome)
    }

    pub async fn sweep(&self) -> AppResult<SweepOutcome> {
        self.sweep_at(today()).await
    }

    pub async fn get(&self, claims: &UserClaims, id: i32) -> AppResult<BookingDetails> {
        self.sweep().await?;
        let details = self.bookings.get_details(id).await?;
        claims.require_self_or_admin(details.booking.farmer_id, "view this booking")?;
        Ok(details)
    }

    /// Admins see every booking, farmers their own
    pub async fn list_all(&self, claims: &UserClaims) -> AppResult<Vec<BookingDetails>> {
        self.sweep().await?;
        let filter = if claims.is_admin() {
            BookingFilter::All
        } else {
            BookingFilter::Farmer(claims.user_id)
        };
        self.bookings.list_details(filter).await
    }

    pub async fn list_user(&self, claims: &UserClaims) -> AppResult<Vec<BookingDetails>> {
        self.sweep().await?;
        self.bookings
            .list_details(BookingFilter::FarmerWithEquipment(claims.user_id))
            .await
    }

    pub async fn list_active(&self, claims: &UserClaims) -> AppResult<Vec<BookingDetails>> {
        claims.require_admin()?;
        let today = today();
        self.sweep_at(today).await?;
        self.bookings.list_details(BookingFilter::ActiveOn(today)).await
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    pub async fn create(&self, claims: &UserClaims, data: CreateBooking) -> AppResult<Booking> {
        validate_money(data.total_amount, "Total amount")?;
        let range = DateRange::new(data.start_date, data.end_date)?;

        let (equipment, conflicts) = self.resolve(data.equipment_id, range, None).await?;
        if !conflicts.is_empty() {
            tracing::warn!(
                equipment_id = data.equipment_id,
                start_date = %range.start(),
                end_date = %range.end(),
                conflicts = conflicts.len(),
                "Booking request overlaps existing bookings"
            );
            return Err(AppError::BookingConflict(
                "Equipment is already booked for these dates".to_string(),
            ));
        }

        let total_amount = data
            .total_amount
            .unwrap_or_else(|| range.rental_cost(equipment.daily_rate));
        validate_money(Some(total_amount), "Total amount")?;

        let new_booking = NewBooking {
            farmer_id: claims.user_id,
            equipment_id: equipment.id,
            range,
            total_amount,
            notes: data.notes,
            proof_image: data.proof_image,
        };

        let booking = self.bookings.create(&new_booking).await?;
        tracing::info!(
            booking_id = booking.id,
            equipment_id = equipment.id,
            farmer_id = booking.farmer_id,
            status = %booking.status,
            total_amount = %booking.total_amount,
            "Booking created"
        );
        Ok(booking)
    }

    pub async fn accept(&self, claims: &UserClaims, id: i32) -> AppResult<Booking> {
        claims.require_admin()?;
        self.apply_event(id, BookingEvent::Accept).await
    }

    pub async fn deny(&self, claims: &UserClaims, id: i32) -> AppResult<Booking> {
        claims.require_admin()?;
        self.apply_event(id, BookingEvent::Deny).await
    }

    pub async fn cancel(&self, claims: &UserClaims, id: i32) -> AppResult<Booking> {
        let booking = self.bookings.get_by_id(id).await?;
        claims.require_self_or_admin(booking.farmer_id, "cancel this booking")?;
        self.transition(booking, BookingEvent::Cancel).await
    }

    async fn apply_event(&self, id: i32, event: BookingEvent) -> AppResult<Booking> {
        let booking = self.bookings.get_by_id(id).await?;
        self.transition(booking, event).await
    }

    /// Guarded status change against the status `booking` was read with
    async fn transition(&self, booking: Booking, event: BookingEvent) -> AppResult<Booking> {
        let next = booking.status.apply(event).map_err(|e| {
            tracing::warn!(booking_id = booking.id, status = %booking.status, "{}", e);
            e
        })?;

        match self.bookings.transition(booking.id, booking.status, next).await? {
            Some(updated) => {
                tracing::info!(
                    booking_id = updated.id,
                    equipment_id = ?updated.equipment_id,
                    from = %booking.status,
                    status = %updated.status,
                    "Booking {}",
                    event.action()
                );
                Ok(updated)
            }
            None => Err(self.stale(booking.id, event.action()).await),
        }
    }

    /// Error for a guarded write that matched no row: the booking is gone or
    /// its status moved under us
    async fn stale(&self, id: i32, action: &'static str) -> AppError {
        match self.bookings.get_by_id(id).await {
            Ok(current) => {
                tracing::warn!(booking_id = id, status = %current.status, "Concurrent status change");
                AppError::InvalidStateTransition {
                    from: current.status,
                    action,
                }
            }
            Err(e) => e,
        }
    }

    pub async fn update(
        &self,
        claims: &UserClaims,
        id: i32,
        data: UpdateBooking,
    ) -> AppResult<Booking> {
        let booking = self.bookings.get_by_id(id).await?;
        claims.require_self_or_admin(booking.farmer_id, "update this booking")?;

        if !claims.is_admin() {
            if data.status.is_some() {
                return Err(AppError::Authorization(
                    "Only admins can change the booking status".to_string(),
                ));
            }
            if !booking.status.is_farmer_editable() {
                return Err(AppError::InvalidStateTransition {
                    from: booking.status,
                    action: "update",
                });
            }
        }

        validate_money(data.total_amount, "Total amount")?;
        let range = DateRange::new(
            data.start_date.unwrap_or(booking.start_date),
            data.end_date.unwrap_or(booking.end_date),
        )?;
        let status = match data.status {
            Some(target) => booking.status.apply(BookingEvent::Override(target))?,
            None => booking.status,
        };

        let dates_changed = range != booking.range();
        let mut total_amount = data.total_amount.unwrap_or(booking.total_amount);

        if let Some(equipment_id) = booking.equipment_id {
            if dates_changed && status != BookingStatus::Cancelled {
                let (equipment, conflicts) =
                    self.resolve(equipment_id, range, Some(booking.id)).await?;
                if !conflicts.is_empty() {
                    tracing::warn!(booking_id = id, equipment_id, "Updated dates overlap existing bookings");
                    return Err(AppError::BookingConflict(
                        "Equipment is already booked for these dates".to_string(),
                    ));
                }
                if data.total_amount.is_none() {
                    total_amount = range.rental_cost(equipment.daily_rate);
                    validate_money(Some(total_amount), "Total amount")?;
                }
            }
        }

        let changes = BookingChanges {
            range,
            total_amount,
            notes: data.notes.or(booking.notes),
            proof_image: data.proof_image.or(booking.proof_image),
            status,
        };

        match self.bookings.update(id, booking.status, &changes).await? {
            Some(updated) => {
                tracing::info!(
                    booking_id = id,
                    equipment_id = ?updated.equipment_id,
                    status = %updated.status,
                    "Booking updated"
                );
                Ok(updated)
            }
            None => Err(self.stale(id, "update").await),
        }
    }

    /// Capture the booking amount and confirm the booking.
    ///
    /// The gateway is only contacted once every local check passed, and the
    /// booking is only touched after the gateway confirmed the capture.
    pub async fn process_payment(
        &self,
        claims: &UserClaims,
        request: ProcessPayment,
    ) -> AppResult<Booking> {
        let booking = self.bookings.get_by_id(request.booking_id).await?;
        claims.require_self_or_admin(booking.farmer_id, "pay for this booking")?;

        if booking.payment_status == PaymentStatus::Paid {
            return Err(AppError::AlreadyPaid(booking.id));
        }
        let next = booking.status.apply(BookingEvent::CapturePayment)?;

        let receipt = self
            .gateway
            .capture(&CaptureRequest {
                booking_id: booking.id,
                amount: booking.total_amount,
                currency: self.currency.clone(),
                payment_method_id: request.payment_method_id,
            })
            .await
            .map_err(|e| {
                tracing::error!(booking_id = booking.id, "Payment capture failed: {}", e);
                e
            })?;

        match self
            .bookings
            .record_payment(booking.id, booking.status, next, &receipt.payment_id)
            .await?
        {
            Some(updated) => {
                tracing::info!(
                    booking_id = updated.id,
                    equipment_id = ?updated.equipment_id,
                    payment_id = %receipt.payment_id,
                    status = %updated.status,
                    "Booking paid"
                );
                Ok(updated)
            }
            None => {
                tracing::error!(
                    booking_id = booking.id,
                    payment_id = %receipt.payment_id,
                    "Payment captured but booking changed before it could be recorded"
                );
                match self.bookings.get_by_id(booking.id).await? {
                    current if current.payment_status == PaymentStatus::Paid => {
                        Err(AppError::AlreadyPaid(current.id))
                    }
                    current => Err(AppError::InvalidStateTransition {
                        from: current.status,
                        action: BookingEvent::CapturePayment.action(),
                    }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;
    use mockall::{predicate::eq, Sequence};
    use rust_decimal::Decimal;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::{
        models::user::UserRole,
        repository::{bookings::MockBookingStore, equipment::MockEquipmentStore},
        services::payments::{MockPaymentGateway, PaymentReceipt},
    };

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn farmer(id: i32) -> UserClaims {
        UserClaims::new(id, UserRole::Farmer, 1)
    }

    fn admin() -> UserClaims {
        UserClaims::new(1, UserRole::Admin, 1)
    }

    fn equipment(id: i32, rate: i64) -> Equipment {
        Equipment {
            id,
            name: "Tractor".to_string(),
            description: "Compact tractor".to_string(),
            category: "tractors".to_string(),
            daily_rate: Decimal::new(rate, 0),
            images: vec![],
            features: vec![],
            specifications: serde_json::json!({}),
            is_available: true,
            is_in_maintenance: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn booking(id: i32, farmer_id: i32, status: BookingStatus) -> Booking {
        Booking {
            id,
            farmer_id,
            equipment_id: Some(10),
            start_date: d(2024, 2, 10),
            end_date: d(2024, 2, 15),
            total_amount: Decimal::new(500, 0),
            status,
            payment_status: PaymentStatus::Pending,
            payment_id: None,
            payment_date: None,
            proof_image: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn service(
        equipment: MockEquipmentStore,
        bookings: MockBookingStore,
        gateway: MockPaymentGateway,
    ) -> BookingsService {
        BookingsService::new(
            Arc::new(equipment),
            Arc::new(bookings),
            Arc::new(gateway),
            "usd".to_string(),
        )
    }

    fn create_request(equipment_id: i32, start: NaiveDate, end: NaiveDate) -> CreateBooking {
        CreateBooking {
            equipment_id,
            start_date: start,
            end_date: end,
            total_amount: None,
            notes: None,
            proof_image: None,
        }
    }

    #[tokio::test]
    async fn create_computes_total_from_daily_rate() {
        let mut equipment_store = MockEquipmentStore::new();
        equipment_store
            .expect_get_by_id()
            .with(eq(10))
            .returning(|id| Ok(equipment(id, 100)));

        let mut store = MockBookingStore::new();
        store
            .expect_find_overlapping()
            .returning(|_, _, _| Ok(vec![]));
        store
            .expect_create()
            .withf(|b: &NewBooking| {
                b.total_amount == Decimal::new(300, 0) && b.farmer_id == 7 && b.equipment_id == 10
            })
            .times(1)
            .returning(|b| {
                let mut created = booking(1, b.farmer_id, BookingStatus::Pending);
                created.start_date = b.range.start();
                created.end_date = b.range.end();
                created.total_amount = b.total_amount;
                Ok(created)
            });

        let svc = service(equipment_store, store, MockPaymentGateway::new());
        let created = svc
            .create(&farmer(7), create_request(10, d(2024, 1, 1), d(2024, 1, 4)))
            .await
            .unwrap();

        assert_eq!(created.total_amount, Decimal::new(300, 0));
        assert_eq!(created.status, BookingStatus::Pending);
        assert_eq!(created.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn explicit_total_is_kept() {
        let mut equipment_store = MockEquipmentStore::new();
        equipment_store
            .expect_get_by_id()
            .returning(|id| Ok(equipment(id, 100)));
        let mut store = MockBookingStore::new();
        store
            .expect_find_overlapping()
            .returning(|_, _, _| Ok(vec![]));
        store
            .expect_create()
            .withf(|b: &NewBooking| b.total_amount == Decimal::new(250, 0))
            .times(1)
            .returning(|b| Ok(booking(1, b.farmer_id, BookingStatus::Pending)));

        let svc = service(equipment_store, store, MockPaymentGateway::new());
        let mut request = create_request(10, d(2024, 1, 1), d(2024, 1, 4));
        request.total_amount = Some(Decimal::new(250, 0));
        assert_ok!(svc.create(&farmer(7), request).await);
    }

    #[tokio::test]
    async fn total_beyond_column_precision_is_rejected_without_write() {
        let mut equipment_store = MockEquipmentStore::new();
        equipment_store
            .expect_get_by_id()
            .returning(|id| Ok(equipment(id, 5_000_000_000)));
        let mut store = MockBookingStore::new();
        store
            .expect_find_overlapping()
            .returning(|_, _, _| Ok(vec![]));
        store.expect_create().times(0);

        let svc = service(equipment_store, store, MockPaymentGateway::new());
        // Three days at the rate overflow NUMERIC(12, 2)
        let err = svc
            .create(&farmer(7), create_request(10, d(2024, 1, 1), d(2024, 1, 4)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn shared_boundary_day_is_rejected() {
        let mut equipment_store = MockEquipmentStore::new();
        equipment_store
            .expect_get_by_id()
            .returning(|id| Ok(equipment(id, 100)));

        let mut store = MockBookingStore::new();
        store
            .expect_find_overlapping()
            .returning(|_, _, _| Ok(vec![booking(5, 2, BookingStatus::Confirmed)]));
        store.expect_create().times(0);

        let svc = service(equipment_store, store, MockPaymentGateway::new());
        let err = svc
            .create(&farmer(7), create_request(10, d(2024, 2, 15), d(2024, 2, 20)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BookingConflict(_)));
    }

    #[tokio::test]
    async fn maintenance_blocks_booking() {
        let mut equipment_store = MockEquipmentStore::new();
        equipment_store.expect_get_by_id().returning(|id| {
            let mut e = equipment(id, 100);
            e.is_in_maintenance = true;
            Ok(e)
        });
        let mut store = MockBookingStore::new();
        store.expect_find_overlapping().times(0);
        store.expect_create().times(0);

        let svc = service(equipment_store, store, MockPaymentGateway::new());
        let err = svc
            .create(&farmer(7), create_request(10, d(2024, 1, 1), d(2024, 1, 4)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::EquipmentUnderMaintenance(10)));
    }

    #[tokio::test]
    async fn unknown_equipment_is_not_found() {
        let mut equipment_store = MockEquipmentStore::new();
        equipment_store
            .expect_get_by_id()
            .returning(|id| Err(AppError::EquipmentNotFound(id)));
        let mut store = MockBookingStore::new();
        store.expect_create().times(0);

        let svc = service(equipment_store, store, MockPaymentGateway::new());
        let err = svc
            .create(&farmer(7), create_request(99, d(2024, 1, 1), d(2024, 1, 4)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::EquipmentNotFound(99)));
    }

    #[tokio::test]
    async fn invalid_range_is_rejected_before_any_lookup() {
        let mut equipment_store = MockEquipmentStore::new();
        equipment_store.expect_get_by_id().times(0);
        let svc = service(equipment_store, MockBookingStore::new(), MockPaymentGateway::new());

        let err = svc
            .create(&farmer(7), create_request(10, d(2024, 1, 4), d(2024, 1, 4)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn availability_reports_conflicts() {
        let mut equipment_store = MockEquipmentStore::new();
        equipment_store
            .expect_get_by_id()
            .returning(|id| Ok(equipment(id, 100)));
        let mut store = MockBookingStore::new();
        store.expect_find_overlapping().returning(|_, _, _| {
            Ok(vec![
                booking(5, 2, BookingStatus::Confirmed),
                booking(6, 3, BookingStatus::Cancelled),
            ])
        });

        let svc = service(equipment_store, store, MockPaymentGateway::new());
        let range = DateRange::new(d(2024, 2, 15), d(2024, 2, 20)).unwrap();
        let report = svc.check_availability(10, range).await.unwrap();
        assert!(!report.available);
        assert_eq!(report.conflicting_bookings.len(), 1);
        assert_eq!(report.conflicting_bookings[0].id, 5);
    }

    #[tokio::test]
    async fn available_equipment_excludes_booked_ids() {
        let mut equipment_store = MockEquipmentStore::new();
        equipment_store
            .expect_list_not_in_maintenance()
            .returning(|| Ok(vec![equipment(1, 50), equipment(2, 60), equipment(3, 70)]));
        let mut store = MockBookingStore::new();
        store
            .expect_booked_equipment_ids()
            .returning(|_| Ok(vec![2]));

        let svc = service(equipment_store, store, MockPaymentGateway::new());
        let range = DateRange::new(d(2024, 3, 1), d(2024, 3, 5)).unwrap();
        let ids: Vec<i32> = svc
            .list_available_equipment(range)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn farmer_cannot_cancel_someone_elses_booking() {
        let mut store = MockBookingStore::new();
        store
            .expect_get_by_id()
            .returning(|id| Ok(booking(id, 2, BookingStatus::Pending)));
        store.expect_transition().times(0);

        let svc = service(MockEquipmentStore::new(), store, MockPaymentGateway::new());
        let err = svc.cancel(&farmer(7), 4).await.unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }

    #[tokio::test]
    async fn owner_cancels_confirmed_booking() {
        let mut store = MockBookingStore::new();
        store
            .expect_get_by_id()
            .returning(|id| Ok(booking(id, 7, BookingStatus::Confirmed)));
        store
            .expect_transition()
            .with(eq(4), eq(BookingStatus::Confirmed), eq(BookingStatus::Cancelled))
            .times(1)
            .returning(|id, _, to| Ok(Some(booking(id, 7, to))));

        let svc = service(MockEquipmentStore::new(), store, MockPaymentGateway::new());
        let cancelled = svc.cancel(&farmer(7), 4).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn completed_booking_cannot_be_cancelled() {
        let mut store = MockBookingStore::new();
        store
            .expect_get_by_id()
            .returning(|id| Ok(booking(id, 7, BookingStatus::Completed)));
        store.expect_transition().times(0);

        let svc = service(MockEquipmentStore::new(), store, MockPaymentGateway::new());
        let err = svc.cancel(&admin(), 4).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidStateTransition { .. }));
    }

    #[tokio::test]
    async fn deny_twice_is_rejected() {
        let status = Arc::new(std::sync::Mutex::new(BookingStatus::Pending));

        let mut store = MockBookingStore::new();
        let current = status.clone();
        store
            .expect_get_by_id()
            .returning(move |id| Ok(booking(id, 7, *current.lock().unwrap())));
        let current = status.clone();
        store
            .expect_transition()
            .with(eq(4), eq(BookingStatus::Pending), eq(BookingStatus::Cancelled))
            .times(1)
            .returning(move |id, _, to| {
                *current.lock().unwrap() = to;
                Ok(Some(booking(id, 7, to)))
            });

        let svc = service(MockEquipmentStore::new(), store, MockPaymentGateway::new());
        let denied = svc.deny(&admin(), 4).await.unwrap();
        assert_eq!(denied.status, BookingStatus::Cancelled);

        let err = svc.deny(&admin(), 4).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidStateTransition {
                from: BookingStatus::Cancelled,
                action: "deny"
            }
        ));
    }

    #[tokio::test]
    async fn farmers_cannot_accept() {
        let mut store = MockBookingStore::new();
        store.expect_get_by_id().times(0);
        store.expect_transition().times(0);

        let svc = service(MockEquipmentStore::new(), store, MockPaymentGateway::new());
        assert_err!(svc.accept(&farmer(7), 4).await);
    }

    #[tokio::test]
    async fn concurrent_change_surfaces_as_invalid_transition() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut store = MockBookingStore::new();
        store.expect_get_by_id().times(2).returning(move |id| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(booking(id, 7, BookingStatus::Pending))
            } else {
                Ok(booking(id, 7, BookingStatus::InProgress))
            }
        });
        store
            .expect_transition()
            .times(1)
            .returning(|_, _, _| Ok(None));

        let svc = service(MockEquipmentStore::new(), store, MockPaymentGateway::new());
        let err = svc.accept(&admin(), 4).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidStateTransition {
                from: BookingStatus::InProgress,
                action: "accept"
            }
        ));
    }

    #[tokio::test]
    async fn farmer_cannot_set_status() {
        let mut store = MockBookingStore::new();
        store
            .expect_get_by_id()
            .returning(|id| Ok(booking(id, 7, BookingStatus::Pending)));
        store.expect_update().times(0);

        let svc = service(MockEquipmentStore::new(), store, MockPaymentGateway::new());
        let data = UpdateBooking {
            status: Some(BookingStatus::Confirmed),
            ..Default::default()
        };
        let err = svc.update(&farmer(7), 4, data).await.unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }

    #[tokio::test]
    async fn farmer_cannot_edit_confirmed_booking() {
        let mut store = MockBookingStore::new();
        store
            .expect_get_by_id()
            .returning(|id| Ok(booking(id, 7, BookingStatus::Confirmed)));
        store.expect_update().times(0);

        let svc = service(MockEquipmentStore::new(), store, MockPaymentGateway::new());
        let data = UpdateBooking {
            notes: Some("bring fuel".to_string()),
            ..Default::default()
        };
        let err = svc.update(&farmer(7), 4, data).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidStateTransition { .. }));
    }

    #[tokio::test]
    async fn date_change_rederives_total_and_rechecks_overlap() {
        let mut equipment_store = MockEquipmentStore::new();
        equipment_store
            .expect_get_by_id()
            .returning(|id| Ok(equipment(id, 80)));

        let mut store = MockBookingStore::new();
        store
            .expect_get_by_id()
            .returning(|id| Ok(booking(id, 7, BookingStatus::Pending)));
        store
            .expect_find_overlapping()
            .withf(|eq_id, _, exclude| *eq_id == 10 && *exclude == Some(4))
            .times(1)
            .returning(|_, _, _| Ok(vec![]));
        store
            .expect_update()
            .withf(|id, from, changes: &BookingChanges| {
                *id == 4
                    && *from == BookingStatus::Pending
                    && changes.total_amount == Decimal::new(160, 0)
                    && changes.status == BookingStatus::Pending
            })
            .times(1)
            .returning(|id, _, changes| {
                let mut updated = booking(id, 7, changes.status);
                updated.total_amount = changes.total_amount;
                Ok(Some(updated))
            });

        let svc = service(equipment_store, store, MockPaymentGateway::new());
        let data = UpdateBooking {
            end_date: Some(d(2024, 2, 12)),
            ..Default::default()
        };
        let updated = svc.update(&farmer(7), 4, data).await.unwrap();
        assert_eq!(updated.total_amount, Decimal::new(160, 0));
    }

    #[tokio::test]
    async fn payment_confirms_booking() {
        let mut store = MockBookingStore::new();
        store
            .expect_get_by_id()
            .returning(|id| Ok(booking(id, 7, BookingStatus::InProgress)));
        store
            .expect_record_payment()
            .withf(|id, from, to, payment_id| {
                *id == 4
                    && *from == BookingStatus::InProgress
                    && *to == BookingStatus::Confirmed
                    && payment_id.to_string() == "pi_123"
            })
            .times(1)
            .returning(|id, _, to, payment_id| {
                let mut paid = booking(id, 7, to);
                paid.payment_status = PaymentStatus::Paid;
                paid.payment_id = Some(payment_id.to_string());
                paid.payment_date = Some(Utc::now());
                Ok(Some(paid))
            });

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_capture()
            .withf(|req: &CaptureRequest| req.amount == Decimal::new(500, 0) && req.booking_id == 4)
            .times(1)
            .returning(|_| {
                Ok(PaymentReceipt {
                    payment_id: "pi_123".to_string(),
                })
            });

        let svc = service(MockEquipmentStore::new(), store, gateway);
        let paid = svc
            .process_payment(
                &farmer(7),
                ProcessPayment {
                    booking_id: 4,
                    payment_method_id: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(paid.status, BookingStatus::Confirmed);
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert!(paid.payment_date.is_some());
    }

    #[tokio::test]
    async fn admin_confirmed_booking_can_still_be_paid() {
        let mut store = MockBookingStore::new();
        store
            .expect_get_by_id()
            .returning(|id| Ok(booking(id, 7, BookingStatus::Confirmed)));
        store
            .expect_record_payment()
            .withf(|id, from, to, _| {
                *id == 4 && *from == BookingStatus::Confirmed && *to == BookingStatus::Confirmed
            })
            .times(1)
            .returning(|id, _, to, payment_id| {
                let mut paid = booking(id, 7, to);
                paid.payment_status = PaymentStatus::Paid;
                paid.payment_id = Some(payment_id.to_string());
                Ok(Some(paid))
            });

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_capture().times(1).returning(|_| {
            Ok(PaymentReceipt {
                payment_id: "pi_456".to_string(),
            })
        });

        let svc = service(MockEquipmentStore::new(), store, gateway);
        let paid = svc
            .process_payment(
                &farmer(7),
                ProcessPayment {
                    booking_id: 4,
                    payment_method_id: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(paid.status, BookingStatus::Confirmed);
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn active_rental_stays_active_when_paid() {
        let mut store = MockBookingStore::new();
        store
            .expect_get_by_id()
            .returning(|id| Ok(booking(id, 7, BookingStatus::Active)));
        store
            .expect_record_payment()
            .withf(|id, from, to, _| {
                *id == 4 && *from == BookingStatus::Active && *to == BookingStatus::Active
            })
            .times(1)
            .returning(|id, _, to, _| {
                let mut paid = booking(id, 7, to);
                paid.payment_status = PaymentStatus::Paid;
                Ok(Some(paid))
            });

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_capture().times(1).returning(|_| {
            Ok(PaymentReceipt {
                payment_id: "pi_789".to_string(),
            })
        });

        let svc = service(MockEquipmentStore::new(), store, gateway);
        let paid = svc
            .process_payment(
                &admin(),
                ProcessPayment {
                    booking_id: 4,
                    payment_method_id: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(paid.status, BookingStatus::Active);
    }

    #[tokio::test]
    async fn paid_booking_is_not_charged_again() {
        let mut store = MockBookingStore::new();
        store.expect_get_by_id().returning(|id| {
            let mut b = booking(id, 7, BookingStatus::Pending);
            b.payment_status = PaymentStatus::Paid;
            Ok(b)
        });
        store.expect_record_payment().times(0);
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_capture().times(0);

        let svc = service(MockEquipmentStore::new(), store, gateway);
        let err = svc
            .process_payment(
                &farmer(7),
                ProcessPayment {
                    booking_id: 4,
                    payment_method_id: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyPaid(4)));
    }

    #[tokio::test]
    async fn gateway_failure_leaves_booking_untouched() {
        let mut store = MockBookingStore::new();
        store
            .expect_get_by_id()
            .returning(|id| Ok(booking(id, 7, BookingStatus::Pending)));
        store.expect_record_payment().times(0);
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_capture()
            .times(1)
            .returning(|_| Err(AppError::Payment("card declined".to_string())));

        let svc = service(MockEquipmentStore::new(), store, gateway);
        let err = svc
            .process_payment(
                &farmer(7),
                ProcessPayment {
                    booking_id: 4,
                    payment_method_id: Some("pm_card_visa".to_string()),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Payment(_)));
    }

    #[tokio::test]
    async fn reads_sweep_before_listing() {
        let mut seq = Sequence::new();
        let mut store = MockBookingStore::new();
        store
            .expect_promote_by_date()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(SweepOutcome::default()));
        store
            .expect_list_details()
            .with(eq(BookingFilter::Farmer(7)))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![]));

        let svc = service(MockEquipmentStore::new(), store, MockPaymentGateway::new());
        assert_ok!(svc.list_all(&farmer(7)).await);
    }

    #[tokio::test]
    async fn active_listing_is_admin_only() {
        let mut store = MockBookingStore::new();
        store.expect_promote_by_date().times(0);
        store.expect_list_details().times(0);

        let svc = service(MockEquipmentStore::new(), store, MockPaymentGateway::new());
        let err = svc.list_active(&farmer(7)).await.unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }

    #[tokio::test]
    async fn farmer_cannot_view_foreign_booking() {
        let mut store = MockBookingStore::new();
        store
            .expect_promote_by_date()
            .returning(|_| Ok(SweepOutcome::default()));
        store.expect_get_details().returning(|id| {
            Ok(BookingDetails {
                booking: booking(id, 2, BookingStatus::Pending),
                equipment: None,
                farmer: None,
            })
        });

        let svc = service(MockEquipmentStore::new(), store, MockPaymentGateway::new());
        assert!(matches!(
            svc.get(&farmer(7), 4).await,
            Err(AppError::Authorization(_))
        ));
        assert_ok!(svc.get(&admin(), 4).await);
    }
}

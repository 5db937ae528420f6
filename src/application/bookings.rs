use crate::domain::booking::{
    Booking, BookingAction, BookingDetails, BookingStatus, CancellationPolicy,
};
use crate::domain::notification::{Channel, Notification};
use crate::domain::ports::{BookingStoreRef, NotificationBusRef, Swap};
use crate::domain::principal::{Authorizer, Principal};
use crate::error::{DeskError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

/// Largest page the admin listing will return.
pub const MAX_PAGE_SIZE: usize = 100;

/// One page of a listing.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    /// Slices `rows` into the 1-based `page`.
    pub fn slice(rows: Vec<T>, page: usize, page_size: usize) -> Self {
        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let total = rows.len();
        let offset = (page - 1).saturating_mul(page_size);
        let items = rows.into_iter().skip(offset).take(page_size).collect();
        Self {
            items,
            total,
            page,
            page_size,
            total_pages: total.div_ceil(page_size),
        }
    }
}

/// Booking totals per status.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub completed: usize,
    pub cancelled: usize,
}

impl StatusCounts {
    fn tally(bookings: &[Booking]) -> Self {
        let mut counts = Self {
            total: bookings.len(),
            ..Self::default()
        };
        for booking in bookings {
            let slot = match booking.status {
                BookingStatus::Pending => &mut counts.pending,
                BookingStatus::Approved => &mut counts.approved,
                BookingStatus::Rejected => &mut counts.rejected,
                BookingStatus::Completed => &mut counts.completed,
                BookingStatus::Cancelled => &mut counts.cancelled,
            };
            *slot += 1;
        }
        counts
    }
}

/// Owns the booking lifecycle.
///
/// Every mutation is computed from a fresh read and committed with a
/// status-guarded swap, so of two concurrent actions on the same booking at
/// most one wins. Events go out only after the write returned.
#[derive(Clone)]
pub struct BookingService {
    store: BookingStoreRef,
    bus: NotificationBusRef,
    authorizer: Authorizer,
    cancellation: CancellationPolicy,
}

impl BookingService {
    pub fn new(
        store: BookingStoreRef,
        bus: NotificationBusRef,
        authorizer: Authorizer,
        cancellation: CancellationPolicy,
    ) -> Self {
        Self {
            store,
            bus,
            authorizer,
            cancellation,
        }
    }

    pub async fn create(&self, principal: &Principal, details: BookingDetails) -> Result<Booking> {
        let booking = Booking::new(&principal.id, details, Utc::now())?;
        self.store.insert(booking.clone()).await?;
        info!(
            booking_id = %booking.id,
            requester = %booking.requester,
            service_type = %booking.service_type,
            amount = %booking.amount,
            "Booking created"
        );

        self.bus
            .publish(Notification::new(
                Channel::Admin,
                "booking-created",
                json!({ "booking": booking }),
            ))
            .await;
        Ok(booking)
    }

    /// Returns the booking if the caller owns it or is admin. Anyone else gets
    /// `NotFound`, same as for an unknown id.
    pub async fn get(&self, principal: &Principal, id: Uuid) -> Result<Booking> {
        match self.store.get(id).await? {
            Some(booking) if self.authorizer.can_access(principal, &booking.requester) => {
                Ok(booking)
            }
            _ => Err(DeskError::not_found("Booking", id)),
        }
    }

    /// Bookings of one requester, newest first.
    pub async fn list_for_requester(
        &self,
        principal: &Principal,
        requester: &str,
    ) -> Result<Vec<Booking>> {
        self.authorizer.require_self_or_admin(principal, requester)?;
        let bookings = self.store.all().await?;
        Ok(bookings
            .into_iter()
            .filter(|b| b.requester == requester)
            .collect())
    }

    /// Admin listing, newest first, optionally filtered by status.
    pub async fn list_for_admin(
        &self,
        principal: &Principal,
        status: Option<BookingStatus>,
        page: usize,
        page_size: usize,
    ) -> Result<Page<Booking>> {
        self.authorizer.require_admin(principal)?;
        let bookings: Vec<Booking> = self
            .store
            .all()
            .await?
            .into_iter()
            .filter(|b| status.is_none_or(|s| b.status == s))
            .collect();
        Ok(Page::slice(bookings, page, page_size))
    }

    /// Pending bookings, oldest first.
    pub async fn pending_queue(&self, principal: &Principal) -> Result<Vec<Booking>> {
        self.authorizer.require_admin(principal)?;
        let mut pending: Vec<Booking> = self
            .store
            .all()
            .await?
            .into_iter()
            .filter(|b| b.status == BookingStatus::Pending)
            .collect();
        pending.sort_by_key(|b| b.created_at);
        Ok(pending)
    }

    pub async fn status_counts(&self, principal: &Principal) -> Result<StatusCounts> {
        self.authorizer.require_admin(principal)?;
        Ok(StatusCounts::tally(&self.store.all().await?))
    }

    pub async fn approve(
        &self,
        principal: &Principal,
        id: Uuid,
        notes: Option<String>,
        estimated_completion: Option<DateTime<Utc>>,
        assigned_truck: Option<String>,
    ) -> Result<Booking> {
        self.authorizer.require_admin(principal)?;
        let action = BookingAction::Approve {
            notes,
            estimated_completion,
            assigned_truck,
        };
        self.apply(principal, id, action).await
    }

    pub async fn reject(
        &self,
        principal: &Principal,
        id: Uuid,
        notes: Option<String>,
        reason: Option<String>,
    ) -> Result<Booking> {
        self.authorizer.require_admin(principal)?;
        self.apply(principal, id, BookingAction::Reject { notes, reason })
            .await
    }

    pub async fn complete(
        &self,
        principal: &Principal,
        id: Uuid,
        notes: Option<String>,
        completion_notes: Option<String>,
    ) -> Result<Booking> {
        self.authorizer.require_admin(principal)?;
        let action = BookingAction::Complete {
            notes,
            completion_notes,
        };
        self.apply(principal, id, action).await
    }

    /// Requester-initiated cancel. Which statuses can be cancelled is decided
    /// by the configured [`CancellationPolicy`].
    pub async fn cancel(&self, principal: &Principal, id: Uuid) -> Result<Booking> {
        let booking = self.owned(principal, id, "cancel").await?;
        self.commit(principal, booking, BookingAction::Cancel).await
    }

    /// Requester edit of a pending booking. The amount is re-priced from the
    /// resulting service type.
    pub async fn update_details(
        &self,
        principal: &Principal,
        id: Uuid,
        details: BookingDetails,
    ) -> Result<Booking> {
        let booking = self.owned(principal, id, "edit").await?;
        let next = booking.with_details(details, Utc::now())?;
        let updated = self.swap(&booking, next, "edit").await?;

        info!(
            booking_id = %updated.id,
            service_type = %updated.service_type,
            amount = %updated.amount,
            "Booking edited"
        );
        self.announce(&updated, "edited").await;
        Ok(updated)
    }

    /// Loads a booking the caller must own. An admin who is not the owner is
    /// refused; anyone else sees `NotFound`.
    async fn owned(&self, principal: &Principal, id: Uuid, verb: &str) -> Result<Booking> {
        let booking = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| DeskError::not_found("Booking", id))?;
        if booking.requester == principal.id {
            Ok(booking)
        } else if principal.is_admin() {
            Err(DeskError::Forbidden(format!(
                "Only the requester can {verb} a booking"
            )))
        } else {
            Err(DeskError::not_found("Booking", id))
        }
    }

    async fn apply(&self, actor: &Principal, id: Uuid, action: BookingAction) -> Result<Booking> {
        let current = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| DeskError::not_found("Booking", id))?;
        self.commit(actor, current, action).await
    }

    async fn commit(
        &self,
        actor: &Principal,
        current: Booking,
        action: BookingAction,
    ) -> Result<Booking> {
        let next = current.transition(&action, &actor.id, self.cancellation, Utc::now())?;
        let updated = self.swap(&current, next, action.name()).await?;

        info!(
            booking_id = %updated.id,
            actor = %actor.id,
            from = %current.status,
            to = %updated.status,
            "Booking {}",
            action.outcome()
        );
        self.announce(&updated, action.outcome()).await;
        Ok(updated)
    }

    /// Commits `next` only if the stored status still equals `current`'s.
    async fn swap(&self, current: &Booking, next: Booking, action: &'static str) -> Result<Booking> {
        match self.store.swap_if_status(current.status, next).await? {
            Swap::Applied(updated) => Ok(updated),
            Swap::Stale { current: status } => {
                warn!(
                    booking_id = %current.id,
                    action,
                    %status,
                    "Lost a concurrent booking update"
                );
                Err(DeskError::InvalidStateTransition {
                    entity: "booking",
                    from: status.to_string(),
                    action,
                })
            }
            Swap::Missing => Err(DeskError::not_found("Booking", current.id)),
        }
    }

    async fn announce(&self, booking: &Booking, outcome: &str) {
        self.bus
            .publish(Notification::new(
                Channel::user(booking.requester.clone()),
                "booking-updated",
                json!({ "action": outcome, "booking": booking }),
            ))
            .await;
        self.bus
            .publish(Notification::new(
                Channel::Admin,
                format!("booking-{outcome}"),
                json!({ "booking": booking }),
            ))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::principal::Role;
    use crate::infrastructure::broadcast::ChannelBus;
    use crate::infrastructure::in_memory::InMemoryBookingStore;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn service(bus: &ChannelBus, cancellation: CancellationPolicy) -> BookingService {
        BookingService::new(
            Arc::new(InMemoryBookingStore::new()),
            Arc::new(bus.clone()),
            Authorizer::default(),
            cancellation,
        )
    }

    fn details(service_type: &str) -> BookingDetails {
        BookingDetails {
            service_type: Some(service_type.to_string()),
            ..BookingDetails::default()
        }
    }

    #[tokio::test]
    async fn test_create_prices_and_announces() {
        let bus = ChannelBus::new();
        let mut admin_feed = bus.subscribe(Channel::Admin).await;
        let bookings = service(&bus, CancellationPolicy::PendingOnly);

        let booking = bookings
            .create(&Principal::customer("u1"), details("oil_change"))
            .await
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.amount, dec!(2500));
        assert_eq!(admin_feed.recv().await.unwrap().event_name, "booking-created");
    }

    #[tokio::test]
    async fn test_get_hides_foreign_bookings() {
        let bus = ChannelBus::new();
        let bookings = service(&bus, CancellationPolicy::PendingOnly);
        let booking = bookings
            .create(&Principal::customer("u1"), details("tire_change"))
            .await
            .unwrap();

        let err = bookings
            .get(&Principal::customer("u2"), booking.id)
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::NotFound { .. }));
        assert!(bookings.get(&Principal::admin("a1"), booking.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_customer_cannot_approve() {
        let bus = ChannelBus::new();
        let bookings = service(&bus, CancellationPolicy::PendingOnly);
        let booking = bookings
            .create(&Principal::customer("u1"), details("oil_change"))
            .await
            .unwrap();

        let err = bookings
            .approve(&Principal::customer("u1"), booking.id, None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_cancel_respects_policy() {
        let bus = ChannelBus::new();
        let owner = Principal::customer("u1");
        let admin = Principal {
            id: "a1".to_string(),
            role: Role::Admin,
        };

        let strict = service(&bus, CancellationPolicy::PendingOnly);
        let booking = strict.create(&owner, details("oil_change")).await.unwrap();
        strict.approve(&admin, booking.id, None, None, None).await.unwrap();
        let err = strict.cancel(&owner, booking.id).await.unwrap_err();
        assert!(err.is_conflict());

        let lenient = service(&bus, CancellationPolicy::UntilCompleted);
        let booking = lenient.create(&owner, details("oil_change")).await.unwrap();
        lenient.approve(&admin, booking.id, None, None, None).await.unwrap();
        let cancelled = lenient.cancel(&owner, booking.id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_update_details_reprices_pending_booking() {
        let bus = ChannelBus::new();
        let mut owner_feed = bus.subscribe(Channel::user("u1")).await;
        let bookings = service(&bus, CancellationPolicy::PendingOnly);
        let owner = Principal::customer("u1");
        let booking = bookings.create(&owner, details("oil_change")).await.unwrap();

        let edited = bookings
            .update_details(&owner, booking.id, details("battery_replacement"))
            .await
            .unwrap();
        assert_eq!(edited.amount, dec!(4500));
        assert_eq!(bookings.get(&owner, booking.id).await.unwrap(), edited);

        let event = owner_feed.recv().await.unwrap();
        assert_eq!(event.event_name, "booking-updated");
        assert_eq!(event.payload["action"], "edited");

        let stranger = bookings
            .update_details(&Principal::customer("u2"), booking.id, details("oil_change"))
            .await
            .unwrap_err();
        assert!(matches!(stranger, DeskError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_details_refused_after_approval() {
        let bus = ChannelBus::new();
        let bookings = service(&bus, CancellationPolicy::PendingOnly);
        let owner = Principal::customer("u1");
        let booking = bookings.create(&owner, details("oil_change")).await.unwrap();
        let approved = bookings
            .approve(&Principal::admin("a1"), booking.id, None, None, None)
            .await
            .unwrap();

        let err = bookings
            .update_details(&owner, booking.id, details("engine_repair"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(bookings.get(&owner, booking.id).await.unwrap(), approved);
    }

    #[tokio::test]
    async fn test_pending_queue_is_oldest_first() {
        let bus = ChannelBus::new();
        let bookings = service(&bus, CancellationPolicy::PendingOnly);
        let customer = Principal::customer("u1");
        let first = bookings.create(&customer, details("oil_change")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = bookings.create(&customer, details("brake_service")).await.unwrap();

        let queue = bookings.pending_queue(&Principal::admin("a1")).await.unwrap();
        let ids: Vec<Uuid> = queue.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[test]
    fn test_page_slice() {
        let page = Page::slice((1..=45).collect::<Vec<_>>(), 3, 20);
        assert_eq!(page.items, (41..=45).collect::<Vec<_>>());
        assert_eq!(page.total, 45);
        assert_eq!(page.total_pages, 3);

        let empty = Page::slice(Vec::<u8>::new(), 0, 0);
        assert_eq!(empty.page, 1);
        assert_eq!(empty.page_size, 1);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn test_page_slice_far_past_the_end() {
        let page = Page::slice((1..=5).collect::<Vec<_>>(), usize::MAX, 20);
        assert!(page.items.is_empty());
        assert_eq!(page.page, usize::MAX);
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 1);
    }
}

#![allow(dead_code)]

use dispatchdesk::application::payments::{Gateways, PaymentSettings};
use dispatchdesk::application::{Desk, Stores};
use dispatchdesk::domain::bank_account::{AccountType, NewBankAccount};
use dispatchdesk::domain::booking::{BookingDetails, CancellationPolicy};
use dispatchdesk::domain::notification::Notification;
use dispatchdesk::domain::principal::{Authorizer, Principal};
use dispatchdesk::infrastructure::broadcast::ChannelBus;
use std::time::Duration;
use tokio::sync::broadcast;

pub const MOCK_DELAY: Duration = Duration::from_millis(50);

/// In-memory desk with a short mock settlement delay and no real gateways.
pub fn desk() -> Desk {
    desk_with(Stores::in_memory(), Gateways::default())
}

pub fn desk_with(stores: Stores, gateways: Gateways) -> Desk {
    Desk::new(
        stores,
        ChannelBus::new(),
        gateways,
        Authorizer::default(),
        CancellationPolicy::PendingOnly,
        PaymentSettings {
            currency: "KES".to_string(),
            mock_settlement_delay: MOCK_DELAY,
        },
    )
}

pub fn customer(id: &str) -> Principal {
    Principal::customer(id)
}

pub fn admin() -> Principal {
    Principal::admin("admin-1")
}

pub fn details(service_type: &str) -> BookingDetails {
    BookingDetails {
        service_type: Some(service_type.to_string()),
        location: Some("Ngong Road".to_string()),
        ..Default::default()
    }
}

pub fn new_account(name: &str, is_default: bool) -> NewBankAccount {
    NewBankAccount {
        account_name: name.to_string(),
        account_number: "0011223344".to_string(),
        bank_name: "KCB".to_string(),
        bank_code: "01".to_string(),
        account_type: AccountType::Business,
        is_default,
        admin_notes: None,
    }
}

/// Everything already delivered to `rx`, without waiting.
pub fn drain(rx: &mut broadcast::Receiver<Notification>) -> Vec<Notification> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

pub fn names(events: &[Notification]) -> Vec<&str> {
    events.iter().map(|n| n.event_name.as_str()).collect()
}

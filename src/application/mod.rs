//! Application layer: the services behind every desk operation.
//!
//! [`Desk`] wires the services to one set of stores, one notification bus and
//! the configured payment gateways. Both the HTTP interface and the tests
//! build on it.

pub mod admin;
pub mod bookings;
pub mod payments;
pub mod reconciliation;

use crate::config::{Config, RoleSource};
use crate::domain::booking::CancellationPolicy;
use crate::domain::ports::{BankAccountStoreRef, BookingStoreRef, PaymentStoreRef};
use crate::domain::principal::{Authorizer, ClaimRolePolicy, RolePolicy, TableRolePolicy};
use crate::error::Result;
use crate::infrastructure::broadcast::ChannelBus;
use crate::infrastructure::in_memory::{
    InMemoryBankAccountStore, InMemoryBookingStore, InMemoryPaymentStore,
};
use crate::infrastructure::providers::daraja::DarajaClient;
use crate::infrastructure::providers::paypal::PayPalClient;
use admin::AdminDesk;
use bookings::BookingService;
use payments::{Gateways, PaymentAdapter, PaymentSettings};
use reconciliation::Reconciler;
use std::sync::Arc;
use tracing::info;

/// The storage backends a desk runs on.
#[derive(Clone)]
pub struct Stores {
    pub bookings: BookingStoreRef,
    pub payments: PaymentStoreRef,
    pub bank_accounts: BankAccountStoreRef,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            bookings: Arc::new(InMemoryBookingStore::new()),
            payments: Arc::new(InMemoryPaymentStore::new()),
            bank_accounts: Arc::new(InMemoryBankAccountStore::new()),
        }
    }

    #[cfg(feature = "storage-rocksdb")]
    pub fn rocksdb<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let store = crate::infrastructure::rocksdb::RocksDBStore::open(path)?;
        Ok(Self {
            bookings: Arc::new(store.clone()),
            payments: Arc::new(store.clone()),
            bank_accounts: Arc::new(store),
        })
    }
}

/// Everything an interface needs to serve requests.
#[derive(Clone)]
pub struct Desk {
    pub bookings: BookingService,
    pub payments: PaymentAdapter,
    pub reconciler: Reconciler,
    pub admin: AdminDesk,
    pub authorizer: Authorizer,
    pub bus: ChannelBus,
}

impl Desk {
    /// Wires the services with explicit gateways and policies.
    pub fn new(
        stores: Stores,
        bus: ChannelBus,
        gateways: Gateways,
        authorizer: Authorizer,
        cancellation: CancellationPolicy,
        settings: PaymentSettings,
    ) -> Self {
        let publisher = Arc::new(bus.clone());
        let reconciler = Reconciler::new(stores.payments.clone(), publisher.clone());
        let bookings = BookingService::new(
            stores.bookings,
            publisher.clone(),
            authorizer.clone(),
            cancellation,
        );
        let payments = PaymentAdapter::new(
            stores.payments.clone(),
            stores.bank_accounts.clone(),
            publisher.clone(),
            reconciler.clone(),
            gateways,
            authorizer.clone(),
            settings,
        );
        let admin = AdminDesk::new(
            bookings.clone(),
            stores.payments,
            reconciler.clone(),
            stores.bank_accounts,
            publisher,
            authorizer.clone(),
        );

        Self {
            bookings,
            payments,
            reconciler,
            admin,
            authorizer,
            bus,
        }
    }

    /// Wires the services from configuration, creating a gateway client for
    /// every provider block that is fully configured.
    pub fn from_config(config: &Config, stores: Stores) -> Result<Self> {
        let timeout = config.payments.provider_timeout();
        let mut gateways = Gateways::default();
        if let Some(daraja) = &config.daraja {
            gateways.mobile_money = Some(Arc::new(DarajaClient::new(daraja.clone(), timeout)?));
            info!(base_url = %daraja.base_url, "Mobile money gateway enabled");
        }
        if let Some(paypal) = &config.paypal {
            gateways.checkout = Some(Arc::new(PayPalClient::new(paypal.clone(), timeout)?));
            info!(base_url = %paypal.base_url, "PayPal gateway enabled");
        }

        let policy: Arc<dyn RolePolicy> = match config.policy.role_source {
            RoleSource::Claim => Arc::new(ClaimRolePolicy),
            RoleSource::Table => Arc::new(TableRolePolicy::new(config.policy.admin_ids.clone())),
        };

        Ok(Self::new(
            stores,
            ChannelBus::new(),
            gateways,
            Authorizer::new(policy),
            config.policy.cancellation,
            PaymentSettings {
                currency: config.payments.currency.clone(),
                mock_settlement_delay: config.payments.mock_settlement_delay(),
            },
        ))
    }
}

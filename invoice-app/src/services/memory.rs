//! In-memory store with the same owner scoping as [`Database`].
//!
//! Used by the router tests and local runs without PostgreSQL.
//!
//! [`Database`]: crate::services::Database

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::Identity;
use crate::models::{
    Address, Invoice, InvoiceCountFilter, InvoiceDetails, InvoiceInput, LineItem, PageRequest,
    RecentInvoice, RevenueSample, Settings, SettingsDetails, SettingsInput, Signature, UpdateUser,
    User,
};
use crate::services::store::{InvoiceStore, SettingsStore, Store, UserStore};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    addresses: HashMap<Uuid, Address>,
    /// Creation order.
    invoices: Vec<Invoice>,
    items: HashMap<Uuid, Vec<LineItem>>,
    settings: HashMap<Uuid, SettingsDetails>,
}

impl State {
    fn owned(&self, user_id: Uuid, invoice_id: Uuid) -> Option<&Invoice> {
        self.invoices
            .iter()
            .find(|i| i.invoice_id == invoice_id && i.user_id == user_id)
    }

    fn address(&self, address_id: Uuid) -> Result<Address, AppError> {
        self.addresses.get(&address_id).cloned().ok_or_else(|| {
            AppError::DatabaseError(anyhow::anyhow!("Address {} is missing", address_id))
        })
    }

    fn details(&self, invoice: &Invoice) -> Result<InvoiceDetails, AppError> {
        Ok(InvoiceDetails {
            invoice: invoice.clone(),
            from: self.address(invoice.from_address_id)?,
            to: self.address(invoice.to_address_id)?,
            items: self.items.get(&invoice.invoice_id).cloned().unwrap_or_default(),
        })
    }

    /// Owner's invoices, newest first.
    fn newest_first(&self, user_id: Uuid) -> impl Iterator<Item = &Invoice> {
        self.invoices.iter().rev().filter(move |i| i.user_id == user_id)
    }
}

fn build_items(invoice_id: Uuid, input: &InvoiceInput) -> Vec<LineItem> {
    input
        .items
        .iter()
        .enumerate()
        .map(|(position, item)| item.to_line_item(Uuid::new_v4(), invoice_id, position as i32))
        .collect()
}

#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Every stored line item of an invoice, regardless of owner.
    pub async fn stored_line_items(&self, invoice_id: Uuid) -> Vec<LineItem> {
        self.state
            .read()
            .await
            .items
            .get(&invoice_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn address_count(&self) -> usize {
        self.state.read().await.addresses.len()
    }

    fn available(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "in-memory store marked unavailable"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl InvoiceStore for InMemoryStore {
    async fn create_invoice(
        &self,
        user_id: Uuid,
        input: &InvoiceInput,
    ) -> Result<InvoiceDetails, AppError> {
        self.available()?;
        let now = Utc::now();
        let from = input.from.to_address(Uuid::new_v4(), now);
        let to = input.to.to_address(Uuid::new_v4(), now);
        let invoice_id = Uuid::new_v4();

        let invoice = Invoice {
            invoice_id,
            user_id,
            invoice_no: input.invoice_no.clone(),
            invoice_date: input.invoice_date,
            due_date: input.due_date,
            currency: input.currency_or_default(),
            from_address_id: from.address_id,
            to_address_id: to.address_id,
            sub_total: input.sub_total,
            discount: input.discount,
            tax_percentage: input.tax_percentage,
            total: input.total,
            notes: input.notes.clone(),
            status: input.status_or_default(),
            created_utc: now,
            updated_utc: now,
        };
        let items = build_items(invoice_id, input);

        let mut state = self.state.write().await;
        state.addresses.insert(from.address_id, from.clone());
        state.addresses.insert(to.address_id, to.clone());
        state.items.insert(invoice_id, items.clone());
        state.invoices.push(invoice.clone());

        Ok(InvoiceDetails {
            invoice,
            from,
            to,
            items,
        })
    }

    async fn get_invoice(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<InvoiceDetails>, AppError> {
        self.available()?;
        let state = self.state.read().await;
        state
            .owned(user_id, invoice_id)
            .map(|invoice| state.details(invoice))
            .transpose()
    }

    async fn replace_invoice(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        input: &InvoiceInput,
    ) -> Result<Option<InvoiceDetails>, AppError> {
        self.available()?;
        let mut state = self.state.write().await;
        let Some(position) = state
            .invoices
            .iter()
            .position(|i| i.invoice_id == invoice_id && i.user_id == user_id)
        else {
            return Ok(None);
        };

        let mut invoice = state.invoices[position].clone();
        for (address_id, data) in [
            (invoice.from_address_id, &input.from),
            (invoice.to_address_id, &input.to),
        ] {
            let created_utc = state.address(address_id)?.created_utc;
            state
                .addresses
                .insert(address_id, data.to_address(address_id, created_utc));
        }

        invoice.invoice_no = input.invoice_no.clone();
        invoice.invoice_date = input.invoice_date;
        invoice.due_date = input.due_date;
        if let Some(currency) = &input.currency {
            invoice.currency = currency.to_ascii_uppercase();
        }
        invoice.sub_total = input.sub_total;
        if input.discount.is_some() {
            invoice.discount = input.discount;
        }
        if input.tax_percentage.is_some() {
            invoice.tax_percentage = input.tax_percentage;
        }
        invoice.total = input.total;
        if input.notes.is_some() {
            invoice.notes = input.notes.clone();
        }
        if let Some(status) = input.status {
            invoice.status = status;
        }
        invoice.updated_utc = Utc::now();

        state.items.insert(invoice_id, build_items(invoice_id, input));
        state.invoices[position] = invoice.clone();

        state.details(&invoice).map(Some)
    }

    async fn list_invoices(
        &self,
        user_id: Uuid,
        page: &PageRequest,
    ) -> Result<Vec<InvoiceDetails>, AppError> {
        self.available()?;
        let state = self.state.read().await;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        state
            .newest_first(user_id)
            .skip(offset)
            .take(page.limit() as usize)
            .map(|invoice| state.details(invoice))
            .collect()
    }

    async fn count_invoices(
        &self,
        user_id: Uuid,
        filter: &InvoiceCountFilter,
    ) -> Result<i64, AppError> {
        self.available()?;
        let state = self.state.read().await;
        let count = state
            .newest_first(user_id)
            .filter(|i| filter.since.map_or(true, |since| i.invoice_date >= since))
            .filter(|i| filter.status.map_or(true, |status| i.status == status))
            .count();
        Ok(count as i64)
    }

    async fn revenue_samples(
        &self,
        user_id: Uuid,
        since: NaiveDate,
    ) -> Result<Vec<RevenueSample>, AppError> {
        self.available()?;
        let state = self.state.read().await;
        let mut samples: Vec<RevenueSample> = state
            .invoices
            .iter()
            .filter(|i| i.user_id == user_id && i.invoice_date >= since)
            .map(|i| RevenueSample {
                invoice_date: i.invoice_date,
                total: i.total,
                status: i.status,
            })
            .collect();
        // Stable: ties keep creation order.
        samples.sort_by_key(|s| s.invoice_date);
        Ok(samples)
    }

    async fn recent_invoices(
        &self,
        user_id: Uuid,
        limit: u32,
    ) -> Result<Vec<RecentInvoice>, AppError> {
        self.available()?;
        let state = self.state.read().await;
        state
            .newest_first(user_id)
            .take(limit as usize)
            .map(|invoice| -> Result<RecentInvoice, AppError> {
                Ok(RecentInvoice {
                    invoice: invoice.clone(),
                    from: state.address(invoice.from_address_id)?,
                    to: state.address(invoice.to_address_id)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl SettingsStore for InMemoryStore {
    async fn get_settings(&self, user_id: Uuid) -> Result<Option<SettingsDetails>, AppError> {
        self.available()?;
        Ok(self.state.read().await.settings.get(&user_id).cloned())
    }

    async fn upsert_settings(
        &self,
        user_id: Uuid,
        input: &SettingsInput,
    ) -> Result<SettingsDetails, AppError> {
        self.available()?;
        let now = Utc::now();
        let mut state = self.state.write().await;
        let entry = state
            .settings
            .entry(user_id)
            .or_insert_with(|| SettingsDetails {
                settings: Settings {
                    settings_id: Uuid::new_v4(),
                    user_id,
                    invoice_logo: None,
                    created_utc: now,
                    updated_utc: now,
                },
                signature: None,
            });

        if input.invoice_logo.is_some() {
            entry.settings.invoice_logo = input.invoice_logo.clone();
        }
        entry.settings.updated_utc = now;

        if let Some(data) = &input.signature {
            let settings_id = entry.settings.settings_id;
            let signature = entry.signature.get_or_insert_with(|| Signature {
                signature_id: Uuid::new_v4(),
                settings_id,
                name: None,
                image: None,
            });
            if data.name.is_some() {
                signature.name = data.name.clone();
            }
            if data.image.is_some() {
                signature.image = data.image.clone();
            }
        }

        Ok(entry.clone())
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn ensure_user(&self, identity: &Identity) -> Result<User, AppError> {
        self.available()?;
        let mut state = self.state.write().await;
        if let Some(user) = state.users.get(&identity.id) {
            return Ok(user.clone());
        }
        if state.users.values().any(|u| u.email == identity.email) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Email already registered"
            )));
        }
        let now = Utc::now();
        let user = User {
            user_id: identity.id,
            email: identity.email.clone(),
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            image: None,
            currency: identity.currency.clone(),
            role: identity.role,
            created_utc: now,
            updated_utc: now,
        };
        state.users.insert(user.user_id, user.clone());
        Ok(user)
    }

    async fn update_user(
        &self,
        user_id: Uuid,
        update: &UpdateUser,
    ) -> Result<Option<User>, AppError> {
        self.available()?;
        let mut state = self.state.write().await;
        let Some(user) = state.users.get_mut(&user_id) else {
            return Ok(None);
        };
        if update.first_name.is_some() {
            user.first_name = update.first_name.clone();
        }
        if update.last_name.is_some() {
            user.last_name = update.last_name.clone();
        }
        if let Some(currency) = update.normalized_currency() {
            user.currency = Some(currency);
        }
        user.updated_utc = Utc::now();
        Ok(Some(user.clone()))
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        self.available()
    }
}

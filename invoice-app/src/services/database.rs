//! PostgreSQL store for invoice-app.

use async_trait::async_trait;
use chrono::NaiveDate;
use service_core::error::AppError;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::Identity;
use crate::models::{
    Address, AddressInput, Invoice, InvoiceCountFilter, InvoiceDetails, InvoiceInput, LineItem,
    LineItemInput, PageRequest, RecentInvoice, RevenueSample, Settings, SettingsDetails,
    SettingsInput, Signature, UpdateUser, User,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::{InvoiceStore, SettingsStore, Store, UserStore};

const INVOICE_COLUMNS: &str = "invoice_id, user_id, invoice_no, invoice_date, due_date, currency, \
     from_address_id, to_address_id, sub_total, discount, tax_percentage, total, notes, status, \
     created_utc, updated_utc";

const ADDRESS_COLUMNS: &str =
    "address_id, name, email, address1, address2, address3, created_utc";

const LINE_ITEM_COLUMNS: &str =
    "line_item_id, invoice_id, item_name, quantity, price, total, sort_order";

const SETTINGS_COLUMNS: &str = "settings_id, user_id, invoice_logo, created_utc, updated_utc";

const SIGNATURE_COLUMNS: &str = "signature_id, settings_id, name, image";

const USER_COLUMNS: &str =
    "user_id, email, first_name, last_name, image, currency, role, created_utc, updated_utc";

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::DatabaseError(anyhow::anyhow!("{}: {}", context, e))
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "invoice-app"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(db_error("Failed to connect"))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Wrap an already configured pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Attach addresses and items to a batch of invoices, keeping their order.
    async fn load_details(&self, invoices: Vec<Invoice>) -> Result<Vec<InvoiceDetails>, AppError> {
        if invoices.is_empty() {
            return Ok(Vec::new());
        }

        let invoice_ids: Vec<Uuid> = invoices.iter().map(|i| i.invoice_id).collect();
        let mut addresses = self.load_addresses(&invoices).await?;

        let items = sqlx::query_as::<_, LineItem>(&format!(
            "SELECT {LINE_ITEM_COLUMNS} FROM line_items WHERE invoice_id = ANY($1) \
             ORDER BY invoice_id, sort_order"
        ))
        .bind(&invoice_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to load line items"))?;

        let mut items_by_invoice: HashMap<Uuid, Vec<LineItem>> = HashMap::new();
        for item in items {
            items_by_invoice.entry(item.invoice_id).or_default().push(item);
        }

        invoices
            .into_iter()
            .map(|invoice| -> Result<InvoiceDetails, AppError> {
                let (from, to) = take_parties(&mut addresses, &invoice)?;
                let items = items_by_invoice.remove(&invoice.invoice_id).unwrap_or_default();
                Ok(InvoiceDetails {
                    invoice,
                    from,
                    to,
                    items,
                })
            })
            .collect()
    }

    async fn load_addresses(
        &self,
        invoices: &[Invoice],
    ) -> Result<HashMap<Uuid, Address>, AppError> {
        let address_ids: Vec<Uuid> = invoices
            .iter()
            .flat_map(|i| [i.from_address_id, i.to_address_id])
            .collect();

        let addresses = sqlx::query_as::<_, Address>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE address_id = ANY($1)"
        ))
        .bind(&address_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to load addresses"))?;

        Ok(addresses.into_iter().map(|a| (a.address_id, a)).collect())
    }
}

fn take_parties(
    addresses: &mut HashMap<Uuid, Address>,
    invoice: &Invoice,
) -> Result<(Address, Address), AppError> {
    let mut take = |id: Uuid| {
        addresses.remove(&id).ok_or_else(|| {
            AppError::DatabaseError(anyhow::anyhow!(
                "Address {} of invoice {} is missing",
                id,
                invoice.invoice_id
            ))
        })
    };
    let from = take(invoice.from_address_id)?;
    let to = take(invoice.to_address_id)?;
    Ok((from, to))
}

async fn insert_address(
    conn: &mut PgConnection,
    input: &AddressInput,
) -> Result<Address, AppError> {
    sqlx::query_as::<_, Address>(&format!(
        "INSERT INTO addresses (address_id, name, email, address1, address2, address3) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING {ADDRESS_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&input.name)
    .bind(&input.email)
    .bind(&input.address1)
    .bind(&input.address2)
    .bind(&input.address3)
    .fetch_one(conn)
    .await
    .map_err(db_error("Failed to create address"))
}

async fn overwrite_address(
    conn: &mut PgConnection,
    address_id: Uuid,
    input: &AddressInput,
) -> Result<Address, AppError> {
    sqlx::query_as::<_, Address>(&format!(
        "UPDATE addresses SET name = $2, email = $3, address1 = $4, address2 = $5, address3 = $6 \
         WHERE address_id = $1 RETURNING {ADDRESS_COLUMNS}"
    ))
    .bind(address_id)
    .bind(&input.name)
    .bind(&input.email)
    .bind(&input.address1)
    .bind(&input.address2)
    .bind(&input.address3)
    .fetch_one(conn)
    .await
    .map_err(db_error("Failed to update address"))
}

async fn insert_line_items(
    conn: &mut PgConnection,
    invoice_id: Uuid,
    items: &[LineItemInput],
) -> Result<Vec<LineItem>, AppError> {
    let mut inserted = Vec::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        let line_item = sqlx::query_as::<_, LineItem>(&format!(
            "INSERT INTO line_items (line_item_id, invoice_id, item_name, quantity, price, total, sort_order) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {LINE_ITEM_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(invoice_id)
        .bind(&item.item_name)
        .bind(item.quantity)
        .bind(item.price)
        .bind(item.total)
        .bind(position as i32)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_error("Failed to create line item"))?;
        inserted.push(line_item);
    }
    Ok(inserted)
}

#[async_trait]
impl InvoiceStore for Database {
    #[instrument(skip(self, input), fields(user_id = %user_id))]
    async fn create_invoice(
        &self,
        user_id: Uuid,
        input: &InvoiceInput,
    ) -> Result<InvoiceDetails, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        let from = insert_address(&mut tx, &input.from).await?;
        let to = insert_address(&mut tx, &input.to).await?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (
                invoice_id, user_id, invoice_no, invoice_date, due_date, currency,
                from_address_id, to_address_id, sub_total, discount, tax_percentage, total,
                notes, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&input.invoice_no)
        .bind(input.invoice_date)
        .bind(input.due_date)
        .bind(input.currency_or_default())
        .bind(from.address_id)
        .bind(to.address_id)
        .bind(input.sub_total)
        .bind(input.discount)
        .bind(input.tax_percentage)
        .bind(input.total)
        .bind(&input.notes)
        .bind(input.status_or_default().as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("Failed to create invoice"))?;

        let items = insert_line_items(&mut tx, invoice.invoice_id, &input.items).await?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit invoice"))?;

        timer.observe_duration();

        info!(invoice_id = %invoice.invoice_id, items = items.len(), "Invoice created");

        Ok(InvoiceDetails {
            invoice,
            from,
            to,
            items,
        })
    }

    #[instrument(skip(self), fields(user_id = %user_id, invoice_id = %invoice_id))]
    async fn get_invoice(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<InvoiceDetails>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE invoice_id = $1 AND user_id = $2"
        ))
        .bind(invoice_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get invoice"))?;

        let details = match invoice {
            Some(invoice) => self.load_details(vec![invoice]).await?.pop(),
            None => None,
        };

        timer.observe_duration();

        Ok(details)
    }

    #[instrument(skip(self, input), fields(user_id = %user_id, invoice_id = %invoice_id))]
    async fn replace_invoice(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        input: &InvoiceInput,
    ) -> Result<Option<InvoiceDetails>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["replace_invoice"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        // Row lock serialises concurrent edits of the same invoice.
        let existing = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE invoice_id = $1 AND user_id = $2 FOR UPDATE"
        ))
        .bind(invoice_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("Failed to lock invoice"))?;

        let Some(existing) = existing else {
            tx.rollback().await.ok();
            timer.observe_duration();
            return Ok(None);
        };

        let from = overwrite_address(&mut tx, existing.from_address_id, &input.from).await?;
        let to = overwrite_address(&mut tx, existing.to_address_id, &input.to).await?;

        sqlx::query("DELETE FROM line_items WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to delete line items"))?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET invoice_no = $3,
                invoice_date = $4,
                due_date = $5,
                currency = COALESCE($6, currency),
                sub_total = $7,
                discount = COALESCE($8, discount),
                tax_percentage = COALESCE($9, tax_percentage),
                total = $10,
                notes = COALESCE($11, notes),
                status = COALESCE($12, status),
                updated_utc = NOW()
            WHERE invoice_id = $1 AND user_id = $2
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(invoice_id)
        .bind(user_id)
        .bind(&input.invoice_no)
        .bind(input.invoice_date)
        .bind(input.due_date)
        .bind(input.currency.as_deref().map(str::to_ascii_uppercase))
        .bind(input.sub_total)
        .bind(input.discount)
        .bind(input.tax_percentage)
        .bind(input.total)
        .bind(&input.notes)
        .bind(input.status.map(|s| s.as_str()))
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("Failed to update invoice"))?;

        let items = insert_line_items(&mut tx, invoice_id, &input.items).await?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit invoice"))?;

        timer.observe_duration();

        info!(items = items.len(), "Invoice updated");

        Ok(Some(InvoiceDetails {
            invoice,
            from,
            to,
            items,
        }))
    }

    #[instrument(skip(self, page), fields(user_id = %user_id, page_no = page.page(), limit = page.limit()))]
    async fn list_invoices(
        &self,
        user_id: Uuid,
        page: &PageRequest,
    ) -> Result<Vec<InvoiceDetails>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE user_id = $1 \
             ORDER BY created_utc DESC, invoice_id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(i64::from(page.limit()))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list invoices"))?;

        let details = self.load_details(invoices).await?;

        timer.observe_duration();

        Ok(details)
    }

    #[instrument(skip(self, filter), fields(user_id = %user_id))]
    async fn count_invoices(
        &self,
        user_id: Uuid,
        filter: &InvoiceCountFilter,
    ) -> Result<i64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["count_invoices"])
            .start_timer();

        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM invoices
            WHERE user_id = $1
              AND ($2::date IS NULL OR invoice_date >= $2)
              AND ($3::text IS NULL OR status = $3)
            "#,
        )
        .bind(user_id)
        .bind(filter.since)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to count invoices"))?;

        timer.observe_duration();

        Ok(count)
    }

    #[instrument(skip(self), fields(user_id = %user_id, since = %since))]
    async fn revenue_samples(
        &self,
        user_id: Uuid,
        since: NaiveDate,
    ) -> Result<Vec<RevenueSample>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["revenue_samples"])
            .start_timer();

        let samples = sqlx::query_as::<_, RevenueSample>(
            r#"
            SELECT invoice_date, total, status FROM invoices
            WHERE user_id = $1 AND invoice_date >= $2
            ORDER BY invoice_date ASC, created_utc ASC
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to load revenue"))?;

        timer.observe_duration();

        Ok(samples)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn recent_invoices(
        &self,
        user_id: Uuid,
        limit: u32,
    ) -> Result<Vec<RecentInvoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["recent_invoices"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE user_id = $1 \
             ORDER BY created_utc DESC, invoice_id DESC LIMIT $2"
        ))
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to load recent invoices"))?;

        let mut addresses = self.load_addresses(&invoices).await?;
        let recent = invoices
            .into_iter()
            .map(|invoice| -> Result<RecentInvoice, AppError> {
                let (from, to) = take_parties(&mut addresses, &invoice)?;
                Ok(RecentInvoice { invoice, from, to })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        timer.observe_duration();

        Ok(recent)
    }
}

#[async_trait]
impl SettingsStore for Database {
    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn get_settings(&self, user_id: Uuid) -> Result<Option<SettingsDetails>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_settings"])
            .start_timer();

        let settings = sqlx::query_as::<_, Settings>(&format!(
            "SELECT {SETTINGS_COLUMNS} FROM settings WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get settings"))?;

        let Some(settings) = settings else {
            timer.observe_duration();
            return Ok(None);
        };

        let signature = sqlx::query_as::<_, Signature>(&format!(
            "SELECT {SIGNATURE_COLUMNS} FROM signatures WHERE settings_id = $1"
        ))
        .bind(settings.settings_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get signature"))?;

        timer.observe_duration();

        Ok(Some(SettingsDetails {
            settings,
            signature,
        }))
    }

    #[instrument(skip(self, input), fields(user_id = %user_id))]
    async fn upsert_settings(
        &self,
        user_id: Uuid,
        input: &SettingsInput,
    ) -> Result<SettingsDetails, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["upsert_settings"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        let settings = sqlx::query_as::<_, Settings>(&format!(
            r#"
            INSERT INTO settings (settings_id, user_id, invoice_logo)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
            SET invoice_logo = COALESCE(EXCLUDED.invoice_logo, settings.invoice_logo),
                updated_utc = NOW()
            RETURNING {SETTINGS_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&input.invoice_logo)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("Failed to upsert settings"))?;

        let signature = match &input.signature {
            Some(signature) => Some(
                sqlx::query_as::<_, Signature>(&format!(
                    r#"
                    INSERT INTO signatures (signature_id, settings_id, name, image)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (settings_id) DO UPDATE
                    SET name = COALESCE(EXCLUDED.name, signatures.name),
                        image = COALESCE(EXCLUDED.image, signatures.image)
                    RETURNING {SIGNATURE_COLUMNS}
                    "#
                ))
                .bind(Uuid::new_v4())
                .bind(settings.settings_id)
                .bind(&signature.name)
                .bind(&signature.image)
                .fetch_one(&mut *tx)
                .await
                .map_err(db_error("Failed to upsert signature"))?,
            ),
            None => sqlx::query_as::<_, Signature>(&format!(
                "SELECT {SIGNATURE_COLUMNS} FROM signatures WHERE settings_id = $1"
            ))
            .bind(settings.settings_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error("Failed to get signature"))?,
        };

        tx.commit()
            .await
            .map_err(db_error("Failed to commit settings"))?;

        timer.observe_duration();

        info!(settings_id = %settings.settings_id, "Settings saved");

        Ok(SettingsDetails {
            settings,
            signature,
        })
    }
}

#[async_trait]
impl UserStore for Database {
    #[instrument(skip(self, identity), fields(user_id = %identity.id))]
    async fn ensure_user(&self, identity: &Identity) -> Result<User, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["ensure_user"])
            .start_timer();

        let inserted = sqlx::query(
            r#"
            INSERT INTO users (user_id, email, first_name, last_name, currency, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(identity.id)
        .bind(&identity.email)
        .bind(&identity.first_name)
        .bind(&identity.last_name)
        .bind(&identity.currency)
        .bind(identity.role.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to provision user"))?
        .rows_affected();

        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_id = $1"
        ))
        .bind(identity.id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get user"))?;

        timer.observe_duration();

        match user {
            Some(user) => {
                if inserted > 0 {
                    info!("User provisioned");
                }
                Ok(user)
            }
            None => Err(AppError::Conflict(anyhow::anyhow!(
                "Email already registered"
            ))),
        }
    }

    #[instrument(skip(self, update), fields(user_id = %user_id))]
    async fn update_user(
        &self,
        user_id: Uuid,
        update: &UpdateUser,
    ) -> Result<Option<User>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_user"])
            .start_timer();

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                currency = COALESCE($4, currency),
                updated_utc = NOW()
            WHERE user_id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(update.normalized_currency())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to update user"))?;

        timer.observe_duration();

        if user.is_some() {
            info!("User profile updated");
        }

        Ok(user)
    }
}

#[async_trait]
impl Store for Database {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error("Health check failed"))?;
        Ok(())
    }
}

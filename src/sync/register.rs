//! Adding a forum to the set of mirrored tenants.

use anyhow::{Context, Result};
use tracing::info;

use crate::config::TenantRegistration;
use crate::db::{self, Database, NewTenant, Tenant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Created(Tenant),
    /// A tenant with the same name was already registered; it is left as is.
    Existing(Tenant),
}

impl Registration {
    #[must_use]
    pub fn tenant(&self) -> &Tenant {
        match self {
            Self::Created(tenant) | Self::Existing(tenant) => tenant,
        }
    }
}

/// Register a tenant unless one with the same name exists.
///
/// # Errors
///
/// Returns an error if the registration is invalid or the database fails.
pub async fn register_tenant(db: &Database, registration: &TenantRegistration) -> Result<Registration> {
    registration.validate().context("Invalid tenant registration")?;

    if let Some(existing) = db::get_tenant_by_name(db.pool(), &registration.name).await? {
        info!(tenant = %existing.name, cursor = existing.cursor, "Tenant already registered");
        return Ok(Registration::Existing(existing));
    }

    let new_tenant = NewTenant {
        name: registration.name.clone(),
        api_base_url: registration.api_base_url.trim_end_matches('/').to_string(),
        api_key: registration.api_key.clone(),
        api_username: registration.api_username.clone(),
        cursor: registration.initial_cursor,
        page_size: registration.page_size,
        empty_streak_threshold: i64::from(registration.empty_streak_threshold),
    };

    let id = db::insert_tenant(db.pool(), &new_tenant).await?;
    let tenant = db::get_tenant(db.pool(), id)
        .await?
        .context("Tenant missing right after insert")?;

    info!(tenant = %tenant.name, id, cursor = tenant.cursor, "Registered tenant");
    Ok(Registration::Created(tenant))
}

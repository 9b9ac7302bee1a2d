use crate::{
    db_types::{CommissionRate, NewProduct, NewTenant, Product, Tenant},
    traits::StoreError,
};

/// Tenant and product records.
///
/// These are mostly administrative. Enforcement actions (deactivating a tenant for non-payment) go through
/// [`crate::traits::CommissionManagement`] instead, so that they are audited alongside the invoice that caused them.
#[allow(async_fn_in_trait)]
pub trait TenantManagement {
    /// Creates a tenant with a freshly generated encryption key.
    async fn create_tenant(&self, tenant: NewTenant) -> Result<Tenant, StoreError>;

    async fn fetch_tenant(&self, tenant_id: i64) -> Result<Option<Tenant>, StoreError>;

    async fn fetch_active_tenants(&self) -> Result<Vec<Tenant>, StoreError>;

    /// Changes the rate used for *future* orders and invoices. Existing orders keep the rate they were created with.
    async fn set_commission_rate(&self, tenant_id: i64, rate: CommissionRate) -> Result<Tenant, StoreError>;

    async fn set_wallet_address(&self, tenant_id: i64, wallet: Option<String>) -> Result<Tenant, StoreError>;

    async fn set_tenant_active(&self, tenant_id: i64, active: bool) -> Result<Tenant, StoreError>;

    async fn create_product(&self, product: NewProduct) -> Result<Product, StoreError>;

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, StoreError>;

    async fn set_product_active(&self, product_id: i64, active: bool) -> Result<Product, StoreError>;

    async fn set_inventory(&self, product_id: i64, inventory: i64) -> Result<Product, StoreError>;
}

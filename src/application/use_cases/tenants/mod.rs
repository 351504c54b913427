pub mod manage_tenants;
pub mod register_tenant;
pub mod reports;

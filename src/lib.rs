// Module layout (Clean Architecture style)
// - bootstrap: configuration and service wiring
// - infrastructure: PostgreSQL/Redis/encrypted storage adapters
// - presentation: HTTP handlers, extractors and routing
// - application: ports, access policies and use cases
// - domain: clinic models and rules

pub mod application;
pub mod bootstrap;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

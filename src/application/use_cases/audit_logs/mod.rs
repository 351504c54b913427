use crate::application::access::{MANAGERS, Principal, require_roles};
use crate::application::error::ServiceResult;
use crate::application::ports::audit_repository::{AuditQuery, AuditRepository};
use crate::domain::audit::AuditLog;

pub struct ListAuditLogs<'a, A: AuditRepository + ?Sized> {
    pub audit: &'a A,
}

impl<'a, A: AuditRepository + ?Sized> ListAuditLogs<'a, A> {
    pub async fn execute(
        &self,
        principal: &Principal,
        query: &AuditQuery,
    ) -> ServiceResult<Vec<AuditLog>> {
        require_roles(principal, MANAGERS)?;
        Ok(self.audit.list(principal.tenant_id, query).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::access::tests::principal;
    use crate::application::error::ServiceError;
    use crate::application::use_cases::fakes::MemoryStore;
    use crate::domain::users::StaffRole;

    #[tokio::test]
    async fn only_managers_read_the_trail() {
        let store = MemoryStore::default();
        let uc = ListAuditLogs { audit: &store };
        let err = uc
            .execute(&principal(StaffRole::Dentist), &AuditQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        assert!(
            uc.execute(&principal(StaffRole::Manager), &AuditQuery::default())
                .await
                .unwrap()
                .is_empty()
        );
    }
}

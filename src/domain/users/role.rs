text_enum!(StaffRole {
    Admin => "admin",
    Dentist => "dentist",
    Hygienist => "hygienist",
    Assistant => "assistant",
    Receptionist => "receptionist",
    Manager => "manager",
});

text_enum!(Permission {
    ViewPatients => "view_patients",
    CreateTreatments => "create_treatments",
    ManageAppointments => "manage_appointments",
    CreateCleanings => "create_cleanings",
    AssistTreatments => "assist_treatments",
    ManageUsers => "manage_users",
    ViewReports => "view_reports",
});

impl StaffRole {
    /// Permissions granted to the role. Admin holds every permission.
    pub fn permissions(&self) -> &'static [Permission] {
        use Permission::*;
        match self {
            StaffRole::Admin => Permission::ALL,
            StaffRole::Dentist => &[ViewPatients, CreateTreatments, ManageAppointments],
            StaffRole::Hygienist => &[ViewPatients, CreateCleanings],
            StaffRole::Assistant => &[ViewPatients, AssistTreatments],
            StaffRole::Receptionist => &[ManageAppointments, ViewPatients],
            StaffRole::Manager => &[ManageUsers, ViewReports],
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    /// Roles that can be booked for chair time.
    pub fn is_clinician(&self) -> bool {
        matches!(self, StaffRole::Dentist | StaffRole::Hygienist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_has_everything() {
        for p in Permission::ALL {
            assert!(StaffRole::Admin.has_permission(*p));
        }
    }

    #[test]
    fn receptionist_cannot_create_treatments() {
        assert!(StaffRole::Receptionist.has_permission(Permission::ManageAppointments));
        assert!(!StaffRole::Receptionist.has_permission(Permission::CreateTreatments));
    }

    #[test]
    fn manager_manages_users_but_not_patients() {
        assert!(StaffRole::Manager.has_permission(Permission::ManageUsers));
        assert!(StaffRole::Manager.has_permission(Permission::ViewReports));
        assert!(!StaffRole::Manager.has_permission(Permission::ViewPatients));
    }

    #[test]
    fn clinicians() {
        assert!(StaffRole::Dentist.is_clinician());
        assert!(StaffRole::Hygienist.is_clinician());
        assert!(!StaffRole::Assistant.is_clinician());
    }
}

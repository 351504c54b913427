use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

text_enum!(AppointmentStatus {
    Scheduled => "scheduled",
    Confirmed => "confirmed",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
    NoShow => "no_show",
    Rescheduled => "rescheduled",
});

text_enum!(AppointmentType {
    Consultation => "consultation",
    Treatment => "treatment",
    FollowUp => "follow_up",
    Emergency => "emergency",
    Hygiene => "hygiene",
    Checkup => "checkup",
});

impl AppointmentStatus {
    /// Statuses that still hold the dentist's chair.
    pub const BLOCKING: [AppointmentStatus; 3] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::InProgress,
    ];

    pub const UPCOMING: [AppointmentStatus; 2] =
        [AppointmentStatus::Scheduled, AppointmentStatus::Confirmed];
}

#[derive(Debug, Clone)]
pub struct Appointment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub patient_id: Uuid,
    pub dentist_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub duration_minutes: i32,
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
}

impl Appointment {
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.appointment_date + Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Stamps the lifecycle timestamp that belongs to `status`.
    pub fn apply_status(
        &mut self,
        status: AppointmentStatus,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.status = status;
        match status {
            AppointmentStatus::Confirmed => self.confirmed_at = Some(now),
            AppointmentStatus::Completed => self.completed_at = Some(now),
            AppointmentStatus::Cancelled => {
                self.cancelled_at = Some(now);
                self.cancellation_reason = reason;
            }
            _ => {}
        }
        self.updated_at = now;
    }
}

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::domain::money::round_cents;

text_enum!(TreatmentStatus {
    Planned => "planned",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
    Postponed => "postponed",
});

text_enum!(TreatmentPriority {
    Emergency => "emergency",
    Urgent => "urgent",
    Routine => "routine",
});

text_enum!(ItemStatus {
    Planned => "planned",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
});

#[derive(Debug, Clone)]
pub struct Treatment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub patient_id: Uuid,
    pub dentist_id: Uuid,
    pub consultation_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub status: TreatmentStatus,
    pub priority: TreatmentPriority,
    pub teeth_involved: Option<serde_json::Value>,
    pub quadrants: Option<serde_json::Value>,
    pub progress_notes: serde_json::Value,
    pub current_stage: Option<String>,
    pub total_stages: i32,
    pub estimated_cost: Option<f64>,
    pub actual_cost: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct TreatmentItem {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub treatment_id: Uuid,
    pub service_id: Uuid,
    pub quantity: i32,
    pub unit_price: f64,
    pub status: ItemStatus,
    pub tooth_number: Option<String>,
    pub surface: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Treatment {
    /// Moves to `status`. Start and completion timestamps are set the first time only.
    pub fn apply_status(&mut self, status: TreatmentStatus, now: DateTime<Utc>) {
        self.status = status;
        match status {
            TreatmentStatus::InProgress if self.started_at.is_none() => {
                self.started_at = Some(now)
            }
            TreatmentStatus::Completed if self.completed_at.is_none() => {
                self.completed_at = Some(now)
            }
            _ => {}
        }
        self.updated_at = now;
    }

    pub fn add_progress_note(
        &mut self,
        note: &str,
        stage: Option<&str>,
        author_id: Uuid,
        now: DateTime<Utc>,
    ) {
        let entry = json!({
            "date": now.to_rfc3339(),
            "note": note,
            "stage": stage,
            "author_id": author_id,
        });
        match &mut self.progress_notes {
            serde_json::Value::Array(notes) => notes.push(entry),
            other => *other = serde_json::Value::Array(vec![entry]),
        }
        if let Some(stage) = stage {
            self.current_stage = Some(stage.to_string());
        }
        self.updated_at = now;
    }
}

/// Σ quantity × unit_price over items that have not been cancelled.
pub fn items_cost(items: &[TreatmentItem]) -> f64 {
    round_cents(
        items
            .iter()
            .filter(|i| i.status != ItemStatus::Cancelled)
            .map(|i| f64::from(i.quantity) * i.unit_price)
            .sum(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn treatment() -> Treatment {
        let now = Utc::now();
        Treatment {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            dentist_id: Uuid::new_v4(),
            consultation_id: None,
            appointment_id: None,
            name: "Root canal 36".into(),
            description: None,
            status: TreatmentStatus::Planned,
            priority: TreatmentPriority::Routine,
            teeth_involved: None,
            quadrants: None,
            progress_notes: json!([]),
            current_stage: None,
            total_stages: 3,
            estimated_cost: None,
            actual_cost: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    fn item(quantity: i32, unit_price: f64, status: ItemStatus) -> TreatmentItem {
        TreatmentItem {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            treatment_id: Uuid::new_v4(),
            service_id: Uuid::new_v4(),
            quantity,
            unit_price,
            status,
            tooth_number: None,
            surface: None,
            notes: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn started_at_is_only_set_once() {
        let mut t = treatment();
        let first = Utc::now();
        t.apply_status(TreatmentStatus::InProgress, first);
        t.apply_status(TreatmentStatus::Postponed, first + Duration::days(1));
        t.apply_status(TreatmentStatus::InProgress, first + Duration::days(2));
        assert_eq!(t.started_at, Some(first));
        assert_eq!(t.status, TreatmentStatus::InProgress);
    }

    #[test]
    fn progress_note_with_stage_moves_current_stage() {
        let mut t = treatment();
        let author = Uuid::new_v4();
        t.add_progress_note("Access opened", Some("stage 1"), author, Utc::now());
        t.add_progress_note("Patient tolerated well", None, author, Utc::now());
        assert_eq!(t.current_stage.as_deref(), Some("stage 1"));
        assert_eq!(t.progress_notes.as_array().map(|a| a.len()), Some(2));
        assert_eq!(t.progress_notes[1]["stage"], serde_json::Value::Null);
    }

    #[test]
    fn cost_skips_cancelled_items() {
        let items = vec![
            item(2, 50.0, ItemStatus::Planned),
            item(1, 120.5, ItemStatus::Completed),
            item(3, 999.0, ItemStatus::Cancelled),
        ];
        assert_eq!(items_cost(&items), 220.5);
    }
}

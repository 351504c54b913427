use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Consultation {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub patient_id: Uuid,
    pub dentist_id: Uuid,
    pub chief_complaint: Option<String>,
    pub medical_history_review: Option<serde_json::Value>,
    pub dental_history_review: Option<serde_json::Value>,
    pub extraoral_findings: Option<String>,
    pub intraoral_findings: Option<String>,
    pub periodontal_assessment: Option<String>,
    pub occlusion_assessment: Option<String>,
    pub diagnosis: serde_json::Value,
    pub treatment_plan: serde_json::Value,
    pub recommendations: Option<String>,
    pub consultation_fee: Option<f64>,
    pub next_appointment_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Consultation {
    /// Appends a diagnosis entry, promoting a non-array value to a one-element list first.
    pub fn push_diagnosis(&mut self, entry: serde_json::Value) {
        push_json(&mut self.diagnosis, entry);
    }
}

fn push_json(target: &mut serde_json::Value, entry: serde_json::Value) {
    match target {
        serde_json::Value::Array(items) => items.push(entry),
        serde_json::Value::Null => *target = serde_json::Value::Array(vec![entry]),
        other => {
            let previous = other.take();
            *other = serde_json::Value::Array(vec![previous, entry]);
        }
    }
}

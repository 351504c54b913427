use chrono::{DateTime, Utc};
use uuid::Uuid;

text_enum!(RecordType {
    ClinicalNote => "clinical_note",
    Radiograph => "radiograph",
    Photograph => "photograph",
    LabResult => "lab_result",
    ConsentForm => "consent_form",
    MedicalHistory => "medical_history",
});

pub const ALLOWED_EXTENSIONS: &[&str] = &[
    ".pdf", ".jpg", ".jpeg", ".png", ".dcm", ".txt", ".doc", ".docx",
];

#[derive(Debug, Clone)]
pub struct MedicalRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub patient_id: Uuid,
    pub created_by: Uuid,
    pub record_type: RecordType,
    pub title: String,
    pub description: Option<String>,
    pub file_path: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub mime_type: Option<String>,
    pub checksum: Option<String>,
    pub clinical_data: Option<serde_json::Value>,
    pub tags: Option<serde_json::Value>,
    pub record_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MedicalRecord {
    pub fn has_file(&self) -> bool {
        self.file_path.is_some()
    }
}

/// Lowercased extension (with the dot) of `file_name` when it is on the allow-list.
pub fn normalized_extension(file_name: &str) -> Option<String> {
    let ext = std::path::Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    let ext = format!(".{ext}");
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_allow_list() {
        assert_eq!(normalized_extension("xray.DCM").as_deref(), Some(".dcm"));
        assert_eq!(normalized_extension("consent.pdf").as_deref(), Some(".pdf"));
        assert_eq!(normalized_extension("script.sh"), None);
        assert_eq!(normalized_extension("noext"), None);
    }
}

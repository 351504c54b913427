use uuid::Uuid;

pub const AUTO_ASSIGN_REASON: &str = "automatic_assignment";

/// Active patients currently assigned to one dentist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignmentCount {
    pub dentist_id: Uuid,
    pub patients: i64,
}

pub fn assigned_count(counts: &[AssignmentCount], dentist_id: Uuid) -> i64 {
    counts
        .iter()
        .find(|c| c.dentist_id == dentist_id)
        .map_or(0, |c| c.patients)
}

/// The candidate with the fewest assigned patients. Ties go to the earlier candidate.
pub fn least_busy(candidates: &[Uuid], counts: &[AssignmentCount]) -> Option<Uuid> {
    candidates
        .iter()
        .copied()
        .min_by_key(|id| assigned_count(counts, *id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fewest_patients_wins_and_ties_keep_order() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let counts = [
            AssignmentCount { dentist_id: a, patients: 4 },
            AssignmentCount { dentist_id: b, patients: 2 },
        ];
        assert_eq!(least_busy(&[a, b], &counts), Some(b));
        // No row means no patients yet.
        assert_eq!(least_busy(&[a, b, c], &counts), Some(c));
        let even = [
            AssignmentCount { dentist_id: a, patients: 1 },
            AssignmentCount { dentist_id: b, patients: 1 },
        ];
        assert_eq!(least_busy(&[b, a], &even), Some(b));
        assert_eq!(least_busy(&[], &counts), None);
    }
}

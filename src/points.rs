use std::collections::{BTreeMap, HashMap};

use uuid::Uuid;

use crate::models::{ActivityRecord, Category, PointTotals, RecordStatus, Sign};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregation {
    pub totals: PointTotals,
    /// Approved records whose category could not be resolved, sorted.
    pub skipped_records: Vec<Uuid>,
}

/// Sums the approved records of one student against the category table.
///
/// Records that are not approved contribute nothing. An approved record whose
/// category is missing from `categories` is left out of every sum and its id is
/// reported in `skipped_records` instead.
pub fn aggregate(records: &[ActivityRecord], categories: &HashMap<Uuid, Category>) -> Aggregation {
    let mut totals = PointTotals::default();
    let mut skipped_records = Vec::new();

    for record in records.iter() {
        if record.status != RecordStatus::Approved {
            continue;
        }

        let Some(category) = categories.get(&record.category_id) else {
            skipped_records.push(record.id);
            continue;
        };

        let weight = i64::from(category.weight());
        match category.sign {
            Sign::Positive => totals.total_positive += weight,
            Sign::Negative => totals.total_negative += weight,
        }

        let signed = category.signed_value();
        totals.total += signed;
        *totals.groups.entry(category.group.clone()).or_insert(0) += signed;
    }

    skipped_records.sort();
    Aggregation {
        totals,
        skipped_records,
    }
}

/// Signed subtotal per category group. Groups without a contributing record are absent.
pub fn rollup_by_group(
    records: &[ActivityRecord],
    categories: &HashMap<Uuid, Category>,
) -> BTreeMap<String, i64> {
    aggregate(records, categories).totals.groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::index_categories;
    use chrono::NaiveDate;

    fn category(name: &str, weight: i64, sign: Sign, group: &str) -> Category {
        Category::new(Uuid::new_v4(), name, weight, sign, group).unwrap()
    }

    fn record(category: &Category, status: RecordStatus) -> ActivityRecord {
        ActivityRecord {
            id: Uuid::new_v4(),
            student_id: Uuid::nil(),
            category_id: category.id,
            status,
            occurred_on: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            description: "kegiatan".to_string(),
            reviewer_note: None,
        }
    }

    fn sample_categories() -> Vec<Category> {
        vec![
            category("Seminar Nasional", 30, Sign::Positive, "Academic"),
            category("Bakti Sosial", 20, Sign::Positive, "Social"),
            category("Khotmil Quran", 25, Sign::Positive, "Religious"),
            category("Terlambat Kuliah", 40, Sign::Negative, "Violation"),
        ]
    }

    fn sample_records(categories: &[Category]) -> Vec<ActivityRecord> {
        vec![
            record(&categories[0], RecordStatus::Approved),
            record(&categories[0], RecordStatus::Approved),
            record(&categories[1], RecordStatus::Approved),
            record(&categories[2], RecordStatus::Pending),
            record(&categories[3], RecordStatus::Approved),
            record(&categories[3], RecordStatus::Rejected),
        ]
    }

    #[test]
    fn sums_approved_records_by_sign_and_group() {
        let categories = sample_categories();
        let records = sample_records(&categories);
        let result = aggregate(&records, &index_categories(categories));

        assert_eq!(result.totals.total_positive, 80);
        assert_eq!(result.totals.total_negative, 40);
        assert_eq!(result.totals.total, 40);
        assert_eq!(result.totals.groups.get("Academic"), Some(&60));
        assert_eq!(result.totals.groups.get("Social"), Some(&20));
        assert_eq!(result.totals.groups.get("Violation"), Some(&-40));
        assert!(result.skipped_records.is_empty());
    }

    #[test]
    fn negative_category_counts_once_as_magnitude() {
        let violation = category("Merokok", 40, Sign::Negative, "Conduct");
        let records = vec![record(&violation, RecordStatus::Approved)];
        let result = aggregate(&records, &index_categories(vec![violation]));

        assert_eq!(result.totals.total, -40);
        assert_eq!(result.totals.total_negative, 40);
        assert_eq!(result.totals.total_positive, 0);
    }

    #[test]
    fn non_approved_records_never_change_the_result() {
        let categories = sample_categories();
        let records = sample_records(&categories);
        let lookup = index_categories(categories);

        let approved_only: Vec<ActivityRecord> = records
            .iter()
            .filter(|record| record.status == RecordStatus::Approved)
            .cloned()
            .collect();

        assert_eq!(aggregate(&records, &lookup), aggregate(&approved_only, &lookup));
    }

    #[test]
    fn repeated_and_reordered_calls_agree() {
        let categories = sample_categories();
        let records = sample_records(&categories);
        let lookup = index_categories(categories);

        let first = aggregate(&records, &lookup);
        assert_eq!(first, aggregate(&records, &lookup));

        let mut reversed = records.clone();
        reversed.reverse();
        assert_eq!(first, aggregate(&reversed, &lookup));
    }

    #[test]
    fn group_subtotals_add_up_to_total() {
        let categories = sample_categories();
        let records = sample_records(&categories);
        let result = aggregate(&records, &index_categories(categories));

        let partition: i64 = result.totals.groups.values().sum();
        assert_eq!(partition, result.totals.total);
    }

    #[test]
    fn missing_category_is_skipped_and_reported() {
        let categories = sample_categories();
        let records = sample_records(&categories);
        let lookup = index_categories(categories);

        let retired = category("Lomba Dihapus", 50, Sign::Positive, "Academic");
        let orphan = record(&retired, RecordStatus::Approved);
        let mut with_orphan = records.clone();
        with_orphan.push(orphan.clone());

        let result = aggregate(&with_orphan, &lookup);
        assert_eq!(result.skipped_records, vec![orphan.id]);
        assert_eq!(result.totals, aggregate(&records, &lookup).totals);
    }

    #[test]
    fn pending_record_with_missing_category_is_not_reported() {
        let ghost = category("Hilang", 10, Sign::Positive, "Social");
        let records = vec![record(&ghost, RecordStatus::Pending)];
        let result = aggregate(&records, &HashMap::new());
        assert!(result.skipped_records.is_empty());
    }

    #[test]
    fn empty_input_yields_zero_totals() {
        let result = aggregate(&[], &HashMap::new());
        assert_eq!(result, Aggregation::default());
    }

    #[test]
    fn rollup_omits_groups_without_records() {
        let categories = sample_categories();
        let records = sample_records(&categories);
        let groups = rollup_by_group(&records, &index_categories(categories));

        assert_eq!(groups.len(), 3);
        assert!(!groups.contains_key("Religious"));
    }

    #[test]
    fn inactive_category_still_scores_historical_records() {
        let retired = category("Pesantren Kilat", 35, Sign::Positive, "Religious").retired();
        let records = vec![record(&retired, RecordStatus::Approved)];
        let result = aggregate(&records, &index_categories(vec![retired]));
        assert_eq!(result.totals.total, 35);
    }
}

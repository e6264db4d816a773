use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write;

use serde::Serialize;
use uuid::Uuid;

use crate::error::ReportError;
use crate::models::{ActivityRecord, Category, PointSummary, Student};
use crate::points::{aggregate, Aggregation};
use crate::standing::{GraduationTarget, StandingTier};

/// JSON body returned for a single student's point summary.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryDocument {
    pub nim: String,
    pub nama: String,
    pub prodi: String,
    pub angkatan: i32,
    pub total_poin: i64,
    pub total_poin_positif: i64,
    pub total_poin_negatif: i64,
    #[serde(flatten)]
    pub group_totals: BTreeMap<String, i64>,
    pub status_kelulusan: &'static str,
    pub status_color: &'static str,
    pub progress_percentage: u8,
    pub target: u32,
    pub skipped_records: Vec<Uuid>,
}

/// `total_<group>` with the group lower-cased and anything non-alphanumeric replaced by `_`.
pub fn group_key(group: &str) -> String {
    let slug: String = group
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("total_{slug}")
}

/// Fixed `total_*` fields of [`SummaryDocument`] that a group key must not shadow.
const RESERVED_KEYS: [&str; 3] = ["total_poin", "total_poin_positif", "total_poin_negatif"];

/// Maps every group to its `total_<group>` key, refusing groups whose keys would
/// overwrite a fixed field or each other.
pub fn group_keys<'a, I>(groups: I) -> Result<BTreeMap<String, String>, ReportError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut keys: BTreeMap<String, String> = BTreeMap::new();
    let mut owners: HashMap<String, String> = HashMap::new();

    for group in groups {
        if keys.contains_key(group) {
            continue;
        }
        let key = group_key(group);
        if RESERVED_KEYS.contains(&key.as_str()) {
            return Err(ReportError::ReservedGroupKey {
                group: group.to_string(),
                key,
            });
        }
        if let Some(first) = owners.get(&key) {
            return Err(ReportError::GroupKeyCollision {
                first: first.clone(),
                second: group.to_string(),
                key,
            });
        }
        owners.insert(key.clone(), group.to_string());
        keys.insert(group.to_string(), key);
    }

    Ok(keys)
}

/// Sorted, de-duplicated group names across the whole category table.
pub fn known_groups(categories: &HashMap<Uuid, Category>) -> Vec<String> {
    categories
        .values()
        .map(|category| category.group.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn summary_document(
    student: &Student,
    aggregation: &Aggregation,
    target: GraduationTarget,
    groups: &[String],
) -> Result<SummaryDocument, ReportError> {
    let summary = PointSummary::new(aggregation.totals.clone(), target);

    let keys = group_keys(
        groups
            .iter()
            .chain(summary.totals.groups.keys())
            .map(String::as_str),
    )?;
    let mut group_totals: BTreeMap<String, i64> =
        keys.values().map(|key| (key.clone(), 0)).collect();
    for (group, total) in summary.totals.groups.iter() {
        if let Some(key) = keys.get(group) {
            group_totals.insert(key.clone(), *total);
        }
    }

    Ok(SummaryDocument {
        nim: student.nim.clone(),
        nama: student.full_name.clone(),
        prodi: student.program.clone(),
        angkatan: student.cohort,
        total_poin: summary.totals.total,
        total_poin_positif: summary.totals.total_positive,
        total_poin_negatif: summary.totals.total_negative,
        group_totals,
        status_kelulusan: summary.standing.label(),
        status_color: summary.standing.tier.color(),
        progress_percentage: summary.standing.progress_percentage,
        target: target.points(),
        skipped_records: aggregation.skipped_records.clone(),
    })
}

#[derive(Debug, Clone)]
pub struct StudentRecap {
    pub student: Student,
    pub summary: PointSummary,
    pub skipped_records: Vec<Uuid>,
}

/// One recap row per student, highest total first, ties broken by NIM.
pub fn build_recap(
    students: &[Student],
    records: &[ActivityRecord],
    categories: &HashMap<Uuid, Category>,
    target: GraduationTarget,
) -> Vec<StudentRecap> {
    let mut by_student: HashMap<Uuid, Vec<ActivityRecord>> = HashMap::new();
    for record in records {
        by_student
            .entry(record.student_id)
            .or_default()
            .push(record.clone());
    }

    let mut recaps: Vec<StudentRecap> = students
        .iter()
        .map(|student| {
            let own = by_student.get(&student.id).map(Vec::as_slice).unwrap_or(&[]);
            let aggregation = aggregate(own, categories);
            StudentRecap {
                student: student.clone(),
                summary: PointSummary::new(aggregation.totals, target),
                skipped_records: aggregation.skipped_records,
            }
        })
        .collect();

    recaps.sort_by(|a, b| {
        b.summary
            .totals
            .total
            .cmp(&a.summary.totals.total)
            .then_with(|| a.student.nim.cmp(&b.student.nim))
    });
    recaps
}

pub fn standing_distribution(recaps: &[StudentRecap]) -> BTreeMap<StandingTier, usize> {
    let mut distribution = BTreeMap::new();
    for recap in recaps {
        *distribution.entry(recap.summary.standing.tier).or_insert(0) += 1;
    }
    distribution
}

pub fn render_recap(
    cohort: Option<i32>,
    target: GraduationTarget,
    recaps: &[StudentRecap],
    groups: &[String],
) -> String {
    let mut output = String::new();
    let cohort_label = cohort
        .map(|year| format!("cohort {year}"))
        .unwrap_or_else(|| "all cohorts".to_string());

    let _ = writeln!(output, "# Student Activity Point Recapitulation");
    let _ = writeln!(
        output,
        "Generated for {} (graduation target {} points)",
        cohort_label, target
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Standing Distribution");

    if recaps.is_empty() {
        let _ = writeln!(output, "No students found for this scope.");
        return output;
    }

    let distribution = standing_distribution(recaps);
    for tier in StandingTier::ALL {
        let count = distribution.get(&tier).copied().unwrap_or(0);
        let _ = writeln!(output, "- {}: {} students", tier.label(), count);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Students");

    let mut header = String::from("| NIM | Name | Total | Positive | Negative |");
    let mut divider = String::from("| --- | --- | ---: | ---: | ---: |");
    for group in groups {
        let _ = write!(header, " {} |", group);
        divider.push_str(" ---: |");
    }
    header.push_str(" Status | Progress |");
    divider.push_str(" --- | ---: |");
    let _ = writeln!(output, "{header}");
    let _ = writeln!(output, "{divider}");

    for recap in recaps {
        let totals = &recap.summary.totals;
        let mut row = format!(
            "| {} | {} | {} | {} | {} |",
            recap.student.nim,
            recap.student.full_name,
            totals.total,
            totals.total_positive,
            totals.total_negative
        );
        for group in groups {
            let _ = write!(row, " {} |", totals.groups.get(group).copied().unwrap_or(0));
        }
        let _ = write!(
            row,
            " {} | {}% |",
            recap.summary.standing.label(),
            recap.summary.standing.progress_percentage
        );
        let _ = writeln!(output, "{row}");
    }

    let skipped: Vec<&StudentRecap> = recaps
        .iter()
        .filter(|recap| !recap.skipped_records.is_empty())
        .collect();
    if !skipped.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Data Integrity");
        for recap in skipped {
            let ids: Vec<String> = recap.skipped_records.iter().map(Uuid::to_string).collect();
            let _ = writeln!(
                output,
                "- {}: approved records with missing category: {}",
                recap.student.nim,
                ids.join(", ")
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{index_categories, RecordStatus, Sign};
    use chrono::NaiveDate;

    const ORPHAN_RECORD: Uuid = Uuid::from_u128(0x5151);

    fn student(nim: &str, name: &str) -> Student {
        Student {
            id: Uuid::new_v4(),
            nim: nim.to_string(),
            full_name: name.to_string(),
            program: "Pendidikan Agama Islam".to_string(),
            cohort: 2022,
        }
    }

    fn approved(student: &Student, category_id: Uuid) -> ActivityRecord {
        ActivityRecord {
            id: Uuid::new_v4(),
            student_id: student.id,
            category_id,
            status: RecordStatus::Approved,
            occurred_on: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            description: "kegiatan".to_string(),
            reviewer_note: None,
        }
    }

    fn fixture() -> (Vec<Student>, Vec<ActivityRecord>, HashMap<Uuid, Category>) {
        let lomba = Category::new(Uuid::new_v4(), "Juara Lomba", 150, Sign::Positive, "Academic")
            .unwrap();
        let baksos =
            Category::new(Uuid::new_v4(), "Bakti Sosial", 20, Sign::Positive, "Social").unwrap();
        let asrama =
            Category::new(Uuid::new_v4(), "Pelanggaran Asrama", 40, Sign::Negative, "Violation")
                .unwrap();

        let fauzi = student("2021110001", "Ahmad Fauzi");
        let siti = student("2021110002", "Siti Nurhaliza");
        let rizki = student("2022110017", "Muhammad Rizki");

        let mut orphan = approved(&siti, Uuid::nil());
        orphan.id = ORPHAN_RECORD;

        let records = vec![
            approved(&fauzi, lomba.id),
            approved(&fauzi, lomba.id),
            approved(&siti, baksos.id),
            approved(&siti, asrama.id),
            orphan,
        ];

        (
            vec![rizki, siti, fauzi],
            records,
            index_categories(vec![lomba, baksos, asrama]),
        )
    }

    #[test]
    fn group_keys_are_slugged() {
        assert_eq!(group_key("Academic"), "total_academic");
        assert_eq!(group_key(" Social Outreach "), "total_social_outreach");
    }

    #[test]
    fn summary_document_zero_fills_known_groups() {
        let (students, records, categories) = fixture();
        let fauzi = &students[2];
        let own: Vec<ActivityRecord> = records
            .iter()
            .filter(|record| record.student_id == fauzi.id)
            .cloned()
            .collect();
        let aggregation = aggregate(&own, &categories);
        let groups = known_groups(&categories);
        let doc =
            summary_document(fauzi, &aggregation, GraduationTarget::default(), &groups).unwrap();

        assert_eq!(doc.total_poin, 300);
        assert_eq!(doc.status_kelulusan, "Very Active");
        assert_eq!(doc.progress_percentage, 100);
        assert_eq!(doc.group_totals.get("total_academic"), Some(&300));
        assert_eq!(doc.group_totals.get("total_violation"), Some(&0));

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["total_poin"], 300);
        assert_eq!(json["total_social"], 0);
        assert_eq!(json["status_kelulusan"], "Very Active");
        assert_eq!(json["target"], 300);
        assert_eq!(json["angkatan"], 2022);
    }

    #[test]
    fn recap_orders_by_total_and_counts_tiers() {
        let (students, records, categories) = fixture();
        let recaps = build_recap(&students, &records, &categories, GraduationTarget::default());

        let order: Vec<&str> = recaps.iter().map(|r| r.student.nim.as_str()).collect();
        assert_eq!(order, vec!["2021110001", "2022110017", "2021110002"]);
        assert_eq!(recaps[2].summary.totals.total, -20);
        assert_eq!(recaps[2].skipped_records, vec![ORPHAN_RECORD]);

        let distribution = standing_distribution(&recaps);
        assert_eq!(distribution.get(&StandingTier::VeryActive), Some(&1));
        assert_eq!(distribution.get(&StandingTier::Passive), Some(&2));
    }

    #[test]
    fn rendered_recap_lists_groups_and_integrity_notes() {
        let (students, records, categories) = fixture();
        let recaps = build_recap(&students, &records, &categories, GraduationTarget::default());
        let groups = known_groups(&categories);
        let report = render_recap(Some(2021), GraduationTarget::default(), &recaps, &groups);

        assert!(report.contains("Generated for cohort 2021 (graduation target 300 points)"));
        assert!(report.contains("- Very Active: 1 students"));
        assert!(report.contains("| Academic | Social | Violation |"));
        assert!(report
            .contains("| 2022110017 | Muhammad Rizki | 0 | 0 | 0 | 0 | 0 | 0 | Passive | 0% |"));
        assert!(report.contains("## Data Integrity"));
        assert!(report.contains(&ORPHAN_RECORD.to_string()));
    }

    #[test]
    fn group_named_like_a_fixed_total_is_refused() {
        let (students, _, _) = fixture();
        let poin = Category::new(Uuid::new_v4(), "Poin Khusus", 10, Sign::Positive, "Poin")
            .unwrap();
        let record = approved(&students[0], poin.id);
        let categories = index_categories(vec![poin]);
        let aggregation = aggregate(&[record], &categories);

        let result = summary_document(
            &students[0],
            &aggregation,
            GraduationTarget::default(),
            &known_groups(&categories),
        );
        assert_eq!(
            result.unwrap_err(),
            ReportError::ReservedGroupKey {
                group: "Poin".to_string(),
                key: "total_poin".to_string(),
            }
        );
    }

    #[test]
    fn groups_differing_only_in_case_are_refused() {
        assert_eq!(
            group_keys(["Social", "social"]),
            Err(ReportError::GroupKeyCollision {
                first: "Social".to_string(),
                second: "social".to_string(),
                key: "total_social".to_string(),
            })
        );
        assert!(group_keys(["Academic", "Academic", "Social"]).is_ok());
    }

    #[test]
    fn empty_recap_is_reported() {
        let report = render_recap(None, GraduationTarget::default(), &[], &[]);
        assert!(report.contains("all cohorts"));
        assert!(report.contains("No students found for this scope."));
    }
}

use std::collections::HashMap;

use anyhow::Context;
use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::auth::{authorize, Action, Principal, Role};
use crate::error::{AuthError, LedgerError};
use crate::models::{ActivityRecord, Category, PendingRecord, RecordStatus, Sign, Student};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let students = vec![
        (
            Uuid::parse_str("6b1f0c1e-3a52-4d8e-9a0b-2f4c7d9e1a01")?,
            "2021110001",
            "Ahmad Fauzi",
            "Pendidikan Agama Islam",
            2021,
        ),
        (
            Uuid::parse_str("6b1f0c1e-3a52-4d8e-9a0b-2f4c7d9e1a02")?,
            "2021110002",
            "Siti Nurhaliza",
            "Hukum Ekonomi Syariah",
            2021,
        ),
        (
            Uuid::parse_str("6b1f0c1e-3a52-4d8e-9a0b-2f4c7d9e1a03")?,
            "2022110017",
            "Muhammad Rizki",
            "Komunikasi Penyiaran Islam",
            2022,
        ),
    ];

    for (id, nim, name, program, cohort) in &students {
        sqlx::query(
            r#"
            INSERT INTO sipma.students (id, nim, full_name, program, cohort)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (nim) DO UPDATE
            SET full_name = EXCLUDED.full_name, program = EXCLUDED.program, cohort = EXCLUDED.cohort
            "#,
        )
        .bind(id)
        .bind(nim)
        .bind(name)
        .bind(program)
        .bind(cohort)
        .execute(pool)
        .await?;
    }

    let users = vec![
        (
            Uuid::parse_str("b7c2e0aa-1d44-4f0e-8e61-7a3d5c2b9f10")?,
            "admin@sipma.ac.id",
            "Administrator SIPMA",
            Role::Admin,
            None,
        ),
        (
            Uuid::parse_str("b7c2e0aa-1d44-4f0e-8e61-7a3d5c2b9f11")?,
            "waket3@sipma.ac.id",
            "Dr. Hasanuddin",
            Role::ViceDean,
            None,
        ),
        (
            Uuid::parse_str("b7c2e0aa-1d44-4f0e-8e61-7a3d5c2b9f12")?,
            "dosen.pa@sipma.ac.id",
            "Ustadzah Aminah",
            Role::Advisor,
            None,
        ),
        (
            Uuid::parse_str("b7c2e0aa-1d44-4f0e-8e61-7a3d5c2b9f13")?,
            "ahmad.fauzi@student.sipma.ac.id",
            "Ahmad Fauzi",
            Role::Student,
            Some(students[0].0),
        ),
        (
            Uuid::parse_str("b7c2e0aa-1d44-4f0e-8e61-7a3d5c2b9f14")?,
            "siti.nurhaliza@student.sipma.ac.id",
            "Siti Nurhaliza",
            Role::Student,
            Some(students[1].0),
        ),
    ];

    let reviewer_id = users[2].0;

    for (id, email, name, role, student_id) in users {
        sqlx::query(
            r#"
            INSERT INTO sipma.users (id, email, full_name, role, student_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name, role = EXCLUDED.role,
                student_id = EXCLUDED.student_id
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(name)
        .bind(role.as_str())
        .bind(student_id)
        .execute(pool)
        .await?;
    }

    let categories = vec![
        Category::new(
            Uuid::parse_str("c4a9d7e2-5b31-4c6f-a8d0-1e2f3a4b5c01")?,
            "Seminar Nasional",
            30,
            Sign::Positive,
            "Academic",
        )?,
        Category::new(
            Uuid::parse_str("c4a9d7e2-5b31-4c6f-a8d0-1e2f3a4b5c02")?,
            "Juara Lomba Karya Tulis",
            75,
            Sign::Positive,
            "Academic",
        )?,
        Category::new(
            Uuid::parse_str("c4a9d7e2-5b31-4c6f-a8d0-1e2f3a4b5c03")?,
            "Bakti Sosial",
            20,
            Sign::Positive,
            "Social",
        )?,
        Category::new(
            Uuid::parse_str("c4a9d7e2-5b31-4c6f-a8d0-1e2f3a4b5c04")?,
            "Imam Shalat Berjamaah",
            10,
            Sign::Positive,
            "Religious",
        )?,
        Category::new(
            Uuid::parse_str("c4a9d7e2-5b31-4c6f-a8d0-1e2f3a4b5c05")?,
            "Dakwah Ramadhan",
            40,
            Sign::Positive,
            "Outreach",
        )?,
        Category::new(
            Uuid::parse_str("c4a9d7e2-5b31-4c6f-a8d0-1e2f3a4b5c06")?,
            "Terlambat Kuliah Berulang",
            15,
            Sign::Negative,
            "Conduct",
        )?,
        Category::new(
            Uuid::parse_str("c4a9d7e2-5b31-4c6f-a8d0-1e2f3a4b5c07")?,
            "Pelanggaran Tata Tertib Asrama",
            40,
            Sign::Negative,
            "Violation",
        )?,
        Category::new(
            Uuid::parse_str("c4a9d7e2-5b31-4c6f-a8d0-1e2f3a4b5c08")?,
            "Pesantren Kilat 2022",
            35,
            Sign::Positive,
            "Religious",
        )?
        .retired(),
    ];

    for category in &categories {
        upsert_category(pool, category).await?;
    }

    let records = vec![
        ("seed-001", 0, 0, RecordStatus::Approved, (2025, 10, 4), "Seminar moderasi beragama"),
        ("seed-002", 0, 1, RecordStatus::Approved, (2025, 11, 20), "Juara 1 LKTI tingkat provinsi"),
        ("seed-003", 0, 4, RecordStatus::Approved, (2026, 3, 12), "Safari dakwah Ramadhan"),
        ("seed-004", 0, 7, RecordStatus::Approved, (2022, 4, 15), "Pesantren kilat kampus"),
        ("seed-005", 0, 3, RecordStatus::Pending, (2026, 9, 25), "Imam shalat maghrib"),
        ("seed-006", 1, 2, RecordStatus::Approved, (2026, 1, 18), "Bakti sosial banjir"),
        ("seed-007", 1, 6, RecordStatus::Approved, (2026, 2, 3), "Keluar asrama tanpa izin"),
        ("seed-008", 1, 0, RecordStatus::Rejected, (2026, 2, 10), "Seminar tanpa sertifikat"),
        ("seed-009", 2, 5, RecordStatus::Approved, (2026, 5, 6), "Terlambat lima kali"),
        ("seed-010", 2, 0, RecordStatus::Pending, (2026, 10, 1), "Seminar literasi digital"),
    ];

    for (source_key, student, category, status, (y, m, d), description) in records {
        let occurred_on = NaiveDate::from_ymd_opt(y, m, d).context("invalid date")?;
        let reviewed = status.is_decision();

        sqlx::query(
            r#"
            INSERT INTO sipma.activity_records
            (id, student_id, category_id, status, occurred_on, description, reviewer_id,
             reviewed_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, CASE WHEN $8::BOOLEAN THEN now() END, $9)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(students[student].0)
        .bind(categories[category].id)
        .bind(status.as_str())
        .bind(occurred_on)
        .bind(description)
        .bind(reviewed.then_some(reviewer_id))
        .bind(reviewed)
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn resolve_principal(pool: &PgPool, email: &str) -> anyhow::Result<Principal> {
    let row = sqlx::query("SELECT id, role, student_id FROM sipma.users WHERE email = $1")
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AuthError::UnknownUser(email.to_string()))?;

    let role: String = row.get("role");
    let principal = Principal {
        user_id: row.get("id"),
        role: role.parse()?,
        student_id: row.get("student_id"),
    };

    tracing::debug!(user_id = %principal.user_id, role = %principal.role, "resolved principal");
    Ok(principal)
}

fn student_from_row(row: &PgRow) -> Student {
    Student {
        id: row.get("id"),
        nim: row.get("nim"),
        full_name: row.get("full_name"),
        program: row.get("program"),
        cohort: row.get("cohort"),
    }
}

fn category_from_row(row: &PgRow) -> anyhow::Result<Category> {
    let sign: String = row.get("sign");
    let category = Category::new(
        row.get("id"),
        row.get::<String, _>("name"),
        row.get::<i64, _>("weight"),
        sign.parse()?,
        row.get::<String, _>("category_group"),
    )?;

    if row.get::<bool, _>("is_active") {
        Ok(category)
    } else {
        Ok(category.retired())
    }
}

fn record_from_row(row: &PgRow) -> anyhow::Result<ActivityRecord> {
    let status: String = row.get("status");
    Ok(ActivityRecord {
        id: row.get("id"),
        student_id: row.get("student_id"),
        category_id: row.get("category_id"),
        status: status.parse()?,
        occurred_on: row.get("occurred_on"),
        description: row.get("description"),
        reviewer_note: row.get("reviewer_note"),
    })
}

pub async fn find_student_by_nim(pool: &PgPool, nim: &str) -> anyhow::Result<Option<Student>> {
    let row = sqlx::query(
        "SELECT id, nim, full_name, program, cohort FROM sipma.students WHERE nim = $1",
    )
    .bind(nim.trim())
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(student_from_row))
}

pub async fn fetch_students(pool: &PgPool, cohort: Option<i32>) -> anyhow::Result<Vec<Student>> {
    let rows = sqlx::query(
        r#"
        SELECT id, nim, full_name, program, cohort
        FROM sipma.students
        WHERE $1::INTEGER IS NULL OR cohort = $1
        ORDER BY nim
        "#,
    )
    .bind(cohort)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(student_from_row).collect())
}

/// Every category, retired ones included, since historical records still point at them.
pub async fn fetch_categories(pool: &PgPool) -> anyhow::Result<Vec<Category>> {
    let rows = sqlx::query(
        r#"
        SELECT id, name, weight, sign, category_group, is_active
        FROM sipma.categories
        ORDER BY category_group, name
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(category_from_row).collect()
}

pub async fn fetch_records_for_student(
    pool: &PgPool,
    student_id: Uuid,
) -> anyhow::Result<Vec<ActivityRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, student_id, category_id, status, occurred_on, description, reviewer_note
        FROM sipma.activity_records
        WHERE student_id = $1
        ORDER BY occurred_on
        "#,
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(record_from_row).collect()
}

pub async fn fetch_records(
    pool: &PgPool,
    cohort: Option<i32>,
) -> anyhow::Result<Vec<ActivityRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT r.id, r.student_id, r.category_id, r.status, r.occurred_on, r.description,
               r.reviewer_note
        FROM sipma.activity_records r
        JOIN sipma.students s ON s.id = r.student_id
        WHERE $1::INTEGER IS NULL OR s.cohort = $1
        "#,
    )
    .bind(cohort)
    .fetch_all(pool)
    .await?;

    rows.iter().map(record_from_row).collect()
}

pub async fn fetch_pending(pool: &PgPool, limit: i64) -> anyhow::Result<Vec<PendingRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT r.id, s.nim, s.full_name, COALESCE(c.name, '(deleted category)') AS category_name,
               r.occurred_on, r.description, r.submitted_at
        FROM sipma.activity_records r
        JOIN sipma.students s ON s.id = r.student_id
        LEFT JOIN sipma.categories c ON c.id = r.category_id
        WHERE r.status = 'pending'
        ORDER BY r.submitted_at
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| PendingRecord {
            record_id: row.get("id"),
            nim: row.get("nim"),
            student_name: row.get("full_name"),
            category_name: row.get("category_name"),
            occurred_on: row.get("occurred_on"),
            description: row.get("description"),
            submitted_at: row.get("submitted_at"),
        })
        .collect())
}

async fn upsert_category(pool: &PgPool, category: &Category) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sipma.categories (id, name, weight, sign, category_group, is_active)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (name) DO UPDATE
        SET weight = EXCLUDED.weight, sign = EXCLUDED.sign,
            category_group = EXCLUDED.category_group, is_active = EXCLUDED.is_active
        "#,
    )
    .bind(category.id)
    .bind(&category.name)
    .bind(i64::from(category.weight()))
    .bind(category.sign.as_str())
    .bind(&category.group)
    .bind(category.is_active)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_category(
    pool: &PgPool,
    principal: &Principal,
    category: &Category,
) -> anyhow::Result<()> {
    authorize(principal, Action::ManageCategories)?;
    upsert_category(pool, category)
        .await
        .with_context(|| format!("failed to save category '{}'", category.name))?;

    tracing::info!(
        category = %category.name,
        weight = category.weight(),
        sign = %category.sign,
        group = %category.group,
        "category saved"
    );
    Ok(())
}

pub async fn set_category_active(
    pool: &PgPool,
    principal: &Principal,
    name: &str,
    active: bool,
) -> anyhow::Result<()> {
    authorize(principal, Action::ManageCategories)?;
    let result = sqlx::query("UPDATE sipma.categories SET is_active = $1 WHERE name = $2")
        .bind(active)
        .bind(name)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(LedgerError::UnknownCategory(name.to_string()).into());
    }

    tracing::info!(category = name, active, "category visibility changed");
    Ok(())
}

pub async fn submit_record(
    pool: &PgPool,
    principal: &Principal,
    student: &Student,
    category_name: &str,
    occurred_on: NaiveDate,
    description: &str,
) -> anyhow::Result<Uuid> {
    authorize(principal, Action::SubmitRecord { student_id: student.id })?;

    let row = sqlx::query("SELECT id, is_active FROM sipma.categories WHERE name = $1")
        .bind(category_name)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| LedgerError::UnknownCategory(category_name.to_string()))?;

    if !row.get::<bool, _>("is_active") {
        return Err(LedgerError::InactiveCategory(category_name.to_string()).into());
    }

    let record_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO sipma.activity_records
        (id, student_id, category_id, status, occurred_on, description)
        VALUES ($1, $2, $3, 'pending', $4, $5)
        "#,
    )
    .bind(record_id)
    .bind(student.id)
    .bind(row.get::<Uuid, _>("id"))
    .bind(occurred_on)
    .bind(description)
    .execute(pool)
    .await?;

    tracing::info!(%record_id, nim = %student.nim, category = category_name, "record submitted");
    Ok(record_id)
}

async fn current_status(pool: &PgPool, record_id: Uuid) -> anyhow::Result<RecordStatus> {
    let status: String = sqlx::query("SELECT status FROM sipma.activity_records WHERE id = $1")
        .bind(record_id)
        .fetch_optional(pool)
        .await?
        .ok_or(LedgerError::RecordNotFound(record_id))?
        .get("status");

    Ok(status.parse()?)
}

/// Moves a pending record to approved or rejected.
///
/// The update is guarded by `status = 'pending'`, so two reviewers racing on the
/// same record cannot both succeed; the loser gets [`LedgerError::AlreadyReviewed`].
pub async fn review_record(
    pool: &PgPool,
    principal: &Principal,
    record_id: Uuid,
    decision: RecordStatus,
    note: Option<&str>,
) -> anyhow::Result<()> {
    authorize(principal, Action::ReviewRecord)?;
    if !decision.is_decision() {
        return Err(LedgerError::InvalidDecision(decision).into());
    }

    let result = sqlx::query(
        r#"
        UPDATE sipma.activity_records
        SET status = $1, reviewer_id = $2, reviewer_note = $3, reviewed_at = now()
        WHERE id = $4 AND status = 'pending'
        "#,
    )
    .bind(decision.as_str())
    .bind(principal.user_id)
    .bind(note)
    .bind(record_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        let status = current_status(pool, record_id).await?;
        return Err(LedgerError::AlreadyReviewed { record_id, status }.into());
    }

    tracing::info!(%record_id, reviewer = %principal.user_id, %decision, "record reviewed");
    Ok(())
}

/// Replaces the reviewer note of an already reviewed record; nothing else may change.
pub async fn annotate_record(
    pool: &PgPool,
    principal: &Principal,
    record_id: Uuid,
    note: &str,
) -> anyhow::Result<()> {
    authorize(principal, Action::ReviewRecord)?;

    let result = sqlx::query(
        r#"
        UPDATE sipma.activity_records
        SET reviewer_note = $1
        WHERE id = $2 AND status <> 'pending'
        "#,
    )
    .bind(note)
    .bind(record_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        // Either missing (propagated by current_status) or still pending.
        current_status(pool, record_id).await?;
        return Err(LedgerError::NotReviewed(record_id).into());
    }

    Ok(())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportOutcome {
    pub inserted: usize,
    pub duplicates: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ImportRow {
    pub nim: String,
    pub category: String,
    pub occurred_on: NaiveDate,
    pub description: String,
    pub status: Option<String>,
    pub source_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRow {
    pub student_id: Uuid,
    pub category_id: Uuid,
    pub status: RecordStatus,
    pub source_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowRejection {
    UnknownStudent(String),
    UnknownCategory(String),
    RetiredCategory(String),
    InvalidStatus(String),
}

/// Category id and active flag, keyed by name.
pub type CategoryIndex = HashMap<String, (Uuid, bool)>;

/// Checks one CSV row against the known students and categories.
///
/// Rows still pending review are claims like any submission and may not be
/// filed under a retired category; already decided rows are history and may.
/// A missing `source_key` is derived from the row so re-running a file does
/// not insert it twice.
pub fn validate_import_row(
    row: &ImportRow,
    students: &HashMap<String, Uuid>,
    categories: &CategoryIndex,
) -> Result<ValidatedRow, RowRejection> {
    let nim = row.nim.trim();
    let category = row.category.trim();

    let student_id = *students
        .get(nim)
        .ok_or_else(|| RowRejection::UnknownStudent(nim.to_string()))?;
    let (category_id, is_active) = *categories
        .get(category)
        .ok_or_else(|| RowRejection::UnknownCategory(category.to_string()))?;

    let status = match row.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => value
            .parse::<RecordStatus>()
            .map_err(|_| RowRejection::InvalidStatus(value.to_string()))?,
        None => RecordStatus::Pending,
    };

    if !status.is_decision() && !is_active {
        return Err(RowRejection::RetiredCategory(category.to_string()));
    }

    let source_key = match row.source_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => key.to_string(),
        _ => format!(
            "import:{nim}:{category}:{}:{}",
            row.occurred_on,
            row.description.trim()
        ),
    };

    Ok(ValidatedRow {
        student_id,
        category_id,
        status,
        source_key,
    })
}

/// Loads records from CSV in one transaction; any database failure leaves nothing behind.
pub async fn import_csv(
    pool: &PgPool,
    principal: &Principal,
    csv_path: &std::path::Path,
) -> anyhow::Result<ImportOutcome> {
    authorize(principal, Action::ImportRecords)?;

    let students: HashMap<String, Uuid> = fetch_students(pool, None)
        .await?
        .into_iter()
        .map(|student| (student.nim, student.id))
        .collect();
    let categories: CategoryIndex = fetch_categories(pool)
        .await?
        .into_iter()
        .map(|category| (category.name, (category.id, category.is_active)))
        .collect();

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut outcome = ImportOutcome::default();
    let mut tx = pool.begin().await?;

    for (index, result) in reader.deserialize::<ImportRow>().enumerate() {
        let line = index + 2;
        let row = match result {
            Ok(row) => row,
            Err(err) => {
                tracing::warn!(line, error = %err, "malformed row skipped");
                outcome.rejected += 1;
                continue;
            }
        };

        let valid = match validate_import_row(&row, &students, &categories) {
            Ok(valid) => valid,
            Err(rejection) => {
                tracing::warn!(line, ?rejection, "row rejected");
                outcome.rejected += 1;
                continue;
            }
        };

        let reviewed = valid.status.is_decision();
        let result = sqlx::query(
            r#"
            INSERT INTO sipma.activity_records
            (id, student_id, category_id, status, occurred_on, description, reviewer_id,
             reviewed_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, CASE WHEN $8::BOOLEAN THEN now() END, $9)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(valid.student_id)
        .bind(valid.category_id)
        .bind(valid.status.as_str())
        .bind(row.occurred_on)
        .bind(&row.description)
        .bind(reviewed.then_some(principal.user_id))
        .bind(reviewed)
        .bind(&valid.source_key)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() > 0 {
            outcome.inserted += 1;
        } else {
            outcome.duplicates += 1;
        }
    }

    tx.commit().await?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: Option<&str>, source_key: Option<&str>) -> ImportRow {
        ImportRow {
            nim: " 2021110001 ".to_string(),
            category: "Bakti Sosial".to_string(),
            occurred_on: NaiveDate::from_ymd_opt(2026, 1, 18).unwrap(),
            description: "Bakti sosial banjir".to_string(),
            status: status.map(str::to_string),
            source_key: source_key.map(str::to_string),
        }
    }

    fn lookups(category_active: bool) -> (HashMap<String, Uuid>, CategoryIndex) {
        let students = HashMap::from([("2021110001".to_string(), Uuid::from_u128(1))]);
        let categories =
            HashMap::from([("Bakti Sosial".to_string(), (Uuid::from_u128(2), category_active))]);
        (students, categories)
    }

    #[test]
    fn valid_row_defaults_to_pending() {
        let (students, categories) = lookups(true);
        let valid = validate_import_row(&row(None, Some("sheet-7")), &students, &categories)
            .unwrap();

        assert_eq!(valid.student_id, Uuid::from_u128(1));
        assert_eq!(valid.category_id, Uuid::from_u128(2));
        assert_eq!(valid.status, RecordStatus::Pending);
        assert_eq!(valid.source_key, "sheet-7");
    }

    #[test]
    fn unparseable_status_is_a_rejected_row() {
        let (students, categories) = lookups(true);
        let result = validate_import_row(&row(Some("maybe"), None), &students, &categories);
        assert_eq!(result, Err(RowRejection::InvalidStatus("maybe".to_string())));
    }

    #[test]
    fn unknown_student_and_category_are_rejected() {
        let (students, categories) = lookups(true);

        let mut stranger = row(None, None);
        stranger.nim = "1999000000".to_string();
        assert_eq!(
            validate_import_row(&stranger, &students, &categories),
            Err(RowRejection::UnknownStudent("1999000000".to_string()))
        );

        let mut unknown = row(None, None);
        unknown.category = "Lomba Hilang".to_string();
        assert_eq!(
            validate_import_row(&unknown, &students, &categories),
            Err(RowRejection::UnknownCategory("Lomba Hilang".to_string()))
        );
    }

    #[test]
    fn retired_category_refuses_pending_rows_only() {
        let (students, categories) = lookups(false);

        assert_eq!(
            validate_import_row(&row(Some("pending"), None), &students, &categories),
            Err(RowRejection::RetiredCategory("Bakti Sosial".to_string()))
        );
        let history = validate_import_row(&row(Some("approved"), None), &students, &categories);
        assert_eq!(history.map(|valid| valid.status), Ok(RecordStatus::Approved));
    }

    #[test]
    fn missing_source_key_is_stable_across_runs() {
        let (students, categories) = lookups(true);
        let first = validate_import_row(&row(None, None), &students, &categories).unwrap();
        let second = validate_import_row(&row(None, Some("  ")), &students, &categories).unwrap();

        assert_eq!(first.source_key, second.source_key);
        assert_eq!(
            first.source_key,
            "import:2021110001:Bakti Sosial:2026-01-18:Bakti sosial banjir"
        );
    }
}

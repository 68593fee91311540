//! # Prescription Repository
//!
//! Prescriptions a pharmacist records at the counter: who it is for, which
//! doctor wrote it, and what was prescribed.
//!
//! ```text
//!  POST /api/prescriptions
//!        │
//!        ▼
//!  BEGIN ── INSERT prescriptions ── INSERT prescription_items × n ── COMMIT
//!                                        │
//!                                        └── unknown product → rollback
//! ```

use apotheca_core::validation::{validate_id, validate_name, validate_quantity};
use apotheca_core::{Prescription, PrescriptionDetail, PrescriptionItem, ValidationError};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use super::generate_id;
use super::product::ProductRepository;
use crate::error::DbResult;

const PRESCRIPTION_COLUMNS: &str = "id, branch_id, pharmacist_id, patient_name, patient_age, doctor_name, \
     prc_number, prescription_number, prescription_date, diagnosis, notes, created_at";

const MAX_PATIENT_AGE: i64 = 150;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescribedItemInput {
    pub product_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub instructions: Option<String>,
}

/// Body of `POST /api/prescriptions`. Branch and pharmacist come from the
/// counter's token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPrescription {
    pub patient_name: String,
    #[serde(default)]
    pub age: Option<i64>,
    pub doctor_name: String,
    #[serde(default)]
    pub prc_number: Option<String>,
    #[serde(default)]
    pub prescription_number: Option<String>,
    #[serde(default)]
    pub prescription_date: Option<NaiveDate>,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<PrescribedItemInput>,
}

impl NewPrescription {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_name("patientName", &self.patient_name, 200)?;
        validate_name("doctorName", &self.doctor_name, 200)?;
        if let Some(age) = self.age {
            if !(0..=MAX_PATIENT_AGE).contains(&age) {
                return Err(ValidationError::OutOfRange {
                    field: "age".to_string(),
                    min: 0,
                    max: MAX_PATIENT_AGE,
                });
            }
        }
        for item in &self.items {
            validate_id("productId", &item.product_id)?;
            validate_quantity(item.quantity)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PrescriptionRepository {
    pool: SqlitePool,
}

impl PrescriptionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PrescriptionRepository { pool }
    }

    pub async fn create(
        &self,
        branch_id: &str,
        pharmacist_id: &str,
        input: &NewPrescription,
    ) -> DbResult<PrescriptionDetail> {
        input.validate()?;
        let mut tx = self.pool.begin().await?;

        let prescription: Prescription = sqlx::query_as(&format!(
            r#"
            INSERT INTO prescriptions (
                id, branch_id, pharmacist_id, patient_name, patient_age, doctor_name,
                prc_number, prescription_number, prescription_date, diagnosis, notes, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            RETURNING {}
            "#,
            PRESCRIPTION_COLUMNS
        ))
        .bind(generate_id())
        .bind(branch_id)
        .bind(pharmacist_id)
        .bind(input.patient_name.trim())
        .bind(input.age)
        .bind(input.doctor_name.trim())
        .bind(&input.prc_number)
        .bind(&input.prescription_number)
        .bind(input.prescription_date)
        .bind(&input.diagnosis)
        .bind(&input.notes)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        for (index, item) in input.items.iter().enumerate() {
            ProductRepository::require_active(&mut tx, &item.product_id).await?;
            sqlx::query(
                r#"
                INSERT INTO prescription_items (id, prescription_id, line_number, product_id, quantity, instructions)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(generate_id())
            .bind(&prescription.id)
            .bind(index as i64 + 1)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(&item.instructions)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            prescription_id = %prescription.id,
            pharmacist_id = %pharmacist_id,
            items = input.items.len(),
            "Prescription recorded"
        );

        let items = self.items(&prescription.id).await?;
        Ok(PrescriptionDetail { prescription, items })
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<PrescriptionDetail>> {
        let prescription: Option<Prescription> = sqlx::query_as(&format!(
            "SELECT {} FROM prescriptions WHERE id = ?1",
            PRESCRIPTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(prescription) = prescription else {
            return Ok(None);
        };
        let items = self.items(id).await?;
        Ok(Some(PrescriptionDetail { prescription, items }))
    }

    async fn items(&self, prescription_id: &str) -> DbResult<Vec<PrescriptionItem>> {
        let items = sqlx::query_as(
            r#"
            SELECT pi.id, pi.prescription_id, pi.line_number, pi.product_id,
                   p.name AS product_name, pi.quantity, pi.instructions
              FROM prescription_items pi
              JOIN products p ON p.id = pi.product_id
             WHERE pi.prescription_id = ?1
             ORDER BY pi.line_number
            "#,
        )
        .bind(prescription_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::fixture::{self, AMOXICILLIN, BRANCH, PARACETAMOL, PHARMACIST};
    use apotheca_core::CoreError;

    fn prescription(items: Vec<PrescribedItemInput>) -> NewPrescription {
        NewPrescription {
            patient_name: "Rosa Mendoza".to_string(),
            age: Some(67),
            doctor_name: "Dr. Jose Rizal".to_string(),
            prc_number: Some("0123456".to_string()),
            prescription_date: NaiveDate::from_ymd_opt(2026, 3, 14),
            diagnosis: Some("Upper respiratory infection".to_string()),
            items,
            ..Default::default()
        }
    }

    fn item(product: &str, quantity: i64) -> PrescribedItemInput {
        PrescribedItemInput {
            product_id: product.to_string(),
            quantity,
            instructions: Some("1 capsule every 8 hours".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_and_read_back() {
        let db = fixture::database().await;
        let created = db
            .prescriptions()
            .create(
                BRANCH,
                PHARMACIST,
                &prescription(vec![item(AMOXICILLIN, 21), item(PARACETAMOL, 10)]),
            )
            .await
            .unwrap();

        assert_eq!(created.items.len(), 2);
        assert_eq!(created.items[0].product_name, "Amoxicillin 500mg");
        assert_eq!(created.items[1].line_number, 2);

        let fetched = db.prescriptions().get(&created.prescription.id).await.unwrap().unwrap();
        assert_eq!(fetched.prescription.patient_age, Some(67));
        assert_eq!(fetched.prescription.pharmacist_id, PHARMACIST);
        assert_eq!(fetched.items.len(), 2);

        assert!(db.prescriptions().get("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_product_rolls_back() {
        let db = fixture::database().await;
        let err = db
            .prescriptions()
            .create(BRANCH, PHARMACIST, &prescription(vec![item(AMOXICILLIN, 1), item("ghost", 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::ProductNotFound(_))));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM prescriptions")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_validation() {
        let db = fixture::database().await;

        let mut no_doctor = prescription(vec![]);
        no_doctor.doctor_name = " ".to_string();
        let err = db.prescriptions().create(BRANCH, PHARMACIST, &no_doctor).await.unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::Validation(_))));

        let mut bad_age = prescription(vec![]);
        bad_age.age = Some(200);
        assert!(db.prescriptions().create(BRANCH, PHARMACIST, &bad_age).await.is_err());

        assert!(db
            .prescriptions()
            .create(BRANCH, PHARMACIST, &prescription(vec![item(AMOXICILLIN, 0)]))
            .await
            .is_err());
    }
}

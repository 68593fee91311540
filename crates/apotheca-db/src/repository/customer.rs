//! # Customer Repository
//!
//! Customers and their loyalty cards. A customer created at the counter
//! always gets a card; walk-in sales simply carry no customer.

use apotheca_core::validation::validate_name;
use apotheca_core::{Customer, CustomerWithCard, RecordStatus, ValidationError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use super::generate_id;
use super::loyalty::{LoyaltyLedger, ACCOUNT_COLUMNS};
use crate::error::DbResult;

const CUSTOMER_COLUMNS: &str = "id, name, phone, address, status, created_at";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    pub card_id: String,
}

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Creates the customer and a zero-balance loyalty account together.
    pub async fn create_with_card(&self, customer: &NewCustomer) -> DbResult<CustomerWithCard> {
        validate_name("name", &customer.name, 200)?;
        let card_id = customer.card_id.trim();
        if card_id.is_empty() {
            return Err(ValidationError::required("cardId").into());
        }

        let mut tx = self.pool.begin().await?;

        let created: Customer = sqlx::query_as(&format!(
            r#"
            INSERT INTO customers (id, name, phone, address, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING {}
            "#,
            CUSTOMER_COLUMNS
        ))
        .bind(generate_id())
        .bind(customer.name.trim())
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(RecordStatus::Active)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        let account = LoyaltyLedger::open_account(&mut tx, &created.id, card_id).await?;

        tx.commit().await?;

        info!(customer_id = %created.id, card_id = %card_id, "Customer registered");
        Ok(CustomerWithCard {
            customer: created,
            account,
        })
    }

    /// Looks a customer up by the card they hand over at the counter.
    pub async fn find_by_card(&self, card_id: &str) -> DbResult<Option<CustomerWithCard>> {
        let account: Option<apotheca_core::LoyaltyAccount> = sqlx::query_as(&format!(
            "SELECT {} FROM loyalty_accounts WHERE card_id = ?1",
            ACCOUNT_COLUMNS
        ))
        .bind(card_id.trim())
        .fetch_optional(&self.pool)
        .await?;

        let Some(account) = account else {
            return Ok(None);
        };
        let Some(customer) = self.get(&account.customer_id).await? else {
            return Ok(None);
        };

        Ok(Some(CustomerWithCard { customer, account }))
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_in(&mut conn, id).await
    }

    pub async fn find_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as(&format!(
            "SELECT {} FROM customers WHERE id = ?1 AND status = 'ACTIVE'",
            CUSTOMER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(customer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::fixture::{self, CARD, CUSTOMER};
    use apotheca_core::Points;

    fn new_customer(card: &str) -> NewCustomer {
        NewCustomer {
            name: "Ana Reyes".to_string(),
            phone: Some("09171234567".to_string()),
            address: None,
            card_id: card.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_find_by_card() {
        let db = fixture::database().await;

        let created = db.customers().create_with_card(&new_customer("CARD-0100")).await.unwrap();
        assert_eq!(created.account.points_balance, Points::zero());

        let found = db.customers().find_by_card("CARD-0100").await.unwrap().unwrap();
        assert_eq!(found.customer.id, created.customer.id);
        assert_eq!(found.customer.name, "Ana Reyes");
    }

    #[tokio::test]
    async fn test_duplicate_card_rolls_back_customer() {
        let db = fixture::database().await;

        let err = db.customers().create_with_card(&new_customer(CARD)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_fixture_customer_lookup() {
        let db = fixture::database().await;
        let found = db.customers().find_by_card(CARD).await.unwrap().unwrap();
        assert_eq!(found.customer.id, CUSTOMER);
        assert_eq!(found.account.points_balance, Points::from_whole(80));
        assert!(db.customers().find_by_card("NOPE").await.unwrap().is_none());
    }
}

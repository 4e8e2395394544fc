//! Database Repository
//!
//! `LedgerStore` implementation over SQLite. Guarded writes are expressed
//! as `UPDATE ... WHERE status = ?` or `WHERE version = ?`; a zero row count
//! means the guard failed. Multi-record commits run in one transaction that
//! is rolled back on any error.

use super::models::*;
use super::{DatabaseError, DbPool};
use crate::domain::entities::business::Business;
use crate::domain::entities::distribution::{Distribution, DistributionStatus};
use crate::domain::entities::investment::{Investment, InvestmentStatus};
use crate::domain::entities::performance::{BusinessPerformance, PerformanceStatus};
use crate::domain::repositories::ledger_store::*;
use crate::domain::value_objects::period::ReportingPeriod;
use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::{debug, error};

impl From<DatabaseError> for StoreError {
    fn from(e: DatabaseError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Map a sqlx error, turning unique-constraint violations into `Duplicate`
fn query_error(action: &str, e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            debug!("Unique constraint rejected {}: {}", action, db);
            return StoreError::Duplicate(format!("{}: {}", action, db.message()));
        }
    }
    error!("Failed to {}: {}", action, e);
    StoreError::Backend(format!("Failed to {}: {}", action, e))
}

const INSERT_BUSINESS: &str = r#"
    INSERT INTO businesses (
        id, name, owner_id, funding_goal, raised_amount, status,
        total_investors, average_investment, version, created_at, updated_at
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
"#;

const UPDATE_BUSINESS: &str = r#"
    UPDATE businesses
    SET name = ?1, funding_goal = ?2, raised_amount = ?3, status = ?4,
        total_investors = ?5, average_investment = ?6, version = ?7, updated_at = ?8
    WHERE id = ?9 AND version = ?10
"#;

const INSERT_INVESTMENT: &str = r#"
    INSERT INTO investments (
        id, investor_id, business_id, amount, status, transaction_id,
        payment_json, terms_json, tracking_json, refund_json, created_at
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
"#;

const UPDATE_INVESTMENT: &str = r#"
    UPDATE investments
    SET status = ?1, payment_json = ?2, tracking_json = ?3, refund_json = ?4
    WHERE id = ?5 AND status = ?6
"#;

const INSERT_PERFORMANCE: &str = r#"
    INSERT INTO performances (
        id, business_id, year, quarter, status, figures_json, revenue_growth,
        breakdown_json, review_json, created_at, updated_at
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
"#;

const UPDATE_PERFORMANCE: &str = r#"
    UPDATE performances
    SET status = ?1, figures_json = ?2, revenue_growth = ?3, breakdown_json = ?4,
        review_json = ?5, updated_at = ?6
    WHERE id = ?7 AND status = ?8
"#;

const INSERT_DISTRIBUTION: &str = r#"
    INSERT INTO distributions (
        id, business_id, performance_id, investor_id, investment_id, year, quarter,
        status, distribution_type, net_distribution, snapshot_json, approval_json,
        payout_json, failure_reason, cancellation_reason, audit_json, created_at
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
"#;

const UPDATE_DISTRIBUTION: &str = r#"
    UPDATE distributions
    SET status = ?1, distribution_type = ?2, net_distribution = ?3, approval_json = ?4,
        payout_json = ?5, failure_reason = ?6, cancellation_reason = ?7, audit_json = ?8
    WHERE id = ?9 AND status = ?10
"#;

/// SQLite-backed ledger
pub struct SqliteLedgerStore {
    pool: DbPool,
}

impl SqliteLedgerStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn current_status(
        conn: &mut SqliteConnection,
        table: &'static str,
        entity: &'static str,
        id: &str,
    ) -> StoreResult<String> {
        let sql = format!("SELECT status FROM {} WHERE id = ?1", table);
        let row: Option<(String,)> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| query_error("read status", e))?;
        row.map(|(status,)| status).ok_or_else(|| StoreError::NotFound {
            entity,
            id: id.to_string(),
        })
    }

    async fn write_business(
        conn: &mut SqliteConnection,
        business: &Business,
        expected_version: u64,
    ) -> StoreResult<()> {
        let record = BusinessRecord::from(business);
        let rows = sqlx::query(UPDATE_BUSINESS)
            .bind(&record.name)
            .bind(record.funding_goal)
            .bind(record.raised_amount)
            .bind(&record.status)
            .bind(record.total_investors)
            .bind(record.average_investment)
            .bind(expected_version as i64 + 1)
            .bind(record.updated_at)
            .bind(&record.id)
            .bind(expected_version as i64)
            .execute(&mut *conn)
            .await
            .map_err(|e| query_error("update business", e))?
            .rows_affected();

        if rows == 0 {
            return Err(Self::version_mismatch(conn, &record.id, expected_version).await);
        }
        Ok(())
    }

    /// Lock the business row for this transaction without changing it,
    /// failing if it is no longer at `expected_version`
    async fn hold_business_version(
        conn: &mut SqliteConnection,
        business_id: &str,
        expected_version: u64,
    ) -> StoreResult<()> {
        let rows = sqlx::query("UPDATE businesses SET version = version WHERE id = ?1 AND version = ?2")
            .bind(business_id)
            .bind(expected_version as i64)
            .execute(&mut *conn)
            .await
            .map_err(|e| query_error("check business version", e))?
            .rows_affected();
        if rows == 0 {
            return Err(Self::version_mismatch(conn, business_id, expected_version).await);
        }
        Ok(())
    }

    async fn version_mismatch(
        conn: &mut SqliteConnection,
        business_id: &str,
        expected_version: u64,
    ) -> StoreError {
        let found: Result<Option<(i64,)>, _> =
            sqlx::query_as("SELECT version FROM businesses WHERE id = ?1")
                .bind(business_id)
                .fetch_optional(&mut *conn)
                .await;
        match found {
            Ok(Some((found,))) => StoreError::VersionConflict {
                id: business_id.to_string(),
                expected: expected_version,
                found: found as u64,
            },
            Ok(None) => StoreError::NotFound {
                entity: "Business",
                id: business_id.to_string(),
            },
            Err(e) => query_error("read business version", e),
        }
    }

    async fn write_investment(
        conn: &mut SqliteConnection,
        investment: &Investment,
        expected_status: InvestmentStatus,
    ) -> StoreResult<()> {
        let record = InvestmentRecord::try_from(investment)?;
        let rows = sqlx::query(UPDATE_INVESTMENT)
            .bind(&record.status)
            .bind(&record.payment_json)
            .bind(&record.tracking_json)
            .bind(&record.refund_json)
            .bind(&record.id)
            .bind(expected_status.to_string())
            .execute(&mut *conn)
            .await
            .map_err(|e| query_error("update investment", e))?
            .rows_affected();

        if rows == 0 {
            let found = Self::current_status(conn, "investments", "Investment", &record.id).await?;
            return Err(StoreError::StaleState(format!(
                "investment {} is {}, expected {}",
                record.id, found, expected_status
            )));
        }
        Ok(())
    }

    async fn write_performance(
        conn: &mut SqliteConnection,
        performance: &BusinessPerformance,
        expected_status: PerformanceStatus,
    ) -> StoreResult<()> {
        let record = PerformanceRecord::try_from(performance)?;
        let rows = sqlx::query(UPDATE_PERFORMANCE)
            .bind(&record.status)
            .bind(&record.figures_json)
            .bind(record.revenue_growth)
            .bind(&record.breakdown_json)
            .bind(&record.review_json)
            .bind(record.updated_at)
            .bind(&record.id)
            .bind(expected_status.to_string())
            .execute(&mut *conn)
            .await
            .map_err(|e| query_error("update performance", e))?
            .rows_affected();

        if rows == 0 {
            let found =
                Self::current_status(conn, "performances", "BusinessPerformance", &record.id).await?;
            return Err(StoreError::StaleState(format!(
                "performance {} is {}, expected {}",
                record.id, found, expected_status
            )));
        }
        Ok(())
    }

    async fn insert_distribution(
        conn: &mut SqliteConnection,
        distribution: &Distribution,
    ) -> StoreResult<()> {
        let record = DistributionRecord::try_from(distribution)?;
        sqlx::query(INSERT_DISTRIBUTION)
            .bind(&record.id)
            .bind(&record.business_id)
            .bind(&record.performance_id)
            .bind(&record.investor_id)
            .bind(&record.investment_id)
            .bind(record.year)
            .bind(record.quarter)
            .bind(&record.status)
            .bind(&record.distribution_type)
            .bind(record.net_distribution)
            .bind(&record.snapshot_json)
            .bind(&record.approval_json)
            .bind(&record.payout_json)
            .bind(&record.failure_reason)
            .bind(&record.cancellation_reason)
            .bind(&record.audit_json)
            .bind(record.created_at)
            .execute(&mut *conn)
            .await
            .map_err(|e| query_error("insert distribution", e))?;
        Ok(())
    }

    async fn begin(&self) -> StoreResult<sqlx::Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .map_err(|e| query_error("begin transaction", e))
    }
}

fn convert<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = DatabaseError>,
{
    rows.into_iter()
        .map(|r| T::try_from(r).map_err(StoreError::from))
        .collect()
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn insert_business(&self, business: &Business) -> StoreResult<()> {
        let record = BusinessRecord::from(business);
        sqlx::query(INSERT_BUSINESS)
            .bind(&record.id)
            .bind(&record.name)
            .bind(&record.owner_id)
            .bind(record.funding_goal)
            .bind(record.raised_amount)
            .bind(&record.status)
            .bind(record.total_investors)
            .bind(record.average_investment)
            .bind(record.version)
            .bind(record.created_at)
            .bind(record.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| query_error("insert business", e))?;
        debug!("Inserted business {}", record.id);
        Ok(())
    }

    async fn get_business(&self, id: &str) -> StoreResult<Option<Business>> {
        let record = sqlx::query_as::<_, BusinessRecord>("SELECT * FROM businesses WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_error("get business", e))?;
        Ok(record.map(Business::try_from).transpose()?)
    }

    async fn update_business(&self, business: &Business, expected_version: u64) -> StoreResult<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| query_error("acquire connection", e))?;
        Self::write_business(&mut conn, business, expected_version).await
    }

    async fn insert_investment(&self, investment: &Investment) -> StoreResult<()> {
        let record = InvestmentRecord::try_from(investment)?;
        sqlx::query(INSERT_INVESTMENT)
            .bind(&record.id)
            .bind(&record.investor_id)
            .bind(&record.business_id)
            .bind(record.amount)
            .bind(&record.status)
            .bind(&record.transaction_id)
            .bind(&record.payment_json)
            .bind(&record.terms_json)
            .bind(&record.tracking_json)
            .bind(&record.refund_json)
            .bind(record.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| query_error("insert investment", e))?;
        debug!("Inserted investment {}", record.id);
        Ok(())
    }

    async fn get_investment(&self, id: &str) -> StoreResult<Option<Investment>> {
        let record =
            sqlx::query_as::<_, InvestmentRecord>("SELECT * FROM investments WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| query_error("get investment", e))?;
        Ok(record.map(Investment::try_from).transpose()?)
    }

    async fn update_investment(
        &self,
        investment: &Investment,
        expected_status: InvestmentStatus,
    ) -> StoreResult<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| query_error("acquire connection", e))?;
        Self::write_investment(&mut conn, investment, expected_status).await
    }

    async fn find_active_investment(
        &self,
        investor_id: &str,
        business_id: &str,
    ) -> StoreResult<Option<Investment>> {
        let record = sqlx::query_as::<_, InvestmentRecord>(
            r#"
            SELECT * FROM investments
            WHERE investor_id = ?1 AND business_id = ?2 AND status IN ('pending', 'completed')
            LIMIT 1
            "#,
        )
        .bind(investor_id)
        .bind(business_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_error("find active investment", e))?;
        Ok(record.map(Investment::try_from).transpose()?)
    }

    async fn list_investments(&self, filter: &InvestmentFilter) -> StoreResult<Vec<Investment>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM investments WHERE 1 = 1");
        if let Some(investor_id) = &filter.investor_id {
            qb.push(" AND investor_id = ").push_bind(investor_id.clone());
        }
        if let Some(business_id) = &filter.business_id {
            qb.push(" AND business_id = ").push_bind(business_id.clone());
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.to_string());
        }
        qb.push(" ORDER BY created_at ASC, id ASC");

        let records = qb
            .build_query_as::<InvestmentRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_error("list investments", e))?;
        convert(records)
    }

    async fn commit_funding(&self, commit: &FundingCommit) -> StoreResult<()> {
        if commit.investment.business_id != commit.business.id {
            return Err(StoreError::StaleState(format!(
                "investment {} does not belong to business {}",
                commit.investment.id, commit.business.id
            )));
        }
        let mut tx = self.begin().await?;
        Self::write_investment(&mut tx, &commit.investment, commit.expected_investment_status)
            .await?;
        Self::write_business(&mut tx, &commit.business, commit.expected_business_version).await?;
        tx.commit()
            .await
            .map_err(|e| query_error("commit funding", e))?;
        debug!(
            "Committed investment {} ({}) with business {} at version {}",
            commit.investment.id,
            commit.investment.status,
            commit.business.id,
            commit.expected_business_version + 1
        );
        Ok(())
    }

    async fn insert_performance(&self, performance: &BusinessPerformance) -> StoreResult<()> {
        let record = PerformanceRecord::try_from(performance)?;
        sqlx::query(INSERT_PERFORMANCE)
            .bind(&record.id)
            .bind(&record.business_id)
            .bind(record.year)
            .bind(record.quarter)
            .bind(&record.status)
            .bind(&record.figures_json)
            .bind(record.revenue_growth)
            .bind(&record.breakdown_json)
            .bind(&record.review_json)
            .bind(record.created_at)
            .bind(record.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| query_error("insert performance", e))?;
        debug!("Inserted performance {}", record.id);
        Ok(())
    }

    async fn get_performance(&self, id: &str) -> StoreResult<Option<BusinessPerformance>> {
        let record =
            sqlx::query_as::<_, PerformanceRecord>("SELECT * FROM performances WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| query_error("get performance", e))?;
        Ok(record.map(BusinessPerformance::try_from).transpose()?)
    }

    async fn update_performance(
        &self,
        performance: &BusinessPerformance,
        expected_status: PerformanceStatus,
    ) -> StoreResult<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| query_error("acquire connection", e))?;
        Self::write_performance(&mut conn, performance, expected_status).await
    }

    async fn find_performance(
        &self,
        business_id: &str,
        period: ReportingPeriod,
    ) -> StoreResult<Option<BusinessPerformance>> {
        let record = sqlx::query_as::<_, PerformanceRecord>(
            "SELECT * FROM performances WHERE business_id = ?1 AND year = ?2 AND quarter = ?3",
        )
        .bind(business_id)
        .bind(i64::from(period.year))
        .bind(i64::from(period.quarter))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_error("find performance", e))?;
        Ok(record.map(BusinessPerformance::try_from).transpose()?)
    }

    async fn list_performances(&self, business_id: &str) -> StoreResult<Vec<BusinessPerformance>> {
        let records = sqlx::query_as::<_, PerformanceRecord>(
            "SELECT * FROM performances WHERE business_id = ?1 ORDER BY year ASC, quarter ASC",
        )
        .bind(business_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_error("list performances", e))?;
        convert(records)
    }

    async fn commit_approval(&self, commit: &ApprovalCommit) -> StoreResult<()> {
        if let Some(foreign) = commit
            .distributions
            .iter()
            .find(|d| d.performance_id != commit.performance.id)
        {
            return Err(StoreError::StaleState(format!(
                "distribution {} belongs to performance {}",
                foreign.id, foreign.performance_id
            )));
        }

        let mut tx = self.begin().await?;
        Self::write_performance(&mut tx, &commit.performance, commit.expected_status).await?;
        Self::hold_business_version(
            &mut tx,
            &commit.performance.business_id,
            commit.expected_business_version,
        )
        .await?;
        for distribution in &commit.distributions {
            Self::insert_distribution(&mut tx, distribution).await?;
        }
        tx.commit()
            .await
            .map_err(|e| query_error("commit approval", e))?;
        debug!(
            "Committed approval of {} with {} distributions",
            commit.performance.id,
            commit.distributions.len()
        );
        Ok(())
    }

    async fn get_distribution(&self, id: &str) -> StoreResult<Option<Distribution>> {
        let record =
            sqlx::query_as::<_, DistributionRecord>("SELECT * FROM distributions WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| query_error("get distribution", e))?;
        Ok(record.map(Distribution::try_from).transpose()?)
    }

    async fn update_distribution(
        &self,
        distribution: &Distribution,
        expected_status: DistributionStatus,
    ) -> StoreResult<()> {
        let record = DistributionRecord::try_from(distribution)?;
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| query_error("acquire connection", e))?;
        let rows = sqlx::query(UPDATE_DISTRIBUTION)
            .bind(&record.status)
            .bind(&record.distribution_type)
            .bind(record.net_distribution)
            .bind(&record.approval_json)
            .bind(&record.payout_json)
            .bind(&record.failure_reason)
            .bind(&record.cancellation_reason)
            .bind(&record.audit_json)
            .bind(&record.id)
            .bind(expected_status.to_string())
            .execute(&mut *conn)
            .await
            .map_err(|e| query_error("update distribution", e))?
            .rows_affected();

        if rows == 0 {
            let found =
                Self::current_status(&mut conn, "distributions", "Distribution", &record.id).await?;
            return Err(StoreError::StaleState(format!(
                "distribution {} is {}, expected {}",
                record.id, found, expected_status
            )));
        }
        Ok(())
    }

    async fn list_distributions(&self, filter: &DistributionFilter) -> StoreResult<Vec<Distribution>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM distributions WHERE 1 = 1");
        if let Some(investor_id) = &filter.investor_id {
            qb.push(" AND investor_id = ").push_bind(investor_id.clone());
        }
        if let Some(business_id) = &filter.business_id {
            qb.push(" AND business_id = ").push_bind(business_id.clone());
        }
        if let Some(performance_id) = &filter.performance_id {
            qb.push(" AND performance_id = ").push_bind(performance_id.clone());
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.to_string());
        }
        if let Some(period) = filter.period {
            qb.push(" AND year = ")
                .push_bind(i64::from(period.year))
                .push(" AND quarter = ")
                .push_bind(i64::from(period.quarter));
        }
        qb.push(" ORDER BY created_at DESC, id ASC");

        let records = qb
            .build_query_as::<DistributionRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_error("list distributions", e))?;
        convert(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::business::BusinessStatus;
    use crate::domain::entities::distribution::CalculationSnapshot;
    use crate::domain::entities::investment::{InvestmentTerms, PaymentMethod, SettlementEvidence};
    use crate::domain::entities::performance::{PerformanceBreakdown, PerformanceFigures};
    use crate::domain::value_objects::money::Money;
    use crate::persistence::{init_database, DatabaseConfig};
    use chrono::Utc;

    async fn store() -> SqliteLedgerStore {
        let pool = init_database(&DatabaseConfig::in_memory()).await.unwrap();
        SqliteLedgerStore::new(pool)
    }

    async fn seeded_business(store: &SqliteLedgerStore) -> Business {
        let business =
            Business::new("biz-1".into(), "Bakery".into(), "owner-1".into(), 10_000.0).unwrap();
        store.insert_business(&business).await.unwrap();
        business
    }

    fn investment(id: &str, investor: &str, amount: f64) -> Investment {
        Investment::new(
            id.into(),
            investor.into(),
            "biz-1".into(),
            amount,
            PaymentMethod::BankTransfer,
            format!("TXN-{}", id),
            None,
            InvestmentTerms::default(),
            None,
            Utc::now(),
        )
        .unwrap()
    }

    fn settled(inv: &Investment) -> Investment {
        let mut next = inv.clone();
        next.settle(
            &SettlementEvidence {
                method: None,
                reference: None,
            },
            Utc::now(),
        )
        .unwrap();
        next
    }

    fn verified_performance(quarter: u8) -> BusinessPerformance {
        let mut perf = BusinessPerformance::draft(
            format!("perf-{}", quarter),
            "biz-1".into(),
            ReportingPeriod::new(2025, quarter).unwrap(),
            PerformanceFigures::from_amounts(50_000.0, 30_000.0).unwrap(),
            PerformanceBreakdown::default(),
            Utc::now(),
        )
        .unwrap();
        perf.status = PerformanceStatus::Verified;
        perf
    }

    fn distribution(id: &str, perf: &BusinessPerformance, investment_id: &str) -> Distribution {
        Distribution::new(
            id.into(),
            "biz-1".into(),
            perf.id.clone(),
            "investor-a".into(),
            investment_id.into(),
            CalculationSnapshot::new(
                Money::new(6_000.0).unwrap(),
                Money::new(10_000.0).unwrap(),
                perf.figures.profit,
                perf.figures.loss,
            ),
            perf.period,
            "admin",
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_business_round_trip_and_version_guard() {
        let store = store().await;
        let mut business = seeded_business(&store).await;

        business.credit(Money::new(4_000.0).unwrap(), Utc::now());
        store.update_business(&business, 0).await.unwrap();

        let stored = store.get_business("biz-1").await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.raised_amount.value(), 4_000.0);
        assert_eq!(stored.metrics.total_investors, 1);

        let err = store.update_business(&business, 0).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::VersionConflict {
                id: "biz-1".into(),
                expected: 0,
                found: 1
            }
        );
    }

    #[tokio::test]
    async fn test_active_pair_and_transaction_uniqueness() {
        let store = store().await;
        seeded_business(&store).await;
        let first = investment("inv-1", "investor-a", 500.0);
        store.insert_investment(&first).await.unwrap();

        let second = investment("inv-2", "investor-a", 700.0);
        assert!(matches!(
            store.insert_investment(&second).await,
            Err(StoreError::Duplicate(_))
        ));

        let mut reused_tx = investment("inv-3", "investor-b", 700.0);
        reused_tx.payment.transaction_id = first.payment.transaction_id.clone();
        assert!(matches!(
            store.insert_investment(&reused_tx).await,
            Err(StoreError::Duplicate(_))
        ));

        let mut cancelled = first.clone();
        cancelled.cancel(None, Utc::now()).unwrap();
        store
            .update_investment(&cancelled, InvestmentStatus::Pending)
            .await
            .unwrap();
        assert!(store.insert_investment(&second).await.is_ok());
    }

    #[tokio::test]
    async fn test_commit_funding_is_atomic() {
        let store = store().await;
        let mut business = seeded_business(&store).await;
        let inv = investment("inv-1", "investor-a", 6_000.0);
        store.insert_investment(&inv).await.unwrap();

        let completed = settled(&inv);
        business.credit(completed.amount, Utc::now());

        // stale business version: nothing may be written
        let stale = FundingCommit {
            investment: completed.clone(),
            expected_investment_status: InvestmentStatus::Pending,
            business: business.clone(),
            expected_business_version: 3,
        };
        assert!(matches!(
            store.commit_funding(&stale).await,
            Err(StoreError::VersionConflict { .. })
        ));
        let untouched = store.get_investment("inv-1").await.unwrap().unwrap();
        assert_eq!(untouched.status, InvestmentStatus::Pending);

        let commit = FundingCommit {
            expected_business_version: 0,
            ..stale
        };
        store.commit_funding(&commit).await.unwrap();
        assert_eq!(
            store.get_investment("inv-1").await.unwrap().unwrap().status,
            InvestmentStatus::Completed
        );

        // replay: the investment is no longer pending
        let replay = FundingCommit {
            expected_business_version: 1,
            ..commit
        };
        assert!(matches!(
            store.commit_funding(&replay).await,
            Err(StoreError::StaleState(_))
        ));
        let stored = store.get_business("biz-1").await.unwrap().unwrap();
        assert_eq!(stored.raised_amount.value(), 6_000.0);
        assert_eq!(stored.version, 1);
        assert_eq!(stored.status, BusinessStatus::Open);
    }

    #[tokio::test]
    async fn test_list_investments_filters() {
        let store = store().await;
        seeded_business(&store).await;
        let a = investment("inv-a", "investor-a", 500.0);
        let b = investment("inv-b", "investor-b", 900.0);
        store.insert_investment(&a).await.unwrap();
        store.insert_investment(&b).await.unwrap();
        store
            .update_investment(&settled(&b), InvestmentStatus::Pending)
            .await
            .unwrap();

        let completed = store
            .list_investments(&InvestmentFilter {
                business_id: Some("biz-1".into()),
                status: Some(InvestmentStatus::Completed),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, "inv-b");

        let active = store
            .find_active_investment("investor-a", "biz-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active, a);
    }

    #[tokio::test]
    async fn test_duplicate_period_rejected() {
        let store = store().await;
        seeded_business(&store).await;
        store.insert_performance(&verified_performance(1)).await.unwrap();

        let mut again = verified_performance(1);
        again.id = "perf-other".into();
        assert!(matches!(
            store.insert_performance(&again).await,
            Err(StoreError::Duplicate(_))
        ));
        assert!(store
            .find_performance("biz-1", ReportingPeriod::new(2025, 1).unwrap())
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_commit_approval_all_or_nothing() {
        let store = store().await;
        seeded_business(&store).await;
        let perf = verified_performance(1);
        store.insert_performance(&perf).await.unwrap();

        let mut approved = perf.clone();
        approved.approve("admin", Utc::now()).unwrap();

        // the second distribution repeats the (performance, investment) pair
        let bad = ApprovalCommit {
            performance: approved.clone(),
            expected_status: PerformanceStatus::Verified,
            distributions: vec![
                distribution("dist-1", &approved, "inv-1"),
                distribution("dist-2", &approved, "inv-1"),
            ],
            expected_business_version: 0,
        };
        assert!(matches!(
            store.commit_approval(&bad).await,
            Err(StoreError::Duplicate(_))
        ));
        assert!(store
            .list_distributions(&DistributionFilter::default())
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            store.get_performance(&perf.id).await.unwrap().unwrap().status,
            PerformanceStatus::Verified
        );

        let good = ApprovalCommit {
            distributions: vec![
                distribution("dist-1", &approved, "inv-1"),
                distribution("dist-2", &approved, "inv-2"),
            ],
            ..bad
        };
        store.commit_approval(&good).await.unwrap();
        assert_eq!(
            store
                .list_distributions(&DistributionFilter::for_performance(&perf.id))
                .await
                .unwrap()
                .len(),
            2
        );

        assert!(matches!(
            store.commit_approval(&good).await,
            Err(StoreError::StaleState(_))
        ));
    }

    #[tokio::test]
    async fn test_commit_approval_rejects_moved_business() {
        let store = store().await;
        let mut business = seeded_business(&store).await;
        let perf = verified_performance(1);
        store.insert_performance(&perf).await.unwrap();
        let mut approved = perf.clone();
        approved.approve("admin", Utc::now()).unwrap();

        business.credit(Money::new(2_000.0).unwrap(), Utc::now());
        store.update_business(&business, 0).await.unwrap();

        let stale = ApprovalCommit {
            performance: approved.clone(),
            expected_status: PerformanceStatus::Verified,
            distributions: vec![distribution("dist-1", &approved, "inv-1")],
            expected_business_version: 0,
        };
        assert!(matches!(
            store.commit_approval(&stale).await,
            Err(StoreError::VersionConflict { expected: 0, found: 1, .. })
        ));
        // the rolled back transaction left the report verified and no rows behind
        assert_eq!(
            store.get_performance(&perf.id).await.unwrap().unwrap().status,
            PerformanceStatus::Verified
        );
        assert!(store
            .list_distributions(&DistributionFilter::for_performance(&perf.id))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(store.get_business("biz-1").await.unwrap().unwrap().version, 1);

        store
            .commit_approval(&ApprovalCommit {
                expected_business_version: 1,
                ..stale
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_distribution_status_guard_and_filters() {
        let store = store().await;
        seeded_business(&store).await;
        let perf = verified_performance(2);
        store.insert_performance(&perf).await.unwrap();
        let mut approved = perf.clone();
        approved.approve("admin", Utc::now()).unwrap();
        store
            .commit_approval(&ApprovalCommit {
                performance: approved.clone(),
                expected_status: PerformanceStatus::Verified,
                distributions: vec![distribution("dist-1", &approved, "inv-1")],
                expected_business_version: 0,
            })
            .await
            .unwrap();

        let mut dist = store.get_distribution("dist-1").await.unwrap().unwrap();
        dist.approve("admin-2", None, Utc::now()).unwrap();
        store
            .update_distribution(&dist, DistributionStatus::Pending)
            .await
            .unwrap();
        assert!(matches!(
            store.update_distribution(&dist, DistributionStatus::Pending).await,
            Err(StoreError::StaleState(_))
        ));

        let stored = store.get_distribution("dist-1").await.unwrap().unwrap();
        assert_eq!(stored.status, DistributionStatus::Approved);
        assert_eq!(stored.audit.last_modified_by, "admin-2");
        assert!((stored.amounts.profit_share.value() - 12_000.0).abs() < 1e-6);

        let filter = DistributionFilter::for_investor("investor-a")
            .with_status(Some(DistributionStatus::Approved))
            .with_period(Some(ReportingPeriod::new(2025, 2).unwrap()));
        assert_eq!(store.list_distributions(&filter).await.unwrap().len(), 1);
        let other_period = filter.with_period(Some(ReportingPeriod::new(2025, 3).unwrap()));
        assert!(store.list_distributions(&other_period).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_records_report_not_found() {
        let store = store().await;
        let business =
            Business::new("ghost".into(), "Ghost".into(), "owner".into(), 1_000.0).unwrap();
        assert!(matches!(
            store.update_business(&business, 0).await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(store.get_investment("nope").await.unwrap().is_none());
    }
}

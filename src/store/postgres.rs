use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{BoardFilter, InventoryStore};
use crate::allocation::availability;
use crate::error::{AppError, AppResult};
use crate::models::*;

const CATEGORY_COLUMNS: &str = "id, name, description, manufacturer, version, lead_time_days, \
     minimum_stock_quantity, created_by, created_at";

const BOARD_COLUMNS: &str = "id, category_id, serial_number, location, condition, issued_by, \
     issued_to, qc_by, project_number, comments, inward_date_time, issued_date_time, \
     created_by, created_at";

const ISSUE_REQUEST_COLUMNS: &str = "id, category_id, serial_number, requested_by, issued_to, \
     project_number, comments, status, approved_by, approved_date_time, created_at";

const BULK_REQUEST_COLUMNS: &str = "id, boards, requested_by, issued_to, project_number, \
     comments, status, approved_by, approved_date_time, created_at";

/// PostgreSQL-backed store. Boards are ordered by their `seq` column, which
/// records insertion order.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BulkRow {
    id: Uuid,
    boards: Json<Vec<BoardRequest>>,
    requested_by: String,
    issued_to: String,
    project_number: String,
    comments: Option<String>,
    status: BulkRequestStatus,
    approved_by: Option<String>,
    approved_date_time: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<BulkRow> for BulkIssueRequest {
    fn from(row: BulkRow) -> Self {
        BulkIssueRequest {
            id: row.id,
            boards: row.boards.0,
            requested_by: row.requested_by,
            issued_to: row.issued_to,
            project_number: row.project_number,
            comments: row.comments,
            status: row.status,
            approved_by: row.approved_by,
            approved_date_time: row.approved_date_time,
            created_at: row.created_at,
        }
    }
}

/// Appends ` AND <filter>` for the given board predicate.
fn push_board_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &BoardFilter) {
    match filter {
        BoardFilter::Any => {}
        BoardFilter::Available => {
            qb.push(" AND ");
            qb.push(availability::sql_predicate());
        }
        BoardFilter::UnderRepair => {
            qb.push(" AND (condition = ");
            qb.push_bind(availability::CONDITION_UNDER_REPAIR);
            qb.push(" OR (location = ");
            qb.push_bind(BoardLocation::Repairing);
            qb.push(" AND condition <> ");
            qb.push_bind(availability::CONDITION_REPAIRED);
            qb.push("))");
        }
        BoardFilter::NotInStock => {
            qb.push(" AND location <> ");
            qb.push_bind(BoardLocation::InStock);
        }
        BoardFilter::Condition(condition) => {
            qb.push(" AND condition = ");
            qb.push_bind(condition.clone());
        }
    }
}

fn push_category_scope(qb: &mut QueryBuilder<'_, Postgres>, category_id: Option<Uuid>) {
    if let Some(id) = category_id {
        qb.push(" AND category_id = ");
        qb.push_bind(id);
    }
}

fn map_category_write(e: sqlx::Error, name: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return AppError::CategoryNameTaken(name.to_string());
        }
    }
    e.into()
}

#[async_trait]
impl InventoryStore for PgStore {
    // ── Categories ──────────────────────────────────────────────────────────

    async fn insert_category(&self, c: &Category) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO categories
                (id, name, description, manufacturer, version, lead_time_days,
                 minimum_stock_quantity, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(c.id)
        .bind(&c.name)
        .bind(&c.description)
        .bind(&c.manufacturer)
        .bind(&c.version)
        .bind(c.lead_time_days)
        .bind(c.minimum_stock_quantity)
        .bind(&c.created_by)
        .bind(c.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_category_write(e, &c.name))?;
        Ok(())
    }

    async fn get_category(&self, id: Uuid) -> AppResult<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1");
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY created_at, name");
        Ok(sqlx::query_as::<_, Category>(&sql).fetch_all(&self.pool).await?)
    }

    async fn update_category(&self, c: &Category) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE categories
            SET name                   = $1,
                description            = $2,
                manufacturer           = $3,
                version                = $4,
                lead_time_days         = $5,
                minimum_stock_quantity = $6
            WHERE id = $7
            "#,
        )
        .bind(&c.name)
        .bind(&c.description)
        .bind(&c.manufacturer)
        .bind(&c.version)
        .bind(c.lead_time_days)
        .bind(c.minimum_stock_quantity)
        .bind(c.id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_category_write(e, &c.name))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_category(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_foreign_key_violation() {
                        return AppError::CategoryInUse(id);
                    }
                }
                AppError::from(e)
            })?;
        Ok(result.rows_affected() > 0)
    }

    // ── Boards ──────────────────────────────────────────────────────────────

    async fn insert_board(&self, b: &Board) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO boards
                (id, category_id, serial_number, location, condition, issued_by, issued_to,
                 qc_by, project_number, comments, inward_date_time, issued_date_time,
                 created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(b.id)
        .bind(b.category_id)
        .bind(&b.serial_number)
        .bind(b.location)
        .bind(&b.condition)
        .bind(&b.issued_by)
        .bind(&b.issued_to)
        .bind(&b.qc_by)
        .bind(&b.project_number)
        .bind(&b.comments)
        .bind(b.inward_date_time)
        .bind(b.issued_date_time)
        .bind(&b.created_by)
        .bind(b.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::DuplicateSerial(b.serial_number.clone());
                }
                if db_err.is_foreign_key_violation() {
                    return AppError::CategoryNotFound(b.category_id);
                }
            }
            AppError::from(e)
        })?;
        Ok(())
    }

    async fn get_board(&self, id: Uuid) -> AppResult<Option<Board>> {
        let sql = format!("SELECT {BOARD_COLUMNS} FROM boards WHERE id = $1");
        Ok(sqlx::query_as::<_, Board>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_board(&self, category_id: Uuid, serial_number: &str) -> AppResult<Option<Board>> {
        let sql = format!(
            "SELECT {BOARD_COLUMNS} FROM boards WHERE category_id = $1 AND serial_number = $2"
        );
        Ok(sqlx::query_as::<_, Board>(&sql)
            .bind(category_id)
            .bind(serial_number)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_boards_by_serial(&self, serial_number: &str) -> AppResult<Vec<Board>> {
        let sql = format!("SELECT {BOARD_COLUMNS} FROM boards WHERE serial_number = $1 ORDER BY seq");
        Ok(sqlx::query_as::<_, Board>(&sql)
            .bind(serial_number)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_boards(&self, category_id: Option<Uuid>, filter: &BoardFilter) -> AppResult<Vec<Board>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {BOARD_COLUMNS} FROM boards WHERE TRUE"));
        push_category_scope(&mut qb, category_id);
        push_board_filter(&mut qb, filter);
        qb.push(" ORDER BY seq ASC");
        Ok(qb.build_query_as::<Board>().fetch_all(&self.pool).await?)
    }

    async fn count_boards(&self, category_id: Option<Uuid>, filter: &BoardFilter) -> AppResult<i64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM boards WHERE TRUE");
        push_category_scope(&mut qb, category_id);
        push_board_filter(&mut qb, filter);
        let (count,): (i64,) = qb.build_query_as().fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn update_board_if(
        &self,
        id: Uuid,
        expected: &BoardFilter,
        patch: &BoardPatch,
    ) -> AppResult<Option<Board>> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE boards SET location = COALESCE(");
        qb.push_bind(patch.location);
        qb.push(", location), condition = COALESCE(");
        qb.push_bind(patch.condition.clone());
        qb.push(", condition), issued_by = COALESCE(");
        qb.push_bind(patch.issued_by.clone());
        qb.push(", issued_by), issued_to = COALESCE(");
        qb.push_bind(patch.issued_to.clone());
        qb.push(", issued_to), project_number = COALESCE(");
        qb.push_bind(patch.project_number.clone());
        qb.push(", project_number), comments = COALESCE(");
        qb.push_bind(patch.comments.clone());
        qb.push(", comments), issued_date_time = COALESCE(");
        qb.push_bind(patch.issued_date_time);
        qb.push(", issued_date_time) WHERE id = ");
        qb.push_bind(id);
        push_board_filter(&mut qb, expected);
        qb.push(format!(" RETURNING {BOARD_COLUMNS}"));

        Ok(qb
            .build_query_as::<Board>()
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_board(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM boards WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ── Issue requests ──────────────────────────────────────────────────────

    async fn insert_issue_request(&self, r: &IssueRequest) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO issue_requests
                (id, category_id, serial_number, requested_by, issued_to, project_number,
                 comments, status, approved_by, approved_date_time, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(r.id)
        .bind(r.category_id)
        .bind(&r.serial_number)
        .bind(&r.requested_by)
        .bind(&r.issued_to)
        .bind(&r.project_number)
        .bind(&r.comments)
        .bind(r.status)
        .bind(&r.approved_by)
        .bind(r.approved_date_time)
        .bind(r.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_issue_request(&self, id: Uuid) -> AppResult<Option<IssueRequest>> {
        let sql = format!("SELECT {ISSUE_REQUEST_COLUMNS} FROM issue_requests WHERE id = $1");
        Ok(sqlx::query_as::<_, IssueRequest>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_issue_requests(&self, requested_by: Option<&str>) -> AppResult<Vec<IssueRequest>> {
        let sql = format!(
            "SELECT {ISSUE_REQUEST_COLUMNS} FROM issue_requests \
             WHERE ($1::text IS NULL OR requested_by = $1) ORDER BY created_at"
        );
        Ok(sqlx::query_as::<_, IssueRequest>(&sql)
            .bind(requested_by)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn count_issue_requests(&self, status: RequestStatus) -> AppResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM issue_requests WHERE status = $1")
            .bind(status)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn update_issue_request_if(
        &self,
        expected: RequestStatus,
        r: &IssueRequest,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE issue_requests
            SET serial_number      = $1,
                status             = $2,
                approved_by        = $3,
                approved_date_time = $4
            WHERE id = $5 AND status = $6
            "#,
        )
        .bind(&r.serial_number)
        .bind(r.status)
        .bind(&r.approved_by)
        .bind(r.approved_date_time)
        .bind(r.id)
        .bind(expected)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_issue_request(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM issue_requests WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ── Bulk issue requests ─────────────────────────────────────────────────

    async fn insert_bulk_request(&self, r: &BulkIssueRequest) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bulk_issue_requests
                (id, boards, requested_by, issued_to, project_number, comments, status,
                 approved_by, approved_date_time, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(r.id)
        .bind(Json(&r.boards))
        .bind(&r.requested_by)
        .bind(&r.issued_to)
        .bind(&r.project_number)
        .bind(&r.comments)
        .bind(r.status)
        .bind(&r.approved_by)
        .bind(r.approved_date_time)
        .bind(r.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_bulk_request(&self, id: Uuid) -> AppResult<Option<BulkIssueRequest>> {
        let sql = format!("SELECT {BULK_REQUEST_COLUMNS} FROM bulk_issue_requests WHERE id = $1");
        let row = sqlx::query_as::<_, BulkRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn list_bulk_requests(&self) -> AppResult<Vec<BulkIssueRequest>> {
        let sql = format!("SELECT {BULK_REQUEST_COLUMNS} FROM bulk_issue_requests ORDER BY created_at");
        let rows = sqlx::query_as::<_, BulkRow>(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_bulk_request_if(
        &self,
        expected: BulkRequestStatus,
        r: &BulkIssueRequest,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bulk_issue_requests
            SET boards             = $1,
                status             = $2,
                approved_by        = $3,
                approved_date_time = $4
            WHERE id = $5 AND status = $6
            "#,
        )
        .bind(Json(&r.boards))
        .bind(r.status)
        .bind(&r.approved_by)
        .bind(r.approved_date_time)
        .bind(r.id)
        .bind(expected)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_bulk_request(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM bulk_issue_requests WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

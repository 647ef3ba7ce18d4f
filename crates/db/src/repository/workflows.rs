//! Workflow definition and step-run repository.
//!
//! Workflow definitions are immutable once created: re-publishing a
//! workflow under the same name inserts a new row with `version`
//! incremented, never mutates an existing one.

use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::{WorkflowRow, WorkflowStepRunRow}, DbError};

pub struct NewWorkflow {
    pub name: String,
    pub domain: String,
    pub description: Option<String>,
    pub defaults: Value,
    pub tags: Value,
    pub definition: Value,
}

/// Insert a new workflow version. `version` is computed as
/// `1 + max(version)` among rows sharing `name`.
pub async fn create_workflow(pool: &PgPool, new: NewWorkflow) -> Result<WorkflowRow, DbError> {
    let id = Uuid::new_v4();

    let mut tx = pool.begin().await?;

    let (next_version,): (i32,) = sqlx::query_as(
        "SELECT COALESCE(MAX(version), 0) + 1 FROM core_workflows WHERE name = $1",
    )
    .bind(&new.name)
    .fetch_one(&mut *tx)
    .await?;

    let row = sqlx::query_as::<_, WorkflowRow>(
        r#"
        INSERT INTO core_workflows (id, name, domain, description, version, defaults, tags, definition)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id, name, domain, description, version, defaults, tags, definition, created_at
        "#,
    )
    .bind(id)
    .bind(&new.name)
    .bind(&new.domain)
    .bind(&new.description)
    .bind(next_version)
    .bind(&new.defaults)
    .bind(&new.tags)
    .bind(&new.definition)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(row)
}

pub async fn get_workflow(pool: &PgPool, id: Uuid) -> Result<WorkflowRow, DbError> {
    sqlx::query_as::<_, WorkflowRow>(
        r#"SELECT id, name, domain, description, version, defaults, tags, definition, created_at
           FROM core_workflows WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Fetch the latest version of the workflow named `name`.
pub async fn get_latest_by_name(pool: &PgPool, name: &str) -> Result<WorkflowRow, DbError> {
    sqlx::query_as::<_, WorkflowRow>(
        r#"SELECT id, name, domain, description, version, defaults, tags, definition, created_at
           FROM core_workflows WHERE name = $1 ORDER BY version DESC LIMIT 1"#,
    )
    .bind(name)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Count of distinct workflow *names* (not versions) — matches what
/// [`list_workflows`] shows once callers filter to the latest version per
/// name at a higher layer.
pub async fn count_workflows(pool: &PgPool) -> Result<i64, DbError> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(DISTINCT name) FROM core_workflows")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Every stored workflow version, newest first.
pub async fn list_workflows(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<WorkflowRow>, DbError> {
    let rows = sqlx::query_as::<_, WorkflowRow>(
        r#"SELECT id, name, domain, description, version, defaults, tags, definition, created_at
           FROM core_workflows ORDER BY created_at DESC LIMIT $1 OFFSET $2"#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// One row per distinct workflow name, the latest version of each — the
/// catalog view `GET /workflows` shows rather than every stored version.
pub async fn list_latest_workflows(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<WorkflowRow>, DbError> {
    let rows = sqlx::query_as::<_, WorkflowRow>(
        r#"
        SELECT DISTINCT ON (name) id, name, domain, description, version, defaults, tags, definition, created_at
        FROM core_workflows
        ORDER BY name, version DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Permanently delete every version of a workflow by id. Returns
/// `DbError::NotFound` if no row matched.
pub async fn delete_workflow(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM core_workflows WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// core_workflow_step_runs
// ---------------------------------------------------------------------------

pub struct NewStepRun {
    pub run_id: Uuid,
    pub step_name: String,
    pub step_type: String,
    pub step_order: i32,
}

pub async fn create_step_run(pool: &PgPool, new: NewStepRun) -> Result<WorkflowStepRunRow, DbError> {
    let step_id = Uuid::new_v4();
    let row = sqlx::query_as::<_, WorkflowStepRunRow>(
        r#"
        INSERT INTO core_workflow_step_runs (step_id, run_id, step_name, step_type, step_order)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING step_id, run_id, step_name, step_type, step_order, status,
                  started_at, completed_at, duration_ms, result, error, metrics
        "#,
    )
    .bind(step_id)
    .bind(new.run_id)
    .bind(new.step_name)
    .bind(new.step_type)
    .bind(new.step_order)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

#[allow(clippy::too_many_arguments)]
pub async fn complete_step_run(
    pool: &PgPool,
    step_id: Uuid,
    status: &str,
    duration_ms: i64,
    result: Option<Value>,
    error: Option<String>,
    metrics: Value,
) -> Result<(), DbError> {
    sqlx::query(
        r#"
        UPDATE core_workflow_step_runs
        SET status = $1, completed_at = now(), duration_ms = $2, result = $3, error = $4, metrics = $5
        WHERE step_id = $6
        "#,
    )
    .bind(status)
    .bind(duration_ms)
    .bind(result)
    .bind(error)
    .bind(metrics)
    .bind(step_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn mark_step_running(pool: &PgPool, step_id: Uuid) -> Result<(), DbError> {
    sqlx::query("UPDATE core_workflow_step_runs SET status = 'running', started_at = now() WHERE step_id = $1")
        .bind(step_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Look up a single step's run row by name, used on workflow resume to
/// decide whether a step already completed and its output can be reloaded
/// rather than re-executed.
pub async fn get_step_run(
    pool: &PgPool,
    run_id: Uuid,
    step_name: &str,
) -> Result<Option<WorkflowStepRunRow>, DbError> {
    let row = sqlx::query_as::<_, WorkflowStepRunRow>(
        r#"SELECT step_id, run_id, step_name, step_type, step_order, status,
                  started_at, completed_at, duration_ms, result, error, metrics
           FROM core_workflow_step_runs WHERE run_id = $1 AND step_name = $2"#,
    )
    .bind(run_id)
    .bind(step_name)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn list_step_runs(pool: &PgPool, run_id: Uuid) -> Result<Vec<WorkflowStepRunRow>, DbError> {
    let rows = sqlx::query_as::<_, WorkflowStepRunRow>(
        r#"SELECT step_id, run_id, step_name, step_type, step_order, status,
                  started_at, completed_at, duration_ms, result, error, metrics
           FROM core_workflow_step_runs WHERE run_id = $1 ORDER BY step_order ASC"#,
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

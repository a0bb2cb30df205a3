use sqlx::PgPool;
use tracing::info;

/// Creates the schema on boot if it does not exist yet. Every statement is
/// idempotent, so running against an already-initialized database is a no-op.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    const STATEMENTS: &[&str] = &[
        r#"
        CREATE TABLE IF NOT EXISTS endpoints (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name TEXT NOT NULL,
            url TEXT NOT NULL,
            method TEXT NOT NULL DEFAULT 'GET',
            headers JSONB NOT NULL DEFAULT '{}'::jsonb,
            payload JSONB,
            content_type TEXT,
            test_file BYTEA,
            test_file_name TEXT,
            form_field_name TEXT,
            timeout_ms INTEGER,
            interval_seconds INTEGER NOT NULL DEFAULT 60,
            alert_on_failure BOOLEAN NOT NULL DEFAULT TRUE,
            alert_threshold_ms INTEGER,
            active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS checks (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            endpoint_id UUID NOT NULL REFERENCES endpoints(id) ON DELETE CASCADE,
            status_code INTEGER,
            success BOOLEAN NOT NULL,
            response_time_ms INTEGER NOT NULL,
            response_body JSONB,
            error TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS alerts (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            endpoint_id UUID NOT NULL REFERENCES endpoints(id) ON DELETE CASCADE,
            message TEXT NOT NULL,
            alert_type TEXT NOT NULL DEFAULT 'down',
            sent BOOLEAN NOT NULL DEFAULT FALSE,
            dismissed BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS webhook_urls (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            url TEXT NOT NULL,
            label TEXT,
            active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_checks_endpoint_created ON checks (endpoint_id, created_at DESC)",
        "CREATE INDEX IF NOT EXISTS idx_checks_created ON checks (created_at)",
        "CREATE INDEX IF NOT EXISTS idx_alerts_created ON alerts (created_at DESC)",
    ];

    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }

    info!("Database schema verified.");
    Ok(())
}

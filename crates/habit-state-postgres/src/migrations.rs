use sqlx::PgPool;

/// Create the four tables the tracking/reminder model needs, if they don't
/// already exist. Sessions are deliberately absent: the spec's Open
/// Question resolution keeps session storage with the external auth
/// collaborator.
///
/// # Errors
///
/// Returns a [`sqlx::Error`] if any DDL statement fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY,
            email TEXT NOT NULL,
            timezone TEXT NOT NULL,
            locale TEXT NOT NULL,
            notification_preference TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS trackings (
            id UUID PRIMARY KEY,
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            question TEXT NOT NULL,
            notes TEXT,
            icon TEXT,
            days JSONB,
            state TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS trackings_user_id_idx ON trackings (user_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS tracking_schedules (
            tracking_id UUID NOT NULL REFERENCES trackings(id) ON DELETE CASCADE,
            hour SMALLINT NOT NULL,
            minute SMALLINT NOT NULL,
            PRIMARY KEY (tracking_id, hour, minute)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS reminders (
            id UUID PRIMARY KEY,
            tracking_id UUID NOT NULL REFERENCES trackings(id) ON DELETE CASCADE,
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            scheduled_time TIMESTAMPTZ NOT NULL,
            notes TEXT,
            answer_value TEXT,
            status TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS reminders_upcoming_due_idx \
         ON reminders (status, scheduled_time)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

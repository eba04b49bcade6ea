use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use habit_core::{DaysPattern, Reminder, Schedule, Tracking, TrackingState, User};
use habit_state::{DueReminder, StateError, Store, Transaction, TransactionBody};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction as SqlxTransaction};
use uuid::Uuid;

use crate::config::PostgresConfig;
use crate::convert::{
    answer_value_from_str, answer_value_to_str, preference_from_str, preference_to_str,
    reminder_status_from_str, reminder_status_to_str, tracking_state_from_str, tracking_state_to_str,
};
use crate::migrations;

/// `Store` implementation backed by a `sqlx::PgPool`.
///
/// Row-level locking for the "replace Upcoming" compound step is done with
/// `SELECT ... FOR UPDATE` on the tracking row inside the transaction, the
/// same pattern the teacher's Postgres backend uses for its distributed
/// lock table.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect, create the pool, and run migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Connection`] if pool creation fails, or
    /// [`StateError::Backend`] if migrations fail.
    pub async fn new(config: PostgresConfig) -> Result<Self, StateError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.pool_size)
            .connect(&config.url)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        migrations::run_migrations(&pool)
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Share an already-connected pool; still runs migrations.
    pub async fn from_pool(pool: PgPool) -> Result<Self, StateError> {
        migrations::run_migrations(&pool)
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;
        Ok(Self { pool })
    }

    async fn load_schedules(&self, tracking_id: Uuid) -> Result<Vec<Schedule>, StateError> {
        let rows = sqlx::query("SELECT hour, minute FROM tracking_schedules WHERE tracking_id = $1 ORDER BY hour, minute")
            .bind(tracking_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;
        rows.into_iter()
            .map(|row| {
                let hour: i16 = row.try_get("hour").map_err(|e| StateError::Backend(e.to_string()))?;
                let minute: i16 = row.try_get("minute").map_err(|e| StateError::Backend(e.to_string()))?;
                Ok(Schedule::new(hour as u8, minute as u8))
            })
            .collect()
    }

    fn user_from_row(row: &PgRow) -> Result<User, StateError> {
        let preference: String = row.try_get("notification_preference").map_err(|e| StateError::Backend(e.to_string()))?;
        Ok(User {
            id: row.try_get("id").map_err(|e| StateError::Backend(e.to_string()))?,
            email: row.try_get("email").map_err(|e| StateError::Backend(e.to_string()))?,
            timezone: row.try_get("timezone").map_err(|e| StateError::Backend(e.to_string()))?,
            locale: row.try_get("locale").map_err(|e| StateError::Backend(e.to_string()))?,
            notification_preference: preference_from_str(&preference)?,
        })
    }

    fn tracking_from_row(row: &PgRow, schedules: Vec<Schedule>) -> Result<Tracking, StateError> {
        let state: String = row.try_get("state").map_err(|e| StateError::Backend(e.to_string()))?;
        let days: sqlx::types::Json<Option<DaysPattern>> =
            row.try_get("days").map_err(|e| StateError::Backend(e.to_string()))?;
        Ok(Tracking {
            id: row.try_get("id").map_err(|e| StateError::Backend(e.to_string()))?,
            user_id: row.try_get("user_id").map_err(|e| StateError::Backend(e.to_string()))?,
            question: row.try_get("question").map_err(|e| StateError::Backend(e.to_string()))?,
            notes: row.try_get("notes").map_err(|e| StateError::Backend(e.to_string()))?,
            icon: row.try_get("icon").map_err(|e| StateError::Backend(e.to_string()))?,
            days: days.0,
            schedules,
            state: tracking_state_from_str(&state)?,
            created_at: row.try_get("created_at").map_err(|e| StateError::Backend(e.to_string()))?,
            updated_at: row.try_get("updated_at").map_err(|e| StateError::Backend(e.to_string()))?,
        })
    }

    fn reminder_from_row(row: &PgRow) -> Result<Reminder, StateError> {
        let status: String = row.try_get("status").map_err(|e| StateError::Backend(e.to_string()))?;
        let answer_value: Option<String> = row.try_get("answer_value").map_err(|e| StateError::Backend(e.to_string()))?;
        Ok(Reminder {
            id: row.try_get("id").map_err(|e| StateError::Backend(e.to_string()))?,
            tracking_id: row.try_get("tracking_id").map_err(|e| StateError::Backend(e.to_string()))?,
            user_id: row.try_get("user_id").map_err(|e| StateError::Backend(e.to_string()))?,
            scheduled_time: row.try_get("scheduled_time").map_err(|e| StateError::Backend(e.to_string()))?,
            notes: row.try_get("notes").map_err(|e| StateError::Backend(e.to_string()))?,
            answer_value: answer_value.map(|v| answer_value_from_str(&v)).transpose()?,
            status: reminder_status_from_str(&status)?,
            created_at: row.try_get("created_at").map_err(|e| StateError::Backend(e.to_string()))?,
            updated_at: row.try_get("updated_at").map_err(|e| StateError::Backend(e.to_string()))?,
        })
    }
}

async fn write_schedules(
    tx: &mut SqlxTransaction<'_, Postgres>,
    tracking_id: Uuid,
    schedules: &[Schedule],
) -> Result<(), StateError> {
    sqlx::query("DELETE FROM tracking_schedules WHERE tracking_id = $1")
        .bind(tracking_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| StateError::Backend(e.to_string()))?;
    for s in schedules {
        sqlx::query("INSERT INTO tracking_schedules (tracking_id, hour, minute) VALUES ($1, $2, $3)")
            .bind(tracking_id)
            .bind(s.hour as i16)
            .bind(s.minute as i16)
            .execute(&mut **tx)
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;
    }
    Ok(())
}

#[async_trait]
impl Store for PostgresStore {
    async fn load_user(&self, user_id: Uuid) -> Result<Option<User>, StateError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;
        row.as_ref().map(Self::user_from_row).transpose()
    }

    async fn upsert_user(&self, user: &User) -> Result<(), StateError> {
        sqlx::query(
            "INSERT INTO users (id, email, timezone, locale, notification_preference) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO UPDATE SET email = $2, timezone = $3, locale = $4, notification_preference = $5",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.timezone)
        .bind(&user.locale)
        .bind(preference_to_str(user.notification_preference))
        .execute(&self.pool)
        .await
        .map_err(|e| StateError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn insert_tracking(&self, tracking: &Tracking) -> Result<(), StateError> {
        let mut tx = self.pool.begin().await.map_err(|e| StateError::Backend(e.to_string()))?;
        sqlx::query(
            "INSERT INTO trackings (id, user_id, question, notes, icon, days, state, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(tracking.id)
        .bind(tracking.user_id)
        .bind(&tracking.question)
        .bind(&tracking.notes)
        .bind(&tracking.icon)
        .bind(sqlx::types::Json(&tracking.days))
        .bind(tracking_state_to_str(tracking.state))
        .bind(tracking.created_at)
        .bind(tracking.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| StateError::Backend(e.to_string()))?;
        write_schedules(&mut tx, tracking.id, &tracking.schedules).await?;
        tx.commit().await.map_err(|e| StateError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn load_tracking(&self, id: Uuid, user_id: Uuid) -> Result<Option<Tracking>, StateError> {
        let row = sqlx::query("SELECT * FROM trackings WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;
        match row {
            Some(row) => {
                let schedules = self.load_schedules(id).await?;
                Ok(Some(Self::tracking_from_row(&row, schedules)?))
            }
            None => Ok(None),
        }
    }

    async fn load_trackings_for_user(&self, user_id: Uuid) -> Result<Vec<Tracking>, StateError> {
        let rows = sqlx::query("SELECT * FROM trackings WHERE user_id = $1 AND state != 'deleted'")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: Uuid = row.try_get("id").map_err(|e| StateError::Backend(e.to_string()))?;
            let schedules = self.load_schedules(id).await?;
            out.push(Self::tracking_from_row(row, schedules)?);
        }
        Ok(out)
    }

    async fn update_tracking_fields(&self, tracking: &Tracking) -> Result<(), StateError> {
        let mut tx = self.pool.begin().await.map_err(|e| StateError::Backend(e.to_string()))?;
        let result = sqlx::query(
            "UPDATE trackings SET question = $1, notes = $2, icon = $3, days = $4, updated_at = $5 \
             WHERE id = $6 AND user_id = $7",
        )
        .bind(&tracking.question)
        .bind(&tracking.notes)
        .bind(&tracking.icon)
        .bind(sqlx::types::Json(&tracking.days))
        .bind(tracking.updated_at)
        .bind(tracking.id)
        .bind(tracking.user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| StateError::Backend(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(StateError::NotFound(format!("tracking {}", tracking.id)));
        }
        write_schedules(&mut tx, tracking.id, &tracking.schedules).await?;
        tx.commit().await.map_err(|e| StateError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn update_tracking_state(&self, id: Uuid, user_id: Uuid, state: TrackingState) -> Result<(), StateError> {
        let result = sqlx::query("UPDATE trackings SET state = $1, updated_at = now() WHERE id = $2 AND user_id = $3")
            .bind(tracking_state_to_str(state))
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(StateError::NotFound(format!("tracking {id}")));
        }
        Ok(())
    }

    async fn delete_tracking_cascade(&self, id: Uuid, user_id: Uuid) -> Result<(), StateError> {
        let result = sqlx::query("DELETE FROM trackings WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(StateError::NotFound(format!("tracking {id}")));
        }
        Ok(())
    }

    async fn insert_schedules(&self, tracking_id: Uuid, schedules: &[Schedule]) -> Result<(), StateError> {
        self.replace_schedules(tracking_id, schedules).await
    }

    async fn replace_schedules(&self, tracking_id: Uuid, schedules: &[Schedule]) -> Result<(), StateError> {
        let mut tx = self.pool.begin().await.map_err(|e| StateError::Backend(e.to_string()))?;
        write_schedules(&mut tx, tracking_id, schedules).await?;
        tx.commit().await.map_err(|e| StateError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn insert_reminder(&self, reminder: &Reminder) -> Result<(), StateError> {
        sqlx::query(
            "INSERT INTO reminders (id, tracking_id, user_id, scheduled_time, notes, answer_value, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(reminder.id)
        .bind(reminder.tracking_id)
        .bind(reminder.user_id)
        .bind(reminder.scheduled_time)
        .bind(&reminder.notes)
        .bind(reminder.answer_value.map(answer_value_to_str))
        .bind(reminder_status_to_str(reminder.status))
        .bind(reminder.created_at)
        .bind(reminder.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StateError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn load_reminder(&self, id: Uuid, user_id: Uuid) -> Result<Option<Reminder>, StateError> {
        let row = sqlx::query("SELECT * FROM reminders WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;
        row.as_ref().map(Self::reminder_from_row).transpose()
    }

    async fn load_reminders_for_user(&self, user_id: Uuid) -> Result<Vec<Reminder>, StateError> {
        let rows = sqlx::query("SELECT * FROM reminders WHERE user_id = $1 ORDER BY scheduled_time DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;
        rows.iter().map(Self::reminder_from_row).collect()
    }

    async fn update_reminder_fields(&self, reminder: &Reminder) -> Result<(), StateError> {
        let result = sqlx::query(
            "UPDATE reminders SET scheduled_time = $1, notes = $2, answer_value = $3, status = $4, updated_at = $5 \
             WHERE id = $6 AND user_id = $7",
        )
        .bind(reminder.scheduled_time)
        .bind(&reminder.notes)
        .bind(reminder.answer_value.map(answer_value_to_str))
        .bind(reminder_status_to_str(reminder.status))
        .bind(reminder.updated_at)
        .bind(reminder.id)
        .bind(reminder.user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StateError::Backend(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(StateError::NotFound(format!("reminder {}", reminder.id)));
        }
        Ok(())
    }

    async fn delete_reminder(&self, id: Uuid, user_id: Uuid) -> Result<(), StateError> {
        let result = sqlx::query("DELETE FROM reminders WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(StateError::NotFound(format!("reminder {id}")));
        }
        Ok(())
    }

    async fn load_upcoming_for_tracking(&self, tracking_id: Uuid, user_id: Uuid) -> Result<Option<Reminder>, StateError> {
        let row = sqlx::query(
            "SELECT * FROM reminders WHERE tracking_id = $1 AND user_id = $2 AND status = 'upcoming'",
        )
        .bind(tracking_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StateError::Backend(e.to_string()))?;
        row.as_ref().map(Self::reminder_from_row).transpose()
    }

    async fn delete_upcoming_for_tracking(&self, tracking_id: Uuid, user_id: Uuid) -> Result<u64, StateError> {
        let result = sqlx::query(
            "DELETE FROM reminders WHERE tracking_id = $1 AND user_id = $2 AND status = 'upcoming'",
        )
        .bind(tracking_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StateError::Backend(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn delete_pending_for_tracking(&self, tracking_id: Uuid, user_id: Uuid) -> Result<u64, StateError> {
        let result = sqlx::query(
            "DELETE FROM reminders WHERE tracking_id = $1 AND user_id = $2 AND status = 'pending'",
        )
        .bind(tracking_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StateError::Backend(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn scan_upcoming_due(&self, as_of: DateTime<Utc>) -> Result<Vec<DueReminder>, StateError> {
        let rows = sqlx::query(
            "SELECT r.*, t.question, t.notes AS tracking_notes, t.icon, t.days, t.state, \
                    t.created_at AS tracking_created_at, t.updated_at AS tracking_updated_at, \
                    u.email, u.timezone, u.locale, u.notification_preference \
             FROM reminders r \
             JOIN trackings t ON t.id = r.tracking_id \
             JOIN users u ON u.id = r.user_id \
             WHERE r.status = 'upcoming' AND r.scheduled_time <= $1 \
             ORDER BY r.scheduled_time ASC",
        )
        .bind(as_of)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StateError::Backend(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let reminder = Self::reminder_from_row(row)?;
            let schedules = self.load_schedules(reminder.tracking_id).await?;
            let state: String = row.try_get("state").map_err(|e| StateError::Backend(e.to_string()))?;
            let days: sqlx::types::Json<Option<DaysPattern>> =
                row.try_get("days").map_err(|e| StateError::Backend(e.to_string()))?;
            let tracking = Tracking {
                id: reminder.tracking_id,
                user_id: reminder.user_id,
                question: row.try_get("question").map_err(|e| StateError::Backend(e.to_string()))?,
                notes: row.try_get("tracking_notes").map_err(|e| StateError::Backend(e.to_string()))?,
                icon: row.try_get("icon").map_err(|e| StateError::Backend(e.to_string()))?,
                days: days.0,
                schedules,
                state: tracking_state_from_str(&state)?,
                created_at: row.try_get("tracking_created_at").map_err(|e| StateError::Backend(e.to_string()))?,
                updated_at: row.try_get("tracking_updated_at").map_err(|e| StateError::Backend(e.to_string()))?,
            };
            let preference: String = row.try_get("notification_preference").map_err(|e| StateError::Backend(e.to_string()))?;
            let user = User {
                id: reminder.user_id,
                email: row.try_get("email").map_err(|e| StateError::Backend(e.to_string()))?,
                timezone: row.try_get("timezone").map_err(|e| StateError::Backend(e.to_string()))?,
                locale: row.try_get("locale").map_err(|e| StateError::Backend(e.to_string()))?,
                notification_preference: preference_from_str(&preference)?,
            };
            out.push(DueReminder { reminder, tracking, user });
        }
        Ok(out)
    }

    async fn within_transaction(&self, body: TransactionBody) -> Result<(), StateError> {
        let mut tx = self.pool.begin().await.map_err(|e| StateError::Backend(e.to_string()))?;
        let mut txn = PostgresTransaction { tx: &mut tx };
        let result = body(&mut txn).await;
        match result {
            Ok(()) => {
                tx.commit().await.map_err(|e| StateError::Backend(e.to_string()))?;
                Ok(())
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }
}

struct PostgresTransaction<'t> {
    tx: &'t mut SqlxTransaction<'static, Postgres>,
}

impl Transaction for PostgresTransaction<'_> {
    fn delete_upcoming_for_tracking<'a>(
        &'a mut self,
        tracking_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'a, Result<u64, StateError>> {
        Box::pin(async move {
            // Row-level lock on the tracking row prevents a concurrent
            // chain_next from racing this delete-then-insert step.
            sqlx::query("SELECT id FROM trackings WHERE id = $1 FOR UPDATE")
                .bind(tracking_id)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| StateError::Backend(e.to_string()))?;
            let result = sqlx::query(
                "DELETE FROM reminders WHERE tracking_id = $1 AND user_id = $2 AND status = 'upcoming'",
            )
            .bind(tracking_id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;
            Ok(result.rows_affected())
        })
    }

    fn delete_pending_for_tracking<'a>(
        &'a mut self,
        tracking_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'a, Result<u64, StateError>> {
        Box::pin(async move {
            let result = sqlx::query(
                "DELETE FROM reminders WHERE tracking_id = $1 AND user_id = $2 AND status = 'pending'",
            )
            .bind(tracking_id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;
            Ok(result.rows_affected())
        })
    }

    fn insert_reminder<'a>(&'a mut self, reminder: &'a Reminder) -> BoxFuture<'a, Result<(), StateError>> {
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO reminders (id, tracking_id, user_id, scheduled_time, notes, answer_value, status, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(reminder.id)
            .bind(reminder.tracking_id)
            .bind(reminder.user_id)
            .bind(reminder.scheduled_time)
            .bind(&reminder.notes)
            .bind(reminder.answer_value.map(answer_value_to_str))
            .bind(reminder_status_to_str(reminder.status))
            .bind(reminder.created_at)
            .bind(reminder.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;
            Ok(())
        })
    }

    fn update_tracking_state<'a>(
        &'a mut self,
        tracking_id: Uuid,
        user_id: Uuid,
        state: TrackingState,
    ) -> BoxFuture<'a, Result<(), StateError>> {
        Box::pin(async move {
            let result = sqlx::query("UPDATE trackings SET state = $1, updated_at = now() WHERE id = $2 AND user_id = $3")
                .bind(tracking_state_to_str(state))
                .bind(tracking_id)
                .bind(user_id)
                .execute(&mut *self.tx)
                .await
                .map_err(|e| StateError::Backend(e.to_string()))?;
            if result.rows_affected() == 0 {
                return Err(StateError::NotFound(format!("tracking {tracking_id}")));
            }
            Ok(())
        })
    }
}


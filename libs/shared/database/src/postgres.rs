use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres};
use tracing::debug;

use shared_models::appointment::{Appointment, AppointmentDetails, AppointmentStatus, NewAppointment};
use shared_models::slot::{NewSlot, Slot};
use shared_models::user::{DoctorSummary, NewUser, User, UserProfile};

use crate::error::DatabaseError;
use crate::store::{Database, Transaction};

const MAX_CONNECTIONS: u32 = 10;

#[derive(Clone)]
pub struct PostgresDatabase {
    pool: PgPool,
}

impl PostgresDatabase {
    pub async fn connect(database_url: &str) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    async fn begin(&self) -> Result<Box<dyn Transaction>, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;
        Ok(Box::new(PostgresTransaction { tx }))
    }
}

pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

// ==============================================================================
// ROW MAPPING
// ==============================================================================

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = DatabaseError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role: row.role.parse().map_err(DatabaseError::Decode)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SlotRow {
    id: i64,
    doctor_id: i64,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    is_booked: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SlotRow> for Slot {
    fn from(row: SlotRow) -> Self {
        Slot {
            id: row.id,
            doctor_id: row.doctor_id,
            start: row.start_at,
            end: row.end_at,
            is_booked: row.is_booked,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct AppointmentRow {
    id: i64,
    patient_id: i64,
    doctor_id: i64,
    slot_id: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = DatabaseError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        Ok(Appointment {
            id: row.id,
            patient_id: row.patient_id,
            doctor_id: row.doctor_id,
            slot_id: row.slot_id,
            status: row.status.parse().map_err(DatabaseError::Decode)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// One row of the appointment listing join: appointment, slot and the
/// counterpart user.
#[derive(Debug, FromRow)]
struct AppointmentDetailsRow {
    id: i64,
    patient_id: i64,
    doctor_id: i64,
    slot_id: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    slot_start_at: DateTime<Utc>,
    slot_end_at: DateTime<Utc>,
    slot_is_booked: bool,
    slot_created_at: DateTime<Utc>,
    slot_updated_at: DateTime<Utc>,
    other_id: i64,
    other_name: String,
    other_email: String,
    other_role: String,
}

impl AppointmentDetailsRow {
    fn into_details(self, with_doctor: bool) -> Result<AppointmentDetails, DatabaseError> {
        let counterpart = UserProfile {
            id: self.other_id,
            name: self.other_name,
            email: self.other_email,
            role: self.other_role.parse().map_err(DatabaseError::Decode)?,
        };
        let slot = Slot {
            id: self.slot_id,
            doctor_id: self.doctor_id,
            start: self.slot_start_at,
            end: self.slot_end_at,
            is_booked: self.slot_is_booked,
            created_at: self.slot_created_at,
            updated_at: self.slot_updated_at,
        };
        let appointment = Appointment {
            id: self.id,
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            slot_id: self.slot_id,
            status: self.status.parse().map_err(DatabaseError::Decode)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        let (doctor, patient) = if with_doctor {
            (Some(counterpart), None)
        } else {
            (None, Some(counterpart))
        };
        Ok(AppointmentDetails {
            appointment,
            slot,
            doctor,
            patient,
        })
    }
}

const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at, updated_at";
const SLOT_COLUMNS: &str = "id, doctor_id, start_at, end_at, is_booked, created_at, updated_at";
const APPOINTMENT_COLUMNS: &str = "id, patient_id, doctor_id, slot_id, status, created_at, updated_at";

fn details_query(counterpart_column: &str, owner_column: &str) -> String {
    format!(
        r#"
        SELECT a.id, a.patient_id, a.doctor_id, a.slot_id, a.status, a.created_at, a.updated_at,
               s.start_at AS slot_start_at, s.end_at AS slot_end_at, s.is_booked AS slot_is_booked,
               s.created_at AS slot_created_at, s.updated_at AS slot_updated_at,
               u.id AS other_id, u.name AS other_name, u.email AS other_email, u.role AS other_role
        FROM appointments a
        JOIN time_slots s ON s.id = a.slot_id
        JOIN users u ON u.id = a.{counterpart_column}
        WHERE a.{owner_column} = $1
        ORDER BY a.created_at DESC, a.id DESC
        "#
    )
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn insert_user(&mut self, user: NewUser) -> Result<User, DatabaseError> {
        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO users (name, email, password_hash, role) VALUES ($1, $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&mut *self.tx)
        .await?;
        row.try_into()
    }

    async fn find_user_by_id(&mut self, user_id: i64) -> Result<Option<User>, DatabaseError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
                .bind(user_id)
                .fetch_optional(&mut *self.tx)
                .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, DatabaseError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS))
                .bind(email)
                .fetch_optional(&mut *self.tx)
                .await?;
        row.map(User::try_from).transpose()
    }

    async fn list_doctors(&mut self) -> Result<Vec<DoctorSummary>, DatabaseError> {
        let rows: Vec<(i64, String)> =
            sqlx::query_as("SELECT id, name FROM users WHERE role = 'DOCTOR' ORDER BY name ASC, id ASC")
                .fetch_all(&mut *self.tx)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(id, name)| DoctorSummary { id, name })
            .collect())
    }

    async fn insert_slot(&mut self, slot: NewSlot) -> Result<Slot, DatabaseError> {
        let row: SlotRow = sqlx::query_as(&format!(
            "INSERT INTO time_slots (doctor_id, start_at, end_at) VALUES ($1, $2, $3) RETURNING {}",
            SLOT_COLUMNS
        ))
        .bind(slot.doctor_id)
        .bind(slot.start)
        .bind(slot.end)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.into())
    }

    async fn find_slot(&mut self, slot_id: i64) -> Result<Option<Slot>, DatabaseError> {
        let row: Option<SlotRow> = sqlx::query_as(&format!(
            "SELECT {} FROM time_slots WHERE id = $1 FOR UPDATE",
            SLOT_COLUMNS
        ))
        .bind(slot_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Slot::from))
    }

    async fn list_slots_for_doctor(&mut self, doctor_id: i64) -> Result<Vec<Slot>, DatabaseError> {
        let rows: Vec<SlotRow> = sqlx::query_as(&format!(
            "SELECT {} FROM time_slots WHERE doctor_id = $1 ORDER BY start_at ASC, id ASC",
            SLOT_COLUMNS
        ))
        .bind(doctor_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(Slot::from).collect())
    }

    async fn list_open_slots_for_doctor(
        &mut self,
        doctor_id: i64,
        from: DateTime<Utc>,
    ) -> Result<Vec<Slot>, DatabaseError> {
        let rows: Vec<SlotRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM time_slots
            WHERE doctor_id = $1 AND is_booked = FALSE AND start_at >= $2
            ORDER BY start_at ASC, id ASC
            "#,
            SLOT_COLUMNS
        ))
        .bind(doctor_id)
        .bind(from)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(Slot::from).collect())
    }

    async fn update_slot_times(
        &mut self,
        slot_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Slot, DatabaseError> {
        let row: SlotRow = sqlx::query_as(&format!(
            r#"
            UPDATE time_slots SET start_at = $2, end_at = $3, updated_at = now()
            WHERE id = $1
            RETURNING {}
            "#,
            SLOT_COLUMNS
        ))
        .bind(slot_id)
        .bind(start)
        .bind(end)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.into())
    }

    async fn claim_slot(&mut self, slot_id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE time_slots SET is_booked = TRUE, updated_at = now()
            WHERE id = $1 AND is_booked = FALSE
            "#,
        )
        .bind(slot_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_slot(&mut self, slot_id: i64) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE time_slots SET is_booked = FALSE, updated_at = now() WHERE id = $1",
        )
        .bind(slot_id)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::RowNotFound(format!("time slot {}", slot_id)));
        }
        Ok(())
    }

    async fn delete_slot(&mut self, slot_id: i64) -> Result<(), DatabaseError> {
        // appointments referencing the slot cascade
        let result = sqlx::query("DELETE FROM time_slots WHERE id = $1")
            .bind(slot_id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::RowNotFound(format!("time slot {}", slot_id)));
        }
        Ok(())
    }

    async fn insert_appointment(
        &mut self,
        appointment: NewAppointment,
    ) -> Result<Appointment, DatabaseError> {
        let row: AppointmentRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO appointments (patient_id, doctor_id, slot_id, status)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            APPOINTMENT_COLUMNS
        ))
        .bind(appointment.patient_id)
        .bind(appointment.doctor_id)
        .bind(appointment.slot_id)
        .bind(appointment.status.as_str())
        .fetch_one(&mut *self.tx)
        .await?;
        row.try_into()
    }

    async fn find_appointment(
        &mut self,
        appointment_id: i64,
    ) -> Result<Option<Appointment>, DatabaseError> {
        let row: Option<AppointmentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM appointments WHERE id = $1 FOR UPDATE",
            APPOINTMENT_COLUMNS
        ))
        .bind(appointment_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(Appointment::try_from).transpose()
    }

    async fn update_appointment(
        &mut self,
        appointment_id: i64,
        slot_id: i64,
        status: AppointmentStatus,
    ) -> Result<Appointment, DatabaseError> {
        let row: AppointmentRow = sqlx::query_as(&format!(
            r#"
            UPDATE appointments SET slot_id = $2, status = $3, updated_at = now()
            WHERE id = $1
            RETURNING {}
            "#,
            APPOINTMENT_COLUMNS
        ))
        .bind(appointment_id)
        .bind(slot_id)
        .bind(status.as_str())
        .fetch_one(&mut *self.tx)
        .await?;
        row.try_into()
    }

    async fn count_active_appointments_for_slot(&mut self, slot_id: i64) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM appointments WHERE slot_id = $1 AND status <> 'CANCELLED'",
        )
        .bind(slot_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn list_appointments_for_patient(
        &mut self,
        patient_id: i64,
    ) -> Result<Vec<AppointmentDetails>, DatabaseError> {
        let rows: Vec<AppointmentDetailsRow> = sqlx::query_as(&details_query("doctor_id", "patient_id"))
            .bind(patient_id)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.into_iter().map(|row| row.into_details(true)).collect()
    }

    async fn list_appointments_for_doctor(
        &mut self,
        doctor_id: i64,
    ) -> Result<Vec<AppointmentDetails>, DatabaseError> {
        let rows: Vec<AppointmentDetailsRow> = sqlx::query_as(&details_query("patient_id", "doctor_id"))
            .bind(doctor_id)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.into_iter().map(|row| row.into_details(false)).collect()
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        let PostgresTransaction { tx } = *self;
        tx.commit().await?;
        debug!("Postgres transaction committed");
        Ok(())
    }
}

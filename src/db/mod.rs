pub mod documents;
#[cfg(test)]
pub mod memory;
pub mod seed;

use crate::domain::models::{
    MoodLog, NewMoodLog, NewPatient, NewProfile, NewPsychologist, NewSession, Patient,
    PatientDetails, PatientStatus, PatientUpdate, ProfileUpdate, Psychologist,
    PsychologistDetails, RiskLevel, SessionParty, SessionStatus, SessionType, SessionUpdate,
    TherapySession, UserProfile, UserRole,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub use documents::{AnalyticsStore, PgDocumentStore};

/// Failure of a write the store itself can refuse (constraint, duplicate key).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => StoreError::Rejected(db_err.message().to_string()),
            other => StoreError::Other(other.into()),
        }
    }
}

/// Relational store: profiles, patients, psychologists, sessions and mood logs.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_profile_by_email(&self, email: &str) -> Result<Option<UserProfile>>;
    async fn find_profile(&self, id: Uuid) -> Result<Option<UserProfile>>;
    async fn create_profile(&self, profile: NewProfile) -> Result<UserProfile, StoreError>;
    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<Option<UserProfile>>;

    async fn create_patient(&self, patient: NewPatient) -> Result<Patient, StoreError>;
    /// Creates a patient profile and its `patients` row together; neither is kept if either fails.
    async fn create_patient_account(&self, profile: NewProfile) -> Result<UserProfile, StoreError>;
    async fn find_patient(&self, id: Uuid) -> Result<Option<PatientDetails>>;
    async fn update_patient(&self, id: Uuid, update: PatientUpdate) -> Result<Option<Patient>, StoreError>;
    async fn patients_of(&self, psychologist_id: Uuid) -> Result<Vec<PatientDetails>>;

    async fn create_psychologist(&self, psychologist: NewPsychologist) -> Result<Psychologist, StoreError>;
    async fn find_psychologist(&self, id: Uuid) -> Result<Option<PsychologistDetails>>;
    async fn list_psychologists(&self) -> Result<Vec<PsychologistDetails>>;

    async fn create_session(&self, session: NewSession) -> Result<TherapySession, StoreError>;
    async fn find_session(&self, id: Uuid) -> Result<Option<TherapySession>>;
    async fn sessions_for(&self, user_id: Uuid, party: SessionParty) -> Result<Vec<TherapySession>>;
    async fn update_session(&self, id: Uuid, update: SessionUpdate) -> Result<Option<TherapySession>, StoreError>;

    async fn upsert_mood_log(&self, log: NewMoodLog) -> Result<MoodLog, StoreError>;
    async fn mood_logs(&self, patient_id: Uuid, limit: Option<i64>) -> Result<Vec<MoodLog>>;

    async fn count_profiles_since(&self, since: DateTime<Utc>) -> Result<i64>;
    async fn count_completed_sessions_since(&self, since: DateTime<Utc>) -> Result<i64>;

    fn connection_count(&self) -> u32 {
        0
    }
}

#[derive(Clone)]
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_enum<T: for<'a> TryFrom<&'a str>>(raw: &str, what: &str) -> Result<T> {
    T::try_from(raw).map_err(|_| anyhow!("unknown {what} '{raw}' in store"))
}

fn insert_profile(profile: &NewProfile) -> sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(
        r#"
        INSERT INTO user_profiles
            (id, first_name, last_name, email, hashed_password, user_type, phone, date_of_birth, gender)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id, first_name, last_name, email, hashed_password, user_type, phone,
                  date_of_birth, gender, emergency_contact, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&profile.first_name)
    .bind(&profile.last_name)
    .bind(&profile.email)
    .bind(&profile.hashed_password)
    .bind(profile.user_type.as_str())
    .bind(&profile.phone)
    .bind(profile.date_of_birth)
    .bind(&profile.gender)
}

fn profile_from_row(row: &PgRow) -> Result<UserProfile> {
    let user_type: String = row.try_get("user_type")?;
    Ok(UserProfile {
        id: row.try_get("id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        hashed_password: row.try_get("hashed_password")?,
        user_type: parse_enum::<UserRole>(&user_type, "user type")?,
        phone: row.try_get("phone")?,
        date_of_birth: row.try_get("date_of_birth")?,
        gender: row.try_get("gender")?,
        emergency_contact: row.try_get("emergency_contact")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn patient_from_row(row: &PgRow, created_col: &str) -> Result<Patient> {
    let risk: String = row.try_get("risk_level")?;
    let status: String = row.try_get("status")?;
    Ok(Patient {
        id: row.try_get("id")?,
        assigned_psychologist: row.try_get("assigned_psychologist")?,
        risk_level: parse_enum::<RiskLevel>(&risk, "risk level")?,
        status: parse_enum::<PatientStatus>(&status, "patient status")?,
        medical_history: row.try_get("medical_history")?,
        current_medications: row.try_get("current_medications")?,
        created_at: row.try_get(created_col)?,
    })
}

fn psychologist_from_row(row: &PgRow, created_col: &str) -> Result<Psychologist> {
    Ok(Psychologist {
        id: row.try_get("id")?,
        license_number: row.try_get("license_number")?,
        specializations: row
            .try_get::<Option<Vec<String>>, _>("specializations")?
            .unwrap_or_default(),
        years_experience: row.try_get("years_experience")?,
        consultation_fee: row.try_get("consultation_fee")?,
        bio: row.try_get("bio")?,
        rating: row.try_get("rating")?,
        total_patients: row.try_get("total_patients")?,
        created_at: row.try_get(created_col)?,
    })
}

fn session_from_row(row: &PgRow) -> Result<TherapySession> {
    let session_type: String = row.try_get("session_type")?;
    let status: String = row.try_get("status")?;
    Ok(TherapySession {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        psychologist_id: row.try_get("psychologist_id")?,
        session_date: row.try_get("session_date")?,
        duration_minutes: row.try_get("duration_minutes")?,
        session_type: parse_enum::<SessionType>(&session_type, "session type")?,
        status: parse_enum::<SessionStatus>(&status, "session status")?,
        notes: row.try_get("notes")?,
        patient_feedback: row.try_get("patient_feedback")?,
        therapist_rating: row.try_get("therapist_rating")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn mood_log_from_row(row: &PgRow) -> Result<MoodLog> {
    Ok(MoodLog {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        log_date: row.try_get("log_date")?,
        mood_score: row.try_get("mood_score")?,
        anxiety_level: row.try_get("anxiety_level")?,
        sleep_hours: row.try_get("sleep_hours")?,
        exercise_minutes: row.try_get("exercise_minutes")?,
        social_interaction: row.try_get("social_interaction")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
    })
}

fn patient_details_from_row(row: &PgRow) -> Result<PatientDetails> {
    Ok(PatientDetails {
        patient: patient_from_row(row, "patient_created_at")?,
        profile: profile_from_row(row)?.into(),
    })
}

fn psychologist_details_from_row(row: &PgRow) -> Result<PsychologistDetails> {
    Ok(PsychologistDetails {
        psychologist: psychologist_from_row(row, "psychologist_created_at")?,
        profile: profile_from_row(row)?.into(),
    })
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn find_profile_by_email(&self, email: &str) -> Result<Option<UserProfile>> {
        let row = sqlx::query(
            r#"
            SELECT id, first_name, last_name, email, hashed_password, user_type, phone,
                   date_of_birth, gender, emergency_contact, created_at, updated_at
            FROM user_profiles
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(profile_from_row).transpose()
    }

    async fn find_profile(&self, id: Uuid) -> Result<Option<UserProfile>> {
        let row = sqlx::query(
            r#"
            SELECT id, first_name, last_name, email, hashed_password, user_type, phone,
                   date_of_birth, gender, emergency_contact, created_at, updated_at
            FROM user_profiles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(profile_from_row).transpose()
    }

    async fn create_profile(&self, profile: NewProfile) -> Result<UserProfile, StoreError> {
        let row = insert_profile(&profile).fetch_one(&self.pool).await?;
        Ok(profile_from_row(&row)?)
    }

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<Option<UserProfile>> {
        let row = sqlx::query(
            r#"
            UPDATE user_profiles
            SET first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                phone = COALESCE($4, phone),
                date_of_birth = COALESCE($5, date_of_birth),
                gender = COALESCE($6, gender),
                emergency_contact = COALESCE($7, emergency_contact),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, first_name, last_name, email, hashed_password, user_type, phone,
                      date_of_birth, gender, emergency_contact, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(update.first_name)
        .bind(update.last_name)
        .bind(update.phone)
        .bind(update.date_of_birth)
        .bind(update.gender)
        .bind(update.emergency_contact)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(profile_from_row).transpose()
    }

    async fn create_patient(&self, patient: NewPatient) -> Result<Patient, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO patients
                (id, assigned_psychologist, risk_level, status, medical_history, current_medications)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, assigned_psychologist, risk_level, status, medical_history,
                      current_medications, created_at
            "#,
        )
        .bind(patient.id)
        .bind(patient.assigned_psychologist)
        .bind(patient.risk_level.as_str())
        .bind(patient.status.as_str())
        .bind(patient.medical_history)
        .bind(patient.current_medications)
        .fetch_one(&self.pool)
        .await?;
        Ok(patient_from_row(&row, "created_at")?)
    }

    async fn create_patient_account(&self, profile: NewProfile) -> Result<UserProfile, StoreError> {
        let mut tx = self.pool.begin().await?;
        let row = insert_profile(&profile).fetch_one(&mut *tx).await?;
        let created = profile_from_row(&row)?;
        sqlx::query("INSERT INTO patients (id) VALUES ($1)")
            .bind(created.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn find_patient(&self, id: Uuid) -> Result<Option<PatientDetails>> {
        let row = sqlx::query(
            r#"
            SELECT u.id, u.first_name, u.last_name, u.email, u.hashed_password, u.user_type,
                   u.phone, u.date_of_birth, u.gender, u.emergency_contact, u.created_at,
                   u.updated_at, p.assigned_psychologist, p.risk_level, p.status,
                   p.medical_history, p.current_medications, p.created_at AS patient_created_at
            FROM patients p
            JOIN user_profiles u ON u.id = p.id
            WHERE p.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(patient_details_from_row).transpose()
    }

    async fn update_patient(&self, id: Uuid, update: PatientUpdate) -> Result<Option<Patient>, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE patients
            SET assigned_psychologist = COALESCE($2, assigned_psychologist),
                risk_level = COALESCE($3, risk_level),
                status = COALESCE($4, status),
                medical_history = COALESCE($5, medical_history),
                current_medications = COALESCE($6, current_medications)
            WHERE id = $1
            RETURNING id, assigned_psychologist, risk_level, status, medical_history,
                      current_medications, created_at
            "#,
        )
        .bind(id)
        .bind(update.assigned_psychologist)
        .bind(update.risk_level.map(|r| r.as_str()))
        .bind(update.status.map(|s| s.as_str()))
        .bind(update.medical_history)
        .bind(update.current_medications)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row
            .as_ref()
            .map(|r| patient_from_row(r, "created_at"))
            .transpose()?)
    }

    async fn patients_of(&self, psychologist_id: Uuid) -> Result<Vec<PatientDetails>> {
        let rows = sqlx::query(
            r#"
            SELECT u.id, u.first_name, u.last_name, u.email, u.hashed_password, u.user_type,
                   u.phone, u.date_of_birth, u.gender, u.emergency_contact, u.created_at,
                   u.updated_at, p.assigned_psychologist, p.risk_level, p.status,
                   p.medical_history, p.current_medications, p.created_at AS patient_created_at
            FROM patients p
            JOIN user_profiles u ON u.id = p.id
            WHERE p.assigned_psychologist = $1
            ORDER BY u.last_name, u.first_name
            "#,
        )
        .bind(psychologist_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(patient_details_from_row).collect()
    }

    async fn create_psychologist(&self, psychologist: NewPsychologist) -> Result<Psychologist, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO psychologists
                (id, license_number, specializations, years_experience, consultation_fee, bio)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, license_number, specializations, years_experience, consultation_fee,
                      bio, rating, total_patients, created_at
            "#,
        )
        .bind(psychologist.id)
        .bind(&psychologist.license_number)
        .bind(&psychologist.specializations)
        .bind(psychologist.years_experience)
        .bind(psychologist.consultation_fee)
        .bind(&psychologist.bio)
        .fetch_one(&self.pool)
        .await?;
        Ok(psychologist_from_row(&row, "created_at")?)
    }

    async fn find_psychologist(&self, id: Uuid) -> Result<Option<PsychologistDetails>> {
        let row = sqlx::query(
            r#"
            SELECT u.id, u.first_name, u.last_name, u.email, u.hashed_password, u.user_type,
                   u.phone, u.date_of_birth, u.gender, u.emergency_contact, u.created_at,
                   u.updated_at, ps.license_number, ps.specializations, ps.years_experience,
                   ps.consultation_fee, ps.bio, ps.rating, ps.total_patients,
                   ps.created_at AS psychologist_created_at
            FROM psychologists ps
            JOIN user_profiles u ON u.id = ps.id
            WHERE ps.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(psychologist_details_from_row).transpose()
    }

    async fn list_psychologists(&self) -> Result<Vec<PsychologistDetails>> {
        let rows = sqlx::query(
            r#"
            SELECT u.id, u.first_name, u.last_name, u.email, u.hashed_password, u.user_type,
                   u.phone, u.date_of_birth, u.gender, u.emergency_contact, u.created_at,
                   u.updated_at, ps.license_number, ps.specializations, ps.years_experience,
                   ps.consultation_fee, ps.bio, ps.rating, ps.total_patients,
                   ps.created_at AS psychologist_created_at
            FROM psychologists ps
            JOIN user_profiles u ON u.id = ps.id
            ORDER BY ps.rating DESC, u.last_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(psychologist_details_from_row).collect()
    }

    async fn create_session(&self, session: NewSession) -> Result<TherapySession, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO therapy_sessions
                (id, patient_id, psychologist_id, session_date, duration_minutes, session_type, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, patient_id, psychologist_id, session_date, duration_minutes, session_type,
                      status, notes, patient_feedback, therapist_rating, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session.patient_id)
        .bind(session.psychologist_id)
        .bind(session.session_date)
        .bind(session.duration_minutes)
        .bind(session.session_type.as_str())
        .bind(&session.notes)
        .fetch_one(&self.pool)
        .await?;
        Ok(session_from_row(&row)?)
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<TherapySession>> {
        let row = sqlx::query(
            r#"
            SELECT id, patient_id, psychologist_id, session_date, duration_minutes, session_type,
                   status, notes, patient_feedback, therapist_rating, created_at, updated_at
            FROM therapy_sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn sessions_for(&self, user_id: Uuid, party: SessionParty) -> Result<Vec<TherapySession>> {
        let sql = match party {
            SessionParty::Patient => {
                r#"
                SELECT id, patient_id, psychologist_id, session_date, duration_minutes, session_type,
                       status, notes, patient_feedback, therapist_rating, created_at, updated_at
                FROM therapy_sessions
                WHERE patient_id = $1
                ORDER BY session_date DESC
                "#
            }
            SessionParty::Psychologist => {
                r#"
                SELECT id, patient_id, psychologist_id, session_date, duration_minutes, session_type,
                       status, notes, patient_feedback, therapist_rating, created_at, updated_at
                FROM therapy_sessions
                WHERE psychologist_id = $1
                ORDER BY session_date DESC
                "#
            }
        };
        let rows = sqlx::query(sql).bind(user_id).fetch_all(&self.pool).await?;
        rows.iter().map(session_from_row).collect()
    }

    async fn update_session(&self, id: Uuid, update: SessionUpdate) -> Result<Option<TherapySession>, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE therapy_sessions
            SET status = COALESCE($2, status),
                session_date = COALESCE($3, session_date),
                notes = COALESCE($4, notes),
                patient_feedback = COALESCE($5, patient_feedback),
                therapist_rating = COALESCE($6, therapist_rating),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, patient_id, psychologist_id, session_date, duration_minutes, session_type,
                      status, notes, patient_feedback, therapist_rating, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(update.status.map(|s| s.as_str()))
        .bind(update.session_date)
        .bind(update.notes)
        .bind(update.patient_feedback)
        .bind(update.therapist_rating)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(session_from_row).transpose()?)
    }

    async fn upsert_mood_log(&self, log: NewMoodLog) -> Result<MoodLog, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO mood_logs
                (id, patient_id, log_date, mood_score, anxiety_level, sleep_hours,
                 exercise_minutes, social_interaction, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (patient_id, log_date) DO UPDATE
            SET mood_score = EXCLUDED.mood_score,
                anxiety_level = EXCLUDED.anxiety_level,
                sleep_hours = EXCLUDED.sleep_hours,
                exercise_minutes = EXCLUDED.exercise_minutes,
                social_interaction = EXCLUDED.social_interaction,
                notes = EXCLUDED.notes
            RETURNING id, patient_id, log_date, mood_score, anxiety_level, sleep_hours,
                      exercise_minutes, social_interaction, notes, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(log.patient_id)
        .bind(log.log_date)
        .bind(log.mood_score)
        .bind(log.anxiety_level)
        .bind(log.sleep_hours)
        .bind(log.exercise_minutes)
        .bind(log.social_interaction)
        .bind(&log.notes)
        .fetch_one(&self.pool)
        .await?;
        Ok(mood_log_from_row(&row)?)
    }

    async fn mood_logs(&self, patient_id: Uuid, limit: Option<i64>) -> Result<Vec<MoodLog>> {
        // LIMIT NULL means no limit in Postgres
        let rows = sqlx::query(
            r#"
            SELECT id, patient_id, log_date, mood_score, anxiety_level, sleep_hours,
                   exercise_minutes, social_interaction, notes, created_at
            FROM mood_logs
            WHERE patient_id = $1
            ORDER BY log_date DESC
            LIMIT $2
            "#,
        )
        .bind(patient_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(mood_log_from_row).collect()
    }

    async fn count_profiles_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_profiles WHERE created_at >= $1")
            .bind(since)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_completed_sessions_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM therapy_sessions WHERE status = 'completed' AND updated_at >= $1",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    fn connection_count(&self) -> u32 {
        self.pool.size()
    }
}

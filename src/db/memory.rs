//! In-memory stand-ins for both stores, used by handler tests.

use super::{AnalyticsStore, ProfileStore, StoreError};
use crate::domain::models::{
    ActivityKey, ActivityLog, ActivityStat, ChatbotConversation, ChatbotStats, MlPrediction, MoodLog,
    NewMoodLog, NewPatient, NewProfile, NewPsychologist, NewSession, Patient, PatientDetails,
    PatientUpdate, PredictionKind, ProfileUpdate, Psychologist, PsychologistDetails,
    SessionAnalysis, SessionParty, SessionStatus, SessionUpdate, SystemMetrics, TherapySession,
    UserProfile,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<Vec<UserProfile>>,
    patients: RwLock<Vec<Patient>>,
    psychologists: RwLock<Vec<Psychologist>>,
    sessions: RwLock<Vec<TherapySession>>,
    mood_logs: RwLock<Vec<MoodLog>>,
    fail_patient_rows: AtomicBool,
}

impl MemoryProfileStore {
    /// Makes every later `patients` insert fail, as a constraint violation would.
    pub fn fail_patient_rows(&self, fail: bool) {
        self.fail_patient_rows.store(fail, Ordering::SeqCst);
    }

    pub async fn profile_count(&self) -> usize {
        self.profiles.read().await.len()
    }

    async fn details(&self, patient: &Patient) -> Option<PatientDetails> {
        let profiles = self.profiles.read().await;
        let profile = profiles.iter().find(|p| p.id == patient.id)?.clone();
        Some(PatientDetails {
            patient: patient.clone(),
            profile: profile.into(),
        })
    }

    async fn psychologist_details(&self, psychologist: &Psychologist) -> Option<PsychologistDetails> {
        let profiles = self.profiles.read().await;
        let profile = profiles.iter().find(|p| p.id == psychologist.id)?.clone();
        Some(PsychologistDetails {
            psychologist: psychologist.clone(),
            profile: profile.into(),
        })
    }
}

fn rejected(msg: &str) -> StoreError {
    StoreError::Rejected(msg.to_string())
}

fn new_profile_row(existing: &[UserProfile], profile: NewProfile) -> Result<UserProfile, StoreError> {
    if existing.iter().any(|p| p.email == profile.email) {
        return Err(rejected("duplicate key value violates unique constraint \"user_profiles_email_key\""));
    }
    let now = Utc::now();
    Ok(UserProfile {
        id: Uuid::new_v4(),
        first_name: profile.first_name,
        last_name: profile.last_name,
        email: profile.email,
        hashed_password: Some(profile.hashed_password),
        user_type: profile.user_type,
        phone: profile.phone,
        date_of_birth: profile.date_of_birth,
        gender: profile.gender,
        emergency_contact: None,
        created_at: now,
        updated_at: now,
    })
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn find_profile_by_email(&self, email: &str) -> Result<Option<UserProfile>> {
        Ok(self.profiles.read().await.iter().find(|p| p.email == email).cloned())
    }

    async fn find_profile(&self, id: Uuid) -> Result<Option<UserProfile>> {
        Ok(self.profiles.read().await.iter().find(|p| p.id == id).cloned())
    }

    async fn create_profile(&self, profile: NewProfile) -> Result<UserProfile, StoreError> {
        let mut profiles = self.profiles.write().await;
        let created = new_profile_row(&profiles, profile)?;
        profiles.push(created.clone());
        Ok(created)
    }

    async fn create_patient_account(&self, profile: NewProfile) -> Result<UserProfile, StoreError> {
        let mut profiles = self.profiles.write().await;
        let mut patients = self.patients.write().await;
        let created = new_profile_row(&profiles, profile)?;
        if self.fail_patient_rows.load(Ordering::SeqCst) {
            return Err(rejected("new row for relation \"patients\" violates check constraint"));
        }
        patients.push(Patient {
            id: created.id,
            assigned_psychologist: None,
            risk_level: Default::default(),
            status: Default::default(),
            medical_history: None,
            current_medications: None,
            created_at: created.created_at,
        });
        profiles.push(created.clone());
        Ok(created)
    }

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<Option<UserProfile>> {
        let mut profiles = self.profiles.write().await;
        let Some(profile) = profiles.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if let Some(v) = update.first_name {
            profile.first_name = v;
        }
        if let Some(v) = update.last_name {
            profile.last_name = v;
        }
        if update.phone.is_some() {
            profile.phone = update.phone;
        }
        if update.date_of_birth.is_some() {
            profile.date_of_birth = update.date_of_birth;
        }
        if update.gender.is_some() {
            profile.gender = update.gender;
        }
        if update.emergency_contact.is_some() {
            profile.emergency_contact = update.emergency_contact;
        }
        profile.updated_at = Utc::now();
        Ok(Some(profile.clone()))
    }

    async fn create_patient(&self, patient: NewPatient) -> Result<Patient, StoreError> {
        if self.find_profile(patient.id).await?.is_none() {
            return Err(rejected("insert or update on table \"patients\" violates foreign key constraint"));
        }
        let mut patients = self.patients.write().await;
        if patients.iter().any(|p| p.id == patient.id) {
            return Err(rejected("duplicate key value violates unique constraint \"patients_pkey\""));
        }
        let created = Patient {
            id: patient.id,
            assigned_psychologist: patient.assigned_psychologist,
            risk_level: patient.risk_level,
            status: patient.status,
            medical_history: patient.medical_history,
            current_medications: patient.current_medications,
            created_at: Utc::now(),
        };
        patients.push(created.clone());
        Ok(created)
    }

    async fn find_patient(&self, id: Uuid) -> Result<Option<PatientDetails>> {
        let patient = self.patients.read().await.iter().find(|p| p.id == id).cloned();
        match patient {
            Some(p) => Ok(self.details(&p).await),
            None => Ok(None),
        }
    }

    async fn update_patient(&self, id: Uuid, update: PatientUpdate) -> Result<Option<Patient>, StoreError> {
        let mut patients = self.patients.write().await;
        let Some(patient) = patients.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if update.assigned_psychologist.is_some() {
            patient.assigned_psychologist = update.assigned_psychologist;
        }
        if let Some(v) = update.risk_level {
            patient.risk_level = v;
        }
        if let Some(v) = update.status {
            patient.status = v;
        }
        if update.medical_history.is_some() {
            patient.medical_history = update.medical_history;
        }
        if update.current_medications.is_some() {
            patient.current_medications = update.current_medications;
        }
        Ok(Some(patient.clone()))
    }

    async fn patients_of(&self, psychologist_id: Uuid) -> Result<Vec<PatientDetails>> {
        let assigned: Vec<Patient> = self
            .patients
            .read()
            .await
            .iter()
            .filter(|p| p.assigned_psychologist == Some(psychologist_id))
            .cloned()
            .collect();
        let mut out = Vec::with_capacity(assigned.len());
        for patient in &assigned {
            if let Some(d) = self.details(patient).await {
                out.push(d);
            }
        }
        Ok(out)
    }

    async fn create_psychologist(&self, psychologist: NewPsychologist) -> Result<Psychologist, StoreError> {
        if self.find_profile(psychologist.id).await?.is_none() {
            return Err(rejected("insert or update on table \"psychologists\" violates foreign key constraint"));
        }
        let mut all = self.psychologists.write().await;
        if all.iter().any(|p| p.license_number == psychologist.license_number) {
            return Err(rejected("duplicate key value violates unique constraint \"psychologists_license_number_key\""));
        }
        let created = Psychologist {
            id: psychologist.id,
            license_number: psychologist.license_number,
            specializations: psychologist.specializations,
            years_experience: psychologist.years_experience,
            consultation_fee: psychologist.consultation_fee,
            bio: psychologist.bio,
            rating: 0.0,
            total_patients: 0,
            created_at: Utc::now(),
        };
        all.push(created.clone());
        Ok(created)
    }

    async fn find_psychologist(&self, id: Uuid) -> Result<Option<PsychologistDetails>> {
        let found = self.psychologists.read().await.iter().find(|p| p.id == id).cloned();
        match found {
            Some(p) => Ok(self.psychologist_details(&p).await),
            None => Ok(None),
        }
    }

    async fn list_psychologists(&self) -> Result<Vec<PsychologistDetails>> {
        let all = self.psychologists.read().await.clone();
        let mut out = Vec::with_capacity(all.len());
        for p in &all {
            if let Some(d) = self.psychologist_details(p).await {
                out.push(d);
            }
        }
        Ok(out)
    }

    async fn create_session(&self, session: NewSession) -> Result<TherapySession, StoreError> {
        let now = Utc::now();
        let created = TherapySession {
            id: Uuid::new_v4(),
            patient_id: session.patient_id,
            psychologist_id: session.psychologist_id,
            session_date: session.session_date,
            duration_minutes: session.duration_minutes,
            session_type: session.session_type,
            status: SessionStatus::Scheduled,
            notes: session.notes,
            patient_feedback: None,
            therapist_rating: None,
            created_at: now,
            updated_at: now,
        };
        self.sessions.write().await.push(created.clone());
        Ok(created)
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<TherapySession>> {
        Ok(self.sessions.read().await.iter().find(|s| s.id == id).cloned())
    }

    async fn sessions_for(&self, user_id: Uuid, party: SessionParty) -> Result<Vec<TherapySession>> {
        let mut found: Vec<TherapySession> = self
            .sessions
            .read()
            .await
            .iter()
            .filter(|s| match party {
                SessionParty::Patient => s.patient_id == user_id,
                SessionParty::Psychologist => s.psychologist_id == user_id,
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| b.session_date.cmp(&a.session_date));
        Ok(found)
    }

    async fn update_session(&self, id: Uuid, update: SessionUpdate) -> Result<Option<TherapySession>, StoreError> {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        if let Some(v) = update.status {
            session.status = v;
        }
        if let Some(v) = update.session_date {
            session.session_date = v;
        }
        if update.notes.is_some() {
            session.notes = update.notes;
        }
        if update.patient_feedback.is_some() {
            session.patient_feedback = update.patient_feedback;
        }
        if update.therapist_rating.is_some() {
            session.therapist_rating = update.therapist_rating;
        }
        session.updated_at = Utc::now();
        Ok(Some(session.clone()))
    }

    async fn upsert_mood_log(&self, log: NewMoodLog) -> Result<MoodLog, StoreError> {
        let mut logs = self.mood_logs.write().await;
        if let Some(existing) = logs
            .iter_mut()
            .find(|l| l.patient_id == log.patient_id && l.log_date == log.log_date)
        {
            existing.mood_score = log.mood_score;
            existing.anxiety_level = log.anxiety_level;
            existing.sleep_hours = log.sleep_hours;
            existing.exercise_minutes = log.exercise_minutes;
            existing.social_interaction = log.social_interaction;
            existing.notes = log.notes;
            return Ok(existing.clone());
        }
        let created = MoodLog {
            id: Uuid::new_v4(),
            patient_id: log.patient_id,
            log_date: log.log_date,
            mood_score: log.mood_score,
            anxiety_level: log.anxiety_level,
            sleep_hours: log.sleep_hours,
            exercise_minutes: log.exercise_minutes,
            social_interaction: log.social_interaction,
            notes: log.notes,
            created_at: Utc::now(),
        };
        logs.push(created.clone());
        Ok(created)
    }

    async fn mood_logs(&self, patient_id: Uuid, limit: Option<i64>) -> Result<Vec<MoodLog>> {
        let mut found: Vec<MoodLog> = self
            .mood_logs
            .read()
            .await
            .iter()
            .filter(|l| l.patient_id == patient_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.log_date.cmp(&a.log_date));
        if let Some(limit) = limit {
            found.truncate(limit.max(0) as usize);
        }
        Ok(found)
    }

    async fn count_profiles_since(&self, since: DateTime<Utc>) -> Result<i64> {
        Ok(self.profiles.read().await.iter().filter(|p| p.created_at >= since).count() as i64)
    }

    async fn count_completed_sessions_since(&self, since: DateTime<Utc>) -> Result<i64> {
        Ok(self
            .sessions
            .read()
            .await
            .iter()
            .filter(|s| s.status == SessionStatus::Completed && s.updated_at >= since)
            .count() as i64)
    }
}

/// Counts every call so tests can assert a request never reached the store.
#[derive(Default)]
pub struct MemoryAnalyticsStore {
    touches: AtomicUsize,
    conversations: RwLock<Vec<ChatbotConversation>>,
    analyses: RwLock<Vec<SessionAnalysis>>,
    predictions: RwLock<Vec<MlPrediction>>,
    metrics: RwLock<Vec<SystemMetrics>>,
    activity: RwLock<Vec<ActivityLog>>,
}

impl MemoryAnalyticsStore {
    pub fn touches(&self) -> usize {
        self.touches.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.touches.fetch_add(1, Ordering::SeqCst);
    }
}

fn newest_first<T, F: Fn(&T) -> DateTime<Utc>>(items: &mut [T], key: F) {
    items.sort_by_key(|item| std::cmp::Reverse(key(item)));
}

#[async_trait]
impl AnalyticsStore for MemoryAnalyticsStore {
    async fn save_conversation(&self, conversation: &ChatbotConversation) -> Result<()> {
        self.touch();
        self.conversations.write().await.push(conversation.clone());
        Ok(())
    }

    async fn conversations_for(&self, user_id: &str, limit: i64) -> Result<Vec<ChatbotConversation>> {
        self.touch();
        let mut found: Vec<_> = self
            .conversations
            .read()
            .await
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut found, |c| c.timestamp);
        found.truncate(limit.max(0) as usize);
        Ok(found)
    }

    async fn chatbot_stats(&self, user_id: Option<&str>) -> Result<ChatbotStats> {
        self.touch();
        let conversations = self.conversations.read().await;
        let scoped: Vec<&ChatbotConversation> = conversations
            .iter()
            .filter(|c| user_id.map_or(true, |u| c.user_id == u))
            .collect();
        if scoped.is_empty() {
            return Ok(ChatbotStats::default());
        }
        let ratings: Vec<f64> = scoped.iter().filter_map(|c| c.satisfaction_rating).collect();
        Ok(ChatbotStats {
            total_conversations: scoped.len() as i64,
            avg_duration: Some(
                scoped.iter().map(|c| c.session_duration_minutes).sum::<f64>() / scoped.len() as f64,
            ),
            avg_satisfaction: if ratings.is_empty() {
                None
            } else {
                Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
            },
            total_messages: scoped.iter().map(|c| c.messages.len() as i64).sum(),
        })
    }

    async fn count_conversations_since(&self, since: DateTime<Utc>) -> Result<i64> {
        self.touch();
        Ok(self.conversations.read().await.iter().filter(|c| c.timestamp >= since).count() as i64)
    }

    async fn save_session_analysis(&self, analysis: &SessionAnalysis) -> Result<()> {
        self.touch();
        self.analyses.write().await.push(analysis.clone());
        Ok(())
    }

    async fn session_analyses(&self, patient_id: Uuid, limit: i64) -> Result<Vec<SessionAnalysis>> {
        self.touch();
        let mut found: Vec<_> = self
            .analyses
            .read()
            .await
            .iter()
            .filter(|a| a.patient_id == patient_id)
            .cloned()
            .collect();
        newest_first(&mut found, |a| a.session_date);
        found.truncate(limit.max(0) as usize);
        Ok(found)
    }

    async fn save_prediction(&self, prediction: &MlPrediction) -> Result<()> {
        self.touch();
        self.predictions.write().await.push(prediction.clone());
        Ok(())
    }

    async fn latest_prediction(&self, user_id: &str, kind: PredictionKind) -> Result<Option<MlPrediction>> {
        self.touch();
        Ok(self
            .predictions
            .read()
            .await
            .iter()
            .filter(|p| p.user_id == user_id && p.prediction_type == kind)
            .max_by_key(|p| p.prediction_date)
            .cloned())
    }

    async fn predictions_for(
        &self,
        user_id: &str,
        kind: Option<PredictionKind>,
        limit: i64,
    ) -> Result<Vec<MlPrediction>> {
        self.touch();
        let mut found: Vec<_> = self
            .predictions
            .read()
            .await
            .iter()
            .filter(|p| p.user_id == user_id && kind.map_or(true, |k| p.prediction_type == k))
            .cloned()
            .collect();
        newest_first(&mut found, |p| p.prediction_date);
        found.truncate(limit.max(0) as usize);
        Ok(found)
    }

    async fn save_metrics(&self, metrics: &SystemMetrics) -> Result<()> {
        self.touch();
        self.metrics.write().await.push(metrics.clone());
        Ok(())
    }

    async fn metrics_since(&self, since: DateTime<Utc>) -> Result<Vec<SystemMetrics>> {
        self.touch();
        let mut found: Vec<_> = self
            .metrics
            .read()
            .await
            .iter()
            .filter(|m| m.timestamp >= since)
            .cloned()
            .collect();
        newest_first(&mut found, |m| m.timestamp);
        Ok(found)
    }

    async fn latest_metrics(&self) -> Result<Option<SystemMetrics>> {
        self.touch();
        Ok(self.metrics.read().await.iter().max_by_key(|m| m.timestamp).cloned())
    }

    async fn save_activity(&self, log: &ActivityLog) -> Result<()> {
        self.touch();
        self.activity.write().await.push(log.clone());
        Ok(())
    }

    async fn activity_logs(&self, user_id: Option<&str>, limit: i64) -> Result<Vec<ActivityLog>> {
        self.touch();
        let mut found: Vec<_> = self
            .activity
            .read()
            .await
            .iter()
            .filter(|l| user_id.map_or(true, |u| l.user_id == u))
            .cloned()
            .collect();
        newest_first(&mut found, |l| l.timestamp);
        found.truncate(limit.max(0) as usize);
        Ok(found)
    }

    async fn activity_stats(&self, since: DateTime<Utc>) -> Result<Vec<ActivityStat>> {
        self.touch();
        let mut counts: HashMap<ActivityKey, i64> = HashMap::new();
        for log in self.activity.read().await.iter().filter(|l| l.timestamp >= since) {
            let key = ActivityKey {
                action: log.action.clone(),
                user_type: log.user_type.as_str().to_string(),
            };
            *counts.entry(key).or_insert(0) += 1;
        }
        let mut stats: Vec<ActivityStat> = counts
            .into_iter()
            .map(|(key, count)| ActivityStat { key, count })
            .collect();
        stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
        Ok(stats)
    }

    async fn distinct_active_users_since(&self, since: DateTime<Utc>) -> Result<i64> {
        self.touch();
        let activity = self.activity.read().await;
        let mut users: Vec<&str> = activity
            .iter()
            .filter(|l| l.timestamp >= since)
            .map(|l| l.user_id.as_str())
            .collect();
        users.sort_unstable();
        users.dedup();
        Ok(users.len() as i64)
    }
}

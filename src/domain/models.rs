use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Patient,
    Psychologist,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Patient => "patient",
            UserRole::Psychologist => "psychologist",
            UserRole::Admin => "admin",
        }
    }
}

impl TryFrom<&str> for UserRole {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "patient" => Ok(UserRole::Patient),
            "psychologist" => Ok(UserRole::Psychologist),
            "admin" => Ok(UserRole::Admin),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl TryFrom<&str> for RiskLevel {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PatientStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl PatientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatientStatus::Active => "active",
            PatientStatus::Inactive => "inactive",
            PatientStatus::Suspended => "suspended",
        }
    }
}

impl TryFrom<&str> for PatientStatus {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "active" => Ok(PatientStatus::Active),
            "inactive" => Ok(PatientStatus::Inactive),
            "suspended" => Ok(PatientStatus::Suspended),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Individual,
    Group,
    Emergency,
    FollowUp,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Individual => "individual",
            SessionType::Group => "group",
            SessionType::Emergency => "emergency",
            SessionType::FollowUp => "follow_up",
        }
    }
}

impl TryFrom<&str> for SessionType {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "individual" => Ok(SessionType::Individual),
            "group" => Ok(SessionType::Group),
            "emergency" => Ok(SessionType::Emergency),
            "follow_up" => Ok(SessionType::FollowUp),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::NoShow => "no_show",
        }
    }
}

impl TryFrom<&str> for SessionStatus {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "scheduled" => Ok(SessionStatus::Scheduled),
            "completed" => Ok(SessionStatus::Completed),
            "cancelled" => Ok(SessionStatus::Cancelled),
            "no_show" => Ok(SessionStatus::NoShow),
            _ => Err(()),
        }
    }
}

/// Which side of a therapy session a lookup is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionParty {
    Patient,
    Psychologist,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PredictionKind {
    RiskLevel,
    MoodForecast,
    InterventionRecommendation,
}

impl PredictionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionKind::RiskLevel => "risk_level",
            PredictionKind::MoodForecast => "mood_forecast",
            PredictionKind::InterventionRecommendation => "intervention_recommendation",
        }
    }
}

impl TryFrom<&str> for PredictionKind {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "risk_level" => Ok(PredictionKind::RiskLevel),
            "mood_forecast" => Ok(PredictionKind::MoodForecast),
            "intervention_recommendation" => Ok(PredictionKind::InterventionRecommendation),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

// ============================================
// Relational records
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub hashed_password: Option<String>,
    pub user_type: UserRole,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub emergency_contact: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile as handed to callers once the credential hash has been stripped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicProfile {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub user_type: UserRole,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub emergency_contact: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserProfile> for PublicProfile {
    fn from(p: UserProfile) -> Self {
        Self {
            id: p.id,
            first_name: p.first_name,
            last_name: p.last_name,
            email: p.email,
            user_type: p.user_type,
            phone: p.phone,
            date_of_birth: p.date_of_birth,
            gender: p.gender,
            emergency_contact: p.emergency_contact,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub hashed_password: String,
    pub user_type: UserRole,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub emergency_contact: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub assigned_psychologist: Option<Uuid>,
    pub risk_level: RiskLevel,
    pub status: PatientStatus,
    pub medical_history: Option<serde_json::Value>,
    pub current_medications: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientDetails {
    #[serde(flatten)]
    pub patient: Patient,
    pub profile: PublicProfile,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPatient {
    pub id: Uuid,
    pub assigned_psychologist: Option<Uuid>,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub status: PatientStatus,
    pub medical_history: Option<serde_json::Value>,
    pub current_medications: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientUpdate {
    pub assigned_psychologist: Option<Uuid>,
    pub risk_level: Option<RiskLevel>,
    pub status: Option<PatientStatus>,
    pub medical_history: Option<serde_json::Value>,
    pub current_medications: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Psychologist {
    pub id: Uuid,
    pub license_number: String,
    pub specializations: Vec<String>,
    pub years_experience: Option<i32>,
    pub consultation_fee: Option<f64>,
    pub bio: Option<String>,
    pub rating: f64,
    pub total_patients: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PsychologistDetails {
    #[serde(flatten)]
    pub psychologist: Psychologist,
    pub profile: PublicProfile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPsychologist {
    pub id: Uuid,
    pub license_number: String,
    #[serde(default)]
    pub specializations: Vec<String>,
    pub years_experience: Option<i32>,
    pub consultation_fee: Option<f64>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TherapySession {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub psychologist_id: Uuid,
    pub session_date: DateTime<Utc>,
    pub duration_minutes: i32,
    pub session_type: SessionType,
    pub status: SessionStatus,
    pub notes: Option<String>,
    pub patient_feedback: Option<i32>,
    pub therapist_rating: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSession {
    pub patient_id: Uuid,
    pub psychologist_id: Uuid,
    pub session_date: DateTime<Utc>,
    pub duration_minutes: i32,
    pub session_type: SessionType,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionUpdate {
    pub status: Option<SessionStatus>,
    pub session_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub patient_feedback: Option<i32>,
    pub therapist_rating: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoodLog {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub log_date: NaiveDate,
    pub mood_score: i32,
    pub anxiety_level: Option<i32>,
    pub sleep_hours: Option<f64>,
    pub exercise_minutes: i32,
    pub social_interaction: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMoodLog {
    pub patient_id: Uuid,
    pub log_date: NaiveDate,
    pub mood_score: i32,
    pub anxiety_level: Option<i32>,
    pub sleep_hours: Option<f64>,
    #[serde(default)]
    pub exercise_minutes: i32,
    #[serde(default)]
    pub social_interaction: bool,
    pub notes: Option<String>,
}

// ============================================
// Document records
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatbotConversation {
    pub id: Uuid,
    pub user_id: String,
    pub user_type: UserRole,
    pub timestamp: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
    pub session_duration_minutes: f64,
    pub satisfaction_rating: Option<f64>,
}

/// Result of the single grouping pass over stored conversations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatbotStats {
    pub total_conversations: i64,
    pub avg_duration: Option<f64>,
    pub avg_satisfaction: Option<f64>,
    pub total_messages: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionAnalysis {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub psychologist_id: Uuid,
    pub session_id: Uuid,
    pub session_date: DateTime<Utc>,
    pub analysis: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MlPrediction {
    pub id: Uuid,
    pub user_id: String,
    pub prediction_date: DateTime<Utc>,
    pub prediction_type: PredictionKind,
    pub input_features: serde_json::Value,
    pub prediction_result: serde_json::Value,
    pub confidence_score: f64,
    pub model_version: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemMetrics {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub active_users: i64,
    #[serde(default)]
    pub new_registrations: i64,
    #[serde(default)]
    pub completed_sessions: i64,
    #[serde(default)]
    pub chatbot_interactions: i64,
    #[serde(default)]
    pub system_uptime: f64,
    #[serde(default)]
    pub response_time_ms: f64,
    #[serde(default)]
    pub error_rate: f64,
    #[serde(default)]
    pub database_connections: i64,
    pub memory_usage_percent: Option<f64>,
    pub cpu_usage_percent: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLog {
    pub id: Uuid,
    pub user_id: String,
    pub user_type: UserRole,
    pub action: String,
    pub details: serde_json::Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActivityKey {
    pub action: String,
    pub user_type: String,
}

/// One (action, user type) bucket of the activity aggregation, serialized as
/// `{ "_id": { "action", "user_type" }, "count" }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityStat {
    #[serde(rename = "_id")]
    pub key: ActivityKey,
    pub count: i64,
}

use crate::db::{AnalyticsStore, ProfileStore};
use crate::domain::models::{
    ActivityLog, ActivityStat, ChatbotStats, MlPrediction, PatientStatus, PredictionKind,
    RiskLevel, SessionAnalysis, SessionParty, SessionStatus, SystemMetrics, TherapySession,
    UserRole,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

pub const DEFAULT_UPTIME: f64 = 99.5;
pub const DEFAULT_RESPONSE_TIME_MS: f64 = 1200.0;
pub const DEFAULT_ERROR_RATE: f64 = 0.5;

const TOP_ACTIONS: usize = 10;
const RISK_HISTORY: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Overview,
    Chatbot,
    Activity,
    Patient,
    Psychologist,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Overview => "overview",
            ReportKind::Chatbot => "chatbot",
            ReportKind::Activity => "activity",
            ReportKind::Patient => "patient",
            ReportKind::Psychologist => "psychologist",
        }
    }
}

impl FromStr for ReportKind {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overview" => Ok(ReportKind::Overview),
            "chatbot" => Ok(ReportKind::Chatbot),
            "activity" => Ok(ReportKind::Activity),
            "patient" => Ok(ReportKind::Patient),
            "psychologist" => Ok(ReportKind::Psychologist),
            _ => Err(ReportError::InvalidType),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("invalid analytics type")]
    InvalidType,
    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

// ============================================
// Overview
// ============================================

/// Values of the newest snapshot in the window.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SystemHealth {
    pub uptime: f64,
    pub response_time: f64,
    pub error_rate: f64,
    pub active_users: i64,
}

/// Counters summed over every snapshot in the window.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct UsageTotals {
    pub total_sessions: i64,
    pub chatbot_interactions: i64,
    pub new_registrations: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendPoint {
    pub date: DateTime<Utc>,
    pub active_users: i64,
    pub sessions: i64,
    pub interactions: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverviewReport {
    pub system_health: SystemHealth,
    pub usage_stats: UsageTotals,
    pub trends: Vec<TrendPoint>,
}

fn or_default(value: f64, fallback: f64) -> f64 {
    if value > 0.0 {
        value
    } else {
        fallback
    }
}

/// `series` is newest first.
pub fn overview_from(series: &[SystemMetrics]) -> OverviewReport {
    let system_health = match series.first() {
        Some(latest) => SystemHealth {
            uptime: or_default(latest.system_uptime, DEFAULT_UPTIME),
            response_time: or_default(latest.response_time_ms, DEFAULT_RESPONSE_TIME_MS),
            error_rate: or_default(latest.error_rate, DEFAULT_ERROR_RATE),
            active_users: latest.active_users,
        },
        None => SystemHealth {
            uptime: DEFAULT_UPTIME,
            response_time: DEFAULT_RESPONSE_TIME_MS,
            error_rate: DEFAULT_ERROR_RATE,
            active_users: 0,
        },
    };

    let usage_stats = series.iter().fold(UsageTotals::default(), |mut acc, m| {
        acc.total_sessions += m.completed_sessions;
        acc.chatbot_interactions += m.chatbot_interactions;
        acc.new_registrations += m.new_registrations;
        acc
    });

    let trends = series
        .iter()
        .map(|m| TrendPoint {
            date: m.timestamp,
            active_users: m.active_users,
            sessions: m.completed_sessions,
            interactions: m.chatbot_interactions,
        })
        .collect();

    OverviewReport {
        system_health,
        usage_stats,
        trends,
    }
}

// ============================================
// Chatbot
// ============================================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UsagePatterns {
    pub avg_session_duration: f64,
    pub total_conversations: i64,
    pub messages_per_session: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatbotReport {
    pub chatbot_performance: ChatbotStats,
    pub user_satisfaction: f64,
    pub usage_patterns: UsagePatterns,
}

pub fn chatbot_from(stats: ChatbotStats) -> ChatbotReport {
    let usage_patterns = UsagePatterns {
        avg_session_duration: stats.avg_duration.unwrap_or(0.0),
        total_conversations: stats.total_conversations,
        messages_per_session: stats.total_messages as f64
            / stats.total_conversations.max(1) as f64,
    };
    ChatbotReport {
        user_satisfaction: stats.avg_satisfaction.unwrap_or(0.0),
        chatbot_performance: stats,
        usage_patterns,
    }
}

// ============================================
// Activity
// ============================================

#[derive(Debug, Clone, Serialize)]
pub struct ActivityReport {
    pub user_activity: Vec<ActivityStat>,
    pub most_common_actions: Vec<ActivityStat>,
    pub activity_by_user_type: BTreeMap<String, i64>,
}

/// `stats` arrives sorted by count, highest first.
pub fn activity_from(stats: Vec<ActivityStat>) -> ActivityReport {
    let mut by_type = BTreeMap::new();
    for stat in &stats {
        *by_type.entry(stat.key.user_type.clone()).or_insert(0) += stat.count;
    }
    ActivityReport {
        most_common_actions: stats.iter().take(TOP_ACTIONS).cloned().collect(),
        user_activity: stats,
        activity_by_user_type: by_type,
    }
}

// ============================================
// Patient
// ============================================

#[derive(Debug, Clone, Serialize)]
pub struct MoodPoint {
    pub date: NaiveDate,
    pub mood_score: i32,
    pub anxiety_level: Option<i32>,
    pub sleep_hours: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionOutcome {
    pub session_id: Uuid,
    pub session_date: DateTime<Utc>,
    pub patient_feedback: Option<i32>,
    pub therapist_rating: Option<i32>,
}

impl From<&TherapySession> for SessionOutcome {
    fn from(s: &TherapySession) -> Self {
        Self {
            session_id: s.id,
            session_date: s.session_date,
            patient_feedback: s.patient_feedback,
            therapist_rating: s.therapist_rating,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientProgress {
    pub mood_trends: Vec<MoodPoint>,
    pub session_effectiveness: Vec<SessionOutcome>,
    pub chatbot_usage: ChatbotStats,
    pub risk_predictions: Vec<MlPrediction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientReport {
    pub patient_progress: PatientProgress,
}

fn completed_in_window(sessions: &[TherapySession], since: DateTime<Utc>) -> Vec<SessionOutcome> {
    sessions
        .iter()
        .filter(|s| s.status == SessionStatus::Completed && s.session_date >= since)
        .map(SessionOutcome::from)
        .collect()
}

async fn patient_report(
    user_id: &str,
    since: DateTime<Utc>,
    profiles: &dyn ProfileStore,
    analytics: &dyn AnalyticsStore,
) -> Result<PatientReport, ReportError> {
    // document records key users by string; relational feeds only exist for uuid ids
    let (mood_trends, session_effectiveness) = match Uuid::parse_str(user_id) {
        Ok(patient_id) => {
            let mut logs = profiles.mood_logs(patient_id, None).await?;
            logs.retain(|l| l.log_date >= since.date_naive());
            logs.sort_by_key(|l| l.log_date);
            let moods = logs
                .into_iter()
                .map(|l| MoodPoint {
                    date: l.log_date,
                    mood_score: l.mood_score,
                    anxiety_level: l.anxiety_level,
                    sleep_hours: l.sleep_hours,
                })
                .collect();
            let sessions = profiles.sessions_for(patient_id, SessionParty::Patient).await?;
            (moods, completed_in_window(&sessions, since))
        }
        Err(_) => (Vec::new(), Vec::new()),
    };

    let mut risk_predictions = analytics
        .predictions_for(user_id, Some(PredictionKind::RiskLevel), RISK_HISTORY)
        .await?;
    risk_predictions.retain(|p| p.prediction_date >= since);

    Ok(PatientReport {
        patient_progress: PatientProgress {
            mood_trends,
            session_effectiveness,
            chatbot_usage: analytics.chatbot_stats(Some(user_id)).await?,
            risk_predictions,
        },
    })
}

// ============================================
// Psychologist
// ============================================

#[derive(Debug, Clone, Serialize)]
pub struct PatientOutcome {
    pub patient_id: Uuid,
    pub name: String,
    pub risk_level: RiskLevel,
    pub status: PatientStatus,
    pub average_mood: Option<f64>,
    pub mood_entries: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusCount {
    pub status: SessionStatus,
    pub sessions: usize,
    pub minutes: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WorkloadAnalysis {
    pub assigned_patients: usize,
    pub active_patients: usize,
    pub by_status: Vec<StatusCount>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EffectivenessMetrics {
    pub completion_rate: f64,
    pub no_show_rate: f64,
    pub average_patient_feedback: Option<f64>,
    pub average_therapist_rating: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PsychologistPerformance {
    pub patient_outcomes: Vec<PatientOutcome>,
    pub session_ratings: Vec<SessionOutcome>,
    pub workload_analysis: WorkloadAnalysis,
    pub effectiveness_metrics: EffectivenessMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct PsychologistReport {
    pub psychologist_performance: PsychologistPerformance,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

pub fn workload_from(sessions: &[TherapySession], assigned: usize, active: usize) -> WorkloadAnalysis {
    let mut by_status: BTreeMap<SessionStatus, (usize, i64)> = BTreeMap::new();
    for s in sessions {
        let entry = by_status.entry(s.status).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += i64::from(s.duration_minutes);
    }
    WorkloadAnalysis {
        assigned_patients: assigned,
        active_patients: active,
        by_status: by_status
            .into_iter()
            .map(|(status, (sessions, minutes))| StatusCount {
                status,
                sessions,
                minutes,
            })
            .collect(),
    }
}

pub fn effectiveness_from(sessions: &[TherapySession]) -> EffectivenessMetrics {
    let total = sessions.len().max(1) as f64;
    let count = |status: SessionStatus| sessions.iter().filter(|s| s.status == status).count() as f64;
    let completed: Vec<&TherapySession> = sessions
        .iter()
        .filter(|s| s.status == SessionStatus::Completed)
        .collect();
    EffectivenessMetrics {
        completion_rate: count(SessionStatus::Completed) / total,
        no_show_rate: count(SessionStatus::NoShow) / total,
        average_patient_feedback: mean(completed.iter().filter_map(|s| s.patient_feedback).map(f64::from)),
        average_therapist_rating: mean(completed.iter().filter_map(|s| s.therapist_rating).map(f64::from)),
    }
}

async fn psychologist_report(
    user_id: &str,
    since: DateTime<Utc>,
    profiles: &dyn ProfileStore,
) -> Result<PsychologistReport, ReportError> {
    let Ok(psychologist_id) = Uuid::parse_str(user_id) else {
        return Ok(PsychologistReport {
            psychologist_performance: PsychologistPerformance {
                patient_outcomes: Vec::new(),
                session_ratings: Vec::new(),
                workload_analysis: workload_from(&[], 0, 0),
                effectiveness_metrics: effectiveness_from(&[]),
            },
        });
    };

    let patients = profiles.patients_of(psychologist_id).await?;
    let mut patient_outcomes = Vec::with_capacity(patients.len());
    for details in &patients {
        let logs = profiles.mood_logs(details.patient.id, None).await?;
        let in_window: Vec<f64> = logs
            .iter()
            .filter(|l| l.log_date >= since.date_naive())
            .map(|l| f64::from(l.mood_score))
            .collect();
        patient_outcomes.push(PatientOutcome {
            patient_id: details.patient.id,
            name: format!("{} {}", details.profile.first_name, details.profile.last_name),
            risk_level: details.patient.risk_level,
            status: details.patient.status,
            average_mood: mean(in_window.iter().copied()),
            mood_entries: in_window.len(),
        });
    }

    let mut sessions = profiles
        .sessions_for(psychologist_id, SessionParty::Psychologist)
        .await?;
    sessions.retain(|s| s.session_date >= since);

    let active = patients
        .iter()
        .filter(|p| p.patient.status == PatientStatus::Active)
        .count();

    Ok(PsychologistReport {
        psychologist_performance: PsychologistPerformance {
            patient_outcomes,
            session_ratings: completed_in_window(&sessions, since),
            workload_analysis: workload_from(&sessions, patients.len(), active),
            effectiveness_metrics: effectiveness_from(&sessions),
        },
    })
}

// ============================================
// Entry point
// ============================================

/// Start of a `days`-long window ending at `now`; saturates at the earliest
/// representable instant.
pub fn window_start(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    Duration::try_days(days)
        .and_then(|d| now.checked_sub_signed(d))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Report {
    Overview(OverviewReport),
    Chatbot(ChatbotReport),
    Activity(ActivityReport),
    Patient(PatientReport),
    Psychologist(PsychologistReport),
}

pub async fn build_report(
    kind: ReportKind,
    days: i64,
    user_id: Option<&str>,
    profiles: &dyn ProfileStore,
    analytics: &dyn AnalyticsStore,
) -> Result<Report, ReportError> {
    let since = window_start(Utc::now(), days);
    let report = match kind {
        ReportKind::Overview => Report::Overview(overview_from(&analytics.metrics_since(since).await?)),
        ReportKind::Chatbot => Report::Chatbot(chatbot_from(analytics.chatbot_stats(user_id).await?)),
        ReportKind::Activity => Report::Activity(activity_from(analytics.activity_stats(since).await?)),
        ReportKind::Patient => {
            let user_id = user_id.ok_or(ReportError::MissingParameter("user_id"))?;
            Report::Patient(patient_report(user_id, since, profiles, analytics).await?)
        }
        ReportKind::Psychologist => {
            let user_id = user_id.ok_or(ReportError::MissingParameter("user_id"))?;
            Report::Psychologist(psychologist_report(user_id, since, profiles).await?)
        }
    };
    Ok(report)
}

// ============================================
// Per-user report
// ============================================

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum UserReportDetails {
    Patient {
        chatbot_stats: ChatbotStats,
        recent_sessions: Vec<SessionAnalysis>,
        recent_predictions: Vec<MlPrediction>,
    },
    Psychologist {
        recent_activity: Vec<ActivityLog>,
    },
    Admin {
        system_metrics: Vec<SystemMetrics>,
        activity_stats: Vec<ActivityStat>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct UserReport {
    pub user_id: String,
    pub user_type: UserRole,
    pub generated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub details: UserReportDetails,
}

pub async fn user_report(
    user_id: &str,
    user_type: UserRole,
    analytics: &dyn AnalyticsStore,
) -> Result<UserReport, ReportError> {
    let details = match user_type {
        UserRole::Patient => {
            let recent_sessions = match Uuid::parse_str(user_id) {
                Ok(id) => analytics.session_analyses(id, 5).await?,
                Err(_) => Vec::new(),
            };
            UserReportDetails::Patient {
                chatbot_stats: analytics.chatbot_stats(Some(user_id)).await?,
                recent_sessions,
                recent_predictions: analytics.predictions_for(user_id, None, 5).await?,
            }
        }
        UserRole::Psychologist => UserReportDetails::Psychologist {
            recent_activity: analytics.activity_logs(Some(user_id), 100).await?,
        },
        UserRole::Admin => {
            let since = Utc::now() - Duration::days(30);
            UserReportDetails::Admin {
                system_metrics: analytics.metrics_since(since).await?,
                activity_stats: analytics.activity_stats(since).await?,
            }
        }
    };
    Ok(UserReport {
        user_id: user_id.to_string(),
        user_type,
        generated_at: Utc::now(),
        details,
    })
}

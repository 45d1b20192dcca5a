//! Document store for chat logs, predictions, metrics snapshots and activity.
//!
//! Records keep their free-form parts (messages, feature maps, results,
//! details) as JSONB. The connection is opened on first use and shared for
//! the life of the process; `shutdown` closes it.

use crate::domain::models::{
    ActivityKey, ActivityLog, ActivityStat, ChatMessage, ChatbotConversation, ChatbotStats, MlPrediction,
    PredictionKind, SessionAnalysis, SystemMetrics, UserRole,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tokio::sync::OnceCell;
use uuid::Uuid;

#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    async fn save_conversation(&self, conversation: &ChatbotConversation) -> Result<()>;
    async fn conversations_for(&self, user_id: &str, limit: i64) -> Result<Vec<ChatbotConversation>>;
    /// Count, average duration, average satisfaction and message total in one pass.
    async fn chatbot_stats(&self, user_id: Option<&str>) -> Result<ChatbotStats>;
    async fn count_conversations_since(&self, since: DateTime<Utc>) -> Result<i64>;

    async fn save_session_analysis(&self, analysis: &SessionAnalysis) -> Result<()>;
    async fn session_analyses(&self, patient_id: Uuid, limit: i64) -> Result<Vec<SessionAnalysis>>;

    async fn save_prediction(&self, prediction: &MlPrediction) -> Result<()>;
    async fn latest_prediction(&self, user_id: &str, kind: PredictionKind) -> Result<Option<MlPrediction>>;
    async fn predictions_for(
        &self,
        user_id: &str,
        kind: Option<PredictionKind>,
        limit: i64,
    ) -> Result<Vec<MlPrediction>>;

    async fn save_metrics(&self, metrics: &SystemMetrics) -> Result<()>;
    /// Snapshots taken at or after `since`, newest first.
    async fn metrics_since(&self, since: DateTime<Utc>) -> Result<Vec<SystemMetrics>>;
    async fn latest_metrics(&self) -> Result<Option<SystemMetrics>>;

    async fn save_activity(&self, log: &ActivityLog) -> Result<()>;
    async fn activity_logs(&self, user_id: Option<&str>, limit: i64) -> Result<Vec<ActivityLog>>;
    /// Counts grouped by (action, user type), largest first.
    async fn activity_stats(&self, since: DateTime<Utc>) -> Result<Vec<ActivityStat>>;
    async fn distinct_active_users_since(&self, since: DateTime<Utc>) -> Result<i64>;

    async fn shutdown(&self) {}
}

pub struct PgDocumentStore {
    url: String,
    pool: OnceCell<PgPool>,
}

impl PgDocumentStore {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool: OnceCell::new(),
        }
    }

    async fn pool(&self) -> Result<&PgPool> {
        self.pool
            .get_or_try_init(|| async {
                tracing::info!("Connecting to document store...");
                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect(&self.url)
                    .await
                    .context("document store connection failed")?;
                let mut migrator = sqlx::migrate!("./migrations/analytics");
                migrator.set_ignore_missing(true);
                migrator
                    .run(&pool)
                    .await
                    .context("document store migrations failed")?;
                tracing::info!("Document store ready");
                Ok::<_, anyhow::Error>(pool)
            })
            .await
    }
}

fn role_from_row(row: &PgRow) -> Result<UserRole> {
    let raw: String = row.try_get("user_type")?;
    UserRole::try_from(raw.as_str()).map_err(|_| anyhow!("unknown user type '{raw}' in store"))
}

fn conversation_from_row(row: &PgRow) -> Result<ChatbotConversation> {
    let messages: Json<Vec<ChatMessage>> = row.try_get("messages")?;
    Ok(ChatbotConversation {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        user_type: role_from_row(row)?,
        timestamp: row.try_get("timestamp")?,
        messages: messages.0,
        session_duration_minutes: row.try_get("session_duration_minutes")?,
        satisfaction_rating: row.try_get("satisfaction_rating")?,
    })
}

fn analysis_from_row(row: &PgRow) -> Result<SessionAnalysis> {
    Ok(SessionAnalysis {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        psychologist_id: row.try_get("psychologist_id")?,
        session_id: row.try_get("session_id")?,
        session_date: row.try_get("session_date")?,
        analysis: row.try_get("analysis")?,
        created_at: row.try_get("created_at")?,
    })
}

fn prediction_from_row(row: &PgRow) -> Result<MlPrediction> {
    let kind: String = row.try_get("prediction_type")?;
    Ok(MlPrediction {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        prediction_date: row.try_get("prediction_date")?,
        prediction_type: PredictionKind::try_from(kind.as_str())
            .map_err(|_| anyhow!("unknown prediction type '{kind}' in store"))?,
        input_features: row.try_get("input_features")?,
        prediction_result: row.try_get("prediction_result")?,
        confidence_score: row.try_get("confidence_score")?,
        model_version: row.try_get("model_version")?,
        created_at: row.try_get("created_at")?,
    })
}

fn metrics_from_row(row: &PgRow) -> Result<SystemMetrics> {
    Ok(SystemMetrics {
        id: row.try_get("id")?,
        timestamp: row.try_get("timestamp")?,
        active_users: row.try_get("active_users")?,
        new_registrations: row.try_get("new_registrations")?,
        completed_sessions: row.try_get("completed_sessions")?,
        chatbot_interactions: row.try_get("chatbot_interactions")?,
        system_uptime: row.try_get("system_uptime")?,
        response_time_ms: row.try_get("response_time_ms")?,
        error_rate: row.try_get("error_rate")?,
        database_connections: row.try_get("database_connections")?,
        memory_usage_percent: row.try_get("memory_usage_percent")?,
        cpu_usage_percent: row.try_get("cpu_usage_percent")?,
    })
}

fn activity_from_row(row: &PgRow) -> Result<ActivityLog> {
    Ok(ActivityLog {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        user_type: role_from_row(row)?,
        action: row.try_get("action")?,
        details: row.try_get("details")?,
        ip_address: row.try_get("ip_address")?,
        user_agent: row.try_get("user_agent")?,
        timestamp: row.try_get("timestamp")?,
    })
}

#[async_trait]
impl AnalyticsStore for PgDocumentStore {
    async fn save_conversation(&self, conversation: &ChatbotConversation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chatbot_conversations
                (id, user_id, user_type, timestamp, messages, session_duration_minutes, satisfaction_rating)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(conversation.id)
        .bind(&conversation.user_id)
        .bind(conversation.user_type.as_str())
        .bind(conversation.timestamp)
        .bind(Json(&conversation.messages))
        .bind(conversation.session_duration_minutes)
        .bind(conversation.satisfaction_rating)
        .execute(self.pool().await?)
        .await?;
        Ok(())
    }

    async fn conversations_for(&self, user_id: &str, limit: i64) -> Result<Vec<ChatbotConversation>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, user_type, timestamp, messages, session_duration_minutes, satisfaction_rating
            FROM chatbot_conversations
            WHERE user_id = $1
            ORDER BY timestamp DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool().await?)
        .await?;
        rows.iter().map(conversation_from_row).collect()
    }

    async fn chatbot_stats(&self, user_id: Option<&str>) -> Result<ChatbotStats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total_conversations,
                   AVG(session_duration_minutes) AS avg_duration,
                   AVG(satisfaction_rating) AS avg_satisfaction,
                   COALESCE(SUM(jsonb_array_length(messages)), 0)::BIGINT AS total_messages
            FROM chatbot_conversations
            WHERE $1::TEXT IS NULL OR user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(self.pool().await?)
        .await?;
        Ok(ChatbotStats {
            total_conversations: row.try_get("total_conversations")?,
            avg_duration: row.try_get("avg_duration")?,
            avg_satisfaction: row.try_get("avg_satisfaction")?,
            total_messages: row.try_get("total_messages")?,
        })
    }

    async fn count_conversations_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chatbot_conversations WHERE timestamp >= $1")
                .bind(since)
                .fetch_one(self.pool().await?)
                .await?;
        Ok(count)
    }

    async fn save_session_analysis(&self, analysis: &SessionAnalysis) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO session_analysis
                (id, patient_id, psychologist_id, session_id, session_date, analysis, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(analysis.id)
        .bind(analysis.patient_id)
        .bind(analysis.psychologist_id)
        .bind(analysis.session_id)
        .bind(analysis.session_date)
        .bind(&analysis.analysis)
        .bind(analysis.created_at)
        .execute(self.pool().await?)
        .await?;
        Ok(())
    }

    async fn session_analyses(&self, patient_id: Uuid, limit: i64) -> Result<Vec<SessionAnalysis>> {
        let rows = sqlx::query(
            r#"
            SELECT id, patient_id, psychologist_id, session_id, session_date, analysis, created_at
            FROM session_analysis
            WHERE patient_id = $1
            ORDER BY session_date DESC
            LIMIT $2
            "#,
        )
        .bind(patient_id)
        .bind(limit)
        .fetch_all(self.pool().await?)
        .await?;
        rows.iter().map(analysis_from_row).collect()
    }

    async fn save_prediction(&self, prediction: &MlPrediction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ml_predictions
                (id, user_id, prediction_date, prediction_type, input_features, prediction_result,
                 confidence_score, model_version, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(prediction.id)
        .bind(&prediction.user_id)
        .bind(prediction.prediction_date)
        .bind(prediction.prediction_type.as_str())
        .bind(&prediction.input_features)
        .bind(&prediction.prediction_result)
        .bind(prediction.confidence_score)
        .bind(&prediction.model_version)
        .bind(prediction.created_at)
        .execute(self.pool().await?)
        .await?;
        Ok(())
    }

    async fn latest_prediction(&self, user_id: &str, kind: PredictionKind) -> Result<Option<MlPrediction>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, prediction_date, prediction_type, input_features, prediction_result,
                   confidence_score, model_version, created_at
            FROM ml_predictions
            WHERE user_id = $1 AND prediction_type = $2
            ORDER BY prediction_date DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(kind.as_str())
        .fetch_optional(self.pool().await?)
        .await?;
        row.as_ref().map(prediction_from_row).transpose()
    }

    async fn predictions_for(
        &self,
        user_id: &str,
        kind: Option<PredictionKind>,
        limit: i64,
    ) -> Result<Vec<MlPrediction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, prediction_date, prediction_type, input_features, prediction_result,
                   confidence_score, model_version, created_at
            FROM ml_predictions
            WHERE user_id = $1 AND ($2::TEXT IS NULL OR prediction_type = $2)
            ORDER BY prediction_date DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(kind.map(|k| k.as_str()))
        .bind(limit)
        .fetch_all(self.pool().await?)
        .await?;
        rows.iter().map(prediction_from_row).collect()
    }

    async fn save_metrics(&self, metrics: &SystemMetrics) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO system_metrics
                (id, timestamp, active_users, new_registrations, completed_sessions,
                 chatbot_interactions, system_uptime, response_time_ms, error_rate,
                 database_connections, memory_usage_percent, cpu_usage_percent)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(metrics.id)
        .bind(metrics.timestamp)
        .bind(metrics.active_users)
        .bind(metrics.new_registrations)
        .bind(metrics.completed_sessions)
        .bind(metrics.chatbot_interactions)
        .bind(metrics.system_uptime)
        .bind(metrics.response_time_ms)
        .bind(metrics.error_rate)
        .bind(metrics.database_connections)
        .bind(metrics.memory_usage_percent)
        .bind(metrics.cpu_usage_percent)
        .execute(self.pool().await?)
        .await?;
        Ok(())
    }

    async fn metrics_since(&self, since: DateTime<Utc>) -> Result<Vec<SystemMetrics>> {
        let rows = sqlx::query(
            r#"
            SELECT id, timestamp, active_users, new_registrations, completed_sessions,
                   chatbot_interactions, system_uptime, response_time_ms, error_rate,
                   database_connections, memory_usage_percent, cpu_usage_percent
            FROM system_metrics
            WHERE timestamp >= $1
            ORDER BY timestamp DESC
            "#,
        )
        .bind(since)
        .fetch_all(self.pool().await?)
        .await?;
        rows.iter().map(metrics_from_row).collect()
    }

    async fn latest_metrics(&self) -> Result<Option<SystemMetrics>> {
        let row = sqlx::query(
            r#"
            SELECT id, timestamp, active_users, new_registrations, completed_sessions,
                   chatbot_interactions, system_uptime, response_time_ms, error_rate,
                   database_connections, memory_usage_percent, cpu_usage_percent
            FROM system_metrics
            ORDER BY timestamp DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(self.pool().await?)
        .await?;
        row.as_ref().map(metrics_from_row).transpose()
    }

    async fn save_activity(&self, log: &ActivityLog) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO activity_logs
                (id, user_id, user_type, action, details, ip_address, user_agent, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(log.id)
        .bind(&log.user_id)
        .bind(log.user_type.as_str())
        .bind(&log.action)
        .bind(&log.details)
        .bind(&log.ip_address)
        .bind(&log.user_agent)
        .bind(log.timestamp)
        .execute(self.pool().await?)
        .await?;
        Ok(())
    }

    async fn activity_logs(&self, user_id: Option<&str>, limit: i64) -> Result<Vec<ActivityLog>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, user_type, action, details, ip_address, user_agent, timestamp
            FROM activity_logs
            WHERE $1::TEXT IS NULL OR user_id = $1
            ORDER BY timestamp DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool().await?)
        .await?;
        rows.iter().map(activity_from_row).collect()
    }

    async fn activity_stats(&self, since: DateTime<Utc>) -> Result<Vec<ActivityStat>> {
        let rows = sqlx::query(
            r#"
            SELECT action, user_type, COUNT(*) AS count
            FROM activity_logs
            WHERE timestamp >= $1
            GROUP BY action, user_type
            ORDER BY count DESC, action, user_type
            "#,
        )
        .bind(since)
        .fetch_all(self.pool().await?)
        .await?;
        rows.iter()
            .map(|row| -> Result<ActivityStat> {
                Ok(ActivityStat {
                    key: ActivityKey {
                        action: row.try_get("action")?,
                        user_type: row.try_get("user_type")?,
                    },
                    count: row.try_get("count")?,
                })
            })
            .collect()
    }

    async fn distinct_active_users_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(DISTINCT user_id) FROM activity_logs WHERE timestamp >= $1")
                .bind(since)
                .fetch_one(self.pool().await?)
                .await?;
        Ok(count)
    }

    async fn shutdown(&self) {
        if let Some(pool) = self.pool.get() {
            tracing::info!("Closing document store connections");
            pool.close().await;
        }
    }
}

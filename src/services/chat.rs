use crate::domain::models::{ChatMessage, ChatRole};
use anyhow::Result;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;

pub const SYSTEM_PROMPT: &str = r#"Eres un asistente especializado en salud mental y bienestar para la plataforma Eunonia.

Características principales:
- Eres empático, profesional y comprensivo
- Tienes conocimientos especializados en psicología, terapia cognitivo-conductual, mindfulness y técnicas de relajación
- Puedes ayudar con manejo de ansiedad, depresión, estrés y otros temas de salud mental
- Siempre recomiendas buscar ayuda profesional para casos serios
- Respondes en español de manera clara y accesible
- Ofreces técnicas prácticas y ejercicios cuando es apropiado
- Mantienes la confidencialidad y privacidad del usuario

Importante:
- NO eres un reemplazo de la terapia profesional
- Si detectas signos de crisis o pensamientos de autolesión, recomienda buscar ayuda inmediata
- Mantén un tono cálido pero profesional
- Proporciona recursos y técnicas basadas en evidencia científica"#;

pub type TextStream = BoxStream<'static, Result<String>>;

/// Hosted model that answers a conversation incrementally.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn stream_reply(&self, system: &str, messages: &[ChatMessage]) -> Result<TextStream>;
}

#[derive(Clone)]
pub struct OpenAiRelay {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiRelay {
    pub fn new(api_key: String, model: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: Client::with_config(config),
            model,
        }
    }

    fn build_messages(system: &str, messages: &[ChatMessage]) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut out = Vec::with_capacity(messages.len() + 1);
        out.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()?
                .into(),
        );
        for message in messages {
            let built: ChatCompletionRequestMessage = match message.role {
                ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(message.content.as_str())
                    .build()?
                    .into(),
                ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(message.content.as_str())
                    .build()?
                    .into(),
            };
            out.push(built);
        }
        Ok(out)
    }
}

#[async_trait]
impl LanguageModel for OpenAiRelay {
    async fn stream_reply(&self, system: &str, messages: &[ChatMessage]) -> Result<TextStream> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.as_str())
            .messages(Self::build_messages(system, messages)?)
            .stream(true)
            .build()?;

        let upstream = self.client.chat().create_stream(request).await?;
        let text = upstream.filter_map(|chunk| async move {
            match chunk {
                Ok(resp) => {
                    let delta: String = resp
                        .choices
                        .iter()
                        .filter_map(|c| c.delta.content.as_deref())
                        .collect();
                    (!delta.is_empty()).then_some(Ok(delta))
                }
                Err(err) => Some(Err(err.into())),
            }
        });
        Ok(text.boxed())
    }
}

#[cfg(test)]
pub mod scripted {
    use super::*;
    use std::sync::Mutex;

    /// Replays fixed chunks and remembers what it was asked.
    #[derive(Default)]
    pub struct ScriptedModel {
        pub chunks: Vec<String>,
        pub seen: Mutex<Vec<(String, Vec<ChatMessage>)>>,
    }

    impl ScriptedModel {
        pub fn new(chunks: &[&str]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| c.to_string()).collect(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn stream_reply(&self, system: &str, messages: &[ChatMessage]) -> Result<TextStream> {
            self.seen
                .lock()
                .unwrap()
                .push((system.to_string(), messages.to_vec()));
            let chunks: Vec<Result<String>> = self.chunks.iter().cloned().map(Ok).collect();
            Ok(futures::stream::iter(chunks).boxed())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_system_prompt_sets_crisis_rules() {
        assert!(SYSTEM_PROMPT.contains("NO eres un reemplazo de la terapia profesional"));
        assert!(SYSTEM_PROMPT.contains("autolesión"));
    }

    #[test]
    fn test_history_keeps_order_after_system() {
        let history = vec![
            ChatMessage {
                role: ChatRole::User,
                content: "Hola".into(),
                timestamp: Utc::now(),
            },
            ChatMessage {
                role: ChatRole::Assistant,
                content: "¿Cómo te sientes hoy?".into(),
                timestamp: Utc::now(),
            },
        ];
        let built = OpenAiRelay::build_messages(SYSTEM_PROMPT, &history).unwrap();
        assert_eq!(built.len(), 3);
        assert!(matches!(built[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(built[1], ChatCompletionRequestMessage::User(_)));
        assert!(matches!(built[2], ChatCompletionRequestMessage::Assistant(_)));
    }
}

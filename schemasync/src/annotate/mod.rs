//! Column descriptions: native comment first, then a cached or freshly
//! generated definition, then a deterministic placeholder.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use sea_orm::{DatabaseConnection, DbErr};
use uuid::Uuid;

use crate::introspect::FieldDescriptor;
use crate::store::cache::{self, CacheEntry, CacheKey};

pub mod gemini;
pub mod throttle;

use throttle::Throttle;

/// Who produced a field's current description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticSource {
    Engine,
    Ai,
    Fallback,
    User,
}

impl SemanticSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticSource::Engine => "engine",
            SemanticSource::Ai => "ai",
            SemanticSource::Fallback => "fallback",
            SemanticSource::User => "user",
        }
    }
}

#[derive(Debug)]
pub enum AnnotationError {
    Transport(String),
    Status { status: u16, body: String },
    Decode(String),
    /// The service answered but produced no text.
    Empty,
}

impl fmt::Display for AnnotationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotationError::Transport(msg) => write!(f, "Annotation request failed: {msg}"),
            AnnotationError::Status { status, body } => {
                write!(f, "Annotation service returned HTTP {status}: {body}")
            }
            AnnotationError::Decode(msg) => write!(f, "Unreadable annotation response: {msg}"),
            AnnotationError::Empty => write!(f, "Annotation service returned no text"),
        }
    }
}

impl std::error::Error for AnnotationError {}

#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    /// Recorded with every cached definition.
    fn model(&self) -> &str;

    /// Returns trimmed, non-empty text.
    async fn generate(&self, prompt: &str) -> Result<String, AnnotationError>;
}

/// Where a field sits, for the prompt and the cache key.
#[derive(Debug, Clone, Copy)]
pub struct ColumnContext<'a> {
    pub connection_id: Uuid,
    pub database: &'a str,
    pub schema: &'a str,
    pub table: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSemantics {
    pub description: String,
    pub ai_description: Option<String>,
    pub source: SemanticSource,
}

pub fn fallback_description(field: &FieldDescriptor) -> String {
    format!("Column {} of type {}", field.name, field.data_type)
}

pub fn build_prompt(ctx: &ColumnContext<'_>, field: &FieldDescriptor) -> String {
    format!(
        "Analyze this database column and provide a clear, concise definition of what this \
         column likely represents.\n\n\
         Database: {}\n\
         Schema: {}\n\
         Table: {}\n\
         Column Name: {}\n\
         Column Type: {}\n\n\
         Provide a brief, professional definition (1 to 2 sentences) focusing on business \
         meaning rather than technical details.\n\n\
         Definition:",
        ctx.database, ctx.schema, ctx.table, field.name, field.data_type
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnotationStats {
    pub generated: u32,
    pub cache_hits: u32,
    pub failures: u32,
}

/// One per sync run. Calls to the generator are strictly sequential and
/// spaced by the throttle.
pub struct SemanticAnnotator {
    db: DatabaseConnection,
    generator: Option<Arc<dyn TextGenerator>>,
    throttle: Throttle,
    stats: AnnotationStats,
}

impl SemanticAnnotator {
    /// `generator: None` disables generation; every uncommented field gets
    /// the placeholder.
    pub fn new(
        db: DatabaseConnection,
        generator: Option<Arc<dyn TextGenerator>>,
        delay: Duration,
    ) -> Self {
        Self {
            db,
            generator,
            throttle: Throttle::new(delay),
            stats: AnnotationStats::default(),
        }
    }

    pub fn stats(&self) -> AnnotationStats {
        self.stats
    }

    /// Only store errors from the cache propagate; generation failures
    /// degrade to the placeholder for this field alone.
    pub async fn resolve(
        &mut self,
        ctx: &ColumnContext<'_>,
        field: &FieldDescriptor,
    ) -> Result<ResolvedSemantics, DbErr> {
        if let Some(comment) = field.native_comment() {
            return Ok(ResolvedSemantics {
                description: comment.to_string(),
                ai_description: None,
                source: SemanticSource::Engine,
            });
        }

        let Some(generator) = self.generator.clone() else {
            return Ok(fallback(field));
        };

        let key = CacheKey {
            connection_id: ctx.connection_id,
            table_name: ctx.table,
            column_name: &field.name,
            column_type: &field.data_type,
        };

        if let Some(cached) = cache::lookup(&self.db, key).await? {
            self.stats.cache_hits += 1;
            return Ok(generated(cached));
        }

        self.throttle.wait().await;
        let answer = generator.generate(&build_prompt(ctx, field)).await;
        self.throttle.done();
        let text = answer
            .map(|t| t.trim().to_string())
            .and_then(|t| if t.is_empty() { Err(AnnotationError::Empty) } else { Ok(t) });

        match text {
            Ok(text) => {
                cache::store(
                    &self.db,
                    CacheEntry {
                        key,
                        database_name: Some(ctx.database),
                        schema_name: Some(ctx.schema),
                        ai_definition: &text,
                        model_used: generator.model(),
                    },
                )
                .await?;
                self.stats.generated += 1;
                Ok(generated(text))
            }
            Err(e) => {
                tracing::warn!(
                    table = %ctx.table,
                    column = %field.name,
                    error = %e,
                    "annotation failed, using placeholder"
                );
                self.stats.failures += 1;
                Ok(fallback(field))
            }
        }
    }
}

fn fallback(field: &FieldDescriptor) -> ResolvedSemantics {
    ResolvedSemantics {
        description: fallback_description(field),
        ai_description: None,
        source: SemanticSource::Fallback,
    }
}

fn generated(text: String) -> ResolvedSemantics {
    ResolvedSemantics {
        description: text.clone(),
        ai_description: Some(text),
        source: SemanticSource::Ai,
    }
}

//! Drives session workflows against the collaborators.
//!
//! The session lock is never held across an await: each operation takes a
//! ticket under the lock, releases it while the collaborator works, then
//! re-locks to apply the result through the ticket guard.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;

use base64::Engine;
use bytes::Bytes;
use chrono::{Duration, Utc};
use futures::future::join_all;
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::catalog::{OTHER_TOPIC, TOPICS};
use crate::collaborator::{abstract_meta, ContentService, ImageRenderer};
use crate::error::AppError;
use crate::models::{
    non_blank, ConfirmRequest, CreateSessionRequest, GenerateRequest, InputMode, LengthChoice, RunSettings, Session,
    StyleConfig,
};
use crate::prompt::assemble;
use crate::render::realize_images;
use crate::workflow::{RunPlan, WorkflowError, WorkflowState, ANNOTATION_FAILED, EXPAND_FAILED};

/// Quoted into the prompt in place of a blank segment.
const BLANK_SEGMENT_TEXT: &str = "...";

const MISSING_TEXT: &str = "Vui lòng nhập nội dung.";
const MISSING_IMAGE: &str = "Vui lòng chọn ảnh.";
const NOT_AN_IMAGE: &str = "Vui lòng chỉ upload file ảnh.";
const MISSING_TOPIC: &str = "Vui lòng nhập chủ đề.";

pub type SessionStore = Arc<RwLock<HashMap<Uuid, Session>>>;

/// Where the content of a run comes from, already validated.
#[derive(Debug)]
enum ContentSource {
    Text(String),
    Image(Bytes),
    Topic(String),
}

impl ContentSource {
    fn from_request(mode: InputMode, request: &GenerateRequest) -> Result<Self, AppError> {
        match mode {
            InputMode::Text => non_blank(request.text.as_deref())
                .map(|text| ContentSource::Text(text.trim().to_string()))
                .ok_or_else(|| AppError::Validation(MISSING_TEXT.into())),
            InputMode::Image => {
                let payload = non_blank(request.image.as_deref())
                    .ok_or_else(|| AppError::Validation(MISSING_IMAGE.into()))?;
                decode_upload(payload).map(ContentSource::Image)
            }
            InputMode::Idea => {
                let topic = request.topic.as_deref().unwrap_or(TOPICS[0]);
                let topic = if topic == OTHER_TOPIC { non_blank(request.custom_topic.as_deref()) } else { non_blank(Some(topic)) };
                topic
                    .map(|t| ContentSource::Topic(t.trim().to_string()))
                    .ok_or_else(|| AppError::Validation(MISSING_TOPIC.into()))
            }
        }
    }
}

/// Accepts a `data:` URL or bare base64 and insists on a known image format.
fn decode_upload(payload: &str) -> Result<Bytes, AppError> {
    let encoded = payload.split_once(";base64,").map(|(_, data)| data).unwrap_or(payload);
    let raw = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| AppError::Validation(NOT_AN_IMAGE.into()))?;
    image::guess_format(&raw).map_err(|_| AppError::Validation(NOT_AN_IMAGE.into()))?;
    Ok(Bytes::from(raw))
}

/// Builds the prompt for one segment. Blank segments get the abstract
/// metadata without a service call.
pub async fn annotate_segment(content: &dyn ContentService, segment: &str, style: &StyleConfig) -> String {
    if segment.trim().is_empty() {
        return assemble(BLANK_SEGMENT_TEXT, style, &abstract_meta());
    }
    let meta = content.infer_visual_meta(segment, style.subject_override(), style.tone_override()).await;
    assemble(segment, style, &meta)
}

#[derive(Clone)]
pub struct Controller {
    sessions: SessionStore,
    content: Arc<dyn ContentService>,
    renderer: Arc<dyn ImageRenderer>,
    session_ttl: Duration,
}

impl Controller {
    pub fn new(content: Arc<dyn ContentService>, renderer: Arc<dyn ImageRenderer>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            content,
            renderer,
            session_ttl: Duration::hours(2),
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Drops sessions untouched for longer than the TTL. Sessions with work
    /// in flight are kept until that work settles.
    pub fn evict_expired(&self) -> usize {
        let cutoff = Utc::now() - self.session_ttl;
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, session| session.updated_at > cutoff || session.workflow.is_busy());
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!("🧹 Evicted {} expired sessions, {} remain", evicted, sessions.len());
        }
        evicted
    }

    pub fn create_session(&self, request: CreateSessionRequest) -> Session {
        self.evict_expired();
        let session = Session::new(request.settings.unwrap_or_default(), request.style.unwrap_or_default());
        info!("🆕 Session {} created", session.id);
        self.sessions.write().insert(session.id, session.clone());
        session
    }

    pub fn get(&self, id: Uuid) -> Result<Session, AppError> {
        self.sessions.read().get(&id).cloned().ok_or(AppError::NotFound)
    }

    /// Runs `f` on the session under the write lock and returns a snapshot.
    fn update<T>(&self, id: Uuid, f: impl FnOnce(&mut Session) -> Result<T, AppError>) -> Result<(T, Session), AppError> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(&id).ok_or(AppError::NotFound)?;
        session.touch();
        let out = f(session)?;
        Ok((out, session.clone()))
    }

    /// A different input mode abandons whatever the workflow held.
    pub fn update_settings(&self, id: Uuid, settings: RunSettings) -> Result<Session, AppError> {
        self.update(id, |session| {
            if settings.input_mode != session.settings.input_mode {
                debug!("Input mode changed on {}, resetting workflow", id);
                session.workflow.reset();
            }
            session.settings = settings;
            Ok(())
        })
        .map(|(_, session)| session)
    }

    /// Prompts already produced keep the style they were confirmed with.
    pub fn update_style(&self, id: Uuid, style: StyleConfig) -> Result<Session, AppError> {
        self.update(id, |session| {
            session.style = style;
            Ok(())
        })
        .map(|(_, session)| session)
    }

    pub async fn generate(&self, id: Uuid, request: GenerateRequest) -> Result<Session, AppError> {
        let (job, _) = self.update(id, |session| {
            let settings = request.settings.clone().unwrap_or_else(|| session.settings.clone());
            let source = ContentSource::from_request(settings.input_mode, &request)?;
            let ticket = session.workflow.start(RunPlan::from(&settings))?;
            if let Some(style) = request.style.clone() {
                session.style = style;
            }
            let job = (ticket, source, settings.count.get(), settings.content_style);
            session.settings = settings;
            Ok(job)
        })?;
        let (ticket, source, target, content_style) = job;

        let acquired = match source {
            ContentSource::Text(text) => Ok(text),
            ContentSource::Image(bytes) => {
                info!("🖼️ Extracting text from uploaded image ({} bytes)", bytes.len());
                self.content.extract_text(bytes).await
            }
            ContentSource::Topic(topic) => {
                info!("💡 Generating {} variants for topic '{}'", target, topic);
                self.content.generate_content(&topic, target, content_style).await
            }
        };

        self.update(id, |session| match acquired {
            Ok(content) => Ok(session.workflow.content_acquired(ticket, content)?),
            Err(e) => {
                session.workflow.fail(ticket, e.to_string())?;
                Err(AppError::Collaborator(e.to_string()))
            }
        })
        .map(|(_, session)| session)
    }

    pub async fn decide_length(&self, id: Uuid, choice: LengthChoice) -> Result<Session, AppError> {
        if choice == LengthChoice::Reduce {
            return self.update(id, |session| Ok(session.workflow.choose_reduce()?)).map(|(_, session)| session);
        }

        let ((ticket, original, target), _) = self.update(id, |session| Ok(session.workflow.begin_expansion()?))?;
        info!("📝 Expanding content to {} variants", target);
        let expanded = self.content.expand_content(&original, target).await;

        self.update(id, |session| {
            match expanded {
                Ok(text) => session.workflow.expansion_finished(ticket, text)?,
                Err(e) => {
                    error!("❌ Expansion failed: {}", e);
                    session.workflow.fail(ticket, EXPAND_FAILED)?;
                }
            }
            if matches!(session.workflow.state(), WorkflowState::Failed { .. }) {
                return Err(AppError::Collaborator(EXPAND_FAILED.into()));
            }
            Ok(())
        })
        .map(|(_, session)| session)
    }

    pub fn edit_segments(&self, id: Uuid, segments: Vec<String>) -> Result<Session, AppError> {
        self.update(id, |session| Ok(session.workflow.edit_segments(segments)?)).map(|(_, session)| session)
    }

    /// Annotates every segment concurrently and assembles the prompts in
    /// segment order.
    pub async fn confirm(&self, id: Uuid, request: ConfirmRequest) -> Result<Session, AppError> {
        let ((ticket, segments, style), _) = self.update(id, |session| {
            let style = session.style.clone();
            Ok(session.workflow.confirm(style, request.segments)?)
        })?;

        let handles = segments.into_iter().map(|segment| {
            let content = Arc::clone(&self.content);
            let style = style.clone();
            tokio::spawn(async move { annotate_segment(content.as_ref(), &segment, &style).await })
        });
        let prompts: Result<Vec<String>, _> = join_all(handles).await.into_iter().collect();

        self.update(id, |session| match prompts {
            Ok(prompts) => Ok(session.workflow.prompts_assembled(ticket, prompts)?),
            Err(e) => {
                error!("❌ Annotation task aborted: {}", e);
                session.workflow.fail(ticket, ANNOTATION_FAILED)?;
                Err(AppError::Internal(ANNOTATION_FAILED.into()))
            }
        })
        .map(|(_, session)| session)
    }

    pub fn cancel(&self, id: Uuid) -> Result<Session, AppError> {
        self.update(id, |session| Ok(session.workflow.cancel()?)).map(|(_, session)| session)
    }

    pub fn reset(&self, id: Uuid) -> Result<Session, AppError> {
        self.update(id, |session| {
            session.workflow.reset();
            Ok(())
        })
        .map(|(_, session)| session)
    }

    /// Renders missing images one by one; each image is visible on the
    /// session as soon as it arrives. A reset in between ends the batch
    /// after the request already in flight.
    pub async fn render_images(&self, id: Uuid) -> Result<Session, AppError> {
        let ((ticket, prompts, aspect_ratio, existing), _) =
            self.update(id, |session| Ok(session.workflow.begin_rendering()?))?;

        let sessions = Arc::clone(&self.sessions);
        let report = realize_images(self.renderer.as_ref(), &prompts, aspect_ratio, existing, |index, image| {
            let mut sessions = sessions.write();
            let Some(session) = sessions.get_mut(&id) else {
                return ControlFlow::Break(());
            };
            match session.workflow.record_image(ticket, index, image.to_string()) {
                Ok(()) => ControlFlow::Continue(()),
                Err(e) => {
                    info!("⏹️ Dropping image {} for {} and stopping: {}", index + 1, id, e);
                    ControlFlow::Break(())
                }
            }
        })
        .await;

        if let Some(notice) = &report.notice {
            warn!("⚠️ Rendering stopped early for {}: {}", id, notice);
        }
        self.update(id, |session| Ok(session.workflow.rendering_finished(ticket, report.images, report.notice)?))
            .map(|(_, session)| session)
    }

    /// Prompts and style snapshot of a completed run.
    pub fn completed_prompts(&self, id: Uuid) -> Result<(Vec<String>, StyleConfig), AppError> {
        let sessions = self.sessions.read();
        let session = sessions.get(&id).ok_or(AppError::NotFound)?;
        match session.workflow.state() {
            WorkflowState::Complete { prompts, style } => Ok((prompts.clone(), style.clone())),
            other => Err(WorkflowError::InvalidTransition { action: "export prompts", state: other.name() }.into()),
        }
    }
}

//! Per-session workflow state machine.
//!
//! Every transition goes through a named method on [`Workflow`]. Methods that
//! start collaborator work hand out a [`RunTicket`]; the completion methods
//! only apply a result whose ticket still matches the current run, so a reply
//! that arrives after a reset is dropped.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{AspectRatio, InputMode, RunSettings, StyleConfig};
use crate::segmenter::{fit_to_count, segment, SUFFICIENCY_PROBE};

/// User-facing message when content expansion cannot deliver.
pub const EXPAND_FAILED: &str = "Không thể mở rộng nội dung.";
/// User-facing message when the annotation batch breaks unexpectedly.
pub const ANNOTATION_FAILED: &str = "Lỗi khi phân tích hình ảnh. Vui lòng thử lại.";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("a run is already in progress")]
    Busy,
    #[error("cannot {action} while {state}")]
    InvalidTransition { action: &'static str, state: &'static str },
    #[error("run was reset before the result arrived")]
    Stale,
}

/// Identifies the run a piece of in-flight work belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTicket(u64);

/// Parameters fixed for the duration of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunPlan {
    pub mode: InputMode,
    pub target: usize,
    pub smart_split: bool,
}

impl From<&RunSettings> for RunPlan {
    fn from(settings: &RunSettings) -> Self {
        Self { mode: settings.input_mode, target: settings.count.get(), smart_split: settings.smart_split }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    AcquiringContent,
    AwaitingLengthDecision { pending_content: String },
    PreviewEditing { segments: Vec<String> },
    AnnotatingAndAssembling { style: StyleConfig },
    Complete { prompts: Vec<String>, style: StyleConfig },
    Failed { message: String },
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::AcquiringContent => "acquiring_content",
            WorkflowState::AwaitingLengthDecision { .. } => "awaiting_length_decision",
            WorkflowState::PreviewEditing { .. } => "preview_editing",
            WorkflowState::AnnotatingAndAssembling { .. } => "annotating_and_assembling",
            WorkflowState::Complete { .. } => "complete",
            WorkflowState::Failed { .. } => "failed",
        }
    }

    fn is_in_flight(&self) -> bool {
        matches!(self, WorkflowState::AcquiringContent | WorkflowState::AnnotatingAndAssembling { .. })
    }
}

/// Images rendered for the prompts of a completed run, keyed by prompt index.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImageBoard {
    pub images: BTreeMap<usize, String>,
    pub notice: Option<String>,
    pub rendering: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Workflow {
    #[serde(flatten)]
    state: WorkflowState,
    run: u64,
    plan: Option<RunPlan>,
    board: ImageBoard,
}

impl Default for Workflow {
    fn default() -> Self {
        Self { state: WorkflowState::Idle, run: 0, plan: None, board: ImageBoard::default() }
    }
}

impl Workflow {
    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    #[cfg(test)]
    pub fn board(&self) -> &ImageBoard {
        &self.board
    }

    #[cfg(test)]
    pub fn plan(&self) -> Option<RunPlan> {
        self.plan
    }

    pub fn is_busy(&self) -> bool {
        self.state.is_in_flight() || self.board.rendering
    }

    /// Idle (or any settled state) → AcquiringContent.
    pub fn start(&mut self, plan: RunPlan) -> Result<RunTicket, WorkflowError> {
        if self.is_busy() {
            return Err(WorkflowError::Busy);
        }
        self.clear();
        self.plan = Some(plan);
        self.state = WorkflowState::AcquiringContent;
        info!(run = self.run, target = plan.target, mode = ?plan.mode, "🚀 Workflow run started");
        Ok(RunTicket(self.run))
    }

    /// Routes freshly acquired content to the length decision or the preview.
    pub fn content_acquired(&mut self, ticket: RunTicket, content: String) -> Result<(), WorkflowError> {
        self.check(ticket, "accept content", |s| matches!(s, WorkflowState::AcquiringContent))?;
        let plan = self.current_plan()?;

        if !plan.smart_split {
            self.enter_preview(&content, 1);
            return Ok(());
        }
        let natural_units = segment(&content, SUFFICIENCY_PROBE).len();
        if plan.mode != InputMode::Idea && natural_units < plan.target {
            info!(natural_units, target = plan.target, "⚠️ Content too short, awaiting length decision");
            self.state = WorkflowState::AwaitingLengthDecision { pending_content: content };
        } else {
            self.enter_preview(&content, plan.target);
        }
        Ok(())
    }

    /// Halts the run at its current in-flight phase.
    pub fn fail(&mut self, ticket: RunTicket, message: impl Into<String>) -> Result<(), WorkflowError> {
        self.check(ticket, "fail", WorkflowState::is_in_flight)?;
        let message = message.into();
        warn!(run = self.run, phase = self.state.name(), %message, "❌ Workflow run failed");
        self.state = WorkflowState::Failed { message };
        Ok(())
    }

    /// AwaitingLengthDecision → PreviewEditing with the original content.
    pub fn choose_reduce(&mut self) -> Result<(), WorkflowError> {
        let WorkflowState::AwaitingLengthDecision { pending_content } = &self.state else {
            return Err(self.invalid("reduce"));
        };
        let content = pending_content.clone();
        let plan = self.current_plan()?;
        self.enter_preview(&content, plan.target);
        Ok(())
    }

    /// AwaitingLengthDecision → AcquiringContent while the expansion runs.
    /// Returns the content to expand and the variant count to ask for.
    pub fn begin_expansion(&mut self) -> Result<(RunTicket, String, usize), WorkflowError> {
        let invalid = self.invalid("expand");
        let WorkflowState::AwaitingLengthDecision { pending_content } = &mut self.state else {
            return Err(invalid);
        };
        let content = std::mem::take(pending_content);
        let plan = self.current_plan()?;
        self.state = WorkflowState::AcquiringContent;
        Ok((RunTicket(self.run), content, plan.target))
    }

    /// Applies expanded content; fails the run when it still cannot fill
    /// every requested segment.
    pub fn expansion_finished(&mut self, ticket: RunTicket, expanded: String) -> Result<(), WorkflowError> {
        self.check(ticket, "accept expansion", |s| matches!(s, WorkflowState::AcquiringContent))?;
        let plan = self.current_plan()?;
        let produced = segment(&expanded, plan.target).len();
        if produced < plan.target {
            warn!(produced, target = plan.target, "❌ Expansion returned too few variants");
            self.state = WorkflowState::Failed { message: EXPAND_FAILED.to_string() };
        } else {
            self.enter_preview(&expanded, plan.target);
        }
        Ok(())
    }

    /// Replaces the preview segments; any length is accepted.
    pub fn edit_segments(&mut self, segments: Vec<String>) -> Result<(), WorkflowError> {
        let invalid = self.invalid("edit segments");
        let WorkflowState::PreviewEditing { segments: current } = &mut self.state else {
            return Err(invalid);
        };
        *current = segments;
        Ok(())
    }

    /// PreviewEditing → AnnotatingAndAssembling. The style passed in becomes
    /// the snapshot for every prompt of this run.
    pub fn confirm(
        &mut self,
        style: StyleConfig,
        edited: Option<Vec<String>>,
    ) -> Result<(RunTicket, Vec<String>, StyleConfig), WorkflowError> {
        let invalid = self.invalid("confirm");
        let WorkflowState::PreviewEditing { segments } = &mut self.state else {
            return Err(invalid);
        };
        let segments = edited.unwrap_or_else(|| std::mem::take(segments));
        info!(run = self.run, segments = segments.len(), "✅ Segments confirmed");
        self.state = WorkflowState::AnnotatingAndAssembling { style: style.clone() };
        Ok((RunTicket(self.run), segments, style))
    }

    pub fn prompts_assembled(&mut self, ticket: RunTicket, prompts: Vec<String>) -> Result<(), WorkflowError> {
        self.check(ticket, "accept prompts", |s| matches!(s, WorkflowState::AnnotatingAndAssembling { .. }))?;
        let WorkflowState::AnnotatingAndAssembling { style } = &self.state else {
            return Err(self.invalid("accept prompts"));
        };
        let style = style.clone();
        info!(run = self.run, prompts = prompts.len(), "✅ Prompts assembled");
        self.state = WorkflowState::Complete { prompts, style };
        Ok(())
    }

    /// Discards the preview or pending length decision.
    pub fn cancel(&mut self) -> Result<(), WorkflowError> {
        if !matches!(
            self.state,
            WorkflowState::PreviewEditing { .. } | WorkflowState::AwaitingLengthDecision { .. }
        ) {
            return Err(self.invalid("cancel"));
        }
        self.reset();
        Ok(())
    }

    /// Back to Idle from anywhere. Outstanding work of the old run turns stale.
    pub fn reset(&mut self) {
        debug!(run = self.run, from = self.state.name(), "Workflow reset");
        self.clear();
        self.state = WorkflowState::Idle;
    }

    /// Complete → rendering. Returns what the image driver needs, including
    /// images already obtained so the driver can resume.
    pub fn begin_rendering(
        &mut self,
    ) -> Result<(RunTicket, Vec<String>, AspectRatio, BTreeMap<usize, String>), WorkflowError> {
        if self.board.rendering {
            return Err(WorkflowError::Busy);
        }
        let WorkflowState::Complete { prompts, style } = &self.state else {
            return Err(self.invalid("render images"));
        };
        let job = (RunTicket(self.run), prompts.clone(), style.aspect_ratio, self.board.images.clone());
        self.board.rendering = true;
        self.board.notice = None;
        Ok(job)
    }

    pub fn record_image(&mut self, ticket: RunTicket, index: usize, image: String) -> Result<(), WorkflowError> {
        self.check_rendering(ticket)?;
        self.board.images.insert(index, image);
        Ok(())
    }

    pub fn rendering_finished(
        &mut self,
        ticket: RunTicket,
        images: BTreeMap<usize, String>,
        notice: Option<String>,
    ) -> Result<(), WorkflowError> {
        self.check_rendering(ticket)?;
        self.board.images.extend(images);
        self.board.notice = notice;
        self.board.rendering = false;
        Ok(())
    }

    fn check_rendering(&self, ticket: RunTicket) -> Result<(), WorkflowError> {
        if ticket.0 != self.run || !self.board.rendering {
            return Err(WorkflowError::Stale);
        }
        Ok(())
    }

    fn check(
        &self,
        ticket: RunTicket,
        action: &'static str,
        expected: impl Fn(&WorkflowState) -> bool,
    ) -> Result<(), WorkflowError> {
        if ticket.0 != self.run {
            debug!(ticket = ticket.0, run = self.run, action, "Dropping stale result");
            return Err(WorkflowError::Stale);
        }
        if !expected(&self.state) {
            return Err(self.invalid(action));
        }
        Ok(())
    }

    fn current_plan(&self) -> Result<RunPlan, WorkflowError> {
        self.plan.ok_or(WorkflowError::InvalidTransition { action: "continue", state: "no active run" })
    }

    fn invalid(&self, action: &'static str) -> WorkflowError {
        WorkflowError::InvalidTransition { action, state: self.state.name() }
    }

    fn enter_preview(&mut self, content: &str, target: usize) {
        let segments = fit_to_count(segment(content, target), target);
        self.state = WorkflowState::PreviewEditing { segments };
    }

    fn clear(&mut self) {
        self.run += 1;
        self.plan = None;
        self.board = ImageBoard::default();
    }
}

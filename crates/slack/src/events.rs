use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use punchcard_core::domain::{ReportDraft, ReportKind, WorkItem};
use punchcard_tracker::{TrackerError, WorkItemSource};
use thiserror::Error;
use tracing::{info, warn};

use crate::api::{SlackApi, SlackApiError, ViewInstanceId};
use crate::payload::{PayloadError, SubmissionState};
use crate::views::{
    self, FlowSpec, EXTRA_TASKS_ACTION_ID, EXTRA_TASKS_BLOCK_ID, ITEMS_ACTION_ID, ITEMS_BLOCK_ID,
    NOTES_ACTION_ID, NOTES_BLOCK_ID,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InteractionEnvelope {
    pub envelope_id: String,
    pub event: InteractionEvent,
}

/// One inbound interaction callback. Every variant carries all the context a
/// handler needs. There is no session store, so concurrent flows stay
/// independent by construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InteractionEvent {
    ShortcutInvoked(ShortcutEvent),
    ElementChanged(ElementChangedEvent),
    DialogSubmitted(DialogSubmittedEvent),
    Unsupported { event_type: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShortcutEvent {
    pub callback_id: String,
    /// Single-use, short-lived token authorizing exactly one `views.open`.
    pub trigger_id: String,
    pub user_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementChangedEvent {
    pub action_id: String,
    pub user_id: String,
    /// Id of the open dialog this change originated from; updates must
    /// target exactly this instance.
    pub view_id: ViewInstanceId,
    pub selected_user: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DialogSubmittedEvent {
    pub callback_id: String,
    pub user_id: String,
    pub view_id: ViewInstanceId,
    pub state: SubmissionState,
}

impl InteractionEvent {
    pub fn kind(&self) -> InteractionKind {
        match self {
            Self::ShortcutInvoked(_) => InteractionKind::Shortcut,
            Self::ElementChanged(_) => InteractionKind::ElementChanged,
            Self::DialogSubmitted(_) => InteractionKind::DialogSubmitted,
            Self::Unsupported { .. } => InteractionKind::Unsupported,
        }
    }

    /// The identifier half of the dispatch key: shortcut/submission callback
    /// id or element action id.
    pub fn route_id(&self) -> Option<&str> {
        match self {
            Self::ShortcutInvoked(event) => Some(&event.callback_id),
            Self::ElementChanged(event) => Some(&event.action_id),
            Self::DialogSubmitted(event) => Some(&event.callback_id),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    Shortcut,
    ElementChanged,
    DialogSubmitted,
    Unsupported,
}

/// Dispatch key: events route on (kind, identifier), never on kind alone,
/// since the two report flows share every event kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub kind: InteractionKind,
    pub id: String,
}

impl RouteKey {
    pub fn new(kind: InteractionKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Processed,
    Ignored,
}

#[derive(Debug, Error)]
pub enum EventHandlerError {
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Slack(#[from] SlackApiError),
    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait InteractionHandler: Send + Sync {
    async fn handle(
        &self,
        envelope: &InteractionEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

/// Routes inbound interactions to handlers by (kind, identifier). Unrouted
/// events resolve to `Ignored`; arbitrary block actions (for example the
/// link buttons on a published report) only need the transport-level ack.
#[derive(Default)]
pub struct InteractionRouter {
    handlers: HashMap<RouteKey, Arc<dyn InteractionHandler>>,
}

impl InteractionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: RouteKey, handler: Arc<dyn InteractionHandler>) {
        self.handlers.insert(key, handler);
    }

    pub async fn dispatch(
        &self,
        envelope: &InteractionEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(route_id) = envelope.event.route_id() else {
            return Ok(HandlerResult::Ignored);
        };
        let key = RouteKey::new(envelope.event.kind(), route_id);
        let Some(handler) = self.handlers.get(&key) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Stage labels for structured logs; one flow instance is one-shot and only
/// ever moves forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FlowStage {
    DialogOpened,
    DialogUpdated,
    Submitted,
    Published,
    Failed,
}

impl FlowStage {
    fn label(&self) -> &'static str {
        match self {
            Self::DialogOpened => "dialog_opened",
            Self::DialogUpdated => "dialog_updated",
            Self::Submitted => "submitted",
            Self::Published => "published",
            Self::Failed => "failed",
        }
    }
}

/// The check-in/check-out flow. Both report kinds run this exact machine:
/// shortcut opens the account picker, the account selection swaps in the
/// entry dialog populated from the tracker, submission renders and posts the
/// report. Only the `FlowSpec` wording/ids differ between the two.
pub struct ReportFlow {
    spec: &'static FlowSpec,
    slack: Arc<dyn SlackApi>,
    work_items: Arc<dyn WorkItemSource>,
    channel_id: String,
}

impl ReportFlow {
    pub fn new(
        kind: ReportKind,
        slack: Arc<dyn SlackApi>,
        work_items: Arc<dyn WorkItemSource>,
        channel_id: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            spec: views::flow_spec(kind),
            slack,
            work_items,
            channel_id: channel_id.into(),
        })
    }

    pub fn register(flow: &Arc<Self>, router: &mut InteractionRouter) {
        router.register(
            RouteKey::new(InteractionKind::Shortcut, flow.spec.shortcut_callback_id),
            Arc::new(OpenPickerHandler { flow: flow.clone() }),
        );
        router.register(
            RouteKey::new(InteractionKind::ElementChanged, flow.spec.account_select_action_id),
            Arc::new(PopulateItemsHandler { flow: flow.clone() }),
        );
        router.register(
            RouteKey::new(InteractionKind::DialogSubmitted, flow.spec.submit_callback_id),
            Arc::new(PublishReportHandler { flow: flow.clone() }),
        );
    }

    async fn open_picker(
        &self,
        event: &ShortcutEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let view = views::account_picker_view(self.spec);
        let view_id = self.slack.open_view(&event.trigger_id, view).await?;

        info!(
            event_name = "flow.dialog_opened",
            flow = self.spec.kind.label(),
            stage = FlowStage::DialogOpened.label(),
            correlation_id = %ctx.correlation_id,
            user_id = %event.user_id,
            view_id = %view_id,
            "opened account picker dialog"
        );
        Ok(HandlerResult::Processed)
    }

    async fn populate_items(
        &self,
        event: &ElementChangedEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let items = match self.lookup_items(&event.user_id, ctx).await {
            Ok(items) => items,
            Err(error) => {
                warn!(
                    event_name = "flow.lookup_failed",
                    flow = self.spec.kind.label(),
                    stage = FlowStage::Failed.label(),
                    correlation_id = %ctx.correlation_id,
                    user_id = %event.user_id,
                    view_id = %event.view_id,
                    error = %error,
                    "work-item lookup failed; degrading dialog with inline error"
                );
                let view = views::entry_error_view(
                    self.spec,
                    "The issue tracker could not be reached. The free-text fields below still work.",
                );
                self.slack.update_view(&event.view_id, view).await?;
                return Ok(HandlerResult::Processed);
            }
        };

        let view = views::report_entry_view(self.spec, &items);
        self.slack.update_view(&event.view_id, view).await?;

        info!(
            event_name = "flow.dialog_updated",
            flow = self.spec.kind.label(),
            stage = FlowStage::DialogUpdated.label(),
            correlation_id = %ctx.correlation_id,
            user_id = %event.user_id,
            view_id = %event.view_id,
            selected_account = event.selected_user.as_deref().unwrap_or("none"),
            item_count = items.len(),
            "populated report entry dialog"
        );
        Ok(HandlerResult::Processed)
    }

    async fn lookup_items(
        &self,
        user_id: &str,
        ctx: &EventContext,
    ) -> Result<Vec<WorkItem>, EventHandlerError> {
        let Some(email) = self.slack.user_email(user_id).await? else {
            info!(
                event_name = "flow.identity_unresolved",
                flow = self.spec.kind.label(),
                correlation_id = %ctx.correlation_id,
                user_id = %user_id,
                "no email on profile; dialog degrades to zero work items"
            );
            return Ok(Vec::new());
        };

        Ok(self.work_items.open_items(&email).await?)
    }

    async fn publish_report(
        &self,
        event: &DialogSubmittedEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let selected_items: Vec<WorkItem> = event
            .state
            .selected_options_opt(ITEMS_BLOCK_ID, ITEMS_ACTION_ID)?
            .map(|options| {
                options
                    .iter()
                    .map(|option| WorkItem::new(option.label.clone(), option.value.clone()))
                    .collect()
            })
            .unwrap_or_default();
        let extra_tasks = event.state.text(EXTRA_TASKS_BLOCK_ID, EXTRA_TASKS_ACTION_ID)?;
        let notes = event.state.text(NOTES_BLOCK_ID, NOTES_ACTION_ID)?;

        let draft = ReportDraft {
            kind: self.spec.kind,
            author_user_id: event.user_id.clone(),
            selected_items,
            extra_tasks,
            notes,
        };

        info!(
            event_name = "flow.submitted",
            flow = self.spec.kind.label(),
            stage = FlowStage::Submitted.label(),
            correlation_id = %ctx.correlation_id,
            user_id = %event.user_id,
            view_id = %event.view_id,
            item_count = draft.selected_items.len(),
            "dialog submitted; rendering report"
        );

        let message = views::report_message(&draft);
        match self.slack.post_message(&self.channel_id, message).await {
            Ok(()) => {
                info!(
                    event_name = "flow.published",
                    flow = self.spec.kind.label(),
                    stage = FlowStage::Published.label(),
                    correlation_id = %ctx.correlation_id,
                    user_id = %event.user_id,
                    channel_id = %self.channel_id,
                    "report published"
                );
                Ok(HandlerResult::Processed)
            }
            Err(error) => {
                warn!(
                    event_name = "flow.publish_failed",
                    flow = self.spec.kind.label(),
                    stage = FlowStage::Failed.label(),
                    correlation_id = %ctx.correlation_id,
                    user_id = %event.user_id,
                    channel_id = %self.channel_id,
                    error = %error,
                    "report publish failed"
                );
                Err(error.into())
            }
        }
    }
}

struct OpenPickerHandler {
    flow: Arc<ReportFlow>,
}

#[async_trait]
impl InteractionHandler for OpenPickerHandler {
    async fn handle(
        &self,
        envelope: &InteractionEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let InteractionEvent::ShortcutInvoked(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        self.flow.open_picker(event, ctx).await
    }
}

struct PopulateItemsHandler {
    flow: Arc<ReportFlow>,
}

#[async_trait]
impl InteractionHandler for PopulateItemsHandler {
    async fn handle(
        &self,
        envelope: &InteractionEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let InteractionEvent::ElementChanged(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        self.flow.populate_items(event, ctx).await
    }
}

struct PublishReportHandler {
    flow: Arc<ReportFlow>,
}

#[async_trait]
impl InteractionHandler for PublishReportHandler {
    async fn handle(
        &self,
        envelope: &InteractionEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let InteractionEvent::DialogSubmitted(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        self.flow.publish_report(event, ctx).await
    }
}

/// Builds the production router: both report flows over shared clients.
pub fn report_router(
    slack: Arc<dyn SlackApi>,
    work_items: Arc<dyn WorkItemSource>,
    channel_id: &str,
) -> InteractionRouter {
    let mut router = InteractionRouter::new();
    for kind in [ReportKind::CheckIn, ReportKind::CheckOut] {
        let flow = ReportFlow::new(kind, slack.clone(), work_items.clone(), channel_id);
        ReportFlow::register(&flow, &mut router);
    }
    router
}

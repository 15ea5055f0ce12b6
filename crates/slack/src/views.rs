use punchcard_core::domain::{ReportDraft, ReportKind, WorkItem};

use crate::blocks::{
    Accessory, Block, InputElement, MessageBuilder, MessageTemplate, ModalView, SelectOption,
    TextObject,
};

/// Platform ceiling on options of a static select. Anything beyond it is
/// truncated with a visible indicator; issue lists are unbounded.
pub const MAX_SELECT_OPTIONS: usize = 100;

pub const ITEMS_BLOCK_ID: &str = "report.items.v1";
pub const ITEMS_ACTION_ID: &str = "report.items.select.v1";
pub const EXTRA_TASKS_BLOCK_ID: &str = "report.extra.v1";
pub const EXTRA_TASKS_ACTION_ID: &str = "report.extra.input.v1";
pub const NOTES_BLOCK_ID: &str = "report.notes.v1";
pub const NOTES_ACTION_ID: &str = "report.notes.input.v1";
pub const ITEM_LINK_ACTION_ID: &str = "report.item_link.v1";

/// Everything that distinguishes the check-in flow from the check-out flow.
/// The state machine, handlers, and rendering are shared; only this table
/// varies.
#[derive(Debug, PartialEq, Eq)]
pub struct FlowSpec {
    pub kind: ReportKind,
    pub shortcut_callback_id: &'static str,
    pub submit_callback_id: &'static str,
    pub account_select_action_id: &'static str,
    pub modal_title: &'static str,
    pub picker_prompt: &'static str,
    pub select_label: &'static str,
    pub extra_tasks_label: &'static str,
    pub header_text: &'static str,
    pub tasks_heading: &'static str,
}

const CHECK_IN: FlowSpec = FlowSpec {
    kind: ReportKind::CheckIn,
    shortcut_callback_id: "report.checkin.v1",
    submit_callback_id: "report.checkin.submit.v1",
    account_select_action_id: "report.checkin.account.v1",
    modal_title: "Check in",
    picker_prompt: "Select the account checking in.",
    select_label: "Pick today's tasks from the tracker",
    extra_tasks_label: "Anything else planned for today",
    header_text: ":newspaper:  Check-in  :newspaper:",
    tasks_heading: ":calendar: |   *Today's tasks*  | :calendar: ",
};

const CHECK_OUT: FlowSpec = FlowSpec {
    kind: ReportKind::CheckOut,
    shortcut_callback_id: "report.checkout.v1",
    submit_callback_id: "report.checkout.submit.v1",
    account_select_action_id: "report.checkout.account.v1",
    modal_title: "Check out",
    picker_prompt: "Select the account checking out.",
    select_label: "Pick what you worked on from the tracker",
    extra_tasks_label: "Anything else you worked on today",
    header_text: ":newspaper:  Check-out  :newspaper:",
    tasks_heading: ":calendar: |   *Today's work*  | :calendar: ",
};

const NOTES_HEADING: &str = " :loud_sound: *Notes* :loud_sound:";

pub fn flow_spec(kind: ReportKind) -> &'static FlowSpec {
    match kind {
        ReportKind::CheckIn => &CHECK_IN,
        ReportKind::CheckOut => &CHECK_OUT,
    }
}

/// The initial dialog: a single account picker, no submit button. The
/// interesting dialog replaces this one in place once an account is chosen.
pub fn account_picker_view(spec: &FlowSpec) -> ModalView {
    ModalView::new(spec.submit_callback_id, spec.modal_title).block(
        Block::section_with_accessory(
            TextObject::mrkdwn(spec.picker_prompt),
            Accessory::users_select(spec.account_select_action_id, "Select an account"),
        ),
    )
}

/// The report-entry dialog, parameterized by the account's open work items.
/// With zero items the select is omitted entirely (the platform rejects an
/// empty option list) and the free-text fields carry the report alone.
pub fn report_entry_view(spec: &FlowSpec, work_items: &[WorkItem]) -> ModalView {
    let mut view = ModalView::new(spec.submit_callback_id, spec.modal_title)
        .submit_label("Send")
        .block(Block::Divider);

    if work_items.is_empty() {
        view = view.block(Block::section(TextObject::mrkdwn(
            "No open work items were found for this account.",
        )));
    } else {
        let shown = work_items.len().min(MAX_SELECT_OPTIONS);
        let options = work_items[..shown]
            .iter()
            .map(|item| SelectOption::new(item.title.clone(), item.url.clone()))
            .collect();

        view = view.block(Block::Input {
            block_id: ITEMS_BLOCK_ID.to_string(),
            label: TextObject::plain(spec.select_label),
            element: InputElement::MultiStaticSelect {
                action_id: ITEMS_ACTION_ID.to_string(),
                placeholder: TextObject::plain("Select issues"),
                options,
            },
            optional: true,
        });

        if work_items.len() > shown {
            view = view.block(Block::context(format!(
                "+{} more open items not shown",
                work_items.len() - shown
            )));
        }
    }

    view.block(free_text_input(EXTRA_TASKS_BLOCK_ID, EXTRA_TASKS_ACTION_ID, spec.extra_tasks_label))
        .block(free_text_input(NOTES_BLOCK_ID, NOTES_ACTION_ID, "Notes"))
}

/// In-place replacement shown when populating the entry dialog failed: the
/// failure is surfaced instead of swallowed, and the free-text fields keep
/// the flow submittable.
pub fn entry_error_view(spec: &FlowSpec, detail: &str) -> ModalView {
    ModalView::new(spec.submit_callback_id, spec.modal_title)
        .submit_label("Send")
        .block(Block::section(TextObject::mrkdwn(
            ":warning: Could not load open work items for this account.",
        )))
        .block(Block::context(detail.to_string()))
        .block(free_text_input(EXTRA_TASKS_BLOCK_ID, EXTRA_TASKS_ACTION_ID, spec.extra_tasks_label))
        .block(free_text_input(NOTES_BLOCK_ID, NOTES_ACTION_ID, "Notes"))
}

fn free_text_input(block_id: &str, action_id: &str, label: &str) -> Block {
    Block::Input {
        block_id: block_id.to_string(),
        label: TextObject::plain(label),
        element: InputElement::PlainTextInput { action_id: action_id.to_string(), multiline: true },
        optional: true,
    }
}

/// Renders the final channel message. Deterministic: identical drafts yield
/// identical payloads. The free-text blocks are emitted even when empty,
/// an intentionally preserved rendering quirk that reports rely on.
pub fn report_message(draft: &ReportDraft) -> MessageTemplate {
    let spec = flow_spec(draft.kind);

    let mut builder = MessageBuilder::new(format!(
        "{} report from <@{}>",
        spec.modal_title, draft.author_user_id
    ))
    .block(Block::header(spec.header_text))
    .block(Block::Divider)
    .block(Block::section(TextObject::mrkdwn(format!("<@{}>", draft.author_user_id))))
    .block(Block::Divider)
    .block(Block::section(TextObject::mrkdwn(spec.tasks_heading)));

    for item in &draft.selected_items {
        builder = builder.block(Block::section_with_accessory(
            TextObject::mrkdwn(format!("●  {}", item.title)),
            Accessory::link_button(ITEM_LINK_ACTION_ID, "Go to issue", item.url.clone()),
        ));
    }

    builder
        .block(Block::section(TextObject::mrkdwn(format!("●  {}", draft.extra_tasks))))
        .block(Block::Divider)
        .block(Block::section(TextObject::mrkdwn(NOTES_HEADING)))
        .block(Block::section(TextObject::mrkdwn(draft.notes.clone())))
        .build()
}

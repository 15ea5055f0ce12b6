use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Plain { text } | Self::Mrkdwn { text } => text,
        }
    }
}

/// One entry of a static select element. The value carries the work item's
/// reference url so the selection survives the round trip through Slack
/// without any server-side session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub text: TextObject,
    pub value: String,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self { text: TextObject::plain(label), value: value.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Accessory {
    UsersSelect {
        action_id: String,
        placeholder: TextObject,
    },
    Button {
        action_id: String,
        text: TextObject,
        value: String,
        url: String,
    },
}

impl Accessory {
    pub fn users_select(action_id: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self::UsersSelect {
            action_id: action_id.into(),
            placeholder: TextObject::plain(placeholder),
        }
    }

    pub fn link_button(
        action_id: impl Into<String>,
        label: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self::Button {
            action_id: action_id.into(),
            text: TextObject::plain(label),
            value: "open_link".to_string(),
            url: url.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputElement {
    MultiStaticSelect {
        action_id: String,
        placeholder: TextObject,
        options: Vec<SelectOption>,
    },
    PlainTextInput {
        action_id: String,
        multiline: bool,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header {
        text: TextObject,
    },
    Divider,
    Section {
        #[serde(skip_serializing_if = "Option::is_none")]
        block_id: Option<String>,
        text: TextObject,
        #[serde(skip_serializing_if = "Option::is_none")]
        accessory: Option<Accessory>,
    },
    Input {
        block_id: String,
        label: TextObject,
        element: InputElement,
        optional: bool,
    },
    Context {
        elements: Vec<TextObject>,
    },
}

impl Block {
    pub fn header(text: impl Into<String>) -> Self {
        Self::Header { text: TextObject::plain(text) }
    }

    pub fn section(text: TextObject) -> Self {
        Self::Section { block_id: None, text, accessory: None }
    }

    pub fn section_with_accessory(text: TextObject, accessory: Accessory) -> Self {
        Self::Section { block_id: None, text, accessory: Some(accessory) }
    }

    pub fn context(text: impl Into<String>) -> Self {
        Self::Context { elements: vec![TextObject::plain(text)] }
    }
}

/// A modal view payload as accepted by `views.open` / `views.update`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModalView {
    #[serde(rename = "type")]
    view_type: &'static str,
    pub callback_id: String,
    pub title: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit: Option<TextObject>,
    pub close: TextObject,
    pub blocks: Vec<Block>,
}

impl ModalView {
    pub fn new(callback_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            view_type: "modal",
            callback_id: callback_id.into(),
            title: TextObject::plain(title),
            submit: None,
            close: TextObject::plain("Cancel"),
            blocks: Vec::new(),
        }
    }

    pub fn submit_label(mut self, label: impl Into<String>) -> Self {
        self.submit = Some(TextObject::plain(label));
        self
    }

    pub fn block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn blocks(mut self, blocks: impl IntoIterator<Item = Block>) -> Self {
        self.blocks.extend(blocks);
        self
    }
}

/// A channel message payload: fallback text plus the rendered block sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[cfg(test)]
mod tests {
    use super::{Accessory, Block, InputElement, ModalView, SelectOption, TextObject};

    #[test]
    fn text_objects_serialize_with_slack_type_tags() {
        let plain = serde_json::to_value(TextObject::plain("hello")).expect("serialize");
        assert_eq!(plain["type"], "plain_text");
        assert_eq!(plain["text"], "hello");

        let mrkdwn = serde_json::to_value(TextObject::mrkdwn("*hi*")).expect("serialize");
        assert_eq!(mrkdwn["type"], "mrkdwn");
    }

    #[test]
    fn modal_view_serializes_as_modal_with_optional_submit() {
        let view = ModalView::new("report.checkin.submit.v1", "Check in");
        let value = serde_json::to_value(&view).expect("serialize");
        assert_eq!(value["type"], "modal");
        assert!(value.get("submit").is_none());

        let view = view.submit_label("Send");
        let value = serde_json::to_value(&view).expect("serialize");
        assert_eq!(value["submit"]["text"], "Send");
    }

    #[test]
    fn section_omits_absent_accessory_and_block_id() {
        let block = Block::section(TextObject::mrkdwn("body"));
        let value = serde_json::to_value(&block).expect("serialize");
        assert_eq!(value["type"], "section");
        assert!(value.get("accessory").is_none());
        assert!(value.get("block_id").is_none());
    }

    #[test]
    fn link_button_accessory_carries_url() {
        let block = Block::section_with_accessory(
            TextObject::mrkdwn("●  Fix bug"),
            Accessory::link_button("report.item_link.v1", "Go to issue", "https://t.test/i/1"),
        );
        let value = serde_json::to_value(&block).expect("serialize");
        assert_eq!(value["accessory"]["type"], "button");
        assert_eq!(value["accessory"]["url"], "https://t.test/i/1");
    }

    #[test]
    fn multi_static_select_serializes_options_in_order() {
        let element = InputElement::MultiStaticSelect {
            action_id: "report.items.select.v1".to_string(),
            placeholder: TextObject::plain("Select items"),
            options: vec![SelectOption::new("One", "u1"), SelectOption::new("Two", "u2")],
        };
        let value = serde_json::to_value(&element).expect("serialize");
        assert_eq!(value["type"], "multi_static_select");
        assert_eq!(value["options"][0]["value"], "u1");
        assert_eq!(value["options"][1]["value"], "u2");
    }
}

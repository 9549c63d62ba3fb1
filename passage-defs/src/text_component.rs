use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use passage_util::connection::{
    PacketDecodable, PacketDecoder as _, PacketEncodable, PacketEncoder as _,
};

/// A rich-text chat component, carried on the wire in the JSON chat format.
///
/// Only the pieces the proxy itself authors are modeled; anything else a
/// backend sends is forwarded verbatim at the connection layer and never
/// parsed here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextComponent {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<TextComponent>,
}

impl TextComponent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_bold(mut self, bold: bool) -> Self {
        self.bold = Some(bold);
        self
    }

    pub fn with_extra(mut self, extra: TextComponent) -> Self {
        self.extra.push(extra);
        self
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl PacketEncodable for &TextComponent {
    fn packet_encode(self, mut writer: impl Write) -> std::io::Result<()> {
        let json = serde_json::to_string(self).map_err(std::io::Error::other)?;
        writer.encode(&json)
    }
}

impl PacketDecodable for TextComponent {
    fn packet_decode(mut reader: impl Read) -> std::io::Result<Self> {
        let json: String = reader.decode()?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

impl From<&str> for TextComponent {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

#[cfg(test)]
mod test {
    use super::TextComponent;

    #[test]
    fn json_omits_unset_fields() {
        let component = TextComponent::text("hello");
        assert_eq!(component.to_json().unwrap(), r#"{"text":"hello"}"#);
    }

    #[test]
    fn json_round_trip() {
        let component = TextComponent::text("Passage")
            .with_color("#09add3")
            .with_bold(true)
            .with_extra(TextComponent::text(" proxy"));
        let parsed = TextComponent::from_json(&component.to_json().unwrap()).unwrap();
        assert_eq!(parsed, component);
    }
}

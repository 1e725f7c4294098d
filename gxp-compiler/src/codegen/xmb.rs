//! XMB output: the translatable messages of one template, as a message bundle.

use super::{banner, CodeGenerator, GenerateOptions};
use crate::alert::AlertSink;
use crate::ast::{Message, MessagePart};
use crate::error::Result;
use crate::lang::OutputLanguage;
use crate::phases::MessageExtractedTree;
use crate::schema::ContentFamily;

fn escape(text: &str) -> String {
    ContentFamily::Markup.escape_static(text)
}

/// Presentation text stores a literal percent sign as `%%`; translators see it once.
fn unescape_percent(text: &str) -> String {
    text.replace("%%", "%")
}

pub fn write_message(out: &mut String, message: &Message) {
    out.push_str(&format!("  <msg id=\"{}\"", message.id));
    if let Some(meaning) = &message.meaning {
        out.push_str(&format!(" meaning=\"{}\"", escape(meaning)));
    }
    if let Some(description) = &message.description {
        out.push_str(&format!(" desc=\"{}\"", escape(description)));
    }
    if message.hidden {
        out.push_str(" hidden=\"true\"");
    }
    out.push_str(&format!(" source=\"{}\">", escape(&message.source)));
    for part in &message.parts {
        match part {
            MessagePart::Text { text } => out.push_str(&escape(&unescape_percent(text))),
            MessagePart::Placeholder {
                name,
                example,
                presentation,
            } => out.push_str(&format!(
                "<ph name=\"{}\"><ex>{}</ex>{}</ph>",
                escape(name),
                escape(example),
                escape(&unescape_percent(presentation))
            )),
        }
    }
    out.push_str("</msg>\n");
}

#[derive(Debug, Clone, Copy, Default)]
pub struct XmbGenerator;

impl CodeGenerator for XmbGenerator {
    fn language(&self) -> OutputLanguage {
        OutputLanguage::Xmb
    }

    fn description(&self) -> &str {
        "XML message bundle for translation"
    }

    fn generate(
        &self,
        tree: &MessageExtractedTree,
        _options: &GenerateOptions,
        _sink: &mut dyn AlertSink,
    ) -> Result<String> {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str(&format!(
            "<!-- {} -->\n",
            banner(tree.tree.position().source())
        ));
        out.push_str("<messagebundle>\n");
        for message in &tree.messages {
            write_message(&mut out, message);
        }
        out.push_str("</messagebundle>\n");
        Ok(out)
    }
}

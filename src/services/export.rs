use crate::models::{Chat, MessageStatus};

pub fn export_to_markdown(chat: &Chat) -> String {
    let mut output = format!("# {}\n\n", chat.title);
    output.push_str(&format!(
        "> Started: {} | Messages: {}\n\n",
        chat.created_at.format("%Y-%m-%d %H:%M"),
        chat.messages.len()
    ));

    output.push_str("---\n\n");

    for msg in &chat.messages {
        let marker = match msg.status {
            MessageStatus::Failed => " (reply failed)",
            MessageStatus::Aborted => " (reply stopped)",
            MessageStatus::Pending => " (awaiting reply)",
            MessageStatus::Completed => "",
        };
        output.push_str(&format!(
            "### {}{}\n\n{}\n\n",
            msg.sender, marker, msg.content
        ));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::{append_optimistic, new_chat, with_status, AI_SENDER};

    #[test]
    fn test_export_lists_messages_in_order() {
        let (chat, first) = new_chat("What is a shape?", "alice");
        let (chat, _) = append_optimistic(&chat, "A filtered live query.", AI_SENDER, true);
        let (chat, last) = append_optimistic(&chat, "Thanks", "alice", false);
        let chat = with_status(&chat, &last.id, MessageStatus::Failed).unwrap();

        let md = export_to_markdown(&chat);

        assert!(md.starts_with("# What is a shape?\n\n"));
        assert!(md.contains("Messages: 3"));
        let q = md.find(&first.content).unwrap();
        let a = md.find("A filtered live query.").unwrap();
        assert!(q < a);
        assert!(md.contains("### alice (reply failed)\n\nThanks"));
        assert!(md.contains(&format!("### {}\n\n", AI_SENDER)));
    }
}

use crate::twitter::{Mention, Post};

/// Produces the text posted in reply to a mention.
pub trait ReplyComposer: Send + Sync {
    fn compose(&self, mention: &Mention, root: &Post) -> String;
}

/// Replies with the same configured text every time.
pub struct StaticReply {
    text: String,
}

impl StaticReply {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl ReplyComposer for StaticReply {
    fn compose(&self, _mention: &Mention, _root: &Post) -> String {
        self.text.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::twitter::TweetId;

    #[test]
    fn test_static_reply_ignores_content() {
        let composer = StaticReply::new("Hello world!");
        let mention = Mention {
            id: TweetId::new("10"),
            text: "@replybot is this right?".to_string(),
            conversation_id: Some(TweetId::new("20")),
            created_at: None,
        };
        let root = Post {
            id: TweetId::new("20"),
            text: "Is the sky green?".to_string(),
        };
        assert_eq!(composer.compose(&mention, &root), "Hello world!");
    }
}

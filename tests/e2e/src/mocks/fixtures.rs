//! Dream Fixtures
//!
//! A small, realistic dream split into blocks, plus the lines a dreamer
//! might write about each block.

use dreamlog_core::ConversationKey;

/// One block of a dream
#[derive(Debug, Clone)]
pub struct BlockFixture {
    pub block_id: String,
    pub text: String,
    pub remarks: Vec<String>,
}

/// A dream with its blocks
#[derive(Debug, Clone)]
pub struct DreamFixture {
    pub dream_id: String,
    pub blocks: Vec<BlockFixture>,
}

impl DreamFixture {
    /// Three-block dream about a flooded house
    pub fn flooded_house() -> Self {
        let block = |id: &str, text: &str, remarks: &[&str]| BlockFixture {
            block_id: id.to_string(),
            text: text.to_string(),
            remarks: remarks.iter().map(|r| r.to_string()).collect(),
        };

        Self {
            dream_id: "dream-flooded-house".to_string(),
            blocks: vec![
                block(
                    "b1",
                    "I was in my grandmother's house and water was rising through the floor.",
                    &[
                        "The water was warm, not frightening at first.",
                        "Her clocks were all stopped at different times.",
                        "I kept trying to save the photo albums.",
                    ],
                ),
                block(
                    "b2",
                    "I climbed to the attic and found a door that opened onto the sea.",
                    &[
                        "The attic was much larger than it should have been.",
                        "I felt relief when I saw the sea.",
                    ],
                ),
                block(
                    "b3",
                    "A boat with no one in it drifted up to the door and waited.",
                    &["I did not get in. I woke up before deciding."],
                ),
            ],
        }
    }

    /// Full dream text, blocks joined in order
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn key(&self, block: &BlockFixture) -> ConversationKey {
        ConversationKey::new(self.dream_id.clone(), block.block_id.clone())
    }
}

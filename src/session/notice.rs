//! User-facing notices and the keyboards that accompany them

use super::command::{END_BUTTON, MORE_BUTTON, NEW_TOPIC_BUTTON, RANDOM_BUTTON, SEARCH_BUTTON};
use std::fmt;

/// Reply keyboard attached to a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyboard {
    /// Random item and search buttons
    Main,
    /// More / new topic / end buttons
    Actions,
    /// Hide any keyboard; free text is expected
    Remove,
}

impl Keyboard {
    pub fn buttons(self) -> &'static [&'static str] {
        match self {
            Keyboard::Main => &[RANDOM_BUTTON, SEARCH_BUTTON],
            Keyboard::Actions => &[MORE_BUTTON, NEW_TOPIC_BUTTON, END_BUTTON],
            Keyboard::Remove => &[],
        }
    }
}

/// Message sent to the user by the session engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Welcome,
    Help,
    EnterTopic,
    EmptyTopic,
    EnterCount { topic: String },
    CountNotNumber,
    CountNotPositive,
    CountClamped { max: usize },
    NothingFound,
    AllViewed,
    Found { sent: usize },
    PartiallyFound { sent: usize, total: usize },
    MorePrompt { topic: String, remaining: usize },
    ChooseAction,
    UseControls,
    EnterItemNumber,
    ItemNumberNotNumber,
    ItemNotFound,
    SearchCompleted,
}

impl Notice {
    pub fn text(&self) -> String {
        match self {
            Notice::Welcome => format!(
                "Hi! I find memes by topic.\nPress \"{}\" and describe what you are looking for, \
                 or \"{}\" to get a meme by its number.",
                SEARCH_BUTTON, RANDOM_BUTTON
            ),
            Notice::Help => "How it works:\n\
                 1. Send a topic, words or emoji (\"cats\", \"monday at work\", \"😂\").\n\
                 2. Say how many memes you want (up to 20).\n\
                 3. Ask for more on the same topic, start a new one, or end the search.\n\
                 Commands: /start, /help, /random"
                .to_string(),
            Notice::EnterTopic => "Enter a topic for memes:".to_string(),
            Notice::EmptyTopic => "The topic is empty, please type a few words.".to_string(),
            Notice::EnterCount { topic } => {
                format!("Topic: {}\nHow many memes should I send?", topic)
            }
            Notice::CountNotNumber => "Please enter a number.".to_string(),
            Notice::CountNotPositive => "The number must be positive.".to_string(),
            Notice::CountClamped { max } => {
                format!("That is a lot! I will send at most {}.", max)
            }
            Notice::NothingFound => {
                "Nothing found for this topic. Try another one.".to_string()
            }
            Notice::AllViewed => "You have already seen every meme on this topic.".to_string(),
            Notice::Found { sent } => format!("Memes found: {}", sent),
            Notice::PartiallyFound { sent, total } => {
                format!("Memes found: {} (total available: {}).", sent, total)
            }
            Notice::MorePrompt { topic, remaining } => format!(
                "How many more memes on '{}'? (available: {})",
                topic, remaining
            ),
            Notice::ChooseAction => "What next?".to_string(),
            Notice::UseControls => "Please use the buttons below.".to_string(),
            Notice::EnterItemNumber => "Enter the meme number:".to_string(),
            Notice::ItemNumberNotNumber => "The meme number must be a number.".to_string(),
            Notice::ItemNotFound => "Meme not found!".to_string(),
            Notice::SearchCompleted => "Search finished. Send /start to begin again.".to_string(),
        }
    }

    /// Keyboard to show with this notice, `None` leaves the current one
    pub fn keyboard(&self) -> Option<Keyboard> {
        match self {
            Notice::Welcome => Some(Keyboard::Main),
            Notice::ChooseAction | Notice::UseControls => Some(Keyboard::Actions),
            Notice::EnterTopic
            | Notice::EnterCount { .. }
            | Notice::MorePrompt { .. }
            | Notice::EnterItemNumber
            | Notice::SearchCompleted => Some(Keyboard::Remove),
            _ => None,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_more_prompt_mentions_topic_and_remaining() {
        let text = Notice::MorePrompt {
            topic: "cats".into(),
            remaining: 3,
        }
        .text();
        assert!(text.contains("'cats'"));
        assert!(text.contains("available: 3"));
    }

    #[test]
    fn test_keyboards() {
        assert_eq!(Notice::Welcome.keyboard(), Some(Keyboard::Main));
        assert_eq!(Notice::ChooseAction.keyboard(), Some(Keyboard::Actions));
        assert_eq!(Notice::EnterTopic.keyboard(), Some(Keyboard::Remove));
        assert_eq!(Notice::Found { sent: 2 }.keyboard(), None);
        assert_eq!(Keyboard::Actions.buttons().len(), 3);
        assert!(Keyboard::Remove.buttons().is_empty());
    }
}

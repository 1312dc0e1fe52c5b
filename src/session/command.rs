//! Decoding of raw conversation input
//!
//! Button captions and slash commands are turned into [`Command`]s once, at
//! the transport edge. The state machine never compares strings.

/// Caption of the random item button
pub const RANDOM_BUTTON: &str = "🎲 Random meme";
/// Caption of the search button
pub const SEARCH_BUTTON: &str = "🔍 Find memes";
/// Caption of the "show more" button
pub const MORE_BUTTON: &str = "➕ More memes";
/// Caption of the "new topic" button
pub const NEW_TOPIC_BUTTON: &str = "🔄 New topic";
/// Caption of the "end" button
pub const END_BUTTON: &str = "🛑 End search";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Reset the conversation and show the welcome message
    Start,
    Help,
    /// Begin a new topic search from any state
    Search,
    /// Ask for an item by number
    RandomItem,
    More,
    NewTopic,
    End,
}

impl Command {
    /// Commands only meaningful once results have been shown
    pub fn is_action(self) -> bool {
        matches!(self, Command::More | Command::NewTopic | Command::End)
    }

    fn from_slash(name: &str) -> Option<Self> {
        match name {
            "start" => Some(Command::Start),
            "help" => Some(Command::Help),
            "search" => Some(Command::Search),
            "random" | "random_meme" => Some(Command::RandomItem),
            "more" => Some(Command::More),
            "new" | "new_topic" => Some(Command::NewTopic),
            "end" | "stop" => Some(Command::End),
            _ => None,
        }
    }

    fn from_button(caption: &str) -> Option<Self> {
        match caption {
            RANDOM_BUTTON => Some(Command::RandomItem),
            SEARCH_BUTTON => Some(Command::Search),
            MORE_BUTTON => Some(Command::More),
            NEW_TOPIC_BUTTON => Some(Command::NewTopic),
            END_BUTTON => Some(Command::End),
            _ => None,
        }
    }
}

/// One unit of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Command(Command),
    Text(String),
}

impl Input {
    /// Decode raw input. Slash commands may carry an `@botname` suffix.
    /// Unknown slash commands are ordinary text.
    pub fn decode(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let Some(command) = Command::from_button(trimmed) {
            return Input::Command(command);
        }

        if let Some(rest) = trimmed.strip_prefix('/') {
            let word = rest.split_whitespace().next().unwrap_or_default();
            let name = word.split('@').next().unwrap_or_default();
            if let Some(command) = Command::from_slash(&name.to_lowercase()) {
                return Input::Command(command);
            }
        }

        Input::Text(trimmed.to_string())
    }
}

impl From<Command> for Input {
    fn from(command: Command) -> Self {
        Input::Command(command)
    }
}

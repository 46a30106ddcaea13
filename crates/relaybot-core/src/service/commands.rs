// ---------------------------------------------------------------------------
// Slash command types
// ---------------------------------------------------------------------------

/// Parsed bot command from user input.
#[derive(Debug, PartialEq)]
pub enum BotCommand<'a> {
    /// `/start`: greeting
    Start,
    /// `/subscribe`: opt in to chat and image generation
    Subscribe,
    /// `/unsubscribe`: opt out and forget everything stored for the user
    Unsubscribe,
    /// `/clear`: drop the conversation transcript
    Clear,
    /// `/help`: list available commands
    Help,
    /// `/image <prompt>`: generate a picture (prompt may be empty)
    Image(&'a str),
    /// `/prompt` shows the system directive, `/prompt <text>` replaces it
    Prompt(Option<&'a str>),
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse user text into a bot command, or `None` for free text.
///
/// Command names match case-insensitively. A `@botname` suffix must name
/// `bot_username`; commands addressed to another bot, or suffixed while our
/// username is unknown, are free text. Unknown commands are free text.
pub fn parse_command<'a>(text: &'a str, bot_username: Option<&str>) -> Option<BotCommand<'a>> {
    let trimmed = text.trim();
    let rest = trimmed.strip_prefix('/')?;

    let (head, args) = match rest.find(char::is_whitespace) {
        Some(pos) => (&rest[..pos], rest[pos..].trim()),
        None => (rest, ""),
    };
    let name = match head.split_once('@') {
        Some((name, target)) => {
            let ours = bot_username.is_some_and(|u| u.eq_ignore_ascii_case(target));
            if !ours {
                return None;
            }
            name
        }
        None => head,
    };

    let cmd = if name.eq_ignore_ascii_case("start") {
        BotCommand::Start
    } else if name.eq_ignore_ascii_case("subscribe") {
        BotCommand::Subscribe
    } else if name.eq_ignore_ascii_case("unsubscribe") {
        BotCommand::Unsubscribe
    } else if name.eq_ignore_ascii_case("clear") {
        BotCommand::Clear
    } else if name.eq_ignore_ascii_case("help") {
        BotCommand::Help
    } else if name.eq_ignore_ascii_case("image") {
        BotCommand::Image(args)
    } else if name.eq_ignore_ascii_case("prompt") {
        BotCommand::Prompt(Some(args).filter(|a| !a.is_empty()))
    } else {
        return None;
    };
    Some(cmd)
}

// ---------------------------------------------------------------------------
// Reply texts
// ---------------------------------------------------------------------------

pub const START_TEXT: &str = "Hello! Send /subscribe to start chat with me!";
pub const SUBSCRIBED_TEXT: &str = "Subscribed to the bot";
pub const ALREADY_SUBSCRIBED_TEXT: &str = "Sorry, but you already subscribed to me";
pub const UNSUBSCRIBED_TEXT: &str = "Unsubscribed from the bot";
pub const CLEARED_TEXT: &str = "Your conversation has been cleared up!";
pub const SUBSCRIBE_FIRST_TEXT: &str = "You need to /subscribe first to use this command!";
pub const IMAGE_USAGE_TEXT: &str = "Please provide a prompt! Usage: /image <your prompt>";
pub const IMAGE_NOT_FOUND_TEXT: &str = "Could not generate image. Try a different prompt.";
pub const IMAGE_FAILED_TEXT: &str = "Something went wrong while generating the image.";
pub const PROMPT_SET_TEXT: &str = "Prompt saved. It seeds new conversations; send /clear to start one.";
pub const NO_PROMPT_TEXT: &str = "No prompt set. Usage: /prompt <text>";
pub const STORAGE_FAILED_TEXT: &str = "Something went wrong, please try again later.";

pub fn help_text() -> &'static str {
    "\
Here are some basic commands to help you navigate and use the AI Telegram Bot:\n\
\n\
- /start: Initiates interaction with the bot.\n\
- /subscribe: Subscribes you to the bot for updates.\n\
- /unsubscribe: Unsubscribes you from the bot.\n\
- /clear: Clear your conversation with the bot.\n\
- /help: List of commands.\n\
- /image <prompt>: Generate AI images for free.\n\
- /prompt <text>: Set the system prompt for new conversations.\n\
\n\
Send /subscribe to start interacting!"
}

pub fn current_prompt_text(directive: &str) -> String {
    format!("Current prompt: {}", directive)
}

//! Knowledge about the vanilla command language: which words start a
//! command, which keywords are valid raw conditions, and how token lists
//! render back to command text.

use jmc_lexer::Token;

/// Every vanilla command word a statement may start with
pub const VANILLA_COMMANDS: &[&str] = &[
    "advancement",
    "attribute",
    "ban",
    "ban-ip",
    "banlist",
    "bossbar",
    "clear",
    "clone",
    "damage",
    "data",
    "datapack",
    "debug",
    "defaultgamemode",
    "deop",
    "difficulty",
    "effect",
    "enchant",
    "execute",
    "experience",
    "fill",
    "fillbiome",
    "forceload",
    "function",
    "gamemode",
    "gamerule",
    "give",
    "help",
    "item",
    "kick",
    "kill",
    "list",
    "locate",
    "loot",
    "me",
    "msg",
    "op",
    "pardon",
    "pardon-ip",
    "particle",
    "place",
    "playsound",
    "publish",
    "random",
    "recipe",
    "reload",
    "return",
    "ride",
    "say",
    "schedule",
    "scoreboard",
    "seed",
    "setblock",
    "setidletimeout",
    "setworldspawn",
    "spawnpoint",
    "spectate",
    "spreadplayers",
    "stop",
    "stopsound",
    "summon",
    "tag",
    "team",
    "teammsg",
    "teleport",
    "tell",
    "tellraw",
    "time",
    "title",
    "tp",
    "trigger",
    "weather",
    "whitelist",
    "worldborder",
    "xp",
];

/// Keywords which may start a raw vanilla condition inside `if (...)`
pub const RAW_CONDITIONS: &[&str] = &[
    "entity",
    "block",
    "blocks",
    "score",
    "data",
    "predicate",
    "biome",
    "dimension",
    "loaded",
    "items",
    "function",
];

/// Vanilla commands whose argument tail may continue with a bare number
/// in a following statement
pub const NUMBER_TAIL_COMMANDS: &[&str] = &[
    "give",
    "clear",
    "effect",
    "experience",
    "xp",
    "fill",
    "clone",
    "particle",
    "playsound",
    "time",
    "scoreboard",
    "schedule",
];

pub fn is_vanilla_command(word: &str) -> bool {
    VANILLA_COMMANDS.contains(&word)
}

/// A case-corrected vanilla command, used for did-you-mean suggestions
pub fn similar_command(word: &str) -> Option<String> {
    VANILLA_COMMANDS
        .iter()
        .find(|command| command.eq_ignore_ascii_case(word))
        .map(|command| (*command).to_string())
}

/// Whether the command text may be continued by a bare leading number
pub fn allows_number_tail(command: &str) -> bool {
    command
        .split(' ')
        .next()
        .is_some_and(|word| NUMBER_TAIL_COMMANDS.contains(&word))
}

/// Renders a token list back to command text.
///
/// Spacing is reconstructed from source adjacency: two tokens which were
/// written back to back (`ns:path`, `@e[type=...]`, `~-1`) stay tight,
/// everything else gets a single separating space.
pub fn stringify_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut prev: Option<&Token> = None;
    for token in tokens {
        if let Some(previous) = prev {
            let adjacent = previous.line == token.line
                && previous.col + previous.source_len() == token.col;
            if !adjacent {
                out.push(' ');
            }
        }
        out.push_str(&token.stringify());
        prev = Some(token);
    }
    out
}

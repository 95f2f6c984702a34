// Recoverable errors of the world engine.
//
// Only I/O-shaped failures are errors: parsing a config, loading a save, or a
// save that refers to something that does not exist. Contract violations by
// callers (constructing where nothing can be built, two creatures on one
// square) are bugs and panic through `assert!` at the call site instead.

use crate::types::{CreatureId, LevelId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("invalid world config: {0}")]
    Config(#[source] serde_json::Error),

    #[error("unreadable save: {0}")]
    Save(#[source] serde_json::Error),

    #[error("unknown level {0}")]
    UnknownLevel(LevelId),

    #[error("unknown creature {0}")]
    UnknownCreature(CreatureId),
}

pub type WorldResult<T> = Result<T, WorldError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WorldId;

    #[test]
    fn messages_name_the_missing_thing() {
        let err = WorldError::UnknownLevel(LevelId::new(WorldId(2), 7));
        assert_eq!(err.to_string(), "unknown level Level(2:7)");
        let err = WorldError::UnknownCreature(CreatureId(9));
        assert_eq!(err.to_string(), "unknown creature CreatureId(9)");
    }

    #[test]
    fn parse_errors_keep_their_source() {
        let parse = serde_json::from_str::<u32>("nope").unwrap_err();
        let err = WorldError::Config(parse);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().starts_with("invalid world config"));
    }
}

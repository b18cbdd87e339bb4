use crate::game::GameId;
use thiserror::Error;

/// The user declined a prompt. Callers swallow this without notifying.
#[derive(Debug, Error)]
#[error("canceled by user")]
pub struct UserCanceled;

/// The modding tool could not be resolved before deployment.
#[derive(Debug, Error)]
#[error("\"{tool}\" is required to deploy mods for {game} but is not installed")]
pub struct ToolUnavailable {
    pub tool: String,
    pub game: GameId,
}

/// Suit Adder Tool reported a problem in its console output.
#[derive(Debug, Error)]
#[error("{summary}")]
pub struct SuitToolFailure {
    pub summary: String,
    pub remediation: String,
}

pub fn is_user_canceled(err: &anyhow::Error) -> bool {
    err.is::<UserCanceled>()
}

pub fn is_not_found(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::NotFound
}

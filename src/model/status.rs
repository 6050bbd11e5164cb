use crate::transport::types::{RawMergeStatus, RawState, RawStatus};

use super::{MergeStatus, Status, StatusContext, StatusState};

/// Map a transport status state onto the canonical enum.
///
/// REST reports lowercase tokens and leaves pending statuses without a
/// state. The extension API reports `GitStatusState` codes
/// (2 succeeded, 3 failed, 4 error). Anything unrecognised is pending.
pub fn normalize_state(raw: Option<&RawState>) -> StatusState {
    match raw {
        None => StatusState::Pending,
        Some(RawState::Token(token)) => match token.as_str() {
            "failed" => StatusState::Failed,
            "succeeded" => StatusState::Succeeded,
            _ => StatusState::Pending,
        },
        Some(RawState::Code(code)) => match code {
            2 => StatusState::Succeeded,
            3 => StatusState::Failed,
            4 => StatusState::Error,
            _ => StatusState::Pending,
        },
    }
}

/// Map a transport merge status onto the canonical enum.
///
/// `None` means the server has not evaluated mergeability yet. For REST
/// tokens only "conflicts" is distinguished; any other non-empty token is
/// treated as succeeded.
pub fn normalize_merge_status(raw: Option<&RawMergeStatus>) -> Option<MergeStatus> {
    match raw? {
        RawMergeStatus::Token(token) if token.is_empty() => None,
        RawMergeStatus::Token(token) if token == "conflicts" => Some(MergeStatus::Conflicts),
        RawMergeStatus::Token(_) => Some(MergeStatus::Succeeded),
        RawMergeStatus::Code(code) => match code {
            0 => None,
            1 => Some(MergeStatus::Queued),
            2 => Some(MergeStatus::Conflicts),
            3 => Some(MergeStatus::Succeeded),
            _ => Some(MergeStatus::Failed),
        },
    }
}

/// Normalize raw statuses, keeping one entry per context name.
///
/// A context keeps the position where it first appeared and the value of
/// the last entry seen for it.
pub fn collapse_statuses(raw: Vec<RawStatus>) -> Vec<Status> {
    let mut collapsed: Vec<Status> = Vec::with_capacity(raw.len());
    for entry in raw {
        let status = Status {
            state: normalize_state(entry.state.as_ref()),
            context: StatusContext {
                name: entry.context.name,
                genre: entry.context.genre,
            },
            description: entry.description,
        };
        match collapsed
            .iter_mut()
            .find(|existing| existing.context.name == status.context.name)
        {
            Some(existing) => *existing = status,
            None => collapsed.push(status),
        }
    }
    collapsed
}

//! Input acceptance: keep only files of the accepted media type.

use mp_core::{media_type_matches, InputFile};

/// Outcome of filtering a selection of files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acceptance {
    /// Files that matched, in their original order.
    Accepted(Vec<InputFile>),
    /// Nothing matched; `message` is shown to the user and no batch starts.
    NoneMatched { message: String },
}

/// Filter `files` down to those whose declared media type is `accepted`.
pub fn accept_files(files: impl IntoIterator<Item = InputFile>, accepted: &str) -> Acceptance {
    let mut kept = Vec::new();
    for file in files {
        if media_type_matches(&file.media_type, accepted) {
            kept.push(file);
        } else {
            tracing::debug!(
                "Skipping {}: media type {:?} is not {accepted}",
                file.name,
                file.media_type
            );
        }
    }

    if kept.is_empty() {
        Acceptance::NoneMatched {
            message: not_accepted_message(accepted),
        }
    } else {
        Acceptance::Accepted(kept)
    }
}

/// User-facing text for an empty selection, e.g. `Please select MP4 files only.`
pub fn not_accepted_message(accepted: &str) -> String {
    let subtype = accepted
        .split(';')
        .next()
        .and_then(|essence| essence.split('/').nth(1))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(accepted);
    format!("Please select {} files only.", subtype.to_uppercase())
}

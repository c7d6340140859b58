//! Every way a compile can fail.
//!
//! Variants are grouped by the kind of authoring mistake they report. Each
//! message carries enough context (action, property, map, file, value) to find
//! the offending JSON.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    // ── structural ──────────────────────────────────────────────────────
    #[error("file `{name}` could not be found in the project folder")]
    MissingFile { name: String },

    #[error("file name `{name}` is ambiguous, found at: {}", display_paths(.paths))]
    AmbiguousFile { name: String, paths: Vec<PathBuf> },

    #[error("reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing `{file}`: {source}")]
    Json {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate {kind} name \"{name}\" found in {file}")]
    DuplicateName {
        kind: &'static str,
        name: String,
        file: String,
    },

    #[error(
        "duplicate \"{slot}\" definition on map \"{map}\": defined in both the Tiled map and the scenario; remove one"
    )]
    DuplicateMapScript { map: String, slot: String },

    #[error("\"{name}\" is reserved and cannot be defined by a {kind} file")]
    ReservedName { kind: &'static str, name: String },

    #[error("{context} is missing required field `{field}`")]
    MissingField { context: String, field: &'static str },

    #[error("{context}: {reason}")]
    Malformed { context: String, reason: String },

    #[error("dialog \"{dialog}\" is malformed, it has no dialog screens")]
    EmptyDialog { dialog: String },

    #[error("dialog \"{dialog}\" is malformed, screen {screen} contains no messages")]
    EmptyDialogScreen { dialog: String, screen: usize },

    #[error("serial dialog \"{dialog}\" is malformed, it contains no messages")]
    EmptySerialDialog { dialog: String },

    #[error("unsupported image type in file \"{file}\"; supported types are: png, gif")]
    UnsupportedImage { file: String },

    #[error("decoding image \"{file}\": {reason}")]
    ImageDecode { file: String, reason: String },

    // ── referential ─────────────────────────────────────────────────────
    #[error("invalid action: \"{action}\"")]
    UnknownAction { action: String },

    #[error("{action} requires {expected} for \"{property}\"")]
    MissingOperand {
        action: String,
        property: &'static str,
        expected: &'static str,
    },

    #[error("{action} was given value {value} for \"{property}\", possible values: {valid}")]
    UnknownKey {
        action: String,
        property: &'static str,
        value: String,
        valid: String,
    },

    #[error("{action} \"{property}\" value {value} is invalid: {reason}")]
    InvalidOperand {
        action: String,
        property: &'static str,
        value: String,
        reason: String,
    },

    #[error("{action} \"{property}\" value {value} must be less than or equal to {max}")]
    OutOfRange {
        action: String,
        property: &'static str,
        value: i64,
        max: u64,
    },

    #[error("{context}: no {kind} named \"{name}\" could be found{scope}")]
    NotFound {
        context: String,
        kind: &'static str,
        name: String,
        scope: String,
    },

    // ── capacity ────────────────────────────────────────────────────────
    #[error("map \"{map}\" has {count} entities, but the limit is {limit}")]
    TooManyEntities {
        map: String,
        count: usize,
        limit: usize,
    },

    #[error("there is a limit of 255 variables; the one that broke the encoder's back was \"{name}\"")]
    TooManyVariables { name: String },

    #[error("\"{image}\" has too many colors; max supported colors are 256")]
    TooManyColors { image: String },

    #[error("geometry \"{geometry}\" has {count} points, but the limit is 255")]
    TooManyPoints { geometry: String, count: usize },

    #[error("serial dialog \"{dialog}\" has {count} options, but the limit is 255")]
    TooManyResponses { dialog: String, count: usize },

    #[error("{context}: value {value} does not fit in {width} byte(s)")]
    FieldOverflow {
        context: String,
        value: i64,
        width: usize,
    },

    // ── semantic ────────────────────────────────────────────────────────
    #[error(
        "more than one entity on map \"{map}\" has `is_player` checked, this is not allowed; competing entities: \"{first}\", \"{second}\""
    )]
    MultiplePlayers {
        map: String,
        first: String,
        second: String,
    },

    #[error("object rotation is not supported; object {object} on map \"{map}\" is rotated")]
    RotatedObject { map: String, object: String },

    #[error("serial dialog \"{dialog}\" has both `options` and `text_options`; pick one")]
    ConflictingSerialOptions { dialog: String },

    #[error("COPY_SCRIPT in \"{script}\" never terminates; copy cycle: {}", .cycle.join(" -> "))]
    CopyScriptCycle { script: String, cycle: Vec<String> },
}

pub type Result<T> = std::result::Result<T, EncodeError>;

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl EncodeError {
    pub fn malformed(context: impl Into<String>, reason: impl Into<String>) -> Self {
        EncodeError::Malformed {
            context: context.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(
        context: impl Into<String>,
        kind: &'static str,
        name: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        EncodeError::NotFound {
            context: context.into(),
            kind,
            name: name.into(),
            scope: scope.into(),
        }
    }
}

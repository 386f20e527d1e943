use crate::error::{ErrorKind, StructuredError};
use crate::progress::{ProgressUpdate, ReadingProgress};
use crate::settings::{
    FitMode, ProgressBarPosition, ReaderKind, ReaderSettings, ReadingDirection, ReadingMode, Theme,
};
use crate::store::{
    OpenSession, PageDimension, ReaderCommand, ReaderContentState, ReaderSnapshot, ReaderUiState,
};
use anyhow::Context;
use std::fs;
use std::path::Path;
use ts_rs::TS;

const BINDING_NAMES: &[&str] = &[
    "ReaderKind",
    "ReadingMode",
    "ReadingDirection",
    "FitMode",
    "ProgressBarPosition",
    "Theme",
    "ReaderSettings",
    "PageDimension",
    "ReaderContentState",
    "OpenSession",
    "ReaderUiState",
    "ReaderSnapshot",
    "ReaderCommand",
    "ReadingProgress",
    "ProgressUpdate",
    "ErrorKind",
    "StructuredError",
];

fn export_single_type<T: TS + 'static>(out_dir: &Path) -> anyhow::Result<()> {
    T::export_all_to(out_dir).with_context(|| format!("Failed to export {}", T::name()))
}

/// Write TypeScript declarations for every wire type, plus an `index.ts`.
///
/// Stale `.ts` files in `out_dir` are removed first.
pub fn export_ts_bindings(out_dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    for entry in
        fs::read_dir(out_dir).with_context(|| format!("Failed to list {}", out_dir.display()))?
    {
        let path = entry.context("Failed to read entry")?.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("ts") {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
    }

    export_single_type::<ReaderKind>(out_dir)?;
    export_single_type::<ReadingMode>(out_dir)?;
    export_single_type::<ReadingDirection>(out_dir)?;
    export_single_type::<FitMode>(out_dir)?;
    export_single_type::<ProgressBarPosition>(out_dir)?;
    export_single_type::<Theme>(out_dir)?;
    export_single_type::<ReaderSettings>(out_dir)?;
    export_single_type::<PageDimension>(out_dir)?;
    export_single_type::<ReaderContentState>(out_dir)?;
    export_single_type::<OpenSession>(out_dir)?;
    export_single_type::<ReaderUiState>(out_dir)?;
    export_single_type::<ReaderSnapshot>(out_dir)?;
    export_single_type::<ReaderCommand>(out_dir)?;
    export_single_type::<ReadingProgress>(out_dir)?;
    export_single_type::<ProgressUpdate>(out_dir)?;
    export_single_type::<ErrorKind>(out_dir)?;
    export_single_type::<StructuredError>(out_dir)?;

    let index_content: String = BINDING_NAMES
        .iter()
        .map(|name| format!("export type {{ {name} }} from \"./{name}\";\n"))
        .collect();
    let index_path = out_dir.join("index.ts");
    fs::write(&index_path, index_content)
        .with_context(|| format!("Failed to write {}", index_path.display()))?;

    Ok(())
}

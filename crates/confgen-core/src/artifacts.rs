use crate::domain::{ConfgenError, ConfgenResult};
use std::fs;
use std::io;
use std::path::Path;

pub fn write_text_artifact(path: &Path, content: &str) -> ConfgenResult<()> {
    fs::write(path, content).map_err(|source| {
        ConfgenError::io_system(
            "IO.ARTIFACT_WRITE",
            format!("failed to write '{}': {}", path.display(), source),
        )
    })
}

pub fn copy_artifact(from: &Path, to: &Path) -> ConfgenResult<()> {
    fs::copy(from, to).map(|_| ()).map_err(|source| {
        ConfgenError::io_system(
            "IO.ARTIFACT_COPY",
            format!(
                "failed to copy '{}' to '{}': {}",
                from.display(),
                to.display(),
                source
            ),
        )
    })
}

/// Copies `from` into `to` only when it exists. Returns whether a copy
/// happened.
pub fn copy_if_present(from: &Path, to: &Path) -> ConfgenResult<bool> {
    if !from.is_file() {
        return Ok(false);
    }
    copy_artifact(from, to)?;
    Ok(true)
}

/// The builder reports bad input by writing nothing, not through its exit
/// code, so every structure it produces is checked here.
pub fn require_structure(path: &Path, produced_by: &str) -> ConfgenResult<()> {
    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(source) if source.kind() == io::ErrorKind::NotFound => 0,
        Err(source) => {
            return Err(ConfgenError::io_system(
                "IO.ARTIFACT_READ",
                format!("failed to inspect '{}': {}", path.display(), source),
            ));
        }
    };
    if size == 0 {
        return Err(ConfgenError::input_validation(
            "INPUT.STRUCTURE_EMPTY",
            format!(
                "{} produced no structure at '{}'; check the input molecule",
                produced_by,
                path.display()
            ),
        ));
    }
    Ok(())
}

/// Number of frames in a multi-structure XYZ text, or `None` when the text
/// is not a well-formed sequence of frames.
pub fn count_xyz_frames(content: &str) -> Option<usize> {
    let mut lines = content.lines().peekable();
    let mut frames = 0;

    loop {
        while lines.peek().is_some_and(|line| line.trim().is_empty()) {
            lines.next();
        }
        let Some(header) = lines.next() else {
            return Some(frames);
        };

        let atom_count = header.trim().parse::<usize>().ok()?;
        lines.next()?;
        for _ in 0..atom_count {
            lines.next()?;
        }
        frames += 1;
    }
}

pub fn count_xyz_frames_in_file(path: &Path) -> Option<usize> {
    fs::read_to_string(path)
        .ok()
        .and_then(|content| count_xyz_frames(&content))
}

// ============================================================
// Layer 6 — CSV Export
// ============================================================
// Writes generated images or latent codes as plain CSV so they
// can be plotted outside this tool. One tensor row per line,
// columns named by `prefix` and index:
//
//   x0,x1,x2,...          (images)
//   z0,z1,...             (latent codes)
//   z0,z1,...,label       (latent codes with --labels-file)

use anyhow::{bail, Context, Result};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

/// Write `values` (row-major, `width` columns) to `path`, creating
/// parent directories as needed. `labels`, when given, becomes a
/// trailing `label` column with one entry per row. Returns the
/// number of rows.
pub fn write_rows_csv(
    path: &Path,
    prefix: &str,
    values: &[f32],
    width: usize,
    labels: Option<&[u8]>,
) -> Result<usize> {
    if width == 0 || values.len() % width != 0 {
        bail!("{} values cannot be split into rows of width {}", values.len(), width);
    }
    let rows = values.len() / width;
    if let Some(labels) = labels {
        if labels.len() != rows {
            bail!("{} labels for {} rows", labels.len(), rows);
        }
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let file = File::create(path)
        .with_context(|| format!("Cannot create '{}'", path.display()))?;
    let mut out = BufWriter::new(file);

    let mut header: Vec<String> = (0..width).map(|i| format!("{prefix}{i}")).collect();
    if labels.is_some() {
        header.push("label".to_string());
    }
    writeln!(out, "{}", header.join(","))?;

    for (i, row) in values.chunks_exact(width).enumerate() {
        let mut cells: Vec<String> = row.iter().map(|v| format!("{v:.6}")).collect();
        if let Some(labels) = labels {
            cells.push(labels[i].to_string());
        }
        writeln!(out, "{}", cells.join(","))?;
    }
    out.flush()?;

    tracing::info!("Wrote {} rows of width {} to '{}'", rows, width, path.display());
    Ok(rows)
}

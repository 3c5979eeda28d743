use crate::db::DB_FILE_NAME;
use anyhow::{anyhow, bail, Context};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const DB_ENTRY: &str = "db/gradecalc.sqlite3";
pub const BUNDLE_FORMAT: &str = "gradecalc-workspace-v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    format: String,
    #[serde(default)]
    app_version: String,
    #[serde(default)]
    exported_at: String,
    db_sha256: String,
}

/// What a bundle operation wrote or restored.
#[derive(Debug, Clone)]
pub struct BundleSummary {
    pub bundle_format: String,
    pub db_sha256: String,
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> anyhow::Result<Vec<u8>> {
    let mut entry = archive
        .by_name(name)
        .with_context(|| format!("bundle has no {} entry", name))?;
    let mut out = Vec::new();
    entry
        .read_to_end(&mut out)
        .with_context(|| format!("could not extract {}", name))?;
    Ok(out)
}

/// Zips the workspace database with a manifest carrying its checksum.
pub fn export_workspace_bundle(workspace: &Path, out_path: &Path) -> anyhow::Result<BundleSummary> {
    let db_path = workspace.join(DB_FILE_NAME);
    let db_bytes = std::fs::read(&db_path)
        .with_context(|| format!("no workspace database at {}", db_path.to_string_lossy()))?;

    let manifest = Manifest {
        format: BUNDLE_FORMAT.to_string(),
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        exported_at: chrono::Utc::now().to_rfc3339(),
        db_sha256: sha256_hex(&db_bytes),
    };
    let manifest_json = serde_json::to_vec_pretty(&manifest).context("manifest encode")?;

    if let Some(dir) = out_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("could not create {}", dir.to_string_lossy()))?;
    }
    let file = File::create(out_path)
        .with_context(|| format!("could not create bundle {}", out_path.to_string_lossy()))?;

    let mut zip = ZipWriter::new(file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, bytes) in [(MANIFEST_ENTRY, &manifest_json), (DB_ENTRY, &db_bytes)] {
        zip.start_file(name, opts)
            .with_context(|| format!("could not start {} in bundle", name))?;
        zip.write_all(bytes)
            .with_context(|| format!("could not write {} into bundle", name))?;
    }
    zip.finish().context("could not finish bundle")?;

    log::info!(
        "exported workspace {} to {}",
        workspace.to_string_lossy(),
        out_path.to_string_lossy()
    );
    Ok(BundleSummary {
        bundle_format: manifest.format,
        db_sha256: manifest.db_sha256,
    })
}

/// Replaces the workspace database with the bundle's copy once its checksum
/// matches. Any open connection to the workspace must be dropped first.
pub fn import_workspace_bundle(in_path: &Path, workspace: &Path) -> anyhow::Result<BundleSummary> {
    let file = File::open(in_path)
        .with_context(|| format!("could not open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(file).context("bundle is not a zip archive")?;

    let manifest: Manifest = serde_json::from_slice(&read_entry(&mut archive, MANIFEST_ENTRY)?)
        .context("bundle manifest is malformed")?;
    if manifest.format != BUNDLE_FORMAT {
        bail!("unsupported bundle format: {}", manifest.format);
    }

    let db_bytes = read_entry(&mut archive, DB_ENTRY)?;
    let actual = sha256_hex(&db_bytes);
    if actual != manifest.db_sha256 {
        return Err(anyhow!(
            "checksum mismatch: manifest {} but database is {}",
            manifest.db_sha256,
            actual
        ));
    }

    std::fs::create_dir_all(workspace)
        .with_context(|| format!("could not create {}", workspace.to_string_lossy()))?;
    let staged = workspace.join(format!("{}.importing", DB_FILE_NAME));
    std::fs::write(&staged, &db_bytes)
        .with_context(|| format!("could not stage {}", staged.to_string_lossy()))?;

    let live = workspace.join(DB_FILE_NAME);
    if live.exists() {
        std::fs::remove_file(&live)
            .with_context(|| format!("could not replace {}", live.to_string_lossy()))?;
    }
    std::fs::rename(&staged, &live)
        .with_context(|| format!("could not move database into {}", live.to_string_lossy()))?;

    log::info!(
        "restored workspace {} from {} (exported {})",
        workspace.to_string_lossy(),
        in_path.to_string_lossy(),
        manifest.exported_at
    );
    Ok(BundleSummary {
        bundle_format: manifest.format,
        db_sha256: actual,
    })
}

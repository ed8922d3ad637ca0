use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use soil_carbon_core::{MasterRow, RawRecord, ReconciledTables};
use time::OffsetDateTime;

pub const EXPORT_FORMAT_VERSION: i64 = 1;
pub const MANIFEST_FILE: &str = "manifest.json";
pub const MASTER_FILE: &str = "master.ndjson";
pub const PEDON_FILE: &str = "pedon.ndjson";
pub const HORIZON_FILE: &str = "horizon.ndjson";
pub const SUMMARY_FILE: &str = "summary.ndjson";

const TABLE_FILES: [&str; 4] = [MASTER_FILE, PEDON_FILE, HORIZON_FILE, SUMMARY_FILE];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableFileDigest {
    pub path: String,
    pub sha256: String,
    pub records: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableManifest {
    pub format_version: i64,
    pub generated_at: String,
    pub files: Vec<TableFileDigest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileVerification {
    pub path: String,
    pub expected_sha256: String,
    pub actual_sha256: Option<String>,
    pub expected_records: usize,
    pub actual_records: Option<usize>,
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestVerification {
    pub format_version: i64,
    pub files: Vec<FileVerification>,
    pub missing_entries: Vec<String>,
    pub ok: bool,
}

/// Reads the unified input table, one raw record per line. Blank lines are
/// skipped and row order is preserved.
///
/// # Errors
/// Returns an error when the file cannot be read or a line is not a valid raw
/// record; the message names the 1-based row.
pub fn read_records(path: &Path) -> Result<Vec<RawRecord>> {
    read_ndjson_file(path)
}

/// Reads `master.ndjson` back from an output directory.
///
/// # Errors
/// Returns an error when the file is missing or a row does not match the
/// master column contract.
pub fn read_master_table(out_dir: &Path) -> Result<Vec<MasterRow>> {
    read_ndjson_file(&out_dir.join(MASTER_FILE))
}

/// Writes the four tables and a manifest of their digests into `out_dir`.
///
/// # Errors
/// Returns an error when `out_dir` cannot be created or any table or the
/// manifest cannot be serialized or written.
pub fn write_tables(out_dir: &Path, tables: &ReconciledTables) -> Result<TableManifest> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create output directory {}", out_dir.display()))?;

    let master = write_ndjson_file(&out_dir.join(MASTER_FILE), &tables.master)?;
    let pedon = write_ndjson_file(&out_dir.join(PEDON_FILE), &tables.pedon)?;
    let horizon = write_ndjson_file(&out_dir.join(HORIZON_FILE), &tables.horizon)?;
    let summary = write_ndjson_file(&out_dir.join(SUMMARY_FILE), &tables.summary)?;

    let manifest = TableManifest {
        format_version: EXPORT_FORMAT_VERSION,
        generated_at: now_rfc3339()?,
        files: TABLE_FILES
            .iter()
            .zip([master, pedon, horizon, summary])
            .map(|(path, (sha256, records))| TableFileDigest {
                path: (*path).to_string(),
                sha256,
                records,
            })
            .collect(),
    };

    let manifest_path = out_dir.join(MANIFEST_FILE);
    let manifest_json =
        serde_json::to_vec_pretty(&manifest).context("failed to serialize table manifest")?;
    fs::write(&manifest_path, manifest_json)
        .with_context(|| format!("failed to write manifest file {}", manifest_path.display()))?;

    Ok(manifest)
}

/// Recomputes the digest and record count of every table listed in the
/// manifest. Mismatches are reported, not raised; only unreadable input is an
/// error.
///
/// # Errors
/// Returns an error when the manifest is missing, malformed, has an unsupported
/// format version or lists a file twice, or when a listed table cannot be read.
pub fn verify_manifest(out_dir: &Path) -> Result<ManifestVerification> {
    let manifest = read_manifest(&out_dir.join(MANIFEST_FILE))?;
    if manifest.format_version <= 0 || manifest.format_version > EXPORT_FORMAT_VERSION {
        return Err(anyhow!(
            "unsupported table format version {}; supported range is 1..={}",
            manifest.format_version,
            EXPORT_FORMAT_VERSION
        ));
    }

    let mut by_path: BTreeMap<&str, &TableFileDigest> = BTreeMap::new();
    for file in &manifest.files {
        if by_path.insert(file.path.as_str(), file).is_some() {
            return Err(anyhow!("manifest contains duplicate file entry: {}", file.path));
        }
    }

    let missing_entries: Vec<String> = TABLE_FILES
        .iter()
        .filter(|required| !by_path.contains_key(**required))
        .map(|required| (*required).to_string())
        .collect();

    let mut files = Vec::with_capacity(manifest.files.len());
    for expected in &manifest.files {
        let file_path = out_dir.join(&expected.path);
        let (actual_sha256, actual_records) = if file_path.exists() {
            let (sha256, records) = ndjson_digest_and_records(&file_path)?;
            (Some(sha256), Some(records))
        } else {
            (None, None)
        };
        let ok = actual_sha256.as_deref() == Some(expected.sha256.as_str())
            && actual_records == Some(expected.records);
        files.push(FileVerification {
            path: expected.path.clone(),
            expected_sha256: expected.sha256.clone(),
            actual_sha256,
            expected_records: expected.records,
            actual_records,
            ok,
        });
    }

    let ok = missing_entries.is_empty() && files.iter().all(|file| file.ok);
    Ok(ManifestVerification { format_version: manifest.format_version, files, missing_entries, ok })
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .context("failed to format RFC3339 timestamp")
}

fn write_ndjson_file<T: Serialize>(path: &Path, values: &[T]) -> Result<(String, usize)> {
    let file = File::create(path)
        .with_context(|| format!("failed to create table file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let mut hasher = Sha256::new();

    for value in values {
        let line = serde_json::to_string(value).context("failed to serialize NDJSON row")?;
        writer
            .write_all(line.as_bytes())
            .with_context(|| format!("failed to write table file {}", path.display()))?;
        writer
            .write_all(b"\n")
            .with_context(|| format!("failed to write table file {}", path.display()))?;
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }

    writer.flush().with_context(|| format!("failed to flush table file {}", path.display()))?;

    Ok((format!("{:x}", hasher.finalize()), values.len()))
}

fn read_ndjson_file<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open NDJSON file {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut values = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| {
            format!("failed to read line {} from {}", index + 1, path.display())
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value = serde_json::from_str(trimmed).with_context(|| {
            format!("failed to parse NDJSON row {} from {}", index + 1, path.display())
        })?;
        values.push(value);
    }

    Ok(values)
}

fn read_manifest(path: &Path) -> Result<TableManifest> {
    let bytes = fs::read(path)
        .with_context(|| format!("failed to read manifest file {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to parse manifest JSON {}", path.display()))
}

fn ndjson_digest_and_records(path: &Path) -> Result<(String, usize)> {
    let file = File::open(path)
        .with_context(|| format!("failed to open NDJSON file {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut records = 0_usize;

    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| {
            format!("failed to read line {} from {}", index + 1, path.display())
        })?;
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
        if !line.trim().is_empty() {
            records += 1;
        }
    }

    Ok((format!("{:x}", hasher.finalize()), records))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use soil_carbon_core::{reconcile, PipelineConfig};

    use super::*;

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|err| panic!("clock should be >= UNIX_EPOCH: {err}"))
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("{prefix}-{now}"));
        fs::create_dir_all(&dir)
            .unwrap_or_else(|err| panic!("failed to create temp dir {}: {err}", dir.display()));
        dir
    }

    const INPUT: &str = r#"{"source": "Calvert", "pedon_id": 12, "lat": 51.6, "lon": -128.1, "depth2": 0, "depth1": 15, "depth": 15, "bulk_density": 0.3, "cconc": 30, "bd_method": "Measured"}

{"source": "Calvert", "pedon_id": 12.0, "depth2": 15, "depth1": 40, "depth": 25, "bulk_density": 1.1, "cconc": 2.5, "cf": 20}
{"source": "Calvert", "pedon_id": 13, "total_c_1m": 88.1, "depth2": 0, "depth1": 10, "depth": 10, "bulk_density": 0.2, "cconc": 40}
"#;

    fn reconciled(dir: &Path) -> ReconciledTables {
        let input = dir.join("input.ndjson");
        fs::write(&input, INPUT).unwrap_or_else(|err| panic!("failed to write input: {err}"));
        let records = read_records(&input).unwrap_or_else(|err| panic!("read failed: {err:#}"));
        assert_eq!(records.len(), 3);
        reconcile(records, &PipelineConfig::default())
            .unwrap_or_else(|err| panic!("reconcile failed: {err}"))
            .tables
    }

    #[test]
    fn written_tables_verify_and_round_trip_the_master_table() {
        let dir = unique_temp_dir("soil-carbon-export");
        let tables = reconciled(&dir);
        let out = dir.join("out");

        let manifest =
            write_tables(&out, &tables).unwrap_or_else(|err| panic!("write failed: {err:#}"));
        assert_eq!(manifest.files.len(), 4);
        assert_eq!(manifest.files[0].records, 3);
        assert_eq!(manifest.files[1].records, 2);

        let verification =
            verify_manifest(&out).unwrap_or_else(|err| panic!("verify failed: {err:#}"));
        assert!(verification.ok, "verification should pass: {verification:?}");

        let master =
            read_master_table(&out).unwrap_or_else(|err| panic!("read master failed: {err:#}"));
        assert_eq!(master.len(), tables.master.len());
        for (read, written) in master.iter().zip(&tables.master) {
            assert_eq!(read.id, written.id);
            assert_eq!(read.pedon_start, written.pedon_start);
            assert_eq!(read.cf_method, written.cf_method);
            assert_eq!(read.total_c, written.total_c);
        }
        assert_eq!(master[0].pedon_id, "12");
        assert_eq!(master[1].pedon_id, "12");

        fs::remove_dir_all(&dir).unwrap_or_else(|err| panic!("cleanup failed: {err}"));
    }

    #[test]
    fn tampered_table_fails_verification() {
        let dir = unique_temp_dir("soil-carbon-export-tamper");
        let tables = reconciled(&dir);
        let out = dir.join("out");
        write_tables(&out, &tables).unwrap_or_else(|err| panic!("write failed: {err:#}"));

        let summary_path = out.join(SUMMARY_FILE);
        let mut body = fs::read_to_string(&summary_path)
            .unwrap_or_else(|err| panic!("failed to read summary: {err}"));
        body.push_str("{}\n");
        fs::write(&summary_path, body).unwrap_or_else(|err| panic!("failed to tamper: {err}"));
        fs::remove_file(out.join(PEDON_FILE))
            .unwrap_or_else(|err| panic!("failed to remove pedon table: {err}"));

        let verification =
            verify_manifest(&out).unwrap_or_else(|err| panic!("verify failed: {err:#}"));
        assert!(!verification.ok);
        let failed: Vec<&str> = verification
            .files
            .iter()
            .filter(|file| !file.ok)
            .map(|file| file.path.as_str())
            .collect();
        assert_eq!(failed, vec![PEDON_FILE, SUMMARY_FILE]);
        let summary = &verification.files[3];
        assert_eq!(summary.actual_records, Some(4));

        fs::remove_dir_all(&dir).unwrap_or_else(|err| panic!("cleanup failed: {err}"));
    }

    #[test]
    fn malformed_input_names_the_line() {
        let dir = unique_temp_dir("soil-carbon-export-malformed");
        let input = dir.join("input.ndjson");
        fs::write(&input, "{\"source\": \"A\"}\n{\"bd_method\": \"guessed\"}\n")
            .unwrap_or_else(|err| panic!("failed to write input: {err}"));

        let err = read_records(&input).err().unwrap_or_else(|| panic!("read should fail"));
        assert!(format!("{err:#}").contains("row 2"), "unexpected error: {err:#}");

        fs::remove_dir_all(&dir).unwrap_or_else(|err| panic!("cleanup failed: {err}"));
    }
}

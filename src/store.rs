use crate::{COLUMNS, MeasurementRecord};
use anyhow::{Context, bail};
use log::{debug, info};
use std::{
    fs::Permissions,
    io::ErrorKind,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

pub const DEFAULT_DATASET_PATH: &str = "global_dataframe_search.csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Path to the csv dataset shared by all runs
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DATASET_PATH),
        }
    }
}

/// Append-only csv dataset of measurement records.
///
/// Every append loads the whole dataset and rewrites it through a temporary
/// file renamed over the original, so existing rows survive a failed write.
/// Only one writer may use a dataset at a time.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            path: config.path.clone(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All rows in insertion order, empty if the dataset does not exist yet
    pub fn load(&self) -> anyhow::Result<Vec<MeasurementRecord>> {
        if !self.exists()? {
            return Ok(vec![]);
        }
        self.read_records()
    }

    /// Append one row and return the number of rows now in the dataset
    pub fn append(&self, record: &MeasurementRecord) -> anyhow::Result<usize> {
        let mut records = if self.exists()? {
            self.read_records()?
        } else {
            info!("Creating dataset {}", self.path.display());
            vec![]
        };
        records.push(*record);
        self.write_records(&records)?;
        info!(
            "Appended row {} to dataset {}",
            records.len(),
            self.path.display()
        );
        Ok(records.len())
    }

    fn exists(&self) -> anyhow::Result<bool> {
        self.path
            .try_exists()
            .with_context(|| format!("Failed to access dataset {}", self.path.display()))
    }

    fn read_records(&self) -> anyhow::Result<Vec<MeasurementRecord>> {
        let mut reader = csv::Reader::from_path(&self.path)
            .with_context(|| format!("Failed to open dataset {}", self.path.display()))?;

        let headers = reader
            .headers()
            .with_context(|| format!("Failed to read header of {}", self.path.display()))?;
        if !headers.iter().eq(COLUMNS.iter().copied()) {
            bail!(
                "Dataset {} has columns [{}], expected [{}]",
                self.path.display(),
                headers.iter().collect::<Vec<_>>().join(","),
                COLUMNS.join(",")
            );
        }

        let mut records = vec![];
        for (index, row) in reader.deserialize().enumerate() {
            let record: MeasurementRecord = row.with_context(|| {
                format!("Failed to parse row {} of {}", index + 1, self.path.display())
            })?;
            records.push(record);
        }
        debug!("Loaded {} rows from {}", records.len(), self.path.display());
        Ok(records)
    }

    /// The file actually holding the rows: symlinks are followed so the
    /// rename replaces their target, not the link
    fn target(&self) -> anyhow::Result<PathBuf> {
        match std::fs::canonicalize(&self.path) {
            Ok(path) => Ok(path),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(self.path.clone()),
            Err(err) => Err(err)
                .with_context(|| format!("Failed to resolve dataset {}", self.path.display())),
        }
    }

    fn write_records(&self, records: &[MeasurementRecord]) -> anyhow::Result<()> {
        let target = self.target()?;
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        // same mode as a plain File::create, umask applies
        let mut file = tempfile::Builder::new()
            .permissions(Permissions::from_mode(0o666))
            .tempfile_in(dir)
            .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;

        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(file.as_file_mut());
            writer.write_record(COLUMNS)?;
            for record in records {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }
        file.as_file().sync_all()?;

        // keep the permissions of the dataset being replaced
        if let Ok(metadata) = std::fs::metadata(&target) {
            file.as_file().set_permissions(metadata.permissions())?;
        }

        file.persist(&target)
            .with_context(|| format!("Failed to write dataset {}", target.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProblemSize;

    fn record(m: u64, ai_llc: f64) -> MeasurementRecord {
        MeasurementRecord {
            m,
            k: m + 1,
            n: m + 2,
            fp_operations: m * 1000,
            cache_access_bytes: 6400,
            dram_access_bytes: 64,
            llc_access_bytes: 0,
            ai_dram: m as f64 * 1000.0 / 64.0,
            ai_llc,
            ai_cache: m as f64 * 1000.0 / 6400.0,
            time: 0.001 * m as f64,
            achieved_flops: 1e6,
        }
    }

    fn store_in(dir: &Path) -> RecordStore {
        RecordStore::new(&StoreConfig {
            path: dir.join("dataset.csv"),
        })
    }

    fn assert_same(left: &MeasurementRecord, right: &MeasurementRecord) {
        assert_eq!(left.problem_size(), right.problem_size());
        assert_eq!(left.fp_operations, right.fp_operations);
        assert_eq!(left.cache_access_bytes, right.cache_access_bytes);
        assert_eq!(left.dram_access_bytes, right.dram_access_bytes);
        assert_eq!(left.llc_access_bytes, right.llc_access_bytes);
        for (l, r) in [
            (left.ai_dram, right.ai_dram),
            (left.ai_llc, right.ai_llc),
            (left.ai_cache, right.ai_cache),
            (left.time, right.time),
            (left.achieved_flops, right.achieved_flops),
        ] {
            if l.is_infinite() {
                assert_eq!(l, r);
            } else {
                assert!((l - r).abs() <= 1e-9 * l.abs().max(1.0), "{} != {}", l, r);
            }
        }
    }

    #[test]
    fn test_create() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(store.load().unwrap().is_empty());

        assert_eq!(store.append(&record(1, 2.5)).unwrap(), 1);
        let content = std::fs::read_to_string(store.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], COLUMNS.join(","));
    }

    #[test]
    fn test_sequential_appends() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let records: Vec<MeasurementRecord> =
            (1..=5).map(|i| record(i, f64::INFINITY)).collect();
        for (i, r) in records.iter().enumerate() {
            assert_eq!(store.append(r).unwrap(), i + 1);
        }

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), records.len());
        for (left, right) in records.iter().zip(loaded.iter()) {
            assert_same(left, right);
        }

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(content.lines().next().unwrap(), COLUMNS.join(","));
        assert_eq!(
            content.lines().filter(|line| line.starts_with("M,")).count(),
            1
        );
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let written = MeasurementRecord {
            ai_dram: 1.0 / 3.0,
            time: 0.000123456789,
            achieved_flops: 8.1234567e9,
            ..record(7, 0.003125)
        };
        store.append(&record(1, 1.0)).unwrap();
        store.append(&written).unwrap();
        let loaded = store.load().unwrap();
        assert_same(&loaded[1], &written);
    }

    #[test]
    fn test_existing_dataset() {
        // dataset as left behind by an earlier tool version
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        std::fs::write(
            store.path(),
            "M,K,N,total_fp_ops,total_cache_access_bytes,dram_access_bytes,llc_access_bytes,ai_dram_fp,ai_llc_fp,ai_cache_fp,time,actually_ops\n\
             10,10,10,2000,64000,0,640,inf,3.125,0.03125,0.0005,4000000.0\n",
        )
        .unwrap();

        let size = ProblemSize { m: 20, k: 20, n: 20 };
        let new = MeasurementRecord {
            m: size.m,
            k: size.k,
            n: size.n,
            ..record(20, 1.5)
        };
        assert_eq!(store.append(&new).unwrap(), 2);

        let loaded = store.load().unwrap();
        assert_eq!(loaded[0].problem_size(), ProblemSize { m: 10, k: 10, n: 10 });
        assert_eq!(loaded[0].ai_dram, f64::INFINITY);
        assert_eq!(loaded[0].achieved_flops, 4e6);
        assert_same(&loaded[1], &new);
    }

    #[test]
    fn test_mismatched_header() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let content = "M,N,K,total_fp_ops\n1,2,3,4\n";
        std::fs::write(store.path(), content).unwrap();

        assert!(store.append(&record(1, 1.0)).is_err());
        assert!(store.load().is_err());
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), content);
    }

    #[test]
    fn test_corrupted_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.append(&record(1, 1.0)).unwrap();
        let mut content = std::fs::read_to_string(store.path()).unwrap();
        content.push_str("garbage,row\n");
        std::fs::write(store.path(), &content).unwrap();

        assert!(store.append(&record(2, 1.0)).is_err());
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), content);
    }

    #[test]
    fn test_new_dataset_mode() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.append(&record(1, 1.0)).unwrap();

        let plain = dir.path().join("plain.csv");
        std::fs::write(&plain, "").unwrap();
        let mode = |path: &Path| std::fs::metadata(path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(store.path()), mode(&plain));

        std::fs::set_permissions(store.path(), Permissions::from_mode(0o640)).unwrap();
        store.append(&record(2, 1.0)).unwrap();
        assert_eq!(mode(store.path()), 0o640);
    }

    #[test]
    fn test_symlinked_dataset() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("data")).unwrap();
        let real = RecordStore::new(&StoreConfig {
            path: dir.path().join("data").join("dataset.csv"),
        });
        real.append(&record(1, 1.0)).unwrap();

        let link = dir.path().join("latest.csv");
        std::os::unix::fs::symlink(real.path(), &link).unwrap();
        let linked = RecordStore::new(&StoreConfig { path: link.clone() });
        assert_eq!(linked.append(&record(2, 1.0)).unwrap(), 2);

        assert!(std::fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(real.load().unwrap().len(), 2);
    }

    #[test]
    fn test_unreadable_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        std::fs::create_dir(store.path()).unwrap();
        assert!(store.append(&record(1, 1.0)).is_err());
        assert!(store.path().is_dir());
    }
}

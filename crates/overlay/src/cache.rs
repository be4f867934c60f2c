//! On-disk cache of derived rasters
//!
//! An entry is a float64 GeoTIFF plus a JSON manifest, both named
//! `<dem stem>.<algorithm>.<digest>` inside the cache directory. The digest
//! is a CRC32 of the source path, the algorithm and its parameters. The
//! manifest pins the source length and modification time as they were when
//! the key was built, before the DEM was read, so editing or touching the DEM
//! at any later point turns the entry stale.
//!
//! Writes go to a temporary file that is atomically renamed into place,
//! raster first and manifest last. The manifest also carries a CRC32 of the
//! raster bytes, so a manifest paired with another writer's raster is
//! rejected on load.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use terrover_core::io::{read_geotiff_from_buffer, write_geotiff_to_buffer, GeoTiffOptions};
use terrover_core::Raster;
use tracing::{debug, info, warn};

use crate::error::{OverlayError, Result};

/// Identity of one derived raster.
#[derive(Debug, Clone)]
pub struct CacheKey {
    source: PathBuf,
    algorithm: String,
    params: serde_json::Value,
    digest: u32,
    stamp: SourceStamp,
}

impl CacheKey {
    /// Build the key for `algorithm` with `params` over `source`.
    ///
    /// The source path is canonicalized so different spellings of the same
    /// file share entries. The source's length and mtime are captured here;
    /// build the key before reading the source so an entry is never stamped
    /// newer than the bytes it was derived from.
    pub fn new(source: &Path, algorithm: &str, params: serde_json::Value) -> Result<Self> {
        let source = source
            .canonicalize()
            .map_err(|_| OverlayError::RasterNotFound(source.to_path_buf()))?;

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(source.to_string_lossy().as_bytes());
        hasher.update(&[0]);
        hasher.update(algorithm.as_bytes());
        hasher.update(&[0]);
        hasher.update(params.to_string().as_bytes());
        let stamp = SourceStamp::read(&source)?;

        Ok(Self {
            source,
            algorithm: algorithm.to_string(),
            params,
            digest: hasher.finalize(),
            stamp,
        })
    }

    pub fn digest(&self) -> u32 {
        self.digest
    }

    fn stem(&self) -> String {
        self.source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "raster".to_string())
    }

    fn file_name(&self, ext: &str) -> String {
        format!("{}.{}.{:08x}.{}", self.stem(), self.algorithm, self.digest, ext)
    }
}

/// What the cache remembers about an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Manifest {
    source: PathBuf,
    source_len: u64,
    source_mtime_ns: u64,
    algorithm: String,
    params: serde_json::Value,
    rows: usize,
    cols: usize,
    raster_crc32: u32,
}

/// Size and modification time of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SourceStamp {
    len: u64,
    mtime_ns: u64,
}

impl SourceStamp {
    fn read(path: &Path) -> Result<Self> {
        let meta = fs::metadata(path).map_err(|_| OverlayError::RasterNotFound(path.to_path_buf()))?;
        let mtime_ns = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX));
        Ok(Self {
            len: meta.len(),
            mtime_ns,
        })
    }
}

/// Directory-backed cache of derived rasters.
#[derive(Debug, Clone)]
pub struct ResultCache {
    dir: PathBuf,
}

impl ResultCache {
    /// Open (creating if needed) a cache rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| OverlayError::write_failure(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the cached raster for `key`.
    pub fn raster_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name("tif"))
    }

    fn manifest_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name("json"))
    }

    /// Fetch a fresh entry whose grid has the shape of `like`.
    ///
    /// Stale and missing entries are misses. Unreadable ones are logged and
    /// also treated as misses.
    pub fn load(&self, key: &CacheKey, like: &Raster<f64>) -> Option<Raster<f64>> {
        match self.try_load(key, like) {
            Ok(hit) => hit,
            Err(err) => {
                warn!(error = %err, "ignoring cache entry");
                None
            }
        }
    }

    fn try_load(&self, key: &CacheKey, like: &Raster<f64>) -> Result<Option<Raster<f64>>> {
        let manifest_path = self.manifest_path(key);
        let text = match fs::read_to_string(&manifest_path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(OverlayError::cache_corrupt(&manifest_path, e)),
        };
        let manifest: Manifest = serde_json::from_str(&text)
            .map_err(|e| OverlayError::cache_corrupt(&manifest_path, e))?;

        if manifest.source != key.source
            || manifest.algorithm != key.algorithm
            || manifest.params != key.params
        {
            debug!(path = %manifest_path.display(), "cache digest collision, treating as miss");
            return Ok(None);
        }

        let stamp = SourceStamp::read(&key.source)?;
        if manifest.source_len != stamp.len || manifest.source_mtime_ns != stamp.mtime_ns {
            debug!(path = %manifest_path.display(), "cache entry is stale");
            return Ok(None);
        }

        let raster_path = self.raster_path(key);
        let bytes = fs::read(&raster_path).map_err(|e| OverlayError::cache_corrupt(&raster_path, e))?;
        let crc = crc32fast::hash(&bytes);
        if crc != manifest.raster_crc32 {
            return Err(OverlayError::cache_corrupt(
                &raster_path,
                format!(
                    "raster checksum {:08x} does not match manifest {:08x}",
                    crc, manifest.raster_crc32
                ),
            ));
        }
        let mut cached: Raster<f64> = read_geotiff_from_buffer(&bytes, None)
            .map_err(|e| OverlayError::cache_corrupt(&raster_path, e))?;

        if cached.shape() != (manifest.rows, manifest.cols) || cached.shape() != like.shape() {
            return Err(OverlayError::cache_corrupt(
                &raster_path,
                format!(
                    "cached grid is {:?}, manifest says {:?}, source is {:?}",
                    cached.shape(),
                    (manifest.rows, manifest.cols),
                    like.shape()
                ),
            ));
        }

        cached.set_transform(*like.transform());
        cached.set_nodata(Some(f64::NAN));
        info!(path = %raster_path.display(), "cache hit");
        Ok(Some(cached))
    }

    /// Persist `raster` under `key`, stamped with the source state captured
    /// when the key was built.
    pub fn store(&self, key: &CacheKey, raster: &Raster<f64>) -> Result<()> {
        let stamp = key.stamp;
        let raster_path = self.raster_path(key);
        let manifest_path = self.manifest_path(key);

        let bytes = write_geotiff_to_buffer(raster, Some(GeoTiffOptions::lossless()))
            .map_err(|e| OverlayError::write_failure(&raster_path, e))?;
        self.publish(&raster_path, &bytes)?;

        let (rows, cols) = raster.shape();
        let manifest = Manifest {
            source: key.source.clone(),
            source_len: stamp.len,
            source_mtime_ns: stamp.mtime_ns,
            algorithm: key.algorithm.clone(),
            params: key.params.clone(),
            rows,
            cols,
            raster_crc32: crc32fast::hash(&bytes),
        };
        let json = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| OverlayError::write_failure(&manifest_path, e))?;
        self.publish(&manifest_path, &json)?;

        debug!(path = %raster_path.display(), "cache entry stored");
        Ok(())
    }

    fn publish(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let mut tmp =
            NamedTempFile::new_in(&self.dir).map_err(|e| OverlayError::write_failure(path, e))?;
        tmp.write_all(bytes)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| OverlayError::write_failure(path, e))?;
        tmp.persist(path)
            .map_err(|e| OverlayError::write_failure(path, e.error))?;
        Ok(())
    }

    /// Return the cached grid for `key`, or compute, store and return it.
    ///
    /// A failed store is logged; the computed grid is still returned.
    pub fn get_or_compute<F>(&self, key: &CacheKey, like: &Raster<f64>, compute: F) -> Result<Raster<f64>>
    where
        F: FnOnce() -> Result<Raster<f64>>,
    {
        if let Some(hit) = self.load(key, like) {
            return Ok(hit);
        }

        let raster = compute()?;
        if let Err(err) = self.store(key, &raster) {
            warn!(error = %err, "could not store cache entry");
        }
        Ok(raster)
    }

    /// Remove every entry derived from `source`. Returns how many went.
    pub fn invalidate(&self, source: &Path) -> Result<usize> {
        let source = match source.canonicalize() {
            Ok(p) => p,
            Err(_) => return Ok(0),
        };

        let entries = fs::read_dir(&self.dir).map_err(|e| OverlayError::write_failure(&self.dir, e))?;
        let mut removed = 0;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let belongs = fs::read_to_string(&path)
                .ok()
                .and_then(|text| serde_json::from_str::<Manifest>(&text).ok())
                .map_or(false, |m| m.source == source);
            if !belongs {
                continue;
            }

            // Manifest first, so a concurrent reader sees a miss, not a dangling entry
            fs::remove_file(&path).map_err(|e| OverlayError::write_failure(&path, e))?;
            let raster = path.with_extension("tif");
            if raster.exists() {
                fs::remove_file(&raster).map_err(|e| OverlayError::write_failure(&raster, e))?;
            }
            removed += 1;
        }

        if removed > 0 {
            info!(source = %source.display(), removed, "cache entries invalidated");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source_file(dir: &Path) -> PathBuf {
        let path = dir.join("dem.tif");
        fs::write(&path, b"source bytes").unwrap();
        path
    }

    fn grid() -> Raster<f64> {
        Raster::from_vec(vec![1.0, 0.1 + 0.2, f64::NAN, 1.0 / 3.0], 2, 2).unwrap()
    }

    #[test]
    fn store_then_load_is_bit_identical() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_file(dir.path());
        let cache = ResultCache::new(dir.path().join("cache")).unwrap();
        let key = CacheKey::new(&source, "slope", json!({"z_factor": 1.0})).unwrap();

        let original = grid();
        cache.store(&key, &original).unwrap();
        let loaded = cache.load(&key, &original).unwrap();

        for (a, b) in original.data().iter().zip(loaded.data().iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn key_depends_on_params() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_file(dir.path());
        let a = CacheKey::new(&source, "slope", json!({"z_factor": 1.0})).unwrap();
        let b = CacheKey::new(&source, "slope", json!({"z_factor": 2.0})).unwrap();
        let c = CacheKey::new(&source, "flow_accumulation", json!({"z_factor": 1.0})).unwrap();

        assert_ne!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
    }

    #[test]
    fn modified_source_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_file(dir.path());
        let cache = ResultCache::new(dir.path().join("cache")).unwrap();
        let key = CacheKey::new(&source, "slope", json!({})).unwrap();

        cache.store(&key, &grid()).unwrap();
        fs::write(&source, b"different and longer source bytes").unwrap();

        assert!(cache.load(&key, &grid()).is_none());
    }

    #[test]
    fn corrupt_manifest_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_file(dir.path());
        let cache = ResultCache::new(dir.path().join("cache")).unwrap();
        let key = CacheKey::new(&source, "slope", json!({})).unwrap();

        cache.store(&key, &grid()).unwrap();
        fs::write(cache.manifest_path(&key), b"{ not json").unwrap();

        assert!(matches!(
            cache.try_load(&key, &grid()),
            Err(OverlayError::CacheCorrupt { .. })
        ));
        assert!(cache.load(&key, &grid()).is_none());
    }

    #[test]
    fn shape_mismatch_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_file(dir.path());
        let cache = ResultCache::new(dir.path().join("cache")).unwrap();
        let key = CacheKey::new(&source, "slope", json!({})).unwrap();

        cache.store(&key, &grid()).unwrap();
        let other: Raster<f64> = Raster::new(3, 3);

        assert!(matches!(
            cache.try_load(&key, &other),
            Err(OverlayError::CacheCorrupt { .. })
        ));
    }

    #[test]
    fn get_or_compute_computes_once() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_file(dir.path());
        let cache = ResultCache::new(dir.path().join("cache")).unwrap();
        let key = CacheKey::new(&source, "slope", json!({})).unwrap();
        let like = grid();

        let mut calls = 0;
        cache
            .get_or_compute(&key, &like, || {
                calls += 1;
                Ok(grid())
            })
            .unwrap();
        cache
            .get_or_compute(&key, &like, || {
                calls += 1;
                Ok(grid())
            })
            .unwrap();

        assert_eq!(calls, 1);
    }

    #[test]
    fn invalidate_removes_source_entries() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_file(dir.path());
        let cache = ResultCache::new(dir.path().join("cache")).unwrap();

        for algorithm in ["slope", "flow_accumulation"] {
            let key = CacheKey::new(&source, algorithm, json!({})).unwrap();
            cache.store(&key, &grid()).unwrap();
        }

        assert_eq!(cache.invalidate(&source).unwrap(), 2);
        assert_eq!(fs::read_dir(cache.dir()).unwrap().count(), 0);
    }

    #[test]
    fn source_edited_during_compute_is_not_served() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_file(dir.path());
        let cache = ResultCache::new(dir.path().join("cache")).unwrap();
        let key = CacheKey::new(&source, "slope", json!({})).unwrap();

        cache
            .get_or_compute(&key, &grid(), || {
                fs::write(&source, b"source rewritten while deriving").unwrap();
                Ok(grid())
            })
            .unwrap();

        let fresh_key = CacheKey::new(&source, "slope", json!({})).unwrap();
        assert!(cache.load(&fresh_key, &grid()).is_none());
    }

    #[test]
    fn raster_from_another_writer_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_file(dir.path());
        let cache = ResultCache::new(dir.path().join("cache")).unwrap();
        let key = CacheKey::new(&source, "slope", json!({})).unwrap();

        cache.store(&key, &grid()).unwrap();
        let manifest = fs::read(cache.manifest_path(&key)).unwrap();

        let other = Raster::from_vec(vec![9.0, 9.0, 9.0, 9.0], 2, 2).unwrap();
        cache.store(&key, &other).unwrap();
        // Manifest of the first write paired with the raster of the second
        fs::write(cache.manifest_path(&key), manifest).unwrap();

        assert!(matches!(
            cache.try_load(&key, &grid()),
            Err(OverlayError::CacheCorrupt { .. })
        ));
        assert!(cache.load(&key, &grid()).is_none());
    }
}

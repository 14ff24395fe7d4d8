//! Archive storage: compressed typed-array bundles under the cache root.
//!
//! Layout (bit-exact, shared with every other consumer of the cache):
//!
//! ```text
//! <cache_root>/traveltime_matrices/<mode>/<profile>/<bulk_id>.bin.gz
//! <cache_root>/opportunity_matrices/<mode>/<profile>/<bulk_id>/<category>.bin.gz
//! ```
//!
//! Bundles are bincode payloads in a version-tagged envelope, gzip-written
//! with a fixed compression level and an empty header so identical inputs
//! produce byte-identical files. Writes land in a sibling temp file and are
//! published with an atomic rename.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use h3o::CellIndex;
use log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::Error;
use crate::model::{Mode, OpportunityMatrix, Profile, TraveltimeMatrix};

const ARCHIVE_VERSION: u16 = 1;
const TRAVELTIME_TAG: [u8; 4] = *b"RMTT";
const OPPORTUNITY_TAG: [u8; 4] = *b"RMOP";

/// File extension of archive bundles.
pub const ARCHIVE_EXT: &str = "bin.gz";

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Envelope<T> {
    tag: [u8; 4],
    version: u16,
    payload: T,
}

/// Owns the cache directory layout and the archive wire format.
#[derive(Debug, Clone)]
pub struct MatrixStore {
    cache_root: PathBuf,
}

impl MatrixStore {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
        }
    }

    pub fn traveltime_path(&self, mode: Mode, profile: &Profile, bulk_id: CellIndex) -> PathBuf {
        self.cache_root
            .join("traveltime_matrices")
            .join(mode.as_str())
            .join(profile.as_str())
            .join(format!("{bulk_id}.{ARCHIVE_EXT}"))
    }

    pub fn opportunity_path(
        &self,
        mode: Mode,
        profile: &Profile,
        bulk_id: CellIndex,
        category: &str,
    ) -> PathBuf {
        self.cache_root
            .join("opportunity_matrices")
            .join(mode.as_str())
            .join(profile.as_str())
            .join(bulk_id.to_string())
            .join(format!("{category}.{ARCHIVE_EXT}"))
    }

    pub fn write_traveltime(
        &self,
        mode: Mode,
        profile: &Profile,
        bulk_id: CellIndex,
        matrix: &TraveltimeMatrix,
    ) -> Result<(), Error> {
        matrix.validate()?;
        write_archive(
            &self.traveltime_path(mode, profile, bulk_id),
            TRAVELTIME_TAG,
            matrix,
        )
    }

    /// Loads a traveltime archive; `Ok(None)` when none was published.
    pub fn read_traveltime(
        &self,
        mode: Mode,
        profile: &Profile,
        bulk_id: CellIndex,
    ) -> Result<Option<TraveltimeMatrix>, Error> {
        let path = self.traveltime_path(mode, profile, bulk_id);
        let Some(matrix) = read_archive::<TraveltimeMatrix>(&path, TRAVELTIME_TAG)? else {
            return Ok(None);
        };
        matrix.validate()?;
        Ok(Some(matrix))
    }

    pub fn write_opportunity(
        &self,
        mode: Mode,
        profile: &Profile,
        bulk_id: CellIndex,
        category: &str,
        matrix: &OpportunityMatrix,
    ) -> Result<(), Error> {
        matrix.validate()?;
        write_archive(
            &self.opportunity_path(mode, profile, bulk_id, safe_category(category)?),
            OPPORTUNITY_TAG,
            matrix,
        )
    }

    pub fn read_opportunity(
        &self,
        mode: Mode,
        profile: &Profile,
        bulk_id: CellIndex,
        category: &str,
    ) -> Result<Option<OpportunityMatrix>, Error> {
        let path = self.opportunity_path(mode, profile, bulk_id, safe_category(category)?);
        let Some(matrix) = read_archive::<OpportunityMatrix>(&path, OPPORTUNITY_TAG)? else {
            return Ok(None);
        };
        matrix.validate()?;
        Ok(Some(matrix))
    }
}

/// Categories come from user data and become path components; anything that
/// is not a plain name is rejected before it touches the filesystem.
fn safe_category(category: &str) -> Result<&str, Error> {
    if category.is_empty()
        || !category
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(Error::InvalidData(format!(
            "category `{category}` is not a valid archive name"
        )));
    }
    Ok(category)
}

fn write_archive<T: Serialize>(path: &Path, tag: [u8; 4], payload: &T) -> Result<(), Error> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::InvalidData(format!("archive path `{}` has no parent", path.display())))?;
    fs::create_dir_all(parent)?;

    let temp_path = temp_sibling(path);
    let result = write_temp(&temp_path, tag, payload);
    if result.is_err() {
        // Best effort: never leave a half-written temp behind.
        let _ = fs::remove_file(&temp_path);
        return result;
    }

    fs::rename(&temp_path, path)?;
    debug!("published archive {}", path.display());
    Ok(())
}

fn write_temp<T: Serialize>(temp_path: &Path, tag: [u8; 4], payload: &T) -> Result<(), Error> {
    let file = File::create(temp_path)?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::new(6));
    let envelope = Envelope {
        tag,
        version: ARCHIVE_VERSION,
        payload,
    };
    bincode::serialize_into(&mut encoder, &envelope)
        .map_err(|e| Error::ArchiveIo(std::io::Error::other(e)))?;
    encoder.finish()?;
    Ok(())
}

fn read_archive<T: DeserializeOwned>(path: &Path, tag: [u8; 4]) -> Result<Option<T>, Error> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let decoder = GzDecoder::new(BufReader::new(file));
    let envelope: Envelope<T> = bincode::deserialize_from(decoder)
        .map_err(|e| Error::ArchiveCorrupt(format!("{}: {e}", path.display())))?;

    if envelope.tag != tag || envelope.version != ARCHIVE_VERSION {
        return Err(Error::ArchiveCorrupt(format!(
            "{}: unexpected archive tag or version",
            path.display()
        )));
    }
    Ok(Some(envelope.payload))
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

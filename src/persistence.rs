//! Per-floor JSON document mapping room names to their placement.
//!
//! Document layout, one entry per room:
//!
//! ```json
//! {
//!   "Kitchen": {"translation":[[1,0,0,tx],[0,1,0,ty],[0,0,1,tz],[0,0,0,1]],"R_Y":[[c,0,s,0],[0,1,0,0],[-s,0,c,0],[0,0,0,1]]}
//! }
//! ```
//!
//! Matrices are row-major. Saving merges into the existing document: entries for other
//! rooms, and entries whose record did not change, are written back as the exact text
//! they were read from.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::{to_raw_value, RawValue};

use crate::error::{Error, Result};
use crate::geometry::{matrix_from_rows, matrix_to_rows};
use crate::transform::TransformRecord;

/// Room name to placement, for one floor.
pub type AssociationMatrix = BTreeMap<String, TransformRecord>;

const IDENTITY_ROWS: [[f64; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// On-disk form of one room entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredRecord {
    translation: [[f64; 4]; 4],
    #[serde(rename = "R_Y")]
    rotation_y: [[f64; 4]; 4],
}

impl StoredRecord {
    /// Fails only on shape: not an object, a missing matrix, or a matrix that is not 4×4.
    fn parse(raw: &RawValue) -> std::result::Result<Self, String> {
        serde_json::from_str(raw.get()).map_err(|e| e.to_string())
    }

    fn record(&self) -> TransformRecord {
        TransformRecord::from_matrices(
            &matrix_from_rows(&self.translation),
            &matrix_from_rows(&self.rotation_y),
        )
    }

    fn conforms(&self) -> bool {
        TransformRecord::conforms(
            &matrix_from_rows(&self.translation),
            &matrix_from_rows(&self.rotation_y),
        )
    }

    fn is_identity(&self) -> bool {
        self.translation == IDENTITY_ROWS && self.rotation_y == IDENTITY_ROWS
    }
}

impl From<&TransformRecord> for StoredRecord {
    fn from(record: &TransformRecord) -> Self {
        Self {
            translation: matrix_to_rows(&record.translation_matrix()),
            rotation_y: matrix_to_rows(&record.rotation_matrix()),
        }
    }
}

/// Top-level floor document: entries in file order, each held as its original JSON text.
#[derive(Debug, Default)]
struct Document {
    entries: Vec<(String, Box<RawValue>)>,
}

impl Document {
    fn get(&self, name: &str) -> Option<&RawValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, raw)| raw.as_ref())
    }

    /// Replaces an entry in place, or appends a new one.
    fn insert(&mut self, name: String, raw: Box<RawValue>) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = raw,
            None => self.entries.push((name, raw)),
        }
    }

    fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| n != name);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.entries
            .iter()
            .map(|(name, raw)| (name.as_str(), raw.as_ref()))
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct DocumentVisitor;

        impl<'de> Visitor<'de> for DocumentVisitor {
            type Value = Document;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of room entries")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Document, A::Error> {
                let mut document = Document::default();
                while let Some((name, raw)) = map.next_entry::<String, Box<RawValue>>()? {
                    document.insert(name, raw);
                }
                Ok(document)
            }
        }

        deserializer.deserialize_map(DocumentVisitor)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, raw) in &self.entries {
            map.serialize_entry(name, raw)?;
        }
        map.end()
    }
}

fn read_document(path: &Path) -> Result<Document> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| Error::parse(path, e))
}

/// Existing document, or an empty one if the file does not exist yet.
fn read_document_or_empty(path: &Path) -> Result<Document> {
    match read_document(path) {
        Err(e) if e.is_not_found() => Ok(Document::default()),
        other => other,
    }
}

fn write_document(path: &Path, document: &Document) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let text = serde_json::to_string_pretty(document).map_err(|e| Error::parse(path, e))?;

    // Write beside the target and rename so a failed write never truncates the document.
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = Path::new(&tmp);
    fs::write(tmp, text).map_err(|e| Error::io(tmp, e))?;
    fs::rename(tmp, path).map_err(|e| Error::io(path, e))
}

/// Loads every room entry from a floor document.
///
/// Entries with a missing or mis-shaped matrix are skipped with a warning so one bad room
/// cannot block the rest of the floor. Well-shaped matrices that are not exactly a
/// translation and a unit Y rotation, such as those accumulated in single precision, still
/// load from their offset column and `(cos, sin)` elements. A missing file or invalid
/// JSON is an error.
pub fn load_association_matrix(path: impl AsRef<Path>) -> Result<AssociationMatrix> {
    let path = path.as_ref();
    let document = read_document(path)?;

    let mut matrix = AssociationMatrix::new();
    for (name, raw) in document.iter() {
        match StoredRecord::parse(raw) {
            Ok(stored) => {
                if !stored.conforms() {
                    tracing::warn!(room = %name, path = %path.display(), "room matrices are not a pure translation and Y rotation; loading offset and rotation only");
                }
                matrix.insert(name.to_string(), stored.record());
            }
            Err(reason) => {
                tracing::warn!(room = %name, path = %path.display(), %reason, "skipping malformed room entry");
            }
        }
    }
    Ok(matrix)
}

/// Writes `matrix` into the floor document, merging with what is already there.
///
/// Only the rooms in `matrix` are touched. An entry that already loads as the record is
/// kept byte for byte. The parent directory is created if needed.
pub fn save_association_matrix(path: impl AsRef<Path>, matrix: &AssociationMatrix) -> Result<()> {
    let path = path.as_ref();
    let mut document = read_document_or_empty(path)?;

    let mut updated = 0usize;
    for (name, record) in matrix {
        let unchanged = document
            .get(name)
            .and_then(|raw| StoredRecord::parse(raw).ok())
            .is_some_and(|stored| stored.record() == *record);
        if unchanged {
            continue;
        }

        let raw = to_raw_value(&StoredRecord::from(record)).map_err(|e| Error::parse(path, e))?;
        document.insert(name.clone(), raw);
        updated += 1;
    }

    write_document(path, &document)?;
    tracing::info!(path = %path.display(), updated, total = document.len(), "saved association matrix");
    Ok(())
}

/// Merges a single room's record into the floor document.
pub fn save_room(path: impl AsRef<Path>, name: &str, record: &TransformRecord) -> Result<()> {
    let matrix = AssociationMatrix::from([(name.to_string(), *record)]);
    save_association_matrix(path, &matrix)
}

/// Removes the named rooms from the floor document. Missing names are ignored.
pub fn remove_rooms<S: AsRef<str>>(path: impl AsRef<Path>, names: &[S]) -> Result<()> {
    let path = path.as_ref();
    let mut document = read_document_or_empty(path)?;

    let before = document.len();
    for name in names {
        document.remove(name.as_ref());
    }
    if document.len() == before {
        return Ok(());
    }

    write_document(path, &document)?;
    tracing::info!(path = %path.display(), removed = before - document.len(), "removed rooms from association matrix");
    Ok(())
}

/// True when the document has an entry for `name` whose matrices are not both the
/// identity.
///
/// A missing document means no room on the floor has been positioned yet.
pub fn room_has_position(path: impl AsRef<Path>, name: &str) -> Result<bool> {
    let document = read_document_or_empty(path.as_ref())?;
    Ok(document
        .get(name)
        .and_then(|raw| StoredRecord::parse(raw).ok())
        .is_some_and(|stored| !stored.is_identity()))
}

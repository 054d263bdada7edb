//! Heuristic discovery of embedded files
//!
//! No ground-truth directory exists, so the engine finds candidate headers by
//! fingerprint search, confirms them by trial decompression, and claims every
//! confirmed byte range to keep later passes from double-claiming the same
//! region. The result is a [`Catalog`] of four categorized descriptor lists.

mod cache;
mod engine;
mod fingerprint;

pub use cache::FileCache;
pub use engine::{DiscoveryConfig, DiscoveryEngine};
pub use fingerprint::FingerprintSearcher;

use serde::{Deserialize, Serialize};

use crate::descriptor::{DescriptorRecord, FileDescriptor};

/// The outcome of one discovery run
///
/// Confirmed categories contain only validated entries; anything uncertain
/// lands in `unreferenced_compressed`, whose exact extents are resolved
/// lazily by consumers via the rolling decompressor.
#[derive(Debug, Default)]
pub struct Catalog {
    /// Compressed files referenced by a header in a scanned buffer
    pub referenced_compressed: Vec<FileDescriptor>,
    /// Stored (uncompressed) regions referenced by a header
    pub referenced_raw: Vec<FileDescriptor>,
    /// Sector offsets that validate but have no known header
    pub unreferenced_compressed: Vec<FileDescriptor>,
    /// Form records found via their embedded marker
    pub adgc_forms: Vec<FileDescriptor>,
}

impl Catalog {
    /// Sort every list ascending by disk location
    pub fn sort(&mut self) {
        for list in [
            &mut self.referenced_compressed,
            &mut self.referenced_raw,
            &mut self.unreferenced_compressed,
            &mut self.adgc_forms,
        ] {
            list.sort_by_key(|entry| entry.disk_location);
        }
    }

    /// Total number of cataloged entries
    pub fn len(&self) -> usize {
        self.referenced_compressed.len()
            + self.referenced_raw.len()
            + self.unreferenced_compressed.len()
            + self.adgc_forms.len()
    }

    /// True when no entries were found
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot into the JSON document shape
    pub fn to_document(&self) -> CatalogDocument {
        fn records(list: &[FileDescriptor]) -> Vec<DescriptorRecord> {
            list.iter().map(DescriptorRecord::from).collect()
        }
        CatalogDocument {
            referenced_compressed: records(&self.referenced_compressed),
            referenced_raw: records(&self.referenced_raw),
            unreferenced_compressed: records(&self.unreferenced_compressed),
            adgc_forms: records(&self.adgc_forms),
        }
    }
}

/// Serialized form of a [`Catalog`], and of pre-seeded known-entry lists
///
/// Every array is optional on input so a partial seed document parses.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CatalogDocument {
    /// `GameReferencedCompressedFiles` array
    #[serde(rename = "GameReferencedCompressedFiles", default)]
    pub referenced_compressed: Vec<DescriptorRecord>,
    /// `GameReferencedRawFiles` array
    #[serde(rename = "GameReferencedRawFiles", default)]
    pub referenced_raw: Vec<DescriptorRecord>,
    /// `UnreferencedCompressedFiles` array
    #[serde(rename = "UnreferencedCompressedFiles", default)]
    pub unreferenced_compressed: Vec<DescriptorRecord>,
    /// `AdGCForms` array
    #[serde(rename = "AdGCForms", default)]
    pub adgc_forms: Vec<DescriptorRecord>,
}

impl CatalogDocument {
    /// Rehydrate descriptors from the document
    pub fn into_catalog(self) -> Catalog {
        fn descriptors(list: Vec<DescriptorRecord>) -> Vec<FileDescriptor> {
            list.into_iter().map(FileDescriptor::from).collect()
        }
        Catalog {
            referenced_compressed: descriptors(self.referenced_compressed),
            referenced_raw: descriptors(self.referenced_raw),
            unreferenced_compressed: descriptors(self.unreferenced_compressed),
            adgc_forms: descriptors(self.adgc_forms),
        }
    }
}

//! Entity definitions for the metadata graph.

use uuid::Uuid;

use crate::bundle::ManifestEntry;

/// Marker separating a columnar array store from the path of one of its
/// internal chunks in a manifest file name.
const ARRAY_CHUNK_DELIMITER: &str = ".zarr!";

/// Suffix of the one array-store member that is indexed like a regular file.
const ARRAY_ATTRIBUTES_SUFFIX: &str = ".zattrs";

const SECONDS_PER_YEAR: f64 = 365.0 * 24.0 * 3600.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectContact {
    pub contact_name: Option<String>,
    pub corresponding_contributor: Option<bool>,
    pub email: Option<String>,
    pub institution: Option<String>,
    pub laboratory: Option<String>,
    pub project_role: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectPublication {
    pub publication_title: Option<String>,
    pub publication_url: Option<String>,
}

/// The project a bundle belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub document_id: Uuid,
    pub project_title: Option<String>,
    pub project_short_name: Option<String>,
    pub project_description: Option<String>,
    pub contributors: Vec<ProjectContact>,
    pub publications: Vec<ProjectPublication>,
    pub insdc_project_accessions: Vec<String>,
    pub geo_series_accessions: Vec<String>,
    pub array_express_accessions: Vec<String>,
    pub insdc_study_accessions: Vec<String>,
}

/// Fields every biomaterial carries.
#[derive(Debug, Clone, PartialEq)]
pub struct BiomaterialCore {
    pub document_id: Uuid,
    pub biomaterial_id: Option<String>,
    pub has_input_biomaterial: Option<String>,
}

/// Inclusive age range in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeRange {
    pub min: u64,
    pub max: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DonorOrganism {
    pub core: BiomaterialCore,
    pub sex: Option<String>,
    pub genus_species: Vec<String>,
    pub diseases: Vec<String>,
    pub organism_age: Option<String>,
    pub organism_age_unit: Option<String>,
}

impl DonorOrganism {
    /// The organism age converted to seconds.
    ///
    /// Ages are either a single number or a `min-max` range. Returns `None`
    /// when the age or its unit is absent or not convertible.
    pub fn organism_age_in_seconds(&self) -> Option<AgeRange> {
        let age = self.organism_age.as_deref()?.trim();
        let factor = seconds_per_unit(self.organism_age_unit.as_deref()?)?;

        let (min, max) = match age.split_once('-') {
            Some((lower, upper)) => (parse_age(lower)?, parse_age(upper)?),
            None => {
                let value = parse_age(age)?;
                (value, value)
            }
        };
        if min > max {
            return None;
        }

        Some(AgeRange {
            min: (min * factor).round() as u64,
            max: (max * factor).round() as u64,
        })
    }
}

fn parse_age(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

fn seconds_per_unit(unit: &str) -> Option<f64> {
    let unit = unit.trim().to_lowercase();
    let unit = unit.strip_suffix('s').unwrap_or(&unit);
    let seconds = match unit {
        "second" => 1.0,
        "minute" => 60.0,
        "hour" => 3600.0,
        "day" => 24.0 * 3600.0,
        "week" => 7.0 * 24.0 * 3600.0,
        "month" => SECONDS_PER_YEAR / 12.0,
        "year" => SECONDS_PER_YEAR,
        _ => return None,
    };
    Some(seconds)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpecimenFromOrganism {
    pub core: BiomaterialCore,
    pub organ: Option<String>,
    pub organ_parts: Vec<String>,
    pub diseases: Vec<String>,
    pub storage_method: Option<String>,
    pub preservation_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellSuspension {
    pub core: BiomaterialCore,
    pub estimated_cell_count: Option<i64>,
    pub selected_cell_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellLine {
    pub core: BiomaterialCore,
    pub cell_line_type: Option<String>,
    pub model_organ: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Organoid {
    pub core: BiomaterialCore,
    pub model_organ: Option<String>,
    pub model_organ_part: Option<String>,
}

/// A biomaterial schema without dedicated handling, e.g. an imaged specimen.
#[derive(Debug, Clone, PartialEq)]
pub struct OtherBiomaterial {
    pub core: BiomaterialCore,
    pub schema_name: String,
}

/// Any biomaterial node of the graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Biomaterial {
    DonorOrganism(DonorOrganism),
    Specimen(SpecimenFromOrganism),
    CellSuspension(CellSuspension),
    CellLine(CellLine),
    Organoid(Organoid),
    Other(OtherBiomaterial),
}

impl Biomaterial {
    pub fn core(&self) -> &BiomaterialCore {
        match self {
            Biomaterial::DonorOrganism(b) => &b.core,
            Biomaterial::Specimen(b) => &b.core,
            Biomaterial::CellSuspension(b) => &b.core,
            Biomaterial::CellLine(b) => &b.core,
            Biomaterial::Organoid(b) => &b.core,
            Biomaterial::Other(b) => &b.core,
        }
    }

    pub fn document_id(&self) -> Uuid {
        self.core().document_id
    }

    /// The concrete schema name of this biomaterial.
    pub fn schema_name(&self) -> &str {
        match self {
            Biomaterial::DonorOrganism(_) => "donor_organism",
            Biomaterial::Specimen(_) => "specimen_from_organism",
            Biomaterial::CellSuspension(_) => "cell_suspension",
            Biomaterial::CellLine(_) => "cell_line",
            Biomaterial::Organoid(_) => "organoid",
            Biomaterial::Other(b) => &b.schema_name,
        }
    }

    /// View this biomaterial as a sample if it is one.
    ///
    /// Specimens, cell lines and organoids are samples. They terminate the
    /// upward walk during ancestor-sample resolution.
    pub fn as_sample(&self) -> Option<Sample<'_>> {
        match self {
            Biomaterial::Specimen(s) => Some(Sample::Specimen(s)),
            Biomaterial::CellLine(c) => Some(Sample::CellLine(c)),
            Biomaterial::Organoid(o) => Some(Sample::Organoid(o)),
            Biomaterial::DonorOrganism(_)
            | Biomaterial::CellSuspension(_)
            | Biomaterial::Other(_) => None,
        }
    }
}

/// A borrowed sample-type biomaterial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample<'a> {
    Specimen(&'a SpecimenFromOrganism),
    CellLine(&'a CellLine),
    Organoid(&'a Organoid),
}

impl<'a> Sample<'a> {
    pub fn core(&self) -> &'a BiomaterialCore {
        match self {
            Sample::Specimen(s) => &s.core,
            Sample::CellLine(c) => &c.core,
            Sample::Organoid(o) => &o.core,
        }
    }

    pub fn document_id(&self) -> Uuid {
        self.core().document_id
    }
}

/// The concrete kind of a data file.
#[derive(Debug, Clone, PartialEq)]
pub enum FileKind {
    Sequence {
        read_index: Option<String>,
        lane_index: Option<i64>,
    },
    Supplementary,
    Analysis,
    Image,
    Reference,
}

impl FileKind {
    pub fn schema_name(&self) -> &'static str {
        match self {
            FileKind::Sequence { .. } => "sequence_file",
            FileKind::Supplementary => "supplementary_file",
            FileKind::Analysis => "analysis_file",
            FileKind::Image => "image_file",
            FileKind::Reference => "reference_file",
        }
    }
}

/// A data file together with its manifest entry.
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub document_id: Uuid,
    pub file_format: Option<String>,
    pub kind: FileKind,
    pub manifest_entry: ManifestEntry,
}

impl File {
    /// Whether this file is an internal chunk of a columnar array store.
    ///
    /// Such files are not indexed as files of their own. Only the attributes
    /// member of the store is.
    pub fn is_array_chunk(&self) -> bool {
        let name = &self.manifest_entry.name;
        name.contains(ARRAY_CHUNK_DELIMITER) && !name.ends_with(ARRAY_ATTRIBUTES_SUFFIX)
    }
}

/// A protocol attached to a process.
#[derive(Debug, Clone, PartialEq)]
pub enum Protocol {
    LibraryPreparation {
        document_id: Uuid,
        library_construction_approach: Option<String>,
    },
    Sequencing {
        document_id: Uuid,
        instrument_manufacturer_model: Option<String>,
        paired_end: Option<bool>,
    },
    Analysis {
        document_id: Uuid,
        protocol_id: Option<String>,
    },
    Imaging {
        document_id: Uuid,
        assay_types: Vec<String>,
    },
    /// Dissociation, enrichment, collection and other protocols the index
    /// does not describe.
    Other {
        document_id: Uuid,
        schema_name: String,
    },
}

impl Protocol {
    pub fn document_id(&self) -> Uuid {
        match self {
            Protocol::LibraryPreparation { document_id, .. }
            | Protocol::Sequencing { document_id, .. }
            | Protocol::Analysis { document_id, .. }
            | Protocol::Imaging { document_id, .. }
            | Protocol::Other { document_id, .. } => *document_id,
        }
    }

    /// Whether the index describes protocols of this kind.
    pub fn is_indexed(&self) -> bool {
        !matches!(self, Protocol::Other { .. })
    }
}

/// A process node linking input entities to output entities.
#[derive(Debug, Clone, PartialEq)]
pub struct Process {
    pub document_id: Uuid,
    pub schema_name: String,
    pub protocol_ids: Vec<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn donor(age: Option<&str>, unit: Option<&str>) -> DonorOrganism {
        DonorOrganism {
            core: BiomaterialCore {
                document_id: Uuid::new_v4(),
                biomaterial_id: Some("d1".to_string()),
                has_input_biomaterial: None,
            },
            sex: None,
            genus_species: vec![],
            diseases: vec![],
            organism_age: age.map(str::to_string),
            organism_age_unit: unit.map(str::to_string),
        }
    }

    fn file_named(name: &str) -> File {
        File {
            document_id: Uuid::new_v4(),
            file_format: None,
            kind: FileKind::Supplementary,
            manifest_entry: ManifestEntry {
                name: name.to_string(),
                uuid: Uuid::new_v4(),
                version: "2020-01-01T00:00:00.000Z".to_string(),
                content_type: "application/octet-stream".to_string(),
                size: 1,
                indexed: false,
                sha256: None,
            },
        }
    }

    #[test]
    fn test_age_single_value() {
        let range = donor(Some("2"), Some("day")).organism_age_in_seconds().unwrap();
        assert_eq!(range, AgeRange { min: 172_800, max: 172_800 });
    }

    #[test]
    fn test_age_range_plural_unit() {
        let range = donor(Some("1-2"), Some("years")).organism_age_in_seconds().unwrap();
        assert_eq!(range.min, 31_536_000);
        assert_eq!(range.max, 63_072_000);
    }

    #[test]
    fn test_age_not_convertible() {
        assert!(donor(Some("adult"), Some("year")).organism_age_in_seconds().is_none());
        assert!(donor(Some("40"), Some("decade")).organism_age_in_seconds().is_none());
        assert!(donor(Some("40"), None).organism_age_in_seconds().is_none());
        assert!(donor(None, Some("year")).organism_age_in_seconds().is_none());
        assert!(donor(Some("5-2"), Some("year")).organism_age_in_seconds().is_none());
    }

    #[test]
    fn test_array_chunk_detection() {
        assert!(file_named("matrix.zarr!expression!0.0").is_array_chunk());
        assert!(!file_named("matrix.zarr!.zattrs").is_array_chunk());
        assert!(!file_named("reads_R1.fastq.gz").is_array_chunk());
    }
}

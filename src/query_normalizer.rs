/*!
# Query normalizer
Turns a raw [`AlleleRequest`] into a validated [`MatchPredicate`].

Checks run in a fixed order and the first failure wins:
1. `referenceName`, `referenceBases` and `assemblyId` must be present
2. explicitly requested datasets must exist and share the requested assembly
3. `alternateBases` or `variantType` must be present
4. `start` or at least one of `startMin`, `startMax`, `endMin`, `endMax` must be present
5. every supplied coordinate must be a non-negative integer

A fully specified small variant (no `variantType`, both coordinates, and a literal `alternateBases`)
becomes an exact-identity lookup; everything else becomes a structural predicate.
*/

use itertools::Itertools;
use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::data_types::allele_request::{AlleleRequest, ResponseType};
use crate::data_types::dataset::Dataset;
use crate::data_types::predicate::{AltMatcher, MatchPredicate, PositionBounds};
use crate::data_types::responses::ErrorPayload;
use crate::data_types::variants::SvType;
use crate::identity::{canonical_bases, canonical_chromosome, derive_id};

/// The surfaced error taxonomy; names are stable and machine-testable
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, strum_macros::Display, strum_macros::EnumString)]
pub enum BeaconErrorKind {
    NoMandatoryParams,
    NoSecondaryParams,
    NoPositionParams,
    InvalidCoordinates,
    BuildMismatch,
    UnknownDatasets,
}

impl BeaconErrorKind {
    /// HTTP-style status; every validation failure is a bad request
    pub fn error_code(&self) -> u16 {
        400
    }

    pub fn message(&self) -> &'static str {
        match self {
            BeaconErrorKind::NoMandatoryParams => "Missing one or more mandatory parameters (referenceName, referenceBases, assemblyId)",
            BeaconErrorKind::NoSecondaryParams => "Either a valid alternateBases or variantType parameter is required",
            BeaconErrorKind::NoPositionParams => "Either start or at least one of startMin, startMax, endMin, endMax is required",
            BeaconErrorKind::InvalidCoordinates => "Coordinates must be non-negative integers",
            BeaconErrorKind::BuildMismatch => "Requested genome assembly differs from the assembly of one or more requested datasets",
            BeaconErrorKind::UnknownDatasets => "None of the requested datasets could be found",
        }
    }
}

/// A rejected request, always carrying the request exactly as it was received
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{}: {}", .kind, .kind.message())]
pub struct QueryError {
    pub kind: BeaconErrorKind,
    pub request: Box<AlleleRequest>,
}

impl QueryError {
    pub fn new(kind: BeaconErrorKind, request: &AlleleRequest) -> Self {
        Self {
            kind,
            request: Box::new(request.clone())
        }
    }

    /// The error block of a response
    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            error_code: self.kind.error_code(),
            error_name: self.kind.to_string(),
            error_message: self.kind.message().to_string(),
        }
    }
}

/// Everything the query path needs after validation
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PreparedQuery {
    pub predicate: MatchPredicate,
    pub response_type: ResponseType,
    /// Requested dataset ids in request order, deduplicated; empty means all
    pub requested_dataset_ids: Vec<String>,
}

/// Validates a request and builds its match predicate.
/// # Arguments
/// * `request` - the raw request
/// * `datasets` - dataset metadata keyed by id, used for the dataset and build checks
/// # Errors
/// * one `QueryError` per failed check, in the order documented on the module
pub fn normalize(request: &AlleleRequest, datasets: &BTreeMap<String, Dataset>) -> Result<MatchPredicate, QueryError> {
    let fail = |kind: BeaconErrorKind| QueryError::new(kind, request);

    // 1 - mandatory
    let (reference_name, reference_bases, assembly_id) = match (
        request.reference_name.as_deref(), request.reference_bases.as_deref(), request.assembly_id.as_deref()
    ) {
        (Some(rn), Some(rb), Some(asm)) => (rn, rb, asm.trim()),
        _ => return Err(fail(BeaconErrorKind::NoMandatoryParams))
    };

    // 2 - requested datasets
    if !request.dataset_ids.is_empty() {
        let known: Vec<&Dataset> = request.dataset_ids.iter()
            .filter_map(|id| datasets.get(id))
            .collect();
        if known.is_empty() {
            return Err(fail(BeaconErrorKind::UnknownDatasets));
        }
        let mismatch = known.iter().any(|d| {
            d.assembly_id().is_some_and(|a| !a.is_empty() && a != assembly_id)
        });
        if mismatch {
            return Err(fail(BeaconErrorKind::BuildMismatch));
        }
    }

    // 3 - secondary
    if request.alternate_bases.is_none() && request.variant_type.is_none() {
        return Err(fail(BeaconErrorKind::NoSecondaryParams));
    }
    let variant_type = match request.variant_type.as_deref() {
        Some(raw) => Some(raw.trim().parse::<SvType>().map_err(|_| fail(BeaconErrorKind::NoSecondaryParams))?),
        None => None
    };

    // 4 - position presence
    if request.start.is_none() && !request.has_range_bounds() {
        return Err(fail(BeaconErrorKind::NoPositionParams));
    }

    // 5 - integer parsing
    let parse = |value: &Option<String>| -> Result<Option<u64>, QueryError> {
        match value.as_deref() {
            Some(raw) => raw.trim().parse::<u64>()
                .map(Some)
                .map_err(|_| fail(BeaconErrorKind::InvalidCoordinates)),
            None => Ok(None)
        }
    };
    let start = parse(&request.start)?;
    let end = parse(&request.end)?;
    let start_min = parse(&request.start_min)?;
    let start_max = parse(&request.start_max)?;
    let end_min = parse(&request.end_min)?;
    let end_max = parse(&request.end_max)?;

    let alternate = request.alternate_bases.as_deref()
        .map(|alt| AltMatcher::from_bases(canonical_bases(alt)));

    // exact identity when every identity field is pinned down
    if let (None, Some(start), Some(end), Some(AltMatcher::Literal(alt))) = (variant_type, start, end, alternate.as_ref()) {
        let id = derive_id(reference_name, start, Some(end), reference_bases, alt, assembly_id);
        let predicate = MatchPredicate::ExactId { id };
        debug!("Normalized request to {predicate:?}");
        return Ok(predicate);
    }

    let position = match start {
        Some(start) => PositionBounds::Exact { start, end },
        None => PositionBounds::Range { start_min, start_max, end_min, end_max }
    };
    if position.is_empty_range() {
        debug!("Position bounds {position:?} are out of order, nothing can match");
    }

    let predicate = MatchPredicate::Structural {
        assembly_id: assembly_id.to_string(),
        reference_name: canonical_chromosome(reference_name),
        reference_bases: canonical_bases(reference_bases),
        alternate,
        variant_type,
        mate_name: request.mate_name.as_deref().map(canonical_chromosome),
        position
    };
    debug!("Normalized request to {predicate:?}");
    Ok(predicate)
}

/// Validates a request and collects everything the rest of the query path needs
/// # Errors
/// * see [`normalize`]
pub fn prepare_query(request: &AlleleRequest, datasets: &BTreeMap<String, Dataset>) -> Result<PreparedQuery, QueryError> {
    let predicate = normalize(request, datasets)?;
    let requested_dataset_ids: Vec<String> = request.dataset_ids.iter()
        .unique()
        .cloned()
        .collect();
    Ok(PreparedQuery {
        predicate,
        response_type: request.response_type(),
        requested_dataset_ids
    })
}

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use ndarray::{Array1, Array2, ArrayViewD};

use super::model::{Measurement, MeasurementKind, ReferenceModel};
use crate::error::{CollectionError, MeasurementError, Result};
use crate::measurement::AlignedSeriesMeasurement;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Hands out unique, increasing collection identifiers. Safe to share
/// between threads.
#[derive(Debug, Default)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// Generator used by collections created without an explicit one.
static GLOBAL_IDS: IdGenerator = IdGenerator::new();

// ---------------------------------------------------------------------------
// Tagged – what a collection needs to know about its members
// ---------------------------------------------------------------------------

/// Members expose a variant tag; restriction is a set of allowed tags.
pub trait Tagged {
    type Tag: Ord + Clone + fmt::Debug;

    fn tag(&self) -> Self::Tag;
}

impl Tagged for Measurement {
    type Tag = MeasurementKind;

    fn tag(&self) -> MeasurementKind {
        self.kind()
    }
}

// ---------------------------------------------------------------------------
// ObjectCollection
// ---------------------------------------------------------------------------

/// A named, ordered group of members with an optional membership policy.
///
/// While unrestricted anything is accepted. While restricted only members
/// whose tag is in the allowed set are. Switching the restriction on adopts
/// the tags of the current members; once locked the restriction can no
/// longer be switched.
#[derive(Debug, Clone)]
pub struct ObjectCollection<T: Tagged> {
    name: String,
    id: u64,
    members: Vec<T>,
    restrictive: bool,
    restriction_locked: bool,
    allowed: BTreeSet<T::Tag>,
}

impl<T: Tagged> ObjectCollection<T> {
    /// Unrestricted, empty collection with an id from the process-wide generator.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_ids(name, &GLOBAL_IDS)
    }

    pub fn with_ids(name: impl Into<String>, ids: &IdGenerator) -> Self {
        Self::with_policy(name, std::iter::empty(), false, ids)
    }

    pub fn with_policy(
        name: impl Into<String>,
        allowed: impl IntoIterator<Item = T::Tag>,
        restrictive: bool,
        ids: &IdGenerator,
    ) -> Self {
        Self {
            name: name.into(),
            id: ids.next_id(),
            members: Vec::new(),
            restrictive,
            restriction_locked: false,
            allowed: allowed.into_iter().collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_restrictive(&self) -> bool {
        self.restrictive
    }

    pub fn is_restriction_locked(&self) -> bool {
        self.restriction_locked
    }

    pub fn allowed_tags(&self) -> &BTreeSet<T::Tag> {
        &self.allowed
    }

    pub fn members(&self) -> &[T] {
        &self.members
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.members.iter()
    }

    /// Append `member` unless the policy forbids its tag.
    pub fn add(&mut self, member: T) -> std::result::Result<(), CollectionError> {
        if self.restrictive && !self.allowed.contains(&member.tag()) {
            let tag = format!("{:?}", member.tag());
            log::warn!("collection '{}' rejected a member of kind {tag}", self.name);
            return Err(CollectionError::Rejected {
                collection: self.name.clone(),
                tag,
            });
        }
        self.members.push(member);
        Ok(())
    }

    /// Offer every candidate in turn; returns how many were rejected.
    pub fn extend(&mut self, candidates: impl IntoIterator<Item = T>) -> usize {
        let mut rejected = 0;
        for member in candidates {
            if self.add(member).is_err() {
                rejected += 1;
            }
        }
        rejected
    }

    /// Switch the restriction on or off and return the new state.
    pub fn toggle_restriction(&mut self) -> std::result::Result<bool, CollectionError> {
        if self.restriction_locked {
            log::warn!("restriction of collection '{}' is locked", self.name);
            return Err(CollectionError::RestrictionLocked(self.name.clone()));
        }
        if !self.restrictive {
            let tags: Vec<T::Tag> = self.members.iter().map(|m| m.tag()).collect();
            self.allowed.extend(tags);
        }
        self.restrictive = !self.restrictive;
        Ok(self.restrictive)
    }

    /// Freeze the current restriction state for good.
    pub fn lock_restriction(&mut self) {
        self.restriction_locked = true;
    }

    /// Apply `f` to every member, in order.
    pub fn project<'a, R>(&'a self, f: impl FnMut(&'a T) -> R) -> Vec<R> {
        self.members.iter().map(f).collect()
    }
}

impl<T: Tagged> fmt::Display for ObjectCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} (#{}), {} member(s)", self.name, self.id, self.len())?;
        for (i, member) in self.members.iter().enumerate() {
            writeln!(f, "{i:>4}  {:?}", member.tag())?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SeriesCollection – aligned series only
// ---------------------------------------------------------------------------

/// Collection of [`AlignedSeriesMeasurement`]s, e.g. one filter scanned
/// several times. The restriction to aligned series is locked at creation.
#[derive(Debug, Clone)]
pub struct SeriesCollection {
    inner: ObjectCollection<Measurement>,
}

impl SeriesCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_ids(name, &GLOBAL_IDS)
    }

    pub fn with_ids(name: impl Into<String>, ids: &IdGenerator) -> Self {
        let mut inner = ObjectCollection::<Measurement>::with_policy(
            name,
            [MeasurementKind::AlignedSeries],
            true,
            ids,
        );
        inner.lock_restriction();
        Self { inner }
    }

    pub fn with_members(
        name: impl Into<String>,
        members: impl IntoIterator<Item = AlignedSeriesMeasurement>,
    ) -> Self {
        let mut collection = Self::new(name);
        for member in members {
            collection.push(member);
        }
        collection
    }

    /// Add an aligned series. Cannot be rejected.
    pub fn push(&mut self, series: AlignedSeriesMeasurement) {
        self.inner.members.push(Measurement::AlignedSeries(series));
    }

    /// Offer any measurement; only aligned series are accepted.
    pub fn add(&mut self, member: impl Into<Measurement>) -> std::result::Result<(), CollectionError> {
        self.inner.add(member.into())
    }

    pub fn collection(&self) -> &ObjectCollection<Measurement> {
        &self.inner
    }

    pub fn collection_mut(&mut self) -> &mut ObjectCollection<Measurement> {
        &mut self.inner
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn series(&self) -> impl Iterator<Item = &AlignedSeriesMeasurement> {
        self.inner.iter().filter_map(Measurement::as_aligned)
    }

    /// Apply `f` to every series, in order.
    pub fn project<'a, R>(&'a self, f: impl FnMut(&'a AlignedSeriesMeasurement) -> R) -> Vec<R> {
        self.series().map(f).collect()
    }

    /// Independent-variable arrays; `None` for members built without one.
    pub fn independents(&self) -> Vec<Option<&Array1<f64>>> {
        self.project(|s| s.independent().ok())
    }

    pub fn references(&self) -> Vec<&Array1<f64>> {
        self.project(AlignedSeriesMeasurement::reference)
    }

    pub fn filtered(&self) -> Vec<&Array1<f64>> {
        self.project(AlignedSeriesMeasurement::filtered)
    }

    pub fn transmittances(&self) -> Result<Vec<Array1<f64>>> {
        self.series().map(AlignedSeriesMeasurement::transmittance).collect()
    }

    pub fn rawest_references(&self) -> Vec<ArrayViewD<'_, f64>> {
        self.project(AlignedSeriesMeasurement::rawest_reference)
    }

    pub fn rawest_filtered(&self) -> Vec<ArrayViewD<'_, f64>> {
        self.project(AlignedSeriesMeasurement::rawest_filtered)
    }

    pub fn reference_models(&self) -> Vec<Option<&ReferenceModel>> {
        self.project(|s| s.reference_model().ok())
    }
}

/// Split two-column arrays into a list of first columns and a list of second
/// columns.
pub fn unzip_columns(arrays: &[Array2<f64>]) -> Result<(Vec<Array1<f64>>, Vec<Array1<f64>>)> {
    let mut first = Vec::with_capacity(arrays.len());
    let mut second = Vec::with_capacity(arrays.len());
    for array in arrays {
        if array.ncols() != 2 {
            return Err(MeasurementError::InvalidParameter(format!(
                "expected two columns, got shape {:?}",
                array.shape()
            )));
        }
        first.push(array.column(0).to_owned());
        second.push(array.column(1).to_owned());
    }
    Ok((first, second))
}

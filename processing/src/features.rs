use std::collections::HashMap;

use crate::model::{BeneficiaryRecord, FeatureVector};

/// Ages strictly above this are flagged as anomalous.
pub const MAX_PLAUSIBLE_AGE: u32 = 100;

/// How many records in the evaluation context share the record's identifiers.
/// Counts include the record itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DuplicateCounts {
    pub bank: u64,
    pub mobile: u64,
}

/// Source of duplicate counts for a record.
pub trait DuplicateCountLookup: Send + Sync {
    fn counts_for(&self, record: &BeneficiaryRecord) -> DuplicateCounts;
}

pub fn derive(record: &BeneficiaryRecord, counts: DuplicateCounts) -> FeatureVector {
    FeatureVector {
        bank_duplicate_count: counts.bank,
        mobile_duplicate_count: counts.mobile,
        age_anomaly: u8::from(record.age() > MAX_PLAUSIBLE_AGE),
    }
}

/// Same counts for every record. Used for single checks when no reference
/// data is configured.
#[derive(Debug, Clone, Copy)]
pub struct FixedDuplicateCounts(pub DuplicateCounts);

impl Default for FixedDuplicateCounts {
    fn default() -> Self {
        Self(DuplicateCounts { bank: 1, mobile: 1 })
    }
}

impl DuplicateCountLookup for FixedDuplicateCounts {
    fn counts_for(&self, _record: &BeneficiaryRecord) -> DuplicateCounts {
        self.0
    }
}

/// Occurrences of each bank account and mobile number in a set of records.
#[derive(Debug, Clone, Default)]
pub struct IdentifierCounts {
    bank: HashMap<String, u64>,
    mobile: HashMap<String, u64>,
}

impl IdentifierCounts {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a BeneficiaryRecord>,
    {
        let mut counts = Self::default();
        for record in records {
            counts.add(record);
        }
        counts
    }

    pub fn add(&mut self, record: &BeneficiaryRecord) {
        *self.bank.entry(record.bank_account().to_string()).or_insert(0) += 1;
        *self.mobile.entry(record.mobile().to_string()).or_insert(0) += 1;
    }

    pub fn occurrences(&self, record: &BeneficiaryRecord) -> DuplicateCounts {
        DuplicateCounts {
            bank: self.bank.get(record.bank_account()).copied().unwrap_or(0),
            mobile: self.mobile.get(record.mobile()).copied().unwrap_or(0),
        }
    }

    pub fn len(&self) -> usize {
        self.bank.values().sum::<u64>() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.bank.is_empty()
    }
}

/// Index over the rows of one batch. Every looked-up record is itself one of
/// the indexed rows, so a unique row gets a count of 1.
#[derive(Debug, Clone, Default)]
pub struct BatchDuplicateIndex(IdentifierCounts);

impl BatchDuplicateIndex {
    pub fn build<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a BeneficiaryRecord>,
    {
        Self(IdentifierCounts::from_records(records))
    }
}

impl DuplicateCountLookup for BatchDuplicateIndex {
    fn counts_for(&self, record: &BeneficiaryRecord) -> DuplicateCounts {
        let counts = self.0.occurrences(record);
        DuplicateCounts {
            bank: counts.bank.max(1),
            mobile: counts.mobile.max(1),
        }
    }
}

/// Historical beneficiaries loaded at startup. A candidate is not part of the
/// reference data, so it adds one to whatever is already there.
#[derive(Debug, Clone, Default)]
pub struct ReferenceDuplicateIndex(IdentifierCounts);

impl ReferenceDuplicateIndex {
    pub fn new(counts: IdentifierCounts) -> Self {
        Self(counts)
    }

    pub fn reference_size(&self) -> usize {
        self.0.len()
    }
}

impl DuplicateCountLookup for ReferenceDuplicateIndex {
    fn counts_for(&self, record: &BeneficiaryRecord) -> DuplicateCounts {
        let counts = self.0.occurrences(record);
        DuplicateCounts {
            bank: counts.bank + 1,
            mobile: counts.mobile + 1,
        }
    }
}

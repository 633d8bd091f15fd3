use serde::Serialize;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::records::PrerequisiteRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrerequisiteKey {
    English,
    Internship,
    Community,
    Other,
}

impl PrerequisiteKey {
    pub const REQUIRED: [Self; 3] = [Self::English, Self::Internship, Self::Community];

    /// Parses an explicit kind tag. `other` is never a valid tag.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "english" => Some(Self::English),
            "internship" => Some(Self::Internship),
            "community" => Some(Self::Community),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::English => "english",
            Self::Internship => "internship",
            Self::Community => "community",
            Self::Other => "other",
        }
    }
}

/// Ordered so that `max` picks the most advanced status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrerequisiteStatus {
    Missing,
    Pending,
    Approved,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CanonicalStatuses {
    pub english: Option<PrerequisiteStatus>,
    pub internship: Option<PrerequisiteStatus>,
    pub community: Option<PrerequisiteStatus>,
}

impl CanonicalStatuses {
    pub fn get(&self, key: PrerequisiteKey) -> Option<PrerequisiteStatus> {
        match key {
            PrerequisiteKey::English => self.english,
            PrerequisiteKey::Internship => self.internship,
            PrerequisiteKey::Community => self.community,
            PrerequisiteKey::Other => None,
        }
    }

    fn merge(&mut self, key: PrerequisiteKey, status: PrerequisiteStatus) {
        let slot = match key {
            PrerequisiteKey::English => &mut self.english,
            PrerequisiteKey::Internship => &mut self.internship,
            PrerequisiteKey::Community => &mut self.community,
            PrerequisiteKey::Other => return,
        };
        *slot = Some(slot.map_or(status, |prev| prev.max(status)));
    }

    /// Display-only "2 of 3" count. Never used for gating.
    pub fn approved_count(&self) -> usize {
        PrerequisiteKey::REQUIRED
            .iter()
            .filter(|k| self.get(**k) == Some(PrerequisiteStatus::Approved))
            .count()
    }
}

/// Lowercases and strips diacritics: "Vinculación" -> "vinculacion".
pub fn fold_name(name: &str) -> String {
    name.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Legacy name classifier. Kept for records created before kinds were stored
/// explicitly. First match wins in the order english, community, internship.
pub fn classify_name(name: &str) -> PrerequisiteKey {
    let folded = fold_name(name);
    if folded.contains("ingles") {
        PrerequisiteKey::English
    } else if folded.contains("vinculacion") {
        PrerequisiteKey::Community
    } else if folded.contains("practica") {
        PrerequisiteKey::Internship
    } else {
        PrerequisiteKey::Other
    }
}

pub fn canonical_key(record: &PrerequisiteRecord) -> PrerequisiteKey {
    if let Some(key) = record.tipo.as_deref().and_then(PrerequisiteKey::parse) {
        return key;
    }
    match record.nombre.as_deref() {
        Some(name) => classify_name(name),
        None => PrerequisiteKey::Other,
    }
}

pub fn record_status(record: &PrerequisiteRecord) -> PrerequisiteStatus {
    if record.cumplido {
        PrerequisiteStatus::Approved
    } else if record.id.is_some() || record.enviado {
        PrerequisiteStatus::Pending
    } else {
        PrerequisiteStatus::Missing
    }
}

pub fn normalize(records: &[PrerequisiteRecord]) -> CanonicalStatuses {
    let mut out = CanonicalStatuses::default();
    for record in records {
        let key = canonical_key(record);
        if key == PrerequisiteKey::Other {
            tracing::debug!(
                name = record.nombre.as_deref().unwrap_or(""),
                "prerequisite record matches no canonical key"
            );
            continue;
        }
        out.merge(key, record_status(record));
    }
    out
}

/// All three required prerequisites present and approved. No partial credit.
pub fn prerequisites_approved(statuses: &CanonicalStatuses) -> bool {
    PrerequisiteKey::REQUIRED
        .iter()
        .all(|k| statuses.get(*k) == Some(PrerequisiteStatus::Approved))
}

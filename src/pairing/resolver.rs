//! Rehydrates a partial record against the canonical dataset.
//!
//! Matching runs in a fixed order and the first hit wins:
//! index → owner + pet name → pet name → sprite filename → pet name prefix.
//! A dataset hit is the base record and the payload's fields are laid over
//! it; without a hit, a record is synthesized only if the payload carries a
//! pet name or a legacy code.

use crate::pairing::record::{Dataset, PartialRecord, PetRecord};

/// Which rule produced the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Index,
    OwnerAndName,
    Name,
    Sprite,
    /// Loose fallback: one normalized pet name is a prefix of the other.
    /// Short names can cross-match; kept deliberately loose.
    NamePrefix,
    Synthesized,
}

/// A resolved record with the rule and dataset position that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub record: PetRecord,
    pub matched_by: MatchKind,
    /// Dataset position of the base record; `None` when synthesized.
    pub index: Option<usize>,
}

/// Resolve `partial` into a complete record, or `None` if nothing is usable.
pub fn resolve(partial: &PartialRecord, dataset: &Dataset) -> Option<PetRecord> {
    resolve_detailed(partial, dataset).map(|r| r.record)
}

pub fn resolve_detailed(partial: &PartialRecord, dataset: &Dataset) -> Option<Resolution> {
    if let Some((index, matched_by)) = find_match(partial, dataset) {
        let mut record = dataset.get(index as i64)?.clone();
        record.overlay(partial);
        tracing::debug!(index, ?matched_by, "payload matched dataset");
        return Some(Resolution {
            record,
            matched_by,
            index: Some(index),
        });
    }

    let named = partial.pet_name.as_deref().is_some_and(|n| !n.trim().is_empty());
    if !named && partial.code.is_none() {
        tracing::debug!(index = ?partial.index, "payload has nothing to resolve");
        return None;
    }
    Some(Resolution {
        record: PetRecord::synthesize(partial),
        matched_by: MatchKind::Synthesized,
        index: None,
    })
}

fn find_match(partial: &PartialRecord, dataset: &Dataset) -> Option<(usize, MatchKind)> {
    if let Some(i) = partial.index {
        if dataset.get(i).is_some() {
            return Some((i as usize, MatchKind::Index));
        }
    }

    let owner = partial.owner_name.as_deref();
    let pet = partial.pet_name.as_deref().map(normalize_name).filter(|s| !s.is_empty());
    let position = |pred: &dyn Fn(&PetRecord) -> bool| dataset.iter().position(pred);

    if let (Some(owner), Some(pet)) = (owner, &pet) {
        let hit = position(&|r: &PetRecord| {
            same_owner(owner, &r.owner_name) && normalize_name(&r.pet_name) == *pet
        });
        if let Some(i) = hit {
            return Some((i, MatchKind::OwnerAndName));
        }
    }

    if let Some(pet) = &pet {
        if let Some(i) = position(&|r: &PetRecord| normalize_name(&r.pet_name) == *pet) {
            return Some((i, MatchKind::Name));
        }
    }

    let sprite = partial.sprite.as_deref().map(sprite_filename).filter(|s| !s.is_empty());
    if let Some(sprite) = &sprite {
        if let Some(i) = position(&|r: &PetRecord| sprite_filename(&r.sprite) == *sprite) {
            return Some((i, MatchKind::Sprite));
        }
    }

    if let Some(pet) = &pet {
        let hit = position(&|r: &PetRecord| {
            let candidate = normalize_name(&r.pet_name);
            !candidate.is_empty()
                && (pet.starts_with(&candidate) || candidate.starts_with(pet.as_str()))
        });
        if let Some(i) = hit {
            return Some((i, MatchKind::NamePrefix));
        }
    }

    None
}

/// A blank owner only matches a blank owner. Otherwise owners compare
/// normalized, and a name that normalizes to nothing never matches.
fn same_owner(wanted: &str, candidate: &str) -> bool {
    if wanted.trim().is_empty() || candidate.trim().is_empty() {
        return wanted.trim().is_empty() && candidate.trim().is_empty();
    }
    let wanted = normalize_name(wanted);
    !wanted.is_empty() && wanted == normalize_name(candidate)
}

/// Lowercase and drop everything that is not alphanumeric.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Final path segment, lowercased.
fn sprite_filename(reference: &str) -> String {
    reference
        .trim()
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// `scheme://...`, protocol-relative, `data:` and `blob:` references.
pub(crate) fn is_absolute_url(reference: &str) -> bool {
    if reference.starts_with("//") || reference.starts_with("data:") || reference.starts_with("blob:") {
        return true;
    }
    match reference.find("://") {
        Some(pos) if pos > 0 => reference[..pos]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')),
        _ => false,
    }
}

fn strip_relative_prefix(mut path: &str) -> &str {
    while let Some(stripped) = path
        .strip_prefix("./")
        .or_else(|| path.strip_prefix("../"))
        .or_else(|| path.strip_prefix('/'))
    {
        path = stripped;
    }
    path
}

/// Make a sprite reference resolvable from the kiosk's asset root.
///
/// Absolute URLs pass through. Relative references lose any leading `./`,
/// `../`, `/` and asset-directory prefix, then get `asset_root` prepended once,
/// so the result is stable under repeated normalization.
pub fn normalize_sprite_path(reference: &str, asset_root: &str) -> String {
    let reference = reference.trim();
    if reference.is_empty() || is_absolute_url(reference) {
        return reference.to_string();
    }

    let root = asset_root.trim_end_matches('/');
    let root_rel = strip_relative_prefix(root);
    let root_dir = root.rsplit('/').next().unwrap_or_default();

    let mut rest = strip_relative_prefix(reference);
    for prefix in [root_rel, root_dir] {
        if matches!(prefix, "" | "." | "..") {
            continue;
        }
        if let Some(stripped) = rest.strip_prefix(prefix).and_then(|s| s.strip_prefix('/')) {
            rest = stripped;
            break;
        }
    }

    if root.is_empty() {
        rest.to_string()
    } else {
        format!("{}/{}", root, rest)
    }
}

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    str::FromStr,
};

use crate::{error::MigrationError, step::Step};

/// Steps resolved into a single linear history, root first.
#[derive(Clone, Debug, Default)]
pub struct Chain {
    steps: Vec<Step>,
    positions: HashMap<String, usize>,
}

impl Chain {
    /// Validates `steps` and orders them by following `down_revision` links
    /// from the root.
    pub fn resolve(steps: Vec<Step>) -> Result<Self, MigrationError> {
        let mut by_revision = HashMap::with_capacity(steps.len());
        let mut children: BTreeMap<Option<String>, Vec<String>> = BTreeMap::new();
        for step in &steps {
            if by_revision.insert(step.revision().to_string(), step).is_some() {
                return Err(MigrationError::DuplicateRevision(step.revision().to_string()));
            }
            children
                .entry(step.down_revision().map(ToString::to_string))
                .or_default()
                .push(step.revision().to_string());
        }

        for step in &steps {
            if let Some(down_revision) = step.down_revision() {
                if !by_revision.contains_key(down_revision) {
                    return Err(MigrationError::MissingPredecessor {
                        revision: step.revision().to_string(),
                        down_revision: down_revision.to_string(),
                    });
                }
            }
        }

        if let Some((down_revision, revisions)) =
            children.iter().find(|(_, revisions)| revisions.len() > 1)
        {
            let mut revisions = revisions.clone();
            revisions.sort();
            return Err(MigrationError::MigrationConflict {
                down_revision: down_revision.clone(),
                revisions,
            });
        }

        let mut ordered = Vec::with_capacity(steps.len());
        let mut visited = HashSet::with_capacity(steps.len());
        let mut parent: Option<String> = None;
        while let Some(next) = children.get(&parent).and_then(|revisions| revisions.first()) {
            visited.insert(next.clone());
            ordered.push((*by_revision[next]).clone());
            parent = Some(next.clone());
        }

        if ordered.len() != steps.len() {
            let mut unreachable = steps
                .iter()
                .map(|step| step.revision().to_string())
                .filter(|revision| !visited.contains(revision))
                .collect::<Vec<_>>();
            unreachable.sort();
            return Err(MigrationError::CyclicHistory(unreachable));
        }

        let positions = ordered
            .iter()
            .enumerate()
            .map(|(index, step)| (step.revision().to_string(), index))
            .collect();
        Ok(Self {
            steps: ordered,
            positions,
        })
    }

    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    #[must_use]
    pub fn head(&self) -> Option<&str> {
        self.steps.last().map(Step::revision)
    }

    /// Number of steps applied once `revision` is the marker. Base is 0.
    pub fn depth(&self, revision: Option<&str>) -> Result<usize, MigrationError> {
        match revision {
            None => Ok(0),
            Some(revision) => self
                .positions
                .get(revision)
                .map(|index| index + 1)
                .ok_or_else(|| MigrationError::UnknownRevision(revision.to_string())),
        }
    }

    /// The marker value after applying the first `depth` steps.
    #[must_use]
    pub fn revision_at(&self, depth: usize) -> Option<&str> {
        depth
            .checked_sub(1)
            .and_then(|index| self.steps.get(index))
            .map(Step::revision)
    }

    /// Resolves `target` to a depth, relative to the `current` marker.
    pub fn resolve_target(
        &self,
        target: &Target,
        current: Option<&str>,
    ) -> Result<usize, MigrationError> {
        match target {
            Target::Head => Ok(self.steps.len()),
            Target::Base => Ok(0),
            Target::Relative(offset) => {
                let current_depth = self.depth(current)? as i64;
                match current_depth.checked_add(*offset) {
                    Some(depth) if depth >= 0 && depth <= self.steps.len() as i64 => {
                        Ok(depth as usize)
                    }
                    _ => Err(MigrationError::RelativeOutOfRange {
                        from: current.map(ToString::to_string),
                        offset: *offset,
                    }),
                }
            }
            Target::Revision(revision) => {
                if let Some(index) = self.positions.get(revision) {
                    return Ok(index + 1);
                }

                let mut candidates = self
                    .steps
                    .iter()
                    .enumerate()
                    .filter(|(_, step)| step.revision().starts_with(revision.as_str()));
                match (candidates.next(), candidates.next()) {
                    (Some((index, _)), None) => Ok(index + 1),
                    (None, _) => Err(MigrationError::UnknownRevision(revision.clone())),
                    (Some(first), Some(second)) => Err(MigrationError::AmbiguousRevision {
                        prefix: revision.clone(),
                        candidates: [first, second]
                            .iter()
                            .map(|(_, step)| step.revision())
                            .chain(candidates.map(|(_, step)| step.revision()))
                            .map(ToString::to_string)
                            .collect(),
                    }),
                }
            }
        }
    }
}

/// Where a run should end up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    Head,
    Base,
    /// Full revision, or a prefix matching exactly one revision.
    Revision(String),
    /// Steps forward (positive) or backward (negative) from the marker.
    Relative(i64),
}

impl FromStr for Target {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "" => Err(MigrationError::UnknownRevision(String::new())),
            "head" | "heads" | "latest" => Ok(Self::Head),
            "base" => Ok(Self::Base),
            relative if relative.starts_with('+') || relative.starts_with('-') => relative
                .parse()
                .map(Self::Relative)
                .map_err(|_| MigrationError::UnknownRevision(relative.to_string())),
            revision => Ok(Self::Revision(revision.to_string())),
        }
    }
}

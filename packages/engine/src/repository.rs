//! Rule repository port and in-memory implementation
//!
//! The engine treats rule storage as an external collaborator reachable
//! through the [`RuleRepository`] trait. Queries are split by scope so
//! the selector can union exactly the four candidate buckets it needs:
//! pair-specific, organism-general, drug-general, and global.
//!
//! Bucket queries return rules regardless of the active flag; filtering
//! to active rules is the selector's job, and inactive rules stay
//! reachable through [`RuleRepository::find_by_id`] for auditing.
//!
//! [`InMemoryRuleRepository`] is the reference implementation, used by
//! the CLI and the test suite. Real deployments put a database-backed
//! implementation behind the same trait.

use crate::config;
use crate::error::RepositoryError;
use crate::rule::Rule;
use std::collections::HashMap;
use std::sync::RwLock;

/// Result alias for repository operations.
pub type RepoResult<T> = std::result::Result<T, RepositoryError>;

/// Storage port for expert rules.
///
/// Read methods take `&self` so a shared repository can serve concurrent
/// validation calls; implementations use interior mutability.
pub trait RuleRepository: Send + Sync {
    /// Pair-specific rules (both foreign keys set) for an
    /// organism/drug/year triple.
    fn find_rules_by_pair(
        &self,
        organism_id: &str,
        drug_id: &str,
        year: i32,
    ) -> RepoResult<Vec<Rule>>;

    /// Organism-general rules (organism set, drug absent).
    fn find_rules_by_organism(&self, organism_id: &str) -> RepoResult<Vec<Rule>>;

    /// Drug-general rules (drug set, organism absent).
    fn find_rules_by_drug(&self, drug_id: &str) -> RepoResult<Vec<Rule>>;

    /// Global rules (neither foreign key set) for a standards year.
    fn find_global_rules_by_year(&self, year: i32) -> RepoResult<Vec<Rule>>;

    /// Look up a rule by id, active or not.
    fn find_by_id(&self, id: &str) -> RepoResult<Option<Rule>>;

    /// All stored rules, active or not.
    fn find_all(&self) -> RepoResult<Vec<Rule>>;

    /// Store a new rule. Fails with [`RepositoryError::Duplicate`] if the
    /// id is already taken.
    fn save(&self, rule: Rule) -> RepoResult<Rule>;

    /// Replace an existing rule. Fails with [`RepositoryError::NotFound`]
    /// if the id is unknown.
    fn update(&self, rule: Rule) -> RepoResult<Rule>;

    /// Flip a rule's active flag to false. The rule remains stored and
    /// retrievable by id.
    fn soft_delete(&self, id: &str) -> RepoResult<()>;
}

/// In-memory rule store backed by a `RwLock<HashMap>`.
#[derive(Debug, Default)]
pub struct InMemoryRuleRepository {
    rules: RwLock<HashMap<String, Rule>>,
}

impl InMemoryRuleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rules (active and inactive).
    pub fn len(&self) -> usize {
        self.rules.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RepoResult<std::sync::RwLockReadGuard<'_, HashMap<String, Rule>>> {
        self.rules
            .read()
            .map_err(|_| RepositoryError::Unavailable("rule store lock poisoned".to_string()))
    }

    fn write(&self) -> RepoResult<std::sync::RwLockWriteGuard<'_, HashMap<String, Rule>>> {
        self.rules
            .write()
            .map_err(|_| RepositoryError::Unavailable("rule store lock poisoned".to_string()))
    }

    fn collect_matching<F>(&self, predicate: F) -> RepoResult<Vec<Rule>>
    where
        F: Fn(&Rule) -> bool,
    {
        let rules = self.read()?;
        Ok(rules.values().filter(|r| predicate(r)).cloned().collect())
    }
}

impl RuleRepository for InMemoryRuleRepository {
    fn find_rules_by_pair(
        &self,
        organism_id: &str,
        drug_id: &str,
        year: i32,
    ) -> RepoResult<Vec<Rule>> {
        self.collect_matching(|r| {
            r.organism_id.as_deref() == Some(organism_id)
                && r.drug_id.as_deref() == Some(drug_id)
                && r.year == year
        })
    }

    fn find_rules_by_organism(&self, organism_id: &str) -> RepoResult<Vec<Rule>> {
        self.collect_matching(|r| {
            r.organism_id.as_deref() == Some(organism_id) && r.drug_id.is_none()
        })
    }

    fn find_rules_by_drug(&self, drug_id: &str) -> RepoResult<Vec<Rule>> {
        self.collect_matching(|r| r.drug_id.as_deref() == Some(drug_id) && r.organism_id.is_none())
    }

    fn find_global_rules_by_year(&self, year: i32) -> RepoResult<Vec<Rule>> {
        self.collect_matching(|r| r.organism_id.is_none() && r.drug_id.is_none() && r.year == year)
    }

    fn find_by_id(&self, id: &str) -> RepoResult<Option<Rule>> {
        Ok(self.read()?.get(id).cloned())
    }

    fn find_all(&self) -> RepoResult<Vec<Rule>> {
        Ok(self.read()?.values().cloned().collect())
    }

    fn save(&self, rule: Rule) -> RepoResult<Rule> {
        let mut rules = self.write()?;
        if rules.contains_key(&rule.id) {
            return Err(RepositoryError::Duplicate(rule.id));
        }
        if rules.len() >= config::MAX_LOADED_RULES {
            return Err(RepositoryError::Unavailable(format!(
                "rule store full ({} rules)",
                config::MAX_LOADED_RULES
            )));
        }
        rules.insert(rule.id.clone(), rule.clone());
        tracing::debug!(rule_id = %rule.id, total = rules.len(), "Rule stored");
        Ok(rule)
    }

    fn update(&self, rule: Rule) -> RepoResult<Rule> {
        let mut rules = self.write()?;
        if !rules.contains_key(&rule.id) {
            return Err(RepositoryError::NotFound(rule.id));
        }
        rules.insert(rule.id.clone(), rule.clone());
        Ok(rule)
    }

    fn soft_delete(&self, id: &str) -> RepoResult<()> {
        let mut rules = self.write()?;
        match rules.get_mut(id) {
            Some(rule) => {
                rule.is_active = false;
                rule.updated_at = chrono::Utc::now();
                tracing::debug!(rule_id = %id, "Rule soft-deleted");
                Ok(())
            }
            None => Err(RepositoryError::NotFound(id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::sample_rule;

    #[test]
    fn test_save_and_find_by_id() {
        let repo = InMemoryRuleRepository::new();
        repo.save(sample_rule("r1")).unwrap();

        let found = repo.find_by_id("r1").unwrap().unwrap();
        assert_eq!(found.id, "r1");
        assert!(repo.find_by_id("missing").unwrap().is_none());
    }

    #[test]
    fn test_save_rejects_duplicate_id() {
        let repo = InMemoryRuleRepository::new();
        repo.save(sample_rule("r1")).unwrap();
        let err = repo.save(sample_rule("r1")).unwrap_err();
        assert_eq!(err, RepositoryError::Duplicate("r1".to_string()));
    }

    #[test]
    fn test_update_requires_existing_rule() {
        let repo = InMemoryRuleRepository::new();
        let err = repo.update(sample_rule("r1")).unwrap_err();
        assert_eq!(err, RepositoryError::NotFound("r1".to_string()));
    }

    #[test]
    fn test_scope_buckets_are_disjoint() {
        let repo = InMemoryRuleRepository::new();

        repo.save(sample_rule("pair")).unwrap();

        let mut organism_only = sample_rule("organism");
        organism_only.drug_id = None;
        repo.save(organism_only).unwrap();

        let mut drug_only = sample_rule("drug");
        drug_only.organism_id = None;
        repo.save(drug_only).unwrap();

        let mut global = sample_rule("global");
        global.organism_id = None;
        global.drug_id = None;
        repo.save(global).unwrap();

        let pair = repo
            .find_rules_by_pair("e_coli", "ampicillin", 2024)
            .unwrap();
        assert_eq!(pair.len(), 1);
        assert_eq!(pair[0].id, "pair");

        let by_organism = repo.find_rules_by_organism("e_coli").unwrap();
        assert_eq!(by_organism.len(), 1);
        assert_eq!(by_organism[0].id, "organism");

        let by_drug = repo.find_rules_by_drug("ampicillin").unwrap();
        assert_eq!(by_drug.len(), 1);
        assert_eq!(by_drug[0].id, "drug");

        let global_rules = repo.find_global_rules_by_year(2024).unwrap();
        assert_eq!(global_rules.len(), 1);
        assert_eq!(global_rules[0].id, "global");

        assert!(repo.find_global_rules_by_year(2019).unwrap().is_empty());
    }

    #[test]
    fn test_soft_delete_keeps_rule_retrievable() {
        let repo = InMemoryRuleRepository::new();
        repo.save(sample_rule("r1")).unwrap();

        repo.soft_delete("r1").unwrap();

        let rule = repo.find_by_id("r1").unwrap().unwrap();
        assert!(!rule.is_active);

        let err = repo.soft_delete("missing").unwrap_err();
        assert_eq!(err, RepositoryError::NotFound("missing".to_string()));
    }
}

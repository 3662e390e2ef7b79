use std::collections::HashMap;

use dashmap::DashMap;
use serde::Deserialize;
use uuid::Uuid;

use crate::core::{
    domain::{Language, ProblemSettings, TestCase},
    traits::problem_store::{ProblemStore, ProblemStoreError},
};

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseDefinition {
    pub input: String,
    pub expected_output: String,
    #[serde(default)]
    pub hidden: bool,
}

/// Problem as described in a JSON problem file.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDefinition {
    #[serde(default)]
    pub time_limit_ms: Option<u64>,
    #[serde(default)]
    pub boilerplates: HashMap<Language, String>,
    pub test_cases: Vec<TestCaseDefinition>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProblemCounters {
    pub total_submissions: u64,
    pub accepted_submissions: u64,
}

#[derive(Debug)]
struct StoredProblem {
    test_cases: Vec<TestCase>,
    settings: ProblemSettings,
    counters: ProblemCounters,
}

#[derive(Debug, Default)]
pub struct InMemoryProblemStore {
    problems: DashMap<Uuid, StoredProblem>,
}

impl InMemoryProblemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, test_cases: Vec<TestCase>, settings: ProblemSettings) -> Uuid {
        let id = Uuid::new_v4();
        self.problems.insert(
            id,
            StoredProblem {
                test_cases,
                settings,
                counters: ProblemCounters::default(),
            },
        );
        id
    }

    pub fn insert_definition(&self, definition: ProblemDefinition) -> Uuid {
        let test_cases = definition
            .test_cases
            .into_iter()
            .map(|tc| TestCase {
                input: tc.input.into_bytes(),
                expected_output: tc.expected_output.into_bytes(),
                hidden: tc.hidden,
            })
            .collect();
        let settings = ProblemSettings {
            time_limit_ms: definition.time_limit_ms,
            boilerplates: definition.boilerplates,
        };
        self.insert(test_cases, settings)
    }

    pub fn counters(&self, problem_id: Uuid) -> Option<ProblemCounters> {
        self.problems
            .get(&problem_id)
            .map(|problem| problem.counters.clone())
    }

    fn update_counters<F>(&self, problem_id: Uuid, update: F) -> Result<(), ProblemStoreError>
    where
        F: FnOnce(&mut ProblemCounters),
    {
        let mut problem = self
            .problems
            .get_mut(&problem_id)
            .ok_or(ProblemStoreError::NotFound(problem_id))?;
        update(&mut problem.counters);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProblemStore for InMemoryProblemStore {
    async fn get_test_cases(&self, problem_id: Uuid) -> Result<Vec<TestCase>, ProblemStoreError> {
        self.problems
            .get(&problem_id)
            .map(|problem| problem.test_cases.clone())
            .ok_or(ProblemStoreError::NotFound(problem_id))
    }

    async fn get_settings(&self, problem_id: Uuid) -> Result<ProblemSettings, ProblemStoreError> {
        self.problems
            .get(&problem_id)
            .map(|problem| problem.settings.clone())
            .ok_or(ProblemStoreError::NotFound(problem_id))
    }

    async fn increment_total_submissions(
        &self,
        problem_id: Uuid,
    ) -> Result<(), ProblemStoreError> {
        self.update_counters(problem_id, |c| c.total_submissions += 1)
    }

    async fn increment_accepted_submissions(
        &self,
        problem_id: Uuid,
    ) -> Result<(), ProblemStoreError> {
        self.update_counters(problem_id, |c| c.accepted_submissions += 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_from_json() {
        let definition: ProblemDefinition = serde_json::from_str(
            r###"{
                "timeLimitMs": 2000,
                "boilerplates": { "python": "##USER_CODE##\nmain()" },
                "testCases": [
                    { "input": "2\n3", "expectedOutput": "5" },
                    { "input": "10\n-10", "expectedOutput": "0", "hidden": true }
                ]
            }"###,
        )
        .unwrap();

        let store = InMemoryProblemStore::new();
        let id = store.insert_definition(definition);
        let stored = store.problems.get(&id).unwrap();

        assert_eq!(stored.test_cases.len(), 2);
        assert_eq!(stored.test_cases[1].input, b"10\n-10");
        assert!(stored.test_cases[1].hidden);
        assert_eq!(stored.settings.time_limit_ms, Some(2000));
        assert!(stored.settings.boilerplates.contains_key(&Language::Python));
    }

    #[tokio::test]
    async fn test_counters() {
        let store = InMemoryProblemStore::new();
        let id = store.insert(Vec::new(), ProblemSettings::default());

        store.increment_total_submissions(id).await.unwrap();
        store.increment_total_submissions(id).await.unwrap();
        store.increment_accepted_submissions(id).await.unwrap();

        assert_eq!(
            store.counters(id),
            Some(ProblemCounters {
                total_submissions: 2,
                accepted_submissions: 1,
            })
        );
        let missing = Uuid::new_v4();
        assert!(matches!(
            store.increment_total_submissions(missing).await,
            Err(ProblemStoreError::NotFound(id)) if id == missing
        ));
    }
}

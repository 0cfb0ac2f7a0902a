//! In-memory storage for solutions, questions and parts.
//!
//! Used by the CLI and by tests in place of a database.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use accqst_core::model::{Attempt, PartId, QuestionId, SolutionRow};
use accqst_core::question::QuestionRecord;
use accqst_core::traits::{Part, PartRepository, QuestionRepository, RowFilter, SolutionStore};

#[derive(Debug, Clone)]
struct StoredRow {
    attempt: Attempt,
    authorized: bool,
    row: SolutionRow,
}

/// Solution rows kept in insertion order.
#[derive(Debug, Default)]
pub struct MemorySolutionStore {
    rows: RwLock<Vec<StoredRow>>,
    writes: AtomicUsize,
}

impl MemorySolutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of inserted rows since creation.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// All rows of an attempt regardless of authorization.
    pub async fn dump(&self, attempt: &Attempt) -> Vec<(bool, SolutionRow)> {
        self.rows
            .read()
            .await
            .iter()
            .filter(|stored| stored.attempt == *attempt)
            .map(|stored| (stored.authorized, stored.row.clone()))
            .collect()
    }
}

#[async_trait]
impl SolutionStore for MemorySolutionStore {
    async fn load_rows(
        &self,
        attempt: &Attempt,
        authorized: bool,
    ) -> anyhow::Result<Vec<SolutionRow>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .filter(|stored| stored.attempt == *attempt && stored.authorized == authorized)
            .map(|stored| stored.row.clone())
            .collect())
    }

    async fn load_rows_preferring_intermediate(
        &self,
        attempt: &Attempt,
    ) -> anyhow::Result<Vec<SolutionRow>> {
        let intermediate = self.load_rows(attempt, false).await?;
        if intermediate.is_empty() {
            self.load_rows(attempt, true).await
        } else {
            Ok(intermediate)
        }
    }

    async fn insert_row(
        &self,
        attempt: &Attempt,
        authorized: bool,
        row: SolutionRow,
    ) -> anyhow::Result<()> {
        self.rows.write().await.push(StoredRow {
            attempt: *attempt,
            authorized,
            row,
        });
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn delete_rows(
        &self,
        attempt: &Attempt,
        authorized: Option<bool>,
        filter: RowFilter<'_>,
    ) -> anyhow::Result<usize> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|stored| {
            let selected = stored.attempt == *attempt
                && authorized.map_or(true, |wanted| wanted == stored.authorized)
                && filter.matches(&stored.row.value1);
            !selected
        });
        Ok(before - rows.len())
    }

    async fn max_pass(
        &self,
        active_id: i64,
        question_id: QuestionId,
    ) -> anyhow::Result<Option<u32>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .filter(|stored| {
                stored.attempt.active_id == active_id && stored.attempt.question_id == question_id
            })
            .map(|stored| stored.attempt.pass)
            .max())
    }
}

/// Question records keyed by id.
#[derive(Debug)]
pub struct MemoryQuestionRepository {
    questions: RwLock<BTreeMap<QuestionId, QuestionRecord>>,
    next_id: AtomicI64,
}

impl Default for MemoryQuestionRepository {
    fn default() -> Self {
        Self {
            questions: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl MemoryQuestionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.questions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.questions.read().await.is_empty()
    }
}

#[async_trait]
impl QuestionRepository for MemoryQuestionRepository {
    async fn save_question(&self, record: &QuestionRecord) -> anyhow::Result<QuestionId> {
        let id = match record.id {
            Some(id) => {
                self.next_id.fetch_max(id + 1, Ordering::SeqCst);
                id
            }
            None => self.next_id.fetch_add(1, Ordering::SeqCst),
        };
        let mut stored = record.clone();
        stored.id = Some(id);
        self.questions.write().await.insert(id, stored);
        Ok(id)
    }

    async fn load_question(&self, id: QuestionId) -> anyhow::Result<Option<QuestionRecord>> {
        Ok(self.questions.read().await.get(&id).cloned())
    }
}

/// Parts keyed by id, stored as detached copies.
#[derive(Debug)]
pub struct MemoryPartRepository {
    parts: RwLock<BTreeMap<PartId, Box<dyn Part>>>,
    next_id: AtomicU64,
}

impl Default for MemoryPartRepository {
    fn default() -> Self {
        Self {
            parts: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl MemoryPartRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.parts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.parts.read().await.is_empty()
    }

    pub async fn contains(&self, part_id: PartId) -> bool {
        self.parts.read().await.contains_key(&part_id)
    }
}

fn with_identity(part: &dyn Part, part_id: PartId) -> Box<dyn Part> {
    let mut copy = part.clone_detached();
    copy.set_part_id(part_id);
    if let Some(question_id) = part.question_id() {
        copy.set_question_id(question_id);
    }
    copy
}

#[async_trait]
impl PartRepository for MemoryPartRepository {
    async fn write_part(&self, part: &dyn Part) -> anyhow::Result<PartId> {
        if part.question_id().is_none() {
            anyhow::bail!("part has no question");
        }
        let part_id = match part.part_id() {
            0 => self.next_id.fetch_add(1, Ordering::SeqCst),
            id => {
                self.next_id.fetch_max(id + 1, Ordering::SeqCst);
                id
            }
        };
        self.parts
            .write()
            .await
            .insert(part_id, with_identity(part, part_id));
        Ok(part_id)
    }

    async fn delete_part(&self, part_id: PartId) -> anyhow::Result<bool> {
        Ok(self.parts.write().await.remove(&part_id).is_some())
    }

    async fn load_parts(&self, question_id: QuestionId) -> anyhow::Result<Vec<Box<dyn Part>>> {
        Ok(self
            .parts
            .read()
            .await
            .iter()
            .filter(|(_, part)| part.question_id() == Some(question_id))
            .map(|(&part_id, part)| with_identity(part.as_ref(), part_id))
            .collect())
    }
}

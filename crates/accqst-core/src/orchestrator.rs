//! Scoring orchestrator.
//!
//! Drives one grading or preview request for a question: variables are
//! resolved first, then texts and bookings are rendered, then the
//! solution is decoded and every part scores its own ledger.
//!
//! Solution updates of one learner run under the [`SolutionLocks`] scope
//! of the attempt. Ledger rows are replaced on every submission; the
//! stored variables row is never deleted by an update.

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use uuid::Uuid;

use crate::codec::{decode_stored, SolutionCodec};
use crate::config::ScoringConfig;
use crate::error::AccqstError;
use crate::export::{part_rows, title_row, ExportRow};
use crate::lock::{LockScope, SolutionLocks};
use crate::model::{
    Attempt, ExistingSolutions, PartInput, SolutionRecord, SolutionRow, Submission, VARS_KEY,
};
use crate::question::{AccountingQuestion, RenderedQuestion};
use crate::report::{GradingReport, PartScore};
use crate::traits::{RowFilter, SolutionStore};

/// Progress of a grading request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradingPhase {
    /// Variables have not been resolved for this request.
    VariablesPending,
    /// Variables hold values; texts can be rendered.
    VariablesReady,
    /// Parts are scoring the decoded solution.
    Scoring,
    /// Points were calculated; resolve variables again for a new request.
    Done,
}

impl GradingPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            GradingPhase::VariablesPending => "variables-pending",
            GradingPhase::VariablesReady => "variables-ready",
            GradingPhase::Scoring => "scoring",
            GradingPhase::Done => "done",
        }
    }
}

impl fmt::Display for GradingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Services shared by orchestrators of one process.
#[derive(Clone)]
pub struct ScoringServices {
    pub store: Arc<dyn SolutionStore>,
    pub locks: Arc<SolutionLocks>,
    pub config: Arc<ScoringConfig>,
}

impl ScoringServices {
    pub fn new(
        store: Arc<dyn SolutionStore>,
        locks: Arc<SolutionLocks>,
        config: Arc<ScoringConfig>,
    ) -> Self {
        Self {
            store,
            locks,
            config,
        }
    }
}

/// Solution kept in a preview session instead of the solution store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewSession {
    solution: SolutionRecord,
}

impl PreviewSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn solution(&self) -> &SolutionRecord {
        &self.solution
    }

    pub fn set_solution(&mut self, solution: SolutionRecord) {
        self.solution = solution;
    }
}

/// Coordinates variable resolution, rendering and scoring of a question.
pub struct ScoringOrchestrator {
    question: AccountingQuestion,
    services: ScoringServices,
    phase: GradingPhase,
    rendered: Option<RenderedQuestion>,
}

impl ScoringOrchestrator {
    pub fn new(mut question: AccountingQuestion, services: ScoringServices) -> Self {
        question.apply_config(&services.config);
        Self {
            question,
            services,
            phase: GradingPhase::VariablesPending,
            rendered: None,
        }
    }

    pub fn phase(&self) -> GradingPhase {
        self.phase
    }

    pub fn question(&self) -> &AccountingQuestion {
        &self.question
    }

    pub fn question_mut(&mut self) -> &mut AccountingQuestion {
        &mut self.question
    }

    pub fn into_question(self) -> AccountingQuestion {
        self.question
    }

    fn require(&self, expected: GradingPhase) -> Result<(), AccqstError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(AccqstError::InvalidPhase {
                expected: expected.as_str(),
                actual: self.phase.as_str(),
            })
        }
    }

    fn transition(&mut self, next: GradingPhase) {
        tracing::debug!(from = %self.phase, to = %next, "grading phase");
        self.phase = next;
    }

    fn attempt_for(&self, active_id: i64, pass: u32) -> Result<Attempt, AccqstError> {
        let question_id = self.question.id().ok_or(AccqstError::NotSaved)?;
        Ok(Attempt {
            active_id,
            question_id,
            pass,
        })
    }

    // -- variables ---------------------------------------------------------

    /// Restore variables from `stored`, calculating them when incomplete.
    ///
    /// Starts a new request; any earlier rendering is discarded. Returns
    /// whether the stored map held every variable.
    pub fn resolve_variables(&mut self, stored: &SolutionRecord) -> Result<bool> {
        if self.phase == GradingPhase::Scoring {
            return Err(AccqstError::InvalidPhase {
                expected: GradingPhase::VariablesPending.as_str(),
                actual: self.phase.as_str(),
            }
            .into());
        }
        self.phase = GradingPhase::VariablesPending;
        self.rendered = None;

        let complete = self
            .question
            .variables_mut()
            .resolve_from_stored_or_calculate(stored)?;
        tracing::debug!(
            question = ?self.question.id(),
            complete,
            "variables resolved"
        );
        self.transition(GradingPhase::VariablesReady);
        Ok(complete)
    }

    /// Resolve variables from the attempt's authorized solution and persist
    /// freshly calculated values.
    ///
    /// Later submissions and grading of the same pass reuse the stored
    /// values, so the question is never randomized twice.
    pub async fn ensure_variables(&mut self, attempt: &Attempt) -> Result<bool> {
        // Held from the load to the write so concurrent requests of one
        // pass restore the values the first of them stored.
        let locks = Arc::clone(&self.services.locks);
        let _guard = locks.acquire(LockScope::from(attempt)).await;

        let stored = self.load_solution(attempt, Some(true)).await?;
        let complete = self.resolve_variables(&stored)?;
        if complete || self.question.variables().is_empty() {
            return Ok(complete);
        }

        let row = SolutionRow::new(VARS_KEY, self.question.variables().stored_value());
        let store = &self.services.store;
        store
            .delete_rows(attempt, Some(true), RowFilter::Only(VARS_KEY))
            .await
            .context("failed to store variables")?;
        store
            .insert_row(attempt, true, row)
            .await
            .context("failed to store variables")?;
        tracing::info!(
            active_id = attempt.active_id,
            question = attempt.question_id,
            pass = attempt.pass,
            "variables stored"
        );
        Ok(complete)
    }

    /// Add the current variable values to a solution.
    pub fn add_variables_to_solution(&self, mut solution: SolutionRecord) -> SolutionRecord {
        solution.insert(VARS_KEY, self.question.variables().stored_value());
        solution
    }

    // -- rendering ---------------------------------------------------------

    /// Question and part texts with display values substituted.
    ///
    /// Bookings are re-applied with numeric values at the same time.
    pub fn render(&mut self) -> Result<&RenderedQuestion> {
        if self.phase == GradingPhase::VariablesPending {
            return Err(AccqstError::InvalidPhase {
                expected: GradingPhase::VariablesReady.as_str(),
                actual: self.phase.as_str(),
            }
            .into());
        }
        if self.rendered.is_none() {
            let rendered = self.question.render()?;
            tracing::debug!(parts = rendered.parts.len(), "question rendered");
            self.rendered = Some(rendered);
        }
        self.rendered
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("question was not rendered"))
    }

    // -- encoding and storage ----------------------------------------------

    /// Encode a submission for all parts of the question.
    pub fn encode_submission(&self, submission: &Submission) -> Result<SolutionRecord> {
        let inputs: Vec<PartInput> = self
            .question
            .parts()
            .iter()
            .map(|part| PartInput {
                part_id: part.part_id(),
                max_lines: part.max_lines(),
                rows: submission.rows(part.part_id()).to_vec(),
            })
            .collect();
        let row = SolutionCodec::new(self.question.accounts()).encode_submission(&inputs)?;
        Ok(SolutionRecord::from_rows([row]))
    }

    /// Stored solution of an attempt.
    ///
    /// `authorized: None` prefers the intermediate solution.
    pub async fn load_solution(
        &self,
        attempt: &Attempt,
        authorized: Option<bool>,
    ) -> Result<SolutionRecord> {
        let store = &self.services.store;
        let rows = match authorized {
            Some(authorized) => store.load_rows(attempt, authorized).await,
            None => store.load_rows_preferring_intermediate(attempt).await,
        }
        .with_context(|| format!("failed to load solution of {}", attempt.active_id))?;
        Ok(SolutionRecord::from_rows(rows))
    }

    /// Replace the ledger rows of an attempt with a new submission.
    ///
    /// Variables stored for the attempt are kept.
    pub async fn save_working_data(
        &self,
        attempt: &Attempt,
        submission: &Submission,
        authorized: bool,
    ) -> Result<SolutionRecord> {
        let solution = self.encode_submission(submission)?;
        let rows = solution.to_rows();
        let store = Arc::clone(&self.services.store);

        self.services
            .locks
            .with_lock(LockScope::from(attempt), || async move {
                store
                    .delete_rows(attempt, Some(authorized), RowFilter::AllExcept(VARS_KEY))
                    .await?;
                for row in rows {
                    store.insert_row(attempt, authorized, row).await?;
                }
                anyhow::Ok(())
            })
            .await
            .context("failed to save working data")?;

        tracing::info!(
            active_id = attempt.active_id,
            question = attempt.question_id,
            pass = attempt.pass,
            authorized,
            "solution saved"
        );
        Ok(solution)
    }

    /// Delete authorized and intermediate ledger rows, keeping variables.
    pub async fn remove_existing_solutions(&self, attempt: &Attempt) -> Result<usize> {
        let store = Arc::clone(&self.services.store);
        let removed = self
            .services
            .locks
            .with_lock(LockScope::from(attempt), || async move {
                store
                    .delete_rows(attempt, None, RowFilter::AllExcept(VARS_KEY))
                    .await
            })
            .await?;
        tracing::debug!(removed, "existing solutions removed");
        Ok(removed)
    }

    /// Which solution states hold ledger rows; variables do not count.
    pub async fn lookup_existing_solutions(&self, attempt: &Attempt) -> Result<ExistingSolutions> {
        let has_ledger = |rows: &[SolutionRow]| rows.iter().any(|row| row.value1 != VARS_KEY);
        let authorized = self.services.store.load_rows(attempt, true).await?;
        let intermediate = self.services.store.load_rows(attempt, false).await?;
        Ok(ExistingSolutions {
            authorized: has_ledger(&authorized),
            intermediate: has_ledger(&intermediate),
        })
    }

    // -- preview -----------------------------------------------------------

    /// Store a submission with the session's variables in the preview.
    pub fn save_preview_data(
        &mut self,
        session: &mut PreviewSession,
        submission: &Submission,
    ) -> Result<()> {
        self.resolve_variables(session.solution())?;
        let solution = self.add_variables_to_solution(self.encode_submission(submission)?);
        session.set_solution(solution);
        Ok(())
    }

    /// Points of the solution stored in a preview session.
    pub fn calculate_points_from_preview(&mut self, session: &PreviewSession) -> Result<f64> {
        self.resolve_variables(session.solution())?;
        self.score_solution(session.solution())
    }

    // -- scoring -----------------------------------------------------------

    /// Score a decoded solution with every part and sum the points.
    pub fn score_solution(&mut self, solution: &SolutionRecord) -> Result<f64> {
        Ok(self.score_parts(solution)?.iter().map(|part| part.points).sum())
    }

    fn score_parts(&mut self, solution: &SolutionRecord) -> Result<Vec<PartScore>> {
        self.require(GradingPhase::VariablesReady)?;
        self.render()?;
        self.transition(GradingPhase::Scoring);

        let fragments = decode_stored(solution);
        let tolerance = self.question.tolerance();
        let mut scores = Vec::with_capacity(self.question.parts().len());
        for part in self.question.parts_mut() {
            let part_id = part.part_id();
            part.set_working_xml(fragments.get(&part_id).map(String::as_str).unwrap_or(""));
            let points = part.calculate_reached_points(&tolerance);
            tracing::debug!(part = part_id, points, "part scored");
            scores.push(PartScore {
                part_id,
                points,
                max_points: part.max_points(),
                breakdown: part.working_data().clone(),
            });
        }

        self.transition(GradingPhase::Done);
        Ok(scores)
    }

    /// Points reached by a learner.
    ///
    /// `pass` defaults to the latest pass with stored rows. Variables
    /// always come from the authorized solution. Detailed results are not
    /// available and fail with [`AccqstError::Unsupported`].
    pub async fn calculate_reached_points(
        &mut self,
        active_id: i64,
        pass: Option<u32>,
        authorized: bool,
        return_details: bool,
    ) -> Result<f64> {
        if return_details {
            return Err(AccqstError::Unsupported(
                "detailed results of calculate_reached_points".into(),
            )
            .into());
        }
        let question_id = self.question.id().ok_or(AccqstError::NotSaved)?;
        let pass = match pass {
            Some(pass) => pass,
            None => self
                .services
                .store
                .max_pass(active_id, question_id)
                .await?
                .unwrap_or(0),
        };
        let attempt = self.attempt_for(active_id, pass)?;

        let variables = self.load_solution(&attempt, Some(true)).await?;
        self.resolve_variables(&variables)?;
        let solution = self.load_solution(&attempt, Some(authorized)).await?;
        self.score_solution(&solution)
    }

    /// Grade a solution record into a report.
    ///
    /// Variables are taken from the record itself.
    pub fn grade_solution(&mut self, solution: &SolutionRecord) -> Result<GradingReport> {
        self.resolve_variables(solution)?;
        let rendered = self.render()?.clone();
        let parts = self.score_parts(solution)?;
        let reached_points = parts.iter().map(|part| part.points).sum();

        Ok(GradingReport {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            question_id: self.question.id(),
            title: self.question.title().to_string(),
            rendered,
            variables: self.question.variables().serialize(),
            parts,
            reached_points,
            maximum_points: self.question.calculate_maximum_points(),
        })
    }

    // -- export ------------------------------------------------------------

    /// Export rows of an attempt's authorized solution.
    pub async fn export_details(&mut self, attempt: &Attempt) -> Result<Vec<ExportRow>> {
        let solution = self.load_solution(attempt, Some(true)).await?;
        self.export_solution(&solution)
    }

    /// Export rows of a solution record, variables taken from the record.
    pub fn export_solution(&mut self, solution: &SolutionRecord) -> Result<Vec<ExportRow>> {
        self.resolve_variables(solution)?;
        let scores = self.score_parts(solution)?;

        let labels = &self.services.config.labels;
        let mut rows = vec![title_row(labels, self.question.title())];
        for (idx, score) in scores.iter().enumerate() {
            rows.extend(part_rows(labels, idx + 1, &score.breakdown));
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use crate::model::{LedgerRowInput, PartId, QuestionId, ScoreBreakdown, INPUT_KEY};
    use crate::numeric::Tolerance;
    use crate::traits::{Part, VariableDefinition, VariableParser};
    use crate::variables::VariableEngine;

    // -- mocks -------------------------------------------------------------

    #[derive(Default)]
    struct MockStore {
        rows: Mutex<Vec<(Attempt, bool, SolutionRow)>>,
        /// Yield to other tasks before every load.
        slow_loads: bool,
    }

    impl MockStore {
        async fn keys(&self, authorized: bool) -> Vec<String> {
            self.rows
                .lock()
                .await
                .iter()
                .filter(|(_, auth, _)| *auth == authorized)
                .map(|(_, _, row)| row.value1.clone())
                .collect()
        }
    }

    #[async_trait]
    impl SolutionStore for MockStore {
        async fn load_rows(&self, attempt: &Attempt, authorized: bool) -> Result<Vec<SolutionRow>> {
            if self.slow_loads {
                tokio::task::yield_now().await;
            }
            Ok(self
                .rows
                .lock()
                .await
                .iter()
                .filter(|(a, auth, _)| a == attempt && *auth == authorized)
                .map(|(_, _, row)| row.clone())
                .collect())
        }

        async fn load_rows_preferring_intermediate(
            &self,
            attempt: &Attempt,
        ) -> Result<Vec<SolutionRow>> {
            let intermediate = self.load_rows(attempt, false).await?;
            if intermediate.is_empty() {
                self.load_rows(attempt, true).await
            } else {
                Ok(intermediate)
            }
        }

        async fn insert_row(&self, attempt: &Attempt, authorized: bool, row: SolutionRow) -> Result<()> {
            self.rows.lock().await.push((*attempt, authorized, row));
            Ok(())
        }

        async fn delete_rows(
            &self,
            attempt: &Attempt,
            authorized: Option<bool>,
            filter: RowFilter<'_>,
        ) -> Result<usize> {
            let mut rows = self.rows.lock().await;
            let before = rows.len();
            rows.retain(|(a, auth, row)| {
                !(a == attempt
                    && authorized.map_or(true, |wanted| wanted == *auth)
                    && filter.matches(&row.value1))
            });
            Ok(before - rows.len())
        }

        async fn max_pass(&self, active_id: i64, question_id: QuestionId) -> Result<Option<u32>> {
            Ok(self
                .rows
                .lock()
                .await
                .iter()
                .filter(|(a, _, _)| a.active_id == active_id && a.question_id == question_id)
                .map(|(a, _, _)| a.pass)
                .max())
        }
    }

    /// Full points when the first left amount equals the booked amount.
    #[derive(Debug, Clone)]
    struct AmountPart {
        id: PartId,
        question_id: Option<QuestionId>,
        text: String,
        booking: String,
        booked: f64,
        working: String,
        data: ScoreBreakdown,
    }

    impl AmountPart {
        fn boxed(id: PartId, booking: &str) -> Box<dyn Part> {
            Box::new(Self {
                id,
                question_id: None,
                text: format!("Part {id} books {booking}"),
                booking: booking.into(),
                booked: 0.0,
                working: String::new(),
                data: ScoreBreakdown::default(),
            })
        }
    }

    impl Part for AmountPart {
        fn part_id(&self) -> PartId {
            self.id
        }
        fn set_part_id(&mut self, part_id: PartId) {
            self.id = part_id;
        }
        fn question_id(&self) -> Option<QuestionId> {
            self.question_id
        }
        fn set_question_id(&mut self, question_id: QuestionId) {
            self.question_id = Some(question_id);
        }
        fn max_lines(&self) -> usize {
            1
        }
        fn max_points(&self) -> f64 {
            2.0
        }
        fn text(&self) -> &str {
            &self.text
        }
        fn set_text(&mut self, text: String) {
            self.text = text;
        }
        fn booking_xml(&self) -> &str {
            &self.booking
        }
        fn set_booking_xml(&mut self, xml: &str, variables: Option<&VariableEngine>) -> anyhow::Result<()> {
            let applied = match variables {
                Some(engine) => engine.substitute(xml, crate::model::SubstitutionMode::Numeric),
                None => xml.to_string(),
            };
            self.booked = applied.parse()?;
            self.booking = xml.to_string();
            Ok(())
        }
        fn set_working_xml(&mut self, xml: &str) {
            self.working = xml.to_string();
        }
        fn calculate_reached_points(&mut self, tolerance: &Tolerance) -> f64 {
            let amount = self
                .working
                .split("leftValueMoney=\"")
                .nth(1)
                .and_then(|rest| rest.split('"').next())
                .map(|raw| crate::numeric::parse_amount(raw, ','))
                .unwrap_or(0.0);
            let points = if tolerance.equals(amount, self.booked) { 2.0 } else { 0.0 };
            self.data = ScoreBreakdown {
                header_left: "Debit".into(),
                header_right: "Credit".into(),
                ..Default::default()
            };
            points
        }
        fn working_data(&self) -> &ScoreBreakdown {
            &self.data
        }
        fn clone_detached(&self) -> Box<dyn Part> {
            let mut copy = self.clone();
            copy.id = 0;
            Box::new(copy)
        }
    }

    #[derive(Debug)]
    struct Counter {
        name: String,
        next: std::sync::atomic::AtomicU32,
    }

    impl VariableDefinition for Counter {
        fn name(&self) -> &str {
            &self.name
        }
        fn calculate(&self, _: &BTreeMap<String, f64>) -> anyhow::Result<f64> {
            // every calculation yields a new value
            let n = self.next.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(500.0 + f64::from(n) * 100.0)
        }
    }

    struct CounterParser {
        first: u32,
    }

    impl VariableParser for CounterParser {
        fn parse(&self, xml: &str) -> anyhow::Result<Vec<Arc<dyn VariableDefinition>>> {
            Ok(xml
                .split(',')
                .map(|name| {
                    Arc::new(Counter {
                        name: name.trim().to_string(),
                        next: self.first.into(),
                    }) as Arc<dyn VariableDefinition>
                })
                .collect())
        }
    }

    // -- helpers -----------------------------------------------------------

    fn question() -> AccountingQuestion {
        question_counting_from(0)
    }

    fn question_counting_from(first: u32) -> AccountingQuestion {
        let config = ScoringConfig::default();
        let mut question = AccountingQuestion::from_record(
            crate::question::QuestionRecord {
                id: Some(9),
                original_id: None,
                container_id: 1,
                title: "Sales".into(),
                comment: String::new(),
                author: "author".into(),
                owner: 1,
                question_text: "Book {x} on account 4000".into(),
                points: 0.0,
                accounts_xml: r#"<konten><konto nummer="4000" titel="Sales"/></konten>"#.into(),
                account_hash: String::new(),
                variables_xml: "x".into(),
                precision: 2,
                thousands_delim_type: None,
            },
            &CounterParser { first },
            &config,
        );
        question.add_part(AmountPart::boxed(1, "{x}"));
        question
    }

    fn orchestrator() -> (ScoringOrchestrator, Arc<MockStore>) {
        let store = Arc::new(MockStore::default());
        let services = ScoringServices::new(
            store.clone(),
            Arc::new(SolutionLocks::new()),
            Arc::new(ScoringConfig::default()),
        );
        (ScoringOrchestrator::new(question(), services), store)
    }

    fn attempt() -> Attempt {
        Attempt {
            active_id: 3,
            question_id: 9,
            pass: 0,
        }
    }

    fn submission(amount: &str) -> Submission {
        Submission::new().with_rows(
            1,
            vec![LedgerRowInput {
                left_account: "4000".into(),
                left_amount: amount.into(),
                ..Default::default()
            }],
        )
    }

    // -- tests -------------------------------------------------------------

    #[tokio::test]
    async fn scoring_requires_resolved_variables() {
        let (mut orchestrator, _) = orchestrator();
        let err = orchestrator.score_solution(&SolutionRecord::new()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AccqstError>(),
            Some(AccqstError::InvalidPhase { .. })
        ));
        assert!(orchestrator.render().is_err());
    }

    #[tokio::test]
    async fn phases_advance_and_restart() {
        let (mut orchestrator, _) = orchestrator();
        assert_eq!(orchestrator.phase(), GradingPhase::VariablesPending);
        orchestrator.resolve_variables(&SolutionRecord::new()).unwrap();
        assert_eq!(orchestrator.phase(), GradingPhase::VariablesReady);

        let rendered = orchestrator.render().unwrap().clone();
        assert_eq!(rendered.text, "Book 500,00 on account 4000");
        assert_eq!(orchestrator.phase(), GradingPhase::VariablesReady);

        orchestrator.score_solution(&SolutionRecord::new()).unwrap();
        assert_eq!(orchestrator.phase(), GradingPhase::Done);
        assert!(orchestrator.score_solution(&SolutionRecord::new()).is_err());

        orchestrator.resolve_variables(&SolutionRecord::new()).unwrap();
        assert_eq!(orchestrator.phase(), GradingPhase::VariablesReady);
    }

    #[tokio::test]
    async fn variables_survive_resubmission() {
        let (mut orchestrator, store) = orchestrator();
        let attempt = attempt();

        assert!(!orchestrator.ensure_variables(&attempt).await.unwrap());
        let first = orchestrator.question().variables().serialize();

        orchestrator
            .save_working_data(&attempt, &submission("1"), true)
            .await
            .unwrap();
        orchestrator
            .save_working_data(&attempt, &submission("500"), true)
            .await
            .unwrap();

        let mut keys = store.keys(true).await;
        keys.sort();
        assert_eq!(keys, [INPUT_KEY, VARS_KEY]);

        // a later request restores instead of recalculating
        assert!(orchestrator.ensure_variables(&attempt).await.unwrap());
        assert_eq!(orchestrator.question().variables().serialize(), first);

        let points = orchestrator
            .calculate_reached_points(attempt.active_id, None, true, false)
            .await
            .unwrap();
        assert_eq!(points, 2.0);
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_draw() {
        let store = Arc::new(MockStore {
            slow_loads: true,
            ..Default::default()
        });
        let locks = Arc::new(SolutionLocks::new());
        let services = || {
            ScoringServices::new(
                store.clone(),
                Arc::clone(&locks),
                Arc::new(ScoringConfig::default()),
            )
        };
        // distinct counters so two draws cannot agree by accident
        let mut first = ScoringOrchestrator::new(question_counting_from(0), services());
        let mut second = ScoringOrchestrator::new(question_counting_from(50), services());
        let attempt = attempt();

        let (a, b) = tokio::join!(
            first.ensure_variables(&attempt),
            second.ensure_variables(&attempt)
        );
        // one request drew the values, the other restored them
        assert_ne!(a.unwrap(), b.unwrap());

        let rendered = first.question().variables().stored_value();
        assert_eq!(second.question().variables().stored_value(), rendered);
        assert_eq!(store.keys(true).await, [VARS_KEY]);
        let stored = first.load_solution(&attempt, Some(true)).await.unwrap();
        assert_eq!(stored.get(VARS_KEY), Some(rendered.as_str()));
    }

    #[tokio::test]
    async fn intermediate_and_authorized_are_separate() {
        let (orchestrator, store) = orchestrator();
        let attempt = attempt();
        orchestrator
            .save_working_data(&attempt, &submission("1"), false)
            .await
            .unwrap();

        let existing = orchestrator.lookup_existing_solutions(&attempt).await.unwrap();
        assert_eq!(
            existing,
            ExistingSolutions {
                authorized: false,
                intermediate: true
            }
        );

        let preferred = orchestrator.load_solution(&attempt, None).await.unwrap();
        assert!(preferred.contains_key(INPUT_KEY));
        assert!(store.keys(true).await.is_empty());
    }

    #[tokio::test]
    async fn removing_solutions_keeps_variables() {
        let (mut orchestrator, store) = orchestrator();
        let attempt = attempt();
        orchestrator.ensure_variables(&attempt).await.unwrap();
        orchestrator
            .save_working_data(&attempt, &submission("1"), true)
            .await
            .unwrap();
        orchestrator
            .save_working_data(&attempt, &submission("1"), false)
            .await
            .unwrap();

        assert_eq!(orchestrator.remove_existing_solutions(&attempt).await.unwrap(), 2);
        assert_eq!(store.keys(true).await, [VARS_KEY]);
        assert_eq!(
            orchestrator.lookup_existing_solutions(&attempt).await.unwrap(),
            ExistingSolutions::default()
        );
    }

    #[tokio::test]
    async fn detailed_results_are_unsupported() {
        let (mut orchestrator, _) = orchestrator();
        let err = orchestrator
            .calculate_reached_points(3, Some(0), true, true)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AccqstError>(),
            Some(AccqstError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn preview_keeps_its_variables() {
        let (mut orchestrator, _) = orchestrator();
        let mut session = PreviewSession::new();

        orchestrator
            .save_preview_data(&mut session, &submission("500,00"))
            .unwrap();
        assert!(session.solution().contains_key(VARS_KEY));
        assert_eq!(orchestrator.calculate_points_from_preview(&session).unwrap(), 2.0);

        // resubmitting in the same session keeps the first values
        orchestrator
            .save_preview_data(&mut session, &submission("500"))
            .unwrap();
        assert_eq!(orchestrator.calculate_points_from_preview(&session).unwrap(), 2.0);
    }

    #[tokio::test]
    async fn grading_report_and_export() {
        let (mut orchestrator, _) = orchestrator();
        let mut solution = orchestrator.encode_submission(&submission("500")).unwrap();
        solution.insert(VARS_KEY, r#"{"x":"500"}"#);

        let report = orchestrator.grade_solution(&solution).unwrap();
        assert_eq!(report.reached_points, 2.0);
        assert_eq!(report.maximum_points, 2.0);
        assert_eq!(report.rendered.text, "Book 500,00 on account 4000");
        assert_eq!(report.variables["x"], "500");

        let rows = orchestrator.export_solution(&solution).unwrap();
        assert_eq!(rows[0].cells, ["Accounting Question", "Sales"]);
        assert_eq!(rows[1].cells, ["Accounting table 1", "Debit", "Credit"]);
    }

    #[tokio::test]
    async fn unsaved_question_cannot_be_graded_from_storage() {
        let store = Arc::new(MockStore::default());
        let services = ScoringServices::new(
            store,
            Arc::new(SolutionLocks::new()),
            Arc::new(ScoringConfig::default()),
        );
        let question = AccountingQuestion::new(&ScoringConfig::default());
        let mut orchestrator = ScoringOrchestrator::new(question, services);
        let err = orchestrator
            .calculate_reached_points(1, None, true, false)
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<AccqstError>(), Some(AccqstError::NotSaved)));
    }
}

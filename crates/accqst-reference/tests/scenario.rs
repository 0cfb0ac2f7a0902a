//! End-to-end grading with the reference parts and in-memory storage.

use std::path::Path;
use std::sync::Arc;

use accqst_core::config::ScoringConfig;
use accqst_core::lock::SolutionLocks;
use accqst_core::model::{Attempt, LedgerRowInput, Submission, VARS_KEY};
use accqst_core::numeric::ThousandsDelim;
use accqst_core::orchestrator::{GradingPhase, ScoringOrchestrator, ScoringServices};
use accqst_core::question::{AccountingQuestion, DuplicateOverrides};
use accqst_reference::{
    parse_question_str, MemoryPartRepository, MemoryQuestionRepository, MemorySolutionStore,
    ReferenceVariableParser,
};

const SALES: &str = r#"
[question]
id = 7
title = "Sales"
author = "Ada"
text = "Book {x} on account 4000"
accounts = """
<konten>
  <konto nummer="1200" titel="Bank"/>
  <konto nummer="4000" titel="Sales"/>
</konten>
"""
variables = """<variables><var name="x" value="500"/></variables>"""

[[parts]]
text = "Receipt of {x}"
max_lines = 2
booking = """<input><row leftAccountNum="1200" leftValueMoney="{x}" rightAccountNum="4000" rightValueMoney="{x}"/></input>"""
"#;

const RANDOM: &str = r#"
[question]
id = 8
title = "Random sales"
author = "Ada"
text = "Book {x}"
accounts = """<konten><konto nummer="1200" titel="Bank"/><konto nummer="4000" titel="Sales"/></konten>"""
variables = """<variables><var name="x" min="100" max="100000" step="1"/></variables>"""

[[parts]]
booking = """<input><row leftAccountNum="1200" leftValueMoney="{x}" rightAccountNum="4000" rightValueMoney="{x}"/></input>"""
"#;

fn question(source: &str) -> AccountingQuestion {
    parse_question_str(source, Path::new("scenario.toml"), &ScoringConfig::default()).unwrap()
}

fn services(store: Arc<MemorySolutionStore>) -> ScoringServices {
    services_with(store, ScoringConfig::default())
}

fn services_with(store: Arc<MemorySolutionStore>, config: ScoringConfig) -> ScoringServices {
    ScoringServices::new(store, Arc::new(SolutionLocks::new()), Arc::new(config))
}

fn booking(amount: &str) -> Submission {
    Submission::new().with_rows(
        1,
        vec![LedgerRowInput {
            left_account: "1200".into(),
            left_amount: amount.into(),
            right_account: "4000".into(),
            right_amount: amount.into(),
        }],
    )
}

#[tokio::test]
async fn sales_booking_earns_full_points() {
    let store = Arc::new(MemorySolutionStore::new());
    let mut orchestrator = ScoringOrchestrator::new(question(SALES), services(store));
    let attempt = Attempt {
        active_id: 1,
        question_id: 7,
        pass: 0,
    };

    orchestrator.ensure_variables(&attempt).await.unwrap();
    let rendered = orchestrator.render().unwrap();
    assert_eq!(rendered.text, "Book 500,00 on account 4000");
    assert_eq!(rendered.parts[0].text, "Receipt of 500,00");
    assert_eq!(orchestrator.question().accounts().text_for("4000"), "4000: Sales");

    orchestrator
        .save_working_data(&attempt, &booking("500,00"), true)
        .await
        .unwrap();
    let points = orchestrator
        .calculate_reached_points(1, None, true, false)
        .await
        .unwrap();
    assert_eq!(points, 2.0);
    assert_eq!(orchestrator.phase(), GradingPhase::Done);
}

#[tokio::test]
async fn displayed_amount_typed_back_earns_full_points() {
    let source = SALES.replace(r#"value="500""#, r#"value="1234.5""#);
    let cases = [
        (',', ThousandsDelim::Apostrophe, "1'234,50"),
        (',', ThousandsDelim::Dot, "1.234,50"),
        ('.', ThousandsDelim::None, "1234.50"),
        ('.', ThousandsDelim::Space, "1 234.50"),
    ];
    for (active_id, (decimal_separator, thousands_delim, shown)) in (10..).zip(cases) {
        let config = ScoringConfig {
            decimal_separator,
            thousands_delim,
            ..Default::default()
        };
        let question = parse_question_str(&source, Path::new("scenario.toml"), &config).unwrap();
        let store = Arc::new(MemorySolutionStore::new());
        let mut orchestrator = ScoringOrchestrator::new(question, services_with(store, config));
        let attempt = Attempt {
            active_id,
            question_id: 7,
            pass: 0,
        };

        orchestrator.ensure_variables(&attempt).await.unwrap();
        let rendered = orchestrator.render().unwrap();
        assert_eq!(rendered.text, format!("Book {shown} on account 4000"));

        orchestrator
            .save_working_data(&attempt, &booking(shown), true)
            .await
            .unwrap();
        let points = orchestrator
            .calculate_reached_points(active_id, None, true, false)
            .await
            .unwrap();
        assert_eq!(points, 2.0, "{shown}");
    }
}

#[tokio::test]
async fn export_details_lists_scored_rows() {
    let store = Arc::new(MemorySolutionStore::new());
    let mut orchestrator = ScoringOrchestrator::new(question(SALES), services(store));
    let attempt = Attempt {
        active_id: 4,
        question_id: 7,
        pass: 0,
    };
    orchestrator.ensure_variables(&attempt).await.unwrap();
    orchestrator
        .save_working_data(&attempt, &booking("500,00"), true)
        .await
        .unwrap();

    let rows = orchestrator.export_details(&attempt).await.unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].cells, ["Accounting Question", "Sales"]);
    assert_eq!(rows[1].cells[0], "Accounting table 1");
    assert!(rows[2].cells[1].ends_with("500,00 (1 point)"), "{:?}", rows[2].cells);
    assert!(rows[2].cells[2].ends_with("500,00 (1 point)"), "{:?}", rows[2].cells);

    // nothing authorized yet for another learner
    let other = Attempt {
        active_id: 5,
        ..attempt
    };
    let rows = orchestrator.export_details(&other).await.unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn wrong_amount_loses_points() {
    let store = Arc::new(MemorySolutionStore::new());
    let mut orchestrator = ScoringOrchestrator::new(question(SALES), services(store));
    let attempt = Attempt {
        active_id: 2,
        question_id: 7,
        pass: 0,
    };
    orchestrator.ensure_variables(&attempt).await.unwrap();
    orchestrator
        .save_working_data(&attempt, &booking("499,00"), false)
        .await
        .unwrap();
    let points = orchestrator
        .calculate_reached_points(2, Some(0), false, false)
        .await
        .unwrap();
    assert_eq!(points, 0.0);
}

#[tokio::test]
async fn random_values_survive_resubmission() {
    let store = Arc::new(MemorySolutionStore::new());
    let attempt = Attempt {
        active_id: 3,
        question_id: 8,
        pass: 0,
    };

    let mut first = ScoringOrchestrator::new(question(RANDOM), services(Arc::clone(&store)));
    assert!(!first.ensure_variables(&attempt).await.unwrap());
    let x = first.question().variables().get("x").and_then(|v| v.value).unwrap();
    let amount = format!("{x}").replace('.', ",");
    first
        .save_working_data(&attempt, &booking(&amount), true)
        .await
        .unwrap();

    // A later request builds a fresh question whose parser would draw anew.
    let mut second = ScoringOrchestrator::new(question(RANDOM), services(Arc::clone(&store)));
    assert!(second.ensure_variables(&attempt).await.unwrap());
    assert_eq!(
        second.question().variables().get("x").and_then(|v| v.value),
        Some(x)
    );
    second
        .save_working_data(&attempt, &booking(&amount), true)
        .await
        .unwrap();

    let vars_rows = store
        .dump(&attempt)
        .await
        .into_iter()
        .filter(|(authorized, row)| *authorized && row.value1 == VARS_KEY)
        .count();
    assert_eq!(vars_rows, 1);

    let points = second
        .calculate_reached_points(3, None, true, false)
        .await
        .unwrap();
    assert_eq!(points, 2.0);
}

#[tokio::test]
async fn duplicate_sync_and_delete_parts() {
    let questions = MemoryQuestionRepository::new();
    let parts = MemoryPartRepository::new();
    let config = ScoringConfig::default();
    let parser = ReferenceVariableParser::new();

    let mut original = question(SALES);
    let original_id = original.save(&questions, &parts, true).await.unwrap();
    assert_eq!(original_id, 7);
    assert_eq!(parts.len().await, 1);

    let mut copy = original
        .duplicate(
            DuplicateOverrides {
                title: Some("Sales (copy)".into()),
                ..Default::default()
            },
            true,
            &questions,
            &parts,
        )
        .await
        .unwrap();
    assert_ne!(copy.id(), Some(original_id));
    assert_eq!(copy.original_id(), Some(original_id));
    assert_eq!(parts.len().await, 2);
    assert_ne!(copy.parts()[0].part_id(), original.parts()[0].part_id());

    copy.set_question_text("Book {x} on account 4000 today");
    copy.sync_with_original(&questions, &parts).await.unwrap();

    let reloaded = AccountingQuestion::load(original_id, &questions, &parts, &parser, &config)
        .await
        .unwrap();
    assert_eq!(reloaded.question_text(), "Book {x} on account 4000 today");
    assert_eq!(reloaded.parts().len(), 1);
    assert_eq!(parts.len().await, 2);

    let part_id = copy.parts()[0].part_id();
    assert!(copy.delete_part(part_id, &questions, &parts).await.unwrap());
    assert!(!parts.contains(part_id).await);
    assert_eq!(copy.points(), 0.0);
    assert!(!copy.delete_part(part_id, &questions, &parts).await.unwrap());
}

#[tokio::test]
async fn copy_to_another_container() {
    let questions = MemoryQuestionRepository::new();
    let parts = MemoryPartRepository::new();
    let config = ScoringConfig::default();
    let parser = ReferenceVariableParser::new();

    let mut original = question(SALES);
    let original_id = original.save(&questions, &parts, true).await.unwrap();

    let copy = original
        .copy_to(42, Some("Sales elsewhere".into()), &questions, &parts)
        .await
        .unwrap();
    let copy_id = copy.id().unwrap();
    assert_ne!(copy_id, original_id);
    assert_eq!(copy.original_id(), None);
    assert_eq!(parts.len().await, 2);

    let reloaded = AccountingQuestion::load(copy_id, &questions, &parts, &parser, &config)
        .await
        .unwrap();
    assert_eq!(reloaded.container_id(), 42);
    assert_eq!(reloaded.title(), "Sales elsewhere");
    assert_eq!(reloaded.question_text(), original.question_text());
    assert_eq!(reloaded.parts().len(), 1);

    let source = AccountingQuestion::load(original_id, &questions, &parts, &parser, &config)
        .await
        .unwrap();
    assert_eq!(source.container_id(), 0);
    assert_eq!(source.title(), "Sales");
}

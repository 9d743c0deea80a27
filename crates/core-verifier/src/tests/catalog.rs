use crate::catalog::ChallengeCatalog;
use crate::entities::{ComparisonMode, ExpectedAnswer, Scoring, VerificationOptions};
use crate::errors::CatalogError;
use crate::service::VerificationService;
use crate::tests::utils::verification_service;

const DEMO_CATALOG: &str = include_str!("../../../../demos/challenges.yaml");

#[test]
#[allow(clippy::unwrap_used)]
fn test_demo_catalog_loads_in_order() {
    let catalog = ChallengeCatalog::from_yaml_str(DEMO_CATALOG).unwrap();
    assert_eq!(catalog.len(), 5);
    assert_eq!(
        catalog.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
        vec![
            "high-earners",
            "headcount",
            "top-paid",
            "engineers",
            "hired-before-2022"
        ]
    );

    let top_paid = catalog.get("top-paid").unwrap();
    assert_eq!(top_paid.options.comparison_mode, ComparisonMode::Exact);
    assert_eq!(top_paid.options.scoring, Scoring::Boolean);
    assert_eq!(catalog.schema_for(top_paid).unwrap().name, "company");

    let engineers = catalog.get("engineers").unwrap();
    assert!(!engineers.options.case_sensitive);
    assert!(matches!(
        &engineers.expected,
        ExpectedAnswer::ResultSet(rs) if rs.num_rows() == 2
    ));
    assert_eq!(
        catalog.get("hired-before-2022").unwrap().options,
        VerificationOptions::default()
            .with_comparison_mode(ComparisonMode::UnorderedColumnsAndRows)
            .with_timeout_ms(2_000)
    );
}

#[test]
fn test_unknown_challenge() {
    let catalog = ChallengeCatalog::from_yaml_str(DEMO_CATALOG).unwrap_or_default();
    assert!(matches!(
        catalog.get("missing"),
        Err(CatalogError::ChallengeNotFound { id }) if id == "missing"
    ));
}

#[test]
fn test_catalog_validation() {
    let schema = "schemas:\n  - name: s\n    tables:\n      - name: t\n        columns: [{name: id, type: INTEGER, primaryKey: true}]\n        rows: [[1], [2]]\n";
    let unknown_schema = format!(
        "{schema}challenges:\n  - {{id: a, title: A, schema: nope, expected: {{referenceQuery: SELECT 1}}}}\n"
    );
    assert!(matches!(
        ChallengeCatalog::from_yaml_str(&unknown_schema),
        Err(CatalogError::UnknownSchema { .. })
    ));

    let duplicate = format!(
        "{schema}challenges:\n  - {{id: a, title: A, schema: s, expected: {{referenceQuery: SELECT 1}}}}\n  - {{id: a, title: B, schema: s, expected: {{referenceQuery: SELECT 2}}}}\n"
    );
    assert!(matches!(
        ChallengeCatalog::from_yaml_str(&duplicate),
        Err(CatalogError::DuplicateChallenge { id }) if id == "a"
    ));

    let duplicate_key = schema.replace("[[1], [2]]", "[[1], [1]]");
    assert!(matches!(
        ChallengeCatalog::from_yaml_str(&duplicate_key),
        Err(CatalogError::InvalidSchema { name, .. }) if name == "s"
    ));

    let ragged = format!(
        "{schema}challenges:\n  - id: a\n    title: A\n    schema: s\n    expected:\n      resultSet:\n        columns: [{{name: id}}]\n        rows: [[1, 2]]\n"
    );
    assert!(matches!(
        ChallengeCatalog::from_yaml_str(&ragged),
        Err(CatalogError::Parse { .. })
    ));
}

#[test]
#[allow(clippy::unwrap_used)]
fn test_expected_answer_is_a_single_key_map() {
    let yaml = "schemas:\n  - name: s\n    tables:\n      - name: t\n        columns: [{name: id, type: INTEGER}]\n        rows: [[1], [2]]\n\
challenges:\n  - {id: a, title: A, schema: s, expected: {referenceQuery: SELECT id FROM t}}\n  - id: b\n    title: B\n    schema: s\n    expected:\n      resultSet:\n        columns: [{name: id}]\n        rows: [[1], [2]]\n";
    let catalog = ChallengeCatalog::from_yaml_str(yaml).unwrap();

    let by_query = catalog.get("a").unwrap();
    assert_eq!(by_query.expected.reference_query(), Some("SELECT id FROM t"));
    assert!(matches!(
        &catalog.get("b").unwrap().expected,
        ExpectedAnswer::ResultSet(rs) if rs.num_rows() == 2
    ));

    let rendered = serde_yaml::to_string(by_query).unwrap();
    assert!(
        rendered.contains("referenceQuery: SELECT id FROM t"),
        "{rendered}"
    );
}

#[test]
fn test_catalog_from_missing_path() {
    assert!(matches!(
        ChallengeCatalog::from_path("/nonexistent/challenges.yaml"),
        Err(CatalogError::Read { .. })
    ));
}

#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn test_demo_reference_queries_verify_themselves() {
    let catalog = ChallengeCatalog::from_yaml_str(DEMO_CATALOG).unwrap();
    let svc = verification_service();
    for challenge in catalog.iter() {
        let Some(query) = challenge.expected.reference_query() else {
            continue;
        };
        let schema = catalog.schema_for(challenge).unwrap();
        let verdict = svc
            .verify(query, schema, &challenge.expected, &challenge.options)
            .await;
        assert!(verdict.is_correct, "{}: {verdict:?}", challenge.id);
        assert_eq!(verdict.score, 100);
    }
}

#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn test_demo_materialized_answers() {
    let catalog = ChallengeCatalog::from_yaml_str(DEMO_CATALOG).unwrap();
    let svc = verification_service();
    let answers = [
        (
            "engineers",
            "SELECT e.name FROM employees e JOIN departments d ON e.department_id = d.id WHERE d.name = 'Engineering'",
        ),
        (
            "hired-before-2022",
            "SELECT hire_date, name FROM employees WHERE hire_date < DATE '2022-01-01'",
        ),
    ];
    for (id, answer) in answers {
        let challenge = catalog.get(id).unwrap();
        let verdict = svc
            .verify(
                answer,
                catalog.schema_for(challenge).unwrap(),
                &challenge.expected,
                &challenge.options,
            )
            .await;
        assert!(verdict.is_correct, "{id}: {verdict:?}");
    }
}

use budgnudg_categorize::{
    safe_category_lookup, Categorizer, ConfidenceSource, DecisionSource, KeywordRuleRegistry,
    RuleCatalog,
};
use budgnudg_core::{
    Category, EntityIndex, KeywordRule, LearningKind, LearningTarget, MemoryLearningStore, Money,
    Payoree,
};
use chrono::NaiveDate;

fn money(s: &str) -> Money {
    s.parse().unwrap()
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, d).unwrap()
}

fn learned(key: &str, target: LearningTarget, times: u32) -> MemoryLearningStore {
    let mut store = MemoryLearningStore::new();
    for d in 1..=times {
        store.record_confirmation(LearningKind::Subcategory, key, target.clone(), day(d.min(28)));
    }
    store
}

#[test]
fn empty_description_everywhere() {
    let categorizer = Categorizer::default();
    assert_eq!(categorizer.extract_merchant(""), "");
    assert_eq!(
        categorizer.categorize_transaction("", Money::zero()),
        ("Miscellaneous".to_string(), String::new())
    );
    let (_, _, reasoning) = categorizer.categorize_transaction_with_reasoning("", Money::zero());
    assert_eq!(reasoning, "No description provided");
}

#[test]
fn cold_start_starbucks() {
    let categorizer = Categorizer::default();
    let (category, subcategory, reasoning) =
        categorizer.categorize_transaction_with_reasoning("STARBUCKS #1234 CHICAGO", money("5.75"));
    assert_eq!(category, "Food & Dining");
    assert_eq!(subcategory, "Coffee/Tea");
    assert!(reasoning.contains("Starbucks"));

    let report = categorizer.calculate_suggestion_confidence(
        "STARBUCKS #1234 CHICAGO",
        &category,
        &subcategory,
    );
    assert_eq!(report.source, ConfidenceSource::RuleBased);
    assert_eq!(report.overall_confidence, 55.0);
}

#[test]
fn gas_station_default() {
    let categorizer = Categorizer::default();
    assert_eq!(
        categorizer.categorize_transaction("BP#12345 SKOKIE IL", money("45.50")),
        ("Transportation".to_string(), "Gas".to_string())
    );
}

#[test]
fn precedence_keyword_then_learned_then_catalog() {
    let target = LearningTarget::new(30, "Client Meals", Some("Work"));

    let catalog_only = Categorizer::default();
    let learned_only = Categorizer::with_learning(learned("Starbucks", target.clone(), 20));
    let with_keyword = Categorizer::new(
        RuleCatalog::default(),
        KeywordRuleRegistry::new(vec![
            KeywordRule::new("starbucks", "Personal", 100).with_subcategory("Treats")
        ]),
        learned("Starbucks", target, 20),
    );

    let desc = "STARBUCKS #1234 CHICAGO";
    let amount = money("-5.75");

    assert_eq!(catalog_only.resolve(desc, amount).subcategory, "Coffee/Tea");

    let learned_decision = learned_only.resolve(desc, amount);
    assert_eq!(learned_decision.source, DecisionSource::Learned);
    assert_eq!(learned_decision.category, "Work");
    assert!(learned_decision.reasoning.contains("20 previous user confirmations"));

    let keyword_decision = with_keyword.resolve(desc, amount);
    assert_eq!(keyword_decision.source, DecisionSource::Keyword);
    assert_eq!(keyword_decision.subcategory, "Treats");
    assert_eq!(with_keyword.assess(&keyword_decision).source, ConfidenceSource::Keyword);
}

#[test]
fn resolve_is_idempotent() {
    let categorizer = Categorizer::with_learning(learned(
        "Shell",
        LearningTarget::new(4, "Gas", Some("Transportation")),
        3,
    ));
    let first = categorizer.resolve("SHELL OIL 12345678 WILMETTE", money("-41.20"));
    let second = categorizer.resolve("SHELL OIL 12345678 WILMETTE", money("-41.20"));
    assert_eq!(first, second);
}

#[test]
fn confidence_grows_with_confirmations() {
    let mut categorizer = Categorizer::default();
    let target = LearningTarget::new(10, "Coffee/Tea", Some("Food & Dining"));
    let desc = "STARBUCKS 4410 EVANSTON";
    let expected = [52.5, 70.0, 70.0, 70.0, 80.0, 80.0, 80.0, 80.0, 80.0, 90.0];

    for (i, overall) in expected.iter().enumerate() {
        let key = categorizer.extract_merchant(desc);
        categorizer.learning_mut().record_confirmation(
            LearningKind::Subcategory,
            &key,
            target.clone(),
            day(i as u32 + 1),
        );
        let decision = categorizer.resolve(desc, money("-4.10"));
        let report = categorizer.assess(&decision);
        assert_eq!(report.learning_count as usize, i + 1);
        assert_eq!(report.overall_confidence, *overall);
    }
}

#[test]
fn learned_top_level_category_is_scored_as_learned() {
    let categorizer = Categorizer::with_learning(learned(
        "HARDWARE HUT",
        LearningTarget::new(4, "Household", None),
        10,
    ));
    let decision = categorizer.resolve("HARDWARE HUT 55120", money("-18.99"));
    assert_eq!(decision.source, DecisionSource::Learned);
    assert_eq!(decision.category, "Household");
    assert_eq!(decision.subcategory, "");

    let report = categorizer.assess(&decision);
    assert_eq!(report.source, ConfidenceSource::Learned);
    assert_eq!(report.learning_count, 10);
    assert_eq!(report.overall_confidence, 90.0);
}

#[test]
fn processor_prefixed_chains_reach_the_merchant_table() {
    let categorizer = Categorizer::default();
    let cases = [
        ("TST* DUNKIN 123", "Dunkin'", "Coffee/Tea"),
        ("SQ *STARBUCKS RESERVE", "Starbucks", "Coffee/Tea"),
        ("PAYPAL *NETFLIX.COM", "Netflix", "Subscriptions"),
    ];
    for (desc, key, subcategory) in cases {
        assert_eq!(categorizer.extract_merchant(desc), key, "{desc}");
        let (_, sub) = categorizer.categorize_transaction(desc, money("-9.99"));
        assert_eq!(sub, subcategory, "{desc}");
    }
}

#[test]
fn jewelry_store_is_not_a_grocery() {
    let categorizer = Categorizer::default();
    assert_eq!(categorizer.extract_merchant("KAY JEWELRY MALL"), "KAY JEWELRY MALL");
    let (category, _) = categorizer.categorize_transaction("KAY JEWELRY MALL", money("-250.00"));
    assert_ne!(category, "Food & Dining");
    assert_eq!(categorizer.extract_merchant("JEWEL OSCO 3345"), "Jewel-Osco");
}

#[test]
fn lookups_over_entity_snapshot() {
    let index = EntityIndex::new(
        vec![
            Category::new(1, "Household", None),
            Category::new(2, "Food", Some(1)),
            Category::new(3, "Food", None),
        ],
        vec![Payoree::new(1, "Starbucks")],
    );
    assert_eq!(
        safe_category_lookup(&index, "", "X").unwrap_err().code(),
        "X_NO_SUBCATEGORY_SUGGESTION"
    );
    assert_eq!(
        safe_category_lookup(&index, "Nonexistent", "X")
            .unwrap_err()
            .code(),
        "X_SUBCATEGORY_LOOKUP_FAILED"
    );
    assert_eq!(safe_category_lookup(&index, "Food", "X").unwrap().id.0, 3);
}
